//! SMS notification over the Vonage REST API.

use anyhow::{Context, Result, bail};
use serde::Serialize;
use tracing::info;

use crate::extract::Listing;

const SMS_ENDPOINT: &str = "https://rest.nexmo.com/sms/json";

/// Sink for the one listing a run decides to announce.
pub trait Notify {
    async fn notify(&self, listing: &Listing) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct SmsOptions {
    pub api_key: String,
    pub api_secret: String,
    pub from: String,
    pub to: String,
}

pub struct SmsClient {
    http: reqwest::Client,
    options: SmsOptions,
}

#[derive(Serialize)]
struct SmsPayload<'a> {
    to: &'a str,
    from: &'a str,
    text: &'a str,
    api_key: &'a str,
    api_secret: &'a str,
}

impl SmsClient {
    pub fn new(options: SmsOptions) -> Self {
        Self {
            http: reqwest::Client::new(),
            options,
        }
    }
}

impl Notify for SmsClient {
    /// Send the listing's URL as a single SMS. A non-success status is a
    /// hard failure carrying the response body, so a dropped notification
    /// never passes silently.
    async fn notify(&self, listing: &Listing) -> Result<()> {
        let payload = SmsPayload {
            to: &self.options.to,
            from: &self.options.from,
            text: &listing.url,
            api_key: &self.options.api_key,
            api_secret: &self.options.api_secret,
        };

        let response = self
            .http
            .post(SMS_ENDPOINT)
            .json(&payload)
            .send()
            .await
            .context("sms request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("failed to send sms ({status}): {body}");
        }

        let body: serde_json::Value = response
            .json()
            .await
            .context("sms response was not json")?;
        info!(handle = %listing.handle, response = %body, "sms sent");
        Ok(())
    }
}
