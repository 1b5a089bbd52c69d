//! Runtime configuration, collected once at startup.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use url::Url;

use crate::notify::SmsOptions;

const DEFAULT_SHOP_URL: &str = "https://www.andrewkingart.ca/s/shop";
// The shop is client-side rendered; ready once the app root has children.
const DEFAULT_READY_SELECTOR: &str = "#app > *";
const DEFAULT_DB_PATH: &str = "data";
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";

#[derive(Debug, Clone)]
pub struct Config {
    pub shop_url: Url,
    pub wait_selector: String,
    pub sms: SmsOptions,
    pub db_path: PathBuf,
    pub browser_ws: Option<String>,
    pub watch_interval: Option<Duration>,
    pub bind_addr: String,
}

impl Config {
    /// Load configuration from the environment (and a `.env` if present).
    ///
    /// The SMS credentials and numbers have no defaults and fail the load
    /// when missing.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let shop_url = optional("SHOP_URL").unwrap_or_else(|| DEFAULT_SHOP_URL.to_string());
        let shop_url = Url::parse(&shop_url).context("SHOP_URL is not a valid url")?;

        let watch_interval = optional("WATCH_INTERVAL_SECS")
            .map(|raw| {
                raw.parse::<u64>()
                    .map(Duration::from_secs)
                    .context("WATCH_INTERVAL_SECS is not a number of seconds")
            })
            .transpose()?;

        Ok(Self {
            shop_url,
            wait_selector: optional("SHOP_READY_SELECTOR")
                .unwrap_or_else(|| DEFAULT_READY_SELECTOR.to_string()),
            sms: SmsOptions {
                api_key: required("SMS_API_KEY")?,
                api_secret: required("SMS_API_SECRET")?,
                from: required("SMS_FROM")?,
                to: required("SMS_TO")?,
            },
            db_path: PathBuf::from(
                optional("DB_PATH").unwrap_or_else(|| DEFAULT_DB_PATH.to_string()),
            ),
            browser_ws: optional("BROWSER_WS_URL"),
            watch_interval,
            bind_addr: optional("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
        })
    }
}

fn required(name: &str) -> Result<String> {
    env::var(name).with_context(|| format!("missing required env var {name}"))
}

fn optional(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.is_empty())
}
