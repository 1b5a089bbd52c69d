mod browser;
mod config;
mod extract;
mod notify;
mod run;
mod store;

use std::time::Duration;

use actix_web::{App, HttpResponse, HttpServer, Responder, get, post, web};
use anyhow::{Context, Result};
use rand::{Rng, rng};
use tokio::time::sleep;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::notify::SmsClient;
use crate::store::RedbStore;

// -------------------------
// Service state
// -------------------------

struct AppState {
    cfg: Config,
    store: RedbStore,
    sms: SmsClient,
}

// -------------------------
// HTTP handlers
// -------------------------

#[get("/")]
async fn index() -> impl Responder {
    HttpResponse::Ok().body(
        "Easel online.\n\
         Run:\n  POST /run (render the shop page, notify + record the first new painting)\n\
         Links:\n  GET  /links (log and return the product links on the page)\n\
         Health:\n  GET  /healthz",
    )
}

#[get("/healthz")]
async fn healthz() -> impl Responder {
    HttpResponse::Ok().body("ok")
}

#[post("/run")]
async fn run_endpoint(state: web::Data<AppState>) -> impl Responder {
    match run::run_once(&state.cfg, &state.store, &state.sms).await {
        Ok(report) => HttpResponse::Ok().json(report),
        Err(e) => {
            error!("run failed: {e:#}");
            let err = serde_json::json!({ "error": format!("{e:#}") });
            HttpResponse::InternalServerError().json(err)
        }
    }
}

#[get("/links")]
async fn links_endpoint(state: web::Data<AppState>) -> impl Responder {
    match run::scan_links(&state.cfg).await {
        Ok(links) => HttpResponse::Ok().json(links),
        Err(e) => {
            error!("link scan failed: {e:#}");
            let err = serde_json::json!({ "error": format!("{e:#}") });
            HttpResponse::InternalServerError().json(err)
        }
    }
}

// -------------------------
// Entry point
// -------------------------

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cfg = Config::from_env()?;
    let store = RedbStore::open(&cfg.db_path).context("failed to open listing store")?;
    let sms = SmsClient::new(cfg.sms.clone());
    let state = web::Data::new(AppState { cfg, store, sms });

    if let Some(interval) = state.cfg.watch_interval {
        let watch_state = state.clone();
        tokio::spawn(watch_loop(watch_state, interval));
    }

    let bind_addr = state.cfg.bind_addr.clone();
    info!(addr = %bind_addr, shop = %state.cfg.shop_url, "starting easel");

    let app_state = state.clone();
    HttpServer::new(move || {
        App::new()
            .app_data(app_state.clone())
            .service(index)
            .service(healthz)
            .service(run_endpoint)
            .service(links_endpoint)
    })
    .bind(bind_addr)?
    .run()
    .await?;
    Ok(())
}

// -------------------------
// Built-in trigger (optional)
// -------------------------

/// Run on a fixed cadence when `WATCH_INTERVAL_SECS` is set. An external
/// scheduler hitting `POST /run` is the primary trigger; this loop covers
/// deployments without one. Failures are logged and the loop keeps going.
async fn watch_loop(state: web::Data<AppState>, interval: Duration) {
    loop {
        match run::run_once(&state.cfg, &state.store, &state.sms).await {
            Ok(report) => info!(
                candidates = report.candidates,
                unseen = report.unseen,
                notified = report.notified.is_some(),
                "scheduled run complete"
            ),
            Err(e) => error!("scheduled run failed: {e:#}"),
        }
        let jitter = rng().random_range(0..5_000);
        sleep(interval + Duration::from_millis(jitter)).await;
    }
}
