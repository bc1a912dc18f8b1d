//! Liveness route, mounted next to the DinoPay webhook on the same listener.
//!
//! A 200 here only says the webhook listener is up. It does not check
//! Postgres, NATS or the collaborator APIs.

use axum::{Json, Router, routing::get};
use serde::Serialize;

const SERVICE_NAME: &str = "dinopay-gateway";

#[derive(Debug, Serialize)]
pub struct Liveness {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
}

async fn liveness() -> Json<Liveness> {
    Json(Liveness {
        status: "ok",
        service: SERVICE_NAME,
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// `GET /health`, merged into the webhook listener's router.
pub fn router() -> Router {
    Router::new().route("/health", get(liveness))
}
