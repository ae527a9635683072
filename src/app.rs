/*
 * Responsibility
 * - tracing / panic hook の初期化
 * - Config → AuthGate → Router の組み立て
 * - axum::serve()
 */
use std::{panic, process};

use anyhow::Result;
use axum::{Router, routing::get};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::api;
use crate::api::v1::handlers::health::health;
use crate::config::Config;
use crate::middleware::{self, http::HttpLimits};
use crate::services::auth::AuthGate;

fn init_tracing() {
    // RUST_LOG wins when set, e.g. RUST_LOG=info,jwt_gate=debug,tower_http=debug
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,tower_http=info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn init_panic_hook(abort_on_panic: bool) {
    let default_hook = panic::take_hook();

    panic::set_hook(Box::new(move |info| {
        tracing::error!(?info, "panic");

        // development: crash loudly, production: default hook and keep serving
        if abort_on_panic {
            process::abort();
        } else {
            default_hook(info);
        }
    }))
}

pub async fn run() -> Result<()> {
    init_tracing();
    let config = Config::from_env()?;
    init_panic_hook(!config.app_env.is_production());

    let gate = config.gate()?;
    tracing::info!(
        env = ?config.app_env,
        addr = %config.addr,
        header_scheme = ?gate.header_scheme(),
        query_param = ?gate.query_param(),
        token_required = gate.token_required(),
        "starting jwt gate"
    );

    let app = build_router(gate, config.http);

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

/// `/health` is public, everything under `/api/v1` goes through the gate.
pub fn build_router(gate: AuthGate, limits: HttpLimits) -> Router {
    let v1 = middleware::auth::apply(api::v1::routes(), gate);

    let router = Router::new()
        .route("/health", get(health))
        .nest("/api/v1", v1);

    middleware::http::apply(router, limits)
}
