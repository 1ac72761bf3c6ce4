//! Webhook deploy agent
//!
//! Two opaque routes trigger a deploy (fetch the branch archive, unpack it,
//! restart the compose project) or a reset (restart with fresh volumes).
//! [`gate::OperationGate`] lets at most one of them run at a time and bounds
//! how long a caller waits.

pub mod api;
pub mod archive;
pub mod config;
pub mod error;
pub mod gate;
pub mod operations;
pub mod orchestrator;
pub mod state;

use std::sync::Arc;

use axum::Router;
use tower_http::trace::TraceLayer;

pub use state::AppState;

/// Wire the real archive fetcher and compose CLI from `config`.
pub fn build_state(config: &config::Config) -> anyhow::Result<AppState> {
    let archive = archive::HttpArchive::new(
        config.archive_url(),
        config.extract_dir.clone(),
        config.fetch_timeout,
    )?;
    let orchestrator =
        orchestrator::ComposeCli::new(&config.compose_command, config.kill_on_timeout)?;

    let deployer = operations::Deployer::new(
        Arc::new(archive),
        Arc::new(orchestrator),
        config.compose_dir.clone(),
        config.rebuild_on_deploy,
    );

    Ok(AppState::new(
        gate::OperationGate::with_cooldown(config.cooldown),
        deployer,
        config.operation_timeout,
    ))
}

/// The full HTTP application for `state`, mounted under `route_token`.
pub fn app(route_token: &str, state: AppState) -> Router {
    api::router(route_token)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
