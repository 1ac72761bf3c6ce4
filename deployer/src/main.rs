use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use deployer::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "deployer=debug,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    info!(
        port = config.port,
        archive = %config.archive_url(),
        compose_dir = %config.compose_dir.display(),
        timeout_secs = config.operation_timeout.as_secs(),
        "deployer starting"
    );
    if config.kill_on_timeout {
        info!("orchestrator processes will be killed when an operation times out");
    }

    let state = deployer::build_state(&config)?;
    let app = deployer::app(&config.route_token, state);

    let addr = config.listen_addr();
    // The route token is the only access control; keep it out of the logs.
    info!("listening on {addr}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
