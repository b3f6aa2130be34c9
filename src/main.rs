use anyhow::Context;
use tracing::info;

use receptivo_pricing::config::AppConfig;
use receptivo_pricing::{connect, order_service, pricing, telemetry};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load().context("loading configuration")?;
    telemetry::init(&config.telemetry).context("initialising tracing")?;

    let pool = connect(&config).await.context("connecting to the database")?;
    let app = pricing::router(order_service(&config, pool));

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!("Pricing service listening on {}", addr);

    axum::serve(listener, app).await.context("serving HTTP")?;
    Ok(())
}
