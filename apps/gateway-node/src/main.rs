mod app;
mod config;
mod demo_sources;

use config::Config;
use gateway_telemetry::LogFormat;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load();
    gateway_telemetry::init(
        &config.log_filter,
        if config.log_json { LogFormat::Json } else { LogFormat::Pretty },
    );

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!(addr = %config.bind_addr, "gateway-node listening");

    let app = app::build_app(&config);
    axum::serve(listener, app).await?;
    Ok(())
}
