use anyhow::Result;
use tracing_subscriber::EnvFilter;

use grow_dashboard::config::DashboardConfig;

#[tokio::main]
async fn main() -> Result<()> {
    // missing upstream url/key or a bad file ends the process here
    let config = DashboardConfig::discover()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            let app_name = env!("CARGO_PKG_NAME").replace('-', "_");
            let level = config.logging.level.as_str();

            format!("{app_name}={level},tower_http={level}").into()
        }))
        .init();

    config.log_summary();

    grow_dashboard::run(config).await
}
