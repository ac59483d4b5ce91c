mod config;
mod main_lib;

use std::sync::Arc;

use config::Config;
use main_lib::{build_gateway, init_tracing, run};
use tokio::io::BufReader;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env may set SG_LOG_FORMAT, so load it before logging starts
    dotenvy::dotenv().ok();
    init_tracing();
    let config = Config::from_env();

    let gateway = Arc::new(build_gateway(&config).await?);
    let _sweeper = gateway.start_maintenance();

    tracing::info!("Reading requests from stdin");
    let mut stdout = tokio::io::stdout();
    run(gateway, BufReader::new(tokio::io::stdin()), &mut stdout).await?;
    tracing::info!("Input closed, shutting down");
    Ok(())
}
