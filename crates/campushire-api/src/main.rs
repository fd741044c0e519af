mod api_doc;
mod error;
mod handlers;
mod retention;
mod setup;
mod state;
mod telemetry;

use campushire_core::Config;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let config = Config::from_env()?;

    let (state, router) = crate::setup::initialize_app(config.clone()).await?;

    crate::setup::server::start_server(&config, router).await?;

    // HTTP is down; let in-flight imports finish before the process exits
    state.import_queue.shutdown().await;
    tracing::info!("Import queue drained, exiting");

    Ok(())
}
