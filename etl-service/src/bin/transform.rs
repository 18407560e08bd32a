use anyhow::Result;
use etl_service::{config::AppConfig, observability, transform};

#[tokio::main]
async fn main() -> Result<()> {
    observability::init_tracing();

    let cfg = AppConfig::load()?;

    let rows = transform::transform(&cfg.source.raw_path, &cfg.transform.processed_path)?;

    tracing::info!(rows = rows.len(), "transform complete");
    Ok(())
}
