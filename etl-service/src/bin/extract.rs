use anyhow::Result;
use etl_service::{config::AppConfig, extract, observability};

#[tokio::main]
async fn main() -> Result<()> {
    observability::init_tracing();

    let cfg = AppConfig::load()?;

    let client = reqwest::Client::new();
    let records = extract::extract(&client, &cfg.source.url, &cfg.source.raw_path).await?;

    tracing::info!(rows = records.num_rows(), "extract complete");
    Ok(())
}
