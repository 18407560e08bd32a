use anyhow::Result;
use etl_service::{
    config::{AppConfig, DatabaseConfig},
    extract, load, observability, transform,
};
use sqlx::postgres::PgPoolOptions;

/// Full sequential run: extract -> transform -> load, handing off through
/// the files named in the config. Each stage is also available as its own
/// binary under `src/bin/`.
#[tokio::main]
async fn main() -> Result<()> {
    observability::init_tracing();

    let cfg = AppConfig::load()?;
    let db = DatabaseConfig::from_env()?;

    let client = reqwest::Client::new();
    extract::extract(&client, &cfg.source.url, &cfg.source.raw_path).await?;

    transform::transform(&cfg.source.raw_path, &cfg.transform.processed_path)?;

    let pool = PgPoolOptions::new()
        .max_connections(cfg.warehouse.max_connections)
        .connect(&db.uri())
        .await?;

    let outcome = load::load(
        &pool,
        &cfg.transform.processed_path,
        &cfg.warehouse.table,
        cfg.warehouse.replace,
        cfg.warehouse.batch_size,
    )
    .await?;

    tracing::info!(
        rows_loaded = outcome.rows_loaded,
        verified = outcome.verified(),
        "pipeline run complete"
    );

    Ok(())
}
