use anyhow::Result;
use etl_service::{
    config::{AppConfig, DatabaseConfig},
    load, observability,
};
use sqlx::postgres::PgPoolOptions;

#[tokio::main]
async fn main() -> Result<()> {
    observability::init_tracing();

    let cfg = AppConfig::load()?;
    let db = DatabaseConfig::from_env()?;

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
        rows_in_table = outcome.rows_in_table,
        verified = outcome.verified(),
        "load complete"
    );

    Ok(())
}
