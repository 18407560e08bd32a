use anyhow::Result;
use etl_service::{
    config::{AppConfig, DatabaseConfig},
    observability,
};
use sqlx::postgres::PgPoolOptions;
use warehouse_client::db::billing_reports;

/// Runs the five standing reports against the loaded table and logs the
/// result sets. The queries themselves are plain read-only SQL and can just
/// as well be run directly by an analyst.
#[tokio::main]
async fn main() -> Result<()> {
    observability::init_tracing();

    let cfg = AppConfig::load()?;
    let db = DatabaseConfig::from_env()?;

    let pool = PgPoolOptions::new()
        .max_connections(cfg.warehouse.max_connections)
        .connect(&db.uri())
        .await?;

    let table = &cfg.warehouse.table;

    let monthly = billing_reports::monthly_revenue(&pool, table).await?;
    for row in &monthly {
        tracing::info!(
            year = row.year,
            month = row.month,
            total_billed_ngn = row.total_billed_ngn,
            total_collected_ngn = row.total_collected_ngn,
            total_arrears_ngn = row.total_arrears_ngn,
            collection_rate = row.collection_rate,
            "monthly revenue trend"
        );
    }

    let bands = billing_reports::tariff_band_payment(&pool, table).await?;
    for row in &bands {
        tracing::info!(
            tariff_band = %row.tariff_band,
            customer_count = row.customer_count,
            on_time_count = row.on_time_count,
            on_time_rate_pct = row.on_time_rate_pct,
            avg_bill_ngn = row.avg_bill_ngn,
            avg_arrears_ngn = row.avg_arrears_ngn,
            "payment behaviour by tariff band"
        );
    }

    let debtors = billing_reports::top_arrears_customers(&pool, table).await?;
    for row in &debtors {
        tracing::info!(
            customer_id = %row.customer_id,
            disco = %row.disco,
            total_arrears_ngn = row.total_arrears_ngn,
            billing_periods = row.billing_periods,
            avg_monthly_bill_ngn = row.avg_monthly_bill_ngn,
            "top customers by arrears"
        );
    }

    let adoption = billing_reports::tariff_band_adoption(&pool, table).await?;
    for row in &adoption {
        tracing::info!(
            tariff_band = %row.tariff_band,
            customer_count = row.customer_count,
            total_revenue_ngn = row.total_revenue_ngn,
            avg_revenue_ngn = row.avg_revenue_ngn,
            "tariff band adoption"
        );
    }

    let consumption = billing_reports::tariff_band_consumption(&pool, table).await?;
    for row in &consumption {
        tracing::info!(
            tariff_band = %row.tariff_band,
            customer_count = row.customer_count,
            total_kwh = row.total_kwh,
            avg_kwh = row.avg_kwh,
            "tariff band consumption"
        );
    }

    Ok(())
}
