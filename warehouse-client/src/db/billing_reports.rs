use anyhow::Result;
use sqlx::PgPool;

/// Revenue and collection performance per billing month.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct MonthlyRevenue {
    pub year: i32,
    pub month: i32,
    pub total_billed_ngn: f64,
    pub total_collected_ngn: f64,
    pub total_arrears_ngn: f64,
    /// Collected / billed; NULL when nothing was billed in the month.
    pub collection_rate: Option<f64>,
}

/// Payment behaviour aggregated per tariff band.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TariffBandPayment {
    pub tariff_band: String,
    pub customer_count: i64,
    pub on_time_count: i64,
    pub on_time_rate_pct: Option<f64>,
    pub avg_bill_ngn: Option<f64>,
    pub avg_arrears_ngn: Option<f64>,
}

/// One of the ten customers carrying the most arrears.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CustomerArrears {
    pub customer_id: String,
    pub disco: String,
    pub total_arrears_ngn: f64,
    pub billing_periods: i64,
    pub avg_monthly_bill_ngn: Option<f64>,
}

/// Tariff band popularity by distinct customer count.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TariffBandAdoption {
    pub tariff_band: String,
    pub customer_count: i64,
    pub total_revenue_ngn: f64,
    pub avg_revenue_ngn: Option<f64>,
}

/// Energy consumption aggregated per tariff band.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TariffBandConsumption {
    pub tariff_band: String,
    pub customer_count: i64,
    pub total_kwh: f64,
    pub avg_kwh: Option<f64>,
}

// The table name is configuration, so the statements are assembled with
// format!. Postgres has no ROUND(double precision, int), hence the numeric
// round-trip on every rounded expression.

fn monthly_revenue_sql(table: &str) -> String {
    format!(
        r#"
        SELECT
            year,
            month,
            SUM(amount_billed_ngn)  AS total_billed_ngn,
            SUM(amount_paid_ngn)    AS total_collected_ngn,
            SUM(arrears_ngn)        AS total_arrears_ngn,
            ROUND((SUM(amount_paid_ngn) / NULLIF(SUM(amount_billed_ngn), 0))::numeric, 2)::double precision
                                    AS collection_rate
        FROM {table}
        GROUP BY year, month
        ORDER BY year, month
        "#
    )
}

fn tariff_band_payment_sql(table: &str) -> String {
    format!(
        r#"
        SELECT
            tariff_band,
            COUNT(DISTINCT customer_id) AS customer_count,
            COUNT(*) FILTER (WHERE paid_on_time) AS on_time_count,
            ROUND((100.0 * COUNT(*) FILTER (WHERE paid_on_time) / NULLIF(COUNT(*), 0))::numeric, 2)::double precision
                AS on_time_rate_pct,
            ROUND(AVG(amount_billed_ngn)::numeric, 2)::double precision AS avg_bill_ngn,
            ROUND(AVG(arrears_ngn)::numeric, 2)::double precision       AS avg_arrears_ngn
        FROM {table}
        GROUP BY tariff_band
        ORDER BY on_time_rate_pct DESC
        "#
    )
}

fn top_arrears_customers_sql(table: &str) -> String {
    format!(
        r#"
        SELECT
            customer_id,
            disco,
            SUM(arrears_ngn) AS total_arrears_ngn,
            COUNT(*)         AS billing_periods,
            ROUND(AVG(amount_billed_ngn)::numeric, 2)::double precision AS avg_monthly_bill_ngn
        FROM {table}
        GROUP BY customer_id, disco
        ORDER BY total_arrears_ngn DESC
        LIMIT 10
        "#
    )
}

fn tariff_band_adoption_sql(table: &str) -> String {
    format!(
        r#"
        SELECT
            tariff_band,
            COUNT(DISTINCT customer_id) AS customer_count,
            SUM(amount_paid_ngn)        AS total_revenue_ngn,
            ROUND(AVG(amount_paid_ngn)::numeric, 2)::double precision AS avg_revenue_ngn
        FROM {table}
        GROUP BY tariff_band
        ORDER BY customer_count DESC
        "#
    )
}

fn tariff_band_consumption_sql(table: &str) -> String {
    format!(
        r#"
        SELECT
            tariff_band,
            COUNT(DISTINCT customer_id) AS customer_count,
            SUM(kwh)                    AS total_kwh,
            ROUND(AVG(kwh)::numeric, 2)::double precision AS avg_kwh
        FROM {table}
        GROUP BY tariff_band
        ORDER BY total_kwh DESC
        "#
    )
}

/// Monthly revenue trend: billed, collected, arrears and collection rate
/// per (year, month), oldest first.
pub async fn monthly_revenue(pool: &PgPool, table: &str) -> Result<Vec<MonthlyRevenue>> {
    let rows = sqlx::query_as::<_, MonthlyRevenue>(&monthly_revenue_sql(table))
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

/// Payment behaviour by tariff band, best-paying bands first.
pub async fn tariff_band_payment(pool: &PgPool, table: &str) -> Result<Vec<TariffBandPayment>> {
    let rows = sqlx::query_as::<_, TariffBandPayment>(&tariff_band_payment_sql(table))
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

/// Top ten customers by accumulated arrears.
pub async fn top_arrears_customers(pool: &PgPool, table: &str) -> Result<Vec<CustomerArrears>> {
    let rows = sqlx::query_as::<_, CustomerArrears>(&top_arrears_customers_sql(table))
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

/// Most-used tariff bands by distinct customer count.
pub async fn tariff_band_adoption(pool: &PgPool, table: &str) -> Result<Vec<TariffBandAdoption>> {
    let rows = sqlx::query_as::<_, TariffBandAdoption>(&tariff_band_adoption_sql(table))
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

/// Tariff bands ranked by total energy consumed.
pub async fn tariff_band_consumption(
    pool: &PgPool,
    table: &str,
) -> Result<Vec<TariffBandConsumption>> {
    let rows = sqlx::query_as::<_, TariffBandConsumption>(&tariff_band_consumption_sql(table))
        .fetch_all(pool)
        .await?;
    Ok(rows)
}
