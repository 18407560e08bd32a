use std::{fs::File, path::Path};

use serde::Deserialize;
use sqlx::{postgres::PgPool, Postgres, QueryBuilder, Transaction};
use tracing::{info, warn};
use warehouse_client::domain::BillingRecord;

use crate::pipeline::EtlError;

/// How the target table is replaced on each run. Either way the prior
/// contents are gone afterwards; there is no append mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplacePolicy {
    /// `DROP TABLE IF EXISTS` followed by `CREATE TABLE` with the canonical
    /// column types. Survives schema drift between runs.
    DropCreate,
    /// `TRUNCATE` the existing table and insert. Requires the table to
    /// already exist with a compatible schema.
    TruncateInsert,
}

impl Default for ReplacePolicy {
    fn default() -> Self {
        Self::DropCreate
    }
}

/// Outcome of a load run. `rows_in_table` comes from a post-commit
/// `COUNT(*)` so a mismatch with `rows_loaded` is observable to the caller.
#[derive(Debug, Clone, Copy)]
pub struct LoadOutcome {
    pub rows_loaded: u64,
    pub rows_in_table: i64,
}

impl LoadOutcome {
    pub fn verified(&self) -> bool {
        self.rows_in_table >= 0 && self.rows_in_table as u64 == self.rows_loaded
    }
}

/// Replace the entire contents of `table` with the cleaned CSV at `input`.
///
/// The drop/truncate and all inserts run in one transaction, so readers
/// never observe a half-replaced table and a failed run leaves the previous
/// contents untouched. The count verification runs after commit; a mismatch
/// is logged as a warning, not an error.
pub async fn load(
    pool: &PgPool,
    input: &Path,
    table: &str,
    policy: ReplacePolicy,
    batch_size: usize,
) -> Result<LoadOutcome, EtlError> {
    let rows = read_cleaned_csv(input)?;
    info!(rows = rows.len(), table, ?policy, "replacing warehouse table");

    let mut tx = pool.begin().await?;
    match policy {
        ReplacePolicy::DropCreate => {
            sqlx::query(&drop_table_sql(table)).execute(&mut *tx).await?;
            sqlx::query(&create_table_sql(table)).execute(&mut *tx).await?;
        }
        ReplacePolicy::TruncateInsert => {
            sqlx::query(&truncate_sql(table)).execute(&mut *tx).await?;
        }
    }

    for chunk in rows.chunks(batch_size.max(1)) {
        insert_batch(&mut tx, table, chunk).await?;
    }
    tx.commit().await?;

    let (rows_in_table,): (i64,) = sqlx::query_as(&count_sql(table)).fetch_one(pool).await?;

    let outcome = LoadOutcome {
        rows_loaded: rows.len() as u64,
        rows_in_table,
    };
    if outcome.verified() {
        info!(rows = outcome.rows_loaded, table, "load verified");
    } else {
        warn!(
            rows_loaded = outcome.rows_loaded,
            rows_in_table = outcome.rows_in_table,
            table,
            "post-load count does not match rows loaded"
        );
    }

    Ok(outcome)
}

/// Read the cleaned delimited file fully into memory.
pub fn read_cleaned_csv(path: &Path) -> Result<Vec<BillingRecord>, EtlError> {
    let file = File::open(path)?;
    let mut reader = csv::Reader::from_reader(file);
    let mut rows = Vec::new();
    for result in reader.deserialize() {
        let record: BillingRecord = result?;
        rows.push(record);
    }
    Ok(rows)
}

async fn insert_batch(
    tx: &mut Transaction<'_, Postgres>,
    table: &str,
    batch: &[BillingRecord],
) -> Result<(), sqlx::Error> {
    if batch.is_empty() {
        return Ok(());
    }

    let mut builder = QueryBuilder::<Postgres>::new(format!(
        "INSERT INTO {table} ({}) ",
        BillingRecord::COLUMNS.join(", ")
    ));
    builder.push_values(batch, |mut b, r| {
        b.push_bind(&r.customer_id)
            .push_bind(&r.disco)
            .push_bind(r.year)
            .push_bind(r.month)
            .push_bind(&r.tariff_band)
            .push_bind(r.kwh)
            .push_bind(r.price_ngn_kwh)
            .push_bind(r.amount_billed_ngn)
            .push_bind(r.amount_paid_ngn)
            .push_bind(r.paid_on_time)
            .push_bind(r.arrears_ngn);
    });

    builder.build().execute(&mut **tx).await.map(|_| ())
}

fn drop_table_sql(table: &str) -> String {
    format!("DROP TABLE IF EXISTS {table}")
}

fn truncate_sql(table: &str) -> String {
    format!("TRUNCATE TABLE {table}")
}

fn count_sql(table: &str) -> String {
    format!("SELECT COUNT(*) FROM {table}")
}

fn create_table_sql(table: &str) -> String {
    format!(
        "CREATE TABLE {table} (\
         customer_id TEXT NOT NULL, \
         disco TEXT NOT NULL, \
         year INTEGER NOT NULL, \
         month INTEGER NOT NULL, \
         tariff_band TEXT NOT NULL, \
         kwh DOUBLE PRECISION NOT NULL, \
         price_ngn_kwh DOUBLE PRECISION NOT NULL, \
         amount_billed_ngn DOUBLE PRECISION NOT NULL, \
         amount_paid_ngn DOUBLE PRECISION NOT NULL, \
         paid_on_time BOOLEAN NOT NULL, \
         arrears_ngn DOUBLE PRECISION NOT NULL)"
    )
}
