use serde::{Deserialize, Serialize};

/// One cleaned customer-billing-period observation.
///
/// Field declaration order is the canonical warehouse column order; the CSV
/// header and the INSERT column list are both derived from it. `arrears_ngn`
/// is carried through as reported by the source and never recomputed from
/// billed/paid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct BillingRecord {
    pub customer_id: String,
    pub disco: String,
    pub year: i32,
    pub month: i32,
    pub tariff_band: String,
    pub kwh: f64,
    pub price_ngn_kwh: f64,
    pub amount_billed_ngn: f64,
    pub amount_paid_ngn: f64,
    pub paid_on_time: bool,
    pub arrears_ngn: f64,
}

impl BillingRecord {
    /// Canonical column names, in warehouse order.
    pub const COLUMNS: [&'static str; 11] = [
        "customer_id",
        "disco",
        "year",
        "month",
        "tariff_band",
        "kwh",
        "price_ngn_kwh",
        "amount_billed_ngn",
        "amount_paid_ngn",
        "paid_on_time",
        "arrears_ngn",
    ];
}
