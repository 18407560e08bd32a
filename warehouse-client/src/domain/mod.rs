pub mod billing;

pub use billing::BillingRecord;
