pub mod billing_reports;
