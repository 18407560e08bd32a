pub mod config;
pub mod extract;
pub mod load;
pub mod observability;
pub mod pipeline;
pub mod transform;

pub use pipeline::{EtlError, RecordSet};
