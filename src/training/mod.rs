pub mod dataset;
pub mod error;
pub mod forest;
pub mod metrics;
pub mod trainer;
