pub mod aggregate;
pub(crate) mod asof;
pub mod build;
pub mod error;
pub mod targets;
