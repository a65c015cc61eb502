pub mod error;
pub mod feature_store;
pub mod model_registry;
pub mod tiered;
