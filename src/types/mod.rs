pub mod aqi;
pub mod frames;
pub mod horizon;
pub mod location;
pub mod schema;
