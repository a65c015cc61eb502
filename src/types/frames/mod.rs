pub mod feature_frame;
pub mod pollutant_frame;
pub mod weather_frame;
