pub mod error;
pub mod open_meteo;

#[cfg(test)]
pub(crate) mod test_server;
