//! Facade exposed to producers (emit) and consumers (watch/stop).
mod rest_client;
pub use rest_client::*;

#[cfg(test)]
mod rest_client_test;
