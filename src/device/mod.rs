pub mod adapter;
pub mod codec;
pub mod connection;
pub mod constants;
pub mod machine;
pub mod session;
pub mod telemetry;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;
