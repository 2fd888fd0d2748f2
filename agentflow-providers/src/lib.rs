//! ABOUTME: Oracle provider configuration and resilience wrapper
//! ABOUTME: The oracle's own reasoning internals are a black box; this crate only configures the boundary around it

pub mod config;
pub mod retry;

pub use config::OracleProviderConfig;
pub use retry::RetryingOracle;
