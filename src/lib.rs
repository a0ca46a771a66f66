pub mod config;
pub mod error;
pub mod metrics;
pub mod proxy;
pub mod server;
