pub mod analysis;
pub mod config;
pub mod error;
pub mod handlers;
pub mod logging;
pub mod metrics;
pub mod payment;
pub mod pricing;
pub mod server;
pub mod signals;
pub mod store;
pub mod uploads;
