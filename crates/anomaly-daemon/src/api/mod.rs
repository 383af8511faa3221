//! API layer for anomaly-daemon

pub mod rest;

pub use rest::router::create_router;
