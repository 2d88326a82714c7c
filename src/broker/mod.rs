//! Broker server ("the Librarian")
//!
//! Accepts client and endpoint connections on one port, registers
//! endpoints, and serves client requests through the router and dispatcher.

pub mod config;
pub mod connection;
pub mod listener;

pub use config::{BrokerConfig, DEFAULT_BROKER_PORT};
pub use listener::Librarian;
