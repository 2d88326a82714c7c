//! Endpoint-side protocol handler
//!
//! Everything a library endpoint process needs: the registration state
//! machine, the configuration it advertises, the [`DataStore`] interface a
//! backing store implements, and the service loop that bridges the two.

pub mod config;
pub mod datastore;
pub mod service;
pub mod state;

pub use config::{EndpointConfig, DEFAULT_ENDPOINT_PORT};
pub use datastore::DataStore;
pub use service::EndpointService;
pub use state::EndpointPhase;
