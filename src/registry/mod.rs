//! Endpoint registry
//!
//! The broker-side record of every connected endpoint: its key, replica
//! group, advertised address, and capabilities, plus the live handle used to
//! reach it. Mutation happens only on the connect path; routing and dispatch
//! read consistent snapshots through a `RwLock`.
//!
//! # Architecture
//!
//! ```text
//!                        Arc<EndpointRegistry>
//!                  ┌───────────────────────────────┐
//!                  │ endpoints: map<key, record>   │
//!                  │ groups:    map<group, [key]>  │
//!                  │ unions:    types, transforms  │
//!                  └───────────┬───────────────────┘
//!              connect() ──────┤────── read() snapshots
//!           (single writer)    │      (router, dispatcher)
//! ```

pub mod error;
pub mod key;
pub mod record;
pub mod store;

pub use error::RegistryError;
pub use key::{generate_group_id, generate_key, KEY_LEN};
pub use record::{EndpointCall, EndpointHandle, EndpointRecord};
pub use store::{EndpointRegistry, RegistryState};
