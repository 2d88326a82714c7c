//! Client-side session
//!
//! A thin helper for talking to a broker: one framed TCP session, typed
//! methods per request kind, and call-site validation of contents
//! transforms against the containment relation.

pub mod session;

pub use session::LibraryClient;
