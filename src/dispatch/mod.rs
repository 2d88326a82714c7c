//! Fan-out/fan-in dispatch
//!
//! Issues a routed request to its target endpoints concurrently, merges the
//! responses, and shapes the partial-failure cases into in-band response
//! errors.

pub mod dispatcher;

pub use dispatcher::{Dispatcher, ALL_LIBRARIES_FAILED, NO_LIBRARY_SUPPORT};
