//! Resource type model
//!
//! The closed set of resource types served by library endpoints and the
//! fixed containment relation between them. Both are immutable process-wide
//! data; the predicates here are pure and drive request validation and
//! routing.

pub mod containment;
pub mod resource;

pub use containment::{contains, containers_of, contents_of, validate_contents};
pub use resource::{parse_type, ParseTypeError, ResourceType};
