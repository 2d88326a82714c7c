//! Registry error types

/// Error type for registry operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// Requested key is already held by an endpoint with a different
    /// hostname, port, or group
    KeyCollision(String),
    /// Resource id does not name a registered endpoint
    UnknownResource(String),
}

impl std::fmt::Display for RegistryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegistryError::KeyCollision(key) => {
                write!(f, "Key already in use by another endpoint: {}", key)
            }
            RegistryError::UnknownResource(id) => {
                write!(f, "No registered endpoint with key: {}", id)
            }
        }
    }
}

impl std::error::Error for RegistryError {}
