//! Resource type enumeration
//!
//! The eight resource types a library endpoint may serve. The set is closed;
//! endpoints advertise a subset of it when they register.

use serde::{Deserialize, Serialize};

/// Kind of resource held by a library
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceType {
    /// A curated collection of pages
    Collection,
    /// A page within a collection
    Page,
    /// A still image
    Picture,
    /// A video clip
    Video,
    /// An audio clip
    Audio,
    /// A person entity
    Person,
    /// A geographic location entity
    Location,
    /// An organization entity
    Organization,
}

impl ResourceType {
    /// All resource types, in declaration order
    pub const ALL: [ResourceType; 8] = [
        ResourceType::Collection,
        ResourceType::Page,
        ResourceType::Picture,
        ResourceType::Video,
        ResourceType::Audio,
        ResourceType::Person,
        ResourceType::Location,
        ResourceType::Organization,
    ];

    /// Wire name of this type
    pub fn name(&self) -> &'static str {
        match self {
            ResourceType::Collection => "collection",
            ResourceType::Page => "page",
            ResourceType::Picture => "picture",
            ResourceType::Video => "video",
            ResourceType::Audio => "audio",
            ResourceType::Person => "person",
            ResourceType::Location => "location",
            ResourceType::Organization => "organization",
        }
    }
}

impl std::fmt::Display for ResourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Error for unknown resource type names
///
/// This is a call-site failure for programmers building requests from
/// strings; it is never sent over the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseTypeError(pub String);

impl std::fmt::Display for ParseTypeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Unknown resource type: '{}'", self.0)
    }
}

impl std::error::Error for ParseTypeError {}

impl std::str::FromStr for ResourceType {
    type Err = ParseTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "collection" => Ok(ResourceType::Collection),
            "page" => Ok(ResourceType::Page),
            "picture" => Ok(ResourceType::Picture),
            "video" => Ok(ResourceType::Video),
            "audio" => Ok(ResourceType::Audio),
            "person" => Ok(ResourceType::Person),
            "location" => Ok(ResourceType::Location),
            "organization" => Ok(ResourceType::Organization),
            _ => Err(ParseTypeError(s.to_string())),
        }
    }
}

/// Explicit string-to-type conversion
pub fn parse_type(s: &str) -> Result<ResourceType, ParseTypeError> {
    s.parse()
}
