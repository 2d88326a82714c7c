//! Message schema
//!
//! The structured records exchanged over the wire: registration, one search
//! request, nine transform kinds, typed lookups, and their responses.
//! Integers, strings, lists, and optional fields are the only value kinds.

use serde::{Deserialize, Serialize};

use crate::types::ResourceType;

/// Name of an endpoint-defined transform, qualified by its source type
///
/// Two ids are equal only when both fields match; the same name may be
/// overloaded across different source types.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DynamicTransformId {
    /// Transform name
    pub name: String,
    /// Resource type the transform starts from
    pub from_type: ResourceType,
}

impl DynamicTransformId {
    /// Create a new transform id
    pub fn new(name: impl Into<String>, from_type: ResourceType) -> Self {
        Self {
            name: name.into(),
            from_type,
        }
    }
}

impl std::fmt::Display for DynamicTransformId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.name, self.from_type)
    }
}

/// Locator for a single object within one endpoint
///
/// `resource_id` names the owning endpoint; `identifier` is opaque within
/// that endpoint. `error` is populated only on lookup-failure stubs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessIdentifier {
    /// Object identifier, opaque to the broker
    pub identifier: String,
    /// Key of the endpoint that owns the object
    pub resource_id: String,
    /// Failure description on lookup stubs
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AccessIdentifier {
    /// Create an identifier with no error
    pub fn new(identifier: impl Into<String>, resource_id: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            resource_id: resource_id.into(),
            error: None,
        }
    }

    /// Copy of this identifier carrying the given error
    pub fn with_error(&self, error: impl Into<String>) -> Self {
        Self {
            identifier: self.identifier.clone(),
            resource_id: self.resource_id.clone(),
            error: Some(error.into()),
        }
    }
}

/// Paging and language parameters carried by every request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestParams {
    /// Maximum number of results requested
    pub num_requested: u32,
    /// Offset of the first result
    pub start_at: u32,
    /// Preferred result language, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

impl RequestParams {
    /// Parameters requesting the first `num_requested` results
    pub fn first(num_requested: u32) -> Self {
        Self {
            num_requested,
            start_at: 0,
            language: None,
        }
    }
}

/// Registration request sent by an endpoint on startup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectRequest {
    /// Advertised hostname of the endpoint
    pub hostname: String,
    /// Advertised port of the endpoint
    pub port: u16,
    /// Replica group to join, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,
    /// Specific key to register under, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requested_key: Option<String>,
    /// Resource types this endpoint can answer for
    pub supported_types: Vec<ResourceType>,
    /// Endpoint-defined transforms this endpoint implements
    pub dynamic_transforms: Vec<DynamicTransformId>,
}

/// Broker reply to a [`ConnectRequest`]
///
/// On success `key` holds the canonical assigned key and `error` is absent.
/// On refusal `key` is empty and `error` describes the collision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectAck {
    /// Assigned endpoint key (empty on refusal)
    pub key: String,
    /// Refusal description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ConnectAck {
    /// Successful registration under `key`
    pub fn granted(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            error: None,
        }
    }

    /// Refused registration
    pub fn refused(error: impl Into<String>) -> Self {
        Self {
            key: String::new(),
            error: Some(error.into()),
        }
    }
}

/// Free-text search across endpoints supporting the requested types
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchRequest {
    /// Query text
    pub query: String,
    /// Paging parameters
    pub params: RequestParams,
    /// Resource types to search
    pub types: Vec<ResourceType>,
}

/// The nine transform kinds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "snake_case")]
pub enum TransformKind {
    /// Resources containing the subject
    Container,
    /// Resources contained in the subject
    Contents,
    /// Resources overlapping the subject (endpoint-defined)
    Overlaps,
    /// Resources in which the subject occurs as object
    OccurAsObj,
    /// Resources in which the subject occurs as subject
    OccurAsSubj,
    /// Object entities occurring within the subject
    OccurHasObj,
    /// Subject entities occurring within the subject
    OccurHasSubj,
    /// Locations near the subject location
    NearbyLocations,
    /// An endpoint-defined named transform
    Dynamic {
        /// The transform to run
        transform: DynamicTransformId,
    },
}

/// A transform request scoped to one resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransformRequest {
    /// Which transform to run
    pub kind: TransformKind,
    /// The subject resource
    pub id: AccessIdentifier,
    /// Source resource type, where the transform requires one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<ResourceType>,
    /// Target resource type, where the transform requires one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<ResourceType>,
    /// Paging parameters
    pub params: RequestParams,
}

/// Typed lookup of a single resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookupRequest {
    /// Expected resource type
    pub kind: ResourceType,
    /// The resource to fetch
    pub id: AccessIdentifier,
}

/// One entry in a search or transform response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    /// Locator for the matched resource
    pub id: AccessIdentifier,
    /// Type of the matched resource
    pub resource_type: ResourceType,
    /// Display title
    pub title: String,
    /// Matching text fragment, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
}

/// Response to searches and transforms
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResponse {
    /// Matched resources
    pub results: Vec<SearchResult>,
    /// Failure description; absent when any results could be produced
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SearchResponse {
    /// Empty response with no error
    pub fn empty() -> Self {
        Self::default()
    }

    /// Empty response carrying an error
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            results: Vec::new(),
            error: Some(error.into()),
        }
    }
}

/// Collection record
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionRecord {
    /// Locator
    pub id: AccessIdentifier,
    /// Collection title
    pub title: String,
    /// Free-text description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Page record
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRecord {
    /// Locator
    pub id: AccessIdentifier,
    /// Page title
    pub title: String,
    /// Page text
    pub text: String,
}

/// Picture record
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PictureRecord {
    /// Locator
    pub id: AccessIdentifier,
    /// Caption
    pub caption: String,
    /// Media URL
    pub url: String,
}

/// Video record
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoRecord {
    /// Locator
    pub id: AccessIdentifier,
    /// Caption
    pub caption: String,
    /// Media URL
    pub url: String,
    /// Duration in seconds
    pub duration_secs: u32,
}

/// Audio record
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioRecord {
    /// Locator
    pub id: AccessIdentifier,
    /// Caption
    pub caption: String,
    /// Media URL
    pub url: String,
    /// Duration in seconds
    pub duration_secs: u32,
}

/// Person record
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonRecord {
    /// Locator
    pub id: AccessIdentifier,
    /// Person name
    pub name: String,
    /// Free-text description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Location record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LocationRecord {
    /// Locator
    pub id: AccessIdentifier,
    /// Location name
    pub name: String,
    /// Latitude in degrees
    pub latitude: f64,
    /// Longitude in degrees
    pub longitude: f64,
}

/// Organization record
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganizationRecord {
    /// Locator
    pub id: AccessIdentifier,
    /// Organization name
    pub name: String,
    /// Free-text description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// A typed resource record, one variant per lookup kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Resource {
    /// Collection lookup result
    Collection(CollectionRecord),
    /// Page lookup result
    Page(PageRecord),
    /// Picture lookup result
    Picture(PictureRecord),
    /// Video lookup result
    Video(VideoRecord),
    /// Audio lookup result
    Audio(AudioRecord),
    /// Person lookup result
    Person(PersonRecord),
    /// Location lookup result
    Location(LocationRecord),
    /// Organization lookup result
    Organization(OrganizationRecord),
}

impl Resource {
    /// Resource type of this record
    pub fn kind(&self) -> ResourceType {
        match self {
            Resource::Collection(_) => ResourceType::Collection,
            Resource::Page(_) => ResourceType::Page,
            Resource::Picture(_) => ResourceType::Picture,
            Resource::Video(_) => ResourceType::Video,
            Resource::Audio(_) => ResourceType::Audio,
            Resource::Person(_) => ResourceType::Person,
            Resource::Location(_) => ResourceType::Location,
            Resource::Organization(_) => ResourceType::Organization,
        }
    }

    /// Locator of this record
    pub fn id(&self) -> &AccessIdentifier {
        match self {
            Resource::Collection(r) => &r.id,
            Resource::Page(r) => &r.id,
            Resource::Picture(r) => &r.id,
            Resource::Video(r) => &r.id,
            Resource::Audio(r) => &r.id,
            Resource::Person(r) => &r.id,
            Resource::Location(r) => &r.id,
            Resource::Organization(r) => &r.id,
        }
    }

    /// Typed stub of the given kind carrying only a locator
    ///
    /// Used for lookup failures: the locator's `error` field explains why
    /// no real record could be produced.
    pub fn stub(kind: ResourceType, id: AccessIdentifier) -> Self {
        match kind {
            ResourceType::Collection => Resource::Collection(CollectionRecord {
                id,
                ..Default::default()
            }),
            ResourceType::Page => Resource::Page(PageRecord {
                id,
                ..Default::default()
            }),
            ResourceType::Picture => Resource::Picture(PictureRecord {
                id,
                ..Default::default()
            }),
            ResourceType::Video => Resource::Video(VideoRecord {
                id,
                ..Default::default()
            }),
            ResourceType::Audio => Resource::Audio(AudioRecord {
                id,
                ..Default::default()
            }),
            ResourceType::Person => Resource::Person(PersonRecord {
                id,
                ..Default::default()
            }),
            ResourceType::Location => Resource::Location(LocationRecord {
                id,
                ..Default::default()
            }),
            ResourceType::Organization => Resource::Organization(OrganizationRecord {
                id,
                ..Default::default()
            }),
        }
    }
}

/// Response to a typed lookup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LookupResponse {
    /// The fetched record, or a stub whose locator carries an error
    pub resource: Resource,
}

/// Union of every message that crosses the wire
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Message {
    /// Endpoint registration
    Connect(ConnectRequest),
    /// Registration reply
    Connected(ConnectAck),
    /// Search request
    Search(SearchRequest),
    /// Transform request
    Transform(TransformRequest),
    /// Typed lookup request
    Lookup(LookupRequest),
    /// Search or transform response
    SearchResults(SearchResponse),
    /// Lookup response
    Resource(LookupResponse),
}

impl Message {
    /// Short label for logging
    pub fn label(&self) -> &'static str {
        match self {
            Message::Connect(_) => "connect",
            Message::Connected(_) => "connected",
            Message::Search(_) => "search",
            Message::Transform(_) => "transform",
            Message::Lookup(_) => "lookup",
            Message::SearchResults(_) => "search_results",
            Message::Resource(_) => "resource",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dynamic_transform_id_equality() {
        let a = DynamicTransformId::new("related", ResourceType::Person);
        let b = DynamicTransformId::new("related", ResourceType::Person);
        let c = DynamicTransformId::new("related", ResourceType::Page);
        let d = DynamicTransformId::new("recent", ResourceType::Person);

        assert_eq!(a, b);
        assert_ne!(a, c); // same name, different from_type
        assert_ne!(a, d);
    }

    #[test]
    fn test_stub_preserves_kind_and_id() {
        for kind in ResourceType::ALL {
            let id = AccessIdentifier::new("obj-1", "abcd1234").with_error("gone");
            let stub = Resource::stub(kind, id.clone());
            assert_eq!(stub.kind(), kind);
            assert_eq!(stub.id(), &id);
            assert_eq!(stub.id().error.as_deref(), Some("gone"));
        }
    }

    #[test]
    fn test_message_round_trip() {
        let msg = Message::Transform(TransformRequest {
            kind: TransformKind::Dynamic {
                transform: DynamicTransformId::new("related", ResourceType::Page),
            },
            id: AccessIdentifier::new("p-9", "k1k2k3k4"),
            from: Some(ResourceType::Page),
            to: None,
            params: RequestParams::first(10),
        });

        let json = serde_json::to_vec(&msg).unwrap();
        let back: Message = serde_json::from_slice(&json).unwrap();
        assert_eq!(back, msg);
    }

    #[test]
    fn test_connect_ack_shapes() {
        let ok = ConnectAck::granted("abcd1234");
        assert_eq!(ok.key, "abcd1234");
        assert!(ok.error.is_none());

        let refused = ConnectAck::refused("key in use");
        assert!(refused.key.is_empty());
        assert_eq!(refused.error.as_deref(), Some("key in use"));
    }

    #[test]
    fn test_lookup_response_round_trip() {
        let resource = Resource::Location(LocationRecord {
            id: AccessIdentifier::new("loc-3", "zzzz9999"),
            name: "Harbour archive".into(),
            latitude: 59.33,
            longitude: 18.06,
        });
        let msg = Message::Resource(LookupResponse { resource });
        let json = serde_json::to_string(&msg).unwrap();
        let back: Message = serde_json::from_str(&json).unwrap();
        assert_eq!(back, msg);
    }
}
