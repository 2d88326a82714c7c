//! Wire protocol for the library service
//!
//! Every exchange between clients, the broker, and endpoints is a framed
//! [`Message`]. Frames carry a correlation id so that a response can be
//! paired with its request on a shared connection.

pub mod message;
pub mod wire;

pub use message::{
    AccessIdentifier, AudioRecord, CollectionRecord, ConnectAck, ConnectRequest,
    DynamicTransformId, LocationRecord, LookupRequest, LookupResponse, Message,
    OrganizationRecord, PageRecord, PersonRecord, PictureRecord, RequestParams, Resource,
    SearchRequest, SearchResponse, SearchResult, TransformKind, TransformRequest, VideoRecord,
};
pub use wire::{read_frame, write_frame, Frame, MAGIC, MAX_FRAME_LEN};

/// Logical name of the service
pub const SERVICE_NAME: &str = "library-service";
