//! Data store interface
//!
//! The capability set an endpoint's backing store implements. The service
//! loop delegates every request here and never interprets the results.
//!
//! Every transform hook defaults to an empty response with no error: that
//! is the wire contract for "supported type, unsupported operation", so a
//! store only overrides the operations it actually implements. Signalling
//! an *unsupported type* (empty results with `error` set) is the store's
//! responsibility inside the hooks it does implement.
//!
//! Methods are declared as `impl Future + Send` so the service loop can
//! spawn one handler task per request; implementors write plain
//! `async fn`s.

use std::future::Future;

use crate::protocol::{
    AccessIdentifier, DynamicTransformId, Resource, SearchRequest, SearchResponse,
    TransformRequest,
};
use crate::types::ResourceType;

/// Backing store behind an endpoint
pub trait DataStore: Send + Sync + 'static {
    /// Free-text search over the requested types
    fn run_search(
        &self,
        request: &SearchRequest,
    ) -> impl Future<Output = SearchResponse> + Send {
        let _ = request;
        async { SearchResponse::empty() }
    }

    /// Resources containing the subject
    fn run_container(
        &self,
        request: &TransformRequest,
    ) -> impl Future<Output = SearchResponse> + Send {
        let _ = request;
        async { SearchResponse::empty() }
    }

    /// Resources contained in the subject
    fn run_contents(
        &self,
        request: &TransformRequest,
    ) -> impl Future<Output = SearchResponse> + Send {
        let _ = request;
        async { SearchResponse::empty() }
    }

    /// Resources overlapping the subject; semantics are store-defined
    fn run_overlaps(
        &self,
        request: &TransformRequest,
    ) -> impl Future<Output = SearchResponse> + Send {
        let _ = request;
        async { SearchResponse::empty() }
    }

    /// Resources in which the subject occurs as object
    fn run_occur_as_obj(
        &self,
        request: &TransformRequest,
    ) -> impl Future<Output = SearchResponse> + Send {
        let _ = request;
        async { SearchResponse::empty() }
    }

    /// Resources in which the subject occurs as subject
    fn run_occur_as_subj(
        &self,
        request: &TransformRequest,
    ) -> impl Future<Output = SearchResponse> + Send {
        let _ = request;
        async { SearchResponse::empty() }
    }

    /// Object entities occurring within the subject
    fn run_occur_has_obj(
        &self,
        request: &TransformRequest,
    ) -> impl Future<Output = SearchResponse> + Send {
        let _ = request;
        async { SearchResponse::empty() }
    }

    /// Subject entities occurring within the subject
    fn run_occur_has_subj(
        &self,
        request: &TransformRequest,
    ) -> impl Future<Output = SearchResponse> + Send {
        let _ = request;
        async { SearchResponse::empty() }
    }

    /// Locations near the subject location
    fn run_nearby_locations(
        &self,
        request: &TransformRequest,
    ) -> impl Future<Output = SearchResponse> + Send {
        let _ = request;
        async { SearchResponse::empty() }
    }

    /// A store-defined named transform
    fn run_dynamic(
        &self,
        transform: &DynamicTransformId,
        request: &TransformRequest,
    ) -> impl Future<Output = SearchResponse> + Send {
        let _ = (transform, request);
        async { SearchResponse::empty() }
    }

    /// Typed lookup of a single resource
    ///
    /// Stores that cannot produce the record return a typed stub whose
    /// locator carries an error.
    fn lookup(
        &self,
        kind: ResourceType,
        id: &AccessIdentifier,
    ) -> impl Future<Output = Resource> + Send;
}
