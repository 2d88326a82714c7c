//! Broker session
//!
//! Each method is one round trip: the request is framed with a fresh
//! correlation id and the matching response frame is awaited. Responses to
//! other ids are not expected on a client session and are discarded.

use std::net::SocketAddr;

use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;

use crate::error::{Error, ProtocolError, Result};
use crate::protocol::{
    read_frame, write_frame, AccessIdentifier, DynamicTransformId, Frame, LookupRequest, Message,
    RequestParams, Resource, SearchRequest, SearchResponse, TransformKind, TransformRequest,
};
use crate::types::{validate_contents, ResourceType};

/// Client session with a broker
pub struct LibraryClient {
    reader: OwnedReadHalf,
    writer: OwnedWriteHalf,
    next_id: u64,
}

impl LibraryClient {
    /// Open a session with the broker at `addr`
    pub async fn connect(addr: SocketAddr) -> Result<Self> {
        let socket = TcpStream::connect(addr).await?;
        socket.set_nodelay(true)?;
        let (reader, writer) = socket.into_split();
        tracing::debug!(broker = %addr, "Client session opened");
        Ok(Self {
            reader,
            writer,
            next_id: 1,
        })
    }

    /// Search endpoints supporting any of `types`
    pub async fn search(
        &mut self,
        query: impl Into<String>,
        types: Vec<ResourceType>,
        params: RequestParams,
    ) -> Result<SearchResponse> {
        self.request_results(Message::Search(SearchRequest {
            query: query.into(),
            params,
            types,
        }))
        .await
    }

    /// Resources containing `id`
    pub async fn container(
        &mut self,
        from: ResourceType,
        id: AccessIdentifier,
        params: RequestParams,
    ) -> Result<SearchResponse> {
        self.transform(TransformKind::Container, id, Some(from), None, params)
            .await
    }

    /// Resources of type `to` contained in `id`
    ///
    /// Rejected locally when the containment relation does not admit `to`
    /// inside `from`.
    pub async fn contents(
        &mut self,
        from: ResourceType,
        to: ResourceType,
        id: AccessIdentifier,
        params: RequestParams,
    ) -> Result<SearchResponse> {
        if !validate_contents(from, to) {
            return Err(Error::InvalidRequest(format!(
                "Resources of type {} cannot contain type {}",
                from, to
            )));
        }
        self.transform(TransformKind::Contents, id, Some(from), Some(to), params)
            .await
    }

    /// Resources overlapping `id`
    pub async fn overlaps(
        &mut self,
        from: ResourceType,
        id: AccessIdentifier,
        params: RequestParams,
    ) -> Result<SearchResponse> {
        self.transform(TransformKind::Overlaps, id, Some(from), None, params)
            .await
    }

    /// Resources in which `id` occurs as object
    pub async fn occur_as_obj(
        &mut self,
        from: ResourceType,
        id: AccessIdentifier,
        params: RequestParams,
    ) -> Result<SearchResponse> {
        self.transform(TransformKind::OccurAsObj, id, Some(from), None, params)
            .await
    }

    /// Resources in which `id` occurs as subject
    pub async fn occur_as_subj(
        &mut self,
        from: ResourceType,
        id: AccessIdentifier,
        params: RequestParams,
    ) -> Result<SearchResponse> {
        self.transform(TransformKind::OccurAsSubj, id, Some(from), None, params)
            .await
    }

    /// Object entities occurring within `id`
    pub async fn occur_has_obj(
        &mut self,
        from: ResourceType,
        id: AccessIdentifier,
        params: RequestParams,
    ) -> Result<SearchResponse> {
        self.transform(TransformKind::OccurHasObj, id, Some(from), None, params)
            .await
    }

    /// Subject entities occurring within `id`
    pub async fn occur_has_subj(
        &mut self,
        from: ResourceType,
        id: AccessIdentifier,
        params: RequestParams,
    ) -> Result<SearchResponse> {
        self.transform(TransformKind::OccurHasSubj, id, Some(from), None, params)
            .await
    }

    /// Locations near the location `id`
    pub async fn nearby_locations(
        &mut self,
        id: AccessIdentifier,
        params: RequestParams,
    ) -> Result<SearchResponse> {
        self.transform(TransformKind::NearbyLocations, id, None, None, params)
            .await
    }

    /// Run an endpoint-defined transform on `id`
    pub async fn dynamic(
        &mut self,
        transform: DynamicTransformId,
        id: AccessIdentifier,
        params: RequestParams,
    ) -> Result<SearchResponse> {
        let from = transform.from_type;
        self.transform(
            TransformKind::Dynamic { transform },
            id,
            Some(from),
            None,
            params,
        )
        .await
    }

    /// Fetch a single resource of the given kind
    pub async fn lookup(
        &mut self,
        kind: ResourceType,
        id: AccessIdentifier,
    ) -> Result<Resource> {
        let reply = self.call(Message::Lookup(LookupRequest { kind, id })).await?;
        match reply {
            Message::Resource(response) => Ok(response.resource),
            other => Err(Error::Protocol(ProtocolError::UnexpectedMessage(format!(
                "expected resource, got {}",
                other.label()
            )))),
        }
    }

    async fn transform(
        &mut self,
        kind: TransformKind,
        id: AccessIdentifier,
        from: Option<ResourceType>,
        to: Option<ResourceType>,
        params: RequestParams,
    ) -> Result<SearchResponse> {
        self.request_results(Message::Transform(TransformRequest {
            kind,
            id,
            from,
            to,
            params,
        }))
        .await
    }

    async fn request_results(&mut self, request: Message) -> Result<SearchResponse> {
        match self.call(request).await? {
            Message::SearchResults(response) => Ok(response),
            other => Err(Error::Protocol(ProtocolError::UnexpectedMessage(format!(
                "expected search_results, got {}",
                other.label()
            )))),
        }
    }

    async fn call(&mut self, request: Message) -> Result<Message> {
        let id = self.next_id;
        self.next_id += 1;

        write_frame(&mut self.writer, &Frame::new(id, request)).await?;
        loop {
            let frame = read_frame(&mut self.reader)
                .await?
                .ok_or(Error::Protocol(ProtocolError::ConnectionClosed))?;
            if frame.id == id {
                return Ok(frame.body);
            }
            tracing::trace!(frame_id = frame.id, "Discarding frame for another call");
        }
    }
}
