//! Endpoint service loop
//!
//! Connects to the broker, registers, then serves forwarded requests by
//! delegating to the [`DataStore`]. Outgoing search results are stamped
//! with the endpoint's assigned key so clients can address follow-up
//! requests to the owning endpoint.

use std::sync::Arc;

use tokio::net::tcp::OwnedReadHalf;
use tokio::net::TcpStream;
use tokio::sync::mpsc;

use crate::error::{Error, ProtocolError, Result};
use crate::protocol::{
    read_frame, write_frame, ConnectAck, Frame, LookupRequest, LookupResponse, Message,
    Resource, SearchResponse, TransformKind, TransformRequest,
};

use super::config::EndpointConfig;
use super::datastore::DataStore;
use super::state::EndpointPhase;

/// Depth of the response write queue
const WRITE_QUEUE_DEPTH: usize = 64;

/// A library endpoint bound to its backing store
pub struct EndpointService<S: DataStore> {
    config: EndpointConfig,
    store: Arc<S>,
    phase: EndpointPhase,
    assigned_key: Option<String>,
}

impl<S: DataStore> EndpointService<S> {
    /// Create a service over the given store
    pub fn new(config: EndpointConfig, store: S) -> Self {
        Self {
            config,
            store: Arc::new(store),
            phase: EndpointPhase::Disconnected,
            assigned_key: None,
        }
    }

    /// Current lifecycle phase
    pub fn phase(&self) -> EndpointPhase {
        self.phase
    }

    /// Key assigned by the broker, once serving
    pub fn assigned_key(&self) -> Option<&str> {
        self.assigned_key.as_deref()
    }

    /// Connect to the broker, register, and serve until disconnected
    ///
    /// A refused registration is logged and returned as
    /// [`ProtocolError::Registration`]; the service never enters `Serving`.
    pub async fn run(&mut self) -> Result<()> {
        let socket = TcpStream::connect(self.config.broker_addr).await?;
        let (mut read_half, write_half) = socket.into_split();

        let (outbound_tx, outbound_rx) = mpsc::channel::<Frame>(WRITE_QUEUE_DEPTH);
        let writer = tokio::spawn(async move {
            let mut write_half = write_half;
            let mut rx = outbound_rx;
            while let Some(frame) = rx.recv().await {
                if let Err(e) = write_frame(&mut write_half, &frame).await {
                    tracing::debug!(error = %e, "Write to broker failed");
                    break;
                }
            }
        });

        self.phase = EndpointPhase::AwaitingAck;
        let connect = Frame::new(0, Message::Connect(self.config.connect_request()));
        outbound_tx
            .send(connect)
            .await
            .map_err(|_| Error::Protocol(ProtocolError::ConnectionClosed))?;

        let ack = self.await_ack(&mut read_half).await?;
        if let Some(error) = ack.error {
            tracing::error!(error = %error, broker = %self.config.broker_addr, "Registration refused");
            self.phase = EndpointPhase::Disconnected;
            writer.abort();
            return Err(Error::Protocol(ProtocolError::Registration(error)));
        }

        // The broker's ack carries the canonical key, overwriting any
        // requested one
        let key = ack.key;
        self.assigned_key = Some(key.clone());
        self.phase = EndpointPhase::Serving;
        tracing::info!(
            key = %key,
            broker = %self.config.broker_addr,
            "Endpoint serving"
        );

        let worker = RequestWorker {
            store: Arc::clone(&self.store),
            key,
        };

        let result = loop {
            match read_frame(&mut read_half).await {
                Ok(Some(frame)) => {
                    let worker = worker.clone();
                    let outbound_tx = outbound_tx.clone();
                    tokio::spawn(async move {
                        if let Some(body) = worker.handle(frame.body).await {
                            let _ = outbound_tx.send(Frame::new(frame.id, body)).await;
                        }
                    });
                }
                Ok(None) => break Ok(()),
                Err(e) => break Err(e),
            }
        };

        self.phase = EndpointPhase::Terminated;
        writer.abort();
        tracing::info!(broker = %self.config.broker_addr, "Broker connection closed");
        result
    }

    /// Read frames until the registration ack arrives
    async fn await_ack(&mut self, read_half: &mut OwnedReadHalf) -> Result<ConnectAck> {
        loop {
            let frame = read_frame(read_half)
                .await?
                .ok_or(Error::Protocol(ProtocolError::ConnectionClosed))?;
            match frame.body {
                Message::Connected(ack) => return Ok(ack),
                other => {
                    // Not registered yet; nothing else is actionable
                    tracing::warn!(
                        message = other.label(),
                        "Ignoring message before registration ack"
                    );
                }
            }
        }
    }
}

/// Per-request state shared with spawned handler tasks
struct RequestWorker<S> {
    store: Arc<S>,
    key: String,
}

impl<S> Clone for RequestWorker<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            key: self.key.clone(),
        }
    }
}

impl<S: DataStore> RequestWorker<S> {
    async fn handle(&self, body: Message) -> Option<Message> {
        match body {
            Message::Search(request) => {
                let response = self.store.run_search(&request).await;
                Some(Message::SearchResults(self.prepare_to_send(response)))
            }
            Message::Transform(request) => {
                let response = self.run_transform(&request).await;
                Some(Message::SearchResults(self.prepare_to_send(response)))
            }
            Message::Lookup(request) => Some(Message::Resource(LookupResponse {
                resource: self.run_lookup(request).await,
            })),
            other => {
                tracing::warn!(message = other.label(), "Ignoring unexpected message");
                None
            }
        }
    }

    async fn run_transform(&self, request: &TransformRequest) -> SearchResponse {
        match &request.kind {
            TransformKind::Container => self.store.run_container(request).await,
            TransformKind::Contents => self.store.run_contents(request).await,
            TransformKind::Overlaps => self.store.run_overlaps(request).await,
            TransformKind::OccurAsObj => self.store.run_occur_as_obj(request).await,
            TransformKind::OccurAsSubj => self.store.run_occur_as_subj(request).await,
            TransformKind::OccurHasObj => self.store.run_occur_has_obj(request).await,
            TransformKind::OccurHasSubj => self.store.run_occur_has_subj(request).await,
            TransformKind::NearbyLocations => self.store.run_nearby_locations(request).await,
            TransformKind::Dynamic { transform } => {
                self.store.run_dynamic(transform, request).await
            }
        }
    }

    async fn run_lookup(&self, request: LookupRequest) -> Resource {
        if request.id.resource_id != self.key {
            return Resource::stub(
                request.kind,
                request.id.with_error(format!(
                    "Received lookup with mismatched resource ID: {} vs {}",
                    request.id.resource_id, self.key
                )),
            );
        }
        self.store.lookup(request.kind, &request.id).await
    }

    /// Stamp every outgoing result with this endpoint's assigned key
    fn prepare_to_send(&self, mut response: SearchResponse) -> SearchResponse {
        for result in &mut response.results {
            result.id.resource_id = self.key.clone();
        }
        response
    }
}
