//! Endpoint records and live handles
//!
//! A record is created for every successful registration. The handle inside
//! it is the only way the broker reaches the endpoint: calls travel through
//! an mpsc channel to the task that owns the endpoint's socket, and each
//! call carries a oneshot for its reply.

use std::collections::HashSet;

use tokio::sync::{mpsc, oneshot};

use crate::error::{Error, ProtocolError, Result};
use crate::protocol::{ConnectRequest, DynamicTransformId, Message};
use crate::types::ResourceType;

/// Depth of the per-endpoint call queue
const CALL_QUEUE_DEPTH: usize = 64;

/// One outbound call to an endpoint
#[derive(Debug)]
pub struct EndpointCall {
    /// The request to forward
    pub request: Message,
    /// Completion channel for the endpoint's reply
    pub reply: oneshot::Sender<Message>,
}

/// Live handle to a connected endpoint
///
/// Cheap to clone; all clones feed the same connection task. A dead
/// connection surfaces as [`ProtocolError::ConnectionClosed`] on `call`.
#[derive(Debug, Clone)]
pub struct EndpointHandle {
    calls: mpsc::Sender<EndpointCall>,
}

impl EndpointHandle {
    /// Create a handle and the receiver its connection task serves
    pub fn channel() -> (Self, mpsc::Receiver<EndpointCall>) {
        let (tx, rx) = mpsc::channel(CALL_QUEUE_DEPTH);
        (Self { calls: tx }, rx)
    }

    /// Forward a request and await the endpoint's reply
    pub async fn call(&self, request: Message) -> Result<Message> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.calls
            .send(EndpointCall {
                request,
                reply: reply_tx,
            })
            .await
            .map_err(|_| Error::Protocol(ProtocolError::ConnectionClosed))?;

        reply_rx
            .await
            .map_err(|_| Error::Protocol(ProtocolError::ConnectionClosed))
    }
}

/// Broker-side record of one registered endpoint
///
/// Lifecycle: created on successful connect, refreshed on idempotent
/// reconnect. There is no removal path; a vanished endpoint shows up as
/// per-call failures through its stale handle.
#[derive(Debug, Clone)]
pub struct EndpointRecord {
    /// Assigned key
    pub key: String,
    /// Replica group this endpoint belongs to
    pub group_id: String,
    /// Advertised hostname
    pub hostname: String,
    /// Advertised port
    pub port: u16,
    /// Resource types this endpoint can answer for
    pub supported_types: HashSet<ResourceType>,
    /// Endpoint-defined transforms this endpoint implements
    pub dynamic_transforms: HashSet<DynamicTransformId>,
    /// Live handle for dispatch
    pub handle: EndpointHandle,
}

impl EndpointRecord {
    /// True when this endpoint supports the given type
    pub fn supports(&self, ty: ResourceType) -> bool {
        self.supported_types.contains(&ty)
    }

    /// True when this endpoint implements the given dynamic transform
    pub fn supports_dynamic(&self, transform: &DynamicTransformId) -> bool {
        self.dynamic_transforms.contains(transform)
    }

    /// True when a connect request names the same endpoint identity
    ///
    /// Identity is the advertised `(hostname, port, group)` triple; a match
    /// makes a requested-key reuse an idempotent reconnect instead of a
    /// collision.
    pub fn same_identity(&self, req: &ConnectRequest) -> bool {
        self.hostname == req.hostname
            && self.port == req.port
            && req.group_id.as_deref() == Some(self.group_id.as_str())
    }
}
