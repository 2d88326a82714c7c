//! Broker-side connection handler
//!
//! One task per accepted socket. The same connection shape serves both
//! peers: a client sends requests and reads responses; an endpoint sends a
//! registration, then reads forwarded requests and writes responses back.
//! Outbound calls to an endpoint travel through the connection's
//! [`EndpointHandle`] channel and are paired with reply frames by
//! correlation id.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};

use crate::dispatch::Dispatcher;
use crate::protocol::{
    read_frame, write_frame, ConnectAck, Frame, LookupResponse, Message,
};
use crate::registry::{EndpointCall, EndpointHandle, EndpointRegistry, RegistryError};
use crate::router::route;
use crate::stats::SessionStats;

/// Depth of the outbound frame queue
const WRITE_QUEUE_DEPTH: usize = 64;

/// Handler for one accepted connection
pub(crate) struct Connection {
    session_id: u64,
    peer_addr: SocketAddr,
    registry: Arc<EndpointRegistry>,
    dispatcher: Arc<Dispatcher>,
    stats: SessionStats,
}

impl Connection {
    pub(crate) fn new(
        session_id: u64,
        peer_addr: SocketAddr,
        registry: Arc<EndpointRegistry>,
        dispatcher: Arc<Dispatcher>,
    ) -> Self {
        Self {
            session_id,
            peer_addr,
            registry,
            dispatcher,
            stats: SessionStats::new(),
        }
    }

    /// Serve the connection until the peer disconnects
    pub(crate) async fn run(mut self, socket: TcpStream) {
        let (read_half, write_half) = socket.into_split();

        // Writer task: single owner of the write half
        let (outbound_tx, outbound_rx) = mpsc::channel::<Frame>(WRITE_QUEUE_DEPTH);
        let writer = tokio::spawn(write_loop(write_half, outbound_rx));

        // Reader task: frames are forwarded over a channel so the main loop
        // can select between inbound frames and outbound endpoint calls
        let (inbound_tx, mut inbound_rx) = mpsc::channel::<Frame>(WRITE_QUEUE_DEPTH);
        let session_id = self.session_id;
        let reader = tokio::spawn(async move {
            let mut read_half = read_half;
            loop {
                match read_frame(&mut read_half).await {
                    Ok(Some(frame)) => {
                        if inbound_tx.send(frame).await.is_err() {
                            break;
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        tracing::debug!(session_id = session_id, error = %e, "Read failed");
                        break;
                    }
                }
            }
        });

        // This connection's live handle; registered only if the peer
        // identifies itself as an endpoint with a Connect message
        let (handle, mut calls_rx) = EndpointHandle::channel();

        // Replies owed to outbound calls, keyed by frame id
        let mut pending: HashMap<u64, oneshot::Sender<Message>> = HashMap::new();
        let mut next_call_id: u64 = 1;

        loop {
            tokio::select! {
                frame = inbound_rx.recv() => {
                    let Some(frame) = frame else { break };
                    self.stats.frames_received += 1;
                    self.handle_frame(frame, &handle, &mut pending, &outbound_tx).await;
                }
                call = calls_rx.recv() => {
                    // The handle channel never closes while the registry
                    // holds a clone, so None cannot occur before the loop
                    // exits through the reader side
                    let Some(EndpointCall { request, reply }) = call else { break };
                    let id = next_call_id;
                    next_call_id += 1;
                    pending.insert(id, reply);
                    self.stats.calls_relayed += 1;
                    if outbound_tx.send(Frame::new(id, request)).await.is_err() {
                        break;
                    }
                }
            }
        }

        // Dropping the pending map cancels outstanding calls; their reply
        // oneshots error out and the dispatcher records failures
        drop(pending);
        reader.abort();
        writer.abort();

        tracing::debug!(
            session_id = self.session_id,
            peer = %self.peer_addr,
            frames_received = self.stats.frames_received,
            requests = self.stats.requests,
            calls_relayed = self.stats.calls_relayed,
            "Connection closed"
        );
    }

    async fn handle_frame(
        &mut self,
        frame: Frame,
        handle: &EndpointHandle,
        pending: &mut HashMap<u64, oneshot::Sender<Message>>,
        outbound_tx: &mpsc::Sender<Frame>,
    ) {
        let Frame { id, body } = frame;
        match body {
            Message::Connect(req) => {
                let ack = match self.registry.connect(req, handle.clone()).await {
                    Ok(key) => ConnectAck::granted(key),
                    Err(RegistryError::KeyCollision(key)) => {
                        tracing::warn!(
                            session_id = self.session_id,
                            key = %key,
                            "Registration refused"
                        );
                        ConnectAck::refused(format!(
                            "Requested key is already in use: {}",
                            key
                        ))
                    }
                    Err(e) => ConnectAck::refused(e.to_string()),
                };
                let _ = outbound_tx.send(Frame::new(id, Message::Connected(ack))).await;
            }

            request @ (Message::Search(_) | Message::Transform(_)) => {
                self.stats.requests += 1;
                let registry = Arc::clone(&self.registry);
                let dispatcher = Arc::clone(&self.dispatcher);
                let outbound_tx = outbound_tx.clone();
                tokio::spawn(async move {
                    let targets = {
                        let state = registry.read().await;
                        route(&request, &state)
                    };
                    let response = dispatcher.dispatch(request, targets).await;
                    // The peer may have gone away; a failed send is the
                    // best-effort cancellation path
                    let _ = outbound_tx
                        .send(Frame::new(id, Message::SearchResults(response)))
                        .await;
                });
            }

            Message::Lookup(request) => {
                self.stats.requests += 1;
                let dispatcher = Arc::clone(&self.dispatcher);
                let outbound_tx = outbound_tx.clone();
                tokio::spawn(async move {
                    let resource = dispatcher.lookup(request).await;
                    let _ = outbound_tx
                        .send(Frame::new(id, Message::Resource(LookupResponse { resource })))
                        .await;
                });
            }

            response @ (Message::SearchResults(_) | Message::Resource(_)) => {
                match pending.remove(&id) {
                    Some(reply) => {
                        let _ = reply.send(response);
                    }
                    None => {
                        // Late reply after timeout or cancellation
                        tracing::trace!(
                            session_id = self.session_id,
                            frame_id = id,
                            "Discarding unmatched reply"
                        );
                    }
                }
            }

            other => {
                tracing::warn!(
                    session_id = self.session_id,
                    message = other.label(),
                    "Ignoring unexpected message"
                );
            }
        }
    }
}

async fn write_loop(mut write_half: OwnedWriteHalf, mut rx: mpsc::Receiver<Frame>) {
    while let Some(frame) = rx.recv().await {
        if let Err(e) = write_frame(&mut write_half, &frame).await {
            tracing::debug!(error = %e, "Write failed");
            break;
        }
    }
}
