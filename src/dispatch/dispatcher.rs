//! Request dispatcher
//!
//! One dispatch path for every target count: zero targets short-circuits to
//! the no-support response, one target forwards and returns the endpoint's
//! response as-is, two or more fan out concurrently and reduce by
//! concatenation. Per-endpoint timeouts count as failures; sub-failures are
//! never surfaced when any endpoint succeeded.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tokio::time;

use crate::error::{Error, ProtocolError, Result};
use crate::protocol::{LookupRequest, Message, Resource, SearchResponse};
use crate::registry::{EndpointHandle, EndpointRegistry};

/// Response error when no endpoint can answer a request
pub const NO_LIBRARY_SUPPORT: &str = "No library support for this operation or resource type";

/// Response error when every targeted endpoint failed
pub const ALL_LIBRARIES_FAILED: &str = "Error in responses from libraries";

/// Dispatches routed requests to endpoints and aggregates the replies
#[derive(Debug, Clone)]
pub struct Dispatcher {
    registry: Arc<EndpointRegistry>,
    call_timeout: Duration,
}

impl Dispatcher {
    /// Create a dispatcher over the given registry
    pub fn new(registry: Arc<EndpointRegistry>, call_timeout: Duration) -> Self {
        Self {
            registry,
            call_timeout,
        }
    }

    /// Dispatch a search or transform to its targets and merge the replies
    pub async fn dispatch(&self, request: Message, targets: Vec<String>) -> SearchResponse {
        match targets.len() {
            0 => SearchResponse::failed(NO_LIBRARY_SUPPORT),
            1 => self.dispatch_single(request, &targets[0]).await,
            _ => self.dispatch_fan_out(request, targets).await,
        }
    }

    async fn dispatch_single(&self, request: Message, target: &str) -> SearchResponse {
        match self.call_endpoint(request, target).await {
            Ok(response) => response,
            Err(e) => {
                tracing::debug!(target = %target, error = %e, "Endpoint call failed");
                SearchResponse::failed(ALL_LIBRARIES_FAILED)
            }
        }
    }

    async fn dispatch_fan_out(&self, request: Message, targets: Vec<String>) -> SearchResponse {
        let mut calls = JoinSet::new();
        for target in targets {
            let dispatcher = self.clone();
            let request = request.clone();
            calls.spawn(async move {
                let result = dispatcher.call_endpoint(request, &target).await;
                (target, result)
            });
        }

        let mut merged = Vec::new();
        let mut successes = 0usize;
        while let Some(joined) = calls.join_next().await {
            match joined {
                Ok((_, Ok(response))) => {
                    successes += 1;
                    merged.extend(response.results);
                }
                Ok((target, Err(e))) => {
                    tracing::debug!(target = %target, error = %e, "Endpoint call failed");
                }
                Err(e) => {
                    tracing::debug!(error = %e, "Endpoint call task aborted");
                }
            }
        }

        if successes == 0 {
            SearchResponse::failed(ALL_LIBRARIES_FAILED)
        } else {
            SearchResponse {
                results: merged,
                error: None,
            }
        }
    }

    /// Dispatch a typed lookup to the owning endpoint
    ///
    /// An unknown owner key produces the typed stub immediately, without any
    /// network call.
    pub async fn lookup(&self, request: LookupRequest) -> Resource {
        let key = request.id.resource_id.clone();
        let handle = match self.registry.handle(&key).await {
            Some(handle) => handle,
            None => {
                return Resource::stub(
                    request.kind,
                    request.id.with_error(format!(
                        "Received lookup with unrecognized resource ID: {}",
                        key
                    )),
                );
            }
        };

        let kind = request.kind;
        let id = request.id.clone();
        match self.call(handle, Message::Lookup(request)).await {
            Ok(Message::Resource(response)) => response.resource,
            Ok(other) => Resource::stub(
                kind,
                id.with_error(format!(
                    "Unexpected reply from library {}: {}",
                    key,
                    other.label()
                )),
            ),
            Err(e) => {
                tracing::debug!(target = %key, error = %e, "Lookup call failed");
                Resource::stub(
                    kind,
                    id.with_error(format!("Error in response from library: {}", key)),
                )
            }
        }
    }

    async fn call_endpoint(&self, request: Message, target: &str) -> Result<SearchResponse> {
        let handle = self
            .registry
            .handle(target)
            .await
            .ok_or(Error::Protocol(ProtocolError::ConnectionClosed))?;

        match self.call(handle, request).await? {
            Message::SearchResults(response) => Ok(response),
            other => Err(Error::Protocol(ProtocolError::UnexpectedMessage(format!(
                "expected search_results, got {}",
                other.label()
            )))),
        }
    }

    async fn call(&self, handle: EndpointHandle, request: Message) -> Result<Message> {
        match time::timeout(self.call_timeout, handle.call(request)).await {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout),
        }
    }
}
