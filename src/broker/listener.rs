//! Broker listener
//!
//! Handles the TCP accept loop and spawns connection handlers.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;

use crate::dispatch::Dispatcher;
use crate::error::Result;
use crate::registry::EndpointRegistry;

use super::config::BrokerConfig;
use super::connection::Connection;

/// The broker process
pub struct Librarian {
    config: BrokerConfig,
    registry: Arc<EndpointRegistry>,
    dispatcher: Arc<Dispatcher>,
    next_session_id: AtomicU64,
    connection_semaphore: Option<Arc<Semaphore>>,
}

impl Librarian {
    /// Create a broker with the given configuration
    pub fn new(config: BrokerConfig) -> Self {
        let registry = Arc::new(EndpointRegistry::new());
        let dispatcher = Arc::new(Dispatcher::new(Arc::clone(&registry), config.call_timeout));
        let connection_semaphore = if config.max_connections > 0 {
            Some(Arc::new(Semaphore::new(config.max_connections)))
        } else {
            None
        };

        Self {
            config,
            registry,
            dispatcher,
            next_session_id: AtomicU64::new(1),
            connection_semaphore,
        }
    }

    /// Get a reference to the endpoint registry
    pub fn registry(&self) -> &Arc<EndpointRegistry> {
        &self.registry
    }

    /// Get the configured bind address
    pub fn bind_addr(&self) -> SocketAddr {
        self.config.bind_addr
    }

    /// Run the broker
    ///
    /// This method blocks until the broker is shut down.
    pub async fn run(&self) -> Result<()> {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        tracing::info!(addr = %self.config.bind_addr, "Librarian listening");
        self.serve(listener).await
    }

    /// Run the broker with graceful shutdown
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: std::future::Future<Output = ()>,
    {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        tracing::info!(addr = %self.config.bind_addr, "Librarian listening");

        tokio::select! {
            _ = shutdown => {
                tracing::info!("Shutdown signal received");
                Ok(())
            }
            result = self.serve(listener) => result,
        }
    }

    /// Serve connections from a pre-bound listener
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        loop {
            match listener.accept().await {
                Ok((socket, peer_addr)) => {
                    self.handle_connection(socket, peer_addr).await;
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to accept connection");
                }
            }
        }
    }

    async fn handle_connection(&self, socket: TcpStream, peer_addr: SocketAddr) {
        let _permit = if let Some(ref sem) = self.connection_semaphore {
            match sem.clone().try_acquire_owned() {
                Ok(permit) => Some(permit),
                Err(_) => {
                    tracing::warn!(peer = %peer_addr, "Connection rejected: limit reached");
                    return;
                }
            }
        } else {
            None
        };

        let session_id = self.next_session_id.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(session_id = session_id, peer = %peer_addr, "New connection");

        if self.config.tcp_nodelay {
            if let Err(e) = socket.set_nodelay(true) {
                tracing::debug!(error = %e, "Failed to set TCP_NODELAY");
            }
        }

        let connection = Connection::new(
            session_id,
            peer_addr,
            Arc::clone(&self.registry),
            Arc::clone(&self.dispatcher),
        );

        tokio::spawn(async move {
            let _permit = _permit;
            connection.run(socket).await;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::LibraryClient;
    use crate::endpoint::{EndpointConfig, EndpointService};
    use crate::error::Error;
    use crate::protocol::{AccessIdentifier, RequestParams, Resource};
    use crate::registry::KEY_LEN;
    use crate::store::MemoryStore;
    use crate::types::ResourceType;
    use std::time::Duration;

    /// Bind a broker on an ephemeral port and serve it in the background
    async fn spawn_broker() -> (Arc<Librarian>, SocketAddr) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let config = BrokerConfig::with_addr(addr).call_timeout(Duration::from_secs(2));
        let librarian = Arc::new(Librarian::new(config));

        let serving = Arc::clone(&librarian);
        tokio::spawn(async move {
            let _ = serving.serve(listener).await;
        });
        (librarian, addr)
    }

    #[tokio::test]
    async fn test_single_endpoint_search_by_type() {
        let (librarian, addr) = spawn_broker().await;

        let store = MemoryStore::sample_catalogue();
        let config = EndpointConfig::default()
            .broker(addr)
            .supported_types(store.supported_types())
            .dynamic_transforms(store.dynamic_transforms());
        tokio::spawn(async move {
            let _ = EndpointService::new(config, store).run().await;
        });
        let key = wait_for_endpoints(&librarian, 1).await.remove(0);
        assert_eq!(key.len(), KEY_LEN);

        let mut client = LibraryClient::connect(addr).await.unwrap();
        let response = client
            .search("harbour", vec![ResourceType::Page], RequestParams::first(10))
            .await
            .unwrap();

        assert!(response.error.is_none());
        assert!(!response.results.is_empty());
        for result in &response.results {
            assert_eq!(result.id.resource_id, key);
        }
    }

    #[tokio::test]
    async fn test_fan_out_merges_group_responses() {
        let (librarian, addr) = spawn_broker().await;

        for _ in 0..2 {
            let store = MemoryStore::sample_catalogue();
            let config = EndpointConfig::default()
                .broker(addr)
                .group("g")
                .supported_types(store.supported_types())
                .dynamic_transforms(store.dynamic_transforms());
            tokio::spawn(async move {
                let _ = EndpointService::new(config, store).run().await;
            });
        }
        let keys = wait_for_endpoints(&librarian, 2).await;

        let mut client = LibraryClient::connect(addr).await.unwrap();
        let response = client
            .search("harbour", vec![ResourceType::Page], RequestParams::first(10))
            .await
            .unwrap();

        assert!(response.error.is_none());
        // Both replicas answer; the dispatcher introduces no duplicates of
        // its own, so each replica's hit appears exactly once per replica
        let per_endpoint = response
            .results
            .iter()
            .filter(|r| r.id.resource_id == keys[0])
            .count();
        assert_eq!(response.results.len(), per_endpoint * 2);
    }

    #[tokio::test]
    async fn test_unsupported_type_returns_no_support_without_calls() {
        let (librarian, addr) = spawn_broker().await;

        let store = MemoryStore::new([ResourceType::Page]);
        let config = EndpointConfig::default()
            .broker(addr)
            .supported_types(store.supported_types());
        tokio::spawn(async move {
            let _ = EndpointService::new(config, store).run().await;
        });
        wait_for_endpoints(&librarian, 1).await;

        let mut client = LibraryClient::connect(addr).await.unwrap();
        let response = client
            .search("x", vec![ResourceType::Audio], RequestParams::first(10))
            .await
            .unwrap();

        assert!(response.results.is_empty());
        assert_eq!(
            response.error.as_deref(),
            Some(crate::dispatch::NO_LIBRARY_SUPPORT)
        );
    }

    #[tokio::test]
    async fn test_transforms_stay_inside_owning_group() {
        let (librarian, addr) = spawn_broker().await;

        for group in ["g", "h"] {
            let store = MemoryStore::sample_catalogue();
            let config = EndpointConfig::default()
                .broker(addr)
                .group(group)
                .supported_types(store.supported_types())
                .dynamic_transforms(store.dynamic_transforms());
            tokio::spawn(async move {
                let _ = EndpointService::new(config, store).run().await;
            });
        }
        let keys = wait_for_endpoints(&librarian, 2).await;
        let owner = keys[0].clone();

        let mut client = LibraryClient::connect(addr).await.unwrap();
        let response = client
            .occur_as_obj(
                ResourceType::Person,
                AccessIdentifier::new("per-lindgren", owner.clone()),
                RequestParams::first(10),
            )
            .await
            .unwrap();

        assert!(response.error.is_none());
        // Every result was produced by the owning group's single member
        for result in &response.results {
            assert_eq!(result.id.resource_id, owner);
        }
        assert!(!response.results.is_empty());
    }

    #[tokio::test]
    async fn test_key_collision_refused_and_registry_unchanged() {
        let (librarian, addr) = spawn_broker().await;

        let store = MemoryStore::new([ResourceType::Page]);
        let config = EndpointConfig::default()
            .broker(addr)
            .advertise("host-a", 7001)
            .requested_key("abc12345")
            .supported_types(store.supported_types());
        tokio::spawn(async move {
            let _ = EndpointService::new(config, store).run().await;
        });
        wait_for_endpoints(&librarian, 1).await;

        // Second endpoint claims the same key from a different host
        let store = MemoryStore::new([ResourceType::Page]);
        let config = EndpointConfig::default()
            .broker(addr)
            .advertise("host-b", 7002)
            .requested_key("abc12345")
            .supported_types(store.supported_types());
        let mut service = EndpointService::new(config, store);
        let err = service.run().await.unwrap_err();
        assert!(matches!(
            err,
            Error::Protocol(crate::error::ProtocolError::Registration(_))
        ));

        let state = librarian.registry().read().await;
        assert_eq!(state.endpoint_count(), 1);
        assert_eq!(state.endpoint("abc12345").unwrap().hostname, "host-a");
    }

    #[tokio::test]
    async fn test_lookup_unknown_resource_id_is_stubbed() {
        let (_librarian, addr) = spawn_broker().await;

        let mut client = LibraryClient::connect(addr).await.unwrap();
        let resource = client
            .lookup(
                ResourceType::Page,
                AccessIdentifier::new("i", "ZZZZ"),
            )
            .await
            .unwrap();

        assert_eq!(resource.kind(), ResourceType::Page);
        assert_eq!(resource.id().identifier, "i");
        assert_eq!(resource.id().resource_id, "ZZZZ");
        assert_eq!(
            resource.id().error.as_deref(),
            Some("Received lookup with unrecognized resource ID: ZZZZ")
        );
    }

    #[tokio::test]
    async fn test_lookup_round_trip() {
        let (librarian, addr) = spawn_broker().await;

        let store = MemoryStore::sample_catalogue();
        let config = EndpointConfig::default()
            .broker(addr)
            .supported_types(store.supported_types());
        tokio::spawn(async move {
            let _ = EndpointService::new(config, store).run().await;
        });
        let key = wait_for_endpoints(&librarian, 1).await.remove(0);

        let mut client = LibraryClient::connect(addr).await.unwrap();
        let resource = client
            .lookup(
                ResourceType::Page,
                AccessIdentifier::new("page-harbour", key.clone()),
            )
            .await
            .unwrap();

        let Resource::Page(page) = resource else {
            panic!("expected a page record");
        };
        assert!(page.id.error.is_none());
        assert_eq!(page.id.resource_id, key);
        assert_eq!(page.title, "The Old Harbour");
    }

    #[tokio::test]
    async fn test_dynamic_transform_end_to_end() {
        let (librarian, addr) = spawn_broker().await;

        let store = MemoryStore::sample_catalogue();
        let config = EndpointConfig::default()
            .broker(addr)
            .supported_types(store.supported_types())
            .dynamic_transforms(store.dynamic_transforms());
        tokio::spawn(async move {
            let _ = EndpointService::new(config, store).run().await;
        });
        let key = wait_for_endpoints(&librarian, 1).await.remove(0);

        let mut client = LibraryClient::connect(addr).await.unwrap();
        let response = client
            .dynamic(
                crate::protocol::DynamicTransformId::new("related", ResourceType::Page),
                AccessIdentifier::new("page-harbour", key),
                RequestParams::first(10),
            )
            .await
            .unwrap();

        assert!(response.error.is_none());
        assert_eq!(response.results.len(), 1);
        assert_eq!(response.results[0].title, "Shipyard Workers");
    }

    #[tokio::test]
    async fn test_client_rejects_invalid_contents_locally() {
        let (_librarian, addr) = spawn_broker().await;

        let mut client = LibraryClient::connect(addr).await.unwrap();
        let err = client
            .contents(
                ResourceType::Person,
                ResourceType::Page,
                AccessIdentifier::new("x", "y"),
                RequestParams::first(10),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidRequest(_)));
    }

    /// Poll the registry until `count` endpoints are registered
    async fn wait_for_endpoints(librarian: &Arc<Librarian>, count: usize) -> Vec<String> {
        for _ in 0..200 {
            {
                let state = librarian.registry().read().await;
                if state.endpoint_count() >= count {
                    let mut keys = state.keys_supporting(&ResourceType::ALL);
                    keys.sort();
                    return keys;
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("endpoints never registered");
    }
}
