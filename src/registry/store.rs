//! Registry implementation
//!
//! Holds the connected-endpoint table, the group membership lists, and the
//! broker-wide capability unions. The connect path is the only writer;
//! routing and dispatch take read guards and see a consistent snapshot per
//! request.

use std::collections::{HashMap, HashSet};

use tokio::sync::{RwLock, RwLockReadGuard};

use crate::protocol::{ConnectRequest, DynamicTransformId};
use crate::types::ResourceType;

use super::error::RegistryError;
use super::key::{generate_group_id, generate_key};
use super::record::{EndpointHandle, EndpointRecord};

/// Snapshot of broker membership state
///
/// Invariants, re-established by every successful connect:
/// - every key in any group list exists in `endpoints` with that group id;
/// - `supported_types` is the union of all records' supported types;
/// - `dynamic_transforms` is the union of all records' transforms.
#[derive(Debug, Default)]
pub struct RegistryState {
    endpoints: HashMap<String, EndpointRecord>,
    groups: HashMap<String, Vec<String>>,
    supported_types: HashSet<ResourceType>,
    dynamic_transforms: HashSet<DynamicTransformId>,
}

impl RegistryState {
    /// Keys of endpoints supporting at least one of the given types
    pub fn keys_supporting(&self, types: &[ResourceType]) -> Vec<String> {
        let mut keys: Vec<String> = self
            .endpoints
            .values()
            .filter(|r| types.iter().any(|t| r.supports(*t)))
            .map(|r| r.key.clone())
            .collect();
        keys.sort();
        keys
    }

    /// Members of `group` supporting the given type
    pub fn group_members_supporting(&self, ty: ResourceType, group: &str) -> Vec<String> {
        self.members_matching(group, |r| r.supports(ty))
    }

    /// Members of `group` implementing the given dynamic transform
    pub fn group_members_supporting_dynamic(
        &self,
        transform: &DynamicTransformId,
        group: &str,
    ) -> Vec<String> {
        self.members_matching(group, |r| r.supports_dynamic(transform))
    }

    fn members_matching<F>(&self, group: &str, pred: F) -> Vec<String>
    where
        F: Fn(&EndpointRecord) -> bool,
    {
        self.groups
            .get(group)
            .map(|members| {
                members
                    .iter()
                    .filter(|key| self.endpoints.get(*key).map(&pred).unwrap_or(false))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Group of the endpoint owning the given resource id
    pub fn group_id_of(&self, resource_id: &str) -> Result<String, RegistryError> {
        self.endpoints
            .get(resource_id)
            .map(|r| r.group_id.clone())
            .ok_or_else(|| RegistryError::UnknownResource(resource_id.to_string()))
    }

    /// True when any endpoint supports the type (informational; routing to
    /// an empty target set already yields the no-support response)
    pub fn supports_type(&self, ty: ResourceType) -> bool {
        self.supported_types.contains(&ty)
    }

    /// True when any endpoint implements the transform (informational)
    pub fn supports_dynamic_transform(&self, transform: &DynamicTransformId) -> bool {
        self.dynamic_transforms.contains(transform)
    }

    /// Record for a key, if registered
    pub fn endpoint(&self, key: &str) -> Option<&EndpointRecord> {
        self.endpoints.get(key)
    }

    /// Number of registered endpoints
    pub fn endpoint_count(&self) -> usize {
        self.endpoints.len()
    }

    /// Members of a group, if it exists
    pub fn group(&self, group: &str) -> Option<&[String]> {
        self.groups.get(group).map(Vec::as_slice)
    }

    /// Union of supported types across all endpoints
    pub fn supported_types(&self) -> &HashSet<ResourceType> {
        &self.supported_types
    }

    /// Union of dynamic transforms across all endpoints
    pub fn dynamic_transforms(&self) -> &HashSet<DynamicTransformId> {
        &self.dynamic_transforms
    }
}

/// Central registry of connected endpoints
#[derive(Debug, Default)]
pub struct EndpointRegistry {
    state: RwLock<RegistryState>,
}

impl EndpointRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Take a read guard over the membership state
    ///
    /// The router computes a whole request's targets against one guard, so
    /// it sees a consistent snapshot.
    pub async fn read(&self) -> RwLockReadGuard<'_, RegistryState> {
        self.state.read().await
    }

    /// Live handle for a key, if registered
    pub async fn handle(&self, key: &str) -> Option<EndpointHandle> {
        self.state.read().await.endpoints.get(key).map(|r| r.handle.clone())
    }

    /// Register an endpoint, allocating its key and group
    ///
    /// Key allocation: absent requested key gets a fresh random key; an
    /// unused requested key is granted; a used requested key is granted
    /// idempotently when the `(hostname, port, group)` identity matches the
    /// existing record (the live handle is refreshed), and refused
    /// otherwise with no state change.
    pub async fn connect(
        &self,
        req: ConnectRequest,
        handle: EndpointHandle,
    ) -> Result<String, RegistryError> {
        let mut state = self.state.write().await;

        if let Some(requested) = &req.requested_key {
            if let Some(existing) = state.endpoints.get(requested) {
                if !existing.same_identity(&req) {
                    return Err(RegistryError::KeyCollision(requested.clone()));
                }
                // Reconnect: same identity, refresh capabilities and handle
                let key = requested.clone();
                let group_id = existing.group_id.clone();
                Self::insert(&mut state, key.clone(), group_id, req, handle, true);
                tracing::info!(key = %key, "Endpoint reconnected");
                return Ok(key);
            }
        }

        let key = match req.requested_key.clone() {
            Some(requested) => requested,
            None => loop {
                let candidate = generate_key();
                if !state.endpoints.contains_key(&candidate) {
                    break candidate;
                }
            },
        };

        let group_id = match req.group_id.clone() {
            Some(group) => group,
            None => loop {
                let candidate = generate_group_id();
                if !state.groups.contains_key(&candidate) {
                    break candidate;
                }
            },
        };

        Self::insert(&mut state, key.clone(), group_id.clone(), req, handle, false);
        tracing::info!(
            key = %key,
            group = %group_id,
            endpoints = state.endpoints.len(),
            "Endpoint registered"
        );
        Ok(key)
    }

    fn insert(
        state: &mut RegistryState,
        key: String,
        group_id: String,
        req: ConnectRequest,
        handle: EndpointHandle,
        reconnect: bool,
    ) {
        let record = EndpointRecord {
            key: key.clone(),
            group_id: group_id.clone(),
            hostname: req.hostname,
            port: req.port,
            supported_types: req.supported_types.iter().copied().collect(),
            dynamic_transforms: req.dynamic_transforms.iter().cloned().collect(),
            handle,
        };

        state.supported_types.extend(&record.supported_types);
        state
            .dynamic_transforms
            .extend(record.dynamic_transforms.iter().cloned());

        state.endpoints.insert(key.clone(), record);
        if !reconnect {
            state.groups.entry(group_id).or_default().push(key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::KEY_LEN;

    fn req(host: &str, port: u16) -> ConnectRequest {
        ConnectRequest {
            hostname: host.into(),
            port,
            group_id: None,
            requested_key: None,
            supported_types: vec![ResourceType::Page],
            dynamic_transforms: vec![],
        }
    }

    fn handle() -> EndpointHandle {
        let (handle, rx) = EndpointHandle::channel();
        // Keep the receiver alive for the duration of the test registry.
        std::mem::forget(rx);
        handle
    }

    #[tokio::test]
    async fn test_connect_assigns_fresh_key() {
        let registry = EndpointRegistry::new();
        let key = registry.connect(req("localhost", 8082), handle()).await.unwrap();

        assert_eq!(key.len(), KEY_LEN);
        assert!(key.chars().all(|c| c.is_ascii_alphanumeric()));

        let state = registry.read().await;
        assert!(state.keys_supporting(&[ResourceType::Page]).contains(&key));
    }

    #[tokio::test]
    async fn test_requested_key_granted_when_unused() {
        let registry = EndpointRegistry::new();
        let mut request = req("localhost", 8082);
        request.requested_key = Some("mykey001".into());

        let key = registry.connect(request, handle()).await.unwrap();
        assert_eq!(key, "mykey001");
    }

    #[tokio::test]
    async fn test_reconnect_is_idempotent() {
        let registry = EndpointRegistry::new();
        let mut request = req("localhost", 8082);
        request.requested_key = Some("mykey001".into());
        request.group_id = Some("g".into());

        let first = registry.connect(request.clone(), handle()).await.unwrap();
        let second = registry.connect(request, handle()).await.unwrap();
        assert_eq!(first, second);

        // Reconnect must not duplicate the group membership entry
        let state = registry.read().await;
        assert_eq!(state.group("g").unwrap(), ["mykey001"]);
        assert_eq!(state.endpoint_count(), 1);
    }

    #[tokio::test]
    async fn test_key_collision_refused_without_state_change() {
        let registry = EndpointRegistry::new();
        let mut first = req("hostA", 8082);
        first.requested_key = Some("abc12345".into());
        first.group_id = Some("g1".into());
        registry.connect(first, handle()).await.unwrap();

        for (host, port, group) in [
            ("hostB", 8082, Some("g1")),
            ("hostA", 9999, Some("g1")),
            ("hostA", 8082, Some("g2")),
            ("hostA", 8082, None),
        ] {
            let mut second = req(host, port);
            second.requested_key = Some("abc12345".into());
            second.group_id = group.map(String::from);
            second.supported_types = vec![ResourceType::Audio];

            let err = registry.connect(second, handle()).await.unwrap_err();
            assert_eq!(err, RegistryError::KeyCollision("abc12345".into()));
        }

        let state = registry.read().await;
        assert_eq!(state.endpoint_count(), 1);
        assert_eq!(state.endpoint("abc12345").unwrap().hostname, "hostA");
        // Refused connects must not leak into the unions
        assert!(!state.supports_type(ResourceType::Audio));
    }

    #[tokio::test]
    async fn test_group_membership_and_queries() {
        let registry = EndpointRegistry::new();

        let mut a = req("h1", 1);
        a.group_id = Some("g".into());
        a.supported_types = vec![ResourceType::Page, ResourceType::Person];
        let key_a = registry.connect(a, handle()).await.unwrap();

        let mut b = req("h2", 2);
        b.group_id = Some("g".into());
        b.supported_types = vec![ResourceType::Audio];
        let key_b = registry.connect(b, handle()).await.unwrap();

        let mut c = req("h3", 3);
        c.group_id = Some("other".into());
        c.supported_types = vec![ResourceType::Page];
        let key_c = registry.connect(c, handle()).await.unwrap();

        let state = registry.read().await;

        let mut group_g: Vec<_> = state.group("g").unwrap().to_vec();
        group_g.sort();
        let mut expected = vec![key_a.clone(), key_b.clone()];
        expected.sort();
        assert_eq!(group_g, expected);

        assert_eq!(
            state.group_members_supporting(ResourceType::Page, "g"),
            [key_a.clone()]
        );
        assert_eq!(
            state.group_members_supporting(ResourceType::Audio, "g"),
            [key_b.clone()]
        );
        assert!(state
            .group_members_supporting(ResourceType::Page, "missing")
            .is_empty());

        let mut all_page = state.keys_supporting(&[ResourceType::Page]);
        all_page.sort();
        let mut expected = vec![key_a.clone(), key_c.clone()];
        expected.sort();
        assert_eq!(all_page, expected);

        assert_eq!(state.group_id_of(&key_a).unwrap(), "g");
        assert_eq!(state.group_id_of(&key_c).unwrap(), "other");
        assert_eq!(
            state.group_id_of("ZZZZ").unwrap_err(),
            RegistryError::UnknownResource("ZZZZ".into())
        );
    }

    #[tokio::test]
    async fn test_unions_accumulate() {
        let registry = EndpointRegistry::new();

        let mut a = req("h1", 1);
        a.supported_types = vec![ResourceType::Page];
        a.dynamic_transforms = vec![DynamicTransformId::new("related", ResourceType::Page)];
        registry.connect(a, handle()).await.unwrap();

        let mut b = req("h2", 2);
        b.supported_types = vec![ResourceType::Audio, ResourceType::Page];
        registry.connect(b, handle()).await.unwrap();

        let state = registry.read().await;
        let expected: HashSet<ResourceType> =
            [ResourceType::Page, ResourceType::Audio].into_iter().collect();
        assert_eq!(state.supported_types(), &expected);
        assert!(state.supports_type(ResourceType::Audio));
        assert!(!state.supports_type(ResourceType::Video));
        assert!(state
            .supports_dynamic_transform(&DynamicTransformId::new("related", ResourceType::Page)));
        assert!(!state
            .supports_dynamic_transform(&DynamicTransformId::new("related", ResourceType::Person)));
    }

    #[tokio::test]
    async fn test_dynamic_transform_matching_requires_both_fields() {
        let registry = EndpointRegistry::new();

        let mut a = req("h1", 1);
        a.group_id = Some("g".into());
        a.dynamic_transforms = vec![DynamicTransformId::new("related", ResourceType::Page)];
        let key = registry.connect(a, handle()).await.unwrap();

        let state = registry.read().await;
        assert_eq!(
            state.group_members_supporting_dynamic(
                &DynamicTransformId::new("related", ResourceType::Page),
                "g"
            ),
            [key]
        );
        assert!(state
            .group_members_supporting_dynamic(
                &DynamicTransformId::new("related", ResourceType::Person),
                "g"
            )
            .is_empty());
    }
}
