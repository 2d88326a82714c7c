//! Capability-based routing
//!
//! Selects the endpoint keys a request is dispatched to. Searches fan out
//! across the whole fleet by type capability; every transform is scoped to
//! one resource and therefore confined to the owning endpoint's group;
//! lookups go to exactly the owning endpoint.
//!
//! Routing is a pure function of the request and one registry snapshot:
//! callers hold a single read guard for the whole computation.

use crate::protocol::{Message, TransformKind, TransformRequest};
use crate::registry::RegistryState;
use crate::types::ResourceType;

/// Compute the target endpoint keys for a request
///
/// Unroutable requests (an unknown resource id, a transform missing its
/// type argument, or a non-request message) yield an empty target set; the
/// dispatcher turns that into the standard no-support response. Lookups
/// always target exactly the owning endpoint key, known or not; the
/// dispatcher produces the unknown-resource stub for the latter.
pub fn route(request: &Message, state: &RegistryState) -> Vec<String> {
    match request {
        Message::Search(req) => state.keys_supporting(&req.types),
        Message::Transform(req) => route_transform(req, state),
        Message::Lookup(req) => vec![req.id.resource_id.clone()],
        _ => Vec::new(),
    }
}

fn route_transform(req: &TransformRequest, state: &RegistryState) -> Vec<String> {
    let group = match state.group_id_of(&req.id.resource_id) {
        Ok(group) => group,
        Err(_) => return Vec::new(),
    };

    match &req.kind {
        TransformKind::Container
        | TransformKind::Overlaps
        | TransformKind::OccurAsObj
        | TransformKind::OccurAsSubj
        | TransformKind::OccurHasObj
        | TransformKind::OccurHasSubj => match req.from {
            Some(from) => state.group_members_supporting(from, &group),
            None => Vec::new(),
        },
        TransformKind::Contents => match req.to {
            Some(to) => state.group_members_supporting(to, &group),
            None => Vec::new(),
        },
        TransformKind::NearbyLocations => {
            state.group_members_supporting(ResourceType::Location, &group)
        }
        TransformKind::Dynamic { transform } => {
            state.group_members_supporting_dynamic(transform, &group)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{
        AccessIdentifier, ConnectRequest, DynamicTransformId, LookupRequest, RequestParams,
        SearchRequest,
    };
    use crate::registry::{EndpointHandle, EndpointRegistry};

    fn transform(kind: TransformKind, resource_id: &str) -> TransformRequest {
        TransformRequest {
            kind,
            id: AccessIdentifier::new("obj", resource_id),
            from: Some(ResourceType::Person),
            to: Some(ResourceType::Person),
            params: RequestParams::first(10),
        }
    }

    async fn connect(
        registry: &EndpointRegistry,
        key: &str,
        group: &str,
        types: &[ResourceType],
        transforms: &[DynamicTransformId],
    ) {
        let (handle, rx) = EndpointHandle::channel();
        std::mem::forget(rx);
        registry
            .connect(
                ConnectRequest {
                    hostname: key.to_string(),
                    port: 1,
                    group_id: Some(group.to_string()),
                    requested_key: Some(key.to_string()),
                    supported_types: types.to_vec(),
                    dynamic_transforms: transforms.to_vec(),
                },
                handle,
            )
            .await
            .unwrap();
    }

    async fn fixture() -> EndpointRegistry {
        let registry = EndpointRegistry::new();
        // Two groups; persons supported in both, audio only in group h
        connect(
            &registry,
            "key00001",
            "g",
            &[ResourceType::Page, ResourceType::Person, ResourceType::Location],
            &[DynamicTransformId::new("related", ResourceType::Person)],
        )
        .await;
        connect(
            &registry,
            "key00002",
            "g",
            &[ResourceType::Person],
            &[],
        )
        .await;
        connect(
            &registry,
            "key00003",
            "h",
            &[ResourceType::Person, ResourceType::Audio],
            &[DynamicTransformId::new("related", ResourceType::Person)],
        )
        .await;
        registry
    }

    #[tokio::test]
    async fn test_search_targets_whole_fleet_by_type() {
        let registry = fixture().await;
        let state = registry.read().await;

        let req = Message::Search(SearchRequest {
            query: "x".into(),
            params: RequestParams::first(5),
            types: vec![ResourceType::Person],
        });
        assert_eq!(
            route(&req, &state),
            ["key00001", "key00002", "key00003"]
        );

        let audio = Message::Search(SearchRequest {
            query: "x".into(),
            params: RequestParams::first(5),
            types: vec![ResourceType::Audio],
        });
        assert_eq!(route(&audio, &state), ["key00003"]);

        let video = Message::Search(SearchRequest {
            query: "x".into(),
            params: RequestParams::first(5),
            types: vec![ResourceType::Video],
        });
        assert!(route(&video, &state).is_empty());
    }

    #[tokio::test]
    async fn test_transforms_confined_to_owning_group() {
        let registry = fixture().await;
        let state = registry.read().await;

        // key00003 supports Person but sits in group h: never targeted
        for kind in [
            TransformKind::Container,
            TransformKind::Overlaps,
            TransformKind::OccurAsObj,
            TransformKind::OccurAsSubj,
            TransformKind::OccurHasObj,
            TransformKind::OccurHasSubj,
        ] {
            let req = Message::Transform(transform(kind, "key00001"));
            let targets = route(&req, &state);
            assert_eq!(targets, ["key00001", "key00002"]);
            for t in &targets {
                assert_eq!(state.group_id_of(t).unwrap(), "g");
            }
        }
    }

    #[tokio::test]
    async fn test_contents_routes_on_target_type() {
        let registry = fixture().await;
        let state = registry.read().await;

        let mut req = transform(TransformKind::Contents, "key00003");
        req.from = Some(ResourceType::Page);
        req.to = Some(ResourceType::Audio);
        assert_eq!(
            route(&Message::Transform(req), &state),
            ["key00003"]
        );
    }

    #[tokio::test]
    async fn test_nearby_routes_on_location_support() {
        let registry = fixture().await;
        let state = registry.read().await;

        // Only key00001 supports Location in group g
        let req = transform(TransformKind::NearbyLocations, "key00002");
        assert_eq!(route(&Message::Transform(req), &state), ["key00001"]);

        // Group h has no Location support at all
        let req = transform(TransformKind::NearbyLocations, "key00003");
        assert!(route(&Message::Transform(req), &state).is_empty());
    }

    #[tokio::test]
    async fn test_dynamic_routes_on_name_and_from_type() {
        let registry = fixture().await;
        let state = registry.read().await;

        let req = transform(
            TransformKind::Dynamic {
                transform: DynamicTransformId::new("related", ResourceType::Person),
            },
            "key00001",
        );
        assert_eq!(route(&Message::Transform(req), &state), ["key00001"]);

        let req = transform(
            TransformKind::Dynamic {
                transform: DynamicTransformId::new("related", ResourceType::Page),
            },
            "key00001",
        );
        assert!(route(&Message::Transform(req), &state).is_empty());
    }

    #[tokio::test]
    async fn test_lookup_targets_owner_verbatim() {
        let registry = fixture().await;
        let state = registry.read().await;

        let req = Message::Lookup(LookupRequest {
            kind: ResourceType::Page,
            id: AccessIdentifier::new("obj", "key00002"),
        });
        assert_eq!(route(&req, &state), ["key00002"]);

        // Unknown owner still routes to the singleton; the dispatcher stubs it
        let req = Message::Lookup(LookupRequest {
            kind: ResourceType::Page,
            id: AccessIdentifier::new("obj", "ZZZZ"),
        });
        assert_eq!(route(&req, &state), ["ZZZZ"]);
    }

    #[tokio::test]
    async fn test_unknown_resource_yields_empty_targets() {
        let registry = fixture().await;
        let state = registry.read().await;

        let req = Message::Transform(transform(TransformKind::Container, "nope"));
        assert!(route(&req, &state).is_empty());
    }

    #[tokio::test]
    async fn test_routing_is_deterministic() {
        let registry = fixture().await;
        let state = registry.read().await;

        let req = Message::Search(SearchRequest {
            query: "x".into(),
            params: RequestParams::first(5),
            types: vec![ResourceType::Person, ResourceType::Audio],
        });
        let first = route(&req, &state);
        for _ in 0..8 {
            assert_eq!(route(&req, &state), first);
        }
    }

    #[tokio::test]
    async fn test_targets_are_registered_endpoints() {
        let registry = fixture().await;
        let state = registry.read().await;

        let req = Message::Search(SearchRequest {
            query: "x".into(),
            params: RequestParams::first(5),
            types: ResourceType::ALL.to_vec(),
        });
        for key in route(&req, &state) {
            assert!(state.endpoint(&key).is_some());
        }
    }
}
