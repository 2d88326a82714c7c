//! Containment relation between resource types
//!
//! Collections contain pages; pages contain media and entities; media
//! contain entities. The two directions are kept as separate tables and
//! must stay inverse of each other (checked by test).

use super::resource::ResourceType;

const ENTITIES: [ResourceType; 3] = [
    ResourceType::Person,
    ResourceType::Location,
    ResourceType::Organization,
];

const ENTITY_CONTAINERS: [ResourceType; 4] = [
    ResourceType::Page,
    ResourceType::Picture,
    ResourceType::Video,
    ResourceType::Audio,
];

/// Types that resources of `ty` may contain
pub fn contents_of(ty: ResourceType) -> &'static [ResourceType] {
    match ty {
        ResourceType::Collection => &[ResourceType::Page],
        ResourceType::Page => &[
            ResourceType::Picture,
            ResourceType::Video,
            ResourceType::Audio,
            ResourceType::Person,
            ResourceType::Location,
            ResourceType::Organization,
        ],
        ResourceType::Picture | ResourceType::Video | ResourceType::Audio => &ENTITIES,
        ResourceType::Person | ResourceType::Location | ResourceType::Organization => &[],
    }
}

/// Types that resources of `ty` may appear inside
///
/// Collections have no container.
pub fn containers_of(ty: ResourceType) -> &'static [ResourceType] {
    match ty {
        ResourceType::Collection => &[],
        ResourceType::Page => &[ResourceType::Collection],
        ResourceType::Picture | ResourceType::Video | ResourceType::Audio => {
            &[ResourceType::Page]
        }
        ResourceType::Person | ResourceType::Location | ResourceType::Organization => {
            &ENTITY_CONTAINERS
        }
    }
}

/// True when resources of `container` may contain resources of `content`
pub fn contains(container: ResourceType, content: ResourceType) -> bool {
    contents_of(container).contains(&content)
}

/// Validity predicate for a contents transform from `from` to `to`
///
/// The client helper uses this to reject ill-formed requests before they
/// reach the broker.
pub fn validate_contents(from: ResourceType, to: ResourceType) -> bool {
    contains(from, to)
}
