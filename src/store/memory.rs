//! In-memory data store
//!
//! A deterministic catalogue for demos and tests: typed records keyed by
//! identifier, plus a parent/child containment index. Search is substring
//! matching over display text; the co-occurrence transforms are answered
//! from the containment index.

use std::collections::{HashMap, HashSet};

use crate::endpoint::DataStore;
use crate::protocol::{
    AccessIdentifier, AudioRecord, CollectionRecord, DynamicTransformId, LocationRecord,
    OrganizationRecord, PageRecord, PersonRecord, PictureRecord, RequestParams, Resource,
    SearchRequest, SearchResponse, SearchResult, TransformRequest, VideoRecord,
};
use crate::types::{contains, ResourceType};

const ENTITY_TYPES: [ResourceType; 3] = [
    ResourceType::Person,
    ResourceType::Location,
    ResourceType::Organization,
];

/// Deterministic in-memory catalogue
#[derive(Debug, Default)]
pub struct MemoryStore {
    supported: HashSet<ResourceType>,
    resources: HashMap<String, Resource>,
    children: HashMap<String, Vec<String>>,
    parents: HashMap<String, Vec<String>>,
}

impl MemoryStore {
    /// Create an empty store answering for the given types
    pub fn new(supported: impl IntoIterator<Item = ResourceType>) -> Self {
        Self {
            supported: supported.into_iter().collect(),
            ..Default::default()
        }
    }

    /// Resource types this store answers for
    pub fn supported_types(&self) -> Vec<ResourceType> {
        let mut types: Vec<_> = self.supported.iter().copied().collect();
        types.sort_by_key(|t| t.name());
        types
    }

    /// Dynamic transforms this store implements
    pub fn dynamic_transforms(&self) -> Vec<DynamicTransformId> {
        vec![DynamicTransformId::new("related", ResourceType::Page)]
    }

    /// Insert a record, keyed by its identifier
    pub fn insert(&mut self, resource: Resource) -> &mut Self {
        self.resources
            .insert(resource.id().identifier.clone(), resource);
        self
    }

    /// Record that `parent` contains `child`
    ///
    /// Links violating the containment relation are rejected silently; the
    /// demo catalogue never produces them.
    pub fn link(&mut self, parent: &str, child: &str) -> &mut Self {
        let valid = match (self.resources.get(parent), self.resources.get(child)) {
            (Some(p), Some(c)) => contains(p.kind(), c.kind()),
            _ => false,
        };
        if valid {
            self.children
                .entry(parent.to_string())
                .or_default()
                .push(child.to_string());
            self.parents
                .entry(child.to_string())
                .or_default()
                .push(parent.to_string());
        }
        self
    }

    /// A small seeded catalogue used by the demo endpoint binary
    pub fn sample_catalogue() -> Self {
        let mut store = Self::new(ResourceType::ALL);

        store.insert(Resource::Collection(CollectionRecord {
            id: AccessIdentifier::new("col-maritime", ""),
            title: "Maritime History".into(),
            description: Some("Ships, harbours, and the people around them".into()),
        }));
        store.insert(Resource::Page(PageRecord {
            id: AccessIdentifier::new("page-harbour", ""),
            title: "The Old Harbour".into(),
            text: "The old harbour served the eastern trade routes.".into(),
        }));
        store.insert(Resource::Page(PageRecord {
            id: AccessIdentifier::new("page-shipyard", ""),
            title: "Shipyard Workers".into(),
            text: "Life at the shipyard through three generations.".into(),
        }));
        store.insert(Resource::Picture(PictureRecord {
            id: AccessIdentifier::new("pic-quay", ""),
            caption: "Quay at dawn".into(),
            url: "https://archive.example/pic/quay.jpg".into(),
        }));
        store.insert(Resource::Video(VideoRecord {
            id: AccessIdentifier::new("vid-launch", ""),
            caption: "Launch of the Aurora".into(),
            url: "https://archive.example/vid/launch.mp4".into(),
            duration_secs: 143,
        }));
        store.insert(Resource::Audio(AudioRecord {
            id: AccessIdentifier::new("aud-interview", ""),
            caption: "Dockhand interview, 1962".into(),
            url: "https://archive.example/aud/interview.ogg".into(),
            duration_secs: 611,
        }));
        store.insert(Resource::Person(PersonRecord {
            id: AccessIdentifier::new("per-lindgren", ""),
            name: "Captain E. Lindgren".into(),
            description: Some("Master of the Aurora".into()),
        }));
        store.insert(Resource::Location(LocationRecord {
            id: AccessIdentifier::new("loc-harbour", ""),
            name: "Eastern Harbour".into(),
            latitude: 59.44,
            longitude: 24.75,
        }));
        store.insert(Resource::Location(LocationRecord {
            id: AccessIdentifier::new("loc-shipyard", ""),
            name: "Noblessner Shipyard".into(),
            latitude: 59.45,
            longitude: 24.73,
        }));
        store.insert(Resource::Location(LocationRecord {
            id: AccessIdentifier::new("loc-lighthouse", ""),
            name: "Pakri Lighthouse".into(),
            latitude: 59.39,
            longitude: 24.04,
        }));
        store.insert(Resource::Organization(OrganizationRecord {
            id: AccessIdentifier::new("org-guild", ""),
            name: "Harbour Workers' Guild".into(),
            description: None,
        }));

        store.link("col-maritime", "page-harbour");
        store.link("col-maritime", "page-shipyard");
        store.link("page-harbour", "pic-quay");
        store.link("page-harbour", "aud-interview");
        store.link("page-harbour", "loc-harbour");
        store.link("page-harbour", "org-guild");
        store.link("page-shipyard", "vid-launch");
        store.link("page-shipyard", "per-lindgren");
        store.link("page-shipyard", "loc-shipyard");
        store.link("pic-quay", "loc-harbour");
        store.link("vid-launch", "per-lindgren");

        store
    }

    fn display_text(resource: &Resource) -> (&str, Option<&str>) {
        match resource {
            Resource::Collection(r) => (&r.title, r.description.as_deref()),
            Resource::Page(r) => (&r.title, Some(r.text.as_str())),
            Resource::Picture(r) => (&r.caption, None),
            Resource::Video(r) => (&r.caption, None),
            Resource::Audio(r) => (&r.caption, None),
            Resource::Person(r) => (&r.name, r.description.as_deref()),
            Resource::Location(r) => (&r.name, None),
            Resource::Organization(r) => (&r.name, r.description.as_deref()),
        }
    }

    fn to_result(resource: &Resource) -> SearchResult {
        let (title, snippet) = Self::display_text(resource);
        SearchResult {
            id: AccessIdentifier::new(resource.id().identifier.clone(), ""),
            resource_type: resource.kind(),
            title: title.to_string(),
            snippet: snippet.map(String::from),
        }
    }

    fn page(results: Vec<SearchResult>, params: &RequestParams) -> Vec<SearchResult> {
        let start = params.start_at as usize;
        let take = if params.num_requested == 0 {
            usize::MAX
        } else {
            params.num_requested as usize
        };
        results.into_iter().skip(start).take(take).collect()
    }

    fn related(&self, identifier: &str, pred: impl Fn(&Resource) -> bool) -> Vec<SearchResult> {
        let mut out: Vec<SearchResult> = Vec::new();
        let empty = Vec::new();
        for relative in self
            .parents
            .get(identifier)
            .unwrap_or(&empty)
            .iter()
            .chain(self.children.get(identifier).unwrap_or(&empty).iter())
        {
            if let Some(resource) = self.resources.get(relative) {
                if pred(resource) {
                    out.push(Self::to_result(resource));
                }
            }
        }
        out
    }

    fn neighbours(
        &self,
        identifier: &str,
        index: &HashMap<String, Vec<String>>,
        ty: Option<ResourceType>,
    ) -> Vec<SearchResult> {
        index
            .get(identifier)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| self.resources.get(id))
                    .filter(|r| ty.map(|t| r.kind() == t).unwrap_or(true))
                    .map(Self::to_result)
                    .collect()
            })
            .unwrap_or_default()
    }

    fn unsupported(&self, ty: ResourceType) -> SearchResponse {
        SearchResponse::failed(format!("Resource type not held by this library: {}", ty))
    }
}

impl DataStore for MemoryStore {
    async fn run_search(&self, request: &SearchRequest) -> SearchResponse {
        let wanted: Vec<ResourceType> = request
            .types
            .iter()
            .copied()
            .filter(|t| self.supported.contains(t))
            .collect();
        if wanted.is_empty() {
            // Unsupported type: empty results with the error set
            return SearchResponse::failed(format!(
                "Requested types not held by this library: {}",
                request
                    .types
                    .iter()
                    .map(|t| t.name())
                    .collect::<Vec<_>>()
                    .join(", ")
            ));
        }

        let needle = request.query.to_lowercase();
        let mut matched: Vec<(&String, &Resource)> = self
            .resources
            .iter()
            .filter(|(_, r)| wanted.contains(&r.kind()))
            .filter(|(_, r)| {
                let (title, snippet) = Self::display_text(r);
                title.to_lowercase().contains(&needle)
                    || snippet
                        .map(|s| s.to_lowercase().contains(&needle))
                        .unwrap_or(false)
            })
            .collect();
        matched.sort_by(|a, b| a.0.cmp(b.0));

        SearchResponse {
            results: Self::page(
                matched.into_iter().map(|(_, r)| Self::to_result(r)).collect(),
                &request.params,
            ),
            error: None,
        }
    }

    async fn run_container(&self, request: &TransformRequest) -> SearchResponse {
        SearchResponse {
            results: Self::page(
                self.neighbours(&request.id.identifier, &self.parents, None),
                &request.params,
            ),
            error: None,
        }
    }

    async fn run_contents(&self, request: &TransformRequest) -> SearchResponse {
        if let Some(to) = request.to {
            if !self.supported.contains(&to) {
                return self.unsupported(to);
            }
        }
        SearchResponse {
            results: Self::page(
                self.neighbours(&request.id.identifier, &self.children, request.to),
                &request.params,
            ),
            error: None,
        }
    }

    async fn run_occur_as_obj(&self, request: &TransformRequest) -> SearchResponse {
        // Where this entity occurs: its containers
        SearchResponse {
            results: Self::page(
                self.neighbours(&request.id.identifier, &self.parents, None),
                &request.params,
            ),
            error: None,
        }
    }

    async fn run_occur_as_subj(&self, request: &TransformRequest) -> SearchResponse {
        self.run_occur_as_obj(request).await
    }

    async fn run_occur_has_obj(&self, request: &TransformRequest) -> SearchResponse {
        // Entities occurring within this resource
        let results = self.related(&request.id.identifier, |r| {
            ENTITY_TYPES.contains(&r.kind())
        });
        SearchResponse {
            results: Self::page(results, &request.params),
            error: None,
        }
    }

    async fn run_occur_has_subj(&self, request: &TransformRequest) -> SearchResponse {
        self.run_occur_has_obj(request).await
    }

    async fn run_nearby_locations(&self, request: &TransformRequest) -> SearchResponse {
        if !self.supported.contains(&ResourceType::Location) {
            return self.unsupported(ResourceType::Location);
        }
        let Some(Resource::Location(origin)) = self.resources.get(&request.id.identifier) else {
            return SearchResponse::failed(format!(
                "No location with identifier: {}",
                request.id.identifier
            ));
        };

        let mut candidates: Vec<(&LocationRecord, f64)> = self
            .resources
            .values()
            .filter_map(|r| match r {
                Resource::Location(l) if l.id.identifier != origin.id.identifier => {
                    let dlat = l.latitude - origin.latitude;
                    let dlon = l.longitude - origin.longitude;
                    Some((l, dlat * dlat + dlon * dlon))
                }
                _ => None,
            })
            .collect();
        candidates.sort_by(|a, b| a.1.total_cmp(&b.1));

        SearchResponse {
            results: Self::page(
                candidates
                    .into_iter()
                    .map(|(l, _)| Self::to_result(&Resource::Location(l.clone())))
                    .collect(),
                &request.params,
            ),
            error: None,
        }
    }

    async fn run_dynamic(
        &self,
        transform: &DynamicTransformId,
        request: &TransformRequest,
    ) -> SearchResponse {
        match (transform.name.as_str(), transform.from_type) {
            ("related", ResourceType::Page) => {
                // Pages sharing a collection with the subject page
                let mut results = Vec::new();
                let empty = Vec::new();
                for parent in self.parents.get(&request.id.identifier).unwrap_or(&empty) {
                    for sibling in self.children.get(parent).unwrap_or(&empty) {
                        if sibling != &request.id.identifier {
                            if let Some(r) = self.resources.get(sibling) {
                                results.push(Self::to_result(r));
                            }
                        }
                    }
                }
                SearchResponse {
                    results: Self::page(results, &request.params),
                    error: None,
                }
            }
            // Unknown transform: unsupported operation, no error
            _ => SearchResponse::empty(),
        }
    }

    async fn lookup(&self, kind: ResourceType, id: &AccessIdentifier) -> Resource {
        if !self.supported.contains(&kind) {
            return Resource::stub(
                kind,
                id.with_error(format!("Resource type not held by this library: {}", kind)),
            );
        }
        match self.resources.get(&id.identifier) {
            Some(resource) if resource.kind() == kind => {
                let mut found = resource.clone();
                set_id(&mut found, id.clone());
                found
            }
            Some(resource) => Resource::stub(
                kind,
                id.with_error(format!(
                    "Identifier {} names a {}, not a {}",
                    id.identifier,
                    resource.kind(),
                    kind
                )),
            ),
            None => Resource::stub(
                kind,
                id.with_error(format!("No resource with identifier: {}", id.identifier)),
            ),
        }
    }
}

fn set_id(resource: &mut Resource, id: AccessIdentifier) {
    match resource {
        Resource::Collection(r) => r.id = id,
        Resource::Page(r) => r.id = id,
        Resource::Picture(r) => r.id = id,
        Resource::Video(r) => r.id = id,
        Resource::Audio(r) => r.id = id,
        Resource::Person(r) => r.id = id,
        Resource::Location(r) => r.id = id,
        Resource::Organization(r) => r.id = id,
    }
}
