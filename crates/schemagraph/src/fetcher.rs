//! Neighborhood fetching and caching.
//!
//! The fetcher validates a request, consults a bounded cache keyed by
//! `(project, focus, hops)` and otherwise asks the relationship service.
//! Responses that violate the neighborhood invariants are rejected and never
//! cached.
//!
//! The cache is evicted in FIFO order once it holds
//! [`SchemaGraphConfig::cache_capacity`](crate::config::SchemaGraphConfig)
//! entries. Entries containing a relationship are dropped when that
//! relationship's status changes, so the next render reflects the latest
//! server state.
//!
//! Every such invalidation advances the cache epoch. A fetch remembers the
//! epoch it started in and does not cache its answer if a status changed
//! while it was in flight; [`FetchOutcome::epoch`] lets the session spot
//! answers that predate a settled change.

use crate::domain::{HopDepth, NeighborhoodGraph, ObjectId, ObjectSummary, ProjectId, RelationshipId};
use crate::error::{Error, Result};
use crate::selection::FetchRequest;
use crate::service::RelationshipService;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Cache key for a neighborhood
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    /// Project the neighborhood belongs to
    pub project: ProjectId,
    /// Focus object
    pub focus: ObjectId,
    /// Radius
    pub hops: HopDepth,
}

/// Bounded FIFO cache of fetched neighborhoods.
#[derive(Debug)]
struct NeighborhoodCache {
    entries: HashMap<CacheKey, NeighborhoodGraph>,

    /// Insertion order for FIFO eviction.
    order: VecDeque<CacheKey>,

    capacity: usize,

    /// Bumped by every edge invalidation.
    epoch: u64,
}

impl NeighborhoodCache {
    fn new(capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            order: VecDeque::new(),
            capacity: capacity.max(1),
            epoch: 0,
        }
    }

    fn get(&self, key: &CacheKey) -> Option<&NeighborhoodGraph> {
        self.entries.get(key)
    }

    fn insert(&mut self, key: CacheKey, graph: NeighborhoodGraph) {
        if self.entries.insert(key.clone(), graph).is_some() {
            return;
        }
        self.order.push_back(key);
        while self.entries.len() > self.capacity {
            self.evict_oldest();
        }
    }

    fn evict_oldest(&mut self) {
        if let Some(oldest) = self.order.pop_front() {
            self.entries.remove(&oldest);
            debug!(focus = %oldest.focus, hops = %oldest.hops, "Evicted neighborhood from cache");
        }
    }

    fn remove(&mut self, key: &CacheKey) -> bool {
        if self.entries.remove(key).is_some() {
            self.order.retain(|k| k != key);
            true
        } else {
            false
        }
    }

    /// Drop every entry containing `edge`; returns how many were dropped.
    fn invalidate_edge(&mut self, edge: &RelationshipId) -> usize {
        self.epoch += 1;
        let stale: Vec<CacheKey> = self
            .order
            .iter()
            .filter(|key| {
                self.entries
                    .get(key)
                    .is_some_and(|graph| graph.contains_edge(edge))
            })
            .cloned()
            .collect();
        for key in &stale {
            self.remove(key);
        }
        stale.len()
    }

    fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }
}

/// Result of executing a [`FetchRequest`], tagged with the request so the
/// selection controller can discard stale results.
#[derive(Debug)]
pub struct FetchOutcome {
    /// The request this outcome answers
    pub request: FetchRequest,
    /// The fetched neighborhood or the failure
    pub result: Result<NeighborhoodGraph>,
    /// Cache epoch at the time the fetch started
    pub epoch: u64,
}

/// Fetches neighborhood graphs for one project, with caching.
pub struct NeighborhoodFetcher {
    service: Arc<dyn RelationshipService>,
    project: ProjectId,
    cache: Mutex<NeighborhoodCache>,
}

impl std::fmt::Debug for NeighborhoodFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NeighborhoodFetcher")
            .field("project", &self.project)
            .field("service", &"<dyn RelationshipService>")
            .finish_non_exhaustive()
    }
}

impl NeighborhoodFetcher {
    /// Create a fetcher for `project` holding at most `capacity` neighborhoods
    pub fn new(service: Arc<dyn RelationshipService>, project: ProjectId, capacity: usize) -> Self {
        Self {
            service,
            project,
            cache: Mutex::new(NeighborhoodCache::new(capacity)),
        }
    }

    /// The project this fetcher serves
    #[must_use]
    pub fn project(&self) -> &ProjectId {
        &self.project
    }

    /// The underlying relationship service
    #[must_use]
    pub fn service(&self) -> Arc<dyn RelationshipService> {
        Arc::clone(&self.service)
    }

    fn key(&self, focus: ObjectId, hops: HopDepth) -> CacheKey {
        CacheKey {
            project: self.project.clone(),
            focus,
            hops,
        }
    }

    /// Fetch the neighborhood of `focus` within `hops`.
    ///
    /// # Errors
    ///
    /// - `Error::Validation` if `focus` is not a valid object ID (no network call)
    /// - `Error::NotFound` if the focus object doesn't exist
    /// - `Error::Network` on transport failure (not retried)
    /// - `Error::MalformedResponse` if the service violates graph invariants
    pub async fn fetch(&self, focus: ObjectId, hops: HopDepth) -> Result<NeighborhoodGraph> {
        let epoch = self.epoch().await;
        self.fetch_since(focus, hops, epoch).await
    }

    async fn fetch_since(
        &self,
        focus: ObjectId,
        hops: HopDepth,
        epoch: u64,
    ) -> Result<NeighborhoodGraph> {
        if focus.0 <= 0 {
            return Err(Error::Validation {
                field: "focus object id",
                value: focus.to_string(),
                reason: "expected a positive integer".to_string(),
            });
        }

        let key = self.key(focus, hops);
        if let Some(graph) = self.cache.lock().await.get(&key) {
            debug!(%focus, %hops, "Neighborhood cache hit");
            return Ok(graph.clone());
        }

        debug!(%focus, %hops, "Neighborhood cache miss, fetching");
        let graph = self
            .service
            .fetch_neighborhood(&self.project, focus, hops)
            .await?;

        if graph.focus_object_id != focus {
            warn!(%focus, returned = %graph.focus_object_id, "Service answered for another focus");
            return Err(Error::MalformedResponse(format!(
                "requested focus {focus}, received {}",
                graph.focus_object_id
            )));
        }
        if let Err(e) = graph.validate(hops) {
            warn!(%focus, %hops, error = %e, "Rejecting malformed neighborhood");
            return Err(e);
        }

        let mut cache = self.cache.lock().await;
        if cache.epoch == epoch {
            cache.insert(key, graph.clone());
        } else {
            debug!(%focus, %hops, started = epoch, now = cache.epoch, "Status changed during fetch, not caching");
        }
        Ok(graph)
    }

    /// Execute a request issued by the selection controller.
    pub async fn execute(&self, request: FetchRequest) -> FetchOutcome {
        let epoch = self.epoch().await;
        let result = self.fetch_since(request.focus, request.hops, epoch).await;
        FetchOutcome {
            request,
            result,
            epoch,
        }
    }

    /// Number of edge invalidations so far
    pub async fn epoch(&self) -> u64 {
        self.cache.lock().await.epoch
    }

    /// Returns `true` if the neighborhood is currently cached
    pub async fn is_cached(&self, focus: ObjectId, hops: HopDepth) -> bool {
        self.cache.lock().await.get(&self.key(focus, hops)).is_some()
    }

    /// Drop the cached neighborhood for `(focus, hops)`
    pub async fn invalidate(&self, focus: ObjectId, hops: HopDepth) -> bool {
        self.cache.lock().await.remove(&self.key(focus, hops))
    }

    /// Drop every cached neighborhood containing `edge`.
    ///
    /// Returns the number of entries dropped.
    pub async fn invalidate_edge(&self, edge: &RelationshipId) -> usize {
        let dropped = self.cache.lock().await.invalidate_edge(edge);
        debug!(%edge, dropped, "Invalidated neighborhoods containing relationship");
        dropped
    }

    /// Drop every cached neighborhood
    pub async fn clear(&self) {
        self.cache.lock().await.clear();
    }

    /// Read the project's object catalog (not cached).
    pub async fn list_objects(&self) -> Result<Vec<ObjectSummary>> {
        self.service.list_objects(&self.project).await
    }
}
