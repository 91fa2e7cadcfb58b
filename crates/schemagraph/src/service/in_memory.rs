//! In-memory relationship service.
//!
//! Holds a whole project (objects plus physical and logical foreign keys) and
//! answers neighborhood queries with a breadth-first traversal over a petgraph
//! `DiGraph`, treating relationships as undirected for reachability.
//!
//! Besides backing the CLI's `--fixture` mode, the service records how many
//! calls it served and can be scripted to fail, to stall a fetch for a while,
//! or to simulate another reviewer changing a relationship.
//!
//! # Graph Representation
//!
//! Edge direction follows the foreign key: source (referencing object) ->
//! target (referenced object). Each edge weight is the index of the
//! relationship in `relationships`.

use super::RelationshipService;
use crate::domain::{
    Column, EdgeAction, HopDepth, LogicalStatus, NeighborhoodGraph, ObjectId, ObjectSummary,
    ProjectId, Relationship, RelationshipId, SchemaObject,
};
use crate::error::{Error, Result};
use async_trait::async_trait;
use chrono::Utc;
use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::debug;

/// An object of the project catalog, before any neighborhood is computed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogObject {
    /// Object identifier
    pub object_id: ObjectId,

    /// Object name
    pub name: String,

    /// Owning schema
    pub schema_name: String,

    /// Columns, in declaration order
    #[serde(default)]
    pub columns: Vec<Column>,
}

/// A whole project as stored in a fixture file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fixture {
    /// Every object of the project
    pub objects: Vec<CatalogObject>,

    /// Every relationship of the project
    #[serde(default)]
    pub relationships: Vec<Relationship>,
}

impl Fixture {
    /// Load a fixture from a JSON file
    pub async fn load(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path).await?;
        Ok(serde_json::from_str(&content)?)
    }
}

/// A failure the service returns for the next matching call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptedFailure {
    /// Behave like a dropped connection
    Network,

    /// Behave like another actor changed the relationship first
    Conflict,
}

impl ScriptedFailure {
    fn into_error(self, id: &RelationshipId) -> Error {
        match self {
            ScriptedFailure::Network => Error::Network("connection reset (scripted)".to_string()),
            ScriptedFailure::Conflict => Error::MutationConflict(id.clone()),
        }
    }
}

/// Mutable state behind the service's lock (not thread-safe on its own).
struct InMemoryServiceInner {
    objects: HashMap<ObjectId, CatalogObject>,

    /// Catalog order, kept so listings and traversals are deterministic
    order: Vec<ObjectId>,

    relationships: Vec<Relationship>,

    graph: DiGraph<ObjectId, usize>,

    node_map: HashMap<ObjectId, NodeIndex>,

    mutation_failures: HashMap<RelationshipId, VecDeque<ScriptedFailure>>,

    fetch_failures: HashMap<ObjectId, VecDeque<ScriptedFailure>>,

    latency: HashMap<ObjectId, Duration>,
}

impl InMemoryServiceInner {
    fn new(fixture: Fixture) -> Self {
        let mut graph = DiGraph::new();
        let mut node_map = HashMap::new();
        let mut objects = HashMap::new();
        let mut order = Vec::new();

        for object in fixture.objects {
            let id = object.object_id;
            if objects.insert(id, object).is_none() {
                node_map.insert(id, graph.add_node(id));
                order.push(id);
            }
        }

        let mut relationships = Vec::new();
        for relationship in fixture.relationships {
            let endpoints = (
                node_map.get(&relationship.source_object_id),
                node_map.get(&relationship.target_object_id),
            );
            let (Some(&source), Some(&target)) = endpoints else {
                debug!(id = %relationship.id, "Skipping relationship with unknown endpoint");
                continue;
            };
            graph.add_edge(source, target, relationships.len());
            relationships.push(relationship);
        }

        Self {
            objects,
            order,
            relationships,
            graph,
            node_map,
            mutation_failures: HashMap::new(),
            fetch_failures: HashMap::new(),
            latency: HashMap::new(),
        }
    }

    /// Breadth-first neighborhood of `focus`, ignoring edge direction.
    fn neighborhood(&self, focus: ObjectId, hops: HopDepth) -> Result<NeighborhoodGraph> {
        let start = *self.node_map.get(&focus).ok_or(Error::NotFound(focus))?;
        let max_depth = u32::from(hops.get());

        let mut depths: HashMap<NodeIndex, u32> = HashMap::new();
        let mut visit_order = Vec::new();
        let mut queue = VecDeque::new();
        depths.insert(start, 0);
        visit_order.push(start);
        queue.push_back(start);

        while let Some(current) = queue.pop_front() {
            let depth = depths[&current];
            if depth >= max_depth {
                continue;
            }
            // Visit neighbors in relationship order for a stable result.
            let mut neighbors: Vec<(usize, NodeIndex)> = self
                .graph
                .edges_directed(current, Direction::Outgoing)
                .map(|e| (*e.weight(), e.target()))
                .chain(
                    self.graph
                        .edges_directed(current, Direction::Incoming)
                        .map(|e| (*e.weight(), e.source())),
                )
                .collect();
            neighbors.sort_by_key(|(index, _)| *index);

            for (_, next) in neighbors {
                if let std::collections::hash_map::Entry::Vacant(slot) = depths.entry(next) {
                    slot.insert(depth + 1);
                    visit_order.push(next);
                    queue.push_back(next);
                }
            }
        }

        let included: HashSet<ObjectId> = visit_order.iter().map(|n| self.graph[*n]).collect();
        let nodes = visit_order
            .iter()
            .filter_map(|index| {
                let id = self.graph[*index];
                self.objects.get(&id).map(|object| SchemaObject {
                    object_id: id,
                    name: object.name.clone(),
                    schema_name: object.schema_name.clone(),
                    columns: object.columns.clone(),
                    depth: depths[index],
                    is_focus: id == focus,
                })
            })
            .collect();
        let edges = self
            .relationships
            .iter()
            .filter(|r| {
                included.contains(&r.source_object_id) && included.contains(&r.target_object_id)
            })
            .cloned()
            .collect();

        Ok(NeighborhoodGraph {
            focus_object_id: focus,
            nodes,
            edges,
        })
    }

    fn relationship_mut(&mut self, id: &RelationshipId) -> Result<&mut Relationship> {
        self.relationships
            .iter_mut()
            .find(|r| &r.id == id)
            .ok_or_else(|| Error::UnknownEdge(id.clone()))
    }

    fn apply(&mut self, id: &RelationshipId, action: EdgeAction) -> Result<()> {
        let relationship = self.relationship_mut(id)?;
        let Some(status) = relationship.logical_status() else {
            return Err(Error::ImmutableRelationship(id.clone()));
        };
        match action {
            EdgeAction::Confirm => {
                if status != LogicalStatus::Confirmed {
                    relationship.status = Some(LogicalStatus::Confirmed);
                    relationship.confirmed_at = Some(Utc::now());
                }
            }
            EdgeAction::Reject => {
                if status != LogicalStatus::Suggested {
                    return Err(Error::MutationConflict(id.clone()));
                }
                relationship.status = Some(LogicalStatus::Rejected);
            }
        }
        Ok(())
    }
}

/// Relationship service backed by an in-memory project.
///
/// Cloning shares the same project and counters.
#[derive(Clone)]
pub struct InMemoryService {
    inner: Arc<Mutex<InMemoryServiceInner>>,
    fetch_calls: Arc<AtomicUsize>,
    mutation_calls: Arc<AtomicUsize>,
}

impl std::fmt::Debug for InMemoryService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryService")
            .field("fetch_calls", &self.fetch_calls())
            .field("mutation_calls", &self.mutation_calls())
            .finish_non_exhaustive()
    }
}

impl InMemoryService {
    /// Create a service holding the given project
    #[must_use]
    pub fn new(fixture: Fixture) -> Self {
        Self {
            inner: Arc::new(Mutex::new(InMemoryServiceInner::new(fixture))),
            fetch_calls: Arc::new(AtomicUsize::new(0)),
            mutation_calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Number of neighborhood fetches served (including failed ones)
    #[must_use]
    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    /// Number of mutation requests received (including failed ones)
    #[must_use]
    pub fn mutation_calls(&self) -> usize {
        self.mutation_calls.load(Ordering::SeqCst)
    }

    /// Make the next mutation of `id` fail.
    pub async fn fail_next_mutation(&self, id: &RelationshipId, failure: ScriptedFailure) {
        self.inner
            .lock()
            .await
            .mutation_failures
            .entry(id.clone())
            .or_default()
            .push_back(failure);
    }

    /// Make the next neighborhood fetch for `focus` fail with a network error.
    pub async fn fail_next_fetch(&self, focus: ObjectId, failure: ScriptedFailure) {
        self.inner
            .lock()
            .await
            .fetch_failures
            .entry(focus)
            .or_default()
            .push_back(failure);
    }

    /// Delay every neighborhood answer for `focus` by `delay`.
    ///
    /// The answer is taken when the request arrives, so changes made while
    /// it is delayed are not part of it.
    pub async fn set_latency(&self, focus: ObjectId, delay: Duration) {
        self.inner.lock().await.latency.insert(focus, delay);
    }

    /// Change a relationship's status as another reviewer would.
    ///
    /// # Errors
    ///
    /// Returns `Error::UnknownEdge` if the relationship doesn't exist.
    pub async fn set_status(&self, id: &RelationshipId, status: LogicalStatus) -> Result<()> {
        let mut inner = self.inner.lock().await;
        let relationship = inner.relationship_mut(id)?;
        relationship.status = Some(status);
        Ok(())
    }

    /// Current server-side copy of a relationship
    pub async fn relationship(&self, id: &RelationshipId) -> Option<Relationship> {
        let inner = self.inner.lock().await;
        inner.relationships.iter().find(|r| &r.id == id).cloned()
    }
}

#[async_trait]
impl RelationshipService for InMemoryService {
    async fn fetch_neighborhood(
        &self,
        _project: &ProjectId,
        focus: ObjectId,
        hops: HopDepth,
    ) -> Result<NeighborhoodGraph> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);

        // The answer reflects the project as it was when the request arrived.
        let (delay, answer) = {
            let mut inner = self.inner.lock().await;
            let failure = inner
                .fetch_failures
                .get_mut(&focus)
                .and_then(VecDeque::pop_front);
            let answer = match failure {
                Some(failure) => {
                    debug!(%focus, ?failure, "Scripted fetch failure");
                    Err(Error::Network(format!(
                        "neighborhood of {focus} unavailable (scripted)"
                    )))
                }
                None => inner.neighborhood(focus, hops),
            };
            (inner.latency.get(&focus).copied(), answer)
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        answer
    }

    async fn mutate_logical_fk(
        &self,
        _project: &ProjectId,
        id: &RelationshipId,
        action: EdgeAction,
        _notes: Option<&str>,
    ) -> Result<()> {
        self.mutation_calls.fetch_add(1, Ordering::SeqCst);

        let mut inner = self.inner.lock().await;
        if let Some(failure) = inner
            .mutation_failures
            .get_mut(id)
            .and_then(VecDeque::pop_front)
        {
            debug!(%id, ?failure, "Scripted mutation failure");
            return Err(failure.into_error(id));
        }
        inner.apply(id, action)
    }

    async fn list_objects(&self, _project: &ProjectId) -> Result<Vec<ObjectSummary>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .order
            .iter()
            .filter_map(|id| inner.objects.get(id))
            .map(|object| ObjectSummary {
                object_id: object.object_id,
                name: object.name.clone(),
                schema_name: object.schema_name.clone(),
            })
            .collect())
    }
}
