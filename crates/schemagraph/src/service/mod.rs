//! Relationship service abstraction.
//!
//! The relationship service is the external collaborator that owns schema
//! objects, foreign keys and the inference engine's logical candidates. This
//! module defines the seam the rest of the crate talks to:
//!
//! - **HTTP**: [`http::HttpRelationshipService`], the REST client used in
//!   production
//! - **In-memory**: [`in_memory::InMemoryService`], a self-contained backend
//!   computing neighborhoods from a fixture; used by `--fixture` and tests
//!
//! # Error Handling
//!
//! Implementations map their failures onto the crate error:
//! - `NotFound`: the focus object does not exist
//! - `UnknownEdge`: the relationship does not exist
//! - `MutationConflict`: the relationship was transitioned by another actor
//! - `Network`: any transport failure or unexpected response
//!
//! Nothing is retried here; retry policy belongs to the caller.

use crate::domain::{
    EdgeAction, HopDepth, NeighborhoodGraph, ObjectId, ObjectSummary, ProjectId, RelationshipId,
};
use crate::error::Result;
use async_trait::async_trait;

pub mod http;
pub mod in_memory;

pub use http::HttpRelationshipService;
pub use in_memory::{CatalogObject, Fixture, InMemoryService, ScriptedFailure};

/// Core trait for talking to the relationship service.
///
/// Implementations must be `Send + Sync` so a single instance can be shared
/// between the neighborhood fetcher and in-flight mutations.
#[async_trait]
pub trait RelationshipService: Send + Sync {
    /// Fetch the neighborhood of `focus` within `hops`.
    ///
    /// # Errors
    ///
    /// - `Error::NotFound` if the focus object doesn't exist
    /// - `Error::Network` on transport failure
    async fn fetch_neighborhood(
        &self,
        project: &ProjectId,
        focus: ObjectId,
        hops: HopDepth,
    ) -> Result<NeighborhoodGraph>;

    /// Apply a review action to a logical foreign key.
    ///
    /// # Errors
    ///
    /// - `Error::UnknownEdge` if the relationship doesn't exist
    /// - `Error::MutationConflict` if the relationship was changed concurrently
    /// - `Error::Network` on transport failure
    async fn mutate_logical_fk(
        &self,
        project: &ProjectId,
        id: &RelationshipId,
        action: EdgeAction,
        notes: Option<&str>,
    ) -> Result<()>;

    /// List the objects of a project, used as the search source.
    async fn list_objects(&self, project: &ProjectId) -> Result<Vec<ObjectSummary>>;

    /// Confirm a logical foreign key.
    async fn confirm_logical_fk(
        &self,
        project: &ProjectId,
        id: &RelationshipId,
        notes: Option<&str>,
    ) -> Result<()> {
        self.mutate_logical_fk(project, id, EdgeAction::Confirm, notes)
            .await
    }

    /// Reject a logical foreign key.
    async fn reject_logical_fk(
        &self,
        project: &ProjectId,
        id: &RelationshipId,
        notes: Option<&str>,
    ) -> Result<()> {
        self.mutate_logical_fk(project, id, EdgeAction::Reject, notes)
            .await
    }
}
