//! Error types for schemagraph operations.

use crate::domain::{EdgeAction, LogicalStatus, ObjectId, RelationshipId};
use std::io;
use thiserror::Error;

/// The error type for schemagraph operations.
///
/// No variant is fatal to a session: every failure leaves the view
/// interactive and can be retried by repeating the user action.
#[derive(Debug, Error)]
pub enum Error {
    /// Input rejected before any network call was issued.
    #[error("Invalid {field}: '{value}' ({reason})")]
    Validation {
        /// The field name that had an invalid value.
        field: &'static str,
        /// The invalid value that was provided.
        value: String,
        /// Why the value was rejected.
        reason: String,
    },

    /// The focus object does not exist in the project.
    #[error("Object not found: {0}")]
    NotFound(ObjectId),

    /// Transport failure or unexpected response from the relationship service.
    #[error("Network error: {0}")]
    Network(String),

    /// The relationship was transitioned by another actor.
    #[error("Relationship {0} was changed by someone else")]
    MutationConflict(RelationshipId),

    /// A mutation for the relationship is already in flight.
    #[error("Relationship {0} already has a pending change")]
    EdgeBusy(RelationshipId),

    /// The action is not offered for the relationship's current status.
    #[error("Cannot {action} relationship {id} while it is {status}")]
    InvalidTransition {
        /// The relationship the action targeted.
        id: RelationshipId,
        /// The refused action.
        action: EdgeAction,
        /// The status at the time of the request.
        status: LogicalStatus,
    },

    /// Physical foreign keys have no review lifecycle.
    #[error("Relationship {0} is a physical foreign key and cannot be changed")]
    ImmutableRelationship(RelationshipId),

    /// The relationship is not part of the current neighborhood.
    #[error("Relationship not found: {0}")]
    UnknownEdge(RelationshipId),

    /// No undo offer is open for the relationship, or its window closed.
    #[error("Undo is no longer available for relationship {0}")]
    UndoExpired(RelationshipId),

    /// A newer action on the relationship replaced the one being settled.
    #[error("A newer change to relationship {0} replaced this one")]
    SupersededMutation(RelationshipId),

    /// The service answered with a graph that violates neighborhood invariants.
    #[error("Malformed neighborhood: {0}")]
    MalformedResponse(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error occurred.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Returns `true` if repeating the same action may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::Network(_) | Error::MutationConflict(_) | Error::EdgeBusy(_)
        )
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Network(e.to_string())
    }
}

/// A specialized Result type for schemagraph operations.
pub type Result<T> = std::result::Result<T, Error>;
