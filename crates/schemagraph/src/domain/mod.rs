//! Domain types for entity-relationship neighborhoods.
//!
//! This module contains the wire-level records exchanged with the
//! relationship service (schema objects, relationships, neighborhood graphs)
//! together with the small value types the rest of the crate is built on.

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

/// Identifier of a schema object (table, view, ...)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectId(pub i64);

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for ObjectId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl FromStr for ObjectId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        let id = trimmed.parse::<i64>().map_err(|_| Error::Validation {
            field: "focus object id",
            value: s.to_string(),
            reason: "expected a positive integer".to_string(),
        })?;
        if id <= 0 {
            return Err(Error::Validation {
                field: "focus object id",
                value: s.to_string(),
                reason: "expected a positive integer".to_string(),
            });
        }
        Ok(Self(id))
    }
}

/// Identifier of a column within a schema object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ColumnId(pub i64);

/// Identifier of a relationship (physical or logical foreign key)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RelationshipId(pub String);

impl RelationshipId {
    /// Create a new relationship ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw identifier
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RelationshipId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for RelationshipId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for RelationshipId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Identifier of the active project, supplied by the host page
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectId(pub String);

impl ProjectId {
    /// Create a new project ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A column of a schema object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Column {
    /// Column identifier
    pub column_id: ColumnId,

    /// Column name
    pub name: String,

    /// Declared data type, if known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_type: Option<String>,

    /// Whether the column is part of the primary key
    #[serde(default)]
    pub is_primary_key: bool,
}

/// A node of a neighborhood graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaObject {
    /// Object identifier
    pub object_id: ObjectId,

    /// Object name (e.g. table name)
    pub name: String,

    /// Owning schema
    pub schema_name: String,

    /// Columns, in declaration order
    #[serde(default)]
    pub columns: Vec<Column>,

    /// Hop distance from the focus object (0 for the focus itself)
    pub depth: u32,

    /// Whether this node is the focus object
    #[serde(default)]
    pub is_focus: bool,
}

impl SchemaObject {
    /// `schema.name` form used for display and search
    #[must_use]
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.schema_name, self.name)
    }
}

/// Whether a relationship is declared in the schema or inferred
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelationshipType {
    /// Declared foreign key; an immutable fact
    Physical,

    /// Inferred candidate with a confirmation lifecycle
    Logical,
}

/// Lifecycle status of a logical relationship
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LogicalStatus {
    /// Proposed by the inference engine, awaiting review
    Suggested,

    /// Accepted by a reviewer
    Confirmed,

    /// Dismissed by a reviewer
    Rejected,
}

impl LogicalStatus {
    /// Upper-case wire name, also used in edge labels
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            LogicalStatus::Suggested => "SUGGESTED",
            LogicalStatus::Confirmed => "CONFIRMED",
            LogicalStatus::Rejected => "REJECTED",
        }
    }
}

impl fmt::Display for LogicalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An edge of a neighborhood graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Relationship {
    /// Relationship identifier
    pub id: RelationshipId,

    /// Referencing object
    pub source_object_id: ObjectId,

    /// Referencing column
    pub source_column_id: ColumnId,

    /// Referenced object
    pub target_object_id: ObjectId,

    /// Referenced column
    pub target_column_id: ColumnId,

    /// Physical or logical
    pub relationship_type: RelationshipType,

    /// Review status; only meaningful for logical relationships
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<LogicalStatus>,

    /// Inference confidence in `[0, 1]`, opaque to this crate
    #[serde(default)]
    pub confidence_score: f64,

    /// How the relationship was discovered (e.g. "naming", "data-overlap")
    #[serde(default)]
    pub discovery_method: String,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// When the relationship was confirmed, if it was
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confirmed_at: Option<DateTime<Utc>>,
}

impl Relationship {
    /// Returns `true` for inferred relationships
    #[must_use]
    pub fn is_logical(&self) -> bool {
        self.relationship_type == RelationshipType::Logical
    }

    /// Status used for rendering and transitions.
    ///
    /// Physical relationships have no status. A logical relationship that
    /// arrives without one is treated as `SUGGESTED`.
    #[must_use]
    pub fn logical_status(&self) -> Option<LogicalStatus> {
        match self.relationship_type {
            RelationshipType::Physical => None,
            RelationshipType::Logical => Some(self.status.unwrap_or(LogicalStatus::Suggested)),
        }
    }

    /// Returns `true` if the relationship touches the given object
    #[must_use]
    pub fn touches(&self, object: ObjectId) -> bool {
        self.source_object_id == object || self.target_object_id == object
    }
}

/// The bounded neighborhood of a focus object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NeighborhoodGraph {
    /// The focus object this neighborhood was computed for
    pub focus_object_id: ObjectId,

    /// Objects within the hop bound
    pub nodes: Vec<SchemaObject>,

    /// Relationships between those objects
    pub edges: Vec<Relationship>,
}

impl NeighborhoodGraph {
    /// Look up a node by ID
    #[must_use]
    pub fn node(&self, id: ObjectId) -> Option<&SchemaObject> {
        self.nodes.iter().find(|n| n.object_id == id)
    }

    /// Look up an edge by ID
    #[must_use]
    pub fn edge(&self, id: &RelationshipId) -> Option<&Relationship> {
        self.edges.iter().find(|e| &e.id == id)
    }

    /// Mutable edge lookup, restricted to the crate so that only the
    /// confirmation workflow writes status.
    pub(crate) fn edge_mut(&mut self, id: &RelationshipId) -> Option<&mut Relationship> {
        self.edges.iter_mut().find(|e| &e.id == id)
    }

    /// Returns `true` if the graph contains the given edge
    #[must_use]
    pub fn contains_edge(&self, id: &RelationshipId) -> bool {
        self.edges.iter().any(|e| &e.id == id)
    }

    /// Check the structural invariants of a neighborhood fetched with `hops`.
    ///
    /// - node IDs are unique
    /// - the focus object is present with depth 0
    /// - every depth lies in `[0, hops]`
    /// - every edge endpoint references a node in the graph
    ///
    /// # Errors
    ///
    /// Returns `Error::MalformedResponse` describing the first violation.
    pub fn validate(&self, hops: HopDepth) -> Result<()> {
        let mut ids = HashSet::with_capacity(self.nodes.len());
        for node in &self.nodes {
            if !ids.insert(node.object_id) {
                return Err(Error::MalformedResponse(format!(
                    "duplicate node {}",
                    node.object_id
                )));
            }
            if node.depth > u32::from(hops.get()) {
                return Err(Error::MalformedResponse(format!(
                    "node {} has depth {} beyond {} hops",
                    node.object_id, node.depth, hops
                )));
            }
        }

        match self.node(self.focus_object_id) {
            Some(focus) if focus.depth == 0 => {}
            Some(focus) => {
                return Err(Error::MalformedResponse(format!(
                    "focus node {} has depth {}",
                    focus.object_id, focus.depth
                )));
            }
            None => {
                return Err(Error::MalformedResponse(format!(
                    "focus node {} missing from neighborhood",
                    self.focus_object_id
                )));
            }
        }

        for edge in &self.edges {
            for endpoint in [edge.source_object_id, edge.target_object_id] {
                if !ids.contains(&endpoint) {
                    return Err(Error::MalformedResponse(format!(
                        "edge {} references unknown node {}",
                        edge.id, endpoint
                    )));
                }
            }
        }

        Ok(())
    }
}

/// Catalog entry used as the search source for focus selection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectSummary {
    /// Object identifier
    pub object_id: ObjectId,

    /// Object name
    pub name: String,

    /// Owning schema
    pub schema_name: String,
}

impl ObjectSummary {
    /// `schema.name` form
    #[must_use]
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.schema_name, self.name)
    }
}

/// Minimum neighborhood radius
pub const MIN_HOPS: u8 = 1;

/// Maximum neighborhood radius
pub const MAX_HOPS: u8 = 3;

/// Neighborhood radius, always within `MIN_HOPS..=MAX_HOPS`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct HopDepth(u8);

impl HopDepth {
    /// Validate a raw hop count.
    ///
    /// # Errors
    ///
    /// Returns `Error::Validation` if `hops` is outside `1..=3`.
    pub fn new(hops: u8) -> Result<Self> {
        if (MIN_HOPS..=MAX_HOPS).contains(&hops) {
            Ok(Self(hops))
        } else {
            Err(Error::Validation {
                field: "hops",
                value: hops.to_string(),
                reason: format!("must be between {MIN_HOPS} and {MAX_HOPS}"),
            })
        }
    }

    /// The raw hop count
    #[must_use]
    pub fn get(self) -> u8 {
        self.0
    }
}

impl Default for HopDepth {
    fn default() -> Self {
        Self(2)
    }
}

impl TryFrom<u8> for HopDepth {
    type Error = Error;

    fn try_from(hops: u8) -> Result<Self> {
        Self::new(hops)
    }
}

impl From<HopDepth> for u8 {
    fn from(hops: HopDepth) -> Self {
        hops.0
    }
}

impl fmt::Display for HopDepth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Axis along which layers are stacked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum LayoutDirection {
    /// Layers flow left to right
    #[default]
    #[serde(rename = "LR")]
    LeftRight,

    /// Layers flow top to bottom
    #[serde(rename = "TB")]
    TopBottom,
}

impl LayoutDirection {
    /// Short wire name
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            LayoutDirection::LeftRight => "LR",
            LayoutDirection::TopBottom => "TB",
        }
    }
}

impl fmt::Display for LayoutDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LayoutDirection {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "LR" | "LEFT_RIGHT" | "HORIZONTAL" => Ok(LayoutDirection::LeftRight),
            "TB" | "TOP_BOTTOM" | "VERTICAL" => Ok(LayoutDirection::TopBottom),
            _ => Err(Error::Validation {
                field: "direction",
                value: s.to_string(),
                reason: "expected LR or TB".to_string(),
            }),
        }
    }
}

/// A reviewer action on a logical relationship
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeAction {
    /// Accept the relationship
    Confirm,

    /// Dismiss the relationship
    Reject,
}

impl EdgeAction {
    /// Path segment used by the mutation endpoints
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeAction::Confirm => "confirm",
            EdgeAction::Reject => "reject",
        }
    }

    /// The status this action settles into
    #[must_use]
    pub fn target_status(&self) -> LogicalStatus {
        match self {
            EdgeAction::Confirm => LogicalStatus::Confirmed,
            EdgeAction::Reject => LogicalStatus::Rejected,
        }
    }
}

impl fmt::Display for EdgeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
