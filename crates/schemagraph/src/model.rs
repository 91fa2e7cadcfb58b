//! Renderable graph model.
//!
//! [`GraphModelBuilder::build`] is a pure transform from a fetched
//! [`NeighborhoodGraph`] into a [`RenderableGraph`]: nodes sized to their
//! content and edges tagged with a style and label derived from
//! `(relationship type, status)`:
//!
//! | type     | status    | style                                   |
//! |----------|-----------|-----------------------------------------|
//! | PHYSICAL | -         | solid, neutral                          |
//! | LOGICAL  | SUGGESTED | dashed, amber                           |
//! | LOGICAL  | CONFIRMED | dashed, green                           |
//! | LOGICAL  | REJECTED  | hidden, or dotted and muted when shown  |
//!
//! Input order of nodes and edges is preserved; the layout relies on it.

use crate::domain::{
    LogicalStatus, NeighborhoodGraph, ObjectId, Relationship, RelationshipId, RelationshipType,
    SchemaObject,
};
use serde::{Deserialize, Serialize};

/// Line pattern of an edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineStyle {
    /// Continuous line
    Solid,
    /// Dashed line
    Dashed,
    /// Dotted line
    Dotted,
}

/// Semantic color of an edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeColor {
    /// Declared foreign keys
    Neutral,
    /// Awaiting review
    Amber,
    /// Confirmed
    Green,
    /// De-emphasized
    Muted,
}

/// Visual tag of an edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EdgeStyle {
    /// Line pattern
    pub line: LineStyle,
    /// Color
    pub color: EdgeColor,
    /// Whether the edge is drawn at all
    pub visible: bool,
}

impl EdgeStyle {
    /// Style for a relationship of the given type and status.
    ///
    /// `status` is ignored for physical relationships; a logical one without
    /// status is styled as suggested.
    #[must_use]
    pub fn for_relationship(
        relationship_type: RelationshipType,
        status: Option<LogicalStatus>,
        show_rejected: bool,
    ) -> Self {
        let (line, color, visible) = match (relationship_type, status) {
            (RelationshipType::Physical, _) => (LineStyle::Solid, EdgeColor::Neutral, true),
            (RelationshipType::Logical, None | Some(LogicalStatus::Suggested)) => {
                (LineStyle::Dashed, EdgeColor::Amber, true)
            }
            (RelationshipType::Logical, Some(LogicalStatus::Confirmed)) => {
                (LineStyle::Dashed, EdgeColor::Green, true)
            }
            (RelationshipType::Logical, Some(LogicalStatus::Rejected)) => {
                (LineStyle::Dotted, EdgeColor::Muted, show_rejected)
            }
        };
        Self {
            line,
            color,
            visible,
        }
    }
}

/// Label of a logical edge: `"{STATUS} ({percent}%)"`.
///
/// The confidence is clamped into `[0, 1]` and rounded to a whole percent.
#[must_use]
pub fn edge_label(status: LogicalStatus, confidence: f64) -> String {
    let clamped = if confidence.is_finite() {
        confidence.clamp(0.0, 1.0)
    } else {
        0.0
    };
    // Value is within 0..=100, so the cast is lossless.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let percent = (clamped * 100.0).round() as u32;
    format!("{status} ({percent}%)")
}

/// Sizing rules for node boxes
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct NodeMetrics {
    /// Width of one character
    pub char_width: f32,
    /// Height of the title block
    pub header_height: f32,
    /// Height of one column row
    pub row_height: f32,
    /// Inner padding on every side
    pub padding: f32,
    /// Narrowest box
    pub min_width: f32,
    /// Column rows listed before collapsing the rest into a summary row
    pub max_columns: usize,
}

impl Default for NodeMetrics {
    fn default() -> Self {
        Self {
            char_width: 7.5,
            header_height: 36.0,
            row_height: 18.0,
            padding: 8.0,
            min_width: 120.0,
            max_columns: 12,
        }
    }
}

/// A node ready for layout and rendering
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderNode {
    /// Object identifier
    pub object_id: ObjectId,
    /// Object name
    pub title: String,
    /// Owning schema
    pub subtitle: String,
    /// One text line per listed column
    pub column_lines: Vec<String>,
    /// Hop distance from the focus
    pub depth: u32,
    /// Whether this is the focus object
    pub is_focus: bool,
    /// Box width
    pub width: f32,
    /// Box height
    pub height: f32,
}

/// An edge ready for layout and rendering
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderEdge {
    /// Relationship identifier
    pub id: RelationshipId,
    /// Referencing object
    pub source: ObjectId,
    /// Referenced object
    pub target: ObjectId,
    /// Physical or logical
    pub relationship_type: RelationshipType,
    /// Status at build time (logical edges only)
    pub status: Option<LogicalStatus>,
    /// Inference confidence
    pub confidence: f64,
    /// Visual tag
    pub style: EdgeStyle,
    /// Label (logical edges only)
    pub label: Option<String>,
}

/// The renderable form of a neighborhood
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderableGraph {
    /// Focus object
    pub focus: ObjectId,
    /// Nodes in input order
    pub nodes: Vec<RenderNode>,
    /// Edges in input order, including hidden ones
    pub edges: Vec<RenderEdge>,
}

impl RenderableGraph {
    /// Look up a node by ID
    #[must_use]
    pub fn node(&self, id: ObjectId) -> Option<&RenderNode> {
        self.nodes.iter().find(|n| n.object_id == id)
    }

    /// Look up an edge by ID
    #[must_use]
    pub fn edge(&self, id: &RelationshipId) -> Option<&RenderEdge> {
        self.edges.iter().find(|e| &e.id == id)
    }

    /// Edges that are drawn
    pub fn visible_edges(&self) -> impl Iterator<Item = &RenderEdge> {
        self.edges.iter().filter(|e| e.style.visible)
    }
}

/// Builds [`RenderableGraph`]s. Holds only its configuration.
#[derive(Debug, Clone, Copy, Default)]
pub struct GraphModelBuilder {
    metrics: NodeMetrics,
    show_rejected: bool,
}

impl GraphModelBuilder {
    /// Create a builder
    #[must_use]
    pub fn new(metrics: NodeMetrics, show_rejected: bool) -> Self {
        Self {
            metrics,
            show_rejected,
        }
    }

    /// Whether rejected logical edges are drawn de-emphasized
    #[must_use]
    pub fn show_rejected(&self) -> bool {
        self.show_rejected
    }

    /// Build the renderable model of `graph`.
    #[must_use]
    pub fn build(&self, graph: &NeighborhoodGraph) -> RenderableGraph {
        RenderableGraph {
            focus: graph.focus_object_id,
            nodes: graph
                .nodes
                .iter()
                .map(|n| self.build_node(n, graph.focus_object_id))
                .collect(),
            edges: graph.edges.iter().map(|e| self.build_edge(e)).collect(),
        }
    }

    fn build_edge(&self, edge: &Relationship) -> RenderEdge {
        let status = edge.logical_status();
        RenderEdge {
            id: edge.id.clone(),
            source: edge.source_object_id,
            target: edge.target_object_id,
            relationship_type: edge.relationship_type,
            status,
            confidence: edge.confidence_score,
            style: EdgeStyle::for_relationship(edge.relationship_type, status, self.show_rejected),
            label: status.map(|s| edge_label(s, edge.confidence_score)),
        }
    }

    fn build_node(&self, node: &SchemaObject, focus: ObjectId) -> RenderNode {
        let m = &self.metrics;
        let mut column_lines: Vec<String> = node
            .columns
            .iter()
            .take(m.max_columns)
            .map(|c| {
                let mut line = c.name.clone();
                if let Some(data_type) = &c.data_type {
                    line.push(' ');
                    line.push_str(data_type);
                }
                if c.is_primary_key {
                    line.push_str(" PK");
                }
                line
            })
            .collect();
        let hidden = node.columns.len().saturating_sub(m.max_columns);
        if hidden > 0 {
            column_lines.push(format!("... {hidden} more"));
        }

        let widest = column_lines
            .iter()
            .map(|l| l.chars().count())
            .chain([node.name.chars().count(), node.schema_name.chars().count()])
            .max()
            .unwrap_or(0);

        #[allow(clippy::cast_precision_loss)]
        let width = (widest as f32 * m.char_width + 2.0 * m.padding).max(m.min_width);
        #[allow(clippy::cast_precision_loss)]
        let height = m.header_height + column_lines.len() as f32 * m.row_height + m.padding;

        RenderNode {
            object_id: node.object_id,
            title: node.name.clone(),
            subtitle: node.schema_name.clone(),
            column_lines,
            depth: node.depth,
            is_focus: node.is_focus || node.object_id == focus,
            width,
            height,
        }
    }
}
