//! Presentation of the current view.
//!
//! [`RenderAdapter::render`] combines the renderable model, its layout and the
//! live review state into a [`Scene`]. Styles and labels of logical edges are
//! recomputed from the *effective* status, so a tentative confirm or reject
//! shows up immediately without rebuilding the model.

use crate::confirmation::FkConfirmationStateMachine;
use crate::domain::{LayoutDirection, ObjectId, RelationshipId, RelationshipType};
use crate::layout::{Bounds, Layout, Point};
use crate::model::{EdgeStyle, RenderableGraph, edge_label};
use serde::Serialize;
use std::time::Duration;
use tokio::time::Instant;

/// A positioned node box
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneNode {
    /// Object identifier
    pub object_id: ObjectId,
    /// Object name
    pub title: String,
    /// Owning schema
    pub subtitle: String,
    /// Column rows
    pub column_lines: Vec<String>,
    /// Center x
    pub x: f32,
    /// Center y
    pub y: f32,
    /// Box width
    pub width: f32,
    /// Box height
    pub height: f32,
    /// Whether this is the focus object
    pub is_focus: bool,
}

/// A drawn edge
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneEdge {
    /// Relationship identifier
    pub id: RelationshipId,
    /// Referencing object
    pub source: ObjectId,
    /// Referenced object
    pub target: ObjectId,
    /// Polyline to draw
    pub points: Vec<Point>,
    /// Visual tag for the effective status
    pub style: EdgeStyle,
    /// Label for the effective status (logical edges only)
    pub label: Option<String>,
    /// A mutation for the edge is in flight
    pub pending: bool,
    /// The edge closes a cycle
    pub back_edge: bool,
}

/// An undo button with its countdown
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UndoAffordance {
    /// The rejected edge
    pub edge_id: RelationshipId,
    /// Milliseconds left
    pub remaining_ms: u64,
}

impl UndoAffordance {
    /// Time left as a duration
    #[must_use]
    pub fn remaining(&self) -> Duration {
        Duration::from_millis(self.remaining_ms)
    }
}

/// Everything needed to draw one frame
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Scene {
    /// Focus object
    pub focus: ObjectId,
    /// Layering axis
    pub direction: LayoutDirection,
    /// Node boxes in input order
    pub nodes: Vec<SceneNode>,
    /// Drawn edges in input order
    pub edges: Vec<SceneEdge>,
    /// Open undo offers
    pub undo_offers: Vec<UndoAffordance>,
    /// Overall extent
    pub bounds: Bounds,
}

impl Scene {
    /// Look up a drawn edge
    #[must_use]
    pub fn edge(&self, id: &RelationshipId) -> Option<&SceneEdge> {
        self.edges.iter().find(|e| &e.id == id)
    }

    /// Look up a node box
    #[must_use]
    pub fn node(&self, id: ObjectId) -> Option<&SceneNode> {
        self.nodes.iter().find(|n| n.object_id == id)
    }

    /// Undo affordance for an edge
    #[must_use]
    pub fn undo_offer(&self, id: &RelationshipId) -> Option<&UndoAffordance> {
        self.undo_offers.iter().find(|u| &u.edge_id == id)
    }
}

/// Maps model, layout and review state to a [`Scene`].
#[derive(Debug, Clone, Copy, Default)]
pub struct RenderAdapter {
    show_rejected: bool,
}

impl RenderAdapter {
    /// Create an adapter
    #[must_use]
    pub fn new(show_rejected: bool) -> Self {
        Self { show_rejected }
    }

    /// Compose one frame at instant `now`.
    #[must_use]
    pub fn render(
        &self,
        model: &RenderableGraph,
        layout: &Layout,
        review: &FkConfirmationStateMachine,
        now: Instant,
    ) -> Scene {
        let nodes = model
            .nodes
            .iter()
            .filter_map(|node| {
                let position = layout.position(node.object_id)?;
                Some(SceneNode {
                    object_id: node.object_id,
                    title: node.title.clone(),
                    subtitle: node.subtitle.clone(),
                    column_lines: node.column_lines.clone(),
                    x: position.x,
                    y: position.y,
                    width: position.width,
                    height: position.height,
                    is_focus: node.is_focus,
                })
            })
            .collect();

        let mut edges = Vec::new();
        for edge in &model.edges {
            let status = match edge.relationship_type {
                RelationshipType::Physical => None,
                RelationshipType::Logical => review.status(&edge.id).or(edge.status),
            };
            let style = EdgeStyle::for_relationship(edge.relationship_type, status, self.show_rejected);
            if !style.visible {
                continue;
            }

            let (points, back_edge) = match layout.route(&edge.id) {
                Some(route) => (route.points.clone(), route.back_edge),
                // Hidden when laid out, visible now: draw center to center.
                None => match (layout.position(edge.source), layout.position(edge.target)) {
                    (Some(s), Some(t)) => (
                        vec![Point { x: s.x, y: s.y }, Point { x: t.x, y: t.y }],
                        false,
                    ),
                    _ => continue,
                },
            };

            edges.push(SceneEdge {
                id: edge.id.clone(),
                source: edge.source,
                target: edge.target,
                points,
                style,
                label: status.map(|s| edge_label(s, edge.confidence)),
                pending: review.is_pending(&edge.id),
                back_edge,
            });
        }

        let undo_offers = review
            .undo_offers()
            .filter_map(|(id, offer)| {
                let remaining = offer.remaining(now);
                (!remaining.is_zero()).then(|| UndoAffordance {
                    edge_id: id.clone(),
                    remaining_ms: u64::try_from(remaining.as_millis()).unwrap_or(u64::MAX),
                })
            })
            .collect();

        Scene {
            focus: model.focus,
            direction: layout.direction,
            nodes,
            edges,
            undo_offers,
            bounds: layout.bounds,
        }
    }
}
