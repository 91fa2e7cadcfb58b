//! Layered layout of neighborhood graphs.
//!
//! Nodes are grouped into layers by hop depth, with the focus node alone in
//! the anchor layer 0. Within a layer, nodes keep their input order so that a
//! re-layout of a similar graph does not reshuffle the picture. Layers are
//! stacked along the main axis (x for `LR`, y for `TB`) and each layer is
//! centered on the cross axis.
//!
//! # Cycles
//!
//! Relationship graphs may contain cycles (a logical key pointing back to an
//! ancestor, or a self-referencing table). A depth-first search starting at the
//! focus marks the cycle-closing edges as back edges. Back edges never affect
//! layer assignment; they are only routed differently, around the node band.
//!
//! # Determinism
//!
//! The same `(graph, direction, focus)` always yields the same [`Layout`]:
//! every iteration is over input-ordered vectors and hash maps are used for
//! lookups only. Runs in `O(V + E)`.

use crate::domain::{LayoutDirection, ObjectId, RelationshipId};
use crate::model::{RenderNode, RenderableGraph};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::{DfsEvent, depth_first_search};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::trace;

/// Spacing used by [`LayeredLayout`]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct LayoutConfig {
    /// Gap between neighboring nodes of a layer
    pub node_spacing: f32,
    /// Gap between consecutive layers
    pub rank_spacing: f32,
    /// Distance between detour lanes of back edges
    pub loop_offset: f32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            node_spacing: 40.0,
            rank_spacing: 120.0,
            loop_offset: 28.0,
        }
    }
}

/// A point in layout coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Point {
    /// Horizontal coordinate
    pub x: f32,
    /// Vertical coordinate
    pub y: f32,
}

/// Position of one node; `x`/`y` are the center of its box
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodePosition {
    /// Object identifier
    pub object_id: ObjectId,
    /// Center x
    pub x: f32,
    /// Center y
    pub y: f32,
    /// Box width
    pub width: f32,
    /// Box height
    pub height: f32,
    /// Layer index, 0 for the focus
    pub layer: usize,
}

/// Polyline along which an edge is drawn
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeRoute {
    /// Relationship identifier
    pub id: RelationshipId,
    /// Points from source to target
    pub points: Vec<Point>,
    /// Whether the edge closes a cycle
    pub back_edge: bool,
}

/// Axis-aligned extent of a layout
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Bounds {
    /// Smallest x
    pub min_x: f32,
    /// Smallest y
    pub min_y: f32,
    /// Largest x
    pub max_x: f32,
    /// Largest y
    pub max_y: f32,
}

impl Bounds {
    const EMPTY: Bounds = Bounds {
        min_x: 0.0,
        min_y: 0.0,
        max_x: 0.0,
        max_y: 0.0,
    };

    fn include(&mut self, p: Point) {
        self.min_x = self.min_x.min(p.x);
        self.min_y = self.min_y.min(p.y);
        self.max_x = self.max_x.max(p.x);
        self.max_y = self.max_y.max(p.y);
    }

    /// Width of the extent
    #[must_use]
    pub fn width(&self) -> f32 {
        self.max_x - self.min_x
    }

    /// Height of the extent
    #[must_use]
    pub fn height(&self) -> f32 {
        self.max_y - self.min_y
    }
}

/// Computed positions and routes. Ephemeral; never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Layout {
    /// Direction the layout was computed for
    pub direction: LayoutDirection,
    /// One position per node, in input order
    pub positions: Vec<NodePosition>,
    /// One route per visible edge, in input order
    pub routes: Vec<EdgeRoute>,
    /// Overall extent, including detour lanes
    pub bounds: Bounds,
}

impl Layout {
    /// Position of a node
    #[must_use]
    pub fn position(&self, id: ObjectId) -> Option<&NodePosition> {
        self.positions.iter().find(|p| p.object_id == id)
    }

    /// Route of an edge
    #[must_use]
    pub fn route(&self, id: &RelationshipId) -> Option<&EdgeRoute> {
        self.routes.iter().find(|r| &r.id == id)
    }

    /// Number of layers
    #[must_use]
    pub fn layer_count(&self) -> usize {
        self.positions.iter().map(|p| p.layer + 1).max().unwrap_or(0)
    }
}

/// Assigns positions to the nodes of a renderable graph.
///
/// Implementations must be deterministic and fast enough to run
/// synchronously between frames for graphs of tens of nodes.
pub trait LayoutEngine: Send + Sync {
    /// Lay out `graph` along `direction`, anchored on `focus`.
    fn layout(&self, graph: &RenderableGraph, direction: LayoutDirection, focus: ObjectId)
    -> Layout;
}

/// Layered (hierarchical) layout keyed on hop depth.
#[derive(Debug, Clone, Copy, Default)]
pub struct LayeredLayout {
    config: LayoutConfig,
}

impl LayeredLayout {
    /// Create a layout engine with the given spacing
    #[must_use]
    pub fn new(config: LayoutConfig) -> Self {
        Self { config }
    }
}

/// Find the visible edges that close a cycle.
///
/// The search starts at `focus` and then continues from the remaining nodes
/// in input order, so the result depends only on the graph. Self-references
/// are always back edges.
#[must_use]
pub fn find_back_edges(graph: &RenderableGraph, focus: ObjectId) -> HashSet<RelationshipId> {
    let mut digraph: DiGraph<ObjectId, usize> =
        DiGraph::with_capacity(graph.nodes.len(), graph.edges.len());
    let node_map: HashMap<ObjectId, NodeIndex> = graph
        .nodes
        .iter()
        .map(|n| (n.object_id, digraph.add_node(n.object_id)))
        .collect();

    let mut edge_ends = Vec::new();
    for (i, edge) in graph.edges.iter().enumerate() {
        if !edge.style.visible {
            continue;
        }
        if let (Some(&s), Some(&t)) = (node_map.get(&edge.source), node_map.get(&edge.target)) {
            digraph.add_edge(s, t, i);
            edge_ends.push((i, s, t));
        }
    }

    let starts: Vec<NodeIndex> = node_map
        .get(&focus)
        .copied()
        .into_iter()
        .chain(graph.nodes.iter().map(|n| node_map[&n.object_id]))
        .collect();

    let mut back_pairs: HashSet<(NodeIndex, NodeIndex)> = HashSet::new();
    depth_first_search(&digraph, starts, |event| {
        if let DfsEvent::BackEdge(u, v) = event {
            back_pairs.insert((u, v));
        }
    });

    edge_ends
        .into_iter()
        .filter(|(_, s, t)| back_pairs.contains(&(*s, *t)))
        .map(|(i, _, _)| graph.edges[i].id.clone())
        .collect()
}

/// A node placed on the (main, cross) axes before mapping to x/y.
#[derive(Debug, Clone, Copy)]
struct Placed {
    main: f32,
    cross: f32,
    main_extent: f32,
    cross_extent: f32,
    layer: usize,
}

impl Placed {
    fn near_side(&self) -> f32 {
        self.cross - self.cross_extent / 2.0
    }
}

impl LayoutEngine for LayeredLayout {
    fn layout(
        &self,
        graph: &RenderableGraph,
        direction: LayoutDirection,
        focus: ObjectId,
    ) -> Layout {
        let horizontal = direction == LayoutDirection::LeftRight;
        let main_extent = |n: &RenderNode| if horizontal { n.width } else { n.height };
        let cross_extent = |n: &RenderNode| if horizontal { n.height } else { n.width };
        let to_point = |main: f32, cross: f32| {
            if horizontal {
                Point { x: main, y: cross }
            } else {
                Point { x: cross, y: main }
            }
        };

        // Layer assignment: focus alone in layer 0, others by depth.
        let has_focus = graph.nodes.iter().any(|n| n.object_id == focus);
        let mut buckets: BTreeMap<u32, Vec<usize>> = BTreeMap::new();
        for (i, node) in graph.nodes.iter().enumerate() {
            let key = if !has_focus {
                node.depth
            } else if node.object_id == focus {
                0
            } else {
                node.depth.max(1)
            };
            buckets.entry(key).or_default().push(i);
        }
        let layers: Vec<Vec<usize>> = buckets.into_values().collect();

        let mut placed = vec![
            Placed {
                main: 0.0,
                cross: 0.0,
                main_extent: 0.0,
                cross_extent: 0.0,
                layer: 0,
            };
            graph.nodes.len()
        ];

        let spans: Vec<f32> = layers
            .iter()
            .map(|layer| {
                let total: f32 = layer.iter().map(|&i| cross_extent(&graph.nodes[i])).sum();
                #[allow(clippy::cast_precision_loss)]
                let gaps = layer.len().saturating_sub(1) as f32 * self.config.node_spacing;
                total + gaps
            })
            .collect();
        let widest = spans.iter().copied().fold(0.0_f32, f32::max);

        let mut main_cursor = 0.0_f32;
        for (layer_index, layer) in layers.iter().enumerate() {
            let thickness = layer
                .iter()
                .map(|&i| main_extent(&graph.nodes[i]))
                .fold(0.0_f32, f32::max);
            let main = main_cursor + thickness / 2.0;
            let mut cross_cursor = (widest - spans[layer_index]) / 2.0;

            for &i in layer {
                let node = &graph.nodes[i];
                let extent = cross_extent(node);
                placed[i] = Placed {
                    main,
                    cross: cross_cursor + extent / 2.0,
                    main_extent: main_extent(node),
                    cross_extent: extent,
                    layer: layer_index,
                };
                cross_cursor += extent + self.config.node_spacing;
            }
            main_cursor += thickness + self.config.rank_spacing;
        }

        let mut bounds = Bounds::EMPTY;
        let positions: Vec<NodePosition> = graph
            .nodes
            .iter()
            .zip(&placed)
            .map(|(node, p)| {
                let center = to_point(p.main, p.cross);
                bounds.include(Point {
                    x: center.x - node.width / 2.0,
                    y: center.y - node.height / 2.0,
                });
                bounds.include(Point {
                    x: center.x + node.width / 2.0,
                    y: center.y + node.height / 2.0,
                });
                NodePosition {
                    object_id: node.object_id,
                    x: center.x,
                    y: center.y,
                    width: node.width,
                    height: node.height,
                    layer: p.layer,
                }
            })
            .collect();

        // Edge routing.
        let back_edges = find_back_edges(graph, focus);
        let index: HashMap<ObjectId, usize> = graph
            .nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (n.object_id, i))
            .collect();

        let mut lanes_used = 0_u16;
        let mut routes = Vec::new();
        for edge in graph.visible_edges() {
            let (Some(&si), Some(&ti)) = (index.get(&edge.source), index.get(&edge.target)) else {
                continue;
            };
            let (s, t) = (placed[si], placed[ti]);
            let back_edge = back_edges.contains(&edge.id);

            let axis_points: Vec<(f32, f32)> = if si != ti && !back_edge && s.layer != t.layer {
                let dir = if t.main > s.main { 1.0 } else { -1.0 };
                let start = (s.main + dir * s.main_extent / 2.0, s.cross);
                let end = (t.main - dir * t.main_extent / 2.0, t.cross);
                if (start.1 - end.1).abs() < f32::EPSILON {
                    vec![start, end]
                } else {
                    let mid = (start.0 + end.0) / 2.0;
                    vec![start, (mid, start.1), (mid, end.1), end]
                }
            } else {
                // Detour through a lane before the first node of the band.
                lanes_used += 1;
                let lane = -self.config.loop_offset * f32::from(lanes_used);
                let (start_main, end_main) = if si == ti {
                    (s.main - s.main_extent / 4.0, s.main + s.main_extent / 4.0)
                } else {
                    (s.main, t.main)
                };
                vec![
                    (start_main, s.near_side()),
                    (start_main, lane),
                    (end_main, lane),
                    (end_main, t.near_side()),
                ]
            };

            let points: Vec<Point> = axis_points
                .into_iter()
                .map(|(main, cross)| to_point(main, cross))
                .collect();
            for p in &points {
                bounds.include(*p);
            }
            routes.push(EdgeRoute {
                id: edge.id.clone(),
                points,
                back_edge,
            });
        }

        trace!(
            nodes = positions.len(),
            routes = routes.len(),
            back_edges = back_edges.len(),
            layers = layers.len(),
            "Computed layered layout"
        );

        Layout {
            direction,
            positions,
            routes,
            bounds,
        }
    }
}
