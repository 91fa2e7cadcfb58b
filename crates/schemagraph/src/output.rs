//! Output formatting for CLI commands.
//!
//! Text output mirrors the edge style table of the graph view: declared keys
//! are solid, suggestions amber and dashed, confirmed keys green and dashed,
//! rejected ones muted and dotted. JSON output serializes the same values the
//! view would consume.

use crate::domain::{LogicalStatus, ObjectId, ObjectSummary, RelationshipId, RelationshipType};
use crate::model::{EdgeColor, EdgeStyle, LineStyle};
use crate::render::{Scene, SceneEdge};
use colored::Colorize;
use serde::Serialize;
use std::io::{self, Write};

/// Output format mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Human-readable text format
    Text,
    /// JSON format for programmatic use
    Json,
}

/// Print any serializable value as pretty JSON
pub fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
    let mut stdout = io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, value)?;
    writeln!(stdout)
}

fn line_glyph(line: LineStyle) -> &'static str {
    match line {
        LineStyle::Solid => "────",
        LineStyle::Dashed => "- - ",
        LineStyle::Dotted => "····",
    }
}

fn paint(text: &str, color: EdgeColor, use_colors: bool) -> String {
    if !use_colors {
        return text.to_string();
    }
    match color {
        EdgeColor::Neutral => text.to_string(),
        EdgeColor::Amber => text.yellow().to_string(),
        EdgeColor::Green => text.green().to_string(),
        EdgeColor::Muted => text.dimmed().to_string(),
    }
}

fn status_color(status: LogicalStatus) -> EdgeColor {
    EdgeStyle::for_relationship(RelationshipType::Logical, Some(status), true).color
}

fn write_edge<W: Write>(w: &mut W, scene: &Scene, edge: &SceneEdge, use_colors: bool) -> io::Result<()> {
    let name = |id: ObjectId| {
        scene
            .node(id)
            .map_or_else(|| id.to_string(), |n| format!("{}.{}", n.subtitle, n.title))
    };
    let connector = paint(line_glyph(edge.style.line), edge.style.color, use_colors);
    let mut line = format!(
        "  {} {connector}> {}",
        name(edge.source),
        name(edge.target)
    );
    if let Some(label) = &edge.label {
        line.push_str(&format!("  {}", paint(label, edge.style.color, use_colors)));
    }
    if edge.back_edge {
        line.push_str("  (cycle)");
    }
    if edge.pending {
        line.push_str("  (pending)");
    }
    let id = if use_colors {
        edge.id.as_str().cyan().to_string()
    } else {
        edge.id.to_string()
    };
    writeln!(w, "{line}  [{id}]")
}

/// Write a scene as text: nodes grouped by layer position, then edges.
pub fn write_scene<W: Write>(w: &mut W, scene: &Scene, use_colors: bool) -> io::Result<()> {
    let heading = format!("Neighborhood of {} ({})", scene.focus, scene.direction);
    if use_colors {
        writeln!(w, "{}", heading.bold())?;
    } else {
        writeln!(w, "{heading}")?;
    }
    writeln!(w)?;

    writeln!(w, "Objects ({}):", scene.nodes.len())?;
    for node in &scene.nodes {
        let marker = if node.is_focus { "*" } else { " " };
        writeln!(
            w,
            " {marker} {}.{}  [{}]  at ({:.0}, {:.0})",
            node.subtitle, node.title, node.object_id, node.x, node.y
        )?;
    }
    writeln!(w)?;

    writeln!(w, "Relationships ({}):", scene.edges.len())?;
    for edge in &scene.edges {
        write_edge(w, scene, edge, use_colors)?;
    }

    for offer in &scene.undo_offers {
        writeln!(
            w,
            "Undo available for {} ({}s left)",
            offer.edge_id,
            offer.remaining().as_secs()
        )?;
    }
    Ok(())
}

/// Print a scene
pub fn print_scene(scene: &Scene, mode: OutputMode) -> io::Result<()> {
    match mode {
        OutputMode::Json => print_json(scene),
        OutputMode::Text => write_scene(&mut io::stdout().lock(), scene, true),
    }
}

/// Write catalog search results as text
pub fn write_search_results<W: Write>(w: &mut W, results: &[ObjectSummary]) -> io::Result<()> {
    if results.is_empty() {
        return writeln!(w, "No matching objects");
    }
    for object in results {
        writeln!(w, "{:>8}  {}", object.object_id, object.qualified_name())?;
    }
    Ok(())
}

/// Print catalog search results
pub fn print_search_results(results: &[ObjectSummary], mode: OutputMode) -> io::Result<()> {
    match mode {
        OutputMode::Json => print_json(&results),
        OutputMode::Text => write_search_results(&mut io::stdout().lock(), results),
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EdgeUpdate<'a> {
    id: &'a RelationshipId,
    status: LogicalStatus,
}

/// Print the new status of a relationship after a confirm or reject
pub fn print_edge_update(
    id: &RelationshipId,
    status: LogicalStatus,
    mode: OutputMode,
) -> io::Result<()> {
    match mode {
        OutputMode::Json => print_json(&EdgeUpdate { id, status }),
        OutputMode::Text => {
            let status_text = paint(status.as_str(), status_color(status), true);
            println!("{} is now {status_text}", id.as_str().cyan());
            // Each command runs its own session, so the interactive undo
            // offer ends with the process. A confirm works at any time.
            if status == LogicalStatus::Rejected {
                println!("Run `schemagraph confirm {id}` to confirm it instead");
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::Bounds;
    use crate::render::{SceneNode, UndoAffordance};

    fn node(id: i64, title: &str, is_focus: bool) -> SceneNode {
        SceneNode {
            object_id: ObjectId(id),
            title: title.to_string(),
            subtitle: "public".to_string(),
            column_lines: vec![],
            x: 10.0,
            y: 20.0,
            width: 120.0,
            height: 60.0,
            is_focus,
        }
    }

    fn scene() -> Scene {
        Scene {
            focus: ObjectId(42),
            direction: crate::domain::LayoutDirection::LeftRight,
            nodes: vec![node(42, "orders", true), node(3, "regions", false)],
            edges: vec![SceneEdge {
                id: RelationshipId::new("lfk-1"),
                source: ObjectId(42),
                target: ObjectId(3),
                points: vec![],
                style: EdgeStyle::for_relationship(
                    RelationshipType::Logical,
                    Some(LogicalStatus::Suggested),
                    false,
                ),
                label: Some("SUGGESTED (82%)".to_string()),
                pending: true,
                back_edge: false,
            }],
            undo_offers: vec![UndoAffordance {
                edge_id: RelationshipId::new("lfk-9"),
                remaining_ms: 5_400,
            }],
            bounds: Bounds {
                min_x: 0.0,
                min_y: 0.0,
                max_x: 100.0,
                max_y: 100.0,
            },
        }
    }

    fn render(scene: &Scene) -> String {
        let mut buf = Vec::new();
        write_scene(&mut buf, scene, false).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn scene_text_lists_objects_and_edges() {
        let text = render(&scene());
        assert!(text.starts_with("Neighborhood of 42 (LR)"));
        assert!(text.contains(" * public.orders  [42]"));
        assert!(text.contains("   public.regions  [3]"));
        assert!(text.contains("public.orders - - > public.regions  SUGGESTED (82%)  (pending)  [lfk-1]"));
        assert!(text.contains("Undo available for lfk-9 (5s left)"));
    }

    #[test]
    fn search_results_text() {
        let mut buf = Vec::new();
        write_search_results(
            &mut buf,
            &[ObjectSummary {
                object_id: ObjectId(42),
                name: "orders".to_string(),
                schema_name: "sales".to_string(),
            }],
        )
        .unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), "      42  sales.orders\n");

        let mut buf = Vec::new();
        write_search_results(&mut buf, &[]).unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), "No matching objects\n");
    }

    #[test]
    fn glyphs_follow_line_style() {
        assert_eq!(line_glyph(LineStyle::Solid), "────");
        assert_eq!(line_glyph(LineStyle::Dotted), "····");
    }
}
