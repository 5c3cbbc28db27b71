//! Mermaid diagram generation for graphs
//!
//! # Node Shapes
//!
//! | VertexKind | Shape      | Mermaid Syntax   |
//! |------------|------------|------------------|
//! | Ordinary   | Rectangle  | `id["label"]`    |
//! | Input      | Stadium    | `id(["label"])`  |
//! | Output     | Subroutine | `id[["label"]]`  |
//! | Stateful   | Cylinder   | `id[("label")]`  |
//! | Routing    | Diamond    | `id{"label"}`    |

use std::fmt::Write;

use crate::edge::Edge;
use crate::graph::Graph;
use crate::vertex::{BuildStatus, Vertex, VertexKind};

// ============================================================================
// ID Sanitization
// ============================================================================

/// Replace everything but alphanumerics and underscores with `_`
pub fn sanitize_id(id: &str) -> String {
    id.chars()
        .map(|c| if c.is_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}

fn escape_label(label: &str) -> String {
    label.replace('"', "#quot;")
}

// ============================================================================
// Node Rendering
// ============================================================================

/// Render a node declaration shaped by its kind
pub fn render_node(vertex: &Vertex) -> String {
    let safe_id = sanitize_id(vertex.id().as_str());
    let label = escape_label(vertex.display_name());

    match vertex.kind() {
        VertexKind::Ordinary => format!("    {}[\"{}\"]", safe_id, label),
        VertexKind::Input => format!("    {}([\"{}\"])", safe_id, label),
        VertexKind::Output => format!("    {}[[\"{}\"]]", safe_id, label),
        VertexKind::Stateful => format!("    {}[(\"{}\")]", safe_id, label),
        VertexKind::Routing => format!("    {}{{\"{}\"}}", safe_id, label),
    }
}

/// Render a node with a status class for colouring
pub fn render_node_with_status(vertex: &Vertex) -> String {
    let base = render_node(vertex);
    let class = match vertex.status() {
        BuildStatus::Pending => "pending",
        BuildStatus::Active => "active",
        BuildStatus::Built => "built",
        BuildStatus::Errored => "errored",
        BuildStatus::Skipped => "skipped",
    };
    format!("{}:::{}", base, class)
}

// ============================================================================
// Edge Rendering
// ============================================================================

/// Render an edge
///
/// - Edges out of a routing vertex: dotted, labelled with the source port
/// - Edges into a named port: solid, labelled with the target port
/// - Everything else: plain arrow
pub fn render_edge(edge: &Edge, from_router: bool) -> String {
    let from = sanitize_id(edge.source.as_str());
    let to = sanitize_id(edge.target.as_str());

    if from_router {
        format!("    {} -. \"{}\" .-> {}", from, escape_label(&edge.source_port), to)
    } else if edge.target_port != "input" {
        format!("    {} -- \"{}\" --> {}", from, escape_label(&edge.target_port), to)
    } else {
        format!("    {} --> {}", from, to)
    }
}

// ============================================================================
// Style Definitions
// ============================================================================

/// CSS class definitions for build statuses
pub const STYLE_DEFS: &str = r#"
    classDef pending fill:#F5F5F5,stroke:#A9A9A9,stroke-width:1px
    classDef active fill:#90EE90,stroke:#228B22,stroke-width:2px
    classDef built fill:#D3D3D3,stroke:#696969,stroke-width:1px
    classDef errored fill:#FFB6C1,stroke:#B22222,stroke-width:2px
    classDef skipped fill:#FFE4B5,stroke:#FF8C00,stroke-dasharray:3
"#;

/// Render the whole graph as a top-down flowchart
pub fn render_graph(graph: &Graph, with_status: bool) -> String {
    let mut output = String::from("graph TD\n");

    for vertex in graph.vertices() {
        let node = if with_status {
            render_node_with_status(vertex)
        } else {
            render_node(vertex)
        };
        let _ = writeln!(output, "{}", node);
    }

    output.push('\n');
    for edge in graph.edges() {
        let from_router = graph.vertex(&edge.source).is_some_and(Vertex::is_routing);
        let _ = writeln!(output, "{}", render_edge(edge, from_router));
    }

    if with_status {
        output.push_str(STYLE_DEFS);
    }
    output
}

// ============================================================================
// Tests
// ============================================================================
