//! Graphviz DOT serializer.
//!
//! Every node is an ellipse filled with its role color. Identifiers are
//! always quoted, so site names need no further restriction.

use crate::graph::Graph;

/// Serializes `graph` as a DOT `digraph`.
#[must_use]
pub fn to_dot(graph: &Graph) -> String {
    let mut out = String::with_capacity(64 * (graph.nodes.len() + graph.edges.len() + 1));
    out.push_str("digraph {\n");

    for node in &graph.nodes {
        out.push_str(&format!(
            "\t{} [label={} fillcolor={} shape=ellipse style=filled]\n",
            dot_string(&node.name),
            dot_string(&node.name),
            dot_string(node.role.fill_color())
        ));
    }

    for (from, to) in &graph.edges {
        out.push_str(&format!("\t{} -> {}\n", dot_string(from), dot_string(to)));
    }

    out.push_str("}\n");
    out
}

fn dot_string(s: &str) -> String {
    let escaped = s
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\r', "")
        .replace('\n', "\\n");
    format!("\"{}\"", escaped)
}
