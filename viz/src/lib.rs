//! Graphviz rendering of recorded traces.
//!
//! Draws the random variables of a trace recorded with dependency edges:
//! - non-reparameterized latent sites are salmon
//! - reparameterized latent sites are half salmon, half grey
//! - observed sites are green
//!
//! # Entry Point
//!
//! ```no_run
//! use std::path::Path;
//! use tracecheck_model::{GraphType, Trace};
//! use tracecheck_viz::{save_visualization, GraphvizRenderer};
//!
//! let trace = Trace::new(GraphType::Dense);
//! let pdf = save_visualization(&trace, Path::new("output"), &GraphvizRenderer::new())
//!     .expect("Rendering failed");
//! assert!(pdf.ends_with("output.pdf"));
//! ```

#![deny(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    missing_docs,
    clippy::missing_errors_doc
)]

pub mod dot;
pub mod graph;
pub mod render;
pub mod writer;

use std::path::{Path, PathBuf};

use anyhow::Result;
use tracecheck_model::{GraphType, Trace};

pub use graph::{Graph, Node, NodeRole};
pub use render::{DotRenderer, GraphvizRenderer, Renderer};

/// Renders `trace` to `<graph_output>.<ext>` and returns the written path.
///
/// The extension comes from the renderer. Traces recorded without dependency
/// edges are still drawn, with a warning, as disconnected nodes.
///
/// # Errors
///
/// Returns an error if the renderer fails or the file cannot be written.
pub fn save_visualization(
    trace: &Trace,
    graph_output: &Path,
    renderer: &dyn Renderer,
) -> Result<PathBuf> {
    if trace.graph_type() != GraphType::Dense {
        tracing::warn!(
            graph_type = ?trace.graph_type(),
            "trace has no dependency edges; record it as dense to draw them"
        );
    }

    let graph = Graph::from_trace(trace);
    let source = dot::to_dot(&graph);

    let mut path = graph_output.as_os_str().to_owned();
    path.push(".");
    path.push(renderer.extension());
    let path = PathBuf::from(path);

    renderer.render(&source, &path)?;
    tracing::info!(
        path = %path.display(),
        nodes = graph.nodes.len(),
        edges = graph.edges.len(),
        "trace visualization saved"
    );
    Ok(path)
}
