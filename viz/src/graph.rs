//! Render-ready view of a trace's random variables.

use tracecheck_model::{Site, Trace};

/// How a random variable is drawn, which decides its fill color.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeRole {
    /// Latent site without reparameterized sampling.
    Stochastic,
    /// Latent site with reparameterized sampling.
    Reparameterized,
    /// Site conditioned on data.
    Observed,
}

impl NodeRole {
    /// Graphviz `fillcolor` for the role.
    #[must_use]
    pub fn fill_color(self) -> &'static str {
        match self {
            NodeRole::Stochastic => "salmon",
            NodeRole::Reparameterized => "lightgrey;.5:salmon",
            NodeRole::Observed => "darkolivegreen3",
        }
    }

    /// Role of `site`, or `None` for sites that are not random variables.
    #[must_use]
    pub fn of(site: &Site) -> Option<Self> {
        if !site.is_sample() {
            return None;
        }
        if site.is_observed {
            return Some(NodeRole::Observed);
        }
        let reparameterized = site.func.as_ref().is_some_and(|f| f.has_rsample());
        Some(if reparameterized {
            NodeRole::Reparameterized
        } else {
            NodeRole::Stochastic
        })
    }
}

/// One drawn node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    /// Site name, also used as the label.
    pub name: String,
    /// Fill role.
    pub role: NodeRole,
}

/// Nodes and edges to draw, in trace order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Graph {
    /// Random-variable sites, subsample sites excluded.
    pub nodes: Vec<Node>,
    /// Dependency edges whose endpoints are not subsample sites.
    pub edges: Vec<(String, String)>,
}

impl Graph {
    /// Collects the drawable part of `trace`.
    #[must_use]
    pub fn from_trace(trace: &Trace) -> Self {
        let nodes = trace
            .nodes()
            .filter(|(_, site)| !site.is_subsample)
            .filter_map(|(name, site)| {
                NodeRole::of(site).map(|role| Node {
                    name: name.to_owned(),
                    role,
                })
            })
            .collect();

        let is_subsample = |name: &str| trace.node(name).is_some_and(|s| s.is_subsample);
        let edges = trace
            .edges()
            .iter()
            .filter(|(from, to)| !is_subsample(from) && !is_subsample(to))
            .cloned()
            .collect();

        Self { nodes, edges }
    }
}
