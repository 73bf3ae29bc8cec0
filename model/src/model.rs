//! Core trace model types.
//!
//! A [`Trace`] is produced by an external recording runtime and only read by
//! the checkers. Sites keep their recorded order; frames are ordered from the
//! outermost independence context to the innermost.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::distribution::{Distribution, Kwargs};
use crate::tensor::Tensor;

/// Errors raised while assembling trace data.
#[derive(Debug, thiserror::Error)]
pub enum TraceError {
    /// A site with the same name was already recorded.
    #[error("duplicate site \"{0}\": site names must be unique within a trace")]
    DuplicateSite(String),
    /// An edge refers to a site that is not in the trace.
    #[error("edge {from} -> {to} refers to unknown site \"{missing}\"")]
    UnknownSite {
        /// Source of the rejected edge.
        from: String,
        /// Target of the rejected edge.
        to: String,
        /// The endpoint that is not recorded.
        missing: String,
    },
    /// Tensor data does not fill its declared shape.
    #[error("tensor of shape {shape:?} needs {expected} values, got {actual}")]
    TensorData {
        /// Declared shape.
        shape: Vec<usize>,
        /// Number of values implied by the shape.
        expected: usize,
        /// Number of values supplied.
        actual: usize,
    },
    /// A JSON trace document could not be parsed.
    #[error("malformed trace document: {0}")]
    Json(#[from] serde_json::Error),
}

/// Whether a trace records edges between every pair of dependent sites.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GraphType {
    /// Sites only, no dependency edges.
    #[default]
    Flat,
    /// Sites plus dependency edges, suitable for visualization.
    Dense,
}

/// One independence context ("plate") instance on a site's stack.
///
/// `dim` counts from the right of the `log_prob` shape, so it is negative
/// when assigned. `counter` separates repeated entries of the same sequential
/// context; it is meaningless for vectorized frames. A serialized frame
/// without `vectorized` is a batch dimension exactly when it has a `dim`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "FrameDocument")]
pub struct Frame {
    /// Name of the plate.
    pub name: String,
    /// Batch dimension claimed by the plate, counted from the right.
    pub dim: Option<isize>,
    /// Cardinality of the plate.
    pub size: usize,
    /// Iteration counter for sequential plates.
    pub counter: usize,
    /// Whether the plate is a batch dimension rather than a loop.
    pub vectorized: bool,
}

/// Serialized frame, with the optional keys left open.
#[derive(Deserialize)]
struct FrameDocument {
    name: String,
    #[serde(default)]
    dim: Option<isize>,
    size: usize,
    #[serde(default)]
    counter: usize,
    #[serde(default)]
    vectorized: Option<bool>,
}

impl From<FrameDocument> for Frame {
    fn from(doc: FrameDocument) -> Self {
        Self {
            vectorized: doc.vectorized.unwrap_or(doc.dim.is_some()),
            name: doc.name,
            dim: doc.dim,
            size: doc.size,
            counter: doc.counter,
        }
    }
}

impl Frame {
    /// A vectorized plate occupying `dim`.
    #[must_use]
    pub fn plate(name: impl Into<String>, size: usize, dim: Option<isize>) -> Self {
        Self {
            name: name.into(),
            dim,
            size,
            counter: 0,
            vectorized: true,
        }
    }

    /// One iteration of a sequential plate.
    #[must_use]
    pub fn sequential(name: impl Into<String>, size: usize, counter: usize) -> Self {
        Self {
            name: name.into(),
            dim: None,
            size,
            counter,
            vectorized: false,
        }
    }
}

/// Enumeration strategy requested for a discrete site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Enumerate {
    /// Enumerate by re-running the program once per value.
    Sequential,
    /// Enumerate in a fresh tensor dimension.
    Parallel,
}

/// Inference hints attached to a site.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InferConfig {
    /// Guide-only site with no model counterpart.
    #[serde(default)]
    pub is_auxiliary: bool,
    /// Requested enumeration strategy, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enumerate: Option<Enumerate>,
    /// Dimension allocated by the runtime for an enumerated site.
    #[serde(
        default,
        rename = "_enumerate_dim",
        skip_serializing_if = "Option::is_none"
    )]
    pub enumerate_dim: Option<isize>,
    /// Hints not interpreted by the checkers.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Kind of operation recorded at a site.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SiteType {
    /// A random draw or an observation.
    Sample,
    /// A learnable parameter.
    Param,
    /// Any other recorded message type.
    Other(String),
}

impl From<String> for SiteType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "sample" => SiteType::Sample,
            "param" => SiteType::Param,
            _ => SiteType::Other(value),
        }
    }
}

impl From<SiteType> for String {
    fn from(value: SiteType) -> Self {
        value.to_string()
    }
}

impl fmt::Display for SiteType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SiteType::Sample => f.write_str("sample"),
            SiteType::Param => f.write_str("param"),
            SiteType::Other(kind) => f.write_str(kind),
        }
    }
}

/// One recorded operation within a trace.
#[derive(Debug, Clone)]
pub struct Site {
    /// Site name, unique within its trace.
    pub name: String,
    /// Recorded operation kind.
    pub site_type: SiteType,
    /// Distribution the value was drawn from.
    pub func: Option<Arc<dyn Distribution>>,
    /// Positional arguments forwarded to the distribution's shape query.
    pub args: Vec<Value>,
    /// Keyword arguments forwarded to the distribution's shape query.
    pub kwargs: Kwargs,
    /// Whether the value was conditioned on data.
    pub is_observed: bool,
    /// Whether the site was introduced by plate subsampling.
    pub is_subsample: bool,
    /// Inference hints.
    pub infer: InferConfig,
    /// Active independence contexts, outermost first.
    pub cond_indep_stack: Vec<Frame>,
    /// Log density of the recorded value.
    pub log_prob: Option<Arc<dyn Tensor>>,
}

impl Site {
    fn bare(name: impl Into<String>, site_type: SiteType) -> Self {
        Self {
            name: name.into(),
            site_type,
            func: None,
            args: Vec::new(),
            kwargs: Kwargs::new(),
            is_observed: false,
            is_subsample: false,
            infer: InferConfig::default(),
            cond_indep_stack: Vec::new(),
            log_prob: None,
        }
    }

    /// A latent sample site drawn from `func`.
    #[must_use]
    pub fn sample(name: impl Into<String>, func: impl Distribution + 'static) -> Self {
        Self {
            func: Some(Arc::new(func)),
            ..Self::bare(name, SiteType::Sample)
        }
    }

    /// A parameter site.
    #[must_use]
    pub fn param(name: impl Into<String>) -> Self {
        Self::bare(name, SiteType::Param)
    }

    /// A site of an arbitrary recorded type.
    #[must_use]
    pub fn of_type(name: impl Into<String>, site_type: SiteType) -> Self {
        Self::bare(name, site_type)
    }

    /// Marks the site as conditioned on data.
    #[must_use]
    pub fn observed(mut self) -> Self {
        self.is_observed = true;
        self
    }

    /// Marks the site as a plate subsample site.
    #[must_use]
    pub fn subsample(mut self) -> Self {
        self.is_subsample = true;
        self
    }

    /// Marks the site as a guide-only auxiliary variable.
    #[must_use]
    pub fn auxiliary(mut self) -> Self {
        self.infer.is_auxiliary = true;
        self
    }

    /// Requests enumeration of the site.
    #[must_use]
    pub fn enumerated(mut self, strategy: Enumerate) -> Self {
        self.infer.enumerate = Some(strategy);
        self
    }

    /// Records the dimension the runtime allocated for enumeration.
    #[must_use]
    pub fn with_enumerate_dim(mut self, dim: isize) -> Self {
        self.infer.enumerate_dim = Some(dim);
        self
    }

    /// Pushes an innermost frame onto the site's stack.
    #[must_use]
    pub fn with_frame(mut self, frame: Frame) -> Self {
        self.cond_indep_stack.push(frame);
        self
    }

    /// Replaces the site's frame stack.
    #[must_use]
    pub fn with_frames(mut self, frames: Vec<Frame>) -> Self {
        self.cond_indep_stack = frames;
        self
    }

    /// Attaches a `log_prob` tensor.
    #[must_use]
    pub fn with_log_prob(mut self, log_prob: impl Tensor + 'static) -> Self {
        self.log_prob = Some(Arc::new(log_prob));
        self
    }

    /// Sets the arguments forwarded to the shape query.
    #[must_use]
    pub fn with_args(mut self, args: Vec<Value>, kwargs: Kwargs) -> Self {
        self.args = args;
        self.kwargs = kwargs;
        self
    }

    /// Returns true for `sample` sites.
    #[must_use]
    pub fn is_sample(&self) -> bool {
        self.site_type == SiteType::Sample
    }

    /// Event dimension reported by the distribution, when it exposes one.
    #[must_use]
    pub fn event_dim(&self) -> Option<usize> {
        self.func.as_ref().and_then(|f| f.event_dim())
    }

    /// Sample shape reported by the distribution, when it exposes one.
    #[must_use]
    pub fn dist_shape(&self) -> Option<Vec<usize>> {
        self.func
            .as_ref()
            .and_then(|f| f.shape(&self.args, &self.kwargs))
    }
}

/// A recorded execution of a probabilistic program.
#[derive(Debug, Clone, Default)]
pub struct Trace {
    nodes: IndexMap<String, Site>,
    edges: Vec<(String, String)>,
    graph_type: GraphType,
}

impl Trace {
    /// Creates an empty trace.
    #[must_use]
    pub fn new(graph_type: GraphType) -> Self {
        Self {
            nodes: IndexMap::new(),
            edges: Vec::new(),
            graph_type,
        }
    }

    /// Appends a site in execution order.
    ///
    /// # Errors
    ///
    /// Returns [`TraceError::DuplicateSite`] if the name is already recorded.
    pub fn add_node(&mut self, site: Site) -> Result<(), TraceError> {
        if self.nodes.contains_key(&site.name) {
            return Err(TraceError::DuplicateSite(site.name));
        }
        self.nodes.insert(site.name.clone(), site);
        Ok(())
    }

    /// Records a dependency edge between two existing sites.
    ///
    /// # Errors
    ///
    /// Returns [`TraceError::UnknownSite`] if either endpoint is missing.
    pub fn add_edge(
        &mut self,
        from: impl Into<String>,
        to: impl Into<String>,
    ) -> Result<(), TraceError> {
        let (from, to) = (from.into(), to.into());
        for endpoint in [&from, &to] {
            if !self.nodes.contains_key(endpoint) {
                return Err(TraceError::UnknownSite {
                    missing: endpoint.clone(),
                    from: from.clone(),
                    to: to.clone(),
                });
            }
        }
        self.edges.push((from, to));
        Ok(())
    }

    /// Iterates over sites in execution order.
    pub fn nodes(&self) -> impl Iterator<Item = (&str, &Site)> {
        self.nodes.iter().map(|(name, site)| (name.as_str(), site))
    }

    /// Looks up a site by name.
    #[must_use]
    pub fn node(&self, name: &str) -> Option<&Site> {
        self.nodes.get(name)
    }

    /// Dependency edges in recorded order.
    #[must_use]
    pub fn edges(&self) -> &[(String, String)] {
        &self.edges
    }

    /// Whether the trace carries dependency edges.
    #[must_use]
    pub fn graph_type(&self) -> GraphType {
        self.graph_type
    }

    /// Number of recorded sites.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns true if no site was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Names of all `sample` sites.
    #[must_use]
    pub fn sample_sites(&self) -> Vec<&str> {
        self.names_where(|site| site.is_sample())
    }

    /// Names of unobserved `sample` sites.
    #[must_use]
    pub fn stochastic_nodes(&self) -> Vec<&str> {
        self.names_where(|site| site.is_sample() && !site.is_observed)
    }

    /// Stochastic sites whose distribution supports reparameterized sampling.
    #[must_use]
    pub fn reparameterized_nodes(&self) -> Vec<&str> {
        self.names_where(|site| {
            site.is_sample()
                && !site.is_observed
                && site.func.as_ref().is_some_and(|f| f.has_rsample())
        })
    }

    /// Names of observed `sample` sites.
    #[must_use]
    pub fn observation_nodes(&self) -> Vec<&str> {
        self.names_where(|site| site.is_sample() && site.is_observed)
    }

    fn names_where(&self, keep: impl Fn(&Site) -> bool) -> Vec<&str> {
        self.nodes
            .iter()
            .filter(|(_, site)| keep(site))
            .map(|(name, _)| name.as_str())
            .collect()
    }
}
