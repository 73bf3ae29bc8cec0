//! JSON trace documents.
//!
//! A document lists sites in execution order:
//!
//! ```json
//! {
//!   "graph_type": "dense",
//!   "nodes": [
//!     {
//!       "name": "z",
//!       "type": "sample",
//!       "fn": { "name": "Normal", "batch_shape": [10], "has_rsample": true },
//!       "infer": { "enumerate": "parallel", "_enumerate_dim": -2 },
//!       "cond_indep_stack": [ { "name": "data", "dim": -1, "size": 10 } ],
//!       "log_prob": { "shape": [10] }
//!     }
//!   ],
//!   "edges": [ ["z", "x"] ]
//! }
//! ```
//!
//! Every field except `name` and `type` is optional. `log_prob.data`, when
//! present, must fill `log_prob.shape`; otherwise the tensor is zero-filled.

use serde::Deserialize;
use serde_json::Value;

use crate::distribution::{DistributionSpec, Kwargs};
use crate::model::{Frame, GraphType, InferConfig, Site, SiteType, Trace, TraceError};
use crate::tensor::DenseTensor;

#[derive(Debug, Deserialize)]
struct TraceDocument {
    #[serde(default)]
    graph_type: GraphType,
    #[serde(default)]
    nodes: Vec<SiteDocument>,
    #[serde(default)]
    edges: Vec<(String, String)>,
}

#[derive(Debug, Deserialize)]
struct SiteDocument {
    name: String,
    #[serde(rename = "type")]
    site_type: SiteType,
    #[serde(rename = "fn", default)]
    func: Option<DistributionSpec>,
    #[serde(default)]
    args: Vec<Value>,
    #[serde(default)]
    kwargs: Kwargs,
    #[serde(default)]
    is_observed: bool,
    #[serde(default)]
    is_subsample: bool,
    #[serde(default)]
    infer: InferConfig,
    #[serde(default)]
    cond_indep_stack: Vec<Frame>,
    #[serde(default)]
    log_prob: Option<LogProbDocument>,
}

#[derive(Debug, Deserialize)]
struct LogProbDocument {
    shape: Vec<usize>,
    #[serde(default)]
    data: Option<Vec<f64>>,
    #[serde(default)]
    requires_grad: bool,
}

impl LogProbDocument {
    fn into_tensor(self) -> Result<DenseTensor, TraceError> {
        let tensor = match self.data {
            Some(data) => DenseTensor::new(self.shape, data)?,
            None => DenseTensor::zeros(self.shape),
        };
        Ok(tensor.with_requires_grad(self.requires_grad))
    }
}

impl SiteDocument {
    fn into_site(self) -> Result<Site, TraceError> {
        let mut site = match self.func {
            Some(func) => {
                let mut site = Site::sample(self.name, func);
                site.site_type = self.site_type;
                site
            }
            None => Site::of_type(self.name, self.site_type),
        };
        site.args = self.args;
        site.kwargs = self.kwargs;
        site.is_observed = self.is_observed;
        site.is_subsample = self.is_subsample;
        site.infer = self.infer;
        site.cond_indep_stack = self.cond_indep_stack;
        if let Some(log_prob) = self.log_prob {
            site = site.with_log_prob(log_prob.into_tensor()?);
        }
        Ok(site)
    }
}

/// Parses a JSON trace document.
///
/// # Errors
///
/// Returns [`TraceError::Json`] for malformed documents and the usual
/// [`Trace`] assembly errors for duplicate sites, dangling edges or
/// `log_prob` data that does not fill its shape.
pub fn trace_from_json(doc: &str) -> Result<Trace, TraceError> {
    let value: Value = serde_json::from_str(doc)?;
    trace_from_value(value)
}

/// Builds a trace from an already parsed JSON document.
///
/// # Errors
///
/// Same as [`trace_from_json`].
pub fn trace_from_value(value: Value) -> Result<Trace, TraceError> {
    let document: TraceDocument = serde_json::from_value(value)?;
    let mut trace = Trace::new(document.graph_type);
    for node in document.nodes {
        trace.add_node(node.into_site()?)?;
    }
    for (from, to) in document.edges {
        trace.add_edge(from, to)?;
    }
    Ok(trace)
}
