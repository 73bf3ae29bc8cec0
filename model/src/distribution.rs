//! Distribution capabilities queried by the trace checks.
//!
//! Not every distribution can report its shape or event dimension; both
//! capabilities are optional and the checkers skip comparisons when either
//! side does not expose them.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Keyword arguments recorded with a site.
pub type Kwargs = Map<String, Value>;

/// A distribution attached to a sample site.
pub trait Distribution: fmt::Debug + Send + Sync {
    /// Short type name, e.g. `"Normal"`.
    fn name(&self) -> &str;

    /// Number of rightmost dimensions forming a single event.
    fn event_dim(&self) -> Option<usize> {
        None
    }

    /// Shape of a draw given the site's recorded arguments.
    fn shape(&self, args: &[Value], kwargs: &Kwargs) -> Option<Vec<usize>> {
        let _ = (args, kwargs);
        None
    }

    /// Whether draws are reparameterized.
    fn has_rsample(&self) -> bool {
        false
    }
}

/// Serializable distribution description.
///
/// The shape query returns `sample_shape + batch_shape + event_shape`, where
/// `sample_shape` is read from the `sample_shape` keyword or the first
/// positional argument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistributionSpec {
    /// Type name.
    pub name: String,
    /// Batch dimensions.
    #[serde(default)]
    pub batch_shape: Vec<usize>,
    /// Event dimensions.
    #[serde(default)]
    pub event_shape: Vec<usize>,
    /// Whether draws are reparameterized.
    #[serde(default)]
    pub has_rsample: bool,
    /// Whether the shape query is available.
    #[serde(default = "exposed")]
    pub exposes_shape: bool,
    /// Whether `event_dim` is available.
    #[serde(default = "exposed")]
    pub exposes_event_dim: bool,
}

fn exposed() -> bool {
    true
}

impl DistributionSpec {
    /// A distribution exposing both shape capabilities.
    #[must_use]
    pub fn new(name: impl Into<String>, batch_shape: Vec<usize>, event_shape: Vec<usize>) -> Self {
        Self {
            name: name.into(),
            batch_shape,
            event_shape,
            has_rsample: false,
            exposes_shape: true,
            exposes_event_dim: true,
        }
    }

    /// Marks draws as reparameterized.
    #[must_use]
    pub fn reparameterized(mut self) -> Self {
        self.has_rsample = true;
        self
    }

    /// Hides the shape query.
    #[must_use]
    pub fn without_shape(mut self) -> Self {
        self.exposes_shape = false;
        self
    }

    /// Hides `event_dim`.
    #[must_use]
    pub fn without_event_dim(mut self) -> Self {
        self.exposes_event_dim = false;
        self
    }
}

fn as_shape(value: &Value) -> Option<Vec<usize>> {
    value
        .as_array()?
        .iter()
        .map(|v| v.as_u64().and_then(|n| usize::try_from(n).ok()))
        .collect()
}

impl Distribution for DistributionSpec {
    fn name(&self) -> &str {
        &self.name
    }

    fn event_dim(&self) -> Option<usize> {
        self.exposes_event_dim.then_some(self.event_shape.len())
    }

    fn shape(&self, args: &[Value], kwargs: &Kwargs) -> Option<Vec<usize>> {
        if !self.exposes_shape {
            return None;
        }
        let sample_shape = kwargs
            .get("sample_shape")
            .or_else(|| args.first())
            .and_then(as_shape)
            .unwrap_or_default();
        let mut shape = sample_shape;
        shape.extend_from_slice(&self.batch_shape);
        shape.extend_from_slice(&self.event_shape);
        Some(shape)
    }

    fn has_rsample(&self) -> bool {
        self.has_rsample
    }
}
