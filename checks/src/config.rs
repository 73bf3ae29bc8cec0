//! Check configuration.

use std::fmt;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::CheckError;

/// Upper bound on the number of trailing dimensions owned by plates.
///
/// Dimensions further left belong to enumeration or user batching and are
/// exempt from strict shape checks. Serialized as an integer, or `null` for
/// [`PlateNesting::Unbounded`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Option<usize>", into = "Option<usize>")]
pub enum PlateNesting {
    /// At most this many trailing dimensions.
    Bounded(usize),
    /// Any number of trailing dimensions.
    #[default]
    Unbounded,
}

impl PlateNesting {
    /// Returns true if a stack of `depth` plates does not fit.
    #[must_use]
    pub fn is_exceeded_by(self, depth: usize) -> bool {
        match self {
            PlateNesting::Bounded(max) => depth > max,
            PlateNesting::Unbounded => false,
        }
    }

    /// The rightmost entries of `shape` that fall within the bound.
    #[must_use]
    pub fn rightmost<T>(self, shape: &[T]) -> &[T] {
        match self {
            PlateNesting::Bounded(max) if shape.len() > max => &shape[shape.len() - max..],
            _ => shape,
        }
    }
}

impl From<Option<usize>> for PlateNesting {
    fn from(value: Option<usize>) -> Self {
        value.map_or(PlateNesting::Unbounded, PlateNesting::Bounded)
    }
}

impl From<PlateNesting> for Option<usize> {
    fn from(value: PlateNesting) -> Self {
        match value {
            PlateNesting::Bounded(max) => Some(max),
            PlateNesting::Unbounded => None,
        }
    }
}

impl From<usize> for PlateNesting {
    fn from(value: usize) -> Self {
        PlateNesting::Bounded(value)
    }
}

impl fmt::Display for PlateNesting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlateNesting::Bounded(max) => write!(f, "{max}"),
            PlateNesting::Unbounded => f.write_str("inf"),
        }
    }
}

/// Settings for [`run_all`](crate::run_all).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CheckConfig {
    /// Plate nesting bound used by the shape checks.
    pub max_plate_nesting: PlateNesting,
    /// Whether the inference procedure honors per-site enumeration.
    pub enumerate: bool,
    /// Promote every warning to a [`CheckError::Denied`].
    pub warnings_as_errors: bool,
    /// Run checks inside a `tracing` span.
    pub trace_spans: bool,
}

impl CheckConfig {
    /// Parses a configuration from JSON. Missing keys take their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`CheckError::Config`] on malformed JSON or unknown keys.
    pub fn from_json_str(json: &str) -> Result<Self, CheckError> {
        serde_json::from_str(json).map_err(CheckError::Config)
    }

    /// Reads a JSON configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_path(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Cannot read check config: {}", path.display()))?;
        Self::from_json_str(&json)
            .with_context(|| format!("Invalid check config: {}", path.display()))
    }
}
