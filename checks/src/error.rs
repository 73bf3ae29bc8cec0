//! Fatal check errors.

use std::fmt::Display;

use crate::config::PlateNesting;
use crate::report::{Diagnostic, DiagnosticCode};
use crate::validators::shape::ExpectedDim;

/// A structural violation that stops the caller.
#[derive(Debug, thiserror::Error)]
pub enum CheckError {
    /// Two frames on one site claim the same dimension.
    #[error(
        "at site \"{site}\" within plate(\"{frame}\", dim={dim}), dim collision\n  \
         Try setting dim arg in other plates."
    )]
    DimCollision {
        /// Offending site.
        site: String,
        /// Frame whose dimension was already taken.
        frame: String,
        /// The contested dimension.
        dim: isize,
    },

    /// A frame dimension counts from the left.
    #[error(
        "at site \"{site}\" within plate(\"{frame}\", dim={dim}), plate dims must be negative\n  \
         Count plate dims from the right, e.g. dim=-1."
    )]
    NonNegativeDim {
        /// Offending site.
        site: String,
        /// Frame carrying the dimension.
        frame: String,
        /// The rejected dimension.
        dim: isize,
    },

    /// A frame dimension lies beyond the deepest supported layout.
    #[error(
        "at site \"{site}\" within plate(\"{frame}\", dim={dim}), dim out of range\n  \
         Plate dims must lie within -{max}..=-1."
    )]
    DimOutOfRange {
        /// Offending site.
        site: String,
        /// Frame carrying the dimension.
        frame: String,
        /// The rejected dimension.
        dim: isize,
        /// Deepest supported dimension, counted from the right.
        max: usize,
    },

    /// The frame stack is deeper than `max_plate_nesting`.
    #[error(
        "at site \"{site}\", plate stack overflow\n  \
         Try increasing max_plate_nesting to at least {required} (currently {max_plate_nesting})"
    )]
    PlateStackOverflow {
        /// Offending site.
        site: String,
        /// Minimum adequate `max_plate_nesting`.
        required: usize,
        /// Configured bound.
        max_plate_nesting: PlateNesting,
    },

    /// A `log_prob` shape disagrees with the site's frame stack.
    #[error(
        "at site \"{site}\", invalid log_prob shape\n  \
         Expected {}, actual {}\n  \
         Try one of the following fixes:\n  \
         - enclose the batched tensor in a with plate(...): context\n  \
         - .to_event(...) the distribution being sampled\n  \
         - .permute() data dimensions\n  \
         - set the plate's dim to the batched dimension",
        fmt_shape(.expected),
        fmt_shape(.actual)
    )]
    InvalidLogProbShape {
        /// Offending site.
        site: String,
        /// Layout implied by the frame stack.
        expected: Vec<ExpectedDim>,
        /// Observed shape, truncated to `max_plate_nesting`.
        actual: Vec<usize>,
    },

    /// A sample site has no `log_prob` tensor.
    #[error("at site \"{site}\", missing log_prob\n  Compute log_prob before checking site shapes.")]
    MissingLogProb {
        /// Offending site.
        site: String,
    },

    /// Model and guide disagree on `event_dim`.
    #[error("Model and guide event_dims disagree at site '{site}': {model} vs {guide}")]
    EventDimMismatch {
        /// Offending site.
        site: String,
        /// Model-side event dimension.
        model: usize,
        /// Guide-side event dimension.
        guide: usize,
    },

    /// Model and guide disagree on a site's shape within `max_plate_nesting`.
    #[error(
        "Model and guide shapes disagree at site '{site}': {} vs {}",
        fmt_shape(.model),
        fmt_shape(.guide)
    )]
    ShapeMismatch {
        /// Offending site.
        site: String,
        /// Model-side shape after truncation.
        model: Vec<usize>,
        /// Guide-side shape after truncation.
        guide: Vec<usize>,
    },

    /// Two traces disagree exactly on a site's shape.
    #[error("Site dims disagree at site '{site}': {} vs {}", fmt_shape(.left), fmt_shape(.right))]
    SiteDimsMismatch {
        /// Offending site.
        site: String,
        /// Shape in the first trace.
        left: Vec<usize>,
        /// Shape in the second trace.
        right: Vec<usize>,
    },

    /// Warnings were promoted to errors.
    #[error("{count} warning(s) denied by configuration; first: {first}")]
    Denied {
        /// Number of warnings found.
        count: usize,
        /// Message of the first warning.
        first: String,
    },

    /// The check configuration could not be parsed.
    #[error("invalid check configuration: {0}")]
    Config(#[source] serde_json::Error),
}

fn fmt_shape<T: Display>(dims: &[T]) -> String {
    let parts: Vec<String> = dims.iter().map(ToString::to_string).collect();
    format!("[{}]", parts.join(", "))
}

impl CheckError {
    /// Machine-readable identifier of the error.
    #[must_use]
    pub fn code(&self) -> DiagnosticCode {
        match self {
            CheckError::DimCollision { .. } => DiagnosticCode::DimCollision,
            CheckError::NonNegativeDim { .. } => DiagnosticCode::NonNegativeDim,
            CheckError::DimOutOfRange { .. } => DiagnosticCode::DimOutOfRange,
            CheckError::PlateStackOverflow { .. } => DiagnosticCode::PlateStackOverflow,
            CheckError::InvalidLogProbShape { .. } => DiagnosticCode::InvalidLogProbShape,
            CheckError::MissingLogProb { .. } => DiagnosticCode::MissingLogProb,
            CheckError::EventDimMismatch { .. } => DiagnosticCode::EventDimMismatch,
            CheckError::ShapeMismatch { .. } | CheckError::SiteDimsMismatch { .. } => {
                DiagnosticCode::ShapeMismatch
            }
            CheckError::Denied { .. } => DiagnosticCode::WarningsDenied,
            CheckError::Config(_) => DiagnosticCode::InvalidConfig,
        }
    }

    /// Offending site, if the error concerns one.
    #[must_use]
    pub fn site(&self) -> Option<&str> {
        match self {
            CheckError::DimCollision { site, .. }
            | CheckError::NonNegativeDim { site, .. }
            | CheckError::DimOutOfRange { site, .. }
            | CheckError::PlateStackOverflow { site, .. }
            | CheckError::InvalidLogProbShape { site, .. }
            | CheckError::MissingLogProb { site }
            | CheckError::EventDimMismatch { site, .. }
            | CheckError::ShapeMismatch { site, .. }
            | CheckError::SiteDimsMismatch { site, .. } => Some(site),
            CheckError::Denied { .. } | CheckError::Config(_) => None,
        }
    }

    /// Structured form of the error with its compared values as context.
    #[must_use]
    pub fn diagnostic(&self) -> Diagnostic {
        let mut d = Diagnostic::error(self.code(), self.to_string());
        if let Some(site) = self.site() {
            d = d.at_site(site);
        }
        match self {
            CheckError::DimCollision { frame, dim, .. }
            | CheckError::NonNegativeDim { frame, dim, .. } => {
                d.with_text("frame", frame.as_str()).with_context("dim", dim)
            }
            CheckError::DimOutOfRange {
                frame, dim, max, ..
            } => d
                .with_text("frame", frame.as_str())
                .with_context("dim", dim)
                .with_context("max", max),
            CheckError::PlateStackOverflow {
                required,
                max_plate_nesting,
                ..
            } => d
                .with_context("required", required)
                .with_text("max_plate_nesting", max_plate_nesting.to_string()),
            CheckError::InvalidLogProbShape {
                expected, actual, ..
            } => d
                .with_text("expected", fmt_shape(expected))
                .with_text("actual", fmt_shape(actual)),
            CheckError::EventDimMismatch { model, guide, .. } => {
                d.with_context("model", model).with_context("guide", guide)
            }
            CheckError::ShapeMismatch { model, guide, .. } => {
                d.with_context("model", model).with_context("guide", guide)
            }
            CheckError::SiteDimsMismatch { left, right, .. } => {
                d.with_context("left", left).with_context("right", right)
            }
            CheckError::Denied { count, .. } => d.with_context("count", count),
            CheckError::MissingLogProb { .. } | CheckError::Config(_) => d,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_shape_lists_both_shapes_and_fixes() {
        let err = CheckError::InvalidLogProbShape {
            site: "x".to_owned(),
            expected: vec![ExpectedDim::Size(5), ExpectedDim::Any, ExpectedDim::Size(3)],
            actual: vec![5, 2, 4],
        };
        let msg = err.to_string();
        assert!(msg.starts_with("at site \"x\", invalid log_prob shape"));
        assert!(msg.contains("Expected [5, -1, 3], actual [5, 2, 4]"), "{msg}");
        assert_eq!(msg.lines().filter(|l| l.trim_start().starts_with("- ")).count(), 4);
    }

    #[test]
    fn diagnostic_carries_site_and_context() {
        let err = CheckError::DimCollision {
            site: "obs".to_owned(),
            frame: "data".to_owned(),
            dim: -1,
        };
        let d = err.diagnostic();
        assert!(d.is_error());
        assert_eq!(d.code, DiagnosticCode::DimCollision);
        assert_eq!(d.site.as_deref(), Some("obs"));
        assert_eq!(d.context.get("dim").map(String::as_str), Some("-1"));
        assert_eq!(d.context.get("frame").map(String::as_str), Some("data"));
    }

    #[test]
    fn overflow_suggests_minimum_nesting() {
        let err = CheckError::PlateStackOverflow {
            site: "x".to_owned(),
            required: 3,
            max_plate_nesting: PlateNesting::Bounded(1),
        };
        assert!(err.to_string().contains("at least 3 (currently 1)"));
        assert_eq!(err.code(), DiagnosticCode::PlateStackOverflow);
    }

    #[test]
    fn out_of_range_dim_names_frame_and_bound() {
        let err = CheckError::DimOutOfRange {
            site: "x".to_owned(),
            frame: "p".to_owned(),
            dim: isize::MIN,
            max: 64,
        };
        assert!(err.to_string().contains("within -64..=-1"), "{err}");
        let d = err.diagnostic();
        assert_eq!(d.code.as_str(), "dim-out-of-range");
        assert_eq!(d.context.get("max").map(String::as_str), Some("64"));
    }
}
