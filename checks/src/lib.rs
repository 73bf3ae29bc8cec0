//! Consistency checks for recorded probabilistic-program traces.
//!
//! Each validator inspects one or two [`Trace`]s and either returns a
//! [`DiagnosticReport`] of advisory findings or stops with a [`CheckError`].
//!
//! # Checks
//!
//! | Check | Module | Outcome |
//! |-------|--------|---------|
//! | NaN / infinity in values and gradients | [`validators::numeric`] | warnings |
//! | `log_prob` shape against plates | [`validators::shape`] | error |
//! | Model and guide site agreement | [`validators::traces`] | warnings, error on shape |
//! | Sites ordered around enumerated plates | [`validators::enumeration`] | warnings |
//!
//! # Entry Point
//!
//! ```
//! use tracecheck::{run_all, CheckConfig, PlateNesting};
//! use tracecheck_model::{DenseTensor, DistributionSpec, Frame, GraphType, Site, Trace};
//!
//! let site = || {
//!     Site::sample("x", DistributionSpec::new("Normal", vec![3], vec![]))
//!         .with_frame(Frame::plate("data", 3, Some(-1)))
//!         .with_log_prob(DenseTensor::zeros(vec![3]))
//! };
//! let mut model = Trace::new(GraphType::Flat);
//! let mut guide = Trace::new(GraphType::Flat);
//! model.add_node(site()).expect("unique site");
//! guide.add_node(site()).expect("unique site");
//!
//! let config = CheckConfig {
//!     max_plate_nesting: PlateNesting::Bounded(1),
//!     ..CheckConfig::default()
//! };
//! let report = run_all(&model, &guide, &config).expect("consistent traces");
//! assert!(report.is_clean());
//! ```

#![deny(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    missing_docs,
    clippy::missing_errors_doc
)]

pub mod config;
pub mod error;
pub mod report;
pub mod util;
pub mod validators;

pub use config::{CheckConfig, PlateNesting};
pub use error::CheckError;
pub use report::{Diagnostic, DiagnosticCode, DiagnosticReport, DiagnosticSink, Severity};
pub use validators::enumeration::{check_if_enumerated, check_traceenum_requirements};
pub use validators::numeric::{is_inf, is_nan, warn_if_inf, warn_if_nan};
pub use validators::shape::check_site_shape;
pub use validators::traces::{check_model_guide_match, check_traces_match};

use tracecheck_model::Trace;

/// Runs every trace check on a model/guide pair and aggregates the findings.
///
/// Checks are run in this order:
/// 1. Model/guide site agreement
/// 2. `log_prob` shapes of model sites, then guide sites
/// 3. Enumeration ordering, or unused enumeration hints when
///    `config.enumerate` is off
///
/// # Errors
///
/// Returns the first fatal [`CheckError`]. With `warnings_as_errors` set, a
/// report holding any warning becomes [`CheckError::Denied`].
pub fn run_all(
    model_trace: &Trace,
    guide_trace: &Trace,
    config: &CheckConfig,
) -> Result<DiagnosticReport, CheckError> {
    let _span = util::optional(config.trace_spans, || {
        tracing::info_span!(
            "run_all",
            model_sites = model_trace.len(),
            guide_sites = guide_trace.len()
        )
        .entered()
    });

    let mut report = DiagnosticReport::new();

    // 1. Model/guide agreement
    report.extend(check_model_guide_match(
        model_trace,
        guide_trace,
        config.max_plate_nesting,
    )?);

    // 2. Site shapes
    for trace in [model_trace, guide_trace] {
        for (_, site) in trace.nodes() {
            if site.is_sample() && !site.is_subsample && site.log_prob.is_some() {
                check_site_shape(site, config.max_plate_nesting)?;
            }
        }
    }

    // 3. Enumeration
    if config.enumerate {
        report.extend(check_traceenum_requirements(model_trace, guide_trace));
    } else {
        report.extend(check_if_enumerated(guide_trace));
    }

    tracing::debug!(
        warnings = report.warning_count(),
        "trace checks finished"
    );

    if config.warnings_as_errors {
        if let Some(first) = report.diagnostics.iter().find(|d| !d.is_error()) {
            return Err(CheckError::Denied {
                count: report.warning_count(),
                first: first.message.clone(),
            });
        }
    }
    Ok(report)
}
