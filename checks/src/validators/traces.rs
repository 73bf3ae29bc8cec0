//! Trace matching validators.
//!
//! Checks the following assumptions about a model/guide pair:
//! 1. Each sample site in the model also appears in the guide and is not
//!    marked auxiliary.
//! 2. Each sample site in the guide either appears in the model or is marked
//!    auxiliary.
//! 3. Each plate subsample site in the guide also appears in the model.
//! 4. At each sample site that appears in both the model and guide, the model
//!    and guide agree on `event_dim` and on sample shape within
//!    `max_plate_nesting`.

use std::collections::BTreeSet;

use tracecheck_model::{Site, Trace};

use crate::config::PlateNesting;
use crate::error::CheckError;
use crate::report::{Diagnostic, DiagnosticCode, DiagnosticReport};
use crate::validators::{fmt_names, owned_names, zip_from_right};

fn names_where<'a>(trace: &'a Trace, keep: impl Fn(&Site) -> bool) -> BTreeSet<&'a str> {
    trace
        .nodes()
        .filter(|(_, site)| keep(site))
        .map(|(name, _)| name)
        .collect()
}

/// Checks that two traces record the same sample sites with equal shapes.
///
/// Differing site sets are reported as a warning; shapes are compared
/// exactly at every site present in both traces.
///
/// # Errors
///
/// Returns [`CheckError::SiteDimsMismatch`] at the first site whose shapes differ.
pub fn check_traces_match(trace1: &Trace, trace2: &Trace) -> Result<DiagnosticReport, CheckError> {
    let mut report = DiagnosticReport::new();

    let vars1 = names_where(trace1, Site::is_sample);
    let vars2 = names_where(trace2, Site::is_sample);
    if vars1 != vars2 {
        report.push(
            Diagnostic::warn(
                DiagnosticCode::ModelVarsChanged,
                format!(
                    "Model vars changed: {} vs {}",
                    fmt_names(vars1.iter().copied()),
                    fmt_names(vars2.iter().copied())
                ),
            )
            .with_context("left", owned_names(&vars1))
            .with_context("right", owned_names(&vars2)),
        );
    }

    for name in vars1.intersection(&vars2) {
        let (Some(site1), Some(site2)) = (trace1.node(name), trace2.node(name)) else {
            continue;
        };
        if let (Some(shape1), Some(shape2)) = (site1.dist_shape(), site2.dist_shape()) {
            if shape1 != shape2 {
                return Err(CheckError::SiteDimsMismatch {
                    site: (*name).to_owned(),
                    left: shape1,
                    right: shape2,
                });
            }
        }
    }

    Ok(report)
}

/// Checks that a guide is a valid approximation of a model.
///
/// Dimensions left of `max_plate_nesting` may broadcast: this comparison is
/// deliberately looser than [`check_site_shape`](crate::validators::shape::check_site_shape).
///
/// # Errors
///
/// Returns [`CheckError::EventDimMismatch`] or [`CheckError::ShapeMismatch`]
/// at the first shared site where model and guide disagree.
pub fn check_model_guide_match(
    model_trace: &Trace,
    guide_trace: &Trace,
    max_plate_nesting: PlateNesting,
) -> Result<DiagnosticReport, CheckError> {
    let mut report = DiagnosticReport::new();

    // Check ordinary sample sites.
    let guide_vars = names_where(guide_trace, |s| s.is_sample() && !s.is_subsample);
    let aux_vars = names_where(guide_trace, |s| {
        s.is_sample() && !s.is_subsample && s.infer.is_auxiliary
    });
    let model_vars = names_where(model_trace, |s| {
        s.is_sample() && !s.is_observed && !s.is_subsample
    });
    let enum_vars: BTreeSet<&str> = names_where(model_trace, |s| {
        s.is_sample() && !s.is_observed && !s.is_subsample && s.infer.enumerate_dim.is_some()
    })
    .into_iter()
    .filter(|name| !guide_vars.contains(name))
    .collect();

    let aux_in_model: BTreeSet<&str> = aux_vars.intersection(&model_vars).copied().collect();
    if !aux_in_model.is_empty() {
        report.push(
            Diagnostic::warn(
                DiagnosticCode::AuxiliaryInModel,
                format!(
                    "Found auxiliary vars in the model: {}",
                    fmt_names(aux_in_model.iter().copied())
                ),
            )
            .with_context("sites", owned_names(&aux_in_model)),
        );
    }

    let guide_only: BTreeSet<&str> = guide_vars
        .iter()
        .copied()
        .filter(|name| !aux_vars.contains(name) && !model_vars.contains(name))
        .collect();
    if !guide_only.is_empty() {
        report.push(
            Diagnostic::warn(
                DiagnosticCode::GuideOnlyVars,
                format!(
                    "Found non-auxiliary vars in guide but not model, \
                     consider marking these infer={{'is_auxiliary': True}}:\n{}",
                    fmt_names(guide_only.iter().copied())
                ),
            )
            .with_context("sites", owned_names(&guide_only)),
        );
    }

    let model_only: BTreeSet<&str> = model_vars
        .iter()
        .copied()
        .filter(|name| !guide_vars.contains(name) && !enum_vars.contains(name))
        .collect();
    if !model_only.is_empty() {
        report.push(
            Diagnostic::warn(
                DiagnosticCode::ModelOnlyVars,
                format!(
                    "Found vars in model but not guide: {}",
                    fmt_names(model_only.iter().copied())
                ),
            )
            .with_context("sites", owned_names(&model_only)),
        );
    }

    // Check shapes agree.
    for name in model_vars.intersection(&guide_vars) {
        let (Some(model_site), Some(guide_site)) = (model_trace.node(name), guide_trace.node(name))
        else {
            continue;
        };
        check_shared_site(name, model_site, guide_site, max_plate_nesting)?;
    }

    // Check subsample sites introduced by plate.
    let model_plates = names_where(model_trace, |s| {
        s.is_sample() && !s.is_observed && s.is_subsample
    });
    let guide_plates = names_where(guide_trace, |s| s.is_sample() && s.is_subsample);
    let guide_only_plates: BTreeSet<&str> =
        guide_plates.difference(&model_plates).copied().collect();
    if !guide_only_plates.is_empty() {
        report.push(
            Diagnostic::warn(
                DiagnosticCode::GuideOnlyPlates,
                format!(
                    "Found plate statements in guide but not model: {}",
                    fmt_names(guide_only_plates.iter().copied())
                ),
            )
            .with_context("sites", owned_names(&guide_only_plates)),
        );
    }

    Ok(report)
}

fn check_shared_site(
    name: &str,
    model_site: &Site,
    guide_site: &Site,
    max_plate_nesting: PlateNesting,
) -> Result<(), CheckError> {
    if let (Some(model), Some(guide)) = (model_site.event_dim(), guide_site.event_dim()) {
        if model != guide {
            return Err(CheckError::EventDimMismatch {
                site: name.to_owned(),
                model,
                guide,
            });
        }
    }

    let (Some(model_shape), Some(guide_shape)) = (model_site.dist_shape(), guide_site.dist_shape())
    else {
        return Ok(());
    };
    if model_shape == guide_shape {
        return Ok(());
    }

    // Allow broadcasting outside of max_plate_nesting.
    let model_shape = max_plate_nesting.rightmost(&model_shape);
    let guide_shape = max_plate_nesting.rightmost(&guide_shape);
    if model_shape == guide_shape {
        return Ok(());
    }
    if zip_from_right(model_shape, guide_shape, 1, 1).any(|(m, g)| m != g) {
        return Err(CheckError::ShapeMismatch {
            site: name.to_owned(),
            model: model_shape.to_vec(),
            guide: guide_shape.to_vec(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracecheck_model::{DistributionSpec, GraphType};

    fn trace(sites: Vec<Site>) -> Trace {
        let mut trace = Trace::new(GraphType::Flat);
        for site in sites {
            assert!(trace.add_node(site).is_ok());
        }
        trace
    }

    fn normal(name: &str, batch: Vec<usize>) -> Site {
        Site::sample(name, DistributionSpec::new("Normal", batch, vec![]))
    }

    #[test]
    fn observed_sites_need_no_guide() {
        let model = trace(vec![normal("z", vec![]), normal("obs", vec![]).observed()]);
        let guide = trace(vec![normal("z", vec![])]);
        let report = check_model_guide_match(&model, &guide, PlateNesting::Unbounded);
        assert!(report.is_ok_and(|r| r.is_clean()));
    }

    #[test]
    fn enumerated_model_sites_need_no_guide() {
        let model = trace(vec![normal("z", vec![]), normal("k", vec![]).with_enumerate_dim(-1)]);
        let guide = trace(vec![normal("z", vec![])]);
        let report = check_model_guide_match(&model, &guide, PlateNesting::Unbounded);
        assert!(report.is_ok_and(|r| r.is_clean()));
    }

    #[test]
    fn auxiliary_guide_site_is_not_guide_only() {
        let model = trace(vec![normal("z", vec![])]);
        let guide = trace(vec![normal("z", vec![]), normal("u", vec![]).auxiliary()]);
        let report = check_model_guide_match(&model, &guide, PlateNesting::Unbounded);
        assert!(report.is_ok_and(|r| r.is_clean()));
    }

    #[test]
    fn shape_mismatch_inside_nesting_reports_truncated_shapes() {
        let model = trace(vec![normal("y", vec![7, 4, 3])]);
        let guide = trace(vec![normal("y", vec![5, 4])]);
        let err = check_model_guide_match(&model, &guide, PlateNesting::Bounded(2));
        assert!(matches!(
            err,
            Err(CheckError::ShapeMismatch { ref model, ref guide, .. })
                if model == &vec![4, 3] && guide == &vec![5, 4]
        ));
    }

    #[test]
    fn singleton_dims_broadcast_within_nesting() {
        let model = trace(vec![normal("y", vec![1, 3])]);
        let guide = trace(vec![normal("y", vec![3])]);
        let report = check_model_guide_match(&model, &guide, PlateNesting::Bounded(2));
        assert!(report.is_ok());
    }

    #[test]
    fn missing_shape_capability_skips_comparison() {
        let model = trace(vec![Site::sample(
            "y",
            DistributionSpec::new("Normal", vec![4], vec![]).without_shape(),
        )]);
        let guide = trace(vec![normal("y", vec![5])]);
        assert!(check_model_guide_match(&model, &guide, PlateNesting::Unbounded).is_ok());
        assert!(check_traces_match(&model, &guide).is_ok());
    }
}
