//! Enumeration dependency checks.
//!
//! Enumeration-aware inference sums over synchronized products of enumerated
//! values rather than full cartesian products, so no site outside a plate may
//! depend on an enumerated site inside it. Full dependency tracking is out of
//! reach; this checker warns only where reordering sites would obviously fix
//! the program.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

use indexmap::IndexMap;
use tracecheck_model::{Frame, Trace};

use crate::report::{Diagnostic, DiagnosticCode, DiagnosticReport};
use crate::validators::owned_names;

/// Which program a trace was recorded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// The generative model.
    Model,
    /// The approximating guide.
    Guide,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Model => f.write_str("model"),
            Role::Guide => f.write_str("guide"),
        }
    }
}

/// Sequential plate name to iteration counter.
type Counters<'a> = BTreeMap<&'a str, usize>;

/// Two sites are independent when they sit in different iterations of a
/// shared sequential plate.
fn are_independent(left: &Counters<'_>, right: &Counters<'_>) -> bool {
    left.iter()
        .any(|(name, counter)| right.get(name).is_some_and(|other| other != counter))
}

fn enumerated_guide_sites(guide_trace: &Trace) -> Vec<&str> {
    guide_trace
        .nodes()
        .filter(|(_, site)| site.is_sample() && site.infer.enumerate.is_some())
        .map(|(name, _)| name)
        .collect()
}

fn quoted(names: &[&str]) -> String {
    names.join("\", \"")
}

/// Warns when a site outside a plate follows enumerated sites inside it.
///
/// The set of enumerated sites is taken from the guide; the model trace is
/// walked first, then the guide trace.
#[must_use]
pub fn check_traceenum_requirements(model_trace: &Trace, guide_trace: &Trace) -> DiagnosticReport {
    let enumerated: BTreeSet<&str> = enumerated_guide_sites(guide_trace).into_iter().collect();
    let mut report = DiagnosticReport::new();
    for (role, trace) in [(Role::Model, model_trace), (Role::Guide, guide_trace)] {
        report.extend(check_role(role, trace, &enumerated));
    }
    report
}

fn check_role(role: Role, trace: &Trace, enumerated: &BTreeSet<&str>) -> DiagnosticReport {
    let mut report = DiagnosticReport::new();
    let mut irange_counters: HashMap<&str, Counters<'_>> = HashMap::new();
    let mut enumerated_contexts: IndexMap<BTreeSet<&Frame>, BTreeSet<&str>> = IndexMap::new();

    for (name, site) in trace.nodes() {
        if !site.is_sample() {
            continue;
        }
        let counters: Counters<'_> = site
            .cond_indep_stack
            .iter()
            .filter(|f| !f.vectorized)
            .map(|f| (f.name.as_str(), f.counter))
            .collect();
        let context: BTreeSet<&Frame> = site
            .cond_indep_stack
            .iter()
            .filter(|f| f.vectorized)
            .collect();

        // Sites outside a context must precede enumerated sites inside it.
        for (enumerated_context, names) in &enumerated_contexts {
            let strict_subset =
                context.len() < enumerated_context.len() && context.is_subset(enumerated_context);
            if !strict_subset {
                continue;
            }
            let dependent: Vec<&str> = names
                .iter()
                .copied()
                .filter(|n| {
                    irange_counters
                        .get(n)
                        .map_or(true, |other| !are_independent(&counters, other))
                })
                .collect();
            if dependent.is_empty() {
                continue;
            }
            let plates: BTreeSet<&str> = enumerated_context
                .difference(&context)
                .map(|f| f.name.as_str())
                .collect();
            let plates: Vec<&str> = plates.into_iter().collect();
            report.push(
                Diagnostic::warn(
                    DiagnosticCode::PossiblyInvalidDependency,
                    format!(
                        "at {role} site \"{name}\", possibly invalid dependency.\n  \
                         Expected site \"{name}\" to precede sites \"{}\"\n  \
                         to avoid breaking independence of plates \"{}\"",
                        quoted(&dependent),
                        quoted(&plates)
                    ),
                )
                .at_site(name)
                .with_text("role", role.to_string())
                .with_context("sites", &dependent)
                .with_context("plates", &plates),
            );
        }

        irange_counters.insert(name, counters);
        if enumerated.contains(name) {
            enumerated_contexts.entry(context).or_default().insert(name);
        }
    }

    tracing::debug!(%role, contexts = enumerated_contexts.len(), "enumeration requirements checked");
    report
}

/// Warns when the guide requests enumeration that the caller will ignore.
#[must_use]
pub fn check_if_enumerated(guide_trace: &Trace) -> DiagnosticReport {
    let mut report = DiagnosticReport::new();
    let sites = enumerated_guide_sites(guide_trace);
    if !sites.is_empty() {
        let names: BTreeSet<&str> = sites.iter().copied().collect();
        report.push(
            Diagnostic::warn(
                DiagnosticCode::UnusedEnumeration,
                format!(
                    "Found sample sites configured for enumeration: {}\n\
                     If you want to enumerate sites, use an enumeration-aware ELBO instead.",
                    sites.join(", ")
                ),
            )
            .with_context("sites", owned_names(&names)),
        );
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracecheck_model::{DistributionSpec, Enumerate, GraphType, Site};

    fn site(name: &str) -> Site {
        Site::sample(name, DistributionSpec::new("Categorical", vec![], vec![]))
    }

    fn trace(sites: Vec<Site>) -> Trace {
        let mut trace = Trace::new(GraphType::Flat);
        for site in sites {
            assert!(trace.add_node(site).is_ok());
        }
        trace
    }

    #[test]
    fn independence_requires_shared_plate_with_other_counter() {
        let a: Counters<'_> = [("seq", 0)].into_iter().collect();
        let b: Counters<'_> = [("seq", 1)].into_iter().collect();
        let c: Counters<'_> = [("other", 1)].into_iter().collect();
        assert!(are_independent(&a, &b));
        assert!(!are_independent(&a, &a));
        assert!(!are_independent(&a, &c));
    }

    #[test]
    fn site_outside_plate_after_enumerated_site_warns() {
        let plate = Frame::plate("plateA", 3, Some(-1));
        let guide = trace(vec![site("e")
            .enumerated(Enumerate::Parallel)
            .with_frame(plate.clone())]);
        let model = trace(vec![site("e").with_frame(plate), site("f")]);

        let report = check_traceenum_requirements(&model, &guide);
        let warnings: Vec<&Diagnostic> = report
            .with_code(DiagnosticCode::PossiblyInvalidDependency)
            .collect();
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].site.as_deref(), Some("f"));
        assert_eq!(
            warnings[0].message,
            "at model site \"f\", possibly invalid dependency.\n  \
             Expected site \"f\" to precede sites \"e\"\n  \
             to avoid breaking independence of plates \"plateA\""
        );
    }

    #[test]
    fn site_preceding_enumerated_site_is_fine() {
        let plate = Frame::plate("plateA", 3, Some(-1));
        let guide = trace(vec![site("e")
            .enumerated(Enumerate::Parallel)
            .with_frame(plate.clone())]);
        let model = trace(vec![site("f"), site("e").with_frame(plate)]);
        assert!(check_traceenum_requirements(&model, &guide).is_clean());
    }

    #[test]
    fn different_sequential_iterations_are_independent() {
        let plate = Frame::plate("plateA", 3, Some(-1));
        let guide = trace(vec![site("e")
            .enumerated(Enumerate::Sequential)
            .with_frames(vec![Frame::sequential("seq", 2, 0), plate.clone()])]);
        let model = trace(vec![
            site("e").with_frames(vec![Frame::sequential("seq", 2, 0), plate]),
            site("f").with_frame(Frame::sequential("seq", 2, 1)),
        ]);
        assert!(check_traceenum_requirements(&model, &guide).is_clean());
    }

    #[test]
    fn guide_site_outside_plate_after_enumerated_site_warns() {
        let guide = trace(vec![
            site("e")
                .enumerated(Enumerate::Parallel)
                .with_frame(Frame::plate("plateA", 3, Some(-1))),
            site("f"),
        ]);
        let report = check_traceenum_requirements(&trace(vec![]), &guide);
        assert_eq!(report.warning_count(), 1);
        let d = &report.diagnostics[0];
        assert_eq!(d.site.as_deref(), Some("f"));
        assert!(d.message.starts_with("at guide site \"f\", possibly invalid dependency."));
        assert_eq!(d.context.get("role").map(String::as_str), Some("guide"));
    }

    #[test]
    fn plates_left_behind_are_listed_sorted() {
        let frames = vec![
            Frame::plate("b", 4, Some(-1)),
            Frame::plate("a", 3, Some(-2)),
        ];
        let guide = trace(vec![site("e")
            .enumerated(Enumerate::Parallel)
            .with_frames(frames.clone())]);
        let model = trace(vec![
            site("e").with_frames(frames),
            site("g").with_frame(Frame::plate("a", 3, Some(-2))),
            site("f"),
        ]);

        let report = check_traceenum_requirements(&model, &guide);
        let messages: Vec<&str> = report
            .with_code(DiagnosticCode::PossiblyInvalidDependency)
            .map(|d| d.message.as_str())
            .collect();
        assert_eq!(messages.len(), 2);
        assert!(messages[0].starts_with("at model site \"g\""), "{}", messages[0]);
        assert!(messages[0].ends_with("independence of plates \"b\""), "{}", messages[0]);
        assert!(messages[1].starts_with("at model site \"f\""), "{}", messages[1]);
        assert!(messages[1].ends_with("independence of plates \"a\", \"b\""), "{}", messages[1]);
    }

    #[test]
    fn independent_enumerated_sites_are_not_blamed() {
        let plate = Frame::plate("plateA", 3, Some(-1));
        let frames = |counter| vec![Frame::sequential("seq", 2, counter), plate.clone()];
        let guide = trace(vec![
            site("e1").enumerated(Enumerate::Parallel).with_frames(frames(0)),
            site("e2").enumerated(Enumerate::Parallel).with_frames(frames(1)),
        ]);
        let model = trace(vec![
            site("e1").with_frames(frames(0)),
            site("e2").with_frames(frames(1)),
            site("f").with_frame(Frame::sequential("seq", 2, 1)),
        ]);

        let report = check_traceenum_requirements(&model, &guide);
        assert_eq!(report.warning_count(), 1);
        let d = &report.diagnostics[0];
        assert!(d.message.contains("Expected site \"f\" to precede sites \"e2\"\n"), "{}", d.message);
        assert_eq!(d.context.get("sites").map(String::as_str), Some("[\"e2\"]"));
    }

    #[test]
    fn unused_enumeration_lists_sites() {
        let guide = trace(vec![
            site("a").enumerated(Enumerate::Parallel),
            site("b"),
            site("c").enumerated(Enumerate::Sequential),
        ]);
        let report = check_if_enumerated(&guide);
        assert_eq!(report.warning_count(), 1);
        assert!(report.diagnostics[0]
            .message
            .starts_with("Found sample sites configured for enumeration: a, c"));
        assert!(check_if_enumerated(&trace(vec![site("b")])).is_clean());
    }
}
