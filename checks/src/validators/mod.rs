//! Trace validators (numeric guard, site shapes, model/guide matching, enumeration order).

pub mod enumeration;
pub mod numeric;
pub mod shape;
pub mod traces;

use std::collections::BTreeSet;

/// Pairs `left` and `right` from their last entries backwards, filling the
/// shorter side with `fill_left` / `fill_right` (broadcast alignment).
pub(crate) fn zip_from_right<'a, A: Copy, B: Copy>(
    left: &'a [A],
    right: &'a [B],
    fill_left: A,
    fill_right: B,
) -> impl Iterator<Item = (A, B)> + 'a {
    let len = left.len().max(right.len());
    (0..len).map(move |i| {
        let l = if i < left.len() {
            left[left.len() - 1 - i]
        } else {
            fill_left
        };
        let r = if i < right.len() {
            right[right.len() - 1 - i]
        } else {
            fill_right
        };
        (l, r)
    })
}

/// Renders a set of site names as `{a, b}`.
pub(crate) fn fmt_names<'a>(names: impl IntoIterator<Item = &'a str>) -> String {
    let names: Vec<&str> = names.into_iter().collect();
    format!("{{{}}}", names.join(", "))
}

/// Sorted, owned copy of a name set for diagnostic context.
pub(crate) fn owned_names(names: &BTreeSet<&str>) -> Vec<String> {
    names.iter().map(|n| (*n).to_owned()).collect()
}
