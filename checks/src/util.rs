//! Small helpers shared by callers of the checks.

use serde_json::Value;

/// Failure to resolve a dotted path.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("cannot resolve \"{path}\": no entry \"{segment}\"")]
pub struct LookupError {
    /// Full dotted path that was requested.
    pub path: String,
    /// First segment that could not be resolved.
    pub segment: String,
}

/// Resolves a dotted path such as `"optim.args.0.lr"` through nested JSON.
///
/// Object segments are keys; array segments are decimal indices.
///
/// # Errors
///
/// Returns [`LookupError`] at the first segment with no matching entry.
pub fn deep_get<'a>(value: &'a Value, path: &str) -> Result<&'a Value, LookupError> {
    path.split('.').try_fold(value, |current, segment| {
        let next = match current {
            Value::Object(map) => map.get(segment),
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        };
        next.ok_or_else(|| LookupError {
            path: path.to_owned(),
            segment: segment.to_owned(),
        })
    })
}

/// Runs `enter` only when `condition` holds and returns its guard.
///
/// Binding the result scopes the guard to the caller's block:
///
/// ```
/// use tracecheck::util::optional;
///
/// let _span = optional(true, || tracing::info_span!("checks").entered());
/// ```
pub fn optional<G>(condition: bool, enter: impl FnOnce() -> G) -> Option<G> {
    condition.then(enter)
}
