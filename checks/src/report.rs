//! Diagnostic report types: severities, codes, records, and collectors.
//!
//! Advisory findings never interrupt a check. They are recorded as
//! [`Diagnostic`]s and logged through `tracing` the moment they are pushed,
//! so callers can both read the log and inspect results programmatically.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;

/// Severity of a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Advisory: the caller may continue.
    Warning,
    /// Fatal: the check stopped at this condition.
    Error,
}

/// Machine-readable identifier of a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DiagnosticCode {
    /// Two traces disagree on their set of sample sites.
    ModelVarsChanged,
    /// A guide site marked auxiliary also appears in the model.
    AuxiliaryInModel,
    /// Unobserved guide sites with no model counterpart.
    GuideOnlyVars,
    /// Unobserved model sites with neither guide site nor enumeration.
    ModelOnlyVars,
    /// Subsample sites present in the guide but not the model.
    GuideOnlyPlates,
    /// A site follows enumerated sites of a plate it is outside of.
    PossiblyInvalidDependency,
    /// Per-site enumeration hints ignored by the inference procedure.
    UnusedEnumeration,
    /// A value or gradient contains NaN.
    NanDetected,
    /// A value or gradient contains `+inf`.
    PosInfDetected,
    /// A value or gradient contains `-inf`.
    NegInfDetected,
    /// Two frames on one site claim the same dimension.
    DimCollision,
    /// A frame claims a dimension counted from the left.
    NonNegativeDim,
    /// A frame claims a dimension deeper than any layout allows.
    DimOutOfRange,
    /// The frame stack is deeper than `max_plate_nesting`.
    PlateStackOverflow,
    /// A `log_prob` shape disagrees with the frame stack.
    InvalidLogProbShape,
    /// A sample site has no `log_prob` to check.
    MissingLogProb,
    /// Model and guide disagree on `event_dim`.
    EventDimMismatch,
    /// Two sites disagree on their sample shape.
    ShapeMismatch,
    /// Warnings were promoted to errors by configuration.
    WarningsDenied,
    /// The check configuration could not be loaded.
    InvalidConfig,
}

impl DiagnosticCode {
    /// Stable kebab-case name, matching the serialized form.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            DiagnosticCode::ModelVarsChanged => "model-vars-changed",
            DiagnosticCode::AuxiliaryInModel => "auxiliary-in-model",
            DiagnosticCode::GuideOnlyVars => "guide-only-vars",
            DiagnosticCode::ModelOnlyVars => "model-only-vars",
            DiagnosticCode::GuideOnlyPlates => "guide-only-plates",
            DiagnosticCode::PossiblyInvalidDependency => "possibly-invalid-dependency",
            DiagnosticCode::UnusedEnumeration => "unused-enumeration",
            DiagnosticCode::NanDetected => "nan-detected",
            DiagnosticCode::PosInfDetected => "pos-inf-detected",
            DiagnosticCode::NegInfDetected => "neg-inf-detected",
            DiagnosticCode::DimCollision => "dim-collision",
            DiagnosticCode::NonNegativeDim => "non-negative-dim",
            DiagnosticCode::DimOutOfRange => "dim-out-of-range",
            DiagnosticCode::PlateStackOverflow => "plate-stack-overflow",
            DiagnosticCode::InvalidLogProbShape => "invalid-log-prob-shape",
            DiagnosticCode::MissingLogProb => "missing-log-prob",
            DiagnosticCode::EventDimMismatch => "event-dim-mismatch",
            DiagnosticCode::ShapeMismatch => "shape-mismatch",
            DiagnosticCode::WarningsDenied => "warnings-denied",
            DiagnosticCode::InvalidConfig => "invalid-config",
        }
    }
}

impl fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single structured finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    /// Severity of the finding.
    pub severity: Severity,
    /// Machine-readable identifier.
    pub code: DiagnosticCode,
    /// Offending site, when the finding concerns one.
    pub site: Option<String>,
    /// Human-readable message.
    pub message: String,
    /// Compared values and other structured context.
    pub context: BTreeMap<String, String>,
}

impl Diagnostic {
    /// Creates an advisory diagnostic.
    pub fn warn(code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            code,
            site: None,
            message: message.into(),
            context: BTreeMap::new(),
        }
    }

    /// Creates a fatal diagnostic.
    pub fn error(code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            ..Self::warn(code, message)
        }
    }

    /// Attaches the offending site.
    #[must_use]
    pub fn at_site(mut self, site: impl Into<String>) -> Self {
        self.site = Some(site.into());
        self
    }

    /// Adds one context entry.
    #[must_use]
    pub fn with_context(mut self, key: impl Into<String>, value: impl fmt::Debug) -> Self {
        self.context.insert(key.into(), format!("{value:?}"));
        self
    }

    /// Adds one context entry that is already text.
    #[must_use]
    pub fn with_text(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Returns true for fatal diagnostics.
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    /// Emits the diagnostic on the `tracing` channel.
    pub fn log(&self) {
        let site = self.site.as_deref().unwrap_or("-");
        match self.severity {
            Severity::Warning => tracing::warn!(code = %self.code, site, "{}", self.message),
            Severity::Error => tracing::error!(code = %self.code, site, "{}", self.message),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.severity {
            Severity::Warning => "WARN",
            Severity::Error => "FAIL",
        };
        write!(f, "[{}] {}: {}", level, self.code, self.message)
    }
}

/// Ordered collection of diagnostics produced by one or more checks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DiagnosticReport {
    /// All findings in detection order.
    pub diagnostics: Vec<Diagnostic>,
}

impl DiagnosticReport {
    /// Creates a new empty report.
    #[must_use]
    pub fn new() -> Self {
        Self {
            diagnostics: Vec::new(),
        }
    }

    /// Logs and appends a diagnostic.
    pub fn push(&mut self, diagnostic: Diagnostic) {
        diagnostic.log();
        self.diagnostics.push(diagnostic);
    }

    /// Extends this report with results from another report.
    pub fn extend(&mut self, other: DiagnosticReport) {
        self.diagnostics.extend(other.diagnostics);
    }

    /// Returns the count of advisory diagnostics.
    #[must_use]
    pub fn warning_count(&self) -> usize {
        self.diagnostics.iter().filter(|d| !d.is_error()).count()
    }

    /// Returns the count of fatal diagnostics.
    #[must_use]
    pub fn error_count(&self) -> usize {
        self.diagnostics.iter().filter(|d| d.is_error()).count()
    }

    /// Returns true if nothing was reported.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.diagnostics.is_empty()
    }

    /// Returns true if any diagnostic carries `code`.
    #[must_use]
    pub fn has(&self, code: DiagnosticCode) -> bool {
        self.diagnostics.iter().any(|d| d.code == code)
    }

    /// Diagnostics carrying `code`, in detection order.
    pub fn with_code(&self, code: DiagnosticCode) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(move |d| d.code == code)
    }

    /// Serializes the report as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns an error only if serialization fails.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl IntoIterator for DiagnosticReport {
    type Item = Diagnostic;
    type IntoIter = std::vec::IntoIter<Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.diagnostics.into_iter()
    }
}

/// Shared, thread-safe report for findings produced after a call returns.
///
/// Gradient hooks run on the autodiff runtime's backward thread; every clone
/// of a sink appends to the same report.
#[derive(Debug, Clone, Default)]
pub struct DiagnosticSink {
    inner: Arc<Mutex<DiagnosticReport>>,
}

impl DiagnosticSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Logs and records a diagnostic.
    pub fn emit(&self, diagnostic: Diagnostic) {
        self.lock().push(diagnostic);
    }

    /// Number of recorded diagnostics.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().diagnostics.len()
    }

    /// Returns true if nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of everything recorded so far.
    #[must_use]
    pub fn snapshot(&self) -> DiagnosticReport {
        self.lock().clone()
    }

    /// Removes and returns everything recorded so far.
    #[must_use]
    pub fn take(&self) -> DiagnosticReport {
        std::mem::take(&mut *self.lock())
    }

    fn lock(&self) -> MutexGuard<'_, DiagnosticReport> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_by_severity() {
        let mut report = DiagnosticReport::new();
        report.push(Diagnostic::warn(DiagnosticCode::ModelOnlyVars, "x"));
        report.push(Diagnostic::error(DiagnosticCode::ShapeMismatch, "y").at_site("y"));
        assert_eq!(report.warning_count(), 1);
        assert_eq!(report.error_count(), 1);
        assert!(report.has(DiagnosticCode::ShapeMismatch));
        assert!(!report.has(DiagnosticCode::DimCollision));
        assert!(!report.is_clean());
    }

    #[test]
    fn codes_serialize_as_kebab_case() {
        let d = Diagnostic::warn(DiagnosticCode::PossiblyInvalidDependency, "m")
            .with_context("plates", vec!["a"]);
        let json = serde_json::to_value(&d).unwrap_or_default();
        assert_eq!(json["code"], "possibly-invalid-dependency");
        assert_eq!(json["severity"], "warning");
        assert_eq!(json["context"]["plates"], "[\"a\"]");
        assert_eq!(
            DiagnosticCode::PossiblyInvalidDependency.to_string(),
            "possibly-invalid-dependency"
        );
    }

    #[test]
    fn sink_clones_share_storage() {
        let sink = DiagnosticSink::new();
        let other = sink.clone();
        other.emit(Diagnostic::warn(DiagnosticCode::NanDetected, "Encountered NaN."));
        assert_eq!(sink.len(), 1);
        assert_eq!(sink.take().diagnostics.len(), 1);
        assert!(other.is_empty());
    }

    #[test]
    fn display_includes_level_and_code() {
        let d = Diagnostic::error(DiagnosticCode::DimCollision, "boom");
        assert_eq!(d.to_string(), "[FAIL] dim-collision: boom");
    }
}
