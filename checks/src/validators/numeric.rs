//! Numeric guard: NaN and infinity detection on values and their gradients.
//!
//! The warn functions never fail. Findings go to a [`DiagnosticSink`] so
//! that gradient hooks, which fire long after the call returns, report into
//! the same place as the immediate check.

use tracecheck_model::Tensor;

use crate::report::{Diagnostic, DiagnosticCode, DiagnosticSink};

/// A value inspected by the numeric guard.
#[derive(Debug, Clone, Copy)]
pub enum Value<'a> {
    /// A plain number.
    Scalar(f64),
    /// A tensor owned by the autodiff runtime.
    Tensor(&'a dyn Tensor),
}

impl From<f64> for Value<'_> {
    fn from(value: f64) -> Self {
        Value::Scalar(value)
    }
}

impl<'a> From<&'a dyn Tensor> for Value<'a> {
    fn from(value: &'a dyn Tensor) -> Self {
        Value::Tensor(value)
    }
}

impl<'a, T: Tensor> From<&'a T> for Value<'a> {
    fn from(value: &'a T) -> Self {
        Value::Tensor(value)
    }
}

impl Value<'_> {
    fn any(self, pred: &dyn Fn(f64) -> bool) -> bool {
        match self {
            Value::Scalar(x) => pred(x),
            Value::Tensor(t) => t.any(pred),
        }
    }
}

/// Returns true if the value is NaN or any tensor element is.
#[must_use]
pub fn is_nan<'a>(value: impl Into<Value<'a>>) -> bool {
    value.into().any(&|x| x.is_nan())
}

/// Returns true if the value is infinite or any tensor element is.
#[must_use]
pub fn is_inf<'a>(value: impl Into<Value<'a>>) -> bool {
    value.into().any(&|x| x.is_infinite())
}

fn labelled(prefix: &str, msg: &str) -> String {
    if msg.is_empty() {
        format!("{prefix}.")
    } else {
        format!("{prefix}: {msg}")
    }
}

/// Warns into `sink` if the value contains NaN.
///
/// A tensor that requires gradients also gets a one-shot hook that repeats
/// the check on its gradient, so the guard follows the backward pass.
pub fn warn_if_nan<'a>(value: impl Into<Value<'a>>, msg: &str, sink: &DiagnosticSink) {
    let value = value.into();
    if let Value::Tensor(tensor) = value {
        if tensor.requires_grad() {
            let msg = msg.to_owned();
            let hook_sink = sink.clone();
            tensor.register_hook(Box::new(move |grad: &dyn Tensor| {
                warn_if_nan(grad, &msg, &hook_sink);
            }));
        }
    }

    if is_nan(value) {
        sink.emit(Diagnostic::warn(
            DiagnosticCode::NanDetected,
            labelled("Encountered NaN", msg),
        ));
    }
}

/// Warns into `sink` if the value contains `+inf` or `-inf`.
///
/// Each sign is reported independently unless explicitly allowed. Gradients
/// are followed the same way as in [`warn_if_nan`].
pub fn warn_if_inf<'a>(
    value: impl Into<Value<'a>>,
    msg: &str,
    allow_posinf: bool,
    allow_neginf: bool,
    sink: &DiagnosticSink,
) {
    let value = value.into();
    if let Value::Tensor(tensor) = value {
        if tensor.requires_grad() {
            let msg = msg.to_owned();
            let hook_sink = sink.clone();
            tensor.register_hook(Box::new(move |grad: &dyn Tensor| {
                warn_if_inf(grad, &msg, allow_posinf, allow_neginf, &hook_sink);
            }));
        }
    }

    if !allow_posinf && value.any(&|x| x == f64::INFINITY) {
        sink.emit(Diagnostic::warn(
            DiagnosticCode::PosInfDetected,
            labelled("Encountered +inf", msg),
        ));
    }
    if !allow_neginf && value.any(&|x| x == f64::NEG_INFINITY) {
        sink.emit(Diagnostic::warn(
            DiagnosticCode::NegInfDetected,
            labelled("Encountered -inf", msg),
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracecheck_model::DenseTensor;

    fn tensor(data: Vec<f64>) -> DenseTensor {
        let len = data.len();
        DenseTensor::new(vec![len], data).unwrap_or_else(|_| DenseTensor::zeros(vec![0]))
    }

    #[test]
    fn scalar_predicates() {
        assert!(is_nan(f64::NAN));
        assert!(!is_nan(1.0));
        assert!(is_inf(f64::INFINITY));
        assert!(is_inf(f64::NEG_INFINITY));
        assert!(!is_inf(f64::MAX));
    }

    #[test]
    fn tensor_predicates() {
        let finite = tensor(vec![0.0, 1.0, -2.5]);
        assert!(!is_nan(&finite));
        assert!(!is_inf(&finite));
        assert!(is_nan(&tensor(vec![0.0, f64::NAN])));
        assert!(is_inf(&tensor(vec![f64::NEG_INFINITY, 0.0])));
    }

    #[test]
    fn nan_message_with_and_without_label() {
        let sink = DiagnosticSink::new();
        warn_if_nan(f64::NAN, "", &sink);
        warn_if_nan(f64::NAN, "loss", &sink);
        warn_if_nan(0.5, "loss", &sink);
        let messages: Vec<String> = sink.take().into_iter().map(|d| d.message).collect();
        assert_eq!(messages, vec!["Encountered NaN.", "Encountered NaN: loss"]);
    }

    #[test]
    fn allowed_signs_are_not_reported() {
        let sink = DiagnosticSink::new();
        let t = tensor(vec![f64::INFINITY, f64::NEG_INFINITY]);
        warn_if_inf(&t, "x", true, false, &sink);
        let report = sink.take();
        assert!(!report.has(DiagnosticCode::PosInfDetected));
        assert!(report.has(DiagnosticCode::NegInfDetected));

        warn_if_inf(&t, "x", false, false, &sink);
        assert_eq!(sink.len(), 2);
    }

    #[test]
    fn gradient_checked_after_backward() {
        let sink = DiagnosticSink::new();
        let t = tensor(vec![1.0, 2.0]).with_requires_grad(true);
        warn_if_nan(&t, "grad", &sink);
        assert!(sink.is_empty());
        assert_eq!(t.pending_hooks(), 1);

        let grad = tensor(vec![f64::NAN, 0.0]);
        assert_eq!(t.backward(&grad), 1);
        let report = sink.take();
        assert!(report.has(DiagnosticCode::NanDetected));
        assert_eq!(report.diagnostics[0].message, "Encountered NaN: grad");
    }

    #[test]
    fn hook_chains_into_gradient_of_gradient() {
        let sink = DiagnosticSink::new();
        let t = tensor(vec![1.0]).with_requires_grad(true);
        warn_if_inf(&t, "", false, false, &sink);

        let grad = tensor(vec![f64::INFINITY]).with_requires_grad(true);
        t.backward(&grad);
        assert!(sink.snapshot().has(DiagnosticCode::PosInfDetected));
        assert_eq!(grad.pending_hooks(), 1);
    }

    #[test]
    fn tensors_without_grad_get_no_hook() {
        let sink = DiagnosticSink::new();
        let t = tensor(vec![1.0]);
        warn_if_nan(&t, "", &sink);
        assert_eq!(t.pending_hooks(), 0);
    }
}
