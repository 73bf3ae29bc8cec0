//! Tensor capability consumed by the numeric and shape checks.
//!
//! The autodiff runtime owns real tensors. Checkers need three things from
//! them: the shape, an elementwise "any" reduction, and a way to observe the
//! gradient once the backward pass produces it.

use std::fmt;
use std::sync::{Mutex, MutexGuard};

use crate::model::TraceError;

/// One-shot observer invoked with a tensor's gradient during backward.
pub type GradHook = Box<dyn FnOnce(&dyn Tensor) + Send + 'static>;

/// A tensor as seen by the checkers.
pub trait Tensor: fmt::Debug + Send + Sync {
    /// Dimension sizes, outermost first.
    fn shape(&self) -> &[usize];

    /// Returns true if `pred` holds for any element.
    fn any(&self, pred: &dyn Fn(f64) -> bool) -> bool;

    /// Whether the tensor participates in a differentiable computation.
    fn requires_grad(&self) -> bool {
        false
    }

    /// Registers `hook` to run once with this tensor's gradient.
    ///
    /// Returns false when the tensor cannot carry hooks; the hook is dropped.
    fn register_hook(&self, hook: GradHook) -> bool {
        drop(hook);
        false
    }
}

/// Row-major `f64` tensor used by the trace loader and in tests.
pub struct DenseTensor {
    shape: Vec<usize>,
    data: Vec<f64>,
    requires_grad: bool,
    hooks: Mutex<Vec<GradHook>>,
}

impl DenseTensor {
    /// Builds a tensor from its shape and row-major values.
    ///
    /// # Errors
    ///
    /// Returns [`TraceError::TensorData`] if `data` does not fill `shape`.
    pub fn new(shape: Vec<usize>, data: Vec<f64>) -> Result<Self, TraceError> {
        let expected: usize = shape.iter().product();
        if expected != data.len() {
            return Err(TraceError::TensorData {
                shape,
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            shape,
            data,
            requires_grad: false,
            hooks: Mutex::new(Vec::new()),
        })
    }

    /// A zero-filled tensor.
    #[must_use]
    pub fn zeros(shape: Vec<usize>) -> Self {
        let len = shape.iter().product();
        Self {
            shape,
            data: vec![0.0; len],
            requires_grad: false,
            hooks: Mutex::new(Vec::new()),
        }
    }

    /// A 0-dimensional tensor holding `value`.
    #[must_use]
    pub fn scalar(value: f64) -> Self {
        Self {
            shape: Vec::new(),
            data: vec![value],
            requires_grad: false,
            hooks: Mutex::new(Vec::new()),
        }
    }

    /// Sets whether the tensor requires gradients.
    #[must_use]
    pub fn with_requires_grad(mut self, requires_grad: bool) -> Self {
        self.requires_grad = requires_grad;
        self
    }

    /// Row-major values.
    #[must_use]
    pub fn data(&self) -> &[f64] {
        &self.data
    }

    /// Number of hooks waiting for a gradient.
    #[must_use]
    pub fn pending_hooks(&self) -> usize {
        self.lock_hooks().len()
    }

    /// Delivers `grad` to every registered hook, as the backward pass would.
    ///
    /// Hooks are one-shot: they are drained before being run. Returns the
    /// number of hooks fired.
    pub fn backward(&self, grad: &dyn Tensor) -> usize {
        let hooks: Vec<GradHook> = std::mem::take(&mut *self.lock_hooks());
        let fired = hooks.len();
        for hook in hooks {
            hook(grad);
        }
        fired
    }

    fn lock_hooks(&self) -> MutexGuard<'_, Vec<GradHook>> {
        // A hook that panicked leaves the list itself intact.
        match self.hooks.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl Tensor for DenseTensor {
    fn shape(&self) -> &[usize] {
        &self.shape
    }

    fn any(&self, pred: &dyn Fn(f64) -> bool) -> bool {
        self.data.iter().any(|&x| pred(x))
    }

    fn requires_grad(&self) -> bool {
        self.requires_grad
    }

    fn register_hook(&self, hook: GradHook) -> bool {
        if !self.requires_grad {
            return false;
        }
        self.lock_hooks().push(hook);
        true
    }
}

impl Clone for DenseTensor {
    fn clone(&self) -> Self {
        Self {
            shape: self.shape.clone(),
            data: self.data.clone(),
            requires_grad: self.requires_grad,
            hooks: Mutex::new(Vec::new()),
        }
    }
}

impl fmt::Debug for DenseTensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DenseTensor")
            .field("shape", &self.shape)
            .field("requires_grad", &self.requires_grad)
            .field("pending_hooks", &self.pending_hooks())
            .finish()
    }
}
