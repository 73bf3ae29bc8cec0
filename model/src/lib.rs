//! Execution traces of probabilistic programs encoded as typed Rust data.
//!
//! The `tracecheck-model` crate describes what a trace-recording runtime
//! hands to the checkers: an ordered set of named [`Site`]s, each carrying
//! its stack of independence contexts ([`Frame`]s), inference hints, the
//! distribution it was drawn from and the shape of its `log_prob` tensor.
//!
//! Tensors and distributions belong to an external runtime. The crate only
//! defines the capabilities the checkers need from them ([`Tensor`],
//! [`Distribution`]) together with small reference implementations
//! ([`DenseTensor`], [`DistributionSpec`]).
//!
//! # Entry Point
//!
//! ```
//! use tracecheck_model::{DistributionSpec, Frame, GraphType, Site, Trace};
//!
//! let mut trace = Trace::new(GraphType::Flat);
//! trace
//!     .add_node(
//!         Site::sample("x", DistributionSpec::new("Normal", vec![10], vec![]))
//!             .with_frame(Frame::plate("data", 10, Some(-1))),
//!     )
//!     .unwrap();
//! assert_eq!(trace.sample_sites(), vec!["x"]);
//! ```
//!
//! # Serialization
//!
//! ```
//! let doc = r#"{ "nodes": [ { "name": "x", "type": "sample" } ] }"#;
//! let trace = tracecheck_model::serializer::json::trace_from_json(doc).unwrap();
//! assert_eq!(trace.len(), 1);
//! ```

#![deny(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    missing_docs,
    clippy::missing_errors_doc
)]

pub mod distribution;
pub mod model;
#[cfg(feature = "serializers")]
pub mod serializer;
pub mod tensor;

pub use distribution::{Distribution, DistributionSpec, Kwargs};
pub use model::{
    Enumerate, Frame, GraphType, InferConfig, Site, SiteType, Trace, TraceError,
};
pub use tensor::{DenseTensor, GradHook, Tensor};
