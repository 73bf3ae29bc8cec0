//! Trace builders shared by the integration tests.

#![allow(dead_code)]

use tracecheck_model::{DenseTensor, DistributionSpec, Frame, GraphType, Site, Trace};

/// A trace holding `sites` in order.
pub fn trace(sites: Vec<Site>) -> Trace {
    let mut trace = Trace::new(GraphType::Flat);
    for site in sites {
        trace.add_node(site).expect("site names are unique");
    }
    trace
}

/// A latent site with the given batch shape and no frames.
pub fn latent(name: &str, batch_shape: Vec<usize>) -> Site {
    Site::sample(name, DistributionSpec::new("Normal", batch_shape, vec![]))
}

/// A latent site with the given frames and a zero `log_prob` of `shape`.
pub fn plated(name: &str, frames: Vec<Frame>, shape: Vec<usize>) -> Site {
    latent(name, shape.clone())
        .with_frames(frames)
        .with_log_prob(DenseTensor::zeros(shape))
}

/// A vectorized plate.
pub fn plate(name: &str, size: usize, dim: isize) -> Frame {
    Frame::plate(name, size, Some(dim))
}

/// Routes `tracing` output to the test harness.
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
