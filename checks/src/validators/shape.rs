//! Site shape validator.
//!
//! Reconstructs the batch layout a site's plates imply and compares it with
//! the shape of the site's `log_prob`:
//! - Every plate with an assigned `dim` owns that dimension, counted from the right
//! - No two plates on one site may own the same dimension
//! - The layout may not be deeper than `max_plate_nesting`
//! - Dimensions left of `max_plate_nesting` are not checked

use std::fmt;

use tracecheck_model::Site;

use crate::config::PlateNesting;
use crate::error::CheckError;
use crate::validators::zip_from_right;

/// One entry of the layout implied by a frame stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpectedDim {
    /// Owned by a plate of this size.
    Size(usize),
    /// Not owned by any plate; any size matches.
    Any,
}

impl ExpectedDim {
    fn admits(self, actual: usize) -> bool {
        match self {
            ExpectedDim::Size(size) => size == actual,
            ExpectedDim::Any => true,
        }
    }
}

impl fmt::Display for ExpectedDim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExpectedDim::Size(size) => write!(f, "{size}"),
            ExpectedDim::Any => f.write_str("-1"),
        }
    }
}

/// Deepest dimension a frame may claim, whatever `max_plate_nesting` says.
pub const MAX_LAYOUT_DIMS: usize = 64;

/// Layout implied by `site`'s frame stack, outermost dimension first.
///
/// # Errors
///
/// Returns [`CheckError::NonNegativeDim`] for a frame counting from the left,
/// [`CheckError::PlateStackOverflow`] for a frame deeper than
/// `max_plate_nesting`, [`CheckError::DimOutOfRange`] for a frame deeper than
/// [`MAX_LAYOUT_DIMS`] and [`CheckError::DimCollision`] when two frames claim
/// one dimension.
pub fn expected_shape(
    site: &Site,
    max_plate_nesting: PlateNesting,
) -> Result<Vec<ExpectedDim>, CheckError> {
    let mut expected: Vec<Option<usize>> = Vec::new();
    for frame in &site.cond_indep_stack {
        let Some(dim) = frame.dim else {
            continue;
        };
        if dim >= 0 {
            return Err(CheckError::NonNegativeDim {
                site: site.name.clone(),
                frame: frame.name.clone(),
                dim,
            });
        }
        // Bounds come before any padding is allocated.
        let depth = dim.unsigned_abs();
        if max_plate_nesting.is_exceeded_by(depth) {
            return Err(CheckError::PlateStackOverflow {
                site: site.name.clone(),
                required: depth,
                max_plate_nesting,
            });
        }
        if depth > MAX_LAYOUT_DIMS {
            return Err(CheckError::DimOutOfRange {
                site: site.name.clone(),
                frame: frame.name.clone(),
                dim,
                max: MAX_LAYOUT_DIMS,
            });
        }
        if expected.len() < depth {
            let mut padded = vec![None; depth - expected.len()];
            padded.append(&mut expected);
            expected = padded;
        }
        let index = expected.len() - depth;
        if expected[index].is_some() {
            return Err(CheckError::DimCollision {
                site: site.name.clone(),
                frame: frame.name.clone(),
                dim,
            });
        }
        expected[index] = Some(frame.size);
    }
    Ok(expected
        .into_iter()
        .map(|size| size.map_or(ExpectedDim::Any, ExpectedDim::Size))
        .collect())
}

/// Checks that `site`'s `log_prob` shape agrees with its plates.
///
/// Shapes are aligned from the right. Missing actual dimensions count as
/// size 1; missing expected dimensions are unconstrained.
///
/// # Errors
///
/// Returns [`CheckError::MissingLogProb`], any error of [`expected_shape`]
/// or [`CheckError::InvalidLogProbShape`].
pub fn check_site_shape(site: &Site, max_plate_nesting: PlateNesting) -> Result<(), CheckError> {
    let log_prob = site
        .log_prob
        .as_ref()
        .ok_or_else(|| CheckError::MissingLogProb {
            site: site.name.clone(),
        })?;

    let expected = expected_shape(site, max_plate_nesting)?;

    // Dimensions left of max_plate_nesting belong to enumeration.
    let actual = max_plate_nesting.rightmost(log_prob.shape());
    // TODO: validate parallel enumeration dims left of max_plate_nesting
    // against the enumerate_dim hints once sites record their full enum stack.
    let consistent = zip_from_right(actual, expected.as_slice(), 1, ExpectedDim::Any)
        .all(|(actual_size, expected_size)| expected_size.admits(actual_size));
    if !consistent {
        return Err(CheckError::InvalidLogProbShape {
            site: site.name.clone(),
            expected,
            actual: actual.to_vec(),
        });
    }

    tracing::debug!(site = %site.name, shape = ?actual, "site shape consistent with plates");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracecheck_model::{DenseTensor, DistributionSpec, Frame};

    fn site(frames: Vec<Frame>, shape: Vec<usize>) -> Site {
        Site::sample("x", DistributionSpec::new("Normal", vec![], vec![]))
            .with_frames(frames)
            .with_log_prob(DenseTensor::zeros(shape))
    }

    #[test]
    fn no_frames_means_empty_layout() {
        let s = site(vec![], vec![3]);
        assert_eq!(expected_shape(&s, PlateNesting::Unbounded).ok(), Some(vec![]));
        assert!(check_site_shape(&s, PlateNesting::Bounded(1)).is_ok());
    }

    #[test]
    fn unassigned_dims_are_skipped() {
        let s = site(vec![Frame::sequential("loop", 4, 2)], vec![]);
        assert_eq!(expected_shape(&s, PlateNesting::Unbounded).ok(), Some(vec![]));
    }

    #[test]
    fn gaps_become_wildcards() {
        let s = site(vec![Frame::plate("outer", 5, Some(-3))], vec![5, 7, 2]);
        assert_eq!(
            expected_shape(&s, PlateNesting::Unbounded).ok(),
            Some(vec![ExpectedDim::Size(5), ExpectedDim::Any, ExpectedDim::Any])
        );
        assert!(check_site_shape(&s, PlateNesting::Bounded(3)).is_ok());
    }

    #[test]
    fn inner_frame_recorded_first_still_aligns() {
        let s = site(
            vec![
                Frame::plate("inner", 3, Some(-1)),
                Frame::plate("outer", 5, Some(-2)),
            ],
            vec![5, 3],
        );
        assert_eq!(
            expected_shape(&s, PlateNesting::Unbounded).ok(),
            Some(vec![ExpectedDim::Size(5), ExpectedDim::Size(3)])
        );
    }

    #[test]
    fn positive_dim_rejected() {
        let s = site(vec![Frame::plate("data", 3, Some(0))], vec![3]);
        assert!(matches!(
            check_site_shape(&s, PlateNesting::Unbounded),
            Err(CheckError::NonNegativeDim { dim: 0, .. })
        ));
    }

    #[test]
    fn missing_log_prob_rejected() {
        let s = Site::sample("x", DistributionSpec::new("Normal", vec![], vec![]));
        assert!(matches!(
            check_site_shape(&s, PlateNesting::Unbounded),
            Err(CheckError::MissingLogProb { .. })
        ));
    }

    #[test]
    fn broadcast_singleton_actual_dims_rejected_under_sized_plate() {
        // An actual shape shorter than the layout is padded with 1, which
        // does not match a plate of size 3.
        let s = site(vec![Frame::plate("data", 3, Some(-1))], vec![]);
        assert!(matches!(
            check_site_shape(&s, PlateNesting::Bounded(1)),
            Err(CheckError::InvalidLogProbShape { .. })
        ));
    }

    #[test]
    fn huge_dim_overflows_nesting_without_padding() {
        let s = site(vec![Frame::plate("p", 3, Some(isize::MIN))], vec![3]);
        assert!(matches!(
            check_site_shape(&s, PlateNesting::Bounded(2)),
            Err(CheckError::PlateStackOverflow { required, .. })
                if required == isize::MIN.unsigned_abs()
        ));
        let s = site(vec![Frame::plate("p", 3, Some(-40))], vec![3]);
        assert!(matches!(
            check_site_shape(&s, PlateNesting::Bounded(2)),
            Err(CheckError::PlateStackOverflow { required: 40, .. })
        ));
    }

    #[test]
    fn huge_dim_rejected_when_unbounded() {
        let s = site(vec![Frame::plate("p", 3, Some(isize::MIN))], vec![3]);
        assert!(matches!(
            expected_shape(&s, PlateNesting::Unbounded),
            Err(CheckError::DimOutOfRange { max: MAX_LAYOUT_DIMS, .. })
        ));
        let s = site(vec![Frame::plate("p", 3, Some(-65))], vec![3]);
        assert!(matches!(
            check_site_shape(&s, PlateNesting::Bounded(100)),
            Err(CheckError::DimOutOfRange { dim: -65, .. })
        ));
        let s = site(vec![Frame::plate("p", 3, Some(-64))], vec![3]);
        let layout = expected_shape(&s, PlateNesting::Unbounded).unwrap_or_default();
        assert_eq!(layout.len(), 64);
    }

    #[test]
    fn enumeration_dims_left_of_nesting_ignored() {
        let s = site(vec![Frame::plate("data", 3, Some(-1))], vec![2, 1, 3]);
        assert!(check_site_shape(&s, PlateNesting::Bounded(1)).is_ok());
    }
}
