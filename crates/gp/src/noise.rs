//! Noise level of the training targets, either a single standard deviation
//! shared by all training points or one standard deviation per point.
//!
//! The squared noise level is the regularization (aka nugget) added to the
//! diagonal of the covariance matrix.

use crate::errors::{GpError, Result};
use crate::utils::select_elems;
use linfa::Float;
use log::warn;
use ndarray::{concatenate, Array1, Array2, ArrayBase, Axis, Data, Ix1};
#[cfg(feature = "serializable")]
use serde::{Deserialize, Serialize};
use std::fmt;

/// Uncorrelated standard deviation of the training targets
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serializable", derive(Serialize, Deserialize))]
pub enum NoiseLevel<F: Float> {
    /// Same noise level for every training point
    Scalar(F),
    /// One noise level per finite training point
    PerPoint(Array1<F>),
}

impl<F: Float> Default for NoiseLevel<F> {
    fn default() -> Self {
        NoiseLevel::Scalar(F::cast(1e-2))
    }
}

impl<F: Float> From<F> for NoiseLevel<F> {
    fn from(value: F) -> Self {
        NoiseLevel::Scalar(value)
    }
}

impl<F: Float> From<Array1<F>> for NoiseLevel<F> {
    fn from(values: Array1<F>) -> Self {
        NoiseLevel::PerPoint(values)
    }
}

impl<F: Float> fmt::Display for NoiseLevel<F> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            NoiseLevel::Scalar(v) => write!(f, "{v}"),
            NoiseLevel::PerPoint(v) => write!(f, "{v}"),
        }
    }
}

impl<F: Float> NoiseLevel<F> {
    /// Whether one noise level is given per training point
    pub fn is_per_point(&self) -> bool {
        matches!(self, NoiseLevel::PerPoint(_))
    }

    /// Apply `f` to each noise value
    pub fn map(&self, f: impl Fn(F) -> F) -> Self {
        match self {
            NoiseLevel::Scalar(v) => NoiseLevel::Scalar(f(*v)),
            NoiseLevel::PerPoint(v) => NoiseLevel::PerPoint(v.mapv(f)),
        }
    }

    /// Squared noise level, the regularization added to the kernel diagonal
    pub fn squared(&self) -> Self {
        self.map(|v| v * v)
    }

    /// Noise values as an array of `n` elements
    pub fn to_array(&self, n: usize) -> Array1<F> {
        match self {
            NoiseLevel::Scalar(v) => Array1::from_elem(n, *v),
            NoiseLevel::PerPoint(v) => v.to_owned(),
        }
    }

    /// Keep per-point values where mask is true, a scalar is left untouched
    pub(crate) fn select(&self, mask: &Array1<bool>) -> Self {
        match self {
            NoiseLevel::Scalar(v) => NoiseLevel::Scalar(*v),
            NoiseLevel::PerPoint(v) => NoiseLevel::PerPoint(select_elems(v, mask)),
        }
    }

    /// Check the per-point noise level matches `n` training points
    pub(crate) fn check_len(&self, n: usize) -> Result<()> {
        match self {
            NoiseLevel::PerPoint(v) if v.len() != n => Err(GpError::ArgumentError(format!(
                "noise_level must be a scalar or an array with same number of entries as y ({} != {})",
                v.len(),
                n
            ))),
            _ => Ok(()),
        }
    }

    /// Add the values to the diagonal of the square matrix `k`
    ///
    /// *Panics* if per-point values do not match the matrix size
    pub(crate) fn add_to_diagonal(&self, k: &mut Array2<F>) {
        match self {
            NoiseLevel::Scalar(v) => k.diag_mut().mapv_inplace(|d| d + *v),
            NoiseLevel::PerPoint(v) => {
                let mut diag = k.diag_mut();
                diag += v;
            }
        }
    }
}

fn append<F: Float>(
    a: &ArrayBase<impl Data<Elem = F>, Ix1>,
    b: &ArrayBase<impl Data<Elem = F>, Ix1>,
) -> Array1<F> {
    let mut res = a.to_owned();
    // both are 1d arrays, this never fails
    let _ = res.append(Axis(0), b.view());
    res
}

/// Update the stored noise levels when `n_new` finite points are appended to
/// `n_prior` finite training points.
///
/// `raw` is the noise level in target units, `transformed` the one in preprocessed
/// units, kept in step with `raw` via `transform` unless the model is about to be
/// refit (in which case the transformed level is recomputed from scratch).
pub(crate) fn reconcile_noise_level<F: Float>(
    raw: &mut NoiseLevel<F>,
    transformed: &mut NoiseLevel<F>,
    new: Option<NoiseLevel<F>>,
    n_prior: usize,
    n_new: usize,
    refit: bool,
    transform: impl Fn(F) -> F,
) -> Result<()> {
    match new {
        Some(NoiseLevel::PerPoint(new)) => {
            if new.len() != n_new {
                return Err(GpError::ArgumentError(format!(
                    "noise_level must be an array with same number of entries as y ({} != {})",
                    new.len(),
                    n_new
                )));
            }
            match raw {
                NoiseLevel::PerPoint(stored) => {
                    *raw = NoiseLevel::PerPoint(append(stored, &new));
                    if !refit {
                        let new_ = new.mapv(&transform);
                        *transformed = match transformed {
                            NoiseLevel::PerPoint(stored_) => {
                                NoiseLevel::PerPoint(append(stored_, &new_))
                            }
                            NoiseLevel::Scalar(_) => raw.map(&transform),
                        };
                    }
                }
                NoiseLevel::Scalar(stored) => {
                    warn!(
                        "A new noise level has been assigned to the updated training set \
                         while the old training set has a single scalar noise level: {stored}"
                    );
                    let upgraded = concatenate(
                        Axis(0),
                        &[Array1::from_elem(n_prior, *stored).view(), new.view()],
                    )
                    .map_err(|e| GpError::ArgumentError(e.to_string()))?;
                    *raw = NoiseLevel::PerPoint(upgraded);
                    if !refit {
                        *transformed = raw.map(&transform);
                    }
                }
            }
        }
        None => {
            if raw.is_per_point() {
                return Err(GpError::ArgumentError(
                    "No value for the noise level given even though concrete values were \
                     given earlier. Please only give one scalar value or a different one \
                     for each training point."
                        .to_string(),
                ));
            }
        }
        Some(NoiseLevel::Scalar(new)) => {
            if !refit {
                warn!(
                    "Overwriting the noise level with a scalar without refitting \
                     the kernel's hyperparameters. This may cause unwanted behaviour."
                );
                *transformed = NoiseLevel::Scalar(transform(new));
            }
            *raw = NoiseLevel::Scalar(new);
        }
    }
    Ok(())
}
