//! Preprocessors applied to the training data before any kernel computation.
//!
//! The regressor works in the transformed space: inputs go through an
//! [`XPreprocessor`], targets and noise levels through a [`YPreprocessor`].
//! Preprocessors are (re)fitted on the finite training set each time the
//! hyperparameters are refit, and only applied in between.

use crate::errors::{GpError, Result};
use linfa::Float;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
#[cfg(feature = "serializable")]
use serde::{Deserialize, Serialize};
use std::fmt;

/// A transformation of the input space
pub trait XPreprocessor<F: Float>: fmt::Debug + Send + Sync {
    /// Fit the transformation given training inputs and targets
    fn fit(&mut self, x: ArrayView2<F>, y: ArrayView1<F>) -> Result<()>;

    /// Transform inputs given as a (n, d) array
    fn transform(&self, x: ArrayView2<F>) -> Array2<F>;

    /// Transform (d, 2) bounds `[lower, upper]`
    fn transform_bounds(&self, bounds: ArrayView2<F>) -> Array2<F>;

    /// Whether the transformation can be applied
    fn fitted(&self) -> bool;

    /// Clone as a trait object
    fn box_clone(&self) -> Box<dyn XPreprocessor<F>>;
}

impl<F: Float> Clone for Box<dyn XPreprocessor<F>> {
    fn clone(&self) -> Self {
        self.box_clone()
    }
}

/// A transformation of the target values
///
/// Noise levels (and any difference of targets, like the finiteness threshold)
/// are transformed with the `*_noise_level` methods, applied value by value.
pub trait YPreprocessor<F: Float>: fmt::Debug + Send + Sync {
    /// Fit the transformation given training inputs and targets
    fn fit(&mut self, x: ArrayView2<F>, y: ArrayView1<F>) -> Result<()>;

    /// Transform target values
    fn transform(&self, y: ArrayView1<F>) -> Array1<F>;

    /// Inverse transform of target values
    fn inverse_transform(&self, y: ArrayView1<F>) -> Array1<F>;

    /// Transform a noise level (standard deviation)
    fn transform_noise_level(&self, noise: F) -> F;

    /// Inverse transform of a noise level (standard deviation)
    fn inverse_transform_noise_level(&self, noise: F) -> F;

    /// Whether the transformation is linear, hence preserves differences to the maximum
    fn is_linear(&self) -> bool {
        false
    }

    /// Whether the transformation can be applied
    fn fitted(&self) -> bool;

    /// Clone as a trait object
    fn box_clone(&self) -> Box<dyn YPreprocessor<F>>;
}

impl<F: Float> Clone for Box<dyn YPreprocessor<F>> {
    fn clone(&self) -> Self {
        self.box_clone()
    }
}

/// Maps the prior bounds box to the unit hypercube: `x' = (x - lower) / (upper - lower)`
///
/// The transformation only depends on the bounds given at construction,
/// so it is always fitted.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serializable", derive(Serialize, Deserialize))]
pub struct NormalizeBounds<F: Float> {
    lower: Array1<F>,
    width: Array1<F>,
}

impl<F: Float> NormalizeBounds<F> {
    /// Constructor given the (d, 2) prior bounds
    pub fn new(bounds: &Array2<F>) -> Result<Self> {
        if bounds.ncols() != 2 || bounds.nrows() == 0 {
            return Err(GpError::ConfigurationError(format!(
                "Bounds should be a (d, 2) array, got {:?}",
                bounds.shape()
            )));
        }
        let lower = bounds.column(0).to_owned();
        let width = &bounds.column(1) - &lower;
        if width.iter().any(|w| !w.is_finite() || *w <= F::zero()) {
            return Err(GpError::ConfigurationError(format!(
                "Bounds should be finite with lower < upper, got {bounds}"
            )));
        }
        Ok(NormalizeBounds { lower, width })
    }

    /// Map points of the unit hypercube back to the prior box
    pub fn inverse_transform(&self, x: ArrayView2<F>) -> Array2<F> {
        &x * &self.width + &self.lower
    }
}

impl<F: Float> XPreprocessor<F> for NormalizeBounds<F> {
    fn fit(&mut self, _x: ArrayView2<F>, _y: ArrayView1<F>) -> Result<()> {
        Ok(())
    }

    fn transform(&self, x: ArrayView2<F>) -> Array2<F> {
        (&x - &self.lower) / &self.width
    }

    fn transform_bounds(&self, bounds: ArrayView2<F>) -> Array2<F> {
        let mut transformed = Array2::zeros(bounds.raw_dim());
        for j in 0..2 {
            let col = (&bounds.column(j) - &self.lower) / &self.width;
            transformed.column_mut(j).assign(&col);
        }
        transformed
    }

    fn fitted(&self) -> bool {
        true
    }

    fn box_clone(&self) -> Box<dyn XPreprocessor<F>> {
        Box::new(self.clone())
    }
}

/// Standardizes targets: `y' = (y - mean) / std`, noise levels are divided by `std`
///
/// A null standard deviation (e.g. a single training point) is replaced by 1.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serializable", derive(Serialize, Deserialize))]
pub struct NormalizeY<F: Float> {
    mean: Option<F>,
    std: Option<F>,
}

impl<F: Float> NormalizeY<F> {
    /// Constructor of an unfitted standardization
    pub fn new() -> Self {
        NormalizeY {
            mean: None,
            std: None,
        }
    }

    /// Mean and standard deviation, `(0, 1)` until fitted
    pub fn mean_std(&self) -> (F, F) {
        (
            self.mean.unwrap_or_else(F::zero),
            self.std.unwrap_or_else(F::one),
        )
    }
}

impl<F: Float> YPreprocessor<F> for NormalizeY<F> {
    fn fit(&mut self, _x: ArrayView2<F>, y: ArrayView1<F>) -> Result<()> {
        let mean = y.mean_axis(Axis(0)).ok_or_else(|| {
            GpError::ArgumentError("Cannot normalize an empty set of targets".to_string())
        })?;
        let mean = mean.into_scalar();
        let std = y.std_axis(Axis(0), F::zero()).into_scalar();
        self.mean = Some(mean);
        self.std = Some(if std == F::zero() { F::one() } else { std });
        Ok(())
    }

    fn transform(&self, y: ArrayView1<F>) -> Array1<F> {
        let (mean, std) = self.mean_std();
        y.mapv(|v| (v - mean) / std)
    }

    fn inverse_transform(&self, y: ArrayView1<F>) -> Array1<F> {
        let (mean, std) = self.mean_std();
        y.mapv(|v| v * std + mean)
    }

    fn transform_noise_level(&self, noise: F) -> F {
        noise / self.mean_std().1
    }

    fn inverse_transform_noise_level(&self, noise: F) -> F {
        noise * self.mean_std().1
    }

    fn is_linear(&self) -> bool {
        true
    }

    fn fitted(&self) -> bool {
        self.mean.is_some()
    }

    fn box_clone(&self) -> Box<dyn YPreprocessor<F>> {
        Box::new(self.clone())
    }
}
