//! Classification of target values as finite or not.
//!
//! Values far below the current maximum (more than a threshold away) are
//! considered infinite: they are kept out of the GP training set and the
//! classifier is used to predict where such values lie in the input space.

use crate::errors::{GpError, Result};
use linfa::Float;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Zip};
#[cfg(feature = "serializable")]
use serde::{Deserialize, Serialize};
use std::fmt;

/// A binary classifier deciding whether target values are finite
///
/// Inputs and targets are given in the transformed (preprocessed) space.
pub trait InfinitiesClassifier<F: Float>: fmt::Debug + Send + Sync {
    /// Fit the classifier on the full set of points (finite or not) given
    /// the threshold on the distance to the maximum target value.
    /// Returns the finite mask of the given points.
    fn fit(&mut self, x: ArrayView2<F>, y: ArrayView1<F>, threshold: F) -> Result<Array1<bool>>;

    /// Predict whether the targets at the given inputs are finite
    fn predict(&self, x: ArrayView2<F>) -> Array1<bool>;

    /// Classify target values against the current absolute threshold
    fn is_finite(&self, y: ArrayView1<F>) -> Array1<bool>;

    /// Number of points the classifier has been fitted on
    fn n(&self) -> usize;

    /// Finite mask of the points the classifier has been fitted on
    fn y_finite(&self) -> Array1<bool>;

    /// Lowest target value still considered finite, `None` until fitted
    fn abs_threshold(&self) -> Option<F>;

    /// Clone as a trait object
    fn box_clone(&self) -> Box<dyn InfinitiesClassifier<F>>;
}

impl<F: Float> Clone for Box<dyn InfinitiesClassifier<F>> {
    fn clone(&self) -> Self {
        self.box_clone()
    }
}

/// Nearest neighbour classifier: stored points are labelled finite when
/// `max(y) - y <= threshold`, a query point gets the label of its closest
/// stored point (euclidean distance).
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serializable", derive(Serialize, Deserialize))]
pub struct NearestNeighborClassifier<F: Float> {
    x: Option<Array2<F>>,
    labels: Array1<bool>,
    abs_threshold: Option<F>,
}

impl<F: Float> NearestNeighborClassifier<F> {
    /// Constructor of an unfitted classifier
    pub fn new() -> Self {
        NearestNeighborClassifier {
            x: None,
            labels: Array1::from_elem(0, true),
            abs_threshold: None,
        }
    }

    fn label(y: F, abs_threshold: F) -> bool {
        y.is_finite() && y >= abs_threshold
    }
}

impl<F: Float> InfinitiesClassifier<F> for NearestNeighborClassifier<F> {
    fn fit(&mut self, x: ArrayView2<F>, y: ArrayView1<F>, threshold: F) -> Result<Array1<bool>> {
        if x.nrows() != y.len() {
            return Err(GpError::ArgumentError(format!(
                "Classifier inputs and targets should have the same length ({} != {})",
                x.nrows(),
                y.len()
            )));
        }
        if threshold.is_nan() || threshold < F::zero() {
            return Err(GpError::ArgumentError(format!(
                "Classifier threshold should be positive, got {threshold}"
            )));
        }
        let y_max = y
            .iter()
            .filter(|v| v.is_finite())
            .fold(F::neg_infinity(), |acc, &v| acc.max(v));
        // with no finite value at all, nothing can be labelled finite
        let abs_threshold = if y_max.is_finite() {
            y_max - threshold
        } else {
            F::infinity()
        };
        self.labels = y.mapv(|v| Self::label(v, abs_threshold));
        self.x = Some(x.to_owned());
        self.abs_threshold = Some(abs_threshold);
        Ok(self.labels.to_owned())
    }

    fn predict(&self, x: ArrayView2<F>) -> Array1<bool> {
        let xtrain = match &self.x {
            Some(xtrain) if xtrain.nrows() > 0 => xtrain,
            _ => return Array1::from_elem(x.nrows(), true),
        };
        if self.labels.iter().all(|&b| b) {
            return Array1::from_elem(x.nrows(), true);
        }
        if self.labels.iter().all(|&b| !b) {
            return Array1::from_elem(x.nrows(), false);
        }
        let mut finite = Array1::from_elem(x.nrows(), true);
        Zip::from(&mut finite)
            .and(x.rows())
            .for_each(|finite, xq| {
                let mut best = (F::infinity(), true);
                Zip::from(xtrain.rows())
                    .and(&self.labels)
                    .for_each(|xt, &label| {
                        let dist = (&xt - &xq).mapv(|v| v * v).sum();
                        if dist < best.0 {
                            best = (dist, label);
                        }
                    });
                *finite = best.1;
            });
        finite
    }

    fn is_finite(&self, y: ArrayView1<F>) -> Array1<bool> {
        match self.abs_threshold {
            Some(abs_threshold) => y.mapv(|v| Self::label(v, abs_threshold)),
            None => Array1::from_elem(y.len(), true),
        }
    }

    fn n(&self) -> usize {
        self.labels.len()
    }

    fn y_finite(&self) -> Array1<bool> {
        self.labels.to_owned()
    }

    fn abs_threshold(&self) -> Option<F> {
        self.abs_threshold
    }

    fn box_clone(&self) -> Box<dyn InfinitiesClassifier<F>> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn test_unfitted_classifier() {
        let clf = NearestNeighborClassifier::<f64>::new();
        assert_eq!(clf.n(), 0);
        assert_eq!(clf.abs_threshold(), None);
        assert_eq!(clf.predict(array![[0.], [1.]].view()), array![true, true]);
        assert_eq!(clf.is_finite(array![-1e10].view()), array![true]);
    }

    #[test]
    fn test_fit_predict() {
        let mut clf = NearestNeighborClassifier::new();
        let x = array![[0.], [1.], [2.], [3.]];
        let y = array![0., 1., -100., 2.];
        let finite = clf.fit(x.view(), y.view(), 5.).unwrap();
        assert_eq!(finite, array![true, true, false, true]);
        assert_eq!(clf.n(), 4);
        assert_eq!(clf.y_finite(), finite);
        assert_abs_diff_eq!(clf.abs_threshold().unwrap(), -3.);
        assert_eq!(
            clf.predict(array![[2.1], [0.4], [2.9]].view()),
            array![false, true, true]
        );
        assert_eq!(clf.is_finite(array![-2.5, -3.5].view()), array![true, false]);
    }

    #[test]
    fn test_non_finite_targets() {
        let mut clf = NearestNeighborClassifier::new();
        let x = array![[0.], [1.], [2.]];
        let finite = clf
            .fit(x.view(), array![f64::NEG_INFINITY, 1., f64::NAN].view(), 5.)
            .unwrap();
        assert_eq!(finite, array![false, true, false]);

        let finite = clf
            .fit(x.view(), array![f64::NEG_INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY].view(), 5.)
            .unwrap();
        assert_eq!(finite, array![false, false, false]);
        assert_eq!(clf.predict(array![[1.]].view()), array![false]);
    }

    #[test]
    fn test_fit_errors() {
        let mut clf = NearestNeighborClassifier::new();
        assert!(clf
            .fit(array![[0.], [1.]].view(), array![0.].view(), 1.)
            .is_err());
        assert!(clf
            .fit(array![[0.]].view(), array![0.].view(), -1.)
            .is_err());
    }
}
