//! Inversion of the regularized covariance matrix and log marginal likelihood
//! of the kernel hyperparameters (Rasmussen & Williams, Gaussian Processes for
//! Machine Learning, Algorithm 2.1).

use crate::errors::Result;
use crate::kernels::Kernel;
use crate::noise::NoiseLevel;
use linfa::Float;
use linfa_linalg::{cholesky::*, triangular::*};
use ndarray::{s, Array1, Array2, ArrayBase, Axis, Data, Ix1, Ix2};
#[cfg(feature = "serializable")]
use serde::{Deserialize, Serialize};

/// Quantities cached from the inversion of `K_reg = K(X, X) + diag(alpha)`
/// and needed at prediction time
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serializable", derive(Serialize, Deserialize))]
pub struct Factorization<F: Float> {
    /// Lower triangular Cholesky factor `L` of `K_reg`
    pub l: Array2<F>,
    /// Inverse `L^-1` of the Cholesky factor
    pub v: Array2<F>,
    /// Dual coefficients `K_reg^-1 y`
    pub alpha: Array1<F>,
}

impl<F: Float> Factorization<F> {
    /// Factorize the regularized covariance matrix `k_reg` given training targets `y`
    pub fn new(k_reg: &Array2<F>, y: &ArrayBase<impl Data<Elem = F>, Ix1>) -> Result<Self> {
        let l = k_reg.cholesky()?;
        let v = l.solve_triangular(&Array2::eye(l.nrows()), UPLO::Lower)?;
        let z = l.solve_triangular(&y.to_owned().insert_axis(Axis(1)), UPLO::Lower)?;
        let alpha = l
            .t()
            .solve_triangular(&z, UPLO::Upper)?
            .remove_axis(Axis(1));
        Ok(Factorization { l, v, alpha })
    }

    /// Number of training points
    pub fn n(&self) -> usize {
        self.l.nrows()
    }

    /// Inverse of the regularized covariance matrix `V^T V`
    pub fn k_inv(&self) -> Array2<F> {
        self.v.t().dot(&self.v)
    }
}

/// Log marginal likelihood of the kernel hyperparameters given training data
/// `x`, `y` and the `regularization` added to the covariance diagonal.
///
/// When `eval_gradient` is true, the gradient with respect to the kernel `theta`
/// is also returned. A covariance matrix which is not positive definite gives
/// `-inf` (with a null gradient) so that an optimizer moves away from it.
pub fn log_marginal_likelihood<F: Float, K: Kernel<F>>(
    kernel: &K,
    x: &ArrayBase<impl Data<Elem = F>, Ix2>,
    y: &ArrayBase<impl Data<Elem = F>, Ix1>,
    regularization: &NoiseLevel<F>,
    eval_gradient: bool,
) -> (F, Option<Array1<F>>) {
    let (mut k, dk) = if eval_gradient {
        let (k, dk) = kernel.value_with_gradient(x);
        (k, Some(dk))
    } else {
        (kernel.value(x, x), None)
    };
    regularization.add_to_diagonal(&mut k);

    let fact = match Factorization::new(&k, y) {
        Ok(fact) => fact,
        Err(_) => {
            return (
                F::neg_infinity(),
                dk.map(|dk| Array1::zeros(dk.len_of(Axis(2)))),
            )
        }
    };

    let n = F::cast(y.len());
    let half = F::cast(0.5);
    let two_pi = F::cast(2. * std::f64::consts::PI);
    let lml = -half * y.dot(&fact.alpha)
        - fact.l.diag().mapv(|v| v.ln()).sum()
        - half * n * two_pi.ln();

    let grad = dk.map(|dk| {
        // 0.5 * trace((alpha alpha^T - K^-1) dK/dtheta_j)
        let alpha_col = fact.alpha.view().insert_axis(Axis(1));
        let inner = alpha_col.dot(&alpha_col.t()) - fact.k_inv();
        Array1::from_shape_fn(dk.len_of(Axis(2)), |j| {
            half * (&inner * &dk.slice(s![.., .., j])).sum()
        })
    });
    (lml, grad)
}
