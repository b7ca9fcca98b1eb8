use linfa::Float;
use ndarray::{Array1, Array2, Array3, ArrayBase, Axis, Data, Ix1, Ix2, Zip};
use statrs::distribution::{ChiSquared, ContinuousCDF};

/// Computes squared differences scaled by `scales` between each row of x and each row of y
/// resulting in a 3d array of shape (nrows(x), nrows(y), ncols(x)) where
/// `d[i, j, l] = ((x_il - y_jl) / scales_l)²`
///
/// *Panics* if x, y and scales have not the same number of components
pub fn scaled_sq_differences<F: Float>(
    x: &ArrayBase<impl Data<Elem = F>, Ix2>,
    y: &ArrayBase<impl Data<Elem = F>, Ix2>,
    scales: &ArrayBase<impl Data<Elem = F>, Ix1>,
) -> Array3<F> {
    assert!(x.ncols() == y.ncols() && x.ncols() == scales.len());

    let mut d = Array3::zeros((x.nrows(), y.nrows(), x.ncols()));
    Zip::from(d.outer_iter_mut())
        .and(x.rows())
        .for_each(|mut d_i, x_i| {
            Zip::from(d_i.rows_mut())
                .and(y.rows())
                .for_each(|d_ij, y_j| {
                    Zip::from(d_ij)
                        .and(&x_i)
                        .and(&y_j)
                        .and(scales)
                        .for_each(|d, &a, &b, &l| {
                            let t = (a - b) / l;
                            *d = t * t;
                        });
                });
        });
    d
}

/// Indices of the `true` entries of a boolean mask
pub(crate) fn mask_indices(mask: &Array1<bool>) -> Vec<usize> {
    mask.iter()
        .enumerate()
        .filter_map(|(i, &b)| if b { Some(i) } else { None })
        .collect()
}

/// Rows of x where mask is true
pub(crate) fn select_rows<F: Float>(
    x: &ArrayBase<impl Data<Elem = F>, Ix2>,
    mask: &Array1<bool>,
) -> Array2<F> {
    x.select(Axis(0), &mask_indices(mask))
}

/// Elements of y where mask is true
pub(crate) fn select_elems<F: Float>(
    y: &ArrayBase<impl Data<Elem = F>, Ix1>,
    mask: &Array1<bool>,
) -> Array1<F> {
    y.select(Axis(0), &mask_indices(mask))
}

/// Conversion of a float to f64, NaN if not representable
#[inline(always)]
pub(crate) fn to_f64<F: Float>(v: F) -> f64 {
    v.to_f64().unwrap_or(f64::NAN)
}

/// Computes the distance to the maximum, in the same units, corresponding
/// to a number of sigmas `n_sigma` of a 1-dimensional gaussian when the
/// distribution is a chi-squared with `d` degrees of freedom, that is
/// `sqrt(chi2_d.ppf(chi2_1.cdf(n_sigma²)))`.
///
/// Survival functions are used instead of cumulative ones so that
/// large numbers of sigmas (e.g. 20) do not lose all precision.
pub fn compute_threshold_given_sigma(n_sigma: f64, d: usize) -> f64 {
    let n_sigma = n_sigma.abs();
    if d <= 1 {
        return n_sigma;
    }
    let (chi2_1, chi2_d) = match (ChiSquared::new(1.), ChiSquared::new(d as f64)) {
        (Ok(chi2_1), Ok(chi2_d)) => (chi2_1, chi2_d),
        _ => return f64::NAN,
    };
    // tail probability of the 1d gaussian beyond n_sigma (both sides)
    let p = chi2_1.sf(n_sigma * n_sigma);
    if p >= 1. {
        return 0.;
    }
    if p <= 0. {
        return f64::INFINITY;
    }
    // inverse survival function by bisection, the inverse cdf is not accurate for tiny p
    let sf = |x: f64| chi2_d.sf(x);

    let mut lo = 0.;
    let mut hi = (n_sigma * n_sigma).max(1.);
    while sf(hi) > p {
        lo = hi;
        hi *= 2.;
        if !hi.is_finite() {
            return f64::INFINITY;
        }
    }
    for _ in 0..200 {
        let mid = 0.5 * (lo + hi);
        if sf(mid) > p {
            lo = mid;
        } else {
            hi = mid;
        }
        if hi - lo <= 1e-14 * hi {
            break;
        }
    }
    (0.5 * (lo + hi)).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;
    use statrs::function::erf::erfc;

    #[test]
    fn test_scaled_sq_differences() {
        let x = array![[0., 1.], [2., 3.]];
        let y = array![[1., 1.], [0., 0.], [2., 5.]];
        let d = scaled_sq_differences(&x, &y, &array![1., 2.]);
        assert_eq!(d.shape(), &[2, 3, 2]);
        assert_abs_diff_eq!(d.slice(ndarray::s![0, .., ..]), array![[1., 0.], [0., 0.25], [4., 4.]]);
        assert_abs_diff_eq!(d.slice(ndarray::s![1, .., ..]), array![[1., 1.], [4., 2.25], [0., 1.]]);
    }

    #[test]
    fn test_select() {
        let x = array![[0., 1.], [2., 3.], [4., 5.]];
        let mask = array![true, false, true];
        assert_eq!(mask_indices(&mask), vec![0, 2]);
        assert_abs_diff_eq!(select_rows(&x, &mask), array![[0., 1.], [4., 5.]]);
        assert_abs_diff_eq!(select_elems(&array![1., 2., 3.], &mask), array![1., 3.]);
        assert_eq!(select_rows(&x, &array![false, false, false]).nrows(), 0);
    }

    #[test]
    fn test_threshold_given_sigma_1d() {
        assert_abs_diff_eq!(compute_threshold_given_sigma(3., 1), 3.);
        assert_abs_diff_eq!(compute_threshold_given_sigma(20., 1), 20.);
    }

    #[test]
    fn test_threshold_given_sigma_2d() {
        // chi2 with 2 dofs has survival function exp(-x/2)
        for n in [1., 2., 3., 5.] {
            let p = erfc(n / std::f64::consts::SQRT_2);
            let expected = (-2. * f64::ln(p)).sqrt();
            assert_abs_diff_eq!(compute_threshold_given_sigma(n, 2), expected, epsilon = 1e-6);
        }
        assert_abs_diff_eq!(compute_threshold_given_sigma(1., 2), 1.515, epsilon = 1e-3);
    }

    #[test]
    fn test_threshold_given_sigma_increases() {
        let t5 = compute_threshold_given_sigma(20., 5);
        let t10 = compute_threshold_given_sigma(20., 10);
        assert!(t5.is_finite() && t10.is_finite());
        assert!(t5 > 20.);
        assert!(t10 > t5);
        assert_abs_diff_eq!(compute_threshold_given_sigma(0., 4), 0.);
    }
}
