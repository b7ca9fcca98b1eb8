use crate::errors::{GpError, Result};
use log::{debug, warn};
use ndarray::{Array1, Array2, Zip};
use ndarray_rand::rand::Rng;
use rand_xoshiro::Xoshiro256Plus;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

/// Minimum number of objective evaluations for one COBYLA run
pub const GP_COBYLA_MIN_EVAL: usize = 25;

/// Relative decrease of the objective below which an optimization run started
/// from the current hyperparameters does not replace them
pub const GP_MIN_RELATIVE_IMPROVEMENT: f64 = 1e-6;

/// Objective minimized over log-transformed hyperparameters `theta`,
/// returns the negative log marginal likelihood. When a gradient slice is given,
/// it is filled with the gradient of the objective with respect to `theta`.
pub type Objective<'a> = dyn Fn(&[f64], Option<&mut [f64]>) -> f64 + 'a;

/// A user-supplied optimizer called as `optimizer(objective, theta_initial, bounds)`
/// where bounds is a (n_dims, 2) array, returning the optimum `(theta_opt, f_min)`
pub type CustomOptimizer =
    Arc<dyn Fn(&Objective<'_>, &Array1<f64>, &Array2<f64>) -> (Array1<f64>, f64) + Send + Sync>;

/// Parameters of the COBYLA optimizer
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CobylaParams {
    /// Initial trust region radius
    pub rhobeg: f64,
    /// Relative tolerance on the objective value
    pub ftol_rel: f64,
    /// Maximum number of objective evaluations
    pub maxeval: usize,
}

impl Default for CobylaParams {
    fn default() -> Self {
        CobylaParams {
            rhobeg: 0.5,
            ftol_rel: 1e-4,
            maxeval: 200,
        }
    }
}

/// Parameters of the SLSQP optimizer
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SlsqpParams {
    /// Relative tolerance on the objective value
    pub ftol_rel: f64,
    /// Absolute tolerance on the objective value
    pub ftol_abs: f64,
    /// Maximum number of objective evaluations
    pub maxeval: usize,
}

impl Default for SlsqpParams {
    fn default() -> Self {
        SlsqpParams {
            ftol_rel: 1e-10,
            ftol_abs: 1e-10,
            maxeval: 200,
        }
    }
}

/// Optimizer used to maximize the log marginal likelihood within hyperparameter bounds
#[derive(Clone)]
pub enum Optimizer {
    /// Built-in gradient-based box-constrained optimizer
    Slsqp(SlsqpParams),
    /// Built-in derivative-free box-constrained optimizer
    Cobyla(CobylaParams),
    /// User-supplied optimizer, may request the objective gradient
    Custom(CustomOptimizer),
}

impl Default for Optimizer {
    fn default() -> Self {
        Optimizer::Slsqp(SlsqpParams::default())
    }
}

impl fmt::Debug for Optimizer {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Optimizer::Slsqp(params) => write!(f, "Slsqp({params:?})"),
            Optimizer::Cobyla(params) => write!(f, "Cobyla({params:?})"),
            Optimizer::Custom(_) => write!(f, "Custom"),
        }
    }
}

impl fmt::Display for Optimizer {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Optimizer::Slsqp(_) => write!(f, "SLSQP"),
            Optimizer::Cobyla(_) => write!(f, "COBYLA"),
            Optimizer::Custom(_) => write!(f, "custom"),
        }
    }
}

impl Optimizer {
    /// Wrap a closure as a custom optimizer
    pub fn custom(
        optimizer: impl Fn(&Objective<'_>, &Array1<f64>, &Array2<f64>) -> (Array1<f64>, f64)
            + Send
            + Sync
            + 'static,
    ) -> Self {
        Optimizer::Custom(Arc::new(optimizer))
    }

    /// Whether the optimizer may request the objective gradient
    pub fn uses_gradient(&self) -> bool {
        !matches!(self, Optimizer::Cobyla(_))
    }

    /// Minimize `objective` starting from `theta0` within (n_dims, 2) `bounds`
    pub(crate) fn minimize(
        &self,
        objective: &Objective<'_>,
        theta0: &Array1<f64>,
        bounds: &Array2<f64>,
    ) -> (Array1<f64>, f64) {
        match self {
            Optimizer::Slsqp(params) => optimize_slsqp(objective, theta0, bounds, params),
            Optimizer::Cobyla(params) => optimize_cobyla(objective, theta0, bounds, params),
            Optimizer::Custom(optimizer) => {
                let (theta, fmin) = optimizer(objective, theta0, bounds);
                (theta, if fmin.is_nan() { f64::INFINITY } else { fmin })
            }
        }
    }
}

fn bounds_as_pairs(bounds: &Array2<f64>) -> Vec<(f64, f64)> {
    bounds.rows().into_iter().map(|b| (b[0], b[1])).collect()
}

/// Optimize gp hyper parameters given an initial guess and bounds with slsqp
fn optimize_slsqp(
    objective: &Objective<'_>,
    theta0: &Array1<f64>,
    bounds: &Array2<f64>,
    params: &SlsqpParams,
) -> (Array1<f64>, f64) {
    let cons: Vec<fn(&[f64], Option<&mut [f64]>, &mut ()) -> f64> = vec![];
    let bounds = bounds_as_pairs(bounds);
    let objfn = |x: &[f64], gradient: Option<&mut [f64]>, _u: &mut ()| -> f64 {
        if x.iter().any(|v| v.is_nan()) {
            // shortcut return worst value wrt to minimization
            return f64::INFINITY;
        }
        let fval = objective(x, gradient);
        if fval.is_nan() {
            f64::INFINITY
        } else {
            fval
        }
    };

    match slsqp::minimize(
        objfn,
        &theta0.to_vec(),
        &bounds,
        &cons,
        (),
        params.maxeval,
        Some(slsqp::StopTols {
            ftol_rel: params.ftol_rel,
            ftol_abs: params.ftol_abs,
            ..slsqp::StopTols::default()
        }),
    ) {
        Ok((_, x_opt, fval)) => {
            let fval = if f64::is_nan(fval) { f64::INFINITY } else { fval };
            (Array1::from(x_opt), fval)
        }
        Err((status, x_opt, _)) => {
            warn!("ERROR Slsqp optimizer in GP status={status:?}");
            (Array1::from(x_opt), f64::INFINITY)
        }
    }
}

/// Optimize gp hyper parameters given an initial guess and bounds with cobyla
fn optimize_cobyla(
    objective: &Objective<'_>,
    theta0: &Array1<f64>,
    bounds: &Array2<f64>,
    cobyla: &CobylaParams,
) -> (Array1<f64>, f64) {
    use cobyla::{minimize, Func, RhoBeg, StopTols};

    let cons: Vec<&dyn Func<()>> = vec![];
    let bounds = bounds_as_pairs(bounds);
    let objfn = |x: &[f64], _u: &mut ()| -> f64 {
        if x.iter().any(|v| v.is_nan()) {
            // shortcut return worst value wrt to minimization
            return f64::INFINITY;
        }
        let fval = objective(x, None);
        if fval.is_nan() {
            f64::INFINITY
        } else {
            fval
        }
    };
    let maxeval = cobyla.maxeval.max(GP_COBYLA_MIN_EVAL);

    match minimize(
        objfn,
        &theta0.to_vec(),
        &bounds,
        &cons,
        (),
        maxeval,
        RhoBeg::All(cobyla.rhobeg),
        Some(StopTols {
            ftol_rel: cobyla.ftol_rel,
            ..StopTols::default()
        }),
    ) {
        Ok((_, x_opt, fval)) => {
            let fval = if f64::is_nan(fval) { f64::INFINITY } else { fval };
            (Array1::from(x_opt), fval)
        }
        Err((status, x_opt, _)) => {
            warn!("ERROR Cobyla optimizer in GP status={status:?}");
            (Array1::from(x_opt), f64::INFINITY)
        }
    }
}

/// Draw `n_restarts` initial hyperparameters uniformly within (n_dims, 2) log-transformed bounds
pub(crate) fn draw_restarts(
    n_restarts: usize,
    bounds: &Array2<f64>,
    rng: &mut Xoshiro256Plus,
) -> Array2<f64> {
    let mut thetas = Array2::zeros((n_restarts, bounds.nrows()));
    for mut theta in thetas.rows_mut() {
        Zip::from(&mut theta)
            .and(bounds.rows())
            .for_each(|t, b| *t = b[0] + rng.gen::<f64>() * (b[1] - b[0]));
    }
    thetas
}

/// Run the optimizer from the current hyperparameters (if `start_from_current`)
/// then from `n_restarts` random draws within `bounds`, and select the run
/// with the minimal objective, the first one in case of ties.
///
/// When starting from the current hyperparameters, they are kept unless the best run
/// decreases the objective by more than [GP_MIN_RELATIVE_IMPROVEMENT], so that
/// refitting an already optimized model leaves it unchanged.
pub(crate) fn optimize_hyperparameters(
    optimizer: &Optimizer,
    objective: &Objective<'_>,
    theta0: &Array1<f64>,
    bounds: &Array2<f64>,
    start_from_current: bool,
    n_restarts: usize,
    rng: &mut Xoshiro256Plus,
) -> Result<(Array1<f64>, f64)> {
    if n_restarts > 0 && bounds.iter().any(|b| !b.is_finite()) {
        return Err(GpError::ConfigurationError(
            "Multiple optimizer restarts (n_restarts > 0) requires that all bounds are finite."
                .to_string(),
        ));
    }
    let now = Instant::now();
    let mut optima = Vec::with_capacity(n_restarts + 1);
    let current = if start_from_current {
        optima.push(optimizer.minimize(objective, theta0, bounds));
        let start = theta0.to_vec();
        let fval = objective(&start, None);
        Some((theta0.to_owned(), if fval.is_nan() { f64::INFINITY } else { fval }))
    } else {
        None
    };
    if n_restarts > 0 {
        let thetas = draw_restarts(n_restarts, bounds, rng);
        debug!("Optimize with restarts theta = {thetas} and bounds = {bounds}");
        for theta in thetas.rows() {
            optima.push(optimizer.minimize(objective, &theta.to_owned(), bounds));
        }
    }
    debug!("elapsed optim = {:?}ms", now.elapsed().as_millis());

    let mut optima = optima.into_iter();
    let best = optima.next().ok_or_else(|| {
        GpError::StateError("No hyperparameter optimization run was requested".to_string())
    })?;
    let best = optima.fold(best, |best, run| if run.1 < best.1 { run } else { best });
    match current {
        Some((theta, fval))
            if fval.is_finite()
                && best.1 >= fval - GP_MIN_RELATIVE_IMPROVEMENT * fval.abs().max(1.) =>
        {
            debug!(
                "Keep current hyperparameters theta = {theta} (f = {fval}, best run f = {})",
                best.1
            );
            Ok((theta, fval))
        }
        _ => Ok(best),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;
    use ndarray_rand::rand::SeedableRng;
    use std::cell::Cell;

    fn quadratic(theta: &[f64], gradient: Option<&mut [f64]>) -> f64 {
        let center = [0.5, -1.];
        if let Some(gradient) = gradient {
            for ((g, t), c) in gradient.iter_mut().zip(theta).zip(center) {
                *g = 2. * (t - c);
            }
        }
        theta.iter().zip(center).map(|(t, c)| (t - c) * (t - c)).sum()
    }

    fn quadratic_1d(theta: &[f64], gradient: Option<&mut [f64]>) -> f64 {
        if let Some(gradient) = gradient {
            gradient[0] = 2. * (theta[0] - 0.3);
        }
        (theta[0] - 0.3).powi(2)
    }

    #[test]
    fn test_slsqp_minimize() {
        let bounds = array![[-2., 2.], [-2., 2.]];
        let (theta, fmin) = Optimizer::default().minimize(&quadratic, &array![0., 0.], &bounds);
        assert_abs_diff_eq!(theta, array![0.5, -1.], epsilon = 1e-4);
        assert!(fmin < 1e-6);
    }

    #[test]
    fn test_slsqp_respects_bounds() {
        let bounds = array![[-2., 0.], [0., 2.]];
        let (theta, _) = Optimizer::default().minimize(&quadratic, &array![-1., 1.], &bounds);
        assert_abs_diff_eq!(theta, array![0., 0.], epsilon = 1e-6);
    }

    #[test]
    fn test_cobyla_minimize() {
        let bounds = array![[-2., 2.], [-2., 2.]];
        let (theta, fmin) = Optimizer::Cobyla(CobylaParams::default()).minimize(
            &quadratic,
            &array![0., 0.],
            &bounds,
        );
        assert_abs_diff_eq!(theta, array![0.5, -1.], epsilon = 1e-2);
        assert!(fmin < 1e-3);
    }

    #[test]
    fn test_cobyla_never_requests_gradient() {
        let with_gradient = Cell::new(0);
        let objective = |theta: &[f64], gradient: Option<&mut [f64]>| {
            if gradient.is_some() {
                with_gradient.set(with_gradient.get() + 1);
            }
            quadratic(theta, None)
        };
        Optimizer::Cobyla(CobylaParams::default()).minimize(
            &objective,
            &array![0., 0.],
            &array![[-2., 2.], [-2., 2.]],
        );
        assert_eq!(with_gradient.get(), 0);
    }

    #[test]
    fn test_draw_restarts_within_bounds() {
        let bounds = array![[-3., 1.], [2., 2.], [0., 5.]];
        let mut rng = Xoshiro256Plus::seed_from_u64(42);
        let thetas = draw_restarts(50, &bounds, &mut rng);
        assert_eq!(thetas.shape(), &[50, 3]);
        for theta in thetas.rows() {
            for (t, b) in theta.iter().zip(bounds.rows()) {
                assert!(*t >= b[0] && *t <= b[1]);
            }
        }
        let mut rng = Xoshiro256Plus::seed_from_u64(42);
        assert_eq!(draw_restarts(50, &bounds, &mut rng), thetas);
    }

    #[test]
    fn test_select_first_minimum() {
        // the custom optimizer returns a fixed point with a fixed value
        let optimizer = Optimizer::custom(|_obj, _theta0, _bounds| (array![0.9], 1e-3));
        let mut rng = Xoshiro256Plus::seed_from_u64(0);
        let (theta, fmin) = optimize_hyperparameters(
            &optimizer,
            &quadratic_1d,
            &array![-0.5],
            &array![[-1., 1.]],
            false,
            3,
            &mut rng,
        )
        .unwrap();
        assert_eq!(theta, array![0.9]);
        assert_eq!(fmin, 1e-3);
    }

    #[test]
    fn test_keep_current_without_improvement() {
        // the start point is the minimum: a run reporting the same value does not move it
        let optimizer = Optimizer::custom(|_obj, theta0, _bounds| (theta0 + 1e-3, 0.));
        let mut rng = Xoshiro256Plus::seed_from_u64(0);
        let (theta, fmin) = optimize_hyperparameters(
            &optimizer,
            &quadratic_1d,
            &array![0.3],
            &array![[-1., 1.]],
            true,
            0,
            &mut rng,
        )
        .unwrap();
        assert_eq!(theta, array![0.3]);
        assert_eq!(fmin, 0.);

        // a real improvement replaces the current hyperparameters
        let (theta, _) = optimize_hyperparameters(
            &Optimizer::default(),
            &quadratic_1d,
            &array![-0.5],
            &array![[-1., 1.]],
            true,
            0,
            &mut rng,
        )
        .unwrap();
        assert_abs_diff_eq!(theta[0], 0.3, epsilon = 1e-5);
    }

    #[test]
    fn test_custom_optimizer_gets_gradient() {
        // a few steps of projected gradient descent
        let optimizer = Optimizer::custom(|obj, theta0, bounds| {
            let mut theta = theta0.to_owned();
            let mut grad = Array1::<f64>::zeros(theta.len());
            for _ in 0..200 {
                obj(theta.as_slice().unwrap(), grad.as_slice_mut());
                theta = (&theta - &(&grad * 0.1))
                    .mapv(|v| v.clamp(bounds[[0, 0]], bounds[[0, 1]]));
            }
            let fmin = obj(theta.as_slice().unwrap(), None);
            (theta, fmin)
        });
        let mut rng = Xoshiro256Plus::seed_from_u64(0);
        let (theta, _) = optimize_hyperparameters(
            &optimizer,
            &quadratic_1d,
            &array![-0.8],
            &array![[-1., 1.]],
            true,
            2,
            &mut rng,
        )
        .unwrap();
        assert_abs_diff_eq!(theta[0], 0.3, epsilon = 1e-6);
    }

    #[test]
    fn test_restarts_require_finite_bounds() {
        let mut rng = Xoshiro256Plus::seed_from_u64(0);
        let res = optimize_hyperparameters(
            &Optimizer::default(),
            &quadratic_1d,
            &array![0.],
            &array![[f64::NEG_INFINITY, 1.]],
            true,
            1,
            &mut rng,
        );
        assert!(matches!(res, Err(GpError::ConfigurationError(_))));
    }

    #[test]
    fn test_no_run_is_an_error() {
        let mut rng = Xoshiro256Plus::seed_from_u64(0);
        let res = optimize_hyperparameters(
            &Optimizer::default(),
            &quadratic_1d,
            &array![0.],
            &array![[-1., 1.]],
            false,
            0,
            &mut rng,
        );
        assert!(matches!(res, Err(GpError::StateError(_))));
    }
}
