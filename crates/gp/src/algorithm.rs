use crate::classifier::InfinitiesClassifier;
use crate::errors::{GpError, Result};
use crate::kernels::{Kernel, ScaledKernel};
use crate::likelihood::{log_marginal_likelihood, Factorization};
use crate::noise::{reconcile_noise_level, NoiseLevel};
use crate::optimization::optimize_hyperparameters;
use crate::parameters::{GprParams, GprValidParams};
use crate::preprocessing::{XPreprocessor, YPreprocessor};
use crate::utils::{mask_indices, select_elems, select_rows, to_f64};

use linfa::traits::{Fit, PredictInplace};
use linfa::{DatasetBase, Float, ParamGuard};
use log::{debug, info, warn};
use ndarray::{s, Array1, Array2, ArrayBase, ArrayView1, ArrayView2, Axis, Data, Ix1, Ix2};
use ndarray_rand::rand::SeedableRng;
use ndarray_stats::QuantileExt;
use rand_xoshiro::Xoshiro256Plus;
use std::cell::Cell;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

/// Absolute standard deviation under which the std gradient is not computed
const STD_GRADIENT_ATOL: f64 = 1e-8;

/// Options of [`GaussianProcessRegressor::fit`]
#[derive(Clone, Debug)]
pub struct FitOptions<F: Float> {
    /// Noise level of the given training set, the stored one when `None`.
    /// Only valid when a training set is given.
    pub noise_level: Option<NoiseLevel<F>>,
    /// Optimize only from the current hyperparameters, without restarts.
    /// Overrides `n_restarts` and `start_from_current`.
    pub simplified: bool,
    /// Log-transformed (n_dims, 2) hyperparameter bounds, the kernel ones when `None`
    pub hyperparameter_bounds: Option<Array2<F>>,
    /// Number of optimizer runs from random hyperparameters, the configured one when `None`
    pub n_restarts: Option<usize>,
    /// Run the optimizer from the current hyperparameters (not counted in `n_restarts`)
    pub start_from_current: bool,
}

impl<F: Float> Default for FitOptions<F> {
    fn default() -> Self {
        FitOptions {
            noise_level: None,
            simplified: false,
            hyperparameter_bounds: None,
            n_restarts: None,
            start_from_current: true,
        }
    }
}

/// Options of [`GaussianProcessRegressor::append_to_data`]
#[derive(Clone, Debug)]
pub struct AppendOptions<F: Float> {
    /// Noise level of the appended points: `None` keeps the stored scalar one,
    /// a scalar overwrites it, an array gives one value per appended point.
    pub noise_level: Option<NoiseLevel<F>>,
    /// Refit the hyperparameters, otherwise only the covariance matrix is refactorized
    pub fit: bool,
    /// When refitting, optimize only from the current hyperparameters
    pub simplified_fit: bool,
    /// Log-transformed (n_dims, 2) hyperparameter bounds used when refitting
    pub hyperparameter_bounds: Option<Array2<F>>,
}

impl<F: Float> Default for AppendOptions<F> {
    fn default() -> Self {
        AppendOptions {
            noise_level: None,
            fit: true,
            simplified_fit: false,
            hyperparameter_bounds: None,
        }
    }
}

/// Quantities requested from [`GaussianProcessRegressor::predict`]
///
/// The full predictive covariance is not available: it cannot be defined
/// consistently for points predicted infinite or with a non-linear y-preprocessor.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PredictOptions {
    /// Standard deviation of the predictive distribution
    pub return_std: bool,
    /// Gradient of the mean, only for a single query point
    pub return_mean_grad: bool,
    /// Gradient of the standard deviation, only for a single query point
    /// and along with the std and the mean gradient
    pub return_std_grad: bool,
}

/// Output of [`GaussianProcessRegressor::predict`]
///
/// Points predicted infinite get a mean of `-inf`, a null std, a mean gradient
/// of `+inf` and a null std gradient.
#[derive(Clone, Debug, PartialEq)]
pub struct Prediction<F: Float> {
    /// Predictive mean (n,)
    pub mean: Array1<F>,
    /// Predictive standard deviation (n,)
    pub std: Option<Array1<F>>,
    /// Mean gradient (1, d) with respect to the (preprocessed) inputs
    pub mean_grad: Option<Array2<F>>,
    /// Std gradient (1, d) with respect to the (preprocessed) inputs
    pub std_grad: Option<Array2<F>>,
}

/// Training data, raw and preprocessed, with the factorization of the covariance matrix
#[derive(Clone, Debug)]
struct TrainingData<F: Float> {
    /// Finite training inputs
    x_train: Array2<F>,
    /// Finite training targets
    y_train: Array1<F>,
    x_train_: Array2<F>,
    y_train_: Array1<F>,
    /// All points appended so far, finite or not
    x_train_all: Array2<F>,
    y_train_all: Array1<F>,
    x_train_all_: Array2<F>,
    y_train_all_: Array1<F>,
    /// Preprocessed noise level
    noise_level_: NoiseLevel<F>,
    /// Regularization added to the covariance diagonal, squared `noise_level_`
    alpha: NoiseLevel<F>,
    fact: Factorization<F>,
}

#[derive(Clone, Debug)]
enum GprState<F: Float> {
    Unfit,
    Fitted(Box<TrainingData<F>>),
}

/// Gaussian Process regressor handling infinite target values, which can be
/// updated incrementally as new training points are acquired.
///
/// The regressor is meant to be used as the surrogate model of an (expensive)
/// log-posterior within an active learning loop:
/// * [`fit`](GaussianProcessRegressor::fit) sets the full training set and
///   optimizes the kernel hyperparameters by maximizing the log marginal likelihood,
/// * [`append_to_data`](GaussianProcessRegressor::append_to_data) adds new points
///   and either refits the hyperparameters or only refactorizes the regularized
///   covariance matrix with the current ones,
/// * [`predict`](GaussianProcessRegressor::predict) gives the posterior mean,
///   standard deviation and their gradients.
///
/// When an [infinities classifier](crate::InfinitiesClassifier) is configured, target
/// values further than a threshold below the current maximum are considered infinite:
/// they are kept aside (see [`x_train_infinite`](GaussianProcessRegressor::x_train_infinite))
/// and query points classified as such are predicted at `-inf` without any kernel evaluation.
///
/// All kernel computations take place in the space transformed by the optional
/// X and y preprocessors.
///
/// # Example
///
/// ```
/// use gpry_gp::{GaussianProcessRegressor, GprParams, FitOptions, PredictOptions};
/// use ndarray::array;
///
/// let params = GprParams::new()
///     .bounds(array![[0., 4.]])
///     .random_state(Some(42));
/// let mut gpr = GaussianProcessRegressor::new(params)?;
///
/// let x = array![[0.], [1.], [2.], [3.]];
/// let y = array![0., 0.8, 0.9, 0.1];
/// gpr.fit(Some(x.view()), Some(y.view()), &FitOptions::default())?;
///
/// let pred = gpr.predict(
///     &array![[1.5]],
///     &PredictOptions { return_std: true, ..Default::default() },
/// )?;
/// assert!(pred.std.is_some());
/// # Ok::<(), gpry_gp::GpError>(())
/// ```
///
/// # Reference
///
/// Gammal, Jonas El, et al. [Fast and robust Bayesian Inference using Gaussian Processes
/// with GPry](https://arxiv.org/abs/2211.02045) (2022).
#[derive(Debug)]
pub struct GaussianProcessRegressor<F: Float, K: Kernel<F> = ScaledKernel<F>> {
    /// Parameters used to build this regressor
    params: GprValidParams<F, K>,
    /// Kernel template, used for prior predictions
    kernel: K,
    /// Kernel with optimized hyperparameters
    kernel_: K,
    preprocessing_x: Option<Box<dyn XPreprocessor<F>>>,
    preprocessing_y: Option<Box<dyn YPreprocessor<F>>>,
    infinities_classifier: Option<Box<dyn InfinitiesClassifier<F>>>,
    /// Distance to the maximum (in target units) above which values are infinite
    diff_threshold: F,
    /// Raw noise level of the finite training points
    noise_level: NoiseLevel<F>,
    random_state: Option<u64>,
    state: GprState<F>,
    n_last_appended: usize,
    n_last_appended_finite: usize,
    /// Number of points appended since the last factorization
    newly_appended_for_inv: usize,
    log_marginal_likelihood_value: Option<F>,
    n_eval: AtomicUsize,
    n_eval_loglike: usize,
}

impl<F: Float, K: Kernel<F>> Clone for GaussianProcessRegressor<F, K> {
    fn clone(&self) -> Self {
        Self {
            params: self.params.clone(),
            kernel: self.kernel.clone(),
            kernel_: self.kernel_.clone(),
            preprocessing_x: self.preprocessing_x.clone(),
            preprocessing_y: self.preprocessing_y.clone(),
            infinities_classifier: self.infinities_classifier.clone(),
            diff_threshold: self.diff_threshold,
            noise_level: self.noise_level.clone(),
            random_state: self.random_state,
            state: self.state.clone(),
            n_last_appended: self.n_last_appended,
            n_last_appended_finite: self.n_last_appended_finite,
            newly_appended_for_inv: self.newly_appended_for_inv,
            log_marginal_likelihood_value: self.log_marginal_likelihood_value,
            n_eval: AtomicUsize::new(self.n_eval()),
            n_eval_loglike: self.n_eval_loglike,
        }
    }
}

impl<F: Float, K: Kernel<F>> fmt::Display for GaussianProcessRegressor<F, K> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "GPR(kernel={}, noise_level={}, n={}, n_total={}",
            self.kernel_,
            self.noise_level,
            self.n(),
            self.n_total()
        )?;
        if let Some(lml) = self.log_marginal_likelihood_value {
            write!(f, ", likelihood={lml}")?;
        }
        write!(f, ")")
    }
}

impl<F: Float> GaussianProcessRegressor<F, ScaledKernel<F>> {
    /// GP regressor parameters constructor, kernel auto-built from the prior bounds
    pub fn params() -> GprParams<F, ScaledKernel<F>> {
        GprParams::new()
    }
}

fn not_positive_definite<F: Float, K: Kernel<F>>(kernel: &K, err: GpError) -> GpError {
    GpError::NumericalError(format!(
        "The kernel, {kernel}, is not returning a positive definite matrix. \
         Try gradually increasing the 'noise_level' parameter of your \
         GaussianProcessRegressor estimator. ({err})"
    ))
}

fn append_rows<F: Float>(a: &mut Array2<F>, b: ArrayView2<F>) -> Result<()> {
    a.append(Axis(0), b)
        .map_err(|e| GpError::ArgumentError(format!("Cannot append inputs: {e}")))
}

fn append_elems<F: Float>(a: &mut Array1<F>, b: ArrayView1<F>) -> Result<()> {
    a.append(Axis(0), b)
        .map_err(|e| GpError::ArgumentError(format!("Cannot append targets: {e}")))
}

fn last_rows<F: Float>(x: &Array2<F>, n: usize) -> Array2<F> {
    x.slice(s![x.nrows() - n.min(x.nrows()).., ..]).to_owned()
}

fn last_elems<F: Float>(y: &Array1<F>, n: usize) -> Array1<F> {
    y.slice(s![y.len() - n.min(y.len())..]).to_owned()
}

impl<F: Float, K: Kernel<F>> GaussianProcessRegressor<F, K> {
    /// Build an unfitted regressor: check parameters, auto-build the kernel from the
    /// (preprocessed) prior bounds if no kernel instance is given and resolve the
    /// threshold of the infinities classifier.
    pub fn new(params: GprParams<F, K>) -> Result<Self> {
        let params = params.check()?;
        let bounds_ = params.bounds.as_ref().map(|bounds| match &params.preprocessing_x {
            Some(prepro) => prepro.transform_bounds(bounds.view()),
            None => bounds.to_owned(),
        });
        let kernel = match &params.kernel {
            Some(kernel) => kernel.clone(),
            None => {
                let bounds_ = bounds_.as_ref().ok_or_else(|| {
                    GpError::ConfigurationError(format!(
                        "You selected the automatically constructed '{}' kernel without \
                         specifying prior bounds.",
                        params.kernel_spec
                    ))
                })?;
                K::from_spec(&params.kernel_spec, bounds_)?
            }
        };
        if let (Some(d), Some(bounds)) = (kernel.input_dim(), params.bounds.as_ref()) {
            if d != bounds.nrows() {
                return Err(GpError::ConfigurationError(format!(
                    "Kernel with {} length scales does not match prior bounds of dimension {}",
                    d,
                    bounds.nrows()
                )));
            }
        }

        let diff_threshold = match &params.infinities_classifier {
            None => F::infinity(),
            Some(_) => {
                let linear = params
                    .preprocessing_y
                    .as_ref()
                    .map_or(true, |prepro| prepro.is_linear());
                if !linear {
                    warn!(
                        "If using a standard classifier for infinities, the y-preprocessor \
                         needs to be linear. This may lead to errors further in the pipeline."
                    );
                }
                let threshold = params.inf_threshold.ok_or_else(|| {
                    GpError::ConfigurationError(
                        "Specify 'inf_threshold' if using infinities classifier.".to_string(),
                    )
                })?;
                let d = params.bounds.as_ref().map_or(0, |b| b.nrows());
                threshold.resolve(d)
            }
        };

        info!(
            "Initializing GP with kernel {}, noise level {}, optimizer {}, {} restart(s), \
             X-preprocessor: {}, y-preprocessor: {}, classifier of infinities: {}",
            kernel,
            params.noise_level,
            params
                .optimizer
                .as_ref()
                .map_or("none".to_string(), |o| o.to_string()),
            params.n_restarts,
            params.preprocessing_x.is_some(),
            params.preprocessing_y.is_some(),
            params.infinities_classifier.is_some(),
        );

        Ok(GaussianProcessRegressor {
            kernel_: kernel.clone(),
            kernel,
            preprocessing_x: params.preprocessing_x.clone(),
            preprocessing_y: params.preprocessing_y.clone(),
            infinities_classifier: params.infinities_classifier.clone(),
            diff_threshold,
            noise_level: params.noise_level.clone(),
            random_state: params.random_state,
            state: GprState::Unfit,
            n_last_appended: 0,
            n_last_appended_finite: 0,
            newly_appended_for_inv: 0,
            log_marginal_likelihood_value: None,
            n_eval: AtomicUsize::new(0),
            n_eval_loglike: 0,
            params,
        })
    }

    /// Optimize the kernel hyperparameters and factorize the covariance matrix.
    ///
    /// When both `x` and `y` are given, they are taken as the *full* training set,
    /// replacing any previous one: points classified as infinite are set aside and,
    /// if none is finite, the regressor is left untouched.
    /// When none is given the model is refit with its current finite training set.
    pub fn fit(
        &mut self,
        x: Option<ArrayView2<F>>,
        y: Option<ArrayView1<F>>,
        options: &FitOptions<F>,
    ) -> Result<()> {
        self.check_hyperparameter_bounds(options.hyperparameter_bounds.as_ref())?;
        match (x, y) {
            (Some(x), Some(y)) => self.fit_training_set(x, y, options),
            (None, None) => self.refit(options),
            _ => Err(GpError::ArgumentError(
                "X or y is None, while the other isn't. \
                 Either both need to be provided or both should be None"
                    .to_string(),
            )),
        }
    }

    fn fit_training_set(
        &mut self,
        x: ArrayView2<F>,
        y: ArrayView1<F>,
        options: &FitOptions<F>,
    ) -> Result<()> {
        if x.nrows() != y.len() {
            return Err(GpError::ArgumentError(format!(
                "X and y should have the same number of points ({} != {})",
                x.nrows(),
                y.len()
            )));
        }
        if y.is_empty() {
            return Err(GpError::ArgumentError(
                "Cannot fit the GP without training points".to_string(),
            ));
        }
        if let Some(d) = self.params.bounds.as_ref().map(|b| b.nrows()) {
            if x.ncols() != d {
                return Err(GpError::ArgumentError(format!(
                    "X should have {} columns as prior bounds, got {}",
                    d,
                    x.ncols()
                )));
            }
        }
        if let Some(d) = self.kernel_.input_dim() {
            if x.ncols() != d {
                return Err(GpError::ArgumentError(format!(
                    "X should have {} columns as the kernel length scales, got {}",
                    d,
                    x.ncols()
                )));
            }
        }
        let noise_level = match &options.noise_level {
            None if self.noise_level.is_per_point() => {
                return Err(GpError::ArgumentError(
                    "If None is passed as noise level the internally saved noise level \
                     needs to be a scalar"
                        .to_string(),
                ))
            }
            None => self.noise_level.clone(),
            Some(noise_level) => noise_level.clone(),
        };
        noise_level.check_len(y.len())?;

        let mut classifier = self.infinities_classifier.clone();
        let (x_finite, y_finite, noise_level) = match classifier.as_mut() {
            Some(clf) => {
                // preprocessors may not be fitted yet, the classifier is refit afterwards
                let x_ = match &self.preprocessing_x {
                    Some(prepro) if prepro.fitted() => prepro.transform(x),
                    _ => x.to_owned(),
                };
                let (y_, threshold_) = match &self.preprocessing_y {
                    Some(prepro) if prepro.fitted() => (
                        prepro.transform(y),
                        prepro.transform_noise_level(self.diff_threshold),
                    ),
                    _ => (y.to_owned(), self.diff_threshold),
                };
                let finite = clf.fit(x_.view(), y_.view(), threshold_)?;
                if !finite.iter().any(|&f| f) {
                    warn!("No finite value in the training set, the GP is left unchanged");
                    return Ok(());
                }
                (
                    select_rows(&x, &finite),
                    select_elems(&y, &finite),
                    noise_level.select(&finite),
                )
            }
            None => (x.to_owned(), y.to_owned(), noise_level),
        };

        let n_finite = y_finite.len();
        self.fit_finite(
            x.to_owned(),
            y.to_owned(),
            x_finite,
            y_finite,
            noise_level,
            classifier,
            options,
        )?;
        self.n_last_appended = y.len();
        self.n_last_appended_finite = n_finite;
        Ok(())
    }

    fn refit(&mut self, options: &FitOptions<F>) -> Result<()> {
        if options.noise_level.is_some() {
            return Err(GpError::ArgumentError(
                "Cannot give a noise level if X and y are not given.".to_string(),
            ));
        }
        let data = match &self.state {
            GprState::Fitted(data) => data,
            GprState::Unfit => {
                return Err(GpError::StateError(
                    "No training data: the GP cannot be refit without X and y".to_string(),
                ))
            }
        };
        let (x_all, y_all) = (data.x_train_all.to_owned(), data.y_train_all.to_owned());
        let (x, y) = (data.x_train.to_owned(), data.y_train.to_owned());
        let noise_level = self.noise_level.clone();
        noise_level.check_len(y.len())?;
        let classifier = self.infinities_classifier.clone();
        self.fit_finite(x_all, y_all, x, y, noise_level, classifier, options)
    }

    /// Fit preprocessors and hyperparameters given the full and finite training sets,
    /// the regressor is only modified when every step succeeds
    #[allow(clippy::too_many_arguments)]
    fn fit_finite(
        &mut self,
        x_all: Array2<F>,
        y_all: Array1<F>,
        x: Array2<F>,
        y: Array1<F>,
        noise_level: NoiseLevel<F>,
        mut classifier: Option<Box<dyn InfinitiesClassifier<F>>>,
        options: &FitOptions<F>,
    ) -> Result<()> {
        let mut preprocessing_x = self.preprocessing_x.clone();
        let mut preprocessing_y = self.preprocessing_y.clone();
        let (x_, x_all_) = match preprocessing_x.as_mut() {
            Some(prepro) => {
                prepro.fit(x.view(), y.view())?;
                (prepro.transform(x.view()), prepro.transform(x_all.view()))
            }
            None => (x.to_owned(), x_all.to_owned()),
        };
        let (y_, y_all_, noise_level_, diff_threshold_) = match preprocessing_y.as_mut() {
            Some(prepro) => {
                prepro.fit(x.view(), y.view())?;
                (
                    prepro.transform(y.view()),
                    prepro.transform(y_all.view()),
                    noise_level.map(|v| prepro.transform_noise_level(v)),
                    prepro.transform_noise_level(self.diff_threshold),
                )
            }
            None => (
                y.to_owned(),
                y_all.to_owned(),
                noise_level.clone(),
                self.diff_threshold,
            ),
        };
        let alpha = noise_level_.squared();
        // the classifier works in the transformed space
        if let Some(clf) = classifier.as_mut() {
            clf.fit(x_all_.view(), y_all_.view(), diff_threshold_)?;
        }

        let (n_restarts, start_from_current) = if options.simplified {
            (0, true)
        } else {
            (
                options.n_restarts.unwrap_or(self.params.n_restarts),
                options.start_from_current,
            )
        };
        let mut kernel_ = self.kernel_.clone();
        let n_eval = Cell::new(0);
        let lml_value = match &self.params.optimizer {
            Some(optimizer)
                if kernel_.n_dims() > 0 && (start_from_current || n_restarts > 0) =>
            {
                let bounds = match &options.hyperparameter_bounds {
                    Some(bounds) => bounds.to_owned(),
                    None => kernel_.bounds(),
                };
                let (theta, fmin) = {
                    let template = kernel_.clone();
                    let eval_gradient = optimizer.uses_gradient();
                    let objective = |theta: &[f64], gradient: Option<&mut [f64]>| -> f64 {
                        n_eval.set(n_eval.get() + 1);
                        let mut kernel = template.clone();
                        let theta = theta.iter().map(|&t| F::cast(t)).collect::<Array1<F>>();
                        if kernel.set_theta(&theta).is_err() {
                            if let Some(gradient) = gradient {
                                gradient.fill(0.);
                            }
                            return f64::INFINITY;
                        }
                        let (lml, grad) = log_marginal_likelihood(
                            &kernel,
                            &x_,
                            &y_,
                            &alpha,
                            eval_gradient && gradient.is_some(),
                        );
                        if let Some(gradient) = gradient {
                            match grad {
                                Some(grad) => gradient
                                    .iter_mut()
                                    .zip(grad.iter())
                                    .for_each(|(g, &v)| *g = -to_f64(v)),
                                None => gradient.fill(0.),
                            }
                        }
                        -to_f64(lml)
                    };
                    let mut rng = self.rng();
                    optimize_hyperparameters(
                        optimizer,
                        &objective,
                        &kernel_.theta().mapv(to_f64),
                        &bounds.mapv(to_f64),
                        start_from_current,
                        n_restarts,
                        &mut rng,
                    )?
                };
                kernel_.set_theta(&theta.mapv(F::cast))?;
                F::cast(-fmin)
            }
            _ => {
                n_eval.set(n_eval.get() + 1);
                log_marginal_likelihood(&kernel_, &x_, &y_, &alpha, false).0
            }
        };
        self.n_eval_loglike += n_eval.get();
        debug!(
            "GP hyperparameters {} after {} likelihood evaluations (lml={})",
            kernel_,
            n_eval.get(),
            lml_value
        );

        let now = Instant::now();
        let mut k = kernel_.value(&x_, &x_);
        alpha.add_to_diagonal(&mut k);
        let fact = Factorization::new(&k, &y_).map_err(|e| not_positive_definite(&kernel_, e))?;
        debug!("elapsed factorization = {:?}ms", now.elapsed().as_millis());

        self.kernel_ = kernel_;
        self.preprocessing_x = preprocessing_x;
        self.preprocessing_y = preprocessing_y;
        self.infinities_classifier = classifier;
        self.noise_level = noise_level;
        self.log_marginal_likelihood_value = Some(lml_value);
        self.state = GprState::Fitted(Box::new(TrainingData {
            x_train: x,
            y_train: y,
            x_train_: x_,
            y_train_: y_,
            x_train_all: x_all,
            y_train_all: y_all,
            x_train_all_: x_all_,
            y_train_all_: y_all_,
            noise_level_,
            alpha,
            fact,
        }));
        self.newly_appended_for_inv = 0;
        Ok(())
    }

    /// Append new training points and update the model.
    ///
    /// With `fit` the hyperparameters are refit on the whole finite training set,
    /// otherwise the kernel is kept and only the regularized covariance matrix
    /// is refactorized. If no data was fitted before, the points are fitted as
    /// the full training set.
    ///
    /// When an infinities classifier is used, it is always refit on all the points
    /// and only the new points classified finite are added to the training set.
    pub fn append_to_data(
        &mut self,
        x: &ArrayBase<impl Data<Elem = F>, Ix2>,
        y: &ArrayBase<impl Data<Elem = F>, Ix1>,
        options: &AppendOptions<F>,
    ) -> Result<()> {
        if x.nrows() != y.len() {
            return Err(GpError::ArgumentError(format!(
                "X and y should have the same number of points ({} != {})",
                x.nrows(),
                y.len()
            )));
        }
        if y.is_empty() {
            return Err(GpError::ArgumentError("No point to append".to_string()));
        }
        if !self.fitted() {
            if !options.fit {
                warn!(
                    "No model has previously been fit to the data, a model will be fit \
                     with X and y instead of just updating with the same kernel hyperparameters"
                );
            }
            let fit_options = FitOptions {
                noise_level: options.noise_level.clone(),
                hyperparameter_bounds: options.hyperparameter_bounds.clone(),
                ..Default::default()
            };
            return self.fit(Some(x.view()), Some(y.view()), &fit_options);
        }
        match &options.noise_level {
            Some(NoiseLevel::PerPoint(nl)) if nl.len() != y.len() => {
                return Err(GpError::ArgumentError(format!(
                    "noise_level must be an array with same number of entries as y ({} != {})",
                    nl.len(),
                    y.len()
                )))
            }
            None if self.noise_level.is_per_point() => {
                return Err(GpError::ArgumentError(
                    "No value for the noise level given even though concrete values were \
                     given earlier. Please only give one scalar value or a different one \
                     for each training point."
                        .to_string(),
                ))
            }
            _ => (),
        }

        if let Some(data) = self.data() {
            if x.ncols() != data.x_train.ncols() {
                return Err(GpError::ArgumentError(format!(
                    "X should have {} columns as the training inputs, got {}",
                    data.x_train.ncols(),
                    x.ncols()
                )));
            }
        }
        if options.fit {
            self.check_hyperparameter_bounds(options.hyperparameter_bounds.as_ref())?;
        }

        // the model is restored if any step of the update fails
        let state = self.state.clone();
        let noise_level = self.noise_level.clone();
        let classifier = self.infinities_classifier.clone();
        let counters = (
            self.n_last_appended,
            self.n_last_appended_finite,
            self.newly_appended_for_inv,
        );
        let res = self.append_and_update(x, y, options);
        if res.is_err() {
            self.state = state;
            self.noise_level = noise_level;
            self.infinities_classifier = classifier;
            (
                self.n_last_appended,
                self.n_last_appended_finite,
                self.newly_appended_for_inv,
            ) = counters;
        }
        res
    }

    fn append_and_update(
        &mut self,
        x: &ArrayBase<impl Data<Elem = F>, Ix2>,
        y: &ArrayBase<impl Data<Elem = F>, Ix1>,
        options: &AppendOptions<F>,
    ) -> Result<()> {
        let x_new_ = self.transform_x(x.view());
        let y_new_ = self.transform_y(y.view());
        let threshold_ = self.transform_noise(self.diff_threshold);
        let preprocessing_y = &self.preprocessing_y;
        let data = match &mut self.state {
            GprState::Fitted(data) => data,
            GprState::Unfit => {
                return Err(GpError::StateError("The GP has no training data".to_string()))
            }
        };

        let n_new = y.len();
        self.n_last_appended = n_new;
        append_rows(&mut data.x_train_all, x.view())?;
        append_elems(&mut data.y_train_all, y.view())?;
        append_rows(&mut data.x_train_all_, x_new_.view())?;
        append_elems(&mut data.y_train_all_, y_new_.view())?;

        let (x, x_, y, y_, noise_level) = match self.infinities_classifier.as_mut() {
            Some(clf) => {
                let finite = clf.fit(data.x_train_all_.view(), data.y_train_all_.view(), threshold_)?;
                let finite = finite.slice(s![finite.len() - n_new..]).to_owned();
                if !finite.iter().any(|&f| f) {
                    debug!("All {n_new} appended points are classified infinite");
                    self.n_last_appended_finite = 0;
                    return Ok(());
                }
                (
                    select_rows(x, &finite),
                    select_rows(&x_new_, &finite),
                    select_elems(y, &finite),
                    select_elems(&y_new_, &finite),
                    options.noise_level.as_ref().map(|nl| nl.select(&finite)),
                )
            }
            None => (
                x.to_owned(),
                x_new_,
                y.to_owned(),
                y_new_,
                options.noise_level.clone(),
            ),
        };

        let n_new_finite = y.len();
        reconcile_noise_level(
            &mut self.noise_level,
            &mut data.noise_level_,
            noise_level,
            data.y_train.len(),
            n_new_finite,
            options.fit,
            |v| match preprocessing_y {
                Some(prepro) => prepro.transform_noise_level(v),
                None => v,
            },
        )?;
        append_rows(&mut data.x_train, x.view())?;
        append_elems(&mut data.y_train, y.view())?;
        self.n_last_appended_finite = n_new_finite;
        self.newly_appended_for_inv = n_new_finite;

        if options.fit {
            let fit_options = FitOptions {
                simplified: options.simplified_fit,
                hyperparameter_bounds: options.hyperparameter_bounds.clone(),
                ..Default::default()
            };
            self.fit(None, None, &fit_options)
        } else {
            append_rows(&mut data.x_train_, x_.view())?;
            append_elems(&mut data.y_train_, y_.view())?;
            data.alpha = data.noise_level_.squared();
            self.update_model()
        }
    }

    /// Refactorize the regularized covariance matrix after points have been appended,
    /// keeping the current kernel hyperparameters
    fn update_model(&mut self) -> Result<()> {
        if self.newly_appended_for_inv < 1 {
            return Err(GpError::StateError(
                "No new points have been appended to the model. Please append points \
                 with the 'append_to_data'-method before trying to update."
                    .to_string(),
            ));
        }
        let data = match &mut self.state {
            GprState::Fitted(data) => data,
            GprState::Unfit => {
                return Err(GpError::StateError(
                    "Training data is missing. Most probably the model hasn't been \
                     fit to the data previously."
                        .to_string(),
                ))
            }
        };
        if data.fact.n() + self.newly_appended_for_inv != data.y_train_.len() {
            return Err(GpError::StateError(format!(
                "The number of added points doesn't match the dimensions of the \
                 factorized matrix. {} + {} != {}",
                data.fact.n(),
                self.newly_appended_for_inv,
                data.y_train_.len()
            )));
        }
        data.alpha.check_len(data.y_train_.len())?;

        let mut k = self.kernel_.value(&data.x_train_, &data.x_train_);
        data.alpha.add_to_diagonal(&mut k);
        data.fact = Factorization::new(&k, &data.y_train_)
            .map_err(|e| not_positive_definite(&self.kernel_, e))?;
        self.newly_appended_for_inv = 0;
        Ok(())
    }

    /// Removing training points is not supported
    pub fn remove_from_data(&mut self, _positions: &[usize]) -> Result<()> {
        Err(GpError::StateError(
            "Removing points from the training set is not supported".to_string(),
        ))
    }

    /// Predict the posterior distribution at the n query points given as a (n, d) array.
    ///
    /// Before any fit, predictions come from the GP prior: null mean and gradients,
    /// std given by the kernel diagonal, the infinities classifier being ignored.
    pub fn predict(
        &self,
        x: &ArrayBase<impl Data<Elem = F>, Ix2>,
        options: &PredictOptions,
    ) -> Result<Prediction<F>> {
        self.n_eval.fetch_add(x.nrows(), Ordering::Relaxed);
        if options.return_std_grad && !(options.return_std && options.return_mean_grad) {
            return Err(GpError::ArgumentError(
                "Not returning std_gradient without returning the std and the mean grad."
                    .to_string(),
            ));
        }
        if x.nrows() != 1 && (options.return_mean_grad || options.return_std_grad) {
            return Err(GpError::ArgumentError(format!(
                "Mean grad and std grad only implemented for a single point, got {}",
                x.nrows()
            )));
        }
        self.check_input_dim(x)?;
        Ok(self.predict_values(x, options))
    }

    fn predict_values(
        &self,
        x: &ArrayBase<impl Data<Elem = F>, Ix2>,
        options: &PredictOptions,
    ) -> Prediction<F> {
        let (n, d) = x.dim();
        let data = match &self.state {
            GprState::Fitted(data) => data,
            GprState::Unfit => {
                return Prediction {
                    mean: Array1::zeros(n),
                    std: options
                        .return_std
                        .then(|| self.kernel.diag(x).mapv(|v| v.sqrt())),
                    mean_grad: options.return_mean_grad.then(|| Array2::zeros((n, d))),
                    std_grad: options.return_std_grad.then(|| Array2::zeros((n, d))),
                }
            }
        };

        let mut mean = Array1::from_elem(n, F::neg_infinity());
        let mut std = Array1::zeros(n);
        let mut mean_grad = Array2::from_elem((n, d), F::infinity());
        let mut std_grad = Array2::zeros((n, d));

        let finite = mask_indices(&self.predict_is_finite(x));
        if !finite.is_empty() {
            let x_ = self.transform_x(x.select(Axis(0), &finite).view());
            let k_trans = self.kernel_.value(&x_, &data.x_train_);
            let mean_ = self.inverse_transform_y(k_trans.dot(&data.fact.alpha).view());
            finite
                .iter()
                .zip(mean_.iter())
                .for_each(|(&i, &m)| mean[i] = m);

            if options.return_std {
                let std_ = self.std_untransformed(data, &x_, &k_trans);
                finite
                    .iter()
                    .zip(std_.iter())
                    .for_each(|(&i, &s)| std[i] = self.inverse_transform_noise(s));

                if options.return_std_grad && std[0].abs() > F::cast(STD_GRADIENT_ATOL) {
                    // gradient of the variance term through the inverse covariance
                    let grad = self.kernel_.gradient_x(&x_.row(0), &data.x_train_);
                    let grad_std = k_trans.dot(&data.fact.k_inv().dot(&grad)).row(0).to_owned()
                        / (-std_[0]);
                    // the noise inverse transform is applied twice
                    let grad_std = grad_std
                        .mapv(|g| self.inverse_transform_noise(self.inverse_transform_noise(g)));
                    std_grad.row_mut(0).assign(&grad_std);
                }
            }
            if options.return_mean_grad {
                let grad = self.kernel_.gradient_x(&x_.row(0), &data.x_train_);
                let grad_mean = grad
                    .t()
                    .dot(&data.fact.alpha)
                    .mapv(|g| self.inverse_transform_noise(g));
                mean_grad.row_mut(0).assign(&grad_mean);
            }
        }

        Prediction {
            mean,
            std: options.return_std.then_some(std),
            mean_grad: options.return_mean_grad.then_some(mean_grad),
            std_grad: options.return_std_grad.then_some(std_grad),
        }
    }

    /// Standard deviation in the transformed space at the finite points `x_`,
    /// negative variances are clipped to zero
    fn std_untransformed(
        &self,
        data: &TrainingData<F>,
        x_: &Array2<F>,
        k_trans: &Array2<F>,
    ) -> Array1<F> {
        let m = data.fact.v.dot(&k_trans.t());
        let mut var = self.kernel_.diag(x_) - (&m * &m).sum_axis(Axis(0));
        if var.iter().any(|v| *v < F::zero()) {
            warn!("Predicted variances smaller than 0. Setting those variances to 0.");
            var.mapv_inplace(|v| v.max(F::zero()));
        }
        var.mapv(|v| v.sqrt())
    }

    /// Predict only the standard deviation at the n query points given as a (n, d) array
    pub fn predict_std(&self, x: &ArrayBase<impl Data<Elem = F>, Ix2>) -> Result<Array1<F>> {
        self.n_eval.fetch_add(x.nrows(), Ordering::Relaxed);
        self.check_input_dim(x)?;
        Ok(self.predict_std_values(x))
    }

    fn predict_std_values(&self, x: &ArrayBase<impl Data<Elem = F>, Ix2>) -> Array1<F> {
        let data = match &self.state {
            GprState::Fitted(data) => data,
            GprState::Unfit => return self.kernel.diag(x).mapv(|v| v.sqrt()),
        };
        let mut std = Array1::zeros(x.nrows());
        let finite = mask_indices(&self.predict_is_finite(x));
        if !finite.is_empty() {
            let x_ = self.transform_x(x.select(Axis(0), &finite).view());
            let k_trans = self.kernel_.value(&x_, &data.x_train_);
            let std_ = self.std_untransformed(data, &x_, &k_trans);
            finite
                .iter()
                .zip(std_.iter())
                .for_each(|(&i, &s)| std[i] = self.inverse_transform_noise(s));
        }
        std
    }

    /// Log marginal likelihood of the given log-transformed kernel hyperparameters
    /// with the current training data, and its gradient if `eval_gradient`
    pub fn log_marginal_likelihood(
        &mut self,
        theta: &ArrayBase<impl Data<Elem = F>, Ix1>,
        eval_gradient: bool,
    ) -> Result<(F, Option<Array1<F>>)> {
        let data = match &self.state {
            GprState::Fitted(data) => data,
            GprState::Unfit => {
                return Err(GpError::StateError(
                    "The log marginal likelihood requires training data".to_string(),
                ))
            }
        };
        let mut kernel = self.kernel_.clone();
        kernel.set_theta(theta)?;
        let res = log_marginal_likelihood(
            &kernel,
            &data.x_train_,
            &data.y_train_,
            &data.alpha,
            eval_gradient,
        );
        self.n_eval_loglike += 1;
        Ok(res)
    }

    fn check_hyperparameter_bounds(&self, bounds: Option<&Array2<F>>) -> Result<()> {
        match bounds {
            Some(bounds) if bounds.shape() != [self.kernel_.n_dims(), 2] => {
                Err(GpError::ArgumentError(format!(
                    "Hyperparameter bounds should be a ({}, 2) array, got {:?}",
                    self.kernel_.n_dims(),
                    bounds.shape()
                )))
            }
            _ => Ok(()),
        }
    }

    fn check_input_dim(&self, x: &ArrayBase<impl Data<Elem = F>, Ix2>) -> Result<()> {
        match self.d() {
            Some(d) if d != x.ncols() => Err(GpError::ArgumentError(format!(
                "Query points should have {} components, got {}",
                d,
                x.ncols()
            ))),
            _ => Ok(()),
        }
    }

    fn rng(&self) -> Xoshiro256Plus {
        match self.random_state {
            Some(seed) => Xoshiro256Plus::seed_from_u64(seed),
            None => Xoshiro256Plus::from_entropy(),
        }
    }

    fn transform_x(&self, x: ArrayView2<F>) -> Array2<F> {
        match &self.preprocessing_x {
            Some(prepro) => prepro.transform(x),
            None => x.to_owned(),
        }
    }

    fn transform_y(&self, y: ArrayView1<F>) -> Array1<F> {
        match &self.preprocessing_y {
            Some(prepro) => prepro.transform(y),
            None => y.to_owned(),
        }
    }

    fn inverse_transform_y(&self, y: ArrayView1<F>) -> Array1<F> {
        match &self.preprocessing_y {
            Some(prepro) => prepro.inverse_transform(y),
            None => y.to_owned(),
        }
    }

    fn transform_noise(&self, v: F) -> F {
        match &self.preprocessing_y {
            Some(prepro) => prepro.transform_noise_level(v),
            None => v,
        }
    }

    fn inverse_transform_noise(&self, v: F) -> F {
        match &self.preprocessing_y {
            Some(prepro) => prepro.inverse_transform_noise_level(v),
            None => v,
        }
    }

    fn data(&self) -> Option<&TrainingData<F>> {
        match &self.state {
            GprState::Fitted(data) => Some(&**data),
            GprState::Unfit => None,
        }
    }

    /// Dimension of the input space: number of prior bounds if given,
    /// number of training inputs components otherwise, or number of length scales
    /// of an anisotropic kernel before any fit
    pub fn d(&self) -> Option<usize> {
        match &self.params.bounds {
            Some(bounds) => Some(bounds.nrows()),
            None => self
                .data()
                .map(|data| data.x_train.ncols())
                .or_else(|| self.kernel_.input_dim()),
        }
    }

    /// Number of finite training points
    pub fn n(&self) -> usize {
        self.data().map_or(0, |data| data.y_train.len())
    }

    /// Alias of [`n`](GaussianProcessRegressor::n)
    pub fn n_finite(&self) -> usize {
        self.n()
    }

    /// Total number of points added to the model, finite or not
    pub fn n_total(&self) -> usize {
        self.infinities_classifier
            .as_ref()
            .map(|clf| clf.n())
            .filter(|&n| n > 0)
            .unwrap_or_else(|| self.n())
    }

    /// Maximum finite target value, `-inf` without training data
    pub fn y_max(&self) -> F {
        self.data()
            .and_then(|data| data.y_train.max().ok().copied())
            .unwrap_or_else(F::neg_infinity)
    }

    /// Whether the regressor has been fitted at least once
    pub fn fitted(&self) -> bool {
        matches!(self.state, GprState::Fitted(_))
    }

    /// Finite training inputs
    pub fn x_train(&self) -> Option<&Array2<F>> {
        self.data().map(|data| &data.x_train)
    }

    /// Finite training targets
    pub fn y_train(&self) -> Option<&Array1<F>> {
        self.data().map(|data| &data.y_train)
    }

    /// All inputs added to the model, finite or not
    pub fn x_train_all(&self) -> Option<&Array2<F>> {
        self.data().map(|data| &data.x_train_all)
    }

    /// All targets added to the model, finite or not
    pub fn y_train_all(&self) -> Option<&Array1<F>> {
        self.data().map(|data| &data.y_train_all)
    }

    /// Preprocessed finite training inputs
    pub fn transformed_x_train(&self) -> Option<&Array2<F>> {
        self.data().map(|data| &data.x_train_)
    }

    /// Preprocessed finite training targets
    pub fn transformed_y_train(&self) -> Option<&Array1<F>> {
        self.data().map(|data| &data.y_train_)
    }

    /// Preprocessed inputs, finite or not
    pub fn transformed_x_train_all(&self) -> Option<&Array2<F>> {
        self.data().map(|data| &data.x_train_all_)
    }

    /// Preprocessed targets, finite or not
    pub fn transformed_y_train_all(&self) -> Option<&Array1<F>> {
        self.data().map(|data| &data.y_train_all_)
    }

    fn infinite_mask(&self) -> Option<Array1<bool>> {
        let clf = self.infinities_classifier.as_ref()?;
        let data = self.data()?;
        let finite = clf.y_finite();
        (finite.len() == data.y_train_all.len()).then(|| finite.mapv(|f| !f))
    }

    /// Inputs of the points classified as infinite
    pub fn x_train_infinite(&self) -> Array2<F> {
        match (self.infinite_mask(), self.data()) {
            (Some(mask), Some(data)) => select_rows(&data.x_train_all, &mask),
            _ => Array2::zeros((0, self.d().unwrap_or(0))),
        }
    }

    /// Targets of the points classified as infinite
    pub fn y_train_infinite(&self) -> Array1<F> {
        match (self.infinite_mask(), self.data()) {
            (Some(mask), Some(data)) => select_elems(&data.y_train_all, &mask),
            _ => Array1::zeros(0),
        }
    }

    /// Copy of the points added by the last call to fit or append, finite or not
    pub fn last_appended(&self) -> (Array2<F>, Array1<F>) {
        if self.infinities_classifier.is_none() {
            return self.last_appended_finite();
        }
        match self.data() {
            Some(data) => (
                last_rows(&data.x_train_all, self.n_last_appended),
                last_elems(&data.y_train_all, self.n_last_appended),
            ),
            None => (Array2::zeros((0, self.d().unwrap_or(0))), Array1::zeros(0)),
        }
    }

    /// Copy of the finite points added by the last call to fit or append
    pub fn last_appended_finite(&self) -> (Array2<F>, Array1<F>) {
        match self.data() {
            Some(data) => (
                last_rows(&data.x_train, self.n_last_appended_finite),
                last_elems(&data.y_train, self.n_last_appended_finite),
            ),
            None => (Array2::zeros((0, self.d().unwrap_or(0))), Array1::zeros(0)),
        }
    }

    /// Noise level of the finite training points
    pub fn noise_level(&self) -> &NoiseLevel<F> {
        &self.noise_level
    }

    /// Preprocessed noise level of the finite training points
    pub fn transformed_noise_level(&self) -> Option<&NoiseLevel<F>> {
        self.data().map(|data| &data.noise_level_)
    }

    /// Regularization added to the diagonal of the covariance matrix
    pub fn alpha(&self) -> Option<&NoiseLevel<F>> {
        self.data().map(|data| &data.alpha)
    }

    /// Kernel template as configured (or auto-built)
    pub fn kernel(&self) -> &K {
        &self.kernel
    }

    /// Kernel with fitted hyperparameters
    pub fn fitted_kernel(&self) -> &K {
        &self.kernel_
    }

    /// Cholesky factor, its inverse and dual coefficients of the regularized covariance matrix
    pub fn factorization(&self) -> Option<&Factorization<F>> {
        self.data().map(|data| &data.fact)
    }

    /// Log marginal likelihood value of the fitted hyperparameters
    pub fn log_marginal_likelihood_value(&self) -> Option<F> {
        self.log_marginal_likelihood_value
    }

    /// Number of points predicted so far
    pub fn n_eval(&self) -> usize {
        self.n_eval.load(Ordering::Relaxed)
    }

    /// Number of log marginal likelihood evaluations so far
    pub fn n_eval_loglike(&self) -> usize {
        self.n_eval_loglike
    }

    /// Number of points appended since the covariance matrix was last factorized
    pub fn newly_appended_for_inv(&self) -> usize {
        self.newly_appended_for_inv
    }

    /// Distance to the maximum (in target units) above which values are infinite
    pub fn diff_threshold(&self) -> Option<F> {
        self.infinities_classifier
            .as_ref()
            .map(|_| self.diff_threshold)
    }

    /// Classifier of infinite values
    pub fn infinities_classifier(&self) -> Option<&dyn InfinitiesClassifier<F>> {
        self.infinities_classifier.as_deref()
    }

    /// Parameters used to build the regressor
    pub fn valid_params(&self) -> &GprValidParams<F, K> {
        &self.params
    }

    /// Classify target values as finite or not against the current threshold,
    /// all finite when no classifier is used
    pub fn is_finite(&self, y: &ArrayBase<impl Data<Elem = F>, Ix1>) -> Array1<bool> {
        match &self.infinities_classifier {
            Some(clf) => clf.is_finite(self.transform_y(y.view()).view()),
            None => Array1::from_elem(y.len(), true),
        }
    }

    /// Predict whether target values are finite at given inputs,
    /// all finite when no classifier is used
    pub fn predict_is_finite(&self, x: &ArrayBase<impl Data<Elem = F>, Ix2>) -> Array1<bool> {
        match &self.infinities_classifier {
            Some(clf) => clf.predict(self.transform_x(x.view()).view()),
            None => Array1::from_elem(x.nrows(), true),
        }
    }

    /// Current lowest target value considered finite, `-inf` without classifier
    pub fn abs_threshold_finite(&self) -> F {
        match self
            .infinities_classifier
            .as_ref()
            .and_then(|clf| clf.abs_threshold())
        {
            Some(threshold) => self
                .inverse_transform_y(Array1::from_elem(1, threshold).view())
                .iter()
                .copied()
                .next()
                .unwrap_or_else(F::neg_infinity),
            None => F::neg_infinity(),
        }
    }

    /// Seed of the random generator used to draw optimizer restarts
    pub fn random_state(&self) -> Option<u64> {
        self.random_state
    }

    /// (Re)set the seed of the random generator, `None` to seed from entropy
    pub fn set_random_state(&mut self, random_state: Option<u64>) {
        self.random_state = random_state;
    }
}

impl<F, K, D> PredictInplace<ArrayBase<D, Ix2>, Array1<F>> for GaussianProcessRegressor<F, K>
where
    F: Float,
    K: Kernel<F>,
    D: Data<Elem = F>,
{
    fn predict_inplace(&self, x: &ArrayBase<D, Ix2>, y: &mut Array1<F>) {
        assert_eq!(
            x.nrows(),
            y.len(),
            "The number of data points must match the number of output targets."
        );
        self.n_eval.fetch_add(x.nrows(), Ordering::Relaxed);
        *y = self.predict_values(x, &PredictOptions::default()).mean;
    }

    fn default_target(&self, x: &ArrayBase<D, Ix2>) -> Array1<F> {
        Array1::zeros((x.nrows(),))
    }
}

/// Adaptator to implement `linfa::Predict` trait for standard deviation prediction.
pub struct GprStdPredictor<'a, F, K>(pub &'a GaussianProcessRegressor<F, K>)
where
    F: Float,
    K: Kernel<F>;

impl<F, K, D> PredictInplace<ArrayBase<D, Ix2>, Array1<F>> for GprStdPredictor<'_, F, K>
where
    F: Float,
    K: Kernel<F>,
    D: Data<Elem = F>,
{
    fn predict_inplace(&self, x: &ArrayBase<D, Ix2>, y: &mut Array1<F>) {
        assert_eq!(
            x.nrows(),
            y.len(),
            "The number of data points must match the number of output targets."
        );
        self.0.n_eval.fetch_add(x.nrows(), Ordering::Relaxed);
        *y = self.0.predict_std_values(x);
    }

    fn default_target(&self, x: &ArrayBase<D, Ix2>) -> Array1<F> {
        Array1::zeros(x.nrows())
    }
}

impl<F: Float, K: Kernel<F>, D: Data<Elem = F>>
    Fit<ArrayBase<D, Ix2>, ArrayBase<D, Ix1>, GpError> for GprValidParams<F, K>
{
    type Object = GaussianProcessRegressor<F, K>;

    /// Fit GP hyperparameters using maximum likelihood on the full training set
    fn fit(
        &self,
        dataset: &DatasetBase<ArrayBase<D, Ix2>, ArrayBase<D, Ix1>>,
    ) -> Result<Self::Object> {
        let mut gpr = GaussianProcessRegressor::new(GprParams::new_from_valid(self))?;
        gpr.fit(
            Some(dataset.records().view()),
            Some(dataset.targets().view()),
            &FitOptions::default(),
        )?;
        Ok(gpr)
    }
}
