use crate::classifier::InfinitiesClassifier;
use crate::errors::{GpError, Result};
use crate::kernels::{Kernel, KernelSpec, ScaledKernel};
use crate::noise::NoiseLevel;
use crate::optimization::Optimizer;
use crate::preprocessing::{XPreprocessor, YPreprocessor};
use crate::utils::{compute_threshold_given_sigma, to_f64};
use linfa::{Float, ParamGuard};
use ndarray::Array2;
#[cfg(feature = "serializable")]
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Threshold on the distance to the maximum target value above which
/// a target value is considered infinite
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serializable", derive(Serialize, Deserialize))]
pub enum InfThreshold<F: Float> {
    /// Distance given in target units
    Absolute(F),
    /// Distance given as a number of standard deviations of a chi-squared
    /// distribution with as many degrees of freedom as input dimensions
    Sigmas(F),
}

impl<F: Float> Default for InfThreshold<F> {
    fn default() -> Self {
        InfThreshold::Sigmas(F::cast(20.))
    }
}

impl<F: Float> From<F> for InfThreshold<F> {
    fn from(value: F) -> Self {
        InfThreshold::Absolute(value)
    }
}

impl<F: Float> InfThreshold<F> {
    /// Absolute distance to the maximum in a `d`-dimensional input space
    pub fn resolve(&self, d: usize) -> F {
        match self {
            InfThreshold::Absolute(v) => *v,
            InfThreshold::Sigmas(n) => F::cast(compute_threshold_given_sigma(to_f64(*n), d)),
        }
    }
}

impl<F: Float> FromStr for InfThreshold<F> {
    type Err = GpError;

    /// Parse `"5"` as an absolute threshold and `"20s"` as a number of sigmas
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let (value, sigmas) = match s.strip_suffix('s') {
            Some(value) => (value, true),
            None => (s, false),
        };
        let value: f64 = value.trim().parse().map_err(|_| {
            GpError::ConfigurationError(format!(
                "inf_threshold should be a number or a number of sigmas like '20s', got '{s}'"
            ))
        })?;
        if !value.is_finite() || value < 0. {
            return Err(GpError::ConfigurationError(format!(
                "inf_threshold should be a positive number, got '{s}'"
            )));
        }
        let value = F::cast(value);
        Ok(if sigmas {
            InfThreshold::Sigmas(value)
        } else {
            InfThreshold::Absolute(value)
        })
    }
}

impl<F: Float> fmt::Display for InfThreshold<F> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            InfThreshold::Absolute(v) => write!(f, "{v}"),
            InfThreshold::Sigmas(v) => write!(f, "{v}s"),
        }
    }
}

/// A set of validated GP regressor parameters.
#[derive(Clone, Debug)]
pub struct GprValidParams<F: Float, K: Kernel<F>> {
    /// Kernel instance, auto-built from `kernel_spec` when missing
    pub(crate) kernel: Option<K>,
    /// Name and arguments of the auto-built kernel
    pub(crate) kernel_spec: KernelSpec,
    /// Standard deviation of the noise on the training targets
    pub(crate) noise_level: NoiseLevel<F>,
    /// Optimizer of the log marginal likelihood, no optimization when `None`
    pub(crate) optimizer: Option<Optimizer>,
    /// Number of optimizer runs from random hyperparameters
    pub(crate) n_restarts: usize,
    pub(crate) preprocessing_x: Option<Box<dyn XPreprocessor<F>>>,
    pub(crate) preprocessing_y: Option<Box<dyn YPreprocessor<F>>>,
    /// Classifier of infinite target values
    pub(crate) infinities_classifier: Option<Box<dyn InfinitiesClassifier<F>>>,
    pub(crate) inf_threshold: Option<InfThreshold<F>>,
    /// Prior bounds of the inputs as a (d, 2) array
    pub(crate) bounds: Option<Array2<F>>,
    pub(crate) random_state: Option<u64>,
}

impl<F: Float, K: Kernel<F>> Default for GprValidParams<F, K> {
    fn default() -> GprValidParams<F, K> {
        GprValidParams {
            kernel: None,
            kernel_spec: KernelSpec::default(),
            noise_level: NoiseLevel::default(),
            optimizer: Some(Optimizer::default()),
            n_restarts: 0,
            preprocessing_x: None,
            preprocessing_y: None,
            infinities_classifier: None,
            inf_threshold: Some(InfThreshold::default()),
            bounds: None,
            random_state: None,
        }
    }
}

impl<F: Float, K: Kernel<F>> GprValidParams<F, K> {
    /// Get the kernel instance if any
    pub fn kernel(&self) -> Option<&K> {
        self.kernel.as_ref()
    }

    /// Get the specification of the auto-built kernel
    pub fn kernel_spec(&self) -> &KernelSpec {
        &self.kernel_spec
    }

    /// Get the noise level of the training targets
    pub fn noise_level(&self) -> &NoiseLevel<F> {
        &self.noise_level
    }

    /// Get the hyperparameters optimizer
    pub fn optimizer(&self) -> Option<&Optimizer> {
        self.optimizer.as_ref()
    }

    /// Get the number of optimizer restarts
    pub fn n_restarts(&self) -> usize {
        self.n_restarts
    }

    /// Get the inputs preprocessor
    pub fn preprocessing_x(&self) -> Option<&dyn XPreprocessor<F>> {
        self.preprocessing_x.as_deref()
    }

    /// Get the targets preprocessor
    pub fn preprocessing_y(&self) -> Option<&dyn YPreprocessor<F>> {
        self.preprocessing_y.as_deref()
    }

    /// Get the classifier of infinite values
    pub fn infinities_classifier(&self) -> Option<&dyn InfinitiesClassifier<F>> {
        self.infinities_classifier.as_deref()
    }

    /// Get the threshold on the distance to the maximum of finite values
    pub fn inf_threshold(&self) -> Option<&InfThreshold<F>> {
        self.inf_threshold.as_ref()
    }

    /// Get the prior bounds
    pub fn bounds(&self) -> Option<&Array2<F>> {
        self.bounds.as_ref()
    }

    /// Get the seed of the random generator
    pub fn random_state(&self) -> Option<u64> {
        self.random_state
    }
}

#[derive(Clone, Debug)]
/// The set of hyperparameters that can be specified for the execution of
/// the [GP regressor](crate::GaussianProcessRegressor).
pub struct GprParams<F: Float, K: Kernel<F> = ScaledKernel<F>>(GprValidParams<F, K>);

impl<F: Float> GprParams<F, ScaledKernel<F>> {
    /// A constructor for GP parameters with a kernel auto-built from the prior bounds
    /// (by default a constant times an anisotropic RBF kernel)
    pub fn new() -> GprParams<F, ScaledKernel<F>> {
        Self(GprValidParams::default())
    }
}

impl<F: Float> Default for GprParams<F, ScaledKernel<F>> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: Float, K: Kernel<F>> GprParams<F, K> {
    /// A constructor for GP parameters given a kernel instance
    pub fn with_kernel(kernel: K) -> GprParams<F, K> {
        Self(GprValidParams {
            kernel: Some(kernel),
            ..Default::default()
        })
    }

    /// A constructor for GP parameters from validated parameters
    pub fn new_from_valid(params: &GprValidParams<F, K>) -> Self {
        Self(params.clone())
    }

    /// Set the kernel instance
    pub fn kernel(mut self, kernel: K) -> Self {
        self.0.kernel = Some(kernel);
        self
    }

    /// Set the specification of the kernel built from the prior bounds.
    ///
    /// Any kernel instance previously set is discarded.
    pub fn kernel_spec(mut self, spec: KernelSpec) -> Self {
        self.0.kernel = None;
        self.0.kernel_spec = spec;
        self
    }

    /// Set the noise level, either a scalar or one value per training point
    pub fn noise_level(mut self, noise_level: impl Into<NoiseLevel<F>>) -> Self {
        self.0.noise_level = noise_level.into();
        self
    }

    /// Set the optimizer of the log marginal likelihood.
    ///
    /// With `None` the kernel hyperparameters are never optimized.
    pub fn optimizer(mut self, optimizer: Option<Optimizer>) -> Self {
        self.0.optimizer = optimizer;
        self
    }

    /// Set the number of optimizer runs started from random hyperparameters
    pub fn n_restarts(mut self, n_restarts: usize) -> Self {
        self.0.n_restarts = n_restarts;
        self
    }

    /// Set the inputs preprocessor
    pub fn preprocessing_x(mut self, preprocessing: impl XPreprocessor<F> + 'static) -> Self {
        self.0.preprocessing_x = Some(Box::new(preprocessing));
        self
    }

    /// Set the targets preprocessor
    pub fn preprocessing_y(mut self, preprocessing: impl YPreprocessor<F> + 'static) -> Self {
        self.0.preprocessing_y = Some(Box::new(preprocessing));
        self
    }

    /// Account for infinite values using the given classifier
    pub fn infinities_classifier(
        mut self,
        classifier: impl InfinitiesClassifier<F> + 'static,
    ) -> Self {
        self.0.infinities_classifier = Some(Box::new(classifier));
        self
    }

    /// Set the threshold used to classify infinite values
    pub fn inf_threshold(mut self, inf_threshold: Option<InfThreshold<F>>) -> Self {
        self.0.inf_threshold = inf_threshold;
        self
    }

    /// Set the prior bounds of the inputs as a (d, 2) array
    pub fn bounds(mut self, bounds: Array2<F>) -> Self {
        self.0.bounds = Some(bounds);
        self
    }

    /// Set the seed of the random generator used to draw optimizer restarts
    pub fn random_state(mut self, random_state: Option<u64>) -> Self {
        self.0.random_state = random_state;
        self
    }
}

impl<F: Float, K: Kernel<F>> From<GprValidParams<F, K>> for GprParams<F, K> {
    fn from(valid: GprValidParams<F, K>) -> Self {
        GprParams(valid)
    }
}

impl<F: Float, K: Kernel<F>> ParamGuard for GprParams<F, K> {
    type Checked = GprValidParams<F, K>;
    type Error = GpError;

    fn check_ref(&self) -> Result<&Self::Checked> {
        if let Some(bounds) = &self.0.bounds {
            if bounds.ncols() != 2 || bounds.nrows() == 0 {
                return Err(GpError::ConfigurationError(format!(
                    "Prior bounds should be a (d, 2) array, got {:?}",
                    bounds.shape()
                )));
            }
            if bounds
                .rows()
                .into_iter()
                .any(|b| !b[0].is_finite() || !b[1].is_finite() || b[0] >= b[1])
            {
                return Err(GpError::ConfigurationError(format!(
                    "Prior bounds should be finite with lower < upper, got {bounds}"
                )));
            }
        }
        if self.0.kernel.is_none() && self.0.bounds.is_none() {
            return Err(GpError::ConfigurationError(format!(
                "You selected the automatically constructed '{}' kernel without \
                 specifying prior bounds.",
                self.0.kernel_spec
            )));
        }
        if self.0.infinities_classifier.is_some() {
            match self.0.inf_threshold {
                None => {
                    return Err(GpError::ConfigurationError(
                        "Specify 'inf_threshold' if using infinities classifier.".to_string(),
                    ))
                }
                Some(InfThreshold::Sigmas(_)) if self.0.bounds.is_none() => {
                    return Err(GpError::ConfigurationError(
                        "An 'inf_threshold' given in sigma units requires prior bounds \
                         to know the dimension of the input space."
                            .to_string(),
                    ))
                }
                Some(InfThreshold::Absolute(v)) | Some(InfThreshold::Sigmas(v))
                    if !(v >= F::zero()) =>
                {
                    return Err(GpError::ConfigurationError(format!(
                        "'inf_threshold' should be positive, got {v}"
                    )))
                }
                _ => (),
            }
        }
        Ok(&self.0)
    }

    fn check(self) -> Result<Self::Checked> {
        self.check_ref()?;
        Ok(self.0)
    }
}
