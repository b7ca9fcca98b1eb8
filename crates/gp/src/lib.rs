//! This library implements a [Gaussian Process](https://en.wikipedia.org/wiki/Gaussian_process) regressor
//! designed to be the surrogate model of an expensive log-posterior within an active learning loop,
//! following [GPry](https://arxiv.org/abs/2211.02045).
//!
//! Compared to a standard GP regressor, it:
//! * can be updated incrementally with new training points, refitting the kernel hyperparameters
//!   or only refactorizing the covariance matrix with the current ones,
//! * handles infinite (or very low) target values: an optional classifier sets aside the points
//!   too far below the current maximum and predicts where such values lie in the input space,
//! * works in a space transformed by optional inputs and targets preprocessors,
//! * returns the gradients of the predictive mean and standard deviation.
//!
//! The regressor is implemented by [GaussianProcessRegressor] parameterized by [GprParams].
//! Kernels are defined in the [kernels] module, preprocessors in [preprocessing] and
//! classifiers of infinite values in [classifier].
#![warn(missing_docs)]
#![warn(rustdoc::broken_intra_doc_links)]
mod algorithm;
pub mod classifier;
mod errors;
pub mod kernels;
mod likelihood;
mod noise;
mod optimization;
mod parameters;
pub mod preprocessing;
mod utils;

pub use algorithm::*;
pub use classifier::{InfinitiesClassifier, NearestNeighborClassifier};
pub use errors::*;
pub use kernels::{Kernel, KernelSpec, ScaledKernel};
pub use likelihood::{log_marginal_likelihood, Factorization};
pub use noise::NoiseLevel;
pub use optimization::{
    CobylaParams, CustomOptimizer, Objective, Optimizer, SlsqpParams, GP_COBYLA_MIN_EVAL,
    GP_MIN_RELATIVE_IMPROVEMENT,
};
pub use parameters::*;
pub use preprocessing::{NormalizeBounds, NormalizeY, XPreprocessor, YPreprocessor};
pub use utils::{compute_threshold_given_sigma, scaled_sq_differences};
