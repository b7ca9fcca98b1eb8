use thiserror::Error;

/// A result type for GP regression algorithm
pub type Result<T> = std::result::Result<T, GpError>;

/// An error when using [`GaussianProcessRegressor`](crate::GaussianProcessRegressor)
#[derive(Error, Debug)]
pub enum GpError {
    /// When construction arguments are invalid (bad kernel spec, missing bounds or threshold)
    #[error("Configuration error: {0}")]
    ConfigurationError(String),
    /// When arguments given to fit, append or predict are inconsistent
    #[error("Argument error: {0}")]
    ArgumentError(String),
    /// When the regularized covariance matrix cannot be factorized
    #[error("Numerical error: {0}")]
    NumericalError(String),
    /// When an internal precondition of the regressor is violated
    #[error("State error: {0}")]
    StateError(String),
    /// When a kernel specification cannot be parsed
    #[error("Kernel specification error: {0}")]
    KernelSpecError(#[from] serde_json::Error),
    #[error(transparent)]
    /// When linear algebra computation fails
    LinalgError(#[from] linfa_linalg::LinalgError),
    /// When a linfa error occurs
    #[error(transparent)]
    LinfaError(#[from] linfa::error::Error),
}
