//! A module for the covariance functions (aka kernels) of the GP model.
//!
//! Hyperparameters are handled in log space: `theta` is the natural logarithm of the
//! kernel parameters and `bounds` are the log-transformed parameter bounds.
//!
//! The following kernels are implemented:
//! * constant kernel `c`,
//! * length-scale kernels (squared exponential aka RBF, matern 1/2, matern 3/2, matern 5/2),
//!   isotropic (one length scale) or anisotropic (one length scale per dimension),
//! * scaled kernel `c * k(x, x')`, product of the two above, which is the kernel
//!   auto-built by the regressor.

use crate::errors::{GpError, Result};
use crate::utils::scaled_sq_differences;
use linfa::Float;
use ndarray::{arr2, s, Array1, Array2, Array3, ArrayBase, Axis, Data, Ix1, Ix2, Zip};
use serde::Deserialize;
#[cfg(feature = "serializable")]
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// Default bounds of the [`ConstantKernel`] value
pub const CONSTANT_BOUNDS: (f64, f64) = (1e-3, 1e4);
/// Default bounds of [`LengthScaleKernel`] length scales
pub const LENGTH_SCALE_BOUNDS: (f64, f64) = (1e-5, 1e5);

/// A trait for covariance functions used by the GP regressor
pub trait Kernel<F: Float>: Clone + fmt::Debug + fmt::Display + Send + Sync {
    /// Log-transformed hyperparameters
    fn theta(&self) -> Array1<F>;

    /// Set hyperparameters given as log-transformed values
    fn set_theta(&mut self, theta: &ArrayBase<impl Data<Elem = F>, Ix1>) -> Result<()>;

    /// Log-transformed hyperparameter bounds as a (n_dims, 2) array
    fn bounds(&self) -> Array2<F>;

    /// Number of hyperparameters
    fn n_dims(&self) -> usize {
        self.theta().len()
    }

    /// Input dimension required by the kernel, `None` when any dimension is accepted
    fn input_dim(&self) -> Option<usize> {
        None
    }

    /// Covariance matrix `k(x, y)` of shape (nrows(x), nrows(y))
    fn value(
        &self,
        x: &ArrayBase<impl Data<Elem = F>, Ix2>,
        y: &ArrayBase<impl Data<Elem = F>, Ix2>,
    ) -> Array2<F>;

    /// Covariance matrix `k(x, x)` and its gradient with respect to `theta`
    /// as a (nrows(x), nrows(x), n_dims) array
    fn value_with_gradient(&self, x: &ArrayBase<impl Data<Elem = F>, Ix2>) -> (Array2<F>, Array3<F>);

    /// Diagonal of `k(x, x)`
    fn diag(&self, x: &ArrayBase<impl Data<Elem = F>, Ix2>) -> Array1<F>;

    /// Gradient of `k(x, xtrain_i)` with respect to `x` for every row of `xtrain`,
    /// returned as a (nrows(xtrain), ncols(xtrain)) array
    fn gradient_x(
        &self,
        x: &ArrayBase<impl Data<Elem = F>, Ix1>,
        xtrain: &ArrayBase<impl Data<Elem = F>, Ix2>,
    ) -> Array2<F>;

    /// Build the kernel from a named specification given the (possibly transformed)
    /// prior bounds of the inputs as a (d, 2) array
    fn from_spec(spec: &KernelSpec, bounds: &ArrayBase<impl Data<Elem = F>, Ix2>) -> Result<Self>
    where
        Self: Sized,
    {
        let _ = bounds;
        Err(GpError::ConfigurationError(format!(
            "Kernel cannot be built from '{spec}', pass a kernel instance instead"
        )))
    }
}

fn check_theta_len<F: Float>(theta: &ArrayBase<impl Data<Elem = F>, Ix1>, n: usize) -> Result<()> {
    if theta.len() != n {
        return Err(GpError::ArgumentError(format!(
            "theta should have {} components, got {}",
            n,
            theta.len()
        )));
    }
    Ok(())
}

/// Constant covariance `k(x, x') = c`
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serializable", derive(Serialize, Deserialize))]
pub struct ConstantKernel<F: Float> {
    constant: F,
    bounds: (F, F),
}

impl<F: Float> Default for ConstantKernel<F> {
    fn default() -> Self {
        ConstantKernel {
            constant: F::one(),
            bounds: (F::cast(CONSTANT_BOUNDS.0), F::cast(CONSTANT_BOUNDS.1)),
        }
    }
}

impl<F: Float> ConstantKernel<F> {
    /// Constructor given the constant value and its bounds
    pub fn new(constant: F, bounds: (F, F)) -> Result<Self> {
        if !(constant > F::zero()) || !(bounds.0 > F::zero()) || bounds.0 > bounds.1 {
            return Err(GpError::ConfigurationError(format!(
                "Constant kernel requires 0 < value and 0 < lower <= upper bound, got {} in [{}, {}]",
                constant, bounds.0, bounds.1
            )));
        }
        Ok(ConstantKernel { constant, bounds })
    }

    /// The constant value
    pub fn constant(&self) -> F {
        self.constant
    }
}

impl<F: Float> fmt::Display for ConstantKernel<F> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:.3}", self.constant)
    }
}

impl<F: Float> Kernel<F> for ConstantKernel<F> {
    fn theta(&self) -> Array1<F> {
        Array1::from_elem(1, self.constant.ln())
    }

    fn set_theta(&mut self, theta: &ArrayBase<impl Data<Elem = F>, Ix1>) -> Result<()> {
        check_theta_len(theta, 1)?;
        self.constant = theta[0].exp();
        Ok(())
    }

    fn bounds(&self) -> Array2<F> {
        arr2(&[[self.bounds.0.ln(), self.bounds.1.ln()]])
    }

    fn value(
        &self,
        x: &ArrayBase<impl Data<Elem = F>, Ix2>,
        y: &ArrayBase<impl Data<Elem = F>, Ix2>,
    ) -> Array2<F> {
        Array2::from_elem((x.nrows(), y.nrows()), self.constant)
    }

    fn value_with_gradient(&self, x: &ArrayBase<impl Data<Elem = F>, Ix2>) -> (Array2<F>, Array3<F>) {
        let n = x.nrows();
        // d(c)/d(log c) = c
        (
            Array2::from_elem((n, n), self.constant),
            Array3::from_elem((n, n, 1), self.constant),
        )
    }

    fn diag(&self, x: &ArrayBase<impl Data<Elem = F>, Ix2>) -> Array1<F> {
        Array1::from_elem(x.nrows(), self.constant)
    }

    fn gradient_x(
        &self,
        _x: &ArrayBase<impl Data<Elem = F>, Ix1>,
        xtrain: &ArrayBase<impl Data<Elem = F>, Ix2>,
    ) -> Array2<F> {
        Array2::zeros(xtrain.raw_dim())
    }
}

/// Smoothness parameter of the matern kernel
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serializable", derive(Serialize, Deserialize))]
pub enum MaternNu {
    /// nu = 1/2, aka absolute exponential
    Half,
    /// nu = 3/2
    ThreeHalves,
    /// nu = 5/2
    FiveHalves,
}

impl MaternNu {
    /// Numerical value of nu
    pub fn value(&self) -> f64 {
        match self {
            MaternNu::Half => 0.5,
            MaternNu::ThreeHalves => 1.5,
            MaternNu::FiveHalves => 2.5,
        }
    }
}

impl TryFrom<f64> for MaternNu {
    type Error = GpError;
    fn try_from(nu: f64) -> Result<Self> {
        if nu == 0.5 {
            Ok(MaternNu::Half)
        } else if nu == 1.5 {
            Ok(MaternNu::ThreeHalves)
        } else if nu == 2.5 {
            Ok(MaternNu::FiveHalves)
        } else {
            Err(GpError::ConfigurationError(format!(
                "Matern kernel supports nu in {{0.5, 1.5, 2.5}}, got {nu}"
            )))
        }
    }
}

/// Kind of stationary correlation function `k(r)` of a [`LengthScaleKernel`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serializable", derive(Serialize, Deserialize))]
pub enum CorrelationKind {
    /// `exp(-r²/2)`
    SquaredExponential,
    /// Matern family
    Matern(MaternNu),
}

impl CorrelationKind {
    /// Correlation value given the squared scaled distance `r2`
    fn value<F: Float>(&self, r2: F) -> F {
        match self {
            CorrelationKind::SquaredExponential => (F::cast(-0.5) * r2).exp(),
            CorrelationKind::Matern(MaternNu::Half) => (-r2.sqrt()).exp(),
            CorrelationKind::Matern(MaternNu::ThreeHalves) => {
                let t = (F::cast(3.) * r2).sqrt();
                (F::one() + t) * (-t).exp()
            }
            CorrelationKind::Matern(MaternNu::FiveHalves) => {
                let t = (F::cast(5.) * r2).sqrt();
                (F::one() + t + t * t / F::cast(3.)) * (-t).exp()
            }
        }
    }

    /// Returns `-2 dk/dr2` given `r2` and `k = k(r2)`, so that the derivative of `k`
    /// with respect to a log length scale is this factor times the scaled squared difference
    fn radial_factor<F: Float>(&self, r2: F, k: F) -> F {
        match self {
            CorrelationKind::SquaredExponential => k,
            CorrelationKind::Matern(MaternNu::Half) => {
                let r = r2.sqrt();
                if r > F::zero() {
                    k / r
                } else {
                    F::zero()
                }
            }
            CorrelationKind::Matern(MaternNu::ThreeHalves) => {
                let t = (F::cast(3.) * r2).sqrt();
                F::cast(3.) * (-t).exp()
            }
            CorrelationKind::Matern(MaternNu::FiveHalves) => {
                let t = (F::cast(5.) * r2).sqrt();
                F::cast(5. / 3.) * (F::one() + t) * (-t).exp()
            }
        }
    }
}

impl fmt::Display for CorrelationKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            CorrelationKind::SquaredExponential => write!(f, "RBF"),
            CorrelationKind::Matern(nu) => write!(f, "Matern(nu={})", nu.value()),
        }
    }
}

/// Stationary kernel `k(r)` where `r² = sum_l (x_l - x'_l)² / l_l²`
///
/// A single length scale gives an isotropic kernel, one length scale per
/// input dimension gives an anisotropic one.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serializable", derive(Serialize, Deserialize))]
pub struct LengthScaleKernel<F: Float> {
    kind: CorrelationKind,
    length_scale: Array1<F>,
    /// Natural (not log-transformed) bounds, one row per length scale
    bounds: Array2<F>,
}

impl<F: Float> LengthScaleKernel<F> {
    /// Constructor given the correlation kind, initial length scales and their (n, 2) bounds
    pub fn new(kind: CorrelationKind, length_scale: Array1<F>, bounds: Array2<F>) -> Result<Self> {
        if length_scale.is_empty() {
            return Err(GpError::ConfigurationError(
                "At least one length scale is required".to_string(),
            ));
        }
        if bounds.nrows() != length_scale.len() || bounds.ncols() != 2 {
            return Err(GpError::ConfigurationError(format!(
                "Length scale bounds should be a ({}, 2) array, got {:?}",
                length_scale.len(),
                bounds.shape()
            )));
        }
        if length_scale.iter().any(|&l| !(l > F::zero())) {
            return Err(GpError::ConfigurationError(format!(
                "Length scales should be positive, got {length_scale}"
            )));
        }
        if bounds
            .rows()
            .into_iter()
            .any(|b| !(b[0] > F::zero()) || b[0] > b[1])
        {
            return Err(GpError::ConfigurationError(format!(
                "Length scale bounds should verify 0 < lower <= upper, got {bounds}"
            )));
        }
        Ok(LengthScaleKernel {
            kind,
            length_scale,
            bounds,
        })
    }

    fn default_bounds(n: usize) -> Array2<F> {
        let mut bounds = Array2::zeros((n, 2));
        bounds.column_mut(0).fill(F::cast(LENGTH_SCALE_BOUNDS.0));
        bounds.column_mut(1).fill(F::cast(LENGTH_SCALE_BOUNDS.1));
        bounds
    }

    /// Squared exponential kernel with default length scale bounds
    pub fn rbf(length_scale: Array1<F>) -> Result<Self> {
        let bounds = Self::default_bounds(length_scale.len());
        Self::new(CorrelationKind::SquaredExponential, length_scale, bounds)
    }

    /// Matern kernel with default length scale bounds
    pub fn matern(length_scale: Array1<F>, nu: MaternNu) -> Result<Self> {
        let bounds = Self::default_bounds(length_scale.len());
        Self::new(CorrelationKind::Matern(nu), length_scale, bounds)
    }

    /// Correlation kind
    pub fn kind(&self) -> CorrelationKind {
        self.kind
    }

    /// Current length scales
    pub fn length_scale(&self) -> &Array1<F> {
        &self.length_scale
    }

    fn is_isotropic(&self) -> bool {
        self.length_scale.len() == 1
    }

    /// Length scales broadcast to the input dimension `dim`
    ///
    /// *Panics* if the kernel is anisotropic with a number of length scales different from `dim`,
    /// see [`Kernel::input_dim`]
    fn scales(&self, dim: usize) -> Array1<F> {
        if self.is_isotropic() {
            Array1::from_elem(dim, self.length_scale[0])
        } else {
            assert_eq!(
                self.length_scale.len(),
                dim,
                "Anisotropic kernel dimension mismatch"
            );
            self.length_scale.to_owned()
        }
    }
}

impl<F: Float> fmt::Display for LengthScaleKernel<F> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}(length_scale={})", self.kind, self.length_scale)
    }
}

impl<F: Float> Kernel<F> for LengthScaleKernel<F> {
    fn theta(&self) -> Array1<F> {
        self.length_scale.mapv(|v| v.ln())
    }

    fn set_theta(&mut self, theta: &ArrayBase<impl Data<Elem = F>, Ix1>) -> Result<()> {
        check_theta_len(theta, self.length_scale.len())?;
        self.length_scale = theta.mapv(|v| v.exp());
        Ok(())
    }

    fn bounds(&self) -> Array2<F> {
        self.bounds.mapv(|v| v.ln())
    }

    fn input_dim(&self) -> Option<usize> {
        (!self.is_isotropic()).then_some(self.length_scale.len())
    }

    fn value(
        &self,
        x: &ArrayBase<impl Data<Elem = F>, Ix2>,
        y: &ArrayBase<impl Data<Elem = F>, Ix2>,
    ) -> Array2<F> {
        let scales = self.scales(x.ncols());
        scaled_sq_differences(x, y, &scales)
            .sum_axis(Axis(2))
            .mapv(|r2| self.kind.value(r2))
    }

    fn value_with_gradient(&self, x: &ArrayBase<impl Data<Elem = F>, Ix2>) -> (Array2<F>, Array3<F>) {
        let scales = self.scales(x.ncols());
        let d = scaled_sq_differences(x, x, &scales);
        let r2 = d.sum_axis(Axis(2));
        let k = r2.mapv(|v| self.kind.value(v));
        let mut g = Array2::zeros(k.raw_dim());
        Zip::from(&mut g)
            .and(&r2)
            .and(&k)
            .for_each(|g, &r2, &k| *g = self.kind.radial_factor(r2, k));

        let grad = if self.is_isotropic() {
            (&g * &r2).insert_axis(Axis(2))
        } else {
            d * &g.insert_axis(Axis(2))
        };
        (k, grad)
    }

    fn diag(&self, x: &ArrayBase<impl Data<Elem = F>, Ix2>) -> Array1<F> {
        Array1::ones(x.nrows())
    }

    fn gradient_x(
        &self,
        x: &ArrayBase<impl Data<Elem = F>, Ix1>,
        xtrain: &ArrayBase<impl Data<Elem = F>, Ix2>,
    ) -> Array2<F> {
        let scales = self.scales(x.len());
        let sq_scales = scales.mapv(|l| l * l);
        let mut jac = Array2::zeros(xtrain.raw_dim());
        Zip::from(jac.rows_mut())
            .and(xtrain.rows())
            .for_each(|mut jac_row, xt| {
                let diff = x - &xt;
                let r2 = (&diff / &scales).mapv(|v| v * v).sum();
                let factor = self.kind.radial_factor(r2, self.kind.value(r2));
                jac_row.assign(&(diff / &sq_scales * (-factor)));
            });
        jac
    }
}

/// Scaled kernel `c * k(x, x')`, the product of a [`ConstantKernel`] with a [`LengthScaleKernel`]
///
/// `theta` is the concatenation `[log c, log l_1, ..., log l_n]`.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serializable", derive(Serialize, Deserialize))]
pub struct ScaledKernel<F: Float> {
    constant: ConstantKernel<F>,
    corr: LengthScaleKernel<F>,
}

impl<F: Float> ScaledKernel<F> {
    /// Constructor
    pub fn new(constant: ConstantKernel<F>, corr: LengthScaleKernel<F>) -> Self {
        ScaledKernel { constant, corr }
    }

    /// The scaling constant kernel
    pub fn constant(&self) -> &ConstantKernel<F> {
        &self.constant
    }

    /// The length-scale correlation kernel
    pub fn correlation(&self) -> &LengthScaleKernel<F> {
        &self.corr
    }
}

impl<F: Float> fmt::Display for ScaledKernel<F> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} * {}", self.constant, self.corr)
    }
}

impl<F: Float> Kernel<F> for ScaledKernel<F> {
    fn theta(&self) -> Array1<F> {
        let mut theta = Array1::zeros(1 + self.corr.length_scale.len());
        theta[0] = self.constant.constant.ln();
        theta.slice_mut(s![1..]).assign(&self.corr.theta());
        theta
    }

    fn set_theta(&mut self, theta: &ArrayBase<impl Data<Elem = F>, Ix1>) -> Result<()> {
        check_theta_len(theta, 1 + self.corr.length_scale.len())?;
        self.constant.set_theta(&theta.slice(s![..1]))?;
        self.corr.set_theta(&theta.slice(s![1..]))
    }

    fn bounds(&self) -> Array2<F> {
        let mut bounds = Array2::zeros((1 + self.corr.length_scale.len(), 2));
        bounds
            .slice_mut(s![..1, ..])
            .assign(&self.constant.bounds());
        bounds.slice_mut(s![1.., ..]).assign(&self.corr.bounds());
        bounds
    }

    fn input_dim(&self) -> Option<usize> {
        self.corr.input_dim()
    }

    fn value(
        &self,
        x: &ArrayBase<impl Data<Elem = F>, Ix2>,
        y: &ArrayBase<impl Data<Elem = F>, Ix2>,
    ) -> Array2<F> {
        self.corr.value(x, y) * self.constant.constant
    }

    fn value_with_gradient(&self, x: &ArrayBase<impl Data<Elem = F>, Ix2>) -> (Array2<F>, Array3<F>) {
        let c = self.constant.constant;
        let (k, dk) = self.corr.value_with_gradient(x);
        let k = k * c;
        let mut grad = Array3::zeros((k.nrows(), k.ncols(), 1 + dk.len_of(Axis(2))));
        grad.slice_mut(s![.., .., 0]).assign(&k);
        grad.slice_mut(s![.., .., 1..]).assign(&(dk * c));
        (k, grad)
    }

    fn diag(&self, x: &ArrayBase<impl Data<Elem = F>, Ix2>) -> Array1<F> {
        self.corr.diag(x) * self.constant.constant
    }

    fn gradient_x(
        &self,
        x: &ArrayBase<impl Data<Elem = F>, Ix1>,
        xtrain: &ArrayBase<impl Data<Elem = F>, Ix2>,
    ) -> Array2<F> {
        self.corr.gradient_x(x, xtrain) * self.constant.constant
    }

    /// Anisotropic `1.0 * k(x, x')` with length scales initialized to 1% of the bounds
    /// width and bounded within [1%, 100x] of that width.
    fn from_spec(spec: &KernelSpec, bounds: &ArrayBase<impl Data<Elem = F>, Ix2>) -> Result<Self> {
        if bounds.ncols() != 2 || bounds.nrows() == 0 {
            return Err(GpError::ConfigurationError(format!(
                "Prior bounds should be a (d, 2) array, got {:?}",
                bounds.shape()
            )));
        }
        let width = bounds.column(1).to_owned() - bounds.column(0);
        if width.iter().any(|w| !w.is_finite() || *w <= F::zero()) {
            return Err(GpError::ConfigurationError(format!(
                "Prior bounds should be finite with lower < upper, got {bounds}"
            )));
        }
        let length_scale = width.mapv(|w| w * F::cast(0.01));
        let mut ls_bounds = Array2::zeros((width.len(), 2));
        ls_bounds.column_mut(0).assign(&length_scale);
        ls_bounds
            .column_mut(1)
            .assign(&width.mapv(|w| w * F::cast(100.)));
        let corr = LengthScaleKernel::new(spec.correlation_kind(), length_scale, ls_bounds)?;
        Ok(ScaledKernel::new(ConstantKernel::default(), corr))
    }
}

/// Names one of the length-scale kernels the regressor knows how to build
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serializable", derive(Serialize, Deserialize))]
pub enum KernelSpec {
    /// Squared exponential
    #[default]
    Rbf,
    /// Matern with the given smoothness
    Matern {
        /// smoothness parameter
        nu: MaternNu,
    },
}

#[derive(Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct KernelArgs {
    nu: Option<f64>,
}

impl KernelSpec {
    /// Correlation kind of the kernel to be built
    pub fn correlation_kind(&self) -> CorrelationKind {
        match self {
            KernelSpec::Rbf => CorrelationKind::SquaredExponential,
            KernelSpec::Matern { nu } => CorrelationKind::Matern(*nu),
        }
    }

    /// Parse a kernel specification given either as a name (`"RBF"`) or as a
    /// single-key map from name to arguments (`{"Matern": {"nu": 2.5}}`)
    pub fn from_json(value: &serde_json::Value) -> Result<Self> {
        match value {
            serde_json::Value::String(name) => name.parse(),
            serde_json::Value::Object(map) => {
                if map.len() != 1 {
                    return Err(GpError::ConfigurationError(format!(
                        "Kernel specification must be a single-key map, got {} keys",
                        map.len()
                    )));
                }
                let (name, args) = map.iter().next().ok_or_else(|| {
                    GpError::ConfigurationError("Empty kernel specification".to_string())
                })?;
                let spec: KernelSpec = name.parse()?;
                let args: KernelArgs = if args.is_null() {
                    KernelArgs::default()
                } else {
                    serde_json::from_value(args.clone())?
                };
                match (spec, args.nu) {
                    (_, None) => Ok(spec),
                    (KernelSpec::Matern { .. }, Some(nu)) => Ok(KernelSpec::Matern {
                        nu: MaternNu::try_from(nu)?,
                    }),
                    (KernelSpec::Rbf, Some(_)) => Err(GpError::ConfigurationError(
                        "RBF kernel does not take a 'nu' argument".to_string(),
                    )),
                }
            }
            other => Err(GpError::ConfigurationError(format!(
                "Kernel specification should be a name or a single-key map, got {other}"
            ))),
        }
    }

    /// Parse a JSON kernel specification, see [`KernelSpec::from_json`]
    pub fn from_json_str(s: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(s)?;
        Self::from_json(&value)
    }
}

impl FromStr for KernelSpec {
    type Err = GpError;

    /// Case insensitive "RBF" or "Matern" (nu = 3/2)
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "rbf" => Ok(KernelSpec::Rbf),
            "matern" => Ok(KernelSpec::Matern {
                nu: MaternNu::ThreeHalves,
            }),
            _ => Err(GpError::ConfigurationError(format!(
                "Currently only 'RBF' and 'Matern' are supported as standard kernels. Got '{s}'."
            ))),
        }
    }
}

impl fmt::Display for KernelSpec {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            KernelSpec::Rbf => write!(f, "RBF"),
            KernelSpec::Matern { nu } => write!(f, "Matern(nu={})", nu.value()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use finitediff::FiniteDiff;
    use ndarray::{array, Array};
    use paste::paste;

    fn xdata() -> Array2<f64> {
        array![[0.1, 0.3], [0.5, 0.2], [0.9, 0.7], [0.4, 0.95]]
    }

    macro_rules! test_kernel_gradients {
        ($name:ident, $kernel:expr) => {
            paste! {
                #[test]
                fn [<test_theta_gradient_ $name>]() {
                    let kernel: ScaledKernel<f64> = $kernel;
                    let x = xdata();
                    let weights = Array::linspace(0.5, 2., 16).into_shape((4, 4)).unwrap();

                    let (_, dk) = kernel.value_with_gradient(&x);
                    let grad: Vec<f64> = (0..kernel.n_dims())
                        .map(|j| (&dk.slice(s![.., .., j]) * &weights).sum())
                        .collect();

                    let f = |theta: &Vec<f64>| -> f64 {
                        let mut k = kernel.clone();
                        k.set_theta(&Array1::from(theta.clone())).unwrap();
                        (k.value(&x, &x) * &weights).sum()
                    };
                    let grad_fd = kernel.theta().to_vec().central_diff(&f);
                    for (g, gfd) in grad.iter().zip(grad_fd.iter()) {
                        assert_abs_diff_eq!(g, gfd, epsilon = 1e-5);
                    }
                }

                #[test]
                fn [<test_x_gradient_ $name>]() {
                    let kernel: ScaledKernel<f64> = $kernel;
                    let xtrain = xdata();
                    let x = array![0.3, 0.6];

                    let jac = kernel.gradient_x(&x, &xtrain);
                    assert_eq!(jac.shape(), &[4, 2]);
                    for i in 0..xtrain.nrows() {
                        let xt = xtrain.slice(s![i..i + 1, ..]).to_owned();
                        let f = |x: &Vec<f64>| -> f64 {
                            let x = Array2::from_shape_vec((1, 2), x.clone()).unwrap();
                            kernel.value(&x, &xt)[[0, 0]]
                        };
                        let grad_fd = x.to_vec().central_diff(&f);
                        assert_abs_diff_eq!(jac[[i, 0]], grad_fd[0], epsilon = 1e-6);
                        assert_abs_diff_eq!(jac[[i, 1]], grad_fd[1], epsilon = 1e-6);
                    }
                }
            }
        };
    }

    fn scaled(kind: CorrelationKind, length_scale: Array1<f64>) -> ScaledKernel<f64> {
        let n = length_scale.len();
        let mut bounds = Array2::zeros((n, 2));
        bounds.column_mut(0).fill(1e-3);
        bounds.column_mut(1).fill(1e3);
        ScaledKernel::new(
            ConstantKernel::new(1.7, (1e-3, 1e4)).unwrap(),
            LengthScaleKernel::new(kind, length_scale, bounds).unwrap(),
        )
    }

    test_kernel_gradients!(rbf, scaled(CorrelationKind::SquaredExponential, array![0.4, 0.7]));
    test_kernel_gradients!(
        rbf_isotropic,
        scaled(CorrelationKind::SquaredExponential, array![0.5])
    );
    test_kernel_gradients!(
        matern12,
        scaled(CorrelationKind::Matern(MaternNu::Half), array![0.4, 0.7])
    );
    test_kernel_gradients!(
        matern32,
        scaled(CorrelationKind::Matern(MaternNu::ThreeHalves), array![0.4, 0.7])
    );
    test_kernel_gradients!(
        matern52,
        scaled(CorrelationKind::Matern(MaternNu::FiveHalves), array![0.4, 0.7])
    );
    test_kernel_gradients!(
        matern52_isotropic,
        scaled(CorrelationKind::Matern(MaternNu::FiveHalves), array![0.6])
    );

    #[test]
    fn test_rbf_values() {
        let kernel = LengthScaleKernel::rbf(array![1.0]).unwrap();
        let x = array![[0.], [1.], [2.]];
        let k = kernel.value(&x, &x);
        assert_abs_diff_eq!(k[[0, 0]], 1.);
        assert_abs_diff_eq!(k[[0, 1]], (-0.5f64).exp(), epsilon = 1e-12);
        assert_abs_diff_eq!(k[[0, 2]], (-2f64).exp(), epsilon = 1e-12);
        assert_abs_diff_eq!(k, k.t(), epsilon = 1e-15);
        assert_abs_diff_eq!(kernel.diag(&x), array![1., 1., 1.]);
    }

    #[test]
    fn test_matern_values() {
        let x = array![[0.], [1.]];
        let m12 = LengthScaleKernel::matern(array![2.0], MaternNu::Half).unwrap();
        assert_abs_diff_eq!(m12.value(&x, &x)[[0, 1]], (-0.5f64).exp(), epsilon = 1e-12);
        let m32 = LengthScaleKernel::matern(array![1.0], MaternNu::ThreeHalves).unwrap();
        let t = 3f64.sqrt();
        assert_abs_diff_eq!(
            m32.value(&x, &x)[[0, 1]],
            (1. + t) * (-t).exp(),
            epsilon = 1e-12
        );
        let m52 = LengthScaleKernel::matern(array![1.0], MaternNu::FiveHalves).unwrap();
        let t = 5f64.sqrt();
        assert_abs_diff_eq!(
            m52.value(&x, &x)[[0, 1]],
            (1. + t + t * t / 3.) * (-t).exp(),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_isotropic_matches_anisotropic() {
        let x = xdata();
        let iso = LengthScaleKernel::rbf(array![0.3]).unwrap();
        let aniso = LengthScaleKernel::rbf(array![0.3, 0.3]).unwrap();
        assert_abs_diff_eq!(iso.value(&x, &x), aniso.value(&x, &x), epsilon = 1e-14);
        assert_eq!(iso.input_dim(), None);
        assert_eq!(aniso.input_dim(), Some(2));
        let kernel = scaled(CorrelationKind::SquaredExponential, array![1., 2., 3.]);
        assert_eq!(kernel.input_dim(), Some(3));
        assert_eq!(ConstantKernel::<f64>::default().input_dim(), None);
    }

    #[test]
    fn test_scaled_theta_and_bounds() {
        let mut kernel =
            ScaledKernel::from_spec(&KernelSpec::Rbf, &array![[0., 1.], [-2., 2.]]).unwrap();
        assert_eq!(kernel.n_dims(), 3);
        assert_abs_diff_eq!(
            kernel.theta(),
            array![0., 0.01f64.ln(), 0.04f64.ln()],
            epsilon = 1e-12
        );
        assert_abs_diff_eq!(
            kernel.bounds(),
            array![
                [1e-3f64.ln(), 1e4f64.ln()],
                [0.01f64.ln(), 100f64.ln()],
                [0.04f64.ln(), 400f64.ln()]
            ],
            epsilon = 1e-12
        );
        kernel.set_theta(&array![2f64.ln(), 0., 1.]).unwrap();
        assert_abs_diff_eq!(kernel.constant().constant(), 2., epsilon = 1e-12);
        assert_abs_diff_eq!(
            kernel.correlation().length_scale().to_owned(),
            array![1., 1f64.exp()],
            epsilon = 1e-12
        );
        assert!(kernel.set_theta(&array![0., 1.]).is_err());
        assert_abs_diff_eq!(kernel.diag(&xdata()), Array1::from_elem(4, 2.), epsilon = 1e-12);
    }

    #[test]
    fn test_from_spec_bad_bounds() {
        assert!(matches!(
            ScaledKernel::<f64>::from_spec(&KernelSpec::Rbf, &array![[1., 0.]]),
            Err(GpError::ConfigurationError(_))
        ));
        assert!(matches!(
            ScaledKernel::<f64>::from_spec(&KernelSpec::Rbf, &array![[0., f64::INFINITY]]),
            Err(GpError::ConfigurationError(_))
        ));
        assert!(matches!(
            ConstantKernel::<f64>::from_spec(&KernelSpec::Rbf, &array![[0., 1.]]),
            Err(GpError::ConfigurationError(_))
        ));
    }

    #[test]
    fn test_kernel_spec() {
        assert_eq!("RBF".parse::<KernelSpec>().unwrap(), KernelSpec::Rbf);
        assert_eq!(
            "matern".parse::<KernelSpec>().unwrap(),
            KernelSpec::Matern {
                nu: MaternNu::ThreeHalves
            }
        );
        assert!(matches!(
            "Linear".parse::<KernelSpec>(),
            Err(GpError::ConfigurationError(_))
        ));
        assert_eq!(
            KernelSpec::from_json_str(r#"{"Matern": {"nu": 2.5}}"#).unwrap(),
            KernelSpec::Matern {
                nu: MaternNu::FiveHalves
            }
        );
        assert_eq!(
            KernelSpec::from_json_str(r#"{"RBF": null}"#).unwrap(),
            KernelSpec::Rbf
        );
        assert_eq!(KernelSpec::from_json_str(r#""rbf""#).unwrap(), KernelSpec::Rbf);
        assert!(matches!(
            KernelSpec::from_json_str(r#"{"RBF": {}, "Matern": {}}"#),
            Err(GpError::ConfigurationError(_))
        ));
        assert!(matches!(
            KernelSpec::from_json_str(r#"{"Matern": {"nu": 0.7}}"#),
            Err(GpError::ConfigurationError(_))
        ));
        assert!(matches!(
            KernelSpec::from_json_str(r#"{"Matern": {"length": 1.0}}"#),
            Err(GpError::KernelSpecError(_))
        ));
        assert!(matches!(
            KernelSpec::from_json_str(r#"{"RBF": {"nu": 1.5}}"#),
            Err(GpError::ConfigurationError(_))
        ));
    }
}
