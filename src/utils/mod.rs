//! Numerical helpers shared by the analysis components.

pub mod ols;
pub mod optimization;
pub mod stats;

pub use ols::{ols_fit, OlsFit};
pub use optimization::{
    lbfgs, nelder_mead, numerical_gradient, LbfgsConfig, NelderMeadConfig, OptimizationResult,
};
pub use stats::{mad, median, pearson, percentile, quantile_normal, MAD_SCALE};
