//! Inverse solver: estimate the gross income behind a net income
//!
//! Below the basic exemptions and above a high-income threshold the forward
//! computation is simple enough to invert in closed form. In between, fitted
//! degree-5 polynomials map net back to gross.

pub mod closed_form;
pub mod coefficients;
pub mod polyfit;
pub mod solver;

pub use closed_form::{gross_for_high_net, gross_for_low_net};
pub use coefficients::{fit_inversion_coefficients, CoefficientSet, CoefficientStore, InversionConfig, SampleRange};
pub use polyfit::Polynomial;
pub use solver::{compute_gross, select_regime, GrossEstimate, InversionRegime};
