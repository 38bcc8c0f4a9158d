//! Tax Calculator - payroll deduction engine for the federal and regional income tax layers
//!
//! This library provides:
//! - Forward computation of contributions, income taxes, surcharges and net income
//! - Inverse estimation of the gross income behind a net income
//! - Fitting and persistence of the mid-range inversion polynomials
//! - Parameter tables built in or loaded from CSV, and a parallel CSV batch driver

pub mod batch;
pub mod calculator;
pub mod engine;
pub mod error;
pub mod inverse;
pub mod params;

// Re-export commonly used types
pub use calculator::TaxCalculator;
pub use engine::{compute_net, ComputationResult};
pub use error::{TaxError, TaxResult};
pub use inverse::{compute_gross, fit_inversion_coefficients, CoefficientSet, CoefficientStore, GrossEstimate, InversionConfig, InversionRegime};
pub use params::{Jurisdiction, TaxTables, YearTables};
