//! Error types shared by the parameter tables, the solvers and the batch driver

use thiserror::Error;

use crate::params::Jurisdiction;

/// Failures reported by the calculator
///
/// Every computation is deterministic, so none of these are retried internally.
#[derive(Debug, Error)]
pub enum TaxError {
    /// A parameter table is missing a field or violates a structural invariant
    #[error("invalid parameter table for {layer}: {reason}")]
    InvalidParameters { layer: String, reason: String },

    /// Income was negative, NaN or infinite
    #[error("invalid income {value}: {reason}")]
    InvalidIncome { value: f64, reason: &'static str },

    #[error("unknown jurisdiction: {0}")]
    UnknownJurisdiction(String),

    #[error("tax year {0} is not loaded")]
    UnsupportedYear(u32),

    #[error("no parameter table for {jurisdiction} in {year}")]
    MissingJurisdiction { jurisdiction: Jurisdiction, year: u32 },

    /// The high-income closed form has a (near) zero denominator
    #[error("high-income closed form is degenerate for {jurisdiction} {year} (denominator {denominator})")]
    NumericalDegeneracy {
        jurisdiction: Jurisdiction,
        year: u32,
        denominator: f64,
    },

    #[error("no inversion coefficients fitted for {jurisdiction} {year}")]
    MissingCoefficients { jurisdiction: Jurisdiction, year: u32 },

    /// Coefficients were fitted against a different version of the parameter table
    #[error("inversion coefficients for {jurisdiction} {year} are stale (fitted {fitted}, tables {current})")]
    StaleCoefficients {
        jurisdiction: Jurisdiction,
        year: u32,
        fitted: String,
        current: String,
    },

    #[error("polynomial fit failed: {0}")]
    SingularFit(String),

    /// A batch cell that does not parse as the expected type
    #[error("cannot read {field} from '{value}'")]
    InvalidField { field: &'static str, value: String },

    #[error("row {row}: {source}")]
    InvalidRow {
        row: usize,
        #[source]
        source: Box<TaxError>,
    },

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl TaxError {
    pub(crate) fn invalid_parameters(layer: impl Into<String>, reason: impl Into<String>) -> Self {
        TaxError::InvalidParameters {
            layer: layer.into(),
            reason: reason.into(),
        }
    }
}

pub type TaxResult<T> = Result<T, TaxError>;

/// Reject incomes that cannot enter the solvers
pub fn validate_income(value: f64) -> TaxResult<f64> {
    if !value.is_finite() {
        return Err(TaxError::InvalidIncome {
            value,
            reason: "income must be a finite number",
        });
    }
    if value < 0.0 {
        return Err(TaxError::InvalidIncome {
            value,
            reason: "income must not be negative",
        });
    }
    Ok(value)
}
