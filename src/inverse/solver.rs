//! Net-to-gross inversion: regime selection and dispatch

use log::debug;
use serde::Serialize;

use super::closed_form::{gross_for_high_net, gross_for_low_net};
use super::coefficients::{CoefficientSet, InversionConfig};
use crate::engine::{compute_net, ComputationResult};
use crate::error::{validate_income, TaxError, TaxResult};
use crate::params::{Jurisdiction, YearTables};

/// Which method produced a gross estimate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InversionRegime {
    /// Net income of zero or less
    Degenerate,
    LowClosedForm,
    LowPolynomial,
    HighPolynomial,
    HighClosedForm,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GrossEstimate {
    pub jurisdiction: Jurisdiction,
    pub year: u32,
    pub net_income: f64,
    /// Rounded to the nearest whole unit
    pub gross_income: f64,
    pub regime: InversionRegime,
    /// Forward computation at the estimate, closed-form regimes only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub breakdown: Option<ComputationResult>,
}

/// Regime that applies to `net_income` in `jurisdiction`
pub fn select_regime(
    net_income: f64,
    tables: &YearTables,
    jurisdiction: Jurisdiction,
    config: &InversionConfig,
) -> TaxResult<InversionRegime> {
    let federal_exemption = tables.federal().layer.basic_exemption.full_amount();
    let regional_exemption = tables.region(jurisdiction)?.layer.basic_exemption.full_amount();

    Ok(if net_income <= 0.0 {
        InversionRegime::Degenerate
    } else if net_income <= federal_exemption || net_income <= regional_exemption {
        InversionRegime::LowClosedForm
    } else if net_income >= config.high_income_threshold {
        InversionRegime::HighClosedForm
    } else if net_income < config.polynomial_split {
        InversionRegime::LowPolynomial
    } else {
        InversionRegime::HighPolynomial
    })
}

/// Estimate the gross income that yields `net_income`
///
/// The mid-range regimes need a coefficient set fitted against the current
/// tables; the closed forms and the degenerate case do not.
pub fn compute_gross(
    net_income: f64,
    tables: &YearTables,
    jurisdiction: Jurisdiction,
    coefficients: Option<&CoefficientSet>,
    config: &InversionConfig,
) -> TaxResult<GrossEstimate> {
    let net_income = validate_income(net_income)?;
    let regime = select_regime(net_income, tables, jurisdiction, config)?;
    debug!(
        "Inverting net {} for {} {} with {:?}",
        net_income,
        jurisdiction,
        tables.year(),
        regime
    );

    let gross = match regime {
        InversionRegime::Degenerate => 0.0,
        InversionRegime::LowClosedForm => gross_for_low_net(net_income, tables, jurisdiction)?,
        InversionRegime::HighClosedForm => gross_for_high_net(net_income, tables, jurisdiction)?,
        InversionRegime::LowPolynomial | InversionRegime::HighPolynomial => {
            let set = coefficients.ok_or(TaxError::MissingCoefficients {
                jurisdiction,
                year: tables.year(),
            })?;
            set.ensure_fresh(tables.fingerprint(jurisdiction)?)?;
            let polynomial = if regime == InversionRegime::LowPolynomial {
                &set.low
            } else {
                &set.high
            };
            polynomial.eval(net_income).max(net_income)
        }
    };
    let gross_income = gross.round();

    let breakdown = match regime {
        InversionRegime::LowClosedForm | InversionRegime::HighClosedForm => {
            Some(compute_net(gross_income, tables, jurisdiction)?)
        }
        _ => None,
    };

    Ok(GrossEstimate {
        jurisdiction,
        year: tables.year(),
        net_income,
        gross_income,
        regime,
        breakdown,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inverse::fit_inversion_coefficients;
    use crate::params::builtin;

    fn tables() -> YearTables {
        builtin::tables_2024().unwrap()
    }

    #[test]
    fn test_regime_boundaries() {
        let t = tables();
        let config = InversionConfig::default();
        let regime = |net: f64| select_regime(net, &t, Jurisdiction::ON, &config).unwrap();
        assert_eq!(regime(0.0), InversionRegime::Degenerate);
        assert_eq!(regime(15_705.0), InversionRegime::LowClosedForm);
        assert_eq!(regime(15_706.0), InversionRegime::LowPolynomial);
        assert_eq!(regime(199_999.0), InversionRegime::LowPolynomial);
        assert_eq!(regime(200_000.0), InversionRegime::HighPolynomial);
        assert_eq!(regime(499_999.0), InversionRegime::HighPolynomial);
        assert_eq!(regime(500_000.0), InversionRegime::HighClosedForm);

        // Alberta's regional exemption exceeds the federal one
        let ab = select_regime(20_000.0, &t, Jurisdiction::AB, &config).unwrap();
        assert_eq!(ab, InversionRegime::LowClosedForm);
    }

    #[test]
    fn test_zero_net() {
        let estimate = compute_gross(0.0, &tables(), Jurisdiction::ON, None, &InversionConfig::default()).unwrap();
        assert_eq!(estimate.gross_income, 0.0);
        assert_eq!(estimate.regime, InversionRegime::Degenerate);
        assert!(estimate.breakdown.is_none());
    }

    #[test]
    fn test_closed_forms_carry_breakdown() {
        let t = tables();
        let config = InversionConfig::default();
        let low = compute_gross(9_447.0, &t, Jurisdiction::ON, None, &config).unwrap();
        assert_eq!(low.gross_income, 10_000.0);
        assert_eq!(low.breakdown.unwrap().net_income, 9_447.0);

        let high = compute_gross(600_000.0, &t, Jurisdiction::ON, None, &config).unwrap();
        assert_eq!(high.regime, InversionRegime::HighClosedForm);
        let breakdown = high.breakdown.unwrap();
        assert!((breakdown.net_income - 600_000.0).abs() <= 1.0);
    }

    #[test]
    fn test_mid_range_requires_coefficients() {
        let t = tables();
        let config = InversionConfig::default();
        assert!(matches!(
            compute_gross(60_000.0, &t, Jurisdiction::ON, None, &config),
            Err(TaxError::MissingCoefficients { .. })
        ));

        // A set fitted for another jurisdiction fails the fingerprint check
        let alberta = fit_inversion_coefficients(&t, Jurisdiction::AB, &config).unwrap();
        assert!(matches!(
            compute_gross(60_000.0, &t, Jurisdiction::ON, Some(&alberta), &config),
            Err(TaxError::StaleCoefficients { .. })
        ));
    }

    #[test]
    fn test_mid_range_uses_polynomials() {
        let t = tables();
        let config = InversionConfig::default();
        let set = fit_inversion_coefficients(&t, Jurisdiction::ON, &config).unwrap();
        let low = compute_gross(60_000.0, &t, Jurisdiction::ON, Some(&set), &config).unwrap();
        assert_eq!(low.regime, InversionRegime::LowPolynomial);
        assert!(low.breakdown.is_none());
        let high = compute_gross(300_000.0, &t, Jurisdiction::ON, Some(&set), &config).unwrap();
        assert_eq!(high.regime, InversionRegime::HighPolynomial);
        assert!(high.gross_income > low.gross_income);
    }

    #[test]
    fn test_rejects_negative_net() {
        assert!(matches!(
            compute_gross(-1.0, &tables(), Jurisdiction::ON, None, &InversionConfig::default()),
            Err(TaxError::InvalidIncome { .. })
        ));
    }
}
