//! Pension and employment-insurance contributions

use serde::Serialize;

use crate::params::{ContributionParams, Jurisdiction};

/// Contributions withheld from one gross income
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Contributions {
    /// Pension contribution including any second-tier amount
    pub pension: f64,
    pub insurance: f64,
}

/// First-tier pension contribution, capped at the maximum pensionable earnings
pub fn pension_contribution(gross_income: f64, rate: f64, params: &ContributionParams) -> f64 {
    let exemption = params.pension_exemption;
    if gross_income <= exemption {
        return 0.0;
    }
    let cap = (params.max_pensionable_earnings - exemption) * rate / 100.0;
    ((gross_income - exemption) * rate / 100.0).min(cap)
}

/// Enhanced contribution on earnings between the first and second ceiling
pub fn second_tier_contribution(gross_income: f64, params: &ContributionParams) -> f64 {
    match params.second_tier {
        Some(tier) if gross_income > params.max_pensionable_earnings => {
            (gross_income.min(tier.ceiling) - params.max_pensionable_earnings) * tier.rate / 100.0
        }
        _ => 0.0,
    }
}

pub fn insurance_premium(gross_income: f64, rate: f64, max_insurable_earnings: f64) -> f64 {
    (gross_income * rate / 100.0).min(max_insurable_earnings * rate / 100.0)
}

/// Contributions owed in `jurisdiction`, using the alternate rate pair where it applies
pub fn compute_contributions(
    gross_income: f64,
    params: &ContributionParams,
    jurisdiction: Jurisdiction,
) -> Contributions {
    let rates = params.rates_for(jurisdiction);
    Contributions {
        pension: pension_contribution(gross_income, rates.pension.rate, params)
            + second_tier_contribution(gross_income, params),
        insurance: insurance_premium(gross_income, rates.insurance_rate, params.max_insurable_earnings),
    }
}

/// Contributions once every ceiling is reached
pub fn maximum_contributions(params: &ContributionParams, jurisdiction: Jurisdiction) -> Contributions {
    compute_contributions(f64::INFINITY, params, jurisdiction)
}
