//! Itemized result of a forward computation

use serde::Serialize;

use super::contributions::Contributions;
use crate::params::Jurisdiction;

/// Regional tax and the surcharges folded into it
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct RegionalTax {
    /// Total regional amount, including surtax and premiums, net of credits
    pub tax: f64,
    pub surtax: f64,
    pub health_premium: f64,
    pub parental_premium: f64,
}

/// Deductions and net income for one gross income
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComputationResult {
    pub jurisdiction: Jurisdiction,
    pub year: u32,
    pub gross_income: f64,
    pub pension: f64,
    pub insurance: f64,
    pub federal_tax: f64,
    /// Includes surtax and premiums
    pub regional_tax: f64,
    pub surtax: f64,
    pub health_premium: f64,
    pub parental_premium: f64,
    pub total_deduction: f64,
    /// Rounded to the nearest whole unit
    pub net_income: f64,
}

impl ComputationResult {
    pub fn new(
        jurisdiction: Jurisdiction,
        year: u32,
        gross_income: f64,
        contributions: Contributions,
        federal_tax: f64,
        regional: RegionalTax,
    ) -> Self {
        let total_deduction = contributions.pension + contributions.insurance + federal_tax + regional.tax;
        Self {
            jurisdiction,
            year,
            gross_income,
            pension: contributions.pension,
            insurance: contributions.insurance,
            federal_tax,
            regional_tax: regional.tax,
            surtax: regional.surtax,
            health_premium: regional.health_premium,
            parental_premium: regional.parental_premium,
            total_deduction,
            net_income: (gross_income - total_deduction).round(),
        }
    }
}
