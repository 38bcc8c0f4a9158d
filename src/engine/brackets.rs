//! Progressive bracket tax

use crate::params::BracketTable;

/// Tax on `taxable_income` under a bracket schedule
pub fn bracket_tax(taxable_income: f64, table: &BracketTable) -> f64 {
    table.segment_for(taxable_income).tax(taxable_income)
}

/// Income subject to a layer's brackets: gross less the non-base share of the
/// pension contribution, or zero when the contribution exceeds gross
pub fn taxable_income(gross_income: f64, pension: f64, base_ratio: f64) -> f64 {
    if gross_income > pension {
        gross_income - (1.0 - base_ratio) * pension
    } else {
        0.0
    }
}
