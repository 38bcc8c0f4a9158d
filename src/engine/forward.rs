//! Forward computation: gross income to deductions and net income

use super::brackets::{bracket_tax, taxable_income};
use super::contributions::{compute_contributions, Contributions};
use super::credit::compute_credit;
use super::exemption::tune_exemption;
use super::result::{ComputationResult, RegionalTax};
use super::surcharges::{health_premium, parental_premium, surtax};
use crate::error::{validate_income, TaxResult};
use crate::params::{ContributionParams, FederalParams, Jurisdiction, RegionalParams, YearTables};

/// Federal tax after credits and any regional abatement
pub fn federal_tax(
    gross_income: f64,
    federal: &FederalParams,
    region: &RegionalParams,
    contributions: &Contributions,
) -> f64 {
    let layer = &federal.layer;
    let exempt = tune_exemption(gross_income, layer);
    let credit = compute_credit(
        layer,
        None,
        &federal.contributions,
        contributions.insurance,
        exempt,
        contributions.pension,
    );
    let credit_amount = credit.amount + federal.employment_credit_amount * layer.credit_rate() / 100.0;

    let taxable = taxable_income(gross_income, contributions.pension, credit.pension_base_ratio);
    if taxable <= exempt {
        return 0.0;
    }

    let tax = (bracket_tax(taxable, &layer.brackets) - credit_amount).max(0.0);
    match region.features.fed_abatement_rate {
        Some(abatement) => tax * (1.0 - abatement / 100.0),
        None => tax,
    }
}

/// Regional tax with surtax and premiums, net of the regional credit
pub fn regional_tax(
    gross_income: f64,
    contribution_params: &ContributionParams,
    region: &RegionalParams,
    contributions: &Contributions,
) -> RegionalTax {
    let layer = &region.layer;
    let features = &region.features;
    let exempt = tune_exemption(gross_income, layer);
    let credit = compute_credit(
        layer,
        features.fed_abatement_rate,
        contribution_params,
        contributions.insurance,
        exempt,
        contributions.pension,
    );
    let taxable = taxable_income(gross_income, contributions.pension, credit.pension_base_ratio);
    if taxable <= exempt {
        return RegionalTax::default();
    }

    if let Some(phase_out) = features.phase_out {
        if taxable < phase_out.threshold {
            let relief = layer.brackets.lowest_rate() * phase_out.rate / 100.0;
            return RegionalTax {
                tax: (-relief * (taxable - exempt) / 100.0).max(0.0),
                ..Default::default()
            };
        }
    }

    let parental = features
        .parental_insurance
        .map(|params| parental_premium(&params, gross_income))
        .unwrap_or(0.0);
    let basic = bracket_tax(taxable, &layer.brackets);
    let surtax = surtax(&features.surtax, basic);
    let health = features
        .health_premium
        .as_ref()
        .map(|schedule| health_premium(schedule, taxable))
        .unwrap_or(0.0);

    RegionalTax {
        tax: (basic + surtax + health + parental - credit.amount).max(0.0),
        surtax,
        health_premium: health,
        parental_premium: parental,
    }
}

/// Deductions and net income for `gross_income` in `jurisdiction`
pub fn compute_net(gross_income: f64, tables: &YearTables, jurisdiction: Jurisdiction) -> TaxResult<ComputationResult> {
    let gross_income = validate_income(gross_income)?;
    let federal = tables.federal();
    let region = tables.region(jurisdiction)?;

    let contributions = compute_contributions(gross_income, &federal.contributions, jurisdiction);
    let federal_tax = federal_tax(gross_income, federal, region, &contributions);
    let regional = regional_tax(gross_income, &federal.contributions, region, &contributions);

    Ok(ComputationResult::new(
        jurisdiction,
        tables.year(),
        gross_income,
        contributions,
        federal_tax,
        regional,
    ))
}
