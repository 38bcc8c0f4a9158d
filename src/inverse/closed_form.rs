//! Closed-form inversions for the low and high income regimes

use log::warn;

use crate::engine::{compute_contributions, compute_credit, surcharges, taxable_income, tune_exemption};
use crate::error::{TaxError, TaxResult};
use crate::params::{BracketSegment, Jurisdiction, YearTables};

/// Gross income for a net income below the basic exemptions, where only
/// contributions (and any parental premium) are withheld
pub fn gross_for_low_net(net_income: f64, tables: &YearTables, jurisdiction: Jurisdiction) -> TaxResult<f64> {
    let params = &tables.federal().contributions;
    let region = tables.region(jurisdiction)?;
    let rates = params.rates_for(jurisdiction);
    let pension_rate = rates.pension.rate / 100.0;
    let insurance_rate = rates.insurance_rate / 100.0;
    let exemption = params.pension_exemption;

    let above_exemption = |net: f64| (net - exemption * pension_rate) / (1.0 - pension_rate - insurance_rate);

    // Gross is close to net, so net picks the branch; re-solve if gross crosses the exemption
    let mut gross = if net_income > exemption {
        above_exemption(net_income)
    } else {
        let gross = net_income / (1.0 - insurance_rate);
        if gross > exemption {
            above_exemption(net_income)
        } else {
            gross
        }
    };

    if let Some(parental) = region.features.parental_insurance {
        gross += surcharges::parental_premium(&parental, gross);
    }

    Ok(gross.max(net_income))
}

/// Every non-linear term of the forward computation, frozen at one gross estimate.
/// Around that estimate net income is linear in gross.
#[derive(Debug, Clone, Copy)]
struct Anchor {
    pension: f64,
    insurance: f64,
    federal_credit: f64,
    regional_credit: f64,
    /// Pension share deducted from taxable income
    federal_deduction: f64,
    regional_deduction: f64,
    federal_segment: BracketSegment,
    regional_segment: BracketSegment,
    abatement_factor: f64,
    surtax_multiplier: f64,
    surtax_offset: f64,
    health_premium: f64,
    parental_premium: f64,
}

impl Anchor {
    fn at(gross: f64, tables: &YearTables, jurisdiction: Jurisdiction) -> TaxResult<Self> {
        let federal = tables.federal();
        let region = tables.region(jurisdiction)?;
        let features = &region.features;
        let contributions = compute_contributions(gross, &federal.contributions, jurisdiction);

        let federal_credit = compute_credit(
            &federal.layer,
            None,
            &federal.contributions,
            contributions.insurance,
            tune_exemption(gross, &federal.layer),
            contributions.pension,
        );
        let regional_credit = compute_credit(
            &region.layer,
            features.fed_abatement_rate,
            &federal.contributions,
            contributions.insurance,
            tune_exemption(gross, &region.layer),
            contributions.pension,
        );

        let federal_taxable = taxable_income(gross, contributions.pension, federal_credit.pension_base_ratio);
        let regional_taxable = taxable_income(gross, contributions.pension, regional_credit.pension_base_ratio);
        let regional_segment = region.layer.brackets.segment_for(regional_taxable);

        let basic_tax = regional_segment.tax(regional_taxable);
        let (surtax_multiplier, surtax_offset) = features
            .surtax
            .levels()
            .iter()
            .filter(|level| gross.is_infinite() || basic_tax > level.threshold)
            .fold((1.0, 0.0), |(b, c), level| {
                (b + level.rate / 100.0, c + level.threshold * level.rate / 100.0)
            });

        Ok(Self {
            pension: contributions.pension,
            insurance: contributions.insurance,
            federal_credit: federal_credit.amount
                + federal.employment_credit_amount * federal.layer.credit_rate() / 100.0,
            regional_credit: regional_credit.amount,
            federal_deduction: (1.0 - federal_credit.pension_base_ratio) * contributions.pension,
            regional_deduction: (1.0 - regional_credit.pension_base_ratio) * contributions.pension,
            federal_segment: federal.layer.brackets.segment_for(federal_taxable),
            regional_segment,
            abatement_factor: 1.0 - features.fed_abatement_rate.unwrap_or(0.0) / 100.0,
            surtax_multiplier,
            surtax_offset,
            health_premium: features
                .health_premium
                .as_ref()
                .map(|schedule| surcharges::health_premium(schedule, regional_taxable))
                .unwrap_or(0.0),
            parental_premium: features
                .parental_insurance
                .map(|params| surcharges::parental_premium(&params, gross))
                .unwrap_or(0.0),
        })
    }

    /// Solve the linearised net equation for gross
    fn solve(&self, net_income: f64, tables: &YearTables, jurisdiction: Jurisdiction) -> TaxResult<f64> {
        let f = self.abatement_factor;
        let b = self.surtax_multiplier;
        let fed = self.federal_segment;
        let prov = self.regional_segment;
        let fed_rate = fed.rate / 100.0;
        let prov_rate = prov.rate / 100.0;

        let denominator = 1.0 - fed_rate * f - b * prov_rate;
        if denominator <= 1e-9 {
            return Err(TaxError::NumericalDegeneracy {
                jurisdiction,
                year: tables.year(),
                denominator,
            });
        }

        let a = self.pension + self.insurance - f * self.federal_credit - self.regional_credit
            + f * fed.base_tax
            - f * fed_rate * self.federal_deduction
            - b * prov_rate * self.regional_deduction;

        let numerator = net_income + a + b * prov.base_tax
            - fed.floor * fed_rate * f
            - b * prov.floor * prov_rate
            - self.surtax_offset
            + self.health_premium
            + self.parental_premium;

        Ok(numerator / denominator)
    }
}

/// Gross income for a net income above every threshold that shapes the tax,
/// solved in closed form on the top brackets
///
/// If the solution lands below a top bracket the affected terms are re-anchored
/// at the new estimate and the equation solved again.
pub fn gross_for_high_net(net_income: f64, tables: &YearTables, jurisdiction: Jurisdiction) -> TaxResult<f64> {
    let region = tables.region(jurisdiction)?;
    let max_iterations = tables.federal().layer.brackets.len()
        + region.layer.brackets.len()
        + region.features.surtax.levels().len()
        + 2;
    let tolerance = 1e-6;

    let mut estimate = f64::INFINITY;
    for _ in 0..max_iterations {
        let gross = Anchor::at(estimate, tables, jurisdiction)?.solve(net_income, tables, jurisdiction)?;
        if (gross - estimate).abs() < tolerance {
            return Ok(gross);
        }
        estimate = gross;
    }

    warn!(
        "High-income inversion for {} {} did not settle on a bracket after {} iterations",
        jurisdiction,
        tables.year(),
        max_iterations
    );
    Ok(estimate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::compute_net;
    use crate::params::builtin;
    use approx::assert_relative_eq;

    fn tables() -> YearTables {
        builtin::tables_2024().unwrap()
    }

    #[test]
    fn test_low_net_inverts_contributions() {
        let t = tables();
        let gross = gross_for_low_net(9_447.25, &t, Jurisdiction::ON).unwrap();
        assert_relative_eq!(gross, 10_000.0, epsilon = 1e-6);
    }

    #[test]
    fn test_low_net_below_pension_exemption() {
        let gross = gross_for_low_net(2_000.0, &tables(), Jurisdiction::ON).unwrap();
        assert_relative_eq!(gross, 2_000.0 / (1.0 - 0.0166), epsilon = 1e-9);
    }

    #[test]
    fn test_low_net_is_never_below_net() {
        let t = tables();
        for j in Jurisdiction::ALL {
            for net in [1.0, 500.0, 3_400.0, 10_000.0] {
                assert!(gross_for_low_net(net, &t, j).unwrap() >= net);
            }
        }
    }

    #[test]
    fn test_high_net_round_trip_every_jurisdiction() {
        let t = tables();
        for j in Jurisdiction::ALL {
            for net in [500_000.0, 750_000.0, 2_000_000.0] {
                let gross = gross_for_high_net(net, &t, j).unwrap();
                let forward = compute_net(gross, &t, j).unwrap();
                assert!(
                    (forward.net_income - net).abs() <= 1.0,
                    "{j} net {net}: gross {gross} gives {}",
                    forward.net_income
                );
            }
        }
    }

    #[test]
    fn test_high_net_reselects_segment() {
        let t = tables();
        // Solution sits below the top regional bracket (threshold 1,103,478)
        let gross = gross_for_high_net(450_000.0, &t, Jurisdiction::NL).unwrap();
        assert!(gross < 1_103_478.0);
        let forward = compute_net(gross, &t, Jurisdiction::NL).unwrap();
        assert!((forward.net_income - 450_000.0).abs() <= 1.0);
    }

    #[test]
    fn test_degenerate_denominator() {
        let t = tables();
        let federal = t.federal().clone();
        let mut region = t.region(Jurisdiction::AB).unwrap().clone();
        let brackets = crate::params::BracketTable::new("AB", vec![100_000.0], vec![10.0, 80.0]).unwrap();
        region.layer = crate::params::LayerParams::new("AB", brackets, region.layer.basic_exemption).unwrap();
        let broken = YearTables::new(2024, federal, vec![region]).unwrap();
        assert!(matches!(
            gross_for_high_net(600_000.0, &broken, Jurisdiction::AB),
            Err(TaxError::NumericalDegeneracy { .. })
        ));
    }
}
