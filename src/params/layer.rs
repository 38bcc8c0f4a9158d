//! Parameter table structures for the federal and regional layers
//!
//! Every constructor validates its input; once built a table is immutable and
//! the derived values (cumulative bracket tax) always agree with the thresholds.

use serde::Serialize;

use super::Jurisdiction;
use crate::error::{TaxError, TaxResult};

fn check_values(layer: &str, field: &str, values: &[f64]) -> TaxResult<()> {
    if let Some(bad) = values.iter().find(|v| !v.is_finite() || **v < 0.0) {
        return Err(TaxError::invalid_parameters(
            layer,
            format!("{field} contains invalid value {bad}"),
        ));
    }
    Ok(())
}

fn check_increasing(layer: &str, field: &str, values: &[f64]) -> TaxResult<()> {
    if values.windows(2).any(|w| w[1] <= w[0]) {
        return Err(TaxError::invalid_parameters(
            layer,
            format!("{field} must be strictly increasing"),
        ));
    }
    Ok(())
}

/// Progressive bracket schedule
///
/// Bracket `i` taxes income up to `thresholds[i]` at `rates[i]` percent; the last
/// bracket (`rates[n-1]`) is unbounded, so there is one fewer threshold than rate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BracketTable {
    thresholds: Vec<f64>,
    rates: Vec<f64>,
    /// Tax payable on income exactly at `thresholds[i]`
    cumulative: Vec<f64>,
}

/// The linear piece of a bracket schedule that contains a given income
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BracketSegment {
    /// Income where the segment starts (0 for the first bracket)
    pub floor: f64,
    /// Marginal rate in percent
    pub rate: f64,
    /// Tax payable on income up to `floor`
    pub base_tax: f64,
}

impl BracketSegment {
    pub fn tax(&self, taxable_income: f64) -> f64 {
        self.base_tax + self.rate * (taxable_income - self.floor) / 100.0
    }
}

impl BracketTable {
    pub fn new(layer: &str, thresholds: Vec<f64>, rates: Vec<f64>) -> TaxResult<Self> {
        if rates.is_empty() {
            return Err(TaxError::invalid_parameters(layer, "bracket table has no rates"));
        }
        if thresholds.len() + 1 != rates.len() {
            return Err(TaxError::invalid_parameters(
                layer,
                format!(
                    "expected {} bracket thresholds for {} rates, got {}",
                    rates.len() - 1,
                    rates.len(),
                    thresholds.len()
                ),
            ));
        }
        check_values(layer, "bracket rates", &rates)?;
        check_values(layer, "bracket thresholds", &thresholds)?;
        check_increasing(layer, "bracket thresholds", &thresholds)?;
        if thresholds.first().is_some_and(|t| *t <= 0.0) {
            return Err(TaxError::invalid_parameters(
                layer,
                "first bracket threshold must be positive",
            ));
        }

        let mut cumulative = Vec::with_capacity(thresholds.len());
        let mut previous = 0.0;
        let mut tax = 0.0;
        for (threshold, rate) in thresholds.iter().zip(&rates) {
            tax += (threshold - previous) * rate / 100.0;
            cumulative.push(tax);
            previous = *threshold;
        }

        Ok(Self {
            thresholds,
            rates,
            cumulative,
        })
    }

    pub fn thresholds(&self) -> &[f64] {
        &self.thresholds
    }

    pub fn rates(&self) -> &[f64] {
        &self.rates
    }

    pub fn cumulative(&self) -> &[f64] {
        &self.cumulative
    }

    /// Rate of the first bracket, used to turn exempt amounts into credits
    pub fn lowest_rate(&self) -> f64 {
        self.rates[0]
    }

    /// Second-to-last and last thresholds
    pub fn last_two_thresholds(&self) -> Option<(f64, f64)> {
        match self.thresholds.as_slice() {
            [.., penultimate, last] => Some((*penultimate, *last)),
            _ => None,
        }
    }

    /// Segment containing `taxable_income`: the bracket above the highest
    /// threshold strictly below it, or the first bracket when there is none.
    pub fn segment_for(&self, taxable_income: f64) -> BracketSegment {
        match self.thresholds.iter().rposition(|t| *t < taxable_income) {
            None => BracketSegment {
                floor: 0.0,
                rate: self.rates[0],
                base_tax: 0.0,
            },
            Some(i) => BracketSegment {
                floor: self.thresholds[i],
                rate: self.rates[i + 1],
                base_tax: self.cumulative[i],
            },
        }
    }

    /// Unbounded top segment
    pub fn top_segment(&self) -> BracketSegment {
        self.segment_for(f64::INFINITY)
    }

    /// Number of distinct segments
    pub fn len(&self) -> usize {
        self.rates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }
}

/// Basic personal exemption for a layer
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum BasicExemption {
    Flat(f64),
    /// Linear phase-out between two income thresholds at `rate` percent
    IncomePhaseOut {
        full: f64,
        lower: f64,
        upper: f64,
        rate: f64,
    },
    /// Linear phase-out of `reduction` between the layer's last two bracket thresholds
    BracketPhaseOut { full: f64, reduction: f64 },
}

impl BasicExemption {
    /// Build from the loader's column of 1, 2 or 4 values
    pub fn from_values(layer: &str, values: &[f64]) -> TaxResult<Self> {
        check_values(layer, "basic exemption", values)?;
        match *values {
            [amount] => Ok(BasicExemption::Flat(amount)),
            [full, reduction] => Ok(BasicExemption::BracketPhaseOut { full, reduction }),
            [full, lower, upper, rate] => {
                if upper <= lower {
                    return Err(TaxError::invalid_parameters(
                        layer,
                        "basic exemption phase-out upper threshold must exceed the lower one",
                    ));
                }
                Ok(BasicExemption::IncomePhaseOut {
                    full,
                    lower,
                    upper,
                    rate,
                })
            }
            _ => Err(TaxError::invalid_parameters(
                layer,
                format!("basic exemption must have 1, 2 or 4 values, got {}", values.len()),
            )),
        }
    }

    /// Exemption before any income tuning
    pub fn full_amount(&self) -> f64 {
        match *self {
            BasicExemption::Flat(amount) => amount,
            BasicExemption::IncomePhaseOut { full, .. } => full,
            BasicExemption::BracketPhaseOut { full, .. } => full,
        }
    }

    /// Exemption once fully phased out
    pub fn minimum_amount(&self) -> f64 {
        match *self {
            BasicExemption::Flat(amount) => amount,
            BasicExemption::IncomePhaseOut {
                full,
                lower,
                upper,
                rate,
            } => full - (upper - lower) * rate / 100.0,
            BasicExemption::BracketPhaseOut { full, reduction } => full - reduction,
        }
    }
}

/// Brackets and exemption shared by every layer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayerParams {
    pub brackets: BracketTable,
    pub basic_exemption: BasicExemption,
}

impl LayerParams {
    pub fn new(layer: &str, brackets: BracketTable, basic_exemption: BasicExemption) -> TaxResult<Self> {
        if let BasicExemption::BracketPhaseOut { .. } = basic_exemption {
            if brackets.last_two_thresholds().is_none() {
                return Err(TaxError::invalid_parameters(
                    layer,
                    "bracket-anchored exemption needs at least two bracket thresholds",
                ));
            }
        }
        if basic_exemption.minimum_amount() < 0.0 {
            return Err(TaxError::invalid_parameters(
                layer,
                "basic exemption phases out below zero",
            ));
        }
        Ok(Self {
            brackets,
            basic_exemption,
        })
    }

    /// Rate converting exempt amounts and contributions into a tax credit
    pub fn credit_rate(&self) -> f64 {
        self.brackets.lowest_rate()
    }
}

/// A pension contribution rate and the share of it that is treated as the
/// base (credit-eligible) contribution
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PensionRates {
    pub rate: f64,
    pub base_rate: f64,
}

impl PensionRates {
    /// Fraction of the pension contribution claimed as a credit; the rest is
    /// deducted from taxable income.
    pub fn base_ratio(&self) -> f64 {
        if self.rate > 0.0 {
            self.base_rate / self.rate
        } else {
            1.0
        }
    }
}

/// Enhanced pension contributions on earnings between the first and second ceiling
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SecondTier {
    pub ceiling: f64,
    pub rate: f64,
}

/// Pension and employment-insurance parameters (federal table)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContributionParams {
    pub pension: PensionRates,
    /// Rates for the jurisdiction that runs its own pension plan
    pub alternate_pension: Option<PensionRates>,
    pub pension_exemption: f64,
    pub max_pensionable_earnings: f64,
    pub second_tier: Option<SecondTier>,
    pub insurance_rate: f64,
    pub alternate_insurance_rate: Option<f64>,
    pub max_insurable_earnings: f64,
}

impl ContributionParams {
    pub fn validate(&self, layer: &str) -> TaxResult<()> {
        let mut values = vec![
            self.pension.rate,
            self.pension.base_rate,
            self.pension_exemption,
            self.max_pensionable_earnings,
            self.insurance_rate,
            self.max_insurable_earnings,
        ];
        if let Some(alt) = self.alternate_pension {
            values.extend([alt.rate, alt.base_rate]);
        }
        if let Some(tier) = self.second_tier {
            values.extend([tier.ceiling, tier.rate]);
            if tier.ceiling <= self.max_pensionable_earnings {
                return Err(TaxError::invalid_parameters(
                    layer,
                    "second pension ceiling must exceed max pensionable earnings",
                ));
            }
        }
        values.extend(self.alternate_insurance_rate);
        check_values(layer, "contribution parameters", &values)?;

        if self.max_pensionable_earnings <= self.pension_exemption {
            return Err(TaxError::invalid_parameters(
                layer,
                "max pensionable earnings must exceed the pension exemption",
            ));
        }
        if self.pension.rate + self.insurance_rate >= 100.0 {
            return Err(TaxError::invalid_parameters(
                layer,
                "combined contribution rates must be below 100%",
            ));
        }
        Ok(())
    }

    /// Pension and insurance rates that apply in `jurisdiction`
    pub fn rates_for(&self, jurisdiction: Jurisdiction) -> ContributionRates {
        if jurisdiction.uses_alternate_contributions() {
            ContributionRates {
                pension: self.alternate_pension.unwrap_or(self.pension),
                insurance_rate: self.alternate_insurance_rate.unwrap_or(self.insurance_rate),
            }
        } else {
            ContributionRates {
                pension: self.pension,
                insurance_rate: self.insurance_rate,
            }
        }
    }

    /// Pension base ratio used for a layer's credit: the alternate plan's ratio
    /// when the layer declares a federal abatement.
    pub fn base_ratio(&self, abatement: Option<f64>) -> f64 {
        match (abatement, self.alternate_pension) {
            (Some(_), Some(alt)) => alt.base_ratio(),
            _ => self.pension.base_ratio(),
        }
    }
}

/// Rate pair selected for a jurisdiction
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContributionRates {
    pub pension: PensionRates,
    pub insurance_rate: f64,
}

/// Federal layer parameters
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FederalParams {
    pub layer: LayerParams,
    pub employment_credit_amount: f64,
    pub contributions: ContributionParams,
}

impl FederalParams {
    pub fn new(
        layer: LayerParams,
        employment_credit_amount: f64,
        contributions: ContributionParams,
    ) -> TaxResult<Self> {
        check_values("Federal", "employment credit amount", &[employment_credit_amount])?;
        contributions.validate("Federal")?;
        Ok(Self {
            layer,
            employment_credit_amount,
            contributions,
        })
    }
}

/// Low-income regime that bypasses bracket computation below `threshold`
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PhaseOut {
    pub threshold: f64,
    pub rate: f64,
}

/// One surtax level: `rate` percent of the tax above `threshold`
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SurtaxLevel {
    pub threshold: f64,
    pub rate: f64,
}

/// Surtax levels in ascending threshold order (possibly none)
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SurtaxSchedule {
    levels: Vec<SurtaxLevel>,
}

impl SurtaxSchedule {
    pub fn new(layer: &str, thresholds: &[f64], rates: &[f64]) -> TaxResult<Self> {
        if thresholds.len() != rates.len() {
            return Err(TaxError::invalid_parameters(
                layer,
                "surtax thresholds and rates must have the same length",
            ));
        }
        check_values(layer, "surtax thresholds", thresholds)?;
        check_values(layer, "surtax rates", rates)?;
        check_increasing(layer, "surtax thresholds", thresholds)?;
        Ok(Self {
            levels: thresholds
                .iter()
                .zip(rates)
                .map(|(&threshold, &rate)| SurtaxLevel { threshold, rate })
                .collect(),
        })
    }

    pub fn levels(&self) -> &[SurtaxLevel] {
        &self.levels
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// `1 + Σ rate`, the multiplier on tax once every level applies
    pub fn combined_multiplier(&self) -> f64 {
        1.0 + self.levels.iter().map(|l| l.rate / 100.0).sum::<f64>()
    }

    /// `Σ threshold·rate`, the offset once every level applies
    pub fn combined_offset(&self) -> f64 {
        self.levels.iter().map(|l| l.threshold * l.rate / 100.0).sum()
    }
}

/// One row of the health premium schedule
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HealthPremiumRow {
    pub threshold: f64,
    pub floor: f64,
    pub rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthPremiumSchedule {
    rows: Vec<HealthPremiumRow>,
}

impl HealthPremiumSchedule {
    pub fn new(layer: &str, thresholds: &[f64], floors: &[f64], rates: &[f64]) -> TaxResult<Self> {
        if thresholds.is_empty() || thresholds.len() != floors.len() || floors.len() != rates.len() {
            return Err(TaxError::invalid_parameters(
                layer,
                "health premium thresholds, floors and rates must be non-empty and equal length",
            ));
        }
        check_values(layer, "health premium thresholds", thresholds)?;
        check_values(layer, "health premium floors", floors)?;
        check_values(layer, "health premium rates", rates)?;
        check_increasing(layer, "health premium thresholds", thresholds)?;
        Ok(Self {
            rows: thresholds
                .iter()
                .zip(floors)
                .zip(rates)
                .map(|((&threshold, &floor), &rate)| HealthPremiumRow {
                    threshold,
                    floor,
                    rate,
                })
                .collect(),
        })
    }

    pub fn rows(&self) -> &[HealthPremiumRow] {
        &self.rows
    }

    /// Premium once income exceeds the top threshold
    pub fn maximum(&self) -> f64 {
        self.rows.last().map(|r| r.floor).unwrap_or(0.0)
    }
}

/// Parental insurance premium parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ParentalInsurance {
    pub max_insurable_earnings: f64,
    pub rate: f64,
}

/// Features only some regions define
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RegionalFeatures {
    /// Proportional reduction of federal tax, in percent
    pub fed_abatement_rate: Option<f64>,
    pub phase_out: Option<PhaseOut>,
    pub surtax: SurtaxSchedule,
    pub health_premium: Option<HealthPremiumSchedule>,
    pub parental_insurance: Option<ParentalInsurance>,
}

/// Regional layer parameters
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegionalParams {
    pub jurisdiction: Jurisdiction,
    pub layer: LayerParams,
    pub features: RegionalFeatures,
}

impl RegionalParams {
    pub fn new(jurisdiction: Jurisdiction, layer: LayerParams, features: RegionalFeatures) -> TaxResult<Self> {
        let name = jurisdiction.code();
        if let Some(rate) = features.fed_abatement_rate {
            check_values(name, "federal abatement", &[rate])?;
            if rate >= 100.0 {
                return Err(TaxError::invalid_parameters(name, "federal abatement must be below 100%"));
            }
        }
        if let Some(phase_out) = features.phase_out {
            check_values(name, "phase-out", &[phase_out.threshold, phase_out.rate])?;
        }
        if let Some(parental) = features.parental_insurance {
            check_values(
                name,
                "parental insurance",
                &[parental.max_insurable_earnings, parental.rate],
            )?;
        }
        Ok(Self {
            jurisdiction,
            layer,
            features,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn table() -> BracketTable {
        BracketTable::new("test", vec![50_000.0, 100_000.0], vec![10.0, 20.0, 30.0]).unwrap()
    }

    #[test]
    fn test_cumulative_is_recomputed() {
        let t = table();
        assert_relative_eq!(t.cumulative()[0], 5_000.0);
        assert_relative_eq!(t.cumulative()[1], 15_000.0);
    }

    #[test]
    fn test_segment_lookup() {
        let t = table();
        assert_eq!(t.segment_for(20_000.0).floor, 0.0);
        // Income exactly at a threshold stays in the lower bracket
        assert_eq!(t.segment_for(50_000.0).rate, 10.0);
        assert_eq!(t.segment_for(50_001.0).rate, 20.0);
        let top = t.top_segment();
        assert_eq!(top.floor, 100_000.0);
        assert_eq!(top.rate, 30.0);
        assert_relative_eq!(top.tax(110_000.0), 18_000.0);
    }

    #[test]
    fn test_rejects_malformed_tables() {
        assert!(BracketTable::new("t", vec![10.0, 5.0], vec![1.0, 2.0, 3.0]).is_err());
        assert!(BracketTable::new("t", vec![10.0], vec![1.0]).is_err());
        assert!(BracketTable::new("t", vec![], vec![]).is_err());
        assert!(BracketTable::new("t", vec![f64::NAN], vec![1.0, 2.0]).is_err());
        assert!(BracketTable::new("t", vec![], vec![15.0]).is_ok());
    }

    #[test]
    fn test_exemption_shapes() {
        assert_eq!(
            BasicExemption::from_values("t", &[12_000.0]).unwrap(),
            BasicExemption::Flat(12_000.0)
        );
        let income = BasicExemption::from_values("t", &[11_481.0, 25_000.0, 75_000.0, 6.0]).unwrap();
        assert_relative_eq!(income.minimum_amount(), 8_481.0);
        let bracket = BasicExemption::from_values("t", &[15_705.0, 1_549.0]).unwrap();
        assert_relative_eq!(bracket.minimum_amount(), 14_156.0);
        assert!(BasicExemption::from_values("t", &[1.0, 2.0, 3.0]).is_err());
        assert!(BasicExemption::from_values("t", &[]).is_err());
    }

    #[test]
    fn test_bracket_exemption_needs_two_thresholds() {
        let flat = BracketTable::new("t", vec![50_000.0], vec![10.0, 20.0]).unwrap();
        let exemption = BasicExemption::BracketPhaseOut {
            full: 15_000.0,
            reduction: 1_000.0,
        };
        assert!(LayerParams::new("t", flat, exemption).is_err());
        assert!(LayerParams::new("t", table(), exemption).is_ok());
    }

    #[test]
    fn test_surtax_aggregates() {
        let s = SurtaxSchedule::new("ON", &[5_554.0, 7_108.0], &[20.0, 36.0]).unwrap();
        assert_relative_eq!(s.combined_multiplier(), 1.56);
        assert_relative_eq!(s.combined_offset(), 5_554.0 * 0.2 + 7_108.0 * 0.36);
        assert!(SurtaxSchedule::new("ON", &[5_554.0], &[20.0, 36.0]).is_err());
        assert!(SurtaxSchedule::default().is_empty());
    }

    #[test]
    fn test_base_ratio_selection() {
        let params = ContributionParams {
            pension: PensionRates { rate: 5.95, base_rate: 4.95 },
            alternate_pension: Some(PensionRates { rate: 6.4, base_rate: 5.4 }),
            pension_exemption: 3_500.0,
            max_pensionable_earnings: 68_500.0,
            second_tier: None,
            insurance_rate: 1.66,
            alternate_insurance_rate: Some(1.32),
            max_insurable_earnings: 63_200.0,
        };
        assert_relative_eq!(params.base_ratio(None), 4.95 / 5.95);
        assert_relative_eq!(params.base_ratio(Some(16.5)), 5.4 / 6.4);
        assert_eq!(params.rates_for(Jurisdiction::QC).insurance_rate, 1.32);
        assert_eq!(params.rates_for(Jurisdiction::ON).pension.rate, 5.95);
    }
}
