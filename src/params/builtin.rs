//! Built-in 2024 parameter tables
//!
//! Rates are in percent. Thresholds are the upper bounds of each bracket, so every
//! bracket list has one fewer threshold than rates.

use super::{
    BasicExemption, BracketTable, ContributionParams, FederalParams, HealthPremiumSchedule,
    Jurisdiction, LayerParams, ParentalInsurance, PensionRates, PhaseOut, RegionalFeatures,
    RegionalParams, SecondTier, SurtaxSchedule, YearTables,
};
use crate::error::TaxResult;

fn layer(name: &str, thresholds: &[f64], rates: &[f64], exemption: BasicExemption) -> TaxResult<LayerParams> {
    let brackets = BracketTable::new(name, thresholds.to_vec(), rates.to_vec())?;
    LayerParams::new(name, brackets, exemption)
}

fn region(
    jurisdiction: Jurisdiction,
    thresholds: &[f64],
    rates: &[f64],
    exemption: BasicExemption,
    features: RegionalFeatures,
) -> TaxResult<RegionalParams> {
    let layer = layer(jurisdiction.code(), thresholds, rates, exemption)?;
    RegionalParams::new(jurisdiction, layer, features)
}

fn flat(jurisdiction: Jurisdiction, thresholds: &[f64], rates: &[f64], exemption: f64) -> TaxResult<RegionalParams> {
    region(
        jurisdiction,
        thresholds,
        rates,
        BasicExemption::Flat(exemption),
        RegionalFeatures::default(),
    )
}

pub fn federal_2024() -> TaxResult<FederalParams> {
    let layer = layer(
        "Federal",
        &[55_867.0, 111_733.0, 173_205.0, 246_752.0],
        &[15.0, 20.5, 26.0, 29.0, 33.0],
        BasicExemption::BracketPhaseOut {
            full: 15_705.0,
            reduction: 1_549.0,
        },
    )?;

    let contributions = ContributionParams {
        pension: PensionRates { rate: 5.95, base_rate: 4.95 },
        alternate_pension: Some(PensionRates { rate: 6.4, base_rate: 5.4 }),
        pension_exemption: 3_500.0,
        max_pensionable_earnings: 68_500.0,
        second_tier: Some(SecondTier {
            ceiling: 73_200.0,
            rate: 4.0,
        }),
        insurance_rate: 1.66,
        alternate_insurance_rate: Some(1.32),
        max_insurable_earnings: 63_200.0,
    };

    FederalParams::new(layer, 1_433.0, contributions)
}

pub fn regions_2024() -> TaxResult<Vec<RegionalParams>> {
    use Jurisdiction::*;

    Ok(vec![
        flat(
            AB,
            &[148_269.0, 177_922.0, 237_230.0, 355_845.0],
            &[10.0, 12.0, 13.0, 14.0, 15.0],
            21_885.0,
        )?,
        flat(
            BC,
            &[47_937.0, 95_875.0, 110_076.0, 133_664.0, 181_232.0, 252_752.0],
            &[5.06, 7.7, 10.5, 12.29, 14.7, 16.8, 20.5],
            12_580.0,
        )?,
        flat(MB, &[47_000.0, 100_000.0], &[10.8, 12.75, 17.4], 15_780.0)?,
        region(
            NB,
            &[49_958.0, 99_916.0, 185_064.0],
            &[9.4, 14.0, 16.0, 19.5],
            BasicExemption::Flat(13_044.0),
            RegionalFeatures {
                phase_out: Some(PhaseOut {
                    threshold: 22_358.0,
                    rate: 3.0,
                }),
                ..Default::default()
            },
        )?,
        flat(
            NL,
            &[43_198.0, 86_395.0, 154_244.0, 215_943.0, 275_870.0, 551_739.0, 1_103_478.0],
            &[8.7, 14.5, 15.8, 17.8, 19.8, 20.8, 21.3, 21.8],
            10_818.0,
        )?,
        region(
            NS,
            &[29_590.0, 59_180.0, 93_000.0, 150_000.0],
            &[8.79, 14.95, 16.67, 17.5, 21.0],
            BasicExemption::IncomePhaseOut {
                full: 11_481.0,
                lower: 25_000.0,
                upper: 75_000.0,
                rate: 6.0,
            },
            RegionalFeatures::default(),
        )?,
        flat(
            NT,
            &[50_597.0, 101_198.0, 164_525.0],
            &[5.9, 8.6, 12.2, 14.05],
            17_373.0,
        )?,
        flat(
            NU,
            &[53_268.0, 106_537.0, 173_205.0],
            &[4.0, 7.0, 9.0, 11.5],
            18_767.0,
        )?,
        region(
            ON,
            &[51_446.0, 102_894.0, 150_000.0, 220_000.0],
            &[5.05, 9.15, 11.16, 12.16, 13.16],
            BasicExemption::Flat(12_399.0),
            RegionalFeatures {
                surtax: SurtaxSchedule::new("ON", &[5_554.0, 7_108.0], &[20.0, 36.0])?,
                health_premium: Some(HealthPremiumSchedule::new(
                    "ON",
                    &[
                        20_000.0, 25_000.0, 36_000.0, 38_500.0, 48_000.0, 48_600.0, 72_000.0,
                        72_600.0, 200_000.0, 200_600.0,
                    ],
                    &[0.0, 300.0, 300.0, 450.0, 450.0, 600.0, 600.0, 750.0, 750.0, 900.0],
                    &[0.0, 6.0, 0.0, 6.0, 0.0, 25.0, 0.0, 25.0, 0.0, 25.0],
                )?),
                ..Default::default()
            },
        )?,
        flat(
            PE,
            &[32_656.0, 64_313.0, 105_000.0, 140_000.0],
            &[9.65, 13.63, 16.65, 18.0, 18.75],
            13_500.0,
        )?,
        region(
            QC,
            &[51_780.0, 103_545.0, 126_000.0],
            &[14.0, 19.0, 24.0, 25.75],
            BasicExemption::Flat(18_056.0),
            RegionalFeatures {
                fed_abatement_rate: Some(16.5),
                parental_insurance: Some(ParentalInsurance {
                    max_insurable_earnings: 94_000.0,
                    rate: 0.494,
                }),
                ..Default::default()
            },
        )?,
        flat(SK, &[52_057.0, 148_734.0], &[10.5, 12.5, 14.5], 18_491.0)?,
        region(
            YT,
            &[55_867.0, 111_733.0, 173_205.0, 500_000.0],
            &[6.4, 9.0, 10.9, 12.8, 15.0],
            BasicExemption::BracketPhaseOut {
                full: 15_705.0,
                reduction: 1_549.0,
            },
            RegionalFeatures::default(),
        )?,
    ])
}

pub fn tables_2024() -> TaxResult<YearTables> {
    YearTables::new(2024, federal_2024()?, regions_2024()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_federal_cumulative_brackets() {
        let federal = federal_2024().unwrap();
        let cumulative = federal.layer.brackets.cumulative();
        assert_relative_eq!(cumulative[0], 8_380.05, epsilon = 1e-6);
        assert_relative_eq!(cumulative[1], 8_380.05 + 55_866.0 * 0.205, epsilon = 1e-6);
        assert_eq!(cumulative.len(), 4);
    }

    #[test]
    fn test_regional_features_are_where_expected() {
        let tables = tables_2024().unwrap();
        for j in Jurisdiction::ALL {
            let features = &tables.region(j).unwrap().features;
            assert_eq!(features.fed_abatement_rate.is_some(), j == Jurisdiction::QC);
            assert_eq!(features.parental_insurance.is_some(), j == Jurisdiction::QC);
            assert_eq!(features.health_premium.is_some(), j == Jurisdiction::ON);
            assert_eq!(!features.surtax.is_empty(), j == Jurisdiction::ON);
            assert_eq!(features.phase_out.is_some(), j == Jurisdiction::NB);
        }
    }
}
