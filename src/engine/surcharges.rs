//! Regional surtax, health premium and parental insurance premium

use crate::params::{HealthPremiumSchedule, ParentalInsurance, SurtaxSchedule};

/// Surtax on the basic regional tax, before credits
///
/// Each level charges its rate on the tax above its threshold. Nothing is due
/// until the tax exceeds the first threshold.
pub fn surtax(schedule: &SurtaxSchedule, basic_tax: f64) -> f64 {
    match schedule.levels().first() {
        Some(first) if basic_tax > first.threshold => schedule
            .levels()
            .iter()
            .map(|level| (basic_tax - level.threshold).max(0.0) * level.rate / 100.0)
            .sum(),
        _ => 0.0,
    }
}

/// Health premium on taxable income
pub fn health_premium(schedule: &HealthPremiumSchedule, taxable_income: f64) -> f64 {
    let rows = schedule.rows();
    let Some(matched) = rows.iter().rposition(|row| row.threshold < taxable_income) else {
        return 0.0;
    };
    match rows.get(matched + 1) {
        None => rows[matched].floor,
        Some(next) => {
            let premium =
                rows[matched].floor + next.rate * (taxable_income - rows[matched].threshold) / 100.0;
            premium.min(next.floor)
        }
    }
}

/// Parental insurance premium on gross income, capped at the maximum insurable earnings
pub fn parental_premium(params: &ParentalInsurance, gross_income: f64) -> f64 {
    gross_income.min(params.max_insurable_earnings) * params.rate / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::builtin;
    use crate::params::Jurisdiction;
    use approx::assert_relative_eq;

    fn ontario() -> (SurtaxSchedule, HealthPremiumSchedule) {
        let tables = builtin::tables_2024().unwrap();
        let features = tables.region(Jurisdiction::ON).unwrap().features.clone();
        (features.surtax, features.health_premium.unwrap())
    }

    #[test]
    fn test_surtax_levels() {
        let (schedule, _) = ontario();
        assert_eq!(surtax(&schedule, 5_000.0), 0.0);
        assert_relative_eq!(surtax(&schedule, 6_000.0), 446.0 * 0.2, epsilon = 1e-9);
        assert_relative_eq!(
            surtax(&schedule, 10_000.0),
            4_446.0 * 0.2 + 2_892.0 * 0.36,
            epsilon = 1e-9
        );
        assert_eq!(surtax(&SurtaxSchedule::default(), 1e6), 0.0);
    }

    #[test]
    fn test_health_premium_rows() {
        let (_, schedule) = ontario();
        assert_eq!(health_premium(&schedule, 15_000.0), 0.0);
        assert_eq!(health_premium(&schedule, 20_000.0), 0.0);
        assert_relative_eq!(health_premium(&schedule, 22_000.0), 120.0, epsilon = 1e-9);
        assert_eq!(health_premium(&schedule, 30_000.0), 300.0);
        assert_relative_eq!(health_premium(&schedule, 48_300.0), 525.0, epsilon = 1e-9);
        assert_eq!(health_premium(&schedule, 100_000.0), 750.0);
        assert_eq!(health_premium(&schedule, 1e6), 900.0);
        assert_eq!(schedule.maximum(), 900.0);
    }

    #[test]
    fn test_health_premium_is_non_decreasing() {
        let (_, schedule) = ontario();
        let mut previous = 0.0;
        for step in 0..500 {
            let value = health_premium(&schedule, step as f64 * 500.0);
            assert!(value >= previous, "premium fell at {}", step * 500);
            previous = value;
        }
    }

    #[test]
    fn test_parental_premium_cap() {
        let params = ParentalInsurance {
            max_insurable_earnings: 94_000.0,
            rate: 0.494,
        };
        assert_relative_eq!(parental_premium(&params, 50_000.0), 247.0, epsilon = 1e-9);
        assert_relative_eq!(parental_premium(&params, 200_000.0), 464.36, epsilon = 1e-9);
    }
}
