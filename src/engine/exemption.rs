//! Income-tuned basic exemption

use crate::params::{BasicExemption, LayerParams};

/// Basic exemption a layer grants at `gross_income`
pub fn tune_exemption(gross_income: f64, layer: &LayerParams) -> f64 {
    match layer.basic_exemption {
        BasicExemption::Flat(amount) => amount,
        BasicExemption::IncomePhaseOut {
            full,
            lower,
            upper,
            rate,
        } => {
            if gross_income <= lower {
                full
            } else if gross_income < upper {
                full - (gross_income - lower) * rate / 100.0
            } else {
                full - (upper - lower) * rate / 100.0
            }
        }
        BasicExemption::BracketPhaseOut { full, reduction } => {
            // LayerParams::new guarantees two thresholds for this shape
            let Some((penultimate, last)) = layer.brackets.last_two_thresholds() else {
                return full;
            };
            if gross_income <= penultimate {
                full
            } else if gross_income < last {
                full - (gross_income - penultimate) / (last - penultimate) * reduction
            } else {
                full - reduction
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::BracketTable;
    use approx::assert_relative_eq;

    fn layer(exemption: BasicExemption) -> LayerParams {
        let brackets = BracketTable::new(
            "test",
            vec![55_867.0, 111_733.0, 173_205.0, 246_752.0],
            vec![15.0, 20.5, 26.0, 29.0, 33.0],
        )
        .unwrap();
        LayerParams::new("test", brackets, exemption).unwrap()
    }

    #[test]
    fn test_flat() {
        assert_eq!(tune_exemption(1e6, &layer(BasicExemption::Flat(12_399.0))), 12_399.0);
    }

    #[test]
    fn test_income_phase_out() {
        let l = layer(BasicExemption::IncomePhaseOut {
            full: 11_481.0,
            lower: 25_000.0,
            upper: 75_000.0,
            rate: 6.0,
        });
        assert_eq!(tune_exemption(25_000.0, &l), 11_481.0);
        assert_relative_eq!(tune_exemption(50_000.0, &l), 11_481.0 - 1_500.0);
        assert_relative_eq!(tune_exemption(75_000.0, &l), 8_481.0);
        assert_relative_eq!(tune_exemption(500_000.0, &l), 8_481.0);
    }

    #[test]
    fn test_bracket_phase_out() {
        let l = layer(BasicExemption::BracketPhaseOut {
            full: 15_705.0,
            reduction: 1_549.0,
        });
        assert_eq!(tune_exemption(173_205.0, &l), 15_705.0);
        let midpoint = (173_205.0 + 246_752.0) / 2.0;
        assert_relative_eq!(tune_exemption(midpoint, &l), 15_705.0 - 774.5, epsilon = 1e-9);
        assert_relative_eq!(tune_exemption(246_752.0, &l), 14_156.0);
    }

    #[test]
    fn test_non_increasing_in_income() {
        let l = layer(BasicExemption::BracketPhaseOut {
            full: 15_705.0,
            reduction: 1_549.0,
        });
        let mut previous = f64::INFINITY;
        for step in 0..60 {
            let value = tune_exemption(step as f64 * 5_000.0, &l);
            assert!(value <= previous);
            previous = value;
        }
    }
}
