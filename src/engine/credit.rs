//! Non-refundable credits converted at the layer's lowest rate

use crate::params::{ContributionParams, LayerParams};

/// Credit for one layer and the pension base ratio that produced it
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Credit {
    pub amount: f64,
    pub pension_base_ratio: f64,
}

/// Credit on insurance, the base share of the pension contribution and the
/// tuned exemption. The alternate pension ratio applies when `abatement` is set.
pub fn compute_credit(
    layer: &LayerParams,
    abatement: Option<f64>,
    contributions: &ContributionParams,
    insurance: f64,
    exempt: f64,
    pension: f64,
) -> Credit {
    let ratio = contributions.base_ratio(abatement);
    Credit {
        amount: (insurance + ratio * pension + exempt) * layer.credit_rate() / 100.0,
        pension_base_ratio: ratio,
    }
}
