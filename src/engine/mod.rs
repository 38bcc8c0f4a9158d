//! Forward deduction engine
//!
//! Contributions and tuned exemptions feed the credits, the credits offset the
//! bracket tax of each layer, and the regional layer adds its surcharges.

pub mod brackets;
pub mod contributions;
pub mod credit;
pub mod exemption;
pub mod forward;
pub mod result;
pub mod surcharges;

pub use brackets::{bracket_tax, taxable_income};
pub use contributions::{compute_contributions, maximum_contributions, Contributions};
pub use credit::{compute_credit, Credit};
pub use exemption::tune_exemption;
pub use forward::{compute_net, federal_tax, regional_tax};
pub use result::{ComputationResult, RegionalTax};
