//! Calculator context: loaded tables, fitted coefficients and inversion settings
//!
//! Build once, then share across threads. Every computation borrows the context
//! immutably; only installing new coefficient sets needs `&mut self`.

use std::path::Path;

use log::info;
use rayon::prelude::*;

use crate::engine::{self, ComputationResult};
use crate::error::TaxResult;
use crate::inverse::{self, CoefficientSet, CoefficientStore, GrossEstimate, InversionConfig};
use crate::params::{Jurisdiction, TaxTables};

/// Pre-loaded calculator for forward and inverse computations
///
/// # Example
/// ```ignore
/// let mut calc = TaxCalculator::builtin()?;
/// calc.fit_year(2024)?;
///
/// let net = calc.compute_net(85_000.0, Jurisdiction::ON, 2024)?;
/// let gross = calc.compute_gross(net.net_income, Jurisdiction::ON, 2024)?;
/// ```
#[derive(Debug, Clone)]
pub struct TaxCalculator {
    tables: TaxTables,
    coefficients: CoefficientStore,
    config: InversionConfig,
}

impl TaxCalculator {
    pub fn new(tables: TaxTables) -> Self {
        Self {
            tables,
            coefficients: CoefficientStore::new(),
            config: InversionConfig::default(),
        }
    }

    /// Calculator over the built-in tables
    pub fn builtin() -> TaxResult<Self> {
        Ok(Self::new(TaxTables::builtin()?))
    }

    /// Calculator over `tax_rates_<year>` directories under `dir`
    pub fn from_dir(dir: &Path, years: &[u32]) -> TaxResult<Self> {
        Ok(Self::new(TaxTables::from_dir(dir, years)?))
    }

    pub fn with_config(mut self, config: InversionConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_coefficients(mut self, coefficients: CoefficientStore) -> Self {
        self.coefficients = coefficients;
        self
    }

    pub fn tables(&self) -> &TaxTables {
        &self.tables
    }

    pub fn coefficients(&self) -> &CoefficientStore {
        &self.coefficients
    }

    pub fn config(&self) -> &InversionConfig {
        &self.config
    }

    pub fn compute_net(&self, gross_income: f64, jurisdiction: Jurisdiction, year: u32) -> TaxResult<ComputationResult> {
        engine::compute_net(gross_income, self.tables.year(year)?, jurisdiction)
    }

    pub fn compute_gross(&self, net_income: f64, jurisdiction: Jurisdiction, year: u32) -> TaxResult<GrossEstimate> {
        inverse::compute_gross(
            net_income,
            self.tables.year(year)?,
            jurisdiction,
            self.coefficients.get(jurisdiction, year),
            &self.config,
        )
    }

    /// Fit a coefficient set without installing it
    pub fn fit_inversion_coefficients(&self, jurisdiction: Jurisdiction, year: u32) -> TaxResult<CoefficientSet> {
        inverse::fit_inversion_coefficients(self.tables.year(year)?, jurisdiction, &self.config)
    }

    /// Add or replace a coefficient set
    pub fn install_coefficients(&mut self, set: CoefficientSet) {
        self.coefficients.insert(set);
    }

    /// Fit and install coefficients for every jurisdiction loaded for `year`
    pub fn fit_year(&mut self, year: u32) -> TaxResult<usize> {
        let tables = self.tables.year(year)?;
        let jurisdictions: Vec<Jurisdiction> = tables.jurisdictions().collect();
        let sets = jurisdictions
            .par_iter()
            .map(|&j| inverse::fit_inversion_coefficients(tables, j, &self.config))
            .collect::<TaxResult<Vec<_>>>()?;

        let count = sets.len();
        self.coefficients.extend(sets);
        info!("Installed inversion coefficients for {} jurisdictions in {}", count, year);
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TaxError;

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn test_context_is_shareable() {
        assert_send_sync::<TaxCalculator>();
    }

    #[test]
    fn test_unknown_year() {
        let calc = TaxCalculator::builtin().unwrap();
        assert!(matches!(
            calc.compute_net(50_000.0, Jurisdiction::ON, 2019),
            Err(TaxError::UnsupportedYear(2019))
        ));
    }

    #[test]
    fn test_fit_year_installs_every_jurisdiction() {
        let mut calc = TaxCalculator::builtin().unwrap();
        assert_eq!(calc.fit_year(2024).unwrap(), Jurisdiction::ALL.len());
        assert_eq!(calc.coefficients().len(), Jurisdiction::ALL.len());

        let net = calc.compute_net(85_000.0, Jurisdiction::BC, 2024).unwrap();
        let gross = calc.compute_gross(net.net_income, Jurisdiction::BC, 2024).unwrap();
        assert!((gross.gross_income - 85_000.0).abs() < 2_500.0, "{}", gross.gross_income);
    }

    #[test]
    fn test_installed_set_is_used() {
        let mut calc = TaxCalculator::builtin().unwrap();
        let set = calc.fit_inversion_coefficients(Jurisdiction::SK, 2024).unwrap();
        assert!(calc.compute_gross(70_000.0, Jurisdiction::SK, 2024).is_err());
        calc.install_coefficients(set);
        assert!(calc.compute_gross(70_000.0, Jurisdiction::SK, 2024).is_ok());
    }
}
