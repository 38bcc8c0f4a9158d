//! Tax parameter tables: brackets, exemptions, contribution limits and the
//! optional regional surcharge schedules, organised per tax year.

mod jurisdiction;
mod layer;
pub mod builtin;
pub mod loader;

pub use jurisdiction::Jurisdiction;
pub use layer::{
    BasicExemption, BracketSegment, BracketTable, ContributionParams, ContributionRates,
    FederalParams, HealthPremiumRow, HealthPremiumSchedule, LayerParams, ParentalInsurance,
    PensionRates, PhaseOut, RegionalFeatures, RegionalParams, SecondTier, SurtaxLevel,
    SurtaxSchedule,
};

use std::collections::BTreeMap;
use std::path::Path;

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::error::{TaxError, TaxResult};

/// Federal table plus every regional table loaded for one year
#[derive(Debug, Clone)]
pub struct YearTables {
    year: u32,
    federal: FederalParams,
    regions: BTreeMap<Jurisdiction, RegionalParams>,
    fingerprints: BTreeMap<Jurisdiction, String>,
}

impl YearTables {
    pub fn new(year: u32, federal: FederalParams, regions: Vec<RegionalParams>) -> TaxResult<Self> {
        let contributions = &federal.contributions;
        let mut by_code = BTreeMap::new();
        for region in regions {
            let needs_alternate = region.features.fed_abatement_rate.is_some()
                || region.jurisdiction.uses_alternate_contributions();
            if needs_alternate
                && (contributions.alternate_pension.is_none()
                    || contributions.alternate_insurance_rate.is_none())
            {
                return Err(TaxError::invalid_parameters(
                    region.jurisdiction.code(),
                    "requires the federal table to define alternate pension and insurance rates",
                ));
            }
            if by_code.insert(region.jurisdiction, region).is_some() {
                return Err(TaxError::invalid_parameters(
                    "Federal",
                    format!("duplicate regional table in {year}"),
                ));
            }
        }
        let fingerprints = by_code
            .values()
            .map(|region| Ok((region.jurisdiction, table_fingerprint(year, &federal, region)?)))
            .collect::<TaxResult<_>>()?;

        Ok(Self {
            year,
            federal,
            regions: by_code,
            fingerprints,
        })
    }

    pub fn year(&self) -> u32 {
        self.year
    }

    pub fn federal(&self) -> &FederalParams {
        &self.federal
    }

    pub fn region(&self, jurisdiction: Jurisdiction) -> TaxResult<&RegionalParams> {
        self.regions
            .get(&jurisdiction)
            .ok_or(TaxError::MissingJurisdiction {
                jurisdiction,
                year: self.year,
            })
    }

    pub fn jurisdictions(&self) -> impl Iterator<Item = Jurisdiction> + '_ {
        self.regions.keys().copied()
    }

    /// SHA-256 over the federal and regional tables that drive `jurisdiction`,
    /// computed once at construction. Fitted inversion coefficients record this
    /// value to detect stale reuse.
    pub fn fingerprint(&self, jurisdiction: Jurisdiction) -> TaxResult<&str> {
        self.fingerprints
            .get(&jurisdiction)
            .map(String::as_str)
            .ok_or(TaxError::MissingJurisdiction {
                jurisdiction,
                year: self.year,
            })
    }
}

fn table_fingerprint(year: u32, federal: &FederalParams, region: &RegionalParams) -> TaxResult<String> {
    #[derive(Serialize)]
    struct Fingerprinted<'a> {
        year: u32,
        federal: &'a FederalParams,
        region: &'a RegionalParams,
    }

    let payload = serde_json::to_vec(&Fingerprinted { year, federal, region })?;
    Ok(hex::encode(Sha256::digest(&payload)))
}

/// All loaded tax years. This is the read-only context every computation
/// borrows from; build it once and share it.
#[derive(Debug, Clone, Default)]
pub struct TaxTables {
    years: BTreeMap<u32, YearTables>,
}

impl TaxTables {
    pub fn new() -> Self {
        Self::default()
    }

    /// Built-in tables for every year the crate ships
    pub fn builtin() -> TaxResult<Self> {
        let mut tables = Self::new();
        tables.insert(builtin::tables_2024()?);
        Ok(tables)
    }

    /// Load every `tax_rates_<year>` directory requested from `dir`
    pub fn from_dir(dir: &Path, years: &[u32]) -> TaxResult<Self> {
        let mut tables = Self::new();
        for &year in years {
            tables.insert(loader::load_year(dir, year)?);
        }
        Ok(tables)
    }

    /// Add or replace a year
    pub fn insert(&mut self, year_tables: YearTables) {
        self.years.insert(year_tables.year(), year_tables);
    }

    pub fn year(&self, year: u32) -> TaxResult<&YearTables> {
        self.years.get(&year).ok_or(TaxError::UnsupportedYear(year))
    }

    pub fn years(&self) -> impl Iterator<Item = u32> + '_ {
        self.years.keys().copied()
    }
}
