//! Fitted mid-range inversion polynomials and their persistence
//!
//! Each set is fitted by sampling the forward computation over a grid of gross
//! incomes and regressing gross on the resulting (rounded) net incomes. A set
//! remembers the fingerprint of the tables it was fitted against so a later
//! table change can be detected before the polynomials are reused.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use log::info;
use serde::{Deserialize, Serialize};

use super::polyfit::Polynomial;
use crate::engine::compute_net;
use crate::error::{TaxError, TaxResult};
use crate::params::{Jurisdiction, YearTables};

/// Evenly spaced gross incomes from `start` to `end` inclusive
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SampleRange {
    pub start: f64,
    pub end: f64,
    pub step: f64,
}

impl SampleRange {
    pub fn points(&self) -> Vec<f64> {
        if self.step <= 0.0 || self.end < self.start {
            return Vec::new();
        }
        let count = ((self.end - self.start) / self.step).floor() as usize + 1;
        (0..count).map(|i| self.start + i as f64 * self.step).collect()
    }
}

/// Regime boundaries and fitting grid for the inverse solver
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InversionConfig {
    /// Gross grid for the low polynomial
    pub low_samples: SampleRange,
    /// Gross grid for the high polynomial
    pub high_samples: SampleRange,
    pub degree: usize,
    /// Net income from which the high polynomial is used
    pub polynomial_split: f64,
    /// Net income from which the high closed form is used
    pub high_income_threshold: f64,
}

impl Default for InversionConfig {
    fn default() -> Self {
        Self {
            low_samples: SampleRange {
                start: 1_000.0,
                end: 349_000.0,
                step: 1_000.0,
            },
            high_samples: SampleRange {
                start: 350_000.0,
                end: 1_500_000.0,
                step: 1_000.0,
            },
            degree: 5,
            polynomial_split: 200_000.0,
            high_income_threshold: 500_000.0,
        }
    }
}

/// Low and high mid-range polynomials for one jurisdiction and year
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoefficientSet {
    pub jurisdiction: Jurisdiction,
    pub year: u32,
    /// Fingerprint of the tables the polynomials were fitted against
    pub fingerprint: String,
    pub low: Polynomial,
    pub high: Polynomial,
}

impl CoefficientSet {
    /// Fail unless the set was fitted against tables with `fingerprint`
    pub fn ensure_fresh(&self, fingerprint: &str) -> TaxResult<()> {
        if self.fingerprint != fingerprint {
            return Err(TaxError::StaleCoefficients {
                jurisdiction: self.jurisdiction,
                year: self.year,
                fitted: self.fingerprint.clone(),
                current: fingerprint.to_string(),
            });
        }
        Ok(())
    }
}

fn fit_range(
    range: &SampleRange,
    degree: usize,
    tables: &YearTables,
    jurisdiction: Jurisdiction,
) -> TaxResult<Polynomial> {
    let grosses = range.points();
    let nets = grosses
        .iter()
        .map(|&gross| compute_net(gross, tables, jurisdiction).map(|r| r.net_income))
        .collect::<TaxResult<Vec<f64>>>()?;
    Polynomial::fit(&nets, &grosses, degree)
}

/// Fit the low and high polynomials for `jurisdiction`
pub fn fit_inversion_coefficients(
    tables: &YearTables,
    jurisdiction: Jurisdiction,
    config: &InversionConfig,
) -> TaxResult<CoefficientSet> {
    let fingerprint = tables.fingerprint(jurisdiction)?.to_string();
    let low = fit_range(&config.low_samples, config.degree, tables, jurisdiction)?;
    let high = fit_range(&config.high_samples, config.degree, tables, jurisdiction)?;

    info!(
        "Fitted inversion polynomials for {} {} (net domains {:.0}-{:.0} and {:.0}-{:.0})",
        jurisdiction,
        tables.year(),
        low.domain[0],
        low.domain[1],
        high.domain[0],
        high.domain[1]
    );

    Ok(CoefficientSet {
        jurisdiction,
        year: tables.year(),
        fingerprint,
        low,
        high,
    })
}

/// Coefficient sets keyed by jurisdiction and year
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CoefficientStore {
    sets: BTreeMap<(Jurisdiction, u32), CoefficientSet>,
}

impl CoefficientStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a set
    pub fn insert(&mut self, set: CoefficientSet) {
        self.sets.insert((set.jurisdiction, set.year), set);
    }

    pub fn get(&self, jurisdiction: Jurisdiction, year: u32) -> Option<&CoefficientSet> {
        self.sets.get(&(jurisdiction, year))
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CoefficientSet> {
        self.sets.values()
    }

    /// Read a JSON array of sets
    pub fn load(path: &Path) -> TaxResult<Self> {
        let sets: Vec<CoefficientSet> = serde_json::from_reader(BufReader::new(File::open(path)?))?;
        let mut store = Self::new();
        for set in sets {
            store.insert(set);
        }
        info!("Loaded {} coefficient sets from {}", store.len(), path.display());
        Ok(store)
    }

    /// Write every set as a JSON array, ordered by jurisdiction then year
    pub fn save(&self, path: &Path) -> TaxResult<()> {
        let sets: Vec<&CoefficientSet> = self.iter().collect();
        serde_json::to_writer_pretty(BufWriter::new(File::create(path)?), &sets)?;
        info!("Saved {} coefficient sets to {}", sets.len(), path.display());
        Ok(())
    }
}

impl Extend<CoefficientSet> for CoefficientStore {
    fn extend<I: IntoIterator<Item = CoefficientSet>>(&mut self, iter: I) {
        for set in iter {
            self.insert(set);
        }
    }
}
