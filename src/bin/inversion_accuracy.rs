//! Round-trip accuracy of the inverse solver
//!
//! Fits every jurisdiction for a year, runs gross -> net -> gross over a grid of
//! gross incomes and writes per-jurisdiction error statistics as CSV.

use std::fs::File;
use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Instant;

use anyhow::{bail, Result};
use clap::Parser;
use rayon::prelude::*;

use tax_calculator::{Jurisdiction, TaxCalculator, TaxResult};

#[derive(Parser, Debug)]
#[command(name = "inversion_accuracy", about = "Round-trip error of the gross-from-net solver")]
struct Args {
    #[arg(long, default_value_t = 2024)]
    year: u32,

    /// Directory holding tax_rates_<year> tables (built-in tables when absent)
    #[arg(long, env = "TAX_TABLES_DIR")]
    tables: Option<PathBuf>,

    /// Gross income grid step
    #[arg(long, default_value_t = 5_000.0)]
    step: f64,

    /// Largest gross income sampled
    #[arg(long, default_value_t = 1_500_000.0)]
    max_gross: f64,

    /// Output CSV (stdout when absent)
    #[arg(long, short)]
    output: Option<PathBuf>,
}

#[derive(Debug, Clone, Default)]
struct ErrorStats {
    samples: usize,
    total_abs_error: f64,
    max_abs_error: f64,
    max_rel_error: f64,
    worst_gross: f64,
}

impl ErrorStats {
    fn record(&mut self, gross: f64, estimate: f64) {
        let error = (estimate - gross).abs();
        self.samples += 1;
        self.total_abs_error += error;
        if error > self.max_abs_error {
            self.max_abs_error = error;
            self.worst_gross = gross;
        }
        self.max_rel_error = self.max_rel_error.max(error / gross);
    }

    fn mean_abs_error(&self) -> f64 {
        if self.samples == 0 {
            0.0
        } else {
            self.total_abs_error / self.samples as f64
        }
    }
}

/// Gross incomes `step, 2*step, ...` up to `max_gross`
fn income_grid(step: f64, max_gross: f64) -> Result<Vec<f64>> {
    if !(step > 0.0 && step.is_finite()) {
        bail!("--step must be a positive number, got {step}");
    }
    if !(max_gross >= step && max_gross.is_finite()) {
        bail!("--max-gross must be at least --step, got {max_gross}");
    }
    let count = (max_gross / step).floor() as usize;
    Ok((1..=count).map(|i| i as f64 * step).collect())
}

fn round_trip(calc: &TaxCalculator, jurisdiction: Jurisdiction, year: u32, grid: &[f64]) -> TaxResult<ErrorStats> {
    let mut stats = ErrorStats::default();
    for &gross in grid {
        let net = calc.compute_net(gross, jurisdiction, year)?.net_income;
        let estimate = calc.compute_gross(net, jurisdiction, year)?.gross_income;
        stats.record(gross, estimate);
    }
    Ok(stats)
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let grid = income_grid(args.step, args.max_gross)?;

    let start = Instant::now();
    let mut calc = match &args.tables {
        Some(dir) => TaxCalculator::from_dir(dir, &[args.year])?,
        None => TaxCalculator::builtin()?,
    };
    calc.fit_year(args.year)?;
    eprintln!("Fitted {} in {:?}", args.year, start.elapsed());

    let jurisdictions: Vec<Jurisdiction> = calc.tables().year(args.year)?.jurisdictions().collect();

    let results = jurisdictions
        .par_iter()
        .map(|&j| round_trip(&calc, j, args.year, &grid).map(|stats| (j, stats)))
        .collect::<TaxResult<Vec<_>>>()?;

    let mut out: Box<dyn Write> = match &args.output {
        Some(path) => Box::new(File::create(path)?),
        None => Box::new(io::stdout().lock()),
    };
    writeln!(out, "jurisdiction,samples,mean_abs_error,max_abs_error,max_rel_error,worst_gross")?;
    for (j, stats) in &results {
        writeln!(
            out,
            "{},{},{:.2},{:.2},{:.6},{:.0}",
            j,
            stats.samples,
            stats.mean_abs_error(),
            stats.max_abs_error,
            stats.max_rel_error,
            stats.worst_gross
        )?;
    }

    eprintln!("Checked {} jurisdictions x {} incomes in {:?}", results.len(), grid.len(), start.elapsed());
    Ok(())
}
