//! Tax Calculator CLI
//!
//! Net and gross computations, coefficient fitting and CSV batches from the command line

use std::fs::File;
use std::io::{self, BufReader, BufWriter};
use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::info;
use serde::Serialize;

use tax_calculator::batch::{self, Direction};
use tax_calculator::{CoefficientStore, Jurisdiction, TaxCalculator};

/// Payroll deductions, net income and gross-from-net estimates
#[derive(Parser, Debug)]
#[command(name = "tax_calculator", version, about, long_about = None)]
struct Cli {
    /// Directory holding tax_rates_<year> parameter tables (built-in tables when absent)
    #[arg(long, env = "TAX_TABLES_DIR", global = true)]
    tables: Option<PathBuf>,

    /// JSON file of fitted inversion coefficients
    #[arg(long, env = "TAX_COEFFICIENTS", global = true)]
    coefficients: Option<PathBuf>,

    /// Tax year
    #[arg(long, default_value_t = 2024, global = true)]
    year: u32,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Deductions and net income for a gross income
    Net {
        #[arg(long)]
        income: f64,
        #[arg(long, short)]
        jurisdiction: Jurisdiction,
    },
    /// Estimated gross income for a net income
    Gross {
        #[arg(long)]
        income: f64,
        #[arg(long, short)]
        jurisdiction: Jurisdiction,
    },
    /// Fit inversion coefficients for every jurisdiction in the year and save them
    Fit {
        /// Destination file (defaults to --coefficients)
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Process a CSV of income, jurisdiction, year rows
    Batch {
        #[arg(long, short)]
        input: PathBuf,
        /// Output CSV (stdout when absent)
        #[arg(long, short)]
        output: Option<PathBuf>,
        #[arg(long, value_enum, default_value = "net")]
        direction: Direction,
    },
}

fn load_calculator(cli: &Cli) -> Result<TaxCalculator> {
    let calc = match &cli.tables {
        Some(dir) => TaxCalculator::from_dir(dir, &[cli.year])
            .with_context(|| format!("loading tables from {}", dir.display()))?,
        None => TaxCalculator::builtin()?,
    };

    match &cli.coefficients {
        Some(path) if path.exists() => {
            let store = CoefficientStore::load(path)
                .with_context(|| format!("loading coefficients from {}", path.display()))?;
            Ok(calc.with_coefficients(store))
        }
        _ => Ok(calc),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let start = Instant::now();
    let mut calc = load_calculator(&cli)?;
    let year = cli.year;

    match cli.command {
        Commands::Net { income, jurisdiction } => {
            print_json(&calc.compute_net(income, jurisdiction, year)?)?;
        }
        Commands::Gross { income, jurisdiction } => {
            if calc.coefficients().get(jurisdiction, year).is_none() {
                info!("No stored coefficients for {} {}, fitting", jurisdiction, year);
                let set = calc.fit_inversion_coefficients(jurisdiction, year)?;
                calc.install_coefficients(set);
            }
            print_json(&calc.compute_gross(income, jurisdiction, year)?)?;
        }
        Commands::Fit { output } => {
            let path = output
                .or_else(|| cli.coefficients.clone())
                .context("no output file: pass --output or set TAX_COEFFICIENTS")?;
            let count = calc.fit_year(year)?;
            calc.coefficients().save(&path)?;
            println!("Fitted {} jurisdictions for {} in {:?}", count, year, start.elapsed());
        }
        Commands::Batch {
            input,
            output,
            direction,
        } => {
            if direction == Direction::Gross {
                let tables = calc.tables().year(year)?;
                let missing = tables
                    .jurisdictions()
                    .any(|j| calc.coefficients().get(j, year).is_none());
                if missing {
                    calc.fit_year(year)?;
                }
            }

            let reader = BufReader::new(
                File::open(&input).with_context(|| format!("opening {}", input.display()))?,
            );
            let rows = match output {
                Some(path) => batch::process_csv(&calc, reader, BufWriter::new(File::create(&path)?), direction)?,
                None => batch::process_csv(&calc, reader, io::stdout().lock(), direction)?,
            };
            info!("Batch of {} rows finished in {:?}", rows, start.elapsed());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_net() {
        let cli = Cli::try_parse_from(["tax_calculator", "net", "--income", "85000", "-j", "on"]).unwrap();
        assert_eq!(cli.year, 2024);
        match cli.command {
            Commands::Net { income, jurisdiction } => {
                assert_eq!(income, 85_000.0);
                assert_eq!(jurisdiction, Jurisdiction::ON);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_parse_batch_direction() {
        let cli = Cli::try_parse_from([
            "tax_calculator",
            "--year",
            "2024",
            "batch",
            "--input",
            "rows.csv",
            "--direction",
            "gross",
        ])
        .unwrap();
        assert!(matches!(
            cli.command,
            Commands::Batch {
                direction: Direction::Gross,
                ..
            }
        ));
    }

    #[test]
    fn test_rejects_unknown_jurisdiction() {
        assert!(Cli::try_parse_from(["tax_calculator", "net", "--income", "1", "-j", "XX"]).is_err());
    }
}
