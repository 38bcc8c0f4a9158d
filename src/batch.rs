//! Batch driver for CSV files of (income, jurisdiction, year) rows
//!
//! The first three columns are read positionally whatever their headers. Every
//! row is validated before anything is computed, then rows are processed in
//! parallel and written back in input order with one result column appended.

use std::io::{Read, Write};

use clap::ValueEnum;
use csv::StringRecord;
use log::info;
use rayon::prelude::*;

use crate::calculator::TaxCalculator;
use crate::error::{validate_income, TaxError, TaxResult};
use crate::params::Jurisdiction;

/// What the income column holds and what to derive from it
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Direction {
    /// Gross incomes in, net incomes out
    Net,
    /// Net incomes in, gross incomes out
    Gross,
}

impl Direction {
    pub fn column_name(&self) -> &'static str {
        match self {
            Direction::Net => "after_tax",
            Direction::Gross => "before_tax",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BatchRow {
    pub income: f64,
    pub jurisdiction: Jurisdiction,
    pub year: u32,
}

fn field<'a>(record: &'a StringRecord, index: usize, name: &'static str) -> TaxResult<&'a str> {
    record.get(index).ok_or(TaxError::InvalidField {
        field: name,
        value: String::new(),
    })
}

fn parse_row(record: &StringRecord, calc: &TaxCalculator) -> TaxResult<BatchRow> {
    let income = field(record, 0, "income")?;
    let income = income.parse::<f64>().map_err(|_| TaxError::InvalidField {
        field: "income",
        value: income.to_string(),
    })?;
    let jurisdiction = field(record, 1, "jurisdiction")?.parse::<Jurisdiction>()?;
    let year = field(record, 2, "year")?;
    let year = year.parse::<u32>().map_err(|_| TaxError::InvalidField {
        field: "year",
        value: year.to_string(),
    })?;

    calc.tables().year(year)?.region(jurisdiction)?;
    Ok(BatchRow {
        income: validate_income(income)?,
        jurisdiction,
        year,
    })
}

/// Validate every record, failing on the first bad one (rows numbered from 1)
pub fn parse_rows(records: &[StringRecord], calc: &TaxCalculator) -> TaxResult<Vec<BatchRow>> {
    records
        .iter()
        .enumerate()
        .map(|(i, record)| {
            parse_row(record, calc).map_err(|source| TaxError::InvalidRow {
                row: i + 1,
                source: Box::new(source),
            })
        })
        .collect()
}

/// Derive the result for every row, preserving order
pub fn run_batch(calc: &TaxCalculator, rows: &[BatchRow], direction: Direction) -> TaxResult<Vec<f64>> {
    rows.par_iter()
        .enumerate()
        .map(|(i, row)| {
            let result = match direction {
                Direction::Net => calc
                    .compute_net(row.income, row.jurisdiction, row.year)
                    .map(|r| r.net_income),
                Direction::Gross => calc
                    .compute_gross(row.income, row.jurisdiction, row.year)
                    .map(|e| e.gross_income),
            };
            result.map_err(|source| TaxError::InvalidRow {
                row: i + 1,
                source: Box::new(source),
            })
        })
        .collect()
}

/// Read rows from `reader` and write them to `writer` with the result column appended
pub fn process_csv<R: Read, W: Write>(
    calc: &TaxCalculator,
    reader: R,
    writer: W,
    direction: Direction,
) -> TaxResult<usize> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);
    let headers = csv_reader.headers()?.clone();
    let records = csv_reader.records().collect::<Result<Vec<_>, _>>()?;

    let rows = parse_rows(&records, calc)?;
    let results = run_batch(calc, &rows, direction)?;

    let mut csv_writer = csv::Writer::from_writer(writer);
    let mut header_out = headers;
    header_out.push_field(direction.column_name());
    csv_writer.write_record(&header_out)?;
    for (record, value) in records.iter().zip(&results) {
        let mut out = record.clone();
        out.push_field(&value.to_string());
        csv_writer.write_record(&out)?;
    }
    csv_writer.flush()?;

    info!("Processed {} batch rows ({})", results.len(), direction.column_name());
    Ok(results.len())
}
