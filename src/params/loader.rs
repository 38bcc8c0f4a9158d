//! CSV-based parameter table loader
//!
//! Loads `tax_rates_<year>/Federal.csv` and one `<XX>.csv` per jurisdiction.
//! Each file is a wide table: one column per field, values listed top to bottom,
//! blank cells where a field has fewer values than the longest column.

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use log::{debug, info};

use super::{
    BasicExemption, BracketTable, ContributionParams, FederalParams, HealthPremiumSchedule,
    Jurisdiction, LayerParams, ParentalInsurance, PensionRates, PhaseOut, RegionalFeatures,
    RegionalParams, SecondTier, SurtaxSchedule, YearTables,
};
use crate::error::{TaxError, TaxResult};

pub const FEDERAL_FILE: &str = "Federal.csv";

/// Directory holding the tables for `year`
pub fn year_dir(dir: &Path, year: u32) -> PathBuf {
    dir.join(format!("tax_rates_{year}"))
}

/// Accepted headers and the field each one fills. Lower-cased before lookup, so
/// both this crate's column names and the legacy `tax_rates_<year>` headers load.
const HEADERS: &[(&str, &str)] = &[
    ("threshold", "threshold"),
    ("rate", "rate"),
    ("basic_exemption", "basic_exemption"),
    ("bpa", "basic_exemption"),
    ("employment_amount", "employment_amount"),
    ("employ_amount", "employment_amount"),
    ("pension_rate", "pension_rate"),
    ("cpp_rate", "pension_rate"),
    ("pension_exemption", "pension_exemption"),
    ("cpp_be", "pension_exemption"),
    ("pension_ceiling", "pension_ceiling"),
    ("cpp_max_pensionable", "pension_ceiling"),
    ("insurance_rate", "insurance_rate"),
    ("ei_rate", "insurance_rate"),
    ("insurance_ceiling", "insurance_ceiling"),
    ("ei_max_contribution", "insurance_ceiling"),
    ("fed_abatement", "fed_abatement"),
    ("phase_out", "phase_out"),
    ("surtax_threshold", "surtax_threshold"),
    ("surtax_thresh", "surtax_threshold"),
    ("surtax_rate", "surtax_rate"),
    ("health_threshold", "health_threshold"),
    ("health_prem_thresh", "health_threshold"),
    ("health_floor", "health_floor"),
    ("health_prem_limit", "health_floor"),
    ("health_rate", "health_rate"),
    ("health_prem_rate", "health_rate"),
    ("parental_insurance", "parental_insurance"),
    ("qpip", "parental_insurance"),
];

fn field_for(header: &str) -> Option<&'static str> {
    let header = header.to_ascii_lowercase();
    HEADERS
        .iter()
        .find(|(alias, _)| *alias == header)
        .map(|&(_, field)| field)
}

/// Non-blank values of every recognised column, keyed by field
struct Columns {
    layer: String,
    values: HashMap<&'static str, Vec<f64>>,
}

impl Columns {
    fn read<R: Read>(layer: &str, reader: R) -> TaxResult<Self> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut fields = Vec::new();
        for header in csv_reader.headers()?.iter() {
            let field = field_for(header);
            if field.is_none() {
                // cumulative tax, jurisdiction labels, index columns
                debug!("{}: ignoring column '{}'", layer, header);
            } else if fields.contains(&field) {
                return Err(TaxError::invalid_parameters(
                    layer,
                    format!("column {header} duplicates another column"),
                ));
            }
            fields.push(field);
        }
        let mut values: HashMap<&'static str, Vec<f64>> = HashMap::new();

        for result in csv_reader.records() {
            let record = result?;
            for (field, cell) in fields.iter().zip(record.iter()) {
                let Some(field) = *field else { continue };
                if cell.is_empty() {
                    continue;
                }
                let value: f64 = cell.parse().map_err(|_| {
                    TaxError::invalid_parameters(layer, format!("column {field}: cannot parse '{cell}'"))
                })?;
                values.entry(field).or_default().push(value);
            }
        }

        Ok(Self {
            layer: layer.to_string(),
            values,
        })
    }

    fn optional(&self, name: &str) -> &[f64] {
        self.values.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    fn required(&self, name: &str) -> TaxResult<&[f64]> {
        match self.optional(name) {
            [] => Err(TaxError::invalid_parameters(
                &self.layer,
                format!("missing required column {name}"),
            )),
            values => Ok(values),
        }
    }

    fn single(&self, name: &str) -> TaxResult<f64> {
        Ok(self.required(name)?[0])
    }

    fn pair(&self, name: &str) -> TaxResult<Option<(f64, f64)>> {
        match *self.optional(name) {
            [] => Ok(None),
            [a, b] => Ok(Some((a, b))),
            ref other => Err(TaxError::invalid_parameters(
                &self.layer,
                format!("column {name} must have 2 values, got {}", other.len()),
            )),
        }
    }

    fn layer_params(&self) -> TaxResult<LayerParams> {
        let brackets = BracketTable::new(
            &self.layer,
            self.optional("threshold").to_vec(),
            self.required("rate")?.to_vec(),
        )?;
        let exemption = BasicExemption::from_values(&self.layer, self.required("basic_exemption")?)?;
        LayerParams::new(&self.layer, brackets, exemption)
    }
}

/// Parse the federal table
pub fn federal_from_reader<R: Read>(reader: R) -> TaxResult<FederalParams> {
    let columns = Columns::read("Federal", reader)?;
    let layer = columns.layer_params()?;

    let (pension, alternate_pension) = match *columns.required("pension_rate")? {
        [rate, base_rate] => (PensionRates { rate, base_rate }, None),
        [rate, base_rate, alt_rate, alt_base_rate] => (
            PensionRates { rate, base_rate },
            Some(PensionRates {
                rate: alt_rate,
                base_rate: alt_base_rate,
            }),
        ),
        ref other => {
            return Err(TaxError::invalid_parameters(
                "Federal",
                format!("pension_rate must have 2 or 4 values, got {}", other.len()),
            ))
        }
    };

    let (max_pensionable_earnings, second_tier) = match *columns.required("pension_ceiling")? {
        [ceiling] => (ceiling, None),
        [ceiling, second_ceiling, rate] => (
            ceiling,
            Some(SecondTier {
                ceiling: second_ceiling,
                rate,
            }),
        ),
        ref other => {
            return Err(TaxError::invalid_parameters(
                "Federal",
                format!("pension_ceiling must have 1 or 3 values, got {}", other.len()),
            ))
        }
    };

    let (insurance_rate, alternate_insurance_rate) = match *columns.required("insurance_rate")? {
        [rate] => (rate, None),
        [rate, alt_rate] => (rate, Some(alt_rate)),
        ref other => {
            return Err(TaxError::invalid_parameters(
                "Federal",
                format!("insurance_rate must have 1 or 2 values, got {}", other.len()),
            ))
        }
    };

    let contributions = ContributionParams {
        pension,
        alternate_pension,
        pension_exemption: columns.single("pension_exemption")?,
        max_pensionable_earnings,
        second_tier,
        insurance_rate,
        alternate_insurance_rate,
        max_insurable_earnings: columns.single("insurance_ceiling")?,
    };

    FederalParams::new(layer, columns.single("employment_amount")?, contributions)
}

/// Parse one regional table
pub fn regional_from_reader<R: Read>(jurisdiction: Jurisdiction, reader: R) -> TaxResult<RegionalParams> {
    let columns = Columns::read(jurisdiction.code(), reader)?;
    let layer = columns.layer_params()?;

    let health_thresholds = columns.optional("health_threshold");
    let health_premium = if health_thresholds.is_empty() {
        None
    } else {
        Some(HealthPremiumSchedule::new(
            jurisdiction.code(),
            health_thresholds,
            columns.optional("health_floor"),
            columns.optional("health_rate"),
        )?)
    };

    let features = RegionalFeatures {
        fed_abatement_rate: columns.optional("fed_abatement").first().copied(),
        phase_out: columns
            .pair("phase_out")?
            .map(|(threshold, rate)| PhaseOut { threshold, rate }),
        surtax: SurtaxSchedule::new(
            jurisdiction.code(),
            columns.optional("surtax_threshold"),
            columns.optional("surtax_rate"),
        )?,
        health_premium,
        parental_insurance: columns
            .pair("parental_insurance")?
            .map(|(max_insurable_earnings, rate)| ParentalInsurance {
                max_insurable_earnings,
                rate,
            }),
    };

    RegionalParams::new(jurisdiction, layer, features)
}

/// Load the federal table and every regional table present for `year`
pub fn load_year(dir: &Path, year: u32) -> TaxResult<YearTables> {
    let path = year_dir(dir, year);
    let federal = federal_from_reader(File::open(path.join(FEDERAL_FILE))?)?;

    let mut regions = Vec::new();
    for jurisdiction in Jurisdiction::ALL {
        let file = path.join(format!("{}.csv", jurisdiction.code()));
        if !file.exists() {
            debug!("No table for {} in {}", jurisdiction, path.display());
            continue;
        }
        regions.push(regional_from_reader(jurisdiction, File::open(file)?)?);
    }

    info!(
        "Loaded federal and {} regional tables for {} from {}",
        regions.len(),
        year,
        path.display()
    );
    YearTables::new(year, federal, regions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::builtin;

    const FEDERAL_CSV: &str = "\
threshold,rate,cumul_bracket,basic_exemption,employment_amount,pension_rate,pension_exemption,pension_ceiling,insurance_rate,insurance_ceiling
55867,15,8380.05,15705,1433,5.95,3500,68500,1.66,63200
111733,20.5,,1549,,4.95,,73200,1.32,
173205,26,,,,6.4,,4,,
246752,29,,,,5.4,,,,
,33,,,,,,,,
";

    const ONTARIO_CSV: &str = "\
threshold,rate,basic_exemption,surtax_threshold,surtax_rate,health_threshold,health_floor,health_rate
51446,5.05,12399,5554,20,20000,0,0
102894,9.15,,7108,36,25000,300,6
150000,11.16,,,,36000,300,0
220000,12.16,,,,38500,450,6
,13.16,,,,48000,450,0
,,,,,48600,600,25
,,,,,72000,600,0
,,,,,72600,750,25
,,,,,200000,750,0
,,,,,200600,900,25
";

    #[test]
    fn test_federal_matches_builtin() {
        let loaded = federal_from_reader(FEDERAL_CSV.as_bytes()).unwrap();
        assert_eq!(loaded, builtin::federal_2024().unwrap());
    }

    #[test]
    fn test_regional_matches_builtin() {
        let loaded = regional_from_reader(Jurisdiction::ON, ONTARIO_CSV.as_bytes()).unwrap();
        let tables = builtin::tables_2024().unwrap();
        assert_eq!(&loaded, tables.region(Jurisdiction::ON).unwrap());
    }

    const LEGACY_FEDERAL_CSV: &str = "\
Threshold,Rate,cumul_bracket,bpa,employ_amount,CPP_rate,CPP_be,CPP_max_pensionable,EI_rate,EI_max_contribution
55867,15,8380.05,15705,1433,5.95,3500,68500,1.66,63200
111733,20.5,19832.08,1549,,4.95,,73200,1.32,
173205,26,35814.8,,,6.4,,4,,
246752,29,57143.43,,,5.4,,,,
,33,,,,,,,,
";

    const LEGACY_QUEBEC_CSV: &str = "\
province,Threshold,Rate,cumul_bracket,bpa,fed_abatement,QPIP
QC,51780,14,7249.2,18056,16.5,94000
,103545,19,17084.55,,,0.494
,126000,24,22473.75,,,
,,25.75,,,,
";

    #[test]
    fn test_legacy_headers_load() {
        let federal = federal_from_reader(LEGACY_FEDERAL_CSV.as_bytes()).unwrap();
        assert_eq!(federal, builtin::federal_2024().unwrap());

        let quebec = regional_from_reader(Jurisdiction::QC, LEGACY_QUEBEC_CSV.as_bytes()).unwrap();
        let tables = builtin::tables_2024().unwrap();
        assert_eq!(&quebec, tables.region(Jurisdiction::QC).unwrap());
    }

    #[test]
    fn test_duplicate_field_is_fatal() {
        let csv = "threshold,rate,bpa,basic_exemption\n50000,10,12000,12000\n,12,,\n";
        assert!(matches!(
            regional_from_reader(Jurisdiction::AB, csv.as_bytes()),
            Err(TaxError::InvalidParameters { .. })
        ));
    }

    #[test]
    fn test_missing_rates_is_fatal() {
        let csv = "threshold,basic_exemption\n50000,12000\n";
        let err = regional_from_reader(Jurisdiction::AB, csv.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("rate"), "{err}");
    }

    #[test]
    fn test_non_monotonic_thresholds_are_fatal() {
        let csv = "threshold,rate,basic_exemption\n60000,10,12000\n50000,12,\n,14,\n";
        assert!(matches!(
            regional_from_reader(Jurisdiction::AB, csv.as_bytes()),
            Err(TaxError::InvalidParameters { .. })
        ));
    }

    #[test]
    fn test_unparseable_cell_is_fatal() {
        let csv = "threshold,rate,basic_exemption\nabc,10,12000\n,12,\n";
        assert!(regional_from_reader(Jurisdiction::AB, csv.as_bytes()).is_err());
    }

    #[test]
    fn test_load_year_from_directory() {
        let dir = std::env::temp_dir().join(format!("tax_calculator_loader_{}", std::process::id()));
        let year = year_dir(&dir, 2024);
        std::fs::create_dir_all(&year).unwrap();
        std::fs::write(year.join(FEDERAL_FILE), FEDERAL_CSV).unwrap();
        std::fs::write(year.join("ON.csv"), ONTARIO_CSV).unwrap();

        let tables = load_year(&dir, 2024).unwrap();
        assert_eq!(tables.jurisdictions().collect::<Vec<_>>(), vec![Jurisdiction::ON]);
        assert!(tables.region(Jurisdiction::AB).is_err());

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
