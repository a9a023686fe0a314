//! CSV loading for the individuals and fecundity tables.
//!
//! Header names are matched loosely (case, spaces and underscores ignored)
//! against English and Portuguese spellings. Numeric cells that do not parse
//! are treated as missing and read as 0. Day counts above [`MAX_DAYS`] are
//! rejected with the table and line that holds them.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::{ReaderBuilder, StringRecord};
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::records::{Dataset, FecundityRecord, IndividualRecord, Sex, MAX_DAYS};

// === HEADER NORMALISATION ===

const INDIVIDUAL_COLUMNS: [(&str, &[&str]); 5] = [
    ("Treatment", &["treatment", "tratamento"]),
    ("ID", &["id"]),
    ("Sex", &["sex", "sexo"]),
    ("ImmatureDays", &["immaturedays", "immatureday", "diasimaturos", "juveniledays"]),
    ("AdultDays", &["adultdays", "adultday", "diasadulto"]),
];

const FECUNDITY_COLUMNS: [(&str, &[&str]); 4] = [
    ("Treatment", &["treatment", "tratamento"]),
    ("FemaleID", &["femaleid", "femeaid", "idfemea", "idfemale"]),
    ("AdultDay", &["adultday", "diaadulto", "diadulto", "dayadult"]),
    ("Eggs", &["eggs", "ovos"]),
];

fn keyize(header: &str) -> String {
    header
        .trim()
        .to_lowercase()
        .chars()
        .filter(|c| *c != ' ' && *c != '_')
        .collect()
}

/// Position of each expected column in the header row, in `expected` order.
fn resolve_columns<const N: usize>(
    table: &'static str,
    headers: &StringRecord,
    expected: &[(&'static str, &[&str]); N],
) -> Result<[usize; N]> {
    let keys: Vec<String> = headers.iter().map(keyize).collect();
    let mut found = [0usize; N];
    let mut missing = Vec::new();

    for (slot, (name, aliases)) in expected.iter().enumerate() {
        match keys.iter().position(|k| aliases.contains(&k.as_str())) {
            Some(idx) => found[slot] = idx,
            None => missing.push(name.to_string()),
        }
    }

    if missing.is_empty() {
        Ok(found)
    } else {
        Err(Error::Schema { table, missing })
    }
}

// === CELL COERCION ===

fn cell<'r>(row: &'r StringRecord, idx: usize) -> &'r str {
    row.get(idx).map_or("", str::trim)
}

/// Non-negative finite number, or None for anything else.
fn number(raw: &str) -> Option<f64> {
    raw.parse::<f64>().ok().filter(|v| v.is_finite() && *v >= 0.0)
}

/// Where a cell sits, for error messages.
struct CellRef {
    table: &'static str,
    line: usize,
    column: &'static str,
}

fn days(raw: &str, at: CellRef, coerced: &mut usize) -> Result<u32> {
    match number(raw) {
        Some(v) if v > MAX_DAYS as f64 => Err(Error::InvalidInput(format!(
            "{} line {}: {} = {} exceeds the {} day limit",
            at.table, at.line, at.column, raw, MAX_DAYS
        ))),
        Some(v) => Ok(v.trunc() as u32),
        None => {
            *coerced += 1;
            Ok(0)
        }
    }
}

// === READERS ===

pub fn individuals_from_reader<R: Read>(rdr: R) -> Result<Vec<IndividualRecord>> {
    let mut reader = ReaderBuilder::new().has_headers(true).flexible(true).from_reader(rdr);
    let cols = resolve_columns("Individuals", reader.headers()?, &INDIVIDUAL_COLUMNS)?;
    let [trt, id, sex, imm, adult] = cols;

    let mut data = Vec::new();
    let mut coerced = 0;
    for (i, result) in reader.records().enumerate() {
        let row = result?;
        let at = |column| CellRef { table: "Individuals", line: i + 2, column };
        data.push(IndividualRecord {
            treatment: cell(&row, trt).to_string(),
            id: cell(&row, id).to_string(),
            sex: Sex::parse(cell(&row, sex)),
            immature_days: days(cell(&row, imm), at("ImmatureDays"), &mut coerced)?,
            adult_days: days(cell(&row, adult), at("AdultDays"), &mut coerced)?,
        });
    }

    if coerced > 0 {
        warn!(cells = coerced, "individuals: missing or invalid day counts read as 0");
    }
    Ok(data)
}

pub fn fecundity_from_reader<R: Read>(rdr: R) -> Result<Vec<FecundityRecord>> {
    let mut reader = ReaderBuilder::new().has_headers(true).flexible(true).from_reader(rdr);
    let cols = resolve_columns("Fecundity", reader.headers()?, &FECUNDITY_COLUMNS)?;
    let [trt, female, day, eggs] = cols;

    let mut data = Vec::new();
    let mut coerced = 0;
    for (i, result) in reader.records().enumerate() {
        let row = result?;
        let egg_count = number(cell(&row, eggs)).unwrap_or_else(|| {
            coerced += 1;
            0.0
        });
        data.push(FecundityRecord {
            treatment: cell(&row, trt).to_string(),
            female_id: cell(&row, female).to_string(),
            adult_day: days(
                cell(&row, day),
                CellRef { table: "Fecundity", line: i + 2, column: "AdultDay" },
                &mut coerced,
            )?,
            eggs: egg_count,
        });
    }

    if coerced > 0 {
        warn!(cells = coerced, "fecundity: missing or invalid numbers read as 0");
    }
    Ok(data)
}

fn open(path: &Path) -> Result<File> {
    File::open(path).map_err(|source| Error::Io { path: path.to_path_buf(), source })
}

pub fn read_individuals(path: &Path) -> Result<Vec<IndividualRecord>> {
    individuals_from_reader(open(path)?)
}

pub fn read_fecundity(path: &Path) -> Result<Vec<FecundityRecord>> {
    fecundity_from_reader(open(path)?)
}

/// Load both tables into a dataset.
pub fn read_dataset(individuals: &Path, fecundity: &Path) -> Result<Dataset> {
    let data = Dataset::new(read_individuals(individuals)?, read_fecundity(fecundity)?);
    info!(
        individuals = data.individuals.len(),
        fecundity = data.fecundity.len(),
        treatments = data.treatments().len(),
        "data loaded"
    );
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_english_headers() {
        let csv = "Treatment,ID,Sex,ImmatureDays,AdultDays\nA,1,F,2,3\n";
        let recs = individuals_from_reader(csv.as_bytes()).unwrap();
        assert_eq!(recs, vec![IndividualRecord::new("A", "1", Sex::Female, 2, 3)]);
    }

    #[test]
    fn test_portuguese_headers_any_order() {
        let csv = "Dias_Adulto, Sexo ,Tratamento,ID,Dias Imaturos\n4,macho, T1 ,7,1\n";
        let recs = individuals_from_reader(csv.as_bytes()).unwrap();
        assert_eq!(recs, vec![IndividualRecord::new("T1", "7", Sex::Male, 1, 4)]);
    }

    #[test]
    fn test_missing_columns_reported() {
        let csv = "Treatment,ID,Sex\nA,1,F\n";
        match individuals_from_reader(csv.as_bytes()) {
            Err(Error::Schema { table, missing }) => {
                assert_eq!(table, "Individuals");
                assert_eq!(missing, vec!["ImmatureDays".to_string(), "AdultDays".to_string()]);
            }
            other => panic!("expected schema error, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_numbers_become_zero() {
        let csv = "Tratamento,ID_femea,DiaAdulto,Ovos\nA,1,x,\nA,1,2.7,-4\nA,2,3,5.5\n";
        let recs = fecundity_from_reader(csv.as_bytes()).unwrap();
        assert_eq!(recs[0], FecundityRecord::new("A", "1", 0, 0.0));
        assert_eq!(recs[1], FecundityRecord::new("A", "1", 2, 0.0));
        assert_eq!(recs[2], FecundityRecord::new("A", "2", 3, 5.5));
    }

    #[test]
    fn test_short_rows_are_tolerated() {
        let csv = "Treatment,FemaleID,AdultDay,Eggs\nA,1\n";
        let recs = fecundity_from_reader(csv.as_bytes()).unwrap();
        assert_eq!(recs, vec![FecundityRecord::new("A", "1", 0, 0.0)]);
    }

    #[test]
    fn test_day_counts_beyond_ceiling_rejected() {
        let csv = "Treatment,ID,Sex,ImmatureDays,AdultDays\nA,1,F,3,4\nA,2,F,4000000000,400000000\n";
        match individuals_from_reader(csv.as_bytes()) {
            Err(Error::InvalidInput(msg)) => {
                assert!(msg.contains("Individuals line 3"), "{}", msg);
                assert!(msg.contains("ImmatureDays"), "{}", msg);
            }
            other => panic!("expected invalid input, got {:?}", other),
        }
    }

    #[test]
    fn test_day_count_at_ceiling_accepted() {
        let csv = format!("Treatment,FemaleID,AdultDay,Eggs\nA,1,{},2\n", MAX_DAYS);
        let recs = fecundity_from_reader(csv.as_bytes()).unwrap();
        assert_eq!(recs[0].adult_day, MAX_DAYS);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = read_individuals(Path::new("/nonexistent/individuals.csv")).unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
    }
}
