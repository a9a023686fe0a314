//! CSV exports of the point estimate and of a bootstrap run.

use std::fs;
use std::path::{Path, PathBuf};

use csv::Writer;
use serde::Serialize;
use tracing::info;

use crate::bootstrap::BootstrapSampleSet;
use crate::compare::{formatted_table, letters_by_mean, pairwise_compare, summarize_boot, FORMATTED_HEADERS};
use crate::error::{Error, Result};
use crate::records::Parameter;
use crate::treatment::Analysis;

#[derive(Serialize)]
struct SeriesRow<'a> {
    #[serde(rename = "Treatment")]
    treatment: &'a str,
    age: u32,
    lx: f64,
    mx: f64,
    ex: f64,
}

#[derive(Serialize)]
struct SampleRow<'a> {
    #[serde(rename = "Treatment")]
    treatment: &'a str,
    iteration: usize,
    #[serde(rename = "R0")]
    r0: f64,
    #[serde(rename = "T")]
    t: f64,
    rm: f64,
    lambda: f64,
    #[serde(rename = "DT")]
    dt: Option<f64>,
}

#[derive(Serialize)]
struct LetterRow<'a> {
    param: Parameter,
    #[serde(rename = "Treatment")]
    treatment: &'a str,
    #[serde(rename = "Letter")]
    letter: char,
}

fn ensure_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir).map_err(|source| Error::Io { path: dir.to_path_buf(), source })
}

fn write_rows<T: Serialize>(path: &Path, rows: impl IntoIterator<Item = T>) -> Result<()> {
    let mut w = Writer::from_path(path)?;
    for row in rows {
        w.serialize(row)?;
    }
    w.flush().map_err(|source| Error::Io { path: path.to_path_buf(), source })
}

/// `summary.csv` and the flattened per-age `series.csv`.
pub fn write_analysis(dir: &Path, analysis: &Analysis) -> Result<Vec<PathBuf>> {
    ensure_dir(dir)?;

    let summary = dir.join("summary.csv");
    write_rows(&summary, &analysis.summary)?;

    let series = dir.join("series.csv");
    let rows = analysis.curves.iter().flat_map(|(trt, c)| {
        (0..c.age.len()).map(move |i| SeriesRow {
            treatment: trt,
            age: c.age[i],
            lx: c.lx[i],
            mx: c.mx[i],
            ex: c.ex[i],
        })
    });
    write_rows(&series, rows)?;

    info!(dir = %dir.display(), "analysis exported");
    Ok(vec![summary, series])
}

/// Raw samples, pairwise comparisons, letters and mean ± SE tables.
pub fn write_bootstrap(dir: &Path, samples: &BootstrapSampleSet, alpha: f64) -> Result<Vec<PathBuf>> {
    ensure_dir(dir)?;

    let raw = dir.join("bootstrap_samples.csv");
    let rows = samples.samples.iter().flat_map(|(trt, tuples)| {
        tuples.iter().enumerate().map(move |(i, t)| SampleRow {
            treatment: trt,
            iteration: i + 1,
            r0: t.r0,
            t: t.t,
            rm: t.rm,
            lambda: t.lambda,
            dt: t.dt.value(),
        })
    });
    write_rows(&raw, rows)?;

    let pairwise = dir.join("pairwise.csv");
    write_rows(&pairwise, Parameter::ALL.iter().flat_map(|&p| pairwise_compare(samples, p)))?;

    let letters = dir.join("letters.csv");
    let cld: Vec<(Parameter, Vec<_>)> =
        Parameter::ALL.iter().map(|&p| (p, letters_by_mean(samples, p, alpha))).collect();
    write_rows(
        &letters,
        cld.iter().flat_map(|(p, rows)| {
            rows.iter().map(move |c| LetterRow { param: *p, treatment: &c.treatment, letter: c.letter })
        }),
    )?;

    let means = dir.join("means_se.csv");
    {
        let mut w = Writer::from_path(&means)?;
        let mut header = vec!["Treatment".to_string()];
        for p in Parameter::ALL {
            header.push(format!("{}_mean", p));
            header.push(format!("{}_se", p));
            header.push(format!("{}_letter", p));
        }
        w.write_record(&header)?;

        for s in summarize_boot(samples) {
            let mut record = vec![s.treatment.clone()];
            for (p, rows) in &cld {
                let ms = s.stat(*p);
                record.push(ms.mean.to_string());
                record.push(ms.se.to_string());
                let letter = rows.iter().find(|c| c.treatment == s.treatment).map(|c| c.letter);
                record.push(letter.map(String::from).unwrap_or_default());
            }
            w.write_record(&record)?;
        }
        w.flush().map_err(|source| Error::Io { path: means.clone(), source })?;
    }

    let formatted = dir.join("formatted_table.csv");
    {
        let mut w = Writer::from_path(&formatted)?;
        w.write_record(FORMATTED_HEADERS)?;
        for row in formatted_table(samples, alpha) {
            let mut record = vec![row.treatment];
            record.extend(row.cells);
            w.write_record(&record)?;
        }
        w.flush().map_err(|source| Error::Io { path: formatted.clone(), source })?;
    }

    info!(dir = %dir.display(), "bootstrap exported");
    Ok(vec![raw, pairwise, letters, means, formatted])
}
