//! Typed records consumed and produced by the life-table engine.

use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};

use crate::error::{Error, Result};

// === INPUT RECORDS ===

/// Largest accepted immature or adult period, in days. Longer periods are
/// treated as data-entry errors; the age axis is allocated up to the lifespan.
pub const MAX_DAYS: u32 = 100_000;

/// Sex label of an individual. Unknown labels pass through untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sex {
    Female,
    Male,
    Other(String),
}

impl Sex {
    /// Map the usual English/Portuguese spellings, keep anything else verbatim.
    pub fn parse(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "f" | "female" | "fêmea" | "femea" => Sex::Female,
            "m" | "male" | "macho" => Sex::Male,
            _ => Sex::Other(label.to_string()),
        }
    }

    /// Females are recognised by a leading "F", case-insensitive.
    pub fn is_female(&self) -> bool {
        match self {
            Sex::Female => true,
            Sex::Male => false,
            Sex::Other(s) => s.trim_start().to_uppercase().starts_with('F'),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndividualRecord {
    pub treatment: String,
    pub id: String,
    pub sex: Sex,
    pub immature_days: u32,
    pub adult_days: u32,
}

impl IndividualRecord {
    pub fn new(treatment: &str, id: &str, sex: Sex, immature_days: u32, adult_days: u32) -> Self {
        IndividualRecord {
            treatment: treatment.to_string(),
            id: id.to_string(),
            sex,
            immature_days,
            adult_days,
        }
    }

    pub fn lifespan(&self) -> u32 {
        self.immature_days.saturating_add(self.adult_days)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FecundityRecord {
    pub treatment: String,
    pub female_id: String,
    pub adult_day: u32,
    pub eggs: f64,
}

impl FecundityRecord {
    pub fn new(treatment: &str, female_id: &str, adult_day: u32, eggs: f64) -> Self {
        FecundityRecord {
            treatment: treatment.to_string(),
            female_id: female_id.to_string(),
            adult_day,
            eggs,
        }
    }
}

/// The two input tables of one experiment.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    pub individuals: Vec<IndividualRecord>,
    pub fecundity: Vec<FecundityRecord>,
}

impl Dataset {
    pub fn new(individuals: Vec<IndividualRecord>, fecundity: Vec<FecundityRecord>) -> Self {
        Dataset { individuals, fecundity }
    }

    /// Precondition of every analysis: periods within `MAX_DAYS`, egg counts
    /// finite and non-negative.
    pub fn validate(&self) -> Result<()> {
        if let Some(bad) =
            self.individuals.iter().find(|r| r.immature_days > MAX_DAYS || r.adult_days > MAX_DAYS)
        {
            return Err(Error::InvalidInput(format!(
                "individual {} in treatment {} has a period longer than {} days",
                bad.id, bad.treatment, MAX_DAYS
            )));
        }
        if let Some(bad) = self.fecundity.iter().find(|r| !r.eggs.is_finite() || r.eggs < 0.0) {
            return Err(Error::InvalidInput(format!(
                "egg count {} for female {} in treatment {} is not a non-negative number",
                bad.eggs, bad.female_id, bad.treatment
            )));
        }
        Ok(())
    }

    /// Sorted distinct treatment labels of the individuals table.
    pub fn treatments(&self) -> Vec<String> {
        let mut trts: Vec<String> = self.individuals.iter().map(|r| r.treatment.clone()).collect();
        trts.sort();
        trts.dedup();
        trts
    }
}

// === OUTPUT RECORDS ===

/// A derived value that may be undefined (doubling time when rm <= 0).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Estimate {
    Value(f64),
    Unavailable,
}

impl Estimate {
    pub fn value(self) -> Option<f64> {
        match self {
            Estimate::Value(v) => Some(v),
            Estimate::Unavailable => None,
        }
    }

    pub fn is_available(self) -> bool {
        matches!(self, Estimate::Value(_))
    }
}

impl Serialize for Estimate {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Estimate::Value(v) => serializer.serialize_some(v),
            Estimate::Unavailable => serializer.serialize_none(),
        }
    }
}

impl fmt::Display for Estimate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Estimate::Value(v) => write!(f, "{:.4}", v),
            Estimate::Unavailable => write!(f, "NA"),
        }
    }
}

/// Age-indexed curves of one treatment. All four vectors share the age axis.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CurveBundle {
    pub age: Vec<u32>,
    pub lx: Vec<f64>,
    pub mx: Vec<f64>,
    pub ex: Vec<f64>,
}

/// One line of the life-table summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryRow {
    #[serde(rename = "Treatment")]
    pub treatment: String,
    #[serde(rename = "R0")]
    pub r0: f64,
    #[serde(rename = "T")]
    pub t: f64,
    pub rm: f64,
    pub lambda: f64,
    #[serde(rename = "DT")]
    pub dt: Estimate,
    pub e0: f64,
    pub mean_lifespan: f64,
    pub n_individuals: usize,
}

// === BOOTSTRAP PARAMETERS ===

/// The five parameters collected on every bootstrap iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Parameter {
    R0,
    T,
    Rm,
    Lambda,
    Dt,
}

impl Parameter {
    pub const ALL: [Parameter; 5] = [
        Parameter::R0,
        Parameter::T,
        Parameter::Rm,
        Parameter::Lambda,
        Parameter::Dt,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Parameter::R0 => "R0",
            Parameter::T => "T",
            Parameter::Rm => "rm",
            Parameter::Lambda => "lambda",
            Parameter::Dt => "DT",
        }
    }
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Serialize for Parameter {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl FromStr for Parameter {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "r0" => Ok(Parameter::R0),
            "t" => Ok(Parameter::T),
            "rm" => Ok(Parameter::Rm),
            "lambda" | "λ" => Ok(Parameter::Lambda),
            "dt" => Ok(Parameter::Dt),
            _ => Err(Error::InvalidInput(format!(
                "unknown parameter '{}' (expected R0, T, rm, lambda or DT)",
                s
            ))),
        }
    }
}

/// (R0, T, rm, lambda, DT) from one bootstrap iteration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamTuple {
    pub r0: f64,
    pub t: f64,
    pub rm: f64,
    pub lambda: f64,
    pub dt: Estimate,
}

impl ParamTuple {
    pub fn from_row(row: &SummaryRow) -> Self {
        ParamTuple {
            r0: row.r0,
            t: row.t,
            rm: row.rm,
            lambda: row.lambda,
            dt: row.dt,
        }
    }

    /// Value of `param`, or None when it is unavailable or not finite.
    pub fn get(&self, param: Parameter) -> Option<f64> {
        let v = match param {
            Parameter::R0 => Some(self.r0),
            Parameter::T => Some(self.t),
            Parameter::Rm => Some(self.rm),
            Parameter::Lambda => Some(self.lambda),
            Parameter::Dt => self.dt.value(),
        };
        v.filter(|x| x.is_finite())
    }
}
