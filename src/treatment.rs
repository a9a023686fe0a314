//! Split a mixed-treatment dataset and build one life table per treatment.

use std::collections::BTreeMap;

use crate::error::Result;
use crate::lifetable::life_table;
use crate::records::{CurveBundle, Dataset, SummaryRow};

/// Summary rows in treatment order plus the curves of every treatment.
#[derive(Debug, Clone, Default)]
pub struct Analysis {
    pub summary: Vec<SummaryRow>,
    pub curves: BTreeMap<String, CurveBundle>,
}

impl Analysis {
    pub fn row(&self, treatment: &str) -> Option<&SummaryRow> {
        self.summary.iter().find(|r| r.treatment == treatment)
    }
}

/// Run the life table for each treatment found in the individuals table.
///
/// Treatments are sorted by label. A treatment without fecundity rows still
/// gets a row with mx = 0 everywhere.
pub fn analyze_by_treatment(data: &Dataset) -> Result<Analysis> {
    data.validate()?;

    let mut analysis = Analysis::default();
    for trt in data.treatments() {
        let inds: Vec<_> = data.individuals.iter().filter(|r| r.treatment == trt).collect();
        let eggs: Vec<_> = data.fecundity.iter().filter(|r| r.treatment == trt).collect();
        let (row, curves) = life_table(&trt, &inds, &eggs);
        analysis.summary.push(row);
        analysis.curves.insert(trt, curves);
    }
    Ok(analysis)
}
