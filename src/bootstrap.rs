//! Bootstrap resampling of life-table parameters.
//!
//! Each iteration resamples every treatment independently:
//! - individuals are drawn with replacement, keeping the cohort size;
//! - fecundity records are drawn as whole females (cluster bootstrap), as
//!   many females as the treatment has, so each female's daily egg counts
//!   stay together.
//! The combined resample goes through [`analyze_by_treatment`] once and the
//! (R0, T, rm, lambda, DT) of every treatment is appended to its samples.
//!
//! The loop is synchronous. Progress and cancellation are polled on the
//! calling thread; a cancelled run returns the samples gathered so far.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::records::{Dataset, FecundityRecord, IndividualRecord, ParamTuple, Parameter};
use crate::treatment::analyze_by_treatment;

// === CONFIG ===

pub const DEFAULT_N_BOOT: usize = 1000;

#[derive(Debug, Clone)]
pub struct BootstrapConfig {
    /// Number of resampling iterations (must be positive).
    pub n_boot: usize,
    /// Fixed seed for reproducible runs; None draws from entropy.
    pub seed: Option<u64>,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        BootstrapConfig { n_boot: DEFAULT_N_BOOT, seed: None }
    }
}

// === PROGRESS & CANCELLATION ===

/// Receives (completed, total) while the bootstrap runs.
pub trait Progress {
    fn report(&mut self, completed: usize, total: usize);
}

impl<F: FnMut(usize, usize)> Progress for F {
    fn report(&mut self, completed: usize, total: usize) {
        self(completed, total)
    }
}

pub struct NoProgress;

impl Progress for NoProgress {
    fn report(&mut self, _completed: usize, _total: usize) {}
}

/// Polled before every iteration; returning true stops the run.
pub trait Cancel {
    fn is_cancelled(&self) -> bool;
}

impl<F: Fn() -> bool> Cancel for F {
    fn is_cancelled(&self) -> bool {
        self()
    }
}

pub struct NeverCancel;

impl Cancel for NeverCancel {
    fn is_cancelled(&self) -> bool {
        false
    }
}

/// Shareable flag a host can flip from another thread.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

impl Cancel for CancelToken {
    fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

// === SAMPLE SET ===

/// Per-treatment parameter tuples, one per completed iteration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BootstrapSampleSet {
    pub samples: BTreeMap<String, Vec<ParamTuple>>,
}

impl BootstrapSampleSet {
    pub fn treatments(&self) -> impl Iterator<Item = &str> {
        self.samples.keys().map(String::as_str)
    }

    pub fn get(&self, treatment: &str) -> &[ParamTuple] {
        self.samples.get(treatment).map_or(&[], Vec::as_slice)
    }

    /// Raw column for `param`: NaN where the value is unavailable.
    pub fn column(&self, treatment: &str, param: Parameter) -> Vec<f64> {
        self.get(treatment)
            .iter()
            .map(|t| t.get(param).unwrap_or(f64::NAN))
            .collect()
    }

    /// Smallest number of samples over all treatments.
    pub fn min_len(&self) -> usize {
        self.samples.values().map(Vec::len).min().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.samples.values().all(Vec::is_empty)
    }
}

// === RESAMPLING ===

struct TreatmentPool<'a> {
    individuals: Vec<&'a IndividualRecord>,
    fecundity: Vec<&'a FecundityRecord>,
    females: Vec<Vec<&'a FecundityRecord>>,
}

impl<'a> TreatmentPool<'a> {
    fn new(data: &'a Dataset, treatment: &str) -> Self {
        let individuals: Vec<_> = data.individuals.iter().filter(|r| r.treatment == treatment).collect();
        let fecundity: Vec<_> = data.fecundity.iter().filter(|r| r.treatment == treatment).collect();

        let mut by_female: BTreeMap<&str, Vec<&FecundityRecord>> = BTreeMap::new();
        for &rec in &fecundity {
            by_female.entry(rec.female_id.as_str()).or_default().push(rec);
        }
        let females = by_female.into_values().collect();

        TreatmentPool { individuals, fecundity, females }
    }

    fn resample_into<R: Rng + ?Sized>(&self, rng: &mut R, out: &mut Dataset) {
        let n = self.individuals.len();
        for _ in 0..n {
            out.individuals.push(self.individuals[rng.gen_range(0..n)].clone());
        }

        let g = self.females.len();
        if g == 0 {
            out.fecundity.extend(self.fecundity.iter().map(|&r| r.clone()));
        } else {
            for _ in 0..g {
                let group = &self.females[rng.gen_range(0..g)];
                out.fecundity.extend(group.iter().map(|&r| r.clone()));
            }
        }
    }
}

// === BOOTSTRAP LOOP ===

/// Run `config.n_boot` bootstrap iterations and collect the parameters of
/// each treatment.
///
/// A failing iteration aborts the whole run and its partial samples are
/// dropped. Cancellation is not an error.
pub fn bootstrap_params(
    data: &Dataset,
    config: &BootstrapConfig,
    progress: &mut dyn Progress,
    cancel: &dyn Cancel,
) -> Result<BootstrapSampleSet> {
    let n_boot = config.n_boot;
    if n_boot == 0 {
        return Err(Error::InvalidInput("n_boot must be a positive integer".into()));
    }

    let mut rng = match config.seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_entropy(),
    };

    let treatments = data.treatments();
    let pools: Vec<TreatmentPool> = treatments.iter().map(|t| TreatmentPool::new(data, t)).collect();

    let mut boots = BootstrapSampleSet {
        samples: treatments.iter().map(|t| (t.clone(), Vec::with_capacity(n_boot))).collect(),
    };
    let step = (n_boot / 100).max(1);

    info!(n_boot, seed = ?config.seed, treatments = treatments.len(), "bootstrap started");

    let mut completed = 0;
    for b in 0..n_boot {
        if cancel.is_cancelled() {
            info!(completed, n_boot, "bootstrap cancelled");
            break;
        }

        let mut resample = Dataset::default();
        for pool in &pools {
            pool.resample_into(&mut rng, &mut resample);
        }

        let analysis = analyze_by_treatment(&resample)
            .map_err(|e| Error::Bootstrap { iteration: b, source: Box::new(e) })?;
        for row in &analysis.summary {
            boots
                .samples
                .entry(row.treatment.clone())
                .or_default()
                .push(ParamTuple::from_row(row));
        }
        completed = b + 1;

        if b % step == 0 {
            debug!(completed, n_boot, "bootstrap progress");
            progress.report(completed, n_boot);
        }
    }

    progress.report(n_boot, n_boot);
    info!(completed, "bootstrap finished");
    Ok(boots)
}
