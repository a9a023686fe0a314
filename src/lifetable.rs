//! Life table of a single treatment: survivorship, fecundity, life expectancy
//! and the derived population parameters (R0, T, rm, lambda, DT).
//!
//! Conventions:
//! - lx[x] is the fraction of the cohort alive *beyond* age x (lifespan > x),
//!   so lx[0] < 1 whenever some individual has a lifespan of zero.
//! - Lx uses the midpoint (lx[x] + lx[x+1]) / 2 with lx past the last age = 0.
//! - Fecundity days are shifted to absolute age by the treatment's mean
//!   immature period, rounded half away from zero.

use std::collections::BTreeMap;

use tracing::debug;

use crate::records::{CurveBundle, Estimate, FecundityRecord, IndividualRecord, SummaryRow};

// === ROOT FINDER BOUNDS ===

const BRACKET_LOW: f64 = -1.0;
const BRACKET_HIGH: f64 = 1.0;
const BRACKET_STEP: f64 = 1.0;
const MAX_BRACKET_EXPANSIONS: usize = 10;
const MAX_BISECTIONS: usize = 60;
const ROOT_TOLERANCE: f64 = 1e-8;

// === LIFE TABLE ===

/// Build the summary row and curves for one treatment.
///
/// Both slices must already be restricted to `treatment`. Empty cohorts,
/// all-male cohorts and zero fecundity produce fallback values, never errors.
pub fn life_table(
    treatment: &str,
    individuals: &[&IndividualRecord],
    fecundity: &[&FecundityRecord],
) -> (SummaryRow, CurveBundle) {
    let n0 = individuals.len();
    let lifespans: Vec<u32> = individuals.iter().map(|r| r.lifespan()).collect();
    let max_age = lifespans.iter().copied().max().unwrap_or(0);
    let ages: Vec<u32> = (0..=max_age).collect();

    let lx: Vec<f64> = ages
        .iter()
        .map(|&x| {
            if n0 == 0 {
                return 0.0;
            }
            let alive = lifespans.iter().filter(|&&l| l > x).count();
            alive as f64 / n0 as f64
        })
        .collect();

    let mx = fecundity_schedule(individuals, fecundity, max_age);
    let ex = life_expectancy(&lx);

    let r0: f64 = lx.iter().zip(&mx).map(|(l, m)| l * m).sum();
    let t = if r0 > 0.0 {
        ages.iter()
            .zip(lx.iter().zip(&mx))
            .map(|(&x, (l, m))| x as f64 * l * m)
            .sum::<f64>()
            / r0
    } else {
        0.0
    };

    let rm = intrinsic_rate(&lx, &mx);
    let lambda = rm.exp();
    let dt = if rm > 0.0 {
        Estimate::Value(std::f64::consts::LN_2 / rm)
    } else {
        Estimate::Unavailable
    };

    let e0 = ex.first().copied().unwrap_or(0.0);
    let mean_lifespan = if n0 > 0 {
        lifespans.iter().map(|&l| l as f64).sum::<f64>() / n0 as f64
    } else {
        0.0
    };

    if n0 == 0 {
        debug!(treatment, "empty cohort, life table is degenerate");
    } else if r0 == 0.0 {
        debug!(treatment, "R0 is zero, T and DT fall back");
    }

    let row = SummaryRow {
        treatment: treatment.to_string(),
        r0,
        t,
        rm,
        lambda,
        dt,
        e0,
        mean_lifespan,
        n_individuals: n0,
    };
    let curves = CurveBundle { age: ages, lx, mx, ex };
    (row, curves)
}

/// Per-capita eggs per absolute age, divided by the number of females.
fn fecundity_schedule(
    individuals: &[&IndividualRecord],
    fecundity: &[&FecundityRecord],
    max_age: u32,
) -> Vec<f64> {
    let mut mx = vec![0.0; max_age as usize + 1];
    let fem0 = individuals.iter().filter(|r| r.sex.is_female()).count();
    if fem0 == 0 || fecundity.is_empty() {
        if fem0 == 0 && !fecundity.is_empty() {
            debug!(records = fecundity.len(), "no females, fecundity ignored");
        }
        return mx;
    }

    let mean_immature =
        individuals.iter().map(|r| r.immature_days as f64).sum::<f64>() / individuals.len() as f64;
    let shift = mean_immature.round() as i64;

    let mut eggs_by_age: BTreeMap<i64, f64> = BTreeMap::new();
    for rec in fecundity {
        *eggs_by_age.entry(rec.adult_day as i64 + shift).or_insert(0.0) += rec.eggs;
    }

    let denom = fem0.max(1) as f64;
    for (age, eggs) in eggs_by_age {
        if (0..=max_age as i64).contains(&age) {
            mx[age as usize] = eggs / denom;
        }
    }
    mx
}

/// ex[x] = Tx[x] / lx[x], where Tx is the reverse cumulative sum of Lx.
fn life_expectancy(lx: &[f64]) -> Vec<f64> {
    let big_lx: Vec<f64> = (0..lx.len())
        .map(|i| (lx[i] + lx.get(i + 1).copied().unwrap_or(0.0)) / 2.0)
        .collect();

    let mut tx = vec![0.0; big_lx.len()];
    let mut acc = 0.0;
    for i in (0..big_lx.len()).rev() {
        acc += big_lx[i];
        tx[i] = acc;
    }

    lx.iter()
        .zip(&tx)
        .map(|(&l, &t)| if l > 0.0 { t / l } else { 0.0 })
        .collect()
}

/// Root of the Euler-Lotka equation sum(lx * mx * e^(-r x)) = 1 by bisection.
///
/// Returns 0.0 when no sign-changing bracket is found.
pub fn intrinsic_rate(lx: &[f64], mx: &[f64]) -> f64 {
    // Ages with zero net maternity contribute nothing; skipping them keeps
    // e^(-r x) overflow at wide brackets from turning the sum into NaN.
    let terms: Vec<(f64, f64)> = lx
        .iter()
        .zip(mx)
        .enumerate()
        .map(|(x, (l, m))| (x as f64, l * m))
        .filter(|&(_, w)| w != 0.0)
        .collect();
    let g = |r: f64| terms.iter().map(|&(x, w)| w * (-r * x).exp()).sum::<f64>() - 1.0;

    let (mut lo, mut hi) = (BRACKET_LOW, BRACKET_HIGH);
    let (mut f_lo, mut f_hi) = (g(lo), g(hi));
    let mut tries = 0;
    while f_lo * f_hi > 0.0 && tries < MAX_BRACKET_EXPANSIONS {
        lo -= BRACKET_STEP;
        hi += BRACKET_STEP;
        f_lo = g(lo);
        f_hi = g(hi);
        tries += 1;
    }

    let bracketed = f_lo * f_hi <= 0.0;
    if !bracketed {
        debug!(lo, hi, "no sign change for rm, using 0");
        return 0.0;
    }

    for _ in 0..MAX_BISECTIONS {
        let mid = (lo + hi) / 2.0;
        let f_mid = g(mid);
        if f_mid.abs() < ROOT_TOLERANCE {
            break;
        }
        if f_lo * f_mid <= 0.0 {
            hi = mid;
        } else {
            lo = mid;
            f_lo = f_mid;
        }
    }
    (lo + hi) / 2.0
}
