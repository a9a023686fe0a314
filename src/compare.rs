//! Pairwise bootstrap comparisons, letter groupings and mean ± SE tables.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::Serialize;

use crate::bootstrap::BootstrapSampleSet;
use crate::records::Parameter;

// === STATISTICAL HELPERS ===

/// Percentile with linear interpolation between order statistics.
pub fn percentile(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return f64::NAN;
    }
    let pos = q / 100.0 * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}

/// Mean of the finite values, NaN if there are none.
pub fn finite_mean(values: &[f64]) -> f64 {
    let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.is_empty() {
        return f64::NAN;
    }
    finite.iter().sum::<f64>() / finite.len() as f64
}

// === PAIRWISE COMPARISONS ===

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PairwiseComparison {
    pub param: Parameter,
    #[serde(rename = "A")]
    pub a: String,
    #[serde(rename = "B")]
    pub b: String,
    pub diff: f64,
    pub ci_low: f64,
    pub ci_high: f64,
    pub p_bootstrap: f64,
    pub n_boot: usize,
}

/// Compare every pair of treatments on `param` using paired bootstrap draws.
///
/// Draws are aligned by iteration up to the shorter sample; positions where
/// either value is missing are skipped. Differences are B - A with A < B in
/// label order. Pairs without a usable draw are left out.
pub fn pairwise_compare(samples: &BootstrapSampleSet, param: Parameter) -> Vec<PairwiseComparison> {
    let trs: Vec<&str> = samples.treatments().collect();
    let mut rows = Vec::new();

    for i in 0..trs.len() {
        for j in (i + 1)..trs.len() {
            let a = samples.column(trs[i], param);
            let b = samples.column(trs[j], param);
            let n = a.len().min(b.len());
            if n == 0 {
                continue;
            }

            let mut d: Vec<f64> = a[..n]
                .iter()
                .zip(&b[..n])
                .filter(|(x, y)| x.is_finite() && y.is_finite())
                .map(|(x, y)| y - x)
                .collect();
            if d.is_empty() {
                continue;
            }

            let m = d.len() as f64;
            let le = d.iter().filter(|&&v| v <= 0.0).count() as f64 / m;
            let ge = d.iter().filter(|&&v| v >= 0.0).count() as f64 / m;
            let diff = d.iter().sum::<f64>() / m;
            d.sort_by(|x, y| x.partial_cmp(y).unwrap_or(Ordering::Equal));

            rows.push(PairwiseComparison {
                param,
                a: trs[i].to_string(),
                b: trs[j].to_string(),
                diff,
                ci_low: percentile(&d, 2.5),
                ci_high: percentile(&d, 97.5),
                p_bootstrap: 2.0 * le.min(ge),
                n_boot: n,
            });
        }
    }
    rows
}

// === COMPACT LETTER DISPLAY ===

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CldAssignment {
    #[serde(rename = "Treatment")]
    pub treatment: String,
    #[serde(rename = "Letter")]
    pub letter: char,
}

/// Single-pass letter assignment along `ordered` (ascending means).
///
/// The first treatment gets 'a'. Each later treatment is checked against the
/// ones before it; the first significant comparison (p < alpha) moves it to
/// the next letter, otherwise it keeps the current one. Letters therefore
/// never decrease along the ordering and each treatment gets exactly one.
/// This is an approximation of a compact letter display, not the full
/// insert-absorb algorithm: treatments sharing a letter may still differ.
pub fn cld_from_pmatrix(
    ordered: &[String],
    comparisons: &[PairwiseComparison],
    alpha: f64,
) -> Vec<CldAssignment> {
    let p_value = |x: &str, y: &str| {
        comparisons
            .iter()
            .find(|c| (c.a == x && c.b == y) || (c.a == y && c.b == x))
            .map(|c| c.p_bootstrap)
    };

    let mut out = Vec::with_capacity(ordered.len());
    let mut current = 'a';
    for (i, trt) in ordered.iter().enumerate() {
        if i > 0 {
            let differs = ordered[..i]
                .iter()
                .any(|prev| p_value(prev.as_str(), trt.as_str()).is_some_and(|p| p < alpha));
            if differs {
                current = char::from_u32(current as u32 + 1).unwrap_or(current);
            }
        }
        out.push(CldAssignment { treatment: trt.clone(), letter: current });
    }
    out
}

/// Order treatments by the mean of `param` and assign letters.
///
/// Treatments whose mean is undefined go last. Returns nothing when no pair
/// could be compared.
pub fn letters_by_mean(samples: &BootstrapSampleSet, param: Parameter, alpha: f64) -> Vec<CldAssignment> {
    let comparisons = pairwise_compare(samples, param);
    if comparisons.is_empty() {
        return Vec::new();
    }

    let mut means: Vec<(String, f64)> = samples
        .treatments()
        .map(|t| (t.to_string(), finite_mean(&samples.column(t, param))))
        .collect();
    means.sort_by(|(ta, ma), (tb, mb)| match (ma.is_nan(), mb.is_nan()) {
        (false, false) => ma.partial_cmp(mb).unwrap_or(Ordering::Equal).then_with(|| ta.cmp(tb)),
        (true, true) => ta.cmp(tb),
        (false, true) => Ordering::Less,
        (true, false) => Ordering::Greater,
    });

    let ordered: Vec<String> = means.into_iter().map(|(t, _)| t).collect();
    cld_from_pmatrix(&ordered, &comparisons, alpha)
}

// === MEAN ± SE ===

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeanSe {
    pub mean: f64,
    /// Standard error of the mean; NaN with fewer than two values.
    pub se: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BootSummary {
    pub treatment: String,
    /// One entry per parameter, in `Parameter::ALL` order.
    pub stats: [MeanSe; 5],
}

impl BootSummary {
    pub fn stat(&self, param: Parameter) -> MeanSe {
        let idx = Parameter::ALL.iter().position(|&p| p == param).unwrap_or(0);
        self.stats[idx]
    }
}

fn mean_se(values: &[f64]) -> MeanSe {
    let n = values.len();
    if n == 0 {
        return MeanSe { mean: f64::NAN, se: f64::NAN };
    }
    let mean = values.iter().sum::<f64>() / n as f64;
    if n < 2 {
        return MeanSe { mean, se: f64::NAN };
    }
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
    MeanSe { mean, se: var.sqrt() / (n as f64).sqrt() }
}

/// Mean and standard error of every parameter for every treatment.
///
/// Only finite values count; DT additionally drops non-positive values.
pub fn summarize_boot(samples: &BootstrapSampleSet) -> Vec<BootSummary> {
    samples
        .treatments()
        .map(|trt| {
            let stats = Parameter::ALL.map(|p| {
                let values: Vec<f64> = samples
                    .get(trt)
                    .iter()
                    .filter_map(|t| t.get(p))
                    .filter(|&v| p != Parameter::Dt || v > 0.0)
                    .collect();
                mean_se(&values)
            });
            BootSummary { treatment: trt.to_string(), stats }
        })
        .collect()
}

// === FORMATTED TABLE ===

pub const FORMATTED_HEADERS: [&str; 6] =
    ["Treatment", "R0 (±SE)", "T (±SE)", "rm (±SE)", "λ (±SE)", "DT (±SE)"];

#[derive(Debug, Clone, PartialEq)]
pub struct FormattedRow {
    pub treatment: String,
    pub cells: Vec<String>,
}

/// Format to `digits` significant digits, switching to exponent notation for
/// very small or large magnitudes.
pub fn fmt_sig(v: f64, digits: usize) -> String {
    if v == 0.0 || !v.is_finite() {
        return format!("{}", v);
    }
    let digits = digits.max(1);
    // round first so 999.7 reports as 1e+03 rather than 1000
    let rounded: f64 = format!("{:.*e}", digits - 1, v).parse().unwrap_or(v);
    let exp = rounded.abs().log10().floor() as i32;
    if exp < -4 || exp >= digits as i32 {
        let mantissa = rounded / 10f64.powi(exp);
        let m = trim_zeros(format!("{:.*}", digits - 1, mantissa));
        let sign = if exp < 0 { '-' } else { '+' };
        format!("{}e{}{:02}", m, sign, exp.abs())
    } else {
        let decimals = (digits as i32 - 1 - exp).max(0) as usize;
        trim_zeros(format!("{:.*}", decimals, rounded))
    }
}

fn trim_zeros(s: String) -> String {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.').to_string()
    } else {
        s
    }
}

/// Rows of "mean ± SE letter" per parameter, "–" where undefined.
pub fn formatted_table(samples: &BootstrapSampleSet, alpha: f64) -> Vec<FormattedRow> {
    let letters: BTreeMap<Parameter, BTreeMap<String, char>> = Parameter::ALL
        .iter()
        .map(|&p| {
            let by_trt = letters_by_mean(samples, p, alpha)
                .into_iter()
                .map(|c| (c.treatment, c.letter))
                .collect();
            (p, by_trt)
        })
        .collect();

    summarize_boot(samples)
        .into_iter()
        .map(|s| {
            let cells = Parameter::ALL
                .iter()
                .map(|&p| {
                    let ms = s.stat(p);
                    if ms.mean.is_nan() || ms.se.is_nan() {
                        return "–".to_string();
                    }
                    let mut cell = format!("{} ± {}", fmt_sig(ms.mean, 3), fmt_sig(ms.se, 3));
                    if let Some(letter) = letters.get(&p).and_then(|m| m.get(&s.treatment)) {
                        cell.push(' ');
                        cell.push(*letter);
                    }
                    cell
                })
                .collect();
            FormattedRow { treatment: s.treatment, cells }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{Estimate, ParamTuple};

    fn tuple(r0: f64) -> ParamTuple {
        let rm = if r0 > 0.0 { r0.ln() / 10.0 } else { 0.0 };
        let dt = if rm > 0.0 { Estimate::Value(std::f64::consts::LN_2 / rm) } else { Estimate::Unavailable };
        ParamTuple { r0, t: 10.0, rm, lambda: rm.exp(), dt }
    }

    fn set(entries: &[(&str, Vec<f64>)]) -> BootstrapSampleSet {
        BootstrapSampleSet {
            samples: entries
                .iter()
                .map(|(t, v)| (t.to_string(), v.iter().map(|&r| tuple(r)).collect()))
                .collect(),
        }
    }

    fn comp(a: &str, b: &str, p: f64) -> PairwiseComparison {
        PairwiseComparison {
            param: Parameter::R0,
            a: a.into(),
            b: b.into(),
            diff: 0.0,
            ci_low: 0.0,
            ci_high: 0.0,
            p_bootstrap: p,
            n_boot: 100,
        }
    }

    fn names(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_percentile_interpolates() {
        let v = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(percentile(&v, 50.0), 3.0);
        assert!((percentile(&v, 2.5) - 1.1).abs() < 1e-12);
        assert!((percentile(&v, 97.5) - 4.9).abs() < 1e-12);
    }

    #[test]
    fn test_doubled_samples_are_significant() {
        let a: Vec<f64> = (1..=200).map(|i| 10.0 + (i % 7) as f64).collect();
        let b: Vec<f64> = a.iter().map(|v| v * 2.0).collect();
        let s = set(&[("A", a.clone()), ("B", b)]);
        let rows = pairwise_compare(&s, Parameter::R0);
        assert_eq!(rows.len(), 1);
        let r = &rows[0];
        assert_eq!((r.a.as_str(), r.b.as_str()), ("A", "B"));
        let expected = a.iter().sum::<f64>() / a.len() as f64;
        assert!((r.diff - expected).abs() < 1e-9);
        assert!(r.ci_low > 0.0);
        assert_eq!(r.p_bootstrap, 0.0);
        assert_eq!(r.n_boot, 200);
    }

    #[test]
    fn test_identical_samples_have_p_two() {
        let s = set(&[("A", vec![1.0, 2.0]), ("B", vec![1.0, 2.0])]);
        let rows = pairwise_compare(&s, Parameter::R0);
        // all differences are zero, both tails count every draw
        assert_eq!(rows[0].p_bootstrap, 2.0);
    }

    #[test]
    fn test_pairs_align_to_shorter_sample() {
        let s = set(&[("A", vec![1.0, 1.0, 1.0]), ("B", vec![2.0])]);
        let rows = pairwise_compare(&s, Parameter::R0);
        assert_eq!(rows[0].n_boot, 1);
        assert_eq!(rows[0].diff, 1.0);
    }

    #[test]
    fn test_pairs_without_usable_draws_are_omitted() {
        // r0 = 1 gives rm = 0, so DT is unavailable everywhere
        let s = set(&[("A", vec![1.0, 1.0]), ("B", vec![5.0, 6.0]), ("C", vec![])]);
        assert!(pairwise_compare(&s, Parameter::Dt).is_empty());
        assert_eq!(pairwise_compare(&s, Parameter::R0).len(), 1);
    }

    #[test]
    fn test_cld_all_similar_share_letter() {
        let comps = vec![comp("a", "b", 0.5), comp("a", "c", 0.2), comp("b", "c", 0.9)];
        let cld = cld_from_pmatrix(&names(&["a", "b", "c"]), &comps, 0.05);
        let letters: Vec<char> = cld.iter().map(|c| c.letter).collect();
        assert_eq!(letters, vec!['a', 'a', 'a']);
    }

    #[test]
    fn test_cld_first_vs_third_only() {
        let comps = vec![comp("a", "b", 0.5), comp("a", "c", 0.01), comp("b", "c", 0.3)];
        let cld = cld_from_pmatrix(&names(&["a", "b", "c"]), &comps, 0.05);
        let letters: Vec<char> = cld.iter().map(|c| c.letter).collect();
        assert_eq!(letters, vec!['a', 'a', 'b']);
    }

    #[test]
    fn test_cld_looks_up_pairs_in_either_order() {
        let comps = vec![comp("y", "x", 0.001)];
        let cld = cld_from_pmatrix(&names(&["x", "y"]), &comps, 0.05);
        assert_eq!(cld[1].letter, 'b');
    }

    #[test]
    fn test_cld_empty_order() {
        assert!(cld_from_pmatrix(&[], &[], 0.05).is_empty());
    }

    #[test]
    fn test_letters_follow_ascending_means() {
        let s = set(&[("hi", vec![50.0, 51.0, 52.0]), ("lo", vec![5.0, 6.0, 7.0])]);
        let cld = letters_by_mean(&s, Parameter::R0, 0.05);
        assert_eq!(cld[0], CldAssignment { treatment: "lo".into(), letter: 'a' });
        assert_eq!(cld[1], CldAssignment { treatment: "hi".into(), letter: 'b' });
    }

    #[test]
    fn test_single_sample_has_nan_se() {
        let s = set(&[("A", vec![4.0]), ("B", vec![6.0])]);
        for summary in summarize_boot(&s) {
            assert!(summary.stat(Parameter::R0).se.is_nan());
            assert!(summary.stat(Parameter::R0).mean.is_finite());
        }
    }

    #[test]
    fn test_se_is_std_over_root_n() {
        let s = set(&[("A", vec![2.0, 4.0, 6.0, 8.0])]);
        let ms = summarize_boot(&s)[0].stat(Parameter::R0);
        assert_eq!(ms.mean, 5.0);
        let sd = (20.0f64 / 3.0).sqrt();
        assert!((ms.se - sd / 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_dt_ignores_undefined_and_non_positive() {
        let mut s = set(&[("A", vec![1.0, 2.0, 4.0])]);
        s.samples.get_mut("A").unwrap()[2].dt = Estimate::Value(-3.0);
        let ms = summarize_boot(&s)[0].stat(Parameter::Dt);
        let only = std::f64::consts::LN_2 / (2f64.ln() / 10.0);
        assert!((ms.mean - only).abs() < 1e-9);
        assert!(ms.se.is_nan());
    }

    #[test]
    fn test_sig_digit_formatting() {
        assert_eq!(fmt_sig(12.3456, 3), "12.3");
        assert_eq!(fmt_sig(0.012345, 3), "0.0123");
        assert_eq!(fmt_sig(2.0, 3), "2");
        assert_eq!(fmt_sig(1234.0, 3), "1.23e+03");
        assert_eq!(fmt_sig(0.00001234, 3), "1.23e-05");
        assert_eq!(fmt_sig(999.7, 3), "1e+03");
    }

    #[test]
    fn test_formatted_cells_carry_letters() {
        let s = set(&[("A", vec![2.0, 3.0, 4.0]), ("B", vec![20.0, 30.0, 40.0])]);
        let rows = formatted_table(&s, 0.05);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].cells[0], "3 ± 0.577 a");
        assert_eq!(rows[1].cells[0], "30 ± 5.77 b");
        // T is constant: SE is zero, still formatted
        assert_eq!(rows[0].cells[1], "10 ± 0 a");
    }

    #[test]
    fn test_formatted_cells_dash_when_undefined() {
        let s = set(&[("A", vec![2.0])]);
        let rows = formatted_table(&s, 0.05);
        assert!(rows[0].cells.iter().all(|c| c == "–"));
    }
}
