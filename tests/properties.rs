//! Property checks on single-treatment life tables.

use lifetable::{life_table, Estimate, FecundityRecord, IndividualRecord, Sex};
use proptest::prelude::*;
use proptest::test_runner::Config as ProptestConfig;

fn cohort_strategy() -> impl Strategy<Value = Vec<IndividualRecord>> {
    prop::collection::vec((any::<bool>(), 0u32..15, 0u32..30), 0..25).prop_map(|rows| {
        rows.into_iter()
            .enumerate()
            .map(|(i, (female, imm, adult))| {
                let sex = if female { Sex::Female } else { Sex::Male };
                IndividualRecord::new("A", &i.to_string(), sex, imm, adult)
            })
            .collect()
    })
}

fn eggs_strategy() -> impl Strategy<Value = Vec<FecundityRecord>> {
    prop::collection::vec((0u32..25, 0u32..40, 0.0f64..50.0), 0..40).prop_map(|rows| {
        rows.into_iter()
            .map(|(id, day, eggs)| FecundityRecord::new("A", &id.to_string(), day, eggs))
            .collect()
    })
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 128, ..ProptestConfig::default() })]

    #[test]
    fn curves_are_aligned_and_bounded(cohort in cohort_strategy(), eggs in eggs_strategy()) {
        let inds: Vec<_> = cohort.iter().collect();
        let fec: Vec<_> = eggs.iter().collect();
        let (row, c) = life_table("A", &inds, &fec);

        let n = c.age.len();
        prop_assert!(c.lx.len() == n && c.mx.len() == n && c.ex.len() == n);
        prop_assert!(c.lx.iter().all(|&l| (0.0..=1.0).contains(&l)));
        prop_assert!(c.lx.windows(2).all(|w| w[1] <= w[0]));
        prop_assert!(c.mx.iter().all(|&m| m >= 0.0));
        prop_assert!(c.ex.iter().all(|&e| e >= 0.0 && e.is_finite()));
        prop_assert_eq!(*c.lx.last().unwrap(), 0.0);

        let r0: f64 = c.lx.iter().zip(&c.mx).map(|(l, m)| l * m).sum();
        prop_assert!((row.r0 - r0).abs() < 1e-9);
        prop_assert!((row.lambda - row.rm.exp()).abs() < 1e-12);
        prop_assert_eq!(row.n_individuals, cohort.len());
    }

    #[test]
    fn doubling_time_only_for_growth(cohort in cohort_strategy(), eggs in eggs_strategy()) {
        let inds: Vec<_> = cohort.iter().collect();
        let fec: Vec<_> = eggs.iter().collect();
        let (row, _) = life_table("A", &inds, &fec);
        match row.dt {
            Estimate::Value(dt) => {
                prop_assert!(row.rm > 0.0);
                prop_assert!((dt * row.rm - std::f64::consts::LN_2).abs() < 1e-9);
            }
            Estimate::Unavailable => prop_assert!(row.rm <= 0.0),
        }
    }

    #[test]
    fn males_only_never_reproduce(
        cohort in cohort_strategy().prop_map(|v| {
            v.into_iter().map(|mut r| { r.sex = Sex::Male; r }).collect::<Vec<_>>()
        }),
        eggs in eggs_strategy(),
    ) {
        let inds: Vec<_> = cohort.iter().collect();
        let fec: Vec<_> = eggs.iter().collect();
        let (row, c) = life_table("A", &inds, &fec);
        prop_assert!(c.mx.iter().all(|&m| m == 0.0));
        prop_assert_eq!(row.r0, 0.0);
        prop_assert_eq!(row.rm, 0.0);
        prop_assert_eq!(row.lambda, 1.0);
        prop_assert_eq!(row.dt, Estimate::Unavailable);
    }
}
