//! Life tables per experimental treatment with bootstrap inference.
//!
//! - [`lifetable`]: survivorship, fecundity and life expectancy of one cohort,
//!   plus R0, T, rm, lambda and doubling time.
//! - [`treatment`]: one life table per treatment of a mixed dataset.
//! - [`bootstrap`]: individual + per-female cluster resampling of the
//!   parameters, with progress reporting and cancellation.
//! - [`compare`]: pairwise bootstrap tests, letter groupings, mean ± SE.
//! - [`loader`] / [`export`]: CSV boundary.

pub mod bootstrap;
pub mod compare;
pub mod error;
pub mod export;
pub mod lifetable;
pub mod loader;
pub mod records;
pub mod treatment;

pub use bootstrap::{bootstrap_params, BootstrapConfig, BootstrapSampleSet, CancelToken};
pub use compare::{cld_from_pmatrix, pairwise_compare, summarize_boot};
pub use error::{Error, Result};
pub use lifetable::life_table;
pub use records::{
    CurveBundle, Dataset, Estimate, FecundityRecord, IndividualRecord, ParamTuple, Parameter, Sex,
    SummaryRow,
};
pub use treatment::{analyze_by_treatment, Analysis};
