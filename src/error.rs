//! Error type shared by the loader, the engine and the exporters.
//!
//! Degenerate demographic input (no individuals, no females, R0 = 0, no root
//! bracket) is never an error: the engine answers with fallback values.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("{table} table is missing required columns: {}", missing.join(", "))]
    Schema { table: &'static str, missing: Vec<String> },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("bootstrap iteration {iteration} failed: {source}")]
    Bootstrap {
        iteration: usize,
        #[source]
        source: Box<Error>,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
