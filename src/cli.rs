//! Command-line front end: argument parsing and console output.

use std::error::Error;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use clap::{Parser, Subcommand};
use tracing::info;

use lifetable::bootstrap::{bootstrap_params, BootstrapConfig, DEFAULT_N_BOOT};
use lifetable::compare::{formatted_table, letters_by_mean, pairwise_compare, FORMATTED_HEADERS};
use lifetable::records::{Dataset, Parameter, SummaryRow};
use lifetable::treatment::{analyze_by_treatment, Analysis};
use lifetable::{export, loader};

pub const DEFAULT_ALPHA: f64 = 0.05;

#[derive(Parser)]
#[command(name = "lifetable")]
#[command(about = "Life tables per treatment with bootstrap comparisons")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(clap::Args)]
pub struct Inputs {
    /// Individuals CSV (Treatment, ID, Sex, ImmatureDays, AdultDays)
    #[arg(long, short = 'i')]
    pub individuals: PathBuf,

    /// Fecundity CSV (Treatment, FemaleID, AdultDay, Eggs)
    #[arg(long, short = 'f')]
    pub fecundity: PathBuf,

    /// Directory for CSV exports
    #[arg(long, short = 'o')]
    pub out: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Life table and population parameters per treatment
    Analyze {
        #[command(flatten)]
        inputs: Inputs,
    },
    /// Bootstrap the parameters and compare treatments
    Bootstrap {
        #[command(flatten)]
        inputs: Inputs,

        /// Number of bootstrap iterations
        #[arg(long, short = 'n', default_value_t = DEFAULT_N_BOOT)]
        n_boot: usize,

        /// Seed for a reproducible run
        #[arg(long, short = 's')]
        seed: Option<u64>,

        /// Significance level for comparisons and letters
        #[arg(long, short = 'a', default_value_t = DEFAULT_ALPHA)]
        alpha: f64,

        /// Parameter shown in the pairwise table (R0, T, rm, lambda, DT)
        #[arg(long, short = 'p', default_value = "R0")]
        param: Parameter,

        /// Stop after this many seconds and keep the samples drawn so far
        #[arg(long)]
        time_limit: Option<u64>,
    },
}

pub fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    match cli.command {
        Command::Analyze { inputs } => {
            let data = loader::read_dataset(&inputs.individuals, &inputs.fecundity)?;
            let analysis = analyze_by_treatment(&data)?;
            print_summary(&analysis);
            if let Some(dir) = &inputs.out {
                for path in export::write_analysis(dir, &analysis)? {
                    println!(">> Saved: {}", path.display());
                }
            }
        }
        Command::Bootstrap { inputs, n_boot, seed, alpha, param, time_limit } => {
            if !(alpha > 0.0 && alpha < 1.0) {
                return Err(format!("alpha must be in (0, 1), got {}", alpha).into());
            }
            let data = loader::read_dataset(&inputs.individuals, &inputs.fecundity)?;
            let analysis = analyze_by_treatment(&data)?;
            print_summary(&analysis);
            run_bootstrap(&data, &inputs, n_boot, seed, alpha, param, time_limit, &analysis)?;
        }
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn run_bootstrap(
    data: &Dataset,
    inputs: &Inputs,
    n_boot: usize,
    seed: Option<u64>,
    alpha: f64,
    param: Parameter,
    time_limit: Option<u64>,
    analysis: &Analysis,
) -> Result<(), Box<dyn Error>> {
    println!("\n--- Running Bootstrap (n={}, alpha={}) ---", n_boot, alpha);

    let config = BootstrapConfig { n_boot, seed };
    let mut last_decile = 0;
    let mut progress = |done: usize, total: usize| {
        let decile = done * 10 / total.max(1);
        if decile > last_decile {
            last_decile = decile;
            info!("progress {}%", decile * 10);
        }
    };
    let started = Instant::now();
    let limit = time_limit.map(Duration::from_secs);
    let cancel = || limit.is_some_and(|l| started.elapsed() >= l);

    let samples = bootstrap_params(data, &config, &mut progress, &cancel)?;
    let drawn = samples.min_len();
    if drawn < n_boot {
        println!("Stopped early: {} of {} iterations", drawn, n_boot);
    }

    print_pairwise(&samples, param);
    print_letters(&samples, param, alpha);
    print_means(&samples, alpha);

    if let Some(dir) = &inputs.out {
        let mut saved = export::write_analysis(dir, analysis)?;
        saved.extend(export::write_bootstrap(dir, &samples, alpha)?);
        for path in saved {
            println!(">> Saved: {}", path.display());
        }
    }
    Ok(())
}

// === CONSOLE OUTPUT ===

fn print_summary(analysis: &Analysis) {
    println!("\n==========================================");
    println!("   LIFE TABLE SUMMARY");
    println!("==========================================\n");
    println!(
        "{:<12} {:>9} {:>8} {:>8} {:>8} {:>8} {:>8} {:>9} {:>5}",
        "Treatment", "R0", "T", "rm", "lambda", "DT", "e0", "lifespan", "n"
    );
    for row in &analysis.summary {
        print_row(row);
    }
}

fn print_row(r: &SummaryRow) {
    println!(
        "{:<12} {:>9.3} {:>8.3} {:>8.4} {:>8.4} {:>8} {:>8.2} {:>9.2} {:>5}",
        r.treatment,
        r.r0,
        r.t,
        r.rm,
        r.lambda,
        r.dt.value().map_or("NA".to_string(), |v| format!("{:.2}", v)),
        r.e0,
        r.mean_lifespan,
        r.n_individuals
    );
}

fn print_pairwise(samples: &lifetable::BootstrapSampleSet, param: Parameter) {
    println!("\n--- Pairwise comparisons: {} (95% CI, p_bootstrap) ---", param);
    let rows = pairwise_compare(samples, param);
    if rows.is_empty() {
        println!("No comparable pairs.");
        return;
    }
    for r in rows {
        println!(
            "{} vs {}: diff {:.4} ({:.4} to {:.4})  p = {:.4}  n = {}",
            r.a, r.b, r.diff, r.ci_low, r.ci_high, r.p_bootstrap, r.n_boot
        );
    }
}

fn print_letters(samples: &lifetable::BootstrapSampleSet, param: Parameter, alpha: f64) {
    println!("\n--- Letters: {} (alpha = {}) ---", param, alpha);
    for c in letters_by_mean(samples, param, alpha) {
        println!("{:<12} {}", c.treatment, c.letter);
    }
}

fn print_means(samples: &lifetable::BootstrapSampleSet, alpha: f64) {
    println!("\n--- Means ± SE (bootstrap) ---");
    println!("{}", FORMATTED_HEADERS.join(" | "));
    for row in formatted_table(samples, alpha) {
        println!("{} | {}", row.treatment, row.cells.join(" | "));
    }
}
