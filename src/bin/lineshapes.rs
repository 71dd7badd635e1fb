//! Linear absorption lineshapes over a sweep of bath parameters.
//!
//! ```bash
//! # Default sweep: three-site system, HEOM / TCL2 / TC2 at omega_c in {0.1, 0.3, 1.0}, beta in {1, 3}
//! lineshapes --output-dir spectra
//!
//! # Custom sweep
//! lineshapes --config sweep.toml --jobs 4 --verbose
//! ```

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use log::{error, info, LevelFilter};
use qrho::config::Config;
use rayon::prelude::*;
use simple_logger::SimpleLogger;

#[derive(Parser, Debug)]
#[command(name = "lineshapes", about = "Absorption lineshapes from Redfield and HEOM propagation")]
struct Cli {
    /// TOML sweep configuration; the built-in three-site sweep if omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory for the spectrum files, overriding the configuration
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Number of jobs run in parallel (default: all cores)
    #[arg(short, long)]
    jobs: Option<usize>,

    /// Log debug output
    #[arg(short, long)]
    verbose: bool,
}

fn run(cli: &Cli) -> qrho::Result<usize> {
    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    if let Some(dir) = &cli.output_dir {
        config.output_dir = dir.clone();
    }
    fs::create_dir_all(&config.output_dir)?;

    let jobs = config.jobs()?;
    info!("{} jobs, writing to {}", jobs.len(), config.output_dir.display());

    let failures = jobs
        .par_iter()
        .map(|job| {
            let path = config.output_dir.join(job.file_name());
            let result = job.run(&config).and_then(|spectrum| {
                for w in spectrum.warnings.iter() {
                    info!("{}: {}", job.file_name(), w);
                }
                spectrum.save(&path).map_err(qrho::Error::from)
            });
            match result {
                Ok(()) => {
                    info!("wrote {}", path.display());
                    0
                }
                Err(e) => {
                    error!("{} failed: {}", job.file_name(), e);
                    1
                }
            }
        })
        .sum();
    Ok(failures)
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let level = if cli.verbose { LevelFilter::Debug } else { LevelFilter::Info };
    if let Err(e) = SimpleLogger::new().with_level(level).init() {
        eprintln!("could not install logger: {}", e);
    }
    if let Some(n) = cli.jobs {
        if let Err(e) = rayon::ThreadPoolBuilder::new().num_threads(n).build_global() {
            error!("could not size the thread pool: {}", e);
        }
    }

    match run(&cli) {
        Ok(0) => ExitCode::SUCCESS,
        Ok(failed) => {
            error!("{} job(s) failed", failed);
            ExitCode::FAILURE
        }
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
