#[cfg(feature = "dhat-heap")]
#[global_allocator]
static ALLOC: dhat::Alloc = dhat::Alloc;

use anyhow::{Context, Result};
use ckks_column_encrypt::{CsvDirectorySource, EncryptionRun, RunConfig, RunReport};
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "ckks-column-encrypt",
    version,
    about = "Encrypt per-user numeric columns with CKKS",
    long_about = None
)]
struct Cli {
    /// Directory holding one folder per user
    data_root: Option<PathBuf>,

    /// TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Column to encrypt
    #[arg(long)]
    column: Option<String>,

    /// Encrypt files one at a time
    #[arg(long)]
    sequential: bool,

    /// Only encrypt and verify the first file of the first user
    #[arg(long)]
    probe: bool,

    /// Print the run summary as JSON
    #[arg(long)]
    json: bool,

    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> Result<()> {
    #[cfg(feature = "dhat-heap")]
    let _dhat = dhat::Profiler::new_heap();

    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let mut config = match &cli.config {
        Some(path) => RunConfig::from_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => RunConfig::default(),
    };
    if let Some(root) = cli.data_root {
        config.data_root = root;
    }
    if let Some(column) = cli.column {
        config.column = column;
    }
    if cli.sequential {
        config.parallel = false;
    }

    let source = CsvDirectorySource::from_config(&config);
    let run = EncryptionRun::new(config);
    let report = if cli.probe {
        run.probe(&source)
    } else {
        run.execute(&source)
    }
    .context("encryption run failed")?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report.summary())?);
    } else {
        print_report(&report);
    }
    Ok(())
}

fn print_report(report: &RunReport) {
    println!("parameter set : {}", report.parms_id);
    println!("key id        : {}", report.key_id);
    println!(
        "users         : {} seen, {} processed",
        report.users_seen, report.users_processed
    );
    println!(
        "encrypted     : {} files, {} batches",
        report.files_encrypted, report.batches_encrypted
    );
    for skip in &report.skipped {
        match &skip.file {
            Some(file) => println!("skipped       : {}/{}: {}", skip.user, file, skip.reason),
            None => println!("skipped       : {}: {}", skip.user, skip.reason),
        }
    }
    for failure in &report.failures {
        println!(
            "failed        : {}/{} batch {}: {}",
            failure.user, failure.file, failure.batch, failure.error
        );
    }
    match &report.verification {
        Some(v) => println!(
            "verification  : max error {:.3e} ({}), first values {:?}",
            v.max_abs_error,
            if v.within_tolerance { "ok" } else { "OUT OF TOLERANCE" },
            v.sample
        ),
        None => println!("verification  : no encrypted batch to check"),
    }
}
