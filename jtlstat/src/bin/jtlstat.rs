use std::{
    fs::File,
    io::{self, BufWriter, Write},
    path::PathBuf,
};

use clap::{Args, Parser, Subcommand};
use jtlstat::config::Config;
use jtlstat_engine::{Analysis, CancellationToken, bucket::BucketValueMode, format::DisplayZone};
use tokio::{runtime::Builder, signal};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, util::SubscriberInitExt};

#[derive(thiserror::Error, Debug)]
enum Error {
    #[error("Invalid arguments specified")]
    InvalidArgs,
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("Failed to load jtlstat config: {0}")]
    Config(#[from] jtlstat::config::Error),
    #[error("Analysis failed: {0}")]
    Analysis(#[from] jtlstat::Error),
    #[error("Failed to serialize report: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Could not join the analysis task: {0}")]
    Join(#[from] tokio::task::JoinError),
    #[error("Only {accepted} rows accepted, at least {required} required")]
    TooFewRows { accepted: u64, required: u64 },
}

#[derive(Parser)]
#[clap(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Summarize a sample log into a JSON report
    Report(ReportArgs),
    /// List the labels of a sample log with their request counts
    Labels(InputArgs),
    /// Count accepted and rejected rows of a sample log
    Validate(ValidateArgs),
}

#[derive(Args)]
struct InputArgs {
    /// Path to a CSV or JSON lines sample log, optionally zstd compressed
    path: PathBuf,
    /// Path to a YAML configuration file
    #[clap(long)]
    config: Option<PathBuf>,
}

#[derive(Args)]
struct ReportArgs {
    #[command(flatten)]
    input: InputArgs,
    /// Write the report here instead of stdout
    #[clap(long)]
    output: Option<PathBuf>,
    /// Pretty-print the report
    #[clap(long)]
    pretty: bool,
    /// Offset in which time labels are rendered, e.g. `-03:00`, `utc` or `local`
    #[clap(long, allow_hyphen_values = true)]
    utc_offset: Option<DisplayZone>,
    /// How per-second elapsed and latency are reported: `last-write` or `mean`
    #[clap(long)]
    bucket_values: Option<BucketValueMode>,
}

#[derive(Args)]
struct ValidateArgs {
    #[command(flatten)]
    input: InputArgs,
    /// Fail unless at least this many rows are accepted
    #[clap(long, default_value_t = 1)]
    min_rows: u64,
}

fn load_config(args: &InputArgs) -> Result<Config, Error> {
    if !args.path.exists() {
        error!("Sample log {} does not exist", args.path.display());
        return Err(Error::InvalidArgs);
    }
    match &args.config {
        Some(path) => Ok(Config::from_path(path)?),
        None => Ok(Config::default()),
    }
}

async fn run(
    path: PathBuf,
    config: Config,
    options: jtlstat_engine::Options,
) -> Result<Analysis, Error> {
    let token = CancellationToken::new();
    let run_token = token.clone();
    let mut task = tokio::task::spawn_blocking(move || {
        jtlstat::analyze_file(&path, &config, options, &run_token)
    });

    tokio::select! {
        res = &mut task => return Ok(res??),
        _ = signal::ctrl_c() => {
            info!("received ctrl-c, cancelling");
            token.cancel();
        }
    }
    // The blocking task observes the token between rows and exits promptly.
    Ok(task.await??)
}

fn write_json<T: serde::Serialize>(
    value: &T,
    output: Option<&PathBuf>,
    pretty: bool,
) -> Result<(), Error> {
    let mut writer: Box<dyn Write> = match output {
        Some(path) => Box::new(BufWriter::new(File::create(path)?)),
        None => Box::new(io::stdout().lock()),
    };
    if pretty {
        serde_json::to_writer_pretty(&mut writer, value)?;
    } else {
        serde_json::to_writer(&mut writer, value)?;
    }
    writeln!(writer)?;
    writer.flush()?;
    Ok(())
}

fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .with_ansi(false)
        .finish()
        .init();

    let version = env!("CARGO_PKG_VERSION");
    info!("Starting jtlstat {version}.");
    let cli = Cli::parse();

    let runtime = Builder::new_current_thread().enable_all().build()?;

    match cli.command {
        Commands::Report(args) => {
            let config = load_config(&args.input)?;
            let mut options = config.to_options()?;
            if let Some(zone) = args.utc_offset {
                options.zone = zone;
            }
            if let Some(mode) = args.bucket_values {
                options.bucket_values = mode;
            }
            let pretty = args.pretty || config.output.pretty;

            let analysis = runtime.block_on(run(args.input.path, config, options))?;
            write_json(&analysis.report, args.output.as_ref(), pretty)?;
            if let Some(path) = &args.output {
                info!("Report written to {}", path.display());
            }
        }
        Commands::Labels(args) => {
            let config = load_config(&args)?;
            let options = config.to_options()?;
            let analysis = runtime.block_on(run(args.path, config, options))?;

            let mut stdout = io::stdout().lock();
            for row in &analysis.report.aggregate_report {
                writeln!(stdout, "{}\t{}", row.label, row.count)?;
            }
        }
        Commands::Validate(args) => {
            let config = load_config(&args.input)?;
            let options = config.to_options()?;
            let analysis = runtime.block_on(run(args.input.path, config, options))?;

            write_json(&analysis.stats, None, false)?;
            if analysis.stats.accepted < args.min_rows {
                return Err(Error::TooFewRows {
                    accepted: analysis.stats.accepted,
                    required: args.min_rows,
                });
            }
        }
    }

    info!("Bye. :)");
    Ok(())
}
