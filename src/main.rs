use anyhow::{Context, Result};
use clap::Parser;
use radiko_dl::progress::Spinner;
use radiko_dl::{Config, Error, Recorder, Recording};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "radiko-dl", about = "Save a radiko time-shifted program as an audio file", version)]
struct Args {
    /// Program page url, or a share url carrying station_id/ft/to
    url: String,

    /// Configuration file path
    #[arg(short, long, env = "RADIKO_DL_CONFIG")]
    config: Option<PathBuf>,

    /// Directory the audio file is written to
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose);

    match run(args).await {
        Ok(recording) => {
            println!("Saved {}", recording.output.display());
            ExitCode::SUCCESS
        }
        Err(e) => {
            match e.downcast_ref::<Error>() {
                Some(err) => {
                    tracing::debug!(stage = err.stage(), "run aborted");
                    eprintln!("error: {err}");
                }
                None => eprintln!("error: {e:#}"),
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<Recording> {
    let mut config = Config::load(args.config.as_deref())?;
    if let Some(dir) = args.output_dir {
        config.capture.output_dir = dir;
    }
    tokio::fs::create_dir_all(&config.capture.output_dir)
        .await
        .with_context(|| format!("cannot create {}", config.capture.output_dir.display()))?;

    let recorder = Recorder::new(&config)?.observer(Spinner::new());
    Ok(recorder.record(&args.url).await?)
}

fn init_logging(verbose: bool) {
    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();

    tracing_subscriber::fmt()
        .with_env_filter(log_filter(verbose, rust_log.as_deref()))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// `RUST_LOG` wins when it parses; `--verbose` only raises the fallback level.
fn log_filter(verbose: bool, rust_log: Option<&str>) -> EnvFilter {
    let fallback = if verbose { "debug" } else { "warn" };
    rust_log
        .filter(|directives| !directives.trim().is_empty())
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new(fallback))
}
