use std::{path::PathBuf, process::ExitCode};

use clap::Parser;
use tracing::error;
use tracing_subscriber::{fmt, EnvFilter};

use husk::{run_file, Platform, Streams};

#[derive(Parser)]
#[command(author, version, about = "Run a script with print, read and load available")]
struct Args {
    /// Script file to execute
    script: PathBuf,
}

fn main() -> ExitCode {
    // HUSK_LOG controls the log level, warnings only by default
    let filter = EnvFilter::try_from_env("HUSK_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    fmt()
        .compact()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();

    let args = Args::parse();

    let platform = Platform::initialize();
    let outcome = run_file(&platform, &args.script, Streams::stdio());
    drop(platform);

    match outcome {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            error!(%err, "shell failed");
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}
