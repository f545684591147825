//! Command-line entry point: parses arguments, wires up logging, and
//! dispatches to either the REPL or a single source file.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use fax_driver::{run_file, run_repl, DriverConfig, DriverError};

/// fax - a small dynamically-typed scripting language.
#[derive(Parser, Debug)]
#[command(name = "fax")]
#[command(author = "Fax Team")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Interpret a fax source file, or start a REPL with none given")]
struct Cli {
    /// Source file to run. Starts the REPL if omitted; passing more than
    /// one is a usage error (collected here, rather than capped at one
    /// positional, so `main` can report it as `DriverError::Usage` with
    /// the spec's exit code instead of clap's own usage rejection).
    paths: Vec<PathBuf>,

    /// Force a garbage-collection cycle before every allocation.
    #[arg(long, env = "FAX_GC_STRESS")]
    gc_stress: bool,

    /// Emit debug-level tracing for the compiler and VM.
    #[arg(short, long, global = true, env = "FAX_VERBOSE")]
    verbose: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = if cli.verbose { EnvFilter::new("debug") } else { EnvFilter::from_default_env() };
    tracing_subscriber::registry().with(fmt::layer().with_target(false)).with(filter).init();

    let config = DriverConfig { gc_stress: cli.gc_stress, verbose: cli.verbose };

    let result = match cli.paths.as_slice() {
        [] => run_repl(&config),
        [path] => run_file(path, &config),
        _ => Err(DriverError::Usage),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            // Compile and runtime failures already printed their own
            // diagnostics (the `Handler`'s messages, or the VM's stack
            // trace) at the point they occurred; only the remaining
            // variants still need `main` to report them.
            if !matches!(err, DriverError::CompileFailed | DriverError::RuntimeFailed(_)) {
                eprintln!("{err}");
            }
            ExitCode::from(err.exit_code() as u8)
        }
    }
}
