//! Opal — a transparent compiler cache.
//!
//! Invoked as `opal <tool> <args…>`, the shim behaves exactly like
//! `<tool> <args…>`: exit code, stdout, and stderr are preserved
//! byte-for-byte. Cacheable compile steps are fingerprinted and served
//! from the local store when possible; everything else runs the real
//! tool transparently. Maintenance flags inspect and manage the store.

#![warn(missing_docs)]

mod maintenance;
mod orchestrate;

use std::process;

use clap::Parser;
use opal_config::Settings;
use tracing_subscriber::EnvFilter;

/// Opal — a transparent compiler cache.
#[derive(Parser, Debug)]
#[command(name = "opal", version, about = "Transparent compiler cache")]
pub struct Cli {
    /// Print cache statistics.
    #[arg(short = 's', long)]
    pub show_stats: bool,

    /// Remove all cached entries.
    #[arg(short = 'c', long)]
    pub clear: bool,

    /// Reset the statistics counters.
    #[arg(short = 'z', long)]
    pub zero_stats: bool,

    /// Print the resolved configuration.
    #[arg(short = 'C', long)]
    pub show_config: bool,

    /// The tool to run and its arguments.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub command: Vec<String>,
}

fn main() {
    let cli = Cli::parse();

    let settings = match opal_config::load_settings() {
        Ok(settings) => settings,
        Err(e) => {
            // Without settings the cache is unusable, but the user's
            // build must still succeed.
            eprintln!("opal: {e}");
            if cli.command.is_empty() {
                process::exit(1);
            }
            process::exit(orchestrate::run_transparent_by_name(&cli.command));
        }
    };

    init_logging(&settings);
    process::exit(run(&cli, &settings));
}

fn run(cli: &Cli, settings: &Settings) -> i32 {
    if cli.show_stats || cli.clear || cli.zero_stats || cli.show_config {
        return maintenance::run(cli, settings);
    }
    if cli.command.is_empty() {
        eprintln!("opal: no command given (try 'opal --help')");
        return 1;
    }
    orchestrate::invoke(settings, &cli.command)
}

/// Sets up the diagnostic log when one is configured. Without a log file
/// the shim stays silent: its only observable output is the tool's own.
fn init_logging(settings: &Settings) {
    let Some(log_file) = &settings.log_file else {
        return;
    };
    let Ok(file) = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file)
    else {
        return;
    };
    let filter = EnvFilter::try_new(&settings.debug_level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::sync::Mutex::new(file))
        .with_ansi(false)
        .try_init();
}
