use anyhow::{Context, Result};
use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};
use colored::Colorize;
use sheetprobe_core::logfile::LogSink;
use sheetprobe_core::{Command, CommandError, ConfigFile, Dispatcher};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing_subscriber::EnvFilter;

mod cli;

use cli::{Cli, build_configuration};

fn level_for(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

/// Install the fmt subscriber writing through `sink`; RUST_LOG takes precedence
fn init_tracing(verbosity: u8, sink: LogSink) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level_for(verbosity)));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .without_time()
        .with_target(false)
        .with_writer(move || sink.clone())
        .try_init();
}

/// Ctrl-C: raise the flag, report the interrupt and give the exit status
fn on_interrupt(flag: &AtomicBool, out: &mut dyn Write) -> i32 {
    flag.store(true, Ordering::SeqCst);
    let _ = writeln!(out, "*** KeyboardInterrupt ***");
    let _ = out.flush();
    1
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load defaults
    let defaults = if let Some(config_path) = &cli.config {
        ConfigFile::from_file(config_path)
            .with_context(|| format!("Failed to load config from {}", config_path.display()))?
    } else {
        // Try to load default config from current directory if it exists
        let default_config_path = PathBuf::from("sheetprobe.toml");
        if default_config_path.exists() {
            ConfigFile::from_file(&default_config_path).with_context(|| {
                format!("Failed to load config from {}", default_config_path.display())
            })?
        } else {
            ConfigFile::default()
        }
    };

    let (config, rejected_mmap) = build_configuration(&cli, defaults);
    if let Some(value) = rejected_mmap {
        println!("Unexpected value ({}) for mmap option -- assuming default", value);
    }

    let command = match Command::parse_invocation(&cli.command, &cli.patterns) {
        Ok(command) => command,
        Err(e @ CommandError::MissingArguments(_)) => {
            Cli::command().error(ErrorKind::MissingRequiredArgument, e.to_string()).exit()
        }
        Err(e @ CommandError::UnknownCommand(_)) => {
            println!("{}", e.to_string().red());
            std::process::exit(1);
        }
    };

    let log_file = match &config.logfile {
        Some(path) => Some(LogSink::to_file(path)?),
        None => None,
    };
    init_tracing(config.verbosity, log_file.clone().unwrap_or_else(LogSink::stdout));
    tracing::debug!(%command, files = cli.patterns.len(), "starting run");

    // The reader has no cancellation points, so an interrupt ends the process
    let interrupt = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&interrupt);
    ctrlc::set_handler(move || std::process::exit(on_interrupt(&flag, &mut io::stdout())))
        .context("Failed to install Ctrl-C handler")?;

    let mut dispatcher = Dispatcher::new(config, interrupt);
    if let Some(sink) = log_file {
        dispatcher = dispatcher.with_log_sink(sink);
    }

    // Not locked for the whole run: the Ctrl-C handler writes to stdout too
    let mut out = io::stdout();
    let status = match dispatcher.run(command, &cli.patterns, &mut out) {
        Ok(status) => status,
        Err(e) => {
            eprintln!("{} {:#}", "error:".red().bold(), e);
            std::process::exit(1);
        }
    };
    out.flush()?;
    tracing::debug!(?status, "run finished");
    std::process::exit(status.exit_code());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_on_interrupt_reports_and_fails() {
        let flag = AtomicBool::new(false);
        let mut out = Vec::new();
        assert_eq!(on_interrupt(&flag, &mut out), 1);
        assert!(flag.load(Ordering::SeqCst));
        assert_eq!(String::from_utf8(out).unwrap(), "*** KeyboardInterrupt ***\n");
    }

    #[test]
    fn test_level_for_verbosity() {
        assert_eq!(level_for(0), "warn");
        assert_eq!(level_for(1), "info");
        assert_eq!(level_for(2), "debug");
        assert_eq!(level_for(9), "trace");
    }
}
