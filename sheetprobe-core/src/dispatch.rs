//! Command resolution and the per-file run loop

use crate::config::{Configuration, GcMode};
use crate::error::CommandError;
use crate::logfile::LogSink;
use crate::reader::{self, OpenOptions, Sheet, biff};
use crate::report::{Report, RowDump};
use crate::session::{SessionOutcome, WorkbookSession};
use anyhow::Result;
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::rc::Weak;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Instant;

/// Commands accepted on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Hdr,
    Ov,
    Show,
    TwoRows,
    ThreeRows,
    Bench,
    Fonts,
    Names,
    NameDump,
    Labels,
    Xfc,
    BiffDump,
    BiffCount,
    Version,
}

const COMMANDS: &[(&str, Command)] = &[
    ("hdr", Command::Hdr),
    ("ov", Command::Ov),
    ("show", Command::Show),
    ("2rows", Command::TwoRows),
    ("3rows", Command::ThreeRows),
    ("bench", Command::Bench),
    ("fonts", Command::Fonts),
    ("names", Command::Names),
    ("name_dump", Command::NameDump),
    ("labels", Command::Labels),
    ("xfc", Command::Xfc),
    ("biff_dump", Command::BiffDump),
    ("biff_count", Command::BiffCount),
    ("version", Command::Version),
];

impl FromStr for Command {
    type Err = CommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        COMMANDS
            .iter()
            .find(|(name, _)| *name == s)
            .map(|(_, cmd)| *cmd)
            .ok_or_else(|| CommandError::UnknownCommand(s.to_string()))
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = COMMANDS
            .iter()
            .find(|(_, cmd)| cmd == self)
            .map_or("?", |(name, _)| name);
        f.write_str(name)
    }
}

impl Command {
    /// Every command name, in help order
    pub fn names() -> impl Iterator<Item = &'static str> {
        COMMANDS.iter().map(|(name, _)| *name)
    }

    /// Check the command word and file arguments before anything is opened
    pub fn parse_invocation(command: &str, patterns: &[String]) -> Result<Self, CommandError> {
        if command == "version" {
            return Ok(Command::Version);
        }
        if patterns.is_empty() {
            return Err(CommandError::MissingArguments(1));
        }
        command.parse()
    }

    /// Report run against each opened workbook; `None` for file-level commands
    pub fn report(self) -> Option<Report> {
        let report = match self {
            Command::Hdr => Report::Header,
            Command::Ov => Report::Rows(RowDump::OVERVIEW),
            Command::Show => Report::Rows(RowDump::SHOW),
            Command::TwoRows => Report::Rows(RowDump::first(2)),
            Command::ThreeRows => Report::Rows(RowDump::first(3)),
            Command::Bench => Report::Rows(RowDump::BENCH),
            Command::Fonts => Report::Fonts,
            Command::Names => Report::Names { dump: false },
            Command::NameDump => Report::Names { dump: true },
            Command::Labels => Report::Labels,
            Command::Xfc => Report::XfStats,
            Command::BiffDump | Command::BiffCount | Command::Version => return None,
        };
        Some(report)
    }
}

/// How a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Completed,
    Interrupted,
}

impl RunStatus {
    pub fn exit_code(self) -> i32 {
        match self {
            RunStatus::Completed => 0,
            RunStatus::Interrupted => 1,
        }
    }
}

/// Expand glob patterns in argument order
pub fn expand_patterns(patterns: &[String]) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for pattern in patterns {
        match glob::glob(pattern) {
            Ok(paths) => {
                for entry in paths {
                    match entry {
                        Ok(path) => files.push(path),
                        Err(e) => tracing::warn!("skipping unreadable path: {}", e),
                    }
                }
            }
            Err(e) => tracing::warn!(pattern = %pattern, "invalid glob pattern: {}", e),
        }
    }
    files
}

pub struct Dispatcher {
    config: Configuration,
    interrupt: Arc<AtomicBool>,
    log_sink: Option<LogSink>,
    tracked: Vec<Weak<Sheet>>,
}

impl Dispatcher {
    pub fn new(config: Configuration, interrupt: Arc<AtomicBool>) -> Self {
        Self {
            config,
            interrupt,
            log_sink: None,
            tracked: Vec::new(),
        }
    }

    /// Route per-file headings to a log file sink
    pub fn with_log_sink(mut self, sink: LogSink) -> Self {
        self.log_sink = Some(sink);
        self
    }

    pub fn config(&self) -> &Configuration {
        &self.config
    }

    /// Reader options for a command; `xfc` always needs formatting info
    pub fn open_options(&self, command: Command) -> OpenOptions {
        OpenOptions {
            use_mmap: self.config.mmap.resolve(),
            encoding_override: self.config.encoding_override.clone(),
            formatting_info: self.config.formatting_info || command == Command::Xfc,
            on_demand: self.config.on_demand,
            ragged_rows: self.config.ragged_rows,
        }
    }

    /// Count and forget sheets that are still alive
    fn sweep(&mut self) -> usize {
        let alive = self.tracked.iter().filter(|w| w.strong_count() > 0).count();
        self.tracked.clear();
        alive
    }

    fn write_version(&self, out: &mut dyn Write) -> Result<()> {
        let exe = std::env::current_exe()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|_| "<unknown>".to_string());
        writeln!(out, "{}: {}, from {}", crate::NAME, crate::VERSION, exe)?;
        let profile = if cfg!(debug_assertions) { "debug" } else { "release" };
        writeln!(out, "build profile: {}", profile)?;
        Ok(())
    }

    fn write_biff(&self, command: Command, path: &Path, out: &mut dyn Write) -> Result<()> {
        let stream = match reader::read_workbook_stream(path) {
            Ok(stream) => stream,
            Err(e) => {
                writeln!(out, "{}", e.failure_line())?;
                return Ok(());
            }
        };
        if command == Command::BiffCount {
            biff::write_record_counts(&stream, out)?;
        } else {
            biff::dump_records(&stream, self.config.unnumbered, out)?;
        }
        Ok(())
    }

    /// Run `command` over every file matched by `patterns`
    pub fn run(
        &mut self,
        command: Command,
        patterns: &[String],
        out: &mut dyn Write,
    ) -> Result<RunStatus> {
        let report = match command {
            Command::Version => {
                self.write_version(out)?;
                return Ok(RunStatus::Completed);
            }
            Command::BiffDump | Command::BiffCount => {
                let Some(path) = patterns.first() else {
                    return Err(CommandError::MissingArguments(1).into());
                };
                self.write_biff(command, Path::new(path), out)?;
                return Ok(RunStatus::Completed);
            }
            _ => command.report(),
        };
        let Some(report) = report else {
            return Err(CommandError::UnknownCommand(command.to_string()).into());
        };

        let options = self.open_options(command);
        for path in expand_patterns(patterns) {
            writeln!(out, "\n=== File: {} ===", path.display())?;
            if let Some(sink) = &self.log_sink {
                sink.set_file_heading(format!("\n=== File: {} ===\n", path.display()));
            }
            if self.config.gc_mode == GcMode::Manual {
                let n = self.sweep();
                if n > 0 {
                    writeln!(out, "GC before open: {} unreachable objects", n)?;
                }
            }

            let started = Instant::now();
            let session = WorkbookSession::new(&self.config, options.clone(), &self.interrupt);
            let outcome = session.run(&path, report, out, &mut self.tracked)?;
            match outcome {
                SessionOutcome::Interrupted => return Ok(RunStatus::Interrupted),
                SessionOutcome::OpenFailed => continue,
                SessionOutcome::Processed | SessionOutcome::ReportFailed => {}
            }

            if self.config.gc_mode == GcMode::Manual {
                let n = self.sweep();
                if n > 0 {
                    writeln!(out, "GC post cmd: {} -> {} unreachable objects", path.display(), n)?;
                }
            } else {
                self.tracked.clear();
            }
            if !self.config.suppress_timing {
                writeln!(out, "\ncommand took {:.2} seconds\n", started.elapsed().as_secs_f64())?;
            }
        }
        Ok(RunStatus::Completed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;

    fn quiet() -> Configuration {
        Configuration {
            suppress_timing: true,
            ..Configuration::default()
        }
    }

    fn run(config: Configuration, command: Command, patterns: &[String]) -> (RunStatus, String) {
        let mut dispatcher = Dispatcher::new(config, Arc::new(AtomicBool::new(false)));
        let mut out = Vec::new();
        let status = dispatcher.run(command, patterns, &mut out).unwrap();
        (status, String::from_utf8(out).unwrap())
    }

    #[test]
    fn test_command_table() {
        assert_eq!("2rows".parse::<Command>().unwrap(), Command::TwoRows);
        assert_eq!("name_dump".parse::<Command>().unwrap(), Command::NameDump);
        assert_eq!(
            "frobnicate".parse::<Command>().unwrap_err(),
            CommandError::UnknownCommand("frobnicate".into())
        );
        for name in Command::names() {
            assert_eq!(name.parse::<Command>().unwrap().to_string(), name);
        }
    }

    #[test]
    fn test_parse_invocation() {
        let files = vec!["*.xls".to_string()];
        assert_eq!(Command::parse_invocation("version", &[]).unwrap(), Command::Version);
        assert_eq!(
            Command::parse_invocation("hdr", &[]).unwrap_err(),
            CommandError::MissingArguments(1)
        );
        assert_eq!(
            Command::parse_invocation("bogus", &files).unwrap_err().to_string(),
            "*** Unknown command <bogus>"
        );
        assert_eq!(Command::parse_invocation("xfc", &files).unwrap(), Command::Xfc);
    }

    #[test]
    fn test_xfc_forces_formatting() {
        let interrupt = Arc::new(AtomicBool::new(false));
        let dispatcher = Dispatcher::new(Configuration::default(), interrupt);
        assert!(dispatcher.open_options(Command::Xfc).formatting_info);
        assert!(!dispatcher.open_options(Command::Show).formatting_info);
        assert!(dispatcher.open_options(Command::Show).use_mmap);
    }

    #[test]
    fn test_corrupt_files_do_not_stop_the_run() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["a.xls", "b.xls"] {
            fs::write(dir.path().join(name), b"junk bytes here").unwrap();
        }
        let pattern = dir.path().join("*.xls").display().to_string();

        let (status, text) = run(quiet(), Command::Hdr, &[pattern]);
        assert_eq!(status, RunStatus::Completed);
        assert_eq!(text.matches("*** Open failed: UnsupportedFormat").count(), 2);
        let a = text.find("a.xls ===").unwrap();
        let b = text.find("b.xls ===").unwrap();
        assert!(a < b);
    }

    #[test]
    fn test_unmatched_pattern_prints_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let pattern = dir.path().join("*.xls").display().to_string();
        let (status, text) = run(quiet(), Command::Show, &[pattern]);
        assert_eq!(status, RunStatus::Completed);
        assert_eq!(text, "");
    }

    #[test]
    fn test_version_output() {
        let (status, text) = run(quiet(), Command::Version, &[]);
        assert_eq!(status.exit_code(), 0);
        assert!(text.starts_with(&format!("sheetprobe-core: {}, from ", crate::VERSION)));
        assert!(text.contains("build profile: "));
    }

    #[test]
    fn test_biff_commands_on_non_ole_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x.xls");
        fs::write(&path, b"plain text").unwrap();
        let (status, text) = run(quiet(), Command::BiffCount, &[path.display().to_string()]);
        assert_eq!(status, RunStatus::Completed);
        assert!(text.starts_with("*** Open failed: UnsupportedFormat"));
    }

    #[test]
    fn test_manual_sweep_counts_live_sheets() {
        use crate::cell::Cell;
        use std::rc::Rc;

        let mut dispatcher = Dispatcher::new(
            Configuration {
                gc_mode: GcMode::Manual,
                ..quiet()
            },
            Arc::new(AtomicBool::new(false)),
        );
        let leaked = Rc::new(Sheet::from_rows("L", 0, vec![vec![Cell::text("x")]], false));
        let dropped = Rc::new(Sheet::from_rows("D", 1, Vec::new(), false));
        dispatcher.tracked.push(Rc::downgrade(&leaked));
        dispatcher.tracked.push(Rc::downgrade(&dropped));
        drop(dropped);

        assert_eq!(dispatcher.sweep(), 1);
        assert_eq!(dispatcher.sweep(), 0);
    }
}
