use clap::Parser;
use sheetprobe_core::{ConfigFile, Configuration, GcMode, MmapMode, SheetSelector};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "sheetprobe")]
#[command(about = "Dump, inspect and benchmark spreadsheet workbooks", long_about = None)]
#[command(version)]
#[command(after_help = "Commands: hdr ov show 2rows 3rows bench fonts names name_dump labels xfc \
                         biff_dump biff_count version")]
pub struct Cli {
    /// Write diagnostics to this file instead of stdout
    #[arg(short = 'l', long = "logfilename", value_name = "FILE")]
    pub logfilename: Option<PathBuf>,

    /// Level of diagnostic output (0 = warnings only)
    #[arg(short, long, value_name = "LEVEL")]
    pub verbosity: Option<u8>,

    /// 1: read the whole file into memory; 0: stream from disk; -1: let the reader decide
    #[arg(short, long, value_name = "MODE", allow_negative_numbers = true)]
    pub mmap: Option<i64>,

    /// Encoding override, e.g. cp1252
    #[arg(short, long, value_name = "NAME")]
    pub encoding: Option<String>,

    /// 0 (default): no formatting info; 1: load formatting info (.xls only)
    #[arg(short, long, value_name = "0|1")]
    pub formatting: Option<u8>,

    /// 0: automatic; 1: manual sweeps with leak reports; 2: no sweeps
    #[arg(short, long, value_name = "MODE")]
    pub gc: Option<u8>,

    /// Restrict output to this sheet (name or index)
    #[arg(short = 's', long, value_name = "SHEET")]
    pub onesheet: Option<String>,

    /// Omit offsets in BIFF record dumps
    #[arg(short, long)]
    pub unnumbered: bool,

    /// Load sheets only when a report asks for them
    #[arg(short = 'd', long)]
    pub on_demand: bool,

    /// Don't print timings
    #[arg(short = 't', long)]
    pub suppress_timing: bool,

    /// Keep rows at their declared length instead of padding them
    #[arg(short = 'r', long)]
    pub ragged_rows: bool,

    /// Path to defaults file (TOML)
    #[arg(short, long, value_name = "CONFIG")]
    pub config: Option<PathBuf>,

    /// Command to run
    #[arg(value_name = "COMMAND")]
    pub command: String,

    /// Files to process; glob patterns are expanded
    #[arg(value_name = "PATTERN")]
    pub patterns: Vec<String>,
}

/// Layer command-line options over file defaults
///
/// Returns the configuration and the mmap value that was rejected, if any.
pub fn build_configuration(cli: &Cli, defaults: ConfigFile) -> (Configuration, Option<i64>) {
    let mut rejected_mmap = None;
    let mmap = match cli.mmap.or(defaults.mmap) {
        Some(value) => MmapMode::from_option(value).unwrap_or_else(|| {
            rejected_mmap = Some(value);
            MmapMode::Auto
        }),
        None => MmapMode::Auto,
    };
    let formatting_info = match cli.formatting {
        Some(value) => value != 0,
        None => defaults.formatting.unwrap_or(false),
    };

    let config = Configuration {
        mmap,
        encoding_override: cli.encoding.clone().or(defaults.encoding),
        formatting_info,
        on_demand: cli.on_demand || defaults.on_demand.unwrap_or(false),
        ragged_rows: cli.ragged_rows || defaults.ragged_rows.unwrap_or(false),
        onesheet: cli
            .onesheet
            .clone()
            .or(defaults.onesheet)
            .map(|s| SheetSelector::parse(&s)),
        unnumbered: cli.unnumbered || defaults.unnumbered.unwrap_or(false),
        gc_mode: GcMode::from_option(cli.gc.or(defaults.gc).unwrap_or(0)),
        suppress_timing: cli.suppress_timing || defaults.suppress_timing.unwrap_or(false),
        logfile: cli.logfilename.clone().or(defaults.logfilename),
        verbosity: cli.verbosity.or(defaults.verbosity).unwrap_or(0),
    };
    (config, rejected_mmap)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("sheetprobe").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_parse_options_and_patterns() {
        let cli = parse(&["-m", "-1", "-f", "1", "-s", "Totals", "-d", "show", "a.xls", "b*.xls"]);
        assert_eq!(cli.mmap, Some(-1));
        assert_eq!(cli.formatting, Some(1));
        assert_eq!(cli.command, "show");
        assert_eq!(cli.patterns, vec!["a.xls", "b*.xls"]);

        let (config, rejected) = build_configuration(&cli, ConfigFile::default());
        assert_eq!(rejected, None);
        assert_eq!(config.mmap, MmapMode::Auto);
        assert!(config.formatting_info);
        assert!(config.on_demand);
        assert_eq!(config.onesheet, Some(SheetSelector::Name("Totals".into())));
    }

    #[test]
    fn test_unexpected_mmap_value_falls_back() {
        let cli = parse(&["-m", "5", "hdr", "x.xls"]);
        let (config, rejected) = build_configuration(&cli, ConfigFile::default());
        assert_eq!(rejected, Some(5));
        assert_eq!(config.mmap, MmapMode::Auto);
    }

    #[test]
    fn test_command_line_overrides_file_defaults() {
        let defaults = ConfigFile {
            mmap: Some(0),
            gc: Some(1),
            verbosity: Some(2),
            suppress_timing: Some(true),
            ..ConfigFile::default()
        };
        let cli = parse(&["-m", "1", "-v", "0", "hdr", "x.xls"]);
        let (config, _) = build_configuration(&cli, defaults);
        assert_eq!(config.mmap, MmapMode::On);
        assert_eq!(config.verbosity, 0);
        assert_eq!(config.gc_mode, GcMode::Manual);
        assert!(config.suppress_timing);
    }

    #[test]
    fn test_version_needs_no_patterns() {
        let cli = parse(&["version"]);
        assert!(cli.patterns.is_empty());
    }
}
