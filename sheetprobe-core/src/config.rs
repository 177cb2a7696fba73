//! Run configuration
//!
//! A [`Configuration`] is built once per invocation from the command line,
//! optionally layered over a TOML defaults file, and is read-only afterwards.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// How the file is brought into memory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MmapMode {
    /// Let the reader decide; currently always buffers the whole file
    #[default]
    Auto,
    On,
    Off,
}

impl MmapMode {
    /// Interpret the numeric `--mmap` option; `None` for unexpected values
    pub fn from_option(value: i64) -> Option<Self> {
        match value {
            1 => Some(MmapMode::On),
            0 => Some(MmapMode::Off),
            -1 => Some(MmapMode::Auto),
            _ => None,
        }
    }

    pub fn resolve(self) -> bool {
        match self {
            MmapMode::Auto | MmapMode::On => true,
            MmapMode::Off => false,
        }
    }
}

/// Collection mode for the resident-sheet sweep
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GcMode {
    /// No sweeps; sheets are released when their workbook is dropped
    #[default]
    Auto,
    /// Sweep before each open and after each command, reporting leaked sheets
    Manual,
    /// Never sweep
    Disabled,
}

impl GcMode {
    pub fn from_option(value: u8) -> Self {
        match value {
            1 => GcMode::Manual,
            2 => GcMode::Disabled,
            _ => GcMode::Auto,
        }
    }
}

/// Sheet chosen with `--onesheet`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SheetSelector {
    Index(usize),
    Name(String),
}

impl SheetSelector {
    /// Numbers select by index, anything else by name
    pub fn parse(value: &str) -> Self {
        match value.parse::<usize>() {
            Ok(index) => SheetSelector::Index(index),
            Err(_) => SheetSelector::Name(value.to_string()),
        }
    }
}

impl fmt::Display for SheetSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SheetSelector::Index(i) => write!(f, "{}", i),
            SheetSelector::Name(n) => f.write_str(n),
        }
    }
}

/// Immutable settings for one run
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Configuration {
    pub mmap: MmapMode,
    pub encoding_override: Option<String>,
    pub formatting_info: bool,
    pub on_demand: bool,
    pub ragged_rows: bool,
    pub onesheet: Option<SheetSelector>,
    pub unnumbered: bool,
    pub gc_mode: GcMode,
    pub suppress_timing: bool,
    pub logfile: Option<PathBuf>,
    pub verbosity: u8,
}

/// Defaults read from a TOML file; every key is optional
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    #[serde(default)]
    pub mmap: Option<i64>,
    #[serde(default)]
    pub encoding: Option<String>,
    #[serde(default)]
    pub formatting: Option<bool>,
    #[serde(default)]
    pub on_demand: Option<bool>,
    #[serde(default)]
    pub ragged_rows: Option<bool>,
    #[serde(default)]
    pub onesheet: Option<String>,
    #[serde(default)]
    pub unnumbered: Option<bool>,
    #[serde(default)]
    pub gc: Option<u8>,
    #[serde(default)]
    pub suppress_timing: Option<bool>,
    #[serde(default)]
    pub logfilename: Option<PathBuf>,
    #[serde(default)]
    pub verbosity: Option<u8>,
}

impl ConfigFile {
    /// Load defaults from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: ConfigFile = toml::from_str(&content)?;
        Ok(config)
    }
}
