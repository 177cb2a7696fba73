//! sheetprobe-core: workbook inspection, dumping and benchmarking
//!
//! This library opens spreadsheet files (legacy BIFF `.xls` first-class,
//! `.xlsx`/`.xlsb`/`.ods` through calamine), walks their sheets, rows, cells,
//! fonts, names and label ranges, and prints diagnostic reports.

pub mod address;
pub mod cell;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod lifecycle;
pub mod logfile;
pub mod reader;
pub mod report;
pub mod session;

pub use cell::{CellType, CellValue, DisplayValue, decode_cell};
pub use config::{ConfigFile, Configuration, GcMode, MmapMode, SheetSelector};
pub use dispatch::{Command, Dispatcher, RunStatus};
pub use error::{CommandError, OpenError};
pub use reader::{OpenOptions, Sheet, Workbook, open_workbook};
pub use session::{SessionOutcome, WorkbookSession};

/// Library name shown by the `version` command
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Library version shown by the `version` command
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
