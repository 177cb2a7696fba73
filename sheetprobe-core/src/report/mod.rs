//! Report generators
//!
//! Every report writes plain text to a caller-supplied writer. Reports that
//! visit sheets go through [`SheetVisit`](crate::lifecycle::SheetVisit) so
//! on-demand sheets are released as soon as each one is done.

pub mod fonts;
pub mod header;
pub mod labels;
pub mod names;
pub mod rows;
pub mod xf_stats;

use crate::cell::repr_str;
use crate::config::{Configuration, SheetSelector};
use crate::reader::{Sheet, Workbook};
use anyhow::{Result, bail};
use std::io::{self, Write};

pub use rows::RowDump;

/// Indices of the sheets a report should visit
pub fn selected_sheets(book: &Workbook, config: &Configuration) -> Result<Vec<usize>> {
    match &config.onesheet {
        None => Ok((0..book.nsheets()).collect()),
        Some(SheetSelector::Index(index)) => Ok(vec![*index]),
        Some(SheetSelector::Name(name)) => match book.sheet_index(name) {
            Some(index) => Ok(vec![index]),
            None => bail!("No sheet named <{}>", name),
        },
    }
}

/// `sheet <i>: name = <repr>; nrows = <n>; ncols = <n>`
pub fn write_sheet_summary(out: &mut dyn Write, index: usize, sheet: &Sheet) -> io::Result<()> {
    writeln!(
        out,
        "sheet {}: name = {}; nrows = {}; ncols = {}",
        index,
        repr_str(&sheet.name),
        sheet.nrows(),
        sheet.ncols()
    )
}

/// Reports that run against an opened workbook
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Report {
    Header,
    Rows(RowDump),
    Fonts,
    Names { dump: bool },
    Labels,
    XfStats,
}

impl Report {
    pub fn run(
        self,
        book: &mut Workbook,
        config: &Configuration,
        out: &mut dyn Write,
    ) -> Result<()> {
        match self {
            Report::Header => header::write_header(book, config, out)?,
            Report::Rows(dump) => rows::write_rows(book, config, dump, out)?,
            Report::Fonts => fonts::write_fonts(book, config, out)?,
            Report::Names { dump } => names::write_names(book, config, dump, out)?,
            Report::Labels => labels::write_labels(book, config, out)?,
            Report::XfStats => xf_stats::write_xf_stats(book, config, out)?,
        }
        Ok(())
    }
}
