//! Row dumps: `show`, `2rows`, `3rows`, `ov` and `bench`

use crate::address::cellname;
use crate::cell::{CellType, DisplayValue, decode_cell};
use crate::config::Configuration;
use crate::lifecycle::SheetVisit;
use crate::reader::{Sheet, Workbook};
use crate::report::{header::write_header, selected_sheets, write_sheet_summary};
use anyhow::Result;
use std::io::Write;
use std::ops::Range;

/// One decoded cell of a row
#[derive(Debug, Clone, PartialEq)]
pub struct RowDataEntry {
    pub colx: usize,
    pub ctype: CellType,
    pub value: DisplayValue,
    /// Present only when formatting info was loaded
    pub xf_index: Option<i32>,
}

/// Decode the cells of `cols` in row `rowx`
pub fn row_data(
    sheet: &Sheet,
    rowx: usize,
    cols: Range<usize>,
    datemode: u8,
    formatting: bool,
) -> Vec<RowDataEntry> {
    let types = sheet.row_types(rowx);
    let values = sheet.row_values(rowx);
    cols.map(|colx| {
        let raw_type = types.get(colx).copied().unwrap_or(CellType::Empty);
        let raw_value = values.get(colx).cloned().unwrap_or(crate::cell::CellValue::Empty);
        let (ctype, value) = decode_cell(raw_type, &raw_value, datemode);
        let xf_index = if formatting {
            sheet.cell_xf_index(rowx, colx).map(|xf| xf.index)
        } else {
            None
        };
        RowDataEntry {
            colx,
            ctype,
            value,
            xf_index,
        }
    })
    .collect()
}

/// Row-dump variant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowDump {
    /// Rows shown before the last row; `usize::MAX` shows every row
    pub bound: usize,
    /// Print cell lines (false for `bench`)
    pub print_cells: bool,
}

impl RowDump {
    pub const SHOW: RowDump = RowDump {
        bound: usize::MAX,
        print_cells: true,
    };
    pub const OVERVIEW: RowDump = RowDump {
        bound: 0,
        print_cells: true,
    };
    pub const BENCH: RowDump = RowDump {
        bound: usize::MAX,
        print_cells: false,
    };

    pub fn first(n: usize) -> Self {
        RowDump {
            bound: n,
            print_cells: true,
        }
    }
}

/// Read the last declared cell of every row so the whole sheet is touched
fn materialize(sheet: &Sheet) {
    for rowx in 0..sheet.nrows() {
        let nc = sheet.row_len(rowx);
        if nc > 0 {
            let _ = sheet.row_types(rowx)[nc - 1];
            let _ = sheet.row_values(rowx)[nc - 1].clone();
            let _ = sheet.cell(rowx, nc - 1);
        }
    }
}

fn write_row(
    out: &mut dyn Write,
    sheet: &Sheet,
    rowx: usize,
    datemode: u8,
    formatting: bool,
    ragged: bool,
    print_cells: bool,
) -> Result<()> {
    let ncols = if ragged { sheet.row_len(rowx) } else { sheet.ncols() };
    if ncols == 0 {
        return Ok(());
    }
    if print_cells {
        writeln!(out)?;
    }
    for entry in row_data(sheet, rowx, 0..ncols, datemode, formatting) {
        if !print_cells {
            continue;
        }
        let address = cellname(rowx, entry.colx);
        match entry.xf_index {
            Some(xf) if formatting => writeln!(
                out,
                "cell {}: type={}, data: {}, xfx: {}",
                address, entry.ctype, entry.value, xf
            )?,
            _ => writeln!(out, "cell {}: type={}, data: {}", address, entry.ctype, entry.value)?,
        }
    }
    Ok(())
}

pub fn write_rows(
    book: &mut Workbook,
    config: &Configuration,
    dump: RowDump,
    out: &mut dyn Write,
) -> Result<()> {
    write_header(book, config, out)?;
    let datemode = book.info.datemode;
    let formatting = book.info.formatting_info;
    let ragged = book.info.ragged_rows;

    for shx in selected_sheets(book, config)? {
        let sheet = SheetVisit::acquire(book, shx)?;
        let nrows = sheet.nrows();
        let shown = dump.bound.min(nrows);
        write_sheet_summary(out, shx, &sheet)?;

        if nrows > 0 && sheet.ncols() > 0 {
            materialize(&sheet);
        }
        for rowx in 0..shown.saturating_sub(1) {
            if !dump.print_cells && rowx % 10000 == 1 && rowx > 1 {
                writeln!(out, "done {} rows", rowx - 1)?;
            }
            write_row(out, &sheet, rowx, datemode, formatting, ragged, dump.print_cells)?;
        }
        if shown > 0 && nrows > 0 {
            write_row(out, &sheet, nrows - 1, datemode, formatting, ragged, dump.print_cells)?;
        }
        writeln!(out)?;
    }
    Ok(())
}
