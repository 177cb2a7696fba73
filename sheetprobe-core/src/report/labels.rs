//! Label range dump (`labels`)

use crate::address::cellname;
use crate::config::Configuration;
use crate::lifecycle::SheetVisit;
use crate::reader::workbook::LabelRange;
use crate::reader::{Sheet, Workbook};
use crate::report::{header::write_header, write_sheet_summary};
use anyhow::Result;
use std::io::{self, Write};

fn write_ranges(
    out: &mut dyn Write,
    sheet: &Sheet,
    ranges: &[LabelRange],
    title: &str,
) -> io::Result<()> {
    for range in ranges {
        writeln!(
            out,
            "{} label range {}:{} contains:",
            title,
            cellname(range.rlo, range.clo),
            cellname(range.rhi.saturating_sub(1), range.chi.saturating_sub(1))
        )?;
        for rowx in range.rlo..range.rhi {
            for colx in range.clo..range.chi {
                writeln!(out, "    {}: {}", cellname(rowx, colx), sheet.cell_value(rowx, colx))?;
            }
        }
    }
    Ok(())
}

pub fn write_labels(
    book: &mut Workbook,
    config: &Configuration,
    out: &mut dyn Write,
) -> Result<()> {
    let mut header_written = false;
    for shx in 0..book.nsheets() {
        let sheet = SheetVisit::acquire(book, shx)?;
        if sheet.col_label_ranges.is_empty() && sheet.row_label_ranges.is_empty() {
            continue;
        }
        if !header_written {
            write_header(sheet.book(), config, out)?;
            header_written = true;
        }
        write_sheet_summary(out, shx, &sheet)?;
        write_ranges(out, &sheet, &sheet.col_label_ranges, "Col")?;
        write_ranges(out, &sheet, &sheet.row_label_ranges, "Row")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::Cell;
    use crate::reader::workbook::BookInfo;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_labels_dump() {
        let plain = Sheet::from_rows("Plain", 0, vec![vec![Cell::text("p")]], false);
        let rows = vec![
            vec![Cell::text("Name"), Cell::text("Qty")],
            vec![Cell::text("bolt"), Cell::number(4.0)],
        ];
        let labelled = Sheet::from_rows("Parts", 1, rows, false).with_label_ranges(
            vec![LabelRange {
                rlo: 0,
                rhi: 1,
                clo: 0,
                chi: 2,
            }],
            vec![LabelRange {
                rlo: 1,
                rhi: 2,
                clo: 0,
                chi: 1,
            }],
        );
        let info = BookInfo {
            on_demand: true,
            ..BookInfo::default()
        };
        let mut book = Workbook::from_sheets(info, vec![plain, labelled]);
        let config = Configuration {
            suppress_timing: true,
            ..Configuration::default()
        };

        let mut out = Vec::new();
        write_labels(&mut book, &config, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let body = text.split_once("Ragged rows: 0\n\n").unwrap().1;
        assert_eq!(
            body,
            "sheet 1: name = 'Parts'; nrows = 2; ncols = 2\n\
             Col label range A1:B1 contains:\n    A1: 'Name'\n    B1: 'Qty'\n\
             Row label range A2:A2 contains:\n    A2: 'bolt'\n"
        );
        assert_eq!(book.release_count(0), 1);
        assert_eq!(book.release_count(1), 1);
    }

    #[test]
    fn test_no_label_ranges_prints_nothing() {
        let sheet = Sheet::from_rows("S", 0, vec![vec![Cell::text("x")]], false);
        let mut book = Workbook::from_sheets(BookInfo::default(), vec![sheet]);
        let mut out = Vec::new();
        write_labels(&mut book, &Configuration::default(), &mut out).unwrap();
        assert!(out.is_empty());
    }
}
