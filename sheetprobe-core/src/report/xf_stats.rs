//! XF-index and cell-type statistics (`xfc`)

use crate::cell::CELL_TYPE_COUNT;
use crate::config::Configuration;
use crate::lifecycle::SheetVisit;
use crate::reader::{Sheet, Workbook};
use crate::report::{header::write_header, write_sheet_summary};
use anyhow::{Result, bail};
use std::io::Write;

/// Per-sheet counts; fresh for every sheet
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SheetStats {
    /// Indexed by XF source: cell record, row default, column default, fallback
    pub xf: [usize; 4],
    /// Indexed by cell type code
    pub types: [usize; CELL_TYPE_COUNT],
}

/// Resolve the XF index and type of every declared cell of a sheet
pub fn collect_stats(sheet: &Sheet) -> Result<SheetStats> {
    let mut stats = SheetStats::default();
    for rowx in 0..sheet.nrows() {
        for colx in 0..sheet.row_len(rowx) {
            let Some(xf) = sheet.cell_xf_index(rowx, colx) else {
                bail!("Formatting info not loaded for sheet <{}>", sheet.name);
            };
            if xf.index < 0 {
                bail!("Negative XF index {} at row {} col {}", xf.index, rowx, colx);
            }
            stats.xf[xf.source as usize] += 1;
            stats.types[sheet.cell_type(rowx, colx).code() as usize] += 1;
        }
    }
    Ok(stats)
}

fn list(values: &[usize]) -> String {
    let items: Vec<String> = values.iter().map(usize::to_string).collect();
    format!("[{}]", items.join(", "))
}

pub fn write_xf_stats(
    book: &mut Workbook,
    config: &Configuration,
    out: &mut dyn Write,
) -> Result<()> {
    write_header(book, config, out)?;
    for shx in 0..book.nsheets() {
        let sheet = SheetVisit::acquire(book, shx)?;
        write_sheet_summary(out, shx, &sheet)?;
        let stats = collect_stats(&sheet)?;
        writeln!(out, "XF stats {}", list(&stats.xf))?;
        writeln!(out, "type stats {}", list(&stats.types))?;
        writeln!(out)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::{Cell, CellType, CellValue};
    use crate::reader::workbook::{BookInfo, XfLayout};
    use pretty_assertions::assert_eq;

    fn formatted_sheet() -> Sheet {
        let rows = vec![
            vec![Cell::text("a"), Cell::number(1.0), Cell::new(CellType::Blank, CellValue::Empty)],
            vec![Cell::date(100.0), Cell::boolean(false)],
        ];
        let mut layout = XfLayout::default();
        layout.cells.insert((0, 0), 16);
        layout.cells.insert((0, 2), 17);
        layout.rows.insert(1, 20);
        layout.cols.push((1, 1, 30));
        Sheet::from_rows("Stats", 0, rows, false).with_xf_layout(layout)
    }

    #[test]
    fn test_collect_stats() {
        let stats = collect_stats(&formatted_sheet()).unwrap();
        // row 1 is padded to three cells, all resolved through the row default
        assert_eq!(stats.xf, [2, 3, 1, 0]);
        assert_eq!(stats.types, [1, 1, 1, 1, 1, 0, 1]);
        assert_eq!(stats.types.iter().sum::<usize>(), 6);
    }

    #[test]
    fn test_stats_are_idempotent() {
        let sheet = formatted_sheet();
        assert_eq!(collect_stats(&sheet).unwrap(), collect_stats(&sheet).unwrap());
    }

    #[test]
    fn test_missing_formatting_info_fails() {
        let sheet = Sheet::from_rows("Plain", 0, vec![vec![Cell::text("x")]], false);
        assert!(collect_stats(&sheet).is_err());
    }

    #[test]
    fn test_xfc_report() {
        let info = BookInfo {
            formatting_info: true,
            on_demand: true,
            ..BookInfo::default()
        };
        let mut book = Workbook::from_sheets(info, vec![formatted_sheet()]);
        let config = Configuration {
            suppress_timing: true,
            ..Configuration::default()
        };

        let mut out = Vec::new();
        write_xf_stats(&mut book, &config, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.ends_with(
            "sheet 0: name = 'Stats'; nrows = 2; ncols = 3\n\
             XF stats [2, 3, 1, 0]\n\
             type stats [1, 1, 1, 1, 1, 0, 1]\n\n"
        ));
        assert_eq!(book.release_count(0), 1);
    }
}
