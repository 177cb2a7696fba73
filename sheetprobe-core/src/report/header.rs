//! Workbook header block printed ahead of most reports

use crate::cell::repr_str;
use crate::config::Configuration;
use crate::reader::workbook::{FileFormat, biff_text_from_num};
use crate::reader::Workbook;
use std::io::{self, Write};

pub fn write_header(
    book: &Workbook,
    config: &Configuration,
    out: &mut dyn Write,
) -> io::Result<()> {
    let info = &book.info;
    writeln!(out)?;
    if info.format == FileFormat::Xls {
        writeln!(
            out,
            "BIFF version: {}; datemode: {}",
            biff_text_from_num(info.biff_version),
            info.datemode
        )?;
    } else {
        writeln!(
            out,
            "BIFF version: {} ({}); datemode: {}",
            biff_text_from_num(0),
            info.format,
            info.datemode
        )?;
    }
    let codepage = info.codepage.map_or_else(|| "None".to_string(), |cp| cp.to_string());
    writeln!(
        out,
        "codepage: {} (encoding: {}); countries: ({}, {})",
        codepage, info.encoding, info.countries.0, info.countries.1
    )?;
    writeln!(out, "Last saved by: {}", repr_str(&info.user_name))?;
    writeln!(out, "Number of data sheets: {}", book.nsheets())?;
    writeln!(
        out,
        "Use mmap: {}; Formatting: {}; On demand: {}",
        info.use_mmap as u8, info.formatting_info as u8, info.on_demand as u8
    )?;
    writeln!(out, "Ragged rows: {}", info.ragged_rows as u8)?;
    if info.formatting_info {
        writeln!(
            out,
            "FORMATs: {}, FONTs: {}, XFs: {}",
            book.formats.len(),
            book.fonts.len(),
            book.xfs.len()
        )?;
    }
    if !config.suppress_timing {
        writeln!(
            out,
            "Load time: {:.2} seconds (stage 1) {:.2} seconds (stage 2)",
            info.load_time_stage_1.as_secs_f64(),
            info.load_time_stage_2.as_secs_f64()
        )?;
    }
    writeln!(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::workbook::{BookInfo, Font};
    use pretty_assertions::assert_eq;

    fn render(book: &Workbook, config: &Configuration) -> String {
        let mut out = Vec::new();
        write_header(book, config, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_header_lines() {
        let info = BookInfo {
            datemode: 1,
            codepage: Some(1252),
            encoding: "cp1252".into(),
            countries: (1, 61),
            user_name: "clerk".into(),
            formatting_info: true,
            ..BookInfo::default()
        };
        let mut book = Workbook::from_sheets(info, Vec::new());
        book.fonts.push(Font::default());
        let config = Configuration {
            suppress_timing: true,
            ..Configuration::default()
        };

        assert_eq!(
            render(&book, &config),
            "\n\
             BIFF version: 8; datemode: 1\n\
             codepage: 1252 (encoding: cp1252); countries: (1, 61)\n\
             Last saved by: 'clerk'\n\
             Number of data sheets: 0\n\
             Use mmap: 0; Formatting: 1; On demand: 0\n\
             Ragged rows: 0\n\
             FORMATs: 0, FONTs: 1, XFs: 0\n\
             \n"
        );
    }

    #[test]
    fn test_header_timing_and_non_biff() {
        let info = BookInfo {
            format: FileFormat::Xlsx,
            biff_version: 0,
            codepage: None,
            ..BookInfo::default()
        };
        let book = Workbook::from_sheets(info, Vec::new());
        let text = render(&book, &Configuration::default());
        assert!(text.contains("BIFF version: (not BIFF) (xlsx); datemode: 0\n"));
        assert!(text.contains("codepage: None (encoding: utf_16_le)"));
        assert!(text.contains("Load time: 0.00 seconds (stage 1) 0.00 seconds (stage 2)\n"));
        assert!(!text.contains("FORMATs"));
    }
}
