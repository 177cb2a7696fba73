//! Font table dump (`fonts`)

use crate::config::Configuration;
use crate::reader::Workbook;
use crate::report::header::write_header;
use anyhow::Result;
use std::io::Write;

pub fn write_fonts(book: &mut Workbook, config: &Configuration, out: &mut dyn Write) -> Result<()> {
    write_header(book, config, out)?;
    writeln!(out, "Fonts:")?;
    for (x, font) in book.fonts.iter().enumerate() {
        writeln!(out, "== Index {} ==", x)?;
        for (attr, value) in font.attributes() {
            writeln!(out, "    {}: {}", attr, value)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::workbook::{BookInfo, Font};

    #[test]
    fn test_fonts_dump() {
        let mut book = Workbook::from_sheets(BookInfo::default(), Vec::new());
        book.fonts.push(Font {
            name: "Arial".into(),
            height: 200,
            weight: 700,
            bold: true,
            ..Font::default()
        });
        book.fonts.push(Font {
            font_index: 1,
            name: "Courier".into(),
            ..Font::default()
        });
        let config = Configuration {
            suppress_timing: true,
            ..Configuration::default()
        };

        let mut out = Vec::new();
        write_fonts(&mut book, &config, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let body = text.split_once("Fonts:\n").unwrap().1;
        assert!(body.starts_with("== Index 0 ==\n    bold: 1\n    character_set: 0\n"));
        assert!(body.contains("    name: 'Arial'\n"));
        assert!(body.contains("== Index 1 ==\n"));
        assert!(body.ends_with("    weight: 0\n"));
        assert_eq!(body.matches("    height: ").count(), 2);
    }
}
