#![allow(dead_code)]

use std::fs::File;
use std::io::{Cursor, Write};
use std::path::Path;
use zip::ZipWriter;
use zip::write::FileOptions;

/// Cell content for the mock xlsx builder
pub enum MockCell {
    Text(&'static str),
    Number(f64),
    Bool(bool),
    Error(&'static str),
}

fn cell_xml(reference: &str, cell: &MockCell) -> String {
    match cell {
        MockCell::Text(s) => format!(r#"<c r="{reference}" t="inlineStr"><is><t>{s}</t></is></c>"#),
        MockCell::Number(n) => format!(r#"<c r="{reference}"><v>{n}</v></c>"#),
        MockCell::Bool(b) => format!(r#"<c r="{reference}" t="b"><v>{}</v></c>"#, *b as u8),
        MockCell::Error(e) => format!(r#"<c r="{reference}" t="e"><v>{e}</v></c>"#),
    }
}

fn column_letters(mut col: usize) -> String {
    let mut out = String::new();
    loop {
        out.insert(0, (b'A' + (col % 26) as u8) as char);
        if col < 26 {
            break;
        }
        col = col / 26 - 1;
    }
    out
}

// Helper to create a minimal valid XLSX file with cell data
pub fn create_mock_xlsx(
    path: &Path,
    sheets: &[(&str, Vec<Vec<MockCell>>)],
    ranges: &[(&str, &str)],
) -> anyhow::Result<()> {
    let file = File::create(path)?;
    let mut zip = ZipWriter::new(file);
    let options = FileOptions::<()>::default().compression_method(zip::CompressionMethod::Stored);

    zip.start_file("[Content_Types].xml", options)?;
    let mut content_types = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
<Default Extension="xml" ContentType="application/xml"/>
<Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/>
"#,
    );
    for (i, _) in sheets.iter().enumerate() {
        content_types.push_str(&format!(
            r#"<Override PartName="/xl/worksheets/sheet{}.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>"#,
            i + 1
        ));
    }
    content_types.push_str("</Types>");
    zip.write_all(content_types.as_bytes())?;

    zip.start_file("_rels/.rels", options)?;
    zip.write_all(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/>
</Relationships>"#.as_bytes())?;

    zip.start_file("xl/workbook.xml", options)?;
    let mut workbook_xml = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">
<sheets>
"#,
    );
    for (i, (name, _)) in sheets.iter().enumerate() {
        workbook_xml.push_str(&format!(
            r#"<sheet name="{}" sheetId="{}" r:id="rId{}"/>"#,
            name,
            i + 1,
            i + 1
        ));
    }
    workbook_xml.push_str("</sheets>");
    if !ranges.is_empty() {
        workbook_xml.push_str("<definedNames>");
        for (name, content) in ranges {
            workbook_xml.push_str(&format!(
                r#"<definedName name="{}">{}</definedName>"#,
                name, content
            ));
        }
        workbook_xml.push_str("</definedNames>");
    }
    workbook_xml.push_str("</workbook>");
    zip.write_all(workbook_xml.as_bytes())?;

    zip.start_file("xl/_rels/workbook.xml.rels", options)?;
    let mut rels_xml = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
"#,
    );
    for (i, _) in sheets.iter().enumerate() {
        rels_xml.push_str(&format!(
            r#"<Relationship Id="rId{}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet{}.xml"/>"#,
            i + 1, i + 1
        ));
    }
    rels_xml.push_str("</Relationships>");
    zip.write_all(rels_xml.as_bytes())?;

    for (i, (_, rows)) in sheets.iter().enumerate() {
        zip.start_file(format!("xl/worksheets/sheet{}.xml", i + 1), options)?;
        let mut sheet_xml = String::from(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData>"#,
        );
        for (r, row) in rows.iter().enumerate() {
            sheet_xml.push_str(&format!(r#"<row r="{}">"#, r + 1));
            for (c, cell) in row.iter().enumerate() {
                sheet_xml.push_str(&cell_xml(&format!("{}{}", column_letters(c), r + 1), cell));
            }
            sheet_xml.push_str("</row>");
        }
        sheet_xml.push_str("</sheetData></worksheet>");
        zip.write_all(sheet_xml.as_bytes())?;
    }

    zip.finish()?;
    Ok(())
}

/// Numbers 1..=n*cols laid out row by row
pub fn number_grid(nrows: usize, ncols: usize) -> Vec<Vec<MockCell>> {
    (0..nrows)
        .map(|r| (0..ncols).map(|c| MockCell::Number((r * ncols + c) as f64 + 0.5)).collect())
        .collect()
}

// -- BIFF8 .xls fixtures --------------------------------------------------------

const RECORD_BOF: u16 = 0x0809;
const RECORD_EOF: u16 = 0x000A;
const RECORD_CODEPAGE: u16 = 0x0042;
const RECORD_DATEMODE: u16 = 0x0022;
const RECORD_WINDOW1: u16 = 0x003D;
const RECORD_FILEPASS: u16 = 0x002F;
const RECORD_FONT: u16 = 0x0031;
const RECORD_XF: u16 = 0x00E0;
const RECORD_BOUNDSHEET: u16 = 0x0085;
const RECORD_WINDOW2: u16 = 0x023E;
const RECORD_DIMENSIONS: u16 = 0x0200;
const RECORD_BLANK: u16 = 0x0201;
const RECORD_NUMBER: u16 = 0x0203;
const RECORD_LABELRANGES: u16 = 0x015F;

const BOF_DT_WORKBOOK_GLOBALS: u16 = 0x0005;
const BOF_DT_WORKSHEET: u16 = 0x0010;

/// XF index of the General cell format in [`build_xls`] fixtures
pub const XF_GENERAL: u16 = 16;
/// XF index of the built-in date format (m/d/yyyy) in [`build_xls`] fixtures
pub const XF_DATE: u16 = 17;

fn push_record(out: &mut Vec<u8>, id: u16, data: &[u8]) {
    out.extend_from_slice(&id.to_le_bytes());
    out.extend_from_slice(&(data.len() as u16).to_le_bytes());
    out.extend_from_slice(data);
}

fn bof(dt: u16) -> [u8; 16] {
    let mut out = [0u8; 16];
    out[0..2].copy_from_slice(&0x0600u16.to_le_bytes());
    out[2..4].copy_from_slice(&dt.to_le_bytes());
    out[4..6].copy_from_slice(&0x0DBBu16.to_le_bytes());
    out[6..8].copy_from_slice(&0x07CCu16.to_le_bytes());
    out
}

fn window1() -> [u8; 18] {
    let mut out = [0u8; 18];
    out[14..16].copy_from_slice(&1u16.to_le_bytes());
    out[16..18].copy_from_slice(&600u16.to_le_bytes());
    out
}

fn window2() -> [u8; 18] {
    let mut out = [0u8; 18];
    out[0..2].copy_from_slice(&0x02B6u16.to_le_bytes());
    out
}

fn write_short_unicode_string(out: &mut Vec<u8>, s: &str) {
    out.push(s.len() as u8);
    out.push(0);
    out.extend_from_slice(s.as_bytes());
}

fn font(name: &str) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&200u16.to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes());
    out.extend_from_slice(&0x7FFFu16.to_le_bytes());
    out.extend_from_slice(&400u16.to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes());
    out.extend_from_slice(&[0, 0, 0, 0]);
    write_short_unicode_string(&mut out, name);
    out
}

fn xf_record(fmt_idx: u16, is_style_xf: bool) -> [u8; 20] {
    let mut out = [0u8; 20];
    out[2..4].copy_from_slice(&fmt_idx.to_le_bytes());
    let flags: u16 = 0x0001 | if is_style_xf { 0x0004 } else { 0 };
    out[4..6].copy_from_slice(&flags.to_le_bytes());
    out[6] = 0x20;
    out[9] = 0x3F;
    out
}

fn number_cell(row: u16, col: u16, xf: u16, v: f64) -> [u8; 14] {
    let mut out = [0u8; 14];
    out[0..2].copy_from_slice(&row.to_le_bytes());
    out[2..4].copy_from_slice(&col.to_le_bytes());
    out[4..6].copy_from_slice(&xf.to_le_bytes());
    out[6..14].copy_from_slice(&v.to_le_bytes());
    out
}

fn blank_cell(row: u16, col: u16, xf: u16) -> [u8; 6] {
    let mut out = [0u8; 6];
    out[0..2].copy_from_slice(&row.to_le_bytes());
    out[2..4].copy_from_slice(&col.to_le_bytes());
    out[4..6].copy_from_slice(&xf.to_le_bytes());
    out
}

/// Sheet "Data": A1 = 1.5, A2 = date 2024-01-15, B2 = formatted blank,
/// with a row label range over A1:A2
fn data_sheet_stream() -> Vec<u8> {
    let mut sheet = Vec::new();
    push_record(&mut sheet, RECORD_BOF, &bof(BOF_DT_WORKSHEET));

    let mut dims = Vec::new();
    dims.extend_from_slice(&0u32.to_le_bytes());
    dims.extend_from_slice(&2u32.to_le_bytes());
    dims.extend_from_slice(&0u16.to_le_bytes());
    dims.extend_from_slice(&2u16.to_le_bytes());
    dims.extend_from_slice(&0u16.to_le_bytes());
    push_record(&mut sheet, RECORD_DIMENSIONS, &dims);
    push_record(&mut sheet, RECORD_WINDOW2, &window2());

    push_record(&mut sheet, RECORD_NUMBER, &number_cell(0, 0, XF_GENERAL, 1.5));
    push_record(&mut sheet, RECORD_NUMBER, &number_cell(1, 0, XF_DATE, 45306.0));
    push_record(&mut sheet, RECORD_BLANK, &blank_cell(1, 1, XF_GENERAL));

    let mut labels = Vec::new();
    labels.extend_from_slice(&1u16.to_le_bytes());
    for v in [0u16, 1, 0, 0] {
        labels.extend_from_slice(&v.to_le_bytes());
    }
    labels.extend_from_slice(&0u16.to_le_bytes());
    push_record(&mut sheet, RECORD_LABELRANGES, &labels);

    push_record(&mut sheet, RECORD_EOF, &[]);
    sheet
}

fn workbook_stream(encrypted: bool) -> Vec<u8> {
    let mut globals = Vec::new();
    push_record(&mut globals, RECORD_BOF, &bof(BOF_DT_WORKBOOK_GLOBALS));
    if encrypted {
        push_record(&mut globals, RECORD_FILEPASS, &[]);
        push_record(&mut globals, RECORD_EOF, &[]);
        return globals;
    }
    push_record(&mut globals, RECORD_CODEPAGE, &1252u16.to_le_bytes());
    push_record(&mut globals, RECORD_DATEMODE, &0u16.to_le_bytes());
    push_record(&mut globals, RECORD_WINDOW1, &window1());
    push_record(&mut globals, RECORD_FONT, &font("Arial"));
    for _ in 0..16 {
        push_record(&mut globals, RECORD_XF, &xf_record(0, true));
    }
    push_record(&mut globals, RECORD_XF, &xf_record(0, false));
    push_record(&mut globals, RECORD_XF, &xf_record(14, false));

    let boundsheet_start = globals.len();
    let mut boundsheet = Vec::new();
    boundsheet.extend_from_slice(&0u32.to_le_bytes());
    boundsheet.extend_from_slice(&0u16.to_le_bytes());
    write_short_unicode_string(&mut boundsheet, "Data");
    push_record(&mut globals, RECORD_BOUNDSHEET, &boundsheet);
    let offset_pos = boundsheet_start + 4;
    push_record(&mut globals, RECORD_EOF, &[]);

    let sheet_offset = globals.len();
    globals[offset_pos..offset_pos + 4].copy_from_slice(&(sheet_offset as u32).to_le_bytes());
    globals.extend_from_slice(&data_sheet_stream());
    globals
}

/// Minimal single-sheet BIFF8 workbook inside an OLE2 container
pub fn build_xls(encrypted: bool) -> Vec<u8> {
    let stream = workbook_stream(encrypted);
    let cursor = Cursor::new(Vec::new());
    let mut ole = cfb::CompoundFile::create(cursor).expect("create cfb");
    {
        let mut out = ole.create_stream("Workbook").expect("Workbook stream");
        out.write_all(&stream).expect("write Workbook stream");
    }
    ole.into_inner().into_inner()
}

pub fn write_xls(path: &Path, encrypted: bool) -> anyhow::Result<()> {
    std::fs::write(path, build_xls(encrypted))?;
    Ok(())
}
