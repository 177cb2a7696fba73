//! Workbook reader using calamine, with BIFF record scanning for `.xls`
//!
//! calamine supplies the sheet list, the cell grids and the defined names.
//! For `.xls` files the `Workbook` stream is also walked directly (see
//! [`biff`]) to recover the version, datemode, codepage, FONT / FORMAT / XF
//! records, name flags, label ranges and per-cell XF indices.

use crate::cell::Cell;
use crate::error::OpenError;
use anyhow::{Context, Result};
use calamine::{CellErrorType, Data, Ods, Range, Reader, Sheets, Xls, XlsOptions, Xlsb, Xlsx};
use std::fs::File;
use std::io::{self, BufReader, Cursor, Read, Seek, SeekFrom};
use std::path::Path;
use std::time::Instant;

pub mod biff;
pub mod workbook;

pub use workbook::{
    BookInfo, FileFormat, Font, Format, LabelRange, NameObj, Sheet, SheetSource, Workbook, Xf,
    XfIndex, XfLayout, XfSource,
};

const OLE2_MAGIC: [u8; 8] = [0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];
const ZIP_MAGIC: [u8; 4] = *b"PK\x03\x04";

/// Options passed to [`open_workbook`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OpenOptions {
    /// Read the whole file into memory instead of streaming it from disk
    pub use_mmap: bool,
    pub encoding_override: Option<String>,
    pub formatting_info: bool,
    pub on_demand: bool,
    pub ragged_rows: bool,
}

/// File contents, either fully buffered or read from disk as needed
enum Input {
    Memory(Cursor<Vec<u8>>),
    Disk(BufReader<File>),
}

impl Read for Input {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Input::Memory(c) => c.read(buf),
            Input::Disk(f) => f.read(buf),
        }
    }
}

impl Seek for Input {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        match self {
            Input::Memory(c) => c.seek(pos),
            Input::Disk(f) => f.seek(pos),
        }
    }
}

/// Render leading bytes the way the "found" part of a format error shows them
fn repr_bytes(bytes: &[u8]) -> String {
    let body: String = bytes
        .iter()
        .map(|&b| match b {
            b'\\' => "\\\\".to_string(),
            b'\'' => "\\'".to_string(),
            b' '..=b'~' => (b as char).to_string(),
            _ => format!("\\x{:02x}", b),
        })
        .collect();
    format!("b'{}'", body)
}

/// Decide the container format from the leading bytes and the file extension
pub fn sniff_format(head: &[u8], path: &Path) -> Result<FileFormat, OpenError> {
    if head.is_empty() {
        return Err(OpenError::UnsupportedFormat("File size is 0 bytes".to_string()));
    }
    if head.starts_with(&OLE2_MAGIC) {
        return Ok(FileFormat::Xls);
    }
    if head.starts_with(&ZIP_MAGIC) {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        return Ok(match ext.as_deref() {
            Some("xlsb") => FileFormat::Xlsb,
            Some("ods") => FileFormat::Ods,
            _ => FileFormat::Xlsx,
        });
    }
    Err(OpenError::UnsupportedFormat(format!(
        "Expected BOF record; found {}",
        repr_bytes(&head[..head.len().min(8)])
    )))
}

/// Encoding name for a workbook codepage
pub fn encoding_from_codepage(codepage: Option<u16>, biff_version: u16) -> String {
    match codepage {
        Some(1200) => "utf_16_le".to_string(),
        Some(367) => "ascii".to_string(),
        Some(10000) | Some(32768) => "mac_roman".to_string(),
        Some(32769) => "cp1252".to_string(),
        Some(cp) => format!("cp{}", cp),
        None if biff_version < 80 => "ascii".to_string(),
        None => "utf_16_le".to_string(),
    }
}

/// Codepage for a user-supplied encoding name
pub fn codepage_from_encoding(name: &str) -> Option<u16> {
    let normalized = name.to_ascii_lowercase().replace('-', "_");
    match normalized.as_str() {
        "utf_16_le" | "utf_16le" | "utf16le" => Some(1200),
        "ascii" | "us_ascii" => Some(367),
        "mac_roman" | "macroman" => Some(10000),
        "latin_1" | "latin1" | "iso_8859_1" => Some(1252),
        "utf_8" | "utf8" => Some(65001),
        other => other
            .strip_prefix("cp")
            .or_else(|| other.strip_prefix("windows_"))
            .and_then(|n| n.parse().ok()),
    }
}

fn error_code(e: &CellErrorType) -> u8 {
    match e {
        CellErrorType::Null => 0x00,
        CellErrorType::Div0 => 0x07,
        CellErrorType::Value => 0x0F,
        CellErrorType::Ref => 0x17,
        CellErrorType::Name => 0x1D,
        CellErrorType::Num => 0x24,
        CellErrorType::NA => 0x2A,
        CellErrorType::GettingData => 0x2B,
    }
}

fn convert_cell(data: &Data) -> Cell {
    match data {
        Data::Empty => Cell::empty(),
        Data::Int(i) => Cell::number(*i as f64),
        Data::Float(f) => Cell::number(*f),
        Data::String(s) => Cell::text(s.clone()),
        Data::Bool(b) => Cell::boolean(*b),
        Data::Error(e) => Cell::error(error_code(e)),
        Data::DateTime(dt) => Cell::date(dt.as_f64()),
        Data::DateTimeIso(s) => Cell::text(s.clone()),
        Data::DurationIso(s) => Cell::text(s.clone()),
    }
}

/// Build a row-major grid addressed from A1, so positions match the file
fn grid_from_range(range: &Range<Data>, xf: Option<&XfLayout>) -> Vec<Vec<Cell>> {
    let (mut nrows, mut ncols) = match range.end() {
        Some((r, c)) if !range.is_empty() => (r as usize + 1, c as usize + 1),
        _ => (0, 0),
    };
    // Formatted blank cells extend the grid even when calamine drops them
    if let Some(layout) = xf {
        for &(r, c) in layout.cells.keys() {
            nrows = nrows.max(r + 1);
            ncols = ncols.max(c + 1);
        }
    }

    let mut rows = Vec::with_capacity(nrows);
    for r in 0..nrows {
        let mut row = Vec::with_capacity(ncols);
        for c in 0..ncols {
            let cell = match range.get_value((r as u32, c as u32)) {
                Some(data) => convert_cell(data),
                None => Cell::empty(),
            };
            let blank = cell.ctype == crate::cell::CellType::Empty
                && xf.is_some_and(|layout| layout.cells.contains_key(&(r, c)));
            if blank {
                row.push(Cell::new(crate::cell::CellType::Blank, crate::cell::CellValue::Empty));
            } else {
                row.push(cell);
            }
        }
        rows.push(row);
    }
    rows
}

/// Raw BIFF data kept for per-sheet scans
struct BiffBook {
    stream: Vec<u8>,
    biff_version: u16,
    /// Substream offset for each calamine sheet, when it could be matched
    offsets: Vec<Option<usize>>,
}

/// Loads sheets through calamine, adding BIFF sheet records when available
struct CalamineSource {
    engine: Sheets<Input>,
    names: Vec<String>,
    biff: Option<BiffBook>,
    formatting_info: bool,
    ragged_rows: bool,
}

impl SheetSource for CalamineSource {
    fn load_sheet(&mut self, index: usize) -> Result<Sheet> {
        let name = self
            .names
            .get(index)
            .with_context(|| format!("sheet index {} out of range", index))?
            .clone();
        let range = self
            .engine
            .worksheet_range(&name)
            .with_context(|| format!("Failed to read sheet <{}>", name))?;

        let scan = self.biff.as_ref().and_then(|book| {
            let offset = book.offsets.get(index).copied().flatten()?;
            Some(biff::scan_sheet(&book.stream, offset, book.biff_version))
        });
        let layout = scan
            .as_ref()
            .filter(|_| self.formatting_info)
            .map(|s| s.xf.clone());

        let rows = grid_from_range(&range, layout.as_ref());
        let mut sheet = Sheet::from_rows(name, index, rows, self.ragged_rows);
        if let Some(layout) = layout {
            sheet = sheet.with_xf_layout(layout);
        }
        if let Some(scan) = scan {
            sheet = sheet.with_label_ranges(scan.col_label_ranges, scan.row_label_ranges);
        }
        tracing::trace!(sheet = index, nrows = sheet.nrows(), ncols = sheet.ncols(), "sheet built");
        Ok(sheet)
    }
}

fn match_offsets(names: &[String], bound: &[biff::BoundSheet]) -> Vec<Option<usize>> {
    if names.len() == bound.len() {
        return bound.iter().map(|b| Some(b.offset)).collect();
    }
    names
        .iter()
        .map(|n| bound.iter().find(|b| &b.name == n).map(|b| b.offset))
        .collect()
}

fn open_input(path: &Path, use_mmap: bool) -> Result<(Input, Vec<u8>), OpenError> {
    if use_mmap {
        let bytes = std::fs::read(path)?;
        let head = bytes[..bytes.len().min(8)].to_vec();
        Ok((Input::Memory(Cursor::new(bytes)), head))
    } else {
        let mut file = BufReader::new(File::open(path)?);
        let mut head = Vec::with_capacity(8);
        (&mut file).take(8).read_to_end(&mut head)?;
        file.seek(SeekFrom::Start(0))?;
        Ok((Input::Disk(file), head))
    }
}

fn read_biff_stream(path: &Path, input: &Input) -> Result<Vec<u8>, OpenError> {
    match input {
        Input::Memory(cursor) => {
            biff::read_workbook_stream(Cursor::new(cursor.get_ref().as_slice()))
        }
        Input::Disk(_) => biff::read_workbook_stream(BufReader::new(File::open(path)?)),
    }
}

/// Open a workbook and read its global data
///
/// Unless `on_demand` is set every sheet is loaded before returning; a sheet
/// that fails to load then fails the open.
pub fn open_workbook(path: &Path, options: &OpenOptions) -> Result<Workbook, OpenError> {
    let started = Instant::now();
    let (input, head) = open_input(path, options.use_mmap)?;
    let format = sniff_format(&head, path)?;

    if options.formatting_info && format != FileFormat::Xls {
        return Err(OpenError::NotImplemented(
            "formatting_info=True not yet implemented".to_string(),
        ));
    }
    let forced_codepage = match &options.encoding_override {
        Some(name) => Some(codepage_from_encoding(name).ok_or_else(|| {
            OpenError::NotImplemented(format!("Unknown encoding override <{}>", name))
        })?),
        None => None,
    };

    let mut info = BookInfo {
        format,
        use_mmap: options.use_mmap,
        formatting_info: options.formatting_info,
        on_demand: options.on_demand,
        ragged_rows: options.ragged_rows,
        ..BookInfo::default()
    };

    let mut globals = None;
    let engine = match format {
        FileFormat::Xls => {
            let stream = read_biff_stream(path, &input)?;
            let scanned = biff::scan_globals(&stream)?;
            tracing::debug!(biff_version = scanned.biff_version, "workbook globals scanned");
            let mut xls_options = XlsOptions::default();
            xls_options.force_codepage = forced_codepage;
            let xls = Xls::new_with_options(input, xls_options).map_err(calamine::Error::from)?;
            globals = Some((stream, scanned));
            Sheets::Xls(xls)
        }
        FileFormat::Xlsx => Sheets::Xlsx(Xlsx::new(input).map_err(calamine::Error::from)?),
        FileFormat::Xlsb => Sheets::Xlsb(Xlsb::new(input).map_err(calamine::Error::from)?),
        FileFormat::Ods => Sheets::Ods(Ods::new(input).map_err(calamine::Error::from)?),
    };

    let names = engine.sheet_names();
    let defined: Vec<(String, String)> = engine.defined_names().to_vec();

    let mut name_objs: Vec<NameObj> = defined
        .into_iter()
        .enumerate()
        .map(|(i, (name, result))| NameObj {
            name_index: i,
            name,
            scope: -1,
            result,
            ..NameObj::default()
        })
        .collect();

    let mut book_parts = (Vec::new(), Vec::new(), Vec::new());
    let biff_book = match globals {
        Some((stream, g)) => {
            info.biff_version = g.biff_version;
            info.datemode = g.datemode;
            info.codepage = forced_codepage.or(g.codepage);
            info.encoding = match &options.encoding_override {
                Some(name) => name.clone(),
                None => encoding_from_codepage(g.codepage, g.biff_version),
            };
            info.countries = g.countries;
            info.user_name = g.user_name;

            // calamine keeps NAME records in file order, so flags line up by index
            if g.names.len() == name_objs.len() {
                for (obj, record) in name_objs.iter_mut().zip(&g.names) {
                    let flags = record.option_flags;
                    obj.option_flags = flags;
                    obj.hidden = flags & 0x01 != 0;
                    obj.func = flags & 0x02 != 0;
                    obj.vbasic = flags & 0x04 != 0;
                    obj.macro_ = flags & 0x08 != 0;
                    obj.complex = flags & 0x10 != 0;
                    obj.builtin = flags & 0x20 != 0;
                    obj.scope = if record.sheet_tab == 0 {
                        -1
                    } else {
                        record.sheet_tab as i32 - 1
                    };
                }
            } else {
                tracing::warn!(
                    records = g.names.len(),
                    defined = name_objs.len(),
                    "NAME record count differs from defined names; flags not attached"
                );
            }
            book_parts = (g.formats, g.fonts, g.xfs);
            Some(BiffBook {
                offsets: match_offsets(&names, &g.bound_sheets),
                stream,
                biff_version: g.biff_version,
            })
        }
        None => {
            info.biff_version = 0;
            info.codepage = None;
            info.encoding = "utf_8".to_string();
            None
        }
    };
    if biff_book.is_none() {
        name_objs.iter_mut().for_each(|n| n.builtin = n.name.starts_with("_xlnm."));
    }

    let source = CalamineSource {
        engine,
        names: names.clone(),
        biff: biff_book,
        formatting_info: options.formatting_info,
        ragged_rows: options.ragged_rows,
    };
    info.load_time_stage_1 = started.elapsed();

    let mut book = Workbook::new(info, names, Box::new(source));
    let (formats, fonts, xfs) = book_parts;
    book.formats = formats;
    book.fonts = fonts;
    book.xfs = xfs;
    book.names = name_objs;

    if !options.on_demand {
        let stage_2 = Instant::now();
        book.load_all()
            .map_err(|e| OpenError::Malformed(format!("{:#}", e)))?;
        book.info.load_time_stage_2 = stage_2.elapsed();
        tracing::debug!(nsheets = book.nsheets(), "all sheets loaded");
    }

    Ok(book)
}

/// Read the raw BIFF `Workbook` stream of an `.xls` file
pub fn read_workbook_stream(path: &Path) -> Result<Vec<u8>, OpenError> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    let mut head = Vec::with_capacity(8);
    (&mut reader).take(8).read_to_end(&mut head)?;
    if sniff_format(&head, path)? != FileFormat::Xls {
        return Err(OpenError::NotImplemented(
            "BIFF record dumps need an OLE2 (.xls) file".to_string(),
        ));
    }
    reader.seek(SeekFrom::Start(0))?;
    biff::read_workbook_stream(reader)
}
