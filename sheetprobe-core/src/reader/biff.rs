//! Minimal BIFF record walking over the OLE2 `Workbook` stream
//!
//! calamine decodes cell contents but keeps the workbook-global records to
//! itself. This module reads just enough of the raw record stream to recover
//! what the reports need: version, datemode, codepage, countries, the user
//! name, FONT / FORMAT / XF / NAME records, sheet offsets, per-cell XF indices
//! and label ranges. It also backs the record dump and record count commands.
//!
//! Parsing is best-effort: truncated or short records are skipped with a
//! warning rather than failing the whole file.

use crate::error::OpenError;
use crate::reader::workbook::{Font, Format, LabelRange, Xf, XfLayout};
use std::collections::BTreeMap;
use std::io::{self, Read, Seek, Write};

pub const RECORD_FORMULA: u16 = 0x0006;
pub const RECORD_EOF: u16 = 0x000A;
pub const RECORD_NAME: u16 = 0x0018;
pub const RECORD_FORMAT_B23: u16 = 0x001E;
pub const RECORD_DATEMODE: u16 = 0x0022;
pub const RECORD_FILEPASS: u16 = 0x002F;
pub const RECORD_FONT: u16 = 0x0031;
pub const RECORD_CODEPAGE: u16 = 0x0042;
pub const RECORD_WRITEACCESS: u16 = 0x005C;
pub const RECORD_COLINFO: u16 = 0x007D;
pub const RECORD_BOUNDSHEET: u16 = 0x0085;
pub const RECORD_COUNTRY: u16 = 0x008C;
pub const RECORD_MULRK: u16 = 0x00BD;
pub const RECORD_MULBLANK: u16 = 0x00BE;
pub const RECORD_RSTRING: u16 = 0x00D6;
pub const RECORD_XF: u16 = 0x00E0;
pub const RECORD_LABELSST: u16 = 0x00FD;
pub const RECORD_LABELRANGES: u16 = 0x015F;
pub const RECORD_BLANK: u16 = 0x0201;
pub const RECORD_NUMBER: u16 = 0x0203;
pub const RECORD_LABEL: u16 = 0x0204;
pub const RECORD_BOOLERR: u16 = 0x0205;
pub const RECORD_ROW: u16 = 0x0208;
pub const RECORD_FONT_B34: u16 = 0x0231;
pub const RECORD_RK: u16 = 0x027E;
pub const RECORD_FORMAT: u16 = 0x041E;

/// Display name of a record code
pub fn record_name(code: u16) -> Option<&'static str> {
    let name = match code {
        0x0006 => "FORMULA",
        0x0009 => "BOF_B2",
        0x000A => "EOF",
        0x000C => "CALCCOUNT",
        0x000D => "CALCMODE",
        0x000E => "PRECISION",
        0x000F => "REFMODE",
        0x0010 => "DELTA",
        0x0011 => "ITERATION",
        0x0012 => "PROTECT",
        0x0013 => "PASSWORD",
        0x0014 => "HEADER",
        0x0015 => "FOOTER",
        0x0017 => "EXTERNSHEET",
        0x0018 => "NAME",
        0x0019 => "WINDOWPROTECT",
        0x001A => "VERTICALPAGEBREAKS",
        0x001B => "HORIZONTALPAGEBREAKS",
        0x001C => "NOTE",
        0x001D => "SELECTION",
        0x001E => "FORMAT_B2-3",
        0x0022 => "DATEMODE",
        0x0023 => "EXTERNNAME",
        0x0026 => "LEFTMARGIN",
        0x0027 => "RIGHTMARGIN",
        0x0028 => "TOPMARGIN",
        0x0029 => "BOTTOMMARGIN",
        0x002A => "PRINTHEADERS",
        0x002B => "PRINTGRIDLINES",
        0x002F => "FILEPASS",
        0x0031 => "FONT",
        0x003C => "CONTINUE",
        0x003D => "WINDOW1",
        0x0040 => "BACKUP",
        0x0041 => "PANE",
        0x0042 => "CODEPAGE",
        0x004D => "PLS",
        0x0055 => "DEFCOLWIDTH",
        0x0059 => "XCT",
        0x005A => "CRN",
        0x005B => "FILESHARING",
        0x005C => "WRITEACCESS",
        0x005D => "OBJ",
        0x005E => "UNCALCED",
        0x005F => "SAVERECALC",
        0x0063 => "OBJECTPROTECT",
        0x007D => "COLINFO",
        0x0080 => "GUTS",
        0x0081 => "WSBOOL",
        0x0082 => "GRIDSET",
        0x0083 => "HCENTER",
        0x0084 => "VCENTER",
        0x0085 => "BOUNDSHEET",
        0x0086 => "WRITEPROT",
        0x008C => "COUNTRY",
        0x008D => "HIDEOBJ",
        0x0092 => "PALETTE",
        0x0099 => "STANDARDWIDTH",
        0x00A0 => "SCL",
        0x00A1 => "SETUP",
        0x00BD => "MULRK",
        0x00BE => "MULBLANK",
        0x00C1 => "MMS",
        0x00D6 => "RSTRING",
        0x00D7 => "DBCELL",
        0x00DA => "BOOKBOOL",
        0x00E0 => "XF",
        0x00E1 => "INTERFACEHDR",
        0x00E2 => "INTERFACEEND",
        0x00E5 => "MERGEDCELLS",
        0x00E9 => "BITMAP",
        0x00EB => "MSO_DRAWING_GROUP",
        0x00EC => "MSO_DRAWING",
        0x00ED => "MSO_DRAWING_SELECTION",
        0x00EF => "PHONETIC",
        0x00FC => "SST",
        0x00FD => "LABELSST",
        0x00FF => "EXTSST",
        0x013D => "TABID",
        0x015F => "LABELRANGES",
        0x0160 => "USESELFS",
        0x0161 => "DSF",
        0x01AE => "SUPBOOK",
        0x01AF => "PROT4REV",
        0x01B0 => "CONDFMT",
        0x01B1 => "CF",
        0x01B2 => "DVAL",
        0x01B6 => "TXO",
        0x01B7 => "REFRESHALL",
        0x01B8 => "HLINK",
        0x01BC => "PROT4REVPASSWORD",
        0x01BE => "DV",
        0x01C0 => "EXCEL9FILE",
        0x01C1 => "RECALCID",
        0x0200 => "DIMENSIONS",
        0x0201 => "BLANK",
        0x0203 => "NUMBER",
        0x0204 => "LABEL",
        0x0205 => "BOOLERR",
        0x0207 => "STRING",
        0x0208 => "ROW",
        0x0209 => "BOF_B3",
        0x020B => "INDEX",
        0x0221 => "ARRAY",
        0x0225 => "DEFAULTROWHEIGHT",
        0x0231 => "FONT_B3B4",
        0x023E => "WINDOW2",
        0x027E => "RK",
        0x0293 => "STYLE",
        0x0406 => "FORMULA_B4",
        0x0409 => "BOF_B4",
        0x041E => "FORMAT",
        0x04BC => "SHRFMLA",
        0x0800 => "QUICKTIP",
        0x0809 => "BOF",
        0x0862 => "SHEETLAYOUT",
        0x0867 => "SHEETPROTECTION",
        0x0868 => "RANGEPROTECTION",
        0x088C => "COMPAT12",
        0x0892 => "STYLEEXT",
        0x089A => "MTRSETTINGS",
        0x08A3 => "FORCEFULLCALCULATION",
        _ => return None,
    };
    Some(name)
}

pub fn is_bof_record(code: u16) -> bool {
    matches!(code, 0x0009 | 0x0209 | 0x0409 | 0x0809)
}

/// One physical record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Record<'a> {
    pub offset: usize,
    pub code: u16,
    pub data: &'a [u8],
}

/// Iterator over the physical records of a stream, starting at an offset
pub struct Records<'a> {
    stream: &'a [u8],
    pos: usize,
}

impl<'a> Records<'a> {
    pub fn new(stream: &'a [u8], offset: usize) -> Self {
        Self {
            stream,
            pos: offset,
        }
    }
}

impl<'a> Iterator for Records<'a> {
    type Item = Record<'a>;

    fn next(&mut self) -> Option<Record<'a>> {
        let header = self.stream.get(self.pos..self.pos + 4)?;
        let code = u16::from_le_bytes([header[0], header[1]]);
        let len = u16::from_le_bytes([header[2], header[3]]) as usize;
        let start = self.pos + 4;
        let Some(data) = self.stream.get(start..start + len) else {
            tracing::warn!(offset = self.pos, code, len, "truncated BIFF record");
            self.pos = self.stream.len();
            return None;
        };
        let record = Record {
            offset: self.pos,
            code,
            data,
        };
        self.pos = start + len;
        Some(record)
    }
}

fn u16_at(data: &[u8], pos: usize) -> Option<u16> {
    data.get(pos..pos + 2).map(|b| u16::from_le_bytes([b[0], b[1]]))
}

fn u32_at(data: &[u8], pos: usize) -> Option<u32> {
    data.get(pos..pos + 4)
        .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
}

fn latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}

/// Read a length-prefixed string at `pos`
///
/// BIFF8 strings carry an option byte after the length (bit 0 set means
/// UTF-16LE characters); earlier versions store 8-bit characters directly.
pub fn unpack_string(data: &[u8], pos: usize, biff_version: u16, lenlen: usize) -> Option<String> {
    let (nchars, mut p) = match lenlen {
        1 => (*data.get(pos)? as usize, pos + 1),
        _ => (u16_at(data, pos)? as usize, pos + 2),
    };
    if biff_version < 80 {
        return data.get(p..p + nchars).map(latin1);
    }
    let options = *data.get(p)?;
    p += 1;
    if options & 0x01 != 0 {
        let raw = data.get(p..p + 2 * nchars)?;
        let units: Vec<u16> = raw
            .chunks_exact(2)
            .map(|c| u16::from_le_bytes([c[0], c[1]]))
            .collect();
        Some(String::from_utf16_lossy(&units))
    } else {
        data.get(p..p + nchars).map(latin1)
    }
}

/// Read the `Workbook` (or older `Book`) stream out of an OLE2 container
pub fn read_workbook_stream<R: Read + Seek>(reader: R) -> Result<Vec<u8>, OpenError> {
    let mut comp = cfb::CompoundFile::open(reader)
        .map_err(|e| OpenError::Malformed(format!("Can't open OLE2 container: {}", e)))?;
    for candidate in ["/Workbook", "/Book", "Workbook", "Book"] {
        if let Ok(mut stream) = comp.open_stream(candidate) {
            let mut bytes = Vec::new();
            stream.read_to_end(&mut bytes)?;
            return Ok(bytes);
        }
    }
    Err(OpenError::Malformed(
        "Can't find workbook in OLE2 compound document".to_string(),
    ))
}

/// Version number encoded by a BOF record
pub fn bof_version(code: u16, data: &[u8]) -> u16 {
    match code >> 8 {
        0x08 => {
            let version = u16_at(data, 0).unwrap_or(0);
            let build = u16_at(data, 4).unwrap_or(0);
            let year = u16_at(data, 6).unwrap_or(0);
            match version {
                0x0600 => 80,
                0x0500 if year < 1994 || matches!(build, 2412 | 3218 | 3321) => 50,
                0x0500 => 70,
                // Version 0 shows up in files written by some third-party tools
                _ => 80,
            }
        }
        0x04 => 40,
        0x02 => 30,
        _ => 21,
    }
}

/// Sheet entry from a BOUNDSHEET record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundSheet {
    pub offset: usize,
    pub name: String,
    pub sheet_type: u8,
}

/// Option flags and sheet tab of a NAME record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameRecord {
    pub option_flags: u16,
    pub sheet_tab: u16,
    pub name: String,
}

/// Everything gathered from the workbook-globals substream
#[derive(Debug, Clone, Default)]
pub struct Globals {
    pub biff_version: u16,
    pub datemode: u8,
    pub codepage: Option<u16>,
    pub countries: (u16, u16),
    pub user_name: String,
    pub fonts: Vec<Font>,
    pub formats: Vec<Format>,
    pub xfs: Vec<Xf>,
    pub names: Vec<NameRecord>,
    pub bound_sheets: Vec<BoundSheet>,
}

const BUILTIN_NAMES: [&str; 14] = [
    "Consolidate_Area",
    "Auto_Open",
    "Auto_Close",
    "Extract",
    "Database",
    "Criteria",
    "Print_Area",
    "Print_Titles",
    "Recorder",
    "Data_Form",
    "Auto_Activate",
    "Auto_Deactivate",
    "Sheet_Title",
    "_FilterDatabase",
];

fn parse_font(data: &[u8], biff_version: u16, font_index: usize) -> Option<Font> {
    let height = u16_at(data, 0)?;
    let options = u16_at(data, 2)?;
    let name = if biff_version >= 50 {
        unpack_string(data, 14, biff_version, 1)?
    } else {
        // BIFF3-4 FONT: height, options, colour, then the name
        unpack_string(data, 6, biff_version, 1)?
    };
    let mut font = Font {
        font_index,
        name,
        height,
        bold: options & 0x01 != 0,
        italic: options & 0x02 != 0,
        underlined: options & 0x04 != 0,
        struck_out: options & 0x08 != 0,
        outline: options & 0x10 != 0,
        shadow: options & 0x20 != 0,
        colour_index: u16_at(data, 4)?,
        ..Font::default()
    };
    if biff_version >= 50 {
        font.weight = u16_at(data, 6)?;
        font.escapement = u16_at(data, 8)?;
        font.underline_type = *data.get(10)?;
        font.family = *data.get(11)?;
        font.character_set = *data.get(12)?;
    } else {
        font.weight = if font.bold { 700 } else { 400 };
        font.underline_type = font.underlined as u8;
    }
    Some(font)
}

fn parse_name(data: &[u8], biff_version: u16) -> Option<NameRecord> {
    let option_flags = u16_at(data, 0)?;
    let nchars = *data.get(3)? as usize;
    let sheet_tab = u16_at(data, 8)?;
    let name = if biff_version >= 80 {
        let options = *data.get(14)?;
        let start = 15;
        if options & 0x01 != 0 {
            let raw = data.get(start..start + 2 * nchars)?;
            let units: Vec<u16> = raw
                .chunks_exact(2)
                .map(|c| u16::from_le_bytes([c[0], c[1]]))
                .collect();
            String::from_utf16_lossy(&units)
        } else {
            latin1(data.get(start..start + nchars)?)
        }
    } else {
        latin1(data.get(14..14 + nchars)?)
    };
    let name = if option_flags & 0x20 != 0 && name.chars().count() == 1 {
        let code = name.chars().next().map_or(u32::MAX, |c| c as u32) as usize;
        BUILTIN_NAMES
            .get(code)
            .map_or(name.clone(), |builtin| builtin.to_string())
    } else {
        name
    };
    Some(NameRecord {
        option_flags,
        sheet_tab,
        name,
    })
}

/// Scan the workbook-globals substream
pub fn scan_globals(stream: &[u8]) -> Result<Globals, OpenError> {
    let mut records = Records::new(stream, 0);
    let first = records.next().ok_or_else(|| {
        OpenError::UnsupportedFormat("Expected BOF record; workbook stream is empty".to_string())
    })?;
    if !is_bof_record(first.code) {
        let found: Vec<String> = stream.iter().take(8).map(|b| format!("{:02x}", b)).collect();
        return Err(OpenError::UnsupportedFormat(format!(
            "Expected BOF record; found {}",
            found.join(" ")
        )));
    }

    let mut globals = Globals {
        biff_version: bof_version(first.code, first.data),
        ..Globals::default()
    };
    let bv = globals.biff_version;

    for record in records {
        let data = record.data;
        match record.code {
            RECORD_EOF => break,
            RECORD_FILEPASS => {
                return Err(OpenError::NotImplemented("Workbook is encrypted".to_string()));
            }
            RECORD_DATEMODE => globals.datemode = u16_at(data, 0).unwrap_or(0) as u8,
            RECORD_CODEPAGE => globals.codepage = u16_at(data, 0),
            RECORD_COUNTRY => {
                globals.countries = (u16_at(data, 0).unwrap_or(0), u16_at(data, 2).unwrap_or(0));
            }
            RECORD_WRITEACCESS => {
                let lenlen = if bv >= 80 { 2 } else { 1 };
                if let Some(name) = unpack_string(data, 0, bv, lenlen) {
                    globals.user_name = name.trim_end_matches(' ').to_string();
                }
            }
            RECORD_FONT | RECORD_FONT_B34 => {
                // Font index 4 is never written; keep indices aligned with XF references
                if globals.fonts.len() == 4 {
                    globals.fonts.push(Font {
                        font_index: 4,
                        name: "Dummy Font".to_string(),
                        ..Font::default()
                    });
                }
                let index = globals.fonts.len();
                match parse_font(data, bv, index) {
                    Some(font) => globals.fonts.push(font),
                    None => tracing::warn!(offset = record.offset, "short FONT record skipped"),
                }
            }
            RECORD_FORMAT | RECORD_FORMAT_B23 => {
                let (key, text) = if bv >= 80 {
                    (u16_at(data, 0), unpack_string(data, 2, bv, 2))
                } else if bv >= 40 {
                    (u16_at(data, 0), unpack_string(data, 2, bv, 1))
                } else {
                    (Some(globals.formats.len() as u16), unpack_string(data, 0, bv, 1))
                };
                match (key, text) {
                    (Some(format_key), Some(format_str)) => globals.formats.push(Format {
                        format_key,
                        format_str,
                    }),
                    _ => tracing::warn!(offset = record.offset, "short FORMAT record skipped"),
                }
            }
            RECORD_XF => {
                let xf_index = globals.xfs.len();
                globals.xfs.push(Xf {
                    xf_index,
                    font_index: u16_at(data, 0).unwrap_or(0),
                    format_key: u16_at(data, 2).unwrap_or(0),
                });
            }
            RECORD_NAME => match parse_name(data, bv) {
                Some(name) => globals.names.push(name),
                None => tracing::warn!(offset = record.offset, "short NAME record skipped"),
            },
            RECORD_BOUNDSHEET => {
                let offset = u32_at(data, 0).unwrap_or(0) as usize;
                let sheet_type = data.get(5).copied().unwrap_or(0);
                let name = unpack_string(data, 6, bv, 1).unwrap_or_default();
                globals.bound_sheets.push(BoundSheet {
                    offset,
                    name,
                    sheet_type,
                });
            }
            _ => {}
        }
    }

    Ok(globals)
}

/// Formatting and label information of one sheet substream
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SheetScan {
    pub xf: XfLayout,
    pub col_label_ranges: Vec<LabelRange>,
    pub row_label_ranges: Vec<LabelRange>,
}

fn parse_label_ranges(data: &[u8], pos: &mut usize) -> Vec<LabelRange> {
    let count = u16_at(data, *pos).unwrap_or(0) as usize;
    *pos += 2;
    let mut ranges = Vec::with_capacity(count);
    for _ in 0..count {
        let (Some(rlo), Some(rhi), Some(clo), Some(chi)) = (
            u16_at(data, *pos),
            u16_at(data, *pos + 2),
            u16_at(data, *pos + 4),
            u16_at(data, *pos + 6),
        ) else {
            break;
        };
        *pos += 8;
        ranges.push(LabelRange {
            rlo: rlo as usize,
            rhi: rhi as usize + 1,
            clo: clo as usize,
            chi: chi as usize + 1,
        });
    }
    ranges
}

/// Scan one sheet substream starting at its BOF record
pub fn scan_sheet(stream: &[u8], offset: usize, biff_version: u16) -> SheetScan {
    let mut scan = SheetScan::default();
    let mut depth = 0usize;

    for record in Records::new(stream, offset) {
        let data = record.data;
        match record.code {
            code if is_bof_record(code) => depth += 1,
            RECORD_EOF => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    break;
                }
            }
            // Records of embedded chart substreams do not describe this sheet
            _ if depth > 1 => {}
            RECORD_NUMBER | RECORD_LABEL | RECORD_BOOLERR | RECORD_FORMULA | RECORD_RK
            | RECORD_LABELSST | RECORD_BLANK | RECORD_RSTRING => {
                if let (Some(row), Some(col), Some(xf)) =
                    (u16_at(data, 0), u16_at(data, 2), u16_at(data, 4))
                {
                    scan.xf.cells.insert((row as usize, col as usize), xf);
                }
            }
            RECORD_MULRK | RECORD_MULBLANK => {
                let stride = if record.code == RECORD_MULRK { 6 } else { 2 };
                let (Some(row), Some(first_col)) = (u16_at(data, 0), u16_at(data, 2)) else {
                    continue;
                };
                let count = data.len().saturating_sub(6) / stride;
                for i in 0..count {
                    if let Some(xf) = u16_at(data, 4 + i * stride) {
                        scan.xf
                            .cells
                            .insert((row as usize, first_col as usize + i), xf);
                    }
                }
            }
            RECORD_ROW => {
                let (Some(row), Some(flags), Some(ixfe)) =
                    (u16_at(data, 0), u16_at(data, 12), u16_at(data, 14))
                else {
                    continue;
                };
                if flags & 0x80 != 0 {
                    scan.xf.rows.insert(row as usize, ixfe & 0x0FFF);
                }
            }
            RECORD_COLINFO => {
                if let (Some(first), Some(last), Some(xf)) =
                    (u16_at(data, 0), u16_at(data, 2), u16_at(data, 6))
                {
                    scan.xf.cols.push((first as usize, last as usize, xf));
                }
            }
            RECORD_LABELRANGES if biff_version >= 80 => {
                let mut pos = 0;
                scan.row_label_ranges = parse_label_ranges(data, &mut pos);
                scan.col_label_ranges = parse_label_ranges(data, &mut pos);
            }
            _ => {}
        }
    }

    scan
}

fn hex_char_dump(
    out: &mut dyn Write,
    data: &[u8],
    base: usize,
    unnumbered: bool,
) -> io::Result<()> {
    for (i, chunk) in data.chunks(16).enumerate() {
        let hex: String = chunk.iter().map(|b| format!("{:02x} ", b)).collect();
        let chars: String = chunk
            .iter()
            .map(|&b| match b {
                0 => '~',
                b' '..=b'~' => b as char,
                _ => '?',
            })
            .collect();
        if unnumbered {
            writeln!(out, "     {:<48} {}", hex, chars)?;
        } else {
            writeln!(out, "{:5}:     {:<48} {}", base + i * 16, hex, chars)?;
        }
    }
    Ok(())
}

/// Print every record of the stream with a hex/char dump of its payload
pub fn dump_records(stream: &[u8], unnumbered: bool, out: &mut dyn Write) -> io::Result<()> {
    let prefix = |pos: usize| {
        if unnumbered {
            String::new()
        } else {
            format!("{:5}: ", pos)
        }
    };
    let mut pos = 0usize;
    let mut zero_run: Option<(usize, usize)> = None;

    while pos + 4 <= stream.len() {
        let code = u16::from_le_bytes([stream[pos], stream[pos + 1]]);
        let len = u16::from_le_bytes([stream[pos + 2], stream[pos + 3]]) as usize;
        if code == 0 && len == 0 {
            if stream[pos..].iter().all(|&b| b == 0) {
                let start = zero_run.map_or(pos, |(start, _)| start);
                zero_run = Some((start, stream.len() - start));
                pos = stream.len();
                break;
            }
            zero_run = Some(match zero_run {
                Some((start, n)) => (start, n + 4),
                None => (pos, 4),
            });
            pos += 4;
            continue;
        }
        if let Some((start, n)) = zero_run.take() {
            writeln!(out, "{}---- {} zero bytes skipped ----", prefix(start), n)?;
        }
        let name = record_name(code).unwrap_or("<UNKNOWN>");
        writeln!(out, "{}{:04x} {} len = {:04x} ({})", prefix(pos), code, name, len, len)?;
        pos += 4;
        let end = (pos + len).min(stream.len());
        hex_char_dump(out, &stream[pos..end], pos, unnumbered)?;
        pos += len;
    }

    if let Some((start, n)) = zero_run {
        writeln!(out, "{}---- {} zero bytes skipped ----", prefix(start), n)?;
    }
    if pos < stream.len() {
        writeln!(out, "{}---- Misc bytes at end ----", prefix(pos))?;
        hex_char_dump(out, &stream[pos..], pos, unnumbered)?;
    } else if pos > stream.len() {
        writeln!(out, "Last dumped record has length ({}) that is too large", pos - stream.len())?;
    }
    Ok(())
}

/// Tally records by name, sorted by name
pub fn count_records(stream: &[u8]) -> BTreeMap<String, usize> {
    let mut tally = BTreeMap::new();
    let mut pos = 0usize;
    while pos + 4 <= stream.len() {
        let code = u16::from_le_bytes([stream[pos], stream[pos + 1]]);
        let len = u16::from_le_bytes([stream[pos + 2], stream[pos + 3]]) as usize;
        let name = if code == 0 && len == 0 {
            if stream[pos..].iter().all(|&b| b == 0) {
                break;
            }
            "<Dummy (zero)>".to_string()
        } else {
            record_name(code).map_or_else(|| format!("Unknown_0x{:04X}", code), str::to_string)
        };
        *tally.entry(name).or_insert(0) += 1;
        pos += len + 4;
        if pos > stream.len() {
            break;
        }
    }
    tally
}

/// Print the record tally as `<count> <name>` lines
pub fn write_record_counts(stream: &[u8], out: &mut dyn Write) -> io::Result<()> {
    for (name, count) in count_records(stream) {
        writeln!(out, "{:8} {}", count, name)?;
    }
    Ok(())
}
