//! Workbook data structures

use crate::cell::{Cell, CellType, CellValue};
use anyhow::{Result, bail};
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};
use std::time::Duration;

/// Container format of an opened file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FileFormat {
    /// Legacy BIFF inside an OLE2 compound file
    #[default]
    Xls,
    Xlsx,
    Xlsb,
    Ods,
}

impl fmt::Display for FileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FileFormat::Xls => "xls",
            FileFormat::Xlsx => "xlsx",
            FileFormat::Xlsb => "xlsb",
            FileFormat::Ods => "ods",
        };
        f.write_str(name)
    }
}

/// Display text for a BIFF version number
pub fn biff_text_from_num(version: u16) -> &'static str {
    match version {
        0 => "(not BIFF)",
        20 => "2.0",
        21 => "2.1",
        30 => "3",
        40 => "4S",
        45 => "4W",
        50 => "5",
        70 => "7",
        80 => "8",
        85 => "8X",
        _ => "(unknown)",
    }
}

/// Workbook-level metadata gathered at open time
#[derive(Debug, Clone)]
pub struct BookInfo {
    pub format: FileFormat,
    /// 0 for files that are not BIFF
    pub biff_version: u16,
    pub datemode: u8,
    pub codepage: Option<u16>,
    pub encoding: String,
    pub countries: (u16, u16),
    pub user_name: String,
    pub use_mmap: bool,
    pub formatting_info: bool,
    pub on_demand: bool,
    pub ragged_rows: bool,
    pub load_time_stage_1: Duration,
    pub load_time_stage_2: Duration,
}

impl Default for BookInfo {
    fn default() -> Self {
        Self {
            format: FileFormat::Xls,
            biff_version: 80,
            datemode: 0,
            codepage: Some(1200),
            encoding: "utf_16_le".to_string(),
            countries: (0, 0),
            user_name: String::new(),
            use_mmap: false,
            formatting_info: false,
            on_demand: false,
            ragged_rows: false,
            load_time_stage_1: Duration::ZERO,
            load_time_stage_2: Duration::ZERO,
        }
    }
}

impl BookInfo {
    /// Whether named-reference records are available for this file
    pub fn has_name_records(&self) -> bool {
        self.format != FileFormat::Xls || self.biff_version >= 50
    }
}

/// FONT record
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Font {
    pub font_index: usize,
    pub name: String,
    /// Height in twips (1/20 of a point)
    pub height: u16,
    pub bold: bool,
    pub italic: bool,
    pub underlined: bool,
    pub struck_out: bool,
    pub outline: bool,
    pub shadow: bool,
    pub colour_index: u16,
    pub weight: u16,
    pub escapement: u16,
    pub underline_type: u8,
    pub family: u8,
    pub character_set: u8,
}

impl Font {
    /// All attributes as (name, rendered value), sorted by name
    pub fn attributes(&self) -> Vec<(&'static str, String)> {
        vec![
            ("bold", (self.bold as u8).to_string()),
            ("character_set", self.character_set.to_string()),
            ("colour_index", self.colour_index.to_string()),
            ("escapement", self.escapement.to_string()),
            ("family", self.family.to_string()),
            ("font_index", self.font_index.to_string()),
            ("height", self.height.to_string()),
            ("italic", (self.italic as u8).to_string()),
            ("name", crate::cell::repr_str(&self.name)),
            ("outline", (self.outline as u8).to_string()),
            ("shadow", (self.shadow as u8).to_string()),
            ("struck_out", (self.struck_out as u8).to_string()),
            ("underline_type", self.underline_type.to_string()),
            ("underlined", (self.underlined as u8).to_string()),
            ("weight", self.weight.to_string()),
        ]
    }
}

/// FORMAT record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Format {
    pub format_key: u16,
    pub format_str: String,
}

/// Extended-format (XF) record, reduced to the indices the reports use
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Xf {
    pub xf_index: usize,
    pub font_index: u16,
    pub format_key: u16,
}

/// A workbook-level defined name
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NameObj {
    pub name_index: usize,
    pub name: String,
    pub option_flags: u16,
    pub hidden: bool,
    pub func: bool,
    pub vbasic: bool,
    pub macro_: bool,
    pub complex: bool,
    pub builtin: bool,
    /// -1 for workbook scope, otherwise the sheet index
    pub scope: i32,
    /// Defining formula as text
    pub result: String,
}

impl NameObj {
    pub fn attributes(&self) -> Vec<(&'static str, String)> {
        vec![
            ("builtin", (self.builtin as u8).to_string()),
            ("complex", (self.complex as u8).to_string()),
            ("func", (self.func as u8).to_string()),
            ("hidden", (self.hidden as u8).to_string()),
            ("macro", (self.macro_ as u8).to_string()),
            ("name", crate::cell::repr_str(&self.name)),
            ("name_index", self.name_index.to_string()),
            ("option_flags", self.option_flags.to_string()),
            ("result", crate::cell::repr_str(&self.result)),
            ("scope", self.scope.to_string()),
            ("vbasic", (self.vbasic as u8).to_string()),
        ]
    }
}

/// Rectangular label region, half-open on the high bounds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LabelRange {
    pub rlo: usize,
    pub rhi: usize,
    pub clo: usize,
    pub chi: usize,
}

/// Where a cell's XF index came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XfSource {
    Cell = 0,
    Row = 1,
    Column = 2,
    Default = 3,
}

/// Resolved XF index of one cell
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct XfIndex {
    pub index: i32,
    pub source: XfSource,
}

/// XF index used when neither the cell, its row nor its column carries one
pub const DEFAULT_XF_INDEX: i32 = 15;

/// Per-sheet XF assignments collected from the sheet's records
#[derive(Debug, Clone, Default, PartialEq)]
pub struct XfLayout {
    pub cells: HashMap<(usize, usize), u16>,
    pub rows: HashMap<usize, u16>,
    /// (first column, last column inclusive, xf)
    pub cols: Vec<(usize, usize, u16)>,
}

impl XfLayout {
    pub fn resolve(&self, row: usize, col: usize) -> XfIndex {
        if let Some(xf) = self.cells.get(&(row, col)) {
            return XfIndex {
                index: *xf as i32,
                source: XfSource::Cell,
            };
        }
        if let Some(xf) = self.rows.get(&row) {
            return XfIndex {
                index: *xf as i32,
                source: XfSource::Row,
            };
        }
        if let Some((_, _, xf)) = self.cols.iter().find(|(lo, hi, _)| (*lo..=*hi).contains(&col)) {
            return XfIndex {
                index: *xf as i32,
                source: XfSource::Column,
            };
        }
        XfIndex {
            index: DEFAULT_XF_INDEX,
            source: XfSource::Default,
        }
    }
}

/// Represents a worksheet
#[derive(Debug, Clone, PartialEq)]
pub struct Sheet {
    pub name: String,
    pub number: usize,
    rows: Vec<Vec<Cell>>,
    ncols: usize,
    pub col_label_ranges: Vec<LabelRange>,
    pub row_label_ranges: Vec<LabelRange>,
    xf: Option<XfLayout>,
}

impl Sheet {
    /// Build a sheet from row-major cells
    ///
    /// Trailing EMPTY cells are trimmed from every row. Unless `ragged` is set,
    /// rows are then padded back to the widest row so every row has `ncols`
    /// cells.
    pub fn from_rows(
        name: impl Into<String>,
        number: usize,
        mut rows: Vec<Vec<Cell>>,
        ragged: bool,
    ) -> Self {
        for row in rows.iter_mut() {
            while row.last().is_some_and(|c| c.ctype == CellType::Empty) {
                row.pop();
            }
        }
        let ncols = rows.iter().map(Vec::len).max().unwrap_or(0);
        if !ragged {
            for row in rows.iter_mut() {
                row.resize(ncols, Cell::empty());
            }
        }
        Self {
            name: name.into(),
            number,
            rows,
            ncols,
            col_label_ranges: Vec::new(),
            row_label_ranges: Vec::new(),
            xf: None,
        }
    }

    pub fn with_xf_layout(mut self, layout: XfLayout) -> Self {
        self.xf = Some(layout);
        self
    }

    pub fn with_label_ranges(
        mut self,
        col_labels: Vec<LabelRange>,
        row_labels: Vec<LabelRange>,
    ) -> Self {
        self.col_label_ranges = col_labels;
        self.row_label_ranges = row_labels;
        self
    }

    pub fn nrows(&self) -> usize {
        self.rows.len()
    }

    pub fn ncols(&self) -> usize {
        self.ncols
    }

    /// Number of cells stored for a row (its own length in ragged mode)
    pub fn row_len(&self, row: usize) -> usize {
        self.rows.get(row).map_or(0, Vec::len)
    }

    pub fn row(&self, row: usize) -> &[Cell] {
        self.rows.get(row).map_or(&[], Vec::as_slice)
    }

    pub fn row_types(&self, row: usize) -> Vec<CellType> {
        self.row(row).iter().map(|c| c.ctype).collect()
    }

    pub fn row_values(&self, row: usize) -> Vec<CellValue> {
        self.row(row).iter().map(|c| c.value.clone()).collect()
    }

    pub fn cell(&self, row: usize, col: usize) -> Option<&Cell> {
        self.rows.get(row).and_then(|r| r.get(col))
    }

    pub fn cell_type(&self, row: usize, col: usize) -> CellType {
        self.cell(row, col).map_or(CellType::Empty, |c| c.ctype)
    }

    pub fn cell_value(&self, row: usize, col: usize) -> CellValue {
        self.cell(row, col).map_or(CellValue::Empty, |c| c.value.clone())
    }

    /// XF index of a cell, or `None` when formatting info was not loaded
    pub fn cell_xf_index(&self, row: usize, col: usize) -> Option<XfIndex> {
        self.xf.as_ref().map(|layout| layout.resolve(row, col))
    }
}

/// Supplies sheets to a [`Workbook`] when they are first requested
pub trait SheetSource {
    fn load_sheet(&mut self, index: usize) -> Result<Sheet>;
}

impl SheetSource for Vec<Sheet> {
    fn load_sheet(&mut self, index: usize) -> Result<Sheet> {
        match self.get(index) {
            Some(sheet) => Ok(sheet.clone()),
            None => bail!("sheet index {} out of range", index),
        }
    }
}

/// Represents an opened workbook
pub struct Workbook {
    pub info: BookInfo,
    pub formats: Vec<Format>,
    pub fonts: Vec<Font>,
    pub xfs: Vec<Xf>,
    pub names: Vec<NameObj>,
    sheet_names: Vec<String>,
    sheets: Vec<Option<Rc<Sheet>>>,
    source: Box<dyn SheetSource>,
    loads: Vec<usize>,
    releases: Vec<usize>,
    tracked: Vec<Weak<Sheet>>,
}

impl Workbook {
    pub fn new(info: BookInfo, sheet_names: Vec<String>, source: Box<dyn SheetSource>) -> Self {
        let n = sheet_names.len();
        Self {
            info,
            formats: Vec::new(),
            fonts: Vec::new(),
            xfs: Vec::new(),
            names: Vec::new(),
            sheet_names,
            sheets: vec![None; n],
            source,
            loads: vec![0; n],
            releases: vec![0; n],
            tracked: Vec::new(),
        }
    }

    /// Workbook over already-built sheets
    pub fn from_sheets(info: BookInfo, sheets: Vec<Sheet>) -> Self {
        let names = sheets.iter().map(|s| s.name.clone()).collect();
        Self::new(info, names, Box::new(sheets))
    }

    pub fn nsheets(&self) -> usize {
        self.sheet_names.len()
    }

    pub fn sheet_names(&self) -> &[String] {
        &self.sheet_names
    }

    pub fn sheet_index(&self, name: &str) -> Option<usize> {
        self.sheet_names.iter().position(|n| n == name)
    }

    /// Get a sheet, loading it from the source if it is not resident
    pub fn sheet_by_index(&mut self, index: usize) -> Result<Rc<Sheet>> {
        if index >= self.sheet_names.len() {
            bail!("sheet index {} out of range (nsheets = {})", index, self.sheet_names.len());
        }
        if let Some(sheet) = &self.sheets[index] {
            return Ok(Rc::clone(sheet));
        }
        let sheet = Rc::new(self.source.load_sheet(index)?);
        tracing::debug!(sheet = index, name = %sheet.name, "sheet loaded");
        self.loads[index] += 1;
        self.tracked.push(Rc::downgrade(&sheet));
        self.sheets[index] = Some(Rc::clone(&sheet));
        Ok(sheet)
    }

    /// Load every sheet up front
    pub fn load_all(&mut self) -> Result<()> {
        for index in 0..self.nsheets() {
            self.sheet_by_index(index)?;
        }
        Ok(())
    }

    /// Drop the workbook's reference to a sheet; returns whether it was resident
    pub fn unload_sheet(&mut self, index: usize) -> bool {
        match self.sheets.get_mut(index).and_then(Option::take) {
            Some(_) => {
                self.releases[index] += 1;
                tracing::debug!(sheet = index, "sheet unloaded");
                true
            }
            None => false,
        }
    }

    pub fn is_sheet_loaded(&self, index: usize) -> bool {
        self.sheets.get(index).is_some_and(Option::is_some)
    }

    pub fn load_count(&self, index: usize) -> usize {
        self.loads.get(index).copied().unwrap_or(0)
    }

    pub fn release_count(&self, index: usize) -> usize {
        self.releases.get(index).copied().unwrap_or(0)
    }

    /// Weak handles to every sheet this workbook has loaded
    pub fn tracked_sheets(&self) -> Vec<Weak<Sheet>> {
        self.tracked.clone()
    }
}

impl fmt::Debug for Workbook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Workbook")
            .field("info", &self.info)
            .field("sheet_names", &self.sheet_names)
            .field("resident", &self.sheets.iter().filter(|s| s.is_some()).count())
            .finish()
    }
}
