//! Scoped sheet acquisition
//!
//! A [`SheetVisit`] holds one sheet for the duration of a report step. When
//! the workbook was opened on demand, dropping the visit unloads the sheet,
//! whichever way the step ends.

use crate::reader::{Sheet, Workbook};
use anyhow::Result;
use std::ops::Deref;
use std::rc::Rc;

pub struct SheetVisit<'a> {
    book: &'a mut Workbook,
    index: usize,
    sheet: Rc<Sheet>,
}

impl<'a> SheetVisit<'a> {
    /// Load (or reuse) sheet `index` for the lifetime of the visit
    pub fn acquire(book: &'a mut Workbook, index: usize) -> Result<Self> {
        let sheet = book.sheet_by_index(index)?;
        Ok(Self { book, index, sheet })
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// The workbook the sheet belongs to
    pub fn book(&self) -> &Workbook {
        &*self.book
    }
}

impl Deref for SheetVisit<'_> {
    type Target = Sheet;

    fn deref(&self) -> &Sheet {
        &self.sheet
    }
}

impl Drop for SheetVisit<'_> {
    fn drop(&mut self) {
        if self.book.info.on_demand {
            self.book.unload_sheet(self.index);
        }
    }
}
