//! Defined-name listing (`names`) and full dump (`name_dump`)

use crate::cell::repr_str;
use crate::config::Configuration;
use crate::reader::Workbook;
use crate::report::header::write_header;
use anyhow::Result;
use std::io::Write;

pub fn write_names(
    book: &mut Workbook,
    config: &Configuration,
    dump: bool,
    out: &mut dyn Write,
) -> Result<()> {
    write_header(book, config, out)?;
    if !book.info.has_name_records() {
        writeln!(out, "Names not extracted in this BIFF version")?;
        return Ok(());
    }
    writeln!(out, "Name list: {} entries", book.names.len())?;
    for name in &book.names {
        if dump {
            writeln!(out, "\n=== Dump of name_obj_list[{}] ===", name.name_index)?;
            for (attr, value) in name.attributes() {
                writeln!(out, "{}: {}", attr, value)?;
            }
        } else {
            writeln!(
                out,
                "[{}]\tName:{} macro:{} scope:{}\n\tresult:{}\n",
                name.name_index,
                repr_str(&name.name),
                name.macro_ as u8,
                name.scope,
                repr_str(&name.result)
            )?;
        }
    }
    Ok(())
}
