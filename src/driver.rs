//! Compilation driver
//!
//! Determines the unit set from the input path, opens the output sink,
//! emits the bootstrap exactly once, and feeds every unit's commands to a
//! single [`CodeWriter`] so label counters stay unique across the whole
//! output.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::code_writer::CodeWriter;
use crate::error::{Result, TranslateError};
use crate::parser::Parser;

/// Translates a `.vm` file or a directory of `.vm` files
///
/// Returns the path of the assembly file it wrote. A path ending in `.vm`
/// translates that single file to a sibling `.asm`; any other path is
/// treated as a directory and every `.vm` file directly inside it is
/// translated into `<dir>/<basename>.asm`.
pub fn translate_path(input: &Path) -> Result<PathBuf> {
    let (output, units) = plan(input)?;

    let file = File::create(&output)?;
    let mut writer = CodeWriter::new(BufWriter::with_capacity(8192, file));

    writer.write_bootstrap()?;
    for unit in &units {
        translate_unit(&mut writer, unit).map_err(|e| TranslateError::Unit {
            path: unit.clone(),
            source: Box::new(e),
        })?;
    }
    writer.finish()?;

    Ok(output)
}

/// Streams one unit's commands into the writer
fn translate_unit<W: Write>(writer: &mut CodeWriter<W>, unit: &Path) -> Result<()> {
    let source = fs::read_to_string(unit)?;
    let name = unit
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("Unknown");
    writer.set_unit(name)?;

    for command in Parser::new(&source) {
        writer.write_command(&command?)?;
    }
    Ok(())
}

/// Resolves the output path and the ordered unit set
///
/// Directory entries are sorted by name: `read_dir` order is
/// platform-arbitrary and the output must be identical on every run.
fn plan(input: &Path) -> Result<(PathBuf, Vec<PathBuf>)> {
    if input.extension().and_then(|e| e.to_str()) == Some("vm") {
        return Ok((input.with_extension("asm"), vec![input.to_path_buf()]));
    }

    let stem = input
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("out");
    let output = input.join(format!("{stem}.asm"));

    let mut units = Vec::new();
    for entry in fs::read_dir(input)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_file() && entry.file_name().to_string_lossy().contains(".vm") {
            units.push(path);
        }
    }
    units.sort();

    Ok((output, units))
}
