// CSV / TSV output.
//
// A delimited file holds one table, so the studies go to the requested path
// and the terms to a sibling file named `<stem>_terms.<ext>`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;

use crate::search::SearchResults;

/// Where the terms table goes for a given studies output path.
pub fn terms_path(path: &Path) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "results".to_string());
    let name = match path.extension() {
        Some(ext) => format!("{}_terms.{}", stem, ext.to_string_lossy()),
        None => format!("{}_terms", stem),
    };
    path.with_file_name(name)
}

/// Write both tables with the given field delimiter. Returns the paths
/// written (studies first).
pub fn write_tables(results: &SearchResults, path: &Path, delimiter: u8) -> Result<[PathBuf; 2]> {
    let terms = terms_path(path);
    write_rows(&results.studies, path, delimiter)?;
    write_rows(&results.terms, &terms, delimiter)?;
    Ok([path.to_path_buf(), terms])
}

fn write_rows<T: Serialize>(rows: &[T], path: &Path, delimiter: u8) -> Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    for row in rows {
        writer
            .serialize(row)
            .with_context(|| format!("Failed to write a row to {}", path.display()))?;
    }
    writer
        .flush()
        .with_context(|| format!("Failed to flush {}", path.display()))?;
    Ok(())
}
