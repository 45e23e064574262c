// Output formatting: report files, the browser view, and terminal display.

pub mod delimited;
pub mod html;
pub mod json;
pub mod terminal;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::info;

use crate::search::SearchResults;

/// Report format, chosen once from the output file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Html,
    Json,
    Csv,
    Tsv,
}

impl OutputFormat {
    /// `.html`/`.htm` → Html, `.json` → Json, `.csv` → Csv, `.tsv` → Tsv.
    /// Anything else, including no extension, falls back to Html.
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase());
        match ext.as_deref() {
            Some("json") => OutputFormat::Json,
            Some("csv") => OutputFormat::Csv,
            Some("tsv") => OutputFormat::Tsv,
            _ => OutputFormat::Html,
        }
    }
}

/// Write the results to `path` in the format its extension selects.
/// Returns every file written.
pub fn save(results: &SearchResults, path: &Path, title: &str) -> Result<Vec<PathBuf>> {
    let format = OutputFormat::from_path(path);
    info!(?format, "Saving results to {}", path.display());
    match format {
        OutputFormat::Html => {
            write_text(path, &html::results_to_html(results, title)?)?;
            Ok(vec![path.to_path_buf()])
        }
        OutputFormat::Json => {
            write_text(path, &json::results_to_json(results)?)?;
            Ok(vec![path.to_path_buf()])
        }
        OutputFormat::Csv => Ok(delimited::write_tables(results, path, b',')?.to_vec()),
        OutputFormat::Tsv => Ok(delimited::write_tables(results, path, b'\t')?.to_vec()),
    }
}

/// Write the HTML report to the temp directory and open it in the default
/// browser. Returns the page's path.
pub fn open_in_browser(results: &SearchResults, title: &str) -> Result<PathBuf> {
    let path = std::env::temp_dir().join(format!(
        "neuroquery_image_search_{}.html",
        std::process::id()
    ));
    write_text(&path, &html::results_to_html(results, title)?)?;
    open::that(&path).with_context(|| format!("Failed to open {} in a browser", path.display()))?;
    Ok(path)
}

fn write_text(path: &Path, text: &str) -> Result<()> {
    std::fs::write(path, text).with_context(|| format!("Failed to write {}", path.display()))
}

/// Format a count with thousands separators: 14371 → "14,371".
pub fn format_count(n: usize) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Truncate a string to at most `max_chars` characters, appending "..." if truncated.
///
/// Unlike byte slicing (`&text[..120]`), this respects UTF-8 character boundaries
/// and will never panic on multi-byte characters.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    let char_count = text.chars().count();
    if char_count <= max_chars {
        text.to_string()
    } else {
        let truncated: String = text.chars().take(max_chars).collect();
        format!("{truncated}...")
    }
}
