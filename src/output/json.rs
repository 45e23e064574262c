// JSON report: both ranking tables as arrays of row objects. The image is
// not included.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::search::{SearchResults, StudyMatch, TermMatch};

/// The serialized form of a search, also used to read reports back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonReport {
    pub studies: Vec<StudyMatch>,
    pub terms: Vec<TermMatch>,
}

impl From<&SearchResults> for JsonReport {
    fn from(results: &SearchResults) -> Self {
        Self {
            studies: results.studies.clone(),
            terms: results.terms.clone(),
        }
    }
}

pub fn results_to_json(results: &SearchResults) -> Result<String> {
    serde_json::to_string(&JsonReport::from(results)).context("Failed to serialize results")
}

/// Read a report written by `results_to_json`.
pub fn read_json_report(path: &Path) -> Result<JsonReport> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("Malformed JSON report {}", path.display()))
}
