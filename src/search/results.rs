// Search result rows.
//
// One struct per table, each with its own serde derive, so the JSON and
// CSV writers serialize exactly these columns in this order.

use serde::{Deserialize, Serialize};

use crate::image::BrainVolume;

/// A study whose activation pattern resembles the query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudyMatch {
    pub pmid: u64,
    pub title: String,
    pub pubmed_url: String,
    pub similarity: f64,
}

/// A term whose activation pattern resembles the query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TermMatch {
    pub term: String,
    pub document_frequency: u64,
    pub similarity: f64,
}

/// Everything one query produces.
#[derive(Debug, Clone)]
pub struct SearchResults {
    /// Most similar studies, best first.
    pub studies: Vec<StudyMatch>,
    /// Most similar terms, best first.
    pub terms: Vec<TermMatch>,
    /// The query image as it was resolved (loaded from disk if a path was given).
    pub image: BrainVolume,
}
