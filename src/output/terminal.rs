// Colored terminal summary of a search.
//
// The full tables go to the HTML/JSON/CSV output; this is the quick look
// printed after every query.

use colored::Colorize;

use crate::search::{SearchResults, StudyMatch, TermMatch};

/// How many rows of each table to print.
const SUMMARY_ROWS: usize = 10;

/// Display the best terms and studies in the terminal.
pub fn display_summary(results: &SearchResults) {
    display_terms(&results.terms);
    display_studies(&results.studies);
}

pub fn display_terms(terms: &[TermMatch]) {
    if terms.is_empty() {
        return;
    }
    println!(
        "\n{}",
        format!("=== Most similar terms (top {} of {}) ===", SUMMARY_ROWS.min(terms.len()), terms.len())
            .bold()
    );
    println!(
        "  {:>4}  {:<40} {:>10}",
        "Rank".dimmed(),
        "Term".dimmed(),
        "Similarity".dimmed()
    );
    println!("  {}", "-".repeat(58).dimmed());
    for (i, term) in terms.iter().take(SUMMARY_ROWS).enumerate() {
        println!(
            "  {:>4}. {:<40} {}",
            i + 1,
            super::truncate_chars(&term.term, 40),
            colorize_similarity(term.similarity)
        );
    }
}

pub fn display_studies(studies: &[StudyMatch]) {
    if studies.is_empty() {
        return;
    }
    println!(
        "\n{}",
        format!(
            "=== Most similar studies (top {} of {}) ===",
            SUMMARY_ROWS.min(studies.len()),
            studies.len()
        )
        .bold()
    );
    for (i, study) in studies.iter().take(SUMMARY_ROWS).enumerate() {
        println!(
            "  {:>4}. {}  {}",
            i + 1,
            colorize_similarity(study.similarity),
            super::truncate_chars(&study.title, 90)
        );
        println!("        {}", study.pubmed_url.dimmed());
    }
    println!();
}

/// Colorize a similarity value by strength.
fn colorize_similarity(similarity: f64) -> colored::ColoredString {
    let text = format!("{similarity:>10.2}");
    match similarity {
        s if s >= 0.75 => text.green().bold(),
        s if s >= 0.5 => text.green(),
        s if s > 0.0 => text.yellow(),
        _ => text.dimmed(),
    }
}
