// Unit tests for output format selection and text helpers.

use std::path::Path;

use neuroquery_image_search::output::{format_count, truncate_chars, OutputFormat};

// ============================================================
// OutputFormat::from_path
// ============================================================

#[test]
fn format_follows_extension() {
    assert_eq!(OutputFormat::from_path(Path::new("r.html")), OutputFormat::Html);
    assert_eq!(OutputFormat::from_path(Path::new("r.json")), OutputFormat::Json);
    assert_eq!(OutputFormat::from_path(Path::new("r.csv")), OutputFormat::Csv);
    assert_eq!(OutputFormat::from_path(Path::new("out/r.tsv")), OutputFormat::Tsv);
}

#[test]
fn format_extension_is_case_insensitive() {
    assert_eq!(OutputFormat::from_path(Path::new("R.JSON")), OutputFormat::Json);
    assert_eq!(OutputFormat::from_path(Path::new("R.Csv")), OutputFormat::Csv);
}

#[test]
fn unknown_or_missing_extension_is_html() {
    assert_eq!(OutputFormat::from_path(Path::new("results")), OutputFormat::Html);
    assert_eq!(OutputFormat::from_path(Path::new("results.txt")), OutputFormat::Html);
    assert_eq!(OutputFormat::from_path(Path::new("results.htm")), OutputFormat::Html);
}

// ============================================================
// format_count
// ============================================================

#[test]
fn format_count_inserts_separators() {
    assert_eq!(format_count(0), "0");
    assert_eq!(format_count(999), "999");
    assert_eq!(format_count(1000), "1,000");
    assert_eq!(format_count(14371), "14,371");
    assert_eq!(format_count(1_234_567), "1,234,567");
}

// ============================================================
// truncate_chars
// ============================================================

#[test]
fn truncate_short_text_unchanged() {
    assert_eq!(truncate_chars("motor cortex", 20), "motor cortex");
}

#[test]
fn truncate_long_text_adds_ellipsis() {
    assert_eq!(truncate_chars("hippocampus", 5), "hippo...");
}

#[test]
fn truncate_respects_multibyte_characters() {
    let title = "Über die Großhirnrinde";
    assert_eq!(truncate_chars(title, 3), "Übe...");
}
