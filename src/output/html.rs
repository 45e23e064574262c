// HTML report: an interactive slice viewer of the query image plus the two
// ranking tables.
//
// The page is a bundled template with `${name}` placeholders. The image is
// embedded as base64 little-endian f32 in a JSON block and drawn client-side;
// only voxels above the 95th percentile of |value| are coloured.

use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::Serialize;

use crate::image::BrainVolume;
use crate::search::{SearchResults, StudyMatch, TermMatch};

const TEMPLATE: &str = include_str!("search_results_template.html");

/// Term queries on neuroquery.org.
pub const NEUROQUERY_QUERY_URL: &str = "https://neuroquery.org/query?text=";

/// Fraction of |value| below which voxels are left blank in the viewer.
const DISPLAY_PERCENTILE: f64 = 0.95;

/// Characters escaped in a term query; spaces become `+` separately.
const QUERY_ESCAPE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b' ')
    .remove(b'-')
    .remove(b'_')
    .remove(b'.');

/// Render the full results page.
pub fn results_to_html(results: &SearchResults, title: &str) -> Result<String> {
    let viewer_data = viewer_payload(&results.image)?;
    Ok(substitute(
        TEMPLATE,
        &[
            ("title", escape(title)),
            ("studies_table", studies_to_html_table(&results.studies)),
            ("terms_table", terms_to_html_table(&results.terms)),
            ("viewer_data", viewer_data),
        ],
    ))
}

/// Fill `${name}` placeholders in a single pass. Inserted text is never
/// rescanned, and unknown placeholders are left as they are.
fn substitute(template: &str, values: &[(&str, String)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let value = after.find('}').and_then(|end| {
            let name = &after[..end];
            values
                .iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| (value, end))
        });
        match value {
            Some((value, end)) => {
                out.push_str(value);
                rest = &after[end + 1..];
            }
            None => {
                out.push_str("${");
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

/// Study ranking as an HTML table; titles link to PubMed.
pub fn studies_to_html_table(studies: &[StudyMatch]) -> String {
    let vmax = column_max(studies.iter().map(|s| s.similarity));
    let mut html = String::from(
        "<table class=\"studies-table\">\n<thead><tr><th>Title</th><th>Similarity</th></tr></thead>\n<tbody>\n",
    );
    for study in studies {
        html.push_str(&format!(
            "<tr><td><a href=\"{}\" target=\"_blank\">{}</a></td>{}</tr>\n",
            escape(&study.pubmed_url),
            escape(&study.title),
            similarity_cell(study.similarity, vmax, 98.0),
        ));
    }
    html.push_str("</tbody>\n</table>");
    html
}

/// Term ranking as an HTML table; terms link to a NeuroQuery search.
pub fn terms_to_html_table(terms: &[TermMatch]) -> String {
    let vmax = column_max(terms.iter().map(|t| t.similarity));
    let mut html = String::from(
        "<table class=\"terms-table\">\n<thead><tr><th>Term</th><th>Similarity</th></tr></thead>\n<tbody>\n",
    );
    for term in terms {
        html.push_str(&format!(
            "<tr><td><a href=\"{}\" target=\"_blank\">{}</a></td>{}</tr>\n",
            escape(&term_url(&term.term)),
            escape(&term.term),
            similarity_cell(term.similarity, vmax, 95.0),
        ));
    }
    html.push_str("</tbody>\n</table>");
    html
}

/// Link to the NeuroQuery page for a term, spaces encoded as `+`.
pub fn term_url(term: &str) -> String {
    let encoded = utf8_percent_encode(term, QUERY_ESCAPE).to_string();
    format!("{}{}", NEUROQUERY_QUERY_URL, encoded.replace(' ', "+"))
}

/// Minimal HTML escaping for text and attribute values.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

/// A table cell with a bar proportional to the score, anchored at 0.
fn similarity_cell(similarity: f64, vmax: f64, width: f64) -> String {
    let fraction = if vmax > 0.0 {
        (similarity / vmax).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let pct = width * fraction;
    format!(
        "<td class=\"similarity\" style=\"background: linear-gradient(90deg, lightgreen {pct:.1}%, transparent {pct:.1}%);\">{similarity:.2}</td>"
    )
}

fn column_max(values: impl Iterator<Item = f64>) -> f64 {
    values.fold(0.0, f64::max)
}

#[derive(Serialize)]
struct ViewerData {
    shape: [usize; 3],
    /// Starting slice indices: the voxel with the largest |value|.
    cursor: [usize; 3],
    threshold: f64,
    vmax: f64,
    /// First volume, row-major (k fastest), f32 little-endian, base64.
    data: String,
}

fn viewer_payload(image: &BrainVolume) -> Result<String> {
    let volume = image.first_volume()?;
    let shape = image.spatial_shape();

    let mut bytes = Vec::with_capacity(volume.len() * 4);
    let mut cursor = [0usize; 3];
    let mut vmax = 0.0f64;
    let mut magnitudes = Vec::with_capacity(volume.len());
    for ((i, j, k), &v) in volume.indexed_iter() {
        bytes.extend_from_slice(&(v as f32).to_le_bytes());
        let a = v.abs();
        if a.is_finite() {
            if a > vmax {
                vmax = a;
                cursor = [i, j, k];
            }
            magnitudes.push(a);
        }
    }

    let data = ViewerData {
        shape,
        cursor,
        threshold: percentile(&mut magnitudes, DISPLAY_PERCENTILE),
        vmax,
        data: STANDARD.encode(&bytes),
    };
    let json = serde_json::to_string(&data).context("Failed to serialize viewer data")?;
    Ok(json.replace("</", "<\\/"))
}

/// Nearest-rank percentile; 0 for an empty slice.
fn percentile(values: &mut [f64], q: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.sort_by(f64::total_cmp);
    let rank = ((values.len() - 1) as f64 * q).round() as usize;
    values[rank]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_special_characters() {
        assert_eq!(
            escape(r#"<b>"Fish" & 'chips'</b>"#),
            "&lt;b&gt;&quot;Fish&quot; &amp; &#x27;chips&#x27;&lt;/b&gt;"
        );
    }

    #[test]
    fn test_substitute_does_not_rescan_inserted_text() {
        let filled = substitute(
            "<h1>${title}</h1>${body}${missing}",
            &[
                ("title", "${body}".to_string()),
                ("body", "<p>ok</p>".to_string()),
            ],
        );
        assert_eq!(filled, "<h1>${body}</h1><p>ok</p>${missing}");
    }

    #[test]
    fn test_placeholders_in_titles_stay_literal() {
        use crate::image::IDENTITY_AFFINE;
        use ndarray::Array3;

        let results = SearchResults {
            studies: vec![StudyMatch {
                pmid: 1,
                title: "${terms_table}".to_string(),
                pubmed_url: "https://www.ncbi.nlm.nih.gov/pubmed/1".to_string(),
                similarity: 1.0,
            }],
            terms: vec![],
            image: BrainVolume::from_array3(Array3::zeros((2, 2, 2)), IDENTITY_AFFINE),
        };
        let page = results_to_html(&results, "${viewer_data}").unwrap();
        assert!(page.contains("<title>${viewer_data}</title>"));
        assert!(page.contains(">${terms_table}<"));
        assert_eq!(page.matches("class=\"terms-table\"").count(), 1);
    }

    #[test]
    fn test_term_url_uses_plus_for_spaces() {
        assert_eq!(
            term_url("primary motor cortex"),
            "https://neuroquery.org/query?text=primary+motor+cortex"
        );
        assert_eq!(
            term_url("a&b"),
            "https://neuroquery.org/query?text=a%26b"
        );
    }

    #[test]
    fn test_similarity_cell_bar_clipped_at_zero() {
        let cell = similarity_cell(-0.5, 1.0, 98.0);
        assert!(cell.contains("lightgreen 0.0%"));
        assert!(cell.contains(">-0.50<"));
        let cell = similarity_cell(0.5, 1.0, 98.0);
        assert!(cell.contains("lightgreen 49.0%"));
    }

    #[test]
    fn test_percentile_nearest_rank() {
        let mut values: Vec<f64> = (0..=100).map(f64::from).collect();
        assert_eq!(percentile(&mut values, 0.95), 95.0);
        assert_eq!(percentile(&mut [], 0.95), 0.0);
    }

    #[test]
    fn test_tables_have_classes_and_links() {
        let studies = vec![StudyMatch {
            pmid: 123,
            title: "Motor <cortex>".to_string(),
            pubmed_url: "https://www.ncbi.nlm.nih.gov/pubmed/123".to_string(),
            similarity: 1.0,
        }];
        let html = studies_to_html_table(&studies);
        assert!(html.contains("class=\"studies-table\""));
        assert!(html.contains("href=\"https://www.ncbi.nlm.nih.gov/pubmed/123\""));
        assert!(html.contains("Motor &lt;cortex&gt;"));
        assert!(html.contains(">1.00<"));

        let terms = vec![TermMatch {
            term: "hand movement".to_string(),
            document_frequency: 10,
            similarity: 0.25,
        }];
        let html = terms_to_html_table(&terms);
        assert!(html.contains("class=\"terms-table\""));
        assert!(html.contains("query?text=hand+movement"));
    }
}
