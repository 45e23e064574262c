// The similarity engine.
//
// A query image is masked, optionally transformed, and projected into the
// atlas latent space:
//
//   query = atlas_inv_covar · (atlas_maps · transform(masked_image))
//
// Studies and terms are then scored by dot product with their loadings.
// Term scores are weighted by log(1 + document frequency) so that rare,
// noisy terms don't dominate the ranking.

use anyhow::{Context, Result};
use ndarray::Array1;
use tracing::{debug, info};

use super::ranking::rank;
use super::results::{SearchResults, StudyMatch, TermMatch};
use super::transform::Transform;
use crate::bundle::download::{fetch_bundle, HttpSource};
use crate::bundle::DataBundle;
use crate::config::Config;
use crate::image::ImageSource;
use crate::output::format_count;

/// Knobs for a single query.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchOptions {
    /// Number of studies to return (default 50)
    pub n_studies: usize,
    /// Number of terms to return (default 20)
    pub n_terms: usize,
    /// Transform applied to the masked image (default absolute value)
    pub transform: Transform,
    /// Divide scores by the best positive score (default true)
    pub rescale: bool,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            n_studies: 50,
            n_terms: 20,
            transform: Transform::AbsoluteValue,
            rescale: true,
        }
    }
}

/// Searches the NeuroQuery corpus for studies and terms with activation
/// maps similar to an image.
///
/// Holds the loaded data bundle; build it once and run as many queries as
/// needed.
pub struct ImageSearch {
    bundle: DataBundle,
}

impl ImageSearch {
    pub fn new(bundle: DataBundle) -> Self {
        Self { bundle }
    }

    /// Fetch the bundle into the configured cache (downloading only if it
    /// isn't there yet) and load it.
    pub async fn open(config: &Config) -> Result<Self> {
        let source = HttpSource::new(&config.bundle_url)?;
        let dir = fetch_bundle(config, &source).await?;
        let bundle = tokio::task::spawn_blocking(move || DataBundle::load(&dir))
            .await
            .context("spawn_blocking panicked")??;
        Ok(Self::new(bundle))
    }

    pub fn bundle(&self) -> &DataBundle {
        &self.bundle
    }

    /// Run a query. `query` is a path to a NIfTI file or an in-memory volume.
    pub fn search(
        &self,
        query: impl Into<ImageSource>,
        options: &SearchOptions,
    ) -> Result<SearchResults> {
        println!(
            "Searching in {} studies and {} terms for similar activation patterns",
            format_count(self.bundle.n_studies()),
            format_count(self.bundle.n_terms()),
        );

        let image = query.into().resolve()?;
        let masked = self
            .bundle
            .masker()
            .transform(&image)
            .context("Failed to mask the query image")?;
        let (studies, terms) = self.search_masked(&masked, options)?;

        Ok(SearchResults {
            studies,
            terms,
            image,
        })
    }

    /// Run a query on an already-masked image vector.
    pub fn search_masked(
        &self,
        masked: &Array1<f64>,
        options: &SearchOptions,
    ) -> Result<(Vec<StudyMatch>, Vec<TermMatch>)> {
        let query = self.project(masked, options.transform)?;

        let study_scores = self.study_similarities(&query);
        let studies: Vec<StudyMatch> = rank(&study_scores, options.n_studies, options.rescale)
            .into_iter()
            .map(|r| {
                let info = &self.bundle.studies_info()[r.index];
                StudyMatch {
                    pmid: info.pmid,
                    title: info.title.clone(),
                    pubmed_url: info.pubmed_url.clone(),
                    similarity: r.score,
                }
            })
            .collect();

        let term_scores = self.term_similarities(&query);
        let terms: Vec<TermMatch> = rank(&term_scores, options.n_terms, options.rescale)
            .into_iter()
            .map(|r| {
                let info = &self.bundle.document_frequencies()[r.index];
                TermMatch {
                    term: info.term.clone(),
                    document_frequency: info.document_frequency,
                    similarity: r.score,
                }
            })
            .collect();

        info!(
            transform = %options.transform,
            rescale = options.rescale,
            "Selected {} studies and {} terms",
            studies.len(),
            terms.len()
        );
        Ok((studies, terms))
    }

    /// Project a masked image into the atlas latent space.
    pub fn project(&self, masked: &Array1<f64>, transform: Transform) -> Result<Array1<f64>> {
        let transformed = transform.apply(masked);
        let components = self
            .bundle
            .atlas_maps()
            .dot(transformed.view())
            .context("Masked image does not match the atlas")?;
        let query = self.bundle.atlas_inv_covar().dot(&components);
        debug!(components = query.len(), "Projected query into atlas space");
        Ok(query)
    }

    /// Raw similarity of every study to a projected query, in bundle order.
    pub fn study_similarities(&self, query: &Array1<f64>) -> Vec<f64> {
        self.bundle.studies_loadings().dot(query).to_vec()
    }

    /// Frequency-weighted similarity of every term to a projected query,
    /// in bundle order.
    pub fn term_similarities(&self, query: &Array1<f64>) -> Vec<f64> {
        self.bundle
            .terms_loadings()
            .dot(query)
            .iter()
            .zip(self.bundle.document_frequencies())
            .map(|(&s, info)| s * (info.document_frequency as f64).ln_1p())
            .collect()
    }
}
