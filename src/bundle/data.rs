// Loading the extracted bundle files into memory.
//
// Dense matrices are NumPy .npy files (float64 or float32; float32 is
// widened), the atlas is a SciPy sparse .npz archive, the mask is NIfTI,
// and the metadata tables are CSV. Shapes are cross-checked on
// construction so a query can't fail halfway through a matrix product.

use std::fs::File;
use std::path::Path;

use anyhow::{Context, Result};
use ndarray::Array2;
use ndarray_npy::ReadNpyExt;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{
    ATLAS_INV_COVAR_FILE, ATLAS_MAPS_FILE, BUNDLE_FILES, DOCUMENT_FREQUENCIES_FILE, MASK_FILE,
    STUDIES_INFO_FILE, STUDIES_LOADINGS_FILE, TERMS_LOADINGS_FILE,
};
use crate::error::SearchError;
use crate::image::Masker;
use crate::search::sparse::SparseMatrix;

/// One row of `articles-info.csv`. Extra columns in the file are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudyInfo {
    pub pmid: u64,
    pub title: String,
    pub pubmed_url: String,
}

/// One row of `document_frequencies.csv`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TermInfo {
    pub term: String,
    pub document_frequency: u64,
}

/// The precomputed arrays a search runs against. Read-only once built.
#[derive(Debug, Clone)]
pub struct DataBundle {
    masker: Masker,
    atlas_maps: SparseMatrix,
    atlas_inv_covar: Array2<f64>,
    studies_loadings: Array2<f64>,
    terms_loadings: Array2<f64>,
    studies_info: Vec<StudyInfo>,
    document_frequencies: Vec<TermInfo>,
}

impl DataBundle {
    /// Assemble a bundle, checking that all shapes agree:
    ///
    /// - atlas maps are components × in-mask voxels
    /// - the inverse covariance is components × components
    /// - loadings have one column per component and one row per metadata row
    pub fn new(
        masker: Masker,
        atlas_maps: SparseMatrix,
        atlas_inv_covar: Array2<f64>,
        studies_loadings: Array2<f64>,
        terms_loadings: Array2<f64>,
        studies_info: Vec<StudyInfo>,
        document_frequencies: Vec<TermInfo>,
    ) -> Result<Self> {
        let n_components = atlas_maps.nrows();
        let checks = [
            ("atlas columns vs in-mask voxels", masker.n_voxels(), atlas_maps.ncols()),
            ("inverse covariance rows", n_components, atlas_inv_covar.nrows()),
            ("inverse covariance columns", n_components, atlas_inv_covar.ncols()),
            ("study loadings columns", n_components, studies_loadings.ncols()),
            ("term loadings columns", n_components, terms_loadings.ncols()),
            ("study loadings rows vs study metadata", studies_info.len(), studies_loadings.nrows()),
            (
                "term loadings rows vs document frequencies",
                document_frequencies.len(),
                terms_loadings.nrows(),
            ),
        ];
        for (what, expected, found) in checks {
            if expected != found {
                return Err(SearchError::DimensionMismatch {
                    what,
                    expected,
                    found,
                }
                .into());
            }
        }

        Ok(Self {
            masker,
            atlas_maps,
            atlas_inv_covar,
            studies_loadings,
            terms_loadings,
            studies_info,
            document_frequencies,
        })
    }

    /// Load every bundle file from an extracted bundle directory.
    pub fn load(dir: &Path) -> Result<Self> {
        for name in BUNDLE_FILES {
            let path = dir.join(name);
            if !path.exists() {
                return Err(SearchError::MissingBundleFile(path).into());
            }
        }

        let masker = Masker::load(&dir.join(MASK_FILE))?;
        let atlas_maps = SparseMatrix::load_npz(&dir.join(ATLAS_MAPS_FILE))?;
        let atlas_inv_covar = read_matrix(&dir.join(ATLAS_INV_COVAR_FILE))?;
        let studies_loadings = read_matrix(&dir.join(STUDIES_LOADINGS_FILE))?;
        let terms_loadings = read_matrix(&dir.join(TERMS_LOADINGS_FILE))?;
        let studies_info = read_table(&dir.join(STUDIES_INFO_FILE))?;
        let document_frequencies = read_table(&dir.join(DOCUMENT_FREQUENCIES_FILE))?;

        let bundle = Self::new(
            masker,
            atlas_maps,
            atlas_inv_covar,
            studies_loadings,
            terms_loadings,
            studies_info,
            document_frequencies,
        )
        .with_context(|| format!("Inconsistent data bundle in {}", dir.display()))?;

        info!(
            studies = bundle.n_studies(),
            terms = bundle.n_terms(),
            components = bundle.n_components(),
            voxels = bundle.masker.n_voxels(),
            "Loaded data bundle from {}",
            dir.display()
        );
        Ok(bundle)
    }

    pub fn masker(&self) -> &Masker {
        &self.masker
    }

    pub fn atlas_maps(&self) -> &SparseMatrix {
        &self.atlas_maps
    }

    pub fn atlas_inv_covar(&self) -> &Array2<f64> {
        &self.atlas_inv_covar
    }

    pub fn studies_loadings(&self) -> &Array2<f64> {
        &self.studies_loadings
    }

    pub fn terms_loadings(&self) -> &Array2<f64> {
        &self.terms_loadings
    }

    pub fn studies_info(&self) -> &[StudyInfo] {
        &self.studies_info
    }

    pub fn document_frequencies(&self) -> &[TermInfo] {
        &self.document_frequencies
    }

    pub fn n_studies(&self) -> usize {
        self.studies_info.len()
    }

    pub fn n_terms(&self) -> usize {
        self.document_frequencies.len()
    }

    pub fn n_components(&self) -> usize {
        self.atlas_maps.nrows()
    }
}

/// Read a 2D .npy array stored as float64 or float32.
pub fn read_matrix(path: &Path) -> Result<Array2<f64>> {
    let open = || File::open(path).with_context(|| format!("Failed to open {}", path.display()));

    if let Ok(matrix) = Array2::<f64>::read_npy(open()?) {
        return Ok(matrix);
    }
    let matrix = Array2::<f32>::read_npy(open()?).with_context(|| {
        format!(
            "{} is not a 2D float64 or float32 array",
            path.display()
        )
    })?;
    Ok(matrix.mapv(f64::from))
}

/// Deserialize every row of a CSV file with a header line.
pub fn read_table<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    reader
        .deserialize()
        .enumerate()
        .map(|(i, row)| row.with_context(|| format!("{}: bad row {}", path.display(), i + 1)))
        .collect()
}
