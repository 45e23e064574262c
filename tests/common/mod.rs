// Shared fixtures: a small synthetic data bundle.
//
// 3x3x3 grid with the four corners of the first and last slices left out of
// the mask (23 voxels), an 8-component atlas, 12 studies and 6 terms. All
// values come from a seeded RNG so every test sees the same numbers, and
// every non-zero query has at least one positive study and term score.

#![allow(dead_code)]

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::Result;
use async_trait::async_trait;
use flate2::write::GzEncoder;
use flate2::Compression;
use ndarray::{Array1, Array2, Array3};
use ndarray_npy::{NpzWriter, WriteNpyExt};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use neuroquery_image_search::bundle::download::BundleSource;
use neuroquery_image_search::bundle::{self, DataBundle, StudyInfo, TermInfo};
use neuroquery_image_search::image::{BrainVolume, Masker};
use neuroquery_image_search::search::sparse::SparseMatrix;

pub const GRID: (usize, usize, usize) = (3, 3, 3);
pub const N_VOXELS: usize = 23;
pub const N_COMPONENTS: usize = 8;
pub const N_STUDIES: usize = 12;
pub const N_TERMS: usize = 6;

const OUT_OF_MASK: [(usize, usize, usize); 4] = [(0, 0, 0), (0, 0, 2), (2, 2, 0), (2, 2, 2)];

pub struct SyntheticData {
    pub mask: Array3<f32>,
    pub atlas: Array2<f64>,
    pub inv_covar: Array2<f64>,
    pub studies_loadings: Array2<f64>,
    pub terms_loadings: Array2<f32>,
    pub studies_info: Vec<StudyInfo>,
    pub terms: Vec<TermInfo>,
}

pub fn synthetic_data() -> SyntheticData {
    let mut rng = StdRng::seed_from_u64(7);

    let mask = Array3::from_shape_fn(GRID, |idx| {
        if OUT_OF_MASK.contains(&idx) {
            0.0
        } else {
            1.0
        }
    });

    // Sparse, non-negative atlas maps like DiFuMo's
    let atlas = Array2::from_shape_fn((N_COMPONENTS, N_VOXELS), |_| {
        let v: f64 = rng.random_range(0.0..1.0);
        if v < 0.5 {
            0.0
        } else {
            v
        }
    });

    // A A^T + I is symmetric positive definite
    let a = Array2::from_shape_fn((N_COMPONENTS, N_COMPONENTS), |_| {
        rng.random_range(-0.5..0.5)
    });
    let inv_covar = a.dot(&a.t()) + Array2::<f64>::eye(N_COMPONENTS);

    // The last row of each loadings matrix is the negated first row, so any
    // non-zero query scores strictly positive against one of the two.
    let mut studies_loadings =
        Array2::from_shape_fn((N_STUDIES, N_COMPONENTS), |_| rng.random_range(-1.0..1.0));
    let first = studies_loadings.row(0).mapv(|v| -v);
    studies_loadings.row_mut(N_STUDIES - 1).assign(&first);

    let mut terms_loadings = Array2::from_shape_fn((N_TERMS, N_COMPONENTS), |_| {
        rng.random_range(-1.0f32..1.0f32)
    });
    let first = terms_loadings.row(0).mapv(|v| -v);
    terms_loadings.row_mut(N_TERMS - 1).assign(&first);

    let studies_info = (0..N_STUDIES)
        .map(|i| {
            let pmid = 10_000 + i as u64;
            StudyInfo {
                pmid,
                title: format!("Synthetic study number {i}"),
                pubmed_url: format!("https://www.ncbi.nlm.nih.gov/pubmed/{pmid}"),
            }
        })
        .collect();

    let terms = ["motor", "hand movement", "visual", "language", "memory", "reward"]
        .iter()
        .enumerate()
        .map(|(i, t)| TermInfo {
            term: t.to_string(),
            document_frequency: (i as u64 + 1) * 37,
        })
        .collect();

    SyntheticData {
        mask,
        atlas,
        inv_covar,
        studies_loadings,
        terms_loadings,
        studies_info,
        terms,
    }
}

impl SyntheticData {
    pub fn masker(&self) -> Masker {
        Masker::new(&BrainVolume::from_array3(
            self.mask.mapv(f64::from),
            neuroquery_image_search::image::IDENTITY_AFFINE,
        ))
        .unwrap()
    }

    /// The bundle built directly in memory.
    pub fn bundle(&self) -> DataBundle {
        DataBundle::new(
            self.masker(),
            SparseMatrix::from_dense(&self.atlas),
            self.inv_covar.clone(),
            self.studies_loadings.clone(),
            self.terms_loadings.mapv(f64::from),
            self.studies_info.clone(),
            self.terms.clone(),
        )
        .unwrap()
    }

    /// A query image on the mask grid with seeded random values.
    pub fn random_image(&self, seed: u64) -> BrainVolume {
        let mut rng = StdRng::seed_from_u64(seed);
        let values: Array1<f64> = (0..N_VOXELS).map(|_| rng.random_range(-3.0..3.0)).collect();
        self.masker().inverse_transform(&values).unwrap()
    }

    /// Write every bundle file into `dir`, in the formats the real bundle
    /// uses.
    pub fn write_bundle_dir(&self, dir: &Path) -> Result<()> {
        std::fs::create_dir_all(dir)?;

        nifti::writer::WriterOptions::new(dir.join(bundle::MASK_FILE)).write_nifti(&self.mask)?;

        write_sparse_npz(&self.atlas, &dir.join(bundle::ATLAS_MAPS_FILE))?;
        self.inv_covar
            .write_npy(File::create(dir.join(bundle::ATLAS_INV_COVAR_FILE))?)?;
        self.studies_loadings
            .write_npy(File::create(dir.join(bundle::STUDIES_LOADINGS_FILE))?)?;
        self.terms_loadings
            .write_npy(File::create(dir.join(bundle::TERMS_LOADINGS_FILE))?)?;

        // Extra column, as in the real articles-info.csv
        let mut studies = csv::Writer::from_path(dir.join(bundle::STUDIES_INFO_FILE))?;
        studies.write_record(["pmid", "title", "pubmed_url", "year"])?;
        for s in &self.studies_info {
            studies.write_record([
                s.pmid.to_string(),
                s.title.clone(),
                s.pubmed_url.clone(),
                "2020".to_string(),
            ])?;
        }
        studies.flush()?;

        let mut terms = csv::Writer::from_path(dir.join(bundle::DOCUMENT_FREQUENCIES_FILE))?;
        for t in &self.terms {
            terms.serialize(t)?;
        }
        terms.flush()?;
        Ok(())
    }

    /// Write a .tar.gz whose single top-level directory is the bundle.
    pub fn write_archive(&self, archive: &Path) -> Result<()> {
        let staging = tempfile::tempdir()?;
        let bundle_dir = staging.path().join(bundle::BUNDLE_DIR_NAME);
        self.write_bundle_dir(&bundle_dir)?;

        let encoder = GzEncoder::new(File::create(archive)?, Compression::default());
        let mut builder = tar::Builder::new(encoder);
        builder.append_dir_all(bundle::BUNDLE_DIR_NAME, &bundle_dir)?;
        builder.into_inner()?.finish()?;
        Ok(())
    }
}

/// Save a dense matrix the way `scipy.sparse.save_npz` saves a CSR matrix.
pub fn write_sparse_npz(dense: &Array2<f64>, path: &Path) -> Result<()> {
    let (nrows, ncols) = dense.dim();
    let mut indptr = vec![0i32];
    let mut indices = Vec::new();
    let mut data = Vec::new();
    for row in dense.rows() {
        for (j, &v) in row.iter().enumerate() {
            if v != 0.0 {
                indices.push(j as i32);
                data.push(v);
            }
        }
        indptr.push(data.len() as i32);
    }

    let mut npz = NpzWriter::new(File::create(path)?);
    npz.add_array("indices", &Array1::from(indices))?;
    npz.add_array("indptr", &Array1::from(indptr))?;
    npz.add_array("data", &Array1::from(data))?;
    npz.add_array("shape", &Array1::from(vec![nrows as i64, ncols as i64]))?;
    npz.finish()?;
    Ok(())
}

/// Serves a local archive file and counts how often it was asked to.
pub struct LocalSource {
    pub archive: PathBuf,
    pub calls: AtomicUsize,
}

impl LocalSource {
    pub fn new(archive: PathBuf) -> Self {
        Self {
            archive,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BundleSource for LocalSource {
    async fn fetch_archive(&self, dest: &Path) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        std::fs::copy(&self.archive, dest)?;
        Ok(())
    }
}
