// Compressed sparse matrices for the atlas projection.
//
// The atlas maps are stored by SciPy's `save_npz` as an .npz archive holding
// `data`, `indices`, `indptr` and `shape`. Only the matrix-vector product is
// needed, so this is a small compressed-storage type rather than a general
// sparse algebra library. Both row-compressed (CSR) and column-compressed
// (CSC) storage are accepted.

use std::fs::File;
use std::io::{Read, Seek};
use std::path::Path;

use anyhow::{Context, Result};
use ndarray::{Array1, Array2, ArrayView1, Ix1, OwnedRepr};
use ndarray_npy::NpzReader;
use tracing::debug;

use crate::error::SearchError;

/// Which axis the index pointer compresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SparseLayout {
    /// `indptr` runs over rows, `indices` are column numbers.
    Csr,
    /// `indptr` runs over columns, `indices` are row numbers.
    Csc,
}

/// A sparse f64 matrix in compressed storage.
#[derive(Debug, Clone)]
pub struct SparseMatrix {
    nrows: usize,
    ncols: usize,
    layout: SparseLayout,
    indptr: Vec<usize>,
    indices: Vec<usize>,
    data: Vec<f64>,
}

impl SparseMatrix {
    /// Assemble a matrix from raw compressed arrays, checking that they are
    /// consistent with each other and with `shape`.
    pub fn new(
        shape: (usize, usize),
        layout: SparseLayout,
        indptr: Vec<usize>,
        indices: Vec<usize>,
        data: Vec<f64>,
    ) -> Result<Self> {
        let (nrows, ncols) = shape;
        let (major, minor) = match layout {
            SparseLayout::Csr => (nrows, ncols),
            SparseLayout::Csc => (ncols, nrows),
        };

        if indptr.len() != major + 1 {
            anyhow::bail!(
                "indptr has {} entries, expected {} for a {:?} matrix of shape {:?}",
                indptr.len(),
                major + 1,
                layout,
                shape
            );
        }
        if indices.len() != data.len() {
            anyhow::bail!(
                "indices ({}) and data ({}) have different lengths",
                indices.len(),
                data.len()
            );
        }
        if indptr.first() != Some(&0) || indptr.last() != Some(&data.len()) {
            anyhow::bail!("indptr must start at 0 and end at nnz ({})", data.len());
        }
        if indptr.windows(2).any(|w| w[0] > w[1]) {
            anyhow::bail!("indptr is not non-decreasing");
        }
        if let Some(&bad) = indices.iter().find(|&&i| i >= minor) {
            anyhow::bail!("index {bad} out of bounds for minor dimension {minor}");
        }

        Ok(Self {
            nrows,
            ncols,
            layout,
            indptr,
            indices,
            data,
        })
    }

    /// Row-compressed copy of a dense matrix, keeping only non-zero entries.
    pub fn from_dense(dense: &Array2<f64>) -> Self {
        let (nrows, ncols) = dense.dim();
        let mut indptr = Vec::with_capacity(nrows + 1);
        let mut indices = Vec::new();
        let mut data = Vec::new();
        indptr.push(0);
        for row in dense.rows() {
            for (j, &v) in row.iter().enumerate() {
                if v != 0.0 {
                    indices.push(j);
                    data.push(v);
                }
            }
            indptr.push(data.len());
        }
        Self {
            nrows,
            ncols,
            layout: SparseLayout::Csr,
            indptr,
            indices,
            data,
        }
    }

    /// Read a matrix written by `scipy.sparse.save_npz`.
    ///
    /// The layout is inferred from the length of `indptr`; square matrices
    /// are taken to be CSR.
    pub fn load_npz(path: &Path) -> Result<Self> {
        let file =
            File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
        let mut npz = NpzReader::new(file)
            .with_context(|| format!("Failed to read npz archive {}", path.display()))?;
        let names = npz
            .names()
            .with_context(|| format!("Failed to list entries of {}", path.display()))?;

        let shape = read_index_array(&mut npz, &entry_name(&names, "shape", path)?)?;
        if shape.len() != 2 {
            anyhow::bail!("{}: expected a 2D shape, got {:?}", path.display(), shape);
        }
        let indptr = read_index_array(&mut npz, &entry_name(&names, "indptr", path)?)?;
        let indices = read_index_array(&mut npz, &entry_name(&names, "indices", path)?)?;
        let data = read_float_array(&mut npz, &entry_name(&names, "data", path)?)?;

        let layout = if indptr.len() == shape[0] + 1 {
            SparseLayout::Csr
        } else {
            SparseLayout::Csc
        };
        debug!(
            ?layout,
            nnz = data.len(),
            "Loaded {}x{} sparse matrix from {}",
            shape[0],
            shape[1],
            path.display()
        );

        Self::new((shape[0], shape[1]), layout, indptr, indices, data)
            .with_context(|| format!("Malformed sparse matrix in {}", path.display()))
    }

    pub fn nrows(&self) -> usize {
        self.nrows
    }

    pub fn ncols(&self) -> usize {
        self.ncols
    }

    pub fn layout(&self) -> SparseLayout {
        self.layout
    }

    /// Number of stored entries.
    pub fn nnz(&self) -> usize {
        self.data.len()
    }

    /// Matrix-vector product `self · x`.
    pub fn dot(&self, x: ArrayView1<'_, f64>) -> Result<Array1<f64>> {
        if x.len() != self.ncols {
            return Err(SearchError::DimensionMismatch {
                what: "sparse matrix columns vs vector length",
                expected: self.ncols,
                found: x.len(),
            }
            .into());
        }

        let mut out = Array1::<f64>::zeros(self.nrows);
        match self.layout {
            SparseLayout::Csr => {
                for (row, slot) in out.iter_mut().enumerate() {
                    let span = self.indptr[row]..self.indptr[row + 1];
                    *slot = self.indices[span.clone()]
                        .iter()
                        .zip(&self.data[span])
                        .map(|(&col, &v)| v * x[col])
                        .sum();
                }
            }
            SparseLayout::Csc => {
                for col in 0..self.ncols {
                    let xc = x[col];
                    for p in self.indptr[col]..self.indptr[col + 1] {
                        out[self.indices[p]] += self.data[p] * xc;
                    }
                }
            }
        }
        Ok(out)
    }

    /// Dense copy, mostly for inspection and tests.
    pub fn to_dense(&self) -> Array2<f64> {
        let mut dense = Array2::zeros((self.nrows, self.ncols));
        for major in 0..self.indptr.len() - 1 {
            for p in self.indptr[major]..self.indptr[major + 1] {
                let (i, j) = match self.layout {
                    SparseLayout::Csr => (major, self.indices[p]),
                    SparseLayout::Csc => (self.indices[p], major),
                };
                dense[[i, j]] += self.data[p];
            }
        }
        dense
    }
}

/// Find an archive entry by key, with or without the `.npy` suffix.
fn entry_name(names: &[String], key: &str, path: &Path) -> Result<String> {
    names
        .iter()
        .find(|n| n.as_str() == key || n.strip_suffix(".npy") == Some(key))
        .cloned()
        .ok_or_else(|| anyhow::anyhow!("{}: no `{}` entry in archive", path.display(), key))
}

/// Read an integer array stored as int32 or int64.
fn read_index_array<R: Read + Seek>(npz: &mut NpzReader<R>, name: &str) -> Result<Vec<usize>> {
    let wide: Vec<i64> = match npz.by_name::<OwnedRepr<i32>, Ix1>(name) {
        Ok(arr) => arr.iter().map(|&v| i64::from(v)).collect(),
        Err(_) => {
            let arr: Array1<i64> = npz
                .by_name(name)
                .with_context(|| format!("Entry {name} is not an int32 or int64 vector"))?;
            arr.to_vec()
        }
    };
    wide.into_iter()
        .map(|v| usize::try_from(v).with_context(|| format!("Negative value {v} in {name}")))
        .collect()
}

/// Read a float array stored as float64 or float32.
fn read_float_array<R: Read + Seek>(npz: &mut NpzReader<R>, name: &str) -> Result<Vec<f64>> {
    match npz.by_name::<OwnedRepr<f64>, Ix1>(name) {
        Ok(arr) => Ok(arr.to_vec()),
        Err(_) => {
            let arr: Array1<f32> = npz
                .by_name(name)
                .with_context(|| format!("Entry {name} is not a float64 or float32 vector"))?;
            Ok(arr.iter().map(|&v| f64::from(v)).collect())
        }
    }
}
