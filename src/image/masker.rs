// Restrict brain volumes to the voxels of a fixed mask.
//
// The atlas projection matrix has one column per in-mask voxel, so the order
// in which masked values come out has to be stable and match the order the
// bundle was built with: row-major over (i, j, k), k varying fastest.

use std::path::Path;

use anyhow::{Context, Result};
use ndarray::{Array1, Array3};
use tracing::warn;

use super::volume::{affines_close, Affine, BrainVolume};
use crate::error::SearchError;

/// Absolute tolerance when comparing image and mask affines.
const AFFINE_TOLERANCE: f64 = 1e-4;

/// A fitted binary mask.
#[derive(Debug, Clone)]
pub struct Masker {
    mask: Array3<bool>,
    affine: Affine,
    n_voxels: usize,
}

impl Masker {
    /// Build a masker from a mask image. Any non-zero voxel of the first
    /// volume is in the mask.
    pub fn new(mask_img: &BrainVolume) -> Result<Self> {
        let mask = mask_img.first_volume()?.mapv(|v| v != 0.0);
        let n_voxels = mask.iter().filter(|&&m| m).count();
        Ok(Self {
            mask,
            affine: *mask_img.affine(),
            n_voxels,
        })
    }

    /// Read the mask from a NIfTI file.
    pub fn load(path: &Path) -> Result<Self> {
        let img = BrainVolume::load(path)
            .with_context(|| format!("Failed to load mask {}", path.display()))?;
        Self::new(&img)
    }

    /// Number of in-mask voxels (length of every masked vector).
    pub fn n_voxels(&self) -> usize {
        self.n_voxels
    }

    pub fn shape(&self) -> [usize; 3] {
        let (x, y, z) = self.mask.dim();
        [x, y, z]
    }

    pub fn affine(&self) -> &Affine {
        &self.affine
    }

    /// Extract the in-mask voxel values of `image`.
    ///
    /// Only the first volume of a 4D image is used. The image must be on the
    /// mask's grid: same 3D shape and same affine. NaN and infinite values
    /// inside the mask are replaced with 0.
    pub fn transform(&self, image: &BrainVolume) -> Result<Array1<f64>> {
        self.check_geometry(image)?;
        let volume = image.first_volume()?;
        let mut non_finite = 0usize;
        let masked: Array1<f64> = self
            .mask
            .iter()
            .zip(volume.iter())
            .filter(|(m, _)| **m)
            .map(|(_, &v)| {
                if v.is_finite() {
                    v
                } else {
                    non_finite += 1;
                    0.0
                }
            })
            .collect();
        if non_finite > 0 {
            warn!(
                count = non_finite,
                "Replaced {} non-finite in-mask voxels with 0",
                non_finite
            );
        }
        Ok(masked)
    }

    /// Scatter a masked vector back into a 3D volume on the mask's grid.
    /// Out-of-mask voxels are zero.
    pub fn inverse_transform(&self, values: &Array1<f64>) -> Result<BrainVolume> {
        if values.len() != self.n_voxels {
            return Err(SearchError::DimensionMismatch {
                what: "masked vector length",
                expected: self.n_voxels,
                found: values.len(),
            }
            .into());
        }
        let mut data = Array3::zeros(self.mask.raw_dim());
        for ((slot, _), &v) in data
            .iter_mut()
            .zip(self.mask.iter())
            .filter(|(_, m)| **m)
            .zip(values.iter())
        {
            *slot = v;
        }
        Ok(BrainVolume::from_array3(data, self.affine))
    }

    fn check_geometry(&self, image: &BrainVolume) -> Result<()> {
        let shape = image.spatial_shape();
        if shape != self.shape() {
            return Err(SearchError::GeometryMismatch(format!(
                "image shape {:?} differs from mask shape {:?}",
                shape,
                self.shape()
            ))
            .into());
        }
        if !affines_close(image.affine(), &self.affine, AFFINE_TOLERANCE) {
            return Err(SearchError::GeometryMismatch(format!(
                "image affine {:?} differs from mask affine {:?}",
                image.affine(),
                self.affine
            ))
            .into());
        }
        Ok(())
    }
}
