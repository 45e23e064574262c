// Brain volumes and their spatial metadata.
//
// A BrainVolume is a 3D or 4D array of voxel values plus the 4x4 affine that
// maps voxel indices to world (scanner) coordinates. Volumes come either from
// memory or from NIfTI-1 files (.nii / .nii.gz).

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use ndarray::{Array3, ArrayD, ArrayView3, Axis, Ix3};
use nifti::{IntoNdArray, NiftiHeader, NiftiObject, ReaderOptions};
use tracing::debug;

use crate::error::SearchError;

/// Voxel-to-world transform, row-major.
pub type Affine = [[f64; 4]; 4];

/// The identity affine (1mm isotropic voxels, origin at voxel 0).
pub const IDENTITY_AFFINE: Affine = [
    [1.0, 0.0, 0.0, 0.0],
    [0.0, 1.0, 0.0, 0.0],
    [0.0, 0.0, 1.0, 0.0],
    [0.0, 0.0, 0.0, 1.0],
];

/// A 3D or 4D brain image.
#[derive(Debug, Clone)]
pub struct BrainVolume {
    data: ArrayD<f64>,
    affine: Affine,
}

impl BrainVolume {
    /// Wrap an array and affine. The array must be 3D, or 4D with at least
    /// one volume.
    pub fn new(data: ArrayD<f64>, affine: Affine) -> Result<Self> {
        match data.ndim() {
            3 => {}
            4 if data.shape()[3] > 0 => {}
            4 => {
                return Err(SearchError::UnsupportedImage(
                    "4D image contains no volumes".to_string(),
                )
                .into())
            }
            n => {
                return Err(SearchError::UnsupportedImage(format!(
                    "expected a 3D or 4D image, got {n} dimensions"
                ))
                .into())
            }
        }
        Ok(Self { data, affine })
    }

    /// Wrap a 3D array. Cannot fail.
    pub fn from_array3(data: Array3<f64>, affine: Affine) -> Self {
        Self {
            data: data.into_dyn(),
            affine,
        }
    }

    /// Read a NIfTI-1 file. Gzipped files are detected by extension.
    pub fn load(path: &Path) -> Result<Self> {
        let object = ReaderOptions::new()
            .read_file(path)
            .with_context(|| format!("Failed to read NIfTI image {}", path.display()))?;
        let affine = header_affine(object.header());
        let data = object
            .into_volume()
            .into_ndarray::<f64>()
            .with_context(|| format!("Failed to decode voxel data in {}", path.display()))?;

        debug!(shape = ?data.shape(), "Loaded image from {}", path.display());
        Self::new(data, affine).with_context(|| format!("Invalid image {}", path.display()))
    }

    pub fn data(&self) -> &ArrayD<f64> {
        &self.data
    }

    pub fn affine(&self) -> &Affine {
        &self.affine
    }

    /// Shape of the spatial grid (first three axes).
    pub fn spatial_shape(&self) -> [usize; 3] {
        let shape = self.data.shape();
        [shape[0], shape[1], shape[2]]
    }

    /// Number of volumes: 1 for a 3D image.
    pub fn n_volumes(&self) -> usize {
        if self.data.ndim() == 4 {
            self.data.shape()[3]
        } else {
            1
        }
    }

    /// The image itself if 3D, else its first volume.
    pub fn first_volume(&self) -> Result<ArrayView3<'_, f64>> {
        let view = if self.data.ndim() == 4 {
            self.data.index_axis(Axis(3), 0)
        } else {
            self.data.view()
        };
        view.into_dimensionality::<Ix3>()
            .map_err(|e| SearchError::UnsupportedImage(e.to_string()).into())
    }

    /// Apply `f` to every voxel, keeping the geometry.
    pub fn mapv(&self, f: impl Fn(f64) -> f64) -> Self {
        Self {
            data: self.data.mapv(f),
            affine: self.affine,
        }
    }
}

/// Compare two affines elementwise with an absolute tolerance.
pub fn affines_close(a: &Affine, b: &Affine, tol: f64) -> bool {
    a.iter()
        .flatten()
        .zip(b.iter().flatten())
        .all(|(x, y)| (x - y).abs() <= tol)
}

/// Build the voxel-to-world affine from a NIfTI header.
///
/// Preference order follows the NIfTI-1 standard: sform when its code is set,
/// then the qform quaternion, then plain voxel scaling from pixdim.
pub fn header_affine(header: &NiftiHeader) -> Affine {
    if header.sform_code > 0 {
        let row = |r: [f32; 4]| [r[0] as f64, r[1] as f64, r[2] as f64, r[3] as f64];
        return [
            row(header.srow_x),
            row(header.srow_y),
            row(header.srow_z),
            [0.0, 0.0, 0.0, 1.0],
        ];
    }

    let dx = header.pixdim[1] as f64;
    let dy = header.pixdim[2] as f64;
    let dz = header.pixdim[3] as f64;

    if header.qform_code > 0 {
        let b = header.quatern_b as f64;
        let c = header.quatern_c as f64;
        let d = header.quatern_d as f64;
        let a = (1.0 - (b * b + c * c + d * d)).max(0.0).sqrt();
        let qfac = if header.pixdim[0] < 0.0 { -1.0 } else { 1.0 };

        let r = [
            [
                a * a + b * b - c * c - d * d,
                2.0 * (b * c - a * d),
                2.0 * (b * d + a * c),
            ],
            [
                2.0 * (b * c + a * d),
                a * a + c * c - b * b - d * d,
                2.0 * (c * d - a * b),
            ],
            [
                2.0 * (b * d - a * c),
                2.0 * (c * d + a * b),
                a * a + d * d - c * c - b * b,
            ],
        ];
        let scale = [dx, dy, qfac * dz];
        let offset = [
            header.quatern_x as f64,
            header.quatern_y as f64,
            header.quatern_z as f64,
        ];

        let mut affine = IDENTITY_AFFINE;
        for i in 0..3 {
            for j in 0..3 {
                affine[i][j] = r[i][j] * scale[j];
            }
            affine[i][3] = offset[i];
        }
        return affine;
    }

    [
        [dx, 0.0, 0.0, 0.0],
        [0.0, dy, 0.0, 0.0],
        [0.0, 0.0, dz, 0.0],
        [0.0, 0.0, 0.0, 1.0],
    ]
}

/// Where a query image comes from: already in memory, or a file to read.
#[derive(Debug, Clone)]
pub enum ImageSource {
    Path(PathBuf),
    Volume(BrainVolume),
}

impl ImageSource {
    /// Load the image if needed.
    pub fn resolve(self) -> Result<BrainVolume> {
        match self {
            ImageSource::Path(path) => BrainVolume::load(&path),
            ImageSource::Volume(volume) => Ok(volume),
        }
    }

    /// Short name for page titles: the file name, or "Image".
    pub fn display_name(&self) -> String {
        match self {
            ImageSource::Path(path) => path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "Image".to_string()),
            ImageSource::Volume(_) => "Image".to_string(),
        }
    }
}

impl From<BrainVolume> for ImageSource {
    fn from(volume: BrainVolume) -> Self {
        ImageSource::Volume(volume)
    }
}

impl From<PathBuf> for ImageSource {
    fn from(path: PathBuf) -> Self {
        ImageSource::Path(path)
    }
}

impl From<&Path> for ImageSource {
    fn from(path: &Path) -> Self {
        ImageSource::Path(path.to_path_buf())
    }
}

impl From<&str> for ImageSource {
    fn from(path: &str) -> Self {
        ImageSource::Path(PathBuf::from(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::IxDyn;

    #[test]
    fn test_rejects_2d_array() {
        let err = BrainVolume::new(ArrayD::zeros(IxDyn(&[4, 4])), IDENTITY_AFFINE).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SearchError>(),
            Some(SearchError::UnsupportedImage(_))
        ));
    }

    #[test]
    fn test_rejects_empty_4d_array() {
        let err =
            BrainVolume::new(ArrayD::zeros(IxDyn(&[2, 2, 2, 0])), IDENTITY_AFFINE).unwrap_err();
        assert!(err.to_string().contains("no volumes"));
    }

    #[test]
    fn test_first_volume_of_4d_image() {
        let mut data = ArrayD::zeros(IxDyn(&[2, 2, 2, 3]));
        data[[1, 0, 1, 0]] = 5.0;
        data[[1, 0, 1, 1]] = 9.0;
        let volume = BrainVolume::new(data, IDENTITY_AFFINE).unwrap();
        assert_eq!(volume.n_volumes(), 3);
        let first = volume.first_volume().unwrap();
        assert_eq!(first[[1, 0, 1]], 5.0);
        assert_eq!(volume.spatial_shape(), [2, 2, 2]);
    }

    #[test]
    fn test_affines_close_tolerance() {
        let mut other = IDENTITY_AFFINE;
        other[0][3] = 1e-6;
        assert!(affines_close(&IDENTITY_AFFINE, &other, 1e-4));
        other[0][3] = 0.5;
        assert!(!affines_close(&IDENTITY_AFFINE, &other, 1e-4));
    }

    #[test]
    fn test_header_affine_prefers_sform() {
        let header = NiftiHeader {
            sform_code: 1,
            srow_x: [2.0, 0.0, 0.0, -90.0],
            srow_y: [0.0, 2.0, 0.0, -126.0],
            srow_z: [0.0, 0.0, 2.0, -72.0],
            ..NiftiHeader::default()
        };
        let affine = header_affine(&header);
        assert_eq!(affine[0], [2.0, 0.0, 0.0, -90.0]);
        assert_eq!(affine[2][3], -72.0);
        assert_eq!(affine[3], [0.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_header_affine_identity_quaternion() {
        let header = NiftiHeader {
            sform_code: 0,
            qform_code: 1,
            pixdim: [1.0, 3.0, 3.0, 4.0, 0.0, 0.0, 0.0, 0.0],
            quatern_b: 0.0,
            quatern_c: 0.0,
            quatern_d: 0.0,
            quatern_x: 10.0,
            quatern_y: 20.0,
            quatern_z: 30.0,
            ..NiftiHeader::default()
        };
        let affine = header_affine(&header);
        assert_eq!(affine[0], [3.0, 0.0, 0.0, 10.0]);
        assert_eq!(affine[1], [0.0, 3.0, 0.0, 20.0]);
        assert_eq!(affine[2], [0.0, 0.0, 4.0, 30.0]);
    }

    #[test]
    fn test_display_name_uses_file_name() {
        let source = ImageSource::from("/data/maps/motor.nii.gz");
        assert_eq!(source.display_name(), "motor.nii.gz");
        let in_memory = ImageSource::from(BrainVolume::from_array3(
            Array3::zeros((1, 1, 1)),
            IDENTITY_AFFINE,
        ));
        assert_eq!(in_memory.display_name(), "Image");
    }
}
