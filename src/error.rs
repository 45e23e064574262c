// Domain errors that callers may want to tell apart.
//
// Everything else flows through anyhow with context, but these are
// rejected-input conditions: a hostile archive, an image on the wrong grid,
// or a bundle whose arrays don't line up. They're wrapped in anyhow::Error
// like any other failure and can be recovered with `downcast_ref`.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SearchError {
    /// An archive entry would be written outside the extraction directory.
    #[error("Attempted path traversal in tar file: entry {entry:?} escapes {dest}")]
    PathTraversal { entry: String, dest: PathBuf },

    /// The query image and the mask are not on the same voxel grid.
    #[error("Image geometry does not match the mask: {0}")]
    GeometryMismatch(String),

    /// The image has a dimensionality the masker can't handle.
    #[error("Unsupported image: {0}")]
    UnsupportedImage(String),

    /// Arrays in the data bundle disagree on a shared dimension.
    #[error("Data bundle dimension mismatch: {what} (expected {expected}, found {found})")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        found: usize,
    },

    /// A file the bundle needs is not present in the cache directory.
    #[error("Missing data bundle file: {}", .0.display())]
    MissingBundleFile(PathBuf),
}
