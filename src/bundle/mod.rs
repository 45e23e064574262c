// The NeuroQuery image search data bundle.
//
// A fixed set of precomputed arrays, fetched once as a .tar.gz archive and
// extracted into the cache directory. `download` handles fetching and
// idempotency, `extract` unpacks the archive, and `data` loads the files
// into a validated DataBundle.

pub mod data;
pub mod download;
pub mod extract;

pub use data::{DataBundle, StudyInfo, TermInfo};

/// Name of the directory the archive extracts to, under `<cache>/extra`.
pub const BUNDLE_DIR_NAME: &str = "neuroquery_image_search_data";

/// Name the downloaded archive is saved under, next to the bundle directory.
pub const ARCHIVE_FILE_NAME: &str = "neuroquery_image_search_data.tar.gz";

pub const MASK_FILE: &str = "mask.nii.gz";
pub const ATLAS_MAPS_FILE: &str = "difumo_maps.npz";
pub const ATLAS_INV_COVAR_FILE: &str = "difumo_inverse_covariance.npy";
pub const STUDIES_LOADINGS_FILE: &str = "projections.npy";
pub const TERMS_LOADINGS_FILE: &str = "term_projections.npy";
pub const STUDIES_INFO_FILE: &str = "articles-info.csv";
pub const DOCUMENT_FREQUENCIES_FILE: &str = "document_frequencies.csv";

/// Every file a complete bundle directory contains.
pub const BUNDLE_FILES: [&str; 7] = [
    MASK_FILE,
    ATLAS_MAPS_FILE,
    ATLAS_INV_COVAR_FILE,
    STUDIES_LOADINGS_FILE,
    TERMS_LOADINGS_FILE,
    STUDIES_INFO_FILE,
    DOCUMENT_FREQUENCIES_FILE,
];
