// NeuroQuery image search: find studies and terms with activation patterns
// similar to a brain image.
//
// This is the library root. Each module corresponds to one stage of the
// search: fetching the data bundle, masking the image, scoring, and
// rendering the results.

pub mod bundle;
pub mod config;
pub mod error;
pub mod image;
pub mod neurovault;
pub mod output;
pub mod search;

pub use error::SearchError;
pub use search::{ImageSearch, SearchOptions, SearchResults, Transform};
