// Similarity search: projection into atlas space, scoring, and ranking.

pub mod engine;
pub mod ranking;
pub mod results;
pub mod sparse;
pub mod transform;

pub use engine::{ImageSearch, SearchOptions};
pub use results::{SearchResults, StudyMatch, TermMatch};
pub use transform::Transform;
