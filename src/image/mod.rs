// Brain images: NIfTI loading, spatial metadata, and masking.

pub mod masker;
pub mod volume;

pub use masker::Masker;
pub use volume::{Affine, BrainVolume, ImageSource, IDENTITY_AFFINE};
