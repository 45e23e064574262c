use std::env;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// Default location of the NeuroQuery image search data bundle.
pub const DEFAULT_BUNDLE_URL: &str = "https://osf.io/mx3t4/download";

/// NeuroVault image used when no query image is given (motor task,
/// left vs right hand).
pub const DEFAULT_EXAMPLE_IMAGE_ID: u32 = 10426;

/// Central configuration loaded from environment variables.
///
/// Nothing here is global: the loader and example-image fetcher take a
/// `&Config`, so tests can point them at a scratch directory. The .env file
/// is loaded automatically at startup via dotenvy.
#[derive(Debug, Clone)]
pub struct Config {
    /// Cache root. The bundle lives under `extra/neuroquery_image_search_data`.
    pub data_dir: PathBuf,
    /// Where to download the bundle archive from when the cache is cold.
    pub bundle_url: String,
    /// NeuroVault image id fetched when the CLI gets no query image.
    pub example_image_id: u32,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Every setting has a default, so this only fails on a malformed
    /// `NEUROQUERY_EXAMPLE_IMAGE_ID`.
    pub fn load() -> Result<Self> {
        let data_dir = env::var("NEUROQUERY_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_data_dir());

        let example_image_id = match env::var("NEUROQUERY_EXAMPLE_IMAGE_ID") {
            Ok(id) => id
                .parse()
                .with_context(|| format!("NEUROQUERY_EXAMPLE_IMAGE_ID is not a number: {id}"))?,
            Err(_) => DEFAULT_EXAMPLE_IMAGE_ID,
        };

        Ok(Self {
            data_dir,
            bundle_url: env::var("NEUROQUERY_IMAGE_SEARCH_DATA_URL")
                .unwrap_or_else(|_| DEFAULT_BUNDLE_URL.to_string()),
            example_image_id,
        })
    }

    /// Configuration rooted at an explicit cache directory, defaults elsewhere.
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            bundle_url: DEFAULT_BUNDLE_URL.to_string(),
            example_image_id: DEFAULT_EXAMPLE_IMAGE_ID,
        }
    }

    /// Directory the bundle archive is extracted into.
    pub fn extra_dir(&self) -> PathBuf {
        self.data_dir.join("extra")
    }

    /// Directory holding the extracted bundle files.
    pub fn bundle_dir(&self) -> PathBuf {
        self.extra_dir().join(crate::bundle::BUNDLE_DIR_NAME)
    }

    /// Directory for images downloaded from NeuroVault.
    pub fn neurovault_dir(&self) -> PathBuf {
        self.data_dir.join("neurovault")
    }

    /// Create the cache root if it doesn't exist yet.
    pub fn ensure_data_dir(&self) -> Result<&Path> {
        std::fs::create_dir_all(&self.data_dir).with_context(|| {
            format!("Failed to create data directory: {}", self.data_dir.display())
        })?;
        Ok(&self.data_dir)
    }
}

/// Returns the default cache root: `~/neuroquery_data`, or `./neuroquery_data`
/// when no home directory can be found.
pub fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("neuroquery_data")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_data_dir_is_named_neuroquery_data() {
        let dir = default_data_dir();
        assert!(dir.ends_with("neuroquery_data"), "got: {}", dir.display());
    }

    #[test]
    fn test_bundle_dir_is_under_extra() {
        let config = Config::with_data_dir("/tmp/nq");
        assert_eq!(
            config.bundle_dir(),
            PathBuf::from("/tmp/nq/extra/neuroquery_image_search_data")
        );
    }

    #[test]
    fn test_with_data_dir_uses_defaults() {
        let config = Config::with_data_dir("/tmp/nq");
        assert_eq!(config.bundle_url, DEFAULT_BUNDLE_URL);
        assert_eq!(config.example_image_id, DEFAULT_EXAMPLE_IMAGE_ID);
    }

    #[test]
    fn test_ensure_data_dir_creates_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let config = Config::with_data_dir(tmp.path().join("nested").join("cache"));
        config.ensure_data_dir().unwrap();
        assert!(config.data_dir.is_dir());
    }
}
