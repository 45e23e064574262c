// Example query image from NeuroVault.
//
// When no image is given on the command line we search with a public
// statistical map instead. The image metadata endpoint tells us where the
// NIfTI file lives; the file itself is cached under <cache>/neurovault/.

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::info;

use crate::bundle::download::{download_file, http_client};
use crate::config::Config;

/// NeuroVault REST API root.
pub const NEUROVAULT_API_URL: &str = "https://neurovault.org/api";

/// The part of NeuroVault's image metadata we need.
#[derive(Debug, Deserialize)]
pub struct ImageMetadata {
    pub id: u32,
    /// Direct URL of the NIfTI file.
    pub file: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// Local path the example image is cached at.
pub fn example_image_path(config: &Config) -> PathBuf {
    config
        .neurovault_dir()
        .join(format!("image_{}.nii.gz", config.example_image_id))
}

/// Return the example image, downloading it on first use.
pub async fn fetch_example_image(config: &Config) -> Result<PathBuf> {
    let path = example_image_path(config);
    if path.exists() {
        info!("Example image already cached at {}", path.display());
        return Ok(path);
    }

    let dir = config.neurovault_dir();
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create {}", dir.display()))?;

    let client = http_client()?;
    let metadata_url = format!("{}/images/{}/", NEUROVAULT_API_URL, config.example_image_id);
    let response = client
        .get(&metadata_url)
        .send()
        .await
        .with_context(|| format!("Failed to query {}", metadata_url))?;
    if !response.status().is_success() {
        anyhow::bail!(
            "NeuroVault returned status {} for {}",
            response.status(),
            metadata_url
        );
    }
    let metadata: ImageMetadata = response
        .json()
        .await
        .context("Failed to parse NeuroVault image metadata")?;

    println!(
        "Downloading example image {} from NeuroVault ...",
        metadata.name.as_deref().unwrap_or("(unnamed)")
    );
    download_file(&client, &metadata.file, &path, false).await?;
    info!(id = metadata.id, "Cached example image at {}", path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_example_image_path_includes_id() {
        let mut config = Config::with_data_dir("/tmp/nq");
        config.example_image_id = 42;
        assert_eq!(
            example_image_path(&config),
            PathBuf::from("/tmp/nq/neurovault/image_42.nii.gz")
        );
    }

    #[test]
    fn test_metadata_ignores_extra_fields() {
        let json = r#"{"id": 10426, "file": "https://neurovault.org/media/images/x.nii.gz",
                       "name": "left vs right", "map_type": "T map"}"#;
        let metadata: ImageMetadata = serde_json::from_str(json).unwrap();
        assert_eq!(metadata.id, 10426);
        assert!(metadata.file.ends_with(".nii.gz"));
    }
}
