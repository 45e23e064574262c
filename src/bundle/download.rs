// Fetching the data bundle into the cache directory.
//
// The bundle is a single .tar.gz archive (~hundreds of MB) hosted on OSF.
// It is downloaded once per cache directory and extracted to
// <cache>/extra/neuroquery_image_search_data/. Later calls find the files
// already there and don't touch the network.
//
// How the archive is obtained sits behind the BundleSource trait so tests
// can supply a local archive and count requests.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::io::AsyncWriteExt;
use tracing::info;

use super::extract::extract_archive;
use super::{ARCHIVE_FILE_NAME, BUNDLE_FILES};
use crate::config::Config;
use crate::error::SearchError;

/// Somewhere the bundle archive can be fetched from.
#[async_trait]
pub trait BundleSource: Send + Sync {
    /// Write the .tar.gz bundle archive to `dest`.
    async fn fetch_archive(&self, dest: &Path) -> Result<()>;
}

/// Downloads the archive over HTTP(S).
pub struct HttpSource {
    client: reqwest::Client,
    url: String,
}

impl HttpSource {
    pub fn new(url: &str) -> Result<Self> {
        Ok(Self {
            client: http_client()?,
            url: url.to_string(),
        })
    }
}

#[async_trait]
impl BundleSource for HttpSource {
    async fn fetch_archive(&self, dest: &Path) -> Result<()> {
        download_file(&self.client, &self.url, dest, true).await
    }
}

/// Check whether every bundle file exists in `dir`.
pub fn bundle_files_present(dir: &Path) -> bool {
    BUNDLE_FILES.iter().all(|name| dir.join(name).exists())
}

/// Make sure the bundle is in the cache and return its directory.
///
/// If every bundle file is already present, returns immediately without
/// calling `source`. Otherwise fetches the archive next to the bundle
/// directory and extracts it. Download and extraction errors are not
/// retried.
pub async fn fetch_bundle(config: &Config, source: &dyn BundleSource) -> Result<PathBuf> {
    let bundle_dir = config.bundle_dir();
    if bundle_files_present(&bundle_dir) {
        info!("Data bundle already cached in {}", bundle_dir.display());
        return Ok(bundle_dir);
    }

    println!("Downloading NeuroQuery image search data ...");
    println!("  Destination: {}", bundle_dir.display());

    config.ensure_data_dir()?;
    let extra_dir = config.extra_dir();
    std::fs::create_dir_all(&extra_dir)
        .with_context(|| format!("Failed to create {}", extra_dir.display()))?;

    let archive = extra_dir.join(ARCHIVE_FILE_NAME);
    source.fetch_archive(&archive).await?;

    let (archive_path, dest) = (archive.clone(), extra_dir.clone());
    tokio::task::spawn_blocking(move || extract_archive(&archive_path, &dest))
        .await
        .context("spawn_blocking panicked")??;

    if let Some(missing) = BUNDLE_FILES
        .iter()
        .map(|name| bundle_dir.join(name))
        .find(|path| !path.exists())
    {
        return Err(SearchError::MissingBundleFile(missing))
            .with_context(|| format!("Archive {} is incomplete", archive.display()));
    }

    println!("Done");
    Ok(bundle_dir)
}

/// HTTP client shared by the bundle and NeuroVault downloads.
pub fn http_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(concat!(
            "neuroquery-image-search/",
            env!("CARGO_PKG_VERSION")
        ))
        .build()
        .context("Failed to build HTTP client")
}

/// Download a single file from a URL to a local path.
///
/// The body is streamed to `<dest>.part` and renamed into place once
/// complete, so an interrupted download never leaves a truncated file at
/// `dest`. If `show_progress` is true, display a progress bar.
pub async fn download_file(
    client: &reqwest::Client,
    url: &str,
    dest: &Path,
    show_progress: bool,
) -> Result<()> {
    let mut response = client
        .get(url)
        .send()
        .await
        .with_context(|| format!("Failed to download {}", url))?;

    if !response.status().is_success() {
        anyhow::bail!("Download failed with status {}: {}", response.status(), url);
    }

    let pb = if show_progress {
        Some(progress_bar(response.content_length())?)
    } else {
        None
    };

    let partial = dest.with_extension("part");
    let mut file = tokio::fs::File::create(&partial)
        .await
        .with_context(|| format!("Failed to create {}", partial.display()))?;

    let mut written: u64 = 0;
    while let Some(chunk) = response
        .chunk()
        .await
        .context("Failed to read response body")?
    {
        file.write_all(&chunk)
            .await
            .with_context(|| format!("Failed to write {}", partial.display()))?;
        written += chunk.len() as u64;
        if let Some(ref pb) = pb {
            pb.set_position(written);
        }
    }
    file.flush().await?;
    drop(file);

    tokio::fs::rename(&partial, dest)
        .await
        .with_context(|| format!("Failed to move download into {}", dest.display()))?;

    if let Some(pb) = pb {
        pb.finish_and_clear();
    }

    info!(bytes = written, "Downloaded {} to {}", url, dest.display());
    Ok(())
}

fn progress_bar(total_size: Option<u64>) -> Result<ProgressBar> {
    let pb = match total_size {
        Some(size) => {
            let pb = ProgressBar::new(size);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("    [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})")
                    .context("Invalid progress bar template")?
                    .progress_chars("=> "),
            );
            pb
        }
        None => {
            let pb = ProgressBar::new_spinner();
            pb.set_style(
                ProgressStyle::default_spinner()
                    .template("    {spinner} {bytes}")
                    .context("Invalid progress bar template")?,
            );
            pb
        }
    };
    Ok(pb)
}
