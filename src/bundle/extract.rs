// Defensive extraction of the bundle archive.
//
// Every entry path is checked before anything is written: absolute paths,
// drive prefixes, and `..` sequences that climb above the destination are
// rejected, as are links pointing outside it and entries that would be
// written through a link. If any entry fails the check
// the whole archive is refused and the destination is left untouched.

use std::fs::File;
use std::io::BufReader;
use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result};
use flate2::read::GzDecoder;
use tar::{Archive, EntryType};
use tracing::{debug, info};

use crate::error::SearchError;

/// Unpack a .tar.gz archive into `dest`, refusing path-traversal entries.
pub fn extract_archive(archive: &Path, dest: &Path) -> Result<()> {
    let entry_count = validate_archive(archive, dest)?;

    std::fs::create_dir_all(dest)
        .with_context(|| format!("Failed to create {}", dest.display()))?;
    let mut tar = open_archive(archive)?;
    tar.set_preserve_permissions(false);
    tar.unpack(dest)
        .with_context(|| format!("Failed to extract {}", archive.display()))?;

    info!(entries = entry_count, "Extracted {} into {}", archive.display(), dest.display());
    Ok(())
}

/// Check every entry of the archive without extracting. Returns the number
/// of entries.
///
/// Entries are collected first so that every path can be checked against
/// every link in the archive: nothing may be written through a link, and no
/// link target may run through another link, whatever the entry order.
pub fn validate_archive(archive: &Path, dest: &Path) -> Result<usize> {
    let entries = list_entries(archive)?;

    let links: Vec<&Path> = entries
        .iter()
        .filter(|e| e.link_target.is_some())
        .map(|e| e.path.as_path())
        .collect();
    let through_link = |path: &Path| links.iter().any(|link| path != *link && path.starts_with(link));

    for entry in &entries {
        if !stays_within(&entry.path) || through_link(&entry.path) {
            return Err(traversal(&entry.path, dest));
        }

        if let Some(target) = &entry.link_target {
            if !stays_within(target) || links.iter().any(|link| target.starts_with(link)) {
                return Err(traversal(&entry.path, dest));
            }
        }

        debug!("Archive entry ok: {}", entry.path.display());
    }
    Ok(entries.len())
}

/// An archive entry's path and, for links, the target it resolves to
/// relative to the archive root.
struct EntryInfo {
    path: PathBuf,
    link_target: Option<PathBuf>,
}

fn list_entries(archive: &Path) -> Result<Vec<EntryInfo>> {
    let mut tar = open_archive(archive)?;
    let mut entries = Vec::new();
    for entry in tar
        .entries()
        .with_context(|| format!("Failed to read {}", archive.display()))?
    {
        let entry = entry.with_context(|| format!("Corrupt entry in {}", archive.display()))?;
        let path: PathBuf = entry
            .path()
            .with_context(|| format!("Unreadable entry path in {}", archive.display()))?
            .into_owned();

        let entry_type = entry.header().entry_type();
        let link_target = if matches!(entry_type, EntryType::Symlink | EntryType::Link) {
            let target = entry
                .link_name()
                .with_context(|| format!("Unreadable link target in {}", archive.display()))?
                .map(|t| t.into_owned())
                .unwrap_or_default();
            // Symlink targets resolve from the link's own directory,
            // hard-link targets from the archive root.
            Some(if entry_type == EntryType::Symlink {
                path.parent().unwrap_or(Path::new("")).join(target)
            } else {
                target
            })
        } else {
            None
        };

        entries.push(EntryInfo { path, link_target });
    }
    Ok(entries)
}

/// True if a relative archive path, resolved lexically, never leaves the
/// directory it is extracted into.
pub fn stays_within(path: &Path) -> bool {
    let mut depth: usize = 0;
    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => return false,
            Component::CurDir => {}
            Component::ParentDir => {
                if depth == 0 {
                    return false;
                }
                depth -= 1;
            }
            Component::Normal(_) => depth += 1,
        }
    }
    true
}

fn open_archive(archive: &Path) -> Result<Archive<GzDecoder<BufReader<File>>>> {
    let file = File::open(archive)
        .with_context(|| format!("Failed to open archive {}", archive.display()))?;
    Ok(Archive::new(GzDecoder::new(BufReader::new(file))))
}

fn traversal(entry: &Path, dest: &Path) -> anyhow::Error {
    SearchError::PathTraversal {
        entry: entry.display().to_string(),
        dest: dest.to_path_buf(),
    }
    .into()
}
