//! Download materializer
//!
//! Staging folders live under the downloads root and are named after the
//! requester, the target kind and the target identifier, so jobs for
//! different (requester, target) pairs never share a folder. A folder left
//! over from a previous run for the same key is wiped, never appended to.

use crate::config::MEDIA_EXTENSIONS;
use crate::platform::{Highlight, MediaResource, PlatformClient, PlatformError, StoryItem};
use chrono::{DateTime, Utc};
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// What a download job fetches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetKind {
    /// Post, reel or IGTV item by shortcode
    Post,
    /// Profile picture by username
    ProfilePicture,
    /// Current stories by username
    Story,
    /// Highlights by username
    Highlight,
}

impl TargetKind {
    /// Folder name prefix; posts use the bare `<requester>_<shortcode>` form
    #[must_use]
    pub const fn folder_prefix(self) -> Option<&'static str> {
        match self {
            Self::Post => None,
            Self::ProfilePicture => Some("pfp"),
            Self::Story => Some("stories"),
            Self::Highlight => Some("highlights"),
        }
    }
}

/// A single request's fetch target and its staging folder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadJob {
    /// Requester the job runs for
    pub requester_id: i64,
    /// Target kind
    pub kind: TargetKind,
    /// Shortcode or username
    pub target: String,
    /// Request-scoped staging folder
    pub staging: PathBuf,
}

impl DownloadJob {
    /// Build a job with its deterministic staging folder under `root`
    #[must_use]
    pub fn new(root: &Path, requester_id: i64, kind: TargetKind, target: &str) -> Self {
        let target = sanitize_component(target);
        let name = match kind.folder_prefix() {
            Some(prefix) => format!("{prefix}_{requester_id}_{target}"),
            None => format!("{requester_id}_{target}"),
        };
        Self {
            requester_id,
            kind,
            staging: root.join(name),
            target,
        }
    }

    /// Wipe and recreate the staging folder.
    ///
    /// # Errors
    ///
    /// Returns an error if the folder cannot be removed or created.
    pub fn prepare(&self) -> io::Result<()> {
        if self.staging.exists() {
            fs::remove_dir_all(&self.staging)?;
        }
        fs::create_dir_all(&self.staging)
    }

    /// Collect deliverable media currently in the staging folder.
    ///
    /// # Errors
    ///
    /// Returns an error if the folder cannot be read.
    pub fn bundle(&self) -> io::Result<MediaBundle> {
        MediaBundle::collect(&self.staging)
    }
}

/// Replace anything outside `[A-Za-z0-9._-]` so targets never escape the root
fn sanitize_component(raw: &str) -> String {
    let cleaned: String = raw
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();

    match cleaned.trim_matches('.') {
        "" => "_".to_string(),
        _ => cleaned,
    }
}

/// Ordered media files ready for delivery
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MediaBundle {
    files: Vec<PathBuf>,
}

impl MediaBundle {
    /// Walk `folder` recursively, keep allow-listed media, sort lexicographically.
    ///
    /// # Errors
    ///
    /// Returns an error if a directory cannot be read.
    pub fn collect(folder: &Path) -> io::Result<Self> {
        let mut files = Vec::new();
        if folder.is_dir() {
            walk(folder, &mut files)?;
        }
        files.retain(|p| is_media(p));
        files.sort();
        Ok(Self { files })
    }

    /// Files in delivery order
    #[must_use]
    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    /// Number of files
    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// True when there is nothing to deliver
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

fn walk(dir: &Path, out: &mut Vec<PathBuf>) -> io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            walk(&path, out)?;
        } else {
            out.push(path);
        }
    }
    Ok(())
}

/// Whether the file extension is on the media allow-list
#[must_use]
pub fn is_media(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .is_some_and(|ext| MEDIA_EXTENSIONS.contains(&ext.as_str()))
}

/// File stem for a timestamp, e.g. `2024-01-31_18-05-00_UTC`
#[must_use]
pub fn timestamp_stem(taken_at: Option<i64>) -> Option<String> {
    let ts = taken_at?;
    DateTime::<Utc>::from_timestamp(ts, 0).map(|dt| dt.format("%Y-%m-%d_%H-%M-%S_UTC").to_string())
}

/// First free `<stem>.<ext>`, `<stem>_2.<ext>`, ... in `dir`
fn unique_path(dir: &Path, stem: &str, ext: &str) -> PathBuf {
    let first = dir.join(format!("{stem}.{ext}"));
    if !first.exists() {
        return first;
    }
    (2..)
        .map(|n| dir.join(format!("{stem}_{n}.{ext}")))
        .find(|p| !p.exists())
        .unwrap_or(first)
}

/// Download post media into `dir`; carousel items get a 1-based index suffix.
///
/// # Errors
///
/// Returns the first download or file error.
pub fn write_post_media(
    client: &mut dyn PlatformClient,
    dir: &Path,
    stem: &str,
    media: &[MediaResource],
) -> Result<usize, PlatformError> {
    let indexed = media.len() > 1;
    for (i, resource) in media.iter().enumerate() {
        let name = if indexed {
            format!("{stem}_{}", i + 1)
        } else {
            stem.to_string()
        };
        let dest = unique_path(dir, &name, resource.kind.extension());
        let bytes = client.download(resource, &dest)?;
        debug!(file = %dest.display(), bytes, "Media written");
    }
    Ok(media.len())
}

/// Download story items into `dir`, one file per item.
///
/// # Errors
///
/// Returns the first download or file error.
pub fn write_story_items(
    client: &mut dyn PlatformClient,
    dir: &Path,
    items: &[StoryItem],
) -> Result<usize, PlatformError> {
    for item in items {
        let stem = timestamp_stem(item.taken_at).unwrap_or_else(|| sanitize_component(&item.id));
        let dest = unique_path(dir, &stem, item.media.kind.extension());
        client.download(&item.media, &dest)?;
    }
    Ok(items.len())
}

/// Write every highlight into its own `highlight_<id>` subfolder of `root`.
///
/// Returns the total number of items written.
///
/// # Errors
///
/// Returns the first download or file error.
pub fn write_highlights(
    client: &mut dyn PlatformClient,
    root: &Path,
    highlights: &[Highlight],
) -> Result<usize, PlatformError> {
    let mut total = 0;
    for highlight in highlights {
        let dir = root.join(format!(
            "highlight_{}",
            sanitize_component(&highlight.unique_id)
        ));
        fs::create_dir_all(&dir)?;
        total += write_story_items(client, &dir, &highlight.items)?;
    }
    Ok(total)
}

/// Compress every direct subfolder of `root` into a sibling `<name>.zip`.
///
/// Entries are stored relative to the subfolder root. Returns the archive
/// paths in lexicographic order.
///
/// # Errors
///
/// Returns an error if a folder cannot be read or an archive cannot be written.
pub fn archive_subfolders(root: &Path) -> zip::result::ZipResult<Vec<PathBuf>> {
    let mut folders: Vec<PathBuf> = fs::read_dir(root)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_dir())
        .collect();
    folders.sort();

    let mut archives = Vec::with_capacity(folders.len());
    for folder in folders {
        let archive = folder.with_extension("zip");
        zip_folder(&folder, &archive)?;
        archives.push(archive);
    }
    Ok(archives)
}

/// Write all files under `folder` into a deflated archive at `dest`.
///
/// # Errors
///
/// Returns an error if reading a file or writing the archive fails.
pub fn zip_folder(folder: &Path, dest: &Path) -> zip::result::ZipResult<()> {
    let mut files = Vec::new();
    walk(folder, &mut files)?;
    files.sort();

    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut writer = ZipWriter::new(File::create(dest)?);

    for path in files {
        let Ok(relative) = path.strip_prefix(folder) else {
            continue;
        };
        let name = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        writer.start_file(name, options)?;
        io::copy(&mut File::open(&path)?, &mut writer)?;
    }

    writer.finish()?;
    debug!(archive = %dest.display(), "Archive written");
    Ok(())
}
