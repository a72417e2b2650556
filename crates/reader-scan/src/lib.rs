//! # reader-scan
//!
//! Find ebook readers (Kindle, Kobo, PocketBook, Nook, Tolino, Onyx Boox,
//! reMarkable, Sony Reader) among the currently mounted volumes.
//!
//! ## How it works
//!
//! On every call to [`detect_readers`]:
//!
//! 1. Picks a listing strategy for the running OS (see the table below).
//! 2. Lists every candidate volume under the strategy's mount roots.
//! 3. Keeps volumes whose label contains a known reader name, compared
//!    case-insensitively with separators ignored (`SONY_READER`, `Sony Reader`
//!    and `sonyreader` all match).
//! 4. Locates the documents folder on each match and looks up free space.
//!
//! Nothing is cached: a refresh is simply another call.
//!
//! ## Platform support
//!
//! | OS      | Strategy                                            |
//! |---------|-----------------------------------------------------|
//! | macOS   | entries of `/Volumes`                               |
//! | Linux   | `/media/<user>/*`, `/run/media/<user>/*`, `/mnt/*`  |
//! | BSDs    | `/media/*`, `/mnt/*`                                |
//! | Windows | drive volume labels from the system disk list       |
//!
//! ## Failure policy
//!
//! Detection never fails. A mount root that is missing, unreadable or not a
//! directory is logged and skipped; the remaining roots are still scanned.
//!
//! ```rust,no_run
//! for reader in reader_scan::detect_readers() {
//!     println!("{reader}  →  {}", reader.documents_dir.display());
//! }
//! ```

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use sysinfo::Disks;
use thiserror::Error;
use tracing::{debug, info, warn};

// ── Vocabulary ───────────────────────────────────────────────────────────────

/// Folders readers commonly sync documents from, in lookup order.
pub const DOCUMENT_DIRS: &[&str] = &["documents", "Documents", "Books", "books", "eBooks", "ebooks"];

/// Reader families recognised from a volume label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReaderKind {
    Kindle,
    Kobo,
    PocketBook,
    Nook,
    Tolino,
    OnyxBoox,
    ReMarkable,
    SonyReader,
}

impl ReaderKind {
    pub fn display_name(&self) -> &'static str {
        match self {
            ReaderKind::Kindle => "Kindle",
            ReaderKind::Kobo => "Kobo",
            ReaderKind::PocketBook => "PocketBook",
            ReaderKind::Nook => "Nook",
            ReaderKind::Tolino => "Tolino",
            ReaderKind::OnyxBoox => "Onyx Boox",
            ReaderKind::ReMarkable => "reMarkable",
            ReaderKind::SonyReader => "Sony Reader",
        }
    }
}

/// Folded label substrings (lowercase, alphanumerics only) and the family they
/// identify. The first matching entry wins.
static VOCABULARY: &[(&str, ReaderKind)] = &[
    ("kindle", ReaderKind::Kindle),
    ("kobo", ReaderKind::Kobo),
    ("pocketbook", ReaderKind::PocketBook),
    ("nook", ReaderKind::Nook),
    ("tolino", ReaderKind::Tolino),
    ("onyx", ReaderKind::OnyxBoox),
    ("boox", ReaderKind::OnyxBoox),
    ("remarkable", ReaderKind::ReMarkable),
    ("sonyreader", ReaderKind::SonyReader),
];

/// Match a volume label against the reader vocabulary.
pub fn match_reader_label(label: &str) -> Option<ReaderKind> {
    let folded: String = label
        .chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect();

    VOCABULARY
        .iter()
        .find(|(needle, _)| folded.contains(needle))
        .map(|(_, kind)| *kind)
}

// ── Error type ───────────────────────────────────────────────────────────────

/// Errors met while scanning. They are logged by [`detect_readers`] and never
/// returned from it.
#[derive(Error, Debug)]
pub enum ScanError {
    /// A mount root exists but could not be listed.
    #[error("Cannot list mount root '{path}': {source}")]
    ReadRoot {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// No listing strategy exists for this OS.
    #[error("Unsupported platform for reader detection: {os}")]
    UnsupportedPlatform { os: String },
}

// ── Detected reader ──────────────────────────────────────────────────────────

/// One mounted ebook reader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectedReader {
    /// Volume label as reported by the OS (directory name on Unix).
    pub label: String,
    pub kind: ReaderKind,
    pub mount_point: PathBuf,
    /// Preferred export folder: a [`DOCUMENT_DIRS`] entry, else the mount root.
    pub documents_dir: PathBuf,
    /// `None` when the volume is not in the system disk list.
    pub free_space_bytes: Option<u64>,
}

impl DetectedReader {
    pub fn free_space_mb(&self) -> Option<f64> {
        self.free_space_bytes.map(|b| b as f64 / (1024.0 * 1024.0))
    }
}

impl fmt::Display for DetectedReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.free_space_mb() {
            Some(mb) => write!(f, "{} ({:.0} MB free)", self.label, mb),
            None => write!(f, "{}", self.label),
        }
    }
}

// ── Listing strategies ───────────────────────────────────────────────────────

/// A directory whose children (or grandchildren) are mounted volumes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MountRoot {
    /// Volumes are direct children, e.g. `/Volumes/Kindle`.
    Direct(PathBuf),
    /// Volumes sit one level down per user, e.g. `/media/alice/KOBOeReader`.
    PerUser(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Strategy {
    MountRoots(Vec<MountRoot>),
    DriveLabels,
}

fn detect_strategy() -> Result<Strategy, ScanError> {
    match std::env::consts::OS {
        "macos" => Ok(Strategy::MountRoots(vec![MountRoot::Direct("/Volumes".into())])),
        "linux" => Ok(Strategy::MountRoots(vec![
            MountRoot::PerUser("/media".into()),
            MountRoot::PerUser("/run/media".into()),
            MountRoot::Direct("/mnt".into()),
        ])),
        "freebsd" | "openbsd" | "netbsd" | "dragonfly" => Ok(Strategy::MountRoots(vec![
            MountRoot::Direct("/media".into()),
            MountRoot::Direct("/mnt".into()),
        ])),
        "windows" => Ok(Strategy::DriveLabels),
        os => Err(ScanError::UnsupportedPlatform { os: os.to_string() }),
    }
}

// ── Public API ───────────────────────────────────────────────────────────────

/// Detect connected ebook readers on this machine.
///
/// Returns an empty list when nothing matches or nothing is accessible.
pub fn detect_readers() -> Vec<DetectedReader> {
    let readers = match detect_strategy() {
        Ok(Strategy::MountRoots(roots)) => scan_roots(&roots),
        Ok(Strategy::DriveLabels) => scan_drive_labels(),
        Err(e) => {
            warn!("{e}");
            Vec::new()
        }
    };
    debug!("Reader scan finished: {} found", readers.len());
    readers
}

/// Scan explicit mount roots. Used by [`detect_readers`] on Unix-likes and
/// directly by callers with non-standard mount layouts.
pub fn scan_roots(roots: &[MountRoot]) -> Vec<DetectedReader> {
    let disks = Disks::new_with_refreshed_list();
    let mut readers = Vec::new();

    for root in roots {
        for volume in candidate_volumes(root) {
            let label = match volume.file_name() {
                Some(name) => name.to_string_lossy().into_owned(),
                None => continue,
            };
            let free = lookup_space(&disks, &volume);
            if let Some(reader) = classify_volume(&volume, &label, free) {
                readers.push(reader);
            }
        }
    }

    readers
}

/// Build a [`DetectedReader`] if `label` names a known reader.
pub fn classify_volume(mount_point: &Path, label: &str, free_space_bytes: Option<u64>) -> Option<DetectedReader> {
    let kind = match_reader_label(label)?;
    let documents_dir = find_documents_dir(mount_point);
    info!(
        "Detected {} reader '{}' at {}",
        kind.display_name(),
        label,
        mount_point.display()
    );
    Some(DetectedReader {
        label: label.to_string(),
        kind,
        mount_point: mount_point.to_path_buf(),
        documents_dir,
        free_space_bytes,
    })
}

/// First existing [`DOCUMENT_DIRS`] entry under `mount_point`, else the mount
/// point itself.
pub fn find_documents_dir(mount_point: &Path) -> PathBuf {
    DOCUMENT_DIRS
        .iter()
        .map(|name| mount_point.join(name))
        .find(|candidate| candidate.is_dir())
        .unwrap_or_else(|| mount_point.to_path_buf())
}

/// Bytes available to the current user on the volume holding `path`.
///
/// Picks the disk whose mount point is the longest prefix of `path`.
/// `None` when no mounted disk contains it.
pub fn available_space(path: &Path) -> Option<u64> {
    let disks = Disks::new_with_refreshed_list();
    lookup_space(&disks, path)
}

// ── Internal helpers ─────────────────────────────────────────────────────────

fn lookup_space(disks: &Disks, path: &Path) -> Option<u64> {
    let target = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
    disks
        .list()
        .iter()
        .filter(|disk| target.starts_with(disk.mount_point()))
        .max_by_key(|disk| disk.mount_point().as_os_str().len())
        .map(|disk| disk.available_space())
}

fn candidate_volumes(root: &MountRoot) -> Vec<PathBuf> {
    match root {
        MountRoot::Direct(path) => list_or_log(path),
        MountRoot::PerUser(path) => list_or_log(path)
            .iter()
            .flat_map(|user_dir| list_or_log(user_dir))
            .collect(),
    }
}

fn list_or_log(path: &Path) -> Vec<PathBuf> {
    match list_subdirs(path) {
        Ok(dirs) => dirs,
        Err(e) => {
            warn!("Skipping mount root: {e}");
            Vec::new()
        }
    }
}

/// Sub-directories of `path`, sorted. A missing `path` is an empty listing.
fn list_subdirs(path: &Path) -> Result<Vec<PathBuf>, ScanError> {
    let entries = match std::fs::read_dir(path) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!("Mount root {} does not exist", path.display());
            return Ok(Vec::new());
        }
        Err(source) => {
            return Err(ScanError::ReadRoot {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    let mut dirs: Vec<PathBuf> = entries
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry.path()),
            Err(e) => {
                debug!("Unreadable entry under {}: {e}", path.display());
                None
            }
        })
        .filter(|p| p.is_dir())
        .collect();
    dirs.sort();
    Ok(dirs)
}

fn scan_drive_labels() -> Vec<DetectedReader> {
    let disks = Disks::new_with_refreshed_list();
    disks
        .list()
        .iter()
        .filter_map(|disk| {
            let label = disk.name().to_string_lossy().into_owned();
            classify_volume(disk.mount_point(), &label, Some(disk.available_space()))
        })
        .collect()
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn vocabulary_matches_case_insensitively() {
        assert_eq!(match_reader_label("Kindle"), Some(ReaderKind::Kindle));
        assert_eq!(match_reader_label("KOBOeReader"), Some(ReaderKind::Kobo));
        assert_eq!(match_reader_label("PocketBook 740"), Some(ReaderKind::PocketBook));
        assert_eq!(match_reader_label("tolino vision"), Some(ReaderKind::Tolino));
        assert_eq!(match_reader_label("BOOX Note Air"), Some(ReaderKind::OnyxBoox));
        assert_eq!(match_reader_label("reMarkable"), Some(ReaderKind::ReMarkable));
        assert_eq!(match_reader_label("NOOK"), Some(ReaderKind::Nook));
    }

    #[test]
    fn separators_are_ignored() {
        assert_eq!(match_reader_label("SONY_READER"), Some(ReaderKind::SonyReader));
        assert_eq!(match_reader_label("Sony Reader"), Some(ReaderKind::SonyReader));
        assert_eq!(match_reader_label("sony-reader"), Some(ReaderKind::SonyReader));
    }

    #[test]
    fn unrelated_labels_do_not_match() {
        assert_eq!(match_reader_label("USB_STICK"), None);
        assert_eq!(match_reader_label("Macintosh HD"), None);
        assert_eq!(match_reader_label("Sony"), None);
        assert_eq!(match_reader_label(""), None);
    }

    #[test]
    fn scan_direct_root_keeps_only_readers() {
        let root = tempfile::tempdir().unwrap();
        fs::create_dir(root.path().join("Kindle")).unwrap();
        fs::create_dir(root.path().join("KOBOeReader")).unwrap();
        fs::create_dir(root.path().join("BACKUP")).unwrap();

        let readers = scan_roots(&[MountRoot::Direct(root.path().to_path_buf())]);
        let labels: Vec<&str> = readers.iter().map(|r| r.label.as_str()).collect();
        assert_eq!(labels, vec!["KOBOeReader", "Kindle"]);
        assert_eq!(readers[0].kind, ReaderKind::Kobo);
    }

    #[test]
    fn scan_per_user_root_descends_one_level() {
        let root = tempfile::tempdir().unwrap();
        fs::create_dir_all(root.path().join("alice").join("PocketBook")).unwrap();
        fs::create_dir_all(root.path().join("bob").join("DATA")).unwrap();

        let readers = scan_roots(&[MountRoot::PerUser(root.path().to_path_buf())]);
        assert_eq!(readers.len(), 1);
        assert_eq!(readers[0].kind, ReaderKind::PocketBook);
        assert!(readers[0].mount_point.ends_with("alice/PocketBook"));
    }

    #[test]
    fn plain_files_named_like_readers_are_skipped() {
        let root = tempfile::tempdir().unwrap();
        fs::write(root.path().join("Kindle"), b"not a mount").unwrap();

        let readers = scan_roots(&[MountRoot::Direct(root.path().to_path_buf())]);
        assert!(readers.is_empty());
    }

    #[test]
    fn broken_root_does_not_stop_the_scan() {
        let good = tempfile::tempdir().unwrap();
        fs::create_dir(good.path().join("tolino")).unwrap();

        // A regular file cannot be listed as a directory.
        let bad = tempfile::NamedTempFile::new().unwrap();

        let readers = scan_roots(&[
            MountRoot::Direct(bad.path().to_path_buf()),
            MountRoot::Direct("/definitely/not/a/mount/root".into()),
            MountRoot::Direct(good.path().to_path_buf()),
        ]);
        assert_eq!(readers.len(), 1);
        assert_eq!(readers[0].kind, ReaderKind::Tolino);
    }

    #[test]
    fn documents_dir_prefers_known_folders() {
        let mount = tempfile::tempdir().unwrap();
        assert_eq!(find_documents_dir(mount.path()), mount.path());

        fs::create_dir(mount.path().join("Books")).unwrap();
        assert_eq!(find_documents_dir(mount.path()), mount.path().join("Books"));

        fs::create_dir(mount.path().join("documents")).unwrap();
        assert_eq!(find_documents_dir(mount.path()), mount.path().join("documents"));
    }

    #[test]
    fn display_includes_free_space_when_known() {
        let reader = DetectedReader {
            label: "Kindle".into(),
            kind: ReaderKind::Kindle,
            mount_point: "/Volumes/Kindle".into(),
            documents_dir: "/Volumes/Kindle/documents".into(),
            free_space_bytes: Some(512 * 1024 * 1024),
        };
        assert_eq!(reader.to_string(), "Kindle (512 MB free)");

        let unknown = DetectedReader {
            free_space_bytes: None,
            ..reader
        };
        assert_eq!(unknown.to_string(), "Kindle");
    }

    #[test]
    fn detect_readers_does_not_panic() {
        let readers = detect_readers();
        println!("Found {} readers", readers.len());
    }
}
