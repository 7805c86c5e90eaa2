//! Loose cooked-content folder treated as a single archive.
//!
//! There is no real container here: discovery fabricates one
//! [`ArchiveSummary`] for the folder and one [`InputFile`] per package
//! found underneath it.

use crate::{is_package_file, PackageSource};
use pakscan_core::error::{PakError, PakResult};
use pakscan_core::{ArchiveSummary, EntryMeta, InputFile};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Result of walking a content folder.
#[derive(Debug, Clone)]
pub struct Discovery {
    pub archives: Vec<ArchiveSummary>,
    /// Sorted by relative path.
    pub files: Vec<InputFile>,
    /// Bytes across every file seen, packages or not.
    pub total_size: u64,
}

/// Reads packages from `archive.path / file.path` on the local disk.
#[derive(Debug, Clone, Default)]
pub struct FolderSource;

impl FolderSource {
    pub fn new() -> Self {
        Self
    }

    /// Walks `root` recursively and collects every package file.
    pub fn discover(root: impl AsRef<Path>, mount_point: &str) -> PakResult<Discovery> {
        let root = root.as_ref();
        if !root.is_dir() {
            return Err(PakError::InvalidInput(format!(
                "folder does not exist: {}",
                root.display()
            )));
        }

        tracing::info!(root = %root.display(), mount_point, "discovering packages");

        let mut files = Vec::new();
        let mut total_size = 0u64;
        let mut unreadable = 0usize;

        for entry in WalkDir::new(root).follow_links(false) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!(error = %e, "skipping unreadable directory entry");
                    unreadable += 1;
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }

            let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
            total_size += size;

            let relative = relative_path(root, entry.path());
            if !is_package_file(&relative) {
                continue;
            }

            files.push(InputFile::new(
                0,
                relative,
                EntryMeta {
                    offset: 0,
                    size,
                    uncompressed_size: size,
                    is_delete_record: false,
                },
            ));
        }

        files.sort_by(|a, b| a.path.cmp(&b.path));

        tracing::info!(
            packages = files.len(),
            total_size,
            unreadable,
            "discovery done"
        );

        Ok(Discovery {
            archives: vec![ArchiveSummary::new(
                root.to_string_lossy().into_owned(),
                mount_point,
            )],
            files,
            total_size,
        })
    }
}

impl PackageSource for FolderSource {
    fn read_package(&self, file: &InputFile, archive: &ArchiveSummary) -> PakResult<Vec<u8>> {
        let full: PathBuf = Path::new(&archive.path).join(&file.path);
        std::fs::read(&full).map_err(|e| PakError::stream(full.to_string_lossy(), e))
    }
}

/// `root`-relative path with `/` separators.
fn relative_path(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn discovers_packages_only() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("Characters")).unwrap();
        fs::write(dir.path().join("Characters/Hero.uasset"), b"hero").unwrap();
        fs::write(dir.path().join("Characters/Hero.uexp"), b"bulk").unwrap();
        fs::write(dir.path().join("Arena.umap"), b"map").unwrap();
        fs::write(dir.path().join("AssetRegistry.bin"), b"registry").unwrap();

        let found = FolderSource::discover(dir.path(), "/Game/").unwrap();
        let paths: Vec<&str> = found.files.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["Arena.umap", "Characters/Hero.uasset"]);
        assert_eq!(found.archives.len(), 1);
        assert_eq!(found.archives[0].mount_point, "/Game/");
        assert_eq!(found.total_size, 4 + 4 + 3 + 8);
        assert_eq!(found.files[1].entry.size, 4);
    }

    #[test]
    fn reads_bytes_relative_to_archive() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("Hero.uasset"), b"\x01\x02\x03").unwrap();

        let found = FolderSource::discover(dir.path(), "/Game/").unwrap();
        let bytes = FolderSource::new()
            .read_package(&found.files[0], &found.archives[0])
            .unwrap();
        assert_eq!(bytes, vec![1, 2, 3]);
    }

    #[test]
    fn missing_file_is_stream_failure() {
        let dir = tempfile::tempdir().unwrap();
        let archive = ArchiveSummary::new(dir.path().to_string_lossy(), "/Game/");
        let file = InputFile::new(0, "Gone.uasset", EntryMeta::default());
        let err = FolderSource::new().read_package(&file, &archive).unwrap_err();
        assert!(matches!(err, PakError::Stream { .. }), "{err}");
    }

    #[test]
    fn missing_root_is_invalid_input() {
        let err = FolderSource::discover("/definitely/not/here", "/Game/").unwrap_err();
        assert!(matches!(err, PakError::InvalidInput(_)));
    }
}
