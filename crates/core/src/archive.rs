//! Records supplied by the archive-loading layer.
//!
//! Read-only to the analyzer: they say where a package's bytes live, not
//! what the bytes mean.

use crate::error::PakError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Raw entry metadata as recorded by the owning archive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryMeta {
    pub offset: u64,
    pub size: u64,
    pub uncompressed_size: u64,
    /// Patch archives mark removed files with a delete record.
    pub is_delete_record: bool,
}

/// One package file inside an archive (or a mounted folder).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputFile {
    /// Index into the archive summary list. May be stale.
    pub owner_archive: usize,
    /// Path relative to the archive mount point.
    pub path: String,
    pub entry: EntryMeta,
}

impl InputFile {
    pub fn new(owner_archive: usize, path: impl Into<String>, entry: EntryMeta) -> Self {
        Self {
            owner_archive,
            path: path.into(),
            entry,
        }
    }

    /// Long package name: mount point + relative path without extension.
    ///
    /// `Characters\Hero.uasset` under `/Game/` becomes `/Game/Characters/Hero`.
    pub fn long_package_name(&self, archive: &ArchiveSummary) -> String {
        let normalized = self.path.replace('\\', "/");
        let relative = normalized.trim_start_matches('/');
        let stem = match relative.rsplit_once('.') {
            Some((stem, ext)) if !ext.contains('/') => stem,
            _ => relative,
        };
        let mount = archive.mount_point.trim_end_matches('/');
        format!("{mount}/{stem}")
    }
}

/// Per-archive metadata needed to locate and interpret its files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveSummary {
    /// Archive file, or the root directory for a loose cooked folder.
    pub path: String,
    /// Package-name prefix for files in this archive, e.g. `/Game/`.
    pub mount_point: String,
    pub version: i32,
    pub decryption_key: Option<AesKey>,
}

impl ArchiveSummary {
    pub fn new(path: impl Into<String>, mount_point: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            mount_point: mount_point.into(),
            version: 0,
            decryption_key: None,
        }
    }

    pub fn with_version(mut self, version: i32) -> Self {
        self.version = version;
        self
    }

    pub fn with_key(mut self, key: AesKey) -> Self {
        self.decryption_key = Some(key);
        self
    }
}

/// 256-bit archive key. Carried along for the loading layer, never used
/// by the analyzer.
#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AesKey(pub [u8; 32]);

impl fmt::Debug for AesKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AesKey(..)")
    }
}

impl FromStr for AesKey {
    type Err = PakError;

    /// Parses 64 hex digits, with or without a `0x` prefix.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s
            .trim()
            .strip_prefix("0x")
            .or_else(|| s.trim().strip_prefix("0X"))
            .unwrap_or(s.trim());
        let bytes = hex::decode(digits)
            .map_err(|e| PakError::InvalidInput(format!("AES key is not valid hex: {e}")))?;
        let key: [u8; 32] = bytes.try_into().map_err(|b: Vec<u8>| {
            PakError::InvalidInput(format!("AES key must be 32 bytes, got {}", b.len()))
        })?;
        Ok(AesKey(key))
    }
}
