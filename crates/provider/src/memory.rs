//! In-memory package source for callers that already hold the bytes.

use crate::PackageSource;
use pakscan_core::error::{PakError, PakResult};
use pakscan_core::{ArchiveSummary, InputFile};
use std::collections::HashMap;

/// Relative path -> package bytes.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    packages: HashMap<String, Vec<u8>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl Into<String>, bytes: Vec<u8>) -> &mut Self {
        self.packages.insert(path.into(), bytes);
        self
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }
}

impl PackageSource for MemorySource {
    fn read_package(&self, file: &InputFile, _archive: &ArchiveSummary) -> PakResult<Vec<u8>> {
        self.packages
            .get(&file.path)
            .cloned()
            .ok_or_else(|| PakError::stream(&file.path, "no such package in memory source"))
    }
}
