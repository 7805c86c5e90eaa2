//! Per-file results indexed by a stable [`FileId`].
//!
//! Callers hold ids, not summaries, so nothing needs shared ownership.

use crate::archive::InputFile;
use crate::error::{PakError, PakResult};
use crate::types::AssetSummary;
use serde::{Deserialize, Serialize};

/// Position of a file in the scan input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FileId(pub usize);

/// Input files paired with their (optional) decoded summaries.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PackageArena {
    files: Vec<InputFile>,
    summaries: Vec<Option<AssetSummary>>,
}

impl PackageArena {
    pub fn from_parts(
        files: Vec<InputFile>,
        summaries: Vec<Option<AssetSummary>>,
    ) -> PakResult<Self> {
        if files.len() != summaries.len() {
            return Err(PakError::InvalidInput(format!(
                "{} files but {} summary slots",
                files.len(),
                summaries.len()
            )));
        }
        Ok(Self { files, summaries })
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn file(&self, id: FileId) -> Option<&InputFile> {
        self.files.get(id.0)
    }

    pub fn summary(&self, id: FileId) -> Option<&AssetSummary> {
        self.summaries.get(id.0).and_then(Option::as_ref)
    }

    /// Finds the file whose decoded package carries `package_name`.
    pub fn find_package(&self, package_name: &str) -> Option<FileId> {
        self.summaries
            .iter()
            .position(|s| s.as_ref().is_some_and(|s| s.package_name == package_name))
            .map(FileId)
    }

    pub fn iter(&self) -> impl Iterator<Item = (FileId, &InputFile, Option<&AssetSummary>)> {
        self.files
            .iter()
            .zip(&self.summaries)
            .enumerate()
            .map(|(i, (file, summary))| (FileId(i), file, summary.as_ref()))
    }

    pub fn summaries(&self) -> impl Iterator<Item = &AssetSummary> {
        self.summaries.iter().flatten()
    }

    pub fn summary_slots(&self) -> &[Option<AssetSummary>] {
        &self.summaries
    }

    pub fn summary_slots_mut(&mut self) -> &mut [Option<AssetSummary>] {
        &mut self.summaries
    }

    pub fn parsed_count(&self) -> usize {
        self.summaries.iter().filter(|s| s.is_some()).count()
    }

    pub fn into_parts(self) -> (Vec<InputFile>, Vec<Option<AssetSummary>>) {
        (self.files, self.summaries)
    }
}
