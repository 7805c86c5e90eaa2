//! Package source abstraction and loose-folder discovery for pakscan.
//!
//! Archive containers, decompression and decryption live outside the
//! analyzer; this crate is the seam where already-loaded bytes come in.

pub mod folder;
pub mod memory;

use pakscan_core::error::PakResult;
use pakscan_core::{ArchiveSummary, InputFile};

pub use folder::{Discovery, FolderSource};
pub use memory::MemorySource;

/// Abstraction for fetching one package's bytes from any backing store.
///
/// Called concurrently from the scan pool, hence `Send + Sync`.
pub trait PackageSource: Send + Sync {
    fn read_package(&self, file: &InputFile, archive: &ArchiveSummary) -> PakResult<Vec<u8>>;
}

/// File extensions that hold a package header.
pub const PACKAGE_EXTENSIONS: &[&str] = &["uasset", "umap"];

/// True for `.uasset` / `.umap` paths (case-insensitive).
pub fn is_package_file(path: &str) -> bool {
    path.rsplit_once('.').is_some_and(|(_, ext)| {
        PACKAGE_EXTENSIONS
            .iter()
            .any(|known| ext.eq_ignore_ascii_case(known))
    })
}
