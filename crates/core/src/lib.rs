//! Domain models, shared types, and error definitions.
//!
//! Foundation crate -- no threading or I/O dependencies.

pub mod archive;
pub mod arena;
pub mod error;
pub mod types;

pub use archive::{AesKey, ArchiveSummary, EntryMeta, InputFile};
pub use arena::{FileId, PackageArena};
pub use error::{DecodeError, PakError, PakResult};
pub use types::{
    AssetSummary, DependencyQualifier, DependencyRecord, DependsList, ObjectExport, ObjectImport,
    ObjectRef, PackageHeader, PackageIndex, PreloadRanges, Section, SectionDiagnostic, TargetKind,
    PKG_FILTER_EDITOR_ONLY,
};

/// Package path -> best-effort primary class name.
pub type ClassMap = std::collections::HashMap<String, String>;
