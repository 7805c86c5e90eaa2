//! Domain types for decoded packages and their dependency edges.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::fmt;

// ---------------------------------------------------------------------------
// References
// ---------------------------------------------------------------------------

/// Typed slot reference inside one package.
///
/// On the wire this is a signed `i32`: `0` is null, positive values are
/// `export slot + 1`, negative values are `-(import slot + 1)`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PackageIndex {
    #[default]
    Null,
    Import(u32),
    Export(u32),
}

impl PackageIndex {
    #[inline]
    pub fn from_raw(raw: i32) -> Self {
        match raw {
            0 => PackageIndex::Null,
            n if n > 0 => PackageIndex::Export((n - 1) as u32),
            // -(n + 1) cannot overflow for any negative i32.
            n => PackageIndex::Import((-(n + 1)) as u32),
        }
    }

    /// Wire encoding of this index, or `None` when the slot has no `i32`
    /// encoding (exports above `i32::MAX - 1`, imports above `i32::MAX`).
    #[inline]
    pub fn to_raw(self) -> Option<i32> {
        match self {
            PackageIndex::Null => Some(0),
            PackageIndex::Export(slot) => i32::try_from(slot).ok()?.checked_add(1),
            PackageIndex::Import(slot) => i32::try_from(slot).ok().map(|s| -s - 1),
        }
    }

    #[inline]
    pub fn is_null(self) -> bool {
        matches!(self, PackageIndex::Null)
    }
}

impl fmt::Display for PackageIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PackageIndex::Null => f.write_str("null"),
            PackageIndex::Import(slot) => write!(f, "import#{slot}"),
            PackageIndex::Export(slot) => write!(f, "export#{slot}"),
        }
    }
}

/// Per-export list of raw dependency references.
///
/// Most exports depend on a handful of objects, so eight inline slots
/// avoid a heap allocation in the common case.
pub type DependsList = SmallVec<[PackageIndex; 8]>;

/// Outcome of resolving a [`PackageIndex`] against one package's tables.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectRef {
    /// No reference; renders as the empty path.
    Null,
    /// Slot outside its table. Treated as a no-op edge.
    Unresolved(PackageIndex),
    Path(String),
}

impl ObjectRef {
    pub fn as_path(&self) -> Option<&str> {
        match self {
            ObjectRef::Path(p) => Some(p),
            _ => None,
        }
    }

    /// Path text, empty for null and unresolved references.
    pub fn into_path_string(self) -> String {
        match self {
            ObjectRef::Path(p) => p,
            _ => String::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tables
// ---------------------------------------------------------------------------

/// An object defined outside the current package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectImport {
    pub index: u32,
    pub object_name: String,
    pub class_package: String,
    pub class_name: String,
    pub outer_index: PackageIndex,
    /// Owning package, only serialized in editor packages.
    pub package_name: Option<String>,
    pub import_optional: bool,
}

impl ObjectImport {
    /// True when the import denotes a whole package rather than a class,
    /// function or sub-object.
    pub fn is_package(&self) -> bool {
        self.class_name == "Package" && self.outer_index.is_null()
    }
}

/// Preload dependency ranges recorded on an export entry.
///
/// `first` indexes the package's preload-dependency table; the four
/// counts are laid out back to back in declaration order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreloadRanges {
    pub first: i32,
    pub serialize_before_serialize: i32,
    pub create_before_serialize: i32,
    pub serialize_before_create: i32,
    pub create_before_create: i32,
}

impl PreloadRanges {
    pub fn is_empty(&self) -> bool {
        self.first < 0 || self.total() == 0
    }

    pub fn total(&self) -> i64 {
        i64::from(self.serialize_before_serialize)
            + i64::from(self.create_before_serialize)
            + i64::from(self.serialize_before_create)
            + i64::from(self.create_before_create)
    }

    /// The four categories with their counts, in table order.
    pub fn categories(&self) -> [(DependencyQualifier, i32); 4] {
        [
            (
                DependencyQualifier::SerializeBeforeSerialize,
                self.serialize_before_serialize,
            ),
            (
                DependencyQualifier::CreateBeforeSerialize,
                self.create_before_serialize,
            ),
            (
                DependencyQualifier::SerializeBeforeCreate,
                self.serialize_before_create,
            ),
            (
                DependencyQualifier::CreateBeforeCreate,
                self.create_before_create,
            ),
        ]
    }
}

/// An object defined inside the current package.
///
/// `object_path` and `class_path` are filled by the resolver; everything
/// else comes straight from the export entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectExport {
    pub index: u32,
    pub object_name: String,
    pub object_path: String,
    pub class_path: String,
    pub class_index: PackageIndex,
    pub super_index: PackageIndex,
    pub template_index: PackageIndex,
    pub outer_index: PackageIndex,
    pub object_flags: u32,
    pub serial_size: i64,
    pub serial_offset: i64,
    pub is_asset: bool,
    pub not_for_client: bool,
    pub not_for_server: bool,
    pub is_inherited_instance: bool,
    pub generate_public_hash: bool,
    pub package_flags: u32,
    pub preload: PreloadRanges,
    pub script_serialization_start_offset: i64,
    pub script_serialization_end_offset: i64,
}

// ---------------------------------------------------------------------------
// Dependencies
// ---------------------------------------------------------------------------

/// Why a preload edge exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DependencyQualifier {
    SerializeBeforeSerialize,
    CreateBeforeSerialize,
    SerializeBeforeCreate,
    CreateBeforeCreate,
}

impl DependencyQualifier {
    pub fn as_str(self) -> &'static str {
        match self {
            DependencyQualifier::SerializeBeforeSerialize => "serialize-before-serialize",
            DependencyQualifier::CreateBeforeSerialize => "create-before-serialize",
            DependencyQualifier::SerializeBeforeCreate => "serialize-before-create",
            DependencyQualifier::CreateBeforeCreate => "create-before-create",
        }
    }
}

impl fmt::Display for DependencyQualifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "preload: {}", self.as_str())
    }
}

/// What a dependency target points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TargetKind {
    /// An import that denotes another package.
    Package,
    /// Any other import (class, function, sub-object).
    Import,
    /// An object of the same package.
    Export,
}

/// One dependency edge. Several records may share a target.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DependencyRecord {
    pub target: String,
    pub target_kind: TargetKind,
    pub qualifier: Option<DependencyQualifier>,
}

impl DependencyRecord {
    pub fn new(target: impl Into<String>, target_kind: TargetKind) -> Self {
        Self {
            target: target.into(),
            target_kind,
            qualifier: None,
        }
    }

    pub fn with_qualifier(mut self, qualifier: DependencyQualifier) -> Self {
        self.qualifier = Some(qualifier);
        self
    }
}

// ---------------------------------------------------------------------------
// Header
// ---------------------------------------------------------------------------

/// 128-bit identifier stored as raw bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Guid(pub [u8; 16]);

impl fmt::Display for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode_upper(self.0))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomVersion {
    pub key: Guid,
    pub version: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Generation {
    pub export_count: i32,
    pub name_count: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineVersion {
    pub major: u16,
    pub minor: u16,
    pub patch: u16,
    pub changelist: u32,
    pub branch: String,
}

impl fmt::Display for EngineVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}-{}",
            self.major, self.minor, self.patch, self.changelist
        )?;
        if !self.branch.is_empty() {
            write!(f, "+{}", self.branch)?;
        }
        Ok(())
    }
}

/// Decoded package summary header: versions, section counts and offsets.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageHeader {
    pub tag: u32,
    pub legacy_file_version: i32,
    pub legacy_ue3_version: i32,
    pub file_version_ue4: i32,
    pub file_version_ue5: Option<i32>,
    pub file_version_licensee: i32,
    pub custom_versions: Vec<CustomVersion>,
    pub total_header_size: i32,
    pub folder_name: String,
    pub package_flags: u32,
    pub name_count: i32,
    pub name_offset: i32,
    pub soft_object_paths_count: i32,
    pub soft_object_paths_offset: i32,
    pub localization_id: Option<String>,
    pub gatherable_text_data_count: i32,
    pub gatherable_text_data_offset: i32,
    pub export_count: i32,
    pub export_offset: i32,
    pub import_count: i32,
    pub import_offset: i32,
    pub depends_offset: i32,
    pub soft_package_references_count: i32,
    pub soft_package_references_offset: i32,
    pub searchable_names_offset: i32,
    pub thumbnail_table_offset: i32,
    pub guid: Guid,
    pub persistent_guid: Option<Guid>,
    pub owner_persistent_guid: Option<Guid>,
    pub generations: Vec<Generation>,
    pub saved_by_engine_version: EngineVersion,
    pub compatible_with_engine_version: EngineVersion,
    pub compression_flags: u32,
    pub package_source: u32,
    pub additional_packages_to_cook: Vec<String>,
    pub asset_registry_data_offset: i32,
    pub bulk_data_start_offset: i64,
    pub world_tile_info_data_offset: i32,
    pub chunk_ids: Vec<i32>,
    pub preload_dependency_count: i32,
    pub preload_dependency_offset: i32,
    pub names_referenced_from_export_data_count: i32,
    pub payload_toc_offset: i64,
    pub data_resource_offset: i32,
}

/// Package flag set on cooked packages with editor-only data stripped.
pub const PKG_FILTER_EDITOR_ONLY: u32 = 0x8000_0000;

impl PackageHeader {
    /// True for cooked packages; editor packages carry extra summary and
    /// import fields.
    pub fn is_filter_editor_only(&self) -> bool {
        self.package_flags & PKG_FILTER_EDITOR_ONLY != 0
    }
}

// ---------------------------------------------------------------------------
// Summary
// ---------------------------------------------------------------------------

/// Independently decoded sections of a package.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Section {
    Names,
    Imports,
    Exports,
    Depends,
    SoftPackageReferences,
    PreloadDependencies,
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Section::Names => "names",
            Section::Imports => "imports",
            Section::Exports => "exports",
            Section::Depends => "depends",
            Section::SoftPackageReferences => "soft package references",
            Section::PreloadDependencies => "preload dependencies",
        })
    }
}

/// A section that failed to decode, fully or part way through.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionDiagnostic {
    pub section: Section,
    pub error: crate::error::DecodeError,
}

/// Everything extracted from one package file.
///
/// Built once by the reader and extractor; `dependents` is the only field
/// written after that, by the cross-file aggregation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetSummary {
    /// Long package name, e.g. `/Game/Characters/Hero`.
    pub package_name: String,
    pub header: PackageHeader,
    pub names: Vec<String>,
    pub imports: Vec<ObjectImport>,
    pub exports: Vec<ObjectExport>,
    /// Raw depends map, one list per export slot.
    pub depends: Vec<DependsList>,
    pub soft_package_references: Vec<String>,
    pub preload_dependencies: Vec<PackageIndex>,
    /// Forward edges: objects this package needs.
    pub dependencies: Vec<DependencyRecord>,
    /// Reverse edges: packages that need this one.
    pub dependents: Vec<DependencyRecord>,
    pub diagnostics: Vec<SectionDiagnostic>,
}

impl AssetSummary {
    /// True when at least one section failed to decode.
    pub fn is_degraded(&self) -> bool {
        !self.diagnostics.is_empty()
    }

    pub fn section_failed(&self, section: Section) -> bool {
        self.diagnostics.iter().any(|d| d.section == section)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn package_index_raw_encoding() {
        assert_eq!(PackageIndex::from_raw(0), PackageIndex::Null);
        assert_eq!(PackageIndex::from_raw(1), PackageIndex::Export(0));
        assert_eq!(PackageIndex::from_raw(7), PackageIndex::Export(6));
        assert_eq!(PackageIndex::from_raw(-1), PackageIndex::Import(0));
        assert_eq!(PackageIndex::from_raw(-5), PackageIndex::Import(4));
    }

    #[test]
    fn package_index_raw_extremes_do_not_overflow() {
        assert_eq!(
            PackageIndex::from_raw(i32::MIN),
            PackageIndex::Import(i32::MAX as u32)
        );
        assert_eq!(
            PackageIndex::from_raw(i32::MAX),
            PackageIndex::Export((i32::MAX - 1) as u32)
        );
    }

    #[test]
    fn package_index_to_raw_matches_from_raw() {
        for raw in [-300, -2, -1, 0, 1, 2, 300] {
            assert_eq!(PackageIndex::from_raw(raw).to_raw(), Some(raw));
        }
    }

    #[test]
    fn package_index_to_raw_rejects_unencodable_slots() {
        assert_eq!(PackageIndex::Export(i32::MAX as u32 - 1).to_raw(), Some(i32::MAX));
        assert_eq!(PackageIndex::Export(i32::MAX as u32).to_raw(), None);
        assert_eq!(PackageIndex::Export(u32::MAX).to_raw(), None);
        assert_eq!(PackageIndex::Import(i32::MAX as u32).to_raw(), Some(i32::MIN));
        assert_eq!(PackageIndex::Import(i32::MAX as u32 + 1).to_raw(), None);
        assert_eq!(PackageIndex::Import(u32::MAX).to_raw(), None);
    }

    #[test]
    fn filter_editor_only_flag() {
        let mut header = PackageHeader::default();
        assert!(!header.is_filter_editor_only());
        header.package_flags = PKG_FILTER_EDITOR_ONLY | 0x1;
        assert!(header.is_filter_editor_only());
    }

    #[test]
    fn package_index_display() {
        assert_eq!(PackageIndex::Null.to_string(), "null");
        assert_eq!(PackageIndex::Import(3).to_string(), "import#3");
        assert_eq!(PackageIndex::Export(0).to_string(), "export#0");
    }

    #[test]
    fn package_import_detection() {
        let mut import = ObjectImport {
            index: 0,
            object_name: "/Game/Maps/Arena".into(),
            class_package: "/Script/CoreUObject".into(),
            class_name: "Package".into(),
            outer_index: PackageIndex::Null,
            package_name: None,
            import_optional: false,
        };
        assert!(import.is_package());

        import.outer_index = PackageIndex::Import(1);
        assert!(!import.is_package());

        import.outer_index = PackageIndex::Null;
        import.class_name = "StaticMesh".into();
        assert!(!import.is_package());
    }

    #[test]
    fn qualifier_display_has_preload_prefix() {
        assert_eq!(
            DependencyQualifier::SerializeBeforeCreate.to_string(),
            "preload: serialize-before-create"
        );
    }

    #[test]
    fn preload_ranges_empty_when_first_negative() {
        let ranges = PreloadRanges {
            first: -1,
            serialize_before_serialize: 3,
            ..Default::default()
        };
        assert!(ranges.is_empty());
        assert_eq!(ranges.total(), 3);
    }

    #[test]
    fn guid_renders_as_upper_hex() {
        let mut bytes = [0u8; 16];
        bytes[0] = 0xAB;
        bytes[15] = 0x01;
        assert_eq!(
            Guid(bytes).to_string(),
            "AB000000000000000000000000000001"
        );
    }

    #[test]
    fn engine_version_display() {
        let v = EngineVersion {
            major: 4,
            minor: 27,
            patch: 2,
            changelist: 18319896,
            branch: "++UE4+Release-4.27".into(),
        };
        assert_eq!(v.to_string(), "4.27.2-18319896+++UE4+Release-4.27");
    }

    #[test]
    fn summary_serializes_to_json() {
        let summary = AssetSummary {
            package_name: "/Game/Hero".into(),
            dependencies: vec![DependencyRecord::new("/Game/Sword", TargetKind::Package)],
            ..Default::default()
        };
        let json = serde_json::to_string(&summary).unwrap();
        assert!(json.contains("/Game/Sword"));
    }
}
