//! Encoder for synthetic packages.
//!
//! Produces bytes in the layout [`crate::reader`] decodes: header, names,
//! imports, depends map, soft references, preload table and, last, the
//! export table. Exports go last so a truncated buffer cuts into the
//! export table without touching the other sections.
//!
//! ```ignore
//! let mut b = PackageBuilder::new();
//! let mesh = b.import_class("/Script/Engine", "StaticMesh");
//! let rock = b.import_package("/Game/Props/Rock");
//! b.export(ExportSpec::new("Cliff").class(mesh).asset().depends([rock]));
//! let bytes = b.build();
//! ```

use crate::reader::header::{
    ue5_at_least, LEGACY_VERSION_UE4, LEGACY_VERSION_UE5, MAX_FILE_VERSION_UE4,
    MAX_FILE_VERSION_UE5, PACKAGE_FILE_TAG, UE4_ADDED_PACKAGE_OWNER,
    UE4_NON_OUTER_PACKAGE_IMPORT, UE5_ADD_SOFTOBJECTPATH_LIST, UE5_DATA_RESOURCES,
    UE5_NAMES_REFERENCED_FROM_EXPORT_DATA, UE5_OPTIONAL_RESOURCES, UE5_PAYLOAD_TOC,
    UE5_REMOVE_OBJECT_EXPORT_PACKAGE_GUID, UE5_SCRIPT_SERIALIZATION_OFFSET,
    UE5_TRACK_OBJECT_EXPORT_IS_INHERITED,
};
use pakscan_core::{DependencyQualifier, PackageIndex, PKG_FILTER_EDITOR_ONLY};
use std::collections::HashMap;

/// Localization id written into editor package headers.
pub const EDITOR_LOCALIZATION_ID: &str = "9C1E4B7A2D5F8E3B";
pub const PERSISTENT_GUID: [u8; 16] = [0x7E; 16];
pub const OWNER_PERSISTENT_GUID: [u8; 16] = [0x0E; 16];

/// Export entry description.
#[derive(Debug, Clone)]
pub struct ExportSpec {
    name: String,
    class: PackageIndex,
    outer: PackageIndex,
    object_flags: u32,
    serial_size: i64,
    serial_offset: i64,
    is_asset: bool,
    not_for_client: bool,
    not_for_server: bool,
    depends: Vec<PackageIndex>,
    preload: [Vec<PackageIndex>; 4],
}

impl ExportSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            class: PackageIndex::Null,
            outer: PackageIndex::Null,
            object_flags: 0x1,
            serial_size: 0,
            serial_offset: 0,
            is_asset: false,
            not_for_client: false,
            not_for_server: false,
            depends: Vec::new(),
            preload: Default::default(),
        }
    }

    pub fn class(mut self, class: PackageIndex) -> Self {
        self.class = class;
        self
    }

    pub fn outer(mut self, outer: PackageIndex) -> Self {
        self.outer = outer;
        self
    }

    pub fn asset(mut self) -> Self {
        self.is_asset = true;
        self
    }

    pub fn not_for_client(mut self) -> Self {
        self.not_for_client = true;
        self
    }

    pub fn not_for_server(mut self) -> Self {
        self.not_for_server = true;
        self
    }

    pub fn serial(mut self, offset: i64, size: i64) -> Self {
        self.serial_offset = offset;
        self.serial_size = size;
        self
    }

    pub fn depends(mut self, depends: impl IntoIterator<Item = PackageIndex>) -> Self {
        self.depends.extend(depends);
        self
    }

    pub fn preload(
        mut self,
        qualifier: DependencyQualifier,
        targets: impl IntoIterator<Item = PackageIndex>,
    ) -> Self {
        let slot = match qualifier {
            DependencyQualifier::SerializeBeforeSerialize => 0,
            DependencyQualifier::CreateBeforeSerialize => 1,
            DependencyQualifier::SerializeBeforeCreate => 2,
            DependencyQualifier::CreateBeforeCreate => 3,
        };
        self.preload[slot].extend(targets);
        self
    }
}

#[derive(Debug, Clone)]
struct ImportSpec {
    class_package: String,
    class_name: String,
    outer: PackageIndex,
    object_name: String,
}

#[derive(Debug, Clone, Copy, Default)]
struct Offsets {
    name: i32,
    import: i32,
    export: i32,
    depends: i32,
    soft_refs: i32,
    preload: i32,
    preload_count: i32,
    total: i32,
}

/// Builds package bytes from imports and exports.
#[derive(Debug, Clone)]
pub struct PackageBuilder {
    legacy_file_version: i32,
    file_version_ue4: i32,
    file_version_ue5: i32,
    editor: bool,
    compression_flags: u32,
    folder_name: String,
    names: Vec<String>,
    name_slots: HashMap<String, i32>,
    imports: Vec<ImportSpec>,
    exports: Vec<ExportSpec>,
    soft_refs: Vec<String>,
    name_offset_override: Option<i32>,
    export_count_override: Option<i32>,
}

impl Default for PackageBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PackageBuilder {
    pub fn new() -> Self {
        Self {
            legacy_file_version: LEGACY_VERSION_UE4,
            file_version_ue4: MAX_FILE_VERSION_UE4,
            file_version_ue5: MAX_FILE_VERSION_UE5,
            editor: false,
            compression_flags: 0,
            folder_name: "None".into(),
            names: Vec::new(),
            name_slots: HashMap::new(),
            imports: Vec::new(),
            exports: Vec::new(),
            soft_refs: Vec::new(),
            name_offset_override: None,
            export_count_override: None,
        }
    }

    /// Writes a UE5 header at the newest supported UE5 object version.
    pub fn ue5(mut self) -> Self {
        self.legacy_file_version = LEGACY_VERSION_UE5;
        self
    }

    /// Writes a UE5 header at `version`, with the fields that version has.
    pub fn file_version_ue5(mut self, version: i32) -> Self {
        self.legacy_file_version = LEGACY_VERSION_UE5;
        self.file_version_ue5 = version;
        self
    }

    /// Writes an editor package: `FilterEditorOnly` cleared, so the header
    /// carries a localization id and persistent guids and imports carry
    /// their package name.
    pub fn editor(mut self) -> Self {
        self.editor = true;
        self.intern("None");
        self
    }

    pub fn legacy_file_version(mut self, version: i32) -> Self {
        self.legacy_file_version = version;
        self
    }

    pub fn file_version_ue4(mut self, version: i32) -> Self {
        self.file_version_ue4 = version;
        self
    }

    pub fn compression_flags(mut self, flags: u32) -> Self {
        self.compression_flags = flags;
        self
    }

    /// Header name offset to write instead of the real one.
    pub fn name_offset_override(mut self, offset: i32) -> Self {
        self.name_offset_override = Some(offset);
        self
    }

    /// Header export count to write instead of the real one.
    pub fn export_count_override(mut self, count: i32) -> Self {
        self.export_count_override = Some(count);
        self
    }

    fn written_ue5(&self) -> Option<i32> {
        (self.legacy_file_version <= LEGACY_VERSION_UE5).then_some(self.file_version_ue5)
    }

    fn ue5_at_least(&self, version: i32) -> bool {
        ue5_at_least(self.written_ue5(), version)
    }

    fn imports_carry_package_name(&self) -> bool {
        self.editor && self.file_version_ue4 >= UE4_NON_OUTER_PACKAGE_IMPORT
    }

    fn intern(&mut self, name: &str) -> i32 {
        if let Some(&slot) = self.name_slots.get(name) {
            return slot;
        }
        let slot = self.names.len() as i32;
        self.names.push(name.to_string());
        self.name_slots.insert(name.to_string(), slot);
        slot
    }

    pub fn import_object(
        &mut self,
        class_package: &str,
        class_name: &str,
        outer: PackageIndex,
        object_name: &str,
    ) -> PackageIndex {
        self.intern(class_package);
        self.intern(class_name);
        self.intern(object_name);
        self.imports.push(ImportSpec {
            class_package: class_package.into(),
            class_name: class_name.into(),
            outer,
            object_name: object_name.into(),
        });
        PackageIndex::Import(self.imports.len() as u32 - 1)
    }

    /// Import that denotes a whole package.
    pub fn import_package(&mut self, package_name: &str) -> PackageIndex {
        self.import_object(
            "/Script/CoreUObject",
            "Package",
            PackageIndex::Null,
            package_name,
        )
    }

    /// Class import plus the script package that owns it.
    pub fn import_class(&mut self, script_package: &str, class_name: &str) -> PackageIndex {
        let outer = self.import_package(script_package);
        self.import_object("/Script/CoreUObject", "Class", outer, class_name)
    }

    pub fn export(&mut self, spec: ExportSpec) -> PackageIndex {
        self.intern(&spec.name);
        self.exports.push(spec);
        PackageIndex::Export(self.exports.len() as u32 - 1)
    }

    pub fn soft_reference(&mut self, package_name: &str) -> &mut Self {
        self.intern(package_name);
        self.soft_refs.push(package_name.into());
        self
    }

    /// # Panics
    ///
    /// When an import, export or depends entry holds a slot with no `i32`
    /// wire encoding.
    pub fn build(&self) -> Vec<u8> {
        let header_len = self.write_header(&Offsets::default()).len();

        let names = self.write_names();
        let imports = self.write_imports();
        let depends = self.write_depends();
        let soft_refs = self.write_soft_refs();
        let (preload, first_preload) = self.write_preload();
        let exports = self.write_exports(&first_preload);

        let mut offsets = Offsets::default();
        let mut at = header_len;
        let mut place = |len: usize| {
            let offset = at as i32;
            at += len;
            offset
        };
        offsets.name = place(names.len());
        offsets.import = place(imports.len());
        offsets.depends = place(depends.len());
        offsets.soft_refs = place(soft_refs.len());
        offsets.preload = place(preload.len());
        offsets.export = place(exports.len());
        offsets.preload_count = (preload.len() / 4) as i32;
        offsets.total = at as i32;

        let mut out = self.write_header(&offsets);
        debug_assert_eq!(out.len(), header_len);
        for section in [names, imports, depends, soft_refs, preload, exports] {
            out.extend_from_slice(&section);
        }
        out
    }

    fn write_header(&self, offsets: &Offsets) -> Vec<u8> {
        let mut w = ByteWriter::default();
        w.u32(PACKAGE_FILE_TAG);
        w.i32(self.legacy_file_version);
        w.i32(864); // legacy UE3 version
        w.i32(self.file_version_ue4);
        if let Some(ue5) = self.written_ue5() {
            w.i32(ue5);
        }
        w.i32(0); // licensee

        // One custom version entry.
        w.i32(1);
        w.bytes(&[0x29; 16]);
        w.i32(3);

        w.i32(offsets.total);
        w.fstring(&self.folder_name);
        w.u32(if self.editor { 0 } else { PKG_FILTER_EDITOR_ONLY });

        w.i32(self.names.len() as i32);
        w.i32(self.name_offset_override.unwrap_or(offsets.name));
        if self.ue5_at_least(UE5_ADD_SOFTOBJECTPATH_LIST) {
            // Empty soft object path list, placed where the imports start.
            w.i32(0);
            w.i32(offsets.import);
        }
        if self.editor {
            w.fstring(EDITOR_LOCALIZATION_ID);
        }
        w.i32(0); // gatherable text data
        w.i32(0);
        w.i32(
            self.export_count_override
                .unwrap_or(self.exports.len() as i32),
        );
        w.i32(offsets.export);
        w.i32(self.imports.len() as i32);
        w.i32(offsets.import);
        w.i32(offsets.depends);
        w.i32(self.soft_refs.len() as i32);
        w.i32(offsets.soft_refs);
        w.i32(0); // searchable names
        w.i32(0); // thumbnail table

        w.bytes(&[0x5A; 16]); // package guid
        if self.editor && self.file_version_ue4 >= UE4_ADDED_PACKAGE_OWNER {
            w.bytes(&PERSISTENT_GUID);
            if self.file_version_ue4 < UE4_NON_OUTER_PACKAGE_IMPORT {
                w.bytes(&OWNER_PERSISTENT_GUID);
            }
        }
        w.i32(1);
        w.i32(self.exports.len() as i32);
        w.i32(self.names.len() as i32);

        for _ in 0..2 {
            w.u16(4);
            w.u16(27);
            w.u16(2);
            w.u32(18_319_896);
            w.fstring("++UE4+Release-4.27");
        }

        w.u32(self.compression_flags);
        w.i32(0); // compressed chunks
        w.u32(0x1234_5678); // package source
        w.i32(0); // additional packages to cook
        w.i32(0); // asset registry data
        w.i64(i64::from(offsets.total)); // bulk data start
        w.i32(0); // world tile info
        w.i32(1); // chunk ids
        w.i32(0);
        w.i32(offsets.preload_count);
        w.i32(if offsets.preload_count > 0 {
            offsets.preload
        } else {
            -1
        });
        if self.ue5_at_least(UE5_NAMES_REFERENCED_FROM_EXPORT_DATA) {
            w.i32(self.names.len() as i32);
        }
        if self.ue5_at_least(UE5_PAYLOAD_TOC) {
            w.i64(-1);
        }
        if self.ue5_at_least(UE5_DATA_RESOURCES) {
            w.i32(-1);
        }
        w.0
    }

    fn write_names(&self) -> Vec<u8> {
        let mut w = ByteWriter::default();
        for name in &self.names {
            w.fstring(name);
            w.u16(0);
            w.u16(0);
        }
        w.0
    }

    fn write_imports(&self) -> Vec<u8> {
        let mut w = ByteWriter::default();
        for import in &self.imports {
            w.fname(self.name_slots[&import.class_package]);
            w.fname(self.name_slots[&import.class_name]);
            w.index(import.outer);
            w.fname(self.name_slots[&import.object_name]);
            if self.imports_carry_package_name() {
                w.fname(self.name_slots["None"]);
            }
            if self.ue5_at_least(UE5_OPTIONAL_RESOURCES) {
                w.u32(0); // optional import
            }
        }
        w.0
    }

    fn write_depends(&self) -> Vec<u8> {
        let mut w = ByteWriter::default();
        for export in &self.exports {
            w.i32(export.depends.len() as i32);
            for &dep in &export.depends {
                w.index(dep);
            }
        }
        w.0
    }

    fn write_soft_refs(&self) -> Vec<u8> {
        let mut w = ByteWriter::default();
        for name in &self.soft_refs {
            w.fname(self.name_slots[name]);
        }
        w.0
    }

    /// Flat preload table and each export's first slot in it.
    fn write_preload(&self) -> (Vec<u8>, Vec<i32>) {
        let mut w = ByteWriter::default();
        let mut written = 0i32;
        let mut first = Vec::with_capacity(self.exports.len());
        for export in &self.exports {
            if export.preload.iter().all(Vec::is_empty) {
                first.push(-1);
                continue;
            }
            first.push(written);
            for dep in export.preload.iter().flatten() {
                w.index(*dep);
                written += 1;
            }
        }
        (w.0, first)
    }

    fn write_exports(&self, first_preload: &[i32]) -> Vec<u8> {
        let mut w = ByteWriter::default();
        for (export, &first) in self.exports.iter().zip(first_preload) {
            w.index(export.class);
            w.index(PackageIndex::Null); // super
            w.index(PackageIndex::Null); // template
            w.index(export.outer);
            w.fname(self.name_slots[&export.name]);
            w.u32(export.object_flags);
            w.i64(export.serial_size);
            w.i64(export.serial_offset);
            w.u32(0); // forced export
            w.u32(u32::from(export.not_for_client));
            w.u32(u32::from(export.not_for_server));
            if !self.ue5_at_least(UE5_REMOVE_OBJECT_EXPORT_PACKAGE_GUID) {
                w.bytes(&[0; 16]);
            }
            if self.ue5_at_least(UE5_TRACK_OBJECT_EXPORT_IS_INHERITED) {
                w.u32(0); // inherited instance
            }
            w.u32(0); // package flags
            w.u32(0); // not always loaded for editor game
            w.u32(u32::from(export.is_asset));
            if self.ue5_at_least(UE5_OPTIONAL_RESOURCES) {
                w.u32(0); // generate public hash
            }
            w.i32(first);
            for category in &export.preload {
                w.i32(category.len() as i32);
            }
            if self.ue5_at_least(UE5_SCRIPT_SERIALIZATION_OFFSET) {
                w.i64(0);
                w.i64(export.serial_size);
            }
        }
        w.0
    }
}

#[derive(Default)]
struct ByteWriter(Vec<u8>);

impl ByteWriter {
    fn bytes(&mut self, b: &[u8]) {
        self.0.extend_from_slice(b);
    }

    fn u16(&mut self, v: u16) {
        self.bytes(&v.to_le_bytes());
    }

    fn u32(&mut self, v: u32) {
        self.bytes(&v.to_le_bytes());
    }

    fn i32(&mut self, v: i32) {
        self.bytes(&v.to_le_bytes());
    }

    fn i64(&mut self, v: i64) {
        self.bytes(&v.to_le_bytes());
    }

    fn index(&mut self, index: PackageIndex) {
        let raw = index
            .to_raw()
            .unwrap_or_else(|| panic!("{index} has no i32 wire encoding"));
        self.i32(raw);
    }

    fn fname(&mut self, slot: i32) {
        self.i32(slot);
        self.i32(0);
    }

    /// ASCII as 8-bit, everything else as UTF-16.
    fn fstring(&mut self, s: &str) {
        if s.is_empty() {
            self.i32(0);
        } else if s.is_ascii() {
            self.i32(s.len() as i32 + 1);
            self.bytes(s.as_bytes());
            self.bytes(&[0]);
        } else {
            let units: Vec<u16> = s.encode_utf16().chain(std::iter::once(0)).collect();
            self.i32(-(units.len() as i32));
            for unit in units {
                self.u16(unit);
            }
        }
    }
}
