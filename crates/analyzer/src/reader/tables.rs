//! Name, import, export, depends, soft-reference and preload sections.
//!
//! Each section is decoded on its own. A failing entry stops its section
//! but keeps whatever was read before it.

use super::cursor::{ByteCursor, DecodeResult};
use super::header::{
    ue5_at_least, UE4_NON_OUTER_PACKAGE_IMPORT, UE5_OPTIONAL_RESOURCES,
    UE5_REMOVE_OBJECT_EXPORT_PACKAGE_GUID, UE5_SCRIPT_SERIALIZATION_OFFSET,
    UE5_TRACK_OBJECT_EXPORT_IS_INHERITED,
};
use pakscan_core::error::DecodeError;
use pakscan_core::types::PreloadRanges;
use pakscan_core::{DependsList, ObjectExport, ObjectImport, PackageHeader, PackageIndex};

/// Entries decoded from one section plus the error that stopped it.
#[derive(Debug)]
pub struct SectionRead<T> {
    pub entries: Vec<T>,
    pub error: Option<DecodeError>,
}

impl<T> SectionRead<T> {
    pub(crate) fn empty() -> Self {
        Self {
            entries: Vec::new(),
            error: None,
        }
    }

    pub(crate) fn failed(error: DecodeError) -> Self {
        Self {
            entries: Vec::new(),
            error: Some(error),
        }
    }

    /// True when nothing usable came out of the section.
    pub fn is_unusable(&self) -> bool {
        self.error.is_some() && self.entries.is_empty()
    }
}

/// Seeks to `offset` and reads up to `count` entries.
fn read_section<T>(
    data: &[u8],
    offset: i32,
    count: i32,
    min_entry_size: usize,
    mut read: impl FnMut(&mut ByteCursor<'_>, u32) -> DecodeResult<T>,
) -> SectionRead<T> {
    if count < 0 {
        return SectionRead::failed(DecodeError::NegativeCount(count));
    }
    if count == 0 {
        return SectionRead::empty();
    }

    let mut cur = ByteCursor::new(data);
    if let Err(e) = cur.seek(i64::from(offset)) {
        return SectionRead::failed(e);
    }

    let count = count as usize;
    let mut entries = Vec::with_capacity(count.min(cur.remaining() / min_entry_size));
    for index in 0..count {
        match read(&mut cur, index as u32) {
            Ok(entry) => entries.push(entry),
            Err(e) => {
                return SectionRead {
                    entries,
                    error: Some(e),
                }
            }
        }
    }
    SectionRead {
        entries,
        error: None,
    }
}

/// Name-table view used to turn serialized names into strings.
#[derive(Clone, Copy)]
pub struct NameTable<'a> {
    names: &'a [String],
}

impl<'a> NameTable<'a> {
    pub fn new(names: &'a [String]) -> Self {
        Self { names }
    }

    /// Serialized name: table slot + instance number.
    pub fn read_name(&self, cur: &mut ByteCursor<'_>) -> DecodeResult<String> {
        let index = cur.read_i32()?;
        let number = cur.read_i32()?;
        let base = usize::try_from(index)
            .ok()
            .and_then(|i| self.names.get(i))
            .ok_or(DecodeError::NameIndexOutOfRange {
                index,
                len: self.names.len(),
            })?;
        if number > 0 {
            Ok(format!("{base}_{}", number - 1))
        } else {
            Ok(base.clone())
        }
    }
}

pub fn read_names(data: &[u8], header: &PackageHeader) -> SectionRead<String> {
    read_section(data, header.name_offset, header.name_count, 8, |cur, _| {
        let name = cur.read_fstring()?;
        // Case-preserving and non-case-preserving hashes; unused.
        cur.read_u16()?;
        cur.read_u16()?;
        Ok(name)
    })
}

pub fn read_imports(
    data: &[u8],
    header: &PackageHeader,
    names: NameTable<'_>,
) -> SectionRead<ObjectImport> {
    let has_package_name = !header.is_filter_editor_only()
        && header.file_version_ue4 >= UE4_NON_OUTER_PACKAGE_IMPORT;
    let has_optional_flag = ue5_at_least(header.file_version_ue5, UE5_OPTIONAL_RESOURCES);

    read_section(
        data,
        header.import_offset,
        header.import_count,
        28,
        |cur, index| {
            let class_package = names.read_name(cur)?;
            let class_name = names.read_name(cur)?;
            let outer_index = cur.read_package_index()?;
            let object_name = names.read_name(cur)?;
            let package_name = if has_package_name {
                Some(names.read_name(cur)?)
            } else {
                None
            };
            let import_optional = has_optional_flag && cur.read_bool32()?;
            Ok(ObjectImport {
                index,
                object_name,
                class_package,
                class_name,
                outer_index,
                package_name,
                import_optional,
            })
        },
    )
}

pub fn read_exports(
    data: &[u8],
    header: &PackageHeader,
    names: NameTable<'_>,
) -> SectionRead<ObjectExport> {
    let ue5 = header.file_version_ue5;
    let has_package_guid = !ue5_at_least(ue5, UE5_REMOVE_OBJECT_EXPORT_PACKAGE_GUID);
    let has_inherited_flag = ue5_at_least(ue5, UE5_TRACK_OBJECT_EXPORT_IS_INHERITED);
    let has_public_hash_flag = ue5_at_least(ue5, UE5_OPTIONAL_RESOURCES);
    let has_script_offsets = ue5_at_least(ue5, UE5_SCRIPT_SERIALIZATION_OFFSET);

    read_section(
        data,
        header.export_offset,
        header.export_count,
        88,
        |cur, index| {
            let class_index = cur.read_package_index()?;
            let super_index = cur.read_package_index()?;
            let template_index = cur.read_package_index()?;
            let outer_index = cur.read_package_index()?;
            let object_name = names.read_name(cur)?;
            let object_flags = cur.read_u32()?;
            let serial_size = cur.read_i64()?;
            let serial_offset = cur.read_i64()?;
            let _forced_export = cur.read_bool32()?;
            let not_for_client = cur.read_bool32()?;
            let not_for_server = cur.read_bool32()?;
            if has_package_guid {
                cur.read_guid()?;
            }
            let is_inherited_instance = has_inherited_flag && cur.read_bool32()?;
            let package_flags = cur.read_u32()?;
            let _not_always_loaded_for_editor_game = cur.read_bool32()?;
            let is_asset = cur.read_bool32()?;
            let generate_public_hash = has_public_hash_flag && cur.read_bool32()?;
            let preload = PreloadRanges {
                first: cur.read_i32()?,
                serialize_before_serialize: cur.read_i32()?,
                create_before_serialize: cur.read_i32()?,
                serialize_before_create: cur.read_i32()?,
                create_before_create: cur.read_i32()?,
            };
            let (script_serialization_start_offset, script_serialization_end_offset) =
                if has_script_offsets {
                    (cur.read_i64()?, cur.read_i64()?)
                } else {
                    (0, 0)
                };

            Ok(ObjectExport {
                index,
                object_name,
                object_path: String::new(),
                class_path: String::new(),
                class_index,
                super_index,
                template_index,
                outer_index,
                object_flags,
                serial_size,
                serial_offset,
                is_asset,
                not_for_client,
                not_for_server,
                is_inherited_instance,
                generate_public_hash,
                package_flags,
                preload,
                script_serialization_start_offset,
                script_serialization_end_offset,
            })
        },
    )
}

/// One depends list per export slot, keyed by the header's export count
/// so it can be read even when the export section failed.
pub fn read_depends(data: &[u8], header: &PackageHeader) -> SectionRead<DependsList> {
    read_section(data, header.depends_offset, header.export_count, 4, |cur, _| {
        let count = cur.read_count()?;
        if count > cur.remaining() / 4 {
            return Err(DecodeError::UnexpectedEof {
                offset: cur.position(),
                needed: count * 4,
            });
        }
        let mut list = DependsList::with_capacity(count);
        for _ in 0..count {
            list.push(cur.read_package_index()?);
        }
        Ok(list)
    })
}

pub fn read_soft_package_references(
    data: &[u8],
    header: &PackageHeader,
    names: NameTable<'_>,
) -> SectionRead<String> {
    read_section(
        data,
        header.soft_package_references_offset,
        header.soft_package_references_count,
        8,
        |cur, _| names.read_name(cur),
    )
}

/// Flat preload table indexed by each export's [`PreloadRanges`].
pub fn read_preload_dependencies(
    data: &[u8],
    header: &PackageHeader,
) -> SectionRead<PackageIndex> {
    // A negative offset is how packages without the table mark it absent.
    if header.preload_dependency_offset < 0 {
        return SectionRead::empty();
    }
    read_section(
        data,
        header.preload_dependency_offset,
        header.preload_dependency_count,
        4,
        |cur, _| cur.read_package_index(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name_bytes(index: i32, number: i32) -> Vec<u8> {
        let mut out = index.to_le_bytes().to_vec();
        out.extend_from_slice(&number.to_le_bytes());
        out
    }

    #[test]
    fn name_with_number_gets_suffix() {
        let names = vec!["Mesh".to_string()];
        let table = NameTable::new(&names);
        let data = name_bytes(0, 3);
        let mut cur = ByteCursor::new(&data);
        assert_eq!(table.read_name(&mut cur).unwrap(), "Mesh_2");
    }

    #[test]
    fn name_index_out_of_range() {
        let names = vec!["Mesh".to_string()];
        let table = NameTable::new(&names);
        let data = name_bytes(5, 0);
        assert_eq!(
            table.read_name(&mut ByteCursor::new(&data)),
            Err(DecodeError::NameIndexOutOfRange { index: 5, len: 1 })
        );
        let data = name_bytes(-1, 0);
        assert!(table.read_name(&mut ByteCursor::new(&data)).is_err());
    }

    #[test]
    fn section_keeps_entries_before_failure() {
        let mut data = Vec::new();
        for v in [10i32, 20] {
            data.extend_from_slice(&v.to_le_bytes());
        }
        data.extend_from_slice(&[0, 0]);
        let read = read_section(&data, 0, 3, 4, |cur, _| cur.read_i32());
        assert_eq!(read.entries, vec![10, 20]);
        assert!(matches!(
            read.error,
            Some(DecodeError::UnexpectedEof { offset: 8, .. })
        ));
        assert!(!read.is_unusable());
    }

    #[test]
    fn section_with_bad_offset_is_unusable() {
        let data = [0u8; 4];
        let read = read_section(&data, 100, 1, 4, |cur, _| cur.read_i32());
        assert!(read.is_unusable());
    }

    #[test]
    fn empty_section_ignores_offset() {
        let data = [0u8; 4];
        let read = read_section(&data, -1, 0, 4, |cur, _| cur.read_i32());
        assert!(read.entries.is_empty());
        assert!(read.error.is_none());
    }

    #[test]
    fn depends_list_with_oversized_count_fails() {
        let mut data = 1_000_000i32.to_le_bytes().to_vec();
        data.extend_from_slice(&1i32.to_le_bytes());
        let header = PackageHeader {
            depends_offset: 0,
            export_count: 1,
            ..Default::default()
        };
        let read = read_depends(&data, &header);
        assert!(read.is_unusable());
    }
}
