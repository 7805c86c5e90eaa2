//! Package summary header.
//!
//! Anything wrong in here is a [`PakError::HeaderMismatch`]: without a
//! trustworthy header none of the section offsets can be used.

use super::cursor::{ByteCursor, DecodeResult};
use pakscan_core::error::{DecodeError, PakError, PakResult};
use pakscan_core::types::{CustomVersion, EngineVersion, Generation};
use pakscan_core::{PackageHeader, PKG_FILTER_EDITOR_ONLY};

pub const PACKAGE_FILE_TAG: u32 = 0x9E2A_83C1;
pub const PACKAGE_FILE_TAG_SWAPPED: u32 = 0xC183_2A9E;

pub const LEGACY_VERSION_UE4: i32 = -7;
pub const LEGACY_VERSION_UE5: i32 = -8;

/// Oldest object version whose export entries carry 64-bit serial sizes,
/// preload dependency ranges and the asset flag unconditionally.
pub const MIN_FILE_VERSION_UE4: i32 = 516;
pub const MAX_FILE_VERSION_UE4: i32 = 522;
pub const UE4_ADDED_PACKAGE_OWNER: i32 = 518;
pub const UE4_NON_OUTER_PACKAGE_IMPORT: i32 = 520;

/// Later UE5 versions replace the package guid with a saved hash and
/// reorder the summary.
pub const MIN_FILE_VERSION_UE5: i32 = 1000;
pub const MAX_FILE_VERSION_UE5: i32 = 1010;
pub const UE5_NAMES_REFERENCED_FROM_EXPORT_DATA: i32 = 1001;
pub const UE5_PAYLOAD_TOC: i32 = 1002;
pub const UE5_OPTIONAL_RESOURCES: i32 = 1003;
pub const UE5_REMOVE_OBJECT_EXPORT_PACKAGE_GUID: i32 = 1005;
pub const UE5_TRACK_OBJECT_EXPORT_IS_INHERITED: i32 = 1006;
pub const UE5_ADD_SOFTOBJECTPATH_LIST: i32 = 1008;
pub const UE5_DATA_RESOURCES: i32 = 1009;
pub const UE5_SCRIPT_SERIALIZATION_OFFSET: i32 = 1010;

/// True when the package was saved at or after UE5 object version `version`.
pub(crate) fn ue5_at_least(file_version_ue5: Option<i32>, version: i32) -> bool {
    file_version_ue5.is_some_and(|v| v >= version)
}

/// Reads `count` elements, allocating no more than the buffer could hold.
pub(crate) fn read_vec<T>(
    cur: &mut ByteCursor<'_>,
    min_elem_size: usize,
    mut read: impl FnMut(&mut ByteCursor<'_>) -> DecodeResult<T>,
) -> DecodeResult<Vec<T>> {
    let count = cur.read_count()?;
    let mut out = Vec::with_capacity(count.min(cur.remaining() / min_elem_size.max(1)));
    for _ in 0..count {
        out.push(read(cur)?);
    }
    Ok(out)
}

fn read_engine_version(cur: &mut ByteCursor<'_>) -> DecodeResult<EngineVersion> {
    Ok(EngineVersion {
        major: cur.read_u16()?,
        minor: cur.read_u16()?,
        patch: cur.read_u16()?,
        changelist: cur.read_u32()?,
        branch: cur.read_fstring()?,
    })
}

/// Decodes the header at the start of `cur`.
pub fn read_header(cur: &mut ByteCursor<'_>) -> PakResult<PackageHeader> {
    let truncated = |e: DecodeError| PakError::HeaderMismatch(format!("truncated or corrupt header: {e}"));

    let tag = cur.read_u32().map_err(truncated)?;
    if tag == PACKAGE_FILE_TAG_SWAPPED {
        return Err(PakError::HeaderMismatch(
            "byte-swapped package tag, big-endian packages are unsupported".into(),
        ));
    }
    if tag != PACKAGE_FILE_TAG {
        return Err(PakError::HeaderMismatch(format!(
            "not a package file (tag {tag:#010x})"
        )));
    }

    let legacy_file_version = cur.read_i32().map_err(truncated)?;
    if legacy_file_version != LEGACY_VERSION_UE4 && legacy_file_version != LEGACY_VERSION_UE5 {
        return Err(PakError::HeaderMismatch(format!(
            "unsupported legacy file version {legacy_file_version}"
        )));
    }

    let legacy_ue3_version = cur.read_i32().map_err(truncated)?;
    let file_version_ue4 = cur.read_i32().map_err(truncated)?;
    let file_version_ue5 = if legacy_file_version <= LEGACY_VERSION_UE5 {
        Some(cur.read_i32().map_err(truncated)?)
    } else {
        None
    };
    if file_version_ue4 == 0 {
        return Err(PakError::HeaderMismatch(
            "unversioned packages are unsupported".into(),
        ));
    }
    if !(MIN_FILE_VERSION_UE4..=MAX_FILE_VERSION_UE4).contains(&file_version_ue4) {
        return Err(PakError::HeaderMismatch(format!(
            "unsupported object version {file_version_ue4} (supported {MIN_FILE_VERSION_UE4}..={MAX_FILE_VERSION_UE4})"
        )));
    }
    if let Some(ue5) = file_version_ue5 {
        if !(MIN_FILE_VERSION_UE5..=MAX_FILE_VERSION_UE5).contains(&ue5) {
            return Err(PakError::HeaderMismatch(format!(
                "unsupported UE5 object version {ue5} (supported {MIN_FILE_VERSION_UE5}..={MAX_FILE_VERSION_UE5})"
            )));
        }
    }

    let (header, compressed_chunk_count) = read_header_body(
        cur,
        tag,
        legacy_file_version,
        legacy_ue3_version,
        file_version_ue4,
        file_version_ue5,
    )
    .map_err(truncated)?;

    if header.compression_flags != 0 || compressed_chunk_count > 0 {
        return Err(PakError::HeaderMismatch(format!(
            "compressed packages are unsupported (flags {:#x}, {compressed_chunk_count} chunks)",
            header.compression_flags
        )));
    }

    Ok(header)
}

fn read_header_body(
    cur: &mut ByteCursor<'_>,
    tag: u32,
    legacy_file_version: i32,
    legacy_ue3_version: i32,
    file_version_ue4: i32,
    file_version_ue5: Option<i32>,
) -> DecodeResult<(PackageHeader, usize)> {
    let file_version_licensee = cur.read_i32()?;
    let custom_versions = read_vec(cur, 20, |c| {
        Ok(CustomVersion {
            key: c.read_guid()?,
            version: c.read_i32()?,
        })
    })?;

    let total_header_size = cur.read_i32()?;
    let folder_name = cur.read_fstring()?;
    let package_flags = cur.read_u32()?;
    let editor = package_flags & PKG_FILTER_EDITOR_ONLY == 0;

    let name_count = cur.read_i32()?;
    let name_offset = cur.read_i32()?;
    let (soft_object_paths_count, soft_object_paths_offset) =
        if ue5_at_least(file_version_ue5, UE5_ADD_SOFTOBJECTPATH_LIST) {
            (cur.read_i32()?, cur.read_i32()?)
        } else {
            (0, 0)
        };
    let localization_id = if editor { Some(cur.read_fstring()?) } else { None };
    let gatherable_text_data_count = cur.read_i32()?;
    let gatherable_text_data_offset = cur.read_i32()?;
    let export_count = cur.read_i32()?;
    let export_offset = cur.read_i32()?;
    let import_count = cur.read_i32()?;
    let import_offset = cur.read_i32()?;
    let depends_offset = cur.read_i32()?;
    let soft_package_references_count = cur.read_i32()?;
    let soft_package_references_offset = cur.read_i32()?;
    let searchable_names_offset = cur.read_i32()?;
    let thumbnail_table_offset = cur.read_i32()?;

    let guid = cur.read_guid()?;
    let persistent_guid = if editor && file_version_ue4 >= UE4_ADDED_PACKAGE_OWNER {
        Some(cur.read_guid()?)
    } else {
        None
    };
    let owner_persistent_guid = if editor
        && (UE4_ADDED_PACKAGE_OWNER..UE4_NON_OUTER_PACKAGE_IMPORT).contains(&file_version_ue4)
    {
        Some(cur.read_guid()?)
    } else {
        None
    };
    let generations = read_vec(cur, 8, |c| {
        Ok(Generation {
            export_count: c.read_i32()?,
            name_count: c.read_i32()?,
        })
    })?;

    let saved_by_engine_version = read_engine_version(cur)?;
    let compatible_with_engine_version = read_engine_version(cur)?;

    let compression_flags = cur.read_u32()?;
    let compressed_chunk_count = cur.read_count()?;

    let package_source = cur.read_u32()?;
    let additional_packages_to_cook = read_vec(cur, 4, |c| c.read_fstring())?;
    let asset_registry_data_offset = cur.read_i32()?;
    let bulk_data_start_offset = cur.read_i64()?;
    let world_tile_info_data_offset = cur.read_i32()?;
    let chunk_ids = read_vec(cur, 4, |c| c.read_i32())?;
    let preload_dependency_count = cur.read_i32()?;
    let preload_dependency_offset = cur.read_i32()?;

    let names_referenced_from_export_data_count =
        if ue5_at_least(file_version_ue5, UE5_NAMES_REFERENCED_FROM_EXPORT_DATA) {
            cur.read_i32()?
        } else {
            name_count
        };
    let payload_toc_offset = if ue5_at_least(file_version_ue5, UE5_PAYLOAD_TOC) {
        cur.read_i64()?
    } else {
        -1
    };
    let data_resource_offset = if ue5_at_least(file_version_ue5, UE5_DATA_RESOURCES) {
        cur.read_i32()?
    } else {
        -1
    };

    let header = PackageHeader {
        tag,
        legacy_file_version,
        legacy_ue3_version,
        file_version_ue4,
        file_version_ue5,
        file_version_licensee,
        custom_versions,
        total_header_size,
        folder_name,
        package_flags,
        name_count,
        name_offset,
        soft_object_paths_count,
        soft_object_paths_offset,
        localization_id,
        gatherable_text_data_count,
        gatherable_text_data_offset,
        export_count,
        export_offset,
        import_count,
        import_offset,
        depends_offset,
        soft_package_references_count,
        soft_package_references_offset,
        searchable_names_offset,
        thumbnail_table_offset,
        guid,
        persistent_guid,
        owner_persistent_guid,
        generations,
        saved_by_engine_version,
        compatible_with_engine_version,
        compression_flags,
        package_source,
        additional_packages_to_cook,
        asset_registry_data_offset,
        bulk_data_start_offset,
        world_tile_info_data_offset,
        chunk_ids,
        preload_dependency_count,
        preload_dependency_offset,
        names_referenced_from_export_data_count,
        payload_toc_offset,
        data_resource_offset,
    };
    Ok((header, compressed_chunk_count))
}
