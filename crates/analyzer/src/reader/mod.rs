//! Binary package reader.
//!
//! Decodes one package buffer into an [`AssetSummary`] holding the header
//! and the raw tables. Object paths and dependency lists are left empty;
//! the resolver and extractor fill them in.

pub mod cursor;
pub mod header;
pub mod tables;

use cursor::ByteCursor;
use pakscan_core::error::{DecodeError, PakError, PakResult};
use pakscan_core::{AssetSummary, Section, SectionDiagnostic};
use tables::{NameTable, SectionRead};

pub use header::{
    LEGACY_VERSION_UE4, LEGACY_VERSION_UE5, MAX_FILE_VERSION_UE4, MAX_FILE_VERSION_UE5,
    MIN_FILE_VERSION_UE4, MIN_FILE_VERSION_UE5, PACKAGE_FILE_TAG,
};

/// Decodes `data` as the package `package_name`.
///
/// Fails only on an unusable header. Section failures are recorded as
/// diagnostics on the returned summary and logged.
pub fn read_package(data: &[u8], package_name: &str) -> PakResult<AssetSummary> {
    let mut cur = ByteCursor::new(data);
    let header = header::read_header(&mut cur)?;

    let mut diagnostics = Vec::new();
    let mut record = |section: Section, error: Option<DecodeError>| {
        if let Some(error) = error {
            let failure = PakError::SectionDecode {
                section,
                source: error.clone(),
            };
            tracing::warn!(
                package = package_name,
                section = %section,
                error = %failure,
                "section decode failed"
            );
            diagnostics.push(SectionDiagnostic { section, error });
        }
    };

    let names = tables::read_names(data, &header);
    let names_usable = !names.is_unusable();
    record(Section::Names, names.error);
    let names = names.entries;
    let table = NameTable::new(&names);

    // Sections that reference names are skipped when the table is gone.
    let imports = if names_usable {
        tables::read_imports(data, &header, table)
    } else {
        without_names(header.import_count)
    };
    record(Section::Imports, imports.error);

    let exports = if names_usable {
        tables::read_exports(data, &header, table)
    } else {
        without_names(header.export_count)
    };
    record(Section::Exports, exports.error);

    let depends = tables::read_depends(data, &header);
    record(Section::Depends, depends.error);

    let soft_package_references = if names_usable {
        tables::read_soft_package_references(data, &header, table)
    } else {
        without_names(header.soft_package_references_count)
    };
    record(Section::SoftPackageReferences, soft_package_references.error);

    let preload = tables::read_preload_dependencies(data, &header);
    record(Section::PreloadDependencies, preload.error);

    tracing::debug!(
        package = package_name,
        names = names.len(),
        imports = imports.entries.len(),
        exports = exports.entries.len(),
        failed_sections = diagnostics.len(),
        "package decoded"
    );

    Ok(AssetSummary {
        package_name: package_name.to_string(),
        header,
        names,
        imports: imports.entries,
        exports: exports.entries,
        depends: depends.entries,
        soft_package_references: soft_package_references.entries,
        preload_dependencies: preload.entries,
        dependencies: Vec::new(),
        dependents: Vec::new(),
        diagnostics,
    })
}

/// Stand-in for a name-dependent section when the name table is gone.
fn without_names<T>(count: i32) -> SectionRead<T> {
    if count > 0 {
        SectionRead::failed(DecodeError::NameTableUnavailable)
    } else {
        SectionRead::empty()
    }
}
