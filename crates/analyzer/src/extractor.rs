//! Forward dependency extraction for one package.

use crate::reader::read_package;
use crate::resolver::{resolve_paths, ResolveContext};
use pakscan_core::error::{PakError, PakResult};
use pakscan_core::{AssetSummary, DependencyRecord, ObjectExport, PackageIndex};

/// Knobs for [`extract_dependencies`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ExtractOptions {
    /// Also emit qualified records from the preload-dependency table.
    pub include_preload_dependencies: bool,
}

/// Builds the forward dependency list of `summary`.
///
/// Records follow export order, then depends-list order. Null and
/// unresolvable entries produce nothing; duplicates are kept. With preload
/// dependencies enabled, each export's qualified records follow all
/// depends-map records.
pub fn extract_dependencies(summary: &AssetSummary, options: ExtractOptions) -> Vec<DependencyRecord> {
    let ctx = ResolveContext::from_summary(summary);
    let mut records = Vec::new();

    for export in &summary.exports {
        let Some(depends) = summary.depends.get(export.index as usize) else {
            continue;
        };
        for &index in depends {
            if let Some(record) = to_record(&ctx, summary, index) {
                records.push(record);
            }
        }
    }

    if options.include_preload_dependencies {
        for export in &summary.exports {
            extract_preload(&ctx, summary, export, &mut records);
        }
    }

    records
}

fn to_record(
    ctx: &ResolveContext<'_>,
    summary: &AssetSummary,
    index: PackageIndex,
) -> Option<DependencyRecord> {
    match ctx.resolve_kind(index) {
        Some((target, kind)) => Some(DependencyRecord::new(target, kind)),
        None => {
            if !index.is_null() {
                tracing::debug!(
                    package = %summary.package_name,
                    error = %PakError::UnresolvedReference(index),
                    "skipping dependency"
                );
            }
            None
        }
    }
}

fn extract_preload(
    ctx: &ResolveContext<'_>,
    summary: &AssetSummary,
    export: &ObjectExport,
    records: &mut Vec<DependencyRecord>,
) {
    let ranges = export.preload;
    if ranges.is_empty() {
        return;
    }

    let table = &summary.preload_dependencies;
    let end = i64::from(ranges.first) + ranges.total();
    let bad_count = ranges.categories().iter().any(|&(_, n)| n < 0);
    if bad_count || end > table.len() as i64 {
        tracing::warn!(
            package = %summary.package_name,
            export = %export.object_name,
            first = ranges.first,
            total = ranges.total(),
            table = table.len(),
            "preload range outside the preload table"
        );
        return;
    }

    let mut at = ranges.first as usize;
    for (qualifier, count) in ranges.categories() {
        let count = count as usize;
        for &index in &table[at..at + count] {
            if let Some(record) = to_record(ctx, summary, index) {
                records.push(record.with_qualifier(qualifier));
            }
        }
        at += count;
    }
}

/// Best-effort primary class of a package: the class of its first asset
/// export, else of its first export, without the package prefix.
pub fn primary_class(summary: &AssetSummary) -> Option<String> {
    let export = summary
        .exports
        .iter()
        .find(|e| e.is_asset)
        .or_else(|| summary.exports.first())?;
    let path = export.class_path.as_str();
    if path.is_empty() {
        return None;
    }
    let short = path.rsplit_once('.').map_or(path, |(_, tail)| tail);
    Some(short.to_string())
}

/// Decodes, resolves and extracts one package.
///
/// `dependents` is left empty for the aggregation pass.
pub fn analyze_package(
    data: &[u8],
    package_name: &str,
    options: ExtractOptions,
) -> PakResult<AssetSummary> {
    let mut summary = read_package(data, package_name)?;
    resolve_paths(&mut summary);
    summary.dependencies = extract_dependencies(&summary, options);
    Ok(summary)
}
