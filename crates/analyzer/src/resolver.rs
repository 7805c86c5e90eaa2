//! Turns [`PackageIndex`] references into object paths.
//!
//! Resolution only looks at the package's own tables. Imports are leaves:
//! their path is the recorded object name, with no walk up the outer chain.

use pakscan_core::{AssetSummary, ObjectExport, ObjectImport, ObjectRef, PackageIndex, TargetKind};

/// Path of an export named `object_name` inside package `root`.
#[inline]
pub fn export_object_path(root: &str, object_name: &str) -> String {
    format!("{root}.{object_name}")
}

/// Borrowed view of the tables a reference is resolved against.
#[derive(Debug, Clone, Copy)]
pub struct ResolveContext<'a> {
    imports: &'a [ObjectImport],
    exports: &'a [ObjectExport],
    root: &'a str,
}

impl<'a> ResolveContext<'a> {
    pub fn new(imports: &'a [ObjectImport], exports: &'a [ObjectExport], root: &'a str) -> Self {
        Self {
            imports,
            exports,
            root,
        }
    }

    pub fn from_summary(summary: &'a AssetSummary) -> Self {
        Self::new(&summary.imports, &summary.exports, &summary.package_name)
    }

    pub fn resolve(&self, index: PackageIndex) -> ObjectRef {
        match self.resolve_kind(index) {
            Some((path, _)) => ObjectRef::Path(path),
            None if index.is_null() => ObjectRef::Null,
            None => ObjectRef::Unresolved(index),
        }
    }

    /// Resolves `index` and classifies the target. `None` for null and
    /// out-of-range references.
    pub fn resolve_kind(&self, index: PackageIndex) -> Option<(String, TargetKind)> {
        match index {
            PackageIndex::Null => None,
            PackageIndex::Import(slot) => {
                let import = self.imports.get(slot as usize)?;
                let kind = if import.is_package() {
                    TargetKind::Package
                } else {
                    TargetKind::Import
                };
                Some((import.object_name.clone(), kind))
            }
            PackageIndex::Export(slot) => {
                let export = self.exports.get(slot as usize)?;
                Some((
                    export_object_path(self.root, &export.object_name),
                    TargetKind::Export,
                ))
            }
        }
    }
}

/// Free-function form of [`ResolveContext::resolve`].
pub fn resolve(
    index: PackageIndex,
    imports: &[ObjectImport],
    exports: &[ObjectExport],
    root: &str,
) -> ObjectRef {
    ResolveContext::new(imports, exports, root).resolve(index)
}

/// Fills `object_path` and `class_path` on every export.
pub fn resolve_paths(summary: &mut AssetSummary) {
    let ctx = ResolveContext::from_summary(summary);
    let resolved: Vec<(String, String)> = summary
        .exports
        .iter()
        .map(|export| {
            let class_index = export.class_index;
            let class_path = ctx.resolve(class_index);
            if let ObjectRef::Unresolved(index) = &class_path {
                tracing::debug!(
                    package = %summary.package_name,
                    export = %export.object_name,
                    class = %index,
                    "unresolved class reference"
                );
            }
            (
                export_object_path(&summary.package_name, &export.object_name),
                class_path.into_path_string(),
            )
        })
        .collect();

    for (export, (object_path, class_path)) in summary.exports.iter_mut().zip(resolved) {
        export.object_path = object_path;
        export.class_path = class_path;
    }
}
