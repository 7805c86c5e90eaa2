//! Reverse dependency construction across every decoded package.
//!
//! Runs once all packages are decoded, since a reverse edge needs the
//! forward lists of every other package.

use pakscan_core::{AssetSummary, DependencyRecord, TargetKind};
use rayon::prelude::*;
use serde::Serialize;
use std::collections::HashMap;

/// Counters from one [`aggregate_dependents`] pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AggregateStats {
    /// Package-level forward edges placed in the reverse index.
    pub indexed_edges: usize,
    /// Packages that received at least one reverse record.
    pub packages_updated: usize,
    /// Packages left alone because their reverse list was already filled.
    pub packages_skipped: usize,
}

/// Builds the reverse index `target package -> [dependent package]`.
///
/// Only records that point at another package are indexed. Keys and
/// values borrow from the summaries; a source appears once per matching
/// forward record.
pub fn build_dependents_index<'a>(
    summaries: impl IntoIterator<Item = &'a AssetSummary>,
) -> HashMap<&'a str, Vec<&'a str>> {
    let mut index: HashMap<&str, Vec<&str>> = HashMap::new();
    for summary in summaries {
        for record in &summary.dependencies {
            if record.target_kind != TargetKind::Package {
                continue;
            }
            index
                .entry(record.target.as_str())
                .or_default()
                .push(summary.package_name.as_str());
        }
    }
    index
}

/// Fills `dependents` on every decoded package.
///
/// Empty slots (files that produced no summary) are ignored. Packages
/// whose reverse list is already non-empty are skipped, so running this
/// twice does not duplicate records.
pub fn aggregate_dependents(slots: &mut [Option<AssetSummary>]) -> AggregateStats {
    let mut stats = AggregateStats::default();

    // Phase 1: single-threaded index over borrowed keys.
    let reverse: Vec<Option<Vec<DependencyRecord>>> = {
        let index = build_dependents_index(slots.iter().flatten());
        stats.indexed_edges = index.values().map(Vec::len).sum();

        // Phase 2: the index is read-only from here on.
        slots
            .par_iter()
            .map(|slot| {
                let summary = slot.as_ref()?;
                if !summary.dependents.is_empty() {
                    return None;
                }
                let sources = index.get(summary.package_name.as_str())?;
                Some(
                    sources
                        .iter()
                        .map(|source| DependencyRecord::new(*source, TargetKind::Package))
                        .collect(),
                )
            })
            .collect()
    };

    for (slot, records) in slots.iter_mut().zip(reverse) {
        let Some(summary) = slot.as_mut() else {
            continue;
        };
        if !summary.dependents.is_empty() {
            stats.packages_skipped += 1;
            continue;
        }
        if let Some(records) = records {
            summary.dependents = records;
            stats.packages_updated += 1;
        }
    }

    tracing::info!(
        edges = stats.indexed_edges,
        updated = stats.packages_updated,
        skipped = stats.packages_skipped,
        "reverse dependencies aggregated"
    );
    stats
}

#[cfg(test)]
mod tests {
    use super::*;

    fn package(name: &str, deps: &[(&str, TargetKind)]) -> Option<AssetSummary> {
        Some(AssetSummary {
            package_name: name.to_string(),
            dependencies: deps
                .iter()
                .map(|&(target, kind)| DependencyRecord::new(target, kind))
                .collect(),
            ..Default::default()
        })
    }

    fn dependents(slot: &Option<AssetSummary>) -> Vec<&str> {
        slot.as_ref()
            .unwrap()
            .dependents
            .iter()
            .map(|r| r.target.as_str())
            .collect()
    }

    #[test]
    fn single_edge_reaches_only_its_target() {
        let mut slots = vec![
            package("/Game/A", &[("/Game/B", TargetKind::Package)]),
            package("/Game/B", &[]),
            package("/Game/C", &[]),
        ];
        let stats = aggregate_dependents(&mut slots);

        assert_eq!(dependents(&slots[1]), vec!["/Game/A"]);
        assert!(dependents(&slots[0]).is_empty());
        assert!(dependents(&slots[2]).is_empty());
        assert_eq!(stats.indexed_edges, 1);
        assert_eq!(stats.packages_updated, 1);
    }

    #[test]
    fn non_package_targets_are_not_indexed() {
        let mut slots = vec![
            package(
                "/Game/A",
                &[
                    ("/Game/B", TargetKind::Import),
                    ("/Game/B", TargetKind::Export),
                ],
            ),
            package("/Game/B", &[]),
        ];
        let stats = aggregate_dependents(&mut slots);
        assert!(dependents(&slots[1]).is_empty());
        assert_eq!(stats.indexed_edges, 0);
    }

    #[test]
    fn duplicate_edges_keep_one_record_each() {
        let mut slots = vec![
            package(
                "/Game/A",
                &[
                    ("/Game/B", TargetKind::Package),
                    ("/Game/B", TargetKind::Package),
                ],
            ),
            package("/Game/C", &[("/Game/B", TargetKind::Package)]),
            package("/Game/B", &[]),
        ];
        aggregate_dependents(&mut slots);
        let mut got = dependents(&slots[2]);
        got.sort_unstable();
        assert_eq!(got, vec!["/Game/A", "/Game/A", "/Game/C"]);
    }

    #[test]
    fn second_pass_adds_nothing() {
        let mut slots = vec![
            package("/Game/A", &[("/Game/B", TargetKind::Package)]),
            package("/Game/B", &[]),
        ];
        aggregate_dependents(&mut slots);
        let first = slots.clone();

        let stats = aggregate_dependents(&mut slots);
        assert_eq!(slots, first);
        assert_eq!(stats.packages_updated, 0);
        assert_eq!(stats.packages_skipped, 1);
    }

    #[test]
    fn empty_slots_are_ignored() {
        let mut slots = vec![
            None,
            package("/Game/A", &[("/Game/B", TargetKind::Package)]),
            None,
            package("/Game/B", &[]),
        ];
        aggregate_dependents(&mut slots);
        assert!(slots[0].is_none());
        assert_eq!(dependents(&slots[3]), vec!["/Game/A"]);
    }

    #[test]
    fn forward_edges_imply_reverse_edges() {
        let names = ["/Game/A", "/Game/B", "/Game/C", "/Game/D"];
        let edges = [(0, 1), (0, 2), (1, 2), (2, 0), (3, 3)];
        let mut slots: Vec<_> = names
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let deps: Vec<_> = edges
                    .iter()
                    .filter(|(from, _)| *from == i)
                    .map(|(_, to)| (names[*to], TargetKind::Package))
                    .collect();
                package(name, &deps)
            })
            .collect();
        aggregate_dependents(&mut slots);

        for slot in &slots {
            let source = slot.as_ref().unwrap();
            for record in &source.dependencies {
                let target = slots
                    .iter()
                    .flatten()
                    .find(|s| s.package_name == record.target)
                    .unwrap();
                assert!(target
                    .dependents
                    .iter()
                    .any(|r| r.target == source.package_name));
            }
        }
    }

    #[test]
    fn index_borrows_from_summaries() {
        let slots = [
            package("/Game/A", &[("/Game/B", TargetKind::Package)]),
            package("/Game/C", &[("/Game/B", TargetKind::Package)]),
        ];
        let index = build_dependents_index(slots.iter().flatten());
        assert_eq!(index.len(), 1);
        assert_eq!(index["/Game/B"], vec!["/Game/A", "/Game/C"]);
    }
}
