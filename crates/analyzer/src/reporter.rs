//! Scan report generator.
//!
//! Turns a [`ScanReport`] into totals, the most depended-upon packages and
//! a class histogram, rendered as a text box or serialized as JSON.

use crate::scanner::ScanReport;
use serde::Serialize;
use std::collections::HashMap;

const RULE: &str = "══════════════════════════════════════════════════════════════";
/// Text columns inside the box: two-space indent, one space before `║`.
const TEXT_WIDTH: usize = 59;

/// Summary of one scan, ready for display.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub cancelled: bool,
    pub files: usize,
    pub parsed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub degraded: usize,
    pub names: usize,
    pub imports: usize,
    pub exports: usize,
    pub forward_edges: usize,
    pub reverse_edges: usize,
    pub most_depended_upon: Vec<PackageRank>,
    pub classes: Vec<ClassCount>,
    pub elapsed_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackageRank {
    pub package: String,
    pub dependents: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassCount {
    pub class: String,
    pub packages: usize,
}

impl Report {
    /// Builds a report keeping the `top` most depended-upon packages.
    pub fn build(scan: &ScanReport, top: usize) -> Self {
        let mut names = 0;
        let mut imports = 0;
        let mut exports = 0;
        let mut forward_edges = 0;
        let mut reverse_edges = 0;
        let mut ranks = Vec::new();

        for summary in scan.packages.summaries() {
            names += summary.names.len();
            imports += summary.imports.len();
            exports += summary.exports.len();
            forward_edges += summary.dependencies.len();
            reverse_edges += summary.dependents.len();
            if !summary.dependents.is_empty() {
                ranks.push(PackageRank {
                    package: summary.package_name.clone(),
                    dependents: summary.dependents.len(),
                });
            }
        }

        // Most dependents first, ties by name for a stable order.
        ranks.sort_by(|a, b| {
            b.dependents
                .cmp(&a.dependents)
                .then_with(|| a.package.cmp(&b.package))
        });
        ranks.truncate(top);

        let mut by_class: HashMap<&str, usize> = HashMap::new();
        for class in scan.class_map.values() {
            *by_class.entry(class.as_str()).or_default() += 1;
        }
        let mut classes: Vec<ClassCount> = by_class
            .into_iter()
            .map(|(class, packages)| ClassCount {
                class: class.to_string(),
                packages,
            })
            .collect();
        classes.sort_by(|a, b| b.packages.cmp(&a.packages).then_with(|| a.class.cmp(&b.class)));

        Report {
            cancelled: scan.cancelled,
            files: scan.packages.len(),
            parsed: scan.stats.parsed,
            failed: scan.stats.failed,
            skipped: scan.stats.skipped,
            degraded: scan.stats.degraded,
            names,
            imports,
            exports,
            forward_edges,
            reverse_edges,
            most_depended_upon: ranks,
            classes,
            elapsed_ms: scan.elapsed.as_millis() as u64,
        }
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        let row = |out: &mut String, label: &str, value: String| {
            framed(out, &format!("{label:<20}{value:>39}"));
        };

        out.push('\n');
        out.push_str(&format!("╔{RULE}╗\n"));
        framed(&mut out, &format!("{:^TEXT_WIDTH$}", "PAKSCAN DEPENDENCY REPORT"));
        out.push_str(&format!("╠{RULE}╣\n"));
        row(&mut out, "Files:", self.files.to_string());
        row(&mut out, "Parsed:", self.parsed.to_string());
        row(&mut out, "Failed:", self.failed.to_string());
        row(&mut out, "Skipped:", self.skipped.to_string());
        row(&mut out, "Degraded:", self.degraded.to_string());
        row(&mut out, "Names:", self.names.to_string());
        row(&mut out, "Imports:", self.imports.to_string());
        row(&mut out, "Exports:", self.exports.to_string());
        row(&mut out, "Dependencies:", self.forward_edges.to_string());
        row(&mut out, "Dependents:", self.reverse_edges.to_string());
        row(&mut out, "Elapsed:", format!("{} ms", self.elapsed_ms));
        if self.cancelled {
            row(&mut out, "Status:", "cancelled".to_string());
        }
        out.push_str(&format!("╠{RULE}╣\n"));

        if self.most_depended_upon.is_empty() {
            framed(&mut out, "No cross-package dependents found.");
        } else {
            framed(&mut out, "MOST DEPENDED-UPON PACKAGES");
            for (i, rank) in self.most_depended_upon.iter().enumerate() {
                framed(
                    &mut out,
                    &format!("{:>3}. {} ({} dependents)", i + 1, rank.package, rank.dependents),
                );
            }
        }

        if !self.classes.is_empty() {
            out.push_str(&format!("╠{RULE}╣\n"));
            framed(&mut out, "PRIMARY CLASSES");
            for class in &self.classes {
                row(&mut out, &class.class, class.packages.to_string());
            }
        }

        out.push_str(&format!("╚{RULE}╝\n"));
        out
    }
}

/// Pushes one boxed line. Text wider than the box loses its head so the
/// distinctive tail of a package path stays visible.
fn framed(out: &mut String, text: &str) {
    let len = text.chars().count();
    let text: String = if len > TEXT_WIDTH {
        std::iter::once('…')
            .chain(text.chars().skip(len - TEXT_WIDTH + 1))
            .collect()
    } else {
        text.to_string()
    };
    out.push_str(&format!("║  {text:<TEXT_WIDTH$} ║\n"));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::AggregateStats;
    use crate::scanner::ScanStats;
    use pakscan_core::{
        AssetSummary, ClassMap, DependencyRecord, EntryMeta, InputFile, PackageArena, TargetKind,
    };
    use std::time::Duration;

    fn summary(name: &str, dependents: &[&str]) -> Option<AssetSummary> {
        Some(AssetSummary {
            package_name: name.into(),
            dependents: dependents
                .iter()
                .map(|d| DependencyRecord::new(*d, TargetKind::Package))
                .collect(),
            ..Default::default()
        })
    }

    fn scan() -> ScanReport {
        let files = (0..4)
            .map(|i| InputFile::new(0, format!("P{i}.uasset"), EntryMeta::default()))
            .collect();
        let summaries = vec![
            summary("/Game/Core", &["/Game/A", "/Game/B", "/Game/C"]),
            summary("/Game/Rock", &["/Game/A"]),
            summary("/Game/Moss", &["/Game/B"]),
            None,
        ];
        let mut class_map = ClassMap::new();
        class_map.insert("/Game/Core".into(), "DataAsset".into());
        class_map.insert("/Game/Rock".into(), "StaticMesh".into());
        class_map.insert("/Game/Moss".into(), "StaticMesh".into());
        ScanReport {
            cancelled: false,
            class_map,
            packages: PackageArena::from_parts(files, summaries).unwrap(),
            stats: ScanStats {
                parsed: 3,
                failed: 1,
                ..Default::default()
            },
            aggregate: AggregateStats::default(),
            elapsed: Duration::from_millis(42),
        }
    }

    #[test]
    fn ranks_by_dependents_then_name() {
        let report = Report::build(&scan(), 2);
        assert_eq!(report.files, 4);
        assert_eq!(report.reverse_edges, 5);
        assert_eq!(
            report.most_depended_upon,
            vec![
                PackageRank {
                    package: "/Game/Core".into(),
                    dependents: 3
                },
                PackageRank {
                    package: "/Game/Moss".into(),
                    dependents: 1
                },
            ]
        );
        assert_eq!(
            report.classes[0],
            ClassCount {
                class: "StaticMesh".into(),
                packages: 2
            }
        );
    }

    #[test]
    fn render_contains_totals() {
        let text = Report::build(&scan(), 5).render();
        assert!(text.contains("PAKSCAN DEPENDENCY REPORT"));
        assert!(text.contains("/Game/Core (3 dependents)"));
        assert!(text.contains("42 ms"));
        assert!(!text.contains("cancelled"));
    }

    #[test]
    fn every_boxed_line_has_the_rule_width() {
        let mut scan = scan();
        scan.cancelled = true;
        let mut report = Report::build(&scan, 5);
        report.most_depended_upon.push(PackageRank {
            package: format!("/Game/{}/Deep", "Nested".repeat(12)),
            dependents: 1,
        });
        report.classes.push(ClassCount {
            class: "AVeryLongBlueprintGeneratedClassName_C".into(),
            packages: 1,
        });

        let width = RULE.chars().count() + 2;
        let text = report.render();
        for line in text.lines().filter(|l| !l.is_empty()) {
            assert_eq!(line.chars().count(), width, "{line}");
        }
        assert!(text.contains("║    1. /Game/Core (3 dependents)"));
        assert!(text.contains("/Deep (1 dependents) ║"));
        assert!(text.contains("cancelled"));

        report.most_depended_upon.clear();
        report.classes.clear();
        for line in report.render().lines().filter(|l| !l.is_empty()) {
            assert_eq!(line.chars().count(), width, "{line}");
        }
    }

    #[test]
    fn serializes_to_json() {
        let report = Report::build(&scan(), 1);
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["parsed"], 3);
        assert_eq!(json["most_depended_upon"][0]["package"], "/Game/Core");
    }
}
