//! CLI for the pakscan package dependency analyzer.
//!
//! Pipeline: discover packages -> parallel decode -> reverse aggregation -> report.

use clap::{Parser, Subcommand};
use pakscan_analyzer::{
    analyze_package, AssetScanner, CompletionDelivery, ExtractOptions, Report, ScanConfig,
};
use pakscan_core::{ArchiveSummary, AssetSummary, EntryMeta, InputFile};
use pakscan_provider::FolderSource;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

#[derive(Parser, Debug)]
#[command(name = "pakscan", version, about = "Package metadata and dependency analyzer")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Scan a cooked content folder and build its dependency graph.
    Scan {
        dir: PathBuf,

        /// Package-name prefix for files under DIR.
        #[arg(short, long, env = "PAKSCAN_MOUNT_POINT", default_value = "/Game/")]
        mount_point: String,

        /// Worker threads (defaults to available parallelism).
        #[arg(short, long, env = "PAKSCAN_THREADS")]
        threads: Option<usize>,

        /// Include qualified preload dependencies.
        #[arg(long, default_value_t = false)]
        preload: bool,

        /// How many of the most depended-upon packages to list.
        #[arg(long, default_value_t = 10)]
        top: usize,

        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Decode a single package file and print its summary.
    Inspect {
        file: PathBuf,

        #[arg(short, long, env = "PAKSCAN_MOUNT_POINT", default_value = "/Game/")]
        mount_point: String,

        #[arg(long, default_value_t = false)]
        preload: bool,

        #[arg(long, default_value_t = false)]
        json: bool,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Scan {
            dir,
            mount_point,
            threads,
            preload,
            top,
            json,
        } => scan(&dir, &mount_point, threads, preload, top, json),
        Commands::Inspect {
            file,
            mount_point,
            preload,
            json,
        } => inspect(&file, &mount_point, preload, json),
    }
}

fn scan(
    dir: &Path,
    mount_point: &str,
    threads: Option<usize>,
    preload: bool,
    top: usize,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let t0 = Instant::now();

    // 1. Discover packages.
    let discovery = FolderSource::discover(dir, mount_point)?;
    tracing::info!(
        packages = discovery.files.len(),
        total_size = discovery.total_size,
        elapsed_ms = t0.elapsed().as_millis() as u64,
        "discovered"
    );

    // 2. Decode and aggregate on the scan thread.
    let (delivery, rx) = CompletionDelivery::channel();
    let config = ScanConfig {
        threads,
        include_preload_dependencies: preload,
    };
    let mut scanner = AssetScanner::new(Arc::new(FolderSource::new()), config, delivery);
    scanner.start(discovery.files, discovery.archives)?;
    let scan = rx.recv()?;
    scanner.wait();

    tracing::info!(
        parsed = scan.stats.parsed,
        failed = scan.stats.failed,
        elapsed_ms = t0.elapsed().as_millis() as u64,
        "scan complete"
    );

    // 3. Report.
    let report = Report::build(&scan, top);
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", report.render());
    }
    Ok(())
}

fn inspect(
    file: &Path,
    mount_point: &str,
    preload: bool,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let data = std::fs::read(file)?;
    let file_name = file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let input = InputFile::new(0, file_name, EntryMeta::default());
    let archive = ArchiveSummary::new(
        file.parent().unwrap_or(Path::new(".")).to_string_lossy(),
        mount_point,
    );
    let package_name = input.long_package_name(&archive);

    let options = ExtractOptions {
        include_preload_dependencies: preload,
    };
    let summary = analyze_package(&data, &package_name, options)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print!("{}", render_summary(&summary));
    }
    Ok(())
}

fn render_summary(summary: &AssetSummary) -> String {
    let header = &summary.header;
    let mut out = String::new();
    out.push_str(&format!("package:   {}\n", summary.package_name));
    out.push_str(&format!(
        "versions:  legacy {} / ue4 {}{} / licensee {}\n",
        header.legacy_file_version,
        header.file_version_ue4,
        header
            .file_version_ue5
            .map(|v| format!(" / ue5 {v}"))
            .unwrap_or_default(),
        header.file_version_licensee
    ));
    out.push_str(&format!("engine:    {}\n", header.saved_by_engine_version));
    out.push_str(&format!("guid:      {}\n", header.guid));
    out.push_str(&format!(
        "cooked:    {}\n",
        if header.is_filter_editor_only() { "yes" } else { "no (editor package)" }
    ));
    out.push_str(&format!(
        "tables:    {} names, {} imports, {} exports\n",
        summary.names.len(),
        summary.imports.len(),
        summary.exports.len()
    ));

    out.push_str("\nexports:\n");
    for export in &summary.exports {
        out.push_str(&format!(
            "  {} [{}] {} bytes{}\n",
            export.object_path,
            export.class_path,
            export.serial_size,
            if export.is_asset { " (asset)" } else { "" }
        ));
    }

    out.push_str("\ndependencies:\n");
    for record in &summary.dependencies {
        match record.qualifier {
            Some(q) => out.push_str(&format!("  {} ({q})\n", record.target)),
            None => out.push_str(&format!("  {}\n", record.target)),
        }
    }

    if !summary.soft_package_references.is_empty() {
        out.push_str("\nsoft references:\n");
        for name in &summary.soft_package_references {
            out.push_str(&format!("  {name}\n"));
        }
    }

    if !summary.diagnostics.is_empty() {
        out.push_str("\ndiagnostics:\n");
        for diag in &summary.diagnostics {
            out.push_str(&format!("  {}: {}\n", diag.section, diag.error));
        }
    }
    out
}
