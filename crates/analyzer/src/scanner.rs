//! Parallel scan over a set of package files.
//!
//! One named background thread owns a rayon pool. Phase 1 decodes every
//! file independently; after the barrier, phase 2 aggregates reverse
//! dependencies. The outcome is delivered once, as a [`ScanReport`].

use crate::aggregator::{aggregate_dependents, AggregateStats};
use crate::extractor::{analyze_package, primary_class, ExtractOptions};
use crossbeam_channel::{unbounded, Receiver, Sender};
use pakscan_core::error::{PakError, PakResult};
use pakscan_core::{ArchiveSummary, AssetSummary, ClassMap, InputFile, PackageArena};
use pakscan_provider::PackageSource;
use parking_lot::Mutex;
use rayon::prelude::*;
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

const SCAN_THREAD_NAME: &str = "asset-parse";

// ---------------------------------------------------------------------------
// Configuration and results
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct ScanConfig {
    /// Worker threads; `None` uses the available parallelism.
    pub threads: Option<usize>,
    pub include_preload_dependencies: bool,
}

impl ScanConfig {
    fn extract_options(&self) -> ExtractOptions {
        ExtractOptions {
            include_preload_dependencies: self.include_preload_dependencies,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ScanState {
    Idle,
    Running,
    Completed,
    Cancelled,
    /// The scanner is being dropped.
    ShuttingDown,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScanStats {
    pub parsed: usize,
    /// Stream or header failures; no summary was produced.
    pub failed: usize,
    /// Cancelled, delete records, or files whose archive is gone.
    pub skipped: usize,
    /// Parsed with at least one failed section.
    pub degraded: usize,
}

/// Final outcome of one scan.
#[derive(Debug)]
pub struct ScanReport {
    pub cancelled: bool,
    pub class_map: ClassMap,
    pub packages: PackageArena,
    pub stats: ScanStats,
    pub aggregate: AggregateStats,
    pub elapsed: Duration,
}

/// How the [`ScanReport`] reaches the caller.
#[derive(Clone)]
pub enum CompletionDelivery {
    /// Sent over a channel; the caller receives on its own thread.
    Channel(Sender<ScanReport>),
    /// Invoked on the scan thread. Must not block.
    Callback(Arc<dyn Fn(ScanReport) + Send + Sync>),
}

impl CompletionDelivery {
    /// Channel delivery plus the receiving end.
    pub fn channel() -> (Self, Receiver<ScanReport>) {
        let (tx, rx) = unbounded();
        (CompletionDelivery::Channel(tx), rx)
    }

    pub fn callback(f: impl Fn(ScanReport) + Send + Sync + 'static) -> Self {
        CompletionDelivery::Callback(Arc::new(f))
    }

    fn deliver(&self, report: ScanReport) {
        match self {
            CompletionDelivery::Channel(tx) => {
                if tx.send(report).is_err() {
                    tracing::debug!("scan report receiver dropped");
                }
            }
            CompletionDelivery::Callback(f) => f(report),
        }
    }
}

impl fmt::Debug for CompletionDelivery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompletionDelivery::Channel(_) => f.write_str("Channel"),
            CompletionDelivery::Callback(_) => f.write_str("Callback"),
        }
    }
}

// ---------------------------------------------------------------------------
// Scanner
// ---------------------------------------------------------------------------

/// Owns the scan thread and its cancellation flag.
pub struct AssetScanner {
    source: Arc<dyn PackageSource>,
    config: ScanConfig,
    delivery: CompletionDelivery,
    state: Arc<Mutex<ScanState>>,
    cancel: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl AssetScanner {
    pub fn new(
        source: Arc<dyn PackageSource>,
        config: ScanConfig,
        delivery: CompletionDelivery,
    ) -> Self {
        Self {
            source,
            config,
            delivery,
            state: Arc::new(Mutex::new(ScanState::Idle)),
            cancel: Arc::new(AtomicBool::new(false)),
            handle: None,
        }
    }

    pub fn state(&self) -> ScanState {
        *self.state.lock()
    }

    pub fn is_running(&self) -> bool {
        self.state() == ScanState::Running
    }

    /// Starts scanning `files` on a background thread.
    ///
    /// A scan already in flight is cancelled and joined first.
    pub fn start(&mut self, files: Vec<InputFile>, archives: Vec<ArchiveSummary>) -> PakResult<()> {
        if self.handle.is_some() {
            tracing::info!("restarting scan, stopping the current one");
            self.stop();
        }

        let mut builder = rayon::ThreadPoolBuilder::new()
            .thread_name(|i| format!("{SCAN_THREAD_NAME}-{i}"));
        if let Some(threads) = self.config.threads {
            builder = builder.num_threads(threads);
        }
        let pool = builder
            .build()
            .map_err(|e| PakError::Internal(format!("failed to build scan pool: {e}")))?;

        let job = ScanJob {
            source: Arc::clone(&self.source),
            options: self.config.extract_options(),
            delivery: self.delivery.clone(),
            state: Arc::clone(&self.state),
            cancel: Arc::clone(&self.cancel),
            files,
            archives,
        };

        *self.state.lock() = ScanState::Running;
        let handle = std::thread::Builder::new()
            .name(SCAN_THREAD_NAME.into())
            .spawn(move || job.run(&pool))
            .map_err(|e| {
                *self.state.lock() = ScanState::Idle;
                PakError::Internal(format!("failed to spawn scan thread: {e}"))
            })?;
        self.handle = Some(handle);
        Ok(())
    }

    /// Cancels the current scan and blocks until its thread has returned.
    ///
    /// Files already being decoded finish first.
    pub fn stop(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        self.cancel.store(true, Ordering::SeqCst);
        if handle.join().is_err() {
            tracing::error!("scan thread panicked");
        }
        self.cancel.store(false, Ordering::SeqCst);
    }

    /// Blocks until the current scan finishes on its own.
    pub fn wait(&mut self) {
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::error!("scan thread panicked");
            }
        }
    }
}

impl Drop for AssetScanner {
    fn drop(&mut self) {
        *self.state.lock() = ScanState::ShuttingDown;
        self.stop();
    }
}

// ---------------------------------------------------------------------------
// Scan thread
// ---------------------------------------------------------------------------

struct ScanJob {
    source: Arc<dyn PackageSource>,
    options: ExtractOptions,
    delivery: CompletionDelivery,
    state: Arc<Mutex<ScanState>>,
    cancel: Arc<AtomicBool>,
    files: Vec<InputFile>,
    archives: Vec<ArchiveSummary>,
}

enum FileOutcome {
    Parsed(Box<AssetSummary>, Option<String>),
    Failed,
    Skipped,
}

impl ScanJob {
    fn run(self, pool: &rayon::ThreadPool) {
        let started = Instant::now();
        tracing::info!(
            files = self.files.len(),
            archives = self.archives.len(),
            threads = pool.current_num_threads(),
            "scan started"
        );

        // Phase 1: independent per-file decode.
        let outcomes: Vec<FileOutcome> = pool.install(|| {
            self.files
                .par_iter()
                .map(|file| self.process_file(file))
                .collect()
        });

        let mut stats = ScanStats::default();
        let mut class_map = ClassMap::new();
        let mut summaries = Vec::with_capacity(outcomes.len());
        for outcome in outcomes {
            match outcome {
                FileOutcome::Parsed(summary, class) => {
                    stats.parsed += 1;
                    if summary.is_degraded() {
                        stats.degraded += 1;
                    }
                    if let Some(class) = class {
                        class_map.insert(summary.package_name.clone(), class);
                    }
                    summaries.push(Some(*summary));
                }
                FileOutcome::Failed => {
                    stats.failed += 1;
                    summaries.push(None);
                }
                FileOutcome::Skipped => {
                    stats.skipped += 1;
                    summaries.push(None);
                }
            }
        }

        // Phase 2: runs only once every file has been handled.
        let cancelled = self.cancel.load(Ordering::SeqCst);
        let aggregate = if cancelled {
            tracing::info!(parsed = stats.parsed, "scan cancelled, skipping aggregation");
            AggregateStats::default()
        } else {
            pool.install(|| aggregate_dependents(&mut summaries))
        };

        let packages = match PackageArena::from_parts(self.files, summaries) {
            Ok(arena) => arena,
            Err(e) => {
                tracing::error!(error = %e, "scan results out of step with input");
                PackageArena::default()
            }
        };

        let elapsed = started.elapsed();
        tracing::info!(
            parsed = stats.parsed,
            failed = stats.failed,
            skipped = stats.skipped,
            degraded = stats.degraded,
            cancelled,
            elapsed_ms = elapsed.as_millis() as u64,
            "scan finished"
        );

        {
            let mut state = self.state.lock();
            if *state == ScanState::Running {
                *state = if cancelled {
                    ScanState::Cancelled
                } else {
                    ScanState::Completed
                };
            }
        }

        self.delivery.deliver(ScanReport {
            cancelled,
            class_map,
            packages,
            stats,
            aggregate,
            elapsed,
        });
    }

    fn process_file(&self, file: &InputFile) -> FileOutcome {
        if self.cancel.load(Ordering::Relaxed) {
            return FileOutcome::Skipped;
        }
        if file.entry.is_delete_record {
            return FileOutcome::Skipped;
        }
        // The archive list may have changed since the file list was built.
        let Some(archive) = self.archives.get(file.owner_archive) else {
            tracing::debug!(
                path = %file.path,
                archive = file.owner_archive,
                "owning archive no longer present"
            );
            return FileOutcome::Skipped;
        };

        let package_name = file.long_package_name(archive);
        let data = match self.source.read_package(file, archive) {
            Ok(data) => data,
            Err(e) => {
                tracing::warn!(package = %package_name, error = %e, "failed to read package");
                return FileOutcome::Failed;
            }
        };

        match analyze_package(&data, &package_name, self.options) {
            Ok(summary) => {
                let class = primary_class(&summary);
                FileOutcome::Parsed(Box::new(summary), class)
            }
            Err(e) => {
                tracing::warn!(package = %package_name, error = %e, "skipping package");
                FileOutcome::Failed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{ExportSpec, PackageBuilder};
    use pakscan_core::{EntryMeta, FileId};
    use pakscan_provider::MemorySource;

    fn package(deps: &[&str], class: Option<&str>) -> Vec<u8> {
        let mut b = PackageBuilder::new();
        let imports: Vec<_> = deps.iter().map(|d| b.import_package(d)).collect();
        let mut spec = ExportSpec::new("Main").asset().depends(imports);
        if let Some(class) = class {
            spec = spec.class(b.import_class("/Script/Engine", class));
        }
        b.export(spec);
        b.build()
    }

    fn file(path: &str) -> InputFile {
        InputFile::new(0, path, EntryMeta::default())
    }

    fn archives() -> Vec<ArchiveSummary> {
        vec![ArchiveSummary::new("memory", "/Game/")]
    }

    fn abc_source() -> MemorySource {
        let mut source = MemorySource::new();
        source
            .insert("A.uasset", package(&["/Game/B"], Some("StaticMesh")))
            .insert("B.uasset", package(&[], Some("Texture2D")))
            .insert("C.uasset", package(&[], None))
            .insert("Broken.uasset", vec![0xDE, 0xAD]);
        source
    }

    fn abc_files() -> Vec<InputFile> {
        ["A.uasset", "B.uasset", "C.uasset", "Broken.uasset", "Missing.uasset"]
            .into_iter()
            .map(file)
            .collect()
    }

    #[test]
    fn full_scan_over_channel() {
        let (delivery, rx) = CompletionDelivery::channel();
        let config = ScanConfig {
            threads: Some(2),
            ..Default::default()
        };
        let mut scanner = AssetScanner::new(Arc::new(abc_source()), config, delivery);
        assert_eq!(scanner.state(), ScanState::Idle);

        scanner.start(abc_files(), archives()).unwrap();
        let report = rx.recv_timeout(Duration::from_secs(10)).unwrap();
        scanner.wait();

        assert_eq!(scanner.state(), ScanState::Completed);
        assert!(!report.cancelled);
        assert_eq!(
            report.stats,
            ScanStats {
                parsed: 3,
                failed: 2,
                skipped: 0,
                degraded: 0,
            }
        );

        let packages = &report.packages;
        assert_eq!(packages.len(), 5);
        let b = packages.summary(FileId(1)).unwrap();
        assert_eq!(b.package_name, "/Game/B");
        assert_eq!(b.dependents.len(), 1);
        assert_eq!(b.dependents[0].target, "/Game/A");
        assert!(packages.summary(FileId(2)).unwrap().dependents.is_empty());
        assert!(packages.summary(FileId(3)).is_none());
        assert!(packages.summary(FileId(4)).is_none());

        assert_eq!(report.class_map.get("/Game/A").unwrap(), "StaticMesh");
        assert_eq!(report.class_map.get("/Game/B").unwrap(), "Texture2D");
        assert!(!report.class_map.contains_key("/Game/C"));
        assert_eq!(report.aggregate.packages_updated, 1);
    }

    #[test]
    fn stale_archive_and_delete_records_are_skipped() {
        let mut source = MemorySource::new();
        source.insert("A.uasset", package(&[], None));
        let mut deleted = file("A.uasset");
        deleted.entry.is_delete_record = true;
        let files = vec![
            file("A.uasset"),
            InputFile::new(7, "A.uasset", EntryMeta::default()),
            deleted,
        ];

        let (delivery, rx) = CompletionDelivery::channel();
        let mut scanner = AssetScanner::new(Arc::new(source), ScanConfig::default(), delivery);
        scanner.start(files, archives()).unwrap();
        let report = rx.recv_timeout(Duration::from_secs(10)).unwrap();

        assert_eq!(report.stats.parsed, 1);
        assert_eq!(report.stats.skipped, 2);
        assert_eq!(report.stats.failed, 0);
    }

    #[test]
    fn callback_runs_on_scan_thread() {
        let seen = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&seen);
        let delivery = CompletionDelivery::callback(move |report: ScanReport| {
            let thread = std::thread::current().name().map(str::to_string);
            *sink.lock() = Some((thread, report.stats.parsed));
        });

        let mut scanner = AssetScanner::new(Arc::new(abc_source()), ScanConfig::default(), delivery);
        scanner.start(abc_files(), archives()).unwrap();
        scanner.wait();

        let (thread, parsed) = seen.lock().take().unwrap();
        assert_eq!(thread.as_deref(), Some(SCAN_THREAD_NAME));
        assert_eq!(parsed, 3);
    }

    /// Source that takes a while per file.
    struct SlowSource {
        inner: MemorySource,
        delay: Duration,
    }

    impl PackageSource for SlowSource {
        fn read_package(&self, file: &InputFile, archive: &ArchiveSummary) -> PakResult<Vec<u8>> {
            std::thread::sleep(self.delay);
            self.inner.read_package(file, archive)
        }
    }

    fn slow_scanner(count: usize) -> (AssetScanner, Vec<InputFile>, Receiver<ScanReport>) {
        let mut inner = MemorySource::new();
        let mut files = Vec::with_capacity(count);
        for i in 0..count {
            let path = format!("P{i}.uasset");
            inner.insert(&path, package(&[], None));
            files.push(file(&path));
        }
        let source = SlowSource {
            inner,
            delay: Duration::from_millis(10),
        };
        let config = ScanConfig {
            threads: Some(1),
            ..Default::default()
        };
        let (delivery, rx) = CompletionDelivery::channel();
        (AssetScanner::new(Arc::new(source), config, delivery), files, rx)
    }

    #[test]
    fn stop_cancels_and_joins() {
        let (mut scanner, files, rx) = slow_scanner(200);
        scanner.start(files, archives()).unwrap();
        std::thread::sleep(Duration::from_millis(50));
        scanner.stop();

        // The thread has returned, so the report is already queued.
        let report = rx.try_recv().unwrap();
        assert!(report.cancelled);
        assert_eq!(scanner.state(), ScanState::Cancelled);
        assert!(report.stats.parsed < 200);
        assert_eq!(report.stats.parsed + report.stats.skipped, 200);
        assert_eq!(report.packages.parsed_count(), report.stats.parsed);
        assert_eq!(report.aggregate, AggregateStats::default());
    }

    #[test]
    fn restart_replaces_running_scan() {
        let (mut scanner, files, rx) = slow_scanner(200);
        scanner.start(files.clone(), archives()).unwrap();
        assert!(scanner.is_running());

        scanner.start(files[..3].to_vec(), archives()).unwrap();
        let first = rx.recv_timeout(Duration::from_secs(10)).unwrap();
        assert!(first.cancelled);

        let second = rx.recv_timeout(Duration::from_secs(10)).unwrap();
        scanner.wait();
        assert!(!second.cancelled);
        assert_eq!(second.stats.parsed, 3);
        assert_eq!(scanner.state(), ScanState::Completed);
    }

    #[test]
    fn drop_stops_running_scan() {
        let (mut scanner, files, rx) = slow_scanner(200);
        scanner.start(files, archives()).unwrap();
        drop(scanner);
        let report = rx.try_recv().unwrap();
        assert!(report.cancelled);
    }
}
