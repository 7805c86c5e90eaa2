//! Package decoding, reference resolution, dependency extraction, reverse
//! aggregation and the parallel scanner that ties them together.

pub mod aggregator;
pub mod builder;
pub mod extractor;
pub mod reader;
pub mod reporter;
pub mod resolver;
pub mod scanner;

pub use aggregator::{aggregate_dependents, build_dependents_index, AggregateStats};
pub use extractor::{analyze_package, extract_dependencies, primary_class, ExtractOptions};
pub use reader::read_package;
pub use reporter::Report;
pub use resolver::{resolve, resolve_paths, ResolveContext};
pub use scanner::{
    AssetScanner, CompletionDelivery, ScanConfig, ScanReport, ScanState, ScanStats,
};
