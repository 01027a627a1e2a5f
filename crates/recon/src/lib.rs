//! `techmd-recon`: declared vs. scraped technical metadata reconciliation.
//!
//! Pure engine crate: receives already-parsed records, returns verdicts.
//! No XML parsing, format detection or validator invocation.

pub mod config;
pub mod engine;
pub mod error;
pub mod harmonize;
pub mod matcher;
pub mod model;
pub mod normalize;
pub mod package;

pub use config::ReconConfig;
pub use engine::{reconcile, reconcile_with, MetadataComparator};
pub use error::ReconError;
pub use matcher::StreamMatch;
pub use model::{ComparisonResult, DeclaredRecord, ScrapedStream, ScrapedStreams};
pub use package::{reconcile_package, DigitalObject, PackageReport};
