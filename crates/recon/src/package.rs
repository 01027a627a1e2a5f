use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::ReconConfig;
use crate::engine::{reconcile_with, MATCHES_MESSAGE};
use crate::error::ReconError;
use crate::model::{ComparisonResult, DeclaredRecord, ScrapedStreams};

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// One file of an archival package with both of its descriptions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DigitalObject {
    pub declared: DeclaredRecord,
    pub scraped: ScrapedStreams,
    /// Files that failed well-formedness checks upstream are not compared.
    #[serde(default = "default_well_formed")]
    pub well_formed: bool,
}

fn default_well_formed() -> bool {
    true
}

impl DigitalObject {
    pub fn new(declared: DeclaredRecord, scraped: ScrapedStreams) -> Self {
        Self {
            declared,
            scraped,
            well_formed: true,
        }
    }
}

/// Parse a JSON array of digital objects.
pub fn objects_from_json(input: &str) -> Result<Vec<DigitalObject>, ReconError> {
    Ok(serde_json::from_str(input)?)
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectStatus {
    Valid,
    Invalid,
    Skipped,
}

impl std::fmt::Display for ObjectStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Valid => write!(f, "valid"),
            Self::Invalid => write!(f, "invalid"),
            Self::Skipped => write!(f, "skipped"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObjectOutcome {
    pub filename: String,
    pub status: ObjectStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<ComparisonResult>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackageSummary {
    pub total: usize,
    pub valid: usize,
    pub invalid: usize,
    pub skipped: usize,
    /// Compared objects carrying advisories or found-value notes.
    pub with_messages: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportMeta {
    pub rules_name: String,
    pub engine_version: String,
    pub run_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PackageReport {
    pub meta: ReportMeta,
    pub summary: PackageSummary,
    /// Same order as the input objects.
    pub objects: Vec<ObjectOutcome>,
}

// ---------------------------------------------------------------------------
// Run
// ---------------------------------------------------------------------------

pub fn reconcile_object(object: &DigitalObject, rules: &ReconConfig) -> Result<ObjectOutcome, ReconError> {
    let filename = object.declared.filename.clone();
    if !object.well_formed {
        log::debug!("'{filename}' is not well-formed, comparison skipped");
        return Ok(ObjectOutcome {
            filename,
            status: ObjectStatus::Skipped,
            result: None,
        });
    }

    let result = reconcile_with(&object.declared, &object.scraped, rules)?;
    let status = if result.is_valid {
        ObjectStatus::Valid
    } else {
        ObjectStatus::Invalid
    };
    Ok(ObjectOutcome {
        filename,
        status,
        result: Some(result),
    })
}

/// Reconcile every object of a package on a pool of `concurrency` threads.
///
/// Objects are independent; the first contract violation aborts the run.
pub fn reconcile_package(
    objects: &[DigitalObject],
    rules: &ReconConfig,
    concurrency: usize,
) -> Result<PackageReport, ReconError> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(concurrency.max(1))
        .build()
        .map_err(|e| ReconError::Io(format!("thread pool: {e}")))?;

    let outcomes: Vec<ObjectOutcome> = pool.install(|| {
        objects
            .par_iter()
            .map(|object| reconcile_object(object, rules))
            .collect::<Result<Vec<_>, ReconError>>()
    })?;

    let summary = compute_summary(&outcomes);
    log::debug!(
        "package reconciled: {} objects, {} valid, {} invalid, {} skipped",
        summary.total,
        summary.valid,
        summary.invalid,
        summary.skipped
    );

    Ok(PackageReport {
        meta: ReportMeta {
            rules_name: rules.name.clone(),
            engine_version: env!("CARGO_PKG_VERSION").to_string(),
            run_at: chrono::Utc::now().to_rfc3339(),
        },
        summary,
        objects: outcomes,
    })
}

/// Compute summary statistics from per-object outcomes.
pub fn compute_summary(outcomes: &[ObjectOutcome]) -> PackageSummary {
    let mut valid = 0;
    let mut invalid = 0;
    let mut skipped = 0;
    let mut with_messages = 0;

    for o in outcomes {
        match o.status {
            ObjectStatus::Valid => valid += 1,
            ObjectStatus::Invalid => invalid += 1,
            ObjectStatus::Skipped => skipped += 1,
        }
        if let Some(ref result) = o.result {
            if result.messages.iter().any(|m| m != MATCHES_MESSAGE) {
                with_messages += 1;
            }
        }
    }

    PackageSummary {
        total: outcomes.len(),
        valid,
        invalid,
        skipped,
        with_messages,
    }
}
