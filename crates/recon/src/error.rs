use std::fmt;

/// Contract violations and loading failures.
///
/// Preservation findings (format mismatch, unmatched streams, charset
/// advisories) are never reported through this type; they end up in
/// [`ComparisonResult`](crate::model::ComparisonResult).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconError {
    /// Scraped attributes carry both an alias and its canonical key with different values.
    DuplicateSynonymKey {
        alias: String,
        canonical: String,
        alias_value: String,
        canonical_value: String,
    },
    /// Stream kind tag outside `audio` / `video`.
    InvalidStreamKind(String),
    /// Declared or scraped record breaks a structural invariant.
    InvalidRecord(String),
    /// TOML parse / deserialization error.
    ConfigParse(String),
    /// Rule table validation error.
    ConfigValidation(String),
    /// JSON record deserialization error.
    Json(String),
    /// IO error (rules file read, etc.).
    Io(String),
}

impl fmt::Display for ReconError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateSynonymKey {
                alias,
                canonical,
                alias_value,
                canonical_value,
            } => write!(
                f,
                "scraped stream has both '{alias}' = '{alias_value}' and '{canonical}' = '{canonical_value}'"
            ),
            Self::InvalidStreamKind(kind) => write!(f, "invalid stream kind: {kind}"),
            Self::InvalidRecord(msg) => write!(f, "invalid record: {msg}"),
            Self::ConfigParse(msg) => write!(f, "rules parse error: {msg}"),
            Self::ConfigValidation(msg) => write!(f, "rules validation error: {msg}"),
            Self::Json(msg) => write!(f, "JSON error: {msg}"),
            Self::Io(msg) => write!(f, "IO error: {msg}"),
        }
    }
}

impl std::error::Error for ReconError {}

impl From<serde_json::Error> for ReconError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json(e.to_string())
    }
}
