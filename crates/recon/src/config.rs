use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::Deserialize;

use crate::error::ReconError;
use crate::model::{ETAL, UNAV};

/// Upper bound for `decimals`; beyond this f64 rendering stops being meaningful.
const MAX_DECIMALS: u32 = 10;

// ---------------------------------------------------------------------------
// Top-level rules
// ---------------------------------------------------------------------------

/// Rule tables driving harmonization and tolerant comparison.
///
/// `Default` carries the built-in tables. A TOML file may override any
/// section; sections it leaves out keep their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReconConfig {
    pub name: String,
    /// Rounding applied to scraped numeric values.
    pub decimals: u32,
    /// Declared values meaning "not determined".
    pub unavailable_values: Vec<String>,
    /// Keys where a declared `(:etal)` accepts any scraped value.
    pub etal_allowed_keys: Vec<String>,
    /// Audio keys whose scraped values are rounded to integers.
    pub integer_value_keys: Vec<String>,
    /// Versions a declared record may claim when the scraper reports `(:unav)`.
    pub known_unav_versions: BTreeMap<String, Vec<String>>,
    /// General PDF version -> PDF/A profile tags it subsumes.
    pub pdf_version_subsets: BTreeMap<String, Vec<String>>,
    /// Scraper key names copied under the declared-metadata name.
    pub key_synonyms: Vec<KeySynonym>,
}

// ---------------------------------------------------------------------------
// Key synonyms
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KeySynonym {
    /// Name used by the characterization tool.
    pub alias: String,
    /// Name used in declared metadata.
    pub canonical: String,
}

impl KeySynonym {
    pub fn new(alias: &str, canonical: &str) -> Self {
        Self {
            alias: alias.into(),
            canonical: canonical.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

const OPENDOCUMENT_VERSIONS: [&str; 3] = ["1.0", "1.1", "1.2"];

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

impl Default for ReconConfig {
    fn default() -> Self {
        let known_unav_versions = BTreeMap::from([
            (
                "application/vnd.oasis.opendocument.text".to_string(),
                strings(&OPENDOCUMENT_VERSIONS),
            ),
            (
                "application/vnd.oasis.opendocument.spreadsheet".to_string(),
                strings(&OPENDOCUMENT_VERSIONS),
            ),
            (
                "application/vnd.oasis.opendocument.presentation".to_string(),
                strings(&OPENDOCUMENT_VERSIONS),
            ),
            (
                "application/vnd.oasis.opendocument.graphics".to_string(),
                strings(&OPENDOCUMENT_VERSIONS),
            ),
            (
                "application/vnd.oasis.opendocument.formula".to_string(),
                strings(&["1.0", "1.2"]),
            ),
        ]);

        let pdf_version_subsets = BTreeMap::from([
            ("1.4".to_string(), strings(&["A-1a", "A-1b"])),
            (
                "1.7".to_string(),
                strings(&["A-2a", "A-2b", "A-2u", "A-3a", "A-3b", "A-3u"]),
            ),
        ]);

        Self {
            name: "default".into(),
            decimals: 2,
            unavailable_values: strings(&[UNAV, "0"]),
            etal_allowed_keys: strings(&["display_aspect_ratio"]),
            integer_value_keys: strings(&["data_rate"]),
            known_unav_versions,
            pdf_version_subsets,
            key_synonyms: vec![
                KeySynonym::new("frame_rate", "avg_frame_rate"),
                KeySynonym::new("data_rate", "bit_rate"),
                KeySynonym::new("dar", "display_aspect_ratio"),
                KeySynonym::new("num_channels", "channels"),
                KeySynonym::new("sampling_frequency", "sample_rate"),
            ],
        }
    }
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl ReconConfig {
    pub fn from_toml(input: &str) -> Result<Self, ReconError> {
        let config: ReconConfig =
            toml::from_str(input).map_err(|e| ReconError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: &Path) -> Result<Self, ReconError> {
        let input = std::fs::read_to_string(path)
            .map_err(|e| ReconError::Io(format!("{}: {e}", path.display())))?;
        Self::from_toml(&input)
    }

    pub fn validate(&self) -> Result<(), ReconError> {
        if self.decimals > MAX_DECIMALS {
            return Err(ReconError::ConfigValidation(format!(
                "decimals must be at most {MAX_DECIMALS}, got {}",
                self.decimals
            )));
        }

        if self.unavailable_values.iter().any(|v| v == ETAL) {
            return Err(ReconError::ConfigValidation(format!(
                "'{ETAL}' cannot be an unavailable value"
            )));
        }

        let mut canonicals = BTreeSet::new();
        for syn in &self.key_synonyms {
            if syn.alias.is_empty() || syn.canonical.is_empty() {
                return Err(ReconError::ConfigValidation(
                    "key synonym names must not be empty".into(),
                ));
            }
            if syn.alias == syn.canonical {
                return Err(ReconError::ConfigValidation(format!(
                    "key synonym '{}' maps to itself",
                    syn.alias
                )));
            }
            if !canonicals.insert(syn.canonical.as_str()) {
                return Err(ReconError::ConfigValidation(format!(
                    "key '{}' is the target of more than one synonym",
                    syn.canonical
                )));
            }
        }

        for (mimetype, versions) in &self.known_unav_versions {
            if versions.is_empty() {
                return Err(ReconError::ConfigValidation(format!(
                    "known_unav_versions '{mimetype}' lists no versions"
                )));
            }
        }

        let mut seen_tags = BTreeSet::new();
        for tags in self.pdf_version_subsets.values() {
            for tag in tags {
                if !seen_tags.insert(tag.as_str()) {
                    return Err(ReconError::ConfigValidation(format!(
                        "PDF profile '{tag}' listed under more than one base version"
                    )));
                }
            }
        }

        Ok(())
    }

    /// Rounding for a scraped value of `key`.
    pub fn decimals_for(&self, key: &str, integer_valued: bool) -> u32 {
        if integer_valued && self.integer_value_keys.iter().any(|k| k == key) {
            0
        } else {
            self.decimals
        }
    }

    pub fn is_unavailable(&self, value: &str) -> bool {
        self.unavailable_values.iter().any(|v| v == value)
    }

    pub fn etal_allowed(&self, key: &str) -> bool {
        self.etal_allowed_keys.iter().any(|k| k == key)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
