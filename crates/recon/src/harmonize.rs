use std::collections::BTreeSet;

use crate::config::ReconConfig;
use crate::model::{ScrapedFormat, StreamFormat, VersionState};

const PDF_MIMETYPE: &str = "application/pdf";
const PLAINTEXT_MIMETYPE: &str = "text/plain";

/// Declared version strings consistent with what the scraper found.
///
/// An empty set means no declared version can be accepted.
pub fn harmonized_versions(scraped: &ScrapedFormat, rules: &ReconConfig) -> BTreeSet<String> {
    let mut versions = BTreeSet::new();

    match scraped.version_state() {
        VersionState::NotApplicable => {
            versions.insert(String::new());
        }
        VersionState::Unavailable | VersionState::Absent => {
            if let Some(known) = rules.known_unav_versions.get(&scraped.mimetype) {
                versions.extend(known.iter().cloned());
            }
        }
        VersionState::Value(v) => {
            versions.insert(v.to_string());
        }
    }

    // A general PDF version is consistent with a detected PDF/A profile.
    if scraped.mimetype == PDF_MIMETYPE {
        if let Some(profile) = scraped.version.as_deref() {
            for (base, profiles) in &rules.pdf_version_subsets {
                if profiles.iter().any(|p| p == profile) {
                    versions.insert(base.clone());
                }
            }
        }
    }

    versions
}

fn mimetypes_compatible(declared: &str, scraped: &str, is_textfile: bool) -> bool {
    declared == scraped
        || (is_textfile && declared == PLAINTEXT_MIMETYPE && scraped.starts_with("text/"))
}

/// Whether a declared mimetype/version is consistent with the scraped one.
///
/// For text files a generic `text/plain` declaration covers every text subtype.
pub fn formats_compatible(
    declared: &StreamFormat,
    scraped: &ScrapedFormat,
    is_textfile: bool,
    rules: &ReconConfig,
) -> bool {
    mimetypes_compatible(&declared.mimetype, &scraped.mimetype, is_textfile)
        && harmonized_versions(scraped, rules).contains(&declared.version)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{UNAP, UNAV};

    fn declared(mimetype: &str, version: &str) -> StreamFormat {
        StreamFormat {
            mimetype: mimetype.into(),
            version: version.into(),
        }
    }

    fn set(values: &[&str]) -> BTreeSet<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn not_applicable_expects_empty() {
        let rules = ReconConfig::default();
        let scraped = ScrapedFormat::new("text/plain", Some(UNAP));
        assert_eq!(harmonized_versions(&scraped, &rules), set(&[""]));
    }

    #[test]
    fn unavailable_uses_known_table() {
        let rules = ReconConfig::default();
        let odt = ScrapedFormat::new("application/vnd.oasis.opendocument.text", Some(UNAV));
        assert_eq!(harmonized_versions(&odt, &rules), set(&["1.0", "1.1", "1.2"]));

        let odf = ScrapedFormat::new("application/vnd.oasis.opendocument.formula", None);
        assert_eq!(harmonized_versions(&odf, &rules), set(&["1.0", "1.2"]));
    }

    #[test]
    fn unavailable_unknown_format_accepts_nothing() {
        let rules = ReconConfig::default();
        let scraped = ScrapedFormat::new("image/tiff", Some(UNAV));
        assert!(harmonized_versions(&scraped, &rules).is_empty());
        assert!(!formats_compatible(&declared("image/tiff", ""), &scraped, false, &rules));
        assert!(!formats_compatible(&declared("image/tiff", UNAV), &scraped, false, &rules));
    }

    #[test]
    fn concrete_version_is_exact() {
        let rules = ReconConfig::default();
        let scraped = ScrapedFormat::new("image/jpeg", Some("1.02"));
        assert_eq!(harmonized_versions(&scraped, &rules), set(&["1.02"]));
        assert!(formats_compatible(&declared("image/jpeg", "1.02"), &scraped, false, &rules));
        assert!(!formats_compatible(&declared("image/jpeg", ""), &scraped, false, &rules));
    }

    #[test]
    fn empty_scraped_version_is_a_value() {
        let rules = ReconConfig::default();
        let scraped = ScrapedFormat::new("image/png", Some(""));
        assert_eq!(harmonized_versions(&scraped, &rules), set(&[""]));
    }

    #[test]
    fn pdf_a_profiles_accept_base_version() {
        let rules = ReconConfig::default();
        let a1b = ScrapedFormat::new("application/pdf", Some("A-1b"));
        assert_eq!(harmonized_versions(&a1b, &rules), set(&["1.4", "A-1b"]));

        let a3u = ScrapedFormat::new("application/pdf", Some("A-3u"));
        assert!(harmonized_versions(&a3u, &rules).contains("1.7"));
        assert!(formats_compatible(&declared("application/pdf", "1.7"), &a3u, false, &rules));
        assert!(!formats_compatible(&declared("application/pdf", "1.4"), &a3u, false, &rules));
    }

    #[test]
    fn profile_tag_outside_pdf_is_literal() {
        let rules = ReconConfig::default();
        let scraped = ScrapedFormat::new("application/x-pdfa", Some("A-1b"));
        assert_eq!(harmonized_versions(&scraped, &rules), set(&["A-1b"]));
    }

    #[test]
    fn plaintext_covers_text_subtypes_only_for_text_files() {
        let rules = ReconConfig::default();
        let html = ScrapedFormat::new("text/html", Some("5"));
        let plain = declared("text/plain", "5");
        assert!(formats_compatible(&plain, &html, true, &rules));
        assert!(!formats_compatible(&plain, &html, false, &rules));

        let xml = ScrapedFormat::new("application/xml", Some("1.0"));
        assert!(!formats_compatible(&declared("text/plain", "1.0"), &xml, true, &rules));
    }
}
