use std::cell::OnceCell;

use serde::Serialize;

use crate::config::ReconConfig;
use crate::error::ReconError;
use crate::harmonize::formats_compatible;
use crate::matcher::{match_streams, ScrapedStreamRecord, StreamMatch};
use crate::model::{
    ComparisonResult, DeclaredRecord, ScrapedStreams, StreamGroup, StreamKind, StreamRecord,
    StreamType,
};
use crate::normalize::prepare_scraped_attrs;

/// Message appended when no check recorded an error.
pub const MATCHES_MESSAGE: &str = "Declared metadata matches scraped metadata.";

/// Reconcile with the built-in rule tables.
pub fn reconcile(
    declared: &DeclaredRecord,
    scraped: &ScrapedStreams,
) -> Result<ComparisonResult, ReconError> {
    reconcile_with(declared, scraped, &ReconConfig::default())
}

pub fn reconcile_with(
    declared: &DeclaredRecord,
    scraped: &ScrapedStreams,
    rules: &ReconConfig,
) -> Result<ComparisonResult, ReconError> {
    MetadataComparator::new(declared, scraped, rules)?
        .result()
        .cloned()
}

/// Checks one declared record against one scrape.
///
/// Checks run in a fixed order:
/// 1. primary format (and charset, for text files) against stream 0;
/// 2. each stream group present on the record, in [`StreamGroup::ALL`] order.
///
/// The verdict is computed on the first [`result`](Self::result) call and
/// memoized; later calls return the same value without re-running checks.
pub struct MetadataComparator<'a> {
    declared: &'a DeclaredRecord,
    scraped: &'a ScrapedStreams,
    rules: &'a ReconConfig,
    result: OnceCell<ComparisonResult>,
}

impl<'a> MetadataComparator<'a> {
    pub fn new(
        declared: &'a DeclaredRecord,
        scraped: &'a ScrapedStreams,
        rules: &'a ReconConfig,
    ) -> Result<Self, ReconError> {
        declared.validate()?;
        Ok(Self {
            declared,
            scraped,
            rules,
            result: OnceCell::new(),
        })
    }

    /// Contract violations (`DuplicateSynonymKey`) are returned as `Err`
    /// and nothing is memoized.
    pub fn result(&self) -> Result<&ComparisonResult, ReconError> {
        if let Some(result) = self.result.get() {
            return Ok(result);
        }
        let computed = self.run_checks()?;
        Ok(self.result.get_or_init(|| computed))
    }

    fn is_textfile(&self) -> bool {
        self.scraped.primary().stream_type == StreamType::Text
    }

    fn run_checks(&self) -> Result<ComparisonResult, ReconError> {
        log::debug!("reconciling '{}'", self.declared.filename);

        let mut findings = Findings::default();
        self.check_format(&mut findings);
        for group in self.declared.stream_groups() {
            self.check_streams(group, &mut findings)?;
        }

        let is_valid = findings.errors.is_empty();
        if is_valid {
            findings.messages.push(MATCHES_MESSAGE.to_string());
        }
        log::debug!(
            "'{}': valid={is_valid}, {} message(s), {} error(s)",
            self.declared.filename,
            findings.messages.len(),
            findings.errors.len()
        );

        Ok(ComparisonResult {
            is_valid,
            messages: findings.messages,
            errors: findings
                .errors
                .into_iter()
                .map(|e| format!("ERROR: {e}"))
                .collect(),
        })
    }

    fn check_format(&self, findings: &mut Findings) {
        let declared = &self.declared.format;
        let scraped = self.scraped.primary().format();
        let is_textfile = self.is_textfile();

        if is_textfile {
            self.check_charset(findings);
        }
        if !formats_compatible(&declared.stream_format(), &scraped, is_textfile, self.rules) {
            findings.add_error("Missing or incorrect mimetype/version.", declared, &scraped);
        }
    }

    /// Charset detection is a guess, so a difference is advisory only.
    fn check_charset(&self, findings: &mut Findings) {
        let declared = self.declared.format.charset.as_deref();
        let scraped = self.scraped.primary().charset.as_deref();
        if declared != scraped {
            findings.messages.push(format!(
                "Declared and scraped character sets do not match. Declared: {} Scraped: {}",
                declared.unwrap_or("None"),
                scraped.unwrap_or("None")
            ));
        }
    }

    fn check_streams(&self, group: StreamGroup, findings: &mut Findings) -> Result<(), ReconError> {
        let kind = group.kind();
        let declared = self.declared.declared_streams(group);
        let scraped = self.scraped_streams(kind)?;

        match match_streams(&declared, &scraped, kind, self.rules) {
            StreamMatch::Matched { notes, .. } => findings.messages.extend(notes),
            StreamMatch::NoMatch => findings.add_error(
                &format!(
                    "{kind} streams in {} are not what is described in metadata.",
                    self.declared.filename
                ),
                &declared,
                &scraped,
            ),
        }
        Ok(())
    }

    /// Scraped streams of one kind, rounded and synonymized for comparison.
    fn scraped_streams(&self, kind: StreamKind) -> Result<Vec<ScrapedStreamRecord>, ReconError> {
        let integer_valued = kind == StreamKind::Audio;
        self.scraped
            .of_type(kind.stream_type())
            .map(|stream| {
                Ok(StreamRecord {
                    format: stream.format(),
                    attrs: prepare_scraped_attrs(&stream.attrs, integer_valued, self.rules)?,
                })
            })
            .collect()
    }
}

#[derive(Default)]
struct Findings {
    messages: Vec<String>,
    errors: Vec<String>,
}

impl Findings {
    /// Record an error with both compared values embedded for diagnosis.
    fn add_error<D: Serialize, S: Serialize>(&mut self, info: &str, declared: &D, scraped: &S) {
        self.errors.push(format!(
            "{info}\nDeclared: {},\nScraped: {}\n",
            to_pretty_json(declared),
            to_pretty_json(scraped)
        ));
    }
}

fn to_pretty_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|e| format!("<unserializable: {e}>"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AttrMap, DeclaredFormat, DeclaredStream, ScrapedStream, StreamFormat, UNAP, UNAV};

    fn attrs(pairs: &[(&str, &str)]) -> AttrMap {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    fn scraped(
        index: usize,
        stream_type: StreamType,
        mimetype: &str,
        version: &str,
        pairs: &[(&str, &str)],
    ) -> ScrapedStream {
        ScrapedStream {
            index,
            stream_type,
            mimetype: mimetype.into(),
            version: Some(version.into()),
            charset: None,
            attrs: attrs(pairs),
        }
    }

    fn text_case(declared_charset: &str) -> (DeclaredRecord, ScrapedStreams) {
        let declared = DeclaredRecord::new(
            "textfile",
            DeclaredFormat {
                mimetype: "text/plain".into(),
                version: String::new(),
                charset: Some(declared_charset.into()),
                alt_format: None,
            },
        );
        let mut stream = scraped(0, StreamType::Text, "text/plain", UNAP, &[]);
        stream.charset = Some("UTF-8".into());
        (declared, ScrapedStreams::from_streams(vec![stream]).unwrap())
    }

    fn wav_case(channels: &str) -> (DeclaredRecord, ScrapedStreams) {
        let mut declared = DeclaredRecord::new(
            "audiofile",
            DeclaredFormat {
                mimetype: "audio/x-wav".into(),
                ..Default::default()
            },
        );
        declared.audio = Some(attrs(&[
            ("bit_rate", "706"),
            ("bits_per_sample", "8"),
            ("channels", channels),
            ("sample_rate", "44.1"),
        ]));
        let stream = scraped(
            0,
            StreamType::Audio,
            "audio/x-wav",
            UNAP,
            &[
                ("bits_per_sample", "8"),
                ("data_rate", "705.6"),
                ("num_channels", "2"),
                ("sampling_frequency", "44.1"),
            ],
        );
        (declared, ScrapedStreams::from_streams(vec![stream]).unwrap())
    }

    #[test]
    fn plaintext_matches() {
        let (declared, scraped) = text_case("UTF-8");
        let result = reconcile(&declared, &scraped).unwrap();
        assert!(result.is_valid);
        assert_eq!(result.messages, vec![MATCHES_MESSAGE.to_string()]);
        assert!(result.errors.is_empty());
    }

    #[test]
    fn charset_difference_is_advisory() {
        let (declared, scraped) = text_case("UTF-16");
        let result = reconcile(&declared, &scraped).unwrap();
        assert!(result.is_valid);
        assert!(result.messages[0].contains("character sets do not match"));
        assert!(result.messages[0].contains("Declared: UTF-16 Scraped: UTF-8"));
        assert_eq!(result.messages.last().unwrap(), MATCHES_MESSAGE);
    }

    #[test]
    fn charset_ignored_for_non_text() {
        let declared = DeclaredRecord::new(
            "imagefile",
            DeclaredFormat {
                mimetype: "image/jpeg".into(),
                version: "1.02".into(),
                charset: Some("UTF-8".into()),
                alt_format: None,
            },
        );
        let scraped = ScrapedStreams::from_streams(vec![scraped(
            0,
            StreamType::Image,
            "image/jpeg",
            "1.02",
            &[],
        )])
        .unwrap();
        let result = reconcile(&declared, &scraped).unwrap();
        assert_eq!(result.messages, vec![MATCHES_MESSAGE.to_string()]);
    }

    #[test]
    fn format_mismatch_is_error_with_both_values() {
        let declared = DeclaredRecord::new(
            "imagefile",
            DeclaredFormat {
                mimetype: "image/jpeg".into(),
                ..Default::default()
            },
        );
        let scraped = ScrapedStreams::from_streams(vec![scraped(
            0,
            StreamType::Image,
            "image/jpeg",
            "1.02",
            &[],
        )])
        .unwrap();
        let result = reconcile(&declared, &scraped).unwrap();
        assert!(!result.is_valid);
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].starts_with("ERROR: Missing or incorrect mimetype/version."));
        assert!(result.errors[0].contains("\"1.02\""));
        assert!(!result.messages.contains(&MATCHES_MESSAGE.to_string()));
    }

    #[test]
    fn single_audio_stream_matches_after_normalization() {
        let (declared, scraped) = wav_case("2");
        let result = reconcile(&declared, &scraped).unwrap();
        assert!(result.is_valid, "{:?}", result.errors);
        assert_eq!(result.messages, vec![MATCHES_MESSAGE.to_string()]);
    }

    #[test]
    fn unavailable_declared_value_is_noted() {
        let (declared, scraped) = wav_case(UNAV);
        let result = reconcile(&declared, &scraped).unwrap();
        assert!(result.is_valid);
        assert_eq!(result.messages.len(), 2);
        assert!(result.messages[0].starts_with("Found value for channels"));
    }

    #[test]
    fn mismatching_audio_stream_names_kind_and_file() {
        let (declared, scraped) = wav_case("6");
        let result = reconcile(&declared, &scraped).unwrap();
        assert!(!result.is_valid);
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0]
            .starts_with("ERROR: audio streams in audiofile are not what is described in metadata."));
        assert!(result.errors[0].contains("\"num_channels\""));
    }

    #[test]
    fn result_is_memoized() {
        let (declared, scraped) = wav_case(UNAV);
        let rules = ReconConfig::default();
        let comparator = MetadataComparator::new(&declared, &scraped, &rules).unwrap();
        let first = comparator.result().unwrap() as *const ComparisonResult;
        let second = comparator.result().unwrap() as *const ComparisonResult;
        assert_eq!(first, second);
        assert_eq!(comparator.result().unwrap().messages.len(), 2);
    }

    #[test]
    fn conflicting_synonyms_propagate() {
        let (declared, _) = wav_case("2");
        let stream = scraped(
            0,
            StreamType::Audio,
            "audio/x-wav",
            UNAP,
            &[("num_channels", "2"), ("channels", "1")],
        );
        let scraped = ScrapedStreams::from_streams(vec![stream]).unwrap();
        let rules = ReconConfig::default();
        let comparator = MetadataComparator::new(&declared, &scraped, &rules).unwrap();
        assert!(matches!(
            comparator.result(),
            Err(ReconError::DuplicateSynonymKey { .. })
        ));
        assert!(comparator.result().is_err());
    }

    #[test]
    fn invalid_declared_record_is_rejected() {
        let (mut declared, scraped) = wav_case("2");
        declared.audio_streams = Some(vec![DeclaredStream {
            format: StreamFormat::default(),
            audio: Some(AttrMap::new()),
            video: None,
        }]);
        let rules = ReconConfig::default();
        assert!(matches!(
            MetadataComparator::new(&declared, &scraped, &rules),
            Err(ReconError::InvalidRecord(_))
        ));
    }

    #[test]
    fn format_error_does_not_stop_stream_checks() {
        let (mut declared, scraped) = wav_case("6");
        declared.format.version = "1.0".into();
        let result = reconcile(&declared, &scraped).unwrap();
        assert_eq!(result.errors.len(), 2);
        assert!(result.errors[0].contains("mimetype/version"));
        assert!(result.errors[1].contains("audio streams"));
    }
}
