use std::collections::BTreeMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ReconError;

/// Technical attribute map. Ordered so every walk over it is deterministic.
pub type AttrMap = BTreeMap<String, String>;

/// Value could not be determined.
pub const UNAV: &str = "(:unav)";
/// Value is not applicable.
pub const UNAP: &str = "(:unap)";
/// One of several values ("et al.").
pub const ETAL: &str = "(:etal)";

// ---------------------------------------------------------------------------
// Declared side
// ---------------------------------------------------------------------------

/// Mimetype + version pair of a declared (sub-)stream.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamFormat {
    #[serde(default)]
    pub mimetype: String,
    /// Empty string means "not applicable".
    #[serde(default)]
    pub version: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeclaredFormat {
    #[serde(default)]
    pub mimetype: String,
    #[serde(default)]
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub charset: Option<String>,
    #[serde(default, rename = "alt-format", skip_serializing_if = "Option::is_none")]
    pub alt_format: Option<String>,
}

impl DeclaredFormat {
    pub fn stream_format(&self) -> StreamFormat {
        StreamFormat {
            mimetype: self.mimetype.clone(),
            version: self.version.clone(),
        }
    }
}

/// One sub-stream of a declared multi-stream container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeclaredStream {
    pub format: StreamFormat,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio: Option<AttrMap>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video: Option<AttrMap>,
}

impl DeclaredStream {
    pub fn attrs(&self, kind: StreamKind) -> Option<&AttrMap> {
        match kind {
            StreamKind::Audio => self.audio.as_ref(),
            StreamKind::Video => self.video.as_ref(),
        }
    }
}

/// Technical metadata asserted by the archival package for one digital object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeclaredRecord {
    pub filename: String,
    pub format: DeclaredFormat,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio: Option<AttrMap>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video: Option<AttrMap>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_streams: Option<Vec<DeclaredStream>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_streams: Option<Vec<DeclaredStream>>,
}

impl DeclaredRecord {
    /// A record with only a primary format and no stream groups.
    pub fn new(filename: impl Into<String>, format: DeclaredFormat) -> Self {
        Self {
            filename: filename.into(),
            format,
            audio: None,
            video: None,
            audio_streams: None,
            video_streams: None,
        }
    }

    /// Parse and validate a declared record.
    pub fn from_json(input: &str) -> Result<Self, ReconError> {
        let record: DeclaredRecord = serde_json::from_str(input)?;
        record.validate()?;
        Ok(record)
    }

    pub fn validate(&self) -> Result<(), ReconError> {
        if self.audio.is_some() && self.audio_streams.is_some() {
            return Err(ReconError::InvalidRecord(format!(
                "'{}': both 'audio' and 'audio_streams' are present",
                self.filename
            )));
        }
        if self.video.is_some() && self.video_streams.is_some() {
            return Err(ReconError::InvalidRecord(format!(
                "'{}': both 'video' and 'video_streams' are present",
                self.filename
            )));
        }

        for (streams, kind) in [
            (&self.audio_streams, StreamKind::Audio),
            (&self.video_streams, StreamKind::Video),
        ] {
            let Some(streams) = streams else { continue };
            if let Some(pos) = streams.iter().position(|s| s.attrs(kind).is_none()) {
                return Err(ReconError::InvalidRecord(format!(
                    "'{}': {kind}_streams[{pos}] has no '{kind}' section",
                    self.filename
                )));
            }
        }

        Ok(())
    }

    /// Stream groups present on this record, in check order.
    pub fn stream_groups(&self) -> Vec<StreamGroup> {
        StreamGroup::ALL
            .into_iter()
            .filter(|group| match group {
                StreamGroup::Audio => self.audio.is_some(),
                StreamGroup::AudioStreams => self.audio_streams.is_some(),
                StreamGroup::Video => self.video.is_some(),
                StreamGroup::VideoStreams => self.video_streams.is_some(),
            })
            .collect()
    }

    /// Declared streams of a group, ready for matching.
    ///
    /// Singular groups yield one stream carrying the record's primary format.
    pub fn declared_streams(&self, group: StreamGroup) -> Vec<StreamRecord<StreamFormat>> {
        let kind = group.kind();
        let single = |attrs: &Option<AttrMap>| -> Vec<StreamRecord<StreamFormat>> {
            attrs
                .iter()
                .map(|attrs| StreamRecord {
                    format: self.format.stream_format(),
                    attrs: attrs.clone(),
                })
                .collect()
        };
        let multi = |streams: &Option<Vec<DeclaredStream>>| -> Vec<StreamRecord<StreamFormat>> {
            streams
                .iter()
                .flatten()
                .map(|s| StreamRecord {
                    format: s.format.clone(),
                    attrs: s.attrs(kind).cloned().unwrap_or_default(),
                })
                .collect()
        };

        match group {
            StreamGroup::Audio => single(&self.audio),
            StreamGroup::Video => single(&self.video),
            StreamGroup::AudioStreams => multi(&self.audio_streams),
            StreamGroup::VideoStreams => multi(&self.video_streams),
        }
    }
}

// ---------------------------------------------------------------------------
// Scraped side
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamType {
    Text,
    Image,
    Audio,
    Video,
    Videocontainer,
    Binary,
}

impl std::fmt::Display for StreamType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Image => write!(f, "image"),
            Self::Audio => write!(f, "audio"),
            Self::Video => write!(f, "video"),
            Self::Videocontainer => write!(f, "videocontainer"),
            Self::Binary => write!(f, "binary"),
        }
    }
}

/// How a scraped version string is to be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionState<'a> {
    Absent,
    /// `(:unap)`
    NotApplicable,
    /// `(:unav)`
    Unavailable,
    Value(&'a str),
}

/// Mimetype + version as reported by the characterization tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapedFormat {
    pub mimetype: String,
    pub version: Option<String>,
}

impl ScrapedFormat {
    pub fn new(mimetype: impl Into<String>, version: Option<&str>) -> Self {
        Self {
            mimetype: mimetype.into(),
            version: version.map(str::to_string),
        }
    }

    pub fn version_state(&self) -> VersionState<'_> {
        match self.version.as_deref() {
            None => VersionState::Absent,
            Some(UNAP) => VersionState::NotApplicable,
            Some(UNAV) => VersionState::Unavailable,
            Some(v) => VersionState::Value(v),
        }
    }
}

/// One technical sub-stream found by the characterization tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapedStream {
    pub index: usize,
    pub stream_type: StreamType,
    pub mimetype: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub charset: Option<String>,
    #[serde(flatten)]
    pub attrs: AttrMap,
}

impl ScrapedStream {
    pub fn format(&self) -> ScrapedFormat {
        ScrapedFormat {
            mimetype: self.mimetype.clone(),
            version: self.version.clone(),
        }
    }
}

/// Validated scrape of one file: non-empty, unique indices, index 0 present.
///
/// Serialized in the characterization tool's shape, a map keyed by index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    try_from = "BTreeMap<usize, ScrapedStream>",
    into = "BTreeMap<usize, ScrapedStream>"
)]
pub struct ScrapedStreams {
    streams: Vec<ScrapedStream>,
}

impl ScrapedStreams {
    pub fn from_streams(mut streams: Vec<ScrapedStream>) -> Result<Self, ReconError> {
        streams.sort_by_key(|s| s.index);
        if streams.first().map(|s| s.index) != Some(0) {
            return Err(ReconError::InvalidRecord(
                "scraped streams must include stream index 0".into(),
            ));
        }
        if let Some(w) = streams.windows(2).find(|w| w[0].index == w[1].index) {
            return Err(ReconError::InvalidRecord(format!(
                "duplicate scraped stream index {}",
                w[0].index
            )));
        }
        Ok(Self { streams })
    }

    pub fn from_json(input: &str) -> Result<Self, ReconError> {
        let map: BTreeMap<usize, ScrapedStream> = serde_json::from_str(input)?;
        Self::try_from(map)
    }

    /// Container-level stream (index 0).
    pub fn primary(&self) -> &ScrapedStream {
        &self.streams[0]
    }

    pub fn of_type(&self, stream_type: StreamType) -> impl Iterator<Item = &ScrapedStream> {
        self.streams.iter().filter(move |s| s.stream_type == stream_type)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ScrapedStream> {
        self.streams.iter()
    }

    pub fn len(&self) -> usize {
        self.streams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }
}

impl TryFrom<BTreeMap<usize, ScrapedStream>> for ScrapedStreams {
    type Error = ReconError;

    fn try_from(map: BTreeMap<usize, ScrapedStream>) -> Result<Self, Self::Error> {
        if let Some((key, stream)) = map.iter().find(|(k, s)| **k != s.index) {
            return Err(ReconError::InvalidRecord(format!(
                "scraped stream keyed {key} reports index {}",
                stream.index
            )));
        }
        Self::from_streams(map.into_values().collect())
    }
}

impl From<ScrapedStreams> for BTreeMap<usize, ScrapedStream> {
    fn from(streams: ScrapedStreams) -> Self {
        streams.streams.into_iter().map(|s| (s.index, s)).collect()
    }
}

// ---------------------------------------------------------------------------
// Stream kinds and groups
// ---------------------------------------------------------------------------

/// Technical kind of a paired sub-stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamKind {
    Audio,
    Video,
}

impl StreamKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Audio => "audio",
            Self::Video => "video",
        }
    }

    pub fn stream_type(&self) -> StreamType {
        match self {
            Self::Audio => StreamType::Audio,
            Self::Video => StreamType::Video,
        }
    }
}

impl std::fmt::Display for StreamKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StreamKind {
    type Err = ReconError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "audio" => Ok(Self::Audio),
            "video" => Ok(Self::Video),
            other => Err(ReconError::InvalidStreamKind(other.to_string())),
        }
    }
}

impl TryFrom<StreamType> for StreamKind {
    type Error = ReconError;

    fn try_from(stream_type: StreamType) -> Result<Self, Self::Error> {
        match stream_type {
            StreamType::Audio => Ok(Self::Audio),
            StreamType::Video => Ok(Self::Video),
            other => Err(ReconError::InvalidStreamKind(other.to_string())),
        }
    }
}

/// Stream-bearing key of a declared record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamGroup {
    Audio,
    AudioStreams,
    Video,
    VideoStreams,
}

impl StreamGroup {
    /// Fixed check order.
    pub const ALL: [StreamGroup; 4] = [
        Self::Audio,
        Self::AudioStreams,
        Self::Video,
        Self::VideoStreams,
    ];

    pub fn kind(&self) -> StreamKind {
        match self {
            Self::Audio | Self::AudioStreams => StreamKind::Audio,
            Self::Video | Self::VideoStreams => StreamKind::Video,
        }
    }

    pub fn key(&self) -> &'static str {
        match self {
            Self::Audio => "audio",
            Self::AudioStreams => "audio_streams",
            Self::Video => "video",
            Self::VideoStreams => "video_streams",
        }
    }
}

impl FromStr for StreamGroup {
    type Err = ReconError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|g| g.key() == s)
            .ok_or_else(|| ReconError::InvalidStreamKind(s.to_string()))
    }
}

/// Format + attributes of one sub-stream, as handed to the matcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StreamRecord<F> {
    pub format: F,
    pub attrs: AttrMap,
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

/// Verdict for one digital object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComparisonResult {
    pub is_valid: bool,
    pub messages: Vec<String>,
    /// Each entry is prefixed `ERROR: `.
    pub errors: Vec<String>,
}
