use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use url::Url;
use uuid::Uuid;

use crate::error::{Error, Result};

/// Video heights offered by the quality picker, highest first
pub const VIDEO_HEIGHTS: [u32; 4] = [1080, 720, 480, 360];

/// Audio bitrates in kbps offered by the quality picker, highest first
pub const AUDIO_BITRATES: [u32; 4] = [320, 256, 192, 128];

/// What kind of file a request should produce
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    /// Video with audio, merged into a single container
    #[default]
    Video,
    /// Audio stream only, transcoded to a fixed codec
    AudioOnly,
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaKind::Video => write!(f, "video"),
            MediaKind::AudioOnly => write!(f, "audio"),
        }
    }
}

/// Quality selector. A tier is a maximum height for video and a bitrate in
/// kbps for audio.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Quality {
    #[default]
    Best,
    Tier(u32),
}

impl Quality {
    /// Bitrate to hand to the audio transcoder. `Best` maps to the highest
    /// defined tier.
    pub fn audio_bitrate(&self) -> u32 {
        match self {
            Quality::Best => AUDIO_BITRATES[0],
            Quality::Tier(kbps) => *kbps,
        }
    }

    /// Height limit for video, `None` when unconstrained
    pub fn max_height(&self) -> Option<u32> {
        match self {
            Quality::Best => None,
            Quality::Tier(height) => Some(*height),
        }
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Quality::Best => write!(f, "best"),
            Quality::Tier(n) => write!(f, "{n}"),
        }
    }
}

impl FromStr for Quality {
    type Err = Error;

    /// Accepts `best`, `Best Quality`, `720`, `720p`, `192k` and `192kbps`.
    fn from_str(s: &str) -> Result<Self> {
        let text = s.trim().to_lowercase();
        if text == "best" || text == "best quality" {
            return Ok(Quality::Best);
        }

        let digits = text
            .strip_suffix("kbps")
            .or_else(|| text.strip_suffix('k'))
            .or_else(|| text.strip_suffix('p'))
            .unwrap_or(&text)
            .trim();

        match digits.parse::<u32>() {
            Ok(0) => Err(Error::InvalidRequest(format!(
                "quality tier must be positive: {s:?}"
            ))),
            Ok(n) => Ok(Quality::Tier(n)),
            Err(_) => Err(Error::InvalidRequest(format!(
                "unknown quality selector: {s:?}"
            ))),
        }
    }
}

/// Media kind and quality applied to requests created from the clipboard
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct RequestPreset {
    pub media_kind: MediaKind,
    pub quality: Quality,
}

impl RequestPreset {
    pub fn new(media_kind: MediaKind, quality: Quality) -> Self {
        Self {
            media_kind,
            quality,
        }
    }

    /// Build a request for `source` using this preset
    pub fn request(&self, source: &str) -> Result<Request> {
        Request::new(source, self.media_kind, self.quality)
    }
}

/// One media download. Immutable once built; the worker consumes it exactly
/// once.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Request {
    id: Uuid,
    source: String,
    media_kind: MediaKind,
    quality: Quality,
}

impl Request {
    /// Validate the source and build a request.
    ///
    /// The source must be a non-empty `http` or `https` URL.
    pub fn new(source: &str, media_kind: MediaKind, quality: Quality) -> Result<Self> {
        let source = source.trim();
        if source.is_empty() {
            return Err(Error::InvalidRequest("source is empty".to_string()));
        }

        let parsed = Url::parse(source)
            .map_err(|e| Error::InvalidRequest(format!("malformed source {source:?}: {e}")))?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(Error::InvalidRequest(format!(
                "unsupported scheme {:?} in {source:?}",
                parsed.scheme()
            )));
        }
        if parsed.host_str().is_none() {
            return Err(Error::InvalidRequest(format!("missing host in {source:?}")));
        }

        Ok(Self {
            id: Uuid::new_v4(),
            source: source.to_string(),
            media_kind,
            quality,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn media_kind(&self) -> MediaKind {
        self.media_kind
    }

    pub fn quality(&self) -> Quality {
        self.quality
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}, {})", self.source, self.media_kind, self.quality)
    }
}
