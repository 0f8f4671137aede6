//! Description of the media a source produces

use serde::Serialize;

/// Kind of media carried by a track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Video,
    Audio,
    Application,
}

/// One media section with the codecs it carries
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Media {
    /// Media kind
    #[serde(rename = "type")]
    pub media_type: MediaType,
    /// Codec names, one per format
    pub codecs: Vec<String>,
}

impl Media {
    /// Single-codec video media
    pub fn video(codec: impl Into<String>) -> Self {
        Self {
            media_type: MediaType::Video,
            codecs: vec![codec.into()],
        }
    }

    /// Single-codec audio media
    pub fn audio(codec: impl Into<String>) -> Self {
        Self {
            media_type: MediaType::Audio,
            codecs: vec![codec.into()],
        }
    }
}

/// Medias announced by a source when it becomes ready
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MediaDescription {
    pub medias: Vec<Media>,
}

impl MediaDescription {
    /// Create a description from a list of medias
    pub fn new(medias: Vec<Media>) -> Self {
        Self { medias }
    }

    /// Total number of tracks (formats) across all medias
    pub fn track_count(&self) -> usize {
        self.medias.iter().map(|m| m.codecs.len()).sum()
    }
}

/// Summary used in log lines, e.g. `2 tracks (H264, MPEG-4 Audio)`
pub fn medias_info(desc: &MediaDescription) -> String {
    let codecs: Vec<&str> = desc
        .medias
        .iter()
        .flat_map(|m| m.codecs.iter().map(String::as_str))
        .collect();

    format!(
        "{} {} ({})",
        codecs.len(),
        if codecs.len() == 1 { "track" } else { "tracks" },
        codecs.join(", ")
    )
}
