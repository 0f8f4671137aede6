//! Static source kinds
//!
//! The set of protocols a static source can be pulled with is closed; the
//! kind is selected once from the scheme of the configured source string.

use std::fmt;

/// Protocol family of a static source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    /// `rtsp://` or `rtsps://`
    Rtsp,
    /// `rtmp://` or `rtmps://`
    Rtmp,
    /// `http://` or `https://` (HLS playlists)
    Hls,
    /// `udp://` (MPEG-TS over UDP)
    Udp,
    /// `srt://`
    Srt,
    /// `whep://` or `wheps://` (WebRTC)
    WebRtc,
}

const SCHEMES: [(&str, SourceKind); 10] = [
    ("rtsp://", SourceKind::Rtsp),
    ("rtsps://", SourceKind::Rtsp),
    ("rtmp://", SourceKind::Rtmp),
    ("rtmps://", SourceKind::Rtmp),
    ("http://", SourceKind::Hls),
    ("https://", SourceKind::Hls),
    ("udp://", SourceKind::Udp),
    ("srt://", SourceKind::Srt),
    ("whep://", SourceKind::WebRtc),
    ("wheps://", SourceKind::WebRtc),
];

impl SourceKind {
    /// Kind of a source string, `None` for `publisher`, `redirect` and
    /// unknown schemes
    pub fn from_source(source: &str) -> Option<Self> {
        SCHEMES
            .iter()
            .find(|(prefix, _)| source.starts_with(prefix))
            .map(|(_, kind)| *kind)
    }

    /// Type name reported when describing the source
    pub fn as_str(self) -> &'static str {
        match self {
            SourceKind::Rtsp => "rtspSource",
            SourceKind::Rtmp => "rtmpSource",
            SourceKind::Hls => "hlsSource",
            SourceKind::Udp => "udpSource",
            SourceKind::Srt => "srtSource",
            SourceKind::WebRtc => "webRTCSource",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
