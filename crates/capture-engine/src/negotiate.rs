//! Output format negotiation.
//!
//! Candidates are tried in a fixed order and the first one the sink
//! supports wins. H.264 with AAC comes first so MP4 output never carries
//! Opus unless nothing better is available.

use serde::Serialize;

use crate::sink::EncodingSink;

/// Candidate MIME types, most preferred first.
pub const FORMAT_PRIORITY: [&str; 6] = [
    "video/mp4;codecs=avc1,mp4a.40.2",
    "video/mp4;codecs=h264,aac",
    "video/mp4;codecs=avc1,opus",
    "video/mp4",
    "video/webm;codecs=vp9,opus",
    "video/webm",
];

/// Container MIME used for deliverables recorded without a negotiated format.
pub const FALLBACK_CONTAINER: &str = "video/webm";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoCodec {
    H264,
    Vp9,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioCodec {
    Aac,
    Opus,
}

/// A parsed recording MIME type such as `video/mp4;codecs=avc1,mp4a.40.2`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EncodingFormat {
    pub mime: String,
    pub video: VideoCodec,
    pub audio: AudioCodec,
    is_mp4: bool,
}

impl EncodingFormat {
    /// Parse a MIME type. Returns `None` for containers other than MP4/WebM
    /// or codecs outside H.264, VP9, AAC and Opus.
    ///
    /// Missing codecs default per container: H.264/AAC for MP4 and
    /// VP9/Opus for WebM.
    pub fn parse(mime: &str) -> Option<Self> {
        let mut parts = mime.split(';');
        let container = parts.next()?.trim().to_ascii_lowercase();
        let is_mp4 = match container.as_str() {
            "video/mp4" => true,
            "video/webm" => false,
            _ => return None,
        };
        let (mut video, mut audio) = if is_mp4 {
            (VideoCodec::H264, AudioCodec::Aac)
        } else {
            (VideoCodec::Vp9, AudioCodec::Opus)
        };

        for param in parts {
            let Some(list) = param.trim().strip_prefix("codecs=") else {
                continue;
            };
            for codec in list.trim_matches('"').split(',') {
                match codec.trim().to_ascii_lowercase().as_str() {
                    "avc1" | "h264" => video = VideoCodec::H264,
                    "vp9" | "vp09" => video = VideoCodec::Vp9,
                    "aac" | "mp4a.40.2" => audio = AudioCodec::Aac,
                    "opus" => audio = AudioCodec::Opus,
                    _ => return None,
                }
            }
        }

        Some(Self {
            mime: mime.to_string(),
            video,
            audio,
            is_mp4,
        })
    }

    pub fn is_mp4(&self) -> bool {
        self.is_mp4
    }

    /// Container MIME without codec parameters.
    pub fn container_mime(&self) -> &'static str {
        if self.is_mp4 {
            "video/mp4"
        } else {
            "video/webm"
        }
    }

    pub fn extension(&self) -> &'static str {
        if self.is_mp4 {
            "mp4"
        } else {
            "webm"
        }
    }
}

/// Outcome of probing the sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Negotiated {
    Supported(EncodingFormat),
    Unsupported,
}

impl Negotiated {
    pub fn format(&self) -> Option<&EncodingFormat> {
        match self {
            Negotiated::Supported(format) => Some(format),
            Negotiated::Unsupported => None,
        }
    }
}

/// Pick the first entry of [`FORMAT_PRIORITY`] the sink supports.
pub fn negotiate<S: EncodingSink + ?Sized>(sink: &S) -> Negotiated {
    for mime in FORMAT_PRIORITY {
        if !sink.is_type_supported(mime) {
            tracing::debug!(format = mime, "Encoding format not supported");
            continue;
        }
        if let Some(format) = EncodingFormat::parse(mime) {
            tracing::info!(format = %format.mime, "Selected encoding format");
            return Negotiated::Supported(format);
        }
    }
    tracing::warn!("No preferred encoding format supported, using sink default");
    Negotiated::Unsupported
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::{EncodedChunk, SinkConfig};
    use image::RgbaImage;
    use vivitag_common::error::VivitagResult;

    struct Supports(Vec<&'static str>);

    impl EncodingSink for Supports {
        fn is_type_supported(&self, mime: &str) -> bool {
            self.0.contains(&mime)
        }

        fn start(&mut self, _config: SinkConfig) -> VivitagResult<()> {
            Ok(())
        }

        fn push_frame(&mut self, _frame: &RgbaImage, _ts: f64) -> VivitagResult<()> {
            Ok(())
        }

        fn stop(&mut self) -> VivitagResult<Vec<EncodedChunk>> {
            Ok(Vec::new())
        }

        fn is_recording(&self) -> bool {
            false
        }
    }

    #[test]
    fn test_priority_prefers_aac_mp4() {
        let sink = Supports(FORMAT_PRIORITY.to_vec());
        let negotiated = negotiate(&sink);
        assert_eq!(negotiated.format().unwrap().mime, FORMAT_PRIORITY[0]);
    }

    #[test]
    fn test_falls_through_to_webm() {
        let sink = Supports(vec!["video/webm", "video/webm;codecs=vp9,opus"]);
        let format = negotiate(&sink).format().cloned().unwrap();
        assert_eq!(format.mime, "video/webm;codecs=vp9,opus");
        assert!(!format.is_mp4());
        assert_eq!(format.extension(), "webm");
    }

    #[test]
    fn test_nothing_supported() {
        assert_eq!(negotiate(&Supports(vec![])), Negotiated::Unsupported);
    }

    #[test]
    fn test_parse_codecs() {
        let f = EncodingFormat::parse("video/mp4;codecs=avc1,opus").unwrap();
        assert_eq!((f.video, f.audio), (VideoCodec::H264, AudioCodec::Opus));
        assert_eq!(f.container_mime(), "video/mp4");

        let bare = EncodingFormat::parse("video/webm").unwrap();
        assert_eq!((bare.video, bare.audio), (VideoCodec::Vp9, AudioCodec::Opus));

        assert!(EncodingFormat::parse("video/ogg").is_none());
        assert!(EncodingFormat::parse("video/mp4;codecs=hevc").is_none());
    }

    #[test]
    fn test_every_priority_entry_parses() {
        for mime in FORMAT_PRIORITY {
            assert!(EncodingFormat::parse(mime).is_some(), "{mime}");
        }
    }
}
