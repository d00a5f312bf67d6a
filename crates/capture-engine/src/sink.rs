//! Encoding sinks that turn captured frames into a container file.

use image::RgbaImage;

use vivitag_common::error::VivitagResult;

use crate::media::{AudioTrack, TrimWindow};
use crate::negotiate::EncodingFormat;

/// Settings a sink is opened with.
#[derive(Debug, Clone, PartialEq)]
pub struct SinkConfig {
    /// Negotiated format. `None` opens the sink's own default encoder.
    pub format: Option<EncodingFormat>,

    pub width: u32,
    pub height: u32,

    /// Frame rate of the capture stream.
    pub fps: u32,

    pub video_bitrate_bps: u64,
    pub audio_bitrate_bps: u64,

    /// Audio to mux in. `None` records video only.
    pub audio: Option<AudioTrack>,

    /// Media span being recorded, used to line up the audio.
    pub window: TrimWindow,
}

/// A buffered piece of encoded output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedChunk {
    pub bytes: Vec<u8>,
}

impl EncodedChunk {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }
}

/// Join chunks into one buffer, in order.
pub fn assemble_chunks(chunks: Vec<EncodedChunk>) -> Vec<u8> {
    let total = chunks.iter().map(|c| c.bytes.len()).sum();
    let mut bytes = Vec::with_capacity(total);
    for chunk in chunks {
        bytes.extend_from_slice(&chunk.bytes);
    }
    bytes
}

/// Consumer of composited frames.
pub trait EncodingSink: Send {
    /// Whether the sink can produce the given MIME type.
    fn is_type_supported(&self, mime: &str) -> bool;

    /// Open the sink. Fails if it is already recording.
    fn start(&mut self, config: SinkConfig) -> VivitagResult<()>;

    /// Append one frame captured at `timestamp_secs` of recording time.
    fn push_frame(&mut self, frame: &RgbaImage, timestamp_secs: f64) -> VivitagResult<()>;

    /// Close the sink and hand back everything it encoded.
    fn stop(&mut self) -> VivitagResult<Vec<EncodedChunk>>;

    fn is_recording(&self) -> bool;
}

/// Counters for one recording.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CaptureStats {
    /// Frames composited while recording.
    pub frames_rendered: u64,

    /// Frames accepted by the sink.
    pub frames_captured: u64,

    /// Frames the sink rejected.
    pub frames_dropped: u64,

    /// Size of the assembled output.
    pub bytes_written: u64,
}

impl CaptureStats {
    /// Drop rate as a percentage.
    pub fn drop_rate(&self) -> f64 {
        let total = self.frames_captured + self.frames_dropped;
        if total == 0 {
            return 0.0;
        }
        self.frames_dropped as f64 / total as f64 * 100.0
    }
}
