//! The playback source a recording follows.

use std::path::PathBuf;

use image::RgbaImage;

use vivitag_common::error::VivitagResult;

/// Facts known once the media has loaded.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MediaMetadata {
    pub width: u32,
    pub height: u32,
    pub duration_secs: f64,
    pub has_audio: bool,
}

/// Audio attached to a recording, taken from the source media.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioTrack {
    /// File the audio stream is read from.
    pub source: PathBuf,
}

/// Playback span, in media seconds, that a recording covers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrimWindow {
    pub start_secs: f64,
    pub end_secs: f64,
}

impl TrimWindow {
    pub fn new(start_secs: f64, end_secs: f64) -> Self {
        Self {
            start_secs,
            end_secs,
        }
    }

    pub fn duration_secs(&self) -> f64 {
        (self.end_secs - self.start_secs).max(0.0)
    }

    /// Percentage of the window covered at `position`, clamped to [0, 100].
    pub fn progress_percent(&self, position: f64) -> f64 {
        let duration = self.duration_secs();
        if duration <= 0.0 {
            return 100.0;
        }
        ((position - self.start_secs) / duration * 100.0).clamp(0.0, 100.0)
    }
}

/// A seekable media element with a playback clock.
///
/// `metadata` is `None` while the media is loading. A source that fails to
/// decode never leaves that state.
pub trait MediaElement: Send {
    fn metadata(&self) -> Option<MediaMetadata>;

    /// Playback position in seconds.
    fn current_time(&self) -> f64;

    fn seek(&mut self, secs: f64);

    fn play(&mut self) -> VivitagResult<()>;

    fn pause(&mut self);

    fn is_paused(&self) -> bool;

    fn has_ended(&self) -> bool;

    /// The frame at the current playback position.
    fn current_frame(&mut self) -> VivitagResult<RgbaImage>;

    /// Route the media's audio into a recording.
    fn attach_audio(&mut self) -> VivitagResult<AudioTrack>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_is_clamped() {
        let window = TrimWindow::new(1.0, 3.0);
        assert_eq!(window.progress_percent(0.5), 0.0);
        assert_eq!(window.progress_percent(2.0), 50.0);
        assert_eq!(window.progress_percent(3.5), 100.0);
    }

    #[test]
    fn test_empty_window_reports_complete() {
        assert_eq!(TrimWindow::new(2.0, 2.0).progress_percent(2.0), 100.0);
    }
}
