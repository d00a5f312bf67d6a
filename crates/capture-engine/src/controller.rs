//! Playback-synchronized render and capture state machine.
//!
//! ```text
//! Idle ──play──► Previewing ◄──► Paused
//!  │                 │              │
//!  └──────── start_recording ───────┘
//!                    ▼
//!               Recording ──stop──► Finalizing ──complete──► Idle
//! ```
//!
//! The controller is synchronous: a driver calls [`CaptureController::render_tick`]
//! once per display frame and [`CaptureController::monitor_tick`] at the monitor
//! interval. The project is read from the [`ProjectHost`] on every tick so edits
//! apply on the next frame.

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;

use vivitag_common::clock::{RateController, StopDrift};
use vivitag_common::config::CaptureDefaults;
use vivitag_common::error::{VivitagError, VivitagResult};
use vivitag_processing_core::PhysicsTable;
use vivitag_project_model::{Project, VideoConfig};
use vivitag_render_engine::{Compositor, DeliverableFile, Surface};

use crate::media::{MediaElement, MediaMetadata, TrimWindow};
use crate::negotiate::{negotiate, EncodingFormat, FALLBACK_CONTAINER};
use crate::sink::{assemble_chunks, CaptureStats, EncodingSink, SinkConfig};

/// Owner of the project collection, queried for the active project.
pub trait ProjectHost: Send {
    /// Latest state of the project being rendered.
    fn active_project(&self) -> Project;

    /// Called after the controller changes the project.
    fn on_project_update(&mut self, project: Project);

    /// Called once a queued recording has been delivered.
    fn on_batch_item_complete(&mut self);
}

/// Controller state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureState {
    /// Nothing playing.
    Idle,

    /// Playing, looping inside the trim window.
    Previewing,

    /// Preview paused by the user.
    Paused,

    /// Playing once through the trim window into the sink.
    Recording,

    /// Sink stopped, output being assembled and delivered.
    Finalizing,
}

/// What ended a recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Playback reached the end of the trim window.
    TrimEnd,

    /// The media ran out before the trim window did.
    MediaEnded,

    /// The safety timer fired first.
    SafetyTimeout,

    /// Stopped by the caller.
    Cancelled,
}

/// Result of one render tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// A frame was composited, and pushed to the sink if `captured`.
    Rendered { captured: bool },

    /// The frame could not be produced. The loop keeps going.
    Skipped,

    /// Nothing is playing. The loop should not reschedule.
    Stopped,
}

/// Result of one monitor tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MonitorOutcome {
    /// Still recording, with progress in percent.
    Progress(f64),

    /// A stop condition was met and the recording moved to finalizing.
    Stopped(StopReason),

    /// Not recording.
    Inactive,
}

/// What a started recording was set up with.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordingPlan {
    /// Negotiated format, `None` when the sink default is used.
    pub format: Option<EncodingFormat>,

    pub window: TrimWindow,

    /// Whether an audio track was attached.
    pub audio: bool,
}

/// How a recording stopped.
#[derive(Debug, Clone, Copy)]
pub struct StopRecord {
    pub reason: StopReason,
    pub drift: StopDrift,
}

/// Drives the compositor from a media element and feeds an encoding sink.
pub struct CaptureController<M, S> {
    media: M,
    sink: S,
    compositor: Compositor,
    surface: Surface,
    physics: PhysicsTable,
    rng: StdRng,
    defaults: CaptureDefaults,
    capture_rate: RateController,
    state: CaptureState,
    progress: f64,
    plan: Option<RecordingPlan>,
    stopped: Option<StopRecord>,
    stats: CaptureStats,
}

impl<M: MediaElement, S: EncodingSink> CaptureController<M, S> {
    pub fn new(media: M, sink: S, compositor: Compositor, defaults: CaptureDefaults) -> Self {
        let capture_rate = RateController::new(defaults.capture_fps);
        Self {
            media,
            sink,
            compositor,
            surface: Surface::new(1, 1),
            physics: PhysicsTable::new(),
            rng: StdRng::from_entropy(),
            defaults,
            capture_rate,
            state: CaptureState::Idle,
            progress: 0.0,
            plan: None,
            stopped: None,
            stats: CaptureStats::default(),
        }
    }

    /// Use a fixed seed for spawn positions.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    /// Recording progress in percent. Zero outside a recording.
    pub fn progress(&self) -> f64 {
        self.progress
    }

    pub fn is_loading(&self) -> bool {
        self.media.metadata().is_none()
    }

    pub fn media(&self) -> &M {
        &self.media
    }

    pub fn media_mut(&mut self) -> &mut M {
        &mut self.media
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn surface(&self) -> &Surface {
        &self.surface
    }

    pub fn physics(&self) -> &PhysicsTable {
        &self.physics
    }

    pub fn stats(&self) -> &CaptureStats {
        &self.stats
    }

    /// Plan of the current or last recording.
    pub fn plan(&self) -> Option<&RecordingPlan> {
        self.plan.as_ref()
    }

    /// How the last recording stopped.
    pub fn stop_record(&self) -> Option<StopRecord> {
        self.stopped
    }

    /// Apply loaded metadata to the project: an unset or out-of-range trim
    /// window is resolved against the media duration and pushed to the host.
    pub fn load_metadata<H: ProjectHost + ?Sized>(
        &mut self,
        host: &mut H,
    ) -> VivitagResult<MediaMetadata> {
        let metadata = self
            .media
            .metadata()
            .ok_or_else(|| VivitagError::media("Media is still loading"))?;

        let mut project = host.active_project();
        let config = video_config_mut(&mut project)?;
        if config.resolve_trim(metadata.duration_secs) {
            tracing::debug!(
                trim_start = config.trim_start,
                trim_end = config.trim_end,
                duration_secs = metadata.duration_secs,
                "Resolved trim window"
            );
            host.on_project_update(project);
        }
        self.surface.resize(metadata.width, metadata.height);
        Ok(metadata)
    }

    /// Start or resume looping preview playback.
    pub fn play<H: ProjectHost + ?Sized>(&mut self, host: &mut H) -> VivitagResult<()> {
        match self.state {
            CaptureState::Recording | CaptureState::Finalizing => {
                return Err(VivitagError::capture("Cannot preview while recording"));
            }
            CaptureState::Previewing => return Ok(()),
            CaptureState::Idle | CaptureState::Paused => {}
        }
        self.load_metadata(host)?;

        let project = host.active_project();
        let config = video_config(&project)?;
        let position = self.media.current_time();
        if position < config.trim_start || position >= config.trim_end {
            self.media.seek(config.trim_start);
        }
        self.media.play()?;
        self.state = CaptureState::Previewing;
        tracing::debug!(position = self.media.current_time(), "Preview started");
        Ok(())
    }

    /// Pause preview playback. No further frames are drawn until resumed.
    pub fn pause(&mut self) {
        if self.state == CaptureState::Previewing {
            self.media.pause();
            self.state = CaptureState::Paused;
            tracing::debug!(position = self.media.current_time(), "Preview paused");
        }
    }

    /// Begin recording the trim window from its start.
    pub fn start_recording<H: ProjectHost + ?Sized>(
        &mut self,
        host: &mut H,
    ) -> VivitagResult<RecordingPlan> {
        if matches!(
            self.state,
            CaptureState::Recording | CaptureState::Finalizing
        ) {
            return Err(VivitagError::capture("Recording already in progress"));
        }
        let metadata = self.load_metadata(host)?;
        let project = host.active_project();
        let config = video_config(&project)?;
        let window = TrimWindow::new(config.trim_start, config.trim_end);

        self.physics.clear();
        self.media.seek(window.start_secs);

        let format = negotiate(&self.sink).format().cloned();
        let audio = match self.media.attach_audio() {
            Ok(track) => Some(track),
            Err(e) => {
                tracing::warn!(error = %e, "Audio unavailable, recording video only");
                None
            }
        };

        let plan = RecordingPlan {
            format: format.clone(),
            window,
            audio: audio.is_some(),
        };
        self.sink.start(SinkConfig {
            format,
            width: metadata.width,
            height: metadata.height,
            fps: self.defaults.capture_fps,
            video_bitrate_bps: self.defaults.video_bitrate_bps,
            audio_bitrate_bps: self.defaults.audio_bitrate_bps,
            audio,
            window,
        })?;

        if let Err(e) = self.media.play() {
            if let Err(stop_err) = self.sink.stop() {
                tracing::warn!(error = %stop_err, "Failed to close sink after playback error");
            }
            return Err(e);
        }

        self.capture_rate.reset();
        self.stats = CaptureStats::default();
        self.stopped = None;
        self.progress = 0.0;
        self.state = CaptureState::Recording;
        self.plan = Some(plan.clone());

        tracing::info!(
            project = %project.id,
            trim_start = window.start_secs,
            trim_end = window.end_secs,
            format = plan.format.as_ref().map(|f| f.mime.as_str()).unwrap_or("default"),
            audio = plan.audio,
            "Recording started"
        );
        Ok(plan)
    }

    /// Draw one frame from the latest project state.
    pub fn render_tick<H: ProjectHost + ?Sized>(&mut self, host: &H) -> FrameOutcome {
        let recording = match self.state {
            CaptureState::Previewing => false,
            CaptureState::Recording => true,
            _ => return FrameOutcome::Stopped,
        };
        if self.media.is_paused() || self.media.has_ended() {
            return FrameOutcome::Stopped;
        }

        let project = host.active_project();
        let config = match project.video_config() {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!(error = %e, "Active project has no video to render");
                return FrameOutcome::Skipped;
            }
        };

        let past_trim = config.is_trim_resolved() && self.media.current_time() >= config.trim_end;
        if past_trim && !recording {
            self.media.seek(config.trim_start);
        }
        let position = self.media.current_time();

        let frame = match self.media.current_frame() {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!(error = %e, position, "Failed to read media frame");
                return FrameOutcome::Skipped;
            }
        };

        self.physics.retain_tags(&config.tags);
        if let Err(e) = self.compositor.render_video_frame(
            &mut self.surface,
            &frame,
            config,
            &mut self.physics,
            &mut self.rng,
        ) {
            tracing::warn!(error = %e, position, "Failed to render frame");
            return FrameOutcome::Skipped;
        }

        if !recording {
            return FrameOutcome::Rendered { captured: false };
        }
        self.stats.frames_rendered += 1;

        let start = self.plan.as_ref().map_or(0.0, |p| p.window.start_secs);
        let elapsed = (position - start).max(0.0);
        if !self.capture_rate.should_tick((elapsed * 1e9) as u64) {
            return FrameOutcome::Rendered { captured: false };
        }
        match self.sink.push_frame(self.surface.image(), elapsed) {
            Ok(()) => {
                self.stats.frames_captured += 1;
                FrameOutcome::Rendered { captured: true }
            }
            Err(e) => {
                self.stats.frames_dropped += 1;
                tracing::warn!(error = %e, position, "Sink rejected frame");
                FrameOutcome::Rendered { captured: false }
            }
        }
    }

    /// Sample progress and stop once the trim window or the media is done.
    pub fn monitor_tick(&mut self) -> MonitorOutcome {
        if self.state != CaptureState::Recording {
            return MonitorOutcome::Inactive;
        }
        let Some(window) = self.plan.as_ref().map(|p| p.window) else {
            return MonitorOutcome::Inactive;
        };
        let position = self.media.current_time();
        self.progress = window.progress_percent(position);

        let reason = if position >= window.end_secs {
            StopReason::TrimEnd
        } else if self.media.has_ended() {
            StopReason::MediaEnded
        } else {
            return MonitorOutcome::Progress(self.progress);
        };
        self.stop(reason);
        MonitorOutcome::Stopped(reason)
    }

    /// Safety stop. Returns whether it ended a recording still in progress.
    pub fn safety_timeout(&mut self) -> bool {
        if self.state != CaptureState::Recording {
            return false;
        }
        tracing::warn!(
            position = self.media.current_time(),
            "Safety timeout triggered for video recording"
        );
        self.stop(StopReason::SafetyTimeout)
    }

    /// Move a recording to finalizing. Only the first caller wins.
    pub fn stop(&mut self, reason: StopReason) -> bool {
        if self.state != CaptureState::Recording {
            return false;
        }
        let position = self.media.current_time();
        self.media.pause();
        self.state = CaptureState::Finalizing;

        let expected = self.plan.as_ref().map_or(position, |p| p.window.end_secs);
        let drift = StopDrift {
            expected_secs: expected,
            actual_secs: position,
        };
        self.stopped = Some(StopRecord { reason, drift });
        tracing::info!(
            ?reason,
            position,
            drift_ms = drift.drift_ms(),
            frames = self.stats.frames_captured,
            "Recording stopped"
        );
        true
    }

    /// Close the sink and assemble the clip.
    ///
    /// Stays in finalizing on success so the caller can deliver the file
    /// before calling [`complete`](Self::complete). On failure the controller
    /// returns to idle.
    pub fn finalize<H: ProjectHost + ?Sized>(
        &mut self,
        host: &H,
    ) -> VivitagResult<DeliverableFile> {
        if self.state != CaptureState::Finalizing {
            return Err(VivitagError::capture("No stopped recording to finalize"));
        }
        let result = self.assemble(host);
        if result.is_err() {
            self.complete();
        }
        result
    }

    fn assemble<H: ProjectHost + ?Sized>(&mut self, host: &H) -> VivitagResult<DeliverableFile> {
        let chunks = self.sink.stop()?;
        let bytes = assemble_chunks(chunks);
        if bytes.is_empty() {
            return Err(VivitagError::encode("Recording produced no data"));
        }
        self.stats.bytes_written = bytes.len() as u64;

        let format = self.plan.as_ref().and_then(|p| p.format.as_ref());
        let (mime, extension) = match format {
            Some(format) => (format.container_mime(), format.extension()),
            None => (FALLBACK_CONTAINER, "webm"),
        };
        let project = host.active_project();
        let file = DeliverableFile::new(project.clip_export_name(extension), mime, bytes);
        tracing::info!(
            file = %file.file_name,
            bytes = file.len(),
            drop_rate = self.stats.drop_rate(),
            "Recording finalized"
        );
        Ok(file)
    }

    /// Return to idle after delivery, resetting progress.
    pub fn complete(&mut self) {
        self.state = CaptureState::Idle;
        self.progress = 0.0;
    }
}

fn video_config(project: &Project) -> VivitagResult<&VideoConfig> {
    project
        .video_config()
        .map_err(|e| VivitagError::project(e.to_string()))
}

fn video_config_mut(project: &mut Project) -> VivitagResult<&mut VideoConfig> {
    project
        .video_config_mut()
        .map_err(|e| VivitagError::project(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::AudioTrack;
    use crate::sink::EncodedChunk;
    use image::{Rgba, RgbaImage};
    use vivitag_project_model::{FloatingTag, FloatingTagPatch, VideoConfig};

    /// Media whose position only moves when the test says so.
    struct StepMedia {
        metadata: Option<MediaMetadata>,
        position: f64,
        playing: bool,
        audio: bool,
    }

    impl StepMedia {
        fn ready(duration: f64) -> Self {
            Self {
                metadata: Some(MediaMetadata {
                    width: 160,
                    height: 90,
                    duration_secs: duration,
                    has_audio: true,
                }),
                position: 0.0,
                playing: false,
                audio: true,
            }
        }
    }

    impl MediaElement for StepMedia {
        fn metadata(&self) -> Option<MediaMetadata> {
            self.metadata
        }

        fn current_time(&self) -> f64 {
            self.position
        }

        fn seek(&mut self, secs: f64) {
            self.position = secs;
        }

        fn play(&mut self) -> VivitagResult<()> {
            self.playing = true;
            Ok(())
        }

        fn pause(&mut self) {
            self.playing = false;
        }

        fn is_paused(&self) -> bool {
            !self.playing
        }

        fn has_ended(&self) -> bool {
            self.metadata
                .is_some_and(|m| self.position >= m.duration_secs)
        }

        fn current_frame(&mut self) -> VivitagResult<RgbaImage> {
            Ok(RgbaImage::from_pixel(160, 90, Rgba([20, 40, 60, 255])))
        }

        fn attach_audio(&mut self) -> VivitagResult<AudioTrack> {
            if self.audio {
                Ok(AudioTrack {
                    source: "clip.mp4".into(),
                })
            } else {
                Err(VivitagError::media("audio graph already connected"))
            }
        }
    }

    #[derive(Default)]
    struct MemorySink {
        supported: Vec<&'static str>,
        config: Option<SinkConfig>,
        frames: Vec<f64>,
        output: Vec<u8>,
    }

    impl EncodingSink for MemorySink {
        fn is_type_supported(&self, mime: &str) -> bool {
            self.supported.contains(&mime)
        }

        fn start(&mut self, config: SinkConfig) -> VivitagResult<()> {
            self.config = Some(config);
            Ok(())
        }

        fn push_frame(&mut self, _frame: &RgbaImage, ts: f64) -> VivitagResult<()> {
            self.frames.push(ts);
            Ok(())
        }

        fn stop(&mut self) -> VivitagResult<Vec<EncodedChunk>> {
            self.config = None;
            Ok(vec![EncodedChunk::new(self.output.clone())])
        }

        fn is_recording(&self) -> bool {
            self.config.is_some()
        }
    }

    struct Host {
        project: Project,
        updates: usize,
    }

    impl Host {
        fn with_trim(start: f64, end: f64) -> Self {
            let mut config = VideoConfig::with_preset_tag();
            config.trim_start = start;
            config.trim_end = end;
            let mut project = Project::import("clip.mp4");
            *project.video_config_mut().unwrap() = config;
            Self {
                project,
                updates: 0,
            }
        }
    }

    impl ProjectHost for Host {
        fn active_project(&self) -> Project {
            self.project.clone()
        }

        fn on_project_update(&mut self, project: Project) {
            self.project = project;
            self.updates += 1;
        }

        fn on_batch_item_complete(&mut self) {}
    }

    fn controller(media: StepMedia, sink: MemorySink) -> CaptureController<StepMedia, MemorySink> {
        CaptureController::new(media, sink, Compositor::headless(), CaptureDefaults::default())
            .with_seed(3)
    }

    fn mp4_sink() -> MemorySink {
        MemorySink {
            supported: vec!["video/mp4;codecs=avc1,mp4a.40.2"],
            output: vec![0, 0, 0, 24],
            ..Default::default()
        }
    }

    #[test]
    fn test_loading_media_refuses_playback() {
        let mut media = StepMedia::ready(10.0);
        media.metadata = None;
        let mut ctl = controller(media, mp4_sink());
        let mut host = Host::with_trim(0.0, 0.0);
        assert!(ctl.is_loading());
        assert!(ctl.play(&mut host).is_err());
        assert!(ctl.start_recording(&mut host).is_err());
        assert_eq!(ctl.state(), CaptureState::Idle);
    }

    #[test]
    fn test_metadata_resolves_unset_trim_end() {
        let mut ctl = controller(StepMedia::ready(10.0), mp4_sink());
        let mut host = Host::with_trim(2.0, 0.0);
        ctl.load_metadata(&mut host).unwrap();
        let config = host.project.video_config().unwrap();
        assert_eq!((config.trim_start, config.trim_end), (2.0, 10.0));
        assert_eq!(host.updates, 1);

        ctl.load_metadata(&mut host).unwrap();
        assert_eq!(host.updates, 1);
    }

    #[test]
    fn test_preview_loops_inside_trim_window() {
        let mut ctl = controller(StepMedia::ready(10.0), mp4_sink());
        let mut host = Host::with_trim(2.0, 5.0);
        ctl.play(&mut host).unwrap();
        assert_eq!(ctl.media().current_time(), 2.0);

        ctl.media_mut().seek(5.2);
        assert_eq!(ctl.render_tick(&host), FrameOutcome::Rendered { captured: false });
        assert_eq!(ctl.media().current_time(), 2.0);
        assert_eq!(ctl.physics().len(), 1);
    }

    #[test]
    fn test_speed_edit_applies_on_next_frame() {
        let mut ctl = controller(StepMedia::ready(10.0), mp4_sink());
        let mut host = Host::with_trim(0.0, 10.0);
        ctl.play(&mut host).unwrap();
        ctl.render_tick(&host);

        let config = host.project.video_config_mut().unwrap();
        let id = config.tags[0].id.clone();
        let before = ctl.physics().get(&id).unwrap().speed();
        assert!((before - 4.0).abs() < 1e-9);
        let patch = FloatingTagPatch {
            speed: Some(12.0),
            ..FloatingTagPatch::default()
        };
        assert_eq!(config.update_tag(&id, &patch).unwrap(), Some(12.0));

        ctl.media_mut().seek(1.0 / 60.0);
        ctl.render_tick(&host);
        let after = ctl.physics().get(&id).unwrap().speed();
        assert!((after - 12.0).abs() < 1e-9, "{after}");
    }

    #[test]
    fn test_jittered_display_ticks_keep_capture_rate() {
        let mut ctl = controller(StepMedia::ready(10.0), mp4_sink());
        let mut host = Host::with_trim(0.0, 5.0);
        ctl.start_recording(&mut host).unwrap();

        // One second of 60 Hz ticks, each up to 2 ms late.
        for i in 0..60u64 {
            let jitter = ((i * 7919) % 2000) as f64 / 1_000_000.0;
            ctl.media_mut().seek(i as f64 / 60.0 + jitter);
            ctl.render_tick(&host);
        }
        let frames = &ctl.sink().frames;
        assert_eq!(frames.len(), 30);
        assert!(frames.windows(2).all(|w| w[1] - w[0] < 0.05));
    }

    #[test]
    fn test_pause_stops_the_loop() {
        let mut ctl = controller(StepMedia::ready(10.0), mp4_sink());
        let mut host = Host::with_trim(0.0, 10.0);
        ctl.play(&mut host).unwrap();
        ctl.pause();
        assert_eq!(ctl.state(), CaptureState::Paused);
        assert_eq!(ctl.render_tick(&host), FrameOutcome::Stopped);
        ctl.play(&mut host).unwrap();
        assert_eq!(ctl.state(), CaptureState::Previewing);
    }

    #[test]
    fn test_recording_does_not_loop_and_captures_at_capture_rate() {
        let mut ctl = controller(StepMedia::ready(10.0), mp4_sink());
        let mut host = Host::with_trim(1.0, 3.0);
        let plan = ctl.start_recording(&mut host).unwrap();
        assert_eq!(plan.format.unwrap().mime, "video/mp4;codecs=avc1,mp4a.40.2");
        assert!(plan.audio);
        assert_eq!(ctl.media().current_time(), 1.0);

        // 60 Hz display over 0.5 s of media: 30 fps capture keeps every other frame.
        let mut captured = 0;
        for i in 0..30 {
            ctl.media_mut().seek(1.0 + i as f64 / 60.0);
            if ctl.render_tick(&host) == (FrameOutcome::Rendered { captured: true }) {
                captured += 1;
            }
        }
        assert_eq!(captured, 15);
        assert_eq!(ctl.stats().frames_rendered, 30);

        ctl.media_mut().seek(3.4);
        ctl.render_tick(&host);
        assert_eq!(ctl.media().current_time(), 3.4);
    }

    #[test]
    fn test_monitor_progress_then_stop() {
        let mut ctl = controller(StepMedia::ready(10.0), mp4_sink());
        let mut host = Host::with_trim(1.0, 3.0);
        ctl.start_recording(&mut host).unwrap();

        ctl.media_mut().seek(2.0);
        assert_eq!(ctl.monitor_tick(), MonitorOutcome::Progress(50.0));
        ctl.media_mut().seek(3.0);
        assert_eq!(ctl.monitor_tick(), MonitorOutcome::Stopped(StopReason::TrimEnd));
        assert_eq!(ctl.state(), CaptureState::Finalizing);
        assert!(ctl.media().is_paused());

        // The safety timer loses the race.
        assert!(!ctl.safety_timeout());
        assert_eq!(ctl.stop_record().unwrap().reason, StopReason::TrimEnd);
        assert_eq!(ctl.render_tick(&host), FrameOutcome::Stopped);
    }

    #[test]
    fn test_finalize_names_clip_and_returns_to_idle() {
        let mut ctl = controller(StepMedia::ready(10.0), mp4_sink());
        let mut host = Host::with_trim(1.0, 3.0);
        ctl.start_recording(&mut host).unwrap();
        assert!(ctl.stop(StopReason::Cancelled));

        let file = ctl.finalize(&host).unwrap();
        assert_eq!(file.file_name, "vivitag-clip-clip.mp4");
        assert_eq!(file.mime_type, "video/mp4");
        assert_eq!(ctl.state(), CaptureState::Finalizing);
        ctl.complete();
        assert_eq!(ctl.state(), CaptureState::Idle);
        assert_eq!(ctl.progress(), 0.0);
    }

    #[test]
    fn test_audio_failure_and_no_format_degrade() {
        let mut media = StepMedia::ready(10.0);
        media.audio = false;
        let sink = MemorySink {
            output: vec![1],
            ..Default::default()
        };
        let mut ctl = controller(media, sink);
        let mut host = Host::with_trim(0.0, 2.0);
        let plan = ctl.start_recording(&mut host).unwrap();
        assert!(!plan.audio);
        assert!(plan.format.is_none());
        assert!(ctl.sink().config.as_ref().unwrap().audio.is_none());

        ctl.stop(StopReason::Cancelled);
        let file = ctl.finalize(&host).unwrap();
        assert_eq!(file.file_name, "vivitag-clip-clip.webm");
        assert_eq!(file.mime_type, "video/webm");
    }

    #[test]
    fn test_empty_recording_is_an_error() {
        let sink = MemorySink {
            supported: vec!["video/webm"],
            ..Default::default()
        };
        let mut ctl = controller(StepMedia::ready(10.0), sink);
        let mut host = Host::with_trim(0.0, 2.0);
        ctl.start_recording(&mut host).unwrap();
        ctl.stop(StopReason::TrimEnd);
        assert!(ctl.finalize(&host).is_err());
        assert_eq!(ctl.state(), CaptureState::Idle);
    }

    #[test]
    fn test_recording_twice_is_rejected() {
        let mut ctl = controller(StepMedia::ready(10.0), mp4_sink());
        let mut host = Host::with_trim(0.0, 2.0);
        ctl.start_recording(&mut host).unwrap();
        assert!(ctl.start_recording(&mut host).is_err());
        assert!(ctl.play(&mut host).is_err());
    }

    #[test]
    fn test_removed_tags_lose_physics_state() {
        let mut ctl = controller(StepMedia::ready(10.0), mp4_sink());
        let mut host = Host::with_trim(0.0, 10.0);
        host.project
            .video_config_mut()
            .unwrap()
            .add_tag(FloatingTag::new_default());
        ctl.play(&mut host).unwrap();
        ctl.render_tick(&host);
        assert_eq!(ctl.physics().len(), 2);

        host.project.video_config_mut().unwrap().clear_tags();
        ctl.render_tick(&host);
        assert!(ctl.physics().is_empty());
    }
}
