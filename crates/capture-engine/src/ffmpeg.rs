//! FFmpeg-backed media element and encoding sink.
//!
//! [`FfmpegMedia`] decodes a clip to raw RGBA on demand and follows a
//! wall-clock [`PlaybackClock`]. [`FfmpegSink`] pipes raw frames into an
//! `ffmpeg` encoder, taking audio straight from the source file over the
//! recorded window.

use std::collections::HashSet;
use std::io::{BufReader, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::thread::JoinHandle;

use image::RgbaImage;
use serde::Deserialize;

use vivitag_common::clock::PlaybackClock;
use vivitag_common::error::{VivitagError, VivitagResult};

use crate::media::{AudioTrack, MediaElement, MediaMetadata};
use crate::negotiate::{AudioCodec, EncodingFormat, VideoCodec};
use crate::sink::{EncodedChunk, EncodingSink, SinkConfig};

/// Whether a binary is on `PATH`.
pub fn command_exists(binary: &str) -> bool {
    Command::new("sh")
        .arg("-c")
        .arg(format!("command -v {binary} >/dev/null 2>&1"))
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

#[derive(Debug, Deserialize)]
struct MediaInfo {
    #[serde(default)]
    streams: Vec<StreamInfo>,
    format: Option<FormatInfo>,
}

#[derive(Debug, Deserialize)]
struct StreamInfo {
    codec_type: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct FormatInfo {
    duration: Option<String>,
}

/// Read size, duration and audio presence with `ffprobe`.
pub fn read_media_metadata(path: &Path) -> VivitagResult<MediaMetadata> {
    let output = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-show_entries",
            "stream=codec_type,width,height:format=duration",
            "-of",
            "json",
        ])
        .arg(path)
        .output()
        .map_err(|e| VivitagError::media(format!("Failed to run ffprobe: {e}")))?;

    if !output.status.success() {
        return Err(VivitagError::media(format!(
            "ffprobe failed (status {}): {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }
    parse_media_info(&String::from_utf8_lossy(&output.stdout))
}

fn parse_media_info(json: &str) -> VivitagResult<MediaMetadata> {
    let info: MediaInfo = serde_json::from_str(json)?;
    let video = info
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
        .ok_or_else(|| VivitagError::media("No video stream"))?;
    let (width, height) = match (video.width, video.height) {
        (Some(w), Some(h)) if w > 0 && h > 0 => (w, h),
        _ => return Err(VivitagError::media("Video stream has no dimensions")),
    };
    let duration_secs = info
        .format
        .and_then(|f| f.duration)
        .and_then(|d| d.trim().parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d > 0.0)
        .ok_or_else(|| VivitagError::media("Unknown media duration"))?;
    let has_audio = info
        .streams
        .iter()
        .any(|s| s.codec_type.as_deref() == Some("audio"));

    Ok(MediaMetadata {
        width,
        height,
        duration_secs,
        has_audio,
    })
}

/// Sequential RGBA decode starting at a fixed position.
struct FrameDecoder {
    child: Child,
    stdout: BufReader<ChildStdout>,
    start_secs: f64,
    frames_read: u64,
    frame_len: usize,
    width: u32,
    height: u32,
}

impl FrameDecoder {
    fn spawn(
        path: &Path,
        start_secs: f64,
        fps: u32,
        width: u32,
        height: u32,
    ) -> VivitagResult<Self> {
        let mut child = Command::new("ffmpeg")
            .args(["-v", "error", "-ss", &format!("{start_secs:.3}"), "-i"])
            .arg(path)
            .args([
                "-an",
                "-f",
                "rawvideo",
                "-pix_fmt",
                "rgba",
                "-r",
                &fps.to_string(),
                "-",
            ])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| VivitagError::media(format!("Failed to start ffmpeg decoder: {e}")))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| VivitagError::media("Failed to capture decoder stdout"))?;

        tracing::debug!(pid = child.id(), start_secs, fps, "Decoder started");
        Ok(Self {
            child,
            stdout: BufReader::new(stdout),
            start_secs,
            frames_read: 0,
            frame_len: width as usize * height as usize * 4,
            width,
            height,
        })
    }

    /// Next frame, or `None` once the stream is exhausted.
    fn read_frame(&mut self) -> VivitagResult<Option<RgbaImage>> {
        let mut buf = vec![0u8; self.frame_len];
        match self.stdout.read_exact(&mut buf) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(e.into()),
        }
        self.frames_read += 1;
        Ok(RgbaImage::from_raw(self.width, self.height, buf))
    }
}

impl Drop for FrameDecoder {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

/// A video file played back in real time through `ffmpeg`.
pub struct FfmpegMedia {
    path: PathBuf,
    metadata: Option<MediaMetadata>,
    clock: PlaybackClock,
    decode_fps: u32,
    decoder: Option<FrameDecoder>,
    last_frame: Option<RgbaImage>,
}

impl FfmpegMedia {
    /// Open a clip. A file that cannot be inspected stays loading.
    pub fn open(path: impl Into<PathBuf>, decode_fps: u32) -> VivitagResult<Self> {
        let path = path.into();
        if !path.exists() {
            return Err(VivitagError::FileNotFound { path });
        }
        let metadata = match read_media_metadata(&path) {
            Ok(metadata) => {
                tracing::info!(
                    path = %path.display(),
                    width = metadata.width,
                    height = metadata.height,
                    duration_secs = metadata.duration_secs,
                    has_audio = metadata.has_audio,
                    "Media loaded"
                );
                Some(metadata)
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Media failed to load");
                None
            }
        };
        let duration = metadata.map_or(0.0, |m| m.duration_secs);
        Ok(Self {
            path,
            metadata,
            clock: PlaybackClock::new(duration),
            decode_fps: decode_fps.max(1),
            decoder: None,
            last_frame: None,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn restart_decoder(&mut self, position: f64, metadata: MediaMetadata) -> VivitagResult<()> {
        self.decoder = None;
        self.decoder = Some(FrameDecoder::spawn(
            &self.path,
            position,
            self.decode_fps,
            metadata.width,
            metadata.height,
        )?);
        Ok(())
    }
}

impl MediaElement for FfmpegMedia {
    fn metadata(&self) -> Option<MediaMetadata> {
        self.metadata
    }

    fn current_time(&self) -> f64 {
        self.clock.position()
    }

    fn seek(&mut self, secs: f64) {
        self.clock.seek(secs);
        self.decoder = None;
    }

    fn play(&mut self) -> VivitagResult<()> {
        if self.metadata.is_none() {
            return Err(VivitagError::media("Media is still loading"));
        }
        self.clock.play();
        Ok(())
    }

    fn pause(&mut self) {
        self.clock.pause();
    }

    fn is_paused(&self) -> bool {
        !self.clock.is_playing()
    }

    fn has_ended(&self) -> bool {
        self.clock.has_ended()
    }

    fn current_frame(&mut self) -> VivitagResult<RgbaImage> {
        let metadata = self
            .metadata
            .ok_or_else(|| VivitagError::media("Media is still loading"))?;
        let position = self.clock.position();
        let fps = self.decode_fps as f64;

        // Restart on backwards jumps or when more than a second behind.
        let restart = match &self.decoder {
            None => true,
            Some(d) => {
                let next = d.start_secs + d.frames_read as f64 / fps;
                position + 0.5 / fps < d.start_secs || position > next + 1.0
            }
        };
        if restart {
            self.restart_decoder(position, metadata)?;
        }

        if let Some(decoder) = self.decoder.as_mut() {
            let target = ((position - decoder.start_secs) * fps).floor().max(0.0) as u64;
            while decoder.frames_read <= target {
                match decoder.read_frame()? {
                    Some(frame) => self.last_frame = Some(frame),
                    None => break,
                }
            }
        }
        self.last_frame
            .clone()
            .ok_or_else(|| VivitagError::media("Decoder produced no frames"))
    }

    fn attach_audio(&mut self) -> VivitagResult<AudioTrack> {
        match self.metadata {
            Some(m) if m.has_audio => Ok(AudioTrack {
                source: self.path.clone(),
            }),
            _ => Err(VivitagError::media("Media has no audio stream")),
        }
    }
}

/// Encoder names listed by `ffmpeg -encoders`.
fn parse_encoder_list(listing: &str) -> HashSet<String> {
    listing
        .lines()
        .skip_while(|line| !line.trim_start().starts_with("------"))
        .skip(1)
        .filter_map(|line| line.split_whitespace().nth(1))
        .map(str::to_string)
        .collect()
}

fn video_encoder(codec: VideoCodec) -> &'static str {
    match codec {
        VideoCodec::H264 => "libx264",
        VideoCodec::Vp9 => "libvpx-vp9",
    }
}

fn audio_encoder(codec: AudioCodec) -> &'static str {
    match codec {
        AudioCodec::Aac => "aac",
        AudioCodec::Opus => "libopus",
    }
}

/// Arguments for one encode. Without a negotiated format the container is
/// WebM and ffmpeg picks its own codecs.
fn encode_args(config: &SinkConfig, output: &Path) -> Vec<String> {
    let mut args: Vec<String> = [
        "-y",
        "-hide_banner",
        "-loglevel",
        "error",
        "-f",
        "rawvideo",
        "-pix_fmt",
        "rgba",
        "-s",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();
    args.push(format!("{}x{}", config.width, config.height));
    args.extend(["-r".to_string(), config.fps.max(1).to_string()]);
    args.extend(["-i".to_string(), "-".to_string()]);

    if let Some(audio) = &config.audio {
        args.extend([
            "-ss".to_string(),
            format!("{:.3}", config.window.start_secs),
            "-t".to_string(),
            format!("{:.3}", config.window.duration_secs()),
            "-i".to_string(),
            audio.source.display().to_string(),
        ]);
    }

    args.extend(["-map".to_string(), "0:v:0".to_string()]);
    if config.audio.is_some() {
        args.extend(["-map".to_string(), "1:a:0?".to_string()]);
    }
    args.extend([
        "-vf".to_string(),
        "scale=trunc(iw/2)*2:trunc(ih/2)*2".to_string(),
        "-pix_fmt".to_string(),
        "yuv420p".to_string(),
    ]);

    if let Some(format) = &config.format {
        args.extend(["-c:v".to_string(), video_encoder(format.video).to_string()]);
        match format.video {
            VideoCodec::H264 => args.extend(["-preset".to_string(), "veryfast".to_string()]),
            VideoCodec::Vp9 => args.extend([
                "-deadline".to_string(),
                "realtime".to_string(),
                "-cpu-used".to_string(),
                "8".to_string(),
            ]),
        }
    }
    args.extend(["-b:v".to_string(), config.video_bitrate_bps.to_string()]);

    if config.audio.is_some() {
        if let Some(format) = &config.format {
            args.extend(["-c:a".to_string(), audio_encoder(format.audio).to_string()]);
        }
        args.extend(["-b:a".to_string(), config.audio_bitrate_bps.to_string()]);
    }

    let is_mp4 = config.format.as_ref().is_some_and(|f| f.is_mp4());
    if is_mp4 {
        args.extend([
            "-movflags".to_string(),
            "+faststart".to_string(),
            "-f".to_string(),
            "mp4".to_string(),
        ]);
    } else {
        args.extend(["-f".to_string(), "webm".to_string()]);
    }
    args.push(output.display().to_string());
    args
}

struct ActiveEncode {
    child: Child,
    stdin: Option<ChildStdin>,
    stderr_task: Option<JoinHandle<String>>,
    output: PathBuf,
    width: u32,
    height: u32,
    fps: u32,
    frames_written: u64,
}

/// How many copies of a frame stamped `timestamp_secs` keep a constant-rate
/// stream on time after `written` frames. Zero means the slot is already
/// filled and the frame is dropped; more than one pads a gap.
fn frame_repeats(written: u64, timestamp_secs: f64, fps: u32) -> u64 {
    let slot = (timestamp_secs.max(0.0) * fps.max(1) as f64).round() as u64;
    (slot + 1).saturating_sub(written)
}

/// Encodes frames with an `ffmpeg` child process into a temporary file.
pub struct FfmpegSink {
    encoders: HashSet<String>,
    active: Option<ActiveEncode>,
}

impl FfmpegSink {
    /// Ask the installed `ffmpeg` which encoders it has.
    pub fn detect() -> Self {
        let listing = Command::new("ffmpeg")
            .args(["-hide_banner", "-encoders"])
            .output()
            .ok()
            .filter(|out| out.status.success())
            .map(|out| String::from_utf8_lossy(&out.stdout).into_owned())
            .unwrap_or_default();
        let encoders = parse_encoder_list(&listing);
        tracing::debug!(count = encoders.len(), "Detected ffmpeg encoders");
        Self::with_encoders(encoders)
    }

    pub fn with_encoders<I, T>(encoders: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self {
            encoders: encoders.into_iter().map(Into::into).collect(),
            active: None,
        }
    }

    pub fn has_encoder(&self, name: &str) -> bool {
        self.encoders.contains(name)
    }
}

impl EncodingSink for FfmpegSink {
    fn is_type_supported(&self, mime: &str) -> bool {
        EncodingFormat::parse(mime).is_some_and(|format| {
            self.has_encoder(video_encoder(format.video))
                && self.has_encoder(audio_encoder(format.audio))
        })
    }

    fn start(&mut self, config: SinkConfig) -> VivitagResult<()> {
        if self.active.is_some() {
            return Err(VivitagError::capture("Sink already recording"));
        }
        let extension = config.format.as_ref().map_or("webm", |f| f.extension());
        let output =
            std::env::temp_dir().join(format!("vivitag-{}.{extension}", uuid::Uuid::new_v4()));
        let args = encode_args(&config, &output);

        tracing::debug!(args = ?args, "Running ffmpeg");
        let mut child = Command::new("ffmpeg")
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| VivitagError::encode(format!("Failed to start ffmpeg: {e}")))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| VivitagError::encode("Failed to capture ffmpeg stdin"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| VivitagError::encode("Failed to capture ffmpeg stderr"))?;

        // Drain stderr so ffmpeg never blocks on a full pipe.
        let stderr_task = std::thread::spawn(move || -> String {
            let mut reader = BufReader::new(stderr);
            let mut output = String::new();
            match reader.read_to_string(&mut output) {
                Ok(_) => output,
                Err(err) => format!("<failed to read ffmpeg stderr: {err}>"),
            }
        });

        tracing::info!(
            pid = child.id(),
            output = %output.display(),
            width = config.width,
            height = config.height,
            audio = config.audio.is_some(),
            "ffmpeg encoder started"
        );
        self.active = Some(ActiveEncode {
            child,
            stdin: Some(stdin),
            stderr_task: Some(stderr_task),
            output,
            width: config.width,
            height: config.height,
            fps: config.fps,
            frames_written: 0,
        });
        Ok(())
    }

    fn push_frame(&mut self, frame: &RgbaImage, timestamp_secs: f64) -> VivitagResult<()> {
        let active = self
            .active
            .as_mut()
            .ok_or_else(|| VivitagError::capture("Sink is not recording"))?;
        if frame.dimensions() != (active.width, active.height) {
            return Err(VivitagError::encode(format!(
                "frame {}x{} does not match encoder {}x{}",
                frame.width(),
                frame.height(),
                active.width,
                active.height
            )));
        }
        let repeats = frame_repeats(active.frames_written, timestamp_secs, active.fps);
        if repeats == 0 {
            tracing::trace!(timestamp_secs, "Frame slot already written");
            return Ok(());
        }
        if repeats > 1 {
            tracing::trace!(timestamp_secs, padded = repeats - 1, "Padding skipped frame slots");
        }
        let stdin = active
            .stdin
            .as_mut()
            .ok_or_else(|| VivitagError::encode("ffmpeg stdin closed"))?;
        for _ in 0..repeats {
            stdin
                .write_all(frame.as_raw())
                .map_err(|e| VivitagError::encode(format!("Failed to write frame: {e}")))?;
            active.frames_written += 1;
        }
        Ok(())
    }

    fn stop(&mut self) -> VivitagResult<Vec<EncodedChunk>> {
        let mut active = self
            .active
            .take()
            .ok_or_else(|| VivitagError::capture("Sink is not recording"))?;
        drop(active.stdin.take());

        let status = active
            .child
            .wait()
            .map_err(|e| VivitagError::encode(format!("Failed to wait on ffmpeg: {e}")))?;
        let stderr_output = active
            .stderr_task
            .take()
            .map(|task| {
                task.join()
                    .unwrap_or_else(|_| "<failed to join stderr reader>".to_string())
            })
            .unwrap_or_default();

        let bytes = if status.success() {
            std::fs::read(&active.output).map_err(VivitagError::from)
        } else {
            Err(VivitagError::encode(format!(
                "ffmpeg encode failed (status {}): {}",
                status,
                stderr_output.trim()
            )))
        };
        remove_temp(&active.output);
        Ok(vec![EncodedChunk::new(bytes?)])
    }

    fn is_recording(&self) -> bool {
        self.active.is_some()
    }
}

impl Drop for FfmpegSink {
    fn drop(&mut self) {
        if let Some(mut active) = self.active.take() {
            drop(active.stdin.take());
            let _ = active.child.kill();
            let _ = active.child.wait();
            remove_temp(&active.output);
        }
    }
}

fn remove_temp(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        if e.kind() != ErrorKind::NotFound {
            tracing::warn!(path = %path.display(), error = %e, "Failed to remove temp file");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::TrimWindow;

    #[test]
    fn test_parse_media_info() {
        let json = r#"{
            "streams": [
                {"codec_type": "video", "width": 1920, "height": 1080},
                {"codec_type": "audio"}
            ],
            "format": {"duration": "12.480000"}
        }"#;
        let meta = parse_media_info(json).unwrap();
        assert_eq!((meta.width, meta.height), (1920, 1080));
        assert!((meta.duration_secs - 12.48).abs() < 1e-9);
        assert!(meta.has_audio);
    }

    #[test]
    fn test_parse_media_info_rejects_audio_only() {
        let json = r#"{"streams": [{"codec_type": "audio"}], "format": {"duration": "3.0"}}"#;
        assert!(parse_media_info(json).is_err());
    }

    #[test]
    fn test_parse_encoder_list() {
        let listing = "Encoders:\n V..... = Video\n ------\n \
                       V....D libx264              H.264\n \
                       A....D aac                  AAC\n";
        let encoders = parse_encoder_list(listing);
        assert!(encoders.contains("libx264"));
        assert!(encoders.contains("aac"));
        assert!(!encoders.contains("="));
        assert_eq!(encoders.len(), 2);
    }

    #[test]
    fn test_type_support_needs_both_encoders() {
        let sink = FfmpegSink::with_encoders(["libx264", "aac", "libvpx-vp9"]);
        assert!(sink.is_type_supported("video/mp4;codecs=avc1,mp4a.40.2"));
        assert!(sink.is_type_supported("video/mp4"));
        assert!(!sink.is_type_supported("video/mp4;codecs=avc1,opus"));
        assert!(!sink.is_type_supported("video/webm"));
        assert!(!sink.is_type_supported("video/ogg"));
    }

    fn config(format: Option<&str>, audio: bool) -> SinkConfig {
        SinkConfig {
            format: format.and_then(EncodingFormat::parse),
            width: 640,
            height: 360,
            fps: 30,
            video_bitrate_bps: 25_000_000,
            audio_bitrate_bps: 192_000,
            audio: audio.then(|| AudioTrack {
                source: PathBuf::from("/media/clip.mov"),
            }),
            window: TrimWindow::new(1.5, 4.0),
        }
    }

    fn joined(args: &[String]) -> String {
        args.join(" ")
    }

    #[test]
    fn test_mp4_args_with_audio_window() {
        let args = encode_args(
            &config(Some("video/mp4;codecs=avc1,mp4a.40.2"), true),
            Path::new("/tmp/out.mp4"),
        );
        let line = joined(&args);
        assert!(line.contains("-s 640x360 -r 30 -i -"));
        assert!(line.contains("-ss 1.500 -t 2.500 -i /media/clip.mov"));
        assert!(line.contains("-c:v libx264"));
        assert!(line.contains("-c:a aac -b:a 192000"));
        assert!(line.contains("-b:v 25000000"));
        assert!(line.contains("-f mp4"));
        assert_eq!(args.last().map(String::as_str), Some("/tmp/out.mp4"));
    }

    #[test]
    fn test_default_encoder_args_are_webm_without_codecs() {
        let line = joined(&encode_args(&config(None, false), Path::new("/tmp/out.webm")));
        assert!(!line.contains("-c:v"));
        assert!(!line.contains("-b:a"));
        assert!(!line.contains("1:a:0"));
        assert!(line.contains("-f webm"));
    }

    #[test]
    fn test_frame_repeats_follow_timestamps() {
        assert_eq!(frame_repeats(0, 0.0, 30), 1);
        assert_eq!(frame_repeats(1, 1.0 / 30.0, 30), 1);
        // Two missed slots are padded with the current frame.
        assert_eq!(frame_repeats(2, 0.1, 30), 2);
        // A second frame for a filled slot is dropped.
        assert_eq!(frame_repeats(4, 0.1, 30), 0);
        assert_eq!(frame_repeats(0, -0.5, 30), 1);

        // 23 evenly spread captures over a second still fill 30 slots.
        let mut written = 0;
        for i in 0..23u64 {
            written += frame_repeats(written, i as f64 * 0.0435, 30);
        }
        assert_eq!(written, 30);
    }

    #[test]
    fn test_sink_rejects_frames_when_idle() {
        let mut sink = FfmpegSink::with_encoders(Vec::<String>::new());
        assert!(sink.push_frame(&RgbaImage::new(2, 2), 0.0).is_err());
        assert!(sink.stop().is_err());
        assert!(!sink.is_recording());
    }

    #[test]
    fn test_open_missing_file() {
        let err = FfmpegMedia::open("/no/such/clip.mp4", 30).err().unwrap();
        assert!(matches!(err, VivitagError::FileNotFound { .. }));
    }
}
