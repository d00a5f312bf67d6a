//! Record a clip with floating tags.

use std::path::{Path, PathBuf};

use vivitag_capture_engine::ffmpeg::{FfmpegMedia, FfmpegSink};
use vivitag_capture_engine::{
    CaptureController, Delivery, DeliveryTargets, MediaElement, RecordingEvent, RecordingReport,
    RecordingSession,
};
use vivitag_common::config::AppConfig;
use vivitag_project_model::{MediaMode, Project};
use vivitag_render_engine::Compositor;

use super::{configure_video, output_dir, CliHost, VideoArgs};

pub async fn run(
    config: &AppConfig,
    clip: PathBuf,
    output: Option<PathBuf>,
    json: bool,
    args: VideoArgs,
) -> anyhow::Result<()> {
    println!("Recording clip: {}", clip.display());

    let dir = output_dir(config, output);
    let (report, _) = record_clip(config, &clip, &dir, &args, false, !json).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

/// Record one clip into `dir`. Returns the report and how many batch items
/// the host saw complete.
pub async fn record_clip(
    config: &AppConfig,
    clip: &Path,
    dir: &Path,
    args: &VideoArgs,
    queued: bool,
    show_progress: bool,
) -> anyhow::Result<(RecordingReport, usize)> {
    let project = Project::import(clip);
    if project.mode() != MediaMode::Video {
        anyhow::bail!("Not a video: {}", clip.display());
    }

    let media = FfmpegMedia::open(clip, config.capture.capture_fps)?;
    let metadata = media
        .metadata()
        .ok_or_else(|| anyhow::anyhow!("Could not decode {}", clip.display()))?;
    let project = configure_video(&project, metadata.duration_secs, args)?;
    if let Ok(video) = project.video_config() {
        println!(
            "  Window: {:.2}s - {:.2}s of {:.2}s",
            video.trim_start, video.trim_end, metadata.duration_secs
        );
        println!("  Tags: {} (blur {})", video.tags.len(), video.blur_level);
    }

    let mut host = CliHost::new(project);
    let mut controller = CaptureController::new(
        media,
        FfmpegSink::detect(),
        Compositor::from_config(&config.render),
        config.capture.clone(),
    );

    let mut session = RecordingSession::new(config.capture.clone()).queued(queued);
    let mut events = session.subscribe();
    let printer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                RecordingEvent::Started { format, audio } if show_progress => {
                    println!(
                        "  Format: {} ({})",
                        format.as_deref().unwrap_or("encoder default"),
                        if audio { "with audio" } else { "video only" }
                    );
                }
                RecordingEvent::Progress { percent } if show_progress => {
                    print!("\r  Progress: {percent:.1}%  ");
                }
                RecordingEvent::Stopped { reason, .. } if show_progress => {
                    println!("\r  Progress: 100.0% ({reason:?})");
                }
                _ => {}
            }
        }
    });

    let targets = DeliveryTargets::directory(dir);
    let result = session.record(&mut host, &mut controller, &targets).await;
    drop(session);
    if let Err(e) = printer.await {
        tracing::debug!(error = %e, "Progress printer ended abnormally");
    }

    let report = result?;
    let stats = &report.stats;
    tracing::debug!(
        frames_rendered = stats.frames_rendered,
        frames_captured = stats.frames_captured,
        drop_rate = stats.drop_rate(),
        "Recording stats"
    );
    Ok((report, host.completed))
}

pub fn print_report(report: &RecordingReport) {
    match &report.delivery {
        Delivery::Downloaded { path } => println!("Saved: {}", path.display()),
        Delivery::Shared => println!("Shared: {}", report.file_name),
    }
    println!("  Type: {}", report.mime_type);
    println!("  Size: {} bytes", report.bytes);
    println!(
        "  Stopped: {:?} ({:+.0} ms from trim end)",
        report.stop_reason, report.drift_ms
    );
    println!(
        "  Frames: {} captured, {} dropped",
        report.stats.frames_captured, report.stats.frames_dropped
    );
}
