//! Render one tagged frame to PNG.

use std::path::{Path, PathBuf};

use vivitag_capture_engine::ffmpeg::FfmpegMedia;
use vivitag_capture_engine::MediaElement;
use vivitag_common::config::AppConfig;
use vivitag_project_model::{MediaMode, Project};
use vivitag_render_engine::{encode_png, load_image, Compositor};

use super::photo::tag_photo;
use super::{configure_video, display_stem, TagArgs, VideoArgs};

pub fn run(
    config: &AppConfig,
    input: PathBuf,
    output: Option<PathBuf>,
    at: f64,
    scatter: Option<usize>,
    tag: TagArgs,
) -> anyhow::Result<()> {
    let compositor = Compositor::from_config(&config.render);
    let frame = match Project::import(&input).mode() {
        MediaMode::Photo => {
            let project = tag_photo(&input, scatter, None, &tag)?;
            let base = load_image(&input)?;
            compositor.render_preview_frame(&project, &base)?
        }
        MediaMode::Video => {
            let args = VideoArgs {
                copies: scatter,
                tag,
                ..VideoArgs::default()
            };
            preview_video(config, &compositor, &input, at, &args)?
        }
    };

    let output = output.unwrap_or_else(|| {
        input
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join(format!("preview-{}.png", display_stem(&input)))
    });
    std::fs::write(&output, encode_png(&frame)?)?;
    println!(
        "Preview written: {} ({}x{})",
        output.display(),
        frame.width(),
        frame.height()
    );
    Ok(())
}

fn preview_video(
    config: &AppConfig,
    compositor: &Compositor,
    clip: &Path,
    at: f64,
    args: &VideoArgs,
) -> anyhow::Result<image::RgbaImage> {
    let mut media = FfmpegMedia::open(clip, config.capture.capture_fps)?;
    let metadata = media
        .metadata()
        .ok_or_else(|| anyhow::anyhow!("Could not decode {}", clip.display()))?;
    let project = configure_video(&Project::import(clip), metadata.duration_secs, args)?;

    media.seek(at.clamp(0.0, metadata.duration_secs));
    let base = media.current_frame()?;
    Ok(compositor.render_preview_frame(&project, &base)?)
}
