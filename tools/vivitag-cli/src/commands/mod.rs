pub mod batch;
pub mod check;
pub mod photo;
pub mod preview;
pub mod video;

use std::path::{Path, PathBuf};

use clap::Args;

use vivitag_capture_engine::ProjectHost;
use vivitag_common::config::AppConfig;
use vivitag_processing_core::scatter_floating;
use vivitag_project_model::{Color, FloatingTagPatch, Project, TagPatch};

/// Tag text and style shared by every command.
#[derive(Args, Debug, Clone, Default)]
pub struct TagArgs {
    /// Tag text
    #[arg(long)]
    pub text: Option<String>,

    /// Tag color (`white`, `black`, `#rrggbb` or `#rrggbbaa`)
    #[arg(long)]
    pub color: Option<Color>,

    /// Tag opacity (0.0-1.0)
    #[arg(long)]
    pub opacity: Option<f64>,

    /// Font size in pixels
    #[arg(long)]
    pub font_size: Option<f64>,

    /// Font family
    #[arg(long)]
    pub font: Option<String>,
}

impl TagArgs {
    /// Whether any style option was given.
    pub fn is_set(&self) -> bool {
        self.text.is_some()
            || self.color.is_some()
            || self.opacity.is_some()
            || self.font_size.is_some()
            || self.font.is_some()
    }

    pub fn layer_patch(&self) -> TagPatch {
        TagPatch {
            text: self.text.clone(),
            color: self.color,
            opacity: self.opacity.map(|o| o.clamp(0.0, 1.0)),
            font_size: self.font_size,
            font_family: self.font.clone(),
            ..TagPatch::default()
        }
    }

    pub fn floating_patch(&self, speed: Option<f64>) -> FloatingTagPatch {
        FloatingTagPatch {
            text: self.text.clone(),
            color: self.color,
            opacity: self.opacity.map(|o| o.clamp(0.0, 1.0)),
            font_size: self.font_size,
            font_family: self.font.clone(),
            speed,
        }
    }
}

/// Recording options shared by `video` and `batch`.
#[derive(Args, Debug, Clone, Default)]
pub struct VideoArgs {
    /// Start of the recorded window (seconds)
    #[arg(long)]
    pub trim_start: Option<f64>,

    /// End of the recorded window (seconds, defaults to the clip length)
    #[arg(long)]
    pub trim_end: Option<f64>,

    /// Background blur level (0-20)
    #[arg(long)]
    pub blur: Option<u32>,

    /// Tag speed in pixels per frame
    #[arg(long)]
    pub speed: Option<f64>,

    /// Number of floating copies of the tag
    #[arg(long)]
    pub copies: Option<usize>,

    #[command(flatten)]
    pub tag: TagArgs,
}

/// Apply recording options to a freshly imported clip of known duration.
pub fn configure_video(
    project: &Project,
    duration_secs: f64,
    args: &VideoArgs,
) -> anyhow::Result<Project> {
    let mut next = project.clone();
    {
        let config = next.video_config_mut()?;
        config.resolve_trim(duration_secs);
        if let Some(end) = args.trim_end {
            config.set_trim_end(end, duration_secs)?;
        }
        if let Some(start) = args.trim_start {
            config.set_trim_start(start)?;
        }
        if let Some(blur) = args.blur {
            let applied = config.set_blur_level(blur);
            if applied != blur {
                tracing::warn!(requested = blur, applied, "Blur level clamped");
            }
        }
        if args.tag.is_set() || args.speed.is_some() {
            if let Some(id) = config.tags.first().map(|t| t.id.clone()) {
                config.update_tag(&id, &args.tag.floating_patch(args.speed))?;
            }
        }
    }
    if let Some(copies) = args.copies {
        next = scatter_floating(&next, copies, None)?;
    }
    Ok(next)
}

/// Where exports land: `--output`, else the configured directory.
pub fn output_dir(config: &AppConfig, output: Option<PathBuf>) -> PathBuf {
    output.unwrap_or_else(|| config.output_dir.clone())
}

/// File stem for messages and default output names.
pub fn display_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "media".to_string())
}

/// Single-project host for command-line runs.
pub struct CliHost {
    pub project: Project,
    pub completed: usize,
}

impl CliHost {
    pub fn new(project: Project) -> Self {
        Self {
            project,
            completed: 0,
        }
    }
}

impl ProjectHost for CliHost {
    fn active_project(&self) -> Project {
        self.project.clone()
    }

    fn on_project_update(&mut self, project: Project) {
        self.project = project;
    }

    fn on_batch_item_complete(&mut self) {
        self.completed += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clip() -> Project {
        Project::import("/clips/beach.mp4")
    }

    #[test]
    fn test_configure_video_sets_window_and_style() {
        let args = VideoArgs {
            trim_start: Some(2.0),
            trim_end: Some(6.0),
            blur: Some(50),
            speed: Some(7.0),
            copies: Some(3),
            tag: TagArgs {
                text: Some("@beach".into()),
                ..TagArgs::default()
            },
        };
        let project = configure_video(&clip(), 10.0, &args).unwrap();
        let config = project.video_config().unwrap();
        assert_eq!((config.trim_start, config.trim_end), (2.0, 6.0));
        assert_eq!(config.blur_level, 20);
        assert_eq!(config.tags.len(), 3);
        assert!(config.tags.iter().all(|t| t.text == "@beach" && t.speed == 7.0));
    }

    #[test]
    fn test_configure_video_defaults_to_full_clip() {
        let project = configure_video(&clip(), 12.5, &VideoArgs::default()).unwrap();
        let config = project.video_config().unwrap();
        assert_eq!((config.trim_start, config.trim_end), (0.0, 12.5));
        assert_eq!(config.tags.len(), 1);
    }

    #[test]
    fn test_configure_video_rejects_end_past_duration() {
        let args = VideoArgs {
            trim_end: Some(30.0),
            ..VideoArgs::default()
        };
        assert!(configure_video(&clip(), 10.0, &args).is_err());
    }

    #[test]
    fn test_layer_patch_clamps_opacity() {
        let args = TagArgs {
            opacity: Some(1.5),
            ..TagArgs::default()
        };
        assert!(args.is_set());
        assert_eq!(args.layer_patch().opacity, Some(1.0));
        assert!(!TagArgs::default().is_set());
    }
}
