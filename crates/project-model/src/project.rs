//! Project metadata and editing operations.
//!
//! A project ties one imported media file to its tag content. A project is
//! exactly one mode: photos carry static layers, videos carry a
//! [`VideoConfig`]. The orchestration layer owns the project collection;
//! everything here is a plain value that editing operations transform.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::tag::{Tag, TagId, TagPatch};
use crate::video::VideoConfig;

/// File extensions imported as video clips.
pub const VIDEO_EXTENSIONS: [&str; 6] = ["mp4", "mov", "webm", "mkv", "m4v", "avi"];

/// Media kind of a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaMode {
    Photo,
    Video,
}

/// Reference to the imported source file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaRef {
    /// Location of the source file.
    pub path: PathBuf,

    /// Original file name (used for export naming).
    pub file_name: String,
}

impl MediaRef {
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "media".to_string());
        Self { path, file_name }
    }

    /// Classify by extension.
    pub fn mode(&self) -> MediaMode {
        let ext = self
            .path
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();
        if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
            MediaMode::Video
        } else {
            MediaMode::Photo
        }
    }

    /// File name with the final extension removed (`a.b.jpg` -> `a.b`).
    pub fn basename(&self) -> &str {
        match self.file_name.rfind('.') {
            Some(idx) if idx > 0 => &self.file_name[..idx],
            _ => &self.file_name,
        }
    }

    /// File name up to the first dot (`a.b.mp4` -> `a`).
    pub fn stem(&self) -> &str {
        self.file_name
            .split('.')
            .next()
            .filter(|s| !s.is_empty())
            .unwrap_or(&self.file_name)
    }
}

/// Mode-specific content of a project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum ProjectContent {
    Photo { layers: Vec<Tag> },
    Video { config: VideoConfig },
}

/// One imported media file and its tags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    /// Unique project identifier (UUID).
    pub id: String,

    /// Import timestamp (RFC 3339).
    pub created_at: String,

    /// Source media.
    pub media: MediaRef,

    /// Layers or video config, depending on mode.
    pub content: ProjectContent,
}

impl Project {
    /// Create a project for an imported file, choosing the mode by extension.
    ///
    /// Videos start with the preset floating tag; photos start empty and get
    /// their default layer once the image size is known.
    pub fn import(path: impl AsRef<Path>) -> Self {
        let media = MediaRef::from_path(path);
        let content = match media.mode() {
            MediaMode::Video => ProjectContent::Video {
                config: VideoConfig::with_preset_tag(),
            },
            MediaMode::Photo => ProjectContent::Photo { layers: vec![] },
        };
        Self::with_content(media, content)
    }

    pub fn with_content(media: MediaRef, content: ProjectContent) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            created_at: chrono::Utc::now().to_rfc3339(),
            media,
            content,
        }
    }

    pub fn mode(&self) -> MediaMode {
        match self.content {
            ProjectContent::Photo { .. } => MediaMode::Photo,
            ProjectContent::Video { .. } => MediaMode::Video,
        }
    }

    pub fn layers(&self) -> Result<&[Tag], ProjectError> {
        match &self.content {
            ProjectContent::Photo { layers } => Ok(layers),
            ProjectContent::Video { .. } => Err(ProjectError::WrongMode {
                expected: MediaMode::Photo,
            }),
        }
    }

    pub fn layers_mut(&mut self) -> Result<&mut Vec<Tag>, ProjectError> {
        match &mut self.content {
            ProjectContent::Photo { layers } => Ok(layers),
            ProjectContent::Video { .. } => Err(ProjectError::WrongMode {
                expected: MediaMode::Photo,
            }),
        }
    }

    pub fn video_config(&self) -> Result<&VideoConfig, ProjectError> {
        match &self.content {
            ProjectContent::Video { config } => Ok(config),
            ProjectContent::Photo { .. } => Err(ProjectError::WrongMode {
                expected: MediaMode::Video,
            }),
        }
    }

    pub fn video_config_mut(&mut self) -> Result<&mut VideoConfig, ProjectError> {
        match &mut self.content {
            ProjectContent::Video { config } => Ok(config),
            ProjectContent::Photo { .. } => Err(ProjectError::WrongMode {
                expected: MediaMode::Video,
            }),
        }
    }

    /// Add the default centred layer if the photo has none. Returns whether
    /// a layer was added.
    pub fn ensure_default_layer(&mut self, width: u32, height: u32) -> Result<bool, ProjectError> {
        let layers = self.layers_mut()?;
        if !layers.is_empty() {
            return Ok(false);
        }
        layers.push(Tag::default_for_image(width, height));
        Ok(true)
    }

    /// Append a layer at the top of the paint order.
    pub fn add_layer(&mut self, tag: Tag) -> Result<TagId, ProjectError> {
        let id = tag.id.clone();
        self.layers_mut()?.push(tag);
        Ok(id)
    }

    pub fn update_layer(&mut self, id: &TagId, patch: &TagPatch) -> Result<(), ProjectError> {
        let layer = self.layer_mut(id)?;
        layer.apply(patch);
        Ok(())
    }

    /// Translate a layer by a pointer delta.
    pub fn move_layer(&mut self, id: &TagId, dx: f64, dy: f64) -> Result<(), ProjectError> {
        let layer = self.layer_mut(id)?;
        layer.x += dx;
        layer.y += dy;
        Ok(())
    }

    pub fn remove_layer(&mut self, id: &TagId) -> Result<Tag, ProjectError> {
        let layers = self.layers_mut()?;
        let index = layers
            .iter()
            .position(|l| &l.id == id)
            .ok_or_else(|| ProjectError::UnknownTag { id: id.clone() })?;
        Ok(layers.remove(index))
    }

    pub fn clear_layers(&mut self) -> Result<(), ProjectError> {
        self.layers_mut()?.clear();
        Ok(())
    }

    /// Export name for a tagged photo: `tagged-<basename>-<index>.jpg`.
    pub fn photo_export_name(&self, index: usize) -> String {
        format!("tagged-{}-{index}.jpg", self.media.basename())
    }

    /// Export name for a recorded clip: `vivitag-clip-<stem>.<ext>`.
    pub fn clip_export_name(&self, extension: &str) -> String {
        format!("vivitag-clip-{}.{extension}", self.media.stem())
    }

    fn layer_mut(&mut self, id: &TagId) -> Result<&mut Tag, ProjectError> {
        self.layers_mut()?
            .iter_mut()
            .find(|l| &l.id == id)
            .ok_or_else(|| ProjectError::UnknownTag { id: id.clone() })
    }
}

/// Errors from project editing operations.
#[derive(Debug, thiserror::Error)]
pub enum ProjectError {
    #[error("Invalid trim window: {message}")]
    InvalidTrim { message: String },

    #[error("Unknown tag: {id}")]
    UnknownTag { id: TagId },

    #[error("Operation requires a {expected:?} project")]
    WrongMode { expected: MediaMode },

    #[error("Invalid color: {value}")]
    InvalidColor { value: String },
}
