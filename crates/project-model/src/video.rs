//! Video project configuration: floating tags, blur, and the trim window.

use serde::{Deserialize, Serialize};

use crate::project::ProjectError;
use crate::tag::{FloatingTag, FloatingTagPatch, TagId};

/// Maximum blur radius in pixels.
pub const MAX_BLUR_LEVEL: u32 = 20;

/// Tolerance when comparing a trim end against the media duration.
const DURATION_EPSILON: f64 = 1e-6;

/// Style and timing for a video project.
///
/// Trim invariant: `0 <= trim_start < trim_end <= duration`. A `trim_end` of
/// zero means the window has not been resolved against the media yet and
/// stands for "full duration" until [`VideoConfig::resolve_trim`] runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoConfig {
    /// Floating tags, in paint order.
    pub tags: Vec<FloatingTag>,

    /// Gaussian blur radius applied to the video frame (0 = off).
    pub blur_level: u32,

    /// Start of the exported window, seconds.
    pub trim_start: f64,

    /// End of the exported window, seconds (0 = unresolved).
    pub trim_end: f64,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            tags: vec![],
            blur_level: 0,
            trim_start: 0.0,
            trim_end: 0.0,
        }
    }
}

impl VideoConfig {
    /// Config for a freshly imported clip: one preset tag, full duration.
    pub fn with_preset_tag() -> Self {
        Self {
            tags: vec![FloatingTag::preset()],
            ..Self::default()
        }
    }

    /// Whether `trim_end` has been resolved against the media duration.
    pub fn is_trim_resolved(&self) -> bool {
        self.trim_end > 0.0
    }

    /// Length of the trim window in seconds (zero while unresolved).
    pub fn trim_duration(&self) -> f64 {
        (self.trim_end - self.trim_start).max(0.0)
    }

    /// Resolve the trim window once media metadata is known.
    ///
    /// An unresolved or out-of-range `trim_end` becomes the full duration; a
    /// `trim_start` that no longer fits before it is reset to zero.
    /// Returns whether anything changed.
    pub fn resolve_trim(&mut self, duration_secs: f64) -> bool {
        if !duration_secs.is_finite() || duration_secs <= 0.0 {
            return false;
        }
        let mut changed = false;
        if self.trim_end <= 0.0 || self.trim_end > duration_secs + DURATION_EPSILON {
            self.trim_end = duration_secs;
            changed = true;
        }
        if self.trim_start < 0.0 || self.trim_start >= self.trim_end {
            self.trim_start = 0.0;
            changed = true;
        }
        changed
    }

    /// Move the start of the window. Rejects values at or past `trim_end`.
    pub fn set_trim_start(&mut self, secs: f64) -> Result<(), ProjectError> {
        if !secs.is_finite() || secs < 0.0 {
            return Err(ProjectError::InvalidTrim {
                message: format!("trim start {secs} must be a non-negative number"),
            });
        }
        if self.is_trim_resolved() && secs >= self.trim_end {
            return Err(ProjectError::InvalidTrim {
                message: format!(
                    "trim start {secs} must be before trim end {}",
                    self.trim_end
                ),
            });
        }
        self.trim_start = secs;
        Ok(())
    }

    /// Move the end of the window. Rejects values at or before `trim_start`
    /// or past the media duration.
    pub fn set_trim_end(&mut self, secs: f64, duration_secs: f64) -> Result<(), ProjectError> {
        if !secs.is_finite() || secs <= self.trim_start {
            return Err(ProjectError::InvalidTrim {
                message: format!(
                    "trim end {secs} must be after trim start {}",
                    self.trim_start
                ),
            });
        }
        if secs > duration_secs + DURATION_EPSILON {
            return Err(ProjectError::InvalidTrim {
                message: format!("trim end {secs} exceeds media duration {duration_secs}"),
            });
        }
        self.trim_end = secs;
        Ok(())
    }

    /// Set the blur radius, clamped to `[0, MAX_BLUR_LEVEL]`.
    pub fn set_blur_level(&mut self, level: u32) -> u32 {
        self.blur_level = level.min(MAX_BLUR_LEVEL);
        self.blur_level
    }

    pub fn find_tag(&self, id: &TagId) -> Option<&FloatingTag> {
        self.tags.iter().find(|t| &t.id == id)
    }

    /// Append a tag at the top of the paint order.
    pub fn add_tag(&mut self, tag: FloatingTag) -> TagId {
        let id = tag.id.clone();
        self.tags.push(tag);
        id
    }

    /// Update a tag. Returns the new speed when it changed, so the owner of
    /// the physics state can renormalize the velocity.
    pub fn update_tag(
        &mut self,
        id: &TagId,
        patch: &FloatingTagPatch,
    ) -> Result<Option<f64>, ProjectError> {
        let tag = self
            .tags
            .iter_mut()
            .find(|t| &t.id == id)
            .ok_or_else(|| ProjectError::UnknownTag { id: id.clone() })?;
        Ok(tag.apply(patch))
    }

    pub fn remove_tag(&mut self, id: &TagId) -> Result<FloatingTag, ProjectError> {
        let index = self
            .tags
            .iter()
            .position(|t| &t.id == id)
            .ok_or_else(|| ProjectError::UnknownTag { id: id.clone() })?;
        Ok(self.tags.remove(index))
    }

    pub fn clear_tags(&mut self) {
        self.tags.clear();
    }

    /// Replace the tag list with `count` copies of `template`, each with a
    /// fresh identity.
    pub fn replace_with_copies(&mut self, template: &FloatingTag, count: usize) {
        self.tags = (0..count).map(|_| template.duplicate()).collect();
    }
}
