//! Text tag types: static photo tags and physics-driven floating video tags.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::color::Color;

/// Text used by the default photo layer and the video preset.
pub const DEFAULT_TAG_TEXT: &str = "@SeuCanal";

/// Text used by a freshly added (non-preset) video tag.
pub const NEW_TAG_TEXT: &str = "@NovaTag";

/// Default font family.
pub const DEFAULT_FONT_FAMILY: &str = "Outfit";

/// Font family used by the video preset.
pub const PRESET_FONT_FAMILY: &str = "Montserrat";

/// Font families offered by the editor, as `(label, family)`.
pub const FONT_FAMILIES: [(&str, &str); 3] = [
    ("Default (Outfit)", "Outfit"),
    ("Handwritten (Playwrite)", "Playwrite US Trad"),
    ("Modern (Montserrat)", "Montserrat"),
];

/// Photo tags default to 5% of the image width.
pub const DEFAULT_FONT_SIZE_RATIO: f64 = 0.05;

/// Stable tag identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TagId(String);

impl TagId {
    /// Generate a fresh random identity.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TagId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for TagId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Visual style shared by photo and video tags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextStyle {
    /// Fill color.
    pub color: Color,

    /// Opacity in [0.0, 1.0].
    pub opacity: f64,

    /// Font size in source pixels.
    pub font_size: f64,

    /// Font family name.
    pub font_family: String,
}

impl TextStyle {
    pub fn new(color: Color, opacity: f64, font_size: f64, font_family: impl Into<String>) -> Self {
        Self {
            color,
            opacity: opacity.clamp(0.0, 1.0),
            font_size: font_size.max(1.0),
            font_family: font_family.into(),
        }
    }

    /// CSS-style font shorthand, also used as the glyph cache key.
    pub fn font_descriptor(&self) -> String {
        format!(
            "bold {}px \"{}\", sans-serif",
            self.font_size, self.font_family
        )
    }
}

impl Default for TextStyle {
    fn default() -> Self {
        Self::new(Color::WHITE, 1.0, 40.0, DEFAULT_FONT_FAMILY)
    }
}

/// A static text overlay on a photo.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    pub id: TagId,

    /// Text content.
    pub text: String,

    /// Anchor position (text centre) in source pixels.
    pub x: f64,
    pub y: f64,

    /// Rotation in degrees about the anchor.
    #[serde(default)]
    pub rotation: f64,

    #[serde(flatten)]
    pub style: TextStyle,
}

/// Partial update applied to a [`Tag`].
#[derive(Debug, Clone, Default)]
pub struct TagPatch {
    pub text: Option<String>,
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub rotation: Option<f64>,
    pub color: Option<Color>,
    pub opacity: Option<f64>,
    pub font_size: Option<f64>,
    pub font_family: Option<String>,
}

impl Tag {
    /// Create a tag with a fresh identity and no rotation.
    pub fn new(text: impl Into<String>, x: f64, y: f64, style: TextStyle) -> Self {
        Self {
            id: TagId::generate(),
            text: text.into(),
            x,
            y,
            rotation: 0.0,
            style,
        }
    }

    /// The layer a photo starts with: centred, opaque white, 5% of image width.
    pub fn default_for_image(width: u32, height: u32) -> Self {
        Self::new(
            DEFAULT_TAG_TEXT,
            width as f64 / 2.0,
            height as f64 / 2.0,
            TextStyle::new(
                Color::WHITE,
                1.0,
                width as f64 * DEFAULT_FONT_SIZE_RATIO,
                DEFAULT_FONT_FAMILY,
            ),
        )
    }

    /// Apply a partial update in place.
    pub fn apply(&mut self, patch: &TagPatch) {
        if let Some(text) = &patch.text {
            self.text = text.clone();
        }
        if let Some(x) = patch.x {
            self.x = x;
        }
        if let Some(y) = patch.y {
            self.y = y;
        }
        if let Some(rotation) = patch.rotation {
            self.rotation = rotation;
        }
        apply_style(
            &mut self.style,
            patch.color,
            patch.opacity,
            patch.font_size,
            patch.font_family.as_deref(),
        );
    }
}

/// A text overlay animated over video by the physics engine.
///
/// Floating tags carry no position; the render loop owns it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FloatingTag {
    pub id: TagId,

    /// Text content.
    pub text: String,

    /// Velocity magnitude in pixels per frame.
    pub speed: f64,

    #[serde(flatten)]
    pub style: TextStyle,
}

/// Partial update applied to a [`FloatingTag`].
#[derive(Debug, Clone, Default)]
pub struct FloatingTagPatch {
    pub text: Option<String>,
    pub color: Option<Color>,
    pub opacity: Option<f64>,
    pub font_size: Option<f64>,
    pub font_family: Option<String>,
    pub speed: Option<f64>,
}

impl FloatingTag {
    pub fn new(text: impl Into<String>, speed: f64, style: TextStyle) -> Self {
        Self {
            id: TagId::generate(),
            text: text.into(),
            speed: speed.max(0.0),
            style,
        }
    }

    /// The preset tag: `@SeuCanal`, 35px Montserrat, speed 4, 80% opacity.
    pub fn preset() -> Self {
        Self::new(
            DEFAULT_TAG_TEXT,
            4.0,
            TextStyle::new(Color::WHITE, 0.8, 35.0, PRESET_FONT_FAMILY),
        )
    }

    /// A plain new tag: `@NovaTag`, 40px Outfit, speed 3, 80% opacity.
    pub fn new_default() -> Self {
        Self::new(
            NEW_TAG_TEXT,
            3.0,
            TextStyle::new(Color::WHITE, 0.8, 40.0, DEFAULT_FONT_FAMILY),
        )
    }

    /// Copy of this tag under a fresh identity.
    pub fn duplicate(&self) -> Self {
        Self {
            id: TagId::generate(),
            ..self.clone()
        }
    }

    /// Apply a partial update in place. Returns the new speed if it changed.
    pub fn apply(&mut self, patch: &FloatingTagPatch) -> Option<f64> {
        if let Some(text) = &patch.text {
            self.text = text.clone();
        }
        apply_style(
            &mut self.style,
            patch.color,
            patch.opacity,
            patch.font_size,
            patch.font_family.as_deref(),
        );
        match patch.speed {
            Some(speed) => {
                let speed = speed.max(0.0);
                let changed = (speed - self.speed).abs() > f64::EPSILON;
                self.speed = speed;
                changed.then_some(speed)
            }
            None => None,
        }
    }
}

fn apply_style(
    style: &mut TextStyle,
    color: Option<Color>,
    opacity: Option<f64>,
    font_size: Option<f64>,
    font_family: Option<&str>,
) {
    if let Some(color) = color {
        style.color = color;
    }
    if let Some(opacity) = opacity {
        style.opacity = opacity.clamp(0.0, 1.0);
    }
    if let Some(size) = font_size {
        style.font_size = size.max(1.0);
    }
    if let Some(family) = font_family {
        style.font_family = family.to_string();
    }
}
