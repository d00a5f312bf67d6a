//! Frame compositor.
//!
//! Draws a base visual plus an ordered list of text tags onto a [`Surface`].
//! Later tags paint over earlier ones. Photo tags rotate about their anchor;
//! floating video tags are positioned by the physics table and get a soft
//! drop shadow for legibility over moving footage.

use image::RgbaImage;
use rand::Rng;

use vivitag_common::config::RenderDefaults;
use vivitag_common::error::VivitagResult;
use vivitag_processing_core::physics::{spawn, PhysicsState, PhysicsTable, TextExtent};
use vivitag_project_model::{
    Color, FloatingTag, Project, ProjectContent, Tag, TextStyle, VideoConfig,
};

use crate::blur::{blur_image, blur_interleaved, kernel_radius};
use crate::surface::{MaskPlacement, Surface};
use crate::text::{BlockGlyphs, FontBook, GlyphMask, TextRasterizer};

/// Drop shadow drawn under floating tags.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShadowStyle {
    pub color: Color,
    /// Shadow blur, in the same units as a canvas `shadowBlur`.
    pub blur_px: u32,
}

impl Default for ShadowStyle {
    fn default() -> Self {
        Self {
            color: Color::rgba(0, 0, 0, 128),
            blur_px: 4,
        }
    }
}

/// Composites tags onto frames.
pub struct Compositor {
    text: Box<dyn TextRasterizer>,
    shadow: ShadowStyle,
}

impl Compositor {
    pub fn new(text: Box<dyn TextRasterizer>) -> Self {
        Self {
            text,
            shadow: ShadowStyle::default(),
        }
    }

    /// Compositor drawing with block glyphs only.
    pub fn headless() -> Self {
        Self::new(Box::new(BlockGlyphs))
    }

    /// Build from render settings, discovering fonts in the configured dirs.
    pub fn from_config(config: &RenderDefaults) -> Self {
        let book = FontBook::discover(&config.font_dirs);
        let text: Box<dyn TextRasterizer> = if book.is_empty() {
            tracing::warn!("No fonts found, text will be drawn with block glyphs");
            Box::new(BlockGlyphs)
        } else {
            Box::new(book)
        };
        Self::new(text).with_shadow_blur(config.shadow_blur_px)
    }

    pub fn with_shadow_blur(mut self, blur_px: u32) -> Self {
        self.shadow.blur_px = blur_px;
        self
    }

    pub fn text_backend(&self) -> &str {
        self.text.name()
    }

    /// Rendered text box size for a style.
    pub fn measure(&self, text: &str, style: &TextStyle) -> TextExtent {
        self.text.measure(text, style)
    }

    /// Draw a photo and its layers.
    pub fn render_photo(
        &self,
        surface: &mut Surface,
        base: &RgbaImage,
        layers: &[Tag],
    ) -> VivitagResult<()> {
        surface.resize(base.width(), base.height());
        surface.draw_base(base)?;
        for layer in layers {
            self.draw_text(
                surface,
                &layer.text,
                &layer.style,
                layer.x,
                layer.y,
                layer.rotation,
                false,
            );
        }
        Ok(())
    }

    /// Draw one video frame: blurred base, then each floating tag advanced
    /// one physics step.
    pub fn render_video_frame<R: Rng + ?Sized>(
        &self,
        surface: &mut Surface,
        base: &RgbaImage,
        config: &VideoConfig,
        physics: &mut PhysicsTable,
        rng: &mut R,
    ) -> VivitagResult<()> {
        let (width, height) = base.dimensions();
        surface.resize(width, height);
        if config.blur_level > 0 {
            surface.draw_base(&blur_image(base, config.blur_level)?)?;
        } else {
            surface.draw_base(base)?;
        }

        for tag in &config.tags {
            let extent = self.measure(&tag.text, &tag.style);
            let state = physics.advance(tag, width as f64, height as f64, extent, rng);
            self.draw_floating(surface, tag, state, extent);
        }
        Ok(())
    }

    /// One-shot frame for thumbnails and previews.
    ///
    /// Video tags are drawn at freshly spawned positions from a throwaway
    /// physics table, never the live one.
    pub fn render_preview_frame(
        &self,
        project: &Project,
        base: &RgbaImage,
    ) -> VivitagResult<RgbaImage> {
        let mut surface = Surface::new(base.width(), base.height());
        match &project.content {
            ProjectContent::Photo { layers } => {
                self.render_photo(&mut surface, base, layers)?;
            }
            ProjectContent::Video { config } => {
                let (width, height) = base.dimensions();
                if config.blur_level > 0 {
                    surface.draw_base(&blur_image(base, config.blur_level)?)?;
                } else {
                    surface.draw_base(base)?;
                }
                let mut rng = rand::thread_rng();
                for tag in &config.tags {
                    let extent = self.measure(&tag.text, &tag.style);
                    let state = spawn(tag.speed, width as f64, height as f64, &mut rng);
                    self.draw_floating(&mut surface, tag, state, extent);
                }
            }
        }
        Ok(surface.into_image())
    }

    /// Physics positions are left edge / baseline; text is drawn centred.
    fn draw_floating(
        &self,
        surface: &mut Surface,
        tag: &FloatingTag,
        state: PhysicsState,
        extent: TextExtent,
    ) {
        let cx = state.x + extent.width / 2.0;
        let cy = state.y - extent.height / 2.0;
        self.draw_text(surface, &tag.text, &tag.style, cx, cy, 0.0, true);
    }

    #[allow(clippy::too_many_arguments)]
    fn draw_text(
        &self,
        surface: &mut Surface,
        text: &str,
        style: &TextStyle,
        x: f64,
        y: f64,
        rotation_deg: f64,
        shadow: bool,
    ) {
        if text.is_empty() {
            return;
        }
        let mask = self.text.rasterize(text, style);
        let placement = MaskPlacement {
            anchor_x: x,
            anchor_y: y,
            rotation: rotation_deg.to_radians(),
            opacity: style.opacity,
        };

        if shadow && self.shadow.color.a > 0 {
            match soften(&mask, self.shadow.blur_px) {
                Ok(soft) => surface.fill_mask(&soft, self.shadow.color, placement),
                Err(err) => tracing::warn!(error = %err, "Skipping tag shadow"),
            }
        }
        surface.fill_mask(&mask, style.color, placement);
    }
}

/// Pad and blur a mask for use as a shadow. Canvas shadow blur is twice
/// the gaussian sigma.
fn soften(mask: &GlyphMask, blur_px: u32) -> VivitagResult<GlyphMask> {
    if blur_px == 0 {
        return Ok(mask.clone());
    }
    let sigma = blur_px as f32 / 2.0;
    let pad = kernel_radius(sigma);
    let width = mask.width + pad * 2;
    let height = mask.height + pad * 2;
    let mut padded = GlyphMask::empty(width, height, mask.baseline + pad);
    for y in 0..mask.height {
        let src = (y * mask.width) as usize;
        let dst = ((y + pad) * width + pad) as usize;
        padded.coverage[dst..dst + mask.width as usize]
            .copy_from_slice(&mask.coverage[src..src + mask.width as usize]);
    }
    padded.coverage = blur_interleaved(&padded.coverage, width, height, 1, pad, sigma)?;
    Ok(padded)
}
