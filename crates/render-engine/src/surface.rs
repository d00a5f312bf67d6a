//! The raster surface frames are composited onto.

use image::{Rgba, RgbaImage};

use vivitag_common::error::{VivitagError, VivitagResult};
use vivitag_project_model::Color;

use crate::text::GlyphMask;

/// An RGBA8 drawing surface with straight alpha.
#[derive(Debug, Clone)]
pub struct Surface {
    image: RgbaImage,
}

/// Placement of a coverage mask on the surface.
#[derive(Debug, Clone, Copy)]
pub struct MaskPlacement {
    /// Surface point the mask centre is pinned to.
    pub anchor_x: f64,
    pub anchor_y: f64,

    /// Rotation about the anchor, radians (clockwise on screen).
    pub rotation: f64,

    /// Multiplier on mask coverage and fill alpha, [0.0, 1.0].
    pub opacity: f64,
}

impl Surface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            image: RgbaImage::new(width, height),
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    /// Match the surface to a source size. Reallocates only on change.
    pub fn resize(&mut self, width: u32, height: u32) {
        if self.image.dimensions() != (width, height) {
            tracing::debug!(width, height, "Resizing surface");
            self.image = RgbaImage::new(width, height);
        }
    }

    /// Replace every pixel with the base visual, which must match in size.
    pub fn draw_base(&mut self, base: &RgbaImage) -> VivitagResult<()> {
        if base.dimensions() != self.image.dimensions() {
            return Err(VivitagError::render(format!(
                "base {}x{} does not match surface {}x{}",
                base.width(),
                base.height(),
                self.image.width(),
                self.image.height()
            )));
        }
        self.image.copy_from_slice(base.as_raw());
        Ok(())
    }

    /// Fill `color` through a coverage mask, centred on the anchor and
    /// rotated about it.
    pub fn fill_mask(&mut self, mask: &GlyphMask, color: Color, placement: MaskPlacement) {
        if mask.width == 0 || mask.height == 0 || placement.opacity <= 0.0 {
            return;
        }
        let (sin, cos) = placement.rotation.sin_cos();
        let half_w = mask.width as f64 / 2.0;
        let half_h = mask.height as f64 / 2.0;

        // Bounding box of the rotated mask on the surface.
        let ext_x = half_w * cos.abs() + half_h * sin.abs();
        let ext_y = half_w * sin.abs() + half_h * cos.abs();
        let x0 = (placement.anchor_x - ext_x).floor().max(0.0) as i64;
        let y0 = (placement.anchor_y - ext_y).floor().max(0.0) as i64;
        let x1 = ((placement.anchor_x + ext_x).ceil() as i64).min(self.width() as i64);
        let y1 = ((placement.anchor_y + ext_y).ceil() as i64).min(self.height() as i64);

        let alpha_scale = placement.opacity.clamp(0.0, 1.0) * (color.a as f64 / 255.0);
        for py in y0..y1 {
            for px in x0..x1 {
                // Inverse-rotate the pixel centre into mask space.
                let dx = px as f64 + 0.5 - placement.anchor_x;
                let dy = py as f64 + 0.5 - placement.anchor_y;
                let mx = dx * cos + dy * sin + half_w;
                let my = -dx * sin + dy * cos + half_h;
                if mx < 0.0 || my < 0.0 {
                    continue;
                }
                let coverage = mask.get(mx as u32, my as u32);
                if coverage == 0 {
                    continue;
                }
                let alpha = coverage as f64 / 255.0 * alpha_scale;
                let dst = self.image.get_pixel_mut(px as u32, py as u32);
                *dst = blend_over(*dst, color, alpha);
            }
        }
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn as_raw(&self) -> &[u8] {
        self.image.as_raw()
    }

    pub fn into_image(self) -> RgbaImage {
        self.image
    }
}

/// Source-over blend of a solid color at `alpha` onto a straight-alpha pixel.
fn blend_over(dst: Rgba<u8>, src: Color, alpha: f64) -> Rgba<u8> {
    let dst_a = dst[3] as f64 / 255.0;
    let out_a = alpha + dst_a * (1.0 - alpha);
    if out_a <= 0.0 {
        return Rgba([0, 0, 0, 0]);
    }
    let channel = |s: u8, d: u8| {
        let v = (s as f64 * alpha + d as f64 * dst_a * (1.0 - alpha)) / out_a;
        v.round().clamp(0.0, 255.0) as u8
    };
    Rgba([
        channel(src.r, dst[0]),
        channel(src.g, dst[1]),
        channel(src.b, dst[2]),
        (out_a * 255.0).round().clamp(0.0, 255.0) as u8,
    ])
}
