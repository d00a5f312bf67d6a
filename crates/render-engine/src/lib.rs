//! Vivitag Render Engine
//!
//! Rasterizes tagged frames for photo export and live video capture.
//!
//! # Frame Pipeline
//!
//! ```text
//! base image / video frame ──┐
//!                            ├── Blur (video only)
//!                            ├── Base draw
//! tags + physics ────────────┤
//!                            ├── Text rasterize (fontdue / block fallback)
//!                            ├── Shadow (video only)
//!                            ▼
//!                         Surface ──► JPEG export / capture sink
//! ```

pub mod blur;
pub mod compositor;
pub mod export;
pub mod interaction;
pub mod surface;
pub mod text;

pub use compositor::Compositor;
pub use export::*;
pub use interaction::{canvas_point, hit_test, DisplayRect, DragSession};
pub use surface::Surface;
pub use text::{BlockGlyphs, FontBook, TextRasterizer};
