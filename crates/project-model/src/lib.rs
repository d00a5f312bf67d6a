//! Vivitag Project Model
//!
//! Defines the core data contracts for Vivitag projects:
//! - **Tags:** Static text overlays placed on photos
//! - **Floating tags:** Text overlays animated over video frames
//! - **Video config:** Tag list, blur level, and the trim window
//! - **Project:** One imported media file plus its photo or video content
//!
//! Coordinates are in source pixels of the imported media.

pub mod color;
pub mod project;
pub mod tag;
pub mod video;

pub use color::*;
pub use project::*;
pub use tag::*;
pub use video::*;
