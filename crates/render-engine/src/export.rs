//! Still-image export and the deliverable file type shared with video export.

use std::io::Cursor;
use std::path::Path;

use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat, RgbaImage};

use vivitag_common::error::{VivitagError, VivitagResult};
use vivitag_project_model::Project;

use crate::compositor::Compositor;

/// Default JPEG quality for tagged photos.
pub const DEFAULT_JPEG_QUALITY: u8 = 95;

/// A finished export ready to be shared or saved.
#[derive(Debug, Clone, PartialEq)]
pub struct DeliverableFile {
    /// Suggested file name, including extension.
    pub file_name: String,

    /// MIME type of `bytes`.
    pub mime_type: String,

    pub bytes: Vec<u8>,
}

impl DeliverableFile {
    pub fn new(
        file_name: impl Into<String>,
        mime_type: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            mime_type: mime_type.into(),
            bytes,
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Decode an image file into RGBA.
pub fn load_image(path: &Path) -> VivitagResult<RgbaImage> {
    if !path.exists() {
        return Err(VivitagError::FileNotFound {
            path: path.to_path_buf(),
        });
    }
    let image = image::open(path)?;
    tracing::debug!(
        path = %path.display(),
        width = image.width(),
        height = image.height(),
        "Loaded image"
    );
    Ok(image.to_rgba8())
}

/// Encode as baseline JPEG. Alpha is dropped.
pub fn encode_jpeg(image: &RgbaImage, quality: u8) -> VivitagResult<Vec<u8>> {
    let rgb = DynamicImage::ImageRgba8(image.clone()).to_rgb8();
    let mut bytes = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut bytes, quality.clamp(1, 100));
    rgb.write_with_encoder(encoder)?;
    Ok(bytes)
}

/// Encode as PNG.
pub fn encode_png(image: &RgbaImage) -> VivitagResult<Vec<u8>> {
    let mut cursor = Cursor::new(Vec::new());
    image.write_to(&mut cursor, ImageFormat::Png)?;
    Ok(cursor.into_inner())
}

/// Render a photo project and encode it as `tagged-<name>-<index>.jpg`.
pub fn export_photo(
    compositor: &Compositor,
    project: &Project,
    base: &RgbaImage,
    index: usize,
    quality: u8,
) -> VivitagResult<DeliverableFile> {
    let layers = project
        .layers()
        .map_err(|e| VivitagError::project(e.to_string()))?;
    let frame = compositor.render_preview_frame(project, base)?;
    let bytes = encode_jpeg(&frame, quality)?;
    let file = DeliverableFile::new(project.photo_export_name(index), "image/jpeg", bytes);
    tracing::info!(
        file = %file.file_name,
        layers = layers.len(),
        bytes = file.len(),
        quality,
        "Exported photo"
    );
    Ok(file)
}
