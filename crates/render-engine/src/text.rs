//! Text measurement and rasterization.
//!
//! Uses fontdue for CPU glyph rasterization. Fonts are discovered from
//! configured directories and matched by family name, preferring bold faces.
//! When no font file is available the [`BlockGlyphs`] fallback keeps
//! measurement and drawing working with a fixed half-em advance.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use fontdue::{Font, FontSettings};

use vivitag_common::error::{VivitagError, VivitagResult};
use vivitag_processing_core::physics::TextExtent;
use vivitag_project_model::TextStyle;

/// Horizontal advance of a fallback glyph, as a fraction of font size.
pub const FALLBACK_ADVANCE_RATIO: f64 = 0.5;

/// Coverage bitmap of a rendered line of text.
///
/// The bitmap spans the full line box; `baseline` is the row of the
/// alphabetic baseline.
#[derive(Debug, Clone, PartialEq)]
pub struct GlyphMask {
    pub width: u32,
    pub height: u32,
    pub baseline: u32,
    pub coverage: Vec<u8>,
}

impl GlyphMask {
    pub fn empty(width: u32, height: u32, baseline: u32) -> Self {
        Self {
            width,
            height,
            baseline,
            coverage: vec![0; width as usize * height as usize],
        }
    }

    pub fn get(&self, x: u32, y: u32) -> u8 {
        if x >= self.width || y >= self.height {
            return 0;
        }
        self.coverage[(y * self.width + x) as usize]
    }

    /// Max-combine a glyph bitmap at `(left, top)`.
    fn stamp(&mut self, left: i32, top: i32, w: usize, h: usize, bitmap: &[u8]) {
        for gy in 0..h {
            let y = top + gy as i32;
            if y < 0 || y >= self.height as i32 {
                continue;
            }
            for gx in 0..w {
                let x = left + gx as i32;
                if x < 0 || x >= self.width as i32 {
                    continue;
                }
                let idx = (y as u32 * self.width + x as u32) as usize;
                self.coverage[idx] = self.coverage[idx].max(bitmap[gy * w + gx]);
            }
        }
    }

    /// Whether any pixel has coverage.
    pub fn is_blank(&self) -> bool {
        self.coverage.iter().all(|&c| c == 0)
    }
}

/// Measures and rasterizes single-line text for a style.
pub trait TextRasterizer: Send + Sync {
    /// Text box size: advance width by font size.
    fn measure(&self, text: &str, style: &TextStyle) -> TextExtent;

    /// Rasterize the text into a coverage mask.
    fn rasterize(&self, text: &str, style: &TextStyle) -> GlyphMask;

    /// Backend name, for diagnostics.
    fn name(&self) -> &str;
}

/// Deterministic fallback drawing each visible character as a solid block.
#[derive(Debug, Default, Clone, Copy)]
pub struct BlockGlyphs;

impl TextRasterizer for BlockGlyphs {
    fn measure(&self, text: &str, style: &TextStyle) -> TextExtent {
        TextExtent {
            width: text.chars().count() as f64 * style.font_size * FALLBACK_ADVANCE_RATIO,
            height: style.font_size,
        }
    }

    fn rasterize(&self, text: &str, style: &TextStyle) -> GlyphMask {
        let size = style.font_size;
        let advance = size * FALLBACK_ADVANCE_RATIO;
        let extent = self.measure(text, style);
        let width = extent.width.ceil().max(1.0) as u32;
        let height = size.ceil().max(1.0) as u32;
        let baseline = (size * 0.8).round() as u32;
        let mut mask = GlyphMask::empty(width, height, baseline);

        let top = (size * 0.15).round() as i32;
        let bottom = baseline as i32;
        let glyph_h = (bottom - top).max(1) as usize;
        for (i, ch) in text.chars().enumerate() {
            if ch.is_whitespace() {
                continue;
            }
            let left = (i as f64 * advance + advance * 0.1).round() as i32;
            let right = ((i + 1) as f64 * advance - advance * 0.1).round() as i32;
            let glyph_w = (right - left).max(1) as usize;
            mask.stamp(left, top, glyph_w, glyph_h, &vec![255; glyph_w * glyph_h]);
        }
        mask
    }

    fn name(&self) -> &str {
        "block"
    }
}

/// Fonts loaded from disk, keyed by normalized family name.
pub struct FontBook {
    families: HashMap<String, Font>,
    default_family: Option<String>,
}

impl FontBook {
    /// An empty book: everything falls back to [`BlockGlyphs`].
    pub fn empty() -> Self {
        Self {
            families: HashMap::new(),
            default_family: None,
        }
    }

    /// Scan directories for `.ttf`/`.otf` files and load one face per family.
    ///
    /// A family's bold face wins over other weights. Unreadable files are
    /// skipped with a warning.
    pub fn discover(dirs: &[PathBuf]) -> Self {
        let mut candidates: HashMap<String, (bool, PathBuf)> = HashMap::new();
        for dir in dirs {
            for path in font_files(dir) {
                let Some(stem) = path.file_stem().map(|s| s.to_string_lossy().into_owned()) else {
                    continue;
                };
                let (family, bold) = family_from_stem(&stem);
                let replace = match candidates.get(&family) {
                    Some((existing_bold, _)) => bold && !existing_bold,
                    None => true,
                };
                if replace {
                    candidates.insert(family, (bold, path));
                }
            }
        }

        let mut book = Self::empty();
        let mut names: Vec<_> = candidates.into_iter().collect();
        names.sort_by(|a, b| a.0.cmp(&b.0));
        for (family, (_, path)) in names {
            if let Err(err) = book.load(&family, &path) {
                tracing::warn!(error = %err, path = %path.display(), "Skipping unreadable font");
            }
        }
        tracing::debug!(families = book.families.len(), "Font discovery complete");
        book
    }

    /// Load a font file under a family name.
    pub fn load(&mut self, family: &str, path: &Path) -> VivitagResult<()> {
        let data = std::fs::read(path)?;
        let font = Font::from_bytes(data, FontSettings::default()).map_err(|e| {
            VivitagError::render(format!("failed to parse font {}: {e}", path.display()))
        })?;
        let key = normalize_family(family);
        if self.default_family.is_none() {
            self.default_family = Some(key.clone());
        }
        self.families.insert(key, font);
        Ok(())
    }

    pub fn families(&self) -> impl Iterator<Item = &str> {
        self.families.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.families.is_empty()
    }

    /// Font for a family, else the first loaded font as the sans-serif stand-in.
    fn font_for(&self, family: &str) -> Option<&Font> {
        self.families.get(&normalize_family(family)).or_else(|| {
            self.default_family
                .as_ref()
                .and_then(|key| self.families.get(key))
        })
    }
}

impl TextRasterizer for FontBook {
    fn measure(&self, text: &str, style: &TextStyle) -> TextExtent {
        let Some(font) = self.font_for(&style.font_family) else {
            return BlockGlyphs.measure(text, style);
        };
        let size = style.font_size as f32;
        let width: f32 = text
            .chars()
            .map(|ch| font.metrics(ch, size).advance_width)
            .sum();
        TextExtent {
            width: width as f64,
            height: style.font_size,
        }
    }

    fn rasterize(&self, text: &str, style: &TextStyle) -> GlyphMask {
        let Some(font) = self.font_for(&style.font_family) else {
            return BlockGlyphs.rasterize(text, style);
        };
        let size = style.font_size as f32;
        let (ascent, descent) = match font.horizontal_line_metrics(size) {
            Some(m) => (m.ascent, m.descent),
            None => (size * 0.8, -size * 0.2),
        };
        let extent = self.measure(text, style);
        let width = extent.width.ceil().max(1.0) as u32;
        let height = (ascent - descent).ceil().max(1.0) as u32;
        let baseline = ascent.round().max(0.0) as u32;
        let mut mask = GlyphMask::empty(width, height, baseline);

        let mut pen_x = 0.0f32;
        for ch in text.chars() {
            let (metrics, bitmap) = font.rasterize(ch, size);
            let left = (pen_x + metrics.xmin as f32).round() as i32;
            let top = baseline as i32 - (metrics.height as i32 + metrics.ymin);
            mask.stamp(left, top, metrics.width, metrics.height, &bitmap);
            pen_x += metrics.advance_width;
        }
        mask
    }

    fn name(&self) -> &str {
        "fontdue"
    }
}

/// Lowercase a family name and drop separators: `"Playwrite US Trad"` ->
/// `"playwriteustrad"`.
pub fn normalize_family(family: &str) -> String {
    family
        .chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Split a font file stem like `Montserrat-Bold` into `("montserrat", true)`.
fn family_from_stem(stem: &str) -> (String, bool) {
    let (family, style) = match stem.split_once('-') {
        Some((family, style)) => (family, style),
        None => (stem, ""),
    };
    let bold = style.to_ascii_lowercase().contains("bold")
        || stem.to_ascii_lowercase().ends_with("bold");
    let family = normalize_family(family);
    let family = family
        .strip_suffix("bold")
        .filter(|f| !f.is_empty())
        .map(str::to_string)
        .unwrap_or(family);
    (family, bold)
}

fn font_files(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return vec![];
    };
    let mut files = vec![];
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            files.extend(font_files(&path));
            continue;
        }
        let is_font = path
            .extension()
            .map(|e| {
                let e = e.to_string_lossy().to_ascii_lowercase();
                e == "ttf" || e == "otf"
            })
            .unwrap_or(false);
        if is_font {
            files.push(path);
        }
    }
    files
}

#[cfg(test)]
mod tests {
    use super::*;
    use vivitag_project_model::Color;

    fn style(size: f64) -> TextStyle {
        TextStyle::new(Color::WHITE, 1.0, size, "Outfit")
    }

    #[test]
    fn test_block_measure_is_half_em_per_char() {
        let extent = BlockGlyphs.measure("@abc", &style(40.0));
        assert_eq!(extent.width, 80.0);
        assert_eq!(extent.height, 40.0);
    }

    #[test]
    fn test_block_rasterize_skips_spaces() {
        let mask = BlockGlyphs.rasterize("a b", &style(20.0));
        assert_eq!(mask.width, 30);
        assert_eq!(mask.height, 20);
        // centre of the first and third cells are inked, the space is not
        assert_eq!(mask.get(5, 10), 255);
        assert_eq!(mask.get(15, 10), 0);
        assert_eq!(mask.get(25, 10), 255);
    }

    #[test]
    fn test_empty_book_falls_back_to_blocks() {
        let book = FontBook::empty();
        let s = style(30.0);
        assert_eq!(book.measure("hey", &s), BlockGlyphs.measure("hey", &s));
        assert!(!book.rasterize("hey", &s).is_blank());
    }

    #[test]
    fn test_discover_missing_dir_is_empty() {
        let book = FontBook::discover(&[PathBuf::from("/definitely/not/a/font/dir")]);
        assert!(book.is_empty());
    }

    #[test]
    fn test_family_from_stem() {
        assert_eq!(family_from_stem("Montserrat-Bold"), ("montserrat".into(), true));
        assert_eq!(family_from_stem("Outfit-Regular"), ("outfit".into(), false));
        assert_eq!(family_from_stem("OutfitBold"), ("outfit".into(), true));
        assert_eq!(
            family_from_stem("PlaywriteUSTrad-Regular"),
            ("playwriteustrad".into(), false)
        );
        assert_eq!(normalize_family("Playwrite US Trad"), "playwriteustrad");
    }
}
