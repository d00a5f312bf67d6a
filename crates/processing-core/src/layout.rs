//! Scatter layout: distribute N copies of a tag across an image on a
//! jittered grid.
//!
//! The grid is sized to the image aspect ratio, cells are visited in a
//! shuffled order, and each tag lands near its cell centre with up to 25% of
//! the cell size of jitter on each axis. Randomness is injected so layouts are
//! reproducible under a seeded generator.

use rand::seq::SliceRandom;
use rand::Rng;

use vivitag_common::error::{VivitagError, VivitagResult};
use vivitag_project_model::{
    Color, FloatingTag, Project, ProjectContent, Tag, TextStyle, DEFAULT_FONT_FAMILY,
    DEFAULT_FONT_SIZE_RATIO, DEFAULT_TAG_TEXT,
};

/// Maximum jitter as a fraction of the cell dimension, either direction.
pub const JITTER_FRACTION: f64 = 0.25;

/// Presentation rotation applied to scattered tags unless the template says
/// otherwise.
pub const DEFAULT_SCATTER_ROTATION: f64 = -30.0;

/// Opacity of scattered tags when no layer is selected as a template.
pub const DEFAULT_SCATTER_OPACITY: f64 = 0.5;

/// Style copied onto every scattered tag.
#[derive(Debug, Clone, PartialEq)]
pub struct ScatterTemplate {
    pub text: String,
    pub style: TextStyle,
    pub rotation: f64,
}

impl ScatterTemplate {
    /// Defaults for an image of the given width: `@SeuCanal`, white, half
    /// opacity, 5% of the width, tilted by [`DEFAULT_SCATTER_ROTATION`].
    pub fn defaults_for_width(width: u32) -> Self {
        Self {
            text: DEFAULT_TAG_TEXT.to_string(),
            style: TextStyle::new(
                Color::WHITE,
                DEFAULT_SCATTER_OPACITY,
                width as f64 * DEFAULT_FONT_SIZE_RATIO,
                DEFAULT_FONT_FAMILY,
            ),
            rotation: DEFAULT_SCATTER_ROTATION,
        }
    }

    /// Copy text, style and rotation from an existing layer.
    pub fn from_tag(tag: &Tag) -> Self {
        Self {
            text: tag.text.clone(),
            style: tag.style.clone(),
            rotation: tag.rotation,
        }
    }
}

/// Grid dimensions `(cols, rows)` for `count` tags on a `width x height` image.
pub fn grid_for(count: usize, width: u32, height: u32) -> (usize, usize) {
    let aspect = width as f64 / height as f64;
    let mut cols = (count as f64 * aspect).sqrt().round() as usize;
    if cols < 2 && count >= 4 {
        cols = 2;
    }
    let cols = cols.max(1);
    let rows = count.div_ceil(cols).max(1);
    (cols, rows)
}

/// Generate `count` new tags scattered across a `width x height` image.
///
/// Returns only the new tags; appending them to a layer list is up to the
/// caller. Every tag gets a fresh identity.
pub fn scatter<R: Rng + ?Sized>(
    count: usize,
    width: u32,
    height: u32,
    template: &ScatterTemplate,
    rng: &mut R,
) -> VivitagResult<Vec<Tag>> {
    if width == 0 || height == 0 {
        return Err(VivitagError::layout(format!(
            "cannot scatter on an empty {width}x{height} canvas"
        )));
    }
    if count == 0 {
        return Ok(vec![]);
    }

    let (cols, rows) = grid_for(count, width, height);
    let cell_w = width as f64 / cols as f64;
    let cell_h = height as f64 / rows as f64;

    let mut cells: Vec<(usize, usize)> = (0..rows)
        .flat_map(|r| (0..cols).map(move |c| (r, c)))
        .collect();
    cells.shuffle(rng);

    let tags = (0..count)
        .map(|i| {
            let (r, c) = cells[i % cells.len()];
            let jitter_x = rng.gen_range(-JITTER_FRACTION..=JITTER_FRACTION) * cell_w;
            let jitter_y = rng.gen_range(-JITTER_FRACTION..=JITTER_FRACTION) * cell_h;
            let x = c as f64 * cell_w + cell_w / 2.0 + jitter_x;
            let y = r as f64 * cell_h + cell_h / 2.0 + jitter_y;

            let mut tag = Tag::new(template.text.clone(), x, y, template.style.clone());
            tag.rotation = template.rotation;
            tag
        })
        .collect();

    tracing::debug!(count, cols, rows, width, height, "Scattered tags");
    Ok(tags)
}

/// Scatter tags into a project and return the updated project.
///
/// Photo projects get `count` new layers appended on a `width x height` grid,
/// styled after `template` (or the image defaults). Video projects have their
/// tag list replaced by `count` copies of the floating template; positions are
/// left to the physics engine.
pub fn scatter_into_project<R: Rng + ?Sized>(
    project: &Project,
    count: usize,
    width: u32,
    height: u32,
    template: Option<&ScatterTemplate>,
    rng: &mut R,
) -> VivitagResult<Project> {
    let mut next = project.clone();
    match &mut next.content {
        ProjectContent::Photo { layers } => {
            let defaults;
            let template = match template {
                Some(t) => t,
                None => {
                    defaults = ScatterTemplate::defaults_for_width(width);
                    &defaults
                }
            };
            let tags = scatter(count, width, height, template, rng)?;
            layers.extend(tags);
        }
        ProjectContent::Video { .. } => {
            next = scatter_floating(&next, count, None)?;
        }
    }
    Ok(next)
}

/// Replace a video project's tags with `count` copies of a template.
///
/// The template is `selected` if given, else the first existing tag, else a
/// fresh default tag.
pub fn scatter_floating(
    project: &Project,
    count: usize,
    selected: Option<&FloatingTag>,
) -> VivitagResult<Project> {
    let mut next = project.clone();
    let config = next
        .video_config_mut()
        .map_err(|e| VivitagError::project(e.to_string()))?;
    let template = selected
        .cloned()
        .or_else(|| config.tags.first().cloned())
        .unwrap_or_else(FloatingTag::new_default);
    config.replace_with_copies(&template, count);
    tracing::debug!(count, text = %template.text, "Replaced floating tags");
    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashSet;

    #[test]
    fn test_grid_square_five() {
        assert_eq!(grid_for(5, 1000, 1000), (2, 3));
    }

    #[test]
    fn test_grid_portrait_forces_two_columns() {
        // sqrt(4 * 0.25) = 1, bumped to 2
        assert_eq!(grid_for(4, 500, 2000), (2, 2));
    }

    #[test]
    fn test_grid_single_tag_on_tall_image() {
        // sqrt(1 * 0.1) rounds to 0, clamped to one column
        assert_eq!(grid_for(1, 100, 1000), (1, 1));
    }

    #[test]
    fn test_grid_wide_image() {
        let (cols, rows) = grid_for(10, 1920, 1080);
        assert_eq!(cols, 4);
        assert_eq!(rows, 3);
        assert!(cols * rows >= 10);
    }

    #[test]
    fn test_scatter_copies_template_style() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut template = ScatterTemplate::defaults_for_width(800);
        template.text = "@brand".into();
        let tags = scatter(3, 800, 600, &template, &mut rng).unwrap();
        for tag in &tags {
            assert_eq!(tag.text, "@brand");
            assert_eq!(tag.rotation, DEFAULT_SCATTER_ROTATION);
            assert_eq!(tag.style.opacity, DEFAULT_SCATTER_OPACITY);
            assert!((tag.style.font_size - 40.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_scatter_uses_each_cell_before_cycling() {
        let mut rng = StdRng::seed_from_u64(11);
        let template = ScatterTemplate::defaults_for_width(1000);
        let tags = scatter(6, 1000, 1000, &template, &mut rng).unwrap();
        let (cols, rows) = grid_for(6, 1000, 1000);
        let cell_w = 1000.0 / cols as f64;
        let cell_h = 1000.0 / rows as f64;
        let cells: HashSet<(usize, usize)> = tags
            .iter()
            .map(|t| ((t.x / cell_w) as usize, (t.y / cell_h) as usize))
            .collect();
        assert_eq!(cells.len(), cols * rows);
    }

    #[test]
    fn test_scatter_rejects_empty_canvas() {
        let mut rng = StdRng::seed_from_u64(1);
        let template = ScatterTemplate::defaults_for_width(0);
        assert!(scatter(3, 0, 100, &template, &mut rng).is_err());
    }

    #[test]
    fn test_scatter_into_photo_appends() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut project = Project::import("beach.jpg");
        project.ensure_default_layer(1000, 800).unwrap();
        let before = project.layers().unwrap()[0].clone();

        let next = scatter_into_project(&project, 4, 1000, 800, None, &mut rng).unwrap();
        let layers = next.layers().unwrap();
        assert_eq!(layers.len(), 5);
        assert_eq!(layers[0], before);
        assert_eq!(project.layers().unwrap().len(), 1);
    }

    #[test]
    fn test_scatter_floating_replaces_with_first_tag_copies() {
        let project = Project::import("clip.mp4");
        let first = project.video_config().unwrap().tags[0].clone();

        let next = scatter_floating(&project, 5, None).unwrap();
        let tags = &next.video_config().unwrap().tags;
        assert_eq!(tags.len(), 5);
        assert!(tags.iter().all(|t| t.text == first.text && t.id != first.id));
        let ids: HashSet<_> = tags.iter().map(|t| t.id.clone()).collect();
        assert_eq!(ids.len(), 5);
    }

    #[test]
    fn test_scatter_floating_defaults_when_empty() {
        let mut project = Project::import("clip.mp4");
        project.video_config_mut().unwrap().clear_tags();
        let next = scatter_floating(&project, 2, None).unwrap();
        let tags = &next.video_config().unwrap().tags;
        assert_eq!(tags[0].text, "@NovaTag");
        assert_eq!(tags[0].speed, 3.0);
    }
}
