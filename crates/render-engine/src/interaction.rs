//! Pointer interaction with photo layers: hit-testing and dragging.
//!
//! Hit boxes are deliberately coarse. A layer covers
//! `|px - x| <= chars * size * 0.5` horizontally and `|py - y| <= size`
//! vertically around its anchor, ignoring glyph metrics and rotation.

use vivitag_common::error::{VivitagError, VivitagResult};
use vivitag_project_model::{Project, Tag, TagId};

/// On-screen rectangle the canvas is displayed in, in client units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplayRect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

/// Map a client-space point to canvas pixels.
///
/// The displayed canvas may be scaled; `canvas_size` is its pixel size.
pub fn canvas_point(
    client: (f64, f64),
    rect: DisplayRect,
    canvas_size: (u32, u32),
) -> (f64, f64) {
    let scale_x = if rect.width > 0.0 {
        canvas_size.0 as f64 / rect.width
    } else {
        1.0
    };
    let scale_y = if rect.height > 0.0 {
        canvas_size.1 as f64 / rect.height
    } else {
        1.0
    };
    (
        (client.0 - rect.left) * scale_x,
        (client.1 - rect.top) * scale_y,
    )
}

/// Whether a point falls inside a layer's coarse hit box.
pub fn hits(layer: &Tag, x: f64, y: f64) -> bool {
    let size = layer.style.font_size;
    let half_len = layer.text.chars().count() as f64 * size * 0.5;
    (x - layer.x).abs() <= half_len && (y - layer.y).abs() <= size
}

/// Topmost layer under the point, scanning back to front.
pub fn hit_test(layers: &[Tag], x: f64, y: f64) -> Option<&Tag> {
    layers.iter().rev().find(|layer| hits(layer, x, y))
}

/// Drag state for moving photo layers with a pointer.
#[derive(Debug, Default)]
pub struct DragSession {
    selected: Option<TagId>,
    last_point: Option<(f64, f64)>,
}

impl DragSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Currently selected layer, if any.
    pub fn selected(&self) -> Option<&TagId> {
        self.selected.as_ref()
    }

    pub fn is_dragging(&self) -> bool {
        self.last_point.is_some()
    }

    /// Pointer pressed at a canvas point. Selects and starts dragging the
    /// topmost layer there, or clears the selection on a miss.
    pub fn pointer_down(
        &mut self,
        project: &Project,
        point: (f64, f64),
    ) -> VivitagResult<Option<TagId>> {
        let layers = project
            .layers()
            .map_err(|e| VivitagError::project(e.to_string()))?;
        match hit_test(layers, point.0, point.1) {
            Some(layer) => {
                tracing::debug!(layer = %layer.id, x = point.0, y = point.1, "Layer picked");
                self.selected = Some(layer.id.clone());
                self.last_point = Some(point);
            }
            None => {
                self.selected = None;
                self.last_point = None;
            }
        }
        Ok(self.selected.clone())
    }

    /// Pointer moved. Translates the selected layer by the delta since the
    /// last point. Returns whether the project changed.
    pub fn pointer_move(
        &mut self,
        project: &mut Project,
        point: (f64, f64),
    ) -> VivitagResult<bool> {
        let (Some(id), Some(last)) = (self.selected.as_ref(), self.last_point) else {
            return Ok(false);
        };
        project
            .move_layer(id, point.0 - last.0, point.1 - last.1)
            .map_err(|e| VivitagError::project(e.to_string()))?;
        self.last_point = Some(point);
        Ok(true)
    }

    /// Pointer released or left the canvas. Selection is kept.
    pub fn pointer_up(&mut self) {
        self.last_point = None;
    }
}
