//! Bouncing-tag physics for floating video tags.
//!
//! Each floating tag owns a [`PhysicsState`] in a [`PhysicsTable`] side-table
//! keyed by tag id. The table belongs to the render loop alone; the project
//! model never sees positions. Every frame a tag moves by its velocity and
//! reflects off the frame edges using its measured text box.
//!
//! Coordinates: `(x, y)` is the left edge and baseline of the text box, so
//! the text occupies `[x, x + width] x [y - height, y]`.

use std::collections::{HashMap, HashSet};

use rand::Rng;

use vivitag_project_model::{FloatingTag, TagId};

/// Horizontal spawn margin so new tags do not start hard against the right edge.
pub const SPAWN_MARGIN_X: f64 = 100.0;

/// Minimum spawn baseline so new tags start below the top edge.
pub const SPAWN_MIN_Y: f64 = 50.0;

/// Speed differences below this are treated as unchanged.
const SPEED_EPSILON: f64 = 1e-9;

/// Position and velocity of one floating tag, in pixels and pixels per frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhysicsState {
    pub x: f64,
    pub y: f64,
    pub vx: f64,
    pub vy: f64,
}

impl PhysicsState {
    /// Velocity magnitude.
    pub fn speed(&self) -> f64 {
        self.vx.hypot(self.vy)
    }
}

/// Measured size of a tag's rendered text.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextExtent {
    pub width: f64,
    pub height: f64,
}

/// Advance one frame with perfectly reflective walls.
///
/// Each axis is handled independently: the far wall is checked first, then
/// the near wall. Velocity magnitude per axis never changes, only its sign.
/// Text larger than the frame is pinned to the left edge or the bottom, so
/// the anchor always stays inside the frame.
pub fn step(state: PhysicsState, frame_w: f64, frame_h: f64, extent: TextExtent) -> PhysicsState {
    let mut next = PhysicsState {
        x: state.x + state.vx,
        y: state.y + state.vy,
        ..state
    };

    if next.x + extent.width > frame_w {
        next.x = (frame_w - extent.width).max(0.0);
        next.vx = -next.vx.abs();
    } else if next.x < 0.0 {
        next.x = 0.0;
        next.vx = next.vx.abs();
    }

    if next.y > frame_h {
        next.y = frame_h;
        next.vy = -next.vy.abs();
    } else if next.y < extent.height {
        next.y = extent.height.min(frame_h);
        next.vy = next.vy.abs();
    }

    next
}

/// Create a state at a random position heading along a random diagonal.
///
/// `x` is drawn from `[0, w - 100)` and `y` from `[50, h)`; either range
/// collapses to its lower bound when the frame is too small. The velocity
/// has magnitude `speed`.
pub fn spawn<R: Rng + ?Sized>(
    speed: f64,
    frame_w: f64,
    frame_h: f64,
    rng: &mut R,
) -> PhysicsState {
    let x_range = (frame_w - SPAWN_MARGIN_X).max(0.0);
    let y_range = (frame_h - SPAWN_MIN_Y).max(0.0);
    let x = rng.gen::<f64>() * x_range;
    let y = SPAWN_MIN_Y + rng.gen::<f64>() * y_range;

    let axis = speed.max(0.0) / std::f64::consts::SQRT_2;
    let vx = if rng.gen_bool(0.5) { axis } else { -axis };
    let vy = if rng.gen_bool(0.5) { axis } else { -axis };

    PhysicsState { x, y, vx, vy }
}

/// Rescale the velocity to a new magnitude, preserving direction.
///
/// A state at rest has no direction; it is sent down the `(+, +)` diagonal.
pub fn renormalize(state: PhysicsState, speed: f64) -> PhysicsState {
    let speed = speed.max(0.0);
    let current = state.speed();
    let (vx, vy) = if current == 0.0 {
        let axis = speed / std::f64::consts::SQRT_2;
        (axis, axis)
    } else {
        (state.vx / current * speed, state.vy / current * speed)
    };
    PhysicsState { vx, vy, ..state }
}

/// Side-table of physics state keyed by floating tag id.
#[derive(Debug, Default)]
pub struct PhysicsTable {
    states: HashMap<TagId, PhysicsState>,
}

impl PhysicsTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance a tag by one frame, spawning it first if it has no state yet.
    ///
    /// A stored velocity whose magnitude no longer matches `tag.speed` is
    /// renormalized before stepping, so speed edits apply on the next frame.
    /// The stepped state replaces the stored one only once computed.
    pub fn advance<R: Rng + ?Sized>(
        &mut self,
        tag: &FloatingTag,
        frame_w: f64,
        frame_h: f64,
        extent: TextExtent,
        rng: &mut R,
    ) -> PhysicsState {
        let current = match self.states.get(&tag.id) {
            Some(state) if (state.speed() - tag.speed.max(0.0)).abs() > SPEED_EPSILON => {
                tracing::trace!(tag = %tag.id, speed = tag.speed, "Renormalized floating tag");
                renormalize(*state, tag.speed)
            }
            Some(state) => *state,
            None => {
                let spawned = spawn(tag.speed, frame_w, frame_h, rng);
                tracing::trace!(
                    tag = %tag.id,
                    x = spawned.x,
                    y = spawned.y,
                    "Spawned floating tag"
                );
                spawned
            }
        };
        let next = step(current, frame_w, frame_h, extent);
        self.states.insert(tag.id.clone(), next);
        next
    }

    /// Apply a speed change to an existing state. Returns false if the tag
    /// has not been spawned yet (it will spawn at the new speed).
    pub fn set_speed(&mut self, id: &TagId, speed: f64) -> bool {
        match self.states.get_mut(id) {
            Some(state) => {
                *state = renormalize(*state, speed);
                true
            }
            None => false,
        }
    }

    pub fn get(&self, id: &TagId) -> Option<&PhysicsState> {
        self.states.get(id)
    }

    pub fn remove(&mut self, id: &TagId) -> Option<PhysicsState> {
        self.states.remove(id)
    }

    /// Drop state for tags that are no longer in `tags`.
    pub fn retain_tags(&mut self, tags: &[FloatingTag]) {
        let live: HashSet<&TagId> = tags.iter().map(|t| &t.id).collect();
        self.states.retain(|id, _| live.contains(id));
    }

    pub fn clear(&mut self) {
        self.states.clear();
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    const EXTENT: TextExtent = TextExtent {
        width: 100.0,
        height: 20.0,
    };

    #[test]
    fn test_left_wall_reflects() {
        let state = PhysicsState {
            x: 0.0,
            y: 100.0,
            vx: -4.0,
            vy: 0.0,
        };
        let next = step(state, 640.0, 360.0, EXTENT);
        assert_eq!(next.x, 0.0);
        assert_eq!(next.vx, 4.0);
    }

    #[test]
    fn test_right_wall_uses_text_width() {
        let state = PhysicsState {
            x: 538.0,
            y: 100.0,
            vx: 3.0,
            vy: 0.0,
        };
        let next = step(state, 640.0, 360.0, EXTENT);
        assert_eq!(next.x, 540.0);
        assert_eq!(next.vx, -3.0);
    }

    #[test]
    fn test_top_margin_is_text_height() {
        let state = PhysicsState {
            x: 10.0,
            y: 22.0,
            vx: 0.0,
            vy: -5.0,
        };
        let next = step(state, 640.0, 360.0, EXTENT);
        assert_eq!(next.y, 20.0);
        assert_eq!(next.vy, 5.0);
    }

    #[test]
    fn test_bottom_wall_is_frame_height() {
        let state = PhysicsState {
            x: 10.0,
            y: 358.0,
            vx: 0.0,
            vy: 5.0,
        };
        let next = step(state, 640.0, 360.0, EXTENT);
        assert_eq!(next.y, 360.0);
        assert_eq!(next.vy, -5.0);
    }

    #[test]
    fn test_spawn_in_range_with_speed_magnitude() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..100 {
            let s = spawn(4.0, 640.0, 360.0, &mut rng);
            assert!(s.x >= 0.0 && s.x < 540.0);
            assert!(s.y >= 50.0 && s.y < 360.0);
            assert!((s.speed() - 4.0).abs() < 1e-9);
            assert!((s.vx.abs() - s.vy.abs()).abs() < 1e-12);
        }
    }

    #[test]
    fn test_spawn_on_tiny_frame_collapses() {
        let mut rng = StdRng::seed_from_u64(1);
        let s = spawn(2.0, 80.0, 40.0, &mut rng);
        assert_eq!(s.x, 0.0);
        assert_eq!(s.y, 50.0);
    }

    #[test]
    fn test_renormalize_preserves_direction() {
        let state = PhysicsState {
            x: 0.0,
            y: 0.0,
            vx: 3.0,
            vy: -4.0,
        };
        let next = renormalize(state, 10.0);
        assert!((next.vx - 6.0).abs() < 1e-9);
        assert!((next.vy + 8.0).abs() < 1e-9);
    }

    #[test]
    fn test_renormalize_from_rest() {
        let state = PhysicsState {
            x: 5.0,
            y: 5.0,
            vx: 0.0,
            vy: 0.0,
        };
        let next = renormalize(state, 2.0);
        assert!(next.vx > 0.0 && next.vy > 0.0);
        assert!((next.speed() - 2.0).abs() < 1e-9);
        assert_eq!((next.x, next.y), (5.0, 5.0));
    }

    #[test]
    fn test_table_lifecycle() {
        let mut rng = StdRng::seed_from_u64(9);
        let mut table = PhysicsTable::new();
        let a = FloatingTag::preset();
        let b = FloatingTag::new_default();

        table.advance(&a, 640.0, 360.0, EXTENT, &mut rng);
        table.advance(&b, 640.0, 360.0, EXTENT, &mut rng);
        assert_eq!(table.len(), 2);

        assert!(table.set_speed(&a.id, 8.0));
        assert!((table.get(&a.id).unwrap().speed() - 8.0).abs() < 1e-9);
        assert!(!table.set_speed(&TagId::from("ghost"), 1.0));

        table.retain_tags(std::slice::from_ref(&b));
        assert_eq!(table.len(), 1);
        assert!(table.get(&a.id).is_none());

        table.clear();
        assert!(table.is_empty());
    }

    #[test]
    fn test_advance_picks_up_speed_edits() {
        let mut rng = StdRng::seed_from_u64(12);
        let mut table = PhysicsTable::new();
        let mut tag = FloatingTag::new_default();
        let before = table.advance(&tag, 1280.0, 720.0, EXTENT, &mut rng);
        assert!((before.speed() - 3.0).abs() < 1e-9);

        tag.speed = 12.0;
        let after = table.advance(&tag, 1280.0, 720.0, EXTENT, &mut rng);
        assert!((after.speed() - 12.0).abs() < 1e-9);
        assert_eq!(after.vx.signum(), before.vx.signum());
    }

    #[test]
    fn test_text_wider_than_frame_stays_anchored_inside() {
        let wide = TextExtent {
            width: 900.0,
            height: 500.0,
        };
        let mut state = PhysicsState {
            x: 0.0,
            y: 100.0,
            vx: 4.0,
            vy: -4.0,
        };
        for _ in 0..10 {
            state = step(state, 640.0, 360.0, wide);
            assert_eq!(state.x, 0.0);
            assert!(state.y >= 0.0 && state.y <= 360.0);
        }
        assert!((state.speed() - 32f64.sqrt()).abs() < 1e-9);
    }

    #[test]
    fn test_advance_moves_existing_state() {
        let mut rng = StdRng::seed_from_u64(5);
        let mut table = PhysicsTable::new();
        let tag = FloatingTag::preset();
        let first = table.advance(&tag, 1280.0, 720.0, EXTENT, &mut rng);
        let second = table.advance(&tag, 1280.0, 720.0, EXTENT, &mut rng);
        assert_ne!(first, second);
        assert!((second.speed() - tag.speed).abs() < 1e-9);
    }
}
