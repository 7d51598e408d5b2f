//! Pan/zoom state for the map.
//!
//! The transform maps unit-world coordinates (see [`crate::geometry::mercator`])
//! to screen pixels: `screen = world * k + (x, y)`. A scale of `2^z` makes
//! the whole world `2^z` pixels wide, so zoom level `z + 8` in tile terms.

use geo::Coord;

use crate::geometry::{Bounds, LngLat, mercator};
use crate::tiles::{TileSet, compute_tiles};

/// Translation and scale of the current view.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportTransform {
    pub x: f64,
    pub y: f64,
    pub k: f64,
}

impl ViewportTransform {
    pub const IDENTITY: Self = Self {
        x: 0.0,
        y: 0.0,
        k: 1.0,
    };

    pub fn apply(&self, world: Coord<f64>) -> Coord<f64> {
        Coord {
            x: world.x * self.k + self.x,
            y: world.y * self.k + self.y,
        }
    }

    pub fn invert(&self, screen: Coord<f64>) -> Coord<f64> {
        Coord {
            x: (screen.x - self.x) / self.k,
            y: (screen.y - self.y) / self.k,
        }
    }

    fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.k.is_finite() && self.k > 0.0
    }
}

/// Zoom limits and overscroll allowance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportConfig {
    pub min_zoom: i32,
    pub max_zoom: i32,
    /// Pixels the view may pan past the content edge.
    pub margin: f64,
}

impl Default for ViewportConfig {
    fn default() -> Self {
        Self {
            min_zoom: 18,
            max_zoom: 25,
            margin: 0.0,
        }
    }
}

impl ViewportConfig {
    pub fn min_scale(&self) -> f64 {
        2f64.powi(self.min_zoom)
    }

    pub fn max_scale(&self) -> f64 {
        2f64.powi(self.max_zoom.max(self.min_zoom))
    }

    pub fn clamp_zoom(&self, zoom: i32) -> i32 {
        zoom.clamp(self.min_zoom, self.max_zoom.max(self.min_zoom))
    }
}

/// Owns the authoritative transform and keeps it inside the content bounds.
#[derive(Debug, Clone)]
pub struct Viewport {
    config: ViewportConfig,
    width: f64,
    height: f64,
    bounds: Option<Bounds>,
    transform: ViewportTransform,
}

impl Viewport {
    pub fn new(config: ViewportConfig, width: f64, height: f64) -> Self {
        Self {
            config,
            width,
            height,
            bounds: None,
            transform: ViewportTransform {
                x: width / 2.0,
                y: height / 2.0,
                k: config.min_scale(),
            },
        }
    }

    pub fn config(&self) -> &ViewportConfig {
        &self.config
    }

    pub fn transform(&self) -> ViewportTransform {
        self.transform
    }

    pub fn size(&self) -> (f64, f64) {
        (self.width, self.height)
    }

    pub fn set_content_bounds(&mut self, bounds: Option<Bounds>) {
        self.bounds = bounds;
        self.apply_gesture(self.transform);
    }

    /// Centre `center` in the viewport at scale `2^initial_zoom` (clamped to the
    /// configured zoom range), then clamp against `bounds`.
    pub fn initialize(&mut self, center: LngLat, initial_zoom: i32, bounds: Option<Bounds>) {
        self.bounds = bounds;
        let k = 2f64.powi(self.config.clamp_zoom(initial_zoom));
        let c = mercator(center);
        self.apply_gesture(ViewportTransform {
            x: self.width / 2.0 - c.x * k,
            y: self.height / 2.0 - c.y * k,
            k,
        });
    }

    /// Clamp a candidate transform and commit it. Non-finite candidates are
    /// ignored and the current transform is kept.
    pub fn apply_gesture(&mut self, candidate: ViewportTransform) -> ViewportTransform {
        if !candidate.is_finite() {
            return self.transform;
        }

        let k = candidate
            .k
            .clamp(self.config.min_scale(), self.config.max_scale());
        let mut next = ViewportTransform { k, ..candidate };

        if let Some(bounds) = self.bounds {
            let x_min = -bounds.min.x * k;
            let x_max = self.width - bounds.max.x * k;
            let y_min = -bounds.min.y * k;
            let y_max = self.height - bounds.max.y * k;
            next.x = clamp_axis(next.x, x_min, x_max, self.config.margin);
            next.y = clamp_axis(next.y, y_min, y_max, self.config.margin);
        }

        self.transform = next;
        next
    }

    /// Drag by a screen-space delta.
    pub fn pan_by(&mut self, dx: f64, dy: f64) -> ViewportTransform {
        let t = self.transform;
        self.apply_gesture(ViewportTransform {
            x: t.x + dx,
            y: t.y + dy,
            k: t.k,
        })
    }

    /// Multiply the scale by `2^steps`, keeping the viewport centre fixed.
    pub fn zoom_by(&mut self, steps: i32) -> ViewportTransform {
        let t = self.transform;
        let k = (t.k * 2f64.powi(steps)).clamp(self.config.min_scale(), self.config.max_scale());
        let center = Coord {
            x: self.width / 2.0,
            y: self.height / 2.0,
        };
        let anchor = t.invert(center);
        self.apply_gesture(ViewportTransform {
            x: center.x - anchor.x * k,
            y: center.y - anchor.y * k,
            k,
        })
    }

    pub fn resize(&mut self, width: f64, height: f64) -> ViewportTransform {
        self.width = width;
        self.height = height;
        self.apply_gesture(self.transform)
    }

    pub fn compute_visible_tiles(&self) -> TileSet {
        compute_tiles(
            self.width,
            self.height,
            self.transform.k,
            (self.transform.x, self.transform.y),
        )
    }

    /// Geographic position to screen pixels.
    pub fn project(&self, p: LngLat) -> Coord<f64> {
        self.transform.apply(mercator(p))
    }

    /// Screen pixels to unit-world coordinates.
    pub fn to_world(&self, screen: Coord<f64>) -> Coord<f64> {
        self.transform.invert(screen)
    }
}

/// Keep one translation axis inside `[min, max]`. When the content is larger
/// than the viewport `min` exceeds `max` and the two swap roles.
fn clamp_axis(value: f64, min: f64, max: f64, margin: f64) -> f64 {
    if min - max < 0.0 {
        value.max(min - margin).min(max + margin)
    } else {
        value.min(min + margin).max(max - margin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_config(min_zoom: i32, max_zoom: i32) -> ViewportConfig {
        ViewportConfig {
            min_zoom,
            max_zoom,
            margin: 0.0,
        }
    }

    fn square_viewport() -> Viewport {
        let mut vp = Viewport::new(unit_config(0, 3), 500.0, 500.0);
        vp.set_content_bounds(Some(Bounds::new(0.0, 0.0, 1000.0, 1000.0)));
        vp
    }

    fn assert_close(actual: f64, expected: f64) {
        let diff = (actual - expected).abs();
        assert!(diff < 1e-9, "expected {expected}, got {actual}");
    }

    #[test]
    fn pan_past_content_edge_is_clamped_to_boundary() {
        let mut vp = square_viewport();
        let t = vp.apply_gesture(ViewportTransform {
            x: 2000.0,
            y: 0.0,
            k: 1.0,
        });
        assert_close(t.x, 0.0);

        let t = vp.apply_gesture(ViewportTransform {
            x: -2000.0,
            y: -2000.0,
            k: 1.0,
        });
        assert_close(t.x, -500.0);
        assert_close(t.y, -500.0);
    }

    #[test]
    fn scale_is_clamped_to_zoom_range() {
        let mut vp = square_viewport();
        let t = vp.apply_gesture(ViewportTransform {
            x: 0.0,
            y: 0.0,
            k: 100.0,
        });
        assert_close(t.k, 8.0);
        let t = vp.apply_gesture(ViewportTransform {
            x: 0.0,
            y: 0.0,
            k: 0.01,
        });
        assert_close(t.k, 1.0);
    }

    #[test]
    fn small_content_stays_inside_viewport() {
        let mut vp = Viewport::new(unit_config(0, 3), 500.0, 500.0);
        vp.set_content_bounds(Some(Bounds::new(0.0, 0.0, 100.0, 100.0)));
        // Content is 100px wide at k=1, so x may range over [0, 400].
        let t = vp.apply_gesture(ViewportTransform {
            x: 450.0,
            y: -20.0,
            k: 1.0,
        });
        assert_close(t.x, 400.0);
        assert_close(t.y, 0.0);
    }

    #[test]
    fn margin_allows_bounded_overscroll() {
        let mut vp = Viewport::new(
            ViewportConfig {
                min_zoom: 0,
                max_zoom: 3,
                margin: 25.0,
            },
            500.0,
            500.0,
        );
        vp.set_content_bounds(Some(Bounds::new(0.0, 0.0, 1000.0, 1000.0)));
        let t = vp.apply_gesture(ViewportTransform {
            x: 2000.0,
            y: -2000.0,
            k: 1.0,
        });
        assert_close(t.x, 25.0);
        assert_close(t.y, -525.0);
    }

    #[test]
    fn clamped_view_never_exposes_empty_space() {
        let mut vp = square_viewport();
        for &(x, y, k) in &[
            (1e6, -1e6, 1.0),
            (-3000.0, 250.0, 2.0),
            (123.0, 456.0, 7.5),
            (-1e9, 1e9, 8.0),
        ] {
            let t = vp.apply_gesture(ViewportTransform { x, y, k });
            let top_left = t.apply(Coord { x: 0.0, y: 0.0 });
            let bottom_right = t.apply(Coord {
                x: 1000.0,
                y: 1000.0,
            });
            assert!(top_left.x <= 1e-9 && top_left.y <= 1e-9);
            assert!(bottom_right.x >= 500.0 - 1e-9 && bottom_right.y >= 500.0 - 1e-9);
        }
    }

    #[test]
    fn zoom_in_then_out_restores_scale() {
        let mut vp = square_viewport();
        vp.apply_gesture(ViewportTransform {
            x: -100.0,
            y: -100.0,
            k: 2.0,
        });
        let before = vp.transform();
        vp.zoom_by(1);
        assert_close(vp.transform().k, 4.0);
        vp.zoom_by(-1);
        let after = vp.transform();
        assert_close(after.k, before.k);
        assert_close(after.x, before.x);
        assert_close(after.y, before.y);
    }

    #[test]
    fn zoom_keeps_viewport_centre_fixed() {
        let mut vp = square_viewport();
        vp.apply_gesture(ViewportTransform {
            x: -300.0,
            y: -300.0,
            k: 2.0,
        });
        let centre = Coord { x: 250.0, y: 250.0 };
        let world_before = vp.to_world(centre);
        vp.zoom_by(1);
        let world_after = vp.to_world(centre);
        assert_close(world_before.x, world_after.x);
        assert_close(world_before.y, world_after.y);
    }

    #[test]
    fn zoom_stops_at_limits() {
        let mut vp = square_viewport();
        vp.zoom_by(10);
        assert_close(vp.transform().k, 8.0);
        vp.zoom_by(-10);
        assert_close(vp.transform().k, 1.0);
    }

    #[test]
    fn initialize_centres_point_and_clamps_zoom() {
        let mut vp = Viewport::new(ViewportConfig::default(), 800.0, 600.0);
        let center = LngLat::new(-73.9627, 40.7222);
        vp.initialize(center, 30, None);
        assert_close(vp.transform().k, 2f64.powi(25));
        let screen = vp.project(center);
        assert!((screen.x - 400.0).abs() < 1e-6);
        assert!((screen.y - 300.0).abs() < 1e-6);

        vp.initialize(center, 3, None);
        assert_close(vp.transform().k, 2f64.powi(18));
    }

    #[test]
    fn non_finite_gesture_is_ignored() {
        let mut vp = square_viewport();
        let before = vp.transform();
        let after = vp.apply_gesture(ViewportTransform {
            x: f64::NAN,
            y: 0.0,
            k: 1.0,
        });
        assert_eq!(before, after);
    }

    #[test]
    fn resize_reclamps_translation() {
        let mut vp = square_viewport();
        vp.apply_gesture(ViewportTransform {
            x: -500.0,
            y: -500.0,
            k: 1.0,
        });
        let t = vp.resize(800.0, 800.0);
        assert_close(t.x, -200.0);
        assert_close(t.y, -200.0);
    }

    #[test]
    fn visible_tiles_follow_transform() {
        let mut vp = Viewport::new(ViewportConfig::default(), 512.0, 512.0);
        vp.initialize(LngLat::new(-73.9627, 40.7222), 19, None);
        let tiles = vp.compute_visible_tiles();
        assert!(!tiles.is_empty());
        assert!(tiles.tiles.iter().all(|t| t.z == 11));
    }
}
