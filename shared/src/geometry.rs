use std::f64::consts::{FRAC_PI_4, PI, TAU};

use geo::{BoundingRect, Contains, Coord, Geometry, MapCoords, MultiPolygon, Point};
use serde::{Deserialize, Serialize};

/// A geographic position in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LngLat {
    pub lng: f64,
    pub lat: f64,
}

impl LngLat {
    pub const fn new(lng: f64, lat: f64) -> Self {
        Self { lng, lat }
    }
}

/// Project onto the unit mercator world (scale 1/tau, no translation).
/// Both axes span [-0.5, 0.5]; y grows southwards.
pub fn mercator(p: LngLat) -> Coord<f64> {
    let lambda = p.lng.to_radians();
    let phi = p.lat.to_radians();
    Coord {
        x: lambda / TAU,
        y: -(FRAC_PI_4 + phi / 2.0).tan().ln() / TAU,
    }
}

pub fn invert_mercator(c: Coord<f64>) -> LngLat {
    let lambda = c.x * TAU;
    let phi = 2.0 * (-c.y * TAU).exp().atan() - PI / 2.0;
    LngLat {
        lng: lambda.to_degrees(),
        lat: phi.to_degrees(),
    }
}

/// Axis-aligned extent in unit-world coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min: Coord<f64>,
    pub max: Coord<f64>,
}

impl Bounds {
    pub const fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min: Coord { x: min_x, y: min_y },
            max: Coord { x: max_x, y: max_y },
        }
    }

    pub fn union(self, other: Bounds) -> Bounds {
        Bounds {
            min: Coord {
                x: self.min.x.min(other.min.x),
                y: self.min.y.min(other.min.y),
            },
            max: Coord {
                x: self.max.x.max(other.max.x),
                y: self.max.y.max(other.max.y),
            },
        }
    }

    pub fn width(&self) -> f64 {
        self.max.x - self.min.x
    }

    pub fn height(&self) -> f64 {
        self.max.y - self.min.y
    }
}

/// Feature geometry projected once into unit-world space.
/// Kept alongside the geographic rings so repaints never re-run the projection.
#[derive(Debug, Clone, PartialEq)]
pub struct Shape {
    pub geographic: MultiPolygon<f64>,
    pub projected: MultiPolygon<f64>,
}

impl Shape {
    pub fn new(geographic: MultiPolygon<f64>) -> Self {
        let projected = geographic.map_coords(|c| mercator(LngLat::new(c.x, c.y)));
        Self {
            geographic,
            projected,
        }
    }

    pub fn bounds(&self) -> Option<Bounds> {
        self.projected.bounding_rect().map(|rect| Bounds {
            min: rect.min(),
            max: rect.max(),
        })
    }

    /// Whether a unit-world point falls inside the shape (holes excluded).
    pub fn contains(&self, world: Coord<f64>) -> bool {
        self.projected.contains(&Point::from(world))
    }
}

/// Union of the bounds of every shape, `None` when there are no shapes.
pub fn projected_bounds<'a>(shapes: impl IntoIterator<Item = &'a Shape>) -> Option<Bounds> {
    shapes
        .into_iter()
        .filter_map(Shape::bounds)
        .reduce(Bounds::union)
}

/// Convert a GeoJSON geometry into polygons. Only `Polygon` and
/// `MultiPolygon` are accepted; rings come back closed.
pub fn parse_geometry(geometry: geojson::Geometry) -> Result<MultiPolygon<f64>, String> {
    let geom: Geometry<f64> = geometry
        .value
        .try_into()
        .map_err(|e: geojson::Error| format!("parse error: {e}"))?;
    match geom {
        Geometry::Polygon(p) => Ok(p.into()),
        Geometry::MultiPolygon(m) => Ok(m),
        _ => Err("unsupported geometry type: expected Polygon or MultiPolygon".into()),
    }
}
