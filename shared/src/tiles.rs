use serde::{Deserialize, Serialize};

pub const TILE_SIZE: f64 = 256.0;
const SUBDOMAINS: [&str; 3] = ["a", "b", "c"];

/// One raster tile request: column/row/zoom plus its offset inside the tile layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Tile {
    pub x: u32,
    pub y: u32,
    pub z: u8,
    pub tx: i64,
    pub ty: i64,
}

/// Screen-space square covered by a tile.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TileRect {
    pub x: f64,
    pub y: f64,
    pub size: f64,
}

/// Tiles intersecting the viewport, in row-major order, plus the layer transform.
#[derive(Debug, Clone, PartialEq)]
pub struct TileSet {
    pub tiles: Vec<Tile>,
    /// Layer origin in tile units.
    pub translate: (f64, f64),
    /// On-screen size of one tile in pixels.
    pub scale: f64,
}

impl TileSet {
    /// Where a tile lands on screen. The layer origin is snapped to whole
    /// pixels when the tile scale is integral, matching the layer transform.
    pub fn screen_rect(&self, tile: &Tile) -> TileRect {
        let snap = |v: f64| {
            if self.scale.fract() != 0.0 {
                v
            } else {
                v.round()
            }
        };
        let k = self.scale / TILE_SIZE;
        TileRect {
            x: snap(self.translate.0 * self.scale) + tile.tx as f64 * k,
            y: snap(self.translate.1 * self.scale) + tile.ty as f64 * k,
            size: self.scale,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }
}

/// Compute the tile grid for a world of `scale` pixels centred at `translate`
/// inside a `width` x `height` viewport.
pub fn compute_tiles(width: f64, height: f64, scale: f64, translate: (f64, f64)) -> TileSet {
    let z_exact = (scale.log2() - 8.0).max(0.0);
    let z = z_exact.round();
    let j = 2f64.powf(z);
    let k = 2f64.powf(z_exact - z + 8.0);
    let ox = translate.0 - scale / 2.0;
    let oy = translate.1 - scale / 2.0;

    let col_start = ((0.0 - ox) / k).floor().max(0.0);
    let col_end = ((width - ox) / k).ceil().min(j);
    let row_start = ((0.0 - oy) / k).floor().max(0.0);
    let row_end = ((height - oy) / k).ceil().min(j);

    let mut tiles = Vec::new();
    if col_start.is_finite() && row_start.is_finite() {
        let (c0, c1) = (col_start as i64, col_end as i64);
        let (r0, r1) = (row_start as i64, row_end as i64);
        let wrap = j as i64;
        for row in r0..r1 {
            for col in c0..c1 {
                tiles.push(Tile {
                    x: col.rem_euclid(wrap) as u32,
                    y: row.rem_euclid(wrap) as u32,
                    z: z as u8,
                    tx: col * TILE_SIZE as i64,
                    ty: row * TILE_SIZE as i64,
                });
            }
        }
    }

    TileSet {
        tiles,
        translate: (ox / k, oy / k),
        scale: k,
    }
}

/// A raster basemap layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TileLayer {
    /// Template with `{z}`, `{x}`, `{y}` and `{s}` placeholders.
    pub url: String,
    /// Tiles below this zoom are hidden for the layer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_zoom: Option<u8>,
    /// Whether the layer intercepts pointer events.
    #[serde(default = "default_true")]
    pub pointer_events: bool,
}

fn default_true() -> bool {
    true
}

impl TileLayer {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            min_zoom: None,
            pointer_events: true,
        }
    }

    pub fn shows(&self, tile: &Tile) -> bool {
        self.min_zoom.is_none_or(|min| tile.z >= min)
    }

    pub fn tile_url(&self, tile: &Tile) -> String {
        tile_url(&self.url, tile)
    }
}

/// Resolve a tile URL template. The `{s}` subdomain is derived from a hash of
/// the tile address so a tile always maps to the same host.
pub fn tile_url(template: &str, tile: &Tile) -> String {
    let key = format!("{}/{}/{}", tile.z, tile.x, tile.y);
    let subdomain = SUBDOMAINS[crc32fast::hash(key.as_bytes()) as usize % SUBDOMAINS.len()];
    template
        .replace("{z}", &tile.z.to_string())
        .replace("{x}", &tile.x.to_string())
        .replace("{y}", &tile.y.to_string())
        .replace("{s}", subdomain)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn world_at_zoom_zero_is_one_tile() {
        let set = compute_tiles(256.0, 256.0, 256.0, (128.0, 128.0));
        assert_eq!(set.tiles.len(), 1);
        let tile = set.tiles[0];
        assert_eq!((tile.x, tile.y, tile.z), (0, 0, 0));
        assert_eq!(set.scale, 256.0);
        assert_eq!(set.screen_rect(&tile), TileRect { x: 0.0, y: 0.0, size: 256.0 });
    }

    #[test]
    fn zoom_one_covers_four_tiles_in_row_major_order() {
        let set = compute_tiles(512.0, 512.0, 512.0, (256.0, 256.0));
        let addresses: Vec<_> = set.tiles.iter().map(|t| (t.x, t.y, t.z)).collect();
        assert_eq!(addresses, vec![(0, 0, 1), (1, 0, 1), (0, 1, 1), (1, 1, 1)]);
    }

    #[test]
    fn only_intersecting_tiles_are_returned() {
        // World is 2^19 px wide; a 500x400 viewport sees a handful of z11 tiles.
        let scale = 2f64.powi(19);
        let set = compute_tiles(500.0, 400.0, scale, (-10_000.0, 20_000.0));
        assert!(!set.is_empty());
        assert!(set.tiles.iter().all(|t| t.z == 11));
        for tile in &set.tiles {
            let rect = set.screen_rect(tile);
            assert!(rect.x < 500.0 && rect.x + rect.size > 0.0);
            assert!(rect.y < 400.0 && rect.y + rect.size > 0.0);
        }
        // 500/256 and 400/256 round up to at most 3x3 tiles.
        assert!(set.tiles.len() <= 9);
    }

    #[test]
    fn fractional_zoom_scales_tiles() {
        let scale = 2f64.powf(19.3);
        let set = compute_tiles(800.0, 600.0, scale, (0.0, 0.0));
        assert!(set.scale > 256.0 && set.scale < 512.0);
        assert!(set.tiles.iter().all(|t| t.z == 11));
    }

    #[test]
    fn viewport_outside_world_yields_no_tiles() {
        let set = compute_tiles(256.0, 256.0, 256.0, (1000.0, 1000.0));
        assert!(set.is_empty());
    }

    #[test]
    fn url_template_is_resolved_deterministically() {
        let tile = Tile { x: 602, y: 769, z: 11, tx: 0, ty: 0 };
        let url = tile_url("https://tiles-{s}.example.com/{z}/{x}/{y}.png", &tile);
        assert!(url.ends_with("/11/602/769.png"));
        let host = url
            .strip_prefix("https://tiles-")
            .and_then(|rest| rest.chars().next())
            .expect("subdomain present");
        assert!(matches!(host, 'a' | 'b' | 'c'));
        assert_eq!(url, tile_url("https://tiles-{s}.example.com/{z}/{x}/{y}.png", &tile));
    }

    #[test]
    fn layer_min_zoom_hides_low_zoom_tiles() {
        let mut labels = TileLayer::new("https://example.com/{z}/{x}/{y}.png");
        let low = Tile { x: 0, y: 0, z: 11, tx: 0, ty: 0 };
        let high = Tile { x: 0, y: 0, z: 13, tx: 0, ty: 0 };
        assert!(labels.shows(&low));
        labels.min_zoom = Some(13);
        assert!(!labels.shows(&low));
        assert!(labels.shows(&high));
    }
}
