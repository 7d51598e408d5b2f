use serde::{Deserialize, Serialize};

/// An opaque 8-bit RGB color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    /// Parse `#rrggbb` (leading `#` optional).
    pub fn from_hex(hex: &str) -> Option<Self> {
        let hex = hex.strip_prefix('#').unwrap_or(hex);
        if hex.len() != 6 {
            return None;
        }
        let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
        let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
        let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
        Some(Self(r, g, b))
    }

    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.0, self.1, self.2)
    }

    /// Format as a CSS `rgba()` string.
    pub fn rgba_css(self, alpha: f64) -> String {
        format!("rgba({},{},{},{alpha})", self.0, self.1, self.2)
    }
}

fn lerp_u8(a: u8, b: u8, t: f64) -> u8 {
    let t = t.clamp(0.0, 1.0);
    let value = a as f64 + (b as f64 - a as f64) * t;
    value.round().clamp(0.0, 255.0) as u8
}

/// Component-wise RGB interpolation.
pub fn interpolate_rgb(from: Rgb, to: Rgb, t: f64) -> Rgb {
    Rgb(
        lerp_u8(from.0, to.0, t),
        lerp_u8(from.1, to.1, t),
        lerp_u8(from.2, to.2, t),
    )
}

/// Convert RGB to HSL. Returns (h: 0..360, s: 0..1, l: 0..1).
pub fn rgb_to_hsl(color: Rgb) -> (f64, f64, f64) {
    let r = color.0 as f64 / 255.0;
    let g = color.1 as f64 / 255.0;
    let b = color.2 as f64 / 255.0;

    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let l = (max + min) / 2.0;

    if (max - min).abs() < f64::EPSILON {
        return (0.0, 0.0, l);
    }

    let d = max - min;
    let s = if l > 0.5 {
        d / (2.0 - max - min)
    } else {
        d / (max + min)
    };

    let h = if (max - r).abs() < f64::EPSILON {
        let mut h = (g - b) / d;
        if g < b {
            h += 6.0;
        }
        h
    } else if (max - g).abs() < f64::EPSILON {
        (b - r) / d + 2.0
    } else {
        (r - g) / d + 4.0
    };

    (h * 60.0, s, l)
}

/// Convert HSL back to RGB.
pub fn hsl_to_rgb(h: f64, s: f64, l: f64) -> Rgb {
    if s.abs() < f64::EPSILON {
        let v = (l * 255.0).round() as u8;
        return Rgb(v, v, v);
    }

    let q = if l < 0.5 {
        l * (1.0 + s)
    } else {
        l + s - l * s
    };
    let p = 2.0 * l - q;
    let h = h / 360.0;

    let r = hue_to_rgb(p, q, h + 1.0 / 3.0);
    let g = hue_to_rgb(p, q, h);
    let b = hue_to_rgb(p, q, h - 1.0 / 3.0);

    Rgb(
        (r * 255.0).round() as u8,
        (g * 255.0).round() as u8,
        (b * 255.0).round() as u8,
    )
}

fn hue_to_rgb(p: f64, q: f64, mut t: f64) -> f64 {
    if t < 0.0 {
        t += 1.0;
    }
    if t > 1.0 {
        t -= 1.0;
    }
    if t < 1.0 / 6.0 {
        p + (q - p) * 6.0 * t
    } else if t < 1.0 / 2.0 {
        q
    } else if t < 2.0 / 3.0 {
        p + (q - p) * (2.0 / 3.0 - t) * 6.0
    } else {
        p
    }
}

/// Interpolate between two colors in HSL space using the shortest hue path.
pub fn interpolate_hsl(from: Rgb, to: Rgb, t: f64) -> Rgb {
    let from = rgb_to_hsl(from);
    let to = rgb_to_hsl(to);
    let t = t.clamp(0.0, 1.0);

    let mut dh = to.0 - from.0;
    if dh > 180.0 {
        dh -= 360.0;
    } else if dh < -180.0 {
        dh += 360.0;
    }

    let h = (from.0 + dh * t).rem_euclid(360.0);
    let s = from.1 + (to.1 - from.1) * t;
    let l = from.2 + (to.2 - from.2) * t;

    hsl_to_rgb(h, s, l)
}

#[cfg(test)]
mod tests {
    use super::{Rgb, hsl_to_rgb, interpolate_hsl, interpolate_rgb, rgb_to_hsl};

    fn assert_close(actual: f64, expected: f64) {
        let diff = (actual - expected).abs();
        assert!(
            diff < 1e-9,
            "expected {expected}, got {actual} (diff: {diff})"
        );
    }

    #[test]
    fn hex_parses_with_and_without_hash() {
        assert_eq!(Rgb::from_hex("#ff8000"), Some(Rgb(255, 128, 0)));
        assert_eq!(Rgb::from_hex("0a0b0c"), Some(Rgb(10, 11, 12)));
        assert_eq!(Rgb::from_hex("#fff"), None);
        assert_eq!(Rgb(255, 128, 0).to_hex(), "#ff8000");
    }

    #[test]
    fn hsl_conversion_preserves_primaries_and_grays() {
        for color in [Rgb(255, 0, 0), Rgb(0, 255, 0), Rgb(37, 91, 201), Rgb(128, 128, 128)] {
            let (h, s, l) = rgb_to_hsl(color);
            assert_eq!(hsl_to_rgb(h, s, l), color);
        }

        let (_, s, l) = rgb_to_hsl(Rgb(128, 128, 128));
        assert_close(s, 0.0);
        assert_close(l, 128.0 / 255.0);
    }

    #[test]
    fn rgb_interpolation_hits_endpoints_and_midpoint() {
        let from = Rgb(0, 100, 200);
        let to = Rgb(200, 100, 0);
        assert_eq!(interpolate_rgb(from, to, 0.0), from);
        assert_eq!(interpolate_rgb(from, to, 1.0), to);
        assert_eq!(interpolate_rgb(from, to, 0.5), Rgb(100, 100, 100));
        assert_eq!(interpolate_rgb(from, to, 7.0), to);
    }

    #[test]
    fn hsl_interpolation_wraps_through_red() {
        // 350deg -> 10deg passes through 0deg rather than through cyan.
        let from = hsl_to_rgb(350.0, 1.0, 0.5);
        let to = hsl_to_rgb(10.0, 1.0, 0.5);
        let mid = interpolate_hsl(from, to, 0.5);
        let (h, _, _) = rgb_to_hsl(mid);
        assert!(!(90.0..270.0).contains(&h), "hue went the long way: {h}");
    }
}
