use pricemap_shared::Rgb;
use pricemap_shared::scale::Fill;

/// Fill for each quantile class, lowest bucket first.
const BUCKET_COLORS: [(&str, Rgb); 4] = [
    ("q0-4", Rgb(0xd4, 0xe6, 0xf0)),
    ("q1-4", Rgb(0x92, 0xc0, 0xdb)),
    ("q2-4", Rgb(0x3e, 0x8b, 0xc1)),
    ("q3-4", Rgb(0x10, 0x4e, 0x8b)),
];

/// Line and outline colors: index 0 is the area median, the rest follow
/// selection order.
const AREA_COLORS: [Rgb; 5] = [
    Rgb(0x55, 0x55, 0x55),
    Rgb(0xe0, 0x6c, 0x3c),
    Rgb(0x6a, 0x3d, 0x9a),
    Rgb(0x2c, 0xa0, 0x6a),
    Rgb(0xd6, 0x2f, 0x7a),
];

const NO_DATA: Rgb = Rgb(0xee, 0xee, 0xee);

pub fn bucket_color(class: &str) -> Option<Rgb> {
    BUCKET_COLORS
        .iter()
        .find(|(name, _)| *name == class)
        .map(|&(_, color)| color)
}

/// CSS fill for a feature, or `None` when it should stay transparent.
pub fn fill_css(fill: &Fill, alpha: f64) -> Option<String> {
    match fill {
        Fill::NoData => None,
        Fill::Color(rgb) => Some(rgb.rgba_css(alpha)),
        Fill::Bucket { class, .. } => Some(bucket_color(class).unwrap_or(NO_DATA).rgba_css(alpha)),
    }
}

pub fn area_color(class_index: usize) -> Rgb {
    AREA_COLORS[class_index % AREA_COLORS.len()]
}

pub fn area_css(class_index: usize) -> String {
    area_color(class_index).to_hex()
}
