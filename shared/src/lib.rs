pub mod chart;
pub mod colors;
pub mod dispatch;
pub mod feature;
pub mod format;
pub mod geometry;
pub mod legend;
pub mod map;
pub mod metric;
pub mod scale;
pub mod selection;
pub mod series;
pub mod series_cache;
pub mod tiles;
pub mod viewport;

pub use colors::Rgb;
pub use dispatch::{Dispatcher, Event, EventKind};
pub use feature::Feature;
pub use geometry::LngLat;
pub use map::{MapOptions, MapWidget};
pub use metric::MetricDescriptor;
pub use scale::{ColorScale, Fill};
pub use series::{Meta, SeriesRow};
