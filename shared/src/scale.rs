//! Value to color encodings for the choropleth.

use crate::colors::{Rgb, interpolate_hsl, interpolate_rgb};

/// Class names of the default four-bucket palette, highest bucket first.
pub const QUANTILE_CLASSES: [&str; 4] = ["q3-4", "q2-4", "q1-4", "q0-4"];

/// Encoding of one feature under the active scale.
#[derive(Debug, Clone, PartialEq)]
pub enum Fill {
    /// Missing or null value; drawn transparent.
    NoData,
    Color(Rgb),
    Bucket { index: usize, class: String },
}

impl Fill {
    pub fn class(&self) -> Option<&str> {
        match self {
            Fill::Bucket { class, .. } => Some(class),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Interpolation {
    #[default]
    Rgb,
    Hsl,
}

/// Gradient over a numeric domain.
#[derive(Debug, Clone, PartialEq)]
pub struct ContinuousScale {
    pub domain: (f64, f64),
    /// Evenly spaced color stops from the low end to the high end.
    pub stops: Vec<Rgb>,
    pub interpolation: Interpolation,
}

impl ContinuousScale {
    pub fn new(domain: (f64, f64), stops: Vec<Rgb>) -> Self {
        Self {
            domain,
            stops,
            interpolation: Interpolation::Rgb,
        }
    }

    pub fn with_interpolation(mut self, interpolation: Interpolation) -> Self {
        self.interpolation = interpolation;
        self
    }

    pub fn color(&self, value: f64) -> Rgb {
        let Some(&first) = self.stops.first() else {
            return Rgb(0, 0, 0);
        };
        if self.stops.len() == 1 {
            return first;
        }

        let (d0, d1) = self.domain;
        let span = d1 - d0;
        let t = if span.abs() < f64::EPSILON {
            0.0
        } else {
            ((value - d0) / span).clamp(0.0, 1.0)
        };

        let segments = (self.stops.len() - 1) as f64;
        let pos = t * segments;
        let i = (pos.floor() as usize).min(self.stops.len() - 2);
        let local = pos - i as f64;
        let (from, to) = (self.stops[i], self.stops[i + 1]);
        match self.interpolation {
            Interpolation::Rgb => interpolate_rgb(from, to, local),
            Interpolation::Hsl => interpolate_hsl(from, to, local),
        }
    }
}

/// Buckets values by the quantiles of a sample domain.
#[derive(Debug, Clone, PartialEq)]
pub struct QuantileScale {
    domain: Vec<f64>,
    range: Vec<String>,
    thresholds: Vec<f64>,
}

impl QuantileScale {
    pub fn new<S: Into<String>>(range: impl IntoIterator<Item = S>) -> Self {
        Self {
            domain: Vec::new(),
            range: range.into_iter().map(Into::into).collect(),
            thresholds: Vec::new(),
        }
    }

    /// Four buckets named by [`QUANTILE_CLASSES`].
    pub fn default_classes() -> Self {
        Self::new(QUANTILE_CLASSES)
    }

    pub fn with_domain(mut self, values: impl IntoIterator<Item = f64>) -> Self {
        self.set_domain(values);
        self
    }

    /// Replace the sample. Non-finite values are dropped.
    pub fn set_domain(&mut self, values: impl IntoIterator<Item = f64>) {
        let mut domain: Vec<f64> = values.into_iter().filter(|v| v.is_finite()).collect();
        domain.sort_by(f64::total_cmp);
        self.domain = domain;
        self.rescale();
    }

    fn rescale(&mut self) {
        let n = self.range.len();
        self.thresholds = if self.domain.is_empty() || n < 2 {
            Vec::new()
        } else {
            (1..n)
                .map(|i| quantile_sorted(&self.domain, i as f64 / n as f64))
                .collect()
        };
    }

    pub fn domain(&self) -> &[f64] {
        &self.domain
    }

    pub fn range(&self) -> &[String] {
        &self.range
    }

    /// Bucket boundaries; one fewer than the number of classes.
    pub fn quantiles(&self) -> &[f64] {
        &self.thresholds
    }

    pub fn bucket(&self, value: f64) -> Option<usize> {
        if self.domain.is_empty() || self.range.is_empty() || value.is_nan() {
            return None;
        }
        let index = self.thresholds.partition_point(|&t| t <= value);
        Some(index.min(self.range.len() - 1))
    }
}

/// R-7 quantile of an ascending slice.
pub fn quantile_sorted(values: &[f64], p: f64) -> f64 {
    let n = values.len();
    if n == 0 {
        return f64::NAN;
    }
    if p <= 0.0 || n < 2 {
        return values[0];
    }
    if p >= 1.0 {
        return values[n - 1];
    }
    let h = (n - 1) as f64 * p;
    let i = h.floor() as usize;
    let lo = values[i];
    let hi = values[i + 1];
    lo + (hi - lo) * (h - i as f64)
}

/// The active color scale, fixed when a metric descriptor is built.
#[derive(Debug, Clone, PartialEq)]
pub enum ColorScale {
    Continuous(ContinuousScale),
    Quantile(QuantileScale),
}

impl ColorScale {
    pub fn fill(&self, value: Option<f64>) -> Fill {
        let Some(value) = value.filter(|v| v.is_finite()) else {
            return Fill::NoData;
        };
        match self {
            ColorScale::Continuous(scale) => Fill::Color(scale.color(value)),
            ColorScale::Quantile(scale) => match scale.bucket(value) {
                Some(index) => Fill::Bucket {
                    index,
                    class: scale.range[index].clone(),
                },
                None => Fill::NoData,
            },
        }
    }

    pub fn is_continuous(&self) -> bool {
        matches!(self, ColorScale::Continuous(_))
    }
}
