use crate::colors::Rgb;
use crate::metric::MetricDescriptor;
use crate::scale::ColorScale;

/// Width in pixels of the sampled gradient strip.
pub const GRADIENT_WIDTH: usize = 50;
/// Alpha of gradient pixels; matches the fill opacity of the map.
pub const GRADIENT_ALPHA: u8 = 178;

#[derive(Debug, Clone, PartialEq)]
pub struct Swatch {
    pub class: String,
    pub label: Option<String>,
}

/// Legend content for the active metric.
#[derive(Debug, Clone, PartialEq)]
pub enum Legend {
    /// A one-pixel-high RGBA strip plus the two domain endpoint labels.
    Gradient {
        pixels: Vec<[u8; 4]>,
        labels: [String; 2],
    },
    /// One swatch per bucket. `labels` holds the extent labels when the
    /// sample is too small for quantile boundaries.
    Buckets {
        swatches: Vec<Swatch>,
        labels: Vec<String>,
    },
}

impl Legend {
    pub fn for_metric(metric: &MetricDescriptor) -> Self {
        match &metric.color_scale {
            ColorScale::Continuous(scale) => {
                let (d0, d1) = scale.domain;
                let step = (d1 - d0) / GRADIENT_WIDTH as f64;
                let pixels = (0..GRADIENT_WIDTH)
                    .map(|i| {
                        let Rgb(r, g, b) = scale.color(d0 + step * i as f64);
                        [r, g, b, GRADIENT_ALPHA]
                    })
                    .collect();
                Legend::Gradient {
                    pixels,
                    labels: [metric.metric_format.apply(d0), metric.metric_format.apply(d1)],
                }
            }
            ColorScale::Quantile(scale) => {
                let domain = scale.domain();
                let quantiles = scale.quantiles();
                // Quantile labels only when the sample has more than two values.
                if domain.len() > 2 && !quantiles.is_empty() {
                    let mut labels: Vec<String> = quantiles
                        .iter()
                        .map(|&q| format!("< {}", metric.metric_format.apply(q)))
                        .collect();
                    if let Some(&last) = quantiles.last() {
                        labels.push(format!("≥ {}", metric.metric_format.apply(last)));
                    }
                    let swatches = scale
                        .range()
                        .iter()
                        .enumerate()
                        .map(|(i, class)| Swatch {
                            class: class.clone(),
                            label: labels.get(i).cloned(),
                        })
                        .collect();
                    Legend::Buckets {
                        swatches,
                        labels: Vec::new(),
                    }
                } else {
                    let labels = match (domain.first(), domain.last()) {
                        (Some(&lo), Some(&hi)) => vec![
                            metric.metric_format.apply(lo),
                            metric.metric_format.apply(hi),
                        ],
                        _ => Vec::new(),
                    };
                    let swatches = scale
                        .range()
                        .iter()
                        .map(|class| Swatch {
                            class: class.clone(),
                            label: None,
                        })
                        .collect();
                    Legend::Buckets { swatches, labels }
                }
            }
        }
    }

    pub fn is_quantile(&self) -> bool {
        matches!(self, Legend::Buckets { labels, .. } if labels.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::ValueFormat;
    use crate::scale::{ContinuousScale, QuantileScale};

    #[test]
    fn quantile_legend_labels_each_bucket() {
        let metric = MetricDescriptor::new("rent", ValueFormat::Dollar, "Median rent").with_scale(
            ColorScale::Quantile(
                QuantileScale::default_classes().with_domain([1.0, 2.0, 3.0, 4.0, 5.0]),
            ),
        );
        let Legend::Buckets { swatches, labels } = Legend::for_metric(&metric) else {
            panic!("expected buckets");
        };
        assert!(labels.is_empty());
        let text: Vec<_> = swatches.iter().map(|s| s.label.as_deref()).collect();
        assert_eq!(
            text,
            vec![Some("< $2"), Some("< $3"), Some("< $4"), Some("≥ $4")]
        );
        assert_eq!(swatches[0].class, "q3-4");
    }

    #[test]
    fn tiny_sample_falls_back_to_extent_labels() {
        let metric = MetricDescriptor::new("rent", ValueFormat::Dollar, "Median rent").with_scale(
            ColorScale::Quantile(QuantileScale::default_classes().with_domain([10.0, 20.0])),
        );
        let legend = Legend::for_metric(&metric);
        assert!(!legend.is_quantile());
        let Legend::Buckets { labels, .. } = legend else {
            panic!("expected buckets");
        };
        assert_eq!(labels, vec!["$10", "$20"]);
    }

    #[test]
    fn gradient_legend_samples_fifty_pixels() {
        let metric = MetricDescriptor::new("ratio", ValueFormat::PercentShort, "Discount")
            .with_scale(ColorScale::Continuous(ContinuousScale::new(
                (0.0, 0.5),
                vec![Rgb(255, 255, 255), Rgb(0, 0, 0)],
            )));
        let Legend::Gradient { pixels, labels } = Legend::for_metric(&metric) else {
            panic!("expected gradient");
        };
        assert_eq!(pixels.len(), GRADIENT_WIDTH);
        assert_eq!(pixels[0], [255, 255, 255, GRADIENT_ALPHA]);
        assert!(pixels[49][0] < 10);
        assert_eq!(labels, ["0.0%".to_string(), "50.0%".to_string()]);
    }
}
