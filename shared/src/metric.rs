//! The active "map by" metric: which value colors the map and how it reads.

use std::collections::HashSet;

use crate::feature::Feature;
use crate::format::ValueFormat;
use crate::scale::{ColorScale, Fill, QuantileScale};
use crate::series::Meta;

/// Pixels between the pointer and the tooltip anchor.
pub const TOOLTIP_OFFSET: f64 = 15.0;

#[derive(Debug, Clone, PartialEq)]
pub struct MetricDescriptor {
    pub key: String,
    pub secondary_key: Option<String>,
    pub color_scale: ColorScale,
    pub metric_format: ValueFormat,
    pub secondary_format: Option<ValueFormat>,
    /// Tooltip heading.
    pub title: String,
    /// Dropdown label.
    pub button: String,
}

impl MetricDescriptor {
    pub fn new(key: &str, format: ValueFormat, title: &str) -> Self {
        Self {
            key: key.to_string(),
            secondary_key: None,
            color_scale: ColorScale::Quantile(QuantileScale::default_classes()),
            metric_format: format,
            secondary_format: None,
            title: title.to_string(),
            button: title.to_string(),
        }
    }

    pub fn with_secondary(mut self, key: &str, format: ValueFormat) -> Self {
        self.secondary_key = Some(key.to_string());
        self.secondary_format = Some(format);
        self
    }

    pub fn with_button(mut self, button: &str) -> Self {
        self.button = button.to_string();
        self
    }

    pub fn with_scale(mut self, scale: ColorScale) -> Self {
        self.color_scale = scale;
        self
    }

    pub fn format_metric(&self, value: Option<f64>) -> String {
        self.metric_format.apply_or_na(value)
    }

    pub fn format_secondary(&self, value: Option<f64>) -> String {
        match (self.secondary_format, value.filter(|v| v.is_finite())) {
            (Some(format), Some(v)) => format.apply(v),
            _ => String::new(),
        }
    }

    pub fn fill_for(&self, feature: &Feature) -> Fill {
        self.color_scale.fill(feature.metric(&self.key))
    }

    /// Tooltip content for `feature` with the pointer at `(x, y)`.
    pub fn tooltip(&self, feature: &Feature, pointer: (f64, f64)) -> Tooltip {
        let metric = if feature.has_metrics() {
            self.format_metric(feature.metric(&self.key))
        } else {
            "NA".to_string()
        };
        let secondary = match (&self.secondary_key, feature.has_metrics()) {
            (Some(key), true) => self.format_secondary(feature.metric(key)),
            _ => String::new(),
        };
        Tooltip {
            metric,
            secondary,
            area: feature.id.clone(),
            title: self.title.clone(),
            class: self.fill_for(feature).class().map(str::to_string),
            left: pointer.0,
            top: pointer.1 - TOOLTIP_OFFSET,
        }
    }
}

/// Hover card shown over a feature.
#[derive(Debug, Clone, PartialEq)]
pub struct Tooltip {
    pub metric: String,
    pub secondary: String,
    pub area: String,
    pub title: String,
    /// Bucket class of the hovered feature, for styling.
    pub class: Option<String>,
    pub left: f64,
    pub top: f64,
}

/// Set every quantile descriptor's domain from the last-month values of the
/// areas that appear on the map. Nulls and areas without geometry are left out.
pub fn assign_quantile_domains<'a>(
    descriptors: &mut [MetricDescriptor],
    meta: &Meta,
    area_ids: impl IntoIterator<Item = &'a str>,
) {
    let on_map: HashSet<&str> = area_ids.into_iter().collect();
    for descriptor in descriptors {
        let ColorScale::Quantile(scale) = &mut descriptor.color_scale else {
            continue;
        };
        let values = meta
            .area_last_month
            .iter()
            .filter(|(area, _)| on_map.contains(area.as_str()))
            .filter_map(|(_, values)| values.get(&descriptor.key).copied().flatten());
        scale.set_domain(values);
    }
}

/// The housing-price metrics offered by the data-type dropdown.
pub fn housing_metrics() -> Vec<MetricDescriptor> {
    use ValueFormat::*;
    vec![
        MetricDescriptor::new("repeatSalePrice", Dollar, "Median resale price")
            .with_secondary("changeRepeatTrend", Percent),
        MetricDescriptor::new("trend", Dollar, "Median sale price, all homes")
            .with_secondary("changeTrend", Percent),
        MetricDescriptor::new(
            "changeRepeatTrend",
            Percent,
            "Change in price from last year for resales",
        )
        .with_button("Price change, resales (%)"),
        MetricDescriptor::new(
            "changeTrend",
            Percent,
            "Change in price from last year for all homes",
        )
        .with_button("Price change, all homes (%)"),
        MetricDescriptor::new("daysOnMarket", Days, "Median time on market")
            .with_button("Median days on market"),
        MetricDescriptor::new("count", Homes, "Sales count for all homes")
            .with_button("Sales count, all homes"),
        MetricDescriptor::new("repeatCount", Homes, "Sales count for resales")
            .with_button("Sales count, resales"),
        MetricDescriptor::new("rent", Dollar, "Median rent")
            .with_secondary("changeRentTrend", Percent)
            .with_button("Median asking rent"),
        MetricDescriptor::new("changeRentTrend", Percent, "Change in rent from last year")
            .with_button("Rent change (%)"),
        MetricDescriptor::new("rentCount", Homes, "Rental count"),
        MetricDescriptor::new("tippingPoint", TippingPoint, "Tipping point"),
        MetricDescriptor::new("ratio", Percent, "Listing discount"),
        MetricDescriptor::new(
            "priceCut",
            PercentShort,
            "Share of sales listings with price cuts",
        ),
        MetricDescriptor::new("rentalPriceCut", PercentShort, "Share of rentals discounted"),
    ]
}

/// Index of the dropdown's starting metric (median asking rent).
pub const DEFAULT_METRIC_INDEX: usize = 7;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature::fixtures::square;

    fn rent() -> MetricDescriptor {
        MetricDescriptor::new("rent", ValueFormat::Dollar, "Median rent")
            .with_secondary("changeRentTrend", ValueFormat::Percent)
    }

    #[test]
    fn tooltip_formats_primary_and_secondary() {
        let feature = square(
            "Astoria",
            0.0,
            0.0,
            1.0,
            &[("rent", Some(2500.0)), ("changeRentTrend", Some(0.031))],
        );
        let tip = rent().tooltip(&feature, (100.0, 50.0));
        assert_eq!(tip.metric, "$2,500");
        assert_eq!(tip.secondary, "+3.1%");
        assert_eq!(tip.area, "Astoria");
        assert_eq!(tip.title, "Median rent");
        assert_eq!((tip.left, tip.top), (100.0, 35.0));
    }

    #[test]
    fn tooltip_degrades_without_data() {
        let mut feature = square("Nowhere", 0.0, 0.0, 1.0, &[("rent", None)]);
        let tip = rent().tooltip(&feature, (0.0, 0.0));
        assert_eq!(tip.metric, "NA");
        assert_eq!(tip.secondary, "");
        assert_eq!(tip.class, None);

        feature.metrics = None;
        let tip = rent().tooltip(&feature, (0.0, 0.0));
        assert_eq!(tip.metric, "NA");
    }

    #[test]
    fn secondary_needs_key_and_format() {
        let feature = square("A", 0.0, 0.0, 1.0, &[("count", Some(3.0))]);
        let count = MetricDescriptor::new("count", ValueFormat::Homes, "Sales");
        assert_eq!(count.tooltip(&feature, (0.0, 0.0)).secondary, "");
        assert_eq!(count.tooltip(&feature, (0.0, 0.0)).metric, "3 homes");
    }

    #[test]
    fn quantile_domains_only_use_areas_on_the_map() {
        let meta = Meta::from_json(
            r#"{"dates":["2016-01"],"areaLastMonth":{
                "A":{"rent":1000},"B":{"rent":2000},"C":{"rent":null},"NYC":{"rent":99999}}}"#,
        )
        .expect("valid meta");
        let mut metrics = housing_metrics();
        assign_quantile_domains(&mut metrics, &meta, ["A", "B", "C"]);
        let rent = &metrics[DEFAULT_METRIC_INDEX];
        assert_eq!(rent.key, "rent");
        let ColorScale::Quantile(scale) = &rent.color_scale else {
            panic!("rent uses a quantile scale");
        };
        assert_eq!(scale.domain(), &[1000.0, 2000.0]);
    }

    #[test]
    fn dropdown_lists_fourteen_metrics() {
        let metrics = housing_metrics();
        assert_eq!(metrics.len(), 14);
        assert_eq!(metrics[DEFAULT_METRIC_INDEX].button, "Median asking rent");
        assert!(metrics.iter().all(|m| !m.color_scale.is_continuous()));
    }
}
