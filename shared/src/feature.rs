use geojson::GeoJson;
use serde_json::Value;
use topojson::TopoJson;
use tracing::warn;

use crate::geometry::{Shape, parse_geometry};
use crate::series::{Meta, MetricValues};

/// A selectable map region.
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    pub id: String,
    pub shape: Shape,
    /// Latest values per metric key. `None` when the dataset has no entry
    /// for this area.
    pub metrics: Option<MetricValues>,
}

impl Feature {
    pub fn new(id: impl Into<String>, shape: Shape, metrics: Option<MetricValues>) -> Self {
        Self {
            id: id.into(),
            shape,
            metrics,
        }
    }

    /// Value for `key`, `None` when missing or null.
    pub fn metric(&self, key: &str) -> Option<f64> {
        self.metrics.as_ref()?.get(key).copied().flatten()
    }

    pub fn has_metrics(&self) -> bool {
        self.metrics.is_some()
    }
}

fn feature_name(feature: &geojson::Feature) -> Option<&str> {
    feature
        .property("Neighbourhood")
        .or_else(|| feature.property("Neighborhood"))
        .and_then(Value::as_str)
}

/// Build features from a GeoJSON `FeatureCollection`, attaching each area's
/// last-month values from `meta`. Entries without a name are skipped.
pub fn features_from_geojson(geojson: GeoJson, meta: &Meta) -> Result<Vec<Feature>, String> {
    let GeoJson::FeatureCollection(collection) = geojson else {
        return Err("parse error: expected a FeatureCollection".to_string());
    };

    let mut features = Vec::with_capacity(collection.features.len());
    for item in collection.features {
        let Some(id) = feature_name(&item).map(str::to_string) else {
            warn!("skipping unnamed feature");
            continue;
        };
        let geometry = item
            .geometry
            .ok_or_else(|| format!("parse error: feature {id:?} has no geometry"))?;
        let shape = Shape::new(parse_geometry(geometry)?);
        let metrics = meta.area_last_month.get(&id).cloned();
        if metrics.is_none() {
            warn!(area = %id, "no metric values for area");
        }
        features.push(Feature::new(id, shape, metrics));
    }
    Ok(features)
}

/// Decode the named object of a TopoJSON topology and build its features.
pub fn features_from_topojson(text: &str, object: &str, meta: &Meta) -> Result<Vec<Feature>, String> {
    let topology = match text
        .parse::<TopoJson>()
        .map_err(|e| format!("parse error: {e}"))?
    {
        TopoJson::Topology(topology) => topology,
        _ => return Err("parse error: expected a Topology".to_string()),
    };
    if !topology.objects.iter().any(|named| named.name == object) {
        return Err(format!("parse error: topology has no object {object:?}"));
    }
    let collection = topojson::to_geojson(&topology, &object.to_string())
        .map_err(|e| format!("parse error: {e}"))?;
    features_from_geojson(GeoJson::FeatureCollection(collection), meta)
}

#[cfg(test)]
pub(crate) mod fixtures {
    use std::collections::HashMap;

    use geo::{MultiPolygon, polygon};

    use super::Feature;
    use crate::geometry::Shape;

    /// A square feature spanning `[lng0, lng0 + size] x [lat0, lat0 + size]`.
    pub fn square(id: &str, lng0: f64, lat0: f64, size: f64, metrics: &[(&str, Option<f64>)]) -> Feature {
        let poly = polygon![
            (x: lng0, y: lat0),
            (x: lng0 + size, y: lat0),
            (x: lng0 + size, y: lat0 + size),
            (x: lng0, y: lat0 + size),
            (x: lng0, y: lat0),
        ];
        let values: HashMap<String, Option<f64>> =
            metrics.iter().map(|(k, v)| (k.to_string(), *v)).collect();
        Feature::new(id, Shape::new(MultiPolygon(vec![poly])), Some(values))
    }
}
