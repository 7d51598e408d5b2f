//! The choropleth map component.
//!
//! [`MapWidget`] owns everything the map needs between input events: the
//! viewport, the selection, the active metric and the hover target. It has an
//! explicit lifecycle (`create`, `mount`, `teardown`) so no state outlives the
//! component.

use std::collections::HashMap;
use std::rc::Rc;

use geo::Coord;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::dispatch::{Dispatcher, Event};
use crate::feature::Feature;
use crate::geometry::{LngLat, projected_bounds};
use crate::legend::Legend;
use crate::metric::{MetricDescriptor, Tooltip};
use crate::scale::Fill;
use crate::selection::{DEFAULT_MAX_SELECTED, Selection};
use crate::tiles::{TileLayer, TileSet};
use crate::viewport::{Viewport, ViewportConfig, ViewportTransform};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Layer {
    Raster(TileLayer),
    /// The feature polygons.
    Vector,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MapOptions {
    pub zoom: i32,
    pub min_zoom: i32,
    pub max_zoom: i32,
    pub center: LngLat,
    /// Name of the whole area, shown as the first entry of the area list.
    pub area_name: String,
    /// Drawn bottom to top.
    pub layers: Vec<Layer>,
    pub attribution: String,
    pub max_selected: usize,
    /// Pixels the view may pan past the features' extent.
    pub margin: f64,
}

impl Default for MapOptions {
    fn default() -> Self {
        Self {
            zoom: 19,
            min_zoom: 18,
            max_zoom: 25,
            center: LngLat::new(-73.96270751953126, 40.72228267283148),
            area_name: "NYC".to_string(),
            layers: vec![Layer::Vector],
            attribution: String::new(),
            max_selected: DEFAULT_MAX_SELECTED,
            margin: 0.0,
        }
    }
}

impl MapOptions {
    fn viewport_config(&self) -> ViewportConfig {
        ViewportConfig {
            min_zoom: self.min_zoom,
            max_zoom: self.max_zoom,
            margin: self.margin,
        }
    }
}

/// One entry of the area list under the map.
#[derive(Debug, Clone, PartialEq)]
pub struct AreaLabel {
    /// Area color class; 0 is the whole-area median.
    pub class_index: usize,
    pub label: String,
}

pub struct MapWidget {
    options: MapOptions,
    features: Vec<Rc<Feature>>,
    by_id: HashMap<String, usize>,
    viewport: Viewport,
    selection: Selection,
    metric: MetricDescriptor,
    hovered: Option<String>,
    dispatcher: Option<Dispatcher>,
    mounted: bool,
}

impl MapWidget {
    pub fn create(
        options: MapOptions,
        features: Vec<Feature>,
        metric: MetricDescriptor,
        dispatcher: Option<Dispatcher>,
    ) -> Self {
        let features: Vec<Rc<Feature>> = features.into_iter().map(Rc::new).collect();
        let by_id = features
            .iter()
            .enumerate()
            .map(|(i, f)| (f.id.clone(), i))
            .collect();
        Self {
            viewport: Viewport::new(options.viewport_config(), 0.0, 0.0),
            selection: Selection::new(options.max_selected),
            options,
            features,
            by_id,
            metric,
            hovered: None,
            dispatcher,
            mounted: false,
        }
    }

    /// Size the map, fit the content bounds and centre the initial view.
    pub fn mount(&mut self, width: f64, height: f64) {
        if self.dispatcher.is_none() {
            warn!("map mounted without a dispatcher; selections will not reach the line charts");
        }
        let bounds = projected_bounds(self.features.iter().map(|f| &f.shape));
        let mut viewport = Viewport::new(self.options.viewport_config(), width, height);
        viewport.initialize(self.options.center, self.options.zoom, bounds);
        self.viewport = viewport;
        self.mounted = true;
        self.publish_selection();
    }

    /// Release the dispatcher and forget all interaction state.
    pub fn teardown(&mut self) {
        self.selection.clear();
        self.hovered = None;
        self.dispatcher = None;
        self.mounted = false;
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted
    }

    pub fn options(&self) -> &MapOptions {
        &self.options
    }

    pub fn features(&self) -> &[Rc<Feature>] {
        &self.features
    }

    pub fn feature(&self, id: &str) -> Option<&Rc<Feature>> {
        self.by_id.get(id).map(|&i| &self.features[i])
    }

    // Viewport

    pub fn transform(&self) -> ViewportTransform {
        self.viewport.transform()
    }

    pub fn size(&self) -> (f64, f64) {
        self.viewport.size()
    }

    pub fn apply_gesture(&mut self, candidate: ViewportTransform) -> ViewportTransform {
        self.viewport.apply_gesture(candidate)
    }

    pub fn pan_by(&mut self, dx: f64, dy: f64) -> ViewportTransform {
        self.viewport.pan_by(dx, dy)
    }

    pub fn zoom_by(&mut self, steps: i32) -> ViewportTransform {
        self.viewport.zoom_by(steps)
    }

    pub fn resize(&mut self, width: f64, height: f64) -> ViewportTransform {
        self.viewport.resize(width, height)
    }

    pub fn visible_tiles(&self) -> TileSet {
        self.viewport.compute_visible_tiles()
    }

    pub fn project(&self, p: LngLat) -> Coord<f64> {
        self.viewport.project(p)
    }

    /// Screen-space rings of a feature, exteriors and holes alike.
    pub fn screen_rings(&self, feature: &Feature) -> Vec<Vec<Coord<f64>>> {
        let t = self.viewport.transform();
        feature
            .shape
            .projected
            .0
            .iter()
            .flat_map(|poly| std::iter::once(poly.exterior()).chain(poly.interiors()))
            .map(|ring| ring.0.iter().map(|&c| t.apply(c)).collect())
            .collect()
    }

    /// Topmost feature under the screen point.
    pub fn feature_at(&self, x: f64, y: f64) -> Option<Rc<Feature>> {
        let world = self.viewport.to_world(Coord { x, y });
        self.draw_order()
            .into_iter()
            .rev()
            .find(|f| f.shape.contains(world))
    }

    // Selection

    pub fn selected_ids(&self) -> &[String] {
        self.selection.ids()
    }

    pub fn selected(&self) -> Vec<Rc<Feature>> {
        self.selection
            .ids()
            .iter()
            .filter_map(|id| self.feature(id).cloned())
            .collect()
    }

    pub fn is_selected(&self, id: &str) -> bool {
        self.selection.contains(id)
    }

    /// Color class of a selected area: its selection position plus one.
    pub fn area_class(&self, id: &str) -> Option<usize> {
        self.selection.position(id).map(|i| i + 1)
    }

    pub fn toggle(&mut self, id: &str) -> Vec<Rc<Feature>> {
        if !self.by_id.contains_key(id) {
            debug!(area = id, "ignoring toggle of unknown area");
            return self.selected();
        }
        self.selection.toggle(id);
        self.publish_selection()
    }

    pub fn set_selected<S: AsRef<str>>(&mut self, ids: &[S]) -> Vec<Rc<Feature>> {
        let by_id = &self.by_id;
        self.selection.set_selected(ids, |id| by_id.contains_key(id));
        self.publish_selection()
    }

    pub fn clear_selected(&mut self) -> Vec<Rc<Feature>> {
        self.selection.clear();
        self.publish_selection()
    }

    fn publish_selection(&self) -> Vec<Rc<Feature>> {
        let selected = self.selected();
        if let Some(d) = &self.dispatcher {
            d.publish(Event::DataSelected(selected.clone()));
        }
        selected
    }

    /// `"<area> median"` followed by the selected ids.
    pub fn area_list(&self) -> Vec<AreaLabel> {
        std::iter::once(format!("{} median", self.options.area_name))
            .chain(self.selection.ids().iter().cloned())
            .enumerate()
            .map(|(class_index, label)| AreaLabel { class_index, label })
            .collect()
    }

    // Metric and encoding

    pub fn metric(&self) -> &MetricDescriptor {
        &self.metric
    }

    /// Replace the active metric. Every fill and the legend change with it.
    pub fn swap_metric(&mut self, metric: MetricDescriptor) {
        self.metric = metric;
    }

    pub fn fill_for(&self, feature: &Feature) -> Fill {
        self.metric.fill_for(feature)
    }

    pub fn legend(&self) -> Legend {
        Legend::for_metric(&self.metric)
    }

    pub fn tooltip(&self, id: &str, pointer: (f64, f64)) -> Option<Tooltip> {
        Some(self.metric.tooltip(self.feature(id)?, pointer))
    }

    // Hover and paint order

    pub fn hovered(&self) -> Option<&str> {
        self.hovered.as_deref()
    }

    pub fn hover(&mut self, id: Option<&str>) {
        self.hovered = id
            .filter(|id| self.by_id.contains_key(*id))
            .map(str::to_string);
    }

    /// Unselected features, then the selection in selection order, then the
    /// hovered feature on top of everything.
    pub fn draw_order(&self) -> Vec<Rc<Feature>> {
        let hovered = self.hovered.as_deref();
        let mut order: Vec<Rc<Feature>> = self
            .features
            .iter()
            .filter(|f| !self.is_selected(&f.id) && Some(f.id.as_str()) != hovered)
            .cloned()
            .collect();
        order.extend(
            self.selected()
                .into_iter()
                .filter(|f| Some(f.id.as_str()) != hovered),
        );
        if let Some(f) = hovered.and_then(|h| self.feature(h)) {
            order.push(Rc::clone(f));
        }
        order
    }
}
