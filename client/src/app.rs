use std::cell::RefCell;
use std::rc::{Rc, Weak};

use gloo_storage::Storage;
use leptos::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::spawn_local;

use pricemap_shared::chart::{ChartSeries, Curve, LineChart, LineChartOptions};
use pricemap_shared::format::ValueFormat;
use pricemap_shared::map::Layer;
use pricemap_shared::metric::{DEFAULT_METRIC_INDEX, assign_quantile_domains, housing_metrics};
use pricemap_shared::series::calc_trend;
use pricemap_shared::series_cache::SeriesCache;
use pricemap_shared::tiles::TileLayer;
use pricemap_shared::{Dispatcher, Event, EventKind, MapOptions, MapWidget, Meta, MetricDescriptor};

use crate::data::{self, PageData};
use crate::line_chart::LineChartView;
use crate::map_view::MapView;

const SETTINGS_KEY: &str = "pricemap_settings";
const AREA_NAME: &str = "NYC";
const BASEMAP_URL: &str =
    "https://cartodb-basemaps-{s}.global.ssl.fastly.net/light_nolabels/{z}/{x}/{y}.png";
const LABELS_URL: &str =
    "https://cartodb-basemaps-{s}.global.ssl.fastly.net/light_only_labels/{z}/{x}/{y}.png";
/// Street labels only appear once the basemap is this detailed.
const LABELS_MIN_ZOOM: u8 = 13;
const ATTRIBUTION: &str = r#"<span class="attLeft">Data source: <a href="http://www.streeteasy.com" target="blank">StreetEasy</a></span> &copy; <a href="http://www.openstreetmap.org/copyright" target="blank">OpenStreetMap</a>, &copy; <a href="https://carto.com/attribution" target="blank">CARTO</a>"#;

/// City-wide headline numbers: metric key, format name, label.
const SINGLE_FACTS: &[(&str, &str, &str)] = &[
    ("repeatSalePrice", "dollar", "Median resale price"),
    ("changeRepeatTrend", "percent", "Change from last year"),
    ("rent", "dollar", "Median asking rent"),
    ("daysOnMarket", "countLong", "Median days on market"),
];

/// Browser-only state handed to child components. The arena handle is
/// `Copy + Send` while the value inside stays on the main thread.
pub(crate) type Shared<T> = StoredValue<Rc<RefCell<T>>, LocalStorage>;

pub(crate) fn shared<T: 'static>(value: T) -> Shared<T> {
    StoredValue::new_local(Rc::new(RefCell::new(value)))
}

#[derive(Default, serde::Serialize, serde::Deserialize)]
#[serde(default)]
struct Settings {
    /// Key of the metric picked in the data-type dropdown.
    metric: Option<String>,
    selection: Vec<String>,
}

#[derive(Clone)]
enum LoadState {
    Loading,
    Ready(PageData),
    Failed(String),
}

/// Root application component: loads the datasets, then builds the page.
#[component]
pub fn App() -> impl IntoView {
    let state: RwSignal<LoadState> = RwSignal::new(LoadState::Loading);

    spawn_local(async move {
        match data::load_page_data().await {
            Ok(page) => state.set(LoadState::Ready(page)),
            Err(e) => {
                web_sys::console::warn_1(&format!("page data failed to load: {e}").into());
                state.set(LoadState::Failed(e));
            }
        }
    });

    view! {
        {move || match state.get() {
            LoadState::Loading => view! { <div class="loading">"Loading\u{2026}"</div> }.into_any(),
            LoadState::Failed(e) => {
                view! { <div class="load-error">{format!("Could not load the map data ({e}).")}</div> }
                    .into_any()
            }
            LoadState::Ready(page) => view! { <Page data=page /> }.into_any(),
        }}
    }
}

fn map_options() -> MapOptions {
    let mut labels = TileLayer::new(LABELS_URL);
    labels.min_zoom = Some(LABELS_MIN_ZOOM);
    labels.pointer_events = false;
    MapOptions {
        area_name: AREA_NAME.to_string(),
        layers: vec![
            Layer::Raster(TileLayer::new(BASEMAP_URL)),
            Layer::Vector,
            Layer::Raster(labels),
        ],
        attribution: ATTRIBUTION.to_string(),
        ..MapOptions::default()
    }
}

fn chart_options() -> [(LineChartOptions, &'static str); 3] {
    [
        (
            LineChartOptions {
                title: Some("Median sale price, resales".into()),
                data_key: "resale".into(),
                y_format: ValueFormat::DollarAxis,
                tooltip_y_format: ValueFormat::Dollar,
                ..LineChartOptions::default()
            },
            "median-sale-price",
        ),
        (
            LineChartOptions {
                title: Some("Sales count, all homes".into()),
                data_key: "count".into(),
                y_format: ValueFormat::Count,
                tooltip_y_format: ValueFormat::Homes,
                curve: Curve::Step,
                include_default_data: false,
                color_offset: 1,
                ..LineChartOptions::default()
            },
            "sales-volume",
        ),
        (
            LineChartOptions {
                title: Some("Price change, resale".into()),
                data_key: "changeResale".into(),
                y_format: ValueFormat::PercentAxis,
                tooltip_y_format: ValueFormat::Percent,
                ..LineChartOptions::default()
            },
            "price-change",
        ),
    ]
}

/// Load each newly selected area's history, then republish the selection
/// through the map so the charts pick it up.
fn subscribe_historical_data(
    dispatcher: &Dispatcher,
    cache: Rc<RefCell<SeriesCache>>,
    map: Weak<RefCell<MapWidget>>,
) {
    dispatcher.subscribe(EventKind::DataSelected, "historical-data", move |event| {
        let Event::DataSelected(features) = event else {
            return;
        };
        for feature in features.iter().filter(|f| f.has_metrics()) {
            let Some(ticket) = cache.borrow_mut().request(&feature.id) else {
                continue;
            };
            let cache = cache.clone();
            let map = map.clone();
            spawn_local(async move {
                let result = data::fetch_series(&ticket.id).await;
                let id = ticket.id.clone();
                let applied = cache.borrow_mut().complete(ticket, result);
                match applied {
                    Ok(true) => {
                        let Some(map) = map.upgrade() else {
                            return;
                        };
                        let ids = map.borrow().selected_ids().to_vec();
                        map.borrow_mut().set_selected(&ids);
                    }
                    Ok(false) => {}
                    Err(e) => {
                        web_sys::console::warn_1(&format!("history for {id} failed: {e}").into());
                    }
                }
            });
        }
    });
}

fn single_fact(meta: &Meta, key: &str, format: &str) -> String {
    match meta.area_value(AREA_NAME, key) {
        Some(v) => ValueFormat::from_name(format).map_or_else(|| v.to_string(), |f| f.apply(v)),
        None => "NA".to_string(),
    }
}

#[component]
fn Page(data: PageData) -> impl IntoView {
    let PageData {
        meta,
        features,
        mut city_rows,
    } = data;
    let saved: Settings = gloo_storage::LocalStorage::get(SETTINGS_KEY).unwrap_or_default();

    calc_trend(&mut city_rows);
    let mut metrics: Vec<MetricDescriptor> = housing_metrics();
    assign_quantile_domains(&mut metrics, &meta, features.iter().map(|f| f.id.as_str()));
    let start_index = saved
        .metric
        .as_deref()
        .and_then(|key| metrics.iter().position(|m| m.key == key))
        .unwrap_or(DEFAULT_METRIC_INDEX);

    let dispatcher = Dispatcher::new();
    let map = Rc::new(RefCell::new(MapWidget::create(
        map_options(),
        features,
        metrics[start_index].clone(),
        Some(dispatcher.clone()),
    )));
    let cache = Rc::new(RefCell::new(SeriesCache::new()));
    subscribe_historical_data(&dispatcher, cache.clone(), Rc::downgrade(&map));

    let defaults = vec![ChartSeries::new(
        format!("{AREA_NAME} median"),
        Some(Rc::new(city_rows)),
    )];
    let charts: Vec<(Shared<LineChart>, &'static str)> = chart_options()
        .into_iter()
        .map(|(options, id)| {
            let chart = LineChart::new(
                options,
                meta.dates.clone(),
                defaults.clone(),
                0.0,
                Some(dispatcher.clone()),
            );
            (shared(chart), id)
        })
        .collect();

    let metric_key: RwSignal<String> = RwSignal::new(metrics[start_index].key.clone());
    let selection: RwSignal<Vec<String>> = RwSignal::new(saved.selection.clone());
    let revision: RwSignal<u64> = RwSignal::new(0);

    dispatcher.subscribe(EventKind::DataSelected, "settings", move |event| {
        if let Event::DataSelected(features) = event {
            selection.set(features.iter().map(|f| f.id.clone()).collect());
        }
    });

    // Persist settings to localStorage on any change
    Effect::new(move || {
        let settings = Settings {
            metric: Some(metric_key.get()),
            selection: selection.get(),
        };
        let _ = gloo_storage::LocalStorage::set(SETTINGS_KEY, &settings);
    });

    // Swap the map's encoding when the dropdown changes.
    Effect::new({
        let map = map.clone();
        let metrics = metrics.clone();
        move || {
            let key = metric_key.get();
            let Some(metric) = metrics.iter().find(|m| m.key == key) else {
                return;
            };
            if map.borrow().metric().key == key {
                return;
            }
            map.borrow_mut().swap_metric(metric.clone());
            revision.update(|r| *r = r.wrapping_add(1));
        }
    });

    let options = metrics
        .iter()
        .map(|m| {
            let key = m.key.clone();
            let value = key.clone();
            view! {
                <option value=value selected=move || metric_key.get() == key>
                    {m.button.clone()}
                </option>
            }
        })
        .collect_view();

    let facts = SINGLE_FACTS
        .iter()
        .map(|&(key, format, label)| {
            view! {
                <div class="singleFact" data-key=key data-format=format>
                    <h4>{single_fact(&meta, key, format)}</h4>
                    <p>{label}</p>
                </div>
            }
        })
        .collect_view();

    let map_handle = StoredValue::new_local(map);
    let cache_handle = StoredValue::new_local(cache);
    let chart_views = charts
        .into_iter()
        .map(|(chart, id)| {
            view! {
                <div id=id class="chart">
                    <LineChartView chart=chart cache=cache_handle handler_id=id />
                </div>
            }
        })
        .collect_view();

    view! {
        <div class="price-map">
            <div class="facts">{facts}</div>
            <label class="data-type">
                "Show "
                <select
                    id="data-type"
                    on:change=move |e| {
                        let Some(target) = e.target() else {
                            return;
                        };
                        let Ok(target) = target.dyn_into::<web_sys::HtmlSelectElement>() else {
                            return;
                        };
                        metric_key.set(target.value());
                    }
                >
                    {options}
                </select>
            </label>
            <div id="map" style="position: relative; height: 520px;">
                <MapView map=map_handle revision=revision initial_selection=saved.selection />
            </div>
            <div class="charts">{chart_views}</div>
        </div>
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_layers_put_labels_above_areas() {
        let options = map_options();
        assert_eq!(options.area_name, "NYC");
        assert_eq!(options.layers.len(), 3);
        assert_eq!(options.layers[1], Layer::Vector);
        let Layer::Raster(labels) = &options.layers[2] else {
            panic!("labels should be a raster layer");
        };
        assert_eq!(labels.min_zoom, Some(LABELS_MIN_ZOOM));
        assert!(!labels.pointer_events);
    }

    #[test]
    fn sales_chart_skips_city_line() {
        let [_, (sales, id), _] = chart_options();
        assert_eq!(id, "sales-volume");
        assert!(!sales.include_default_data);
        assert_eq!(sales.curve, Curve::Step);
        assert_eq!(sales.color_offset, 1);
    }

    #[test]
    fn single_facts_use_city_values() {
        let meta = Meta::from_json(
            r#"{"dates":["2017-01"],"areaLastMonth":{"NYC":{"repeatSalePrice":650000,"rent":null}}}"#,
        )
        .expect("meta parses");
        assert_eq!(single_fact(&meta, "repeatSalePrice", "dollar"), "$650,000");
        assert_eq!(single_fact(&meta, "rent", "dollar"), "NA");
    }

    #[test]
    fn settings_tolerate_missing_fields() {
        let settings: Settings = serde_json::from_str("{}").expect("settings parse");
        assert!(settings.metric.is_none());
        assert!(settings.selection.is_empty());
    }
}
