use pricemap_shared::feature::features_from_topojson;
use pricemap_shared::format::slugify;
use pricemap_shared::series::parse_series_csv;
use pricemap_shared::{Feature, Meta, SeriesRow};

/// Root under which the server exposes the datasets.
pub const DATA_ROOT: &str = "/data";
/// Series drawn as the city-wide default line.
pub const CITY_SERIES: &str = "nyc";
/// Topology object holding the neighbourhood borders.
const BORDERS_OBJECT: &str = "neighborhoods";

/// Everything the page needs before the map can be created.
#[derive(Clone)]
pub struct PageData {
    pub meta: Meta,
    pub features: Vec<Feature>,
    pub city_rows: Vec<SeriesRow>,
}

async fn fetch_text(url: &str) -> Result<String, String> {
    let resp = gloo_net::http::Request::get(url)
        .send()
        .await
        .map_err(|e| format!("fetch error: {e}"))?;

    if !resp.ok() {
        return Err(format!("HTTP {}", resp.status()));
    }

    resp.text().await.map_err(|e| format!("parse error: {e}"))
}

/// Fetch the borders, metadata and city series.
pub async fn load_page_data() -> Result<PageData, String> {
    let topology = fetch_text(&format!("{DATA_ROOT}/geo/merged_borders-topo.json")).await?;
    let meta = Meta::from_json(&fetch_text(&format!("{DATA_ROOT}/meta.json")).await?)?;
    let city_rows = parse_series_csv(&fetch_text(&series_url(CITY_SERIES)).await?)?;
    let features = features_from_topojson(&topology, BORDERS_OBJECT, &meta)?;
    Ok(PageData {
        meta,
        features,
        city_rows,
    })
}

/// Fetch one area's monthly history. Trends are computed by the cache.
pub async fn fetch_series(area_id: &str) -> Result<Vec<SeriesRow>, String> {
    let text = fetch_text(&series_url(&slugify(area_id))).await?;
    parse_series_csv(&text)
}

fn series_url(slug: &str) -> String {
    format!("{DATA_ROOT}/neighborhoods/{slug}.csv")
}
