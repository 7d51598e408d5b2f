use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::rc::Rc;

use leptos::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{CanvasRenderingContext2d, CanvasWindingRule, HtmlCanvasElement, MouseEvent, PointerEvent};

use pricemap_shared::MapWidget;
use pricemap_shared::legend::Legend;
use pricemap_shared::map::{AreaLabel, Layer};
use pricemap_shared::metric::Tooltip;
use pricemap_shared::tiles::TileLayer;

use crate::app::Shared;
use crate::colors::{area_color, area_css, bucket_color, fill_css};
use crate::render_loop::FrameScheduler;
use crate::resize;
use crate::tiles::TileImages;

const FILL_ALPHA: f64 = 0.7;
/// Pointer travel below this many pixels still counts as a click.
const CLICK_SLOP: f64 = 5.0;

const RESIZE_KEY: &str = "map";

fn container_size(canvas: &HtmlCanvasElement) -> Option<(f64, f64)> {
    let parent = canvas.parent_element()?;
    let (w, h) = (parent.client_width() as f64, parent.client_height() as f64);
    (w > 0.0 && h > 0.0).then_some((w, h))
}

fn device_pixel_ratio() -> f64 {
    web_sys::window()
        .map(|w| w.device_pixel_ratio())
        .filter(|r| *r > 0.0)
        .unwrap_or(1.0)
}

/// Interactive map: basemap tiles, area fills, selection outlines and the
/// controls around them.
///
/// `revision` is bumped by the page whenever the active metric changes.
#[component]
pub fn MapView(
    map: Shared<MapWidget>,
    revision: RwSignal<u64>,
    initial_selection: Vec<String>,
) -> impl IntoView {
    let handle = map;
    let map: Rc<RefCell<MapWidget>> = handle.get_value();

    let canvas_ref = NodeRef::<leptos::html::Canvas>::new();
    let legend: RwSignal<Legend> = RwSignal::new(map.borrow().legend());
    let tooltip: RwSignal<Option<Tooltip>> = RwSignal::new(None);
    let areas: RwSignal<Vec<AreaLabel>> = RwSignal::new(map.borrow().area_list());
    let tile_epoch: RwSignal<u64> = RwSignal::new(0);
    let attribution = map.borrow().options().attribution.clone();

    let tiles = TileImages::new(move || tile_epoch.update(|n| *n = n.wrapping_add(1)));

    let scheduler = Rc::new(FrameScheduler::new({
        let map = map.clone();
        move || {
            let Some(canvas) = canvas_ref.get_untracked() else {
                return;
            };
            paint(&canvas, &map.borrow(), &tiles);
        }
    }));

    // Mount once the canvas has a size, then restore the starting selection.
    Effect::new({
        let map = map.clone();
        let scheduler = scheduler.clone();
        move || {
            let Some(canvas) = canvas_ref.get() else {
                return;
            };
            if map.borrow().is_mounted() {
                return;
            }
            let Some((w, h)) = container_size(&canvas) else {
                return;
            };
            map.borrow_mut().mount(w, h);
            if !initial_selection.is_empty() {
                map.borrow_mut().set_selected(&initial_selection);
            }
            areas.set(map.borrow().area_list());
            scheduler.request();
        }
    });

    Effect::new({
        let map = map.clone();
        let scheduler = scheduler.clone();
        move || {
            revision.track();
            legend.set(map.borrow().legend());
            tooltip.set(None);
            scheduler.request();
        }
    });

    Effect::new({
        let scheduler = scheduler.clone();
        move || {
            tile_epoch.track();
            scheduler.request();
        }
    });

    Effect::new({
        let map = map.clone();
        let scheduler = scheduler.clone();
        move || {
            let map = map.clone();
            let scheduler = scheduler.clone();
            resize::watch(RESIZE_KEY, move || {
                let Some(canvas) = canvas_ref.get_untracked() else {
                    return;
                };
                let Some((w, h)) = container_size(&canvas) else {
                    return;
                };
                map.borrow_mut().resize(w, h);
                scheduler.request();
            });
        }
    });

    on_cleanup(move || {
        handle.try_with_value(|map| map.borrow_mut().teardown());
        resize::unwatch(RESIZE_KEY);
    });

    // --- Input handlers ---

    let is_dragging = Rc::new(Cell::new(false));
    let drag_start = Rc::new(Cell::new((0.0f64, 0.0f64)));
    let last_pos = Rc::new(Cell::new((0.0f64, 0.0f64)));

    let on_pointer_down = {
        let is_dragging = is_dragging.clone();
        let drag_start = drag_start.clone();
        let last_pos = last_pos.clone();
        move |e: PointerEvent| {
            let pos = (e.client_x() as f64, e.client_y() as f64);
            is_dragging.set(true);
            drag_start.set(pos);
            last_pos.set(pos);
            if let Some(target) = e.target()
                && let Ok(el) = target.dyn_into::<web_sys::HtmlElement>()
            {
                el.set_pointer_capture(e.pointer_id()).ok();
                el.style().set_property("cursor", "grabbing").ok();
            }
        }
    };

    let on_pointer_move = {
        let map = map.clone();
        let scheduler = scheduler.clone();
        let is_dragging = is_dragging.clone();
        let last_pos = last_pos.clone();
        move |e: PointerEvent| {
            if is_dragging.get() {
                let (lx, ly) = last_pos.get();
                let (x, y) = (e.client_x() as f64, e.client_y() as f64);
                last_pos.set((x, y));
                map.borrow_mut().pan_by(x - lx, y - ly);
                tooltip.set(None);
                scheduler.request();
                return;
            }

            let (x, y) = local_point(canvas_ref, &e);
            let mut m = map.borrow_mut();
            let hit = m.feature_at(x, y).map(|f| f.id.clone());
            let changed = m.hovered() != hit.as_deref();
            m.hover(hit.as_deref());
            tooltip.set(hit.and_then(|id| m.tooltip(&id, (x, y))));
            drop(m);
            if changed {
                scheduler.request();
            }
        }
    };

    let on_pointer_up = {
        let is_dragging = is_dragging.clone();
        move |e: PointerEvent| {
            is_dragging.set(false);
            if let Some(target) = e.target()
                && let Ok(el) = target.dyn_into::<web_sys::HtmlElement>()
            {
                el.style().set_property("cursor", "grab").ok();
            }
        }
    };

    let on_click = {
        let map = map.clone();
        let scheduler = scheduler.clone();
        let drag_start = drag_start.clone();
        move |e: MouseEvent| {
            let (sx, sy) = drag_start.get();
            let moved = (e.client_x() as f64 - sx).abs().max((e.client_y() as f64 - sy).abs());
            if moved >= CLICK_SLOP {
                return;
            }
            let (x, y) = local_point(canvas_ref, &e);
            let hit = map.borrow().feature_at(x, y);
            let Some(feature) = hit else {
                return;
            };
            map.borrow_mut().toggle(&feature.id);
            areas.set(map.borrow().area_list());
            scheduler.request();
        }
    };

    let on_pointer_leave = {
        let map = map.clone();
        let scheduler = scheduler.clone();
        move |_: PointerEvent| {
            if map.borrow().hovered().is_some() {
                map.borrow_mut().hover(None);
                scheduler.request();
            }
            tooltip.set(None);
        }
    };

    let zoom = {
        let map = map.clone();
        let scheduler = scheduler.clone();
        move |steps: i32| {
            map.borrow_mut().zoom_by(steps);
            tooltip.set(None);
            scheduler.request();
        }
    };
    let zoom_in = {
        let zoom = zoom.clone();
        move |_: MouseEvent| zoom(1)
    };
    let zoom_out = move |_: MouseEvent| zoom(-1);

    let on_clear = {
        let map = map.clone();
        let scheduler = scheduler.clone();
        move |_: MouseEvent| {
            map.borrow_mut().clear_selected();
            areas.set(map.borrow().area_list());
            scheduler.request();
        }
    };

    view! {
        <div class="map-widget" style="position: relative; width: 100%; height: 100%;">
            <div
                class="map-canvas"
                style="position: absolute; inset: 0; overflow: hidden;"
                on:pointerdown=on_pointer_down
                on:pointermove=on_pointer_move
                on:pointerup=on_pointer_up
                on:pointerleave=on_pointer_leave
                on:click=on_click
            >
                <canvas
                    node_ref=canvas_ref
                    style="position: absolute; inset: 0; width: 100%; height: 100%; touch-action: none; cursor: grab;"
                />
            </div>
            <div class="map-zoom" style="position: absolute; top: 10px; left: 10px; display: flex; flex-direction: column; gap: 2px;">
                <button class="zoom-in" title="Zoom in" on:click=zoom_in>"+"</button>
                <button class="zoom-out" title="Zoom out" on:click=zoom_out>"\u{2212}"</button>
            </div>
            <LegendView legend=legend />
            <AreaList areas=areas on_clear=on_clear />
            <MapTooltip tooltip=tooltip />
            <div class="map-attribution" inner_html=attribution />
        </div>
    }
}

fn local_point(canvas_ref: NodeRef<leptos::html::Canvas>, e: &MouseEvent) -> (f64, f64) {
    canvas_ref
        .get_untracked()
        .map(|el| {
            let rect = el.get_bounding_client_rect();
            (
                e.client_x() as f64 - rect.left(),
                e.client_y() as f64 - rect.top(),
            )
        })
        .unwrap_or((e.offset_x() as f64, e.offset_y() as f64))
}

fn paint(canvas: &HtmlCanvasElement, map: &MapWidget, tiles: &TileImages) {
    if !map.is_mounted() {
        return;
    }
    let (w, h) = map.size();
    let dpr = device_pixel_ratio();
    let (pw, ph) = ((w * dpr).round().max(1.0) as u32, (h * dpr).round().max(1.0) as u32);
    if canvas.width() != pw || canvas.height() != ph {
        canvas.set_width(pw);
        canvas.set_height(ph);
    }
    let Some(ctx) = canvas
        .get_context("2d")
        .ok()
        .flatten()
        .and_then(|ctx| ctx.dyn_into::<CanvasRenderingContext2d>().ok())
    else {
        return;
    };
    ctx.set_transform(dpr, 0.0, 0.0, dpr, 0.0, 0.0).ok();
    ctx.clear_rect(0.0, 0.0, w, h);

    let tile_set = map.visible_tiles();
    let mut on_screen = HashSet::new();
    for layer in &map.options().layers {
        match layer {
            Layer::Raster(raster) => {
                draw_tiles(&ctx, raster, &tile_set, tiles, &mut on_screen);
            }
            Layer::Vector => draw_features(&ctx, map),
        }
    }
    tiles.prune(&on_screen);
}

fn draw_tiles(
    ctx: &CanvasRenderingContext2d,
    layer: &TileLayer,
    tile_set: &pricemap_shared::tiles::TileSet,
    tiles: &TileImages,
    on_screen: &mut HashSet<String>,
) {
    ctx.set_image_smoothing_enabled(false);
    for tile in tile_set.tiles.iter().filter(|t| layer.shows(t)) {
        let url = layer.tile_url(tile);
        if let Some(img) = tiles.get(&url) {
            let rect = tile_set.screen_rect(tile);
            // Half a pixel of overlap hides seams between neighbours.
            let _ = ctx.draw_image_with_html_image_element_and_dw_and_dh(
                &img,
                rect.x,
                rect.y,
                rect.size + 0.5,
                rect.size + 0.5,
            );
        }
        on_screen.insert(url);
    }
}

fn trace_feature(ctx: &CanvasRenderingContext2d, map: &MapWidget, feature: &pricemap_shared::Feature) {
    ctx.begin_path();
    for ring in map.screen_rings(feature) {
        let mut points = ring.iter();
        let Some(first) = points.next() else {
            continue;
        };
        ctx.move_to(first.x, first.y);
        for p in points {
            ctx.line_to(p.x, p.y);
        }
        ctx.close_path();
    }
}

fn draw_features(ctx: &CanvasRenderingContext2d, map: &MapWidget) {
    ctx.set_line_join("round");
    let hovered = map.hovered();
    for feature in map.draw_order() {
        trace_feature(ctx, map, &feature);
        if let Some(fill) = fill_css(&map.fill_for(&feature), FILL_ALPHA) {
            ctx.set_fill_style_str(&fill);
            ctx.fill_with_canvas_winding_rule(CanvasWindingRule::Evenodd);
        }

        match map.area_class(&feature.id) {
            Some(class_index) => {
                ctx.set_stroke_style_str(&area_color(class_index).rgba_css(1.0));
                ctx.set_line_width(3.0);
            }
            None if hovered == Some(feature.id.as_str()) => {
                ctx.set_stroke_style_str("rgba(40,40,40,0.9)");
                ctx.set_line_width(2.0);
            }
            None => {
                ctx.set_stroke_style_str("rgba(255,255,255,0.8)");
                ctx.set_line_width(0.75);
            }
        }
        ctx.stroke();
    }
}

#[component]
fn LegendView(legend: RwSignal<Legend>) -> impl IntoView {
    view! {
        <div class="map-legend">
            {move || match legend.get() {
                Legend::Gradient { pixels, labels } => {
                    let last = pixels.len().saturating_sub(1).max(1) as f64;
                    let stops = pixels
                        .iter()
                        .enumerate()
                        .map(|(i, [r, g, b, a])| {
                            format!(
                                "rgba({r},{g},{b},{:.3}) {:.1}%",
                                *a as f64 / 255.0,
                                i as f64 / last * 100.0
                            )
                        })
                        .collect::<Vec<_>>()
                        .join(", ");
                    let [lo, hi] = labels;
                    view! {
                        <div class="legend-gradient">
                            <div
                                class="legend-swatch"
                                style=format!("height: 10px; background: linear-gradient(to right, {stops});")
                            />
                            <div class="legend-labels" style="display: flex; justify-content: space-between;">
                                <span>{lo}</span>
                                <span>{hi}</span>
                            </div>
                        </div>
                    }
                    .into_any()
                }
                Legend::Buckets { swatches, labels } => {
                    // Lowest bucket first, reading left to right.
                    let items = swatches
                        .into_iter()
                        .rev()
                        .map(|swatch| {
                            let color = bucket_color(&swatch.class)
                                .map(|c| c.rgba_css(FILL_ALPHA))
                                .unwrap_or_default();
                            view! {
                                <div class=format!("legend-bucket {}", swatch.class)>
                                    <div class="legend-swatch" style=format!("height: 10px; background: {color};") />
                                    <span class="legend-label">{swatch.label.unwrap_or_default()}</span>
                                </div>
                            }
                        })
                        .collect_view();
                    let extent = (!labels.is_empty()).then(|| {
                        let text = labels.join(" \u{2013} ");
                        view! { <div class="legend-labels">{text}</div> }
                    });
                    view! {
                        <div class="legend-buckets" style="display: flex; gap: 2px;">{items}</div>
                        {extent}
                    }
                    .into_any()
                }
            }}
        </div>
    }
}

#[component]
fn AreaList<F>(areas: RwSignal<Vec<AreaLabel>>, on_clear: F) -> impl IntoView
where
    F: Fn(MouseEvent) + 'static,
{
    view! {
        <div class="area-list">
            <ul>
                {move || {
                    areas
                        .get()
                        .into_iter()
                        .map(|area| {
                            view! {
                                <li class=format!("area-{}", area.class_index)>
                                    <span
                                        class="area-key"
                                        style=format!("display: inline-block; width: 10px; height: 10px; background: {};", area_css(area.class_index))
                                    />
                                    " "
                                    {area.label}
                                </li>
                            }
                        })
                        .collect_view()
                }}
            </ul>
            <button
                class="area-clear"
                style:display=move || if areas.with(|a| a.len() > 1) { "inline-block" } else { "none" }
                on:click=on_clear
            >
                "Clear selection"
            </button>
        </div>
    }
}

#[component]
fn MapTooltip(tooltip: RwSignal<Option<Tooltip>>) -> impl IntoView {
    view! {
        {move || {
            let Some(tip) = tooltip.get() else {
                return view! { <div style="display:none;" /> }.into_any();
            };
            let class = format!("map-tooltip {}", tip.class.unwrap_or_default());
            let secondary = (!tip.secondary.is_empty()).then(|| {
                view! { <div class="tooltip-secondary">{tip.secondary}</div> }
            });
            view! {
                <div
                    class=class
                    style:left=format!("{}px", tip.left)
                    style:top=format!("{}px", tip.top)
                    style="position: absolute; pointer-events: none; transform: translate(-50%, -100%);"
                >
                    <div class="tooltip-area">{tip.area}</div>
                    <div class="tooltip-title">{tip.title}</div>
                    <div class="tooltip-metric">{tip.metric}</div>
                    {secondary}
                </div>
            }
            .into_any()
        }}
    }
}
