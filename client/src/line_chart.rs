use std::cell::RefCell;
use std::rc::Rc;

use leptos::prelude::*;
use web_sys::PointerEvent;

use pricemap_shared::chart::{
    self, AxisTick, CHART_HEIGHT, ChartLine, FOCUS_RADIUS, HOVER_BUFFER, HoverState, LineChart,
    MARGIN, PLOT_HEIGHT,
};
use pricemap_shared::series_cache::SeriesCache;

use crate::app::Shared;
use crate::colors::area_css;
use crate::resize;

/// Everything the SVG needs for one paint, detached from the chart model.
#[derive(Clone, Default, PartialEq)]
struct ChartFrame {
    width: f64,
    lines: Vec<ChartLine>,
    y_ticks: Vec<AxisTick>,
    x_labels: Vec<(f64, String)>,
    hover: Option<HoverState>,
}

impl ChartFrame {
    fn capture(chart: &LineChart) -> Self {
        Self {
            width: chart.width(),
            lines: chart.lines(),
            y_ticks: chart.y_ticks(),
            x_labels: chart.x_labels(),
            hover: chart.hover(),
        }
    }
}

fn path_data(chunk: &[(f64, f64)]) -> String {
    let mut d = String::with_capacity(chunk.len() * 16);
    for (i, (x, y)) in chunk.iter().enumerate() {
        d.push(if i == 0 { 'M' } else { 'L' });
        d.push_str(&format!("{x:.2},{y:.2}"));
    }
    d
}

fn element_width(el: &web_sys::Element) -> Option<f64> {
    let w = el.client_width() as f64;
    (w > 0.0).then_some(w)
}

/// Line chart following the map selection. `handler_id` names this chart's
/// dispatcher subscriptions.
#[component]
pub fn LineChartView(
    chart: Shared<LineChart>,
    cache: Shared<SeriesCache>,
    handler_id: &'static str,
) -> impl IntoView {
    let handle = chart;
    let chart: Rc<RefCell<LineChart>> = handle.get_value();
    let cache: Rc<RefCell<SeriesCache>> = cache.get_value();

    let container_ref = NodeRef::<leptos::html::Div>::new();
    let frame: RwSignal<ChartFrame> = RwSignal::new(ChartFrame::capture(&chart.borrow()));
    let title = chart.borrow().options().title.clone();

    let refresh = {
        let chart = Rc::downgrade(&chart);
        move || {
            if let Some(chart) = chart.upgrade() {
                frame.set(ChartFrame::capture(&chart.borrow()));
            }
        }
    };

    chart::connect(
        &chart,
        handler_id,
        move |feature| cache.borrow().get(&feature.id),
        refresh.clone(),
    );

    Effect::new({
        let chart = chart.clone();
        let refresh = refresh.clone();
        move || {
            let Some(container) = container_ref.get() else {
                return;
            };
            if let Some(w) = element_width(&container) {
                chart.borrow_mut().resize(w);
                refresh();
            }

            let chart = chart.clone();
            let refresh = refresh.clone();
            resize::watch(handler_id, move || {
                let Some(w) = container_ref.get_untracked().and_then(|el| element_width(&el)) else {
                    return;
                };
                chart.borrow_mut().resize(w);
                refresh();
            });
        }
    });

    on_cleanup(move || {
        handle.try_with_value(|c| chart::disconnect(&c.borrow(), handler_id));
        resize::unwatch(handler_id);
    });

    let on_pointer_move = {
        let chart = chart.clone();
        move |e: PointerEvent| {
            chart::pointer_move(&chart, e.offset_x() as f64 - HOVER_BUFFER);
        }
    };
    let on_pointer_leave = {
        let chart = chart.clone();
        move |_: PointerEvent| chart::pointer_leave(&chart)
    };

    let plot = move || {
        let f = frame.get();
        let width = f.width;
        let svg_width = width + MARGIN.left + MARGIN.right;

        let y_axis = f
            .y_ticks
            .iter()
            .filter(|t| t.visible)
            .map(|t| {
                view! {
                    <g class="tick" transform=format!("translate(0,{:.2})", t.position)>
                        <line x2=width stroke="#ddd" />
                        <text x=width + 6.0 dy="0.32em" font-size="11">{t.label.clone()}</text>
                    </g>
                }
            })
            .collect_view();

        let x_axis = f
            .x_labels
            .iter()
            .enumerate()
            .map(|(i, (x, label))| {
                let anchor = if i == 0 { "start" } else { "end" };
                view! {
                    <text
                        x=*x
                        y=PLOT_HEIGHT + MARGIN.bottom - 4.0
                        text-anchor=anchor
                        font-size="11"
                    >
                        {label.clone()}
                    </text>
                }
            })
            .collect_view();

        let paths = f
            .lines
            .iter()
            .flat_map(|line| {
                let color = area_css(line.class_index);
                let class = format!("line area-{}", line.class_index);
                line.chunks.iter().map(move |chunk| {
                    view! {
                        <path
                            class=class.clone()
                            d=path_data(chunk)
                            fill="none"
                            stroke=color.clone()
                            stroke-width="2"
                        />
                    }
                })
            })
            .collect_view();

        let focus = f
            .hover
            .as_ref()
            .map(|h| {
                h.points
                    .iter()
                    .map(|p| {
                        view! {
                            <circle
                                class=format!("focus area-{}", p.class_index)
                                cx=p.x
                                cy=p.y
                                r=FOCUS_RADIUS
                                fill=area_css(p.class_index)
                            />
                        }
                    })
                    .collect_view()
            });

        view! {
            <svg width=svg_width height=CHART_HEIGHT>
                <g transform=format!("translate({},{})", MARGIN.left, MARGIN.top)>
                    <g class="axis axis-y">{y_axis}</g>
                    <g class="axis axis-x">{x_axis}</g>
                    <g class="lines">{paths}</g>
                    <g class="focus">{focus}</g>
                </g>
            </svg>
        }
    };

    let tooltip = move || {
        frame.with(|f| f.hover.as_ref().map(|h| h.tooltip.clone())).map(|tip| {
            let entries = tip
                .entries
                .into_iter()
                .map(|(class_index, text)| {
                    view! {
                        <div class=format!("tooltip-entry area-{class_index}")>
                            <span
                                class="area-key"
                                style=format!("display: inline-block; width: 8px; height: 8px; background: {};", area_css(class_index))
                            />
                            " "
                            {text}
                        </div>
                    }
                })
                .collect_view();
            view! {
                <div
                    class="chart-tooltip"
                    style:left=format!("{}px", tip.left)
                    style:bottom=format!("{}px", tip.bottom)
                    style="position: absolute; pointer-events: none; transform: translateX(-50%);"
                >
                    <div class="tooltip-date">{tip.date}</div>
                    {entries}
                </div>
            }
        })
    };

    view! {
        <div class="line-chart" node_ref=container_ref style="position: relative;">
            {title.map(|t| view! { <h3 class="chart-title">{t}</h3> })}
            {plot}
            <div
                class="chart-overlay"
                style=move || format!(
                    "position: absolute; left: {}px; bottom: {}px; width: {}px; height: {}px;",
                    MARGIN.left - HOVER_BUFFER,
                    MARGIN.bottom,
                    frame.with(|f| f.width) + 2.0 * HOVER_BUFFER,
                    PLOT_HEIGHT + MARGIN.top,
                )
                on:pointermove=on_pointer_move
                on:pointerleave=on_pointer_leave
            />
            {tooltip}
        </div>
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_data_moves_then_draws() {
        assert_eq!(path_data(&[(0.0, 1.0), (2.5, 3.0)]), "M0.00,1.00L2.50,3.00");
        assert_eq!(path_data(&[]), "");
    }
}
