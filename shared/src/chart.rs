//! Layout and hover model for the historical line charts.
//!
//! The chart draws a fixed set of default series (the city median) followed
//! by the series of the currently selected areas, all against the same month
//! axis. Hovering one chart broadcasts an index so every chart highlights the
//! same month.

use std::cell::RefCell;
use std::rc::Rc;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::dispatch::{Dispatcher, Event, EventKind};
use crate::feature::Feature;
use crate::format::{ValueFormat, quarter_label};
use crate::series::SeriesRow;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Margin {
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
    pub left: f64,
}

pub const MARGIN: Margin = Margin {
    top: 20.0,
    right: 45.0,
    bottom: 20.0,
    left: 0.0,
};
pub const CHART_HEIGHT: f64 = 200.0;
pub const PLOT_HEIGHT: f64 = CHART_HEIGHT - MARGIN.top - MARGIN.bottom;
/// Extra pointer capture on either side of the plot.
pub const HOVER_BUFFER: f64 = 10.0;
pub const Y_TICK_COUNT: usize = 4;
pub const FOCUS_RADIUS: f64 = 4.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Curve {
    #[default]
    Linear,
    /// Horizontal steps centred between samples.
    Step,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LineChartOptions {
    pub title: Option<String>,
    /// Row field plotted on the y axis.
    pub data_key: String,
    /// Lower bound the y domain always includes.
    pub y_min: Option<f64>,
    pub y_format: ValueFormat,
    pub tooltip_y_format: ValueFormat,
    /// Row field shown in the tooltip instead of `data_key`.
    pub tooltip_key: Option<String>,
    /// Explicit y tick values; replaces the generated ticks.
    pub y_values: Option<Vec<f64>>,
    pub curve: Curve,
    /// Added to series positions to pick each line's area class.
    pub color_offset: usize,
    /// Whether the default (city) series is drawn.
    pub include_default_data: bool,
}

impl Default for LineChartOptions {
    fn default() -> Self {
        Self {
            title: None,
            data_key: "trend".to_string(),
            y_min: None,
            y_format: ValueFormat::Count,
            tooltip_y_format: ValueFormat::Count,
            tooltip_key: None,
            y_values: None,
            curve: Curve::Linear,
            color_offset: 0,
            include_default_data: true,
        }
    }
}

/// One drawable series. `rows` is `None` until the history has loaded.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartSeries {
    pub id: String,
    pub rows: Option<Rc<Vec<SeriesRow>>>,
}

impl ChartSeries {
    pub fn new(id: impl Into<String>, rows: Option<Rc<Vec<SeriesRow>>>) -> Self {
        Self {
            id: id.into(),
            rows,
        }
    }

    fn value_at(&self, index: usize, key: &str) -> Option<f64> {
        self.rows
            .as_ref()?
            .get(index)?
            .value(key)
            .filter(|v| v.is_finite())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AxisTick {
    pub value: f64,
    pub position: f64,
    pub label: String,
    /// Ticks outside the y domain are kept but hidden.
    pub visible: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChartLine {
    pub class_index: usize,
    /// Polylines in plot coordinates, split where values are missing.
    pub chunks: Vec<Vec<(f64, f64)>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FocusPoint {
    pub class_index: usize,
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChartTooltip {
    /// `(class index, formatted value)` per drawn series.
    pub entries: Vec<(usize, String)>,
    pub date: String,
    pub left: f64,
    pub bottom: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HoverState {
    pub index: usize,
    pub points: Vec<FocusPoint>,
    pub tooltip: ChartTooltip,
}

pub struct LineChart {
    options: LineChartOptions,
    dates: Vec<NaiveDate>,
    width: f64,
    defaults: Vec<ChartSeries>,
    drawn: Vec<ChartSeries>,
    hover_index: Option<usize>,
    dispatcher: Option<Dispatcher>,
}

impl LineChart {
    /// `container_width` is the inner width available to the chart.
    pub fn new(
        options: LineChartOptions,
        dates: Vec<NaiveDate>,
        defaults: Vec<ChartSeries>,
        container_width: f64,
        dispatcher: Option<Dispatcher>,
    ) -> Self {
        if dispatcher.is_none() {
            warn!("line chart created without a dispatcher; it will not follow the map selection");
        }
        let defaults = if options.include_default_data {
            defaults
        } else {
            Vec::new()
        };
        Self {
            options,
            dates,
            width: plot_width(container_width),
            drawn: defaults.clone(),
            defaults,
            hover_index: None,
            dispatcher,
        }
    }

    pub fn options(&self) -> &LineChartOptions {
        &self.options
    }

    pub fn width(&self) -> f64 {
        self.width
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    /// Series currently drawn: defaults first, then the selection.
    pub fn drawn(&self) -> &[ChartSeries] {
        &self.drawn
    }

    pub fn set_selection(&mut self, selection: Vec<ChartSeries>) {
        let mut drawn = self.defaults.clone();
        drawn.extend(selection);
        self.drawn = drawn;
    }

    pub fn resize(&mut self, container_width: f64) {
        self.width = plot_width(container_width);
    }

    pub fn x_domain(&self) -> Option<(NaiveDate, NaiveDate)> {
        let min = self.dates.iter().min()?;
        let max = self.dates.iter().max()?;
        Some((*min, *max))
    }

    pub fn x(&self, date: NaiveDate) -> f64 {
        let Some((d0, d1)) = self.x_domain() else {
            return 0.0;
        };
        let (a, b) = (day_number(d0), day_number(d1));
        if b == a {
            return self.width / 2.0;
        }
        (day_number(date) - a) / (b - a) * self.width
    }

    /// Day number under plot x coordinate `px`.
    fn invert_x(&self, px: f64) -> Option<f64> {
        let (d0, d1) = self.x_domain()?;
        let (a, b) = (day_number(d0), day_number(d1));
        if self.width <= 0.0 {
            return Some(a);
        }
        Some(a + px / self.width * (b - a))
    }

    fn drawn_values(&self) -> impl Iterator<Item = f64> + '_ {
        let key = self.options.data_key.as_str();
        self.drawn
            .iter()
            .filter_map(|s| s.rows.as_ref())
            .flat_map(move |rows| rows.iter().filter_map(move |r| r.value(key)))
            .filter(|v| v.is_finite())
    }

    pub fn y_domain(&self) -> (f64, f64) {
        let floor = self.options.y_min.unwrap_or(0.0);
        let (min, max) = self
            .drawn_values()
            .fold((None::<f64>, None::<f64>), |(lo, hi), v| {
                (
                    Some(lo.map_or(v, |m| m.min(v))),
                    Some(hi.map_or(v, |m| m.max(v))),
                )
            });
        let lo = min.map_or(floor, |m| m.min(floor));
        (lo, max.unwrap_or(0.0))
    }

    pub fn y(&self, value: f64) -> f64 {
        let (lo, hi) = self.y_domain();
        y_scale(value, lo, hi)
    }

    pub fn y_ticks(&self) -> Vec<AxisTick> {
        let (lo, hi) = self.y_domain();
        let values = match &self.options.y_values {
            Some(values) => values.clone(),
            None => nice_ticks(lo, hi, Y_TICK_COUNT),
        };
        values
            .into_iter()
            .map(|value| AxisTick {
                value,
                position: y_scale(value, lo, hi),
                label: self.options.y_format.apply(value),
                visible: value >= lo && value <= hi,
            })
            .collect()
    }

    /// Year labels at both ends of the x axis.
    pub fn x_labels(&self) -> Vec<(f64, String)> {
        match self.x_domain() {
            Some((d0, d1)) => vec![
                (self.x(d0), d0.year().to_string()),
                (self.x(d1), d1.year().to_string()),
            ],
            None => Vec::new(),
        }
    }

    pub fn lines(&self) -> Vec<ChartLine> {
        let key = self.options.data_key.as_str();
        let (lo, hi) = self.y_domain();
        self.drawn
            .iter()
            .enumerate()
            .filter_map(|(i, series)| {
                let rows = series.rows.as_ref()?;
                let mut chunks = Vec::new();
                let mut current: Vec<(f64, f64)> = Vec::new();
                for row in rows.iter() {
                    match (row.date, row.value(key).filter(|v| v.is_finite())) {
                        (Some(date), Some(v)) => current.push((self.x(date), y_scale(v, lo, hi))),
                        _ if !current.is_empty() => chunks.push(std::mem::take(&mut current)),
                        _ => {}
                    }
                }
                if !current.is_empty() {
                    chunks.push(current);
                }
                if self.options.curve == Curve::Step {
                    chunks = chunks.into_iter().map(step_points).collect();
                }
                Some(ChartLine {
                    class_index: i + self.options.color_offset,
                    chunks,
                })
            })
            .collect()
    }

    /// Date index under the pointer. `mouse_x` is relative to the plot.
    pub fn index_at(&self, mouse_x: f64) -> Option<usize> {
        let target = self.invert_x(mouse_x)?;
        let after = self
            .dates
            .partition_point(|d| day_number(*d) <= target);
        after.checked_sub(1)
    }

    pub fn hover_index(&self) -> Option<usize> {
        self.hover_index
    }

    pub fn set_hover_index(&mut self, index: Option<usize>) {
        self.hover_index = index;
    }

    /// Focus points and tooltip for the hovered index, `None` when hidden.
    pub fn hover(&self) -> Option<HoverState> {
        let index = self.hover_index?;
        if self.drawn.is_empty() {
            return None;
        }
        let date = *self.dates.get(index)?;
        let (lo, hi) = self.y_domain();
        let x = self.x(date);
        let key = self.options.data_key.as_str();
        let tooltip_key = self.options.tooltip_key.as_deref().unwrap_or(key);
        let offset = self.options.color_offset;

        let points = self
            .drawn
            .iter()
            .enumerate()
            .filter_map(|(i, s)| {
                s.value_at(index, key).map(|v| FocusPoint {
                    class_index: i + offset,
                    x,
                    y: y_scale(v, lo, hi),
                })
            })
            .collect();

        let max = self
            .drawn
            .iter()
            .filter_map(|s| s.value_at(index, key))
            .reduce(f64::max);
        let bottom = match max {
            Some(m) => PLOT_HEIGHT - y_scale(m, lo, hi) + MARGIN.top + MARGIN.bottom,
            None => MARGIN.top + MARGIN.bottom,
        };
        let bottom = if bottom.is_finite() {
            bottom
        } else {
            MARGIN.top + MARGIN.bottom
        };

        let entries = self
            .drawn
            .iter()
            .enumerate()
            .map(|(i, s)| {
                (
                    i + offset,
                    self.options
                        .tooltip_y_format
                        .apply_or_na(s.value_at(index, tooltip_key)),
                )
            })
            .collect();

        Some(HoverState {
            index,
            points,
            tooltip: ChartTooltip {
                entries,
                date: quarter_label(date),
                left: x + MARGIN.left,
                bottom,
            },
        })
    }
}

/// Broadcast the index under the pointer to every chart, this one included.
pub fn pointer_move(chart: &Rc<RefCell<LineChart>>, mouse_x: f64) {
    let (dispatcher, index) = {
        let c = chart.borrow();
        (c.dispatcher.clone(), c.index_at(mouse_x))
    };
    if let Some(d) = dispatcher {
        d.publish(Event::IndexSelected(index));
    }
}

pub fn pointer_leave(chart: &Rc<RefCell<LineChart>>) {
    let dispatcher = chart.borrow().dispatcher.clone();
    if let Some(d) = dispatcher {
        d.publish(Event::IndexSelected(None));
    }
}

/// Subscribe `chart` to selection and hover events under `handler_id`.
/// `resolve` looks up a feature's loaded history; `on_change` runs after
/// every state change so the view can repaint.
pub fn connect<R, C>(chart: &Rc<RefCell<LineChart>>, handler_id: &str, resolve: R, on_change: C)
where
    R: Fn(&Feature) -> Option<Rc<Vec<SeriesRow>>> + 'static,
    C: Fn() + 'static,
{
    let Some(dispatcher) = chart.borrow().dispatcher.clone() else {
        return;
    };
    let on_change = Rc::new(on_change);

    let weak = Rc::downgrade(chart);
    let notify = Rc::clone(&on_change);
    dispatcher.subscribe(EventKind::DataSelected, handler_id, move |event| {
        let (Some(chart), Event::DataSelected(features)) = (weak.upgrade(), event) else {
            return;
        };
        let selection = features
            .iter()
            .map(|f| ChartSeries::new(f.id.clone(), resolve(f)))
            .collect();
        chart.borrow_mut().set_selection(selection);
        notify();
    });

    let weak = Rc::downgrade(chart);
    dispatcher.subscribe(EventKind::IndexSelected, handler_id, move |event| {
        let (Some(chart), Event::IndexSelected(index)) = (weak.upgrade(), event) else {
            return;
        };
        chart.borrow_mut().set_hover_index(*index);
        on_change();
    });
}

/// Remove the subscriptions made by [`connect`].
pub fn disconnect(chart: &LineChart, handler_id: &str) {
    if let Some(d) = &chart.dispatcher {
        d.unsubscribe_all(handler_id);
    }
}

fn plot_width(container_width: f64) -> f64 {
    (container_width - MARGIN.left - MARGIN.right).max(0.0)
}

fn day_number(date: NaiveDate) -> f64 {
    date.num_days_from_ce() as f64
}

fn y_scale(value: f64, lo: f64, hi: f64) -> f64 {
    if hi == lo {
        return PLOT_HEIGHT / 2.0;
    }
    PLOT_HEIGHT - (value - lo) / (hi - lo) * PLOT_HEIGHT
}

/// Midpoint step interpolation between consecutive samples.
fn step_points(points: Vec<(f64, f64)>) -> Vec<(f64, f64)> {
    let mut out = Vec::with_capacity(points.len() * 3);
    for (i, &(x, y)) in points.iter().enumerate() {
        if i > 0 {
            let (px, py) = points[i - 1];
            let mid = (px + x) / 2.0;
            out.push((mid, py));
            out.push((mid, y));
        }
        out.push((x, y));
    }
    out
}

/// Round tick values spanning `[start, stop]`, about `count` of them.
pub fn nice_ticks(start: f64, stop: f64, count: usize) -> Vec<f64> {
    if count == 0 || !start.is_finite() || !stop.is_finite() {
        return Vec::new();
    }
    if start == stop {
        return vec![start];
    }
    let (lo, hi, reverse) = if stop < start {
        (stop, start, true)
    } else {
        (start, stop, false)
    };
    let inc = tick_increment(lo, hi, count);
    if inc == 0.0 || !inc.is_finite() {
        return Vec::new();
    }
    let mut ticks: Vec<f64> = if inc > 0.0 {
        let first = (lo / inc).ceil() as i64;
        let last = (hi / inc).floor() as i64;
        (first..=last).map(|i| i as f64 * inc).collect()
    } else {
        let inc = -inc;
        let first = (lo * inc).ceil() as i64;
        let last = (hi * inc).floor() as i64;
        (first..=last).map(|i| i as f64 / inc).collect()
    };
    if reverse {
        ticks.reverse();
    }
    ticks
}

/// Positive: step size. Negative: reciprocal of the step size.
fn tick_increment(start: f64, stop: f64, count: usize) -> f64 {
    let e10 = 50f64.sqrt();
    let e5 = 10f64.sqrt();
    let e2 = 2f64.sqrt();
    let step = (stop - start) / count as f64;
    let power = step.log10().floor();
    let error = step / 10f64.powf(power);
    let factor = if error >= e10 {
        10.0
    } else if error >= e5 {
        5.0
    } else if error >= e2 {
        2.0
    } else {
        1.0
    };
    if power >= 0.0 {
        factor * 10f64.powf(power)
    } else {
        -10f64.powf(-power) / factor
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::feature::fixtures::square;

    fn month(y: i32, m: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, 1).expect("valid date")
    }

    fn series(id: &str, values: &[Option<f64>]) -> ChartSeries {
        let rows = values
            .iter()
            .enumerate()
            .map(|(i, v)| SeriesRow {
                date: Some(month(2016, i as u32 + 1)),
                trend: *v,
                ..Default::default()
            })
            .collect();
        ChartSeries::new(id, Some(Rc::new(rows)))
    }

    fn chart(defaults: Vec<ChartSeries>) -> LineChart {
        let dates = (1..=4).map(|m| month(2016, m)).collect();
        LineChart::new(
            LineChartOptions::default(),
            dates,
            defaults,
            445.0,
            Some(Dispatcher::new()),
        )
    }

    #[test]
    fn y_domain_includes_zero_and_data_max() {
        let mut c = chart(vec![series("NYC median", &[Some(100.0), Some(300.0)])]);
        assert_eq!(c.y_domain(), (0.0, 300.0));
        c.set_selection(vec![series("A", &[Some(-50.0), Some(500.0)])]);
        assert_eq!(c.y_domain(), (-50.0, 500.0));
        assert_eq!(c.drawn().len(), 2);
    }

    #[test]
    fn empty_chart_has_zero_domain() {
        let c = chart(Vec::new());
        assert_eq!(c.y_domain(), (0.0, 0.0));
        assert!(c.lines().is_empty());
    }

    #[test]
    fn nice_ticks_follow_increment_rule() {
        assert_eq!(nice_ticks(0.0, 300.0, 4), vec![0.0, 100.0, 200.0, 300.0]);
        assert_eq!(
            nice_ticks(0.0, 1_000_000.0, 4),
            vec![0.0, 200_000.0, 400_000.0, 600_000.0, 800_000.0, 1_000_000.0]
        );
        assert_eq!(nice_ticks(-0.1, 0.2, 4), vec![-0.1, 0.0, 0.1, 0.2]);
        assert_eq!(nice_ticks(5.0, 5.0, 4), vec![5.0]);
    }

    #[test]
    fn explicit_tick_values_outside_domain_are_hidden() {
        let mut c = chart(vec![series("NYC median", &[Some(10.0), Some(20.0)])]);
        c.options.y_values = Some(vec![0.0, 10.0, 40.0]);
        let visible: Vec<bool> = c.y_ticks().iter().map(|t| t.visible).collect();
        assert_eq!(visible, vec![true, true, false]);
    }

    #[test]
    fn lines_break_at_missing_values() {
        let c = chart(vec![series(
            "NYC median",
            &[Some(1.0), None, Some(3.0), Some(4.0)],
        )]);
        let lines = c.lines();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].class_index, 0);
        let lens: Vec<usize> = lines[0].chunks.iter().map(Vec::len).collect();
        assert_eq!(lens, vec![1, 2]);
    }

    #[test]
    fn step_curve_adds_midpoint_corners() {
        let mut c = chart(Vec::new());
        c.options.curve = Curve::Step;
        c.options.color_offset = 1;
        c.set_selection(vec![series("A", &[Some(1.0), Some(2.0)])]);
        let lines = c.lines();
        assert_eq!(lines[0].class_index, 1);
        let chunk = &lines[0].chunks[0];
        assert_eq!(chunk.len(), 4);
        assert_eq!(chunk[1].1, chunk[0].1);
        assert_eq!(chunk[2].1, chunk[3].1);
        assert_eq!(chunk[1].0, chunk[2].0);
    }

    #[test]
    fn index_at_bisects_dates() {
        let c = chart(Vec::new());
        assert_eq!(c.width(), 400.0);
        assert_eq!(c.index_at(-5.0), None);
        assert_eq!(c.index_at(0.0), Some(0));
        assert_eq!(c.index_at(c.x(month(2016, 2)) + 1.0), Some(1));
        assert_eq!(c.index_at(400.0), Some(3));
        assert_eq!(c.index_at(410.0), Some(3));
    }

    #[test]
    fn hover_builds_points_and_tooltip() {
        let mut c = chart(vec![series("NYC median", &[Some(100.0), Some(200.0)])]);
        c.set_selection(vec![series("A", &[Some(50.0), None])]);
        c.set_hover_index(Some(1));
        let state = c.hover().expect("visible");
        assert_eq!(state.points.len(), 1);
        assert_eq!(state.tooltip.entries, vec![(0, "200".to_string()), (1, "NA".to_string())]);
        assert_eq!(state.tooltip.date, "Q1 2016");
        // y(max) is the top of the plot, so the tooltip sits above it.
        assert_eq!(state.tooltip.bottom, PLOT_HEIGHT + 40.0);
        assert_eq!(state.tooltip.left, c.x(month(2016, 2)));
    }

    #[test]
    fn hover_without_values_uses_margin_fallback() {
        let mut c = chart(vec![series("NYC median", &[None, None, None, None])]);
        c.set_hover_index(Some(2));
        let state = c.hover().expect("visible");
        assert!(state.points.is_empty());
        assert_eq!(state.tooltip.bottom, 40.0);
    }

    #[test]
    fn hover_hidden_when_unset_or_empty() {
        let mut c = chart(Vec::new());
        c.set_hover_index(Some(1));
        assert!(c.hover().is_none());
        c.set_selection(vec![series("A", &[Some(1.0)])]);
        c.set_hover_index(None);
        assert!(c.hover().is_none());
    }

    #[test]
    fn connected_chart_follows_dispatcher() {
        let dispatcher = Dispatcher::new();
        let dates = (1..=4).map(|m| month(2016, m)).collect();
        let c = Rc::new(RefCell::new(LineChart::new(
            LineChartOptions::default(),
            dates,
            Vec::new(),
            445.0,
            Some(dispatcher.clone()),
        )));
        let changes = Rc::new(RefCell::new(0));
        let counter = Rc::clone(&changes);
        let history = series("A", &[Some(1.0), Some(2.0)]).rows;
        connect(
            &c,
            "chart-test",
            move |f| (f.id == "A").then(|| history.clone()).flatten(),
            move || *counter.borrow_mut() += 1,
        );

        let feature = Rc::new(square("A", 0.0, 0.0, 1.0, &[]));
        dispatcher.publish(Event::DataSelected(vec![feature]));
        assert_eq!(c.borrow().drawn().len(), 1);
        assert!(c.borrow().drawn()[0].rows.is_some());

        pointer_move(&c, 0.0);
        assert_eq!(c.borrow().hover_index(), Some(0));
        pointer_leave(&c);
        assert_eq!(c.borrow().hover_index(), None);
        assert_eq!(*changes.borrow(), 3);

        disconnect(&c.borrow(), "chart-test");
        assert_eq!(dispatcher.subscriber_count(EventKind::DataSelected), 0);
    }
}
