//! Chart data for the visualization overlay.
//!
//! Everything here is plain data derived from a [`Table`]; drawing happens in `ui`.

use tracing::{debug, instrument};

use crate::stats::CorrelationMatrix;
use crate::table::{Column, Table};

pub const HISTOGRAM_BINS: usize = 30;
pub const MAX_GRID_CHARTS: usize = 4;
pub const TOP_CATEGORIES: usize = 10;

#[derive(Debug, Clone, PartialEq)]
pub struct Histogram {
    pub column: String,
    pub start: f64,
    pub bin_width: f64,
    pub counts: Vec<u64>,
}

impl Histogram {
    /// Equal width bins over [min, max], the last bin closed on both sides.
    /// A constant column is spread over [v - 0.5, v + 0.5].
    pub fn from_values(column: &str, values: &[f64], bins: usize) -> Self {
        let bins = bins.max(1);
        let (mut lo, mut hi) = values
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            });
        if values.is_empty() {
            (lo, hi) = (0.0, 1.0);
        } else if lo == hi {
            (lo, hi) = (lo - 0.5, hi + 0.5);
        }
        let bin_width = (hi - lo) / bins as f64;

        let mut counts = vec![0u64; bins];
        for &v in values {
            let idx = (((v - lo) / bin_width) as usize).min(bins - 1);
            counts[idx] += 1;
        }

        Histogram {
            column: column.to_string(),
            start: lo,
            bin_width,
            counts,
        }
    }

    pub fn end(&self) -> f64 {
        self.start + self.bin_width * self.counts.len() as f64
    }

    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScatterPlot {
    pub x_label: String,
    pub y_label: String,
    pub points: Vec<(f64, f64)>,
}

impl ScatterPlot {
    pub fn from_columns(x: &Column, y: &Column) -> Self {
        let points = match (x.numbers(), y.numbers()) {
            (Some(xs), Some(ys)) => xs
                .iter()
                .zip(ys.iter())
                .filter_map(|(a, b)| Some(((*a)?, (*b)?)))
                .collect(),
            _ => Vec::new(),
        };
        ScatterPlot {
            x_label: x.name.clone(),
            y_label: y.name.clone(),
            points,
        }
    }

    /// Axis bounds padded so that points never sit on the frame.
    pub fn bounds(&self) -> ([f64; 2], [f64; 2]) {
        let pad = |lo: f64, hi: f64| {
            if !lo.is_finite() {
                [0.0, 1.0]
            } else if lo == hi {
                [lo - 0.5, hi + 0.5]
            } else {
                let margin = (hi - lo) * 0.05;
                [lo - margin, hi + margin]
            }
        };
        let (xl, xh, yl, yh) = self.points.iter().fold(
            (
                f64::INFINITY,
                f64::NEG_INFINITY,
                f64::INFINITY,
                f64::NEG_INFINITY,
            ),
            |(xl, xh, yl, yh), &(x, y)| (xl.min(x), xh.max(x), yl.min(y), yh.max(y)),
        );
        (pad(xl, xh), pad(yl, yh))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CategoryBars {
    pub column: String,
    pub bars: Vec<(String, u64)>,
}

impl CategoryBars {
    pub fn from_column(column: &Column, top: usize) -> Self {
        let bars = column
            .value_counts()
            .into_iter()
            .take(top)
            .map(|(value, count)| (value, count as u64))
            .collect();
        CategoryBars {
            column: column.name.clone(),
            bars,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChartTab {
    Distributions(Vec<Histogram>),
    Correlation(CorrelationMatrix),
    Scatter(ScatterPlot),
    Categories(Vec<CategoryBars>),
}

impl ChartTab {
    pub fn title(&self) -> &'static str {
        match self {
            ChartTab::Distributions(_) => "Distributions",
            ChartTab::Correlation(_) => "Correlation",
            ChartTab::Scatter(_) => "Scatter Plots",
            ChartTab::Categories(_) => "Categories",
        }
    }
}

/// The tabs of one visualization request. Dropped when the overlay closes.
#[derive(Debug, Clone)]
pub struct ChartSet {
    tabs: Vec<ChartTab>,
    selected: usize,
}

impl ChartSet {
    #[instrument(skip_all, fields(table = table.name()))]
    pub fn build(table: &Table) -> Self {
        let numeric = table.numeric_columns();
        let text = table.text_columns();
        let mut tabs = Vec::new();

        if !numeric.is_empty() {
            let histograms = numeric
                .iter()
                .take(MAX_GRID_CHARTS)
                .map(|c| Histogram::from_values(&c.name, &c.present_numbers(), HISTOGRAM_BINS))
                .collect();
            tabs.push(ChartTab::Distributions(histograms));
        }

        if numeric.len() > 1 {
            tabs.push(ChartTab::Correlation(CorrelationMatrix::from_columns(
                &numeric,
            )));
            tabs.push(ChartTab::Scatter(ScatterPlot::from_columns(
                numeric[0], numeric[1],
            )));
        }

        if !text.is_empty() {
            let bars = text
                .iter()
                .take(MAX_GRID_CHARTS)
                .map(|c| CategoryBars::from_column(c, TOP_CATEGORIES))
                .collect();
            tabs.push(ChartTab::Categories(bars));
        }

        debug!(
            "Built chart tabs: {:?}",
            tabs.iter().map(ChartTab::title).collect::<Vec<_>>()
        );
        ChartSet { tabs, selected: 0 }
    }

    pub fn tabs(&self) -> &[ChartTab] {
        &self.tabs
    }

    pub fn titles(&self) -> Vec<&'static str> {
        self.tabs.iter().map(ChartTab::title).collect()
    }

    pub fn selected(&self) -> usize {
        self.selected
    }

    pub fn selected_tab(&self) -> Option<&ChartTab> {
        self.tabs.get(self.selected)
    }

    pub fn next_tab(&mut self) {
        if !self.tabs.is_empty() {
            self.selected = (self.selected + 1) % self.tabs.len();
        }
    }

    pub fn previous_tab(&mut self) {
        if !self.tabs.is_empty() {
            self.selected = (self.selected + self.tabs.len() - 1) % self.tabs.len();
        }
    }
}
