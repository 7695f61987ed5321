use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    symbols::{Marker, border},
    text::{Line, Span, Text},
    widgets::{
        Axis, Bar, BarChart, BarGroup, Block, Cell, Chart, Clear, Dataset, GraphType, Paragraph,
        Row, Table, Tabs, Wrap,
    },
};

use crate::charts::{CategoryBars, ChartSet, ChartTab, Histogram, ScatterPlot};
use crate::domain::AnalyzerConfig;
use crate::model::{Modus, Model, Pane, Popup, PopupKind};
use crate::stats::CorrelationMatrix;

pub const CMDLINE_HEIGH: usize = 1;
pub const TITLE_HEIGHT: usize = 1;
pub const TABLE_HEADER_HEIGHT: usize = 1;
pub const BORDER_HEIGHT: usize = 2;

const HEATMAP_CELL_WIDTH: u16 = 8;

pub struct AnalyzerUI {
    label_width: usize,
}

impl AnalyzerUI {
    pub fn new(cfg: &AnalyzerConfig) -> Self {
        Self {
            label_width: cfg.max_column_width.clamp(4, 16),
        }
    }

    pub fn draw(&mut self, model: &Model, frame: &mut Frame) {
        let [title_area, body_area, cmd_area] = Layout::vertical([
            Constraint::Length(TITLE_HEIGHT as u16),
            Constraint::Fill(1),
            Constraint::Length(CMDLINE_HEIGH as u16),
        ])
        .areas(frame.area());
        let [preview_area, analysis_area] =
            Layout::horizontal([Constraint::Percentage(50), Constraint::Percentage(50)])
                .areas(body_area);

        self.render_title(model, frame, title_area);
        self.render_preview(model, frame, preview_area);
        self.render_analysis(model, frame, analysis_area);
        self.render_cmdline(model, frame, cmd_area);

        if let Some(charts) = model.charts() {
            self.render_charts(charts, frame, body_area);
        }
        if let Some(popup) = model.popup() {
            self.render_popup(popup, frame, body_area);
        }
    }

    fn render_title(&self, model: &Model, frame: &mut Frame, area: Rect) {
        let mut spans = vec![" CSV Data Analyzer ".bold()];
        if let Some(table) = model.table() {
            spans.push(" ".into());
            spans.push(table.path().to_string_lossy().to_string().yellow());
        }
        frame.render_widget(Line::from(spans), area);
    }

    fn pane_block(title: &str, focused: bool) -> Block<'_> {
        let block = Block::bordered().title(Line::from(format!(" {title} ")).bold());
        if focused {
            block.border_set(border::THICK).border_style(Style::default().fg(Color::Cyan))
        } else {
            block
        }
    }

    fn render_preview(&self, model: &Model, frame: &mut Frame, area: Rect) {
        let block = Self::pane_block("Data Preview", model.focus() == Pane::Preview);
        let preview = model.preview();
        if preview.ncols() == 0 {
            let hint = Paragraph::new("No data loaded. Press 'o' to open a CSV file.")
                .wrap(Wrap { trim: true })
                .block(block);
            frame.render_widget(hint, area);
            return;
        }

        let inner_width = area.width.saturating_sub(2) as usize;
        let columns = preview.visible_columns(inner_width);
        let nrows = columns.first().map(|c| c.data.len()).unwrap_or(0);
        let highlight = Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD);

        let header = Row::new(columns.iter().map(|c| Cell::from(c.name.clone())))
            .style(Style::default().add_modifier(Modifier::BOLD | Modifier::UNDERLINED));
        let rows = (0..nrows).map(|r| {
            let row = Row::new(columns.iter().map(|c| Cell::from(c.data[r].clone())));
            if preview.offset_row() + r == preview.selected_row() {
                row.style(highlight)
            } else {
                row
            }
        });
        let widths = columns.iter().map(|c| Constraint::Length(c.width as u16));

        let table = Table::new(rows, widths)
            .header(header)
            .column_spacing(1)
            .block(block.title_bottom(
                Line::from(format!(
                    " {}/{} ",
                    preview.selected_row() + 1,
                    preview.nrows()
                ))
                .right_aligned(),
            ));
        frame.render_widget(table, area);
    }

    fn render_analysis(&self, model: &Model, frame: &mut Frame, area: Rect) {
        let block = Self::pane_block("Analysis Results", model.focus() == Pane::Analysis);
        let paragraph = Paragraph::new(model.analysis())
            .block(block)
            .scroll((model.analysis_scroll() as u16, 0));
        frame.render_widget(paragraph, area);
    }

    fn render_cmdline(&self, model: &Model, frame: &mut Frame, area: Rect) {
        match (model.modus(), model.cmd_mode()) {
            (Modus::CMDINPUT, Some(mode)) => {
                let prompt = mode.prompt();
                let input = model.cmd_input();
                let line = Line::from(vec![prompt.bold(), Span::raw(input.input.clone())]);
                frame.render_widget(line, area);
                let x = area.x + (prompt.chars().count() + input.cursor) as u16;
                frame.set_cursor_position((x.min(area.right().saturating_sub(1)), area.y));
            }
            _ => {
                let hint = match model.modus() {
                    Modus::CHARTS => "←/→ switch tab  Esc close",
                    Modus::POPUP => "Enter/Esc close",
                    _ => "? help  q quit",
                };
                let [msg_area, hint_area] = Layout::horizontal([
                    Constraint::Fill(1),
                    Constraint::Length(hint.chars().count() as u16 + 1),
                ])
                .areas(area);
                frame.render_widget(Line::from(model.status_message()), msg_area);
                frame.render_widget(Line::from(hint).dim().right_aligned(), hint_area);
            }
        }
    }

    // ------------------------------- Charts -------------------------------- //

    fn render_charts(&self, charts: &ChartSet, frame: &mut Frame, area: Rect) {
        frame.render_widget(Clear, area);
        let block = Block::bordered()
            .border_set(border::THICK)
            .title(Line::from(" Data Visualization ").bold().centered());
        let inner = block.inner(area);
        frame.render_widget(block, area);

        let [tabs_area, chart_area] =
            Layout::vertical([Constraint::Length(1), Constraint::Fill(1)]).areas(inner);
        let tabs = Tabs::new(charts.titles())
            .select(charts.selected())
            .highlight_style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD));
        frame.render_widget(tabs, tabs_area);

        if charts.tabs().is_empty() {
            frame.render_widget(
                Paragraph::new("No numeric or text columns to plot.").centered(),
                chart_area,
            );
            return;
        }
        match charts.selected_tab() {
            Some(ChartTab::Distributions(histograms)) => {
                for (histogram, cell) in histograms.iter().zip(Self::grid(chart_area)) {
                    self.render_histogram(histogram, frame, cell);
                }
            }
            Some(ChartTab::Correlation(matrix)) => self.render_heatmap(matrix, frame, chart_area),
            Some(ChartTab::Scatter(plot)) => self.render_scatter(plot, frame, chart_area),
            Some(ChartTab::Categories(categories)) => {
                for (bars, cell) in categories.iter().zip(Self::grid(chart_area)) {
                    self.render_categories(bars, frame, cell);
                }
            }
            None => {}
        }
    }

    /// Four cells, row major.
    fn grid(area: Rect) -> Vec<Rect> {
        let rows: [Rect; 2] =
            Layout::vertical([Constraint::Percentage(50), Constraint::Percentage(50)]).areas(area);
        rows.iter()
            .flat_map(|row| {
                Layout::default()
                    .direction(Direction::Horizontal)
                    .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
                    .split(*row)
                    .to_vec()
            })
            .collect()
    }

    fn render_histogram(&self, histogram: &Histogram, frame: &mut Frame, area: Rect) {
        let title = format!(
            " Distribution of {} (n={}) [{}, {}] ",
            histogram.column,
            histogram.total(),
            short_number(histogram.start),
            short_number(histogram.end())
        );
        let block = Block::bordered().title(title);
        let bins = histogram.counts.len().max(1) as u16;
        let bar_width = (block.inner(area).width / bins).max(1);
        let bars: Vec<Bar> = histogram
            .counts
            .iter()
            .map(|&count| Bar::default().value(count).text_value(String::new()))
            .collect();
        let chart = BarChart::default()
            .block(block)
            .data(BarGroup::default().bars(&bars))
            .bar_width(bar_width)
            .bar_gap(0)
            .bar_style(Style::default().fg(Color::LightBlue));
        frame.render_widget(chart, area);
    }

    fn render_categories(&self, bars: &CategoryBars, frame: &mut Frame, area: Rect) {
        let block = Block::bordered().title(format!(" Top values in {} ", bars.column));
        let data: Vec<Bar> = bars
            .bars
            .iter()
            .map(|(label, count)| {
                Bar::default()
                    .value(*count)
                    .label(Line::from(truncate_label(label, self.label_width)))
            })
            .collect();
        let chart = BarChart::default()
            .block(block)
            .direction(Direction::Horizontal)
            .data(BarGroup::default().bars(&data))
            .bar_width(1)
            .bar_gap(0)
            .bar_style(Style::default().fg(Color::LightCyan))
            .value_style(Style::default().fg(Color::Black).bg(Color::LightCyan));
        frame.render_widget(chart, area);
    }

    fn render_heatmap(&self, matrix: &CorrelationMatrix, frame: &mut Frame, area: Rect) {
        let label_width = matrix
            .names
            .iter()
            .map(|n| n.chars().count())
            .max()
            .unwrap_or(0)
            .min(self.label_width) as u16;

        let header = Row::new(
            std::iter::once(Cell::from(""))
                .chain(matrix.names.iter().map(|n| {
                    Cell::from(truncate_label(n, HEATMAP_CELL_WIDTH as usize))
                })),
        )
        .style(Style::default().add_modifier(Modifier::BOLD));

        let rows = matrix.names.iter().zip(&matrix.values).map(|(name, row)| {
            let cells = row.iter().map(|&value| {
                let text = if value.is_nan() {
                    "NaN".to_string()
                } else {
                    format!("{value:.2}")
                };
                Cell::from(Text::from(text).centered()).style(
                    Style::default()
                        .fg(Color::Black)
                        .bg(correlation_color(value)),
                )
            });
            Row::new(
                std::iter::once(
                    Cell::from(truncate_label(name, label_width as usize)).bold(),
                )
                .chain(cells),
            )
        });

        let widths = std::iter::once(Constraint::Length(label_width))
            .chain((0..matrix.len()).map(|_| Constraint::Length(HEATMAP_CELL_WIDTH)));
        let table = Table::new(rows, widths)
            .header(header)
            .column_spacing(1)
            .block(Block::bordered().title(" Correlation Matrix "));
        frame.render_widget(table, area);
    }

    fn render_scatter(&self, plot: &ScatterPlot, frame: &mut Frame, area: Rect) {
        let ([xl, xh], [yl, yh]) = plot.bounds();
        let dataset = Dataset::default()
            .marker(Marker::Braille)
            .graph_type(GraphType::Scatter)
            .style(Style::default().fg(Color::LightBlue))
            .data(&plot.points);
        let chart = Chart::new(vec![dataset])
            .block(Block::bordered().title(format!(
                " {} vs {} ",
                plot.x_label, plot.y_label
            )))
            .x_axis(
                Axis::default()
                    .title(plot.x_label.clone())
                    .bounds([xl, xh])
                    .labels([short_number(xl), short_number(xh)]),
            )
            .y_axis(
                Axis::default()
                    .title(plot.y_label.clone())
                    .bounds([yl, yh])
                    .labels([short_number(yl), short_number(yh)]),
            );
        frame.render_widget(chart, area);
    }

    // ------------------------------- Popups -------------------------------- //

    fn render_popup(&self, popup: &Popup, frame: &mut Frame, area: Rect) {
        let color = match popup.kind {
            PopupKind::Info => Color::Green,
            PopupKind::Warning => Color::Yellow,
            PopupKind::Error => Color::Red,
            PopupKind::Help => Color::Cyan,
        };
        let lines = popup.message.lines().count() as u16;
        let width = popup
            .message
            .lines()
            .map(|l| l.chars().count())
            .max()
            .unwrap_or(0)
            .max(popup.title.chars().count()) as u16
            + 4;

        let [_, popup_area, _] = Layout::vertical([
            Constraint::Fill(1),
            Constraint::Length(lines + 2),
            Constraint::Fill(1),
        ])
        .areas(area);
        let [_, popup_area, _] = Layout::horizontal([
            Constraint::Fill(1),
            Constraint::Length(width),
            Constraint::Fill(1),
        ])
        .areas(popup_area);

        let block = Block::bordered()
            .border_set(border::ROUNDED)
            .border_style(Style::default().fg(color))
            .title(Line::from(format!(" {} ", popup.title)).bold().centered());
        frame.render_widget(Clear, popup_area);
        frame.render_widget(
            Paragraph::new(popup.message.as_str())
                .wrap(Wrap { trim: false })
                .block(block),
            popup_area,
        );
    }
}

/// Diverging blue-white-red scale over [-1, 1]. NaN is gray.
fn correlation_color(value: f64) -> Color {
    if value.is_nan() {
        return Color::Gray;
    }
    let value = value.clamp(-1.0, 1.0);
    let intensity = (value.abs() * 200.0) as u8;
    if value >= 0.0 {
        Color::Rgb(255, 255 - intensity, 255 - intensity)
    } else {
        Color::Rgb(255 - intensity, 255 - intensity, 255)
    }
}

fn truncate_label(label: &str, width: usize) -> String {
    if label.chars().count() <= width {
        return label.to_string();
    }
    let mut short: String = label.chars().take(width.saturating_sub(1)).collect();
    short.push('…');
    short
}

fn short_number(value: f64) -> String {
    if value.abs() >= 1e5 || (value != 0.0 && value.abs() < 1e-2) {
        format!("{value:.2e}")
    } else {
        format!("{value:.2}")
    }
}
