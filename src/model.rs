use std::path::{Path, PathBuf};

use arboard::Clipboard;
use ratatui::crossterm::event::KeyEvent;
use tracing::{error, info, trace, warn};
use tracing_error::SpanTrace;

use crate::charts::ChartSet;
use crate::domain::{AnalyzerConfig, AnalyzerError, CMDMode, HELP_TEXT, Message};
use crate::inputter::{InputResult, Inputter};
use crate::preview::Preview;
use crate::report::{default_report_path, export_report, with_default_extension};
use crate::stats::StatisticsReport;
use crate::table::Table;
use crate::ui::{BORDER_HEIGHT, CMDLINE_HEIGH, TABLE_HEADER_HEIGHT, TITLE_HEIGHT};

#[derive(Debug, PartialEq)]
pub enum Status {
    EMPTY,
    READY,
    QUITTING,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Modus {
    BROWSE,
    CHARTS,
    POPUP,
    CMDINPUT,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Pane {
    Preview,
    Analysis,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PopupKind {
    Info,
    Warning,
    Error,
    Help,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Popup {
    pub kind: PopupKind,
    pub title: String,
    pub message: String,
}

#[derive(Default, Clone, Debug)]
pub struct UILayout {
    pub width: usize,
    pub height: usize,
    pub preview_height: usize,
    pub analysis_height: usize,
}

impl UILayout {
    pub fn from_values(ui_width: usize, ui_height: usize) -> Self {
        let body_height = ui_height.saturating_sub(TITLE_HEIGHT + CMDLINE_HEIGH);
        let layout = UILayout {
            width: ui_width,
            height: ui_height,
            preview_height: body_height.saturating_sub(BORDER_HEIGHT + TABLE_HEADER_HEIGHT),
            analysis_height: body_height.saturating_sub(BORDER_HEIGHT),
        };
        trace!("Build UILayout: {:?}", layout);
        layout
    }
}

/// Application state. Holds the single current table and everything derived from it.
pub struct Model {
    config: AnalyzerConfig,
    pub status: Status,
    modus: Modus,
    previous_modus: Modus,
    focus: Pane,
    table: Option<Table>,
    preview: Preview,
    analysis: String,
    analysis_scroll: usize,
    charts: Option<ChartSet>,
    popup: Option<Popup>,
    uilayout: UILayout,
    input: Inputter,
    last_input: InputResult,
    cmd_mode: Option<CMDMode>,
    status_message: String,
    clipboard: Option<Clipboard>,
}

impl Model {
    pub fn init(config: &AnalyzerConfig, ui_width: usize, ui_height: usize) -> Self {
        let uilayout = UILayout::from_values(ui_width, ui_height);
        let mut preview = Preview::empty();
        preview.set_height(uilayout.preview_height);
        Self {
            config: config.clone(),
            status: Status::EMPTY,
            modus: Modus::BROWSE,
            previous_modus: Modus::BROWSE,
            focus: Pane::Preview,
            table: None,
            preview,
            analysis: String::new(),
            analysis_scroll: 0,
            charts: None,
            popup: None,
            uilayout,
            input: Inputter::default(),
            last_input: InputResult::default(),
            cmd_mode: None,
            status_message: "Ready - Load a CSV file to begin".to_string(),
            clipboard: None,
        }
    }

    // ------------------------------ Accessors ------------------------------- //

    pub fn table(&self) -> Option<&Table> {
        self.table.as_ref()
    }

    pub fn preview(&self) -> &Preview {
        &self.preview
    }

    pub fn analysis(&self) -> &str {
        &self.analysis
    }

    pub fn analysis_scroll(&self) -> usize {
        self.analysis_scroll
    }

    pub fn charts(&self) -> Option<&ChartSet> {
        self.charts.as_ref()
    }

    pub fn popup(&self) -> Option<&Popup> {
        self.popup.as_ref()
    }

    pub fn focus(&self) -> Pane {
        self.focus
    }

    pub fn modus(&self) -> Modus {
        self.modus
    }

    pub fn status_message(&self) -> &str {
        &self.status_message
    }

    pub fn cmd_mode(&self) -> Option<CMDMode> {
        self.cmd_mode
    }

    pub fn cmd_input(&self) -> &InputResult {
        &self.last_input
    }

    /// While the command line is active every key goes to the line editor.
    pub fn raw_keyevents(&self) -> bool {
        self.modus == Modus::CMDINPUT
    }

    pub fn quit(&mut self) {
        self.status = Status::QUITTING;
    }

    // ------------------------------- Actions -------------------------------- //

    /// Loads `path` and replaces the current table. On failure the current table stays.
    pub fn open(&mut self, path: &Path) {
        match Table::load(path) {
            Ok(table) => {
                self.status_message = format!(
                    "Loaded: {} - {} rows, {} columns",
                    table.name(),
                    table.nrows(),
                    table.ncols()
                );
                info!("{}", self.status_message);
                self.preview = Preview::from_table(
                    &table,
                    self.config.preview_rows,
                    self.config.max_column_width,
                );
                self.preview.set_height(self.uilayout.preview_height);
                self.analysis.clear();
                self.analysis_scroll = 0;
                self.table = Some(table);
                self.status = Status::READY;
            }
            Err(e) => {
                error!(
                    "Loading {} failed: {e:?}\n{}",
                    path.display(),
                    SpanTrace::capture()
                );
                self.show_popup(
                    PopupKind::Error,
                    "Error",
                    format!("Failed to load file: {e}"),
                );
            }
        }
    }

    pub fn show_statistics(&mut self) {
        match self.current_table() {
            Ok(table) => {
                let text = StatisticsReport::compute(table).render();
                self.analysis = text;
                self.analysis_scroll = 0;
                self.focus = Pane::Analysis;
            }
            Err(e) => self.warn_missing_table(e),
        }
    }

    pub fn create_visualization(&mut self) {
        match self.current_table() {
            Ok(table) => {
                let charts = ChartSet::build(table);
                self.charts = Some(charts);
                self.previous_modus = self.modus;
                self.modus = Modus::CHARTS;
            }
            Err(e) => self.warn_missing_table(e),
        }
    }

    /// Writes the report for the current table to `path` (gets `.txt` if extensionless).
    pub fn export(&mut self, path: &Path) {
        let path = with_default_extension(path.to_path_buf());
        let result = self
            .current_table()
            .and_then(|table| export_report(table, &path));
        match result {
            Ok(()) => self.show_popup(
                PopupKind::Info,
                "Success",
                format!("Report exported to {}", path.display()),
            ),
            Err(AnalyzerError::NoTableLoaded) => {
                self.warn_missing_table(AnalyzerError::NoTableLoaded)
            }
            Err(e) => {
                error!("Export to {} failed: {e:?}", path.display());
                self.show_popup(
                    PopupKind::Error,
                    "Error",
                    format!("Failed to export report: {e}"),
                );
            }
        }
    }

    fn current_table(&self) -> Result<&Table, AnalyzerError> {
        self.table.as_ref().ok_or(AnalyzerError::NoTableLoaded)
    }

    fn warn_missing_table(&mut self, e: AnalyzerError) {
        warn!("Action without table: {e}");
        self.show_popup(PopupKind::Warning, "Warning", e.to_string());
    }

    fn show_popup(&mut self, kind: PopupKind, title: &str, message: String) {
        if self.modus != Modus::POPUP {
            self.previous_modus = self.modus;
        }
        self.modus = Modus::POPUP;
        self.popup = Some(Popup {
            kind,
            title: title.to_string(),
            message,
        });
    }

    fn show_help(&mut self) {
        self.show_popup(PopupKind::Help, "Help", HELP_TEXT.to_string());
    }

    // ----------------------------- Dispatching ------------------------------ //

    pub fn update(&mut self, message: Option<Message>) {
        let Some(msg) = message else {
            return;
        };
        trace!("Update: Modus {:?}, Message {:?}", self.modus, msg);

        if let Message::Resize(width, height) = msg {
            self.ui_resize(width, height);
            return;
        }

        match self.modus {
            Modus::BROWSE => match msg {
                Message::Quit => self.quit(),
                Message::OpenFile => self.enter_cmd_mode(CMDMode::OpenFile),
                Message::ShowStatistics => self.show_statistics(),
                Message::Visualize => self.create_visualization(),
                Message::ExportReport => {
                    if self.table.is_some() {
                        self.enter_cmd_mode(CMDMode::ExportReport)
                    } else {
                        self.warn_missing_table(AnalyzerError::NoTableLoaded)
                    }
                }
                Message::SwitchFocus => {
                    self.focus = match self.focus {
                        Pane::Preview => Pane::Analysis,
                        Pane::Analysis => Pane::Preview,
                    }
                }
                Message::MoveUp => self.move_up(1),
                Message::MoveDown => self.move_down(1),
                Message::MovePageUp => self.move_up(self.page()),
                Message::MovePageDown => self.move_down(self.page()),
                Message::MoveBeginning => self.move_beginning(),
                Message::MoveEnd => self.move_end(),
                Message::MoveLeft => self.preview.move_left(),
                Message::MoveRight => self.preview.move_right(),
                Message::CopyCell => self.copy_cell(),
                Message::CopyStatistics => self.copy_statistics(),
                Message::Help => self.show_help(),
                _ => (),
            },
            Modus::CHARTS => match msg {
                Message::Quit => self.quit(),
                Message::MoveRight | Message::SwitchFocus => {
                    if let Some(charts) = self.charts.as_mut() {
                        charts.next_tab();
                    }
                }
                Message::MoveLeft => {
                    if let Some(charts) = self.charts.as_mut() {
                        charts.previous_tab();
                    }
                }
                Message::Help => self.show_help(),
                Message::Exit => self.close_charts(),
                _ => (),
            },
            Modus::POPUP => match msg {
                Message::Quit => self.quit(),
                Message::Exit | Message::Enter => self.close_popup(),
                _ => (),
            },
            Modus::CMDINPUT => {
                if let Message::RawKey(key) = msg {
                    self.raw_input(key)
                }
            }
        }
    }

    fn close_charts(&mut self) {
        trace!("Close visualization ...");
        self.charts = None;
        self.modus = Modus::BROWSE;
    }

    fn close_popup(&mut self) {
        trace!("Close popup ...");
        self.popup = None;
        self.modus = self.previous_modus;
        self.previous_modus = Modus::POPUP;
    }

    fn ui_resize(&mut self, width: usize, height: usize) {
        trace!(
            "UI was resized! w:{}->{}, h:{}->{}",
            self.uilayout.width, width, self.uilayout.height, height
        );
        self.uilayout = UILayout::from_values(width, height);
        self.preview.set_height(self.uilayout.preview_height);
    }

    fn page(&self) -> usize {
        match self.focus {
            Pane::Preview => self.preview.page(),
            Pane::Analysis => self.uilayout.analysis_height.max(1),
        }
    }

    fn move_up(&mut self, size: usize) {
        match self.focus {
            Pane::Preview => self.preview.move_up(size),
            Pane::Analysis => self.analysis_scroll = self.analysis_scroll.saturating_sub(size),
        }
    }

    fn move_down(&mut self, size: usize) {
        match self.focus {
            Pane::Preview => self.preview.move_down(size),
            Pane::Analysis => {
                let last_line = self.analysis.lines().count().saturating_sub(1);
                self.analysis_scroll = self.analysis_scroll.saturating_add(size).min(last_line);
            }
        }
    }

    fn move_beginning(&mut self) {
        match self.focus {
            Pane::Preview => self.preview.move_beginning(),
            Pane::Analysis => self.analysis_scroll = 0,
        }
    }

    fn move_end(&mut self) {
        match self.focus {
            Pane::Preview => self.preview.move_end(),
            Pane::Analysis => self.move_down(usize::MAX),
        }
    }

    // ------------------------------ Command line ------------------------------ //

    fn enter_cmd_mode(&mut self, mode: CMDMode) {
        trace!("Entering command mode {mode:?} ...");
        self.previous_modus = self.modus;
        self.modus = Modus::CMDINPUT;
        self.cmd_mode = Some(mode);

        self.input.clear();
        if mode == CMDMode::ExportReport
            && let Some(table) = self.table.as_ref()
        {
            self.input
                .set(&default_report_path(table).to_string_lossy());
        }
        self.last_input = self.input.get();
    }

    fn raw_input(&mut self, key: KeyEvent) {
        self.last_input = self.input.read(key);
        if self.last_input.finished {
            self.handle_cmd_input();
        }
    }

    fn handle_cmd_input(&mut self) {
        trace!("Handle cmd input {}", self.last_input.input);
        self.modus = self.previous_modus;
        self.previous_modus = Modus::CMDINPUT;
        let mode = self.cmd_mode.take();

        let raw = self.last_input.input.trim().to_string();
        if self.last_input.canceled || raw.is_empty() {
            return;
        }
        let path = match shellexpand::full(&raw) {
            Ok(expanded) => PathBuf::from(expanded.as_ref()),
            Err(e) => {
                self.show_popup(PopupKind::Error, "Error", format!("Invalid path: {e}"));
                return;
            }
        };

        match mode {
            Some(CMDMode::OpenFile) => self.open(&path),
            Some(CMDMode::ExportReport) => self.export(&path),
            None => info!("Cmd mode is none!"),
        }
    }

    // ------------------------------- Clipboard -------------------------------- //

    fn copy_cell(&mut self) {
        let Some(cell) = self.preview.selected_cell().map(str::to_string) else {
            return;
        };
        self.copy_to_clipboard(cell, "Copied cell to clipboard.");
    }

    fn copy_statistics(&mut self) {
        if self.analysis.is_empty() {
            self.status_message = "No statistics to copy, press 's' first.".to_string();
            return;
        }
        let text = self.analysis.clone();
        self.copy_to_clipboard(text, "Copied statistics to clipboard.");
    }

    fn copy_to_clipboard(&mut self, text: String, done: &str) {
        let result = self.clipboard().and_then(|clipboard| {
            clipboard
                .set_text(text)
                .map_err(|e| AnalyzerError::Clipboard(e.to_string()))
        });
        match result {
            Ok(()) => self.status_message = done.to_string(),
            Err(e) => {
                trace!("Error copying to clipboard: {e:?}");
                self.status_message = e.to_string();
            }
        }
    }

    fn clipboard(&mut self) -> Result<&mut Clipboard, AnalyzerError> {
        if self.clipboard.is_none() {
            let clipboard =
                Clipboard::new().map_err(|e| AnalyzerError::Clipboard(e.to_string()))?;
            self.clipboard = Some(clipboard);
        }
        self.clipboard
            .as_mut()
            .ok_or_else(|| AnalyzerError::Clipboard("not initialized".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PREVIEW_ROW_LIMIT;
    use crate::stats::{SECTION_CORRELATION, SECTION_NUMERIC};
    use crate::table::tests::fixture;
    use ratatui::crossterm::event::{KeyCode, KeyModifiers};

    fn model() -> Model {
        Model::init(&AnalyzerConfig::default(), 120, 40)
    }

    fn loaded(name: &str) -> Model {
        let mut model = model();
        model.open(&fixture(name));
        assert_eq!(model.status, Status::READY);
        model
    }

    fn type_line(model: &mut Model, text: &str) {
        for c in text.chars() {
            model.update(Some(Message::RawKey(KeyEvent::new(
                KeyCode::Char(c),
                KeyModifiers::NONE,
            ))));
        }
        model.update(Some(Message::RawKey(KeyEvent::new(
            KeyCode::Enter,
            KeyModifiers::NONE,
        ))));
    }

    #[test]
    fn open_sets_table_and_preview() {
        let model = loaded("wide.csv");
        let table = model.table().unwrap();
        assert_eq!(table.nrows(), 150);
        assert_eq!(table.ncols(), 10);
        assert_eq!(model.preview().nrows(), PREVIEW_ROW_LIMIT);
        assert_eq!(
            model.status_message(),
            "Loaded: wide.csv - 150 rows, 10 columns"
        );
    }

    #[test]
    fn failed_open_keeps_previous_table() {
        let mut model = loaded("example.csv");
        model.open(&fixture("nope.csv"));

        assert_eq!(model.table().unwrap().name(), "example.csv");
        assert_eq!(model.preview().nrows(), 5);
        let popup = model.popup().unwrap();
        assert_eq!(popup.kind, PopupKind::Error);
        assert!(popup.message.starts_with("Failed to load file:"));
        assert_eq!(model.modus(), Modus::POPUP);
    }

    #[test]
    fn actions_without_table_only_warn() {
        for msg in [Message::ShowStatistics, Message::Visualize, Message::ExportReport] {
            let mut model = model();
            model.update(Some(msg));
            let popup = model.popup().expect("warning popup");
            assert_eq!(popup.kind, PopupKind::Warning);
            assert_eq!(popup.message, "Please load a CSV file first");
            assert!(model.analysis().is_empty());
            assert!(model.charts().is_none());
            assert_ne!(model.modus(), Modus::CMDINPUT);
        }
    }

    #[test]
    fn export_without_table_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("report.txt");
        let mut model = model();
        model.export(&target);
        assert!(!target.exists());
        assert_eq!(model.popup().unwrap().kind, PopupKind::Warning);
    }

    #[test]
    fn statistics_fill_analysis_pane() {
        let mut model = loaded("one_numeric.csv");
        model.update(Some(Message::ShowStatistics));
        assert!(model.analysis().contains(SECTION_NUMERIC));
        assert!(!model.analysis().contains(SECTION_CORRELATION));
        assert_eq!(model.focus(), Pane::Analysis);

        model.update(Some(Message::MoveDown));
        assert_eq!(model.analysis_scroll(), 1);
        model.update(Some(Message::MoveBeginning));
        assert_eq!(model.analysis_scroll(), 0);
    }

    #[test]
    fn visualization_opens_and_closes() {
        let mut model = loaded("numbers.csv");
        model.update(Some(Message::Visualize));
        assert_eq!(model.modus(), Modus::CHARTS);
        model.update(Some(Message::MoveRight));
        assert_eq!(model.charts().unwrap().selected(), 1);
        model.update(Some(Message::Exit));
        assert_eq!(model.modus(), Modus::BROWSE);
        assert!(model.charts().is_none());
    }

    #[test]
    fn open_through_command_line() {
        let mut model = model();
        model.update(Some(Message::OpenFile));
        assert!(model.raw_keyevents());
        type_line(&mut model, &fixture("example.csv").to_string_lossy());
        assert_eq!(model.modus(), Modus::BROWSE);
        assert_eq!(model.table().unwrap().nrows(), 5);
    }

    #[test]
    fn export_through_command_line() {
        let dir = tempfile::tempdir().unwrap();
        let mut model = loaded("example.csv");
        model.update(Some(Message::ExportReport));
        assert_eq!(model.cmd_mode(), Some(CMDMode::ExportReport));
        assert!(model.cmd_input().input.ends_with("example_report.txt"));

        // replace the suggestion with a path without extension
        model.update(Some(Message::RawKey(KeyEvent::new(
            KeyCode::Char('u'),
            KeyModifiers::CONTROL,
        ))));
        type_line(&mut model, &dir.path().join("summary").to_string_lossy());

        let written = dir.path().join("summary.txt");
        assert!(written.exists());
        let popup = model.popup().unwrap();
        assert_eq!(popup.kind, PopupKind::Info);
        assert_eq!(popup.message, format!("Report exported to {}", written.display()));

        model.update(Some(Message::Exit));
        assert!(model.popup().is_none());
        assert_eq!(model.modus(), Modus::BROWSE);
    }

    #[test]
    fn canceled_command_line_does_nothing() {
        let mut model = model();
        model.update(Some(Message::OpenFile));
        model.update(Some(Message::RawKey(KeyEvent::new(
            KeyCode::Esc,
            KeyModifiers::NONE,
        ))));
        assert_eq!(model.modus(), Modus::BROWSE);
        assert!(model.popup().is_none());
        assert!(model.table().is_none());
    }

    #[test]
    fn quit_from_any_mode() {
        let mut model = loaded("numbers.csv");
        model.update(Some(Message::Visualize));
        model.update(Some(Message::Quit));
        assert_eq!(model.status, Status::QUITTING);
    }
}
