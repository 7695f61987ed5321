use std::fmt;
use std::io::Error;

use derive_setters::Setters;
use polars::error::PolarsError;
use ratatui::crossterm::event::KeyEvent;

/// Maximum number of table rows projected into the preview grid.
pub const PREVIEW_ROW_LIMIT: usize = 100;

pub const HELP_TEXT: &str = "\
o          Open a CSV file
s          Show statistics
v          Create visualization
e          Export report
Tab        Switch between preview and analysis
↑ ↓ PgUp PgDn Home End   Move / scroll
← →        Scroll preview columns
c          Copy selected preview cell
y          Copy statistics to clipboard
?          Show this help
Esc        Close popup / visualization
q          Quit";

#[derive(Debug, Clone, Setters)]
#[setters(prefix = "with_")]
pub struct AnalyzerConfig {
    pub event_poll_time: u64,
    pub max_column_width: usize,
    pub preview_rows: usize,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            event_poll_time: 100,
            max_column_width: 30,
            preview_rows: PREVIEW_ROW_LIMIT,
        }
    }
}

#[derive(Debug)]
pub enum AnalyzerError {
    IoError(Error),
    PolarsError(PolarsError),
    LoadingFailed(String),
    FileNotFound,
    PermissionDenied,
    NoTableLoaded,
    ExportFailed(Error),
    Clipboard(String),
}

impl fmt::Display for AnalyzerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnalyzerError::IoError(e) => write!(f, "{e}"),
            AnalyzerError::PolarsError(e) => write!(f, "{e}"),
            AnalyzerError::LoadingFailed(msg) => write!(f, "{msg}"),
            AnalyzerError::FileNotFound => write!(f, "File not found"),
            AnalyzerError::PermissionDenied => write!(f, "Permission denied"),
            AnalyzerError::NoTableLoaded => write!(f, "Please load a CSV file first"),
            AnalyzerError::ExportFailed(e) => write!(f, "{e}"),
            AnalyzerError::Clipboard(msg) => write!(f, "Clipboard unavailable: {msg}"),
        }
    }
}

impl std::error::Error for AnalyzerError {}

impl From<Error> for AnalyzerError {
    fn from(err: Error) -> Self {
        AnalyzerError::IoError(err)
    }
}

impl From<PolarsError> for AnalyzerError {
    fn from(err: PolarsError) -> Self {
        AnalyzerError::PolarsError(err)
    }
}

/// What the command line is currently asking for.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CMDMode {
    OpenFile,
    ExportReport,
}

impl CMDMode {
    pub fn prompt(&self) -> &'static str {
        match self {
            CMDMode::OpenFile => "Open CSV: ",
            CMDMode::ExportReport => "Save report as: ",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Quit,
    MoveUp,
    MoveDown,
    MoveLeft,
    MoveRight,
    MovePageUp,
    MovePageDown,
    MoveBeginning,
    MoveEnd,
    SwitchFocus,
    OpenFile,
    ShowStatistics,
    Visualize,
    ExportReport,
    CopyCell,
    CopyStatistics,
    Help,
    Enter,
    Exit,
    Resize(usize, usize),
    RawKey(KeyEvent),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::ErrorKind;

    #[test]
    fn config_setters_chain() {
        let cfg = AnalyzerConfig::default()
            .with_event_poll_time(20)
            .with_max_column_width(12);
        assert_eq!(cfg.event_poll_time, 20);
        assert_eq!(cfg.max_column_width, 12);
        assert_eq!(cfg.preview_rows, PREVIEW_ROW_LIMIT);
    }

    #[test]
    fn io_errors_convert() {
        let err: AnalyzerError = Error::new(ErrorKind::Other, "disk on fire").into();
        assert!(matches!(err, AnalyzerError::IoError(_)));
        assert_eq!(err.to_string(), "disk on fire");
    }

    #[test]
    fn missing_table_message() {
        assert_eq!(
            AnalyzerError::NoTableLoaded.to_string(),
            "Please load a CSV file first"
        );
    }
}
