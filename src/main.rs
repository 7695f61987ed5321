use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Mutex;

use clap::Parser;
use tracing::{error, info};
use tracing_error::ErrorLayer;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod charts;
mod controller;
mod domain;
mod inputter;
mod model;
mod preview;
mod report;
mod stats;
mod table;
mod ui;

use controller::Controller;
use domain::{AnalyzerConfig, AnalyzerError};
use model::{Model, Status};
use ui::AnalyzerUI;

/// A tui based CSV data analyzer.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// CSV file to open on start
    path: Option<PathBuf>,

    /// Event poll interval in milliseconds
    #[arg(long, default_value_t = 100)]
    poll_ms: u64,

    /// Maximum width of a preview column
    #[arg(long, default_value_t = 30)]
    max_column_width: usize,

    /// Write logs to this file (filter with CSVA_LOG)
    #[arg(long)]
    log_file: Option<PathBuf>,
}

fn init_logging(path: &Path) -> Result<(), AnalyzerError> {
    let file = File::create(path)?;
    let filter = EnvFilter::try_from_env("CSVA_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(Mutex::new(file))
                .with_ansi(false),
        )
        .with(ErrorLayer::default())
        .init();
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();

    if let Some(log_file) = &args.log_file
        && let Err(e) = init_logging(log_file)
    {
        eprintln!("Error: could not open log file {}: {e}", log_file.display());
        return ExitCode::FAILURE;
    }

    let cfg = AnalyzerConfig::default()
        .with_event_poll_time(args.poll_ms)
        .with_max_column_width(args.max_column_width);

    let mut terminal = ratatui::init();
    let result = run(&cfg, args.path, &mut terminal);
    ratatui::restore();

    match result {
        Err(e) => {
            error!("Terminated with error: {e:?}");
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
        Ok(_) => ExitCode::SUCCESS,
    }
}

fn run(
    cfg: &AnalyzerConfig,
    path: Option<PathBuf>,
    terminal: &mut ratatui::DefaultTerminal,
) -> Result<(), AnalyzerError> {
    info!("Starting csva");

    let size = terminal.size()?;
    let mut model = Model::init(cfg, size.width as usize, size.height as usize);
    if let Some(path) = path {
        model.open(&path);
    }

    let mut ui = AnalyzerUI::new(cfg);
    let controller = Controller::new(cfg);

    while model.status != Status::QUITTING {
        // Render the current view
        terminal.draw(|f| ui.draw(&model, f))?;

        // Handle events and map to a Message
        let message = controller.handle_event(&model)?;
        model.update(message);
    }

    info!("Quitting csva");
    Ok(())
}
