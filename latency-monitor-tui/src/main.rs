/// Latency Monitor - terminal front-end
///
/// Polls a data provider on a timer and shows:
/// - the filtered, sortable trade table with row highlighting
/// - grouped PnL summaries and counterparty volume share
/// - cumulative PnL / trade / volume step charts and distribution histograms
///
/// Configuration is read from `LAT_MON_*` environment variables; logs go to a file because the
/// terminal belongs to the UI.
mod app;
mod config;
mod ui;

use crate::{app::App, config::Config};
use crossterm::{
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use latency_monitor::{Monitor, MonitorConfig, Settings};
use ratatui::{Terminal, backend::CrosstermBackend};
use std::{error::Error, fs::File, io, sync::Arc};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Initialize logging to the configured file.
///
/// The subscriber is installed as the default for the lifetime of the returned guard only.
fn init_logging(config: &Config) -> io::Result<tracing::subscriber::DefaultGuard> {
    let file = File::create(&config.log_file)?;
    let filter = EnvFilter::try_new(&config.log_level)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("debug"));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Arc::new(file))
        .with_ansi(false)
        .finish();

    Ok(tracing::subscriber::set_default(subscriber))
}

fn restore_terminal() -> io::Result<()> {
    disable_raw_mode()?;
    execute!(io::stdout(), LeaveAlternateScreen)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn Error>> {
    let config = Config::from_env();
    let _logging = init_logging(&config)?;

    if let Some(error) = &config.window_error {
        warn!(%error, "invalid LAT_MON_WINDOW, using default display window");
    }

    let settings = Settings::load_or_default(&config.settings_path);
    let monitor = Monitor::new(
        config.source.clone().into_provider(),
        settings,
        MonitorConfig {
            window: config.window,
            volume_buckets: config.buckets.clone(),
            ..MonitorConfig::default()
        },
    );
    let (app, debounced) = App::new(
        monitor,
        config.settings_path.clone(),
        config.export_path.clone(),
    );

    // Setup panic hook to restore terminal on crash
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let _ = restore_terminal();
        original_hook(panic_info);
    }));

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    info!(?config, "latency monitor started");
    let result = app.run(&mut terminal, debounced).await;

    restore_terminal()?;
    terminal.show_cursor()?;

    match &result {
        Ok(()) => info!("latency monitor stopped"),
        Err(error) => warn!(%error, "latency monitor stopped on terminal error"),
    }
    result.map_err(Into::into)
}
