use latency_monitor::{
    DataProvider, DisplayWindow,
    provider::{CsvProvider, DEFAULT_SIMULATED_ROWS, SimulatedProvider},
};
use std::path::PathBuf;

/// Where trades come from.
#[derive(Debug, Clone, PartialEq)]
pub enum Source {
    Simulated { rows: usize, seed: Option<u64> },
    Csv(PathBuf),
}

impl Source {
    pub fn into_provider(self) -> Box<dyn DataProvider> {
        match self {
            Source::Simulated { rows, seed } => Box::new(SimulatedProvider::new(rows, seed)),
            Source::Csv(path) => Box::new(CsvProvider::new(path)),
        }
    }
}

/// Process configuration, read once from the environment at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub settings_path: PathBuf,
    pub export_path: PathBuf,
    pub source: Source,
    pub window: DisplayWindow,
    pub buckets: (String, String),
    pub log_file: PathBuf,
    pub log_level: String,
    /// Set when `LAT_MON_WINDOW` was present but invalid.
    pub window_error: Option<String>,
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

impl Config {
    pub fn from_env() -> Self {
        let source = match std::env::var("LAT_MON_SOURCE") {
            Ok(path) if !path.trim().is_empty() && path.trim() != "sim" => {
                Source::Csv(PathBuf::from(path.trim()))
            }
            _ => Source::Simulated {
                rows: std::env::var("LAT_MON_ROWS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(DEFAULT_SIMULATED_ROWS),
                seed: std::env::var("LAT_MON_SEED").ok().and_then(|v| v.parse().ok()),
            },
        };

        let (window, window_error) = match std::env::var("LAT_MON_WINDOW") {
            Ok(text) => match text.parse::<DisplayWindow>() {
                Ok(window) => (window, None),
                Err(error) => (DisplayWindow::default(), Some(error.to_string())),
            },
            Err(_) => (DisplayWindow::default(), None),
        };

        Self {
            settings_path: env_or("LAT_MON_SETTINGS", "settings.json").into(),
            export_path: env_or("LAT_MON_EXPORT", "trades_filtered.csv").into(),
            source,
            window,
            buckets: parse_buckets(&env_or("LAT_MON_BUCKETS", "TSLA,NVDA")),
            log_file: env_or("LAT_MON_LOG_FILE", "latency_monitor.log").into(),
            log_level: env_or("LAT_MON_LOG_LEVEL", "debug"),
            window_error,
        }
    }
}

/// Split `A,B` into the two main volume buckets, falling back to `TSLA,NVDA`.
fn parse_buckets(text: &str) -> (String, String) {
    let parts: Vec<&str> = text
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect();

    match parts.as_slice() {
        [a, b] => (a.to_string(), b.to_string()),
        _ => ("TSLA".to_string(), "NVDA".to_string()),
    }
}
