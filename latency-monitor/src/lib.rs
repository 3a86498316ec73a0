//! Latency Monitor - core engine
//!
//! Everything behind the terminal monitor that does not draw:
//! - numeric coercion and display formatting of loosely-typed cells
//! - per-column filters and grouped PnL / volume aggregations
//! - cumulative 1-second step series within a clock-time display window
//! - data providers, JSON settings and CSV export
//! - the refresh orchestrator that ties them together behind a single event loop, and a keyed
//!   debouncer for bursty user input
pub mod aggregation;
pub mod debounce;
pub mod error;
pub mod export;
pub mod filter;
pub mod histogram;
pub mod numeric;
pub mod orchestrator;
pub mod provider;
pub mod series;
pub mod settings;
pub mod snapshot;
pub mod sort;
pub mod trade;

// Re-export commonly used types for convenience
pub use error::MonitorError;
pub use snapshot::Snapshot;
pub use trade::{Column, Side, TradeRecord};

pub use filter::{ColumnFilter, FilterSpec, MATCH_ALL, apply_filters};
pub use sort::{SortDirection, SortState};

pub use aggregation::{GroupSummary, PnlTotals, VolumeShare, VolumeShareRow};
pub use histogram::Histogram;
pub use series::{BucketedSeries, CumulativeSeries, DisplayWindow};

pub use debounce::Debouncer;
pub use provider::{CsvProvider, DataProvider, SimulatedProvider};
pub use settings::{HighlightRule, Settings};

// Refresh orchestrator (shared state behind the TUI)
pub use orchestrator::{Monitor, MonitorConfig, MonitorView, RefreshOutcome};
