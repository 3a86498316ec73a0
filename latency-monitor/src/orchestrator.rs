//! Refresh orchestration: fetch, filter, aggregate and build series on each tick.
//!
//! [`Monitor`] owns every piece of mutable state (the current snapshot, the filter spec, the
//! filtered view and the derived views) and is driven from a single event loop. Each derived
//! view is recomputed inside its own failure boundary: a failing view logs a warning and keeps
//! its previous value while the others still update.

use crate::{
    aggregation::{
        GroupSummary, OTHER_BUCKET, PnlTotals, VolumeShare, summarize, summarize_volume_share,
    },
    error::MonitorError,
    export,
    filter::{FilterSpec, apply_filters},
    histogram::Histogram,
    provider::DataProvider,
    series::{
        BucketedSeries, CumulativeSeries, DisplayWindow, cumulative_series,
        cumulative_series_by_bucket, pnl_contribution, trade_occurrence,
    },
    settings::{HighlightRule, Settings},
    snapshot::Snapshot,
    sort::{SortDirection, SortState},
    trade::{Column, TradeRecord},
};
use chrono::{Local, NaiveDate, NaiveDateTime};
use std::{path::Path, time::Duration};
use tracing::{debug, info, warn};

/// Static configuration of a [`Monitor`].
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorConfig {
    /// Clock-time band of the time charts.
    pub window: DisplayWindow,
    /// Column whose values split traded volume into buckets.
    pub bucket_column: Column,
    /// The two main bucket values; everything else is [`OTHER_BUCKET`].
    pub volume_buckets: (String, String),
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            window: DisplayWindow::default(),
            bucket_column: Column::Instrument,
            volume_buckets: ("TSLA".to_string(), "NVDA".to_string()),
        }
    }
}

/// Result of a refresh tick.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum RefreshOutcome {
    /// New data was fetched and every view recomputed.
    Updated,
    /// The provider returned the same data as last time, nothing was recomputed.
    Unchanged,
    /// The monitor is frozen, the provider was not polled.
    Paused,
    /// The provider failed, the previous snapshot is retained.
    Failed,
}

/// Grouped summaries over the unfiltered snapshot.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SummaryTables {
    pub by_exchange: Vec<GroupSummary>,
    pub by_instrument: Vec<GroupSummary>,
    pub by_isin: Vec<GroupSummary>,
}

/// Cumulative series over the filtered view.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeries {
    pub pnl: CumulativeSeries,
    pub trades: CumulativeSeries,
    pub volume: BucketedSeries,
}

/// Everything the presentation layer may read after a recomputation.
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorView {
    /// Filtered rows in table order.
    pub rows: Snapshot,
    pub highlight: HighlightRule,
    pub totals: PnlTotals,
    pub summaries: SummaryTables,
    pub volume_share: VolumeShare,
    pub series: TimeSeries,
    pub pnl_histogram: Option<Histogram>,
    pub dt_histogram: Option<Histogram>,
    /// Local time of the last successful snapshot replacement.
    pub updated_at: Option<NaiveDateTime>,
}

impl MonitorView {
    fn empty(settings: &Settings, config: &MonitorConfig, today: NaiveDate) -> Self {
        let empty = Snapshot::default();
        let (a, b) = &config.volume_buckets;
        Self {
            rows: empty.clone(),
            highlight: settings.highlight_rule(),
            totals: PnlTotals::default(),
            summaries: SummaryTables::default(),
            volume_share: VolumeShare {
                buckets: (a.clone(), b.clone()),
                rows: Vec::new(),
            },
            series: TimeSeries {
                pnl: cumulative_series(&empty, pnl_contribution, &config.window, today),
                trades: cumulative_series(&empty, trade_occurrence, &config.window, today),
                volume: cumulative_series_by_bucket(
                    &empty,
                    |_| None,
                    &volume_bucket_labels(config),
                    &config.window,
                    today,
                ),
            },
            pnl_histogram: None,
            dt_histogram: None,
            updated_at: None,
        }
    }

    /// Determine if `record` should be highlighted.
    pub fn is_highlighted(&self, record: &TradeRecord) -> bool {
        self.highlight.matches(record)
    }
}

fn volume_bucket_labels(config: &MonitorConfig) -> Vec<String> {
    let (a, b) = &config.volume_buckets;
    vec![a.clone(), b.clone(), OTHER_BUCKET.to_string()]
}

/// Store `result` in `slot`, or log the failure and keep the previous value.
fn isolate<T>(slot: &mut T, view: &'static str, result: Result<T, MonitorError>) {
    match result {
        Ok(value) => *slot = value,
        Err(error) => warn!(view, %error, "view recompute failed, keeping previous"),
    }
}

/// Owner of the monitor state, driven by one event loop.
#[derive(Debug)]
pub struct Monitor<P> {
    provider: P,
    config: MonitorConfig,
    settings: Settings,
    running: bool,
    snapshot: Snapshot,
    filters: FilterSpec,
    sort: SortState,
    view: MonitorView,
    last_error: Option<String>,
}

impl<P> Monitor<P>
where
    P: DataProvider,
{
    pub fn new(mut provider: P, settings: Settings, config: MonitorConfig) -> Self {
        provider.configure(&settings);
        let view = MonitorView::empty(&settings, &config, Local::now().date_naive());
        info!(provider = %provider.describe(), window = ?config.window, "monitor created");

        Self {
            provider,
            config,
            settings,
            running: true,
            snapshot: Snapshot::default(),
            filters: FilterSpec::default(),
            sort: SortState::default(),
            view,
            last_error: None,
        }
    }

    /// Poll the provider and, if the data changed, recompute every view.
    ///
    /// Provider failures are logged and leave the previous snapshot in place; the next tick
    /// simply tries again.
    pub fn refresh(&mut self) -> RefreshOutcome {
        if !self.running {
            return RefreshOutcome::Paused;
        }

        let snapshot = match self.provider.fetch() {
            Ok(snapshot) => snapshot,
            Err(error) => {
                warn!(
                    %error,
                    provider = %self.provider.describe(),
                    "fetch failed, keeping previous snapshot"
                );
                self.last_error = Some(error.to_string());
                return RefreshOutcome::Failed;
            }
        };
        self.last_error = None;

        if snapshot == self.snapshot && self.view.updated_at.is_some() {
            debug!(rows = snapshot.len(), "snapshot unchanged");
            return RefreshOutcome::Unchanged;
        }

        self.snapshot = snapshot;
        self.view.updated_at = Some(Local::now().naive_local());
        if self.filters.rebuild(&self.snapshot) {
            debug!("filter domains changed");
        }

        self.apply_filters();
        self.recompute_unfiltered();

        debug!(
            rows = self.snapshot.len(),
            filtered = self.view.rows.len(),
            "refresh complete"
        );
        RefreshOutcome::Updated
    }

    /// Re-apply the current filter spec and active sort, then recompute the filtered views.
    pub fn apply_filters(&mut self) {
        let mut rows = apply_filters(&self.snapshot, &self.filters);
        self.sort.apply(&mut rows);
        self.view.rows = rows;
        self.recompute_filtered();
    }

    /// Reset every filter to match-all and recompute.
    pub fn clear_filters(&mut self) {
        self.filters.clear_all();
        self.apply_filters();
        info!("filters cleared");
    }

    pub fn filters(&self) -> &FilterSpec {
        &self.filters
    }

    /// Mutable access to the filter spec. Call [`Monitor::apply_filters`] afterwards, usually
    /// through the debouncer.
    pub fn filters_mut(&mut self) -> &mut FilterSpec {
        &mut self.filters
    }

    /// Toggle the table sort on `column`.
    pub fn sort_by(&mut self, column: Column) -> SortDirection {
        let direction = self.sort.toggle(column);
        self.sort.apply(&mut self.view.rows);
        debug!(%column, ?direction, "table sorted");
        direction
    }

    pub fn sort(&self) -> Option<(Column, SortDirection)> {
        self.sort.active()
    }

    /// Freeze or resume refreshing, returning whether the monitor is now running.
    pub fn toggle_running(&mut self) -> bool {
        self.running = !self.running;
        info!(running = self.running, "{}", if self.running { "resumed" } else { "paused" });
        self.running
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Replace the settings, forwarding them to the provider and recomputing the views they
    /// affect.
    pub fn update_settings(&mut self, settings: Settings) {
        self.provider.configure(&settings);
        self.settings = settings;
        self.recompute_filtered();
    }

    /// Load settings from a user-chosen file.
    pub fn load_settings(&mut self, path: impl AsRef<Path>) -> Result<(), MonitorError> {
        let settings = Settings::load(path)?;
        self.update_settings(settings);
        Ok(())
    }

    /// Save the current settings to a user-chosen file.
    pub fn save_settings(&self, path: impl AsRef<Path>) -> Result<(), MonitorError> {
        self.settings.save(path)
    }

    /// Export the filtered rows, returning the number written.
    pub fn export_csv(&self, path: impl AsRef<Path>) -> Result<usize, MonitorError> {
        export::export_csv(path, &self.view.rows)
    }

    pub fn refresh_interval(&self) -> Duration {
        self.settings.refresh_interval()
    }

    pub fn view(&self) -> &MonitorView {
        &self.view
    }

    /// Unfiltered snapshot of the last successful fetch.
    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Message of the last provider failure, cleared by the next successful fetch.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    fn recompute_unfiltered(&mut self) {
        let snapshot = &self.snapshot;
        let summaries = &mut self.view.summaries;
        isolate(
            &mut summaries.by_exchange,
            "summary:exchange",
            summarize(snapshot, Column::Exchange),
        );
        isolate(
            &mut summaries.by_instrument,
            "summary:instrument",
            summarize(snapshot, Column::Instrument),
        );
        isolate(
            &mut summaries.by_isin,
            "summary:isin",
            summarize(snapshot, Column::Isin),
        );

        let (a, b) = &self.config.volume_buckets;
        isolate(
            &mut self.view.volume_share,
            "volume_share",
            summarize_volume_share(snapshot, self.config.bucket_column, (a, b)),
        );
    }

    fn recompute_filtered(&mut self) {
        let rows = &self.view.rows;
        let today = Local::now().date_naive();
        let window = &self.config.window;

        self.view.highlight = self.settings.highlight_rule();
        self.view.totals = PnlTotals::compute(rows);

        let volume = self.volume_series(rows, today);
        self.view.series.pnl = cumulative_series(rows, pnl_contribution, window, today);
        self.view.series.trades = cumulative_series(rows, trade_occurrence, window, today);
        isolate(&mut self.view.series.volume, "series:volume", volume);

        self.view.pnl_histogram = Histogram::new(
            rows.iter().filter_map(|record| record.pnl),
            self.settings.pnl_bin_width(),
        );
        self.view.dt_histogram = Histogram::new(
            rows.iter().map(|record| record.inter_arrival_secs),
            self.settings.dt_bin_width(),
        );
    }

    fn volume_series(
        &self,
        rows: &Snapshot,
        today: NaiveDate,
    ) -> Result<BucketedSeries, MonitorError> {
        let column = self.config.bucket_column;
        if column.is_numeric() {
            return Err(MonitorError::NotGroupable(column));
        }

        let (a, b) = &self.config.volume_buckets;
        let selector = |record: &TradeRecord| {
            let label = match record.cell(column).as_text() {
                Some(value) if value.eq_ignore_ascii_case(a) => a.clone(),
                Some(value) if value.eq_ignore_ascii_case(b) => b.clone(),
                _ => OTHER_BUCKET.to_string(),
            };
            Some((record.timestamp?, label, record.notional()?))
        };

        Ok(cumulative_series_by_bucket(
            rows,
            selector,
            &volume_bucket_labels(&self.config),
            &self.config.window,
            today,
        ))
    }
}
