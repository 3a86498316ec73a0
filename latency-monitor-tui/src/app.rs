use crate::ui;
use crossterm::event::{Event, EventStream, KeyCode, KeyEvent, KeyEventKind};
use futures::StreamExt;
use latency_monitor::{
    Column, ColumnFilter, DataProvider, Debouncer, Monitor, MonitorError, RefreshOutcome,
    Settings, debounce::DEFAULT_FILTER_DEBOUNCE, numeric::parse_number,
};
use ratatui::{Terminal, backend::Backend};
use std::{io, path::PathBuf};
use tokio::{sync::mpsc, time::Instant};
use tracing::{debug, info, warn};

/// Debouncer key shared by every filter edit.
const FILTER_DEBOUNCE_KEY: &str = "filters";

/// Step applied to the refresh interval by `+` / `-`.
const REFRESH_NUDGE_MS: i64 = 500;

const PAGE_ROWS: usize = 20;

/// Deferred work delivered back to the event loop by the debouncer.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum AppMessage {
    ApplyFilters,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Tab {
    Trades,
    Summaries,
    Charts,
}

impl Tab {
    pub const ALL: [Tab; 3] = [Tab::Trades, Tab::Summaries, Tab::Charts];

    pub fn title(&self) -> &'static str {
        match self {
            Tab::Trades => "Trades",
            Tab::Summaries => "Summaries",
            Tab::Charts => "Charts",
        }
    }

    pub fn index(&self) -> usize {
        Tab::ALL.iter().position(|tab| tab == self).unwrap_or_default()
    }

    fn offset(self, delta: isize) -> Self {
        let len = Tab::ALL.len() as isize;
        Tab::ALL[(self.index() as isize + delta).rem_euclid(len) as usize]
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Mode {
    Normal,
    Filter,
    Settings,
}

/// Free-text fields of [`Settings`] editable from the settings panel.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum SettingsField {
    HighlightQty,
    HighlightPnl,
    Bis,
    PnlBinWidth,
    DtBinWidth,
}

impl SettingsField {
    pub const ALL: [SettingsField; 5] = [
        SettingsField::HighlightQty,
        SettingsField::HighlightPnl,
        SettingsField::Bis,
        SettingsField::PnlBinWidth,
        SettingsField::DtBinWidth,
    ];

    /// Key of the field in the settings file.
    pub fn label(&self) -> &'static str {
        match self {
            SettingsField::HighlightQty => "hl_qty",
            SettingsField::HighlightPnl => "hl_pnl",
            SettingsField::Bis => "BIS",
            SettingsField::PnlBinWidth => "bin_width",
            SettingsField::DtBinWidth => "dt_bin",
        }
    }

    pub fn value<'a>(&self, settings: &'a Settings) -> &'a str {
        match self {
            SettingsField::HighlightQty => &settings.hl_qty,
            SettingsField::HighlightPnl => &settings.hl_pnl,
            SettingsField::Bis => &settings.bis,
            SettingsField::PnlBinWidth => &settings.bin_width,
            SettingsField::DtBinWidth => &settings.dt_bin,
        }
    }

    fn slot<'a>(&self, settings: &'a mut Settings) -> &'a mut String {
        match self {
            SettingsField::HighlightQty => &mut settings.hl_qty,
            SettingsField::HighlightPnl => &mut settings.hl_pnl,
            SettingsField::Bis => &mut settings.bis,
            SettingsField::PnlBinWidth => &mut settings.bin_width,
            SettingsField::DtBinWidth => &mut settings.dt_bin,
        }
    }

    /// BIS is an opaque provider token, the others are read as numbers.
    fn is_numeric(&self) -> bool {
        !matches!(self, SettingsField::Bis)
    }
}

/// Position within the settings panel.
#[derive(Debug, Clone, Default)]
pub struct SettingsCursor {
    pub field: usize,
    pub edit: Option<String>,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Bound {
    Min,
    Max,
}

/// In-progress text edit of a numeric filter bound.
#[derive(Debug, Clone, PartialEq)]
pub struct RangeEdit {
    pub bound: Bound,
    pub text: String,
}

/// Position within the filter panel.
#[derive(Debug, Clone, Default)]
pub struct FilterCursor {
    pub column: usize,
    pub value: usize,
    pub edit: Option<RangeEdit>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Status {
    pub text: String,
    pub error: bool,
}

/// Terminal application state. All mutation happens on the event-loop task.
pub struct App {
    pub monitor: Monitor<Box<dyn DataProvider>>,
    pub tab: Tab,
    pub mode: Mode,
    /// Index into [`Column::DISPLAY`] of the column `s` sorts by.
    pub sort_cursor: usize,
    pub scroll: usize,
    pub filter: FilterCursor,
    pub settings: SettingsCursor,
    pub status: Option<Status>,
    settings_path: PathBuf,
    export_path: PathBuf,
    debouncer: Debouncer<AppMessage>,
    should_quit: bool,
}

impl App {
    pub fn new(
        monitor: Monitor<Box<dyn DataProvider>>,
        settings_path: PathBuf,
        export_path: PathBuf,
    ) -> (Self, mpsc::Receiver<AppMessage>) {
        let (debouncer, debounced) = Debouncer::new();
        let app = Self {
            monitor,
            tab: Tab::Trades,
            mode: Mode::Normal,
            sort_cursor: 0,
            scroll: 0,
            filter: FilterCursor::default(),
            settings: SettingsCursor::default(),
            status: None,
            settings_path,
            export_path,
            debouncer,
            should_quit: false,
        };
        (app, debounced)
    }

    /// Drive the application until the user quits or the terminal event stream ends.
    ///
    /// One `select!` loop multiplexes the refresh deadline, debounced messages and terminal
    /// events, so every state change happens on this task.
    pub async fn run<B>(
        mut self,
        terminal: &mut Terminal<B>,
        mut debounced: mpsc::Receiver<AppMessage>,
    ) -> io::Result<()>
    where
        B: Backend,
    {
        let mut events = EventStream::new();
        let mut next_refresh = Instant::now();

        loop {
            terminal.draw(|frame| ui::render(frame, &self))?;
            if self.should_quit {
                info!("quit requested");
                return Ok(());
            }

            tokio::select! {
                _ = tokio::time::sleep_until(next_refresh) => {
                    self.refresh();
                    next_refresh = Instant::now() + self.monitor.refresh_interval();
                }
                Some(message) = debounced.recv() => self.handle_message(message),
                event = events.next() => match event {
                    Some(Ok(event)) => self.handle_event(event),
                    Some(Err(error)) => return Err(error),
                    None => return Ok(()),
                },
            }
        }
    }

    pub fn refresh(&mut self) {
        match self.monitor.refresh() {
            RefreshOutcome::Updated => self.clamp_cursors(),
            RefreshOutcome::Failed => {
                let text = self.monitor.last_error().unwrap_or("refresh failed").to_string();
                self.set_error(text);
            }
            RefreshOutcome::Unchanged | RefreshOutcome::Paused => {}
        }
    }

    pub fn handle_message(&mut self, message: AppMessage) {
        match message {
            AppMessage::ApplyFilters => {
                self.monitor.apply_filters();
                self.clamp_cursors();
                debug!(rows = self.monitor.view().rows.len(), "debounced filters applied");
            }
        }
    }

    pub fn handle_event(&mut self, event: Event) {
        if let Event::Key(key) = event {
            if key.kind == KeyEventKind::Press {
                self.handle_key(key);
            }
        }
    }

    pub fn handle_key(&mut self, key: KeyEvent) {
        self.status = None;
        match self.mode {
            Mode::Normal => self.handle_normal_key(key.code),
            Mode::Filter => self.handle_filter_key(key.code),
            Mode::Settings => self.handle_settings_key(key.code),
        }
    }

    fn handle_normal_key(&mut self, code: KeyCode) {
        match code {
            KeyCode::Char('q') | KeyCode::Esc => self.should_quit = true,
            KeyCode::Char(' ') | KeyCode::Char('p') => {
                let running = self.monitor.toggle_running();
                self.set_info(if running { "resumed" } else { "paused" });
            }
            KeyCode::Char('r') => self.refresh(),
            KeyCode::Char('c') => self.clear_filters(),
            KeyCode::Char('f') => {
                self.mode = Mode::Filter;
                self.tab = Tab::Trades;
            }
            KeyCode::Char('o') => self.mode = Mode::Settings,
            KeyCode::Char('e') => self.export(),
            KeyCode::Char('S') => self.save_settings(),
            KeyCode::Char('L') => self.load_settings(),
            KeyCode::Char('+') => self.nudge_refresh(REFRESH_NUDGE_MS),
            KeyCode::Char('-') => self.nudge_refresh(-REFRESH_NUDGE_MS),
            KeyCode::Char('s') => {
                let column = Column::DISPLAY[self.sort_cursor];
                let direction = self.monitor.sort_by(column);
                self.set_info(format!("sorted by {column} {}", direction.arrow()));
            }
            KeyCode::Left => self.sort_cursor = self.sort_cursor.saturating_sub(1),
            KeyCode::Right => {
                self.sort_cursor = (self.sort_cursor + 1).min(Column::DISPLAY.len() - 1)
            }
            KeyCode::Tab => self.tab = self.tab.offset(1),
            KeyCode::BackTab => self.tab = self.tab.offset(-1),
            KeyCode::Up => self.scroll = self.scroll.saturating_sub(1),
            KeyCode::Down => self.scroll_by(1),
            KeyCode::PageUp => self.scroll = self.scroll.saturating_sub(PAGE_ROWS),
            KeyCode::PageDown => self.scroll_by(PAGE_ROWS),
            KeyCode::Home => self.scroll = 0,
            _ => {}
        }
    }

    fn handle_filter_key(&mut self, code: KeyCode) {
        if self.filter.edit.is_some() {
            self.handle_edit_key(code);
            return;
        }

        match code {
            KeyCode::Esc | KeyCode::Char('f') => self.mode = Mode::Normal,
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Char('c') => self.clear_filters(),
            KeyCode::Up => {
                self.filter.column = self.filter.column.saturating_sub(1);
                self.filter.value = 0;
            }
            KeyCode::Down => {
                let last = self.monitor.filters().columns().count().saturating_sub(1);
                self.filter.column = (self.filter.column + 1).min(last);
                self.filter.value = 0;
            }
            KeyCode::Left => self.filter.value = self.filter.value.saturating_sub(1),
            KeyCode::Right => {
                let last = self.selected_domain_len().saturating_sub(1);
                self.filter.value = (self.filter.value + 1).min(last);
            }
            KeyCode::Char(' ') | KeyCode::Enter => self.toggle_selected_value(),
            KeyCode::Char('[') => self.begin_edit(Bound::Min),
            KeyCode::Char(']') => self.begin_edit(Bound::Max),
            _ => {}
        }
    }

    fn handle_edit_key(&mut self, code: KeyCode) {
        let Some(edit) = self.filter.edit.as_mut() else {
            return;
        };

        match code {
            KeyCode::Esc => self.filter.edit = None,
            KeyCode::Backspace => {
                edit.text.pop();
            }
            KeyCode::Char(c) if c.is_ascii_digit() || matches!(c, '.' | ',' | '-') => {
                edit.text.push(c)
            }
            KeyCode::Enter => self.commit_edit(),
            _ => {}
        }
    }

    fn handle_settings_key(&mut self, code: KeyCode) {
        if let Some(text) = self.settings.edit.as_mut() {
            match code {
                KeyCode::Esc => self.settings.edit = None,
                KeyCode::Backspace => {
                    text.pop();
                }
                KeyCode::Char(c) if !c.is_control() => text.push(c),
                KeyCode::Enter => self.commit_setting(),
                _ => {}
            }
            return;
        }

        match code {
            KeyCode::Esc | KeyCode::Char('o') => self.mode = Mode::Normal,
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Up => self.settings.field = self.settings.field.saturating_sub(1),
            KeyCode::Down => {
                self.settings.field = (self.settings.field + 1).min(SettingsField::ALL.len() - 1)
            }
            KeyCode::Enter => {
                let current = self.selected_setting().value(self.monitor.settings());
                self.settings.edit = Some(current.to_string());
            }
            KeyCode::Char('+') => self.nudge_refresh(REFRESH_NUDGE_MS),
            KeyCode::Char('-') => self.nudge_refresh(-REFRESH_NUDGE_MS),
            _ => {}
        }
    }

    pub fn selected_setting(&self) -> SettingsField {
        SettingsField::ALL[self.settings.field.min(SettingsField::ALL.len() - 1)]
    }

    fn commit_setting(&mut self) {
        let Some(text) = self.settings.edit.take() else {
            return;
        };
        let field = self.selected_setting();
        let text = text.trim().to_string();

        let mut settings = self.monitor.settings().clone();
        *field.slot(&mut settings) = text.clone();
        self.monitor.update_settings(settings);
        self.clamp_cursors();
        info!(field = field.label(), value = %text, "setting updated");

        if field.is_numeric() && !text.is_empty() && parse_number(&text).is_none() {
            self.set_error(format!("{}: '{text}' is not a number, default in use", field.label()));
        } else {
            self.set_info(format!("{} = {text}", field.label()));
        }
    }

    /// Column under the filter cursor together with its filter.
    pub fn selected_filter(&self) -> Option<(Column, &ColumnFilter)> {
        let column = self.monitor.filters().columns().nth(self.filter.column)?;
        self.monitor.filters().get(column).map(|filter| (column, filter))
    }

    fn selected_domain_len(&self) -> usize {
        match self.selected_filter() {
            Some((_, ColumnFilter::Categorical { domain, .. })) => domain.len(),
            _ => 0,
        }
    }

    fn toggle_selected_value(&mut self) {
        let Some((column, ColumnFilter::Categorical { domain, .. })) = self.selected_filter()
        else {
            return;
        };
        let Some(value) = domain.get(self.filter.value).cloned() else {
            return;
        };

        if self.monitor.filters_mut().toggle(column, &value) {
            self.schedule_filters();
        }
    }

    fn begin_edit(&mut self, bound: Bound) {
        let Some((_, ColumnFilter::Range { min, max })) = self.selected_filter() else {
            return;
        };

        let current = match bound {
            Bound::Min => *min,
            Bound::Max => *max,
        };
        self.filter.edit = Some(RangeEdit {
            bound,
            text: current.map(|value| value.to_string()).unwrap_or_default(),
        });
    }

    fn commit_edit(&mut self) {
        let Some(edit) = self.filter.edit.take() else {
            return;
        };
        let (column, min, max) = match self.selected_filter() {
            Some((column, ColumnFilter::Range { min, max })) => (column, *min, *max),
            _ => return,
        };

        // Empty text clears the bound, anything else must parse
        let value = if edit.text.trim().is_empty() {
            None
        } else {
            match parse_number(&edit.text) {
                Some(value) => Some(value),
                None => {
                    self.set_error(format!("'{}' is not a number", edit.text));
                    return;
                }
            }
        };

        let (min, max) = match edit.bound {
            Bound::Min => (value, max),
            Bound::Max => (min, value),
        };
        match self.monitor.filters_mut().set_range(column, min, max) {
            Ok(()) => self.schedule_filters(),
            Err(error) => self.set_error(error.to_string()),
        }
    }

    fn schedule_filters(&mut self) {
        self.debouncer.schedule(
            FILTER_DEBOUNCE_KEY,
            DEFAULT_FILTER_DEBOUNCE,
            AppMessage::ApplyFilters,
        );
    }

    fn clear_filters(&mut self) {
        self.debouncer.cancel(FILTER_DEBOUNCE_KEY);
        self.monitor.clear_filters();
        self.clamp_cursors();
        self.set_info("filters cleared");
    }

    fn export(&mut self) {
        match self.monitor.export_csv(&self.export_path) {
            Ok(rows) => {
                self.set_info(format!("exported {rows} rows to {}", self.export_path.display()))
            }
            Err(error) => self.report(error),
        }
    }

    fn save_settings(&mut self) {
        match self.monitor.save_settings(&self.settings_path) {
            Ok(()) => self.set_info(format!("settings saved to {}", self.settings_path.display())),
            Err(error) => self.report(error),
        }
    }

    fn load_settings(&mut self) {
        match self.monitor.load_settings(&self.settings_path) {
            Ok(()) => {
                self.set_info(format!("settings loaded from {}", self.settings_path.display()))
            }
            Err(error) => self.report(error),
        }
    }

    fn nudge_refresh(&mut self, delta_ms: i64) {
        let mut settings = self.monitor.settings().clone();
        settings.nudge_refresh(delta_ms);
        self.monitor.update_settings(settings);
        self.set_info(format!(
            "refresh every {} ms",
            self.monitor.refresh_interval().as_millis()
        ));
    }

    fn scroll_by(&mut self, rows: usize) {
        let last = self.monitor.view().rows.len().saturating_sub(1);
        self.scroll = (self.scroll + rows).min(last);
    }

    fn clamp_cursors(&mut self) {
        self.scroll = self
            .scroll
            .min(self.monitor.view().rows.len().saturating_sub(1));

        let columns = self.monitor.filters().columns().count();
        self.filter.column = self.filter.column.min(columns.saturating_sub(1));
        self.filter.value = self
            .filter
            .value
            .min(self.selected_domain_len().saturating_sub(1));
    }

    /// Surface an error raised by an explicit user action; anything else is only logged.
    fn report(&mut self, error: MonitorError) {
        warn!(%error, "action failed");
        if error.is_user_facing() {
            self.set_error(error.to_string());
        }
    }

    fn set_info(&mut self, text: impl Into<String>) {
        self.status = Some(Status {
            text: text.into(),
            error: false,
        });
    }

    fn set_error(&mut self, text: impl Into<String>) {
        self.status = Some(Status {
            text: text.into(),
            error: true,
        });
    }

    pub fn settings_path(&self) -> &std::path::Path {
        &self.settings_path
    }

    pub fn is_filter_pending(&self) -> bool {
        self.debouncer.is_pending(FILTER_DEBOUNCE_KEY)
    }
}
