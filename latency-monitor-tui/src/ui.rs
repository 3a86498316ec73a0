use crate::app::{App, Bound, Mode, SettingsField, Tab};
use chrono::NaiveDateTime;
use latency_monitor::{
    Column, ColumnFilter, DataProvider, GroupSummary, Histogram, MATCH_ALL, MonitorView,
    TradeRecord, VolumeShare,
    numeric::{ColumnKind, format_value},
};
use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    symbols,
    text::{Line, Span},
    widgets::{
        Axis, BarChart, Block, Borders, Cell, Chart, Dataset, GraphType, Paragraph, Row, Table,
        Tabs, Wrap,
    },
};

// ============================================================================
// COLORS
// ============================================================================
const C_POS: Color = Color::Rgb(100, 220, 100); // Green
const C_NEG: Color = Color::Rgb(220, 100, 100); // Red
const C_WARN: Color = Color::Rgb(180, 180, 100); // Yellow
const C_DIM: Color = Color::Rgb(120, 120, 120); // Gray
const C_BRIGHT: Color = Color::Rgb(220, 220, 220); // White
const C_ACCENT: Color = Color::Rgb(100, 180, 220); // Cyan
const C_HEADER: Color = Color::Rgb(180, 130, 220); // Purple
const C_HIGHLIGHT_BG: Color = Color::Rgb(60, 60, 20);

/// Line colours of the volume buckets, in bucket order.
const BUCKET_COLORS: [Color; 3] = [C_ACCENT, C_HEADER, C_DIM];

const FILTER_PANEL_WIDTH: u16 = 38;
const SETTINGS_PANEL_WIDTH: u16 = 34;

pub fn render(f: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header
            Constraint::Length(3), // KPIs
            Constraint::Min(10),   // Body
            Constraint::Length(1), // Footer
        ])
        .split(f.area());

    render_header(f, chunks[0], app);
    render_kpis(f, chunks[1], app.monitor.view());

    let body = if app.mode == Mode::Settings {
        let columns = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Min(40), Constraint::Length(SETTINGS_PANEL_WIDTH)])
            .split(chunks[2]);
        render_settings(f, columns[1], app);
        columns[0]
    } else {
        chunks[2]
    };

    match app.tab {
        Tab::Trades => render_trades_tab(f, body, app),
        Tab::Summaries => render_summaries_tab(f, body, app.monitor.view()),
        Tab::Charts => render_charts_tab(f, body, app.monitor.view()),
    }

    render_footer(f, chunks[3], app);
}

fn signed_color(value: f64) -> Color {
    if value > 0.0 {
        C_POS
    } else if value < 0.0 {
        C_NEG
    } else {
        C_BRIGHT
    }
}

fn time_label(time: Option<NaiveDateTime>) -> String {
    time.map(|time| time.format("%H:%M:%S").to_string())
        .unwrap_or_else(|| "--:--:--".to_string())
}

// ============================================================================
// HEADER / KPIS / FOOTER
// ============================================================================
fn render_header(f: &mut Frame, area: Rect, app: &App) {
    let monitor = &app.monitor;
    let view = monitor.view();

    let block = Block::default()
        .title(Span::styled(
            " Latency Monitor ",
            Style::default().fg(C_HEADER).add_modifier(Modifier::BOLD),
        ))
        .borders(Borders::ALL);
    let inner = block.inner(area);
    f.render_widget(block, area);

    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(36), Constraint::Min(20)])
        .split(inner);

    let titles: Vec<&str> = Tab::ALL.iter().map(Tab::title).collect();
    let tabs = Tabs::new(titles)
        .select(app.tab.index())
        .style(Style::default().fg(C_DIM))
        .highlight_style(Style::default().fg(C_ACCENT).add_modifier(Modifier::BOLD));
    f.render_widget(tabs, columns[0]);

    let (state, state_color) = if monitor.is_running() {
        ("● LIVE", C_POS)
    } else {
        ("❚❚ PAUSED", C_WARN)
    };
    let mut spans = vec![
        Span::styled(state, Style::default().fg(state_color).add_modifier(Modifier::BOLD)),
        Span::styled("  │  ", Style::default().fg(C_DIM)),
        Span::styled(monitor.provider().describe(), Style::default().fg(C_BRIGHT)),
        Span::styled("  │  ", Style::default().fg(C_DIM)),
        Span::styled(
            format!("every {} ms", monitor.refresh_interval().as_millis()),
            Style::default().fg(C_BRIGHT),
        ),
        Span::styled("  │  ", Style::default().fg(C_DIM)),
        Span::styled(
            format!("{}/{} rows", view.rows.len(), monitor.snapshot().len()),
            Style::default().fg(if monitor.filters().is_active() {
                C_WARN
            } else {
                C_BRIGHT
            }),
        ),
        Span::styled("  │  ", Style::default().fg(C_DIM)),
        Span::styled(
            format!("updated {}", time_label(view.updated_at)),
            Style::default().fg(C_DIM),
        ),
    ];
    if app.is_filter_pending() {
        spans.push(Span::styled("  ⧗ filtering", Style::default().fg(C_WARN)));
    }
    f.render_widget(Paragraph::new(Line::from(spans)), columns[1]);
}

fn render_kpis(f: &mut Frame, area: Rect, view: &MonitorView) {
    let totals = &view.totals;
    let money = |value: f64| format_value(value, ColumnKind::Money);

    let line = Line::from(vec![
        Span::styled("Total PnL ", Style::default().fg(C_DIM)),
        Span::styled(
            money(totals.total),
            Style::default()
                .fg(signed_color(totals.total))
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(format!(" ({} trades)", totals.count), Style::default().fg(C_DIM)),
        Span::raw("    "),
        Span::styled("Winners ", Style::default().fg(C_DIM)),
        Span::styled(money(totals.pos_sum), Style::default().fg(C_POS)),
        Span::styled(format!(" ({})", totals.pos_count), Style::default().fg(C_DIM)),
        Span::raw("    "),
        Span::styled("Losers ", Style::default().fg(C_DIM)),
        Span::styled(money(totals.neg_sum), Style::default().fg(C_NEG)),
        Span::styled(format!(" ({})", totals.neg_count), Style::default().fg(C_DIM)),
    ]);

    f.render_widget(
        Paragraph::new(line).block(Block::default().borders(Borders::ALL).title(" Filtered ")),
        area,
    );
}

fn render_footer(f: &mut Frame, area: Rect, app: &App) {
    let line = match &app.status {
        Some(status) => Line::from(Span::styled(
            format!(" {}", status.text),
            Style::default().fg(if status.error { C_NEG } else { C_POS }),
        )),
        None => {
            let help = match app.mode {
                Mode::Normal => format!(
                    " q quit │ space pause │ r refresh │ f filters │ c clear │ ←→ s sort │ \
                     tab view │ +/- rate │ o options │ e export │ S/L settings ({})",
                    app.settings_path().display()
                ),
                Mode::Filter => " ↑↓ column │ ←→ value │ space toggle │ [ ] min/max │ \
                                 enter commit │ c clear │ esc done"
                    .to_string(),
                Mode::Settings => " ↑↓ field │ enter edit/commit │ +/- rate │ esc done"
                    .to_string(),
            };
            Line::from(Span::styled(help, Style::default().fg(C_DIM)))
        }
    };
    f.render_widget(Paragraph::new(line), area);
}

// ============================================================================
// TRADES TAB
// ============================================================================
fn render_trades_tab(f: &mut Frame, area: Rect, app: &App) {
    if app.mode == Mode::Filter || app.monitor.filters().is_active() {
        let columns = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Length(FILTER_PANEL_WIDTH), Constraint::Min(40)])
            .split(area);
        render_filters(f, columns[0], app);
        render_trade_table(f, columns[1], app);
    } else {
        render_trade_table(f, area, app);
    }
}

fn cell_style(record: &TradeRecord, column: Column) -> Style {
    match (column, record.pnl) {
        (Column::Pnl, Some(pnl)) => Style::default().fg(signed_color(pnl)),
        _ => Style::default().fg(C_BRIGHT),
    }
}

fn render_trade_table(f: &mut Frame, area: Rect, app: &App) {
    let view = app.monitor.view();
    let sort = app.monitor.sort();

    let header = Row::new(Column::DISPLAY.iter().enumerate().map(|(index, column)| {
        let arrow = match sort {
            Some((active, direction)) if active == *column => direction.arrow(),
            _ => "",
        };
        let mut style = Style::default().fg(C_HEADER).add_modifier(Modifier::BOLD);
        if index == app.sort_cursor {
            style = style.add_modifier(Modifier::REVERSED);
        }
        Cell::from(format!("{}{arrow}", column.name())).style(style)
    }));

    let visible = area.height.saturating_sub(3) as usize;
    let rows = view
        .rows
        .iter()
        .skip(app.scroll)
        .take(visible)
        .map(|record| {
            let row = Row::new(Column::DISPLAY.iter().map(|column| {
                Cell::from(record.display_cell(*column)).style(cell_style(record, *column))
            }));
            if view.is_highlighted(record) {
                row.style(Style::default().bg(C_HIGHLIGHT_BG))
            } else {
                row
            }
        });

    let widths = [
        Constraint::Length(9),  // Time
        Constraint::Length(10), // Instrument
        Constraint::Length(8),  // Exchange
        Constraint::Length(12), // Counterparty
        Constraint::Length(13), // ISIN
        Constraint::Length(5),  // Side
        Constraint::Length(7),  // Qty
        Constraint::Length(10), // Exec Price
        Constraint::Length(10), // PnL
        Constraint::Length(7),  // Δt
    ];

    let title = format!(
        " Trades {}-{} of {} ",
        (app.scroll + 1).min(view.rows.len()),
        (app.scroll + visible).min(view.rows.len()),
        view.rows.len()
    );
    let table = Table::new(rows, widths)
        .header(header)
        .block(Block::default().borders(Borders::ALL).title(title));
    f.render_widget(table, area);
}

fn filter_summary(filter: &ColumnFilter) -> String {
    match filter {
        ColumnFilter::Categorical { selected, .. } => {
            selected.iter().cloned().collect::<Vec<_>>().join(", ")
        }
        ColumnFilter::Range {
            min: None,
            max: None,
        } => MATCH_ALL.to_string(),
        ColumnFilter::Range { min, max } => format!(
            "[{}, {}]",
            min.map_or("-∞".to_string(), |value| value.to_string()),
            max.map_or("∞".to_string(), |value| value.to_string())
        ),
    }
}

fn render_filters(f: &mut Frame, area: Rect, app: &App) {
    let editing = app.mode == Mode::Filter;
    let mut lines: Vec<Line> = app
        .monitor
        .filters()
        .iter()
        .enumerate()
        .map(|(index, (column, filter))| {
            let selected = editing && index == app.filter.column;
            let marker = if selected { "▶ " } else { "  " };
            let value_color = if filter.is_active() { C_WARN } else { C_DIM };
            Line::from(vec![
                Span::styled(marker, Style::default().fg(C_ACCENT)),
                Span::styled(
                    format!("{:<13}", column.name()),
                    Style::default().fg(if selected { C_ACCENT } else { C_BRIGHT }),
                ),
                Span::styled(filter_summary(filter), Style::default().fg(value_color)),
            ])
        })
        .collect();

    if editing {
        lines.push(Line::raw(""));
        match app.selected_filter() {
            Some((_, ColumnFilter::Categorical { domain, selected })) => {
                lines.extend(domain.iter().enumerate().map(|(index, value)| {
                    let check = if selected.contains(value) { "[x] " } else { "[ ] " };
                    let style = if index == app.filter.value {
                        Style::default().fg(C_ACCENT).add_modifier(Modifier::REVERSED)
                    } else {
                        Style::default().fg(C_BRIGHT)
                    };
                    Line::from(Span::styled(format!("{check}{value}"), style))
                }));
            }
            Some((_, ColumnFilter::Range { .. })) => {
                let prompt = match &app.filter.edit {
                    Some(edit) => {
                        let label = match edit.bound {
                            Bound::Min => "min",
                            Bound::Max => "max",
                        };
                        format!("{label}: {}▏", edit.text)
                    }
                    None => "[ edit min   ] edit max".to_string(),
                };
                lines.push(Line::from(Span::styled(prompt, Style::default().fg(C_ACCENT))));
            }
            None => {}
        }
    }

    f.render_widget(
        Paragraph::new(lines)
            .wrap(Wrap { trim: false })
            .block(Block::default().borders(Borders::ALL).title(" Filters ")),
        area,
    );
}

fn render_settings(f: &mut Frame, area: Rect, app: &App) {
    let settings = app.monitor.settings();
    let selected = app.selected_setting();

    let mut lines: Vec<Line> = SettingsField::ALL
        .iter()
        .map(|field| {
            let is_selected = *field == selected;
            let marker = if is_selected { "▶ " } else { "  " };
            let value = match (&app.settings.edit, is_selected) {
                (Some(text), true) => Span::styled(
                    format!("{text}▏"),
                    Style::default().fg(C_ACCENT).add_modifier(Modifier::REVERSED),
                ),
                _ => Span::styled(field.value(settings).to_string(), Style::default().fg(C_WARN)),
            };
            Line::from(vec![
                Span::styled(marker, Style::default().fg(C_ACCENT)),
                Span::styled(
                    format!("{:<11}", field.label()),
                    Style::default().fg(if is_selected { C_ACCENT } else { C_BRIGHT }),
                ),
                value,
            ])
        })
        .collect();

    lines.push(Line::raw(""));
    lines.push(Line::from(vec![
        Span::styled(format!("  {:<11}", "refresh_ms"), Style::default().fg(C_DIM)),
        Span::styled(
            app.monitor.refresh_interval().as_millis().to_string(),
            Style::default().fg(C_DIM),
        ),
    ]));

    f.render_widget(
        Paragraph::new(lines)
            .wrap(Wrap { trim: false })
            .block(Block::default().borders(Borders::ALL).title(" Settings ")),
        area,
    );
}

// ============================================================================
// SUMMARIES TAB
// ============================================================================
fn render_summaries_tab(f: &mut Frame, area: Rect, view: &MonitorView) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(area);
    let top = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(rows[0]);
    let bottom = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(rows[1]);

    render_summary(f, top[0], " By Exchange ", &view.summaries.by_exchange);
    render_summary(f, top[1], " By Instrument ", &view.summaries.by_instrument);
    render_summary(f, bottom[0], " By ISIN (top 50) ", &view.summaries.by_isin);
    render_volume_share(f, bottom[1], &view.volume_share);
}

fn render_summary(f: &mut Frame, area: Rect, title: &str, groups: &[GroupSummary]) {
    let header = Row::new(["Key", "Trades", "%Pos", "Δt", "Avg PnL", "PnL"])
        .style(Style::default().fg(C_HEADER).add_modifier(Modifier::BOLD));

    let rows = groups.iter().map(|group| {
        let text = group.to_text();
        Row::new(vec![
            Cell::from(text.key),
            Cell::from(text.trades.to_string()),
            Cell::from(text.pct_pos),
            Cell::from(text.dt_mean),
            Cell::from(text.pnl_mean),
            Cell::from(text.pnl.to_string()).style(Style::default().fg(signed_color(group.pnl_total))),
        ])
    });

    let widths = [
        Constraint::Length(13),
        Constraint::Length(16),
        Constraint::Length(7),
        Constraint::Length(6),
        Constraint::Length(8),
        Constraint::Min(18),
    ];
    f.render_widget(
        Table::new(rows, widths)
            .header(header)
            .block(Block::default().borders(Borders::ALL).title(title)),
        area,
    );
}

fn render_volume_share(f: &mut Frame, area: Rect, share: &VolumeShare) {
    let (a, b) = &share.buckets;
    let header = Row::new(vec![
        "Cpty".to_string(),
        format!("Vol {a}"),
        format!("Vol {b}"),
        "Vol Other".to_string(),
        "Total".to_string(),
        format!("%{a}"),
        format!("%{b}"),
        "%Other".to_string(),
        "%Total".to_string(),
    ])
    .style(Style::default().fg(C_HEADER).add_modifier(Modifier::BOLD));

    let rows = share.rows.iter().map(|row| Row::new(row.to_text()));
    let widths = [
        Constraint::Length(6),
        Constraint::Length(11),
        Constraint::Length(11),
        Constraint::Length(11),
        Constraint::Length(12),
        Constraint::Length(7),
        Constraint::Length(7),
        Constraint::Length(7),
        Constraint::Length(7),
    ];
    f.render_widget(
        Table::new(rows, widths)
            .header(header)
            .block(Block::default().borders(Borders::ALL).title(" Volume Share ")),
        area,
    );
}

// ============================================================================
// CHARTS TAB
// ============================================================================
fn render_charts_tab(f: &mut Frame, area: Rect, view: &MonitorView) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(area);
    let top = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(rows[0]);
    let bottom = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(50),
            Constraint::Percentage(25),
            Constraint::Percentage(25),
        ])
        .split(rows[1]);

    let series = &view.series;
    let pnl = series.pnl.step_points();
    render_step_chart(
        f,
        top[0],
        " Cumulative PnL ",
        (series.pnl.window_start, series.pnl.window_end),
        vec![("PnL".to_string(), C_POS, pnl.as_slice())],
        series.pnl.value_range(),
    );

    let trades = series.trades.step_points();
    render_step_chart(
        f,
        top[1],
        " Cumulative Trades ",
        (series.trades.window_start, series.trades.window_end),
        vec![("Trades".to_string(), C_ACCENT, trades.as_slice())],
        series.trades.value_range(),
    );

    let volume = series.volume.step_points();
    let datasets = volume
        .iter()
        .zip(BUCKET_COLORS.iter().cycle())
        .map(|((label, points), color)| (label.to_string(), *color, points.as_slice()))
        .collect();
    render_step_chart(
        f,
        bottom[0],
        " Cumulative Volume ",
        (series.volume.window_start, series.volume.window_end),
        datasets,
        series.volume.value_range(),
    );

    render_histogram(f, bottom[1], "PnL", view.pnl_histogram.as_ref());
    render_histogram(f, bottom[2], "Δt (s)", view.dt_histogram.as_ref());
}

fn render_step_chart(
    f: &mut Frame,
    area: Rect,
    title: &str,
    window: (NaiveDateTime, NaiveDateTime),
    lines: Vec<(String, Color, &[(f64, f64)])>,
    range: Option<(f64, f64)>,
) {
    let span = (window.1 - window.0).num_seconds().max(1) as f64;
    let mid = window.0 + (window.1 - window.0) / 2;
    let x_labels = [window.0, mid, window.1].map(|time| time.format("%H:%M").to_string());

    let (lo, hi) = range.unwrap_or((0.0, 1.0));
    let (lo, hi) = (lo.min(0.0), hi.max(0.0));
    let pad = ((hi - lo) * 0.05).max(1.0);
    let (lo, hi) = (lo - pad, hi + pad);

    let datasets = lines
        .into_iter()
        .map(|(name, color, points)| {
            Dataset::default()
                .name(name)
                .marker(symbols::Marker::Braille)
                .graph_type(GraphType::Line)
                .style(Style::default().fg(color))
                .data(points)
        })
        .collect();

    let chart = Chart::new(datasets)
        .block(Block::default().borders(Borders::ALL).title(title.to_string()))
        .x_axis(
            Axis::default()
                .style(Style::default().fg(C_DIM))
                .bounds([0.0, span])
                .labels(x_labels.to_vec()),
        )
        .y_axis(
            Axis::default()
                .style(Style::default().fg(C_DIM))
                .bounds([lo, hi])
                .labels(vec![
                    format_value(lo, ColumnKind::Float),
                    format_value(hi, ColumnKind::Float),
                ]),
        );
    f.render_widget(chart, area);
}

fn render_histogram(f: &mut Frame, area: Rect, name: &str, histogram: Option<&Histogram>) {
    let Some(histogram) = histogram else {
        f.render_widget(
            Paragraph::new(Span::styled("no data", Style::default().fg(C_DIM)))
                .block(Block::default().borders(Borders::ALL).title(format!(" {name} "))),
            area,
        );
        return;
    };

    let labels: Vec<String> = (0..histogram.counts.len())
        .map(|index| format!("{:.0}", histogram.bin_start(index)))
        .collect();
    let data: Vec<(&str, u64)> = labels
        .iter()
        .zip(&histogram.counts)
        .map(|(label, count)| (label.as_str(), *count as u64))
        .collect();

    let bins = u16::try_from(histogram.counts.len().max(1)).unwrap_or(u16::MAX);
    let bar_width = (area.width.saturating_sub(2) / bins).saturating_sub(1).max(1);
    let title = format!(
        " {name}  μ {:.1}  σ {:.1} ",
        histogram.mean, histogram.std_dev
    );

    f.render_widget(
        BarChart::default()
            .block(Block::default().borders(Borders::ALL).title(title))
            .data(data.as_slice())
            .bar_width(bar_width)
            .bar_gap(1)
            .bar_style(Style::default().fg(C_ACCENT))
            .value_style(Style::default().fg(Color::Black).bg(C_ACCENT)),
        area,
    );
}
