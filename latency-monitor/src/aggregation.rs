//! Grouped statistics over a snapshot.
//!
//! Every summary is recomputed from scratch on each call. There is no retained state across
//! refresh ticks.

use crate::{
    error::MonitorError,
    numeric::{ColumnKind, format_value, signed_text},
    snapshot::Snapshot,
    trade::Column,
};
use indexmap::IndexMap;

/// Maximum number of rows returned when summarising by instrument identifier.
pub const ISIN_SUMMARY_LIMIT: usize = 50;

/// Label of the volume bucket collecting everything outside the two main values.
pub const OTHER_BUCKET: &str = "Other";

/// Per-group trade statistics.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupSummary {
    pub key: String,
    pub trades: usize,
    pub pos_trades: usize,
    pub neg_trades: usize,
    pub pnl_pos: f64,
    pub pnl_neg: f64,
    /// Percentage (0-100) of trades with PnL > 0.
    pub pct_pos: f64,
    pub dt_mean: f64,
    pub pnl_mean: f64,
    pub pnl_total: f64,
}

#[derive(Debug, Default)]
struct GroupAccumulator {
    trades: usize,
    pos_trades: usize,
    neg_trades: usize,
    pnl_pos: f64,
    pnl_neg: f64,
    pnl_count: usize,
    dt_sum: f64,
}

impl GroupAccumulator {
    fn add(&mut self, pnl: Option<f64>, inter_arrival_secs: f64) {
        self.trades += 1;
        self.dt_sum += inter_arrival_secs;

        let Some(pnl) = pnl else {
            return;
        };
        self.pnl_count += 1;
        if pnl > 0.0 {
            self.pos_trades += 1;
            self.pnl_pos += pnl;
        } else if pnl < 0.0 {
            self.neg_trades += 1;
            self.pnl_neg += pnl;
        }
    }

    fn finish(self, key: String) -> GroupSummary {
        let pnl_total = self.pnl_pos + self.pnl_neg;
        GroupSummary {
            key,
            trades: self.trades,
            pos_trades: self.pos_trades,
            neg_trades: self.neg_trades,
            pnl_pos: self.pnl_pos,
            pnl_neg: self.pnl_neg,
            pct_pos: 100.0 * self.pos_trades as f64 / self.trades.max(1) as f64,
            dt_mean: self.dt_sum / self.trades.max(1) as f64,
            pnl_mean: if self.pnl_count == 0 {
                0.0
            } else {
                pnl_total / self.pnl_count as f64
            },
            pnl_total,
        }
    }
}

/// Group `snapshot` by `key` and compute [`GroupSummary`] statistics per group.
///
/// Rows are sorted descending by total PnL, ties keeping first-encounter order. Rows without a
/// key value are skipped. Grouping by [`Column::Isin`] returns at most
/// [`ISIN_SUMMARY_LIMIT`] rows.
pub fn summarize(snapshot: &Snapshot, key: Column) -> Result<Vec<GroupSummary>, MonitorError> {
    if key.is_numeric() {
        return Err(MonitorError::NotGroupable(key));
    }

    let mut groups: IndexMap<String, GroupAccumulator> = IndexMap::new();
    for record in snapshot {
        let Some(value) = record.cell(key).as_text() else {
            continue;
        };
        groups
            .entry(value.into_owned())
            .or_default()
            .add(record.pnl, record.inter_arrival_secs);
    }

    let mut rows: Vec<GroupSummary> = groups
        .into_iter()
        .map(|(key, accumulator)| accumulator.finish(key))
        .collect();

    // Vec::sort_by is stable
    rows.sort_by(|a, b| b.pnl_total.total_cmp(&a.pnl_total));

    if key == Column::Isin {
        rows.truncate(ISIN_SUMMARY_LIMIT);
    }

    Ok(rows)
}

/// Three-part `total | +pos | −neg` cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Triplet {
    pub total: String,
    pub pos: String,
    pub neg: String,
}

impl std::fmt::Display for Triplet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} | {} | {}", self.total, self.pos, self.neg)
    }
}

/// Display strings for one summary table row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryRowText {
    pub key: String,
    pub trades: Triplet,
    pub pct_pos: String,
    pub dt_mean: String,
    pub pnl_mean: String,
    pub pnl: Triplet,
}

impl GroupSummary {
    pub fn to_text(&self) -> SummaryRowText {
        SummaryRowText {
            key: self.key.clone(),
            trades: Triplet {
                total: self.trades.to_string(),
                pos: format!("+{}", self.pos_trades),
                neg: signed_text(-(self.neg_trades as f64), "0"),
            },
            pct_pos: format!("{:.1}%", self.pct_pos),
            dt_mean: format!("{:.1}", self.dt_mean),
            pnl_mean: format!("{:.1}", self.pnl_mean),
            pnl: Triplet {
                total: signed_text(self.pnl_total, "0"),
                pos: signed_text(self.pnl_pos, "0"),
                neg: signed_text(self.pnl_neg, "0"),
            },
        }
    }
}

/// KPI totals over a (filtered) snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PnlTotals {
    pub total: f64,
    pub count: usize,
    pub pos_sum: f64,
    pub pos_count: usize,
    pub neg_sum: f64,
    pub neg_count: usize,
}

impl PnlTotals {
    pub fn compute(snapshot: &Snapshot) -> Self {
        snapshot.iter().fold(
            Self {
                count: snapshot.len(),
                ..Self::default()
            },
            |mut totals, record| {
                match record.pnl {
                    Some(pnl) if pnl > 0.0 => {
                        totals.pos_sum += pnl;
                        totals.pos_count += 1;
                    }
                    Some(pnl) if pnl < 0.0 => {
                        totals.neg_sum += pnl;
                        totals.neg_count += 1;
                    }
                    _ => {}
                }
                totals.total = totals.pos_sum + totals.neg_sum;
                totals
            },
        )
    }
}

/// Counterparty traded notional split across two main buckets and [`OTHER_BUCKET`].
#[derive(Debug, Clone, PartialEq)]
pub struct VolumeShareRow {
    pub counterparty: String,
    pub vol_a: f64,
    pub vol_b: f64,
    pub vol_other: f64,
    pub total: f64,
    /// Fractions (0-1) of `total` per bucket.
    pub pct_a: f64,
    pub pct_b: f64,
    pub pct_other: f64,
    /// Fraction (0-1) of the global total across all counterparties.
    pub pct_total: f64,
}

impl VolumeShareRow {
    /// Display strings in column order: counterparty, three volumes, total, four shares.
    pub fn to_text(&self) -> [String; 9] {
        let volume = |value: f64| format_value(value, ColumnKind::Integer);
        let share = |value: f64| format_value(value, ColumnKind::Percent);
        [
            self.counterparty.clone(),
            volume(self.vol_a),
            volume(self.vol_b),
            volume(self.vol_other),
            volume(self.total),
            share(self.pct_a),
            share(self.pct_b),
            share(self.pct_other),
            share(self.pct_total),
        ]
    }
}

/// Result of [`summarize_volume_share`], carrying the bucket labels the columns refer to.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct VolumeShare {
    pub buckets: (String, String),
    pub rows: Vec<VolumeShareRow>,
}

/// Group traded notional (`|qty| * |price|`) by counterparty, splitting it into the two
/// `main` values of `bucket` (matched case-insensitively) and [`OTHER_BUCKET`].
///
/// Counterparties with zero total volume are dropped. Rows are sorted descending by total.
pub fn summarize_volume_share(
    snapshot: &Snapshot,
    bucket: Column,
    main: (&str, &str),
) -> Result<VolumeShare, MonitorError> {
    if bucket.is_numeric() {
        return Err(MonitorError::NotGroupable(bucket));
    }

    let mut volumes: IndexMap<String, [f64; 3]> = IndexMap::new();
    for record in snapshot {
        let (Some(counterparty), Some(notional)) = (&record.counterparty, record.notional())
        else {
            continue;
        };

        let slot = match record.cell(bucket).as_text() {
            Some(value) if value.eq_ignore_ascii_case(main.0) => 0,
            Some(value) if value.eq_ignore_ascii_case(main.1) => 1,
            _ => 2,
        };
        volumes.entry(counterparty.clone()).or_default()[slot] += notional;
    }

    let global_total: f64 = volumes.values().flatten().sum();

    let mut rows: Vec<VolumeShareRow> = volumes
        .into_iter()
        .filter_map(|(counterparty, [vol_a, vol_b, vol_other])| {
            let total = vol_a + vol_b + vol_other;
            (total > 0.0).then(|| VolumeShareRow {
                counterparty,
                vol_a,
                vol_b,
                vol_other,
                total,
                pct_a: vol_a / total,
                pct_b: vol_b / total,
                pct_other: vol_other / total,
                pct_total: total / global_total,
            })
        })
        .collect();

    rows.sort_by(|a, b| b.total.total_cmp(&a.total));

    Ok(VolumeShare {
        buckets: (main.0.to_string(), main.1.to_string()),
        rows,
    })
}
