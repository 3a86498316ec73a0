//! Time-bucketed cumulative series.
//!
//! Contributions are resampled into 1-second buckets inside a fixed clock-time
//! [`DisplayWindow`], reindexed over the contiguous span between the first and last second
//! with data (zero-filled) and accumulated into a running sum. The window is anchored to the
//! calendar day of the earliest contribution, so data from other days is excluded.

use crate::{error::MonitorError, snapshot::Snapshot, trade::TradeRecord};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime, SubsecRound, TimeDelta};
use indexmap::IndexMap;
use std::{collections::BTreeMap, str::FromStr};

/// Clock-time band shown on every time chart, eg/ 08:00-22:00.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct DisplayWindow {
    start: NaiveTime,
    end: NaiveTime,
}

impl DisplayWindow {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Result<Self, MonitorError> {
        if start >= end {
            return Err(MonitorError::InvalidWindow { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> NaiveTime {
        self.start
    }

    pub fn end(&self) -> NaiveTime {
        self.end
    }

    /// Concrete `[start, end]` bounds of the window on `day`.
    pub fn bounds_on(&self, day: NaiveDate) -> (NaiveDateTime, NaiveDateTime) {
        (day.and_time(self.start), day.and_time(self.end))
    }
}

impl Default for DisplayWindow {
    fn default() -> Self {
        Self {
            start: NaiveTime::from_hms_opt(8, 0, 0).unwrap_or(NaiveTime::MIN),
            end: NaiveTime::from_hms_opt(22, 0, 0).unwrap_or(NaiveTime::MIN),
        }
    }
}

impl FromStr for DisplayWindow {
    type Err = MonitorError;

    /// Parse `HH:MM-HH:MM` (seconds optional).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parse_time = |text: &str| {
            let text = text.trim();
            NaiveTime::parse_from_str(text, "%H:%M:%S")
                .or_else(|_| NaiveTime::parse_from_str(text, "%H:%M"))
                .map_err(|error| {
                    MonitorError::InvalidSettings(format!("display window time '{text}': {error}"))
                })
        };

        let (start, end) = s.split_once('-').ok_or_else(|| {
            MonitorError::InvalidSettings(format!("display window '{s}' is not HH:MM-HH:MM"))
        })?;

        Self::new(parse_time(start)?, parse_time(end)?)
    }
}

/// Cumulative step series plus the fixed axis range it is drawn against.
#[derive(Debug, Clone, PartialEq)]
pub struct CumulativeSeries {
    pub window_start: NaiveDateTime,
    pub window_end: NaiveDateTime,
    /// One point per second from the first to the last second with data.
    pub points: Vec<(NaiveDateTime, f64)>,
}

impl CumulativeSeries {
    fn empty((window_start, window_end): (NaiveDateTime, NaiveDateTime)) -> Self {
        Self {
            window_start,
            window_end,
            points: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Final cumulative value, `0.0` for an empty series.
    pub fn last_value(&self) -> f64 {
        self.points.last().map(|(_, value)| *value).unwrap_or_default()
    }

    /// Chart coordinates (seconds since `window_start`, value) tracing a post-step line.
    pub fn step_points(&self) -> Vec<(f64, f64)> {
        step_points(self.window_start, &self.points)
    }

    /// `(min, max)` of the cumulative values, `None` for an empty series.
    pub fn value_range(&self) -> Option<(f64, f64)> {
        value_range(&self.points)
    }
}

/// Per-bucket cumulative series sharing one per-second index.
#[derive(Debug, Clone, PartialEq)]
pub struct BucketedSeries {
    pub window_start: NaiveDateTime,
    pub window_end: NaiveDateTime,
    pub series: IndexMap<String, Vec<(NaiveDateTime, f64)>>,
}

impl BucketedSeries {
    pub fn is_empty(&self) -> bool {
        self.series.values().all(Vec::is_empty)
    }

    /// Chart coordinates of every bucket, see [`CumulativeSeries::step_points`].
    pub fn step_points(&self) -> IndexMap<&str, Vec<(f64, f64)>> {
        self.series
            .iter()
            .map(|(label, points)| (label.as_str(), step_points(self.window_start, points)))
            .collect()
    }

    /// `(min, max)` over all buckets, `None` when every bucket is empty.
    pub fn value_range(&self) -> Option<(f64, f64)> {
        self.series
            .values()
            .filter_map(|points| value_range(points))
            .reduce(|(lo_a, hi_a), (lo_b, hi_b)| (lo_a.min(lo_b), hi_a.max(hi_b)))
    }
}

/// PnL contribution of a record.
pub fn pnl_contribution(record: &TradeRecord) -> Option<(NaiveDateTime, f64)> {
    Some((record.timestamp?, record.pnl?))
}

/// One unit per timestamped record.
pub fn trade_occurrence(record: &TradeRecord) -> Option<(NaiveDateTime, f64)> {
    Some((record.timestamp?, 1.0))
}

/// Time-restricted, second-floored contributions within the anchored window.
struct Windowed<T> {
    bounds: (NaiveDateTime, NaiveDateTime),
    per_second: BTreeMap<NaiveDateTime, T>,
}

fn bucket_by_second<T, V>(
    mut contributions: Vec<(NaiveDateTime, V)>,
    window: &DisplayWindow,
    fallback_day: NaiveDate,
    mut add: impl FnMut(&mut T, V),
) -> Windowed<T>
where
    T: Default,
{
    contributions.sort_by_key(|(time, _)| *time);

    let Some((first, _)) = contributions.first() else {
        return Windowed {
            bounds: window.bounds_on(fallback_day),
            per_second: BTreeMap::new(),
        };
    };

    let bounds = window.bounds_on(first.date());
    let mut per_second: BTreeMap<NaiveDateTime, T> = BTreeMap::new();
    for (time, value) in contributions {
        if time < bounds.0 || time > bounds.1 {
            continue;
        }
        add(per_second.entry(time.trunc_subsecs(0)).or_default(), value);
    }

    Windowed { bounds, per_second }
}

/// Every second from `first` to `last` inclusive.
fn seconds_between(first: NaiveDateTime, last: NaiveDateTime) -> impl Iterator<Item = NaiveDateTime> {
    std::iter::successors(Some(first), move |second| {
        Some(*second + TimeDelta::seconds(1)).filter(|next| *next <= last)
    })
}

/// Build the cumulative 1-second step series of the contributions `selector` extracts.
///
/// Records for which `selector` returns `None` are dropped. When nothing survives, the
/// series is empty but still reports the window bounds (on `fallback_day` if no record had a
/// usable timestamp).
pub fn cumulative_series<F>(
    snapshot: &Snapshot,
    selector: F,
    window: &DisplayWindow,
    fallback_day: NaiveDate,
) -> CumulativeSeries
where
    F: Fn(&TradeRecord) -> Option<(NaiveDateTime, f64)>,
{
    let contributions: Vec<(NaiveDateTime, f64)> = snapshot
        .iter()
        .filter_map(&selector)
        .filter(|(_, value)| value.is_finite())
        .collect();

    let Windowed { bounds, per_second } =
        bucket_by_second(contributions, window, fallback_day, |sum: &mut f64, value| {
            *sum += value
        });

    let (Some((&first, _)), Some((&last, _))) =
        (per_second.first_key_value(), per_second.last_key_value())
    else {
        return CumulativeSeries::empty(bounds);
    };

    let mut running = 0.0;
    let points = seconds_between(first, last)
        .map(|second| {
            running += per_second.get(&second).copied().unwrap_or_default();
            (second, running)
        })
        .collect();

    CumulativeSeries {
        window_start: bounds.0,
        window_end: bounds.1,
        points,
    }
}

/// Multi-bucket variant of [`cumulative_series`].
///
/// `selector` yields `(timestamp, bucket label, contribution)`. One series is returned per
/// entry of `buckets`, in that order, all sharing the per-second index spanning the first to
/// last second with data in any bucket. Labels outside `buckets` are ignored.
pub fn cumulative_series_by_bucket<F>(
    snapshot: &Snapshot,
    selector: F,
    buckets: &[String],
    window: &DisplayWindow,
    fallback_day: NaiveDate,
) -> BucketedSeries
where
    F: Fn(&TradeRecord) -> Option<(NaiveDateTime, String, f64)>,
{
    let contributions: Vec<(NaiveDateTime, (usize, f64))> = snapshot
        .iter()
        .filter_map(&selector)
        .filter(|(_, _, value)| value.is_finite())
        .filter_map(|(time, label, value)| {
            buckets
                .iter()
                .position(|bucket| *bucket == label)
                .map(|slot| (time, (slot, value)))
        })
        .collect();

    let Windowed { bounds, per_second } = bucket_by_second(
        contributions,
        window,
        fallback_day,
        |sums: &mut Vec<f64>, (slot, value)| {
            if sums.len() < buckets.len() {
                sums.resize(buckets.len(), 0.0);
            }
            sums[slot] += value;
        },
    );

    let mut series: IndexMap<String, Vec<(NaiveDateTime, f64)>> = buckets
        .iter()
        .map(|bucket| (bucket.clone(), Vec::new()))
        .collect();

    if let (Some((&first, _)), Some((&last, _))) =
        (per_second.first_key_value(), per_second.last_key_value())
    {
        let mut running = vec![0.0; buckets.len()];
        for second in seconds_between(first, last) {
            if let Some(sums) = per_second.get(&second) {
                running.iter_mut().zip(sums).for_each(|(total, add)| *total += add);
            }
            for (points, total) in series.values_mut().zip(&running) {
                points.push((second, *total));
            }
        }
    }

    BucketedSeries {
        window_start: bounds.0,
        window_end: bounds.1,
        series,
    }
}

fn step_points(origin: NaiveDateTime, points: &[(NaiveDateTime, f64)]) -> Vec<(f64, f64)> {
    let x = |time: NaiveDateTime| (time - origin).num_milliseconds() as f64 / 1000.0;

    let mut path = Vec::with_capacity(points.len() * 2);
    for (index, (time, value)) in points.iter().enumerate() {
        if index > 0 {
            // Hold the previous value up to this sample
            let (_, previous) = points[index - 1];
            path.push((x(*time), previous));
        }
        path.push((x(*time), *value));
    }
    path
}

fn value_range(points: &[(NaiveDateTime, f64)]) -> Option<(f64, f64)> {
    points.iter().map(|(_, value)| *value).fold(None, |range, value| match range {
        None => Some((value, value)),
        Some((lo, hi)) => Some((lo.min(value), hi.max(value))),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::test_util::{at, trade};
    use chrono::Timelike;

    fn day() -> NaiveDate {
        at(0, 0, 0).date()
    }

    #[test]
    fn test_display_window_parse() {
        struct TestCase {
            input: &'static str,
            expected: Option<(u32, u32)>,
        }

        let tests = vec![
            TestCase {
                // TC0: default band
                input: "08:00-22:00",
                expected: Some((8, 22)),
            },
            TestCase {
                // TC1: padded with seconds
                input: " 09:30:00 - 17:00 ",
                expected: Some((9, 17)),
            },
            TestCase {
                // TC2: inverted
                input: "22:00-08:00",
                expected: None,
            },
            TestCase {
                // TC3: garbage
                input: "all day",
                expected: None,
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let actual = test
                .input
                .parse::<DisplayWindow>()
                .ok()
                .map(|window| (window.start().hour(), window.end().hour()));
            assert_eq!(actual, test.expected, "TC{} failed", index);
        }

        assert!(matches!(
            "10:00-10:00".parse::<DisplayWindow>(),
            Err(MonitorError::InvalidWindow { .. })
        ));
    }

    #[test]
    fn test_gap_is_zero_filled() {
        let snapshot = Snapshot::new(vec![
            trade("X", at(10, 0, 5), 1.0),
            trade("X", at(10, 0, 0), 1.0),
        ]);

        let series = cumulative_series(
            &snapshot,
            trade_occurrence,
            &DisplayWindow::default(),
            day(),
        );

        let values: Vec<f64> = series.points.iter().map(|(_, v)| *v).collect();
        assert_eq!(values, vec![1.0, 1.0, 1.0, 1.0, 1.0, 2.0]);
        assert_eq!(series.points[0].0, at(10, 0, 0));
        assert_eq!(series.points[5].0, at(10, 0, 5));
        assert_eq!((series.window_start, series.window_end), (at(8, 0, 0), at(22, 0, 0)));
    }

    #[test]
    fn test_subsecond_contributions_share_a_bucket() {
        let base = at(10, 0, 0);
        let mut early = trade("X", base + TimeDelta::milliseconds(100), 3.0);
        let late = trade("X", base + TimeDelta::milliseconds(900), -1.0);
        early.instrument = Some("Y".to_string());

        let series = cumulative_series(
            &Snapshot::new(vec![early, late]),
            pnl_contribution,
            &DisplayWindow::default(),
            day(),
        );
        assert_eq!(series.points, vec![(base, 2.0)]);
    }

    #[test]
    fn test_window_anchored_to_first_day() {
        let next_day = at(10, 0, 0) + TimeDelta::days(1);
        let snapshot = Snapshot::new(vec![
            trade("X", at(7, 59, 59), 100.0),
            trade("X", at(9, 0, 0), 5.0),
            trade("X", at(22, 0, 0), 7.0),
            trade("X", at(22, 0, 1), 100.0),
            trade("X", next_day, 100.0),
        ]);

        let series = cumulative_series(
            &snapshot,
            pnl_contribution,
            &DisplayWindow::default(),
            day(),
        );

        assert_eq!(series.points.first(), Some(&(at(9, 0, 0), 5.0)));
        assert_eq!(series.points.last(), Some(&(at(22, 0, 0), 12.0)));
        assert_eq!(series.last_value(), 12.0);
    }

    #[test]
    fn test_empty_series_keeps_window() {
        let fallback = day() + TimeDelta::days(3);
        let series = cumulative_series(
            &Snapshot::default(),
            pnl_contribution,
            &DisplayWindow::default(),
            fallback,
        );
        assert!(series.is_empty());
        assert_eq!(series.window_start, fallback.and_hms_opt(8, 0, 0).unwrap());

        // Only out-of-window data: anchored to its own day, still empty
        let snapshot = Snapshot::new(vec![trade("X", at(23, 0, 0), 1.0)]);
        let series = cumulative_series(&snapshot, pnl_contribution, &DisplayWindow::default(), fallback);
        assert!(series.is_empty());
        assert_eq!(series.window_end, at(22, 0, 0));
        assert_eq!(series.value_range(), None);
    }

    #[test]
    fn test_missing_values_are_dropped() {
        let mut no_pnl = trade("X", at(10, 0, 0), 0.0);
        no_pnl.pnl = None;
        let mut no_time = trade("X", at(10, 0, 1), 4.0);
        no_time.timestamp = None;

        let snapshot = Snapshot::new(vec![no_pnl, no_time, trade("X", at(10, 0, 2), 1.0)]);
        let series = cumulative_series(&snapshot, pnl_contribution, &DisplayWindow::default(), day());
        assert_eq!(series.points, vec![(at(10, 0, 2), 1.0)]);
    }

    #[test]
    fn test_step_points() {
        let series = CumulativeSeries {
            window_start: at(8, 0, 0),
            window_end: at(22, 0, 0),
            points: vec![(at(8, 0, 10), 1.0), (at(8, 0, 11), 3.0)],
        };
        assert_eq!(
            series.step_points(),
            vec![(10.0, 1.0), (11.0, 1.0), (11.0, 3.0)]
        );
        assert_eq!(series.value_range(), Some((1.0, 3.0)));
    }

    #[test]
    fn test_buckets_share_index() {
        let bucket = |record: &TradeRecord| {
            Some((
                record.timestamp?,
                record.instrument.clone()?,
                record.notional()?,
            ))
        };
        let buckets = vec!["TSLA".to_string(), "NVDA".to_string(), "Other".to_string()];
        let snapshot = Snapshot::new(vec![
            trade("TSLA", at(10, 0, 0), 0.0),
            trade("NVDA", at(10, 0, 2), 0.0),
            trade("AAPL", at(10, 0, 9), 0.0),
        ]);

        let series = cumulative_series_by_bucket(
            &snapshot,
            bucket,
            &buckets,
            &DisplayWindow::default(),
            day(),
        );

        assert_eq!(series.series.keys().collect::<Vec<_>>(), vec!["TSLA", "NVDA", "Other"]);
        let tsla: Vec<f64> = series.series["TSLA"].iter().map(|(_, v)| *v).collect();
        let nvda: Vec<f64> = series.series["NVDA"].iter().map(|(_, v)| *v).collect();
        assert_eq!(tsla, vec![30000.0, 30000.0, 30000.0]);
        assert_eq!(nvda, vec![0.0, 0.0, 30000.0]);
        assert!(series.series["Other"].iter().all(|(_, v)| *v == 0.0));
        assert_eq!(series.value_range(), Some((0.0, 30000.0)));
        assert!(!series.is_empty());
    }
}
