//! Immutable per-tick dataset of trade records.

use crate::trade::{Column, TradeRecord};
use indexmap::IndexMap;
use itertools::Itertools;

/// Full replacement dataset fetched on a refresh tick.
///
/// Row order is the provider's order. The inter-arrival column is derived on construction by
/// walking each instrument's trades in timestamp order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Snapshot {
    records: Vec<TradeRecord>,
}

impl Snapshot {
    /// Construct a new [`Snapshot`], deriving [`TradeRecord::inter_arrival_secs`].
    ///
    /// The first trade of each instrument, and any trade without a timestamp, gets `0.0`.
    pub fn new(mut records: Vec<TradeRecord>) -> Self {
        let mut by_instrument: IndexMap<Option<&str>, Vec<usize>> = IndexMap::new();
        for (index, record) in records.iter().enumerate() {
            by_instrument
                .entry(record.instrument.as_deref())
                .or_default()
                .push(index);
        }

        let mut derived = vec![0.0; records.len()];
        for indices in by_instrument.values() {
            indices
                .iter()
                .filter_map(|&index| records[index].timestamp.map(|time| (time, index)))
                .sorted_by_key(|(time, _)| *time)
                .tuple_windows()
                .for_each(|((prev, _), (next, index))| {
                    derived[index] = (next - prev).num_milliseconds() as f64 / 1000.0;
                });
        }

        for (record, secs) in records.iter_mut().zip(derived) {
            record.inter_arrival_secs = secs;
        }

        Self { records }
    }

    /// Wrap records whose derived columns are already populated (eg/ a filtered view).
    pub(crate) fn from_derived(records: Vec<TradeRecord>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &[TradeRecord] {
        &self.records
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TradeRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Distinct stringified values present in `column`, sorted. Missing cells are skipped.
    pub fn distinct_values(&self, column: Column) -> Vec<String> {
        self.records
            .iter()
            .filter_map(|record| record.cell(column).as_text())
            .map(|text| text.into_owned())
            .unique()
            .sorted()
            .collect()
    }

    /// Re-order rows in place with the provided comparator. Used by the table sort.
    pub(crate) fn sort_by<F>(&mut self, compare: F)
    where
        F: FnMut(&TradeRecord, &TradeRecord) -> std::cmp::Ordering,
    {
        self.records.sort_by(compare);
    }
}

impl<'a> IntoIterator for &'a Snapshot {
    type Item = &'a TradeRecord;
    type IntoIter = std::slice::Iter<'a, TradeRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

impl FromIterator<TradeRecord> for Snapshot {
    fn from_iter<T: IntoIterator<Item = TradeRecord>>(iter: T) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

#[cfg(test)]
pub(crate) mod test_util {
    use crate::trade::{Side, TradeRecord};
    use chrono::{NaiveDate, NaiveDateTime};

    pub fn at(hour: u32, min: u32, sec: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, 14)
            .and_then(|day| day.and_hms_opt(hour, min, sec))
            .unwrap()
    }

    pub fn trade(instrument: &str, time: NaiveDateTime, pnl: f64) -> TradeRecord {
        TradeRecord {
            time: time.format("%H:%M:%S").to_string(),
            timestamp: Some(time),
            instrument: Some(instrument.to_string()),
            exchange: Some("A".to_string()),
            counterparty: Some("H".to_string()),
            isin: Some("DE0000000001".to_string()),
            side: Some(Side::Buy),
            quantity: Some(100),
            exec_price: Some(300.0),
            pnl: Some(pnl),
            inter_arrival_secs: 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_util::{at, trade};
    use super::*;

    #[test]
    fn test_inter_arrival_per_instrument() {
        // Provider order is shuffled, derivation must not depend on it
        let snapshot = Snapshot::new(vec![
            trade("X", at(10, 0, 7), 20.0),
            trade("Y", at(10, 0, 1), 1.0),
            trade("X", at(10, 0, 0), 10.0),
            trade("X", at(10, 0, 5), -5.0),
            trade("Y", at(10, 1, 1), 1.0),
        ]);

        let derived: Vec<f64> = snapshot.iter().map(|r| r.inter_arrival_secs).collect();
        assert_eq!(derived, vec![2.0, 0.0, 0.0, 5.0, 60.0]);
    }

    #[test]
    fn test_missing_timestamp_gets_zero() {
        let mut undated = trade("X", at(10, 0, 3), 1.0);
        undated.timestamp = None;

        let snapshot = Snapshot::new(vec![
            trade("X", at(10, 0, 0), 1.0),
            undated,
            trade("X", at(10, 0, 9), 1.0),
        ]);

        let derived: Vec<f64> = snapshot.iter().map(|r| r.inter_arrival_secs).collect();
        assert_eq!(derived, vec![0.0, 0.0, 9.0]);
    }

    #[test]
    fn test_provider_supplied_inter_arrival_is_replaced() {
        let mut stale = trade("X", at(10, 0, 0), 1.0);
        stale.inter_arrival_secs = 42.0;
        let snapshot = Snapshot::new(vec![stale]);
        assert_eq!(snapshot.records()[0].inter_arrival_secs, 0.0);
    }

    #[test]
    fn test_distinct_values_sorted() {
        let mut missing = trade("Z", at(9, 0, 0), 0.0);
        missing.exchange = None;
        let mut b = trade("X", at(9, 0, 1), 0.0);
        b.exchange = Some("B".to_string());

        let snapshot = Snapshot::new(vec![b, trade("X", at(9, 0, 2), 0.0), missing]);
        assert_eq!(snapshot.distinct_values(Column::Exchange), vec!["A", "B"]);
        assert!(Snapshot::default().distinct_values(Column::Exchange).is_empty());
    }
}
