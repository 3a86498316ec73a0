//! Property-based checks of the coercion, filter, aggregation and series invariants.

use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use latency_monitor::{
    Column, DisplayWindow, FilterSpec, Snapshot, TradeRecord,
    aggregation::{ISIN_SUMMARY_LIMIT, summarize, summarize_volume_share},
    apply_filters,
    numeric::{ColumnKind, format_value, parse_number},
    series::{cumulative_series, trade_occurrence},
};
use proptest::prelude::*;

fn base_time() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2025, 3, 14)
        .and_then(|day| day.and_hms_opt(10, 0, 0))
        .unwrap()
}

/// Generate one trade row with small value domains so groups collide.
fn arb_trade() -> impl Strategy<Value = TradeRecord> {
    (
        prop::sample::select(vec!["TSLA", "NVDA", "MSFT"]),
        prop::sample::select(vec!["A", "B", "C", "D"]),
        prop::sample::select(vec!["H", "J", "K"]),
        0u32..80,
        0i64..600,
        prop::option::weighted(0.9, -500.0f64..500.0),
        1u64..2_000,
    )
        .prop_map(|(instrument, exchange, counterparty, isin, offset, pnl, quantity)| {
            let timestamp = base_time() + TimeDelta::seconds(offset);
            TradeRecord {
                time: timestamp.format("%H:%M:%S").to_string(),
                timestamp: Some(timestamp),
                instrument: Some(instrument.to_string()),
                exchange: Some(exchange.to_string()),
                counterparty: Some(counterparty.to_string()),
                isin: Some(format!("DE{isin:010}")),
                side: None,
                quantity: Some(quantity),
                exec_price: Some(300.0),
                pnl,
                inter_arrival_secs: 0.0,
            }
        })
}

fn arb_snapshot() -> impl Strategy<Value = Snapshot> {
    prop::collection::vec(arb_trade(), 0..120).prop_map(Snapshot::new)
}

/// Determine if `sub` appears in `full` in the same relative order.
fn is_subsequence(sub: &Snapshot, full: &Snapshot) -> bool {
    let mut remaining = full.iter();
    sub.iter().all(|record| remaining.any(|candidate| candidate == record))
}

proptest! {
    #[test]
    fn prop_money_display_parses_back(value in -1.0e7f64..1.0e7) {
        let parsed = parse_number(&format_value(value, ColumnKind::Money));
        prop_assert!(parsed.is_some_and(|parsed| (parsed - value).abs() <= 0.05 + 1e-6));
    }

    #[test]
    fn prop_percent_display_parses_back_in_percent_units(
        value in prop_oneof![0.0f64..=1.0, -1.0e6f64..0.0, 1.0f64..1.0e6],
    ) {
        let displayed = format_value(value, ColumnKind::Percent);
        prop_assert!(displayed.ends_with('%'));

        // Fractions in [0, 1] are shown scaled, anything else as written.
        let expected = if (0.0..=1.0).contains(&value) { value * 100.0 } else { value };
        let parsed = parse_number(&displayed);
        prop_assert!(
            parsed.is_some_and(|parsed| (parsed - expected).abs() <= 0.05 + 1e-6),
            "{} displayed as {} parsed as {:?}", value, displayed, parsed
        );
    }

    #[test]
    fn prop_integer_display_parses_back(value in -1_000_000i64..1_000_000) {
        let parsed = parse_number(&format_value(value as f64, ColumnKind::Integer));
        prop_assert_eq!(parsed, Some(value as f64));
    }

    #[test]
    fn prop_filters_yield_ordered_subset(
        snapshot in arb_snapshot(),
        exchanges in prop::sample::subsequence(vec!["A", "B", "C", "D"], 0..=4),
        min_quantity in prop::option::of(0.0f64..2_000.0),
    ) {
        let mut spec = FilterSpec::build(&snapshot);
        spec.select(Column::Exchange, exchanges.iter().copied());
        spec.set_range(Column::Quantity, min_quantity, None).unwrap();

        let filtered = apply_filters(&snapshot, &spec);
        prop_assert!(filtered.len() <= snapshot.len());
        prop_assert!(is_subsequence(&filtered, &snapshot));

        spec.clear_all();
        prop_assert_eq!(apply_filters(&snapshot, &spec), snapshot);
    }

    #[test]
    fn prop_summaries_conserve_trades_and_sort_descending(snapshot in arb_snapshot()) {
        for key in [Column::Exchange, Column::Instrument, Column::Counterparty] {
            let groups = summarize(&snapshot, key).unwrap();
            prop_assert_eq!(groups.iter().map(|g| g.trades).sum::<usize>(), snapshot.len());
            prop_assert!(groups.windows(2).all(|pair| pair[0].pnl_total >= pair[1].pnl_total));
        }

        let isins = summarize(&snapshot, Column::Isin).unwrap();
        prop_assert!(isins.len() <= ISIN_SUMMARY_LIMIT);
    }

    #[test]
    fn prop_volume_shares_sum_to_one(snapshot in arb_snapshot()) {
        let share = summarize_volume_share(&snapshot, Column::Instrument, ("TSLA", "NVDA")).unwrap();

        for row in &share.rows {
            prop_assert!((row.pct_a + row.pct_b + row.pct_other - 1.0).abs() < 1e-9);
        }
        if !share.rows.is_empty() {
            let total: f64 = share.rows.iter().map(|row| row.pct_total).sum();
            prop_assert!((total - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn prop_trade_count_series_is_non_decreasing(snapshot in arb_snapshot()) {
        let series = cumulative_series(
            &snapshot,
            trade_occurrence,
            &DisplayWindow::default(),
            base_time().date(),
        );

        prop_assert!(series.points.windows(2).all(|pair| pair[0].1 <= pair[1].1));
        prop_assert!(series.points.windows(2).all(|pair| pair[1].0 - pair[0].0 == TimeDelta::seconds(1)));
        prop_assert_eq!(series.last_value(), snapshot.len() as f64);
    }
}
