//! Data providers polled by the refresh orchestrator.
//!
//! A provider hands over a full replacement [`Snapshot`] on every call to
//! [`DataProvider::fetch`]. Failures are returned, never panicked, so the orchestrator can log
//! them and keep the previous snapshot.

use crate::{
    error::MonitorError,
    numeric::{parse_int, parse_number},
    settings::Settings,
    snapshot::Snapshot,
    trade::{Column, Side, TIME_LABEL_FORMAT, TradeRecord},
};
use chrono::{Local, NaiveDateTime, TimeDelta};
use rand::{
    Rng, SeedableRng,
    rngs::StdRng,
    seq::{IndexedRandom, SliceRandom},
};
use std::path::PathBuf;
use tracing::debug;

/// Default number of rows produced by [`SimulatedProvider`].
pub const DEFAULT_SIMULATED_ROWS: usize = 260;

/// Source of trade snapshots.
pub trait DataProvider {
    /// Short human-readable description used in logs and the status line.
    fn describe(&self) -> String;

    /// Produce the next full snapshot.
    fn fetch(&mut self) -> Result<Snapshot, MonitorError>;

    /// Pick up changed settings (eg/ the `BIS` token). Default is a no-op.
    fn configure(&mut self, _settings: &Settings) {}
}

impl<P> DataProvider for Box<P>
where
    P: DataProvider + ?Sized,
{
    fn describe(&self) -> String {
        (**self).describe()
    }

    fn fetch(&mut self) -> Result<Snapshot, MonitorError> {
        (**self).fetch()
    }

    fn configure(&mut self, settings: &Settings) {
        (**self).configure(settings)
    }
}

const SIM_INSTRUMENTS: [&str; 3] = ["TSLA", "NVDA", "MSFT"];
const SIM_EXCHANGES: [&str; 4] = ["A", "B", "C", "D"];
const SIM_COUNTERPARTIES: [&str; 3] = ["H", "J", "K"];
const SIM_SIDES: [Side; 2] = [Side::Buy, Side::Sell];
const SIM_QUANTITIES: [u64; 6] = [50, 100, 200, 500, 800, 1200];

/// Random trades around the current time. A stand-in for a real feed.
///
/// With a seed every fetch regenerates the same trades relative to "now".
#[derive(Debug, Clone)]
pub struct SimulatedProvider {
    rows: usize,
    seed: Option<u64>,
    anchor: Option<NaiveDateTime>,
}

impl SimulatedProvider {
    pub fn new(rows: usize, seed: Option<u64>) -> Self {
        Self {
            rows,
            seed,
            anchor: None,
        }
    }

    /// Generate around a fixed instant instead of the local clock.
    pub fn with_anchor(self, anchor: NaiveDateTime) -> Self {
        Self {
            anchor: Some(anchor),
            ..self
        }
    }

    fn generate(&self) -> Vec<TradeRecord> {
        let mut rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        let now = self.anchor.unwrap_or_else(|| Local::now().naive_local());

        let mut records: Vec<TradeRecord> = (0..self.rows.max(1))
            .map(|_| {
                let timestamp = now
                    + TimeDelta::minutes(rng.random_range(-120..=120))
                    + TimeDelta::seconds(rng.random_range(0..=59));
                let isin: String = std::iter::once("DE000".to_string())
                    .chain((0..7).map(|_| rng.random_range(0..10).to_string()))
                    .collect();
                let exec_price = (280.0 + rng.random::<f64>() * 45.0) * 100.0;

                TradeRecord {
                    time: timestamp.format(TIME_LABEL_FORMAT).to_string(),
                    timestamp: Some(timestamp),
                    instrument: SIM_INSTRUMENTS.choose(&mut rng).map(|s| s.to_string()),
                    exchange: SIM_EXCHANGES.choose(&mut rng).map(|s| s.to_string()),
                    counterparty: SIM_COUNTERPARTIES.choose(&mut rng).map(|s| s.to_string()),
                    isin: Some(isin),
                    side: SIM_SIDES.choose(&mut rng).copied(),
                    quantity: SIM_QUANTITIES.choose(&mut rng).copied(),
                    exec_price: Some(exec_price.round() / 100.0),
                    pnl: Some(rng.random_range(-1000..=100) as f64 * 0.15),
                    inter_arrival_secs: 0.0,
                }
            })
            .collect();

        records.shuffle(&mut rng);
        records
    }
}

impl Default for SimulatedProvider {
    fn default() -> Self {
        Self::new(DEFAULT_SIMULATED_ROWS, None)
    }
}

impl DataProvider for SimulatedProvider {
    fn describe(&self) -> String {
        format!("simulated ({} rows)", self.rows)
    }

    fn fetch(&mut self) -> Result<Snapshot, MonitorError> {
        Ok(Snapshot::new(self.generate()))
    }
}

/// Trades read from a CSV file on every fetch.
///
/// Headers are matched case-insensitively against [`Column::name`] and
/// [`Column::aliases`]; columns the file lacks are left empty. When the `BIS` setting parses
/// as an integer only rows with `qty > BIS` are kept.
#[derive(Debug, Clone)]
pub struct CsvProvider {
    path: PathBuf,
    min_quantity: Option<i64>,
}

impl CsvProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            min_quantity: None,
        }
    }

    fn read(&self) -> Result<Vec<TradeRecord>, MonitorError> {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_path(&self.path)?;

        let columns: Vec<Option<Column>> = reader
            .headers()?
            .iter()
            .map(Column::from_header)
            .collect();

        let missing: Vec<&str> = Column::ALL
            .iter()
            .filter(|column| !columns.contains(&Some(**column)))
            .map(Column::name)
            .collect();
        if !missing.is_empty() {
            debug!(path = %self.path.display(), ?missing, "csv lacks columns, left empty");
        }

        let mut records = Vec::new();
        for row in reader.records() {
            let row = row?;
            let mut record = TradeRecord::default();
            for (column, cell) in columns.iter().zip(row.iter()) {
                if let Some(column) = column {
                    assign_cell(&mut record, *column, cell);
                }
            }
            if record.time.is_empty() {
                if let Some(timestamp) = record.timestamp {
                    record.time = timestamp.format(TIME_LABEL_FORMAT).to_string();
                }
            }
            records.push(record);
        }

        Ok(records)
    }
}

impl DataProvider for CsvProvider {
    fn describe(&self) -> String {
        format!("csv {}", self.path.display())
    }

    fn fetch(&mut self) -> Result<Snapshot, MonitorError> {
        let mut records = self.read()?;
        if let Some(min_quantity) = self.min_quantity {
            records.retain(|record| {
                record
                    .quantity
                    .is_some_and(|qty| i128::from(qty) > i128::from(min_quantity))
            });
        }

        debug!(path = %self.path.display(), rows = records.len(), "csv snapshot read");
        Ok(Snapshot::new(records))
    }

    fn configure(&mut self, settings: &Settings) {
        self.min_quantity = settings.bis();
    }
}

fn non_empty(cell: &str) -> Option<String> {
    (!cell.is_empty()).then(|| cell.to_string())
}

fn assign_cell(record: &mut TradeRecord, column: Column, cell: &str) {
    match column {
        Column::Time => record.time = cell.to_string(),
        Column::Timestamp => record.timestamp = parse_timestamp(cell),
        Column::Instrument => record.instrument = non_empty(cell),
        Column::Exchange => record.exchange = non_empty(cell),
        Column::Counterparty => record.counterparty = non_empty(cell),
        Column::Isin => record.isin = non_empty(cell),
        Column::Side => record.side = Side::parse(cell),
        Column::Quantity => {
            record.quantity = parse_int(cell)
                .map(i64::unsigned_abs)
                .or_else(|| parse_number(cell).map(|qty| qty.abs().round() as u64))
        }
        Column::ExecPrice => record.exec_price = parse_number(cell),
        Column::Pnl => record.pnl = parse_number(cell),
        // Always re-derived by Snapshot::new
        Column::InterArrival => {}
    }
}

/// Parse a local date-time in the common spreadsheet/ISO spellings.
pub fn parse_timestamp(text: &str) -> Option<NaiveDateTime> {
    const FORMATS: [&str; 4] = [
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
        "%d/%m/%Y %H:%M:%S",
    ];

    let text = text.trim();
    FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::test_util::at;
    use std::collections::HashSet;

    #[test]
    fn test_simulated_provider_shape() {
        let anchor = at(12, 0, 0);
        let mut provider = SimulatedProvider::new(300, Some(7)).with_anchor(anchor);
        let snapshot = provider.fetch().unwrap();

        assert_eq!(snapshot.len(), 300);
        for record in &snapshot {
            let timestamp = record.timestamp.unwrap();
            assert!(timestamp >= anchor - TimeDelta::minutes(120));
            assert!(timestamp <= anchor + TimeDelta::minutes(121));
            assert_eq!(record.time, timestamp.format("%H:%M:%S").to_string());
            assert!(SIM_INSTRUMENTS.contains(&record.instrument.as_deref().unwrap()));
            assert!(SIM_EXCHANGES.contains(&record.exchange.as_deref().unwrap()));
            assert!(SIM_COUNTERPARTIES.contains(&record.counterparty.as_deref().unwrap()));
            assert!(SIM_QUANTITIES.contains(&record.quantity.unwrap()));

            let isin = record.isin.as_deref().unwrap();
            assert_eq!(isin.len(), 12);
            assert!(isin.starts_with("DE000"));
            assert!(isin[5..].chars().all(|c| c.is_ascii_digit()));

            let price = record.exec_price.unwrap();
            assert!((280.0..=325.0).contains(&price));

            let pnl = record.pnl.unwrap();
            assert!((-150.0..=15.0).contains(&pnl));
            assert!(record.inter_arrival_secs >= 0.0);
        }

        let instruments: HashSet<_> = snapshot.iter().filter_map(|r| r.instrument.clone()).collect();
        assert_eq!(instruments.len(), 3);
    }

    #[test]
    fn test_simulated_provider_seed_is_reproducible() {
        let anchor = at(12, 0, 0);
        let mut a = SimulatedProvider::new(50, Some(42)).with_anchor(anchor);
        let mut b = SimulatedProvider::new(50, Some(42)).with_anchor(anchor);
        assert_eq!(a.fetch().unwrap(), b.fetch().unwrap());
        assert_eq!(a.fetch().unwrap(), b.fetch().unwrap());

        let mut c = SimulatedProvider::new(50, Some(43)).with_anchor(anchor);
        assert_ne!(a.fetch().unwrap(), c.fetch().unwrap());

        assert_eq!(SimulatedProvider::new(0, None).fetch().unwrap().len(), 1);
    }

    fn write_csv(contents: &str) -> tempfile::NamedTempFile {
        use std::io::Write;
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_csv_provider_reads_legacy_headers() {
        let file = write_csv(
            "Time,nombre,Exchange,counterparty,ISIN,b/s,qty,exec price,PnL,TimeDT,inc_t_s\n\
             10:00:00,TSLA,A,H,DE0001,buy,100,301.5,\"(12.5)\",2025-03-14 10:00:00,99\n\
             10:00:04,TSLA,B,J,DE0002,SELL,\"1,200\",300,7,2025-03-14 10:00:04,99\n",
        );

        let snapshot = CsvProvider::new(file.path()).fetch().unwrap();
        assert_eq!(snapshot.len(), 2);

        let first = &snapshot.records()[0];
        assert_eq!(first.instrument.as_deref(), Some("TSLA"));
        assert_eq!(first.side, Some(Side::Buy));
        assert_eq!(first.pnl, Some(-12.5));
        assert_eq!(first.inter_arrival_secs, 0.0);

        let second = &snapshot.records()[1];
        assert_eq!(second.quantity, Some(1200));
        assert_eq!(second.side, Some(Side::Sell));
        assert_eq!(second.inter_arrival_secs, 4.0);
    }

    #[test]
    fn test_csv_provider_synthesizes_missing_columns() {
        let file = write_csv("Quantity,PnL,Timestamp\n50,1,2025-03-14T09:30:00\n500,2,garbage\n");

        let mut provider = CsvProvider::new(file.path());
        let snapshot = provider.fetch().unwrap();
        let first = &snapshot.records()[0];
        assert_eq!(first.exchange, None);
        assert_eq!(first.time, "09:30:00");
        assert_eq!(snapshot.records()[1].timestamp, None);

        provider.configure(&Settings {
            bis: "100".to_string(),
            ..Settings::default()
        });
        let filtered = provider.fetch().unwrap();
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered.records()[0].quantity, Some(500));
    }

    #[test]
    fn test_csv_provider_missing_file() {
        let mut provider = CsvProvider::new("/definitely/not/here.csv");
        assert!(matches!(provider.fetch(), Err(MonitorError::Csv(_))));
    }

    #[test]
    fn test_parse_timestamp() {
        assert_eq!(parse_timestamp("2025-03-14 10:00:05"), Some(at(10, 0, 5)));
        assert_eq!(parse_timestamp(" 2025-03-14T10:00:05.250 ").map(|t| t.date()), Some(at(0, 0, 0).date()));
        assert_eq!(parse_timestamp("14/03/2025 10:00:05"), Some(at(10, 0, 5)));
        assert_eq!(parse_timestamp("yesterday"), None);
    }
}
