use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::{borrow::Cow, fmt::Display};

use crate::numeric::{ColumnKind, format_value};

/// Timestamp format used for the raw `TimeDT` column when rendered or exported.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Time-of-day label format of the `Time` column.
pub const TIME_LABEL_FORMAT: &str = "%H:%M:%S";

/// Order side (Buy or Sell)
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// Convert to display string
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "buy",
            Side::Sell => "sell",
        }
    }

    /// Parse a side label, accepting `buy`/`sell`/`b`/`s` in any case.
    pub fn parse(text: &str) -> Option<Self> {
        match text.trim().to_ascii_lowercase().as_str() {
            "buy" | "b" => Some(Side::Buy),
            "sell" | "s" => Some(Side::Sell),
            _ => None,
        }
    }
}

impl Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One executed trade as delivered by a data provider.
///
/// Any field may be missing when the provider omits the column or the cell fails to parse.
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
pub struct TradeRecord {
    /// Time-of-day label (`HH:MM:SS`).
    pub time: String,
    /// Full local date-time of the execution.
    pub timestamp: Option<NaiveDateTime>,
    pub instrument: Option<String>,
    pub exchange: Option<String>,
    pub counterparty: Option<String>,
    /// ISIN-like instrument identifier.
    pub isin: Option<String>,
    pub side: Option<Side>,
    pub quantity: Option<u64>,
    pub exec_price: Option<f64>,
    pub pnl: Option<f64>,
    /// Seconds since the previous trade of the same instrument, derived by
    /// [`Snapshot::new`](crate::snapshot::Snapshot::new).
    pub inter_arrival_secs: f64,
}

impl TradeRecord {
    /// Traded notional, `|quantity| * |exec price|`.
    pub fn notional(&self) -> Option<f64> {
        Some(self.quantity? as f64 * self.exec_price?.abs())
    }

    /// Borrow the value held in `column`.
    pub fn cell(&self, column: Column) -> CellValue<'_> {
        match column {
            Column::Time => CellValue::text(Some(self.time.as_str())),
            Column::Instrument => CellValue::text(self.instrument.as_deref()),
            Column::Exchange => CellValue::text(self.exchange.as_deref()),
            Column::Counterparty => CellValue::text(self.counterparty.as_deref()),
            Column::Isin => CellValue::text(self.isin.as_deref()),
            Column::Side => CellValue::text(self.side.map(|side| side.as_str())),
            Column::Quantity => CellValue::number(self.quantity.map(|qty| qty as f64)),
            Column::ExecPrice => CellValue::number(self.exec_price),
            Column::Pnl => CellValue::number(self.pnl),
            Column::InterArrival => CellValue::Number(self.inter_arrival_secs),
            Column::Timestamp => self
                .timestamp
                .map(CellValue::Time)
                .unwrap_or(CellValue::Missing),
        }
    }

    /// Render `column` for the trades table.
    pub fn display_cell(&self, column: Column) -> String {
        match (column, self.cell(column)) {
            (Column::ExecPrice, CellValue::Number(price)) => format!("{price:.2}"),
            (_, CellValue::Number(value)) => column
                .kind()
                .map(|kind| format_value(value, kind))
                .unwrap_or_else(|| value.to_string()),
            (_, cell) => cell.as_text().map(Cow::into_owned).unwrap_or_default(),
        }
    }
}

/// Borrowed view of a single cell.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum CellValue<'a> {
    Text(&'a str),
    Number(f64),
    Time(NaiveDateTime),
    Missing,
}

impl<'a> CellValue<'a> {
    fn text(value: Option<&'a str>) -> Self {
        value.map(CellValue::Text).unwrap_or(CellValue::Missing)
    }

    fn number(value: Option<f64>) -> Self {
        value.map(CellValue::Number).unwrap_or(CellValue::Missing)
    }

    /// Numeric value, if this cell holds one.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Number(value) => Some(*value),
            _ => None,
        }
    }

    /// Stringified value used for categorical matching and CSV output.
    pub fn as_text(&self) -> Option<Cow<'a, str>> {
        match self {
            CellValue::Text(text) => Some(Cow::Borrowed(*text)),
            CellValue::Number(value) => Some(Cow::Owned(value.to_string())),
            CellValue::Time(time) => Some(Cow::Owned(time.format(TIMESTAMP_FORMAT).to_string())),
            CellValue::Missing => None,
        }
    }
}

/// Named column of a [`TradeRecord`].
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd, Deserialize, Serialize)]
pub enum Column {
    Time,
    Instrument,
    Exchange,
    Counterparty,
    Isin,
    Side,
    Quantity,
    ExecPrice,
    Pnl,
    InterArrival,
    Timestamp,
}

impl Column {
    /// Every column, in declared order.
    pub const ALL: [Column; 11] = [
        Column::Time,
        Column::Instrument,
        Column::Exchange,
        Column::Counterparty,
        Column::Isin,
        Column::Side,
        Column::Quantity,
        Column::ExecPrice,
        Column::Pnl,
        Column::InterArrival,
        Column::Timestamp,
    ];

    /// Columns rendered in the trades table and written by the CSV export.
    pub const DISPLAY: [Column; 10] = [
        Column::Time,
        Column::Instrument,
        Column::Exchange,
        Column::Counterparty,
        Column::Isin,
        Column::Side,
        Column::Quantity,
        Column::ExecPrice,
        Column::Pnl,
        Column::InterArrival,
    ];

    /// Header label.
    pub fn name(&self) -> &'static str {
        match self {
            Column::Time => "Time",
            Column::Instrument => "Instrument",
            Column::Exchange => "Exchange",
            Column::Counterparty => "Counterparty",
            Column::Isin => "ISIN",
            Column::Side => "Side",
            Column::Quantity => "Qty",
            Column::ExecPrice => "Exec Price",
            Column::Pnl => "PnL",
            Column::InterArrival => "Δt (s)",
            Column::Timestamp => "TimeDT",
        }
    }

    /// Header spellings recognised when reading external tables, lower case.
    pub fn aliases(&self) -> &'static [&'static str] {
        match self {
            Column::Time => &["time"],
            Column::Instrument => &["instrument", "nombre", "name", "symbol"],
            Column::Exchange => &["exchange"],
            Column::Counterparty => &["counterparty", "cp"],
            Column::Isin => &["isin"],
            Column::Side => &["side", "b/s"],
            Column::Quantity => &["qty", "quantity"],
            Column::ExecPrice => &["exec price", "exec_price", "price"],
            Column::Pnl => &["pnl"],
            Column::InterArrival => &["δt (s)", "inc_t_s", "inter_arrival_secs"],
            Column::Timestamp => &["timedt", "timestamp"],
        }
    }

    /// Resolve a header label to a column, case-insensitively.
    pub fn from_header(header: &str) -> Option<Self> {
        let header = header.trim().to_lowercase();
        Column::ALL
            .into_iter()
            .find(|column| column.name().to_lowercase() == header || column.aliases().contains(&header.as_str()))
    }

    /// Determine if the column holds numeric values.
    pub fn is_numeric(&self) -> bool {
        self.kind().is_some()
    }

    /// Determine if the column is one of the time columns, which are never filtered.
    pub fn is_time(&self) -> bool {
        matches!(self, Column::Time | Column::Timestamp)
    }

    /// Rendering rule of numeric columns.
    pub fn kind(&self) -> Option<ColumnKind> {
        match self {
            Column::Quantity => Some(ColumnKind::Integer),
            Column::ExecPrice | Column::InterArrival => Some(ColumnKind::Float),
            Column::Pnl => Some(ColumnKind::Money),
            _ => None,
        }
    }
}

impl Display for Column {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn record() -> TradeRecord {
        TradeRecord {
            time: "10:00:05".to_string(),
            timestamp: NaiveDate::from_ymd_opt(2025, 3, 14)
                .and_then(|day| day.and_hms_opt(10, 0, 5)),
            instrument: Some("TSLA".to_string()),
            exchange: Some("A".to_string()),
            counterparty: None,
            isin: Some("DE0001234567".to_string()),
            side: Some(Side::Sell),
            quantity: Some(1200),
            exec_price: Some(-301.25),
            pnl: Some(-12.34),
            inter_arrival_secs: 5.0,
        }
    }

    #[test]
    fn test_cell_access() {
        let record = record();
        assert_eq!(record.cell(Column::Exchange), CellValue::Text("A"));
        assert_eq!(record.cell(Column::Counterparty), CellValue::Missing);
        assert_eq!(record.cell(Column::Side), CellValue::Text("sell"));
        assert_eq!(record.cell(Column::Quantity).as_f64(), Some(1200.0));
        assert_eq!(
            record.cell(Column::Timestamp).as_text().as_deref(),
            Some("2025-03-14 10:00:05")
        );
    }

    #[test]
    fn test_notional_uses_absolute_price() {
        assert_eq!(record().notional(), Some(1200.0 * 301.25));
        let no_qty = TradeRecord {
            quantity: None,
            ..record()
        };
        assert_eq!(no_qty.notional(), None);
    }

    #[test]
    fn test_display_cell() {
        let record = record();
        assert_eq!(record.display_cell(Column::Quantity), "1,200");
        assert_eq!(record.display_cell(Column::Pnl), "\u{2212}12.3");
        assert_eq!(record.display_cell(Column::ExecPrice), "-301.25");
        assert_eq!(record.display_cell(Column::Counterparty), "");
    }

    #[test]
    fn test_column_from_header() {
        struct TestCase {
            input: &'static str,
            expected: Option<Column>,
        }

        let tests = vec![
            TestCase {
                // TC0: display name
                input: "Exec Price",
                expected: Some(Column::ExecPrice),
            },
            TestCase {
                // TC1: legacy header
                input: "nombre",
                expected: Some(Column::Instrument),
            },
            TestCase {
                // TC2: case insensitive alias
                input: "B/S",
                expected: Some(Column::Side),
            },
            TestCase {
                // TC3: raw timestamp header
                input: "TimeDT",
                expected: Some(Column::Timestamp),
            },
            TestCase {
                // TC4: unknown header
                input: "venue_fee",
                expected: None,
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let actual = Column::from_header(test.input);
            assert_eq!(actual, test.expected, "TC{} failed", index);
        }
    }

    #[test]
    fn test_side_parse() {
        assert_eq!(Side::parse("BUY"), Some(Side::Buy));
        assert_eq!(Side::parse(" s "), Some(Side::Sell));
        assert_eq!(Side::parse("hold"), None);
    }
}
