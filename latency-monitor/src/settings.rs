//! Flat, tolerant settings record persisted as JSON.
//!
//! Every field accepts either a JSON number or a string and is coerced through
//! [`crate::numeric`] at the point of use, so a hand-edited file never fails to load because
//! of `"800"` vs `800`.

use crate::{
    error::MonitorError,
    numeric::{parse_int, parse_number},
    trade::TradeRecord,
};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::{path::Path, time::Duration};
use tracing::{info, warn};

/// Default refresh interval written to new settings files.
pub const DEFAULT_REFRESH_MS: i64 = 3500;

/// Refresh interval used when a stored value cannot be parsed.
pub const FALLBACK_REFRESH_MS: i64 = 5000;

/// Inclusive bounds applied to the refresh interval.
pub const REFRESH_MS_BOUNDS: (i64, i64) = (200, 30_000);

pub const DEFAULT_PNL_BIN_WIDTH: f64 = 5.0;
pub const DEFAULT_DT_BIN_WIDTH: f64 = 10.0;

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    #[serde(deserialize_with = "de_refresh_ms")]
    pub refresh_ms: i64,
    /// Highlight rows whose quantity exceeds this.
    #[serde(deserialize_with = "de_lenient_text")]
    pub hl_qty: String,
    /// ... and whose PnL exceeds this.
    #[serde(deserialize_with = "de_lenient_text")]
    pub hl_pnl: String,
    /// Free-text token handed to data providers, eg/ a minimum quantity.
    #[serde(rename = "BIS", deserialize_with = "de_lenient_text")]
    pub bis: String,
    #[serde(deserialize_with = "de_lenient_text")]
    pub bin_width: String,
    #[serde(deserialize_with = "de_lenient_text")]
    pub dt_bin: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            refresh_ms: DEFAULT_REFRESH_MS,
            hl_qty: "800".to_string(),
            hl_pnl: "0".to_string(),
            bis: String::new(),
            bin_width: "5".to_string(),
            dt_bin: "10".to_string(),
        }
    }
}

impl Settings {
    /// Load settings from `path`, missing keys taking their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, MonitorError> {
        let path = path.as_ref();
        let value: Value = serde_json::from_str(&std::fs::read_to_string(path)?)?;
        if !value.is_object() {
            return Err(MonitorError::InvalidSettings(format!(
                "{} must contain an object at top-level",
                path.display()
            )));
        }

        let settings = serde_json::from_value(value)?;
        info!(path = %path.display(), "settings loaded");
        Ok(settings)
    }

    /// Startup load: a missing file silently yields defaults, an unreadable or malformed one
    /// yields defaults with a warning.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        if !path.is_file() {
            info!(path = %path.display(), "no settings file, using defaults");
            return Self::default();
        }

        Self::load(path).unwrap_or_else(|error| {
            warn!(path = %path.display(), %error, "failed to load settings, using defaults");
            Self::default()
        })
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), MonitorError> {
        let path = path.as_ref();
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        info!(path = %path.display(), "settings saved");
        Ok(())
    }

    /// Refresh timer interval, clamped to [`REFRESH_MS_BOUNDS`].
    pub fn refresh_interval(&self) -> Duration {
        let (min, max) = REFRESH_MS_BOUNDS;
        Duration::from_millis(self.refresh_ms.clamp(min, max) as u64)
    }

    /// Adjust `refresh_ms` by `delta_ms`, staying within [`REFRESH_MS_BOUNDS`].
    pub fn nudge_refresh(&mut self, delta_ms: i64) {
        let (min, max) = REFRESH_MS_BOUNDS;
        self.refresh_ms = self.refresh_ms.saturating_add(delta_ms).clamp(min, max);
    }

    pub fn highlight_rule(&self) -> HighlightRule {
        HighlightRule {
            qty: parse_number(&self.hl_qty).unwrap_or(f64::INFINITY),
            pnl: parse_number(&self.hl_pnl).unwrap_or(f64::INFINITY),
        }
    }

    pub fn pnl_bin_width(&self) -> f64 {
        positive_or(&self.bin_width, DEFAULT_PNL_BIN_WIDTH)
    }

    pub fn dt_bin_width(&self) -> f64 {
        positive_or(&self.dt_bin, DEFAULT_DT_BIN_WIDTH)
    }

    /// `BIS` token as an integer, if it parses as one.
    pub fn bis(&self) -> Option<i64> {
        parse_int(&self.bis)
    }
}

fn positive_or(text: &str, default: f64) -> f64 {
    parse_number(text)
        .filter(|value| *value > 0.0)
        .unwrap_or(default)
}

/// Row highlight predicate `qty > qty_threshold AND pnl > pnl_threshold`.
///
/// An unparseable threshold becomes `+inf`, so nothing is highlighted.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct HighlightRule {
    pub qty: f64,
    pub pnl: f64,
}

impl HighlightRule {
    pub fn matches(&self, record: &TradeRecord) -> bool {
        match (record.quantity, record.pnl) {
            (Some(qty), Some(pnl)) => qty as f64 > self.qty && pnl > self.pnl,
            _ => false,
        }
    }
}

fn de_lenient_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(text) => text.trim().to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    })
}

fn de_refresh_ms<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let parsed = match Value::deserialize(deserializer)? {
        Value::Number(number) => number
            .as_i64()
            .or_else(|| number.as_f64().map(|value| value.round() as i64)),
        Value::String(text) => parse_int(&text).or_else(|| parse_number(&text).map(|value| value.round() as i64)),
        _ => None,
    };

    Ok(parsed.unwrap_or(FALLBACK_REFRESH_MS))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn load_str(json: &str) -> Result<Settings, MonitorError> {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(json.as_bytes()).unwrap();
        Settings::load(file.path())
    }

    #[test]
    fn test_load_merges_over_defaults() {
        let settings = load_str(r#"{"hl_qty": 500, "BIS": " 100 ", "unknown": true}"#).unwrap();
        assert_eq!(
            settings,
            Settings {
                hl_qty: "500".to_string(),
                bis: "100".to_string(),
                ..Settings::default()
            }
        );
        assert_eq!(settings.bis(), Some(100));
    }

    #[test]
    fn test_load_tolerant_refresh_ms() {
        struct TestCase {
            input: &'static str,
            expected: i64,
        }

        let tests = vec![
            TestCase {
                // TC0: integer
                input: r#"{"refresh_ms": 1000}"#,
                expected: 1000,
            },
            TestCase {
                // TC1: string with grouping
                input: r#"{"refresh_ms": "2,500"}"#,
                expected: 2500,
            },
            TestCase {
                // TC2: float rounds
                input: r#"{"refresh_ms": 750.6}"#,
                expected: 751,
            },
            TestCase {
                // TC3: garbage falls back
                input: r#"{"refresh_ms": "soon"}"#,
                expected: FALLBACK_REFRESH_MS,
            },
            TestCase {
                // TC4: missing uses default
                input: r#"{}"#,
                expected: DEFAULT_REFRESH_MS,
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let actual = load_str(test.input).unwrap().refresh_ms;
            assert_eq!(actual, test.expected, "TC{} failed", index);
        }
    }

    #[test]
    fn test_load_rejects_non_object() {
        assert!(matches!(load_str("[1, 2]"), Err(MonitorError::InvalidSettings(_))));
        assert!(matches!(load_str("{not json"), Err(MonitorError::Json(_))));
        assert!(matches!(
            Settings::load("/definitely/not/here/settings.json"),
            Err(MonitorError::Io(_))
        ));
    }

    #[test]
    fn test_load_or_default() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(Settings::load_or_default(dir.path().join("missing.json")), Settings::default());

        let broken = dir.path().join("broken.json");
        std::fs::write(&broken, "\"just a string\"").unwrap();
        assert_eq!(Settings::load_or_default(&broken), Settings::default());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let settings = Settings {
            refresh_ms: 1200,
            hl_pnl: "-5".to_string(),
            bis: "200".to_string(),
            ..Settings::default()
        };

        settings.save(&path).unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("\"BIS\": \"200\""));
        assert_eq!(Settings::load(&path).unwrap(), settings);
    }

    #[test]
    fn test_refresh_interval_is_clamped() {
        let mut settings = Settings {
            refresh_ms: 50,
            ..Settings::default()
        };
        assert_eq!(settings.refresh_interval(), Duration::from_millis(200));

        settings.refresh_ms = 90_000;
        assert_eq!(settings.refresh_interval(), Duration::from_millis(30_000));

        settings.nudge_refresh(-100_000);
        assert_eq!(settings.refresh_ms, 200);
        settings.nudge_refresh(500);
        assert_eq!(settings.refresh_ms, 700);
    }

    #[test]
    fn test_derived_values() {
        let settings = Settings {
            hl_qty: "1,000".to_string(),
            hl_pnl: "n/a".to_string(),
            bin_width: "-2".to_string(),
            dt_bin: "2.5".to_string(),
            bis: "".to_string(),
            ..Settings::default()
        };

        assert_eq!(
            settings.highlight_rule(),
            HighlightRule {
                qty: 1000.0,
                pnl: f64::INFINITY
            }
        );
        assert_eq!(settings.pnl_bin_width(), DEFAULT_PNL_BIN_WIDTH);
        assert_eq!(settings.dt_bin_width(), 2.5);
        assert_eq!(settings.bis(), None);
    }

    #[test]
    fn test_highlight_rule() {
        let rule = Settings::default().highlight_rule();
        let record = |quantity, pnl| TradeRecord {
            quantity,
            pnl,
            ..TradeRecord::default()
        };

        assert!(rule.matches(&record(Some(1200), Some(0.5))));
        assert!(!rule.matches(&record(Some(800), Some(10.0))));
        assert!(!rule.matches(&record(Some(1200), Some(0.0))));
        assert!(!rule.matches(&record(None, Some(10.0))));
    }
}
