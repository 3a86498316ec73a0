//! Composable per-column predicates over a [`Snapshot`].
//!
//! A [`FilterSpec`] holds one [`ColumnFilter`] per non-time column: a categorical "in-set"
//! selection for text columns and an inclusive `[min, max]` range for numeric columns.
//! Filters are ANDed. Applying a spec never mutates the source snapshot.

use crate::{
    error::MonitorError,
    snapshot::Snapshot,
    trade::{CellValue, Column, TradeRecord},
};
use indexmap::{IndexMap, IndexSet};
use tracing::debug;

/// Sentinel selection meaning "do not filter this column".
pub const MATCH_ALL: &str = "(All)";

#[derive(Debug, Clone, PartialEq)]
pub enum ColumnFilter {
    Categorical {
        /// [`MATCH_ALL`] followed by the sorted distinct values of the column.
        domain: Vec<String>,
        selected: IndexSet<String>,
    },
    Range {
        min: Option<f64>,
        max: Option<f64>,
    },
}

impl ColumnFilter {
    fn categorical(values: Vec<String>) -> Self {
        let domain = std::iter::once(MATCH_ALL.to_string())
            .chain(values)
            .collect();
        ColumnFilter::Categorical {
            domain,
            selected: IndexSet::from([MATCH_ALL.to_string()]),
        }
    }

    fn unbounded() -> Self {
        ColumnFilter::Range {
            min: None,
            max: None,
        }
    }

    /// Determine if this filter currently excludes anything.
    pub fn is_active(&self) -> bool {
        match self {
            ColumnFilter::Categorical { selected, .. } => {
                !selected.is_empty() && !selected.contains(MATCH_ALL)
            }
            ColumnFilter::Range { min, max } => min.is_some() || max.is_some(),
        }
    }

    /// Determine if `record` passes this filter on `column`.
    pub fn matches(&self, column: Column, record: &TradeRecord) -> bool {
        if !self.is_active() {
            return true;
        }

        match (self, record.cell(column)) {
            (ColumnFilter::Categorical { selected, .. }, cell) => cell
                .as_text()
                .is_some_and(|text| selected.contains(text.as_ref())),
            (ColumnFilter::Range { min, max }, CellValue::Number(value)) => {
                min.is_none_or(|min| value >= min) && max.is_none_or(|max| value <= max)
            }
            // Bound active but nothing to compare against
            (ColumnFilter::Range { .. }, _) => false,
        }
    }

    fn reset(&mut self) {
        match self {
            ColumnFilter::Categorical { selected, .. } => {
                selected.clear();
                selected.insert(MATCH_ALL.to_string());
            }
            ColumnFilter::Range { min, max } => {
                *min = None;
                *max = None;
            }
        }
    }
}

/// Per-column filter state, in declared column order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FilterSpec {
    filters: IndexMap<Column, ColumnFilter>,
}

impl FilterSpec {
    /// Build a fresh spec for the columns of `snapshot`: categorical columns select
    /// [`MATCH_ALL`] and numeric ranges are unbounded. Time columns are never filtered.
    pub fn build(snapshot: &Snapshot) -> Self {
        let filters = Column::ALL
            .into_iter()
            .filter(|column| !column.is_time())
            .map(|column| {
                let filter = if column.is_numeric() {
                    ColumnFilter::unbounded()
                } else {
                    ColumnFilter::categorical(snapshot.distinct_values(column))
                };
                (column, filter)
            })
            .collect();

        Self { filters }
    }

    /// Rebuild against a new snapshot if any categorical value domain changed.
    ///
    /// Previous selections and bounds carry over for columns that persist. Selected values no
    /// longer present in the new domain are dropped, falling back to [`MATCH_ALL`] when none
    /// survive. Returns `true` if the spec was rebuilt.
    pub fn rebuild(&mut self, snapshot: &Snapshot) -> bool {
        let mut fresh = Self::build(snapshot);
        if fresh.domains_eq(self) {
            return false;
        }

        for (column, next) in fresh.filters.iter_mut() {
            let Some(prev) = self.filters.get(column) else {
                continue;
            };

            match (prev, next) {
                (
                    ColumnFilter::Categorical { selected: prev, .. },
                    ColumnFilter::Categorical { domain, selected },
                ) => {
                    let kept: IndexSet<String> = prev
                        .iter()
                        .filter(|value| domain.contains(*value))
                        .cloned()
                        .collect();
                    if !kept.is_empty() {
                        *selected = kept;
                    }
                }
                (
                    ColumnFilter::Range { min, max },
                    ColumnFilter::Range {
                        min: next_min,
                        max: next_max,
                    },
                ) => {
                    *next_min = *min;
                    *next_max = *max;
                }
                _ => {}
            }
        }

        debug!(columns = fresh.filters.len(), "filter spec rebuilt for new value domains");
        *self = fresh;
        true
    }

    fn domains_eq(&self, other: &Self) -> bool {
        self.filters.len() == other.filters.len()
            && self.filters.iter().all(|(column, filter)| {
                match (filter, other.filters.get(column)) {
                    (
                        ColumnFilter::Categorical { domain: a, .. },
                        Some(ColumnFilter::Categorical { domain: b, .. }),
                    ) => a == b,
                    (ColumnFilter::Range { .. }, Some(ColumnFilter::Range { .. })) => true,
                    _ => false,
                }
            })
    }

    /// Reset every categorical filter to [`MATCH_ALL`] and every range to unbounded.
    pub fn clear_all(&mut self) {
        self.filters.values_mut().for_each(ColumnFilter::reset);
    }

    pub fn get(&self, column: Column) -> Option<&ColumnFilter> {
        self.filters.get(&column)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Column, &ColumnFilter)> {
        self.filters.iter()
    }

    pub fn columns(&self) -> impl Iterator<Item = Column> + '_ {
        self.filters.keys().copied()
    }

    /// Determine if any column filter is excluding rows.
    pub fn is_active(&self) -> bool {
        self.filters.values().any(ColumnFilter::is_active)
    }

    /// Toggle `value` in the selection of categorical `column`.
    ///
    /// Toggling [`MATCH_ALL`] resets the selection. Selecting a concrete value drops the
    /// sentinel, and deselecting the last concrete value restores it. Returns `false` if the
    /// column is not categorical or `value` is not in its domain.
    pub fn toggle(&mut self, column: Column, value: &str) -> bool {
        let Some(ColumnFilter::Categorical { domain, selected }) = self.filters.get_mut(&column)
        else {
            return false;
        };
        if !domain.iter().any(|candidate| candidate == value) {
            return false;
        }

        if value == MATCH_ALL {
            selected.clear();
            selected.insert(MATCH_ALL.to_string());
            return true;
        }

        selected.shift_remove(MATCH_ALL);
        if !selected.shift_remove(value) {
            selected.insert(value.to_string());
        }
        if selected.is_empty() {
            selected.insert(MATCH_ALL.to_string());
        }
        true
    }

    /// Replace the selection of categorical `column`. Values outside the domain are ignored;
    /// an empty result selects [`MATCH_ALL`].
    pub fn select<I, S>(&mut self, column: Column, values: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let Some(ColumnFilter::Categorical { domain, selected }) = self.filters.get_mut(&column)
        else {
            return false;
        };

        selected.clear();
        for value in values {
            let value = value.as_ref();
            if domain.iter().any(|candidate| candidate == value) {
                selected.insert(value.to_string());
            }
        }
        if selected.is_empty() {
            selected.insert(MATCH_ALL.to_string());
        }
        true
    }

    /// Set the inclusive bounds of numeric `column`.
    pub fn set_range(
        &mut self,
        column: Column,
        min: Option<f64>,
        max: Option<f64>,
    ) -> Result<(), MonitorError> {
        match self.filters.get_mut(&column) {
            Some(ColumnFilter::Range {
                min: current_min,
                max: current_max,
            }) => {
                *current_min = min;
                *current_max = max;
                Ok(())
            }
            _ => Err(MonitorError::NotNumeric(column)),
        }
    }
}

/// Produce the view of `snapshot` whose rows pass every filter in `spec`, preserving the
/// relative row order.
pub fn apply_filters(snapshot: &Snapshot, spec: &FilterSpec) -> Snapshot {
    let active: Vec<(Column, &ColumnFilter)> = spec
        .iter()
        .filter(|(_, filter)| filter.is_active())
        .map(|(column, filter)| (*column, filter))
        .collect();

    if active.is_empty() {
        return snapshot.clone();
    }

    let records = snapshot
        .iter()
        .filter(|record| active.iter().all(|(column, filter)| filter.matches(*column, record)))
        .cloned()
        .collect();

    Snapshot::from_derived(records)
}
