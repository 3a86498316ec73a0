use crate::{
    snapshot::Snapshot,
    trade::{Column, TradeRecord},
};
use std::{cmp::Ordering, collections::HashMap};

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl SortDirection {
    fn flip(self) -> Self {
        match self {
            SortDirection::Ascending => SortDirection::Descending,
            SortDirection::Descending => SortDirection::Ascending,
        }
    }

    pub fn arrow(&self) -> &'static str {
        match self {
            SortDirection::Ascending => "▲",
            SortDirection::Descending => "▼",
        }
    }
}

/// Toggle-on-request sort of the trades table.
///
/// Each column remembers its last direction; requesting a column flips it, starting with
/// [`SortDirection::Descending`]. Sorting is stable and missing cells always sort last.
#[derive(Debug, Clone, Default)]
pub struct SortState {
    active: Option<(Column, SortDirection)>,
    last: HashMap<Column, SortDirection>,
}

impl SortState {
    /// Request a sort on `column`, returning the direction now in effect.
    pub fn toggle(&mut self, column: Column) -> SortDirection {
        let direction = self
            .last
            .get(&column)
            .copied()
            .unwrap_or(SortDirection::Ascending)
            .flip();
        self.last.insert(column, direction);
        self.active = Some((column, direction));
        direction
    }

    pub fn active(&self) -> Option<(Column, SortDirection)> {
        self.active
    }

    /// Re-apply the active sort, if any, to `snapshot`.
    pub fn apply(&self, snapshot: &mut Snapshot) {
        let Some((column, direction)) = self.active else {
            return;
        };

        snapshot.sort_by(|a, b| compare_records(a, b, column, direction));
    }
}

fn compare_records(
    a: &TradeRecord,
    b: &TradeRecord,
    column: Column,
    direction: SortDirection,
) -> Ordering {
    // Time labels order by the underlying timestamp
    let column = if column == Column::Time {
        Column::Timestamp
    } else {
        column
    };

    let (left, right) = (a.cell(column), b.cell(column));
    let ordering = match (left.as_f64(), right.as_f64()) {
        (Some(x), Some(y)) => x.total_cmp(&y),
        _ => match (left.as_text(), right.as_text()) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => return Ordering::Less,
            (None, Some(_)) => return Ordering::Greater,
            (None, None) => return Ordering::Equal,
        },
    };

    match direction {
        SortDirection::Ascending => ordering,
        SortDirection::Descending => ordering.reverse(),
    }
}
