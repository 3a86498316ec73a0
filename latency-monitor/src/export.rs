use crate::{error::MonitorError, snapshot::Snapshot, trade::Column};
use std::path::Path;
use tracing::info;

/// Write the display columns of `snapshot` to `path` as CSV, in [`Column::DISPLAY`] order.
///
/// Returns the number of data rows written. An empty snapshot is refused with
/// [`MonitorError::NothingToExport`] and no file is created.
pub fn export_csv(path: impl AsRef<Path>, snapshot: &Snapshot) -> Result<usize, MonitorError> {
    if snapshot.is_empty() {
        return Err(MonitorError::NothingToExport);
    }

    let path = path.as_ref();
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(Column::DISPLAY.iter().map(Column::name))?;

    for record in snapshot {
        writer.write_record(Column::DISPLAY.iter().map(|column| {
            record
                .cell(*column)
                .as_text()
                .map(|text| text.into_owned())
                .unwrap_or_default()
        }))?;
    }
    writer.flush()?;

    info!(path = %path.display(), rows = snapshot.len(), "exported filtered view");
    Ok(snapshot.len())
}
