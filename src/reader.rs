//! Input workbook parser
//!
//! Reads the first worksheet with no assumed header. Only the first three
//! columns matter: name, version and declared status. Blank rows and any
//! header row are skipped.

use crate::error::LicenseCheckError;
use crate::models::InputRecord;
use crate::Result;
use calamine::{open_workbook_auto, Data, Range, Reader};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Name-column labels that mark a header row.
const HEADER_LABELS: &[&str] = &["nome", "name", "software"];

/// Placeholder some exporters write for an empty cell.
const MISSING_MARKER: &str = "nan";

const NAME_COL: u32 = 0;
const VERSION_COL: u32 = 1;
const STATUS_COL: u32 = 2;

pub struct SpreadsheetReader {
    path: PathBuf,
}

impl SpreadsheetReader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Parse the workbook into input records, in sheet order.
    pub fn read_records(&self) -> Result<Vec<InputRecord>> {
        if !self.path.exists() {
            return Err(LicenseCheckError::NotFound(self.path.clone()));
        }

        let mut workbook = open_workbook_auto(&self.path).map_err(|e| {
            LicenseCheckError::Malformed(format!("{}: {}", self.path.display(), e))
        })?;

        let range = match workbook.worksheet_range_at(0) {
            Some(Ok(range)) => range,
            Some(Err(e)) => {
                return Err(LicenseCheckError::Malformed(format!(
                    "{}: {}",
                    self.path.display(),
                    e
                )))
            }
            None => {
                warn!(path = %self.path.display(), "Workbook has no worksheets");
                return Ok(Vec::new());
            }
        };

        let records = records_from_range(&range);
        info!(path = %self.path.display(), count = records.len(), "Loaded input records");
        Ok(records)
    }
}

/// Build records from a worksheet range using absolute cell positions.
pub fn records_from_range(range: &Range<Data>) -> Vec<InputRecord> {
    let (Some((first_row, _)), Some((last_row, _))) = (range.start(), range.end()) else {
        return Vec::new();
    };

    let mut records = Vec::new();

    for row in first_row..=last_row {
        let name_cell = range.get_value((row, NAME_COL));
        let version = cell_text(range.get_value((row, VERSION_COL)));
        let status = cell_text(range.get_value((row, STATUS_COL)));

        if let Some(Data::Error(e)) = name_cell {
            warn!(row = row + 1, error = ?e, "Skipping row with unreadable name cell");
            continue;
        }

        let name = cell_text(name_cell);

        let Some(name) = name else {
            if version.is_some() || status.is_some() {
                debug!(row = row + 1, "Skipping row without a software name");
            }
            continue;
        };

        if is_header_label(&name) {
            debug!(row = row + 1, label = %name, "Skipping header row");
            continue;
        }

        match InputRecord::new(name, version, status) {
            Ok(record) => records.push(record),
            Err(e) => warn!(row = row + 1, error = %e, "Skipping invalid row"),
        }
    }

    records
}

fn is_header_label(name: &str) -> bool {
    HEADER_LABELS
        .iter()
        .any(|label| name.eq_ignore_ascii_case(label))
}

/// Trimmed cell text; empty cells, error cells and "nan" are absent.
fn cell_text(cell: Option<&Data>) -> Option<String> {
    let text = match cell? {
        Data::Empty | Data::Error(_) => return None,
        Data::String(s) => s.trim().to_string(),
        // whole-number floats are how spreadsheets store "2019" or "11"
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", *f as i64),
        other => other.to_string().trim().to_string(),
    };

    if text.is_empty() || text.eq_ignore_ascii_case(MISSING_MARKER) {
        None
    } else {
        Some(text)
    }
}
