//! Results workbook writer
//!
//! Persists one row per verification result in the fixed nine-column layout.
//! The plain data is saved first; the styled workbook is then written to a
//! sibling temp file and renamed over it, so a styling failure never loses
//! data.

use crate::error::LicenseCheckError;
use crate::models::{ResultRow, VerificationResult, VerifiedStatus, RESULT_COLUMNS};
use crate::Result;
use rust_xlsxwriter::{Color, Format, FormatAlign, FormatBorder, Workbook, Worksheet};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

const SHEET_NAME: &str = "Results";

const HEADER_FILL: u32 = 0x366092;
const HEADER_FONT_SIZE: f64 = 11.0;

/// Widths for the columns in [`RESULT_COLUMNS`] order.
const COLUMN_WIDTHS: [f64; 9] = [30.0, 15.0, 18.0, 18.0, 20.0, 25.0, 40.0, 12.0, 50.0];

const STATUS_COL: u16 = 3;
const CONFIDENCE_COL: u16 = 7;

/// Short status-like columns that are centred instead of wrapped.
const CENTRED_COLUMNS: [u16; 3] = [2, STATUS_COL, CONFIDENCE_COL];

const GOOD_FILL: u32 = 0xC6EFCE;
const NEUTRAL_FILL: u32 = 0xFFEB9C;
const BAD_FILL: u32 = 0xFFC7CE;
const GOOD_TEXT: u32 = 0x006100;
const BAD_TEXT: u32 = 0x9C0006;

/// Fill colour for a confidence cell.
pub fn confidence_fill(confidence: u8) -> u32 {
    match confidence {
        80.. => GOOD_FILL,
        50..=79 => NEUTRAL_FILL,
        _ => BAD_FILL,
    }
}

/// Fill and font colour for a verified-status cell.
pub fn status_colors(status: VerifiedStatus) -> (u32, u32) {
    match status {
        VerifiedStatus::Yes => (BAD_FILL, BAD_TEXT),
        VerifiedStatus::No => (GOOD_FILL, GOOD_TEXT),
        VerifiedStatus::Error => (BAD_FILL, 0x000000),
    }
}

pub struct ResultWriter {
    path: PathBuf,
}

impl ResultWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write every result to the output workbook.
    ///
    /// Returns `false` only when the data itself could not be persisted.
    pub fn write_results(&self, results: &[VerificationResult]) -> bool {
        let rows: Vec<ResultRow> = results.iter().map(VerificationResult::to_row).collect();

        if let Err(e) = self.save_plain(&rows) {
            error!(path = %self.path.display(), error = %e, "Failed to write results");
            return false;
        }

        info!(path = %self.path.display(), rows = rows.len(), "Results saved");

        if let Err(e) = self.apply_styling(&rows) {
            warn!(error = %e, "Could not apply formatting; plain results kept");
        }

        true
    }

    fn save_plain(&self, rows: &[ResultRow]) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let mut workbook = Workbook::new();
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(SHEET_NAME)?;

        for (col, title) in RESULT_COLUMNS.iter().enumerate() {
            worksheet.write_string(0, col as u16, *title)?;
        }
        for (i, row) in rows.iter().enumerate() {
            let r = i as u32 + 1;
            for (col, text) in text_cells(row) {
                worksheet.write_string(r, col, text)?;
            }
            worksheet.write_number(r, CONFIDENCE_COL, f64::from(row.confidence))?;
        }

        workbook.save(&self.path)?;
        Ok(())
    }

    fn apply_styling(&self, rows: &[ResultRow]) -> Result<()> {
        let staging = self.staging_path()?;

        let mut workbook = Workbook::new();
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(SHEET_NAME)?;
        write_styled(worksheet, rows)?;

        if let Err(e) = workbook.save(&staging) {
            let _ = fs::remove_file(&staging);
            return Err(e.into());
        }
        if let Err(e) = fs::rename(&staging, &self.path) {
            let _ = fs::remove_file(&staging);
            return Err(e.into());
        }

        info!("Formatting applied");
        Ok(())
    }

    fn staging_path(&self) -> Result<PathBuf> {
        let file_name = self
            .path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                LicenseCheckError::Spreadsheet(format!(
                    "output path has no file name: {}",
                    self.path.display()
                ))
            })?;
        Ok(self.path.with_file_name(format!(".{}.styling", file_name)))
    }
}

/// Text columns of a row, paired with their column index.
fn text_cells(row: &ResultRow) -> [(u16, &str); 8] {
    [
        (0, row.name.as_str()),
        (1, row.version.as_str()),
        (2, row.original_status.as_str()),
        (3, row.verified_status.as_str()),
        (4, row.search_date.as_str()),
        (5, row.sources.as_str()),
        (6, row.links.as_str()),
        (8, row.summary.as_str()),
    ]
}

fn write_styled(worksheet: &mut Worksheet, rows: &[ResultRow]) -> Result<()> {
    let header = Format::new()
        .set_bold()
        .set_font_size(HEADER_FONT_SIZE)
        .set_font_color(Color::White)
        .set_background_color(Color::RGB(HEADER_FILL))
        .set_align(FormatAlign::Center)
        .set_align(FormatAlign::VerticalCenter)
        .set_border(FormatBorder::Thin);

    let body = Format::new()
        .set_align(FormatAlign::Left)
        .set_align(FormatAlign::Top)
        .set_text_wrap()
        .set_border(FormatBorder::Thin);

    let centred = Format::new()
        .set_align(FormatAlign::Center)
        .set_align(FormatAlign::VerticalCenter)
        .set_border(FormatBorder::Thin);

    for (col, (title, width)) in RESULT_COLUMNS.iter().zip(COLUMN_WIDTHS).enumerate() {
        let col = col as u16;
        worksheet.set_column_width(col, width)?;
        worksheet.write_string_with_format(0, col, *title, &header)?;
    }
    worksheet.set_freeze_panes(1, 0)?;

    for (i, row) in rows.iter().enumerate() {
        let r = i as u32 + 1;

        for (col, text) in text_cells(row) {
            if col == STATUS_COL {
                continue;
            }
            let format = if CENTRED_COLUMNS.contains(&col) {
                &centred
            } else {
                &body
            };
            worksheet.write_string_with_format(r, col, text, format)?;
        }

        let status_format = match row.status() {
            Ok(status) => {
                let (fill, font) = status_colors(status);
                centred
                    .clone()
                    .set_bold()
                    .set_background_color(Color::RGB(fill))
                    .set_font_color(Color::RGB(font))
            }
            Err(_) => centred.clone(),
        };
        worksheet.write_string_with_format(r, STATUS_COL, &row.verified_status, &status_format)?;

        let confidence_format = centred
            .clone()
            .set_background_color(Color::RGB(confidence_fill(row.confidence)));
        worksheet.write_number_with_format(
            r,
            CONFIDENCE_COL,
            f64::from(row.confidence),
            &confidence_format,
        )?;
    }

    Ok(())
}
