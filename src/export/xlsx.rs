// src/export/xlsx.rs
use rust_xlsxwriter::{Format, Workbook};

use crate::domain::tender::Tender;
use crate::errors::ServerError;
use crate::export::{Cell, Column, ExportError};

/// Workbook with one `Tenders` sheet: header row, then one row per record.
/// Integers are written as numbers and booleans as Yes/No.
pub fn export_xlsx(records: &[Tender], columns: &[Column]) -> Result<Vec<u8>, ServerError> {
    if columns.is_empty() {
        return Err(ExportError::NoColumns.into());
    }
    if records.is_empty() {
        return Err(ExportError::NoRecords.into());
    }

    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet
        .set_name("Tenders")
        .map_err(|e| ServerError::XlsxError(format!("Failed to name sheet: {e}")))?;

    let bold = Format::new().set_bold();
    for (col, column) in columns.iter().enumerate() {
        worksheet
            .write_string_with_format(0, col as u16, column.as_str(), &bold)
            .map_err(|e| {
                ServerError::XlsxError(format!(
                    "Failed to write header '{}': {}",
                    column.as_str(),
                    e
                ))
            })?;
    }

    for (i, tender) in records.iter().enumerate() {
        let r = (i + 1) as u32;
        for (col, column) in columns.iter().enumerate() {
            let c = col as u16;
            let written = match column.cell(tender) {
                Cell::Empty => continue,
                Cell::Text(s) => worksheet.write_string(r, c, s),
                Cell::Int(n) => worksheet.write_number(r, c, n as f64),
                Cell::Bool(b) => worksheet.write_string(r, c, if b { "Yes" } else { "No" }),
            };
            written.map_err(|e| {
                ServerError::XlsxError(format!(
                    "Failed to write {} for row {}: {}",
                    column.as_str(),
                    r,
                    e
                ))
            })?;
        }
    }

    workbook
        .save_to_buffer()
        .map_err(|e| ServerError::XlsxError(format!("Failed to save workbook: {}", e)))
}
