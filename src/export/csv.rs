// src/export/csv.rs
use crate::domain::stats::{summarize, ViewMode};
use crate::domain::tender::Tender;
use crate::export::{Column, CsvQuoting, ExportError, ExportOptions};

/// Header plus one row per record, `\n`-separated with no trailing newline.
pub fn export_csv(records: &[Tender], options: &ExportOptions) -> Result<String, ExportError> {
    let columns = &options.columns;
    if columns.is_empty() {
        return Err(ExportError::NoColumns);
    }
    if records.is_empty() {
        return Err(ExportError::NoRecords);
    }

    let mut out = match options.quoting {
        CsvQuoting::Legacy => legacy(records, columns),
        CsvQuoting::Rfc4180 => rfc4180(records, columns)?,
    };

    if options.include_summary {
        out.push_str("\n\n");
        out.push_str(&summary_block(records));
    }

    Ok(out)
}

fn legacy(records: &[Tender], columns: &[Column]) -> String {
    let header: Vec<&str> = columns.iter().map(Column::as_str).collect();
    let mut lines = Vec::with_capacity(records.len() + 1);
    lines.push(header.join(","));

    for t in records {
        let fields: Vec<String> = columns
            .iter()
            .map(|c| {
                let v = c.cell(t).render();
                if v.contains(',') {
                    format!("\"{v}\"")
                } else {
                    v
                }
            })
            .collect();
        lines.push(fields.join(","));
    }

    lines.join("\n")
}

fn rfc4180(records: &[Tender], columns: &[Column]) -> Result<String, ExportError> {
    let mut wtr = ::csv::WriterBuilder::new()
        .terminator(::csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    wtr.write_record(columns.iter().map(Column::as_str))
        .map_err(|e| ExportError::Csv(e.to_string()))?;
    for t in records {
        wtr.write_record(columns.iter().map(|c| c.cell(t).render()))
            .map_err(|e| ExportError::Csv(e.to_string()))?;
    }

    let bytes = wtr
        .into_inner()
        .map_err(|e| ExportError::Csv(e.to_string()))?;
    let mut text = String::from_utf8(bytes).map_err(|e| ExportError::Csv(e.to_string()))?;
    if text.ends_with('\n') {
        text.pop();
    }
    Ok(text)
}

fn summary_block(records: &[Tender]) -> String {
    let s = summarize(records, ViewMode::All);
    [
        "Summary".to_string(),
        format!("Total Tenders,{}", s.total_tenders),
        format!("Relevant Tenders,{}", s.relevant_tenders),
        format!("Urgent Tenders,{}", s.urgent_tenders),
        format!("Average Days Left,{}", s.avg_days_left),
    ]
    .join("\n")
}
