use std::path::Path;

use rusqlite::Connection;
use tracing::info;

use crate::domain::Incident;
use crate::error::AppError;
use crate::store::list_incidents;

pub const EXPORT_HEADER: [&str; 12] = [
    "ID",
    "Title",
    "Description",
    "Reporter",
    "Priority",
    "Category",
    "Status",
    "Assigned To",
    "Created Date",
    "Updated Date",
    "Resolved Date",
    "Resolution Notes",
];

fn opt(v: &Option<String>) -> &str {
    v.as_deref().unwrap_or("")
}

fn write_csv(incidents: &[Incident]) -> Result<Vec<u8>, AppError> {
    let mut wtr = csv::Writer::from_writer(Vec::new());
    wtr.write_record(EXPORT_HEADER).map_err(|e| {
        AppError::new("EXPORT_CSV_WRITE_FAILED", "Failed to write CSV header")
            .with_details(e.to_string())
    })?;

    for inc in incidents {
        let id = inc.id.to_string();
        wtr.write_record([
            id.as_str(),
            inc.title.as_str(),
            opt(&inc.description),
            inc.reporter.as_str(),
            inc.priority.as_str(),
            inc.category.as_str(),
            inc.status.as_str(),
            opt(&inc.assigned_to),
            inc.created_date.as_str(),
            opt(&inc.updated_date),
            opt(&inc.resolved_date),
            opt(&inc.resolution_notes),
        ])
        .map_err(|e| {
            AppError::new("EXPORT_CSV_WRITE_FAILED", "Failed to write CSV row")
                .with_details(format!("id={}: {e}", inc.id))
        })?;
    }

    wtr.into_inner().map_err(|e| {
        AppError::new("EXPORT_CSV_WRITE_FAILED", "Failed to flush CSV output")
            .with_details(e.to_string())
    })
}

/// Serialize every incident, newest first, as CSV with the fixed 12-column header.
///
/// Absent optional fields are written as empty cells. An empty store yields an
/// `EmptyResult` error so the caller can show a notice instead of writing a file.
pub fn export_csv(conn: &Connection) -> Result<Vec<u8>, AppError> {
    render_export(conn).map(|(bytes, _)| bytes)
}

fn render_export(conn: &Connection) -> Result<(Vec<u8>, usize), AppError> {
    let incidents = list_incidents(conn)?;
    if incidents.is_empty() {
        return Err(AppError::empty_result(
            "EXPORT_EMPTY",
            "No incidents to export",
        ));
    }
    let bytes = write_csv(&incidents)?;
    info!(rows = incidents.len(), bytes = bytes.len(), "exported incidents to CSV");
    Ok((bytes, incidents.len()))
}

/// Export to `path`, creating or truncating it. Returns the number of rows written.
pub fn export_csv_to_path(conn: &Connection, path: &Path) -> Result<usize, AppError> {
    let (bytes, rows) = render_export(conn)?;
    std::fs::write(path, &bytes).map_err(|e| {
        AppError::new("EXPORT_CSV_FILE_WRITE_FAILED", "Failed to write CSV export file")
            .with_details(format!("path={}: {e}", path.display()))
    })?;
    Ok(rows)
}

fn cell<'a>(row: &'a csv::StringRecord, idx: usize, line: usize) -> Result<&'a str, AppError> {
    row.get(idx).ok_or_else(|| {
        AppError::validation("EXPORT_CSV_ROW_SHORT", "CSV row has too few columns")
            .with_details(format!("row={line}; column={}", EXPORT_HEADER[idx]))
    })
}

fn opt_cell(row: &csv::StringRecord, idx: usize, line: usize) -> Result<Option<String>, AppError> {
    let v = cell(row, idx, line)?;
    Ok((!v.is_empty()).then(|| v.to_string()))
}

/// Re-read a CSV produced by [`export_csv`]. Empty optional cells come back as `None`.
///
/// Rows of any width are read; a row missing a column is reported by column name.
pub fn parse_export_csv(bytes: &[u8]) -> Result<Vec<Incident>, AppError> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(bytes);

    let headers = rdr.headers().map_err(|e| {
        AppError::new("EXPORT_CSV_HEADERS_FAILED", "Failed to read CSV headers")
            .with_details(e.to_string())
    })?;
    if headers.iter().ne(EXPORT_HEADER.iter().copied()) {
        return Err(AppError::validation(
            "EXPORT_CSV_HEADER_MISMATCH",
            "CSV header does not match the incident export layout",
        )
        .with_details(format!("got={}", headers.iter().collect::<Vec<_>>().join(","))));
    }

    let mut out = Vec::new();
    for (idx, result) in rdr.records().enumerate() {
        let line = idx + 2;
        let row = result.map_err(|e| {
            AppError::new("EXPORT_CSV_PARSE_FAILED", "Failed to parse CSV row")
                .with_details(format!("row={line}: {e}"))
        })?;

        let id_raw = cell(&row, 0, line)?;
        let id = id_raw.parse::<i64>().map_err(|e| {
            AppError::validation("EXPORT_CSV_ID_INVALID", "CSV row has a non-numeric ID")
                .with_details(format!("row={line}; value={id_raw}; err={e}"))
        })?;

        out.push(Incident {
            id,
            title: cell(&row, 1, line)?.to_string(),
            description: opt_cell(&row, 2, line)?,
            reporter: cell(&row, 3, line)?.to_string(),
            priority: cell(&row, 4, line)?.parse()?,
            category: cell(&row, 5, line)?.parse()?,
            status: cell(&row, 6, line)?.parse()?,
            assigned_to: opt_cell(&row, 7, line)?,
            created_date: cell(&row, 8, line)?.to_string(),
            updated_date: opt_cell(&row, 9, line)?,
            resolved_date: opt_cell(&row, 10, line)?,
            resolution_notes: opt_cell(&row, 11, line)?,
        });
    }
    Ok(out)
}
