use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::clock::parse_ts;
use crate::domain::{Category, Incident, Priority, Status};
use crate::error::AppError;
use crate::store::{count_by_status, count_incidents, list_incidents};

pub const UNASSIGNED: &str = "Unassigned";
pub const NOT_AVAILABLE: &str = "N/A";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct SummaryCounts {
    pub total: i64,
    pub open: i64,
    pub in_progress: i64,
    pub resolved: i64,
}

/// One headline tile of the reports view.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatTile {
    pub label: String,
    pub value: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReportSnapshot {
    pub counts: SummaryCounts,
    /// `None` when there are no resolved incidents to average.
    pub average_resolution_days: Option<f64>,
    pub sla_compliance_pct: f64,
    pub tiles: Vec<StatTile>,
    pub detail_lines: Vec<String>,
}

/// List-view projection of an incident.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IncidentRow {
    pub id: i64,
    pub title: String,
    pub reporter: String,
    pub priority: Priority,
    pub category: Category,
    pub status: Status,
    pub assigned_to: String,
    pub created_date: String,
}

pub fn summary_counts(conn: &Connection) -> Result<SummaryCounts, AppError> {
    let by_status = count_by_status(conn)?;
    let get = |s: Status| by_status.get(&s).copied().unwrap_or(0);
    Ok(SummaryCounts {
        total: count_incidents(conn)?,
        open: get(Status::Open),
        in_progress: get(Status::InProgress),
        resolved: get(Status::Resolved),
    })
}

/// Whole days between creation and resolution, truncated toward zero.
pub fn resolution_days(incident: &Incident) -> Result<Option<i64>, AppError> {
    if incident.status != Status::Resolved {
        return Ok(None);
    }
    let Some(resolved_raw) = incident.resolved_date.as_deref() else {
        return Ok(None);
    };
    let created = parse_ts("created_date", &incident.created_date)?;
    let resolved = parse_ts("resolved_date", resolved_raw)?;
    Ok(Some((resolved - created).whole_days()))
}

fn average_days(incidents: &[Incident]) -> Result<Option<f64>, AppError> {
    let mut total_days = 0i64;
    let mut n = 0i64;
    for inc in incidents {
        if let Some(days) = resolution_days(inc)? {
            total_days += days;
            n += 1;
        }
    }
    if n == 0 {
        return Ok(None);
    }
    Ok(Some(total_days as f64 / n as f64))
}

/// Mean resolution time in days over resolved incidents, or `None` when there are none.
pub fn average_resolution_time(conn: &Connection) -> Result<Option<f64>, AppError> {
    average_days(&list_incidents(conn)?)
}

fn compliance_pct(counts: &SummaryCounts) -> f64 {
    if counts.total == 0 {
        return 0.0;
    }
    let pct = counts.resolved as f64 / counts.total as f64 * 100.0;
    (pct * 10.0).round() / 10.0
}

/// Share of all incidents currently resolved, as a percentage with one decimal place.
pub fn sla_compliance(conn: &Connection) -> Result<f64, AppError> {
    Ok(compliance_pct(&summary_counts(conn)?))
}

pub fn format_average_days(avg: Option<f64>) -> String {
    match avg {
        None => NOT_AVAILABLE.to_string(),
        Some(d) => format!("{d:.1} days"),
    }
}

pub fn format_sla(counts: &SummaryCounts, pct: f64) -> String {
    if counts.total == 0 {
        "0%".to_string()
    } else {
        format!("{pct:.1}%")
    }
}

fn assignee_label(incident: &Incident) -> String {
    incident
        .assigned_to
        .clone()
        .unwrap_or_else(|| UNASSIGNED.to_string())
}

pub fn detail_line(incident: &Incident) -> String {
    format!(
        "ID: {} | Title: {} | Status: {} | Priority: {} | Assigned To: {}",
        incident.id,
        incident.title,
        incident.status,
        incident.priority,
        assignee_label(incident)
    )
}

/// One summary line per incident, newest first.
pub fn detail_lines(conn: &Connection) -> Result<Vec<String>, AppError> {
    Ok(list_incidents(conn)?.iter().map(detail_line).collect())
}

pub fn incident_rows(conn: &Connection) -> Result<Vec<IncidentRow>, AppError> {
    Ok(list_incidents(conn)?
        .into_iter()
        .map(|inc| IncidentRow {
            assigned_to: assignee_label(&inc),
            id: inc.id,
            title: inc.title,
            reporter: inc.reporter,
            priority: inc.priority,
            category: inc.category,
            status: inc.status,
            created_date: inc.created_date,
        })
        .collect())
}

/// Multi-line details panel for one incident.
pub fn incident_details_text(incident: &Incident) -> String {
    let or_na = |v: &Option<String>| v.clone().unwrap_or_else(|| NOT_AVAILABLE.to_string());

    let mut out = String::new();
    out.push_str(&format!("Title: {}\n", incident.title));
    out.push_str(&format!("Description: {}\n", or_na(&incident.description)));
    out.push_str(&format!("Reporter: {}\n", incident.reporter));
    out.push_str(&format!("Priority: {}\n", incident.priority));
    out.push_str(&format!("Category: {}\n", incident.category));
    out.push_str(&format!("Status: {}\n", incident.status));
    out.push_str(&format!("Assigned To: {}\n", assignee_label(incident)));
    out.push_str(&format!("Created Date: {}\n", incident.created_date));
    out.push_str(&format!("Updated Date: {}\n", or_na(&incident.updated_date)));
    out.push_str(&format!("Resolved Date: {}\n", or_na(&incident.resolved_date)));
    out.push_str(&format!(
        "Resolution Notes: {}\n",
        or_na(&incident.resolution_notes)
    ));
    out
}

/// Everything the reports view shows, computed from one read of the store.
pub fn report_snapshot(conn: &Connection) -> Result<ReportSnapshot, AppError> {
    let counts = summary_counts(conn)?;
    let incidents = list_incidents(conn)?;
    let average_resolution_days = average_days(&incidents)?;
    let sla_compliance_pct = compliance_pct(&counts);

    let tiles = [
        ("Total Incidents", counts.total.to_string()),
        ("Open", counts.open.to_string()),
        ("In Progress", counts.in_progress.to_string()),
        ("Resolved", counts.resolved.to_string()),
        (
            "Avg Resolution Time",
            format_average_days(average_resolution_days),
        ),
        ("SLA Compliance", format_sla(&counts, sla_compliance_pct)),
    ]
    .into_iter()
    .map(|(label, value)| StatTile {
        label: label.to_string(),
        value,
    })
    .collect();

    Ok(ReportSnapshot {
        counts,
        average_resolution_days,
        sla_compliance_pct,
        tiles,
        detail_lines: incidents.iter().map(detail_line).collect(),
    })
}
