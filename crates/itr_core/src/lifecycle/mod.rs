use rusqlite::Connection;
use tracing::{info, warn};

use crate::clock::{now_ts, Clock};
use crate::domain::{
    Category, Incident, IncidentDraft, IncidentPatch, NewIncident, Priority, Status,
};
use crate::error::AppError;
use crate::store;

/// Transition table: the set of statuses reachable from each status.
///
/// Currently unrestricted (every status may move to every status, including itself).
/// Tightening the lifecycle only means editing this table.
pub fn allowed_transitions(from: Status) -> &'static [Status] {
    match from {
        Status::Open => &[Status::Open, Status::InProgress, Status::Resolved],
        Status::InProgress => &[Status::Open, Status::InProgress, Status::Resolved],
        Status::Resolved => &[Status::Open, Status::InProgress, Status::Resolved],
    }
}

pub fn can_transition(from: Status, to: Status) -> bool {
    allowed_transitions(from).contains(&to)
}

fn required(code: &str, field: &str, value: &str) -> Result<String, AppError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::validation(code, format!("{field} is required")));
    }
    Ok(trimmed.to_string())
}

/// Turn raw form input into a validated draft. Nothing touches the store here.
pub fn validate_new_incident(input: &NewIncident) -> Result<IncidentDraft, AppError> {
    let title = required("VALIDATION_TITLE_REQUIRED", "title", &input.title)?;
    let reporter = required("VALIDATION_REPORTER_REQUIRED", "reporter", &input.reporter)?;
    let priority: Priority = input.priority.trim().parse()?;
    let category: Category = input.category.trim().parse()?;
    let description = input
        .description
        .as_deref()
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(str::to_string);

    Ok(IncidentDraft {
        title,
        description,
        reporter,
        priority,
        category,
    })
}

pub fn create_incident(
    conn: &mut Connection,
    clock: &dyn Clock,
    input: &NewIncident,
) -> Result<i64, AppError> {
    let draft = validate_new_incident(input)?;
    let id = store::insert_incident(conn, clock, &draft)?;
    info!(
        incident_id = id,
        priority = %draft.priority,
        category = %draft.category,
        "incident created"
    );
    Ok(id)
}

/// Move an incident to `new_status` given as text (as typed by an operator).
///
/// Unknown status text is rejected before the store is read.
pub fn transition_status(
    conn: &mut Connection,
    clock: &dyn Clock,
    id: i64,
    new_status: &str,
    resolution_notes: Option<&str>,
) -> Result<Incident, AppError> {
    let target: Status = new_status.trim().parse()?;
    transition_to(conn, clock, id, target, resolution_notes)
}

/// Typed form of [`transition_status`].
///
/// Resolving requires explicit notes (empty text is allowed), stored exactly as given, and
/// stamps `resolved_date`.
/// Any other target writes `resolved_date` and `resolution_notes` as absent.
pub fn transition_to(
    conn: &mut Connection,
    clock: &dyn Clock,
    id: i64,
    target: Status,
    resolution_notes: Option<&str>,
) -> Result<Incident, AppError> {
    let notes = match (target, resolution_notes) {
        (Status::Resolved, None) => {
            return Err(AppError::validation(
                "VALIDATION_RESOLUTION_NOTES_REQUIRED",
                "Resolution notes are required when resolving an incident",
            )
            .with_details(format!("id={id}")));
        }
        (Status::Resolved, Some(n)) => Some(n.to_string()),
        (_, _) => None,
    };

    let now = now_ts(clock)?;
    let patch = IncidentPatch {
        status: Some(target),
        assigned_to: None,
        updated_date: Some(now.clone()),
        resolved_date: Some((target == Status::Resolved).then_some(now)),
        resolution_notes: Some(notes),
    };

    let updated = store::with_write_tx(conn, |tx| {
        let current = store::get_incident(tx, id)?;
        if !can_transition(current.status, target) {
            warn!(
                incident_id = id,
                from = %current.status,
                to = %target,
                "rejected status transition"
            );
            return Err(AppError::validation(
                "LIFECYCLE_TRANSITION_NOT_ALLOWED",
                format!("Cannot move incident from {} to {}", current.status, target),
            )
            .with_details(format!("id={id}")));
        }
        store::apply_patch(tx, id, &patch)
    })?;

    info!(incident_id = id, status = %target, "incident status changed");
    Ok(updated)
}

pub fn assign(
    conn: &mut Connection,
    clock: &dyn Clock,
    id: i64,
    assignee: &str,
) -> Result<Incident, AppError> {
    let assignee = required("VALIDATION_ASSIGNEE_REQUIRED", "assignee", assignee)?;
    let patch = IncidentPatch {
        assigned_to: Some(Some(assignee.clone())),
        updated_date: Some(now_ts(clock)?),
        ..IncidentPatch::default()
    };

    let updated = store::update_incident(conn, id, &patch)?;
    info!(incident_id = id, assignee = %assignee, "incident assigned");
    Ok(updated)
}
