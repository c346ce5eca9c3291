use pretty_assertions::assert_eq;
use rusqlite::Connection;
use time::macros::datetime;
use time::Duration;

use itr_core::clock::FixedClock;
use itr_core::db;
use itr_core::domain::NewIncident;
use itr_core::lifecycle::{assign, create_incident, transition_status};
use itr_core::report::{
    average_resolution_time, detail_lines, incident_rows, report_snapshot, sla_compliance,
    summary_counts, SummaryCounts,
};
use itr_core::store::initialize;

fn store() -> Connection {
    let mut conn = db::open_in_memory().expect("open");
    db::migrate(&mut conn).expect("migrate");
    conn
}

fn incident(title: &str, priority: &str) -> NewIncident {
    NewIncident {
        title: title.to_string(),
        description: Some("details".to_string()),
        reporter: "Service Desk".to_string(),
        priority: priority.to_string(),
        category: "Hardware".to_string(),
    }
}

#[test]
fn empty_store_has_zero_counts_and_no_average() {
    let conn = store();
    assert_eq!(summary_counts(&conn).unwrap(), SummaryCounts::default());
    assert_eq!(sla_compliance(&conn).unwrap(), 0.0);
    assert_eq!(average_resolution_time(&conn).unwrap(), None);
    assert!(detail_lines(&conn).unwrap().is_empty());

    let snap = report_snapshot(&conn).unwrap();
    let values: Vec<(&str, &str)> = snap
        .tiles
        .iter()
        .map(|t| (t.label.as_str(), t.value.as_str()))
        .collect();
    assert_eq!(
        values,
        vec![
            ("Total Incidents", "0"),
            ("Open", "0"),
            ("In Progress", "0"),
            ("Resolved", "0"),
            ("Avg Resolution Time", "N/A"),
            ("SLA Compliance", "0%"),
        ]
    );
}

#[test]
fn average_resolution_uses_whole_days() {
    let mut conn = store();
    let t0 = datetime!(2026-05-01 08:00:00 UTC);
    let created = FixedClock(t0);

    let a = create_incident(&mut conn, &created, &incident("Monitor flicker", "Low")).unwrap();
    let b = create_incident(&mut conn, &created, &incident("Docking station", "Medium")).unwrap();
    // Open incidents never contribute to the average.
    create_incident(&mut conn, &created, &incident("Keyboard", "Low")).unwrap();

    transition_status(
        &mut conn,
        &FixedClock(t0 + Duration::days(1)),
        a,
        "Resolved",
        Some("swapped"),
    )
    .unwrap();
    // 3 days and 20 hours truncates to 3.
    transition_status(
        &mut conn,
        &FixedClock(t0 + Duration::days(3) + Duration::hours(20)),
        b,
        "Resolved",
        Some("replaced"),
    )
    .unwrap();

    assert_eq!(average_resolution_time(&conn).unwrap(), Some(2.0));
    assert_eq!(
        summary_counts(&conn).unwrap(),
        SummaryCounts {
            total: 3,
            open: 1,
            in_progress: 0,
            resolved: 2,
        }
    );
    assert_eq!(sla_compliance(&conn).unwrap(), 66.7);
}

#[test]
fn seeded_store_snapshot_matches_reports_view() {
    let mut conn = store();
    initialize(&mut conn, &FixedClock(datetime!(2026-05-01 08:00:00 UTC))).unwrap();

    let snap = report_snapshot(&conn).unwrap();
    assert_eq!(
        snap.counts,
        SummaryCounts {
            total: 3,
            open: 1,
            in_progress: 1,
            resolved: 1,
        }
    );
    // Seed resolves at creation time: zero days.
    assert_eq!(snap.average_resolution_days, Some(0.0));
    assert_eq!(snap.sla_compliance_pct, 33.3);
    assert_eq!(snap.tiles[4].value, "0.0 days");
    assert_eq!(snap.tiles[5].value, "33.3%");
    assert_eq!(snap.detail_lines, detail_lines(&conn).unwrap());
}

#[test]
fn detail_lines_follow_store_order_and_mark_unassigned() {
    let mut conn = store();
    let t0 = datetime!(2026-05-01 08:00:00 UTC);
    let older =
        create_incident(&mut conn, &FixedClock(t0), &incident("Projector", "High")).unwrap();
    let newer = create_incident(
        &mut conn,
        &FixedClock(t0 + Duration::hours(1)),
        &incident("Badge reader", "Critical"),
    )
    .unwrap();
    assign(&mut conn, &FixedClock(t0 + Duration::hours(2)), older, "Facilities").unwrap();

    assert_eq!(
        detail_lines(&conn).unwrap(),
        vec![
            format!(
                "ID: {newer} | Title: Badge reader | Status: Open | Priority: Critical \
                 | Assigned To: Unassigned"
            ),
            format!(
                "ID: {older} | Title: Projector | Status: Open | Priority: High \
                 | Assigned To: Facilities"
            ),
        ]
    );

    let rows = incident_rows(&conn).unwrap();
    assert_eq!(rows[0].id, newer);
    assert_eq!(rows[0].assigned_to, "Unassigned");
    assert_eq!(rows[1].assigned_to, "Facilities");
}
