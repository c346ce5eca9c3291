use crate::domain::{Category, Incident, Priority, Status};

/// The three illustrative incidents inserted into an empty store, one per status.
///
/// Every timestamp is `now`; ids are assigned by the store on insert.
pub fn sample_incidents(now: &str) -> Vec<Incident> {
    let at = |s: &str| Some(s.to_string());
    vec![
        Incident {
            id: 0,
            title: "Email server down".to_string(),
            description: at("Users cannot access email"),
            reporter: "John Doe".to_string(),
            priority: Priority::High,
            category: Category::Network,
            status: Status::Resolved,
            assigned_to: at("IT Team"),
            created_date: now.to_string(),
            updated_date: at(now),
            resolved_date: at(now),
            resolution_notes: at("Server rebooted"),
        },
        Incident {
            id: 0,
            title: "Printer not working".to_string(),
            description: at("Office printer offline"),
            reporter: "Jane Smith".to_string(),
            priority: Priority::Medium,
            category: Category::Hardware,
            status: Status::InProgress,
            assigned_to: at("Tech Support"),
            created_date: now.to_string(),
            updated_date: at(now),
            resolved_date: None,
            resolution_notes: None,
        },
        Incident {
            id: 0,
            title: "Software installation request".to_string(),
            description: at("Need new software installed"),
            reporter: "Bob Johnson".to_string(),
            priority: Priority::Low,
            category: Category::Software,
            status: Status::Open,
            assigned_to: None,
            created_date: now.to_string(),
            updated_date: None,
            resolved_date: None,
            resolution_notes: None,
        },
    ]
}
