use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Canonical incident record as persisted by the store.
///
/// Notes:
/// - Timestamps are RFC3339 UTC strings with whole-second precision.
/// - `resolved_date` is present if and only if `status == Resolved`.
/// - `resolution_notes` is only ever written by a transition to `Resolved`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Incident {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub reporter: String,
    pub priority: Priority,
    pub category: Category,
    pub status: Status,
    pub assigned_to: Option<String>,
    pub created_date: String,
    pub updated_date: Option<String>,
    pub resolved_date: Option<String>,
    pub resolution_notes: Option<String>,
}

/// Raw create-form input as submitted by the shell. Enum fields are still text here.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewIncident {
    pub title: String,
    pub description: Option<String>,
    pub reporter: String,
    pub priority: String,
    pub category: String,
}

/// Validated insert payload. Status, dates and assignment are owned by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncidentDraft {
    pub title: String,
    pub description: Option<String>,
    pub reporter: String,
    pub priority: Priority,
    pub category: Category,
}

/// Partial update applied atomically by `store::update_incident`.
///
/// `None` leaves a column untouched. For nullable columns `Some(None)` writes NULL.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IncidentPatch {
    pub status: Option<Status>,
    pub assigned_to: Option<Option<String>>,
    pub updated_date: Option<String>,
    pub resolved_date: Option<Option<String>>,
    pub resolution_notes: Option<Option<String>>,
}

impl IncidentPatch {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    pub fn apply_to(&self, incident: &mut Incident) {
        if let Some(status) = self.status {
            incident.status = status;
        }
        if let Some(v) = &self.assigned_to {
            incident.assigned_to = v.clone();
        }
        if let Some(v) = &self.updated_date {
            incident.updated_date = Some(v.clone());
        }
        if let Some(v) = &self.resolved_date {
            incident.resolved_date = v.clone();
        }
        if let Some(v) = &self.resolution_notes {
            incident.resolution_notes = v.clone();
        }
    }
}

macro_rules! closed_enum {
    (
        $(#[$meta:meta])*
        $name:ident, $code:literal, $label:literal {
            $($variant:ident => $text:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum $name {
            $(
                #[serde(rename = $text)]
                $variant,
            )+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $text,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = AppError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => {
                        let allowed: Vec<&str> = $name::ALL.iter().map(|v| v.as_str()).collect();
                        Err(AppError::validation($code, concat!("Invalid ", $label))
                            .with_details(format!("value={other}; allowed={}", allowed.join("/"))))
                    }
                }
            }
        }
    };
}

closed_enum!(
    Priority, "VALIDATION_PRIORITY_INVALID", "priority" {
        Low => "Low",
        Medium => "Medium",
        High => "High",
        Critical => "Critical",
    }
);

closed_enum!(
    Category, "VALIDATION_CATEGORY_INVALID", "category" {
        Hardware => "Hardware",
        Software => "Software",
        Network => "Network",
        Security => "Security",
        Other => "Other",
    }
);

closed_enum!(
    /// Incident lifecycle state. `Open` is entered only at creation.
    Status, "VALIDATION_STATUS_INVALID", "status" {
        Open => "Open",
        InProgress => "In-Progress",
        Resolved => "Resolved",
    }
);
