use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use itr_core::clock::{Clock, SystemClock};
use itr_core::domain::NewIncident;
use itr_core::error::AppError;
use itr_core::export::export_csv_to_path;
use itr_core::lifecycle::{assign, create_incident, transition_status};
use itr_core::report::{incident_details_text, incident_rows, report_snapshot};
use itr_core::store::{get_incident, initialize, InitializeSummary};
use rusqlite::Connection;
use serde::Serialize;
use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub const DEFAULT_DB_FILE: &str = "incidents.db";

#[derive(Debug, Parser)]
#[command(name = "incident-tracker", version, about = "Track IT support incidents")]
pub struct Cli {
    /// SQLite database file holding the incident store.
    #[arg(long, global = true, env = "INCIDENT_TRACKER_DB", default_value = DEFAULT_DB_FILE)]
    pub db: PathBuf,

    /// Emit logs as JSON lines on stderr.
    #[arg(long, global = true, env = "INCIDENT_TRACKER_LOG_JSON")]
    pub log_json: bool,

    /// Print command results as JSON instead of text.
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Create the store (seeding sample incidents on first run).
    Init,
    /// Open a new incident.
    Create {
        #[arg(long)]
        title: String,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        reporter: String,
        #[arg(long, default_value = "Medium")]
        priority: String,
        #[arg(long, default_value = "Software")]
        category: String,
    },
    /// Move an incident to Open, In-Progress or Resolved.
    Status {
        id: i64,
        status: String,
        /// Required when the new status is Resolved.
        #[arg(long)]
        notes: Option<String>,
    },
    /// Assign an incident to a technician.
    Assign { id: i64, assignee: String },
    /// List incidents, newest first.
    List,
    /// Show every field of one incident.
    Show { id: i64 },
    /// Print summary statistics and per-incident lines.
    Report,
    /// Write all incidents to a CSV file.
    Export {
        #[arg(long)]
        out: PathBuf,
    },
}

#[derive(Debug, Serialize)]
pub struct CreateResponse {
    pub id: i64,
}

#[derive(Debug, Serialize)]
pub struct ExportResponse {
    pub path: String,
    pub rows: usize,
    pub exported: bool,
}

pub fn init_tracing(log_json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    // try_init: a second call (tests, embedding) keeps the first subscriber.
    if log_json {
        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .try_init();
    } else {
        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init();
    }
}

pub fn open_and_initialize(
    db_path: &Path,
    clock: &dyn Clock,
) -> Result<(Connection, InitializeSummary), AppError> {
    let mut conn = itr_core::db::open(db_path)?;
    let summary = initialize(&mut conn, clock)?;
    debug!(db = %db_path.display(), seeded = summary.seeded, "store ready");
    Ok((conn, summary))
}

fn to_json<T: Serialize>(value: &T) -> Result<String, AppError> {
    serde_json::to_string_pretty(value).map_err(|e| {
        AppError::new("OUTPUT_JSON_FAILED", "Failed to serialize command output")
            .with_details(e.to_string())
    })
}

/// Run one command against the store and return what should be printed on stdout.
pub fn execute(cli: &Cli, clock: &dyn Clock) -> Result<String, AppError> {
    let (mut conn, init) = open_and_initialize(&cli.db, clock)?;

    match &cli.command {
        Command::Init => {
            if cli.json {
                return to_json(&init);
            }
            Ok(format!(
                "Store ready at {} ({} sample incidents seeded)",
                cli.db.display(),
                init.seeded
            ))
        }
        Command::Create {
            title,
            description,
            reporter,
            priority,
            category,
        } => {
            let input = NewIncident {
                title: title.clone(),
                description: description.clone(),
                reporter: reporter.clone(),
                priority: priority.clone(),
                category: category.clone(),
            };
            let id = create_incident(&mut conn, clock, &input)?;
            if cli.json {
                return to_json(&CreateResponse { id });
            }
            Ok(format!("Incident {id} created successfully"))
        }
        Command::Status { id, status, notes } => {
            let updated = transition_status(&mut conn, clock, *id, status, notes.as_deref())?;
            if cli.json {
                return to_json(&updated);
            }
            Ok(format!("Incident {id} status updated to {}", updated.status))
        }
        Command::Assign { id, assignee } => {
            let updated = assign(&mut conn, clock, *id, assignee)?;
            if cli.json {
                return to_json(&updated);
            }
            Ok(format!(
                "Incident {id} assigned to {}",
                updated.assigned_to.unwrap_or_default()
            ))
        }
        Command::List => {
            let rows = incident_rows(&conn)?;
            if cli.json {
                return to_json(&rows);
            }
            let lines: Vec<String> = rows
                .iter()
                .map(|r| {
                    format!(
                        "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
                        r.id,
                        r.title,
                        r.reporter,
                        r.priority,
                        r.category,
                        r.status,
                        r.assigned_to,
                        r.created_date
                    )
                })
                .collect();
            Ok(lines.join("\n"))
        }
        Command::Show { id } => {
            let incident = get_incident(&conn, *id)?;
            if cli.json {
                return to_json(&incident);
            }
            Ok(incident_details_text(&incident).trim_end().to_string())
        }
        Command::Report => {
            let snapshot = report_snapshot(&conn)?;
            if cli.json {
                return to_json(&snapshot);
            }
            let mut out = String::new();
            for tile in &snapshot.tiles {
                out.push_str(&format!("{}: {}\n", tile.label, tile.value));
            }
            out.push('\n');
            out.push_str(&snapshot.detail_lines.join("\n"));
            Ok(out.trim_end().to_string())
        }
        Command::Export { out } => {
            let response = match export_csv_to_path(&conn, out) {
                Ok(rows) => ExportResponse {
                    path: out.display().to_string(),
                    rows,
                    exported: true,
                },
                // Nothing to export is a notice, not a failure.
                Err(e) if e.is_empty_result() => ExportResponse {
                    path: out.display().to_string(),
                    rows: 0,
                    exported: false,
                },
                Err(e) => return Err(e),
            };
            if cli.json {
                return to_json(&response);
            }
            if !response.exported {
                return Ok("No incidents to export.".to_string());
            }
            Ok(format!("Incidents exported to {}", response.path))
        }
    }
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    match execute(&cli, &SystemClock) {
        Ok(out) => {
            if !out.is_empty() {
                println!("{out}");
            }
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("{err}");
            if let Some(details) = &err.details {
                eprintln!("  {details}");
            }
            ExitCode::FAILURE
        }
    }
}
