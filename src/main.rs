//! Operator CLI over an enrollment ledger database.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use course_enrollment::EnrollmentLedger;
use course_enrollment::catalog::StaticCatalog;
use course_enrollment::config::load_config;
use course_enrollment::course::CourseDetails;
use course_enrollment::enrollment::EnrollmentStatus;
use course_enrollment::logging;

#[derive(Parser)]
#[command(
    name = "enrollctl",
    version,
    about = "Manage courses, prerequisites and seats in an enrollment ledger"
)]
struct Cli {
    /// Path to the TOML config. Defaults apply if the file is missing.
    #[arg(short, long, default_value = "enrollment.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create or update a course.
    Course {
        id: String,
        #[arg(long)]
        capacity: u32,
        #[arg(long)]
        owner: String,
        /// Register the course closed for enrollment.
        #[arg(long)]
        closed: bool,
    },
    /// Open a course for enrollment.
    Open { course: String },
    /// Close a course for enrollment.
    Close { course: String },
    /// Replace a course's prerequisites (omit ids to clear them).
    Prereqs {
        course: String,
        #[arg(value_delimiter = ',')]
        requires: Vec<String>,
    },
    /// Show whether a student could enroll right now.
    Eligibility { student: String, course: String },
    Enroll { student: String, course: String },
    Drop { student: String, course: String },
    /// Complete every active enrollment in a course.
    Complete { course: String },
    /// List a student's enrollments.
    Enrollments {
        student: String,
        #[arg(long, value_parser = parse_status)]
        status: Option<EnrollmentStatus>,
    },
    /// Show a student's counts and earned credits.
    Stats { student: String },
    /// Verify seat counters against their records and the prerequisite graph.
    Audit,
}

fn parse_status(raw: &str) -> std::result::Result<EnrollmentStatus, String> {
    raw.parse().map_err(|err: course_enrollment::EnrollmentError| err.to_string())
}

fn main() {
    if let Err(err) = run() {
        eprintln!("{:#}", err);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli.config)?;
    logging::init(&config.log_filter);

    let ledger = EnrollmentLedger::open(&config)
        .with_context(|| format!("open ledger at {}", config.db_path.display()))?;

    match cli.command {
        Command::Course {
            id,
            capacity,
            owner,
            closed,
        } => {
            let details = CourseDetails::new()
                .set_id(id)
                .set_capacity(capacity)
                .set_owner(owner)
                .set_open(!closed);
            let course = ledger.upsert_course(details)?;
            println!(
                "{} capacity={} taken={} remaining={} open={}",
                course.id,
                course.capacity,
                course.active_enrollment_count,
                course.seats_remaining(),
                course.is_open_for_enrollment
            );
        }
        Command::Open { course } => {
            ledger.set_open_for_enrollment(&course, true)?;
        }
        Command::Close { course } => {
            ledger.set_open_for_enrollment(&course, false)?;
        }
        Command::Prereqs { course, requires } => {
            let committed = ledger.set_prerequisites(&course, requires)?;
            let listed: Vec<&str> = committed.iter().map(String::as_str).collect();
            println!("{course} requires [{}]", listed.join(", "));
        }
        Command::Eligibility { student, course } => {
            let decision = ledger.check_eligibility(&student, &course)?;
            println!("can_enroll={}", decision.can_enroll);
            for reason in decision.reason_messages() {
                println!("  - {reason}");
            }
            if !decision.missing_prerequisites.is_empty() {
                println!("  missing: {}", decision.missing_prerequisites.join(", "));
            }
        }
        Command::Enroll { student, course } => {
            let enrollment = ledger
                .enroll(&student, &course)
                .with_context(|| format!("enroll {student} in {course}"))?;
            println!("{}", enrollment.id);
        }
        Command::Drop { student, course } => {
            ledger
                .drop_enrollment(&student, &course)
                .with_context(|| format!("drop {student} from {course}"))?;
        }
        Command::Complete { course } => {
            let completed = ledger.transition_to_completed(&course)?;
            println!("completed {} enrollments", completed.len());
        }
        Command::Enrollments { student, status } => {
            for view in ledger.my_enrollments(&student, status)? {
                println!(
                    "{} {} {} (owner {})",
                    view.enrollment.id,
                    view.course.id,
                    view.enrollment.status,
                    view.course.owner_id
                );
            }
        }
        Command::Stats { student } => {
            let catalog = StaticCatalog::from(&config.catalog);
            let stats = ledger.statistics(&student, &catalog)?;
            println!(
                "active={} completed={} credits={}",
                stats.active_courses, stats.completed_courses, stats.total_credits
            );
        }
        Command::Audit => {
            let discrepancies = ledger.audit_seat_counts()?;
            for d in &discrepancies {
                println!(
                    "{} cached={} recorded={} capacity={}",
                    d.course_id, d.cached_count, d.recorded_count, d.capacity
                );
            }
            if !discrepancies.is_empty() {
                anyhow::bail!("{} course(s) failed the seat audit", discrepancies.len());
            }
            if !ledger.prerequisite_graph()?.is_acyclic() {
                anyhow::bail!("committed prerequisite graph contains a cycle");
            }
        }
    }

    ledger.flush()?;
    Ok(())
}
