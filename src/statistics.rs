//! Per-student counts derived from enrollment records. Read path only.
use crate::catalog::CourseCatalog;
use crate::enrollment::{Enrollment, EnrollmentStatus};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Statistics {
    pub active_courses: u32,
    pub completed_courses: u32,
    pub total_credits: u32,
}

/// Counts records by status; credits come from the catalog for completed records.
pub fn aggregate(records: &[Enrollment], catalog: &dyn CourseCatalog) -> Statistics {
    let mut stats = Statistics::default();
    for record in records {
        match record.status {
            EnrollmentStatus::Active => stats.active_courses += 1,
            EnrollmentStatus::Completed => {
                stats.completed_courses += 1;
                let credits = catalog.credits(&record.course_id).unwrap_or(0);
                stats.total_credits = stats.total_credits.saturating_add(credits);
            }
            EnrollmentStatus::Dropped => {}
        }
    }
    stats
}
