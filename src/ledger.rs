//! Service layer API for enrollment operations.
//!
//! [`EnrollmentLedger`] is the only writer of course seat counters and
//! enrollment records. Capacity-affecting operations on one course run inside
//! that course's critical section ([`CourseLocks`]) and commit through a single
//! sled transaction, so they are linearized per course and never partially
//! applied. Reads take no ledger locks.
use std::collections::BTreeSet;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::catalog::CourseCatalog;
use crate::config::LedgerConfig;
use crate::course::{Course, CourseDetails};
use crate::eligibility::{self, EligibilityDecision, EligibilityFacts};
use crate::enrollment::{Enrollment, EnrollmentStatus};
use crate::error::{EnrollmentError, Result};
use crate::locks::CourseLocks;
use crate::prerequisites::{self, PrerequisiteGraph};
use crate::statistics::{self, Statistics};
use crate::store::LedgerStore;
use crate::types::{CourseId, validate_id};
use crate::utils;

/// One row of `my_enrollments`: a record joined with its course.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrollmentView {
    pub enrollment: Enrollment,
    pub course: Course,
}

/// A course whose cached counter disagrees with its records, or exceeds capacity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeatDiscrepancy {
    pub course_id: CourseId,
    pub capacity: u32,
    pub cached_count: u32,
    pub recorded_count: u32,
}

pub struct EnrollmentLedger {
    store: LedgerStore,
    locks: CourseLocks,
    // serializes prerequisite edits so two edits cannot jointly close a cycle
    authoring: Mutex<()>,
}

impl EnrollmentLedger {
    pub fn new(instance: Arc<sled::Db>, config: &LedgerConfig) -> Result<Self> {
        Ok(Self {
            store: LedgerStore::new(instance)?,
            locks: CourseLocks::new(config.lock_timeout()),
            authoring: Mutex::new(()),
        })
    }

    /// Opens (or creates) the database at `config.db_path`.
    pub fn open(config: &LedgerConfig) -> Result<Self> {
        let instance = sled::open(&config.db_path)?;
        info!(path = %config.db_path.display(), "opened enrollment ledger");
        Self::new(Arc::new(instance), config)
    }

    pub fn flush(&self) -> Result<()> {
        self.store.flush()
    }

    fn require_course(&self, course_id: &str) -> Result<Course> {
        self.store
            .course(course_id)?
            .ok_or_else(|| EnrollmentError::course_not_found(course_id))
    }

    // COURSE AUTHORING

    /// Registers a course or updates its capacity, owner and open flag.
    ///
    /// The seat counter and prerequisite set of an existing course are kept.
    pub fn upsert_course(&self, details: CourseDetails) -> Result<Course> {
        let course_id = details
            .id()
            .ok_or_else(|| EnrollmentError::validation("course id is not set"))?
            .to_string();
        validate_id("course", &course_id)?;

        self.locks.with_course(&course_id, || {
            let existing = self.store.course(&course_id)?;
            let course = details.validate_and_finalise(existing.as_ref())?;
            self.store.put_course(&course)?;
            info!(
                course_id = %course.id,
                capacity = course.capacity,
                open = course.is_open_for_enrollment,
                created = existing.is_none(),
                "course saved"
            );
            Ok(course)
        })
    }

    pub fn set_open_for_enrollment(&self, course_id: &str, open: bool) -> Result<Course> {
        validate_id("course", course_id)?;
        self.locks.with_course(course_id, || {
            let mut course = self.require_course(course_id)?;
            course.is_open_for_enrollment = open;
            self.store.put_course(&course)?;
            info!(course_id, open, "course enrollment toggled");
            Ok(course)
        })
    }

    pub fn course(&self, course_id: &str) -> Result<Option<Course>> {
        self.store.course(course_id)
    }

    pub fn courses(&self) -> Result<Vec<Course>> {
        self.store.courses()
    }

    // PREREQUISITE GRAPH

    /// Replaces the prerequisite set of `course_id` after checking acyclicity.
    ///
    /// Fails with `CycleDetected` (edges unchanged) if the course would become
    /// its own transitive prerequisite.
    pub fn set_prerequisites<I, S>(
        &self,
        course_id: &str,
        required_ids: I,
    ) -> Result<BTreeSet<CourseId>>
    where
        I: IntoIterator<Item = S>,
        S: Into<CourseId>,
    {
        validate_id("course", course_id)?;
        let required: BTreeSet<CourseId> = required_ids.into_iter().map(Into::into).collect();
        for id in &required {
            validate_id("course", id)?;
        }

        let Some(_authoring) = self.authoring.try_lock_for(self.locks.timeout()) else {
            warn!(course_id, "prerequisite authoring lock timed out");
            return Err(EnrollmentError::Busy {
                course_id: course_id.to_string(),
            });
        };

        self.require_course(course_id)?;
        for id in &required {
            self.require_course(id)?;
        }

        let mut graph = self.store.prerequisite_graph()?;
        if let Err(err) = graph.set_prerequisites(course_id, required.clone()) {
            debug!(course_id, error = %err, "prerequisite edit rejected");
            return Err(err);
        }

        let course = self
            .locks
            .with_course(course_id, || self.store.commit_prerequisites(course_id, &required))?;
        info!(
            course_id,
            prerequisites = ?course.prerequisite_course_ids,
            "prerequisites committed"
        );
        Ok(course.prerequisite_course_ids)
    }

    /// Snapshot of every committed prerequisite edge.
    pub fn prerequisite_graph(&self) -> Result<PrerequisiteGraph> {
        self.store.prerequisite_graph()
    }

    /// Direct prerequisites of `course_id` the student has not completed.
    pub fn unmet_prerequisites(
        &self,
        student_id: &str,
        course_id: &str,
    ) -> Result<Vec<CourseId>> {
        validate_id("student", student_id)?;
        validate_id("course", course_id)?;
        let course = self.require_course(course_id)?;
        self.unmet_for(student_id, &course)
    }

    fn unmet_for(&self, student_id: &str, course: &Course) -> Result<Vec<CourseId>> {
        prerequisites::unmet_prerequisites(&course.prerequisite_course_ids, |required| {
            self.store.has_completed(student_id, required)
        })
    }

    // ELIGIBILITY

    fn evaluate(&self, student_id: &str, course: &Course) -> Result<EligibilityDecision> {
        let already_enrolled = self
            .store
            .active_enrollment(student_id, &course.id)?
            .is_some();
        let missing_prerequisites = self.unmet_for(student_id, course)?;
        Ok(eligibility::evaluate(EligibilityFacts {
            course,
            already_enrolled,
            missing_prerequisites,
        }))
    }

    /// Advisory check; may be stale by the time `enroll` runs.
    pub fn check_eligibility(
        &self,
        student_id: &str,
        course_id: &str,
    ) -> Result<EligibilityDecision> {
        validate_id("student", student_id)?;
        validate_id("course", course_id)?;
        let course = self.require_course(course_id)?;
        self.evaluate(student_id, &course)
    }

    // SEAT LEDGER

    /// Takes a seat for the student, re-validating everything against current state.
    pub fn enroll(&self, student_id: &str, course_id: &str) -> Result<Enrollment> {
        validate_id("student", student_id)?;
        validate_id("course", course_id)?;

        self.locks.with_course(course_id, || {
            let course = self.require_course(course_id)?;
            let decision = self.evaluate(student_id, &course)?;
            if let Some(err) = decision.blocking_error(student_id, &course) {
                debug!(student_id, course_id, error = %err, "enroll rejected");
                return Err(err);
            }

            let enrollment = Enrollment::new_active(
                utils::new_enrollment_id()?,
                student_id.to_string(),
                course_id.to_string(),
            );
            let course = self.store.commit_enrollment(&enrollment)?;
            info!(
                student_id,
                course_id,
                enrollment_id = %enrollment.id,
                seats_taken = course.active_enrollment_count,
                capacity = course.capacity,
                "enrolled"
            );
            Ok(enrollment)
        })
    }

    /// Releases the student's active seat. Fails with `NotEnrolled` if there is none.
    pub fn drop_enrollment(&self, student_id: &str, course_id: &str) -> Result<()> {
        validate_id("student", student_id)?;
        validate_id("course", course_id)?;

        self.locks.with_course(course_id, || {
            let dropped = self.store.commit_drop(student_id, course_id)?;
            info!(student_id, course_id, enrollment_id = %dropped.id, "dropped");
            Ok(())
        })
    }

    /// Completes every active enrollment in the course, releasing all of its seats.
    pub fn transition_to_completed(&self, course_id: &str) -> Result<Vec<Enrollment>> {
        validate_id("course", course_id)?;

        self.locks.with_course(course_id, || {
            self.require_course(course_id)?;
            let completed = self.store.commit_completion(course_id)?;
            info!(course_id, completed = completed.len(), "course completed");
            Ok(completed)
        })
    }

    // QUERIES

    /// The student's records, optionally filtered by status, joined with their courses.
    pub fn my_enrollments(
        &self,
        student_id: &str,
        status: Option<EnrollmentStatus>,
    ) -> Result<Vec<EnrollmentView>> {
        validate_id("student", student_id)?;
        let mut views = Vec::new();
        for enrollment in self.store.enrollments_for_student(student_id)? {
            if status.is_some_and(|wanted| wanted != enrollment.status) {
                continue;
            }
            match self.store.course(&enrollment.course_id)? {
                Some(course) => views.push(EnrollmentView { enrollment, course }),
                None => warn!(
                    enrollment_id = %enrollment.id,
                    course_id = %enrollment.course_id,
                    "enrollment references an unknown course"
                ),
            }
        }
        Ok(views)
    }

    pub fn enrollment_history(
        &self,
        student_id: &str,
        course_id: &str,
    ) -> Result<Vec<Enrollment>> {
        validate_id("student", student_id)?;
        validate_id("course", course_id)?;
        self.store.enrollment_history(student_id, course_id)
    }

    pub fn roster(&self, course_id: &str) -> Result<Vec<Enrollment>> {
        validate_id("course", course_id)?;
        self.store.roster(course_id)
    }

    pub fn statistics(&self, student_id: &str, catalog: &dyn CourseCatalog) -> Result<Statistics> {
        validate_id("student", student_id)?;
        let records = self.store.enrollments_for_student(student_id)?;
        Ok(statistics::aggregate(&records, catalog))
    }

    /// Compares every course's cached counter with its active records.
    ///
    /// Lock-free, so a commit racing the scan can show up as a transient mismatch.
    pub fn audit_seat_counts(&self) -> Result<Vec<SeatDiscrepancy>> {
        let recorded = self.store.active_records_by_course()?;
        let mut discrepancies = Vec::new();
        for course in self.store.courses()? {
            let recorded_count = recorded.get(&course.id).copied().unwrap_or(0);
            let cached_count = course.active_enrollment_count;
            if recorded_count != cached_count || cached_count > course.capacity {
                warn!(
                    course_id = %course.id,
                    cached_count,
                    recorded_count,
                    capacity = course.capacity,
                    "seat counter discrepancy"
                );
                discrepancies.push(SeatDiscrepancy {
                    course_id: course.id,
                    capacity: course.capacity,
                    cached_count,
                    recorded_count,
                });
            }
        }
        Ok(discrepancies)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Barrier;
    use std::thread;

    use super::*;

    fn temporary_ledger(lock_timeout_ms: u64) -> EnrollmentLedger {
        let db = sled::Config::new().temporary(true).open().unwrap();
        let config = LedgerConfig {
            lock_timeout_ms,
            ..LedgerConfig::default()
        };
        let ledger = EnrollmentLedger::new(Arc::new(db), &config).unwrap();
        ledger
            .upsert_course(
                CourseDetails::new()
                    .set_id("cs101")
                    .set_capacity(2)
                    .set_owner("prof_ada"),
            )
            .unwrap();
        ledger
    }

    #[test]
    fn unknown_courses_leave_no_lock_entries() {
        let ledger = temporary_ledger(2_000);
        for i in 0..500 {
            let enroll = ledger.enroll("s1", &format!("nope{i}"));
            assert!(matches!(
                enroll,
                Err(EnrollmentError::CourseNotFound { closed: false, .. })
            ));
            let dropped = ledger.drop_enrollment("s1", &format!("gone{i}"));
            assert!(matches!(dropped, Err(EnrollmentError::NotEnrolled { .. })));
            let completed = ledger.transition_to_completed(&format!("done{i}"));
            assert!(matches!(completed, Err(EnrollmentError::CourseNotFound { .. })));
        }
        assert_eq!(ledger.locks.registered(), 0);

        ledger.enroll("s1", "cs101").unwrap();
        assert_eq!(ledger.locks.registered(), 0);
    }

    #[test]
    fn held_course_fails_mutations_with_busy_and_no_effect() {
        let ledger = Arc::new(temporary_ledger(50));
        ledger.enroll("s1", "cs101").unwrap();

        let held = Arc::new(Barrier::new(2));
        let release = Arc::new(Barrier::new(2));
        let holder = {
            let ledger = Arc::clone(&ledger);
            let held = Arc::clone(&held);
            let release = Arc::clone(&release);
            thread::spawn(move || {
                ledger
                    .locks
                    .with_course("cs101", || {
                        held.wait();
                        release.wait();
                        Ok(())
                    })
                    .unwrap();
            })
        };

        held.wait();
        let enroll = ledger.enroll("s2", "cs101");
        assert!(matches!(enroll, Err(EnrollmentError::Busy { .. })));
        assert!(enroll.unwrap_err().is_retryable());
        assert!(matches!(
            ledger.drop_enrollment("s1", "cs101"),
            Err(EnrollmentError::Busy { .. })
        ));
        assert!(matches!(
            ledger.transition_to_completed("cs101"),
            Err(EnrollmentError::Busy { .. })
        ));

        // reads take no ledger locks and see the state from before the attempts
        let course = ledger.course("cs101").unwrap().unwrap();
        assert_eq!(course.active_enrollment_count, 1);
        assert_eq!(ledger.roster("cs101").unwrap().len(), 1);
        assert!(ledger.enrollment_history("s2", "cs101").unwrap().is_empty());
        assert!(ledger.enrollment_history("s1", "cs101").unwrap()[0].is_active());
        assert!(ledger.check_eligibility("s2", "cs101").unwrap().can_enroll);

        release.wait();
        holder.join().unwrap();

        ledger.enroll("s2", "cs101").unwrap();
        let course = ledger.course("cs101").unwrap().unwrap();
        assert_eq!(course.active_enrollment_count, 2);
        assert!(ledger.audit_seat_counts().unwrap().is_empty());
    }
}
