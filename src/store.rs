//! sled persistence for courses, enrollment records and the active-seat index.
//!
//! Layout:
//! - `courses`: course id -> CBOR [`Course`], including the cached seat counter
//! - `enrollments`: `student/course/enrolled_at_nanos/id` -> CBOR [`Enrollment`]
//! - `active_seats`: `course/student` -> key of the active enrollment record
//!
//! Every mutation commits all three trees in one transaction and rechecks the
//! counter and index inside it.
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use sled::Transactional;
use sled::transaction::{ConflictableTransactionError, ConflictableTransactionResult};

use crate::course::Course;
use crate::enrollment::{Enrollment, EnrollmentStatus};
use crate::error::{EnrollmentError, Result};
use crate::prerequisites::PrerequisiteGraph;
use crate::types::{CourseId, KEY_SEPARATOR};

const COURSES_TREE: &str = "courses";
const ENROLLMENTS_TREE: &str = "enrollments";
const ACTIVE_SEATS_TREE: &str = "active_seats";

pub fn enrollment_key(enrollment: &Enrollment) -> String {
    format!(
        "{}{sep}{}{sep}{:020}{sep}{}",
        enrollment.student_id,
        enrollment.course_id,
        enrollment.enrolled_at.nanos(),
        enrollment.id,
        sep = KEY_SEPARATOR
    )
}

pub fn active_seat_key(course_id: &str, student_id: &str) -> String {
    format!("{course_id}{KEY_SEPARATOR}{student_id}")
}

fn prefix(parts: &[&str]) -> String {
    let mut key = String::new();
    for part in parts {
        key.push_str(part);
        key.push(KEY_SEPARATOR);
    }
    key
}

fn decode<T>(bytes: &[u8]) -> Result<T>
where
    T: for<'b> minicbor::Decode<'b, ()>,
{
    Ok(minicbor::decode(bytes)?)
}

fn abort<T>(err: EnrollmentError) -> ConflictableTransactionResult<T, EnrollmentError> {
    Err(ConflictableTransactionError::Abort(err))
}

fn decode_row<T>(bytes: &[u8]) -> ConflictableTransactionResult<T, EnrollmentError>
where
    T: for<'b> minicbor::Decode<'b, ()>,
{
    decode(bytes).map_err(ConflictableTransactionError::Abort)
}

fn encode_row<T>(value: &T) -> ConflictableTransactionResult<Vec<u8>, EnrollmentError>
where
    T: minicbor::Encode<()>,
{
    minicbor::to_vec(value).map_err(|e| ConflictableTransactionError::Abort(e.into()))
}

#[derive(Clone)]
pub struct LedgerStore {
    instance: Arc<sled::Db>,
    courses: sled::Tree,
    enrollments: sled::Tree,
    active_seats: sled::Tree,
}

impl LedgerStore {
    pub fn new(instance: Arc<sled::Db>) -> Result<Self> {
        let courses = instance.open_tree(COURSES_TREE)?;
        let enrollments = instance.open_tree(ENROLLMENTS_TREE)?;
        let active_seats = instance.open_tree(ACTIVE_SEATS_TREE)?;
        Ok(Self {
            instance,
            courses,
            enrollments,
            active_seats,
        })
    }

    pub fn flush(&self) -> Result<()> {
        self.instance.flush()?;
        Ok(())
    }

    // READS: lock-free, possibly stale relative to an in-flight commit.

    pub fn course(&self, course_id: &str) -> Result<Option<Course>> {
        self.courses
            .get(course_id.as_bytes())?
            .map(|bytes| decode(&bytes))
            .transpose()
    }

    pub fn courses(&self) -> Result<Vec<Course>> {
        self.courses
            .iter()
            .values()
            .map(|bytes| decode(&bytes?))
            .collect()
    }

    pub fn prerequisite_graph(&self) -> Result<PrerequisiteGraph> {
        let edges = self
            .courses()?
            .into_iter()
            .map(|course| (course.id, course.prerequisite_course_ids));
        Ok(PrerequisiteGraph::from_edges(edges))
    }

    pub fn active_enrollment(
        &self,
        student_id: &str,
        course_id: &str,
    ) -> Result<Option<Enrollment>> {
        let Some(record_key) = self
            .active_seats
            .get(active_seat_key(course_id, student_id).as_bytes())?
        else {
            return Ok(None);
        };
        self.enrollments
            .get(&record_key)?
            .map(|bytes| decode(&bytes))
            .transpose()
    }

    fn scan_enrollments(&self, key_prefix: String) -> Result<Vec<Enrollment>> {
        self.enrollments
            .scan_prefix(key_prefix.as_bytes())
            .values()
            .map(|bytes| decode(&bytes?))
            .collect()
    }

    /// All records for a student, ordered by course then enrollment time.
    pub fn enrollments_for_student(&self, student_id: &str) -> Result<Vec<Enrollment>> {
        self.scan_enrollments(prefix(&[student_id]))
    }

    /// Every record for one (student, course) pair, oldest first.
    pub fn enrollment_history(
        &self,
        student_id: &str,
        course_id: &str,
    ) -> Result<Vec<Enrollment>> {
        self.scan_enrollments(prefix(&[student_id, course_id]))
    }

    pub fn has_completed(&self, student_id: &str, course_id: &str) -> Result<bool> {
        Ok(self
            .enrollment_history(student_id, course_id)?
            .iter()
            .any(|record| record.status == EnrollmentStatus::Completed))
    }

    /// Active enrollments of a course, via the active-seat index.
    pub fn roster(&self, course_id: &str) -> Result<Vec<Enrollment>> {
        let mut roster = Vec::new();
        for entry in self.active_seats.scan_prefix(prefix(&[course_id]).as_bytes()) {
            let (_, record_key) = entry?;
            match self.enrollments.get(&record_key)? {
                Some(bytes) => roster.push(decode(&bytes)?),
                None => {
                    return Err(EnrollmentError::Corrupted(format!(
                        "active seat in '{course_id}' points at a missing record"
                    )));
                }
            }
        }
        Ok(roster)
    }

    /// Active record counts per course, recomputed from the records themselves.
    pub fn active_records_by_course(&self) -> Result<BTreeMap<CourseId, u32>> {
        let mut counts = BTreeMap::new();
        for bytes in self.enrollments.iter().values() {
            let record: Enrollment = decode(&bytes?)?;
            if record.is_active() {
                *counts.entry(record.course_id).or_insert(0) += 1;
            }
        }
        Ok(counts)
    }

    // WRITES: callers hold the course's critical section.

    pub fn put_course(&self, course: &Course) -> Result<()> {
        let row = minicbor::to_vec(course)?;
        self.courses.insert(course.id.as_bytes(), row)?;
        Ok(())
    }

    /// Replaces a course's prerequisite set and returns the updated row.
    pub fn commit_prerequisites(
        &self,
        course_id: &str,
        required: &BTreeSet<CourseId>,
    ) -> Result<Course> {
        let course = self.courses.transaction(|courses| {
            let mut course: Course = match courses.get(course_id.as_bytes())? {
                Some(bytes) => decode_row(&bytes)?,
                None => {
                    return abort(EnrollmentError::course_not_found(course_id));
                }
            };
            course.prerequisite_course_ids = required.clone();
            courses.insert(course.id.as_bytes(), encode_row(&course)?)?;
            Ok(course)
        })?;
        Ok(course)
    }

    /// Inserts an active record and takes one seat, or aborts with no effect.
    pub fn commit_enrollment(&self, enrollment: &Enrollment) -> Result<Course> {
        let record_key = enrollment_key(enrollment);
        let seat_key = active_seat_key(&enrollment.course_id, &enrollment.student_id);
        let record = minicbor::to_vec(enrollment)?;

        let course = (&self.courses, &self.enrollments, &self.active_seats).transaction(
            |(courses, enrollments, active_seats)| {
                let mut course: Course = match courses.get(enrollment.course_id.as_bytes())? {
                    Some(bytes) => decode_row(&bytes)?,
                    None => {
                        return abort(EnrollmentError::course_not_found(&enrollment.course_id));
                    }
                };
                if active_seats.get(seat_key.as_bytes())?.is_some() {
                    return abort(EnrollmentError::AlreadyEnrolled {
                        student_id: enrollment.student_id.clone(),
                        course_id: enrollment.course_id.clone(),
                    });
                }
                if !course.has_free_seat() {
                    return abort(EnrollmentError::CapacityExceeded {
                        course_id: course.id.clone(),
                        capacity: course.capacity,
                    });
                }

                course.active_enrollment_count += 1;
                courses.insert(course.id.as_bytes(), encode_row(&course)?)?;
                enrollments.insert(record_key.as_bytes(), record.as_slice())?;
                active_seats.insert(seat_key.as_bytes(), record_key.as_bytes())?;
                Ok(course)
            },
        )?;
        Ok(course)
    }

    /// Moves the pair's active record to dropped and frees its seat.
    pub fn commit_drop(&self, student_id: &str, course_id: &str) -> Result<Enrollment> {
        let seat_key = active_seat_key(course_id, student_id);

        let dropped = (&self.courses, &self.enrollments, &self.active_seats).transaction(
            |(courses, enrollments, active_seats)| {
                let Some(record_key) = active_seats.get(seat_key.as_bytes())? else {
                    return abort(EnrollmentError::NotEnrolled {
                        student_id: student_id.to_string(),
                        course_id: course_id.to_string(),
                    });
                };
                let mut record: Enrollment = match enrollments.get(&record_key)? {
                    Some(bytes) => decode_row(&bytes)?,
                    None => {
                        return abort(EnrollmentError::Corrupted(format!(
                            "active seat {seat_key} points at a missing record"
                        )));
                    }
                };
                let mut course: Course = match courses.get(course_id.as_bytes())? {
                    Some(bytes) => decode_row(&bytes)?,
                    None => {
                        return abort(EnrollmentError::course_not_found(course_id));
                    }
                };
                let Some(remaining) = course.active_enrollment_count.checked_sub(1) else {
                    return abort(EnrollmentError::Corrupted(format!(
                        "seat counter for '{course_id}' is already zero"
                    )));
                };

                record.drop_seat().map_err(ConflictableTransactionError::Abort)?;
                course.active_enrollment_count = remaining;

                enrollments.insert(&record_key[..], encode_row(&record)?)?;
                active_seats.remove(seat_key.as_bytes())?;
                courses.insert(course.id.as_bytes(), encode_row(&course)?)?;
                Ok(record)
            },
        )?;
        Ok(dropped)
    }

    /// Completes every active record of a course and releases their seats.
    pub fn commit_completion(&self, course_id: &str) -> Result<Vec<Enrollment>> {
        let mut seats = Vec::new();
        for entry in self.active_seats.scan_prefix(prefix(&[course_id]).as_bytes()) {
            let (seat_key, record_key) = entry?;
            seats.push((seat_key, record_key));
        }

        let completed = (&self.courses, &self.enrollments, &self.active_seats).transaction(
            |(courses, enrollments, active_seats)| {
                let mut course: Course = match courses.get(course_id.as_bytes())? {
                    Some(bytes) => decode_row(&bytes)?,
                    None => {
                        return abort(EnrollmentError::course_not_found(course_id));
                    }
                };

                let mut completed = Vec::with_capacity(seats.len());
                for (seat_key, record_key) in &seats {
                    let mut record: Enrollment = match enrollments.get(record_key)? {
                        Some(bytes) => decode_row(&bytes)?,
                        None => {
                            return abort(EnrollmentError::Corrupted(format!(
                                "active seat in '{course_id}' points at a missing record"
                            )));
                        }
                    };
                    record.complete().map_err(ConflictableTransactionError::Abort)?;
                    enrollments.insert(&record_key[..], encode_row(&record)?)?;
                    active_seats.remove(&seat_key[..])?;
                    completed.push(record);
                }

                let released = completed.len() as u32;
                let Some(remaining) = course.active_enrollment_count.checked_sub(released) else {
                    return abort(EnrollmentError::Corrupted(format!(
                        "seat counter for '{course_id}' is below its {released} active records"
                    )));
                };
                course.active_enrollment_count = remaining;
                courses.insert(course.id.as_bytes(), encode_row(&course)?)?;
                Ok(completed)
            },
        )?;
        Ok(completed)
    }
}
