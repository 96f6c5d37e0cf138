//! Side-effect-free eligibility evaluation.
//!
//! [`evaluate`] is shared by the advisory `check_eligibility` read path and the
//! ledger's authoritative recheck inside the per-course critical section. Only the
//! facts differ: the advisory path reads them without locks and may be stale.
use std::fmt;

use crate::course::Course;
use crate::error::EnrollmentError;
use crate::types::CourseId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IneligibleReason {
    CourseClosed,
    AlreadyEnrolled,
    CourseFull,
    MissingPrerequisites,
}

impl fmt::Display for IneligibleReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::CourseClosed => "course not found/closed",
            Self::AlreadyEnrolled => "already enrolled",
            Self::CourseFull => "course is full",
            Self::MissingPrerequisites => "missing prerequisites",
        };
        f.write_str(text)
    }
}

/// Everything the evaluator needs, gathered by the caller.
#[derive(Debug, Clone)]
pub struct EligibilityFacts<'a> {
    pub course: &'a Course,
    pub already_enrolled: bool,
    pub missing_prerequisites: Vec<CourseId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EligibilityDecision {
    pub can_enroll: bool,
    pub reasons: Vec<IneligibleReason>,
    pub missing_prerequisites: Vec<CourseId>,
}

impl EligibilityDecision {
    pub fn reason_messages(&self) -> Vec<String> {
        self.reasons.iter().map(ToString::to_string).collect()
    }

    pub fn has_reason(&self, reason: IneligibleReason) -> bool {
        self.reasons.contains(&reason)
    }

    /// The typed error `enroll` raises for this decision, if any.
    ///
    /// Several reasons may apply at once; the first in precedence order wins:
    /// closed, already enrolled, full, missing prerequisites.
    pub fn blocking_error(&self, student_id: &str, course: &Course) -> Option<EnrollmentError> {
        if self.has_reason(IneligibleReason::CourseClosed) {
            return Some(EnrollmentError::CourseNotFound {
                course_id: course.id.clone(),
                closed: true,
            });
        }
        if self.has_reason(IneligibleReason::AlreadyEnrolled) {
            return Some(EnrollmentError::AlreadyEnrolled {
                student_id: student_id.to_string(),
                course_id: course.id.clone(),
            });
        }
        if self.has_reason(IneligibleReason::CourseFull) {
            return Some(EnrollmentError::CapacityExceeded {
                course_id: course.id.clone(),
                capacity: course.capacity,
            });
        }
        if self.has_reason(IneligibleReason::MissingPrerequisites) {
            return Some(EnrollmentError::PrerequisitesNotMet {
                course_id: course.id.clone(),
                missing: self.missing_prerequisites.clone(),
            });
        }
        None
    }
}

/// Combines course state and prerequisite results into a decision.
///
/// A closed course short-circuits; every other blocking condition is reported
/// together so a client can show them all at once.
pub fn evaluate(facts: EligibilityFacts<'_>) -> EligibilityDecision {
    if !facts.course.is_open_for_enrollment {
        return EligibilityDecision {
            can_enroll: false,
            reasons: vec![IneligibleReason::CourseClosed],
            missing_prerequisites: Vec::new(),
        };
    }

    let mut reasons = Vec::new();
    if facts.already_enrolled {
        reasons.push(IneligibleReason::AlreadyEnrolled);
    }
    if !facts.course.has_free_seat() {
        reasons.push(IneligibleReason::CourseFull);
    }
    if !facts.missing_prerequisites.is_empty() {
        reasons.push(IneligibleReason::MissingPrerequisites);
    }

    EligibilityDecision {
        can_enroll: reasons.is_empty(),
        reasons,
        missing_prerequisites: facts.missing_prerequisites,
    }
}
