//! Course aggregate carrying capacity and the cached seat counter
use std::collections::BTreeSet;

use crate::error::{EnrollmentError, Result};
use crate::types::{CourseId, validate_id};

// Stored under the course id. `active_enrollment_count` is owned by the ledger.
#[derive(Debug, Clone, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub struct Course {
    #[n(0)]
    pub id: CourseId,
    #[n(1)]
    pub capacity: u32,
    #[n(2)]
    pub active_enrollment_count: u32,
    #[n(3)]
    pub prerequisite_course_ids: BTreeSet<CourseId>,
    #[n(4)]
    pub is_open_for_enrollment: bool,
    #[n(5)]
    pub owner_id: String,
}

impl Course {
    pub fn has_free_seat(&self) -> bool {
        self.active_enrollment_count < self.capacity
    }

    pub fn seats_remaining(&self) -> u32 {
        self.capacity.saturating_sub(self.active_enrollment_count)
    }
}

/// Authoring-side description of a course; the ledger fills in the derived fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CourseDetails {
    id: Option<CourseId>,
    capacity: u32,
    owner_id: Option<String>,
    is_open_for_enrollment: bool,
}

impl CourseDetails {
    pub fn new() -> Self {
        Self {
            is_open_for_enrollment: true,
            ..Self::default()
        }
    }
    pub fn set_id(mut self, id: impl Into<CourseId>) -> Self {
        self.id = Some(id.into());
        self
    }
    pub fn set_capacity(mut self, capacity: u32) -> Self {
        self.capacity = capacity;
        self
    }
    pub fn set_owner(mut self, owner_id: impl Into<String>) -> Self {
        self.owner_id = Some(owner_id.into());
        self
    }
    pub fn set_open(mut self, open: bool) -> Self {
        self.is_open_for_enrollment = open;
        self
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// Checks fields and merges them over the currently stored row, if any.
    pub fn validate_and_finalise(&self, existing: Option<&Course>) -> Result<Course> {
        let id = self
            .id
            .clone()
            .ok_or_else(|| EnrollmentError::validation("course id is not set"))?;
        validate_id("course", &id)?;

        if self.capacity == 0 {
            return Err(EnrollmentError::validation(format!(
                "course '{id}' capacity must be positive"
            )));
        }
        let owner_id = self
            .owner_id
            .clone()
            .filter(|owner| !owner.trim().is_empty())
            .ok_or_else(|| EnrollmentError::validation("course owner is not set"))?;

        let (active_enrollment_count, prerequisite_course_ids) = match existing {
            Some(current) => (
                current.active_enrollment_count,
                current.prerequisite_course_ids.clone(),
            ),
            None => (0, BTreeSet::new()),
        };
        if self.capacity < active_enrollment_count {
            return Err(EnrollmentError::validation(format!(
                "course '{id}' capacity {} is below its {active_enrollment_count} active enrollments",
                self.capacity
            )));
        }

        Ok(Course {
            id,
            capacity: self.capacity,
            active_enrollment_count,
            prerequisite_course_ids,
            is_open_for_enrollment: self.is_open_for_enrollment,
            owner_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn details() -> CourseDetails {
        CourseDetails::new()
            .set_id("cs101")
            .set_capacity(30)
            .set_owner("prof_ada")
    }

    #[test]
    fn finalises_new_course_open_and_empty() {
        let course = details().validate_and_finalise(None).unwrap();
        assert_eq!(course.active_enrollment_count, 0);
        assert!(course.is_open_for_enrollment);
        assert!(course.prerequisite_course_ids.is_empty());
        assert_eq!(course.seats_remaining(), 30);
    }

    #[test]
    fn rejects_zero_capacity_and_missing_owner() {
        assert!(details().set_capacity(0).validate_and_finalise(None).is_err());
        let no_owner = CourseDetails::new().set_id("cs101").set_capacity(5);
        assert!(no_owner.validate_and_finalise(None).is_err());
    }

    #[test]
    fn keeps_ledger_owned_fields_on_update() {
        let mut stored = details().validate_and_finalise(None).unwrap();
        stored.active_enrollment_count = 12;
        stored.prerequisite_course_ids.insert("math100".into());

        let updated = details()
            .set_capacity(40)
            .validate_and_finalise(Some(&stored))
            .unwrap();
        assert_eq!(updated.active_enrollment_count, 12);
        assert!(updated.prerequisite_course_ids.contains("math100"));

        let shrunk = details().set_capacity(10).validate_and_finalise(Some(&stored));
        assert!(matches!(shrunk, Err(EnrollmentError::Validation { .. })));
    }
}
