//! Enrollment records and their status state machine
use std::fmt;

use chrono::Utc;

use crate::error::{EnrollmentError, Result};
use crate::types::{CourseId, StudentId, TimeStamp};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, minicbor::Encode, minicbor::Decode)]
pub enum EnrollmentStatus {
    #[n(0)]
    Active,
    #[n(1)]
    Completed,
    #[n(2)]
    Dropped,
}

impl EnrollmentStatus {
    /// Completed and dropped records never change again.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Dropped)
    }

    pub fn can_transition_to(self, next: EnrollmentStatus) -> bool {
        matches!(
            (self, next),
            (Self::Active, Self::Completed) | (Self::Active, Self::Dropped)
        )
    }

    pub fn transition(self, next: EnrollmentStatus) -> Result<EnrollmentStatus> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(EnrollmentError::InvalidStateTransition {
                from: self,
                to: next,
            })
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Dropped => "dropped",
        }
    }
}

impl fmt::Display for EnrollmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EnrollmentStatus {
    type Err = EnrollmentError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "active" => Ok(Self::Active),
            "completed" => Ok(Self::Completed),
            "dropped" => Ok(Self::Dropped),
            other => Err(EnrollmentError::validation(format!(
                "unknown enrollment status '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub struct Enrollment {
    #[n(0)]
    pub id: String, // bech32 encoded uuid7
    #[n(1)]
    pub student_id: StudentId,
    #[n(2)]
    pub course_id: CourseId,
    #[n(3)]
    pub status: EnrollmentStatus,
    #[n(4)]
    pub enrolled_at: TimeStamp<Utc>,
    #[n(5)]
    pub completed_at: Option<TimeStamp<Utc>>,
    #[n(6)]
    pub dropped_at: Option<TimeStamp<Utc>>,
}

impl Enrollment {
    pub fn new_active(id: String, student_id: StudentId, course_id: CourseId) -> Self {
        Self {
            id,
            student_id,
            course_id,
            status: EnrollmentStatus::Active,
            enrolled_at: TimeStamp::new(),
            completed_at: None,
            dropped_at: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == EnrollmentStatus::Active
    }

    pub fn complete(&mut self) -> Result<()> {
        self.status = self.status.transition(EnrollmentStatus::Completed)?;
        self.completed_at = Some(TimeStamp::new());
        Ok(())
    }

    pub fn drop_seat(&mut self) -> Result<()> {
        self.status = self.status.transition(EnrollmentStatus::Dropped)?;
        self.dropped_at = Some(TimeStamp::new());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn active() -> Enrollment {
        Enrollment::new_active("enr_1test".into(), "s1".into(), "cs101".into())
    }

    #[test]
    fn active_moves_to_either_terminal_state() {
        let mut completed = active();
        completed.complete().unwrap();
        assert_eq!(completed.status, EnrollmentStatus::Completed);
        assert!(completed.completed_at.is_some());
        assert!(completed.dropped_at.is_none());

        let mut dropped = active();
        dropped.drop_seat().unwrap();
        assert_eq!(dropped.status, EnrollmentStatus::Dropped);
        assert!(dropped.dropped_at.is_some());
    }

    #[test]
    fn terminal_states_reject_every_transition() {
        for from in [EnrollmentStatus::Completed, EnrollmentStatus::Dropped] {
            assert!(from.is_terminal());
            for to in [
                EnrollmentStatus::Active,
                EnrollmentStatus::Completed,
                EnrollmentStatus::Dropped,
            ] {
                assert!(matches!(
                    from.transition(to),
                    Err(EnrollmentError::InvalidStateTransition { .. })
                ));
            }
        }
    }

    #[test]
    fn dropped_record_cannot_complete() {
        let mut record = active();
        record.drop_seat().unwrap();
        assert!(record.complete().is_err());
        assert_eq!(record.status, EnrollmentStatus::Dropped);
    }

    #[test]
    fn enrollment_encoding() {
        let original = active();
        let encoded = minicbor::to_vec(&original).unwrap();
        let decoded: Enrollment = minicbor::decode(&encoded).unwrap();
        assert_eq!(original, decoded);
    }

    #[test]
    fn status_parses_from_cli_names() {
        assert_eq!(
            "completed".parse::<EnrollmentStatus>().unwrap(),
            EnrollmentStatus::Completed
        );
        assert!("pending".parse::<EnrollmentStatus>().is_err());
    }
}
