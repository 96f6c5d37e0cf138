//! Typed failures raised by the enrollment ledger
use sled::transaction::TransactionError;

use crate::enrollment::EnrollmentStatus;

pub type Result<T> = std::result::Result<T, EnrollmentError>;

/// Coarse classification of an [`EnrollmentError`], used by callers to pick a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Conflict,
    Precondition,
    Concurrency,
    Storage,
}

#[derive(thiserror::Error, Debug)]
pub enum EnrollmentError {
    #[error("invalid input: {message}")]
    Validation { message: String },
    /// Unknown course, or (`closed`) a registered course not open for enrollment.
    #[error("course '{course_id}' {}", unavailable(.closed))]
    CourseNotFound { course_id: String, closed: bool },
    #[error("student '{student_id}' is already enrolled in '{course_id}'")]
    AlreadyEnrolled {
        student_id: String,
        course_id: String,
    },
    #[error("course '{course_id}' is full ({capacity} seats taken)")]
    CapacityExceeded { course_id: String, capacity: u32 },
    #[error("student '{student_id}' is not enrolled in '{course_id}'")]
    NotEnrolled {
        student_id: String,
        course_id: String,
    },
    #[error("prerequisites not met for '{course_id}': missing {missing:?}")]
    PrerequisitesNotMet {
        course_id: String,
        missing: Vec<String>,
    },
    #[error("prerequisite cycle detected: {}", .path.join(" -> "))]
    CycleDetected { path: Vec<String> },
    #[error("enrollment cannot move from {from} to {to}")]
    InvalidStateTransition {
        from: EnrollmentStatus,
        to: EnrollmentStatus,
    },
    #[error("course '{course_id}' is busy, retry later")]
    Busy { course_id: String },
    #[error("storage error: {0}")]
    Storage(#[from] sled::Error),
    #[error("failed to encode record: {0}")]
    Encode(String),
    #[error("failed to decode record: {0}")]
    Decode(#[from] minicbor::decode::Error),
    #[error("ledger invariant violated: {0}")]
    Corrupted(String),
}

fn unavailable(closed: &bool) -> &'static str {
    if *closed {
        "is closed for enrollment"
    } else {
        "not found"
    }
}

impl EnrollmentError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation { .. } => ErrorKind::Validation,
            Self::CourseNotFound { .. } => ErrorKind::NotFound,
            Self::AlreadyEnrolled { .. }
            | Self::CapacityExceeded { .. }
            | Self::NotEnrolled { .. }
            | Self::InvalidStateTransition { .. } => ErrorKind::Conflict,
            Self::PrerequisitesNotMet { .. } | Self::CycleDetected { .. } => {
                ErrorKind::Precondition
            }
            Self::Busy { .. } => ErrorKind::Concurrency,
            Self::Storage(_) | Self::Encode(_) | Self::Decode(_) | Self::Corrupted(_) => {
                ErrorKind::Storage
            }
        }
    }

    /// Only lock timeouts are worth retrying as-is.
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Concurrency
    }

    pub(crate) fn course_not_found(course_id: impl Into<String>) -> Self {
        Self::CourseNotFound {
            course_id: course_id.into(),
            closed: false,
        }
    }

    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }
}

impl<E: std::fmt::Display> From<minicbor::encode::Error<E>> for EnrollmentError {
    fn from(value: minicbor::encode::Error<E>) -> Self {
        Self::Encode(value.to_string())
    }
}

impl From<TransactionError<EnrollmentError>> for EnrollmentError {
    fn from(value: TransactionError<EnrollmentError>) -> Self {
        match value {
            TransactionError::Abort(err) => err,
            TransactionError::Storage(err) => Self::Storage(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_busy_is_retryable() {
        let busy = EnrollmentError::Busy {
            course_id: "cs101".into(),
        };
        let full = EnrollmentError::CapacityExceeded {
            course_id: "cs101".into(),
            capacity: 1,
        };

        assert!(busy.is_retryable());
        assert!(!full.is_retryable());
        assert_eq!(full.kind(), ErrorKind::Conflict);
    }

    #[test]
    fn cycle_message_shows_path() {
        let err = EnrollmentError::CycleDetected {
            path: vec!["b".into(), "a".into(), "b".into()],
        };
        assert_eq!(err.to_string(), "prerequisite cycle detected: b -> a -> b");
        assert_eq!(err.kind(), ErrorKind::Precondition);
    }

    #[test]
    fn closed_course_is_reported_as_not_found_kind() {
        let missing = EnrollmentError::course_not_found("cs101");
        let closed = EnrollmentError::CourseNotFound {
            course_id: "cs101".into(),
            closed: true,
        };

        assert_eq!(missing.to_string(), "course 'cs101' not found");
        assert_eq!(closed.to_string(), "course 'cs101' is closed for enrollment");
        assert_eq!(closed.kind(), ErrorKind::NotFound);
        assert!(!closed.is_retryable());
    }
}
