//! crates/enrollment_core/src/error.rs
//!
//! Typed outcomes of the admission and administration flows. Rejections are
//! expected, user-facing results; only the `Store` variants are faults.

use crate::ports::PortError;

/// Why an enrollment request (or a seat confirmation) was turned down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RejectReason {
    #[error("The course does not exist or is not available")]
    CourseUnavailable,
    #[error("The course has reached its maximum capacity")]
    CapacityExceeded,
    #[error("Already enrolled in this course")]
    AlreadyEnrolled,
    #[error("The course schedule overlaps another confirmed course")]
    ScheduleConflict,
}

/// The error type for `Admission::try_enroll`.
#[derive(Debug, thiserror::Error)]
pub enum EnrollError {
    #[error("Enrollment rejected: {0}")]
    Rejected(RejectReason),
    #[error("Store error: {0}")]
    Store(#[from] PortError),
}

impl EnrollError {
    /// The rejection reason, or `None` for store faults.
    pub fn reason(&self) -> Option<RejectReason> {
        match self {
            EnrollError::Rejected(reason) => Some(*reason),
            EnrollError::Store(_) => None,
        }
    }
}

/// The error type for administrative operations on courses and enrollments.
#[derive(Debug, thiserror::Error)]
pub enum AdminError {
    #[error("The start time must be earlier than the end time")]
    InvalidSchedule,
    #[error("A course with code {0} already exists")]
    DuplicateCode(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("The course has reached its maximum capacity")]
    CapacityExceeded,
    #[error("The record was modified by someone else; reload and retry")]
    ConcurrentModification,
    #[error("Store error: {0}")]
    Store(#[from] PortError),
}
