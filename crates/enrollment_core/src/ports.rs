//! crates/enrollment_core/src/ports.rs
//!
//! Defines the service contracts (traits) the enrollment core depends on.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of the relational store and of the cache backend.

use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use uuid::Uuid;

use crate::domain::{Course, Enrollment, EnrollmentStatus};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (database, cache).
#[derive(Debug, Clone, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    /// A uniqueness constraint rejected the write.
    #[error("Unique constraint violated: {0}")]
    UniqueViolation(String),
    /// The row changed since it was read (optimistic-concurrency mismatch).
    #[error("Concurrent modification: {0}")]
    Conflict(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// Durable record of courses. `code` is unique across active and inactive courses.
#[async_trait]
pub trait CourseStore: Send + Sync {
    async fn get_by_id(&self, id: Uuid) -> PortResult<Option<Course>>;

    /// Finds a course by code, optionally ignoring one id (the course being edited).
    async fn find_by_code(&self, code: &str, exclude_id: Option<Uuid>)
        -> PortResult<Option<Course>>;

    /// All courses that are available for catalog display and enrollment.
    async fn list_active(&self) -> PortResult<Vec<Course>>;

    async fn list_all(&self) -> PortResult<Vec<Course>>;

    /// Fails with `UniqueViolation` if the code is taken.
    async fn insert(&self, course: &Course) -> PortResult<()>;

    /// Writes `course` if the stored version still equals `course.version`, and
    /// returns the stored row with its new version. Fails with `Conflict` on a
    /// version mismatch, `NotFound` if the row is gone, `UniqueViolation` if the
    /// new code is taken.
    async fn update(&self, course: &Course) -> PortResult<Course>;
}

/// Durable record of enrollments. At most one row per (course, user) pair.
#[async_trait]
pub trait EnrollmentStore: Send + Sync {
    async fn get_by_id(&self, id: Uuid) -> PortResult<Option<Enrollment>>;

    async fn count_confirmed_by_course(&self, course_id: Uuid) -> PortResult<i64>;

    /// Confirmed-seat counts for every course that has at least one.
    async fn count_confirmed_grouped(&self) -> PortResult<HashMap<Uuid, i64>>;

    async fn find_by_course_and_user(
        &self,
        course_id: Uuid,
        user_id: Uuid,
    ) -> PortResult<Option<Enrollment>>;

    /// The active courses in which the user holds a Confirmed enrollment.
    async fn list_confirmed_by_user(&self, user_id: Uuid) -> PortResult<Vec<Course>>;

    /// Every enrollment of the user, newest first.
    async fn list_by_user(&self, user_id: Uuid) -> PortResult<Vec<Enrollment>>;

    /// Every Pending enrollment, oldest first.
    async fn list_pending(&self) -> PortResult<Vec<Enrollment>>;

    /// Fails with `UniqueViolation` if the (course, user) pair already exists.
    async fn insert(&self, enrollment: &Enrollment) -> PortResult<()>;

    async fn update_status(&self, id: Uuid, status: EnrollmentStatus) -> PortResult<()>;

    /// Atomically re-counts Confirmed seats for `course_id` and, if fewer than
    /// `capacity`, marks the enrollment Confirmed. Returns `false` when the
    /// course is full. Concurrent calls for one course are serialized.
    async fn confirm_within_capacity(
        &self,
        enrollment_id: Uuid,
        course_id: Uuid,
        capacity: i32,
    ) -> PortResult<bool>;
}

/// A key/value cache with opaque string payloads and per-entry expiry.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    async fn get_string(&self, key: &str) -> PortResult<Option<String>>;

    async fn set_string(&self, key: &str, value: String, ttl: Duration) -> PortResult<()>;

    async fn remove(&self, key: &str) -> PortResult<()>;
}
