//! crates/enrollment_core/src/admission.rs
//!
//! The admission engine: decides whether a student may enroll in a course and
//! owns the administrative confirm/cancel transitions.
//!
//! Admission reads the stores directly, never the catalog cache, because the
//! capacity and overlap checks need current data. The capacity check made here
//! is advisory; the hard seat limit is enforced by `confirm`.

use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::catalog::CatalogCache;
use crate::domain::{Course, Enrollment, EnrollmentDetail, EnrollmentStatus};
use crate::error::{AdminError, EnrollError, RejectReason};
use crate::ports::{CourseStore, EnrollmentStore, PortError, PortResult};

/// Whether an existing enrollment for the same (course, user) pair blocks a
/// new request. Cancelled enrollments still occupy the pair's uniqueness slot.
fn existing_enrollment_blocks(_existing: &Enrollment) -> bool {
    true
}

#[derive(Clone)]
pub struct Admission {
    courses: Arc<dyn CourseStore>,
    enrollments: Arc<dyn EnrollmentStore>,
    cache: CatalogCache,
}

impl Admission {
    pub fn new(
        courses: Arc<dyn CourseStore>,
        enrollments: Arc<dyn EnrollmentStore>,
        cache: CatalogCache,
    ) -> Self {
        Self {
            courses,
            enrollments,
            cache,
        }
    }

    /// Requests a seat for `user_id` in `course_id`.
    ///
    /// Checks run in a fixed order and the first failure wins: availability,
    /// capacity, duplicate, schedule overlap. On success a single Pending
    /// enrollment is written and its id returned; a rejection writes nothing.
    pub async fn try_enroll(&self, course_id: Uuid, user_id: Uuid) -> Result<Uuid, EnrollError> {
        match self.check_admission(course_id, user_id).await? {
            Err(reason) => {
                info!(%course_id, %user_id, ?reason, "Enrollment rejected");
                Err(EnrollError::Rejected(reason))
            }
            Ok(()) => {
                let enrollment = Enrollment::pending(course_id, user_id);
                match self.enrollments.insert(&enrollment).await {
                    Ok(()) => {
                        info!(%course_id, %user_id, enrollment_id = %enrollment.id, "Enrollment registered as pending");
                        Ok(enrollment.id)
                    }
                    // Lost a race with a concurrent request for the same pair.
                    Err(PortError::UniqueViolation(_)) => {
                        warn!(%course_id, %user_id, "Concurrent duplicate enrollment detected on insert");
                        Err(EnrollError::Rejected(RejectReason::AlreadyEnrolled))
                    }
                    Err(e) => Err(EnrollError::Store(e)),
                }
            }
        }
    }

    async fn check_admission(
        &self,
        course_id: Uuid,
        user_id: Uuid,
    ) -> PortResult<Result<(), RejectReason>> {
        let course = match self.courses.get_by_id(course_id).await? {
            Some(course) if course.active => course,
            _ => return Ok(Err(RejectReason::CourseUnavailable)),
        };

        let confirmed = self.enrollments.count_confirmed_by_course(course_id).await?;
        if confirmed >= i64::from(course.capacity) {
            return Ok(Err(RejectReason::CapacityExceeded));
        }

        if let Some(existing) = self
            .enrollments
            .find_by_course_and_user(course_id, user_id)
            .await?
        {
            if existing_enrollment_blocks(&existing) {
                return Ok(Err(RejectReason::AlreadyEnrolled));
            }
        }

        let taken = self.enrollments.list_confirmed_by_user(user_id).await?;
        if taken.iter().any(|other| other.id != course.id && course.overlaps(other)) {
            return Ok(Err(RejectReason::ScheduleConflict));
        }

        Ok(Ok(()))
    }

    /// Promotes an enrollment to Confirmed if its course still has a free seat.
    ///
    /// This is the authoritative capacity gate: the store re-counts confirmed
    /// seats and flips the status as one serialized step per course.
    pub async fn confirm(&self, enrollment_id: Uuid) -> Result<(), AdminError> {
        let enrollment = self.load_enrollment(enrollment_id).await?;
        if enrollment.status == EnrollmentStatus::Confirmed {
            return Ok(());
        }
        let course = self
            .courses
            .get_by_id(enrollment.course_id)
            .await?
            .ok_or_else(|| {
                AdminError::NotFound(format!("Course {} not found", enrollment.course_id))
            })?;

        let confirmed = self
            .enrollments
            .confirm_within_capacity(enrollment_id, course.id, course.capacity)
            .await?;
        if !confirmed {
            info!(%enrollment_id, course = %course.code, "Confirmation rejected: course is full");
            return Err(AdminError::CapacityExceeded);
        }

        self.cache.invalidate().await;
        info!(%enrollment_id, course = %course.code, "Enrollment confirmed");
        Ok(())
    }

    /// Cancels an enrollment unconditionally. The record is kept.
    pub async fn cancel(&self, enrollment_id: Uuid) -> Result<(), AdminError> {
        self.load_enrollment(enrollment_id).await?;
        self.enrollments
            .update_status(enrollment_id, EnrollmentStatus::Cancelled)
            .await
            .map_err(|e| match e {
                PortError::NotFound(_) => {
                    AdminError::NotFound(format!("Enrollment {} not found", enrollment_id))
                }
                other => AdminError::Store(other),
            })?;

        self.cache.invalidate().await;
        info!(%enrollment_id, "Enrollment cancelled");
        Ok(())
    }

    /// Every enrollment of the user, newest first, with its course.
    pub async fn enrollments_for_user(&self, user_id: Uuid) -> PortResult<Vec<EnrollmentDetail>> {
        let enrollments = self.enrollments.list_by_user(user_id).await?;
        let mut details = Vec::with_capacity(enrollments.len());
        for enrollment in enrollments {
            if let Some(course) = self.course_of(&enrollment).await? {
                details.push(EnrollmentDetail { enrollment, course });
            }
        }
        Ok(details)
    }

    async fn course_of(&self, enrollment: &Enrollment) -> PortResult<Option<Course>> {
        self.courses.get_by_id(enrollment.course_id).await
    }

    async fn load_enrollment(&self, id: Uuid) -> Result<Enrollment, AdminError> {
        self.enrollments
            .get_by_id(id)
            .await?
            .ok_or_else(|| AdminError::NotFound(format!("Enrollment {} not found", id)))
    }
}
