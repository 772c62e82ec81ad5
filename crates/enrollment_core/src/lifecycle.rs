//! crates/enrollment_core/src/lifecycle.rs
//!
//! Administrative course management. Every successful mutation commits to the
//! course store first and only then invalidates the catalog cache, so a reader
//! cannot repopulate the cache with pre-write data after the invalidation.

use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::catalog::CatalogCache;
use crate::domain::{build_catalog_view, CachedCourseView, Course, CourseSpec, Enrollment};
use crate::error::AdminError;
use crate::ports::{CourseStore, EnrollmentStore, PortError, PortResult};

/// Everything a registrar needs on one screen.
#[derive(Debug, Clone)]
pub struct RegistrarOverview {
    /// All courses, active or not, ordered by name.
    pub courses: Vec<CachedCourseView>,
    /// Pending enrollments, oldest first.
    pub pending: Vec<Enrollment>,
}

#[derive(Clone)]
pub struct CourseLifecycle {
    courses: Arc<dyn CourseStore>,
    enrollments: Arc<dyn EnrollmentStore>,
    cache: CatalogCache,
}

impl CourseLifecycle {
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

    pub async fn create(&self, spec: CourseSpec) -> Result<Course, AdminError> {
        self.validate(&spec, None).await?;

        let course = Course::from_spec(spec);
        self.courses
            .insert(&course)
            .await
            .map_err(|e| store_error(e, &course))?;

        self.cache.invalidate().await;
        info!(course = %course.code, id = %course.id, "Course created");
        Ok(course)
    }

    /// Replaces the editable fields of a course.
    ///
    /// `expected_version` is the version the administrator's form was loaded
    /// from; if the course has been written since, the edit is refused with
    /// `ConcurrentModification` instead of overwriting the other change.
    pub async fn update(
        &self,
        id: Uuid,
        expected_version: i32,
        spec: CourseSpec,
    ) -> Result<Course, AdminError> {
        self.validate(&spec, Some(id)).await?;

        let mut course = self.load(id).await?;
        course.apply(spec);
        course.version = expected_version;
        let course = self.write(course).await?;

        info!(course = %course.code, %id, version = course.version, "Course updated");
        Ok(course)
    }

    pub async fn activate(&self, id: Uuid) -> Result<Course, AdminError> {
        self.set_active(id, true).await
    }

    pub async fn deactivate(&self, id: Uuid) -> Result<Course, AdminError> {
        self.set_active(id, false).await
    }

    /// All courses with their seat counts, plus the queue of pending requests.
    pub async fn overview(&self) -> PortResult<RegistrarOverview> {
        let courses = self.courses.list_all().await?;
        let counts = self.enrollments.count_confirmed_grouped().await?;
        let pending = self.enrollments.list_pending().await?;
        Ok(RegistrarOverview {
            courses: build_catalog_view(&courses, &counts),
            pending,
        })
    }

    async fn set_active(&self, id: Uuid, active: bool) -> Result<Course, AdminError> {
        let mut course = self.load(id).await?;
        course.active = active;
        let course = self.write(course).await?;

        info!(course = %course.code, %id, active, "Course availability changed");
        Ok(course)
    }

    async fn validate(
        &self,
        spec: &CourseSpec,
        exclude_id: Option<Uuid>,
    ) -> Result<(), AdminError> {
        if !spec.has_valid_schedule() {
            return Err(AdminError::InvalidSchedule);
        }
        if self
            .courses
            .find_by_code(&spec.code, exclude_id)
            .await?
            .is_some()
        {
            return Err(AdminError::DuplicateCode(spec.code.clone()));
        }
        Ok(())
    }

    async fn load(&self, id: Uuid) -> Result<Course, AdminError> {
        self.courses
            .get_by_id(id)
            .await?
            .ok_or_else(|| AdminError::NotFound(format!("Course {} not found", id)))
    }

    async fn write(&self, course: Course) -> Result<Course, AdminError> {
        let stored = self
            .courses
            .update(&course)
            .await
            .map_err(|e| store_error(e, &course))?;
        self.cache.invalidate().await;
        Ok(stored)
    }
}

fn store_error(e: PortError, course: &Course) -> AdminError {
    match e {
        PortError::UniqueViolation(_) => AdminError::DuplicateCode(course.code.clone()),
        PortError::Conflict(_) => AdminError::ConcurrentModification,
        PortError::NotFound(_) => AdminError::NotFound(format!("Course {} not found", course.id)),
        other => AdminError::Store(other),
    }
}
