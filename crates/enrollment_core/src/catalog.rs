//! crates/enrollment_core/src/catalog.rs
//!
//! The active-course catalog: a single-key, whole-list cache over the course
//! and enrollment stores, plus the read-through loader that fills it.
//!
//! The cache is best-effort. Backend faults are logged and degrade to a miss
//! (or a no-op), never to an error seen by the caller.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::domain::{build_catalog_view, CachedCourseView, CatalogFilter};
use crate::error::AdminError;
use crate::ports::{CacheBackend, CourseStore, EnrollmentStore, PortResult};

/// Key under which the whole active-course list is stored.
pub const ACTIVE_COURSES_KEY: &str = "active_courses";

/// Default lifetime of a cached catalog.
pub const DEFAULT_CATALOG_TTL: Duration = Duration::from_secs(60);

//=========================================================================================
// CatalogCache
//=========================================================================================

#[derive(Clone)]
pub struct CatalogCache {
    backend: Arc<dyn CacheBackend>,
    ttl: Duration,
}

impl CatalogCache {
    pub fn new(backend: Arc<dyn CacheBackend>, ttl: Duration) -> Self {
        Self { backend, ttl }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Returns the cached list if present and unexpired.
    pub async fn get(&self) -> Option<Vec<CachedCourseView>> {
        let payload = match self.backend.get_string(ACTIVE_COURSES_KEY).await {
            Ok(Some(payload)) if !payload.is_empty() => payload,
            Ok(_) => {
                debug!("Catalog cache miss");
                return None;
            }
            Err(e) => {
                error!("Failed to read active courses from cache: {}", e);
                return None;
            }
        };

        match serde_json::from_str::<Vec<CachedCourseView>>(&payload) {
            Ok(views) => {
                debug!(courses = views.len(), "Catalog cache hit");
                Some(views)
            }
            Err(e) => {
                warn!("Discarding undecodable catalog cache payload: {}", e);
                None
            }
        }
    }

    /// Stores the list for the configured TTL, replacing any previous entry.
    pub async fn set(&self, views: &[CachedCourseView]) {
        let payload = match serde_json::to_string(views) {
            Ok(payload) => payload,
            Err(e) => {
                error!("Failed to encode active courses for cache: {}", e);
                return;
            }
        };
        match self
            .backend
            .set_string(ACTIVE_COURSES_KEY, payload, self.ttl)
            .await
        {
            Ok(()) => debug!(ttl_secs = self.ttl.as_secs(), "Active courses cached"),
            Err(e) => error!("Failed to store active courses in cache: {}", e),
        }
    }

    /// Drops the cached list regardless of its remaining lifetime.
    pub async fn invalidate(&self) {
        match self.backend.remove(ACTIVE_COURSES_KEY).await {
            Ok(()) => debug!("Catalog cache invalidated"),
            Err(e) => error!("Failed to invalidate catalog cache: {}", e),
        }
    }
}

//=========================================================================================
// Catalog (read-through)
//=========================================================================================

#[derive(Clone)]
pub struct Catalog {
    courses: Arc<dyn CourseStore>,
    enrollments: Arc<dyn EnrollmentStore>,
    cache: CatalogCache,
}

impl Catalog {
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

    /// The active catalog, narrowed by `filter`. Filtering happens in memory
    /// on the (possibly cached) full list.
    pub async fn get_active_filtered(
        &self,
        filter: &CatalogFilter,
    ) -> PortResult<Vec<CachedCourseView>> {
        let views = self.active_views().await?;
        Ok(filter.apply(views))
    }

    /// One active course with its current seat count, read from the store.
    pub async fn active_course(&self, id: Uuid) -> Result<CachedCourseView, AdminError> {
        let course = self
            .courses
            .get_by_id(id)
            .await?
            .filter(|c| c.active)
            .ok_or_else(|| AdminError::NotFound(format!("Course {} not found", id)))?;
        let confirmed = self.enrollments.count_confirmed_by_course(id).await?;
        Ok(CachedCourseView::project(&course, confirmed))
    }

    async fn active_views(&self) -> PortResult<Vec<CachedCourseView>> {
        if let Some(views) = self.cache.get().await {
            return Ok(views);
        }

        let courses = self.courses.list_active().await?;
        let counts = self.enrollments.count_confirmed_grouped().await?;
        let views = build_catalog_view(&courses, &counts);
        self.cache.set(&views).await;
        Ok(views)
    }
}
