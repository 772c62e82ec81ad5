//! In-memory implementations of every port, used by the unit tests.

use async_trait::async_trait;
use chrono::NaiveTime;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;
use uuid::Uuid;

use crate::admission::Admission;
use crate::catalog::{Catalog, CatalogCache, DEFAULT_CATALOG_TTL};
use crate::domain::{Course, CourseSpec, Enrollment, EnrollmentStatus};
use crate::lifecycle::CourseLifecycle;
use crate::ports::{CacheBackend, CourseStore, EnrollmentStore, PortError, PortResult};

//=========================================================================================
// Course store
//=========================================================================================

#[derive(Default)]
pub struct MemoryCourseStore {
    rows: Mutex<HashMap<Uuid, Course>>,
    list_active_calls: AtomicUsize,
    writes: AtomicUsize,
}

impl MemoryCourseStore {
    pub fn list_active_calls(&self) -> usize {
        self.list_active_calls.load(Ordering::SeqCst)
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Simulates another administrator committing an edit.
    pub fn bump_version(&self, id: Uuid) {
        if let Some(row) = self.rows.lock().unwrap().get_mut(&id) {
            row.version += 1;
        }
    }

    /// Simulates the row vanishing between read and write.
    pub fn remove(&self, id: Uuid) {
        self.rows.lock().unwrap().remove(&id);
    }

    fn get(&self, id: Uuid) -> Option<Course> {
        self.rows.lock().unwrap().get(&id).cloned()
    }
}

#[async_trait]
impl CourseStore for MemoryCourseStore {
    async fn get_by_id(&self, id: Uuid) -> PortResult<Option<Course>> {
        Ok(self.get(id))
    }

    async fn find_by_code(
        &self,
        code: &str,
        exclude_id: Option<Uuid>,
    ) -> PortResult<Option<Course>> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .values()
            .find(|c| c.code == code && Some(c.id) != exclude_id)
            .cloned())
    }

    async fn list_active(&self) -> PortResult<Vec<Course>> {
        self.list_active_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .rows
            .lock()
            .unwrap()
            .values()
            .filter(|c| c.active)
            .cloned()
            .collect())
    }

    async fn list_all(&self) -> PortResult<Vec<Course>> {
        Ok(self.rows.lock().unwrap().values().cloned().collect())
    }

    async fn insert(&self, course: &Course) -> PortResult<()> {
        let mut rows = self.rows.lock().unwrap();
        if rows.values().any(|c| c.code == course.code) {
            return Err(PortError::UniqueViolation(course.code.clone()));
        }
        rows.insert(course.id, course.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn update(&self, course: &Course) -> PortResult<Course> {
        let mut rows = self.rows.lock().unwrap();
        if rows
            .values()
            .any(|c| c.code == course.code && c.id != course.id)
        {
            return Err(PortError::UniqueViolation(course.code.clone()));
        }
        let stored = rows
            .get_mut(&course.id)
            .ok_or_else(|| PortError::NotFound(course.id.to_string()))?;
        if stored.version != course.version {
            return Err(PortError::Conflict(course.id.to_string()));
        }
        *stored = Course {
            version: course.version + 1,
            ..course.clone()
        };
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(stored.clone())
    }
}

//=========================================================================================
// Enrollment store
//=========================================================================================

pub struct MemoryEnrollmentStore {
    courses: Arc<MemoryCourseStore>,
    rows: Mutex<HashMap<Uuid, Enrollment>>,
    writes: AtomicUsize,
    /// When set, the duplicate lookup misses, as if a concurrent request had
    /// inserted the pair just after the check.
    hide_existing: AtomicBool,
}

impl MemoryEnrollmentStore {
    pub fn new(courses: Arc<MemoryCourseStore>) -> Self {
        Self {
            courses,
            rows: Mutex::new(HashMap::new()),
            writes: AtomicUsize::new(0),
            hide_existing: AtomicBool::new(false),
        }
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn hide_existing(&self) {
        self.hide_existing.store(true, Ordering::SeqCst);
    }

    pub fn all(&self) -> Vec<Enrollment> {
        self.rows.lock().unwrap().values().cloned().collect()
    }

    pub fn status_of(&self, id: Uuid) -> Option<EnrollmentStatus> {
        self.rows.lock().unwrap().get(&id).map(|e| e.status)
    }

    fn confirmed_in(rows: &HashMap<Uuid, Enrollment>, course_id: Uuid) -> i64 {
        rows.values()
            .filter(|e| e.course_id == course_id && e.status == EnrollmentStatus::Confirmed)
            .count() as i64
    }
}

#[async_trait]
impl EnrollmentStore for MemoryEnrollmentStore {
    async fn get_by_id(&self, id: Uuid) -> PortResult<Option<Enrollment>> {
        Ok(self.rows.lock().unwrap().get(&id).cloned())
    }

    async fn count_confirmed_by_course(&self, course_id: Uuid) -> PortResult<i64> {
        Ok(Self::confirmed_in(&self.rows.lock().unwrap(), course_id))
    }

    async fn count_confirmed_grouped(&self) -> PortResult<HashMap<Uuid, i64>> {
        let mut counts = HashMap::new();
        for e in self.rows.lock().unwrap().values() {
            if e.status == EnrollmentStatus::Confirmed {
                *counts.entry(e.course_id).or_insert(0) += 1;
            }
        }
        Ok(counts)
    }

    async fn find_by_course_and_user(
        &self,
        course_id: Uuid,
        user_id: Uuid,
    ) -> PortResult<Option<Enrollment>> {
        if self.hide_existing.load(Ordering::SeqCst) {
            return Ok(None);
        }
        Ok(self
            .rows
            .lock()
            .unwrap()
            .values()
            .find(|e| e.course_id == course_id && e.user_id == user_id)
            .cloned())
    }

    async fn list_confirmed_by_user(&self, user_id: Uuid) -> PortResult<Vec<Course>> {
        let course_ids: Vec<Uuid> = self
            .rows
            .lock()
            .unwrap()
            .values()
            .filter(|e| e.user_id == user_id && e.status == EnrollmentStatus::Confirmed)
            .map(|e| e.course_id)
            .collect();
        Ok(course_ids
            .into_iter()
            .filter_map(|id| self.courses.get(id))
            .filter(|c| c.active)
            .collect())
    }

    async fn list_by_user(&self, user_id: Uuid) -> PortResult<Vec<Enrollment>> {
        let mut list: Vec<Enrollment> = self
            .rows
            .lock()
            .unwrap()
            .values()
            .filter(|e| e.user_id == user_id)
            .cloned()
            .collect();
        list.sort_by(|a, b| b.registered_at.cmp(&a.registered_at));
        Ok(list)
    }

    async fn list_pending(&self) -> PortResult<Vec<Enrollment>> {
        let mut list: Vec<Enrollment> = self
            .rows
            .lock()
            .unwrap()
            .values()
            .filter(|e| e.status == EnrollmentStatus::Pending)
            .cloned()
            .collect();
        list.sort_by(|a, b| a.registered_at.cmp(&b.registered_at));
        Ok(list)
    }

    async fn insert(&self, enrollment: &Enrollment) -> PortResult<()> {
        let mut rows = self.rows.lock().unwrap();
        if rows
            .values()
            .any(|e| e.course_id == enrollment.course_id && e.user_id == enrollment.user_id)
        {
            return Err(PortError::UniqueViolation(format!(
                "{}/{}",
                enrollment.course_id, enrollment.user_id
            )));
        }
        rows.insert(enrollment.id, enrollment.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn update_status(&self, id: Uuid, status: EnrollmentStatus) -> PortResult<()> {
        let mut rows = self.rows.lock().unwrap();
        let row = rows
            .get_mut(&id)
            .ok_or_else(|| PortError::NotFound(id.to_string()))?;
        row.status = status;
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn confirm_within_capacity(
        &self,
        enrollment_id: Uuid,
        course_id: Uuid,
        capacity: i32,
    ) -> PortResult<bool> {
        // Yield first so concurrent callers genuinely interleave.
        tokio::task::yield_now().await;
        let mut rows = self.rows.lock().unwrap();
        match rows.get(&enrollment_id) {
            Some(e) if e.course_id == course_id => {
                if e.status == EnrollmentStatus::Confirmed {
                    return Ok(true);
                }
            }
            _ => return Err(PortError::NotFound(enrollment_id.to_string())),
        }
        if Self::confirmed_in(&rows, course_id) >= i64::from(capacity) {
            return Ok(false);
        }
        let row = rows
            .get_mut(&enrollment_id)
            .ok_or_else(|| PortError::NotFound(enrollment_id.to_string()))?;
        row.status = EnrollmentStatus::Confirmed;
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(true)
    }
}

//=========================================================================================
// Cache backends
//=========================================================================================

#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, (String, Instant)>>,
}

#[async_trait]
impl CacheBackend for MemoryCache {
    async fn get_string(&self, key: &str) -> PortResult<Option<String>> {
        let entries = self.entries.lock().unwrap();
        Ok(entries
            .get(key)
            .filter(|(_, expires_at)| Instant::now() < *expires_at)
            .map(|(value, _)| value.clone()))
    }

    async fn set_string(&self, key: &str, value: String, ttl: Duration) -> PortResult<()> {
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), (value, Instant::now() + ttl));
        Ok(())
    }

    async fn remove(&self, key: &str) -> PortResult<()> {
        self.entries.lock().unwrap().remove(key);
        Ok(())
    }
}

/// A cache whose backend is permanently unreachable.
pub struct FailingCache;

#[async_trait]
impl CacheBackend for FailingCache {
    async fn get_string(&self, _key: &str) -> PortResult<Option<String>> {
        Err(PortError::Unexpected("cache unreachable".to_string()))
    }

    async fn set_string(&self, _key: &str, _value: String, _ttl: Duration) -> PortResult<()> {
        Err(PortError::Unexpected("cache unreachable".to_string()))
    }

    async fn remove(&self, _key: &str) -> PortResult<()> {
        Err(PortError::Unexpected("cache unreachable".to_string()))
    }
}

//=========================================================================================
// Fixture
//=========================================================================================

pub struct Fixture {
    pub courses: Arc<MemoryCourseStore>,
    pub enrollments: Arc<MemoryEnrollmentStore>,
    pub cache: CatalogCache,
}

pub fn fixture() -> Fixture {
    let courses = Arc::new(MemoryCourseStore::default());
    let enrollments = Arc::new(MemoryEnrollmentStore::new(courses.clone()));
    Fixture {
        courses,
        enrollments,
        cache: CatalogCache::new(Arc::new(MemoryCache::default()), DEFAULT_CATALOG_TTL),
    }
}

impl Fixture {
    pub fn catalog(&self) -> Catalog {
        Catalog::new(self.courses.clone(), self.enrollments.clone(), self.cache.clone())
    }

    pub fn admission(&self) -> Admission {
        Admission::new(self.courses.clone(), self.enrollments.clone(), self.cache.clone())
    }

    pub fn lifecycle(&self) -> CourseLifecycle {
        CourseLifecycle::new(self.courses.clone(), self.enrollments.clone(), self.cache.clone())
    }

    /// Inserts a course directly, bypassing the lifecycle manager.
    pub async fn add_course(&self, spec: CourseSpec) -> Course {
        let course = Course::from_spec(spec);
        self.courses.insert(&course).await.expect("insert course");
        course
    }

    /// Inserts an enrollment for a fresh user.
    pub async fn add_enrollment(&self, course_id: Uuid, status: EnrollmentStatus) -> Enrollment {
        self.add_enrollment_for(course_id, Uuid::new_v4(), status).await
    }

    pub async fn add_enrollment_for(
        &self,
        course_id: Uuid,
        user_id: Uuid,
        status: EnrollmentStatus,
    ) -> Enrollment {
        let enrollment = Enrollment {
            status,
            ..Enrollment::pending(course_id, user_id)
        };
        self.enrollments
            .insert(&enrollment)
            .await
            .expect("insert enrollment");
        enrollment
    }
}

pub fn at(hour: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, 0, 0).expect("valid hour")
}

/// An active, 4-credit, 30-seat course running from `start` to `end` o'clock.
pub fn spec(code: &str, start: u32, end: u32) -> CourseSpec {
    CourseSpec {
        code: code.to_string(),
        name: format!("Course {}", code),
        credits: 4,
        capacity: 30,
        start_time: at(start),
        end_time: at(end),
        active: true,
    }
}
