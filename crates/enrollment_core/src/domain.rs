//! crates/enrollment_core/src/domain.rs
//!
//! Defines the pure, core data structures for the enrollment portal.
//! These structs are independent of any database; only the cached catalog
//! view carries a serialization format, because the cache owns its payload.

use chrono::{DateTime, NaiveTime, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// A course offered in the catalog.
///
/// Courses are never deleted; `active = false` is the soft-delete marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Course {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub credits: i32,
    pub capacity: i32,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub active: bool,
    /// Optimistic-concurrency token, bumped by the store on every update.
    pub version: i32,
}

impl Course {
    /// Builds a fresh, not-yet-persisted course from an administrator's form.
    pub fn from_spec(spec: CourseSpec) -> Self {
        Self {
            id: Uuid::new_v4(),
            code: spec.code,
            name: spec.name,
            credits: spec.credits,
            capacity: spec.capacity,
            start_time: spec.start_time,
            end_time: spec.end_time,
            active: spec.active,
            version: 1,
        }
    }

    /// Overwrites every editable field, keeping identity and version.
    pub fn apply(&mut self, spec: CourseSpec) {
        self.code = spec.code;
        self.name = spec.name;
        self.credits = spec.credits;
        self.capacity = spec.capacity;
        self.start_time = spec.start_time;
        self.end_time = spec.end_time;
        self.active = spec.active;
    }

    pub fn overlaps(&self, other: &Course) -> bool {
        schedules_overlap(self.start_time, self.end_time, other.start_time, other.end_time)
    }
}

/// The editable fields of a course, as submitted by an administrator.
#[derive(Debug, Clone)]
pub struct CourseSpec {
    pub code: String,
    pub name: String,
    pub credits: i32,
    pub capacity: i32,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub active: bool,
}

impl CourseSpec {
    pub fn has_valid_schedule(&self) -> bool {
        self.start_time < self.end_time
    }
}

/// Half-open interval overlap: `[a_start, a_end)` against `[b_start, b_end)`.
/// Back-to-back windows (one ends exactly when the other starts) do not overlap.
pub fn schedules_overlap(
    a_start: NaiveTime,
    a_end: NaiveTime,
    b_start: NaiveTime,
    b_end: NaiveTime,
) -> bool {
    a_start < b_end && a_end > b_start
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrollmentStatus {
    Pending,
    Confirmed,
    Cancelled,
}

impl EnrollmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnrollmentStatus::Pending => "pending",
            EnrollmentStatus::Confirmed => "confirmed",
            EnrollmentStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for EnrollmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Unknown enrollment status: {0}")]
pub struct UnknownStatus(pub String);

impl FromStr for EnrollmentStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(EnrollmentStatus::Pending),
            "confirmed" => Ok(EnrollmentStatus::Confirmed),
            "cancelled" => Ok(EnrollmentStatus::Cancelled),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

/// A student's enrollment attempt in one course. One per (course, user) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Enrollment {
    pub id: Uuid,
    pub course_id: Uuid,
    pub user_id: Uuid,
    pub registered_at: DateTime<Utc>,
    pub status: EnrollmentStatus,
}

impl Enrollment {
    /// A new Pending request, stamped with the current time.
    pub fn pending(course_id: Uuid, user_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            course_id,
            user_id,
            registered_at: Utc::now(),
            status: EnrollmentStatus::Pending,
        }
    }
}

/// An enrollment together with the course it refers to, for history listings.
#[derive(Debug, Clone)]
pub struct EnrollmentDetail {
    pub enrollment: Enrollment,
    pub course: Course,
}

/// Denormalized snapshot of a course plus its confirmed-seat count.
///
/// Disposable: regenerated from the stores on every cache miss and never
/// written back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedCourseView {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub credits: i32,
    pub capacity: i32,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub active: bool,
    pub confirmed_count: i64,
}

impl CachedCourseView {
    pub fn project(course: &Course, confirmed_count: i64) -> Self {
        Self {
            id: course.id,
            code: course.code.clone(),
            name: course.name.clone(),
            credits: course.credits,
            capacity: course.capacity,
            start_time: course.start_time,
            end_time: course.end_time,
            active: course.active,
            confirmed_count,
        }
    }

    pub fn seats_available(&self) -> i64 {
        (i64::from(self.capacity) - self.confirmed_count).max(0)
    }
}

/// Projects courses and per-course confirmed counts into catalog views,
/// ordered by course name. Courses missing from `counts` have zero seats taken.
pub fn build_catalog_view(
    courses: &[Course],
    counts: &HashMap<Uuid, i64>,
) -> Vec<CachedCourseView> {
    let mut views: Vec<CachedCourseView> = courses
        .iter()
        .map(|c| CachedCourseView::project(c, counts.get(&c.id).copied().unwrap_or(0)))
        .collect();
    views.sort_by(|a, b| a.name.cmp(&b.name));
    views
}

/// In-memory filters applied to the active catalog after it has been loaded.
#[derive(Debug, Clone, Default)]
pub struct CatalogFilter {
    pub name: Option<String>,
    pub credits_min: Option<i32>,
    pub credits_max: Option<i32>,
    pub time_from: Option<NaiveTime>,
    pub time_to: Option<NaiveTime>,
}

impl CatalogFilter {
    pub fn matches(&self, view: &CachedCourseView) -> bool {
        if let Some(needle) = self.name.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
            if !view.name.to_lowercase().contains(&needle.to_lowercase()) {
                return false;
            }
        }
        if self.credits_min.is_some_and(|min| view.credits < min) {
            return false;
        }
        if self.credits_max.is_some_and(|max| view.credits > max) {
            return false;
        }
        // A midnight bound is what an empty time input submits; it means "unset".
        if let Some(from) = self.time_from.filter(|t| !is_midnight(t)) {
            if view.start_time < from {
                return false;
            }
        }
        if let Some(to) = self.time_to.filter(|t| !is_midnight(t)) {
            if view.end_time > to {
                return false;
            }
        }
        true
    }

    pub fn apply(&self, views: Vec<CachedCourseView>) -> Vec<CachedCourseView> {
        views.into_iter().filter(|v| self.matches(v)).collect()
    }
}

fn is_midnight(t: &NaiveTime) -> bool {
    t.num_seconds_from_midnight() == 0 && t.nanosecond() == 0
}
