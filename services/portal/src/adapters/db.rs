//! services/portal/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `CourseStore` and `EnrollmentStore` ports from the `core` crate. It handles
//! all interactions with the PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, NaiveTime, Utc};
use enrollment_core::domain::{Course, Enrollment, EnrollmentStatus};
use enrollment_core::ports::{CourseStore, EnrollmentStore, PortError, PortResult};
use sqlx::{FromRow, PgPool};
use std::collections::HashMap;
use uuid::Uuid;

/// Column list shared by every query that reads a full course row.
const COURSE_COLUMNS: &str =
    "id, code, name, credits, capacity, start_time, end_time, active, version";

/// The one predicate that decides whether a course is available.
const AVAILABLE_COURSE: &str = "active = TRUE";

const ENROLLMENT_COLUMNS: &str = "id, course_id, user_id, registered_at, status";

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the course and enrollment store ports.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    async fn course_exists(&self, id: Uuid) -> PortResult<bool> {
        sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM courses WHERE id = $1)")
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(map_db_error)
    }
}

/// Maps a driver error onto the port taxonomy, keeping uniqueness violations
/// distinguishable from other faults.
fn map_db_error(e: sqlx::Error) -> PortError {
    match e {
        sqlx::Error::RowNotFound => PortError::NotFound("row not found".to_string()),
        sqlx::Error::Database(ref db) if db.is_unique_violation() => {
            PortError::UniqueViolation(db.message().to_string())
        }
        other => PortError::Unexpected(other.to_string()),
    }
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct CourseRecord {
    id: Uuid,
    code: String,
    name: String,
    credits: i32,
    capacity: i32,
    start_time: NaiveTime,
    end_time: NaiveTime,
    active: bool,
    version: i32,
}
impl CourseRecord {
    fn to_domain(self) -> Course {
        Course {
            id: self.id,
            code: self.code,
            name: self.name,
            credits: self.credits,
            capacity: self.capacity,
            start_time: self.start_time,
            end_time: self.end_time,
            active: self.active,
            version: self.version,
        }
    }
}

#[derive(FromRow)]
struct EnrollmentRecord {
    id: Uuid,
    course_id: Uuid,
    user_id: Uuid,
    registered_at: DateTime<Utc>,
    status: String,
}
impl EnrollmentRecord {
    fn to_domain(self) -> PortResult<Enrollment> {
        let status = self
            .status
            .parse::<EnrollmentStatus>()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(Enrollment {
            id: self.id,
            course_id: self.course_id,
            user_id: self.user_id,
            registered_at: self.registered_at,
            status,
        })
    }
}

fn enrollments_to_domain(records: Vec<EnrollmentRecord>) -> PortResult<Vec<Enrollment>> {
    records.into_iter().map(|r| r.to_domain()).collect()
}

//=========================================================================================
// `CourseStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl CourseStore for DbAdapter {
    async fn get_by_id(&self, id: Uuid) -> PortResult<Option<Course>> {
        let sql = format!("SELECT {COURSE_COLUMNS} FROM courses WHERE id = $1");
        let record = sqlx::query_as::<_, CourseRecord>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_error)?;
        Ok(record.map(CourseRecord::to_domain))
    }

    async fn find_by_code(
        &self,
        code: &str,
        exclude_id: Option<Uuid>,
    ) -> PortResult<Option<Course>> {
        let sql = format!(
            "SELECT {COURSE_COLUMNS} FROM courses WHERE code = $1 AND ($2::uuid IS NULL OR id <> $2) LIMIT 1"
        );
        let record = sqlx::query_as::<_, CourseRecord>(&sql)
            .bind(code)
            .bind(exclude_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_error)?;
        Ok(record.map(CourseRecord::to_domain))
    }

    async fn list_active(&self) -> PortResult<Vec<Course>> {
        let sql = format!(
            "SELECT {COURSE_COLUMNS} FROM courses WHERE {AVAILABLE_COURSE} ORDER BY name ASC"
        );
        let records = sqlx::query_as::<_, CourseRecord>(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(map_db_error)?;
        Ok(records.into_iter().map(CourseRecord::to_domain).collect())
    }

    async fn list_all(&self) -> PortResult<Vec<Course>> {
        let sql = format!("SELECT {COURSE_COLUMNS} FROM courses ORDER BY name ASC");
        let records = sqlx::query_as::<_, CourseRecord>(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(map_db_error)?;
        Ok(records.into_iter().map(CourseRecord::to_domain).collect())
    }

    async fn insert(&self, course: &Course) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO courses (id, code, name, credits, capacity, start_time, end_time, active, version) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(course.id)
        .bind(&course.code)
        .bind(&course.name)
        .bind(course.credits)
        .bind(course.capacity)
        .bind(course.start_time)
        .bind(course.end_time)
        .bind(course.active)
        .bind(course.version)
        .execute(&self.pool)
        .await
        .map_err(map_db_error)?;
        Ok(())
    }

    async fn update(&self, course: &Course) -> PortResult<Course> {
        let sql = format!(
            "UPDATE courses SET code = $2, name = $3, credits = $4, capacity = $5, start_time = $6, end_time = $7, active = $8, version = version + 1 WHERE id = $1 AND version = $9 RETURNING {COURSE_COLUMNS}"
        );
        let record = sqlx::query_as::<_, CourseRecord>(&sql)
            .bind(course.id)
            .bind(&course.code)
            .bind(&course.name)
            .bind(course.credits)
            .bind(course.capacity)
            .bind(course.start_time)
            .bind(course.end_time)
            .bind(course.active)
            .bind(course.version)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_error)?;

        match record {
            Some(record) => Ok(record.to_domain()),
            None if self.course_exists(course.id).await? => Err(PortError::Conflict(format!(
                "Course {} changed since version {}",
                course.id, course.version
            ))),
            None => Err(PortError::NotFound(format!("Course {} not found", course.id))),
        }
    }
}

//=========================================================================================
// `EnrollmentStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl EnrollmentStore for DbAdapter {
    async fn get_by_id(&self, id: Uuid) -> PortResult<Option<Enrollment>> {
        let sql = format!("SELECT {ENROLLMENT_COLUMNS} FROM enrollments WHERE id = $1");
        let record = sqlx::query_as::<_, EnrollmentRecord>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_error)?;
        record.map(EnrollmentRecord::to_domain).transpose()
    }

    async fn count_confirmed_by_course(&self, course_id: Uuid) -> PortResult<i64> {
        sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM enrollments WHERE course_id = $1 AND status = $2",
        )
        .bind(course_id)
        .bind(EnrollmentStatus::Confirmed.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(map_db_error)
    }

    async fn count_confirmed_grouped(&self) -> PortResult<HashMap<Uuid, i64>> {
        let rows = sqlx::query_as::<_, (Uuid, i64)>(
            "SELECT course_id, COUNT(*) FROM enrollments WHERE status = $1 GROUP BY course_id",
        )
        .bind(EnrollmentStatus::Confirmed.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_error)?;
        Ok(rows.into_iter().collect())
    }

    async fn find_by_course_and_user(
        &self,
        course_id: Uuid,
        user_id: Uuid,
    ) -> PortResult<Option<Enrollment>> {
        let sql = format!(
            "SELECT {ENROLLMENT_COLUMNS} FROM enrollments WHERE course_id = $1 AND user_id = $2"
        );
        let record = sqlx::query_as::<_, EnrollmentRecord>(&sql)
            .bind(course_id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_error)?;
        record.map(EnrollmentRecord::to_domain).transpose()
    }

    async fn list_confirmed_by_user(&self, user_id: Uuid) -> PortResult<Vec<Course>> {
        let sql = format!(
            "SELECT {COURSE_COLUMNS} FROM courses WHERE {AVAILABLE_COURSE} AND id IN (SELECT course_id FROM enrollments WHERE user_id = $1 AND status = $2)"
        );
        let records = sqlx::query_as::<_, CourseRecord>(&sql)
            .bind(user_id)
            .bind(EnrollmentStatus::Confirmed.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(map_db_error)?;
        Ok(records.into_iter().map(CourseRecord::to_domain).collect())
    }

    async fn list_by_user(&self, user_id: Uuid) -> PortResult<Vec<Enrollment>> {
        let sql = format!(
            "SELECT {ENROLLMENT_COLUMNS} FROM enrollments WHERE user_id = $1 ORDER BY registered_at DESC"
        );
        let records = sqlx::query_as::<_, EnrollmentRecord>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .map_err(map_db_error)?;
        enrollments_to_domain(records)
    }

    async fn list_pending(&self) -> PortResult<Vec<Enrollment>> {
        let sql = format!(
            "SELECT {ENROLLMENT_COLUMNS} FROM enrollments WHERE status = $1 ORDER BY registered_at ASC"
        );
        let records = sqlx::query_as::<_, EnrollmentRecord>(&sql)
            .bind(EnrollmentStatus::Pending.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(map_db_error)?;
        enrollments_to_domain(records)
    }

    async fn insert(&self, enrollment: &Enrollment) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO enrollments (id, course_id, user_id, registered_at, status) VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(enrollment.id)
        .bind(enrollment.course_id)
        .bind(enrollment.user_id)
        .bind(enrollment.registered_at)
        .bind(enrollment.status.as_str())
        .execute(&self.pool)
        .await
        .map_err(map_db_error)?;
        Ok(())
    }

    async fn update_status(&self, id: Uuid, status: EnrollmentStatus) -> PortResult<()> {
        let affected = sqlx::query("UPDATE enrollments SET status = $1 WHERE id = $2")
            .bind(status.as_str())
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(map_db_error)?
            .rows_affected();
        if affected == 0 {
            return Err(PortError::NotFound(format!("Enrollment {} not found", id)));
        }
        Ok(())
    }

    async fn confirm_within_capacity(
        &self,
        enrollment_id: Uuid,
        course_id: Uuid,
        capacity: i32,
    ) -> PortResult<bool> {
        let mut tx = self.pool.begin().await.map_err(map_db_error)?;

        // Locking the course row serializes confirmations for the same course.
        let locked = sqlx::query_scalar::<_, Uuid>(
            "SELECT id FROM courses WHERE id = $1 FOR UPDATE",
        )
        .bind(course_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(map_db_error)?;
        if locked.is_none() {
            return Err(PortError::NotFound(format!("Course {} not found", course_id)));
        }

        // Re-read under the lock: a concurrent confirm of this same row may have won.
        let status = sqlx::query_scalar::<_, String>(
            "SELECT status FROM enrollments WHERE id = $1 AND course_id = $2 FOR UPDATE",
        )
        .bind(enrollment_id)
        .bind(course_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(map_db_error)?
        .ok_or_else(|| PortError::NotFound(format!("Enrollment {} not found", enrollment_id)))?;
        if status == EnrollmentStatus::Confirmed.as_str() {
            tx.commit().await.map_err(map_db_error)?;
            return Ok(true);
        }

        let confirmed = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM enrollments WHERE course_id = $1 AND status = $2",
        )
        .bind(course_id)
        .bind(EnrollmentStatus::Confirmed.as_str())
        .fetch_one(&mut *tx)
        .await
        .map_err(map_db_error)?;
        if confirmed >= i64::from(capacity) {
            tx.rollback().await.map_err(map_db_error)?;
            return Ok(false);
        }

        sqlx::query("UPDATE enrollments SET status = $1 WHERE id = $2")
            .bind(EnrollmentStatus::Confirmed.as_str())
            .bind(enrollment_id)
            .execute(&mut *tx)
            .await
            .map_err(map_db_error)?;

        tx.commit().await.map_err(map_db_error)?;
        Ok(true)
    }
}
