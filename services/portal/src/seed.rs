//! services/portal/src/seed.rs
//!
//! Demo catalog for fresh installations.

use chrono::NaiveTime;
use enrollment_core::{AdminError, Course, CourseLifecycle, CourseSpec};
use tracing::info;

fn at(hour: u32) -> Result<NaiveTime, AdminError> {
    NaiveTime::from_hms_opt(hour, 0, 0).ok_or(AdminError::InvalidSchedule)
}

fn demo_course(
    code: &str,
    name: &str,
    credits: i32,
    capacity: i32,
    start: u32,
    end: u32,
) -> Result<CourseSpec, AdminError> {
    Ok(CourseSpec {
        code: code.to_string(),
        name: name.to_string(),
        credits,
        capacity,
        start_time: at(start)?,
        end_time: at(end)?,
        active: true,
    })
}

/// Creates the demo courses through the lifecycle manager if the catalog is
/// empty. Returns the courses created (none when the catalog already had data).
pub async fn seed_demo_catalog(lifecycle: &CourseLifecycle) -> Result<Vec<Course>, AdminError> {
    let overview = lifecycle.overview().await?;
    if !overview.courses.is_empty() {
        info!(existing = overview.courses.len(), "Catalog already populated; skipping demo seed");
        return Ok(Vec::new());
    }

    let specs = [
        demo_course("MAT101", "Basic Mathematics", 4, 30, 8, 10)?,
        demo_course("PROG101", "Programming I", 5, 25, 10, 12)?,
        demo_course("FIS101", "General Physics", 4, 20, 14, 16)?,
    ];

    let mut created = Vec::with_capacity(specs.len());
    for spec in specs {
        created.push(lifecycle.create(spec).await?);
    }
    info!(count = created.len(), "Demo catalog seeded");
    Ok(created)
}
