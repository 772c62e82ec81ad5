pub mod admission;
pub mod catalog;
pub mod domain;
pub mod error;
pub mod lifecycle;
pub mod ports;

#[cfg(test)]
mod testing;

pub use admission::Admission;
pub use catalog::{Catalog, CatalogCache, ACTIVE_COURSES_KEY, DEFAULT_CATALOG_TTL};
pub use domain::{
    build_catalog_view, schedules_overlap, CachedCourseView, CatalogFilter, Course, CourseSpec,
    Enrollment, EnrollmentDetail, EnrollmentStatus,
};
pub use error::{AdminError, EnrollError, RejectReason};
pub use lifecycle::{CourseLifecycle, RegistrarOverview};
pub use ports::{CacheBackend, CourseStore, EnrollmentStore, PortError, PortResult};
