//! services/portal/src/state.rs
//!
//! Defines the application's shared state: the three engines wired to their
//! adapters, created once at startup and handed to every caller.

use crate::config::Config;
use enrollment_core::catalog::{Catalog, CatalogCache};
use enrollment_core::ports::{CacheBackend, CourseStore, EnrollmentStore};
use enrollment_core::{Admission, CourseLifecycle};
use std::sync::Arc;

/// The shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub catalog: Catalog,
    pub admission: Admission,
    pub lifecycle: CourseLifecycle,
}

impl AppState {
    /// Wires the engines to the given stores and cache backend. All three share
    /// one `CatalogCache`, so every mutation invalidates the view readers see.
    pub fn new<S>(config: Arc<Config>, store: Arc<S>, cache_backend: Arc<dyn CacheBackend>) -> Self
    where
        S: CourseStore + EnrollmentStore + 'static,
    {
        let courses: Arc<dyn CourseStore> = store.clone();
        let enrollments: Arc<dyn EnrollmentStore> = store;
        let cache = CatalogCache::new(cache_backend, config.catalog_cache_ttl);

        Self {
            catalog: Catalog::new(courses.clone(), enrollments.clone(), cache.clone()),
            admission: Admission::new(courses.clone(), enrollments.clone(), cache.clone()),
            lifecycle: CourseLifecycle::new(courses, enrollments, cache),
            config,
        }
    }
}
