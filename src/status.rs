use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::models::{Project, StatusReport};

/// Shared handle to a live project's state; the crawl mutates it, pull
/// queries read it.
pub type ProjectHandle = Arc<Mutex<Project>>;

#[derive(Debug, Clone)]
struct TrackedProject {
    handle: ProjectHandle,
    last_update: DateTime<Utc>,
    is_active: bool,
}

/// Explicit project-status store owned by the host. Maps project id to a
/// live handle while the crawl runs and for a grace window afterwards; the
/// host drives `cleanup_stale` periodically.
#[derive(Debug, Default)]
pub struct StatusTracker {
    projects: Mutex<HashMap<String, TrackedProject>>,
}

impl StatusTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a project for status queries.
    pub fn track(&self, project_id: &str, handle: ProjectHandle) {
        let mut projects = self.projects.lock().unwrap();
        projects.insert(
            project_id.to_string(),
            TrackedProject {
                handle,
                last_update: Utc::now(),
                is_active: true,
            },
        );
    }

    /// Marks a project inactive; it stays queryable until cleaned up.
    pub fn finish(&self, project_id: &str) {
        let mut projects = self.projects.lock().unwrap();
        if let Some(tracked) = projects.get_mut(project_id) {
            tracked.is_active = false;
            tracked.last_update = Utc::now();
        }
    }

    /// Pull query: the current progress snapshot of a tracked project.
    pub fn report(&self, project_id: &str) -> Option<StatusReport> {
        let projects = self.projects.lock().unwrap();
        let tracked = projects.get(project_id)?;
        let project = tracked.handle.lock().unwrap();
        Some(StatusReport::from_project(&project))
    }

    pub fn is_active(&self, project_id: &str) -> bool {
        let projects = self.projects.lock().unwrap();
        projects.get(project_id).map(|t| t.is_active).unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.projects.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops inactive projects whose last update is older than `max_age`.
    /// Returns how many entries were removed.
    pub fn cleanup_stale(&self, max_age: Duration) -> usize {
        let max_age = chrono::Duration::from_std(max_age).unwrap_or(chrono::Duration::MAX);
        let now = Utc::now();
        let mut projects = self.projects.lock().unwrap();
        let before = projects.len();
        projects.retain(|_, tracked| tracked.is_active || now - tracked.last_update <= max_age);
        before - projects.len()
    }
}
