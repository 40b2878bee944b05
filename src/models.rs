use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Incoming scrape submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeRequest {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url_prefix: Option<String>,
    pub depth: u32,
    #[serde(default)]
    pub filters: Vec<FilterRule>,
}

/// A bracket-delete rule: every region from `start` through the next `end`
/// (markers included) is removed from stored HTML.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterRule {
    pub start: String,
    pub end: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    Started,
    InProgress,
    Completed,
    Failed,
}

/// A scraping project and its user-visible progress counters. This is the
/// entity serialized to `project.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    #[serde(rename = "project_id")]
    pub id: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub url_prefix: String,
    pub depth: u32,
    pub status: ProjectStatus,
    pub filters: Vec<FilterRule>,
    pub progress: u32,
    #[serde(rename = "pages_downloaded")]
    pub downloaded: u32,
    #[serde(rename = "total_pages")]
    pub total: u32,
    pub current_url: String,
    pub errors: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Project {
    pub fn new(url: &str, url_prefix: &str, depth: u32, filters: Vec<FilterRule>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            url: url.to_string(),
            url_prefix: url_prefix.to_string(),
            depth,
            status: ProjectStatus::Started,
            filters,
            progress: 0,
            downloaded: 0,
            total: 0,
            current_url: String::new(),
            errors: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Returned after a scrape is accepted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeResponse {
    pub project_id: String,
    pub status: ProjectStatus,
}

/// Pull-query answer for project progress.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusReport {
    pub status: ProjectStatus,
    pub progress: u32,
    pub pages_downloaded: u32,
    pub total_pages: u32,
    pub current_url: String,
    pub errors: Vec<String>,
}

impl StatusReport {
    pub fn from_project(project: &Project) -> Self {
        Self {
            status: project.status,
            progress: project.progress,
            pages_downloaded: project.downloaded,
            total_pages: project.total,
            current_url: project.current_url.clone(),
            errors: project.errors.clone(),
        }
    }
}

/// Type bucket for a downloadable static resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    Img,
    Css,
    Js,
    Font,
    Other,
}

impl AssetKind {
    /// Subdirectory under `assets/` for this bucket.
    pub fn dir(&self) -> &'static str {
        match self {
            AssetKind::Img => "img",
            AssetKind::Css => "css",
            AssetKind::Js => "js",
            AssetKind::Font => "font",
            AssetKind::Other => "other",
        }
    }

    pub fn all() -> [AssetKind; 5] {
        [
            AssetKind::Img,
            AssetKind::Css,
            AssetKind::Js,
            AssetKind::Font,
            AssetKind::Other,
        ]
    }
}

/// One discovered in-scope HTML page.
#[derive(Debug, Clone)]
pub struct Page {
    /// Canonical URL (fragment cleared, one trailing `/` stripped).
    pub url: String,
    /// Path relative to the project root (`index.html` or `pages/<digest>.html`).
    pub local_path: String,
    pub depth: u32,
    pub parent_url: Option<String>,
    pub html: String,
    /// Outbound links extracted from the page, absolute canonical form.
    pub links: Vec<String>,
    /// Canonical URLs of assets referenced by the page.
    pub assets: Vec<String>,
    pub downloaded: bool,
    pub processed: bool,
    pub filtered: bool,
    pub error: Option<String>,
}

/// One referenced static resource.
#[derive(Debug, Clone)]
pub struct Asset {
    pub url: String,
    pub kind: AssetKind,
    /// Assigned when the body is written (the extension may depend on the
    /// response Content-Type).
    pub local_path: Option<String>,
    pub downloaded: bool,
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_project_new_defaults() {
        let project = Project::new("http://example.com", "http://example.com", 2, Vec::new());
        assert_eq!(project.status, ProjectStatus::Started);
        assert_eq!(project.progress, 0);
        assert_eq!(project.downloaded, 0);
        assert_eq!(project.total, 0);
        assert!(project.errors.is_empty());
        assert!(!project.id.is_empty());
    }

    #[test]
    fn test_project_ids_are_unique() {
        let a = Project::new("http://example.com", "", 1, Vec::new());
        let b = Project::new("http://example.com", "", 1, Vec::new());
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_project_json_round_trip() {
        let mut project = Project::new(
            "http://example.com/docs",
            "http://example.com/docs",
            3,
            vec![FilterRule {
                start: "<script".to_string(),
                end: "</script>".to_string(),
            }],
        );
        project.status = ProjectStatus::Completed;
        project.progress = 100;
        project.downloaded = 7;
        project.total = 7;
        project.errors.push("Failed to scrape http://example.com/x: status 404".to_string());

        let json = serde_json::to_string_pretty(&project).unwrap();
        let back: Project = serde_json::from_str(&json).unwrap();

        assert_eq!(back.id, project.id);
        assert_eq!(back.url, project.url);
        assert_eq!(back.url_prefix, project.url_prefix);
        assert_eq!(back.depth, project.depth);
        assert_eq!(back.status, project.status);
        assert_eq!(back.filters, project.filters);
        assert_eq!(back.progress, project.progress);
        assert_eq!(back.downloaded, project.downloaded);
        assert_eq!(back.total, project.total);
        assert_eq!(back.errors, project.errors);
        assert_eq!(back.created_at, project.created_at);
        assert_eq!(back.updated_at, project.updated_at);
    }

    #[test]
    fn test_project_json_field_names() {
        let project = Project::new("http://example.com", "http://example.com", 1, Vec::new());
        let json = serde_json::to_string(&project).unwrap();
        assert!(json.contains("\"project_id\""));
        assert!(json.contains("\"pages_downloaded\""));
        assert!(json.contains("\"total_pages\""));
        assert!(json.contains("\"status\":\"started\""));
    }

    #[test]
    fn test_scrape_request_defaults() {
        let request: ScrapeRequest =
            serde_json::from_str(r#"{"url": "http://example.com", "depth": 2}"#).unwrap();
        assert_eq!(request.url, "http://example.com");
        assert!(request.url_prefix.is_none());
        assert!(request.filters.is_empty());
    }

    #[test]
    fn test_status_report_from_project() {
        let mut project = Project::new("http://example.com", "", 1, Vec::new());
        project.status = ProjectStatus::InProgress;
        project.downloaded = 3;
        project.current_url = "http://example.com/a".to_string();

        let report = StatusReport::from_project(&project);
        assert_eq!(report.status, ProjectStatus::InProgress);
        assert_eq!(report.pages_downloaded, 3);
        assert_eq!(report.current_url, "http://example.com/a");
    }

    #[test]
    fn test_asset_kind_dirs() {
        assert_eq!(AssetKind::Img.dir(), "img");
        assert_eq!(AssetKind::Css.dir(), "css");
        assert_eq!(AssetKind::Js.dir(), "js");
        assert_eq!(AssetKind::Font.dir(), "font");
        assert_eq!(AssetKind::Other.dir(), "other");
    }

    #[test]
    fn test_project_status_serde_literals() {
        assert_eq!(
            serde_json::to_string(&ProjectStatus::InProgress).unwrap(),
            "\"in_progress\""
        );
        assert_eq!(
            serde_json::from_str::<ProjectStatus>("\"failed\"").unwrap(),
            ProjectStatus::Failed
        );
    }
}
