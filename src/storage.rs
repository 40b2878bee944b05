use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::models::{AssetKind, FilterRule, Project};

/// On-disk project store. Each project owns `<data_dir>/<project_id>/` with
/// the layout:
///
/// ```text
/// index.html
/// pages/<digest>.html
/// assets/{img,css,js,font,other}/<digest><ext>
/// filters.json
/// project.json
/// ```
#[derive(Debug, Clone)]
pub struct ProjectStore {
    data_dir: PathBuf,
}

impl ProjectStore {
    pub fn new(data_dir: &Path) -> Result<Self> {
        fs::create_dir_all(data_dir)
            .with_context(|| format!("failed to create data directory: {:?}", data_dir))?;
        Ok(Self {
            data_dir: data_dir.to_path_buf(),
        })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn project_dir(&self, project_id: &str) -> PathBuf {
        self.data_dir.join(project_id)
    }

    /// Creates the project folder skeleton: `pages/` and one directory per
    /// asset bucket.
    pub fn initialize_project_directory(&self, project_id: &str) -> Result<()> {
        let project_dir = self.project_dir(project_id);
        fs::create_dir_all(project_dir.join("pages"))
            .with_context(|| format!("failed to create pages dir in {:?}", project_dir))?;
        for kind in AssetKind::all() {
            let dir = project_dir.join("assets").join(kind.dir());
            fs::create_dir_all(&dir)
                .with_context(|| format!("failed to create asset dir: {:?}", dir))?;
        }
        Ok(())
    }

    /// Writes a file at a project-relative path.
    pub fn write_file(&self, project_id: &str, relative_path: &str, content: &[u8]) -> Result<()> {
        let path = self.project_dir(project_id).join(relative_path);
        fs::write(&path, content).with_context(|| format!("failed to write file: {:?}", path))
    }

    /// Reads a file at a project-relative path.
    pub fn read_file(&self, project_id: &str, relative_path: &str) -> Result<Vec<u8>> {
        let path = self.project_dir(project_id).join(relative_path);
        fs::read(&path).with_context(|| format!("failed to read file: {:?}", path))
    }

    /// Serializes the project entity to `project.json`.
    pub fn save_project(&self, project: &Project) -> Result<()> {
        let path = self.project_dir(&project.id).join("project.json");
        let data = serde_json::to_string_pretty(project).context("failed to serialize project")?;
        fs::write(&path, data).with_context(|| format!("failed to write project metadata: {:?}", path))
    }

    pub fn load_project(&self, project_id: &str) -> Result<Project> {
        let path = self.project_dir(project_id).join("project.json");
        let data = fs::read_to_string(&path)
            .with_context(|| format!("failed to read project metadata: {:?}", path))?;
        serde_json::from_str(&data)
            .with_context(|| format!("failed to parse project metadata: {:?}", path))
    }

    /// Persists the filter list as `filters.json` (always written, possibly
    /// an empty array).
    pub fn save_filters(&self, project_id: &str, filters: &[FilterRule]) -> Result<()> {
        let path = self.project_dir(project_id).join("filters.json");
        let data = serde_json::to_string_pretty(filters).context("failed to serialize filters")?;
        fs::write(&path, data).with_context(|| format!("failed to write filters: {:?}", path))
    }

    pub fn project_exists(&self, project_id: &str) -> bool {
        self.project_dir(project_id).is_dir()
    }

    /// Removes a project directory and everything under it.
    pub fn delete_project(&self, project_id: &str) -> Result<()> {
        let project_dir = self.project_dir(project_id);
        fs::remove_dir_all(&project_dir)
            .with_context(|| format!("failed to delete project: {:?}", project_dir))
    }

    /// Ids of every project directory in the store.
    pub fn list_projects(&self) -> Result<Vec<String>> {
        let mut projects = Vec::new();
        let entries = fs::read_dir(&self.data_dir)
            .with_context(|| format!("failed to read data directory: {:?}", self.data_dir))?;
        for entry in entries {
            let entry = entry.context("failed to read data directory entry")?;
            if entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
                projects.push(entry.file_name().to_string_lossy().to_string());
            }
        }
        projects.sort();
        Ok(projects)
    }

    /// Total size in bytes of all files under a project directory.
    pub fn project_size(&self, project_id: &str) -> Result<u64> {
        fn dir_size(dir: &Path) -> Result<u64> {
            let mut size = 0;
            for entry in fs::read_dir(dir).with_context(|| format!("failed to read dir: {:?}", dir))? {
                let entry = entry.context("failed to read dir entry")?;
                let metadata = entry.metadata().context("failed to stat entry")?;
                if metadata.is_dir() {
                    size += dir_size(&entry.path())?;
                } else {
                    size += metadata.len();
                }
            }
            Ok(size)
        }
        dir_size(&self.project_dir(project_id))
    }
}
