use std::collections::{HashSet, VecDeque};
use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use chrono::Utc;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::extract;
use crate::fetcher::{FetchError, FetchResponse, Fetcher};
use crate::filter;
use crate::models::{Project, ProjectStatus, ScrapeRequest, ScrapeResponse};
use crate::registry::{asset_extension, asset_local_path, AssetRegistry, PageRegistry};
use crate::rewrite::{rewrite_html, UrlMapper};
use crate::scope::{self, canonicalize, canonicalize_str, Scope};
use crate::status::ProjectHandle;
use crate::storage::ProjectStore;

/// Concurrent in-flight page fetches (single-host crawl).
const CRAWL_PARALLELISM: usize = 2;

/// Link targets with these extensions are never followed as pages.
const SKIP_EXTENSIONS: [&str; 13] = [
    ".jpg", ".jpeg", ".png", ".gif", ".pdf", ".zip", ".css", ".js", ".svg", ".ico", ".woff",
    ".woff2", ".ttf",
];

/// Runs one scraping project through the whole pipeline: bounded-depth
/// breadth-first crawl, asset download, raw persistence, link rewrite and
/// the filter pass. The registries live for the duration of `run` and are
/// discarded once the project is persisted.
#[derive(Debug)]
pub struct Scraper {
    project: ProjectHandle,
    project_id: String,
    depth_cap: u32,
    scope: Scope,
    fetcher: Fetcher,
    pages: PageRegistry,
    assets: AssetRegistry,
    visited: HashSet<String>,
    store: ProjectStore,
    cancel: CancellationToken,
}

impl Scraper {
    /// Validates a submission and prepares a scraper for it. Validation
    /// failures surface here; the project never enters `in_progress`.
    pub fn new(request: &ScrapeRequest, data_dir: &Path) -> Result<Self> {
        scope::validate_depth(request.depth)?;
        scope::validate_filters(&request.filters)?;
        let crawl_scope = Scope::new(&request.url, request.url_prefix.as_deref().unwrap_or(""))?;

        let project = Project::new(
            &request.url,
            crawl_scope.prefix(),
            request.depth,
            request.filters.clone(),
        );
        let project_id = project.id.clone();
        let store = ProjectStore::new(data_dir)?;
        let fetcher = Fetcher::new()?;
        let pages = PageRegistry::new(crawl_scope.seed_canonical());

        Ok(Self {
            project: Arc::new(Mutex::new(project)),
            project_id,
            depth_cap: request.depth,
            scope: crawl_scope,
            fetcher,
            pages,
            assets: AssetRegistry::new(),
            visited: HashSet::new(),
            store,
            cancel: CancellationToken::new(),
        })
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    /// Shared handle for status pull-queries while the crawl runs.
    pub fn project_handle(&self) -> ProjectHandle {
        Arc::clone(&self.project)
    }

    /// Token the host can cancel; no new work is dispatched afterwards and
    /// the project is persisted as failed.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Acceptance snapshot returned to the submitter.
    pub fn accepted(&self) -> ScrapeResponse {
        let project = self.project.lock().unwrap();
        ScrapeResponse {
            project_id: project.id.clone(),
            status: project.status,
        }
    }

    pub fn pages(&self) -> &PageRegistry {
        &self.pages
    }

    pub fn assets(&self) -> &AssetRegistry {
        &self.assets
    }

    /// Runs the project to completion or failure. The project directory is
    /// left on disk either way; `project.json` records the outcome.
    pub async fn run(&mut self) -> Result<()> {
        {
            let mut project = self.project.lock().unwrap();
            project.status = ProjectStatus::InProgress;
            project.updated_at = Utc::now();
        }

        if let Err(err) = self.store.initialize_project_directory(&self.project_id) {
            return self.fail(format!("Failed to initialize project: {err:#}"));
        }
        if let Err(err) = self.save_project() {
            return self.fail(format!("Failed to save project metadata: {err:#}"));
        }

        {
            let project = self.project.lock().unwrap();
            println!(
                "🚀 Scraping {} (scope {}, depth {})",
                project.url.blue(),
                project.url_prefix,
                project.depth
            );
        }

        self.crawl().await;
        if self.cancel.is_cancelled() {
            return self.fail("Scrape cancelled".to_string());
        }

        self.download_assets().await;
        if self.cancel.is_cancelled() {
            return self.fail("Scrape cancelled".to_string());
        }

        if let Err(err) = self.save_pages() {
            return self.fail(format!("Failed to save pages: {err:#}"));
        }
        if let Err(err) = self.process_links() {
            return self.fail(format!("Link processing failed: {err:#}"));
        }
        if let Err(err) = self.apply_filters() {
            return self.fail(format!("Filter pass failed: {err:#}"));
        }

        {
            let mut project = self.project.lock().unwrap();
            project.status = ProjectStatus::Completed;
            project.total = self.pages.len() as u32;
            project.progress = 100;
            project.current_url = String::new();
            project.updated_at = Utc::now();
        }
        self.save_project()?;

        println!(
            "✅ Scrape complete: {} pages, {} assets",
            self.pages.len(),
            self.assets.len()
        );
        Ok(())
    }

    /// Bounded-depth BFS over in-scope pages with at most
    /// `CRAWL_PARALLELISM` fetches in flight. Per-page failures are recorded
    /// and the crawl continues.
    async fn crawl(&mut self) {
        let seed = self.scope.seed_canonical().to_string();
        self.pages.register(&seed, 0, None);
        self.visited.insert(seed.clone());

        let mut frontier: VecDeque<(String, u32)> = VecDeque::new();
        frontier.push_back((seed, 0));
        let mut in_flight: JoinSet<(String, u32, Result<FetchResponse, FetchError>)> =
            JoinSet::new();

        loop {
            if !self.cancel.is_cancelled() {
                while in_flight.len() < CRAWL_PARALLELISM {
                    let Some((url, depth)) = frontier.pop_front() else {
                        break;
                    };
                    {
                        let mut project = self.project.lock().unwrap();
                        project.current_url = url.clone();
                        project.updated_at = Utc::now();
                    }
                    println!("📥 Fetching page: {}", url);
                    let fetcher = self.fetcher.clone();
                    in_flight.spawn(async move {
                        let result = fetcher.fetch(&url).await;
                        (url, depth, result)
                    });
                }
            }

            let Some(joined) = in_flight.join_next().await else {
                // Nothing in flight; either the crawl is done or it was
                // cancelled before the frontier drained.
                if self.cancel.is_cancelled() || frontier.is_empty() {
                    break;
                }
                continue;
            };

            match joined {
                Ok((url, depth, Ok(response))) => {
                    self.ingest_page(&url, depth, response, &mut frontier);
                }
                Ok((url, _depth, Err(err))) => {
                    eprintln!("⚠️  {}", err);
                    if let Some(page) = self.pages.get_mut(&url) {
                        page.error = Some(err.to_string());
                    }
                    let mut project = self.project.lock().unwrap();
                    project.errors.push(format!("Failed to scrape {}: {}", url, err));
                    project.updated_at = Utc::now();
                }
                Err(join_err) => {
                    let mut project = self.project.lock().unwrap();
                    project.errors.push(format!("Crawl worker failed: {}", join_err));
                }
            }
        }
    }

    /// Stores a fetched body, extracts references and grows the frontier.
    fn ingest_page(
        &mut self,
        requested: &str,
        depth: u32,
        response: FetchResponse,
        frontier: &mut VecDeque<(String, u32)>,
    ) {
        let final_canonical = canonicalize(&response.final_url);
        let key = if final_canonical != requested {
            // A redirect landed elsewhere; the body belongs to the final URL.
            if !self.scope.contains(&final_canonical) {
                self.pages.remove(requested);
                let mut project = self.project.lock().unwrap();
                project.errors.push(format!(
                    "Redirect of {} left the scope: {}",
                    requested, final_canonical
                ));
                return;
            }
            if self.visited.contains(&final_canonical) {
                // Duplicate of an already-tracked page.
                self.pages.remove(requested);
                return;
            }
            self.visited.insert(final_canonical.clone());
            self.pages.rekey(requested, &final_canonical);
            final_canonical
        } else {
            requested.to_string()
        };

        let Ok(base) = Url::parse(&key) else {
            return;
        };
        let html = response.body_text();
        let refs = extract::extract_refs(&html, &base);

        if let Some(page) = self.pages.get_mut(&key) {
            page.html = html;
            page.downloaded = true;
            page.links = refs.links.clone();
        }
        {
            let mut project = self.project.lock().unwrap();
            project.downloaded += 1;
            project.updated_at = Utc::now();
        }

        for link in &refs.links {
            let Some(canonical) = canonicalize_str(link) else {
                continue;
            };
            if depth >= self.depth_cap {
                continue;
            }
            if self.visited.contains(&canonical) {
                continue;
            }
            if !self.should_follow(&canonical) {
                continue;
            }
            self.visited.insert(canonical.clone());
            self.pages.register(&canonical, depth + 1, Some(&key));
            frontier.push_back((canonical, depth + 1));
        }

        for (asset_url, kind) in &refs.assets {
            let Some(canonical) = canonicalize_str(asset_url) else {
                continue;
            };
            if !self.scope.contains(&canonical) {
                continue;
            }
            // A URL lives in at most one registry.
            if self.pages.contains(&canonical) {
                continue;
            }
            self.assets.register(&canonical, *kind);
            if let Some(page) = self.pages.get_mut(&key) {
                page.assets.push(canonical);
            }
        }
    }

    /// Whether a canonical link target should be crawled as a page.
    fn should_follow(&self, canonical: &str) -> bool {
        let Ok(url) = Url::parse(canonical) else {
            return false;
        };
        if !self.scope.same_host(&url) {
            return false;
        }
        if !self.scope.contains(canonical) {
            return false;
        }
        let path = url.path().to_ascii_lowercase();
        if SKIP_EXTENSIONS.iter().any(|ext| path.ends_with(ext)) {
            return false;
        }
        if self.assets.contains(canonical) {
            return false;
        }
        true
    }

    /// Downloads every registered asset with direct GETs. Failures are
    /// recorded per asset and never abort the project.
    async fn download_assets(&mut self) {
        let urls = self.assets.urls();
        if urls.is_empty() {
            return;
        }

        println!("📦 Downloading {} assets...", urls.len());
        let progress = ProgressBar::new(urls.len() as u64);
        progress.set_style(
            ProgressStyle::default_bar()
                .template("{spinner} [{bar:40.cyan/blue}] {pos}/{len} assets")
                .unwrap(),
        );

        for url in urls {
            if self.cancel.is_cancelled() {
                break;
            }
            let Some(kind) = self.assets.get(&url).map(|a| a.kind) else {
                continue;
            };

            match self.fetcher.fetch(&url).await {
                Ok(response) => {
                    let ext = match Url::parse(&url) {
                        Ok(parsed) => asset_extension(&parsed, response.content_type.as_deref()),
                        Err(_) => String::new(),
                    };
                    let local_path = asset_local_path(&url, kind, &ext);
                    match self.store.write_file(&self.project_id, &local_path, &response.body) {
                        Ok(()) => {
                            if let Some(asset) = self.assets.get_mut(&url) {
                                asset.local_path = Some(local_path);
                                asset.downloaded = true;
                            }
                        }
                        Err(err) => {
                            if let Some(asset) = self.assets.get_mut(&url) {
                                asset.error = Some(format!("{err:#}"));
                            }
                        }
                    }
                }
                Err(err) => {
                    if let Some(asset) = self.assets.get_mut(&url) {
                        asset.error = Some(err.to_string());
                    }
                    let mut project = self.project.lock().unwrap();
                    project.errors.push(format!("Failed to scrape {}: {}", url, err));
                }
            }
            progress.inc(1);
        }
        progress.finish_and_clear();
    }

    /// Writes every downloaded page's raw HTML to its local path.
    fn save_pages(&mut self) -> Result<()> {
        for url in self.pages.urls() {
            let Some(page) = self.pages.get(&url) else {
                continue;
            };
            if !page.downloaded {
                continue;
            }
            self.store
                .write_file(&self.project_id, &page.local_path, page.html.as_bytes())?;
        }
        Ok(())
    }

    /// Second pass: rewrites links in every stored page against the frozen
    /// registries. Documents that fail to rewrite stay raw with the error
    /// recorded; I/O failures abort.
    fn process_links(&mut self) -> Result<()> {
        let urls = self.pages.urls();
        let mut outcomes: Vec<(String, Result<(), String>)> = Vec::new();

        {
            let mapper = UrlMapper::new(&self.scope, &self.pages, &self.assets);
            for url in &urls {
                let Some(page) = self.pages.get(url) else {
                    continue;
                };
                if !page.downloaded {
                    continue;
                }
                let base = match Url::parse(url) {
                    Ok(base) => base,
                    Err(err) => {
                        outcomes.push((url.clone(), Err(err.to_string())));
                        continue;
                    }
                };
                let raw = self.store.read_file(&self.project_id, &page.local_path)?;
                let html = String::from_utf8_lossy(&raw).into_owned();
                match rewrite_html(&html, &base, &mapper) {
                    Ok(bytes) => {
                        self.store.write_file(&self.project_id, &page.local_path, &bytes)?;
                        outcomes.push((url.clone(), Ok(())));
                    }
                    Err(err) => outcomes.push((url.clone(), Err(err.to_string()))),
                }
            }
        }

        for (url, outcome) in outcomes {
            match outcome {
                Ok(()) => {
                    if let Some(page) = self.pages.get_mut(&url) {
                        page.processed = true;
                    }
                }
                Err(message) => {
                    if let Some(page) = self.pages.get_mut(&url) {
                        page.error = Some(format!("Link processing failed: {}", message));
                    }
                    let mut project = self.project.lock().unwrap();
                    project
                        .errors
                        .push(format!("Failed to process {}: {}", url, message));
                }
            }
        }
        Ok(())
    }

    /// Applies the project's filter rules to every stored HTML file and
    /// persists the filter manifest.
    fn apply_filters(&mut self) -> Result<()> {
        let filters = { self.project.lock().unwrap().filters.clone() };
        self.store.save_filters(&self.project_id, &filters)?;
        if filters.is_empty() {
            return Ok(());
        }

        // Pages that failed the rewrite pass stay raw and unfiltered.
        let targets: Vec<(String, String)> = self
            .pages
            .iter()
            .filter(|page| page.downloaded && page.processed)
            .map(|page| (page.url.clone(), page.local_path.clone()))
            .collect();

        for (url, local_path) in targets {
            let raw = self.store.read_file(&self.project_id, &local_path)?;
            let text = String::from_utf8_lossy(&raw).into_owned();
            let filtered = filter::apply_filters(&text, &filters);
            self.store
                .write_file(&self.project_id, &local_path, filtered.as_bytes())?;
            if let Some(page) = self.pages.get_mut(&url) {
                page.filtered = true;
            }
        }
        Ok(())
    }

    fn save_project(&self) -> Result<()> {
        let project = self.project.lock().unwrap().clone();
        self.store.save_project(&project)
    }

    /// Terminal failure: records the error, persists the project as failed
    /// and returns the error to the caller. The directory is left intact.
    fn fail(&self, message: String) -> Result<()> {
        eprintln!("❌ {}", message.red());
        {
            let mut project = self.project.lock().unwrap();
            project.status = ProjectStatus::Failed;
            project.errors.push(message.clone());
            project.updated_at = Utc::now();
        }
        if let Err(err) = self.save_project() {
            eprintln!("⚠️  Failed to persist failed project: {err:#}");
        }
        Err(anyhow!(message))
    }
}
