use clap::Parser;
use std::path::PathBuf;

use crate::models::{FilterRule, ScrapeRequest};

#[derive(Parser, Debug)]
#[command(
    name = "site-scraper",
    about = "Mirrors a bounded region of a website into an offline project tree",
    version,
    long_about = "Crawls a site from a seed URL, downloads every in-scope HTML page and its \
static assets, rewrites links to local relative paths, optionally applies bracket filters \
to the stored HTML, and writes the result as a browsable project directory."
)]
pub struct ScrapeCommand {
    /// The seed URL to start crawling from
    #[arg(required = true)]
    pub url: String,

    /// Scope prefix; only URLs starting with it are crawled (defaults to the seed's origin)
    #[arg(short = 'p', long)]
    pub url_prefix: Option<String>,

    /// Maximum crawl depth (1-5)
    #[arg(short = 'd', long, default_value = "2")]
    pub depth: u32,

    /// Directory holding project output trees
    #[arg(long, default_value = "./data")]
    pub data_dir: PathBuf,

    /// Bracket filter applied to stored HTML, as START::END (repeatable)
    #[arg(short = 'f', long = "filter", value_parser = parse_filter_rule)]
    pub filters: Vec<FilterRule>,

    /// Write a ZIP archive of the project next to its directory when done
    #[arg(long)]
    pub zip: bool,
}

impl ScrapeCommand {
    pub fn to_request(&self) -> ScrapeRequest {
        ScrapeRequest {
            url: self.url.clone(),
            url_prefix: self.url_prefix.clone(),
            depth: self.depth,
            filters: self.filters.clone(),
        }
    }
}

/// Parses `START::END` into a filter rule.
fn parse_filter_rule(raw: &str) -> Result<FilterRule, String> {
    let Some((start, end)) = raw.split_once("::") else {
        return Err("expected START::END, e.g. \"<script::</script>\"".to_string());
    };
    if start.is_empty() || end.is_empty() {
        return Err("both START and END must be non-empty".to_string());
    }
    Ok(FilterRule {
        start: start.to_string(),
        end: end.to_string(),
    })
}
