use thiserror::Error;
use url::Url;

use crate::models::FilterRule;

/// Depth cap bounds accepted from callers.
pub const MIN_DEPTH: u32 = 1;
pub const MAX_DEPTH: u32 = 5;

#[derive(Debug, Error)]
pub enum ScopeError {
    #[error("invalid URL: {0}")]
    InvalidSeed(String),
    #[error("invalid url_prefix: {0}")]
    InvalidPrefix(String),
    #[error("url_prefix must be in the same domain as url")]
    CrossHost,
    #[error("depth must be between 1 and 5, got {0}")]
    InvalidDepth(u32),
    #[error("invalid filter: {0}")]
    InvalidFilter(String),
}

/// Crawl scope: the canonical seed URL plus the normalized prefix every
/// tracked URL must start with.
#[derive(Debug, Clone)]
pub struct Scope {
    seed: Url,
    seed_canonical: String,
    host: String,
    prefix: String,
}

impl Scope {
    /// Validates the seed and prefix hint and derives the canonical scope.
    ///
    /// An empty/blank hint synthesizes `scheme://host`; a relative hint is
    /// resolved against the seed. The resolved prefix must stay on the seed's
    /// host and be non-empty after normalization.
    pub fn new(seed: &str, prefix_hint: &str) -> Result<Self, ScopeError> {
        let seed_url =
            Url::parse(seed.trim()).map_err(|e| ScopeError::InvalidSeed(e.to_string()))?;
        if seed_url.scheme() != "http" && seed_url.scheme() != "https" {
            return Err(ScopeError::InvalidSeed(format!(
                "unsupported scheme: {}",
                seed_url.scheme()
            )));
        }
        let host = seed_url
            .host_str()
            .ok_or_else(|| ScopeError::InvalidSeed("missing host".to_string()))?
            .to_string();

        let hint = prefix_hint.trim();
        let prefix_url = if hint.is_empty() {
            let origin = match seed_url.port() {
                Some(port) => format!("{}://{}:{}", seed_url.scheme(), host, port),
                None => format!("{}://{}", seed_url.scheme(), host),
            };
            Url::parse(&origin).map_err(|e| ScopeError::InvalidPrefix(e.to_string()))?
        } else {
            match Url::parse(hint) {
                Ok(url) => url,
                // Relative hints resolve against the seed.
                Err(url::ParseError::RelativeUrlWithoutBase) => seed_url
                    .join(hint)
                    .map_err(|e| ScopeError::InvalidPrefix(e.to_string()))?,
                Err(e) => return Err(ScopeError::InvalidPrefix(e.to_string())),
            }
        };

        if prefix_url.host_str() != Some(host.as_str()) {
            return Err(ScopeError::CrossHost);
        }

        let prefix = canonicalize_str(prefix_url.as_str())
            .ok_or_else(|| ScopeError::InvalidPrefix("cannot be empty".to_string()))?;
        if prefix.is_empty() {
            return Err(ScopeError::InvalidPrefix("cannot be empty".to_string()));
        }

        let seed_canonical = canonicalize(&seed_url);

        Ok(Self {
            seed: seed_url,
            seed_canonical,
            host,
            prefix,
        })
    }

    pub fn seed(&self) -> &Url {
        &self.seed
    }

    /// Canonical form of the seed URL; the registry key of the index page.
    pub fn seed_canonical(&self) -> &str {
        &self.seed_canonical
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Scope test: the candidate's canonical form must start with the prefix.
    pub fn contains(&self, raw_url: &str) -> bool {
        match canonicalize_str(raw_url) {
            Some(canonical) => canonical.starts_with(&self.prefix),
            None => false,
        }
    }

    /// Whether the URL sits on the seed's host.
    pub fn same_host(&self, url: &Url) -> bool {
        url.host_str() == Some(self.host.as_str())
    }
}

/// Canonical URL form used for registry keys, the visited set and scope
/// tests: fragment cleared, a single trailing `/` stripped.
pub fn canonicalize(url: &Url) -> String {
    let mut normalized = url.clone();
    normalized.set_fragment(None);
    let s = normalized.to_string();
    match s.strip_suffix('/') {
        Some(stripped) => stripped.to_string(),
        None => s,
    }
}

/// `canonicalize` for raw strings; `None` when the input does not parse.
pub fn canonicalize_str(raw: &str) -> Option<String> {
    let url = Url::parse(raw.trim()).ok()?;
    Some(canonicalize(&url))
}

/// Validates a depth cap from a submission.
pub fn validate_depth(depth: u32) -> Result<(), ScopeError> {
    if !(MIN_DEPTH..=MAX_DEPTH).contains(&depth) {
        return Err(ScopeError::InvalidDepth(depth));
    }
    Ok(())
}

/// Validates filter rules: both markers non-empty and distinct. Equal markers
/// would collapse across unrelated boundaries.
pub fn validate_filters(filters: &[FilterRule]) -> Result<(), ScopeError> {
    for (i, rule) in filters.iter().enumerate() {
        if rule.start.is_empty() || rule.end.is_empty() {
            return Err(ScopeError::InvalidFilter(format!(
                "rule {} has an empty marker",
                i
            )));
        }
        if rule.start == rule.end {
            return Err(ScopeError::InvalidFilter(format!(
                "rule {} has identical start and end markers",
                i
            )));
        }
    }
    Ok(())
}
