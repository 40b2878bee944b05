use std::collections::HashMap;

use crate::models::{Asset, AssetKind, Page};

/// First 16 hex characters of the MD5 of the URL; the collision-resistant
/// stem of every generated local filename.
pub fn generate_filename(url: &str) -> String {
    let digest = format!("{:x}", md5::compute(url.as_bytes()));
    digest[..16].to_string()
}

/// Deduplicated map of canonical page URL -> `Page`. The seed page maps to
/// `index.html`; every other page to `pages/<digest>.html`.
#[derive(Debug, Clone)]
pub struct PageRegistry {
    seed: String,
    pages: HashMap<String, Page>,
}

impl PageRegistry {
    pub fn new(seed_canonical: &str) -> Self {
        Self {
            seed: seed_canonical.to_string(),
            pages: HashMap::new(),
        }
    }

    /// Registers a page, returning whether it was new. Idempotent: an
    /// existing record keeps its original depth and parent.
    pub fn register(&mut self, url: &str, depth: u32, parent_url: Option<&str>) -> bool {
        if self.pages.contains_key(url) {
            return false;
        }
        let local_path = self.local_path_for(url);
        self.pages.insert(
            url.to_string(),
            Page {
                url: url.to_string(),
                local_path,
                depth,
                parent_url: parent_url.map(|p| p.to_string()),
                html: String::new(),
                links: Vec::new(),
                assets: Vec::new(),
                downloaded: false,
                processed: false,
                filtered: false,
                error: None,
            },
        );
        true
    }

    fn local_path_for(&self, url: &str) -> String {
        if url == self.seed {
            "index.html".to_string()
        } else {
            format!("pages/{}.html", generate_filename(url))
        }
    }

    /// Moves a record to a new canonical URL (redirect landed elsewhere).
    /// The local path is recomputed; depth and parent carry over. A
    /// redirected seed keeps `index.html`.
    pub fn rekey(&mut self, from: &str, to: &str) {
        if let Some(mut page) = self.pages.remove(from) {
            if from == self.seed {
                self.seed = to.to_string();
            }
            page.url = to.to_string();
            page.local_path = self.local_path_for(to);
            self.pages.insert(to.to_string(), page);
        }
    }

    pub fn remove(&mut self, url: &str) -> Option<Page> {
        self.pages.remove(url)
    }

    pub fn get(&self, url: &str) -> Option<&Page> {
        self.pages.get(url)
    }

    pub fn get_mut(&mut self, url: &str) -> Option<&mut Page> {
        self.pages.get_mut(url)
    }

    pub fn contains(&self, url: &str) -> bool {
        self.pages.contains_key(url)
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Page> {
        self.pages.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Page> {
        self.pages.values_mut()
    }

    /// URLs in deterministic order, for phase iteration.
    pub fn urls(&self) -> Vec<String> {
        let mut urls: Vec<String> = self.pages.keys().cloned().collect();
        urls.sort();
        urls
    }
}

/// Deduplicated map of canonical asset URL -> `Asset`.
#[derive(Debug, Clone, Default)]
pub struct AssetRegistry {
    assets: HashMap<String, Asset>,
}

impl AssetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an asset, returning whether it was new. The first
    /// registration wins the type bucket.
    pub fn register(&mut self, url: &str, kind: AssetKind) -> bool {
        if self.assets.contains_key(url) {
            return false;
        }
        self.assets.insert(
            url.to_string(),
            Asset {
                url: url.to_string(),
                kind,
                local_path: None,
                downloaded: false,
                error: None,
            },
        );
        true
    }

    pub fn get(&self, url: &str) -> Option<&Asset> {
        self.assets.get(url)
    }

    pub fn get_mut(&mut self, url: &str) -> Option<&mut Asset> {
        self.assets.get_mut(url)
    }

    pub fn contains(&self, url: &str) -> bool {
        self.assets.contains_key(url)
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Asset> {
        self.assets.values()
    }

    pub fn urls(&self) -> Vec<String> {
        let mut urls: Vec<String> = self.assets.keys().cloned().collect();
        urls.sort();
        urls
    }
}

/// Local filename for an asset once its extension is known:
/// `assets/<kind>/<digest><ext>`.
pub fn asset_local_path(url: &str, kind: AssetKind, ext: &str) -> String {
    format!("assets/{}/{}{}", kind.dir(), generate_filename(url), ext)
}

/// Extension for an asset: the URL's path extension when present, otherwise
/// a best-effort guess from the Content-Type, otherwise empty.
pub fn asset_extension(url: &url::Url, content_type: Option<&str>) -> String {
    let path = url.path();
    if let Some(ext) = std::path::Path::new(path).extension() {
        return format!(".{}", ext.to_string_lossy());
    }

    match content_type {
        Some(ct) if ct.contains("image/jpeg") => ".jpg".to_string(),
        Some(ct) if ct.contains("image/png") => ".png".to_string(),
        Some(ct) if ct.contains("text/css") => ".css".to_string(),
        Some(ct) if ct.contains("javascript") => ".js".to_string(),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    #[test]
    fn test_generate_filename_is_deterministic() {
        let a = generate_filename("http://example.com/a");
        let b = generate_filename("http://example.com/a");
        assert_eq!(a, b);
        assert_eq!(a.len(), 16);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_generate_filename_differs_per_url() {
        assert_ne!(
            generate_filename("http://example.com/a"),
            generate_filename("http://example.com/b")
        );
    }

    #[test]
    fn test_page_registry_seed_maps_to_index() {
        let mut registry = PageRegistry::new("http://example.com");
        registry.register("http://example.com", 0, None);
        registry.register("http://example.com/about", 1, Some("http://example.com"));

        assert_eq!(
            registry.get("http://example.com").unwrap().local_path,
            "index.html"
        );
        let about = registry.get("http://example.com/about").unwrap();
        assert!(about.local_path.starts_with("pages/"));
        assert!(about.local_path.ends_with(".html"));
        assert_eq!(about.depth, 1);
        assert_eq!(about.parent_url.as_deref(), Some("http://example.com"));
    }

    #[test]
    fn test_page_registration_is_idempotent() {
        let mut registry = PageRegistry::new("http://example.com");
        assert!(registry.register("http://example.com/a", 1, None));
        // Re-discovery at a deeper path must not revise the depth.
        assert!(!registry.register("http://example.com/a", 3, None));
        assert_eq!(registry.get("http://example.com/a").unwrap().depth, 1);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_page_rekey_recomputes_local_path() {
        let mut registry = PageRegistry::new("http://example.com");
        registry.register("http://example.com/old", 2, None);
        registry.rekey("http://example.com/old", "http://example.com/new");

        assert!(!registry.contains("http://example.com/old"));
        let page = registry.get("http://example.com/new").unwrap();
        assert_eq!(page.depth, 2);
        assert_eq!(
            page.local_path,
            format!("pages/{}.html", generate_filename("http://example.com/new"))
        );
    }

    #[test]
    fn test_rekeyed_seed_keeps_index_html() {
        let mut registry = PageRegistry::new("http://example.com");
        registry.register("http://example.com", 0, None);
        registry.rekey("http://example.com", "http://example.com/home");
        assert_eq!(
            registry.get("http://example.com/home").unwrap().local_path,
            "index.html"
        );
    }

    #[test]
    fn test_asset_registration_is_idempotent() {
        let mut registry = AssetRegistry::new();
        assert!(registry.register("http://example.com/s.css", AssetKind::Css));
        assert!(!registry.register("http://example.com/s.css", AssetKind::Img));
        assert_eq!(registry.len(), 1);
        assert_eq!(
            registry.get("http://example.com/s.css").unwrap().kind,
            AssetKind::Css
        );
    }

    #[test]
    fn test_asset_local_path_shape() {
        let path = asset_local_path("http://example.com/s.css", AssetKind::Css, ".css");
        assert_eq!(
            path,
            format!(
                "assets/css/{}.css",
                generate_filename("http://example.com/s.css")
            )
        );
    }

    #[test]
    fn test_asset_extension_from_path() {
        let url = Url::parse("http://example.com/img/logo.png?v=2").unwrap();
        assert_eq!(asset_extension(&url, None), ".png");
    }

    #[test]
    fn test_asset_extension_from_content_type() {
        let url = Url::parse("http://example.com/styles").unwrap();
        assert_eq!(asset_extension(&url, Some("text/css; charset=utf-8")), ".css");
        assert_eq!(asset_extension(&url, Some("image/jpeg")), ".jpg");
        assert_eq!(asset_extension(&url, Some("image/png")), ".png");
        assert_eq!(
            asset_extension(&url, Some("application/javascript")),
            ".js"
        );
        assert_eq!(asset_extension(&url, Some("font/woff2")), "");
        assert_eq!(asset_extension(&url, None), "");
    }

    #[test]
    fn test_urls_are_sorted() {
        let mut registry = AssetRegistry::new();
        registry.register("http://example.com/b.js", AssetKind::Js);
        registry.register("http://example.com/a.css", AssetKind::Css);
        assert_eq!(
            registry.urls(),
            vec![
                "http://example.com/a.css".to_string(),
                "http://example.com/b.js".to_string()
            ]
        );
    }

    #[test]
    fn test_no_two_pages_share_a_local_path() {
        let mut registry = PageRegistry::new("http://example.com");
        registry.register("http://example.com", 0, None);
        for i in 0..50 {
            registry.register(&format!("http://example.com/p{i}"), 1, None);
        }
        let mut paths: Vec<String> = registry.iter().map(|p| p.local_path.clone()).collect();
        paths.sort();
        paths.dedup();
        assert_eq!(paths.len(), registry.len());
    }
}
