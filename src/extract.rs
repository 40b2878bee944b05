use select::document::Document;
use select::predicate::{And, Attr, Name, Predicate};
use url::Url;

use crate::models::AssetKind;

/// References pulled out of one fetched page: outbound links for the
/// scheduler and asset references for the asset registry. All URLs are
/// absolute, resolved against the page's canonical URL.
#[derive(Debug, Default, Clone)]
pub struct ExtractedRefs {
    pub links: Vec<String>,
    pub assets: Vec<(String, AssetKind)>,
}

/// Parses an HTML document and extracts crawlable links and asset
/// references. Values that are not plain http(s) URLs (anchors, `data:`,
/// `mailto:`, `javascript:`) are dropped here.
pub fn extract_refs(html: &str, base: &Url) -> ExtractedRefs {
    let document = Document::from(html);
    let mut refs = ExtractedRefs::default();

    for anchor in document.find(Name("a")) {
        if let Some(href) = anchor.attr("href") {
            if let Some(absolute) = resolve(base, href) {
                refs.links.push(absolute);
            }
        }
    }

    for img in document.find(Name("img")) {
        if let Some(src) = img.attr("src") {
            if let Some(absolute) = resolve(base, src) {
                refs.assets.push((absolute, AssetKind::Img));
            }
        }
        // Lazy-loaded and responsive variants reference images too.
        if let Some(data_src) = img.attr("data-src") {
            if let Some(absolute) = resolve(base, data_src) {
                refs.assets.push((absolute, AssetKind::Img));
            }
        }
        if let Some(srcset) = img.attr("srcset") {
            for part in srcset.split(',') {
                if let Some(url_token) = part.split_whitespace().next() {
                    if let Some(absolute) = resolve(base, url_token) {
                        refs.assets.push((absolute, AssetKind::Img));
                    }
                }
            }
        }
    }

    for link in document.find(And(Name("link"), Attr("rel", "stylesheet"))) {
        if let Some(href) = link.attr("href") {
            if let Some(absolute) = resolve(base, href) {
                refs.assets.push((absolute, AssetKind::Css));
            }
        }
    }

    for script in document.find(Name("script")) {
        if let Some(src) = script.attr("src") {
            if let Some(absolute) = resolve(base, src) {
                refs.assets.push((absolute, AssetKind::Js));
            }
        }
    }

    // Preloaded fonts are the only font references visible in markup.
    for link in document.find(And(Name("link"), Attr("rel", "preload").and(Attr("as", "font")))) {
        if let Some(href) = link.attr("href") {
            if let Some(absolute) = resolve(base, href) {
                refs.assets.push((absolute, AssetKind::Font));
            }
        }
    }

    refs
}

/// Resolves a raw attribute value to an absolute http(s) URL string.
fn resolve(base: &Url, raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty()
        || raw.starts_with('#')
        || raw.starts_with("data:")
        || raw.starts_with("javascript:")
        || raw.starts_with("mailto:")
        || raw.starts_with("tel:")
    {
        return None;
    }

    let resolved = base.join(raw).ok()?;
    if resolved.scheme() != "http" && resolved.scheme() != "https" {
        return None;
    }
    Some(resolved.to_string())
}
