use lol_html::errors::RewritingError;
use lol_html::{element, HtmlRewriter, Settings};
use url::Url;

use crate::registry::{AssetRegistry, PageRegistry};
use crate::scope::{canonicalize, Scope};

/// Resolves raw attribute values against the frozen post-crawl registries.
/// Only URLs that landed in a registry and were actually downloaded are
/// replaced; everything else keeps its original text (external URLs are
/// re-emitted in resolved absolute form).
pub struct UrlMapper<'a> {
    scope: &'a Scope,
    pages: &'a PageRegistry,
    assets: &'a AssetRegistry,
}

impl<'a> UrlMapper<'a> {
    pub fn new(scope: &'a Scope, pages: &'a PageRegistry, assets: &'a AssetRegistry) -> Self {
        Self {
            scope,
            pages,
            assets,
        }
    }

    /// Maps one URL-valued attribute. Emitted local paths are relative to
    /// the project root and use forward slashes.
    pub fn transform_url(&self, raw: &str, base: &Url) -> String {
        if raw.is_empty()
            || raw.starts_with('#')
            || raw.starts_with("data:")
            || raw.starts_with("javascript:")
            || raw.starts_with("mailto:")
        {
            return raw.to_string();
        }

        let Ok(resolved) = base.join(raw) else {
            return raw.to_string();
        };
        if resolved.scheme() != "http" && resolved.scheme() != "https" {
            return raw.to_string();
        }
        if !self.scope.same_host(&resolved) {
            // External targets survive as absolute URLs.
            return resolved.to_string();
        }

        let canonical = canonicalize(&resolved);
        if let Some(page) = self.pages.get(&canonical) {
            if page.downloaded {
                return page.local_path.clone();
            }
        }
        if let Some(asset) = self.assets.get(&canonical) {
            if asset.downloaded {
                if let Some(local_path) = &asset.local_path {
                    return local_path.clone();
                }
            }
        }

        raw.to_string()
    }

    /// Maps a `srcset` value: each comma-part is `URL [descriptor…]`; the URL
    /// token is rewritten, descriptors are kept verbatim.
    pub fn transform_srcset(&self, srcset: &str, base: &Url) -> String {
        let mut parts = Vec::new();
        for part in srcset.split(',') {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            let mut tokens = part.split_whitespace();
            let Some(url_token) = tokens.next() else {
                continue;
            };
            let descriptor: Vec<&str> = tokens.collect();
            let rewritten = self.transform_url(url_token, base);
            if descriptor.is_empty() {
                parts.push(rewritten);
            } else {
                parts.push(format!("{} {}", rewritten, descriptor.join(" ")));
            }
        }
        parts.join(", ")
    }

    /// Maps `url(...)` occurrences inside an inline `style` attribute. The
    /// inner URL is unquoted, rewritten and re-emitted double-quoted; the
    /// rest of the declaration text is preserved.
    pub fn transform_style(&self, style: &str, base: &Url) -> String {
        let mut out = String::with_capacity(style.len());
        let mut rest = style;

        while let Some(pos) = rest.find("url(") {
            out.push_str(&rest[..pos + 4]);
            rest = &rest[pos + 4..];
            let Some(close) = rest.find(')') else {
                break;
            };
            let inner = rest[..close].trim().trim_matches(|c| c == '"' || c == '\'');
            let rewritten = self.transform_url(inner, base);
            out.push('"');
            out.push_str(&rewritten);
            out.push('"');
            out.push(')');
            rest = &rest[close + 1..];
        }

        out.push_str(rest);
        out
    }
}

/// Rewrites `href`, `src`, `data-src`, `srcset` and `style` attributes of a
/// stored page in place and serializes the document back out. Everything the
/// rewriter does not touch (doctype, encoding declaration, untargeted
/// markup) passes through byte-for-byte.
pub fn rewrite_html(
    html: &str,
    page_url: &Url,
    mapper: &UrlMapper,
) -> Result<Vec<u8>, RewritingError> {
    let mut output = Vec::with_capacity(html.len());

    let mut rewriter = HtmlRewriter::new(
        Settings {
            element_content_handlers: vec![
                element!("[href]", |el| {
                    if let Some(href) = el.get_attribute("href") {
                        let rewritten = mapper.transform_url(&href, page_url);
                        if rewritten != href {
                            el.set_attribute("href", &rewritten)?;
                        }
                    }
                    Ok(())
                }),
                element!("[src]", |el| {
                    if let Some(src) = el.get_attribute("src") {
                        let rewritten = mapper.transform_url(&src, page_url);
                        if rewritten != src {
                            el.set_attribute("src", &rewritten)?;
                        }
                    }
                    Ok(())
                }),
                element!("[data-src]", |el| {
                    if let Some(data_src) = el.get_attribute("data-src") {
                        let rewritten = mapper.transform_url(&data_src, page_url);
                        if rewritten != data_src {
                            el.set_attribute("data-src", &rewritten)?;
                        }
                    }
                    Ok(())
                }),
                element!("[srcset]", |el| {
                    if let Some(srcset) = el.get_attribute("srcset") {
                        let rewritten = mapper.transform_srcset(&srcset, page_url);
                        if rewritten != srcset {
                            el.set_attribute("srcset", &rewritten)?;
                        }
                    }
                    Ok(())
                }),
                element!("[style]", |el| {
                    if let Some(style) = el.get_attribute("style") {
                        if style.contains("url(") {
                            let rewritten = mapper.transform_style(&style, page_url);
                            if rewritten != style {
                                el.set_attribute("style", &rewritten)?;
                            }
                        }
                    }
                    Ok(())
                }),
            ],
            ..Settings::default()
        },
        |chunk: &[u8]| output.extend_from_slice(chunk),
    );

    rewriter.write(html.as_bytes())?;
    rewriter.end()?;

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AssetKind;
    use crate::registry::asset_local_path;

    fn fixtures() -> (Scope, PageRegistry, AssetRegistry) {
        let scope = Scope::new("http://example.com/", "").unwrap();

        let mut pages = PageRegistry::new(scope.seed_canonical());
        pages.register("http://example.com", 0, None);
        pages.register("http://example.com/about", 1, Some("http://example.com"));
        for page in pages.iter_mut() {
            page.downloaded = true;
        }

        let mut assets = AssetRegistry::new();
        for (url, kind, ext) in [
            ("http://example.com/s.css", AssetKind::Css, ".css"),
            ("http://example.com/a.png", AssetKind::Img, ".png"),
            ("http://example.com/b.png", AssetKind::Img, ".png"),
        ] {
            assets.register(url, kind);
            let asset = assets.get_mut(url).unwrap();
            asset.local_path = Some(asset_local_path(url, kind, ext));
            asset.downloaded = true;
        }
        // Registered but never downloaded: must not be rewritten.
        assets.register("http://example.com/missing.js", AssetKind::Js);

        (scope, pages, assets)
    }

    fn rewrite(html: &str) -> String {
        let (scope, pages, assets) = fixtures();
        let mapper = UrlMapper::new(&scope, &pages, &assets);
        let base = Url::parse("http://example.com/").unwrap();
        String::from_utf8(rewrite_html(html, &base, &mapper).unwrap()).unwrap()
    }

    #[test]
    fn test_rewrites_registered_page_and_asset() {
        let html = r#"<a href="/about">about</a><link rel="stylesheet" href="/s.css">"#;
        let out = rewrite(html);
        let about_path = {
            let (_, pages, _) = fixtures();
            pages.get("http://example.com/about").unwrap().local_path.clone()
        };
        assert!(out.contains(&format!("href=\"{}\"", about_path)));
        assert!(out.contains("assets/css/"));
    }

    #[test]
    fn test_external_url_becomes_absolute_and_survives() {
        let out = rewrite(r#"<a href="http://other.com/x">x</a>"#);
        assert!(out.contains("href=\"http://other.com/x\""));
    }

    #[test]
    fn test_unregistered_in_scope_url_is_untouched() {
        let out = rewrite(r#"<a href="/not-crawled">x</a>"#);
        assert!(out.contains("href=\"/not-crawled\""));
    }

    #[test]
    fn test_undownloaded_asset_is_untouched() {
        let out = rewrite(r#"<script src="/missing.js"></script>"#);
        assert!(out.contains("src=\"/missing.js\""));
    }

    #[test]
    fn test_skip_prefixes_are_preserved() {
        let html = concat!(
            r##"<a href="#top">top</a>"##,
            r#"<a href="mailto:a@b.c">m</a>"#,
            r#"<a href="javascript:void(0)">j</a>"#,
            r#"<img src="data:image/png;base64,AAAA">"#,
        );
        let out = rewrite(html);
        assert!(out.contains("href=\"#top\""));
        assert!(out.contains("href=\"mailto:a@b.c\""));
        assert!(out.contains("href=\"javascript:void(0)\""));
        assert!(out.contains("src=\"data:image/png;base64,AAAA\""));
    }

    #[test]
    fn test_srcset_rewrites_urls_and_keeps_descriptors() {
        let (scope, pages, assets) = fixtures();
        let mapper = UrlMapper::new(&scope, &pages, &assets);
        let base = Url::parse("http://example.com/").unwrap();

        let rewritten =
            mapper.transform_srcset("http://example.com/a.png 1x, http://example.com/b.png 2x", &base);
        let a = assets.get("http://example.com/a.png").unwrap();
        let b = assets.get("http://example.com/b.png").unwrap();
        assert_eq!(
            rewritten,
            format!(
                "{} 1x, {} 2x",
                a.local_path.as_deref().unwrap(),
                b.local_path.as_deref().unwrap()
            )
        );
    }

    #[test]
    fn test_srcset_single_entry_without_descriptor() {
        let (scope, pages, assets) = fixtures();
        let mapper = UrlMapper::new(&scope, &pages, &assets);
        let base = Url::parse("http://example.com/").unwrap();

        let rewritten = mapper.transform_srcset("http://example.com/a.png", &base);
        assert_eq!(
            rewritten,
            assets
                .get("http://example.com/a.png")
                .unwrap()
                .local_path
                .as_deref()
                .unwrap()
        );
    }

    #[test]
    fn test_style_url_is_unquoted_rewritten_and_requoted() {
        let (scope, pages, assets) = fixtures();
        let mapper = UrlMapper::new(&scope, &pages, &assets);
        let base = Url::parse("http://example.com/").unwrap();

        let a_path = assets
            .get("http://example.com/a.png")
            .unwrap()
            .local_path
            .clone()
            .unwrap();
        for input in [
            "background-image: url(/a.png)",
            "background-image: url('/a.png')",
            "background-image: url(\"/a.png\")",
        ] {
            let rewritten = mapper.transform_style(input, &base);
            assert_eq!(rewritten, format!("background-image: url(\"{}\")", a_path));
        }
    }

    #[test]
    fn test_style_without_url_passes_through() {
        let (scope, pages, assets) = fixtures();
        let mapper = UrlMapper::new(&scope, &pages, &assets);
        let base = Url::parse("http://example.com/").unwrap();
        assert_eq!(
            mapper.transform_style("color: red; margin: 0", &base),
            "color: red; margin: 0"
        );
    }

    #[test]
    fn test_doctype_and_untouched_markup_pass_through() {
        let html = "<!DOCTYPE html><html><head><meta charset=\"utf-8\"></head><body><p>hi</p></body></html>";
        assert_eq!(rewrite(html), html);
    }

    #[test]
    fn test_data_src_is_rewritten() {
        let out = rewrite(r#"<img data-src="/a.png" src="/a.png">"#);
        let (_, _, assets) = fixtures();
        let a_path = assets
            .get("http://example.com/a.png")
            .unwrap()
            .local_path
            .clone()
            .unwrap();
        assert!(out.contains(&format!("data-src=\"{}\"", a_path)));
        assert!(out.contains(&format!("src=\"{}\"", a_path)));
    }
}
