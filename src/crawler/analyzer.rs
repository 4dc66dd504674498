//! *HtmlAnalyzer*: the black-box `extract(bytes) → (text, title, meta, outlinks)`
//! the core consumes, implemented concretely with `scraper`.
//!
//! Link extraction rules:
//!
//! **Include:** `<a href="...">`, `<link rel="canonical" href="...">`.
//! **Exclude:** `javascript:`/`mailto:`/`tel:`/`data:` schemes, fragment-only
//! links, links carrying a `download` attribute. `rel="nofollow"` links ARE
//! followed — robots negotiation is out of scope for this crate.

use scraper::{Html, Selector};
use std::collections::HashMap;
use url::Url;

/// The output of analyzing one fetched page.
#[derive(Debug, Clone)]
pub struct AnalyzedPage {
    /// Visible text: the concatenation of text nodes outside `<script>`/`<style>`.
    pub text: String,
    pub title: Option<String>,
    pub meta: HashMap<String, String>,
    pub outlinks: Vec<String>,
}

/// Parses raw HTML bytes relative to `base_url` into an `AnalyzedPage`.
///
/// Invalid UTF-8 is lossily replaced rather than treated as a parse failure;
/// `scraper` itself does not reject malformed markup, so the only genuine
/// parse-failure path is an unparseable `base_url`, which callers control.
pub fn analyze_html(bytes: &[u8], base_url: &Url) -> AnalyzedPage {
    let html = String::from_utf8_lossy(bytes);
    let document = Html::parse_document(&html);

    AnalyzedPage {
        text: extract_text(&document),
        title: extract_title(&document),
        meta: extract_meta(&document),
        outlinks: extract_outlinks(&document, base_url),
    }
}

fn extract_title(document: &Html) -> Option<String> {
    let selector = Selector::parse("title").ok()?;
    document
        .select(&selector)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Visible text: every text node except inside `<script>`/`<style>`, joined
/// with single spaces. Whitespace collapse is left to the Normalizer.
fn extract_text(document: &Html) -> String {
    let skip = Selector::parse("script, style").unwrap();
    let skip_ids: std::collections::HashSet<_> = document
        .select(&skip)
        .flat_map(|el| el.descendants().map(|n| n.id()))
        .collect();

    let mut out = String::new();
    for node in document.tree.root().descendants() {
        if skip_ids.contains(&node.id()) {
            continue;
        }
        if let Some(text) = node.value().as_text() {
            if !out.is_empty() {
                out.push(' ');
            }
            out.push_str(text);
        }
    }
    out
}

fn extract_meta(document: &Html) -> HashMap<String, String> {
    let mut meta = HashMap::new();
    let Ok(selector) = Selector::parse("meta[name][content]") else {
        return meta;
    };
    for el in document.select(&selector) {
        if let (Some(name), Some(content)) = (el.value().attr("name"), el.value().attr("content"))
        {
            meta.insert(name.to_string(), content.to_string());
        }
    }
    meta
}

fn extract_outlinks(document: &Html, base_url: &Url) -> Vec<String> {
    let mut links = Vec::new();

    if let Ok(selector) = Selector::parse("a[href]") {
        for el in document.select(&selector) {
            if el.value().attr("download").is_some() {
                continue;
            }
            if let Some(href) = el.value().attr("href") {
                if let Some(absolute) = resolve_link(href, base_url) {
                    links.push(absolute);
                }
            }
        }
    }

    if let Ok(selector) = Selector::parse("link[rel='canonical'][href]") {
        for el in document.select(&selector) {
            if let Some(href) = el.value().attr("href") {
                if let Some(absolute) = resolve_link(href, base_url) {
                    links.push(absolute);
                }
            }
        }
    }

    links
}

fn resolve_link(href: &str, base_url: &Url) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') {
        return None;
    }
    if href.starts_with("javascript:")
        || href.starts_with("mailto:")
        || href.starts_with("tel:")
        || href.starts_with("data:")
    {
        return None;
    }

    let absolute = base_url.join(href).ok()?;
    if absolute.scheme() == "http" || absolute.scheme() == "https" {
        Some(absolute.to_string())
    } else {
        None
    }
}
