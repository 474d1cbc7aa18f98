//! HTML parsing: same-host links and candidate contact blocks
//!
//! Link extraction keeps the crawl single-site: anchors resolving to a
//! different host than the page they were found on are dropped by design.
//! Block extraction is a cheap precursor filter for the extraction model,
//! not a correctness filter; false negatives are acceptable.

use scraper::{Html, Selector};
use std::collections::HashSet;
use url::Url;

/// Maximum number of candidate text blocks handed to the extraction model
/// per page
const MAX_CONTACT_BLOCKS: usize = 3;

/// Extracted information from one page
#[derive(Debug, Clone)]
pub struct ParsedPage {
    /// Same-host outbound links, deduplicated, in DOM discovery order
    pub links: Vec<Url>,

    /// Up to [`MAX_CONTACT_BLOCKS`] text fragments likely to contain contact
    /// details
    pub contact_blocks: Vec<String>,
}

/// Parses one page's markup
///
/// # Arguments
///
/// * `html` - The raw markup
/// * `base_url` - The page's own URL, used to resolve relative links and as
///   the host anchor for the same-host restriction
pub fn parse_page(html: &str, base_url: &Url) -> ParsedPage {
    let document = Html::parse_document(html);

    ParsedPage {
        links: extract_same_host_links(&document, base_url),
        contact_blocks: extract_contact_blocks(&document),
    }
}

/// Extracts same-host links in the order they appear in the document
fn extract_same_host_links(document: &Html, base_url: &Url) -> Vec<Url> {
    let mut links = Vec::new();
    let mut seen = HashSet::new();

    let anchor_selector =
        Selector::parse("a[href]").expect("static selector is valid");

    for element in document.select(&anchor_selector) {
        let Some(href) = element.value().attr("href") else {
            continue;
        };

        let Ok(resolved) = base_url.join(href.trim()) else {
            continue;
        };

        if resolved.scheme() != "http" && resolved.scheme() != "https" {
            continue;
        }

        // Same-host restriction: compare against the page the link was found
        // on, not the session's start URL. Host and port together, so two
        // services on one machine are distinct hosts.
        if resolved.host_str() != base_url.host_str()
            || resolved.port_or_known_default() != base_url.port_or_known_default()
        {
            continue;
        }

        if seen.insert(resolved.clone()) {
            links.push(resolved);
        }
    }

    links
}

/// Selects text fragments that look like they might hold contact details
fn extract_contact_blocks(document: &Html) -> Vec<String> {
    let block_selector =
        Selector::parse("p, div, li, section").expect("static selector is valid");

    document
        .select(&block_selector)
        .map(|element| collect_text(&element))
        .filter(|text| looks_like_contact_block(text))
        .take(MAX_CONTACT_BLOCKS)
        .collect()
}

fn collect_text(element: &scraper::ElementRef<'_>) -> String {
    element
        .text()
        .map(str::trim)
        .filter(|fragment| !fragment.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn looks_like_contact_block(text: &str) -> bool {
    if text.contains('@') {
        return true;
    }
    let lowered = text.to_lowercase();
    lowered.contains("contact") || lowered.contains("director")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_url() -> Url {
        Url::parse("https://example.test/team").unwrap()
    }

    #[test]
    fn test_relative_links_resolve_against_base() {
        let html = r#"<html><body><a href="/about">About</a></body></html>"#;
        let parsed = parse_page(html, &base_url());
        assert_eq!(parsed.links.len(), 1);
        assert_eq!(parsed.links[0].as_str(), "https://example.test/about");
    }

    #[test]
    fn test_cross_host_links_are_dropped() {
        let html = r#"
            <html><body>
                <a href="https://example.test/kept">Kept</a>
                <a href="https://other.test/dropped">Dropped</a>
            </body></html>
        "#;
        let parsed = parse_page(html, &base_url());
        assert_eq!(parsed.links.len(), 1);
        assert_eq!(parsed.links[0].host_str(), Some("example.test"));
    }

    #[test]
    fn test_same_host_different_port_is_cross_host() {
        let html = r#"
            <html><body>
                <a href="https://example.test:8443/other">Other service</a>
                <a href="https://example.test/same">Same service</a>
            </body></html>
        "#;
        let parsed = parse_page(html, &base_url());
        assert_eq!(parsed.links.len(), 1);
        assert_eq!(parsed.links[0].path(), "/same");
    }

    #[test]
    fn test_non_http_schemes_are_dropped() {
        let html = r#"
            <html><body>
                <a href="mailto:jane@example.test">Mail</a>
                <a href="javascript:void(0)">JS</a>
                <a href="/ok">Ok</a>
            </body></html>
        "#;
        let parsed = parse_page(html, &base_url());
        assert_eq!(parsed.links.len(), 1);
        assert_eq!(parsed.links[0].path(), "/ok");
    }

    #[test]
    fn test_links_keep_dom_order_and_dedupe() {
        let html = r#"
            <html><body>
                <a href="/b">B</a>
                <a href="/a">A</a>
                <a href="/b">B again</a>
                <a href="/c">C</a>
            </body></html>
        "#;
        let parsed = parse_page(html, &base_url());
        let paths: Vec<&str> = parsed.links.iter().map(Url::path).collect();
        assert_eq!(paths, vec!["/b", "/a", "/c"]);
    }

    #[test]
    fn test_blocks_require_contact_markers() {
        let html = r#"
            <html><body>
                <p>Nothing interesting here.</p>
                <p>Reach us at info@example.test today.</p>
                <li>Contact the front office</li>
                <section>Our DIRECTOR of sales</section>
            </body></html>
        "#;
        let parsed = parse_page(html, &base_url());
        assert_eq!(parsed.contact_blocks.len(), 3);
        assert!(parsed.contact_blocks[0].contains("info@example.test"));
        assert!(parsed.contact_blocks[1].contains("Contact"));
        assert!(parsed.contact_blocks[2].contains("DIRECTOR"));
    }

    #[test]
    fn test_blocks_are_capped_at_three() {
        let html = r#"
            <html><body>
                <p>contact 1</p>
                <p>contact 2</p>
                <p>contact 3</p>
                <p>contact 4</p>
            </body></html>
        "#;
        let parsed = parse_page(html, &base_url());
        assert_eq!(parsed.contact_blocks.len(), 3);
    }

    #[test]
    fn test_block_text_is_joined_and_trimmed() {
        let html = r#"
            <html><body>
                <div>
                    <span>Contact</span>
                    <span>our team</span>
                </div>
            </body></html>
        "#;
        let parsed = parse_page(html, &base_url());
        assert_eq!(parsed.contact_blocks[0], "Contact our team");
    }

    #[test]
    fn test_page_without_links_or_blocks() {
        let html = "<html><body><h1>Hello</h1></body></html>";
        let parsed = parse_page(html, &base_url());
        assert!(parsed.links.is_empty());
        assert!(parsed.contact_blocks.is_empty());
    }
}
