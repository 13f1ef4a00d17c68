//! Contact-address lookup on a studio's own website.
//!
//! Visits the home page and a handful of usual contact paths on the same
//! host, stopping after a few HTML pages. Collects `mailto:` targets and
//! anything address-shaped in the page text. Every failure is swallowed:
//! enrichment never fails a sweep.

use std::collections::BTreeSet;
use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use scraper::{Html, Selector};
use tracing::{debug, warn};
use url::Url;

use studiofinder_common::EmailCrawlConfig;

use crate::traits::EmailFinder;

/// Paths tried after the site URL itself, in order.
pub const CONTACT_PATHS: &[&str] = &[
    "/contact",
    "/contact-us",
    "/contactus",
    "/about",
    "/about-us",
    "/studio",
    "/info",
];

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b[A-Z0-9._%+-]+@[A-Z0-9.-]+\.[A-Z]{2,}\b").expect("valid regex")
});
static EMAIL_EXACT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^[A-Z0-9._%+-]+@[A-Z0-9.-]+\.[A-Z]{2,}$").expect("valid regex")
});
static LINK_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("valid selector"));

/// Elements whose text is never shown to a visitor.
const HIDDEN_TEXT_PARENTS: &[&str] = &["script", "style", "noscript", "template"];

/// Sorted, unique addresses found in an HTML document.
pub fn extract_emails(html: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let mut found = BTreeSet::new();

    for element in document.select(&LINK_SELECTOR) {
        if let Some(addr) = element.value().attr("href").and_then(mailto_address) {
            found.insert(addr.to_string());
        }
    }

    let text = visible_text(&document);
    for m in EMAIL_RE.find_iter(&text) {
        found.insert(m.as_str().to_string());
    }

    found.into_iter().collect()
}

/// The address of a `mailto:` href, without query or surrounding blanks.
fn mailto_address(href: &str) -> Option<&str> {
    let (scheme, rest) = href.trim().split_once(':')?;
    if !scheme.eq_ignore_ascii_case("mailto") {
        return None;
    }
    let addr = rest.split('?').next().unwrap_or_default().trim();
    EMAIL_EXACT_RE.is_match(addr).then_some(addr)
}

/// Text nodes outside script-like elements, entity-decoded by the parser.
fn visible_text(document: &Html) -> String {
    let mut parts = Vec::new();
    for node in document.root_element().descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node.ancestors().any(|a| {
            a.value()
                .as_element()
                .is_some_and(|e| HIDDEN_TEXT_PARENTS.contains(&e.name()))
        });
        if !hidden {
            parts.push(&**text);
        }
    }
    parts.join(" ")
}

/// The site URL followed by the contact paths on its host. A missing
/// scheme means `https`. `None` when the URL cannot be parsed.
pub fn candidate_urls(website: &str) -> Option<Vec<Url>> {
    let website = website.trim();
    if website.is_empty() {
        return None;
    }
    let site = if website.contains("://") {
        Url::parse(website).ok()?
    } else {
        Url::parse(&format!("https://{website}")).ok()?
    };
    site.host_str()?;

    let mut urls = vec![site.clone()];
    for path in CONTACT_PATHS {
        if let Ok(url) = site.join(path) {
            if url.host_str() == site.host_str() && !urls.contains(&url) {
                urls.push(url);
            }
        }
    }
    Some(urls)
}

pub struct SiteEmailFinder {
    client: reqwest::Client,
    config: EmailCrawlConfig,
}

impl SiteEmailFinder {
    pub fn new(config: &EmailCrawlConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .user_agent(config.user_agent.as_str())
            .build()?;
        Ok(Self {
            client,
            config: config.clone(),
        })
    }

    /// Body of a 200 `text/html` response, else `None`.
    async fn fetch_html(&self, url: &Url) -> Option<String> {
        let resp = match self.client.get(url.clone()).send().await {
            Ok(resp) => resp,
            Err(e) => {
                debug!(url = url.as_str(), error = %e, "Site fetch failed");
                return None;
            }
        };
        if resp.status() != reqwest::StatusCode::OK {
            return None;
        }
        let is_html = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.to_lowercase().contains("text/html"));
        if !is_html {
            return None;
        }
        resp.text().await.ok()
    }
}

#[async_trait]
impl EmailFinder for SiteEmailFinder {
    async fn find_emails(&self, website: &str) -> Vec<String> {
        let Some(urls) = candidate_urls(website) else {
            warn!(website, "Unusable website URL, skipping email lookup");
            return Vec::new();
        };

        let mut found = BTreeSet::new();
        let mut pages = 0;
        for url in &urls {
            if pages >= self.config.max_pages {
                break;
            }
            let Some(html) = self.fetch_html(url).await else {
                continue;
            };
            pages += 1;
            found.extend(extract_emails(&html));
            tokio::time::sleep(self.config.pace).await;
        }
        debug!(website, pages, emails = found.len(), "Email lookup done");
        found.into_iter().collect()
    }
}
