//! Site-specific extraction: chase an article's photo-page links and read the
//! high-resolution image each photo page advertises in its metadata.

use crate::config::ScraperConfig;
use crate::fetch::Fetcher;
use crate::log::EventLog;
use crate::throttle::Throttle;
use crate::urls::normalize_url_with_base;
use crate::ExtractError;
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteRule {
    pub name: String,
    /// Substring of the submitted URL that selects this rule.
    pub url_pattern: String,
    /// Anchor selectors on the article page.
    pub link_selectors: Vec<String>,
    /// Substring an anchor `href` must contain to count as a photo page.
    pub link_marker: String,
    pub meta_selector: String,
    pub high_res_marker: String,
}

impl SiteRule {
    pub fn oricon_news() -> Self {
        Self {
            name: "oricon_news".to_string(),
            url_pattern: "oricon.co.jp/news/".to_string(),
            link_selectors: vec![
                "div.inner-photo a".to_string(),
                "section.block-photo-preview a".to_string(),
            ],
            link_marker: "photo".to_string(),
            meta_selector: r#"meta[property="og:image"]"#.to_string(),
            high_res_marker: "_p_o_".to_string(),
        }
    }

    pub fn matches(&self, url: &str) -> bool {
        !self.url_pattern.is_empty() && url.contains(&self.url_pattern)
    }

    fn compile_link_selector(&self) -> Result<Selector, ExtractError> {
        parse_selector(&self.link_selectors.join(", "))
    }

    fn compile_meta_selector(&self) -> Result<Selector, ExtractError> {
        parse_selector(&self.meta_selector)
    }
}

fn parse_selector(raw: &str) -> Result<Selector, ExtractError> {
    Selector::parse(raw).map_err(|e| ExtractError::Parse(format!("invalid selector {raw:?}: {e:?}")))
}

/// Runs the two-stage extraction for `article_url`.
///
/// An article fetch failure is returned as an error. Failures on individual
/// photo pages only drop that page. References come back in photo-page
/// order, repeats included. The result may be empty.
pub fn extract_site_images(
    fetcher: &dyn Fetcher,
    rule: &SiteRule,
    article_url: &str,
    config: &ScraperConfig,
    throttle: &Throttle,
    log: &EventLog,
) -> Result<Vec<String>, ExtractError> {
    let link_selector = rule.compile_link_selector()?;
    let meta_selector = rule.compile_meta_selector()?;
    let base_url = Url::parse(article_url)
        .map_err(|e| ExtractError::Parse(format!("invalid article url {article_url:?}: {e}")))?;

    let html = {
        let _slot = throttle.wait();
        fetcher.get_text(article_url, config.page_timeout())?
    };
    let photo_pages = collect_photo_page_links(&html, &base_url, &link_selector, &rule.link_marker);
    log.info(
        "site_photo_pages_found",
        serde_json::json!({ "rule": rule.name, "count": photo_pages.len() }),
    );

    let mut out: Vec<String> = Vec::new();
    for page_url in photo_pages {
        let fetched = {
            let _slot = throttle.wait();
            fetcher.get_text(&page_url, config.photo_page_timeout())
        };
        let page_html = match fetched {
            Ok(html) => html,
            Err(err) => {
                log.warn(
                    "site_photo_page_fetch_failed",
                    serde_json::json!({ "url": page_url, "error": err.to_string() }),
                );
                continue;
            }
        };

        match high_res_reference(&page_html, &page_url, &meta_selector, &rule.high_res_marker) {
            Some(image_url) => out.push(image_url),
            None => log.info(
                "site_photo_page_no_high_res",
                serde_json::json!({ "url": page_url }),
            ),
        }
    }

    Ok(out)
}

/// Photo-page links in lexicographic order, deduplicated.
fn collect_photo_page_links(
    html: &str,
    base_url: &Url,
    selector: &Selector,
    marker: &str,
) -> BTreeSet<String> {
    let document = Html::parse_document(html);
    document
        .select(selector)
        .filter_map(|a| a.value().attr("href"))
        .filter(|href| href.contains(marker))
        .filter_map(|href| normalize_url_with_base(href, base_url))
        .collect()
}

fn high_res_reference(
    html: &str,
    page_url: &str,
    selector: &Selector,
    marker: &str,
) -> Option<String> {
    let document = Html::parse_document(html);
    let content = document.select(selector).next()?.value().attr("content")?;
    let resolved = match Url::parse(page_url) {
        Ok(base) => normalize_url_with_base(content, &base)?,
        Err(_) => content.trim().to_string(),
    };
    resolved.contains(marker).then_some(resolved)
}
