use crate::config::ScraperConfig;
use crate::fetch::Fetcher;
use crate::log::EventLog;
use crate::rank::ImageRanker;
use crate::urls::normalize_url_with_base;
use crate::ExtractError;
use scraper::{Html, Selector};
use url::Url;

/// Lazy-load attribute first, then the plain source.
const IMAGE_ATTRS: &[&str] = &["data-src", "src"];

/// Collects every `<img>` on `page_url`, ranks the candidates and keeps the
/// top `config.max_generic_results`.
pub fn extract_generic_images(
    fetcher: &dyn Fetcher,
    ranker: &dyn ImageRanker,
    page_url: &str,
    config: &ScraperConfig,
    log: &EventLog,
) -> Result<Vec<String>, ExtractError> {
    let base_url = Url::parse(page_url)
        .map_err(|e| ExtractError::Parse(format!("invalid page url {page_url:?}: {e}")))?;
    let html = fetcher.get_text(page_url, config.page_timeout())?;
    let candidates = collect_image_sources(&html, &base_url);
    log.info(
        "generic_candidates_found",
        serde_json::json!({ "count": candidates.len() }),
    );

    let mut ranked = ranker.rank(fetcher, candidates, log);
    ranked.truncate(config.max_generic_results);
    Ok(ranked)
}

/// Absolute image URLs in document order; duplicates are kept.
fn collect_image_sources(html: &str, base_url: &Url) -> Vec<String> {
    let document = Html::parse_document(html);
    let selector = Selector::parse("img").expect("img selector");
    document
        .select(&selector)
        .filter_map(|img| {
            IMAGE_ATTRS
                .iter()
                .filter_map(|attr| img.value().attr(attr))
                .find(|value| !value.trim().is_empty())
        })
        .filter(|src| !src.trim_start().starts_with("data:"))
        .filter_map(|src| normalize_url_with_base(src, base_url))
        .collect()
}
