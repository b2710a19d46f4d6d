//! One submission in, one result set out.

use crate::config::ScraperConfig;
use crate::download::{download_images, DownloadedImage};
use crate::fetch::Fetcher;
use crate::generic::extract_generic_images;
use crate::log::EventLog;
use crate::rank::ImageRanker;
use crate::site::extract_site_images;
use crate::throttle::Throttle;
use crate::urls::host_of;
use crate::workspace::RequestWorkspace;
use crate::{Result, ScrapeError};
use serde::Serialize;
use std::path::PathBuf;

pub const MISSING_URL_MESSAGE: &str = "Please enter a URL.";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScrapeForm {
    pub url: Option<String>,
}

impl ScrapeForm {
    pub fn with_url(url: &str) -> Self {
        Self {
            url: Some(url.to_string()),
        }
    }

    /// Builds the form from submitted fields; the last `url` field wins.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut form = Self::default();
        for (key, value) in pairs {
            if key.as_ref() == "url" {
                form.url = Some(value.as_ref().to_string());
            }
        }
        form
    }

    /// Parses an `application/x-www-form-urlencoded` body.
    pub fn from_urlencoded(body: &str) -> Self {
        Self::from_pairs(url::form_urlencoded::parse(body.as_bytes()))
    }

    pub fn validated_url(&self) -> Result<String> {
        match self.url.as_deref().map(str::trim) {
            Some(url) if !url.is_empty() => Ok(url.to_string()),
            _ => Err(ScrapeError::Validation(MISSING_URL_MESSAGE.to_string())),
        }
    }
}

/// Where a request's downloads land.
#[derive(Debug, Clone)]
pub enum OutputMode {
    /// Private temporary directory per request, optionally under a parent.
    Scoped { parent: Option<PathBuf> },
    /// One shared directory, cleared at the start of every request.
    Fixed(PathBuf),
}

impl Default for OutputMode {
    fn default() -> Self {
        Self::Scoped { parent: None }
    }
}

impl OutputMode {
    fn open(&self) -> Result<RequestWorkspace> {
        match self {
            Self::Scoped { parent } => RequestWorkspace::scoped(parent.as_deref()),
            Self::Fixed(root) => RequestWorkspace::fixed(root.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Strategy {
    SiteSpecific { rule: String },
    Generic,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScrapeResponse {
    pub request_id: String,
    pub url: String,
    pub strategy: Strategy,
    /// Display paths in download order.
    pub results: Vec<String>,
    pub files: Vec<DownloadedImage>,
}

/// A finished request. Dropping it releases a scoped workspace.
#[derive(Debug)]
pub struct ScrapeOutcome {
    pub response: ScrapeResponse,
    pub workspace: RequestWorkspace,
}

/// Validates `form`, extracts image references and downloads them.
///
/// Extraction never fails the request: the site rule falls back to the
/// generic pass, and a failed generic pass yields no images. Only a missing
/// URL or an output directory that cannot be prepared is returned as `Err`.
pub fn handle_scrape(
    fetcher: &dyn Fetcher,
    ranker: &dyn ImageRanker,
    config: &ScraperConfig,
    output: &OutputMode,
    form: &ScrapeForm,
    log: &EventLog,
) -> Result<ScrapeOutcome> {
    let url = form.validated_url()?;
    let request_id = uuid::Uuid::new_v4().to_string();
    let log = log.for_request(&request_id);
    log.info(
        "request_received",
        serde_json::json!({ "url": url, "host": host_of(&url) }),
    );

    let workspace = output.open()?;
    let (strategy, references) = resolve_references(fetcher, ranker, config, &url, &log);
    log.info(
        "references_resolved",
        serde_json::json!({ "strategy": strategy, "count": references.len() }),
    );

    let throttle = Throttle::new(config.download_delay());
    let files = download_images(
        fetcher,
        &references,
        &workspace.downloads_dir(),
        &workspace.manifest_path(),
        config,
        &throttle,
        &log,
    )
    .inspect_err(|err| {
        log.error(
            "request_failed",
            serde_json::json!({ "error": err.to_string() }),
        )
    })?;
    let results: Vec<String> = files.iter().map(|f| f.display_path.clone()).collect();
    log.info(
        "request_finished",
        serde_json::json!({ "downloaded": results.len(), "attempted": references.len() }),
    );

    Ok(ScrapeOutcome {
        response: ScrapeResponse {
            request_id,
            url,
            strategy,
            results,
            files,
        },
        workspace,
    })
}

/// Site rule first when one matches, generic pass otherwise or on failure.
pub fn resolve_references(
    fetcher: &dyn Fetcher,
    ranker: &dyn ImageRanker,
    config: &ScraperConfig,
    url: &str,
    log: &EventLog,
) -> (Strategy, Vec<String>) {
    if let Some(rule) = config.rule_for(url) {
        log.info("site_rule_matched", serde_json::json!({ "rule": rule.name }));
        let throttle = Throttle::new(config.photo_page_delay());
        match extract_site_images(fetcher, rule, url, config, &throttle, log) {
            Ok(references) if !references.is_empty() => {
                return (
                    Strategy::SiteSpecific {
                        rule: rule.name.clone(),
                    },
                    references,
                );
            }
            Ok(_) => log.info(
                "site_extraction_empty",
                serde_json::json!({ "rule": rule.name }),
            ),
            Err(err) => log.warn(
                "site_extraction_failed",
                serde_json::json!({ "rule": rule.name, "error": err.to_string() }),
            ),
        }
    }

    match extract_generic_images(fetcher, ranker, url, config, log) {
        Ok(references) => (Strategy::Generic, references),
        Err(err) => {
            log.warn(
                "generic_extraction_failed",
                serde_json::json!({ "error": err.to_string() }),
            );
            (Strategy::Generic, Vec::new())
        }
    }
}

/// JSON handed to the presentation layer: the submitted URL and display
/// paths, or an error message.
pub fn presentation_payload(result: &Result<ScrapeOutcome>) -> serde_json::Value {
    match result {
        Ok(outcome) => serde_json::json!({
            "url": outcome.response.url,
            "results": outcome.response.results,
        }),
        Err(err) => serde_json::json!({ "error": err.to_string() }),
    }
}
