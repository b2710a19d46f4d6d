use crate::fetch::Fetcher;
use crate::log::EventLog;
use std::cmp::Reverse;
use std::time::Duration;

/// Orders generic candidates so the likeliest full-size images come first.
pub trait ImageRanker {
    fn rank(&self, fetcher: &dyn Fetcher, candidates: Vec<String>, log: &EventLog) -> Vec<String>;
}

/// Ranks by `Content-Length` from a HEAD probe, largest first. Candidates
/// whose probe fails count as zero bytes and keep their relative order.
#[derive(Debug, Clone)]
pub struct ContentLengthRanker {
    pub probe_timeout: Duration,
}

impl ContentLengthRanker {
    pub fn new(probe_timeout: Duration) -> Self {
        Self { probe_timeout }
    }
}

impl ImageRanker for ContentLengthRanker {
    fn rank(&self, fetcher: &dyn Fetcher, candidates: Vec<String>, log: &EventLog) -> Vec<String> {
        let mut sized: Vec<(u64, String)> = candidates
            .into_iter()
            .map(|url| {
                let size = match fetcher.probe_length(&url, self.probe_timeout) {
                    Ok(len) => len.unwrap_or(0),
                    Err(err) => {
                        log.warn(
                            "generic_probe_failed",
                            serde_json::json!({ "url": url, "error": err.to_string() }),
                        );
                        0
                    }
                };
                (size, url)
            })
            .collect();
        sized.sort_by_key(|(size, _)| Reverse(*size));
        sized.into_iter().map(|(_, url)| url).collect()
    }
}

/// Leaves candidates in document order.
#[derive(Debug, Clone, Copy, Default)]
pub struct DocumentOrderRanker;

impl ImageRanker for DocumentOrderRanker {
    fn rank(&self, _fetcher: &dyn Fetcher, candidates: Vec<String>, _log: &EventLog) -> Vec<String> {
        candidates
    }
}
