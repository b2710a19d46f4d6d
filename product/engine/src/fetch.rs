use crate::config::ScraperConfig;
use crate::TransportError;
use std::io::Read;
use std::time::Duration;

/// HTTP access used by the extractors and the downloader.
///
/// Every method checks the response status before touching the body; any
/// non-2xx status is a [`TransportError::Status`].
pub trait Fetcher {
    fn get_text(&self, url: &str, timeout: Duration) -> Result<String, TransportError>;

    /// HEAD request; `Ok(None)` when the server sends no usable length.
    fn probe_length(&self, url: &str, timeout: Duration) -> Result<Option<u64>, TransportError>;

    /// Streaming GET.
    fn open(&self, url: &str, timeout: Duration) -> Result<Box<dyn Read + Send>, TransportError>;
}

#[derive(Debug, Clone)]
pub struct HttpFetcher {
    agent: ureq::Agent,
}

impl HttpFetcher {
    pub fn new(user_agent: &str) -> Self {
        let mut config = ureq::Agent::config_builder();
        config = config.http_status_as_error(false).user_agent(user_agent);
        let agent: ureq::Agent = config.build().into();
        Self { agent }
    }

    pub fn from_config(config: &ScraperConfig) -> Self {
        Self::new(&config.user_agent)
    }

    fn call(
        &self,
        request: ureq::RequestBuilder<ureq::typestate::WithoutBody>,
        url: &str,
        timeout: Duration,
    ) -> Result<ureq::http::Response<ureq::Body>, TransportError> {
        let response = request
            .config()
            .timeout_global(Some(timeout))
            .build()
            .call()
            .map_err(|err| TransportError::Request {
                url: url.to_string(),
                message: err.to_string(),
            })?;
        ensure_success(url, response.status().as_u16())?;
        Ok(response)
    }
}

impl Fetcher for HttpFetcher {
    fn get_text(&self, url: &str, timeout: Duration) -> Result<String, TransportError> {
        let mut response = self.call(self.agent.get(url), url, timeout)?;
        let mut buf = Vec::new();
        response
            .body_mut()
            .as_reader()
            .read_to_end(&mut buf)
            .map_err(|err| TransportError::Body {
                url: url.to_string(),
                message: err.to_string(),
            })?;
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }

    fn probe_length(&self, url: &str, timeout: Duration) -> Result<Option<u64>, TransportError> {
        let response = self.call(self.agent.head(url), url, timeout)?;
        Ok(response
            .headers()
            .get("content-length")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok()))
    }

    fn open(&self, url: &str, timeout: Duration) -> Result<Box<dyn Read + Send>, TransportError> {
        let response = self.call(self.agent.get(url), url, timeout)?;
        Ok(Box::new(response.into_body().into_reader()))
    }
}

fn ensure_success(url: &str, status: u16) -> Result<(), TransportError> {
    if (200..300).contains(&status) {
        Ok(())
    } else {
        Err(TransportError::Status {
            url: url.to_string(),
            status,
        })
    }
}
