use crate::error::{Result, ScanError};
use crate::snapshot::HeaderMap;
use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::{ACCEPT, USER_AGENT};
use std::time::Duration;
use tracing::debug;

const DEFAULT_USER_AGENT: &str = "Snaptrack/0.1 (https://github.com/trapdoorsec/snaptrack)";
const DEFAULT_ACCEPT: &str = "text/html,application/xhtml+xml;q=0.9,*/*;q=0.8";

/// Rendered body of a page plus the transport metadata that came with it
#[derive(Debug, Clone, PartialEq)]
pub struct PageCapture {
    pub body: String,
    pub status_code: u16,
    pub request_headers: HeaderMap,
    pub response_headers: HeaderMap,
}

/// Page-fetch transport used by the crawler and by manual rechecks.
///
/// Implementations never retry. Any status code is a successful fetch as long as the
/// transport itself succeeded; only transport failures and timeouts are errors.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str, timeout: Duration) -> Result<PageCapture>;
}

/// `reqwest`-backed fetcher
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .pool_max_idle_per_host(50)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(60))
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()?;

        Ok(Self { client })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str, timeout: Duration) -> Result<PageCapture> {
        debug!("Fetching {}", url);

        // Headers go on the request itself so they show up in the recorded request headers
        let request = self
            .client
            .get(url)
            .header(USER_AGENT, DEFAULT_USER_AGENT)
            .header(ACCEPT, DEFAULT_ACCEPT)
            .timeout(timeout)
            .build()?;
        let request_headers = collect_headers(request.headers());

        let response = self
            .client
            .execute(request)
            .await
            .map_err(|e| transport_error(url, timeout, e))?;

        let status_code = response.status().as_u16();
        let response_headers = collect_headers(response.headers());
        let body = response
            .text()
            .await
            .map_err(|e| transport_error(url, timeout, e))?;

        Ok(PageCapture {
            body,
            status_code,
            request_headers,
            response_headers,
        })
    }
}

/// Every failure once the request is on the wire is a per-page `FetchError`
fn transport_error(url: &str, timeout: Duration, error: reqwest::Error) -> ScanError {
    if error.is_timeout() {
        ScanError::FetchError(format!("{} timed out after {:?}", url, timeout))
    } else {
        ScanError::FetchError(format!("{}: {}", url, error))
    }
}

fn collect_headers(headers: &reqwest::header::HeaderMap) -> HeaderMap {
    let mut collected = HeaderMap::new();
    for (name, value) in headers {
        collected
            .entry(name.as_str().to_string())
            .or_default()
            .push(String::from_utf8_lossy(value.as_bytes()).into_owned());
    }
    collected
}
