//! Sequential paginated fetcher for the standings API.
//!
//! Requests `{endpoint}?page=N` one page at a time until a page comes back
//! without rows, the API answers with a non-success status, or the transport
//! fails. Terminal fetch failures end the sequence; they are reported through
//! [`StopReason`] instead of being raised.

use std::time::Duration;

use reqwest::Client;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};
use url::Url;

use classement_shared::{ClassementError, FetchConfig, Result};

/// Maximum number of redirects followed per page request.
const MAX_REDIRECTS: usize = 5;

// ---------------------------------------------------------------------------
// Page / outcome types
// ---------------------------------------------------------------------------

/// One successfully fetched, non-empty page.
#[derive(Debug, Clone)]
pub struct Page {
    /// Page number as sent in the `page` query parameter.
    pub number: u32,
    /// Full request URL.
    pub url: Url,
    /// Raw member rows.
    pub rows: Vec<Value>,
}

/// Why a page sequence ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// The page came back with an absent or empty member list.
    Exhausted { page: u32 },
    /// The API answered with a non-success status.
    Upstream { page: u32, url: String, status: u16 },
    /// Network, TLS, timeout, or body decoding failure.
    Transport { page: u32, message: String },
    /// The configured page cap was reached.
    PageLimit { page: u32 },
}

impl StopReason {
    /// Page number at which the sequence stopped.
    pub fn page(&self) -> u32 {
        match self {
            Self::Exhausted { page }
            | Self::Upstream { page, .. }
            | Self::Transport { page, .. }
            | Self::PageLimit { page } => *page,
        }
    }

    /// `true` for upstream and transport failures.
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Upstream { .. } | Self::Transport { .. })
    }

    /// The error this stop corresponds to, if it was a failure.
    pub fn to_error(&self) -> Option<ClassementError> {
        match self {
            Self::Upstream { url, status, .. } => Some(ClassementError::Upstream {
                url: url.clone(),
                status: *status,
            }),
            Self::Transport { message, .. } => Some(ClassementError::Transport(message.clone())),
            Self::Exhausted { .. } | Self::PageLimit { .. } => None,
        }
    }
}

/// Concatenated result of a full pagination run.
#[derive(Debug, Clone)]
pub struct FetchOutcome {
    /// All rows from every non-empty page, in page order.
    pub rows: Vec<Value>,
    /// Number of non-empty pages fetched.
    pub pages_fetched: u32,
    /// Why pagination ended.
    pub stop: StopReason,
}

// ---------------------------------------------------------------------------
// PageFetcher
// ---------------------------------------------------------------------------

/// HTTP client wrapper issuing paged requests.
pub struct PageFetcher {
    config: FetchConfig,
    client: Client,
}

impl PageFetcher {
    /// Build a fetcher. Logs loudly when certificate validation is disabled.
    pub fn new(config: FetchConfig) -> Result<Self> {
        let mut builder = Client::builder()
            .user_agent(config.user_agent.as_str())
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .timeout(Duration::from_secs(config.timeout_secs));

        if config.insecure_tls {
            warn!(
                "TLS certificate validation is DISABLED for this run (insecure_tls = true); \
                 responses can be intercepted or forged"
            );
            builder = builder.danger_accept_invalid_certs(true);
        }

        let client = builder
            .build()
            .map_err(|e| ClassementError::Transport(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { config, client })
    }

    /// Configuration this fetcher was built with.
    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    /// Lazy page sequence starting at `start_page`.
    pub fn pages(&self, base: &Url, start_page: u32) -> PageCursor<'_> {
        PageCursor {
            fetcher: self,
            base: base.clone(),
            next: start_page,
            pages_fetched: 0,
            stop: None,
        }
    }

    /// Fetch every page and concatenate the rows.
    ///
    /// Never fails: a terminal fetch failure returns the rows gathered so far.
    pub async fn fetch_all(&self, base: &Url, start_page: u32) -> FetchOutcome {
        self.fetch_all_with(base, start_page, |_| {}).await
    }

    /// [`fetch_all`](Self::fetch_all), calling `on_page` after each page.
    #[instrument(skip_all, fields(base = %base, start_page = start_page))]
    pub async fn fetch_all_with(
        &self,
        base: &Url,
        start_page: u32,
        mut on_page: impl FnMut(&Page),
    ) -> FetchOutcome {
        let mut cursor = self.pages(base, start_page);
        let mut rows = Vec::new();

        while let Some(page) = cursor.next_page().await {
            on_page(&page);
            rows.extend(page.rows);
        }

        let stop = cursor
            .stop
            .take()
            .unwrap_or(StopReason::Exhausted { page: cursor.next });

        info!(
            rows = rows.len(),
            pages = cursor.pages_fetched,
            stopped_at = stop.page(),
            failed = stop.is_failure(),
            "pagination finished"
        );

        FetchOutcome {
            rows,
            pages_fetched: cursor.pages_fetched,
            stop,
        }
    }
}

// ---------------------------------------------------------------------------
// PageCursor
// ---------------------------------------------------------------------------

/// Finite, lazily evaluated sequence of pages.
pub struct PageCursor<'a> {
    fetcher: &'a PageFetcher,
    base: Url,
    next: u32,
    pages_fetched: u32,
    stop: Option<StopReason>,
}

impl PageCursor<'_> {
    /// Fetch the next page, or `None` once the sequence has ended.
    pub async fn next_page(&mut self) -> Option<Page> {
        if self.stop.is_some() {
            return None;
        }

        let number = self.next;
        if self.pages_fetched >= self.fetcher.config.max_pages {
            warn!(page = number, max_pages = self.fetcher.config.max_pages, "page limit reached");
            self.stop = Some(StopReason::PageLimit { page: number });
            return None;
        }

        let url = page_url(&self.base, number);
        match fetch_page(&self.fetcher.client, &url, &self.fetcher.config.member_key).await {
            Ok(rows) if rows.is_empty() => {
                debug!(page = number, "empty page, stopping");
                self.stop = Some(StopReason::Exhausted { page: number });
                None
            }
            Ok(rows) => {
                debug!(page = number, rows = rows.len(), "page fetched");
                self.pages_fetched += 1;
                match number.checked_add(1) {
                    Some(next) => self.next = next,
                    None => {
                        warn!(page = number, "page counter exhausted, stopping pagination");
                        self.stop = Some(StopReason::PageLimit { page: number });
                    }
                }
                Some(Page { number, url, rows })
            }
            Err(ClassementError::Upstream { url, status }) => {
                warn!(page = number, status, "upstream error, stopping pagination");
                self.stop = Some(StopReason::Upstream {
                    page: number,
                    url,
                    status,
                });
                None
            }
            Err(e) => {
                warn!(page = number, error = %e, "transport error, stopping pagination");
                self.stop = Some(StopReason::Transport {
                    page: number,
                    message: e.to_string(),
                });
                None
            }
        }
    }

    /// Number of non-empty pages yielded so far.
    pub fn pages_fetched(&self) -> u32 {
        self.pages_fetched
    }

    /// Why the sequence ended, once it has.
    pub fn stop_reason(&self) -> Option<&StopReason> {
        self.stop.as_ref()
    }
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

/// Build `{base}?page=N`, keeping every other query pair of `base`.
pub fn page_url(base: &Url, page: u32) -> Url {
    let kept: Vec<(String, String)> = base
        .query_pairs()
        .filter(|(k, _)| k != "page")
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    let mut url = base.clone();
    url.set_query(None);
    {
        let mut pairs = url.query_pairs_mut();
        for (k, v) in &kept {
            pairs.append_pair(k, v);
        }
        pairs.append_pair("page", &page.to_string());
    }
    url
}

/// Pull the member list out of a page body.
///
/// A top-level array is the member list itself. Anything else yields no rows.
pub fn extract_members(body: Value, member_key: &str) -> Vec<Value> {
    match body {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove(member_key) {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        },
        _ => Vec::new(),
    }
}

/// Fetch a single page and return its member rows.
async fn fetch_page(client: &Client, url: &Url, member_key: &str) -> Result<Vec<Value>> {
    debug!(%url, "fetching page");

    let response = client
        .get(url.as_str())
        .send()
        .await
        .map_err(|e| ClassementError::Transport(format!("{url}: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        return Err(ClassementError::Upstream {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    let body: Value = response
        .json()
        .await
        .map_err(|e| ClassementError::Transport(format!("{url}: body decode failed: {e}")))?;

    Ok(extract_members(body, member_key))
}
