//! Page sessions and the HTTP implementation behind them
//!
//! A session is the unit of identity towards a source: one cookie jar and one
//! connection pool. Rotating a session throws both away.
//! - `PageSession`: loads one page and checks for a ready marker
//! - `SessionFactory`: creates fresh sessions for the walk and each worker
//! - `HttpSession` / `HttpSessionFactory`: the `reqwest` implementation

use crate::config::SessionConfig;
use crate::crawler::parser::has_match;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Why a page could not be loaded
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("Timed out loading {url}")]
    Timeout { url: String },

    #[error("HTTP {status} from {url}")]
    Http { url: String, status: u16 },

    #[error("Network error for {url}: {message}")]
    Network { url: String, message: String },

    #[error("Ready marker '{selector}' missing on {url}")]
    MarkerMissing { url: String, selector: String },

    #[error("Unexpected page structure at {url}: {message}")]
    Structure { url: String, message: String },

    #[error("Could not create session: {0}")]
    Session(String),
}

impl FetchError {
    /// Returns true if the same request may succeed when repeated
    ///
    /// Timeouts, network errors, HTTP 5xx and HTTP 429 are transient. Missing
    /// markers, other 4xx responses and structural problems are not.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout { .. } | Self::Network { .. } => true,
            Self::Http { status, .. } => {
                *status >= 500 || *status == StatusCode::TOO_MANY_REQUESTS.as_u16()
            }
            Self::MarkerMissing { .. } | Self::Structure { .. } | Self::Session(_) => false,
        }
    }
}

/// A successfully loaded page
#[derive(Debug, Clone)]
pub struct LoadedPage {
    /// URL after redirects
    pub final_url: String,
    pub status: u16,
    pub body: String,
}

/// One browsing identity towards a source
#[async_trait]
pub trait PageSession: Send {
    /// Sequence number of this session, for logs
    fn id(&self) -> u64;

    /// Loads `url` and, if given, checks that `ready_selector` matches
    async fn load(&mut self, url: &str, ready_selector: Option<&str>)
        -> Result<LoadedPage, FetchError>;
}

/// Creates fresh sessions
pub trait SessionFactory: Send + Sync {
    fn create(&self) -> Result<Box<dyn PageSession>, FetchError>;
}

/// Builds an HTTP client for one session
///
/// Every client gets its own cookie store, so a rotated session starts
/// without cookies or pooled connections.
///
/// # Arguments
///
/// * `config` - The session configuration
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
///
/// # Example
///
/// ```no_run
/// use gleaner::config::SessionConfig;
/// use gleaner::crawler::build_http_client;
///
/// let client = build_http_client(&SessionConfig::default()).unwrap();
/// ```
pub fn build_http_client(config: &SessionConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.user_agent.clone())
        .timeout(Duration::from_secs(config.page_load_timeout_secs))
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .cookie_store(true)
        .gzip(true)
        .brotli(true)
        .build()
}

/// `PageSession` over a `reqwest` client
pub struct HttpSession {
    id: u64,
    client: Client,
}

impl HttpSession {
    pub fn new(id: u64, client: Client) -> Self {
        Self { id, client }
    }
}

#[async_trait]
impl PageSession for HttpSession {
    fn id(&self) -> u64 {
        self.id
    }

    async fn load(
        &mut self,
        url: &str,
        ready_selector: Option<&str>,
    ) -> Result<LoadedPage, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| classify_reqwest_error(url, e))?;

        let status = response.status();
        let final_url = response.url().to_string();

        if !status.is_success() {
            return Err(FetchError::Http {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| classify_reqwest_error(url, e))?;

        if let Some(selector) = ready_selector {
            let found = has_match(&body, selector).map_err(|message| FetchError::Structure {
                url: url.to_string(),
                message,
            })?;
            if !found {
                return Err(FetchError::MarkerMissing {
                    url: url.to_string(),
                    selector: selector.to_string(),
                });
            }
        }

        debug!(session = self.id, url = %url, status = status.as_u16(), "Loaded page");

        Ok(LoadedPage {
            final_url,
            status: status.as_u16(),
            body,
        })
    }
}

fn classify_reqwest_error(url: &str, e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout {
            url: url.to_string(),
        }
    } else if e.is_connect() {
        FetchError::Network {
            url: url.to_string(),
            message: "Connection refused".to_string(),
        }
    } else {
        FetchError::Network {
            url: url.to_string(),
            message: e.to_string(),
        }
    }
}

/// Creates `HttpSession`s from the session configuration
pub struct HttpSessionFactory {
    config: SessionConfig,
    next_id: AtomicU64,
}

impl HttpSessionFactory {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            next_id: AtomicU64::new(1),
        }
    }
}

impl SessionFactory for HttpSessionFactory {
    fn create(&self) -> Result<Box<dyn PageSession>, FetchError> {
        let client =
            build_http_client(&self.config).map_err(|e| FetchError::Session(e.to_string()))?;
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        debug!(session = id, "Opened session");
        Ok(Box::new(HttpSession::new(id, client)))
    }
}
