//! HTTP transport used to read release manifests and download payloads.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;
use url::Url;

use crate::config::Settings;

/// User agent sent with every request; the GitHub API rejects anonymous clients.
const USER_AGENT: &str = concat!("userapps/", env!("CARGO_PKG_VERSION"));

/// Media type requested from the GitHub API.
const GITHUB_ACCEPT: &str = "application/vnd.github+json";

/// Host that receives the `GITHUB_TOKEN` bearer credential.
const GITHUB_API_HOST: &str = "api.github.com";

/// Errors raised by a [`Transport`].
#[derive(Error, Debug)]
pub enum TransportError {
    /// The request exceeded the connect or overall timeout.
    #[error("request to {url} timed out")]
    Timeout {
        /// Requested URL.
        url: String,
    },

    /// The server answered with a non-success status.
    #[error("{url} returned HTTP {code}")]
    Status {
        /// Requested URL.
        url: String,
        /// HTTP status code.
        code: u16,
    },

    /// Connection, TLS, or protocol failure.
    #[error("request to {url} failed: {message}")]
    Network {
        /// Requested URL.
        url: String,
        /// Underlying error text.
        message: String,
    },

    /// The response body could not be written locally.
    #[error("cannot write {}: {source}", .path.display())]
    Io {
        /// Local destination.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },
}

/// Narrow HTTP interface used by the fetch strategies.
#[cfg_attr(test, mockall::automock)]
pub trait Transport: Send + Sync {
    /// GET `url` and return the body as text.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] on timeout, non-success status, or network failure.
    fn get_text(&self, url: &str) -> Result<String, TransportError>;

    /// GET `url` and stream the body into `dest`, creating or truncating it.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] on timeout, non-success status, network
    /// failure, or when `dest` cannot be written.
    fn download(&self, url: &str, dest: &Path) -> Result<(), TransportError>;
}

/// [`Transport`] backed by a blocking `ureq` agent.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    agent: ureq::Agent,
    token: Option<String>,
}

impl HttpTransport {
    /// Build a transport with the timeouts from `settings`.
    ///
    /// Reads `GITHUB_TOKEN` once; it is only ever sent to the GitHub API host.
    #[must_use]
    pub fn new(settings: &Settings) -> Self {
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(settings.http_timeout_secs)))
            .timeout_connect(Some(Duration::from_secs(settings.connect_timeout_secs)))
            .build();
        Self {
            agent: config.into(),
            token: std::env::var("GITHUB_TOKEN")
                .ok()
                .filter(|t| !t.trim().is_empty()),
        }
    }

    fn get(&self, url: &str) -> Result<ureq::http::Response<ureq::Body>, TransportError> {
        let mut request = self.agent.get(url);
        for (name, value) in request_headers(url, self.token.as_deref()) {
            request = request.header(name, value);
        }
        tracing::debug!("GET {url}");
        request.call().map_err(|e| classify(url, e))
    }
}

/// Headers for a GET of `url`. The GitHub media type and the bearer token
/// are only attached for the GitHub API host.
fn request_headers(url: &str, token: Option<&str>) -> Vec<(&'static str, String)> {
    let mut headers = vec![("User-Agent", USER_AGENT.to_string())];
    if Url::parse(url).is_ok_and(|parsed| is_github_api(&parsed)) {
        headers.push(("Accept", GITHUB_ACCEPT.to_string()));
        if let Some(token) = token {
            headers.push(("Authorization", format!("Bearer {token}")));
        }
    }
    headers
}

impl Transport for HttpTransport {
    fn get_text(&self, url: &str) -> Result<String, TransportError> {
        let mut response = self.get(url)?;
        response
            .body_mut()
            .read_to_string()
            .map_err(|e| classify(url, e))
    }

    fn download(&self, url: &str, dest: &Path) -> Result<(), TransportError> {
        let response = self.get(url)?;
        let mut reader = response.into_body().into_reader();
        let mut file = File::create(dest).map_err(|source| TransportError::Io {
            path: dest.to_path_buf(),
            source,
        })?;
        io::copy(&mut reader, &mut file).map_err(|e| match e.kind() {
            io::ErrorKind::TimedOut => TransportError::Timeout {
                url: url.to_string(),
            },
            _ => TransportError::Network {
                url: url.to_string(),
                message: e.to_string(),
            },
        })?;
        Ok(())
    }
}

fn classify(url: &str, err: ureq::Error) -> TransportError {
    let url = url.to_string();
    match err {
        ureq::Error::StatusCode(code) => TransportError::Status { url, code },
        ureq::Error::Timeout(_) => TransportError::Timeout { url },
        ureq::Error::Io(e) if e.kind() == io::ErrorKind::TimedOut => {
            TransportError::Timeout { url }
        }
        other => TransportError::Network {
            url,
            message: other.to_string(),
        },
    }
}

/// Whether `url` is an `http(s)` URL on the GitHub API host. Host
/// comparison ignores case.
#[must_use]
pub fn is_github_api(url: &Url) -> bool {
    matches!(url.scheme(), "http" | "https")
        && url
            .host_str()
            .is_some_and(|host| host.eq_ignore_ascii_case(GITHUB_API_HOST))
}
