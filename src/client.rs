//! HTTP client wrapper shared by all transfer requests.

use std::fmt;
use std::time::Duration;

use crate::config::TransferOptions;
use crate::error::{Result, TransferError};

/// The HTTP client used by a transfer run.
///
/// Wraps a [`reqwest::Client`] together with the run's [`TransferOptions`].
/// The retry loop lives in the transfer stage, not here; this type only
/// owns the transport and the shared request headers.
///
/// # Examples
/// ```
/// use bytehaul::{TransferClient, TransferOptions};
///
/// # fn example() -> bytehaul::Result<()> {
/// let client = TransferClient::new(TransferOptions::default())?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct TransferClient {
    http: reqwest::Client,
    options: TransferOptions,
}

// Compile-time assertion: TransferClient must be Send + Sync for safe async usage.
const _: fn() = || {
    fn must_be_send_sync<T: Send + Sync>() {}
    must_be_send_sync::<TransferClient>();
};

impl TransferClient {
    /// Create a new client with the given options.
    ///
    /// Applies a connect timeout and a `bytehaul/{version}` user agent.
    /// Returns an error if the underlying HTTP client cannot be constructed
    /// (e.g., TLS backend unavailable).
    pub fn new(options: TransferOptions) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .user_agent(format!("bytehaul/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(TransferError::Http)?;
        Ok(Self { http, options })
    }

    /// Create a client around a caller-supplied HTTP client.
    ///
    /// The caller is responsible for the transport configuration the
    /// default constructor would otherwise apply (timeouts, user agent).
    pub fn with_http_client(options: TransferOptions, http: reqwest::Client) -> Self {
        Self { http, options }
    }

    /// Returns the run's options.
    pub fn options(&self) -> &TransferOptions {
        &self.options
    }

    /// Returns the underlying HTTP client.
    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// Attach the run's shared headers to a request.
    pub(crate) fn apply_headers(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if self.options.headers.is_empty() {
            request
        } else {
            request.headers(self.options.headers.clone())
        }
    }
}

impl fmt::Debug for TransferClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransferClient")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}
