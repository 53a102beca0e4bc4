//! Configuration types for transfer runs.

use std::time::Duration;

use reqwest::header::HeaderMap;

const DEFAULT_MAX_CONCURRENT: usize = 8;
const DEFAULT_PART_SIZE: u64 = 10 * 1024 * 1024;
const DEFAULT_RETRY_MAX_COUNT: u32 = 5;

/// Retry behavior for part transfers.
#[derive(Debug, Clone)]
pub struct RetryOptions {
    /// Maximum number of retries after the first attempt (default: 5).
    pub max_count: u32,
    /// Retry every failure, including HTTP 4xx (default: false).
    pub retry_all_errors: bool,
    /// Base delay between retries (default: 100ms).
    pub base_delay: Duration,
    /// Maximum delay between retries (default: 30s).
    pub max_delay: Duration,
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self {
            max_count: DEFAULT_RETRY_MAX_COUNT,
            retry_all_errors: false,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(30),
        }
    }
}

/// Options governing a transfer run.
///
/// # Examples
/// ```
/// use bytehaul::TransferOptions;
///
/// let options = TransferOptions::builder()
///     .concurrent(true)
///     .max_concurrent(4)
///     .preferred_part_size(5 * 1024 * 1024)
///     .build();
/// assert_eq!(options.effective_concurrency(), 4);
/// ```
#[derive(Debug, Clone)]
pub struct TransferOptions {
    /// Allow multiple part transfers in flight at once (default: false).
    pub concurrent: bool,
    /// Cap on in-flight part transfers across all assets (default: 8).
    pub max_concurrent: usize,
    /// Split granularity when the server does not dictate one (default: 10 MiB).
    pub preferred_part_size: u64,
    /// Headers attached to every request.
    pub headers: HeaderMap,
    /// Retry behavior for part transfers.
    pub retry: RetryOptions,
}

impl Default for TransferOptions {
    fn default() -> Self {
        Self {
            concurrent: false,
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            preferred_part_size: DEFAULT_PART_SIZE,
            headers: HeaderMap::new(),
            retry: RetryOptions::default(),
        }
    }
}

impl TransferOptions {
    /// Start building a set of options.
    pub fn builder() -> TransferOptionsBuilder {
        TransferOptionsBuilder::default()
    }

    /// The in-flight cap actually applied to a run.
    ///
    /// Serial mode (`concurrent = false`) forces the cap to 1.
    pub fn effective_concurrency(&self) -> usize {
        if self.concurrent {
            self.max_concurrent.max(1)
        } else {
            1
        }
    }
}

/// Builder for [`TransferOptions`].
#[derive(Debug, Default)]
pub struct TransferOptionsBuilder {
    options: TransferOptions,
}

impl TransferOptionsBuilder {
    /// Allow multiple part transfers in flight at once.
    pub fn concurrent(mut self, concurrent: bool) -> Self {
        self.options.concurrent = concurrent;
        self
    }

    /// Set the cap on in-flight part transfers (clamped to at least 1).
    pub fn max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.options.max_concurrent = max_concurrent.max(1);
        self
    }

    /// Set the preferred part size in bytes.
    pub fn preferred_part_size(mut self, size: u64) -> Self {
        self.options.preferred_part_size = size;
        self
    }

    /// Attach headers to every request of the run.
    pub fn headers(mut self, headers: HeaderMap) -> Self {
        self.options.headers = headers;
        self
    }

    /// Set the maximum retry count for part transfers.
    pub fn retry_max_count(mut self, max_count: u32) -> Self {
        self.options.retry.max_count = max_count;
        self
    }

    /// Retry every failure, including HTTP 4xx.
    pub fn retry_all_errors(mut self, retry_all_errors: bool) -> Self {
        self.options.retry.retry_all_errors = retry_all_errors;
        self
    }

    /// Set the base delay between retries.
    pub fn retry_base_delay(mut self, delay: Duration) -> Self {
        self.options.retry.base_delay = delay;
        self
    }

    /// Set the maximum delay between retries.
    pub fn retry_max_delay(mut self, delay: Duration) -> Self {
        self.options.retry.max_delay = delay;
        self
    }

    /// Finish building the options.
    pub fn build(self) -> TransferOptions {
        self.options
    }
}
