//! Transfer stage: execute one part against the remote with retries.

use std::cmp;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures_util::stream::{BoxStream, StreamExt};
use reqwest::header::{CONTENT_LENGTH, RANGE};

use crate::builders::{PartBody, PartRequestBuilder};
use crate::client::TransferClient;
use crate::config::{RetryOptions, TransferOptions};
use crate::error::{Result, TransferError};
use crate::events::TransferEvent;
use crate::types::asset::{AssetLocator, TransferDirection};
use crate::types::part::TransferPart;

use super::concurrent::BoundedConcurrentMap;
use super::executor::{PipelineContext, PipelineStage};

/// Executes each part against the remote, concurrently and bounded.
///
/// Transient failures (network errors, HTTP 5xx and 429, truncated
/// download bodies) are retried up to the configured count with
/// exponential backoff. When retries are exhausted the asset records its
/// first error, an `Error` event fires once, and the part flows on
/// tagged as the asset's failure marker.
pub struct TransferStage {
    client: TransferClient,
    retry: RetryOptions,
    max_concurrent: usize,
    builder: Option<Arc<dyn PartRequestBuilder>>,
}

impl TransferStage {
    /// Create the stage for a download run.
    pub fn download(client: TransferClient, options: &TransferOptions) -> Self {
        Self {
            client,
            retry: options.retry.clone(),
            max_concurrent: options.effective_concurrency(),
            builder: None,
        }
    }

    /// Create the stage for an upload run with the given request builder.
    pub fn upload(
        client: TransferClient,
        options: &TransferOptions,
        builder: Arc<dyn PartRequestBuilder>,
    ) -> Self {
        Self {
            client,
            retry: options.retry.clone(),
            max_concurrent: options.effective_concurrency(),
            builder: Some(builder),
        }
    }

    async fn transfer_part(&self, ctx: &PipelineContext, part: TransferPart) -> TransferPart {
        let mut attempt: u32 = 0;
        loop {
            match self.attempt_part(ctx, &part).await {
                Ok(()) => return part,
                Err(error) => {
                    let retryable = self.retry.retry_all_errors || error.is_transient();
                    if retryable && attempt < self.retry.max_count {
                        attempt += 1;
                        let delay = self.backoff(attempt);
                        tracing::warn!(
                            url = %part.url(),
                            attempt,
                            ?delay,
                            error = %error,
                            "retrying part transfer"
                        );
                        tokio::time::sleep(delay).await;
                        continue;
                    }

                    tracing::warn!(
                        url = %part.url(),
                        attempts = attempt + 1,
                        error = %error,
                        "part transfer failed"
                    );
                    let error = Arc::new(error);
                    if part.asset().fail(Arc::clone(&error)) {
                        ctx.controller.emit(TransferEvent::Error {
                            asset: Arc::clone(part.asset()),
                            error,
                            first_error: true,
                        });
                    }
                    return part.into_failed();
                }
            }
        }
    }

    fn backoff(&self, attempt: u32) -> Duration {
        let delay = self.retry.base_delay * 2u32.saturating_pow(attempt - 1);
        cmp::min(delay, self.retry.max_delay)
    }

    async fn attempt_part(&self, ctx: &PipelineContext, part: &TransferPart) -> Result<()> {
        match part.asset().direction() {
            TransferDirection::Download => self.download_part(ctx, part).await,
            TransferDirection::Upload => self.upload_part(ctx, part).await,
        }
    }

    async fn download_part(&self, ctx: &PipelineContext, part: &TransferPart) -> Result<()> {
        tracing::debug!(url = %part.url(), range = %part.range().to_header_value(), "GET part");
        let request = self
            .client
            .http()
            .get(part.url().clone())
            .header(RANGE, part.range().to_header_value());
        let response = self.client.apply_headers(request).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransferError::from_status(status));
        }

        let declared = response
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse::<u64>().ok());
        let Some(declared) = declared else {
            return Err(TransferError::Download {
                message: "Server did not respond with a Content-Length header: null".to_string(),
                transient: false,
            });
        };

        let body = response.bytes().await?;
        let received = body.len() as u64;
        if received != declared {
            // Short and over-long bodies alike are transient; the retry
            // replaces whatever this attempt produced.
            return Err(TransferError::Download {
                message: format!("expected {declared} bytes, received {received}"),
                transient: true,
            });
        }
        let expected = part.range().len();
        if received != expected {
            return Err(TransferError::Download {
                message: format!("received {received} bytes for a {expected} byte part"),
                transient: true,
            });
        }

        let Some(path) = part.asset().local_path() else {
            return Err(TransferError::InvalidOptions(
                "download target must be a local path".to_string(),
            ));
        };
        ctx.files.write_at(path, part.range().low, body).await
    }

    async fn upload_part(&self, ctx: &PipelineContext, part: &TransferPart) -> Result<()> {
        let payload = self.upload_payload(ctx, part).await?;
        let builder = self.builder.as_ref().ok_or_else(|| {
            TransferError::InvalidOptions("upload run has no request builder".to_string())
        })?;

        tracing::debug!(
            url = %part.url(),
            method = %builder.method(),
            bytes = payload.len(),
            "send part"
        );
        let headers = builder.build_headers(part, payload.len() as u64)?;
        let body = builder.build_body(part, payload)?;

        let request = self
            .client
            .http()
            .request(builder.method(), part.url().clone());
        let request = self.client.apply_headers(request).headers(headers);
        let request = match body {
            PartBody::Raw(bytes) => request.body(bytes),
            PartBody::Multipart(form) => request.multipart(form),
        };

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(TransferError::from_status(status));
        }
        Ok(())
    }

    async fn upload_payload(&self, ctx: &PipelineContext, part: &TransferPart) -> Result<Bytes> {
        let range = part.range();
        match part.asset().source() {
            AssetLocator::Local(path) => {
                ctx.files.read(path, range.low, range.len() as usize).await
            }
            AssetLocator::Memory(blob) => {
                Ok(blob.slice(range.low as usize..(range.high + 1) as usize))
            }
            AssetLocator::Remote(_) => Err(TransferError::InvalidOptions(
                "upload source must be a local path or blob".to_string(),
            )),
        }
    }
}

impl PipelineStage for TransferStage {
    type In = TransferPart;
    type Out = TransferPart;

    fn execute(
        self: Arc<Self>,
        input: BoxStream<'static, Self::In>,
        ctx: PipelineContext,
    ) -> BoxStream<'static, Self::Out> {
        let max_concurrent = self.max_concurrent;
        BoundedConcurrentMap::new(input, max_concurrent, move |part| {
            let stage = Arc::clone(&self);
            let ctx = ctx.clone();
            async move { stage.transfer_part(&ctx, part).await }
        })
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stage_with_retry(max_count: u32) -> TransferStage {
        let options = TransferOptions::builder()
            .retry_max_count(max_count)
            .retry_base_delay(Duration::from_millis(100))
            .retry_max_delay(Duration::from_millis(250))
            .build();
        TransferStage::download(
            TransferClient::new(options.clone()).unwrap(),
            &options,
        )
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let stage = stage_with_retry(5);
        assert_eq!(stage.backoff(1), Duration::from_millis(100));
        assert_eq!(stage.backoff(2), Duration::from_millis(200));
        assert_eq!(stage.backoff(3), Duration::from_millis(250));
        assert_eq!(stage.backoff(4), Duration::from_millis(250));
    }

    #[test]
    fn download_stage_has_no_builder() {
        let stage = stage_with_retry(1);
        assert!(stage.builder.is_none());
        assert_eq!(stage.max_concurrent, 1);
    }
}
