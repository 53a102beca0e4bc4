//! Request builders that shape one part into an HTTP body and headers.
//!
//! Two variants exist: [`BlockRequestBuilder`] PUTs raw bytes to
//! pre-signed part URIs, and [`CreateAssetServletRequestBuilder`] POSTs a
//! multipart form per part for repositories without direct binary access.
//! The variant is selected once, at pipeline construction time.

use bytes::Bytes;
use reqwest::Method;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest::multipart::{Form, Part};

use crate::error::{Result, TransferError};
use crate::types::part::TransferPart;

/// Body shapes a builder can produce.
pub enum PartBody {
    /// Raw bytes, sent as-is.
    Raw(Bytes),
    /// A multipart form.
    Multipart(Form),
}

/// Builds the HTTP method, body, and headers for one part request.
///
/// Implementations are pure functions of the part and its payload bytes,
/// so the retry loop can rebuild a request for every attempt.
pub trait PartRequestBuilder: Send + Sync {
    /// HTTP method for part requests.
    fn method(&self) -> Method;

    /// Build the request body from the part's payload.
    fn build_body(&self, part: &TransferPart, payload: Bytes) -> Result<PartBody>;

    /// Build the request headers.
    fn build_headers(&self, part: &TransferPart, payload_len: u64) -> Result<HeaderMap>;
}

fn content_type_value(part: &TransferPart) -> Result<HeaderValue> {
    HeaderValue::from_str(part.content_type())
        .map_err(|e| TransferError::InvalidOptions(format!("invalid content type: {e}")))
}

/// Raw-bytes builder for pre-signed part URIs.
#[derive(Debug, Default)]
pub struct BlockRequestBuilder;

impl PartRequestBuilder for BlockRequestBuilder {
    fn method(&self) -> Method {
        Method::PUT
    }

    fn build_body(&self, _part: &TransferPart, payload: Bytes) -> Result<PartBody> {
        Ok(PartBody::Raw(payload))
    }

    fn build_headers(&self, part: &TransferPart, payload_len: u64) -> Result<HeaderMap> {
        let mut headers = part.asset().multipart_headers().clone();
        headers.insert(CONTENT_LENGTH, HeaderValue::from(payload_len));
        headers.insert(CONTENT_TYPE, content_type_value(part)?);
        Ok(headers)
    }
}

/// Multipart-form builder for the create-asset-servlet fallback protocol.
///
/// Every form carries `_charset_=utf-8` and the file bytes. Chunked parts
/// (covering less than the whole asset) additionally carry the
/// `file@Offset`, `chunk@Length`, and `file@Length` fields plus the
/// `x-chunked-content-type` and `x-chunked-total-size` request headers.
#[derive(Debug, Default)]
pub struct CreateAssetServletRequestBuilder;

impl PartRequestBuilder for CreateAssetServletRequestBuilder {
    fn method(&self) -> Method {
        Method::POST
    }

    fn build_body(&self, part: &TransferPart, payload: Bytes) -> Result<PartBody> {
        let mut form = Form::new().text("_charset_", "utf-8");
        if part.is_chunk() {
            form = form
                .text("file@Offset", part.range().low.to_string())
                .text("chunk@Length", part.range().len().to_string())
                .text("file@Length", part.total_size().to_string());
        }
        let file = Part::bytes(payload.to_vec())
            .file_name(part.target_name().to_string())
            .mime_str(part.content_type())?;
        Ok(PartBody::Multipart(form.part("file", file)))
    }

    fn build_headers(&self, part: &TransferPart, _payload_len: u64) -> Result<HeaderMap> {
        let mut headers = part.asset().multipart_headers().clone();
        if part.is_chunk() {
            headers.insert("x-chunked-content-type", content_type_value(part)?);
            headers.insert(
                "x-chunked-total-size",
                HeaderValue::from(part.total_size()),
            );
        }
        Ok(headers)
    }
}
