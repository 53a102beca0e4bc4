//! Asset records flowing through the transfer pipeline.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Instant;

use bytes::Bytes;
use reqwest::header::HeaderMap;
use url::Url;

use crate::error::SharedError;

/// Where an asset's bytes live on one side of a transfer.
#[derive(Debug, Clone)]
pub enum AssetLocator {
    /// A remote HTTP endpoint.
    Remote(Url),
    /// A file on the local filesystem.
    Local(PathBuf),
    /// An in-memory blob (upload source only).
    Memory(Bytes),
}

impl AssetLocator {
    /// Returns the local path, if this locator is a file.
    pub fn as_local(&self) -> Option<&Path> {
        match self {
            Self::Local(path) => Some(path),
            _ => None,
        }
    }

    /// Returns the URL, if this locator is remote.
    pub fn as_remote(&self) -> Option<&Url> {
        match self {
            Self::Remote(url) => Some(url),
            _ => None,
        }
    }
}

/// Descriptive metadata carried with an asset.
#[derive(Debug, Clone)]
pub struct AssetMetadata {
    /// Target file name.
    pub name: String,
    /// Content type of the asset's bytes.
    pub content_type: String,
    /// Declared total size in bytes.
    pub size: u64,
}

/// Transfer direction of an asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferDirection {
    /// Remote to local.
    Download,
    /// Local to remote.
    Upload,
}

/// Versioning fields sent with the upload complete call.
#[derive(Debug, Clone, Default)]
pub struct UploadVersionOptions {
    /// Create a new version when the remote file already exists.
    pub create_version: bool,
    /// Label for the created version.
    pub version_label: Option<String>,
    /// Comment for the created version.
    pub version_comment: Option<String>,
    /// Replace the remote file instead of versioning it.
    pub replace: bool,
}

/// A logical file moving through the pipeline.
///
/// Created at pipeline ingress and shared (via `Arc`) by every part
/// derived from it. All fields are immutable after construction except
/// the failure cell, which records the asset's first error.
#[derive(Debug)]
pub struct TransferAsset {
    direction: TransferDirection,
    source: AssetLocator,
    target: AssetLocator,
    metadata: AssetMetadata,
    accept_ranges: bool,
    upload_uris: Vec<Url>,
    upload_token: Option<String>,
    multipart_headers: HeaderMap,
    part_endpoint: Option<Url>,
    complete_uri: Option<Url>,
    version: UploadVersionOptions,
    event_data: serde_json::Value,
    started: Instant,
    failure: OnceLock<SharedError>,
}

impl TransferAsset {
    /// Create a download asset from a remote URL to a local path.
    pub fn download(source: Url, target: PathBuf, size: u64) -> Self {
        let name = file_name_of(&source);
        Self::new(
            TransferDirection::Download,
            AssetLocator::Remote(source),
            AssetLocator::Local(target),
            AssetMetadata {
                content_type: content_type_for(&name).to_string(),
                name,
                size,
            },
        )
    }

    /// Create an upload asset from a local source to a remote URL.
    pub fn upload(source: AssetLocator, target: Url, size: u64) -> Self {
        let name = file_name_of(&target);
        Self::new(
            TransferDirection::Upload,
            source,
            AssetLocator::Remote(target),
            AssetMetadata {
                content_type: content_type_for(&name).to_string(),
                name,
                size,
            },
        )
    }

    fn new(
        direction: TransferDirection,
        source: AssetLocator,
        target: AssetLocator,
        metadata: AssetMetadata,
    ) -> Self {
        Self {
            direction,
            source,
            target,
            metadata,
            accept_ranges: true,
            upload_uris: Vec::new(),
            upload_token: None,
            multipart_headers: HeaderMap::new(),
            part_endpoint: None,
            complete_uri: None,
            version: UploadVersionOptions::default(),
            event_data: serde_json::Value::Null,
            started: Instant::now(),
            failure: OnceLock::new(),
        }
    }

    /// Set whether the remote supports ranged requests.
    pub fn with_accept_ranges(mut self, accept_ranges: bool) -> Self {
        self.accept_ranges = accept_ranges;
        self
    }

    /// Override the asset's content type.
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.metadata.content_type = content_type.into();
        self
    }

    /// Attach the pre-signed part URIs returned by the upload initiation.
    pub fn with_upload_uris(mut self, uris: Vec<Url>) -> Self {
        self.upload_uris = uris;
        self
    }

    /// Attach the upload token returned by the upload initiation.
    pub fn with_upload_token(mut self, token: Option<String>) -> Self {
        self.upload_token = token;
        self
    }

    /// Attach extra headers for part upload requests.
    pub fn with_multipart_headers(mut self, headers: HeaderMap) -> Self {
        self.multipart_headers = headers;
        self
    }

    /// Override the URL single-URI part transfers hit.
    ///
    /// The create-asset-servlet protocol posts parts to the folder's
    /// servlet endpoint instead of the file URL itself.
    pub fn with_part_endpoint(mut self, endpoint: Url) -> Self {
        self.part_endpoint = Some(endpoint);
        self
    }

    /// Attach the completion URI for the direct-binary upload protocol.
    pub fn with_complete_uri(mut self, uri: Option<Url>) -> Self {
        self.complete_uri = uri;
        self
    }

    /// Attach versioning options for the upload complete call.
    pub fn with_version_options(mut self, version: UploadVersionOptions) -> Self {
        self.version = version;
        self
    }

    /// Attach a stable payload included with lifecycle events.
    pub fn with_event_data(mut self, event_data: serde_json::Value) -> Self {
        self.event_data = event_data;
        self
    }

    /// Transfer direction of the asset.
    pub fn direction(&self) -> TransferDirection {
        self.direction
    }

    /// Source locator.
    pub fn source(&self) -> &AssetLocator {
        &self.source
    }

    /// Target locator.
    pub fn target(&self) -> &AssetLocator {
        &self.target
    }

    /// Descriptive metadata.
    pub fn metadata(&self) -> &AssetMetadata {
        &self.metadata
    }

    /// Whether the remote supports ranged requests.
    pub fn accept_ranges(&self) -> bool {
        self.accept_ranges
    }

    /// Pre-signed part URIs (upload only).
    pub fn upload_uris(&self) -> &[Url] {
        &self.upload_uris
    }

    /// Upload token (upload only).
    pub fn upload_token(&self) -> Option<&str> {
        self.upload_token.as_deref()
    }

    /// Extra headers for part upload requests.
    pub fn multipart_headers(&self) -> &HeaderMap {
        &self.multipart_headers
    }

    /// Completion URI for the direct-binary upload protocol.
    pub fn complete_uri(&self) -> Option<&Url> {
        self.complete_uri.as_ref()
    }

    /// Versioning options for the upload complete call.
    pub fn version_options(&self) -> &UploadVersionOptions {
        &self.version
    }

    /// The stable payload included with lifecycle events.
    pub fn event_data(&self) -> &serde_json::Value {
        &self.event_data
    }

    /// When this asset entered the run.
    pub fn started(&self) -> Instant {
        self.started
    }

    /// The URL that single-URI part transfers hit.
    ///
    /// Downloads read from the source; uploads without pre-signed URIs
    /// post to the target, unless a part endpoint override is set.
    pub fn part_url(&self) -> Option<&Url> {
        if let Some(endpoint) = &self.part_endpoint {
            return Some(endpoint);
        }
        match self.direction {
            TransferDirection::Download => self.source.as_remote(),
            TransferDirection::Upload => self.target.as_remote(),
        }
    }

    /// The asset's path on the local filesystem, if any.
    ///
    /// The download target or the upload source; `None` for blob uploads.
    pub fn local_path(&self) -> Option<&Path> {
        match self.direction {
            TransferDirection::Download => self.target.as_local(),
            TransferDirection::Upload => self.source.as_local(),
        }
    }

    /// Record the asset's first error.
    ///
    /// Returns `true` when this call set the error; later calls lose and
    /// return `false` (first-error-wins).
    pub fn fail(&self, error: SharedError) -> bool {
        self.failure.set(error).is_ok()
    }

    /// The asset's first error, if any.
    pub fn failure(&self) -> Option<&SharedError> {
        self.failure.get()
    }

    /// Whether the asset has failed.
    pub fn has_failed(&self) -> bool {
        self.failure.get().is_some()
    }
}

fn file_name_of(url: &Url) -> String {
    url.path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|segment| !segment.is_empty())
        .unwrap_or("unnamed")
        .to_string()
}

/// Derive a content type from a file name extension.
pub(crate) fn content_type_for(name: &str) -> &'static str {
    let extension = name.rsplit_once('.').map(|(_, ext)| ext).unwrap_or("");
    match extension.to_ascii_lowercase().as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "tif" | "tiff" => "image/tiff",
        "mp4" => "video/mp4",
        "pdf" => "application/pdf",
        "json" => "application/json",
        "zip" => "application/zip",
        "txt" => "text/plain",
        "html" => "text/html",
        "css" => "text/css",
        "csv" => "text/csv",
        "xml" => "application/xml",
        _ => "application/octet-stream",
    }
}
