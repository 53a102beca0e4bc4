//! Typed inputs for the download and upload surfaces.

use std::path::PathBuf;

use bytes::Bytes;
use reqwest::header::HeaderMap;
use url::Url;

use crate::error::{Result, TransferError};

/// One file to download from the remote repository.
#[derive(Debug, Clone)]
pub struct DownloadFileRequest {
    pub(crate) file_url: Url,
    pub(crate) file_path: PathBuf,
    pub(crate) file_size: u64,
}

/// Builder for [`DownloadFileRequest`].
#[derive(Debug, Default)]
pub struct DownloadFileRequestBuilder {
    file_url: Option<Url>,
    file_path: Option<PathBuf>,
    file_size: Option<u64>,
}

impl DownloadFileRequest {
    /// Start building a download request.
    pub fn builder() -> DownloadFileRequestBuilder {
        DownloadFileRequestBuilder::default()
    }

    /// Remote URL of the file.
    pub fn file_url(&self) -> &Url {
        &self.file_url
    }

    /// Local destination path.
    pub fn file_path(&self) -> &std::path::Path {
        &self.file_path
    }

    /// Declared size of the file in bytes.
    pub fn file_size(&self) -> u64 {
        self.file_size
    }
}

impl DownloadFileRequestBuilder {
    /// Set the remote URL of the file.
    pub fn file_url(mut self, url: Url) -> Self {
        self.file_url = Some(url);
        self
    }

    /// Set the local destination path.
    pub fn file_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.file_path = Some(path.into());
        self
    }

    /// Set the declared size of the file in bytes.
    pub fn file_size(mut self, size: u64) -> Self {
        self.file_size = Some(size);
        self
    }

    /// Build the request.
    pub fn build(self) -> Result<DownloadFileRequest> {
        Ok(DownloadFileRequest {
            file_url: self
                .file_url
                .ok_or_else(|| TransferError::MissingField("fileUrl".into()))?,
            file_path: self
                .file_path
                .ok_or_else(|| TransferError::MissingField("filePath".into()))?,
            file_size: self
                .file_size
                .ok_or_else(|| TransferError::MissingField("fileSize".into()))?,
        })
    }
}

/// Source of an upload's bytes.
#[derive(Debug, Clone)]
pub enum UploadSource {
    /// Read the bytes from a local file.
    File(PathBuf),
    /// Use an in-memory blob.
    Blob(Bytes),
}

/// One file to upload to the remote repository.
#[derive(Debug, Clone)]
pub struct UploadFileRequest {
    pub(crate) file_url: Url,
    pub(crate) source: UploadSource,
    pub(crate) file_size: u64,
    pub(crate) multipart_headers: HeaderMap,
    pub(crate) create_version: bool,
    pub(crate) version_label: Option<String>,
    pub(crate) version_comment: Option<String>,
    pub(crate) replace: bool,
}

/// Builder for [`UploadFileRequest`].
#[derive(Debug, Default)]
pub struct UploadFileRequestBuilder {
    file_url: Option<Url>,
    source: Option<UploadSource>,
    file_size: Option<u64>,
    multipart_headers: HeaderMap,
    create_version: bool,
    version_label: Option<String>,
    version_comment: Option<String>,
    replace: bool,
}

impl UploadFileRequest {
    /// Start building an upload request.
    pub fn builder() -> UploadFileRequestBuilder {
        UploadFileRequestBuilder::default()
    }

    /// Remote URL of the file.
    pub fn file_url(&self) -> &Url {
        &self.file_url
    }

    /// Source of the upload's bytes.
    pub fn source(&self) -> &UploadSource {
        &self.source
    }

    /// Declared size of the file in bytes.
    pub fn file_size(&self) -> u64 {
        self.file_size
    }
}

impl UploadFileRequestBuilder {
    /// Set the remote URL of the file.
    pub fn file_url(mut self, url: Url) -> Self {
        self.file_url = Some(url);
        self
    }

    /// Upload the bytes of a local file.
    pub fn file_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.source = Some(UploadSource::File(path.into()));
        self
    }

    /// Upload an in-memory blob.
    pub fn blob(mut self, blob: impl Into<Bytes>) -> Self {
        self.source = Some(UploadSource::Blob(blob.into()));
        self
    }

    /// Set the declared size of the file in bytes.
    pub fn file_size(mut self, size: u64) -> Self {
        self.file_size = Some(size);
        self
    }

    /// Attach extra headers for part upload requests.
    pub fn multipart_headers(mut self, headers: HeaderMap) -> Self {
        self.multipart_headers = headers;
        self
    }

    /// Create a new version when the remote file already exists.
    pub fn create_version(mut self, create_version: bool) -> Self {
        self.create_version = create_version;
        self
    }

    /// Set the label for the created version.
    pub fn version_label(mut self, label: impl Into<String>) -> Self {
        self.version_label = Some(label.into());
        self
    }

    /// Set the comment for the created version.
    pub fn version_comment(mut self, comment: impl Into<String>) -> Self {
        self.version_comment = Some(comment.into());
        self
    }

    /// Replace the remote file instead of versioning it.
    pub fn replace(mut self, replace: bool) -> Self {
        self.replace = replace;
        self
    }

    /// Build the request.
    pub fn build(self) -> Result<UploadFileRequest> {
        Ok(UploadFileRequest {
            file_url: self
                .file_url
                .ok_or_else(|| TransferError::MissingField("fileUrl".into()))?,
            source: self
                .source
                .ok_or_else(|| TransferError::MissingField("filePath".into()))?,
            file_size: self
                .file_size
                .ok_or_else(|| TransferError::MissingField("fileSize".into()))?,
            multipart_headers: self.multipart_headers,
            create_version: self.create_version,
            version_label: self.version_label,
            version_comment: self.version_comment,
            replace: self.replace,
        })
    }
}
