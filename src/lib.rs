//! Pipelined, partitioned bulk file transfer between HTTP content
//! repositories and the local filesystem.
//!
//! Files are split into bounded parts, transferred concurrently with a
//! cap on in-flight work, and reassembled with positional file I/O.
//! Failures are handled at part granularity with retries and at file
//! granularity with first-error-wins semantics that never abort sibling
//! files. Lifecycle events per file are emitted through a
//! [`TransferController`].
#![deny(missing_docs)]

pub mod builders;
pub mod client;
pub mod config;
pub mod error;
pub mod events;
pub mod io;
pub mod ops;
pub mod pipeline;
pub mod types;

pub use builders::{
    BlockRequestBuilder, CreateAssetServletRequestBuilder, PartBody, PartRequestBuilder,
};
pub use client::TransferClient;
pub use config::{RetryOptions, TransferOptions, TransferOptionsBuilder};
pub use error::{ErrorKind, Result, SharedError, TransferError};
pub use events::{TransferController, TransferEvent, TransferListener, TransferObserver};
pub use io::RandomFileAccess;
pub use ops::{download_files, upload_files};
pub use types::asset::{
    AssetLocator, AssetMetadata, TransferAsset, TransferDirection, UploadVersionOptions,
};
pub use types::part::{ByteRange, TransferPart};
pub use types::request::{
    DownloadFileRequest, DownloadFileRequestBuilder, UploadFileRequest, UploadFileRequestBuilder,
    UploadSource,
};
