//! Data records flowing through the transfer engine.

pub mod asset;
pub mod part;
pub mod protocol;
pub mod request;

pub use asset::{
    AssetLocator, AssetMetadata, TransferAsset, TransferDirection, UploadVersionOptions,
};
pub use part::{ByteRange, TransferPart};
pub use protocol::{InitiateUploadFile, InitiateUploadResponse};
pub use request::{
    DownloadFileRequest, DownloadFileRequestBuilder, UploadFileRequest, UploadFileRequestBuilder,
    UploadSource,
};
