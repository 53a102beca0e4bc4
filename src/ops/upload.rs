//! Bulk file upload surface: direct binary with create-asset-servlet fallback.

use std::sync::Arc;

use futures_util::future::BoxFuture;
use futures_util::stream::{self, StreamExt};
use url::Url;

use crate::builders::{BlockRequestBuilder, CreateAssetServletRequestBuilder};
use crate::client::TransferClient;
use crate::error::{Result, TransferError};
use crate::events::{TransferController, TransferEvent};
use crate::io::RandomFileAccess;
use crate::pipeline::{
    AssetFinalizer, CloseStage, JoinStage, Pipeline, PipelineContext, SplitStage, TransferStage,
};
use crate::types::asset::{AssetLocator, TransferAsset, UploadVersionOptions};
use crate::types::protocol::InitiateUploadResponse;
use crate::types::request::{UploadFileRequest, UploadSource};

/// Upload a set of local files or blobs to the remote repository.
///
/// Each file's upload is initiated against its folder's
/// `.initiateUpload.json` endpoint. Files the repository hands
/// pre-signed URIs for go through the direct-binary protocol (one PUT
/// per URI, then a completion POST); the rest fall back to per-part
/// multipart POSTs against the folder's `.createasset.html` servlet.
///
/// Per-file failures surface through the controller's listeners; a
/// failing file never aborts its siblings, and this call does not fail
/// on per-file errors.
pub async fn upload_files(
    client: &TransferClient,
    requests: Vec<UploadFileRequest>,
    controller: Arc<TransferController>,
) {
    let options = client.options().clone();
    let ctx = PipelineContext {
        controller,
        files: Arc::new(RandomFileAccess::new()),
    };

    let mut direct = Vec::new();
    let mut servlet = Vec::new();
    for request in requests {
        match prepare_upload(client, request).await {
            Prepared::Direct(asset) => direct.push(asset),
            Prepared::Servlet(asset) => servlet.push(asset),
            Prepared::Failed(asset, error) => {
                let error = Arc::new(error);
                if asset.fail(Arc::clone(&error)) {
                    ctx.controller.emit(TransferEvent::Error {
                        asset,
                        error,
                        first_error: true,
                    });
                }
            }
        }
    }

    tracing::debug!(
        direct = direct.len(),
        servlet = servlet.len(),
        "starting upload run"
    );
    if !direct.is_empty() {
        Pipeline::new(SplitStage::new(options.preferred_part_size))
            .then(TransferStage::upload(
                client.clone(),
                &options,
                Arc::new(BlockRequestBuilder),
            ))
            .then(JoinStage::new(Some(Arc::new(CompleteUploadFinalizer {
                client: client.clone(),
            }))))
            .then(CloseStage)
            .run(stream::iter(direct).boxed(), ctx.clone())
            .await;
    }
    if !servlet.is_empty() {
        Pipeline::new(SplitStage::new(options.preferred_part_size))
            .then(TransferStage::upload(
                client.clone(),
                &options,
                Arc::new(CreateAssetServletRequestBuilder),
            ))
            .then(JoinStage::new(None))
            .then(CloseStage)
            .run(stream::iter(servlet).boxed(), ctx)
            .await;
    }
}

enum Prepared {
    Direct(Arc<TransferAsset>),
    Servlet(Arc<TransferAsset>),
    Failed(Arc<TransferAsset>, TransferError),
}

async fn prepare_upload(client: &TransferClient, request: UploadFileRequest) -> Prepared {
    match initiate_upload(client, &request).await {
        Ok(prepared) => prepared,
        Err(error) => Prepared::Failed(Arc::new(base_asset(request)), error),
    }
}

fn base_asset(request: UploadFileRequest) -> TransferAsset {
    let source = match request.source {
        UploadSource::File(path) => AssetLocator::Local(path),
        UploadSource::Blob(blob) => AssetLocator::Memory(blob),
    };
    let event_data = serde_json::json!({ "fileUrl": request.file_url.as_str() });
    TransferAsset::upload(source, request.file_url, request.file_size)
        .with_multipart_headers(request.multipart_headers)
        .with_version_options(UploadVersionOptions {
            create_version: request.create_version,
            version_label: request.version_label,
            version_comment: request.version_comment,
            replace: request.replace,
        })
        .with_event_data(event_data)
}

/// Initiate one file's upload and decide which wire protocol it takes.
async fn initiate_upload(client: &TransferClient, request: &UploadFileRequest) -> Result<Prepared> {
    let initiate_url = folder_endpoint(&request.file_url, ".initiateUpload.json")?;
    let file_name = file_name_of(&request.file_url)?;

    tracing::debug!(url = %initiate_url, file = %file_name, "initiating upload");
    let form = [
        ("fileName", file_name),
        ("fileSize", request.file_size.to_string()),
    ];
    let http_request = client.http().post(initiate_url.clone()).form(&form);
    let response = client.apply_headers(http_request).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(TransferError::from_status(status));
    }
    let initiate: InitiateUploadResponse = response.json().await?;

    let asset = base_asset(request.clone());
    let file_entry = initiate.files.into_iter().next();
    match file_entry {
        Some(entry) if !entry.upload_uris.is_empty() => {
            let uris = entry
                .upload_uris
                .iter()
                .map(|uri| {
                    initiate_url
                        .join(uri)
                        .map_err(|e| TransferError::InvalidUrl(format!("upload URI: {e}")))
                })
                .collect::<Result<Vec<Url>>>()?;
            let complete_uri = initiate.complete_uri.as_deref().ok_or_else(|| {
                TransferError::Protocol("initiate response has no completeURI".to_string())
            })?;
            let complete_uri = initiate_url
                .join(complete_uri)
                .map_err(|e| TransferError::InvalidUrl(format!("completeURI: {e}")))?;

            let mut asset = asset
                .with_upload_uris(uris)
                .with_upload_token(entry.upload_token)
                .with_complete_uri(Some(complete_uri));
            if let Some(mime_type) = entry.mime_type {
                asset = asset.with_content_type(mime_type);
            }
            Ok(Prepared::Direct(Arc::new(asset)))
        }
        _ => {
            let servlet_url = folder_endpoint(&request.file_url, ".createasset.html")?;
            Ok(Prepared::Servlet(Arc::new(
                asset.with_part_endpoint(servlet_url),
            )))
        }
    }
}

/// Build a folder-level endpoint URL, e.g. `/content/dam.initiateUpload.json`
/// for a file at `/content/dam/file-1.jpg`.
fn folder_endpoint(file_url: &Url, suffix: &str) -> Result<Url> {
    let mut folder = file_url.clone();
    folder
        .path_segments_mut()
        .map_err(|_| TransferError::InvalidUrl(format!("{file_url} cannot be a base")))?
        .pop();
    let endpoint = format!("{}{suffix}", folder.as_str().trim_end_matches('/'));
    Url::parse(&endpoint).map_err(|e| TransferError::InvalidUrl(e.to_string()))
}

fn file_name_of(file_url: &Url) -> Result<String> {
    file_url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|segment| !segment.is_empty())
        .map(str::to_string)
        .ok_or_else(|| TransferError::InvalidUrl(format!("{file_url} has no file name")))
}

/// Issues the completion POST of the direct-binary protocol once every
/// part of an asset has been PUT.
struct CompleteUploadFinalizer {
    client: TransferClient,
}

impl AssetFinalizer for CompleteUploadFinalizer {
    fn finalize<'a>(&'a self, asset: &'a TransferAsset) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let Some(complete_uri) = asset.complete_uri() else {
                return Ok(());
            };
            let metadata = asset.metadata();
            let version = asset.version_options();
            let fields = [
                ("fileName", metadata.name.clone()),
                ("fileSize", metadata.size.to_string()),
                ("mimeType", metadata.content_type.clone()),
                ("createVersion", version.create_version.to_string()),
                (
                    "versionLabel",
                    version.version_label.clone().unwrap_or_default(),
                ),
                (
                    "versionComment",
                    version.version_comment.clone().unwrap_or_default(),
                ),
                ("replace", version.replace.to_string()),
                (
                    "uploadToken",
                    asset.upload_token().unwrap_or_default().to_string(),
                ),
                (
                    "uploadDuration",
                    asset.started().elapsed().as_millis().to_string(),
                ),
            ];

            tracing::debug!(url = %complete_uri, file = %metadata.name, "completing upload");
            let request = self.client.http().post(complete_uri.clone()).form(&fields);
            let response = self.client.apply_headers(request).send().await?;
            let status = response.status();
            if !status.is_success() {
                return Err(TransferError::from_status(status));
            }
            Ok(())
        })
    }
}
