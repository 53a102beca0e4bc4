//! Bulk file download surface.

use std::sync::Arc;

use futures_util::stream::{self, StreamExt};

use crate::client::TransferClient;
use crate::events::TransferController;
use crate::io::RandomFileAccess;
use crate::pipeline::{CloseStage, JoinStage, Pipeline, PipelineContext, SplitStage, TransferStage};
use crate::types::asset::TransferAsset;
use crate::types::request::DownloadFileRequest;

/// Download a set of remote files to local paths.
///
/// Files are split into ranged parts and transferred through the
/// pipeline; per-file progress and failures surface through the
/// controller's listeners. A failing file never aborts its siblings, and
/// this call does not fail on per-file errors.
///
/// # Examples
/// ```no_run
/// # use std::sync::Arc;
/// # use url::Url;
/// # use bytehaul::{download_files, DownloadFileRequest, TransferClient, TransferController, TransferOptions};
/// # async fn example() -> bytehaul::Result<()> {
/// let client = TransferClient::new(TransferOptions::default())?;
/// let requests = vec![
///     DownloadFileRequest::builder()
///         .file_url(Url::parse("http://localhost/content/dam/photo.jpg").unwrap())
///         .file_path("/tmp/photo.jpg")
///         .file_size(1024)
///         .build()?,
/// ];
/// download_files(&client, requests, Arc::new(TransferController::new())).await;
/// # Ok(())
/// # }
/// ```
pub async fn download_files(
    client: &TransferClient,
    requests: Vec<DownloadFileRequest>,
    controller: Arc<TransferController>,
) {
    let options = client.options().clone();
    let ctx = PipelineContext {
        controller,
        files: Arc::new(RandomFileAccess::new()),
    };

    let assets: Vec<Arc<TransferAsset>> = requests
        .into_iter()
        .map(|request| {
            let event_data = serde_json::json!({
                "fileUrl": request.file_url.as_str(),
                "filePath": request.file_path.display().to_string(),
            });
            Arc::new(
                TransferAsset::download(request.file_url, request.file_path, request.file_size)
                    .with_event_data(event_data),
            )
        })
        .collect();

    tracing::debug!(files = assets.len(), "starting download run");
    Pipeline::new(SplitStage::new(options.preferred_part_size))
        .then(TransferStage::download(client.clone(), &options))
        .then(JoinStage::new(None))
        .then(CloseStage)
        .run(stream::iter(assets).boxed(), ctx)
        .await;
}
