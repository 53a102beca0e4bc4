//! Join and close stages: re-aggregate parts into per-asset completion.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use futures_util::future::BoxFuture;
use futures_util::stream::{BoxStream, StreamExt};

use crate::error::Result;
use crate::events::TransferEvent;
use crate::types::asset::TransferAsset;
use crate::types::part::TransferPart;

use super::executor::{PipelineContext, PipelineStage};

/// Runs once all parts of an asset completed, before
/// `AfterJoinTransferParts` is emitted.
///
/// The direct-binary upload protocol uses this seam for its complete
/// call; a finalizer failure becomes the asset's first error and
/// suppresses the completion event.
pub trait AssetFinalizer: Send + Sync {
    /// Finalize a fully transferred asset.
    fn finalize<'a>(&'a self, asset: &'a TransferAsset) -> BoxFuture<'a, Result<()>>;
}

#[derive(Default)]
struct JoinState {
    /// Cumulative bytes and completed part count per in-progress asset,
    /// keyed by asset identity.
    progress: HashMap<usize, (u64, usize)>,
    /// Assets already yielded as terminal.
    terminal: HashSet<usize>,
}

fn asset_key(asset: &Arc<TransferAsset>) -> usize {
    Arc::as_ptr(asset) as usize
}

/// Consumes finished parts and yields each asset once it is terminal.
///
/// Successful parts advance the asset's cumulative byte count and emit
/// `JoinTransferParts`; the last one triggers the optional finalizer and
/// then `AfterJoinTransferParts`. Failed parts yield the asset
/// immediately, and completions arriving for an already-failed asset are
/// discarded without counting.
pub struct JoinStage {
    finalizer: Option<Arc<dyn AssetFinalizer>>,
}

impl JoinStage {
    /// Create a join stage, optionally finalizing each completed asset.
    pub fn new(finalizer: Option<Arc<dyn AssetFinalizer>>) -> Self {
        Self { finalizer }
    }

    async fn process(
        &self,
        state: &mut JoinState,
        ctx: &PipelineContext,
        part: TransferPart,
    ) -> Option<Arc<TransferAsset>> {
        let asset = Arc::clone(part.asset());
        let key = asset_key(&asset);

        if part.is_failed() {
            state.progress.remove(&key);
            if state.terminal.insert(key) {
                return Some(asset);
            }
            return None;
        }

        if asset.has_failed() || state.terminal.contains(&key) {
            // A completion that raced the asset's failure; discard it.
            return None;
        }

        let entry = state.progress.entry(key).or_insert((0, 0));
        entry.0 += part.range().len();
        entry.1 += 1;
        let transfer_bytes = entry.0;
        let completed = entry.1;
        ctx.controller.emit(TransferEvent::JoinTransferParts {
            asset: Arc::clone(&asset),
            transfer_bytes,
        });

        if completed < part.part_count() {
            return None;
        }
        state.progress.remove(&key);
        state.terminal.insert(key);

        if let Some(finalizer) = &self.finalizer {
            if let Err(error) = finalizer.finalize(&asset).await {
                tracing::warn!(
                    name = %asset.metadata().name,
                    error = %error,
                    "asset finalization failed"
                );
                let error = Arc::new(error);
                if asset.fail(Arc::clone(&error)) {
                    ctx.controller.emit(TransferEvent::Error {
                        asset: Arc::clone(&asset),
                        error,
                        first_error: true,
                    });
                }
                return Some(asset);
            }
        }

        ctx.controller.emit(TransferEvent::AfterJoinTransferParts {
            asset: Arc::clone(&asset),
        });
        Some(asset)
    }
}

impl PipelineStage for JoinStage {
    type In = TransferPart;
    type Out = Arc<TransferAsset>;

    fn execute(
        self: Arc<Self>,
        input: BoxStream<'static, Self::In>,
        ctx: PipelineContext,
    ) -> BoxStream<'static, Self::Out> {
        futures_util::stream::unfold(
            (input, JoinState::default(), self, ctx),
            |(mut input, mut state, stage, ctx)| async move {
                while let Some(part) = input.next().await {
                    if let Some(asset) = stage.process(&mut state, &ctx, part).await {
                        return Some((asset, (input, state, stage, ctx)));
                    }
                }
                None
            },
        )
        .boxed()
    }
}

/// Releases each terminal asset's file handle.
pub struct CloseStage;

impl PipelineStage for CloseStage {
    type In = Arc<TransferAsset>;
    type Out = Arc<TransferAsset>;

    fn execute(
        self: Arc<Self>,
        input: BoxStream<'static, Self::In>,
        ctx: PipelineContext,
    ) -> BoxStream<'static, Self::Out> {
        input
            .map(move |asset| {
                if let Some(path) = asset.local_path() {
                    ctx.files.close(path);
                }
                asset
            })
            .boxed()
    }
}
