//! Split stage: fan each asset into transfer parts.

use std::sync::Arc;

use futures_util::stream::{BoxStream, StreamExt};

use crate::error::TransferError;
use crate::events::TransferEvent;
use crate::types::asset::{TransferAsset, TransferDirection};
use crate::types::part::{ByteRange, TransferPart};

use super::executor::{PipelineContext, PipelineStage};

/// Fans each asset into its transfer parts.
///
/// Uploads carrying pre-signed URIs are split into exactly one part per
/// URI; everything else is split into `ceil(size / preferred_part_size)`
/// parts against the asset's single part URL. Parts are yielded in
/// ascending range order.
pub struct SplitStage {
    preferred_part_size: u64,
}

impl SplitStage {
    /// Create a split stage with the given preferred part size.
    pub fn new(preferred_part_size: u64) -> Self {
        Self {
            preferred_part_size,
        }
    }

    fn split_asset(&self, ctx: &PipelineContext, asset: Arc<TransferAsset>) -> Vec<TransferPart> {
        ctx.controller.emit(TransferEvent::CreateTransferParts {
            asset: Arc::clone(&asset),
        });

        let size = asset.metadata().size;
        if size == 0 || self.preferred_part_size == 0 {
            let error = Arc::new(TransferError::InvalidOptions(format!(
                "cannot split {}: size {} with part size {}",
                asset.metadata().name,
                size,
                self.preferred_part_size
            )));
            if asset.fail(Arc::clone(&error)) {
                ctx.controller.emit(TransferEvent::Error {
                    asset,
                    error,
                    first_error: true,
                });
            }
            return Vec::new();
        }

        let uris = asset.upload_uris();
        if asset.direction() == TransferDirection::Upload && !uris.is_empty() {
            let ranges = ranges_by_count(size, uris.len());
            let count = ranges.len();
            tracing::debug!(
                name = %asset.metadata().name,
                parts = count,
                "split asset across pre-signed URIs"
            );
            return ranges
                .into_iter()
                .zip(uris.iter().cloned())
                .enumerate()
                .map(|(i, (range, url))| {
                    TransferPart::new(Arc::clone(&asset), range, url, i, count)
                })
                .collect();
        }

        let Some(url) = asset.part_url().cloned() else {
            let error = Arc::new(TransferError::InvalidOptions(format!(
                "asset {} has no remote endpoint",
                asset.metadata().name
            )));
            if asset.fail(Arc::clone(&error)) {
                ctx.controller.emit(TransferEvent::Error {
                    asset,
                    error,
                    first_error: true,
                });
            }
            return Vec::new();
        };

        let part_size = if asset.accept_ranges() {
            self.preferred_part_size
        } else {
            size
        };
        let ranges = ranges_by_size(size, part_size);
        let count = ranges.len();
        tracing::debug!(
            name = %asset.metadata().name,
            parts = count,
            part_size,
            "split asset by preferred part size"
        );
        ranges
            .into_iter()
            .enumerate()
            .map(|(i, range)| TransferPart::new(Arc::clone(&asset), range, url.clone(), i, count))
            .collect()
    }
}

impl PipelineStage for SplitStage {
    type In = Arc<TransferAsset>;
    type Out = TransferPart;

    fn execute(
        self: Arc<Self>,
        input: BoxStream<'static, Self::In>,
        ctx: PipelineContext,
    ) -> BoxStream<'static, Self::Out> {
        input
            .flat_map(move |asset| {
                futures_util::stream::iter(self.split_asset(&ctx, asset))
            })
            .boxed()
    }
}

/// Partition `size` bytes into `count` ranges, one per pre-signed URI.
///
/// Range `i` covers `[floor(i*size/count), floor((i+1)*size/count) - 1]`.
fn ranges_by_count(size: u64, count: usize) -> Vec<ByteRange> {
    let count = count as u64;
    (0..count)
        .filter_map(|i| {
            let low = i * size / count;
            let end = (i + 1) * size / count;
            (end > low).then(|| ByteRange::new(low, end - 1))
        })
        .collect()
}

/// Partition `size` bytes into ranges of `part_size` (last range shorter).
fn ranges_by_size(size: u64, part_size: u64) -> Vec<ByteRange> {
    (0..size.div_ceil(part_size))
        .map(|i| {
            let low = i * part_size;
            let high = (low + part_size).min(size) - 1;
            ByteRange::new(low, high)
        })
        .collect()
}
