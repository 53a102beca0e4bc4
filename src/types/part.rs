//! Part records derived from an asset by the split stage.

use std::sync::Arc;

use url::Url;

use super::asset::TransferAsset;

/// A contiguous inclusive byte range `[low, high]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    /// First byte offset covered by the range.
    pub low: u64,
    /// Last byte offset covered by the range.
    pub high: u64,
}

impl ByteRange {
    /// Create a range covering `[low, high]`.
    pub fn new(low: u64, high: u64) -> Self {
        Self { low, high }
    }

    /// Number of bytes covered by the range.
    pub fn len(&self) -> u64 {
        self.high - self.low + 1
    }

    /// Ranges always cover at least one byte.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Render the range as an HTTP `Range` header value.
    pub fn to_header_value(&self) -> String {
        format!("bytes={}-{}", self.low, self.high)
    }
}

/// One part of an asset, transferred by a single HTTP call.
///
/// Created by the split stage, executed exactly once by the transfer
/// stage, and aggregated by the join stage. Holds a shared reference to
/// its asset for the whole trip.
#[derive(Debug, Clone)]
pub struct TransferPart {
    asset: Arc<TransferAsset>,
    range: ByteRange,
    url: Url,
    part_index: usize,
    part_count: usize,
    failed: bool,
}

impl TransferPart {
    /// Create a part covering `range` of `asset`, aimed at `url`.
    pub fn new(
        asset: Arc<TransferAsset>,
        range: ByteRange,
        url: Url,
        part_index: usize,
        part_count: usize,
    ) -> Self {
        Self {
            asset,
            range,
            url,
            part_index,
            part_count,
            failed: false,
        }
    }

    /// The asset this part belongs to.
    pub fn asset(&self) -> &Arc<TransferAsset> {
        &self.asset
    }

    /// Byte range covered by this part.
    pub fn range(&self) -> ByteRange {
        self.range
    }

    /// The URL this part must hit.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Zero-based position of this part within its asset.
    pub fn part_index(&self) -> usize {
        self.part_index
    }

    /// Total number of parts the asset was split into.
    pub fn part_count(&self) -> usize {
        self.part_count
    }

    /// Declared total size of the asset.
    pub fn total_size(&self) -> u64 {
        self.asset.metadata().size
    }

    /// Content type of the asset's bytes.
    pub fn content_type(&self) -> &str {
        &self.asset.metadata().content_type
    }

    /// Target file name of the asset.
    pub fn target_name(&self) -> &str {
        &self.asset.metadata().name
    }

    /// Whether this part covers only a chunk of the asset.
    pub fn is_chunk(&self) -> bool {
        self.range.len() < self.total_size()
    }

    /// Whether this part marks an exhausted-retries failure.
    pub fn is_failed(&self) -> bool {
        self.failed
    }

    /// Tag this part as the failure marker for its asset.
    pub(crate) fn into_failed(mut self) -> Self {
        self.failed = true;
        self
    }
}
