//! The staged transfer pipeline.
//!
//! Assets flow in as a lazy sequence, the split stage fans them into
//! parts, the transfer stage executes parts with bounded concurrency,
//! and the join and close stages aggregate completions and release file
//! handles. A failed-asset filter between stages keeps sibling assets
//! flowing when one fails.

pub mod concurrent;
pub mod executor;
pub mod join;
pub mod split;
pub mod transfer;

pub use concurrent::BoundedConcurrentMap;
pub use executor::{Chained, HasAsset, Pipeline, PipelineContext, PipelineStage, filter_failed_assets};
pub use join::{AssetFinalizer, CloseStage, JoinStage};
pub use split::SplitStage;
pub use transfer::TransferStage;
