//! Pipeline composition and execution.

use std::sync::Arc;

use futures_util::future;
use futures_util::stream::{BoxStream, StreamExt};

use crate::events::TransferController;
use crate::io::RandomFileAccess;
use crate::types::asset::TransferAsset;

/// Shared context threaded through every stage.
#[derive(Debug, Clone)]
pub struct PipelineContext {
    /// Event bus the stages emit into.
    pub controller: Arc<TransferController>,
    /// Registry of open local file handles.
    pub files: Arc<RandomFileAccess>,
}

/// Items that carry a back-reference to their asset.
pub trait HasAsset {
    /// The asset this item belongs to.
    fn asset(&self) -> &Arc<TransferAsset>;

    /// Whether this item announces its asset's terminal state downstream.
    ///
    /// Terminal markers survive the failed-asset filter so the join and
    /// close stages observe the asset exactly once.
    fn is_terminal_marker(&self) -> bool {
        false
    }
}

impl HasAsset for crate::types::part::TransferPart {
    fn asset(&self) -> &Arc<TransferAsset> {
        self.asset()
    }

    fn is_terminal_marker(&self) -> bool {
        self.is_failed()
    }
}

impl HasAsset for Arc<TransferAsset> {
    fn asset(&self) -> &Arc<TransferAsset> {
        self
    }

    // An asset item is its own terminal marker.
    fn is_terminal_marker(&self) -> bool {
        true
    }
}

/// One async transformation over the item sequence.
pub trait PipelineStage: Send + Sync + 'static {
    /// Item type consumed by the stage.
    type In: Send + 'static;
    /// Item type produced by the stage.
    type Out: Send + 'static;

    /// Transform the input sequence into the output sequence.
    fn execute(
        self: Arc<Self>,
        input: BoxStream<'static, Self::In>,
        ctx: PipelineContext,
    ) -> BoxStream<'static, Self::Out>;
}

/// Drop items whose asset has already failed.
///
/// Terminal markers pass through so downstream stages still observe the
/// failed asset once; everything else belonging to a failed asset is
/// discarded, which is what keeps sibling assets flowing after a failure.
pub fn filter_failed_assets<T>(input: BoxStream<'static, T>) -> BoxStream<'static, T>
where
    T: HasAsset + Send + 'static,
{
    input
        .filter(|item| {
            let keep = !item.asset().has_failed() || item.is_terminal_marker();
            future::ready(keep)
        })
        .boxed()
}

/// Two stages glued together with the failed-asset filter between them.
pub struct Chained<A, B> {
    first: Arc<A>,
    second: Arc<B>,
}

impl<A, B> PipelineStage for Chained<A, B>
where
    A: PipelineStage,
    B: PipelineStage<In = A::Out>,
    A::Out: HasAsset,
{
    type In = A::In;
    type Out = B::Out;

    fn execute(
        self: Arc<Self>,
        input: BoxStream<'static, Self::In>,
        ctx: PipelineContext,
    ) -> BoxStream<'static, Self::Out> {
        let mid = Arc::clone(&self.first).execute(input, ctx.clone());
        let filtered = filter_failed_assets(mid);
        Arc::clone(&self.second).execute(filtered, ctx)
    }
}

/// An ordered composition of stages driven to exhaustion.
///
/// # Examples
/// ```no_run
/// # use std::sync::Arc;
/// # use futures_util::stream::{self, StreamExt};
/// # use bytehaul::pipeline::{Pipeline, PipelineContext, SplitStage, JoinStage, CloseStage, TransferStage};
/// # use bytehaul::{TransferClient, TransferOptions, TransferController, RandomFileAccess};
/// # async fn example(client: TransferClient, assets: Vec<Arc<bytehaul::TransferAsset>>) {
/// let options = client.options().clone();
/// let ctx = PipelineContext {
///     controller: Arc::new(TransferController::new()),
///     files: Arc::new(RandomFileAccess::new()),
/// };
/// Pipeline::new(SplitStage::new(options.preferred_part_size))
///     .then(TransferStage::download(client, &options))
///     .then(JoinStage::new(None))
///     .then(CloseStage)
///     .run(stream::iter(assets).boxed(), ctx)
///     .await;
/// # }
/// ```
pub struct Pipeline<S> {
    stage: S,
}

struct CloseAllGuard(Arc<RandomFileAccess>);

impl Drop for CloseAllGuard {
    fn drop(&mut self) {
        self.0.close_all();
    }
}

impl<S: PipelineStage> Pipeline<S> {
    /// Start a pipeline with its first stage.
    pub fn new(stage: S) -> Self {
        Self { stage }
    }

    /// Append a stage, filtering failed assets between the two.
    pub fn then<N>(self, next: N) -> Pipeline<Chained<S, N>>
    where
        N: PipelineStage<In = S::Out>,
        S::Out: HasAsset,
    {
        Pipeline {
            stage: Chained {
                first: Arc::new(self.stage),
                second: Arc::new(next),
            },
        }
    }

    /// Drive the composed stages over `input` until exhaustion.
    ///
    /// Every open file handle is released when this returns, on success,
    /// failure, or unwind.
    pub async fn run(self, input: BoxStream<'static, S::In>, ctx: PipelineContext) {
        let _guard = CloseAllGuard(Arc::clone(&ctx.files));
        let mut output = Arc::new(self.stage).execute(input, ctx);
        while output.next().await.is_some() {}
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::sync::Arc;

    use bytes::Bytes;
    use futures_util::stream;
    use url::Url;

    use crate::error::TransferError;
    use crate::types::part::{ByteRange, TransferPart};

    use super::*;

    fn asset() -> Arc<TransferAsset> {
        Arc::new(TransferAsset::download(
            Url::parse("http://localhost/file.bin").unwrap(),
            PathBuf::from("/tmp/file.bin"),
            12,
        ))
    }

    fn part_of(asset: &Arc<TransferAsset>, low: u64, high: u64) -> TransferPart {
        let url = asset.part_url().unwrap().clone();
        TransferPart::new(Arc::clone(asset), ByteRange::new(low, high), url, 0, 2)
    }

    #[tokio::test]
    async fn filter_drops_parts_of_failed_assets() {
        let healthy = asset();
        let failed = asset();
        failed.fail(Arc::new(TransferError::InvalidOptions("bad".into())));

        let parts = vec![
            part_of(&healthy, 0, 6),
            part_of(&failed, 0, 6),
            part_of(&healthy, 7, 11),
        ];
        let kept: Vec<TransferPart> =
            filter_failed_assets(stream::iter(parts).boxed()).collect().await;
        assert_eq!(kept.len(), 2);
        assert!(kept.iter().all(|p| Arc::ptr_eq(p.asset(), &healthy)));
    }

    #[tokio::test]
    async fn filter_keeps_terminal_markers() {
        let failed = asset();
        failed.fail(Arc::new(TransferError::InvalidOptions("bad".into())));

        let marker = part_of(&failed, 0, 6).into_failed();
        let kept: Vec<TransferPart> =
            filter_failed_assets(stream::iter(vec![marker]).boxed()).collect().await;
        assert_eq!(kept.len(), 1);
        assert!(kept[0].is_failed());
    }

    #[tokio::test]
    async fn close_all_runs_even_when_a_stage_panics() {
        struct PanicStage;
        impl PipelineStage for PanicStage {
            type In = Arc<TransferAsset>;
            type Out = Arc<TransferAsset>;
            fn execute(
                self: Arc<Self>,
                input: BoxStream<'static, Self::In>,
                _ctx: PipelineContext,
            ) -> BoxStream<'static, Self::Out> {
                input.map(|_asset| panic!("stage blew up")).boxed()
            }
        }

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("file.bin");
        let files = Arc::new(crate::io::RandomFileAccess::new());
        files
            .write_at(&path, 0, Bytes::from_static(b"x"))
            .await
            .unwrap();
        assert_eq!(files.open_count(), 1);

        let ctx = PipelineContext {
            controller: Arc::new(TransferController::new()),
            files: Arc::clone(&files),
        };
        let run = Pipeline::new(PanicStage).run(stream::iter(vec![asset()]).boxed(), ctx);
        let result = tokio::spawn(run).await;
        assert!(result.is_err());
        assert_eq!(files.open_count(), 0);
    }
}
