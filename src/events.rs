//! Transfer lifecycle events and the controller that dispatches them.

use std::fmt;
use std::sync::Arc;

use crate::error::SharedError;
use crate::types::asset::TransferAsset;

/// A pipeline lifecycle event for one asset.
///
/// For a given asset the controller guarantees the ordering
/// `CreateTransferParts` < any `JoinTransferParts` <
/// `AfterJoinTransferParts`, and `Error` fires at most once.
#[derive(Debug, Clone)]
pub enum TransferEvent {
    /// The split stage is about to fan an asset into parts.
    CreateTransferParts {
        /// The asset entering the pipeline.
        asset: Arc<TransferAsset>,
    },
    /// One part of an asset completed.
    JoinTransferParts {
        /// The asset the part belongs to.
        asset: Arc<TransferAsset>,
        /// Cumulative bytes transferred for the asset.
        transfer_bytes: u64,
    },
    /// Every part of an asset completed successfully.
    AfterJoinTransferParts {
        /// The completed asset.
        asset: Arc<TransferAsset>,
    },
    /// The asset failed; fired once, for the first error only.
    Error {
        /// The failed asset.
        asset: Arc<TransferAsset>,
        /// The error that failed the asset.
        error: SharedError,
        /// Whether this was the asset's first error (always true; later
        /// errors are swallowed by first-error-wins).
        first_error: bool,
    },
}

impl TransferEvent {
    /// The asset this event refers to.
    pub fn asset(&self) -> &Arc<TransferAsset> {
        match self {
            Self::CreateTransferParts { asset }
            | Self::JoinTransferParts { asset, .. }
            | Self::AfterJoinTransferParts { asset }
            | Self::Error { asset, .. } => asset,
        }
    }
}

/// Observes raw pipeline events.
pub trait TransferObserver: Send + Sync {
    /// Called for every event the pipeline emits.
    fn on_event(&self, event: &TransferEvent);
}

impl<F> TransferObserver for F
where
    F: Fn(&TransferEvent) + Send + Sync,
{
    fn on_event(&self, event: &TransferEvent) {
        self(event);
    }
}

/// File-level progress callbacks, the surface most callers want.
///
/// The controller derives these from pipeline events: `filestart` from
/// `CreateTransferParts`, `fileprogress` from `JoinTransferParts`,
/// `fileend` from `AfterJoinTransferParts`, and `fileerror` from the
/// asset's first `Error`.
pub trait TransferListener: Send + Sync {
    /// A file entered the pipeline.
    fn on_file_start(&self, _asset: &TransferAsset) {}

    /// A part of a file completed; `transferred` is cumulative.
    fn on_file_progress(&self, _asset: &TransferAsset, _transferred: u64) {}

    /// A file completed successfully.
    fn on_file_end(&self, _asset: &TransferAsset) {}

    /// A file failed; at most once per file.
    fn on_file_error(&self, _asset: &TransferAsset, _error: &SharedError) {}
}

/// Event bus shared by the pipeline stages.
///
/// Observers and listeners are registered before the run starts and are
/// invoked in registration order.
#[derive(Default)]
pub struct TransferController {
    observers: Vec<Arc<dyn TransferObserver>>,
    listeners: Vec<Arc<dyn TransferListener>>,
}

impl TransferController {
    /// Create a controller with no observers or listeners.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an observer for raw pipeline events.
    pub fn add_observer(&mut self, observer: Arc<dyn TransferObserver>) {
        self.observers.push(observer);
    }

    /// Register a listener for file-level events.
    pub fn add_listener(&mut self, listener: Arc<dyn TransferListener>) {
        self.listeners.push(listener);
    }

    /// Dispatch an event to observers, then map it to file-level callbacks.
    pub(crate) fn emit(&self, event: TransferEvent) {
        for observer in &self.observers {
            observer.on_event(&event);
        }
        match &event {
            TransferEvent::CreateTransferParts { asset } => {
                for listener in &self.listeners {
                    listener.on_file_start(asset);
                }
            }
            TransferEvent::JoinTransferParts {
                asset,
                transfer_bytes,
            } => {
                for listener in &self.listeners {
                    listener.on_file_progress(asset, *transfer_bytes);
                }
            }
            TransferEvent::AfterJoinTransferParts { asset } => {
                for listener in &self.listeners {
                    listener.on_file_end(asset);
                }
            }
            TransferEvent::Error {
                asset,
                error,
                first_error,
            } => {
                if *first_error {
                    for listener in &self.listeners {
                        listener.on_file_error(asset, error);
                    }
                }
            }
        }
    }
}

impl fmt::Debug for TransferController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransferController")
            .field("observers", &self.observers.len())
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::sync::Mutex;

    use url::Url;

    use crate::error::TransferError;

    use super::*;

    fn asset() -> Arc<TransferAsset> {
        Arc::new(TransferAsset::download(
            Url::parse("http://localhost/file.bin").unwrap(),
            PathBuf::from("/tmp/file.bin"),
            12,
        ))
    }

    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<String>>,
    }

    impl TransferListener for Recorder {
        fn on_file_start(&self, asset: &TransferAsset) {
            self.calls
                .lock()
                .unwrap()
                .push(format!("start {}", asset.metadata().name));
        }

        fn on_file_progress(&self, _asset: &TransferAsset, transferred: u64) {
            self.calls
                .lock()
                .unwrap()
                .push(format!("progress {transferred}"));
        }

        fn on_file_end(&self, asset: &TransferAsset) {
            self.calls
                .lock()
                .unwrap()
                .push(format!("end {}", asset.metadata().name));
        }

        fn on_file_error(&self, _asset: &TransferAsset, error: &SharedError) {
            self.calls.lock().unwrap().push(format!("error {error}"));
        }
    }

    #[test]
    fn events_map_to_file_callbacks() {
        let recorder = Arc::new(Recorder::default());
        let mut controller = TransferController::new();
        controller.add_listener(recorder.clone());

        let asset = asset();
        controller.emit(TransferEvent::CreateTransferParts {
            asset: asset.clone(),
        });
        controller.emit(TransferEvent::JoinTransferParts {
            asset: asset.clone(),
            transfer_bytes: 7,
        });
        controller.emit(TransferEvent::JoinTransferParts {
            asset: asset.clone(),
            transfer_bytes: 12,
        });
        controller.emit(TransferEvent::AfterJoinTransferParts {
            asset: asset.clone(),
        });

        let calls = recorder.calls.lock().unwrap();
        assert_eq!(
            *calls,
            vec!["start file.bin", "progress 7", "progress 12", "end file.bin"]
        );
    }

    #[test]
    fn non_first_errors_are_not_reemitted() {
        let recorder = Arc::new(Recorder::default());
        let mut controller = TransferController::new();
        controller.add_listener(recorder.clone());

        let asset = asset();
        let error = Arc::new(TransferError::InvalidOptions("bad".to_string()));
        controller.emit(TransferEvent::Error {
            asset: asset.clone(),
            error: error.clone(),
            first_error: true,
        });
        controller.emit(TransferEvent::Error {
            asset,
            error,
            first_error: false,
        });

        assert_eq!(recorder.calls.lock().unwrap().len(), 1);
    }

    #[test]
    fn observers_run_in_registration_order() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let mut controller = TransferController::new();
        for id in 0..3 {
            let order = order.clone();
            controller.add_observer(Arc::new(move |_event: &TransferEvent| {
                order.lock().unwrap().push(id);
            }));
        }

        controller.emit(TransferEvent::CreateTransferParts { asset: asset() });
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn event_exposes_its_asset() {
        let asset = asset();
        let event = TransferEvent::CreateTransferParts {
            asset: asset.clone(),
        };
        assert!(Arc::ptr_eq(event.asset(), &asset));
    }
}
