use crate::history_store::HistoryStore;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Context provided to jobs during execution.
#[derive(Clone)]
pub struct JobContext {
    /// Token to check for cancellation/shutdown requests.
    pub cancellation_token: CancellationToken,

    /// Access to the catalog and listening history.
    pub history_store: Arc<dyn HistoryStore>,
}

impl JobContext {
    pub fn new(cancellation_token: CancellationToken, history_store: Arc<dyn HistoryStore>) -> Self {
        Self {
            cancellation_token,
            history_store,
        }
    }

    /// Same store, with a token derived from this context's token.
    pub fn child(&self) -> Self {
        Self {
            cancellation_token: self.cancellation_token.child_token(),
            history_store: Arc::clone(&self.history_store),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation_token.is_cancelled()
    }
}
