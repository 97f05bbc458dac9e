use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::models::{MaterialDelta, MaterialRecord};

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("could not load materials from the record source: {0}")]
    Backend(#[from] sqlx::Error),
}

#[derive(Debug, Error)]
pub enum DeleteError {
    #[error("material {id} was not deleted: {source}")]
    Backend {
        id: String,
        #[source]
        source: sqlx::Error,
    },
}

/// Live delta stream for one owner's materials.
///
/// Dropping the subscription aborts the listener task, so a torn-down view
/// can never be updated after disposal.
pub struct Subscription {
    deltas: mpsc::Receiver<MaterialDelta>,
    listener: JoinHandle<()>,
}

impl Subscription {
    pub fn new(deltas: mpsc::Receiver<MaterialDelta>, listener: JoinHandle<()>) -> Self {
        Self { deltas, listener }
    }

    pub async fn next_delta(&mut self) -> Option<MaterialDelta> {
        self.deltas.recv().await
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.listener.abort();
    }
}

/// Contract the dashboard holds against the remote materials backend.
///
/// `fetch_all` returns the owner's records sorted by `created_at`
/// descending. `delete_record` must not be mirrored optimistically into
/// local state; callers wait for the corresponding DELETE delta.
#[allow(async_fn_in_trait)]
pub trait RecordSource {
    async fn fetch_all(&self, owner: Uuid) -> Result<Vec<MaterialRecord>, FetchError>;

    async fn subscribe(&self, owner: Uuid) -> Result<Subscription, FetchError>;

    async fn delete_record(&self, id: &str) -> Result<(), DeleteError>;
}
