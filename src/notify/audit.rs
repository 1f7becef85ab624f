use async_trait::async_trait;

use crate::error::AppError;
use crate::models::history::HistoryEntry;
use crate::store::Store;

#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn append(&self, entry: HistoryEntry) -> Result<(), AppError>;
}

/// Writes history rows into the entity store's append-only table.
#[derive(Clone)]
pub struct StoreAuditSink {
    store: Store,
}

impl StoreAuditSink {
    pub fn new(store: Store) -> Self {
        Self { store }
    }
}

#[async_trait]
impl AuditSink for StoreAuditSink {
    async fn append(&self, entry: HistoryEntry) -> Result<(), AppError> {
        self.store.append_history(entry).await;
        Ok(())
    }
}
