//! In-memory store for tests and dev mode.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::{unix_now, PendingProxyIou, ProxyTicketRecord, ProxyTicketStore, StorageError};

/// A [`ProxyTicketStore`] backed by two mutex-guarded maps.
///
/// State is lost when the process exits.
#[derive(Debug, Default)]
pub struct MemoryStore {
    ious: Mutex<HashMap<String, PendingProxyIou>>,
    records: Mutex<HashMap<String, ProxyTicketRecord>>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of IOUs not yet consumed.
    pub async fn pending_ious(&self) -> usize {
        self.ious.lock().await.len()
    }
}

#[async_trait]
impl ProxyTicketStore for MemoryStore {
    async fn put_iou(&self, iou: &PendingProxyIou) -> Result<(), StorageError> {
        if iou.iou.is_empty() {
            return Err(StorageError::InvalidInput("iou cannot be empty".into()));
        }
        self.ious.lock().await.insert(iou.iou.clone(), iou.clone());
        Ok(())
    }

    async fn get_iou(&self, iou: &str) -> Result<Option<PendingProxyIou>, StorageError> {
        Ok(self.ious.lock().await.get(iou).cloned())
    }

    async fn delete_iou(&self, iou: &str) -> Result<(), StorageError> {
        self.ious.lock().await.remove(iou);
        Ok(())
    }

    async fn take_iou(&self, iou: &str) -> Result<Option<PendingProxyIou>, StorageError> {
        Ok(self.ious.lock().await.remove(iou))
    }

    async fn purge_ious(&self, cutoff: i64) -> Result<u64, StorageError> {
        let mut ious = self.ious.lock().await;
        let before = ious.len();
        ious.retain(|_, v| v.created_at >= cutoff);
        Ok((before - ious.len()) as u64)
    }

    async fn get_record(&self, username: &str) -> Result<Option<ProxyTicketRecord>, StorageError> {
        Ok(self.records.lock().await.get(username).cloned())
    }

    async fn upsert_record(
        &self,
        username: &str,
        ticket_granting_ticket: &str,
    ) -> Result<(), StorageError> {
        if username.is_empty() {
            return Err(StorageError::InvalidInput("username cannot be empty".into()));
        }
        let record = ProxyTicketRecord {
            username: username.to_string(),
            ticket_granting_ticket: ticket_granting_ticket.to_string(),
            updated_at: unix_now(),
        };
        self.records.lock().await.insert(username.to_string(), record);
        Ok(())
    }
}
