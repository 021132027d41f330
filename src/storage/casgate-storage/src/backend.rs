//! Proxy ticket store trait definition.

use async_trait::async_trait;

use crate::error::StorageError;
use crate::model::{PendingProxyIou, ProxyTicketRecord};

/// Persistence for proxy-granting ticket state.
///
/// The callback writer and the reconciler reach the store from independent
/// requests. Implementations must make a write from one visible to a
/// subsequent read from the other, and [`take_iou`](Self::take_iou) must be
/// atomic: for a given IOU at most one caller gets `Some`.
#[async_trait]
pub trait ProxyTicketStore: Send + Sync {
    /// Stores an IOU delivered by the CAS server, replacing any previous one
    /// with the same identifier.
    async fn put_iou(&self, iou: &PendingProxyIou) -> Result<(), StorageError>;

    /// Reads an IOU without consuming it.
    async fn get_iou(&self, iou: &str) -> Result<Option<PendingProxyIou>, StorageError>;

    /// Deletes an IOU. Deleting a missing IOU is not an error.
    async fn delete_iou(&self, iou: &str) -> Result<(), StorageError>;

    /// Reads and deletes an IOU in one step.
    async fn take_iou(&self, iou: &str) -> Result<Option<PendingProxyIou>, StorageError>;

    /// Removes IOUs created before `cutoff` (Unix seconds) and returns how
    /// many were removed.
    async fn purge_ious(&self, cutoff: i64) -> Result<u64, StorageError>;

    /// Reads the proxy ticket record of a user.
    async fn get_record(&self, username: &str) -> Result<Option<ProxyTicketRecord>, StorageError>;

    /// Creates or overwrites the proxy ticket record of a user.
    async fn upsert_record(&self, username: &str, ticket_granting_ticket: &str)
        -> Result<(), StorageError>;
}
