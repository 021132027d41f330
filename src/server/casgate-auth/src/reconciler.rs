//! Proxy-granting ticket reconciliation.
//!
//! When a validation response carries a `proxyGrantingTicket`, the value is
//! only an IOU. The CAS server delivers the real ticket in a separate request
//! to the proxy callback, which may land after the validation response has
//! been read. The reconciler polls the store for a bounded window, then binds
//! the ticket to the username.

use std::sync::Arc;

use tracing::{debug, info, warn};

use casgate_storage::{PendingProxyIou, ProxyTicketStore};

use crate::{AuthError, ReconcilePolicy};

/// Binds PGT IOUs from validation responses to delivered tickets.
#[derive(Clone)]
pub struct ProxyReconciler {
    store: Arc<dyn ProxyTicketStore>,
    policy: ReconcilePolicy,
}

impl ProxyReconciler {
    /// Creates a reconciler over `store`.
    pub fn new(store: Arc<dyn ProxyTicketStore>, policy: ReconcilePolicy) -> Self {
        Self { store, policy }
    }

    /// Consumes the IOU `pgt_iou` and stores its ticket as `username`'s
    /// proxy-granting ticket.
    ///
    /// The wait is bounded by the number of lookups, not by a clock: a lookup
    /// in flight is never cancelled, since it may already have consumed the IOU.
    ///
    /// # Errors
    ///
    /// - [`AuthError::TicketResolutionTimeout`] if the callback never delivered the IOU
    /// - [`AuthError::Persistence`] if the store fails
    pub async fn resolve(&self, pgt_iou: &str, username: &str) -> Result<(), AuthError> {
        let attempts = self.policy.max_attempts.max(1);

        let Some(iou) = self.await_iou(pgt_iou).await? else {
            warn!(
                pgt_iou = %pgt_iou,
                attempts,
                "Proxy callback did not deliver the PGT in time"
            );
            return Err(AuthError::TicketResolutionTimeout {
                iou: pgt_iou.to_string(),
                attempts,
            });
        };

        // The IOU is already consumed; a failure below leaves the user without
        // proxy capability but never lets the IOU be reused.
        let existing = self.store.get_record(username).await?;
        self.store
            .upsert_record(username, &iou.ticket_granting_ticket)
            .await?;

        if existing.is_some() {
            debug!(username = %username, "Proxy ticket record updated");
        } else {
            debug!(username = %username, "Proxy ticket record created");
        }

        Ok(())
    }

    /// Polls the store until the IOU shows up or the attempts run out.
    async fn await_iou(&self, pgt_iou: &str) -> Result<Option<PendingProxyIou>, AuthError> {
        let attempts = self.policy.max_attempts.max(1);

        for attempt in 1..=attempts {
            if let Some(iou) = self.store.take_iou(pgt_iou).await? {
                debug!(pgt_iou = %pgt_iou, attempt, "PGT IOU resolved");
                return Ok(Some(iou));
            }

            if attempt < attempts {
                debug!(pgt_iou = %pgt_iou, attempt, "PGT IOU not delivered yet, retrying");
                tokio::time::sleep(self.policy.retry_interval()).await;
            }
        }

        Ok(None)
    }
}

/// Records a PGT delivered to the proxy callback.
///
/// This is the writer side of the handshake: the CAS server calls the
/// callback URL with `pgtIou` and `pgtId`, and the pair is stored until a
/// reconciler consumes it.
///
/// # Errors
///
/// - [`AuthError::InvalidInput`] if either value is empty
/// - [`AuthError::Persistence`] if the store fails
pub async fn accept_callback(
    store: &dyn ProxyTicketStore,
    pgt_iou: &str,
    pgt_id: &str,
) -> Result<(), AuthError> {
    let pgt_iou = pgt_iou.trim();
    let pgt_id = pgt_id.trim();

    if pgt_iou.is_empty() || pgt_id.is_empty() {
        return Err(AuthError::InvalidInput(
            "pgtIou and pgtId are both required".into(),
        ));
    }

    store.put_iou(&PendingProxyIou::new(pgt_iou, pgt_id)).await?;

    info!(pgt_iou = %pgt_iou, "Proxy-granting ticket received");

    Ok(())
}
