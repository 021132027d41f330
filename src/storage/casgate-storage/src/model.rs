//! Stored record types.

use serde::{Deserialize, Serialize};

/// A proxy-granting ticket delivered by the CAS server to the callback,
/// waiting to be matched with a validation response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingProxyIou {
    /// IOU identifier (`pgtIou`), as found in the validation response.
    pub iou: String,
    /// The actual proxy-granting ticket (`pgtId`).
    pub ticket_granting_ticket: String,
    /// Unix seconds when the callback stored it.
    pub created_at: i64,
}

impl PendingProxyIou {
    /// Creates an IOU stamped with the current time.
    pub fn new(iou: impl Into<String>, ticket_granting_ticket: impl Into<String>) -> Self {
        Self {
            iou: iou.into(),
            ticket_granting_ticket: ticket_granting_ticket.into(),
            created_at: unix_now(),
        }
    }
}

/// The proxy-granting ticket currently held for a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyTicketRecord {
    /// CAS username.
    pub username: String,
    /// Proxy-granting ticket used to request proxy tickets.
    pub ticket_granting_ticket: String,
    /// Unix seconds of the last write.
    pub updated_at: i64,
}

/// Returns the current Unix timestamp.
pub fn unix_now() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}
