//! Authentication context types.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::ValidatedTicket;

/// How the principal reached the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMethod {
    /// Service ticket presented directly by the user's browser.
    ServiceTicket,
    /// Proxy ticket presented by an intermediate service.
    ProxyTicket,
}

/// Authenticated user context.
///
/// Returned by [`AuthBackend::authenticate`](crate::AuthBackend::authenticate)
/// after the ticket was validated and the proxy chain accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthContext {
    /// CAS username.
    pub username: String,

    /// Proxy chain, most recent proxy first. Empty for service tickets.
    pub proxies: Vec<String>,

    /// Attributes released by the CAS server.
    pub attributes: BTreeMap<String, String>,

    /// PGT IOU, set when a proxy-granting ticket was stored for the user.
    pub proxy_granting_ticket: Option<String>,

    /// Authentication method used.
    pub auth_method: AuthMethod,
}

impl AuthContext {
    /// Whether the service may request proxy tickets on this user's behalf.
    pub fn can_proxy(&self) -> bool {
        self.proxy_granting_ticket.is_some()
    }
}

impl From<ValidatedTicket> for AuthContext {
    fn from(ticket: ValidatedTicket) -> Self {
        let auth_method = if ticket.proxies.is_empty() {
            AuthMethod::ServiceTicket
        } else {
            AuthMethod::ProxyTicket
        };

        Self {
            username: ticket.username,
            proxies: ticket.proxies,
            attributes: ticket.attributes,
            proxy_granting_ticket: ticket.pgt,
            auth_method,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_from_proxy_chain() {
        let direct = AuthContext::from(ValidatedTicket {
            username: "alice".into(),
            proxies: vec![],
            attributes: BTreeMap::new(),
            pgt: None,
        });
        assert_eq!(direct.auth_method, AuthMethod::ServiceTicket);
        assert!(!direct.can_proxy());

        let proxied = AuthContext::from(ValidatedTicket {
            username: "alice".into(),
            proxies: vec!["https://portal/pgt".into()],
            attributes: BTreeMap::new(),
            pgt: Some("PGTIOU-1".into()),
        });
        assert_eq!(proxied.auth_method, AuthMethod::ProxyTicket);
        assert!(proxied.can_proxy());

        let json = serde_json::to_value(&proxied).unwrap();
        assert_eq!(json["auth_method"], "proxy_ticket");
    }
}
