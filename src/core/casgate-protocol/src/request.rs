//! Request parameters for CAS endpoints.

use url::Url;

use crate::ProtocolError;

/// Parameters of a `/proxyValidate` call.
///
/// Built once per validation; the query pairs are emitted in the order the
/// CAS server documents them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationRequest {
    ticket: String,
    service: String,
    renew: bool,
    proxy_callback: Option<Url>,
}

impl ValidationRequest {
    /// Creates a validation request for a service ticket.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::InvalidRequest`] if the ticket is empty or the
    /// service is not an absolute URL.
    pub fn new(ticket: &str, service: &str) -> Result<Self, ProtocolError> {
        let ticket = ticket.trim();
        if ticket.is_empty() {
            return Err(ProtocolError::InvalidRequest("ticket cannot be empty".into()));
        }

        let service = service.trim();
        if service.is_empty() {
            return Err(ProtocolError::InvalidRequest("service cannot be empty".into()));
        }
        Url::parse(service)
            .map_err(|e| ProtocolError::InvalidRequest(format!("service is not a URL: {e}")))?;

        Ok(Self {
            ticket: ticket.to_string(),
            service: service.to_string(),
            renew: false,
            proxy_callback: None,
        })
    }

    /// Forces the CAS server to require primary credentials.
    pub fn with_renew(mut self, renew: bool) -> Self {
        self.renew = renew;
        self
    }

    /// Asks the CAS server to deliver a proxy-granting ticket to `callback`.
    pub fn with_proxy_callback(mut self, callback: Option<Url>) -> Self {
        self.proxy_callback = callback;
        self
    }

    /// The service ticket being validated.
    pub fn ticket(&self) -> &str {
        &self.ticket
    }

    /// The service URL the ticket was issued for.
    pub fn service(&self) -> &str {
        &self.service
    }

    /// Query parameters: `ticket`, `service`, then `pgtUrl` and `renew` when set.
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![
            ("ticket", self.ticket.clone()),
            ("service", self.service.clone()),
        ];
        if let Some(callback) = &self.proxy_callback {
            pairs.push(("pgtUrl", callback.to_string()));
        }
        if self.renew {
            pairs.push(("renew", "true".to_string()));
        }
        pairs
    }
}

/// Parameters of a `/proxy` call, exchanging a PGT for a proxy ticket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyRequest {
    pgt: String,
    target_service: String,
}

impl ProxyRequest {
    /// Creates a proxy ticket request.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::InvalidRequest`] if either value is empty.
    pub fn new(pgt: &str, target_service: &str) -> Result<Self, ProtocolError> {
        if pgt.trim().is_empty() {
            return Err(ProtocolError::InvalidRequest("pgt cannot be empty".into()));
        }
        if target_service.trim().is_empty() {
            return Err(ProtocolError::InvalidRequest(
                "target service cannot be empty".into(),
            ));
        }

        Ok(Self {
            pgt: pgt.trim().to_string(),
            target_service: target_service.trim().to_string(),
        })
    }

    /// Query parameters: `pgt`, `targetService`.
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        vec![
            ("pgt", self.pgt.clone()),
            ("targetService", self.target_service.clone()),
        ]
    }
}
