//! Proxy ticket issuance.
//!
//! Once a user's proxy-granting ticket is stored, the service can ask the CAS
//! server for proxy tickets to reach other services on the user's behalf.

use std::sync::Arc;

use reqwest::Client;
use tracing::{debug, warn};

use casgate_protocol::{ProxyRequest, ServiceResponse};
use casgate_storage::ProxyTicketStore;

use crate::{AuthError, CasConfig};

/// Client for the CAS `/proxy` endpoint.
pub struct ProxyTicketClient {
    client: Client,
    config: Arc<CasConfig>,
    store: Arc<dyn ProxyTicketStore>,
}

impl ProxyTicketClient {
    /// Creates a proxy ticket client.
    pub fn new(config: Arc<CasConfig>, store: Arc<dyn ProxyTicketStore>) -> Result<Self, AuthError> {
        let client = config.http_client()?;

        Ok(Self {
            client,
            config,
            store,
        })
    }

    /// Requests a proxy ticket for `target_service` using `username`'s stored PGT.
    ///
    /// # Errors
    ///
    /// - [`AuthError::MissingProxyGrant`] if no PGT is stored for the user
    /// - [`AuthError::ProxyRejected`] if the CAS server refuses
    /// - [`AuthError::Transport`] / [`AuthError::MalformedResponse`] as for validation
    pub async fn request_proxy_ticket(
        &self,
        username: &str,
        target_service: &str,
    ) -> Result<String, AuthError> {
        let record = self
            .store
            .get_record(username)
            .await?
            .ok_or_else(|| AuthError::MissingProxyGrant(username.to_string()))?;

        let request = ProxyRequest::new(&record.ticket_granting_ticket, target_service)?;
        let url = self.config.proxy_url()?;

        debug!(username = %username, target_service = %target_service, "Requesting proxy ticket");

        let response = self
            .client
            .get(url)
            .query(&request.query_pairs())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AuthError::Transport(format!("CAS server returned {status}")));
        }

        let body = response.text().await?;

        match ServiceResponse::from_xml(&body)? {
            ServiceResponse::ProxyGranted { proxy_ticket } => Ok(proxy_ticket),
            ServiceResponse::ProxyRejected(failure) => {
                warn!(
                    username = %username,
                    code = failure.code.as_deref().unwrap_or("-"),
                    reason = %failure.message,
                    "CAS server refused to issue a proxy ticket"
                );
                Err(AuthError::ProxyRejected {
                    code: failure.code,
                    message: failure.message,
                })
            },
            _ => Err(AuthError::MalformedResponse(
                "unexpected validation response".into(),
            )),
        }
    }
}
