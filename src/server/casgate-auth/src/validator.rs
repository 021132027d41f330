//! Service ticket validation against `/proxyValidate`.

use std::collections::BTreeMap;
use std::sync::Arc;

use reqwest::Client;
use tracing::{debug, error, warn};

use casgate_protocol::{ServiceResponse, ValidationRequest};

use crate::{AuthError, CasConfig, ProxyReconciler};

/// A ticket the CAS server vouched for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedTicket {
    /// Authenticated principal.
    pub username: String,
    /// Proxy chain, most recent proxy first.
    pub proxies: Vec<String>,
    /// Released attributes.
    pub attributes: BTreeMap<String, String>,
    /// PGT IOU, only when the proxy-granting ticket was stored.
    pub pgt: Option<String>,
}

/// Outcome of [`TicketValidator::validate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationResult {
    /// The ticket is valid.
    Success {
        /// Authenticated principal.
        username: String,
        /// Proxy chain, most recent proxy first.
        proxies: Vec<String>,
        /// Released attributes.
        attributes: BTreeMap<String, String>,
        /// PGT IOU, only when the proxy-granting ticket was stored.
        pgt: Option<String>,
    },
    /// The ticket is not valid or could not be checked.
    Failure {
        /// Server supplied text for rejections, error description otherwise.
        reason: String,
    },
}

impl ValidationResult {
    /// Whether the ticket was accepted.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

impl From<ValidatedTicket> for ValidationResult {
    fn from(t: ValidatedTicket) -> Self {
        Self::Success {
            username: t.username,
            proxies: t.proxies,
            attributes: t.attributes,
            pgt: t.pgt,
        }
    }
}

impl From<AuthError> for ValidationResult {
    fn from(e: AuthError) -> Self {
        let reason = match e {
            AuthError::AuthenticationFailure { message, .. } => message,
            other => other.to_string(),
        };
        Self::Failure { reason }
    }
}

/// Validates service and proxy tickets with the CAS server.
pub struct TicketValidator {
    client: Client,
    config: Arc<CasConfig>,
    reconciler: Option<ProxyReconciler>,
}

impl TicketValidator {
    /// Creates a validator.
    ///
    /// Without a reconciler, PGT IOUs in responses are ignored.
    pub fn new(
        config: Arc<CasConfig>,
        reconciler: Option<ProxyReconciler>,
    ) -> Result<Self, AuthError> {
        let client = config.http_client()?;

        Ok(Self {
            client,
            config,
            reconciler,
        })
    }

    /// Validates `ticket` for `service`, folding every error into
    /// [`ValidationResult::Failure`].
    pub async fn validate(&self, ticket: &str, service: &str) -> ValidationResult {
        match self.verify(ticket, service).await {
            Ok(t) => t.into(),
            Err(e) => e.into(),
        }
    }

    /// Validates `ticket` for `service`.
    ///
    /// A PGT IOU in the response is handed to the reconciler; if that fails
    /// the ticket is still valid, only without proxy capability. The IOU is
    /// left untouched when the proxy chain is outside the allowlist.
    ///
    /// # Errors
    ///
    /// - [`AuthError::InvalidInput`] for an empty ticket or a non-URL service
    /// - [`AuthError::Transport`] if the CAS server is unreachable or answers non-2xx
    /// - [`AuthError::AuthenticationFailure`] if the CAS server rejects the ticket
    /// - [`AuthError::MalformedResponse`] if the body cannot be decoded
    pub async fn verify(&self, ticket: &str, service: &str) -> Result<ValidatedTicket, AuthError> {
        let request = ValidationRequest::new(ticket, service)?
            .with_renew(self.config.renew)
            .with_proxy_callback(self.config.proxy_callback.clone());

        let url = self.config.validate_url()?;

        debug!(ticket = %request.ticket(), service = %request.service(), "Validating CAS ticket");

        let response = self
            .client
            .get(url)
            .query(&request.query_pairs())
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "CAS server unreachable");
                AuthError::Transport(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            warn!(status = %status, "CAS server returned an error status");
            return Err(AuthError::Transport(format!("CAS server returned {status}")));
        }

        let body = response.text().await?;

        let success = match ServiceResponse::from_xml(&body) {
            Ok(ServiceResponse::Authenticated(success)) => success,
            Ok(ServiceResponse::Rejected(failure)) => {
                warn!(
                    code = failure.code.as_deref().unwrap_or("-"),
                    reason = %failure.message,
                    "Authentication failed from CAS server"
                );
                return Err(AuthError::AuthenticationFailure {
                    code: failure.code,
                    message: failure.message,
                });
            },
            Ok(_) => {
                error!("CAS server answered a validation request with a proxy response");
                return Err(AuthError::MalformedResponse(
                    "unexpected proxy response".into(),
                ));
            },
            Err(e) => {
                error!(error = %e, "Failed to decode CAS validation response");
                return Err(AuthError::MalformedResponse(e.to_string()));
            },
        };

        let chain_allowed = success
            .proxies
            .iter()
            .all(|p| self.config.is_proxy_allowed(p));

        let pgt = match (success.proxy_granting_ticket, &self.reconciler) {
            (Some(_), Some(_)) if !chain_allowed => {
                warn!(
                    username = %success.user,
                    proxies = ?success.proxies,
                    "Proxy chain not allowed, PGT not stored"
                );
                None
            },
            (Some(iou), Some(reconciler)) => match reconciler.resolve(&iou, &success.user).await {
                Ok(()) => Some(iou),
                Err(e) => {
                    warn!(
                        username = %success.user,
                        error = %e,
                        "Failed to do proxy authentication"
                    );
                    None
                },
            },
            (Some(_), None) => {
                warn!(
                    username = %success.user,
                    "PGT IOU received but no proxy ticket store is configured"
                );
                None
            },
            (None, _) => None,
        };

        debug!(
            username = %success.user,
            proxies = ?success.proxies,
            "CAS ticket validation succeeded"
        );

        Ok(ValidatedTicket {
            username: success.user,
            proxies: success.proxies,
            attributes: success.attributes,
            pgt,
        })
    }
}
