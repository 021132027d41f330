//! CAS authentication backend.
//!
//! Validates tickets with the CAS server and rejects proxy chains that leave
//! the configured allowlist.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use casgate_storage::ProxyTicketStore;

use crate::{
    provision, AuthBackend, AuthContext, AuthError, AuthOutcome, CasConfig, DirectoryUser,
    ProxyReconciler, TicketValidator, UserDirectory,
};

/// Authentication backend for CAS service and proxy tickets.
pub struct CasBackend {
    config: Arc<CasConfig>,
    validator: TicketValidator,
}

impl CasBackend {
    /// Creates a CAS backend.
    ///
    /// # Arguments
    ///
    /// * `config` - CAS client configuration
    /// * `store` - Proxy ticket store; required for the proxy handshake
    pub fn new(
        config: CasConfig,
        store: Option<Arc<dyn ProxyTicketStore>>,
    ) -> Result<Self, AuthError> {
        config.validate()?;

        if config.proxy_callback.is_some() && store.is_none() {
            warn!("proxy_callback is set but no proxy ticket store was given");
        }

        let config = Arc::new(config);
        let reconciler = store.map(|s| ProxyReconciler::new(s, config.reconcile.clone()));
        let validator = TicketValidator::new(config.clone(), reconciler)?;

        Ok(Self { config, validator })
    }

    /// The backend configuration.
    pub fn config(&self) -> &Arc<CasConfig> {
        &self.config
    }

    /// The underlying ticket validator.
    pub fn validator(&self) -> &TicketValidator {
        &self.validator
    }

    /// Authenticates and provisions the directory user.
    ///
    /// The directory is not touched unless authentication succeeds.
    pub async fn login<D>(
        &self,
        ticket: &str,
        service: &str,
        directory: &D,
    ) -> Result<DirectoryUser, AuthError>
    where
        D: UserDirectory + ?Sized,
    {
        let ctx = self.authenticate(ticket, service).await?;
        provision(directory, &ctx, &self.config).await
    }

    fn check_proxies(&self, proxies: &[String]) -> Result<(), AuthError> {
        match proxies.iter().find(|p| !self.config.is_proxy_allowed(p)) {
            Some(proxy) => {
                warn!(proxy = %proxy, "Proxy not in allowlist, rejecting ticket");
                Err(AuthError::DisallowedProxy(proxy.clone()))
            },
            None => Ok(()),
        }
    }
}

#[async_trait]
impl AuthBackend for CasBackend {
    async fn authenticate(&self, ticket: &str, service: &str) -> AuthOutcome {
        let validated = self.validator.verify(ticket, service).await?;

        self.check_proxies(&validated.proxies)?;

        info!(username = %validated.username, "User passed authentication by CAS backend");

        Ok(AuthContext::from(validated))
    }

    fn name(&self) -> &'static str {
        "cas"
    }
}
