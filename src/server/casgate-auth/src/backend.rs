//! Authentication backend trait.

use async_trait::async_trait;

use crate::{AuthContext, AuthError};

/// Result of an authentication attempt.
pub type AuthOutcome = Result<AuthContext, AuthError>;

/// Trait for authentication backends.
///
/// Implementations validate a ticket issued for `service` and return an
/// [`AuthContext`] on success. Failures are reported as values, never panics.
#[async_trait]
pub trait AuthBackend: Send + Sync {
    /// Validates the given ticket and returns the authentication context.
    ///
    /// # Arguments
    ///
    /// * `ticket` - The service or proxy ticket presented by the client
    /// * `service` - The service URL the ticket was issued for
    ///
    /// # Returns
    ///
    /// * `Ok(AuthContext)` - If the ticket is valid
    /// * `Err(AuthError)` - If validation fails
    async fn authenticate(&self, ticket: &str, service: &str) -> AuthOutcome;

    /// Returns the name of this backend for logging/debugging.
    fn name(&self) -> &'static str;
}
