//! # Casgate Auth
//!
//! CAS 2.0 authentication for services.
//!
//! ## Components
//!
//! - [`TicketValidator`]: calls `/proxyValidate` and decodes the response
//! - [`ProxyReconciler`]: matches a PGT IOU with the ticket delivered to the proxy callback
//! - [`CasBackend`]: [`AuthBackend`] enforcing the proxy allowlist
//! - [`ProxyTicketClient`]: exchanges a stored PGT for a proxy ticket
//! - [`UserDirectory`]: collaborator for account lookup and provisioning

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod backend;
pub mod cas;
pub mod config;
pub mod context;
pub mod directory;
pub mod error;
pub mod proxy;
pub mod reconciler;
pub mod validator;

pub use backend::{AuthBackend, AuthOutcome};
pub use cas::CasBackend;
pub use config::{CasConfig, ReconcilePolicy};
pub use context::{AuthContext, AuthMethod};
pub use directory::{provision, DirectoryUser, UserDirectory};
pub use error::AuthError;
pub use proxy::ProxyTicketClient;
pub use reconciler::{accept_callback, ProxyReconciler};
pub use validator::{TicketValidator, ValidatedTicket, ValidationResult};
