//! # Casgate Protocol
//!
//! Wire-level pieces of the CAS 2.0 protocol.
//!
//! This crate performs no I/O. It provides:
//! - Query parameters for `/proxyValidate` and `/proxy`
//! - A schema-aware decoder for `cas:serviceResponse` documents

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod request;
pub mod response;

pub use error::ProtocolError;
pub use request::{ProxyRequest, ValidationRequest};
pub use response::{AuthenticationSuccess, CasFailure, ServiceResponse};

/// Path of the ticket validation endpoint, relative to the server base URL.
pub const PROXY_VALIDATE_PATH: &str = "proxyValidate";

/// Path of the proxy ticket endpoint, relative to the server base URL.
pub const PROXY_PATH: &str = "proxy";
