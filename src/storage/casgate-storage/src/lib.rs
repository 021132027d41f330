//! # Casgate Storage
//!
//! Storage abstraction for proxy-granting ticket state.
//!
//! Two kinds of rows are kept:
//! - Pending IOUs, written by the proxy callback and consumed once by the reconciler
//! - Per-user proxy ticket records, last write wins

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod backend;
pub mod error;
pub mod memory;
pub mod model;

pub use backend::ProxyTicketStore;
pub use error::StorageError;
pub use memory::MemoryStore;
pub use model::{unix_now, PendingProxyIou, ProxyTicketRecord};
