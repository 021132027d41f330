//! Integration tests for Casgate.
//!
//! These tests run the full validation and proxy handshake against a mocked
//! CAS server and the SQLite proxy ticket store.

// Allow unwrap() in tests - panics are acceptable for test assertions
#![allow(clippy::disallowed_methods)]

use std::sync::Arc;

use anyhow::{Context, Result};
use tempfile::TempDir;
use url::Url;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use casgate_auth::{CasConfig, ReconcilePolicy};
use casgate_storage::ProxyTicketStore;
use casgate_storage_sqlite::SqliteStore;

// ============================================================================
// Fixtures
// ============================================================================

/// Proxy callback URL advertised to the mocked CAS server.
pub const CALLBACK_URL: &str = "https://app.example.com/cas/callback";

/// Builds a `cas:serviceResponse` wrapping `inner`.
pub fn service_response(inner: &str) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
         <cas:serviceResponse xmlns:cas=\"http://www.yale.edu/tp/cas\">{inner}</cas:serviceResponse>"
    )
}

/// A mocked CAS server with a SQLite proxy ticket store on disk.
pub struct TestCas {
    pub server: MockServer,
    pub store: Arc<SqliteStore>,
    _data_dir: TempDir,
}

impl TestCas {
    /// Starts a mock server and opens a fresh store.
    pub async fn start() -> Result<Self> {
        let data_dir = TempDir::new().context("Failed to create temp dir")?;
        let store = SqliteStore::open(data_dir.path().join("casgate.db"))
            .await
            .context("Failed to open store")?;

        Ok(Self {
            server: MockServer::start().await,
            store: Arc::new(store),
            _data_dir: data_dir,
        })
    }

    /// Client configuration pointing at the mock server.
    pub fn config(&self) -> CasConfig {
        let mut config = CasConfig::new(
            Url::parse(&format!("{}/cas", self.server.uri())).expect("mock server uri"),
        );
        config.proxy_callback = Some(Url::parse(CALLBACK_URL).expect("callback url"));
        config.reconcile = ReconcilePolicy {
            max_attempts: 5,
            retry_interval_ms: 50,
        };
        config
    }

    /// The store as a trait object.
    pub fn store(&self) -> Arc<dyn ProxyTicketStore> {
        self.store.clone()
    }

    /// Answers `/proxyValidate` for `ticket` with `body`.
    pub async fn on_validate(&self, ticket: &str, body: String) {
        Mock::given(method("GET"))
            .and(path("/cas/proxyValidate"))
            .and(query_param("ticket", ticket))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(&self.server)
            .await;
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::time::Duration;

    use casgate_auth::{
        accept_callback, AuthBackend, AuthError, AuthMethod, CasBackend, ProxyTicketClient,
        TicketValidator, ValidationResult,
    };

    #[tokio::test]
    async fn test_service_ticket_without_attributes() {
        let cas = TestCas::start().await.unwrap();
        cas.on_validate(
            "ST-123",
            service_response(
                "<cas:authenticationSuccess><cas:user>alice</cas:user></cas:authenticationSuccess>",
            ),
        )
        .await;

        let validator = TicketValidator::new(Arc::new(cas.config()), None).unwrap();
        let result = validator.validate("ST-123", "https://app/").await;

        assert_eq!(
            result,
            ValidationResult::Success {
                username: "alice".into(),
                proxies: vec![],
                attributes: BTreeMap::new(),
                pgt: None,
            }
        );
    }

    #[tokio::test]
    async fn test_invalid_ticket() {
        let cas = TestCas::start().await.unwrap();
        cas.on_validate(
            "ST-bad",
            service_response(
                "<cas:authenticationFailure code=\"INVALID_TICKET\">invalid ticket</cas:authenticationFailure>",
            ),
        )
        .await;

        let validator = TicketValidator::new(Arc::new(cas.config()), None).unwrap();
        let result = validator.validate("ST-bad", "https://app/").await;

        assert_eq!(
            result,
            ValidationResult::Failure {
                reason: "invalid ticket".into()
            }
        );
    }

    #[tokio::test]
    async fn test_full_proxy_handshake() {
        let cas = TestCas::start().await.unwrap();
        cas.on_validate(
            "ST-1",
            service_response(
                "<cas:authenticationSuccess><cas:user>alice</cas:user>\
                 <cas:proxyGrantingTicket>PGTIOU-1</cas:proxyGrantingTicket>\
                 </cas:authenticationSuccess>",
            ),
        )
        .await;
        Mock::given(method("GET"))
            .and(path("/cas/proxy"))
            .and(query_param("pgt", "PGT-alice"))
            .and(query_param("targetService", "https://backend/"))
            .respond_with(ResponseTemplate::new(200).set_body_string(service_response(
                "<cas:proxySuccess><cas:proxyTicket>PT-42</cas:proxyTicket></cas:proxySuccess>",
            )))
            .mount(&cas.server)
            .await;

        // The CAS server calls the callback before answering the validation.
        accept_callback(&*cas.store, "PGTIOU-1", "PGT-alice")
            .await
            .unwrap();

        let backend = CasBackend::new(cas.config(), Some(cas.store())).unwrap();
        let ctx = backend.authenticate("ST-1", "https://app/").await.unwrap();

        assert_eq!(ctx.username, "alice");
        assert_eq!(ctx.auth_method, AuthMethod::ServiceTicket);
        assert_eq!(ctx.proxy_granting_ticket.as_deref(), Some("PGTIOU-1"));
        assert!(cas.store.get_iou("PGTIOU-1").await.unwrap().is_none());

        let client = ProxyTicketClient::new(backend.config().clone(), cas.store()).unwrap();
        let pt = client
            .request_proxy_ticket("alice", "https://backend/")
            .await
            .unwrap();
        assert_eq!(pt, "PT-42");
    }

    #[tokio::test]
    async fn test_late_callback_is_reconciled() {
        let cas = TestCas::start().await.unwrap();
        cas.on_validate(
            "ST-2",
            service_response(
                "<cas:authenticationSuccess><cas:user>bob</cas:user>\
                 <cas:proxyGrantingTicket>PGTIOU-late</cas:proxyGrantingTicket>\
                 </cas:authenticationSuccess>",
            ),
        )
        .await;

        let store = cas.store.clone();
        let callback = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(120)).await;
            accept_callback(&*store, "PGTIOU-late", "PGT-bob")
                .await
                .unwrap();
        });

        let backend = CasBackend::new(cas.config(), Some(cas.store())).unwrap();
        let ctx = backend.authenticate("ST-2", "https://app/").await.unwrap();
        callback.await.unwrap();

        assert!(ctx.can_proxy());
        let record = cas.store.get_record("bob").await.unwrap().unwrap();
        assert_eq!(record.ticket_granting_ticket, "PGT-bob");
    }

    #[tokio::test]
    async fn test_missing_callback_keeps_authentication() {
        let cas = TestCas::start().await.unwrap();
        cas.on_validate(
            "ST-3",
            service_response(
                "<cas:authenticationSuccess><cas:user>carol</cas:user>\
                 <cas:proxyGrantingTicket>PGTIOU-never</cas:proxyGrantingTicket>\
                 </cas:authenticationSuccess>",
            ),
        )
        .await;

        let backend = CasBackend::new(cas.config(), Some(cas.store())).unwrap();
        let ctx = backend.authenticate("ST-3", "https://app/").await.unwrap();

        assert_eq!(ctx.username, "carol");
        assert!(!ctx.can_proxy());
        assert!(cas.store.get_record("carol").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_revalidation_overwrites_pgt() {
        let cas = TestCas::start().await.unwrap();
        for (ticket, iou) in [("ST-a", "PGTIOU-a"), ("ST-b", "PGTIOU-b")] {
            cas.on_validate(
                ticket,
                service_response(&format!(
                    "<cas:authenticationSuccess><cas:user>dave</cas:user>\
                     <cas:proxyGrantingTicket>{iou}</cas:proxyGrantingTicket>\
                     </cas:authenticationSuccess>"
                )),
            )
            .await;
        }
        accept_callback(&*cas.store, "PGTIOU-a", "PGT-first")
            .await
            .unwrap();
        accept_callback(&*cas.store, "PGTIOU-b", "PGT-second")
            .await
            .unwrap();

        let backend = CasBackend::new(cas.config(), Some(cas.store())).unwrap();
        backend.authenticate("ST-a", "https://app/").await.unwrap();
        backend.authenticate("ST-b", "https://app/").await.unwrap();

        let record = cas.store.get_record("dave").await.unwrap().unwrap();
        assert_eq!(record.ticket_granting_ticket, "PGT-second");
    }

    #[tokio::test]
    async fn test_disallowed_proxy_chain() {
        let cas = TestCas::start().await.unwrap();
        cas.on_validate(
            "PT-9",
            service_response(
                "<cas:authenticationSuccess><cas:user>erin</cas:user>\
                 <cas:proxyGrantingTicket>PGTIOU-9</cas:proxyGrantingTicket>\
                 <cas:proxies><cas:proxy>https://b</cas:proxy></cas:proxies>\
                 </cas:authenticationSuccess>",
            ),
        )
        .await;
        cas.store.upsert_record("erin", "PGT-legit").await.unwrap();
        accept_callback(&*cas.store, "PGTIOU-9", "PGT-9").await.unwrap();

        let mut config = cas.config();
        config.allowed_proxies = vec!["https://a".into()];
        let backend = CasBackend::new(config, Some(cas.store())).unwrap();

        let result = backend.authenticate("PT-9", "https://app/").await;
        assert!(matches!(result, Err(AuthError::DisallowedProxy(_))));

        let record = cas.store.get_record("erin").await.unwrap().unwrap();
        assert_eq!(record.ticket_granting_ticket, "PGT-legit");
        assert!(cas.store.get_iou("PGTIOU-9").await.unwrap().is_some());
    }
}
