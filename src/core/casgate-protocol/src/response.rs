//! Decoder for CAS 2.0 `cas:serviceResponse` documents.
//!
//! The decoder streams events and only recognises the fixed CAS element set.
//! CAS elements are matched on their local name, so servers that bind the
//! namespace to a prefix other than `cas` are handled too.

use std::collections::BTreeMap;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::ProtocolError;

/// A failure reported by the CAS server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CasFailure {
    /// Value of the `code` attribute (e.g. `INVALID_TICKET`).
    pub code: Option<String>,
    /// Human readable text supplied by the server.
    pub message: String,
}

/// Content of a `cas:authenticationSuccess` element.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AuthenticationSuccess {
    /// Authenticated principal.
    pub user: String,
    /// Proxy chain, most recent proxy first.
    pub proxies: Vec<String>,
    /// PGT IOU, present when a proxy callback was requested and accepted.
    pub proxy_granting_ticket: Option<String>,
    /// Released attributes keyed by qualified tag name (e.g. `cas:email`).
    pub attributes: BTreeMap<String, String>,
}

/// A decoded `cas:serviceResponse`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceResponse {
    /// `cas:authenticationSuccess`.
    Authenticated(AuthenticationSuccess),
    /// `cas:authenticationFailure`.
    Rejected(CasFailure),
    /// `cas:proxySuccess`.
    ProxyGranted {
        /// Proxy ticket to hand to the target service.
        proxy_ticket: String,
    },
    /// `cas:proxyFailure`.
    ProxyRejected(CasFailure),
}

#[derive(Default)]
struct Decoder {
    /// Local names of the open elements.
    path: Vec<String>,
    text: String,
    saw_root: bool,
    outcome: Option<Outcome>,
    success: AuthenticationSuccess,
    failure: Option<CasFailure>,
    proxy_ticket: Option<String>,
    /// Qualified name of the attribute element being read.
    attribute: Option<String>,
    /// Depth of the element whose text is being collected.
    capture: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Authenticated,
    Rejected,
    ProxyGranted,
    ProxyRejected,
}

impl ServiceResponse {
    /// Decodes a CAS 2.0 XML body.
    ///
    /// # Errors
    ///
    /// - [`ProtocolError::Xml`] if the body is not well-formed
    /// - [`ProtocolError::UnexpectedElement`] if the root is not `serviceResponse`
    /// - [`ProtocolError::MissingElement`] if no outcome element or no `user` is present
    pub fn from_xml(xml: &str) -> Result<Self, ProtocolError> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);

        let mut decoder = Decoder::default();

        loop {
            match reader.read_event()? {
                Event::Start(e) => decoder.open(&e)?,
                Event::Empty(e) => {
                    decoder.open(&e)?;
                    decoder.close()?;
                },
                Event::Text(t) if decoder.capture.is_some() => {
                    let text = t.unescape()?;
                    decoder.push_text(&text);
                },
                Event::CData(c) if decoder.capture.is_some() => {
                    decoder.push_text(&String::from_utf8_lossy(&c.into_inner()));
                },
                Event::End(_) => decoder.close()?,
                Event::Eof => break,
                _ => {},
            }
        }

        decoder.finish()
    }

    /// Returns the failure details for either failure variant.
    pub fn failure(&self) -> Option<&CasFailure> {
        match self {
            Self::Rejected(f) | Self::ProxyRejected(f) => Some(f),
            _ => None,
        }
    }
}

impl Decoder {
    fn open(&mut self, e: &BytesStart<'_>) -> Result<(), ProtocolError> {
        let local = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();

        match self.path.len() {
            0 => {
                if local != "serviceResponse" {
                    return Err(ProtocolError::UnexpectedElement(local));
                }
                self.saw_root = true;
            },
            1 => {
                let outcome = match local.as_str() {
                    "authenticationSuccess" => Outcome::Authenticated,
                    "authenticationFailure" => Outcome::Rejected,
                    "proxySuccess" => Outcome::ProxyGranted,
                    "proxyFailure" => Outcome::ProxyRejected,
                    _ => return Err(ProtocolError::UnexpectedElement(local)),
                };
                if self.outcome.is_some() {
                    return Err(ProtocolError::UnexpectedElement(local));
                }
                if matches!(outcome, Outcome::Rejected | Outcome::ProxyRejected) {
                    let code = match e.try_get_attribute("code")? {
                        Some(attr) => Some(attr.unescape_value()?.trim().to_string()),
                        None => None,
                    };
                    self.failure = Some(CasFailure {
                        code,
                        message: String::new(),
                    });
                }
                self.outcome = Some(outcome);
            },
            3 if self.in_attributes() => {
                let qualified = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                self.attribute = Some(qualified);
            },
            _ => {},
        }

        self.path.push(local);
        if self.capture.is_none() && reads_text(&self.path) {
            self.capture = Some(self.path.len());
            self.text.clear();
        }
        Ok(())
    }

    /// Appends text, keeping a single space between runs split by markup.
    fn push_text(&mut self, text: &str) {
        if !self.text.is_empty() && !text.is_empty() {
            self.text.push(' ');
        }
        self.text.push_str(text);
    }

    fn close(&mut self) -> Result<(), ProtocolError> {
        if self.capture == Some(self.path.len()) {
            self.capture = None;
            let text = std::mem::take(&mut self.text).trim().to_string();
            let names: Vec<&str> = self.path.iter().map(String::as_str).collect();
            match names.as_slice() {
                [_, "authenticationFailure"] | [_, "proxyFailure"] => {
                    if let Some(failure) = self.failure.as_mut() {
                        failure.message = text;
                    }
                },
                [_, "authenticationSuccess", "user"] => {
                    self.success.user = text;
                },
                [_, "authenticationSuccess", "proxyGrantingTicket"] => {
                    if !text.is_empty() {
                        self.success.proxy_granting_ticket = Some(text);
                    }
                },
                [_, "authenticationSuccess", "proxies", "proxy"] => {
                    if !text.is_empty() {
                        self.success.proxies.push(text);
                    }
                },
                [_, "authenticationSuccess", "attributes", _] => {
                    if let Some(key) = self.attribute.take() {
                        self.success.attributes.insert(key, text);
                    }
                },
                [_, "proxySuccess", "proxyTicket"] => {
                    if !text.is_empty() {
                        self.proxy_ticket = Some(text);
                    }
                },
                _ => {},
            }
        }

        if self.path.pop().is_none() {
            return Err(ProtocolError::Xml("unbalanced end tag".into()));
        }
        Ok(())
    }

    fn in_attributes(&self) -> bool {
        matches!(
            self.path.iter().map(String::as_str).collect::<Vec<_>>().as_slice(),
            [_, "authenticationSuccess", "attributes"]
        )
    }

    fn finish(self) -> Result<ServiceResponse, ProtocolError> {
        if !self.saw_root {
            return Err(ProtocolError::MissingElement("serviceResponse"));
        }
        if !self.path.is_empty() {
            return Err(ProtocolError::Xml("unexpected end of document".into()));
        }

        match self.outcome {
            Some(Outcome::Authenticated) => {
                if self.success.user.is_empty() {
                    return Err(ProtocolError::MissingElement("user"));
                }
                Ok(ServiceResponse::Authenticated(self.success))
            },
            Some(Outcome::Rejected) => Ok(ServiceResponse::Rejected(
                self.failure.unwrap_or_else(empty_failure),
            )),
            Some(Outcome::ProxyGranted) => self
                .proxy_ticket
                .map(|proxy_ticket| ServiceResponse::ProxyGranted { proxy_ticket })
                .ok_or(ProtocolError::MissingElement("proxyTicket")),
            Some(Outcome::ProxyRejected) => Ok(ServiceResponse::ProxyRejected(
                self.failure.unwrap_or_else(empty_failure),
            )),
            None => Err(ProtocolError::MissingElement("authenticationSuccess")),
        }
    }
}

/// Elements whose text content the decoder keeps.
fn reads_text(path: &[String]) -> bool {
    let names: Vec<&str> = path.iter().map(String::as_str).collect();
    matches!(
        names.as_slice(),
        [_, "authenticationFailure" | "proxyFailure"]
            | [_, "authenticationSuccess", "user" | "proxyGrantingTicket"]
            | [_, "authenticationSuccess", "proxies", "proxy"]
            | [_, "authenticationSuccess", "attributes", _]
            | [_, "proxySuccess", "proxyTicket"]
    )
}

fn empty_failure() -> CasFailure {
    CasFailure {
        code: None,
        message: String::new(),
    }
}
