//! Protocol error types.

use thiserror::Error;

/// Errors raised while building requests or decoding CAS responses.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The response body is not well-formed XML.
    #[error("malformed xml: {0}")]
    Xml(String),

    /// A required element is absent or empty.
    #[error("missing element: {0}")]
    MissingElement(&'static str),

    /// An element appeared where the CAS schema does not allow it.
    #[error("unexpected element: {0}")]
    UnexpectedElement(String),

    /// Request parameters are unusable.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl From<quick_xml::Error> for ProtocolError {
    fn from(e: quick_xml::Error) -> Self {
        Self::Xml(e.to_string())
    }
}

impl From<quick_xml::events::attributes::AttrError> for ProtocolError {
    fn from(e: quick_xml::events::attributes::AttrError) -> Self {
        Self::Xml(e.to_string())
    }
}

impl From<quick_xml::escape::EscapeError> for ProtocolError {
    fn from(e: quick_xml::escape::EscapeError) -> Self {
        Self::Xml(e.to_string())
    }
}

impl From<quick_xml::encoding::EncodingError> for ProtocolError {
    fn from(e: quick_xml::encoding::EncodingError) -> Self {
        Self::Xml(e.to_string())
    }
}
