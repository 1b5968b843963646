//! Encoding of handler return values into the provider's wire contract.

use axum::{
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};

use crate::config::EmptyResponse;
use crate::error::{Result, RingbackError};
use crate::twiml::Twiml;

/// Content type for every webhook response, empty or not.
pub const APPLICATION_XML: &str = "application/xml";

/// Terminal outcome of one dispatched webhook request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Signature verification failed; handler never ran.
    Rejected,
    /// Handler returned no instructions.
    EmptyOk(EmptyResponse),
    /// Handler returned a serialized TwiML document.
    Document(String),
}

/// Encode a handler's return value.
///
/// `None` means "no instructions": an empty `application/xml` body whose
/// status code follows the configured convention. A document serializes to
/// its XML text; a document that fails to serialize is a contract violation
/// by the integrating application and yields `InvalidHandlerReturn`.
pub fn encode(reply: Option<Box<dyn Twiml>>, empty_response: EmptyResponse) -> Result<DispatchOutcome> {
    match reply {
        None => Ok(DispatchOutcome::EmptyOk(empty_response)),
        Some(doc) => {
            let xml = doc
                .to_xml()
                .map_err(RingbackError::invalid_handler_return)?;
            Ok(DispatchOutcome::Document(xml))
        }
    }
}

impl IntoResponse for DispatchOutcome {
    fn into_response(self) -> Response {
        match self {
            DispatchOutcome::Rejected => RingbackError::SignatureInvalid.into_response(),
            DispatchOutcome::EmptyOk(empty_response) => {
                let status = match empty_response {
                    EmptyResponse::NoContent => StatusCode::NO_CONTENT,
                    EmptyResponse::EmptyBody => StatusCode::OK,
                };
                (status, [(header::CONTENT_TYPE, APPLICATION_XML)]).into_response()
            }
            DispatchOutcome::Document(xml) => {
                (StatusCode::OK, [(header::CONTENT_TYPE, APPLICATION_XML)], xml).into_response()
            }
        }
    }
}
