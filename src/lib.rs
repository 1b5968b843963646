//! Ringback - verified Twilio webhook handling for axum applications
//!
//! Ringback turns Twilio's webhook callbacks into typed, signature-verified
//! requests and turns your handler's TwiML reply into the exact response the
//! platform expects. The hosting axum application keeps ownership of the
//! server; ringback produces `Router` fragments to merge in.
//!
//! # Features
//!
//! - **Verification**: base64 HMAC-SHA1 of the external URL and form
//!   parameters, compared in constant time
//! - **Typed callbacks**: a closed set of validated request shapes, from
//!   plain voice calls to fax status reports
//! - **Response encoding**: TwiML documents and the empty "no instructions"
//!   convention, `application/xml` throughout
//! - **Outbound facade**: originate calls, messages, and faxes
//! - **Capability tokens**: short-lived JWTs for client-side SDKs
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use ringback::{RawTwiml, TwilioConfig, TwilioWebhook, VoiceRequest, WebhookRouterBuilder};
//!
//! #[tokio::main]
//! async fn main() {
//!     ringback::init_tracing();
//!
//!     let webhook = TwilioWebhook::new(TwilioConfig::from_env());
//!
//!     let routes = WebhookRouterBuilder::new()
//!         .route("/twilio/voice", |request: VoiceRequest| async move {
//!             tracing::info!(call_sid = %request.call_sid, "incoming call");
//!             ringback::twiml(RawTwiml::new(
//!                 "<Response><Say>Hello from ringback</Say></Response>",
//!             ))
//!         })
//!         .bind(&webhook)
//!         .expect("Twilio credentials missing");
//!
//!     let app = axum::Router::new().merge(routes);
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:8000").await.unwrap();
//!     axum::serve(listener, app).await.unwrap();
//! }
//! ```

pub mod client;
mod config;
mod dispatch;
mod error;
pub mod params;
pub mod request;
mod response;
pub mod twiml;
pub mod verify;

// Re-exports for public API
pub use client::{CapabilityToken, TwilioClient};
pub use config::{Credentials, EmptyResponse, SchemaMode, TwilioConfig, TwilioConfigBuilder};
pub use dispatch::{
    PathArgs, SIGNATURE_HEADER, TwilioWebhook, TwimlReply, WebhookRouterBuilder, no_instructions,
    twiml,
};
pub use error::{FieldError, FieldErrorKind, Result, RingbackError};
pub use params::{CanonicalParams, RawParams, canonical_key};
pub use request::{
    CallbackMeta, CallbackRequest, ErrorInfo, FaxRequest, FaxStatus, FaxStatusRequest,
    GatherRequest, RecordingStatusRequest, SipVoiceRequest, VerificationStatusRequest,
    VoiceRequest, VoiceStatusRequest,
};
pub use response::{APPLICATION_XML, DispatchOutcome};
pub use twiml::{RawTwiml, Twiml, escape_xml};
pub use verify::RequestValidator;

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing/logging with sensible defaults
///
/// This should be called early in your application, typically in main().
///
/// # Environment Variables
///
/// - `RUST_LOG`: Set log level (e.g., "info", "debug", "ringback=debug")
/// - `RINGBACK_LOG_JSON`: Set to "true" for JSON formatted logs
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let json_logs = std::env::var("RINGBACK_LOG_JSON")
        .map(|v| v.parse::<bool>().unwrap_or(false))
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}
