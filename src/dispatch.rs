//! The webhook dispatch pipeline.
//!
//! Per request: verify the signature, canonicalize parameters, decode the
//! typed callback shape, invoke the handler, encode its reply. Verification
//! failure is terminal with an empty-body rejection and the handler never
//! runs; decode failure is a contract error on the integrating application's
//! side. Nothing is retried and duplicate deliveries are not deduplicated —
//! handlers wanting idempotency key off the call/recording/fax SID
//! themselves.

use std::future::Future;
use std::sync::Arc;

use axum::{
    Router,
    body::Bytes,
    extract::{OriginalUri, RawPathParams},
    http::{HeaderMap, Uri, header},
    response::{IntoResponse, Response},
    routing::{MethodRouter, post},
};

use crate::client::{CapabilityToken, TwilioClient};
use crate::config::{EmptyResponse, SchemaMode, TwilioConfig};
use crate::error::{Result, RingbackError};
use crate::params::{CanonicalParams, RawParams};
use crate::request::CallbackRequest;
use crate::response::{self, DispatchOutcome};
use crate::twiml::Twiml;
use crate::verify::RequestValidator;

/// Header carrying the request signature.
pub const SIGNATURE_HEADER: &str = "x-twilio-signature";

/// What a webhook handler gives back: a TwiML document, or no instructions.
pub type TwimlReply = Option<Box<dyn Twiml>>;

/// Path captures for routes registered with
/// [`WebhookRouterBuilder::route_with_params`], in declaration order.
pub type PathArgs = Vec<(String, String)>;

/// Convenience for handlers returning a document.
pub fn twiml(doc: impl Twiml + 'static) -> Result<TwimlReply> {
    Ok(Some(Box::new(doc)))
}

/// Convenience for handlers returning no instructions.
pub fn no_instructions() -> Result<TwimlReply> {
    Ok(None)
}

/// Shared per-process dispatch state. Read-only after construction, shared
/// across all concurrent requests without locking.
struct WebhookState {
    validator: RequestValidator,
    drop_empty_values: bool,
    empty_response: EmptyResponse,
    schema_mode: SchemaMode,
}

/// The Twilio integration object.
///
/// Constructed once at startup. When credentials are absent it still
/// constructs — the application keeps booting — but binding webhook routes
/// and reaching the outbound client fail with `ConfigurationMissing`.
pub struct TwilioWebhook {
    config: TwilioConfig,
    state: Option<Arc<WebhookState>>,
}

impl TwilioWebhook {
    pub fn new(config: TwilioConfig) -> Self {
        let state = config.credentials.as_ref().map(|creds| {
            Arc::new(WebhookState {
                validator: RequestValidator::new(creds.auth_token.clone()),
                drop_empty_values: config.drop_empty_values,
                empty_response: config.empty_response,
                schema_mode: config.schema_mode,
            })
        });
        Self { config, state }
    }

    /// Build from the standard `TWILIO_*` environment variables.
    pub fn from_env() -> Self {
        Self::new(TwilioConfig::from_env())
    }

    pub fn config(&self) -> &TwilioConfig {
        &self.config
    }

    /// The outbound REST facade.
    ///
    /// # Errors
    ///
    /// `ConfigurationMissing` when the integration was constructed without
    /// credentials.
    pub fn client(&self) -> Result<TwilioClient> {
        TwilioClient::from_config(&self.config)
    }

    /// Start building a capability token for a client-side SDK.
    pub fn capability_token(&self) -> Result<CapabilityToken> {
        CapabilityToken::from_config(&self.config)
    }

    fn state(&self) -> Result<Arc<WebhookState>> {
        self.state
            .clone()
            .ok_or(RingbackError::ConfigurationMissing(
                "TWILIO_ACCOUNT_SID and TWILIO_AUTH_TOKEN",
            ))
    }
}

type RouteFactory = Box<dyn FnOnce(Arc<WebhookState>) -> MethodRouter + Send>;

/// Two-phase route registration.
///
/// Handlers are registered against callback shapes first; [`bind`] wires
/// them into an [`axum::Router`] once credentials are confirmed present.
/// Registration itself never touches credentials, so route modules can be
/// assembled before configuration is loaded.
///
/// [`bind`]: WebhookRouterBuilder::bind
///
/// # Example
///
/// ```rust,ignore
/// use ringback::{TwilioWebhook, TwilioConfig, WebhookRouterBuilder, VoiceRequest};
///
/// let webhook = TwilioWebhook::new(TwilioConfig::from_env());
/// let router = WebhookRouterBuilder::new()
///     .route("/voice", |request: VoiceRequest| async move {
///         ringback::twiml(ringback::RawTwiml::new(
///             "<Response><Say>Hello</Say></Response>",
///         ))
///     })
///     .bind(&webhook)?;
/// ```
#[must_use = "builder does nothing until you call bind()"]
#[derive(Default)]
pub struct WebhookRouterBuilder {
    routes: Vec<(String, RouteFactory)>,
}

impl WebhookRouterBuilder {
    pub fn new() -> Self {
        Self { routes: Vec::new() }
    }

    /// Register a handler for `path`, decoding callbacks as `T`.
    ///
    /// The handler only ever sees the typed, validated request; the
    /// verification and decoding steps run before it, and its reply is
    /// encoded after it.
    pub fn route<T, H, Fut>(mut self, path: &str, handler: H) -> Self
    where
        T: CallbackRequest,
        H: Fn(T) -> Fut + Clone + Send + Sync + 'static,
        Fut: Future<Output = Result<TwimlReply>> + Send + 'static,
    {
        let factory: RouteFactory = Box::new(move |state: Arc<WebhookState>| {
            post(
                move |headers: HeaderMap, OriginalUri(uri): OriginalUri, body: Bytes| {
                    let state = state.clone();
                    let handler = handler.clone();
                    async move { dispatch::<T, _, _>(&state, handler, &headers, &uri, &body).await }
                },
            )
        });
        self.routes.push((path.to_string(), factory));
        self
    }

    /// Like [`route`], for paths with captures (e.g. `/status/:call_sid`).
    /// The captured segments are handed to the handler after the decoded
    /// request.
    ///
    /// [`route`]: WebhookRouterBuilder::route
    pub fn route_with_params<T, H, Fut>(mut self, path: &str, handler: H) -> Self
    where
        T: CallbackRequest,
        H: Fn(T, PathArgs) -> Fut + Clone + Send + Sync + 'static,
        Fut: Future<Output = Result<TwimlReply>> + Send + 'static,
    {
        let factory: RouteFactory = Box::new(move |state: Arc<WebhookState>| {
            post(
                move |path_params: RawPathParams,
                      headers: HeaderMap,
                      OriginalUri(uri): OriginalUri,
                      body: Bytes| {
                    let state = state.clone();
                    let handler = handler.clone();
                    let args: PathArgs = path_params
                        .iter()
                        .map(|(k, v)| (k.to_string(), v.to_string()))
                        .collect();
                    async move {
                        let with_args = move |request: T| handler(request, args.clone());
                        dispatch::<T, _, _>(&state, with_args, &headers, &uri, &body).await
                    }
                },
            )
        });
        self.routes.push((path.to_string(), factory));
        self
    }

    /// Bind all registered routes against the integration's credentials.
    ///
    /// # Errors
    ///
    /// `ConfigurationMissing` when the integration has no auth token — the
    /// routes cannot verify anything without it.
    pub fn bind(self, webhook: &TwilioWebhook) -> Result<Router> {
        let state = webhook.state()?;
        let mut router = Router::new();
        for (path, factory) in self.routes {
            router = router.route(&path, factory(state.clone()));
        }
        Ok(router)
    }
}

/// Run the pipeline for one request.
async fn dispatch<T, H, Fut>(
    state: &WebhookState,
    handler: H,
    headers: &HeaderMap,
    uri: &Uri,
    body: &Bytes,
) -> Response
where
    T: CallbackRequest,
    H: Fn(T) -> Fut,
    Fut: Future<Output = Result<TwimlReply>>,
{
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());
    let raw_params: RawParams = url::form_urlencoded::parse(body).into_owned().collect();
    let url = external_url(headers, uri);

    if !state.validator.validate(&url, &raw_params, signature) {
        return DispatchOutcome::Rejected.into_response();
    }

    let params = CanonicalParams::from_raw(&raw_params, state.drop_empty_values);

    let request = match T::decode(&params, state.schema_mode) {
        Ok(request) => request,
        Err(err) => return err.into_response(),
    };
    tracing::debug!(kind = T::KIND, "decoded webhook callback");

    let reply = match handler(request).await {
        Ok(reply) => reply,
        Err(err) => return err.into_response(),
    };

    match response::encode(reply, state.empty_response) {
        Ok(outcome) => outcome.into_response(),
        Err(err) => err.into_response(),
    }
}

/// Reconstruct the externally visible request URL.
///
/// Twilio signed the URL it requested, which behind a proxy differs from
/// what axum sees: the scheme comes from `X-Forwarded-Proto` and the host
/// from `X-Forwarded-Host`/`Host`. The query string is part of the signed
/// URL and is preserved verbatim.
fn external_url(headers: &HeaderMap, uri: &Uri) -> String {
    let header_str = |name: &str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .filter(|value| !value.is_empty())
    };

    let scheme = header_str("x-forwarded-proto")
        .or_else(|| uri.scheme_str())
        .unwrap_or("http");
    let host = header_str("x-forwarded-host")
        .or_else(|| header_str(header::HOST.as_str()))
        .or_else(|| uri.host())
        .unwrap_or("localhost");
    let path_and_query = uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");

    format!("{scheme}://{host}{path_and_query}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(pairs: &[(&str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(
                axum::http::HeaderName::from_bytes(name.as_bytes()).unwrap(),
                value.parse().unwrap(),
            );
        }
        map
    }

    #[test]
    fn test_external_url_from_host_header() {
        let uri: Uri = "/twilio/voice?token=abc".parse().unwrap();
        let url = external_url(&headers(&[("host", "example.com")]), &uri);
        assert_eq!(url, "http://example.com/twilio/voice?token=abc");
    }

    #[test]
    fn test_external_url_honors_forwarded_proto() {
        let uri: Uri = "/twilio/voice".parse().unwrap();
        let url = external_url(
            &headers(&[("host", "example.com"), ("x-forwarded-proto", "https")]),
            &uri,
        );
        assert_eq!(url, "https://example.com/twilio/voice");
    }

    #[test]
    fn test_external_url_prefers_forwarded_host() {
        let uri: Uri = "/twilio/voice".parse().unwrap();
        let url = external_url(
            &headers(&[
                ("host", "10.0.0.3:8080"),
                ("x-forwarded-host", "example.com"),
                ("x-forwarded-proto", "https"),
            ]),
            &uri,
        );
        assert_eq!(url, "https://example.com/twilio/voice");
    }

    #[test]
    fn test_builder_bind_without_credentials_fails() {
        let webhook = TwilioWebhook::new(TwilioConfig::default());
        let result = WebhookRouterBuilder::new()
            .route("/voice", |_request: crate::request::VoiceRequest| async {
                no_instructions()
            })
            .bind(&webhook);

        assert!(matches!(
            result,
            Err(RingbackError::ConfigurationMissing(_))
        ));
    }

    #[test]
    fn test_builder_bind_with_credentials() {
        let config = TwilioConfig::builder()
            .with_credentials("AC123", "token")
            .build();
        let webhook = TwilioWebhook::new(config);
        let result = WebhookRouterBuilder::new()
            .route("/voice", |_request: crate::request::VoiceRequest| async {
                no_instructions()
            })
            .bind(&webhook);

        assert!(result.is_ok());
    }
}
