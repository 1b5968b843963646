use secrecy::SecretString;
use serde::{Deserialize, Serialize};

/// Status code convention for "no instructions" responses.
///
/// Twilio accepts both; which one a deployment uses has varied across
/// integrations, so it is an explicit choice rather than a hardcoded default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum EmptyResponse {
    /// `204 No Content` with an empty `application/xml` body.
    #[default]
    NoContent,
    /// `200 OK` with an empty `application/xml` body.
    EmptyBody,
}

/// How unknown enumerated parameter values are treated during decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum SchemaMode {
    /// Values outside the documented set pass through as opaque strings.
    #[default]
    Lenient,
    /// Values outside the documented set fail decoding.
    Strict,
}

/// Twilio account credentials.
///
/// Created once at startup and shared read-only across requests. The auth
/// token and API key secret are held as [`SecretString`] so they never leak
/// through debug output or logs.
pub struct Credentials {
    pub account_sid: String,
    pub auth_token: SecretString,
    /// TwiML application SID, used when originating client calls.
    pub application_sid: Option<String>,
    /// API key pair, preferred over account credentials for REST calls
    /// when present.
    pub api_key_sid: Option<String>,
    pub api_key_secret: Option<SecretString>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("account_sid", &self.account_sid)
            .field("application_sid", &self.application_sid)
            .field("api_key_sid", &self.api_key_sid)
            .finish_non_exhaustive()
    }
}

/// Configuration for a Twilio webhook integration.
#[derive(Debug)]
pub struct TwilioConfig {
    /// `None` when `TWILIO_ACCOUNT_SID`/`TWILIO_AUTH_TOKEN` were absent: the
    /// integration constructs in disabled mode and every operation needing
    /// credentials fails with `ConfigurationMissing`.
    pub credentials: Option<Credentials>,
    /// Drop parameters whose value is the empty string during
    /// canonicalization.
    pub drop_empty_values: bool,
    /// Convention for the "no instructions" response.
    pub empty_response: EmptyResponse,
    /// Enumerated-value handling during decoding.
    pub schema_mode: SchemaMode,
}

impl Default for TwilioConfig {
    fn default() -> Self {
        Self {
            credentials: None,
            drop_empty_values: default_drop_empty_values(),
            empty_response: EmptyResponse::default(),
            schema_mode: SchemaMode::default(),
        }
    }
}

fn default_drop_empty_values() -> bool {
    true
}

impl TwilioConfig {
    pub fn builder() -> TwilioConfigBuilder {
        TwilioConfigBuilder::new()
    }

    /// Load credentials from the standard `TWILIO_*` environment variables.
    ///
    /// Missing `TWILIO_ACCOUNT_SID` or `TWILIO_AUTH_TOKEN` leaves the
    /// integration in disabled mode with a warning, matching how the rest of
    /// the application should keep booting without Twilio wired up.
    pub fn from_env() -> Self {
        TwilioConfigBuilder::new().from_env().build()
    }

    pub(crate) fn credentials(&self) -> crate::error::Result<&Credentials> {
        self.credentials
            .as_ref()
            .ok_or(crate::error::RingbackError::ConfigurationMissing(
                "TWILIO_ACCOUNT_SID and TWILIO_AUTH_TOKEN",
            ))
    }
}

/// Builder for [`TwilioConfig`].
#[must_use = "builder does nothing until you call build()"]
pub struct TwilioConfigBuilder {
    account_sid: Option<String>,
    auth_token: Option<SecretString>,
    application_sid: Option<String>,
    api_key_sid: Option<String>,
    api_key_secret: Option<SecretString>,
    drop_empty_values: bool,
    empty_response: EmptyResponse,
    schema_mode: SchemaMode,
}

impl TwilioConfigBuilder {
    pub fn new() -> Self {
        Self {
            account_sid: None,
            auth_token: None,
            application_sid: None,
            api_key_sid: None,
            api_key_secret: None,
            drop_empty_values: default_drop_empty_values(),
            empty_response: EmptyResponse::default(),
            schema_mode: SchemaMode::default(),
        }
    }

    pub fn with_credentials(
        mut self,
        account_sid: impl Into<String>,
        auth_token: impl Into<String>,
    ) -> Self {
        self.account_sid = Some(account_sid.into());
        self.auth_token = Some(SecretString::new(auth_token.into()));
        self
    }

    pub fn with_application_sid(mut self, application_sid: impl Into<String>) -> Self {
        self.application_sid = Some(application_sid.into());
        self
    }

    pub fn with_api_key(
        mut self,
        api_key_sid: impl Into<String>,
        api_key_secret: impl Into<String>,
    ) -> Self {
        self.api_key_sid = Some(api_key_sid.into());
        self.api_key_secret = Some(SecretString::new(api_key_secret.into()));
        self
    }

    /// Keep parameters whose value is the empty string instead of dropping
    /// them during canonicalization.
    pub fn keep_empty_values(mut self) -> Self {
        self.drop_empty_values = false;
        self
    }

    pub fn with_empty_response(mut self, empty_response: EmptyResponse) -> Self {
        self.empty_response = empty_response;
        self
    }

    pub fn with_schema_mode(mut self, schema_mode: SchemaMode) -> Self {
        self.schema_mode = schema_mode;
        self
    }

    /// Read `TWILIO_ACCOUNT_SID`, `TWILIO_AUTH_TOKEN`, `TWILIO_APPLICATION_SID`,
    /// `TWILIO_API_KEY_SID` and `TWILIO_API_KEY_SECRET` from the environment.
    pub fn from_env(mut self) -> Self {
        if let Ok(sid) = std::env::var("TWILIO_ACCOUNT_SID") {
            self.account_sid = Some(sid);
        }
        if let Ok(token) = std::env::var("TWILIO_AUTH_TOKEN") {
            self.auth_token = Some(SecretString::new(token));
        }
        if let Ok(app_sid) = std::env::var("TWILIO_APPLICATION_SID") {
            self.application_sid = Some(app_sid);
        }
        if let Ok(key_sid) = std::env::var("TWILIO_API_KEY_SID") {
            self.api_key_sid = Some(key_sid);
        }
        if let Ok(key_secret) = std::env::var("TWILIO_API_KEY_SECRET") {
            self.api_key_secret = Some(SecretString::new(key_secret));
        }
        self
    }

    pub fn build(self) -> TwilioConfig {
        let credentials = match (self.account_sid, self.auth_token) {
            (Some(account_sid), Some(auth_token)) => Some(Credentials {
                account_sid,
                auth_token,
                application_sid: self.application_sid,
                api_key_sid: self.api_key_sid,
                api_key_secret: self.api_key_secret,
            }),
            _ => {
                tracing::warn!(
                    "TWILIO_ACCOUNT_SID and/or TWILIO_AUTH_TOKEN not set; \
                     Twilio integration is disabled"
                );
                None
            }
        };

        TwilioConfig {
            credentials,
            drop_empty_values: self.drop_empty_values,
            empty_response: self.empty_response,
            schema_mode: self.schema_mode,
        }
    }
}

impl Default for TwilioConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
