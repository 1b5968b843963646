//! Outbound REST facade and capability tokens.
//!
//! A deliberately enumerated surface: only the operations consumers of this
//! crate actually originate — calls, messages, faxes — rather than an
//! open-ended passthrough to the whole Twilio API. Each method is a thin
//! form-encoded POST; response bodies are returned as JSON values. Retry
//! policy belongs to the caller, not here.

use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::config::TwilioConfig;
use crate::error::{Result, RingbackError};

const API_BASE_URL: &str = "https://api.twilio.com";
const FAX_BASE_URL: &str = "https://fax.twilio.com";

/// Outbound client bound to one account.
///
/// Authenticates with the API key pair when one is configured, falling back
/// to the account SID and auth token.
pub struct TwilioClient {
    http: reqwest::Client,
    account_sid: String,
    auth_user: String,
    auth_secret: SecretString,
    application_sid: Option<String>,
    api_base_url: String,
    fax_base_url: String,
}

impl TwilioClient {
    pub(crate) fn from_config(config: &TwilioConfig) -> Result<Self> {
        let creds = config.credentials()?;
        let (auth_user, auth_secret) = match (&creds.api_key_sid, &creds.api_key_secret) {
            (Some(key_sid), Some(key_secret)) => (key_sid.clone(), key_secret.clone()),
            _ => (creds.account_sid.clone(), creds.auth_token.clone()),
        };

        Ok(Self {
            http: reqwest::Client::new(),
            account_sid: creds.account_sid.clone(),
            auth_user,
            auth_secret,
            application_sid: creds.application_sid.clone(),
            api_base_url: API_BASE_URL.to_string(),
            fax_base_url: FAX_BASE_URL.to_string(),
        })
    }

    /// Point the client at a different API host. Meant for tests against a
    /// local stub server.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        self.api_base_url = base_url.clone();
        self.fax_base_url = base_url;
        self
    }

    /// Originate a voice call.
    ///
    /// `url` is the webhook Twilio fetches TwiML from once the call
    /// connects; when `None`, the configured TwiML application is used
    /// instead.
    pub async fn create_call(
        &self,
        to: &str,
        from: &str,
        url: Option<&str>,
    ) -> Result<serde_json::Value> {
        let endpoint = format!(
            "{}/2010-04-01/Accounts/{}/Calls.json",
            self.api_base_url, self.account_sid
        );

        let mut form: Vec<(&str, &str)> = vec![("To", to), ("From", from)];
        match (url, &self.application_sid) {
            (Some(url), _) => form.push(("Url", url)),
            (None, Some(app_sid)) => form.push(("ApplicationSid", app_sid)),
            (None, None) => {
                return Err(RingbackError::ConfigurationMissing(
                    "a TwiML URL or TWILIO_APPLICATION_SID",
                ));
            }
        }

        self.post_form(&endpoint, &form).await
    }

    /// Send an SMS/MMS message.
    pub async fn create_message(
        &self,
        to: &str,
        from: &str,
        body: &str,
    ) -> Result<serde_json::Value> {
        let endpoint = format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.api_base_url, self.account_sid
        );
        self.post_form(&endpoint, &[("To", to), ("From", from), ("Body", body)])
            .await
    }

    /// Send a fax.
    pub async fn create_fax(
        &self,
        to: &str,
        from: &str,
        media_url: &str,
    ) -> Result<serde_json::Value> {
        let endpoint = format!("{}/v1/Faxes", self.fax_base_url);
        self.post_form(
            &endpoint,
            &[("To", to), ("From", from), ("MediaUrl", media_url)],
        )
        .await
    }

    async fn post_form(&self, endpoint: &str, form: &[(&str, &str)]) -> Result<serde_json::Value> {
        tracing::info!(endpoint, "Twilio API request");

        let response = self
            .http
            .post(endpoint)
            .basic_auth(&self.auth_user, Some(self.auth_secret.expose_secret()))
            .form(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RingbackError::Api(format!("{status}: {body}")));
        }

        Ok(response.json().await?)
    }
}

#[derive(Debug, Serialize)]
struct CapabilityClaims {
    iss: String,
    exp: u64,
    scope: String,
}

/// Builder for a Twilio client capability token.
///
/// A short-lived HS256 JWT signed with the auth token, granting a
/// client-side SDK permission to place or receive calls.
pub struct CapabilityToken {
    account_sid: String,
    auth_token: SecretString,
    scopes: Vec<String>,
}

impl CapabilityToken {
    pub(crate) fn from_config(config: &TwilioConfig) -> Result<Self> {
        let creds = config.credentials()?;
        Ok(Self {
            account_sid: creds.account_sid.clone(),
            auth_token: creds.auth_token.clone(),
            scopes: Vec::new(),
        })
    }

    /// Allow the client to place outgoing calls through a TwiML application.
    pub fn allow_client_outgoing(mut self, application_sid: &str) -> Self {
        self.scopes.push(format!(
            "scope:client:outgoing?appSid={}",
            urlencode(application_sid)
        ));
        self
    }

    /// Allow the client to receive incoming calls addressed to `client_name`.
    pub fn allow_client_incoming(mut self, client_name: &str) -> Self {
        self.scopes.push(format!(
            "scope:client:incoming?clientName={}",
            urlencode(client_name)
        ));
        self
    }

    /// Sign the token, valid for `ttl` from now.
    pub fn sign(self, ttl: Duration) -> Result<String> {
        let exp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| RingbackError::Api(format!("clock error: {e}")))?
            .as_secs()
            + ttl.as_secs();

        let claims = CapabilityClaims {
            iss: self.account_sid,
            exp,
            scope: self.scopes.join(" "),
        };

        jsonwebtoken::encode(
            &jsonwebtoken::Header::new(jsonwebtoken::Algorithm::HS256),
            &claims,
            &jsonwebtoken::EncodingKey::from_secret(self.auth_token.expose_secret().as_bytes()),
        )
        .map_err(|e| RingbackError::Api(format!("token signing failed: {e}")))
    }
}

fn urlencode(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}
