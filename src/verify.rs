//! Webhook signature verification.
//!
//! Twilio signs every callback with base64-encoded HMAC-SHA1 over the full
//! request URL followed by the POST parameters in transmission order, keyed
//! by the account's auth token, and sends it in the `X-Twilio-Signature`
//! header.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha1::Sha1;
use subtle::ConstantTimeEq;

use crate::params::RawParams;

type HmacSha1 = Hmac<Sha1>;

/// Validates inbound webhook requests against the shared auth token.
///
/// Pure CPU work, no I/O; one instance is shared across all concurrent
/// requests. Construction requires a secret, so a missing token is caught at
/// initialization rather than per-request.
pub struct RequestValidator {
    auth_token: SecretString,
}

impl RequestValidator {
    pub fn new(auth_token: SecretString) -> Self {
        Self { auth_token }
    }

    /// Compute the expected signature for a request.
    ///
    /// `url` must be the externally visible URL exactly as Twilio built it,
    /// scheme and query string included; `params` are the decoded form
    /// parameters in the order they appeared on the wire.
    pub fn signature(&self, url: &str, params: &RawParams) -> String {
        let mut mac = HmacSha1::new_from_slice(self.auth_token.expose_secret().as_bytes())
            .expect("HMAC accepts keys of any size");
        mac.update(url.as_bytes());
        for (key, value) in params {
            mac.update(key.as_bytes());
            mac.update(value.as_bytes());
        }
        BASE64.encode(mac.finalize().into_bytes())
    }

    /// Check a request's signature header against the computed signature.
    ///
    /// Returns `false` for an absent or malformed header; never errors for
    /// well-formed input. Comparison is constant time.
    pub fn validate(&self, url: &str, params: &RawParams, signature: Option<&str>) -> bool {
        let Some(provided) = signature else {
            tracing::debug!("signature header absent");
            return false;
        };

        let expected = self.signature(url, params);
        constant_time_eq(expected.as_bytes(), provided.as_bytes())
    }
}

/// Constant-time comparison to prevent timing attacks.
///
/// Uses the `subtle` crate, whose optimization barriers stop the compiler
/// from turning the comparison back into an early-exit loop.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}
