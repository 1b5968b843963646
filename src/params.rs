//! Parameter canonicalization.
//!
//! Twilio sends callback parameters with mixed-case keys (`CallSid`,
//! `SIPDomain`, `APIVersion`). Everything downstream of signature
//! verification works with canonical snake_case keys instead.

use std::collections::HashMap;

/// Callback parameters exactly as decoded from the urlencoded body, in the
/// order Twilio sent them. Order matters: the signature algorithm
/// concatenates pairs in transmission order.
pub type RawParams = Vec<(String, String)>;

/// Callback parameters with canonical keys. Derived per request, never
/// persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CanonicalParams(HashMap<String, String>);

impl CanonicalParams {
    /// Canonicalize raw parameters.
    ///
    /// When `drop_empty` is set, pairs with an empty value are omitted.
    /// Two raw keys canonicalizing to the same result is not something the
    /// Twilio schema produces; if it happens, the later pair wins.
    pub fn from_raw(raw: &RawParams, drop_empty: bool) -> Self {
        let mut map = HashMap::with_capacity(raw.len());
        for (key, value) in raw {
            if drop_empty && value.is_empty() {
                continue;
            }
            map.insert(canonical_key(key), value.clone());
        }
        Self(map)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[cfg(test)]
    pub(crate) fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Rewrite a Twilio-convention key into canonical snake_case.
///
/// A separator is inserted before a capital that starts a new
/// lowercase-continuing word, and before a capital that follows a lowercase
/// letter or digit; the result is lowercased. Total over any input and
/// idempotent on already-canonical keys.
///
/// ```
/// use ringback::params::canonical_key;
///
/// assert_eq!(canonical_key("CallSid"), "call_sid");
/// assert_eq!(canonical_key("SIPDomain"), "sip_domain");
/// assert_eq!(canonical_key("APIVersion"), "api_version");
/// ```
pub fn canonical_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    let mut out = String::with_capacity(key.len() + 4);

    for (i, &c) in chars.iter().enumerate() {
        if c.is_ascii_uppercase() && i > 0 {
            let prev = chars[i - 1];
            // `aB` / `0B` boundary, or `XAb` where a capital starts a new
            // lowercase-continuing word after an acronym run.
            let after_lower_or_digit = prev.is_ascii_lowercase() || prev.is_ascii_digit();
            let starts_word = chars
                .get(i + 1)
                .is_some_and(|next| next.is_ascii_lowercase());
            if after_lower_or_digit || starts_word {
                out.push('_');
            }
        }
        out.push(c.to_ascii_lowercase());
    }

    out
}
