//! The TwiML document seam.
//!
//! TwiML generation itself is out of scope; handlers hand back anything that
//! can serialize itself to the provider's XML grammar. Applications with
//! their own builder implement [`Twiml`] for it, or wrap a prebuilt string
//! in [`RawTwiml`].

/// An opaque markup document. The only operation the dispatch pipeline needs
/// is serialization to XML text.
pub trait Twiml: Send {
    /// Serialize to the complete XML response body.
    ///
    /// # Errors
    ///
    /// Failing here is the one way a handler can return an invalid document;
    /// the dispatcher surfaces it as an `InvalidHandlerReturn` error and
    /// sends no response body.
    fn to_xml(&self) -> Result<String, String>;
}

/// A prebuilt TwiML string passed through verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawTwiml(String);

impl RawTwiml {
    pub fn new(xml: impl Into<String>) -> Self {
        Self(xml.into())
    }
}

impl Twiml for RawTwiml {
    fn to_xml(&self) -> Result<String, String> {
        Ok(self.0.clone())
    }
}

impl From<String> for RawTwiml {
    fn from(xml: String) -> Self {
        Self(xml)
    }
}

impl From<&str> for RawTwiml {
    fn from(xml: &str) -> Self {
        Self(xml.to_string())
    }
}

/// Escape a text value for embedding in TwiML.
pub fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
