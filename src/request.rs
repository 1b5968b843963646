//! Typed callback request shapes.
//!
//! A closed set of shapes Twilio can POST to a webhook route, each a
//! validated view over [`CanonicalParams`]. Variants share a common base
//! record by composition; there is no runtime subtyping. Decoding collects
//! every offending field before failing, so a route/schema mismatch is
//! diagnosable in one pass.

use serde::Serialize;
use url::Url;

use crate::config::SchemaMode;
use crate::error::{FieldError, FieldErrorKind, Result, RingbackError};
use crate::params::CanonicalParams;

/// A callback shape that can be decoded from canonical parameters.
///
/// Implemented by every variant in the closed set; the dispatcher is generic
/// over this trait.
pub trait CallbackRequest: Sized + Send + 'static {
    /// Callback kind name used in logs.
    const KIND: &'static str;

    fn decode(params: &CanonicalParams, mode: SchemaMode) -> Result<Self>;
}

/// Fields present on every Twilio callback.
///
/// Both are sent on every documented callback but neither is load-bearing
/// for dispatch, so absence does not fail decoding.
#[derive(Debug, Clone, Serialize)]
pub struct CallbackMeta {
    /// The Twilio account SID. 34 characters, always starts with `AC`.
    pub account_sid: Option<String>,
    /// The API version that handled the call.
    pub api_version: Option<String>,
}

/// Error detail Twilio attaches to callbacks when something went wrong on
/// its side. Optional sub-record rather than a separate shape.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorInfo {
    pub error_code: Option<i64>,
    pub error_url: Option<Url>,
}

/// Synchronous voice call callback.
#[derive(Debug, Clone, Serialize)]
pub struct VoiceRequest {
    #[serde(flatten)]
    pub meta: CallbackMeta,
    /// Unique identifier of the call. Always starts with `CA`.
    pub call_sid: String,
    /// The calling party. Wire key is `From`.
    #[serde(rename = "from")]
    pub from_number: String,
    pub to: String,
    pub call_status: String,
    /// `inbound`, `outbound-api`, or `outbound-dial`.
    pub direction: String,
    pub forwarded_from: Option<String>,
    pub caller_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
}

/// Status callback sent after a call completes.
#[derive(Debug, Clone, Serialize)]
pub struct VoiceStatusRequest {
    #[serde(flatten)]
    pub voice: VoiceRequest,
    pub call_duration: Option<String>,
    pub recording_url: Option<String>,
    pub recording_sid: Option<String>,
    pub recording_duration: Option<String>,
}

/// Recording status callback (from `<Dial record>` and friends).
#[derive(Debug, Clone, Serialize)]
pub struct RecordingStatusRequest {
    #[serde(flatten)]
    pub meta: CallbackMeta,
    /// Parent leg of the recorded call.
    pub call_sid: String,
    pub recording_sid: String,
    pub recording_url: Option<Url>,
    pub recording_status: Option<String>,
    /// Length of the recording in seconds.
    pub recording_duration: Option<i64>,
    pub recording_channels: Option<i64>,
    pub recording_source: Option<String>,
}

/// `<Gather>` action callback carrying the digits the caller pressed.
#[derive(Debug, Clone, Serialize)]
pub struct GatherRequest {
    #[serde(flatten)]
    pub voice: VoiceRequest,
    /// Excludes the `finishOnKey` digit if one was used.
    pub digits: Option<String>,
}

/// Voice callback arriving through a Twilio SIP Domain.
#[derive(Debug, Clone, Serialize)]
pub struct SipVoiceRequest {
    #[serde(flatten)]
    pub voice: VoiceRequest,
    /// Call-ID of the incoming INVITE.
    pub sip_call_id: String,
    pub sip_domain: String,
    pub sip_domain_sid: String,
    /// Username from credential-list authentication, if that was the method.
    pub sip_username: Option<String>,
    pub sip_source_ip: String,
}

/// Incoming fax callback.
#[derive(Debug, Clone, Serialize)]
pub struct FaxRequest {
    #[serde(flatten)]
    pub meta: CallbackMeta,
    /// 34-character fax identifier.
    pub fax_sid: String,
    /// Caller ID or SIP From display name. Wire key is `From`.
    #[serde(rename = "from")]
    pub from_number: String,
    pub to: String,
}

/// Fax transmission status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FaxStatus {
    Queued,
    Processing,
    Sending,
    Delivered,
    Receiving,
    Received,
    NoAnswer,
    Busy,
    Failed,
    Canceled,
    /// A value outside the documented set, preserved opaquely.
    /// Only produced in lenient schema mode.
    #[serde(untagged)]
    Other(String),
}

impl FaxStatus {
    fn parse(value: &str, mode: SchemaMode) -> Option<Self> {
        let status = match value {
            "queued" => Self::Queued,
            "processing" => Self::Processing,
            "sending" => Self::Sending,
            "delivered" => Self::Delivered,
            "receiving" => Self::Receiving,
            "received" => Self::Received,
            "no-answer" => Self::NoAnswer,
            "busy" => Self::Busy,
            "failed" => Self::Failed,
            "canceled" => Self::Canceled,
            other => {
                return match mode {
                    SchemaMode::Lenient => Some(Self::Other(other.to_string())),
                    SchemaMode::Strict => None,
                };
            }
        };
        Some(status)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Queued => "queued",
            Self::Processing => "processing",
            Self::Sending => "sending",
            Self::Delivered => "delivered",
            Self::Receiving => "receiving",
            Self::Received => "received",
            Self::NoAnswer => "no-answer",
            Self::Busy => "busy",
            Self::Failed => "failed",
            Self::Canceled => "canceled",
            Self::Other(s) => s,
        }
    }
}

/// Fax status callback.
#[derive(Debug, Clone, Serialize)]
pub struct FaxStatusRequest {
    #[serde(flatten)]
    pub fax: FaxRequest,
    /// Transmitting subscriber identification reported by the sending
    /// machine.
    pub remote_station_id: Option<String>,
    pub fax_status: Option<FaxStatus>,
    /// Pages received, if the transmission succeeded.
    pub num_pages: Option<i64>,
    /// Media URL on Twilio's servers for the received document.
    pub media_url: Option<Url>,
    /// The URL originally passed when sending the fax.
    pub original_media_url: Option<Url>,
    pub error_code: Option<i64>,
    pub error_message: Option<String>,
}

/// Outgoing caller ID verification status callback.
#[derive(Debug, Clone, Serialize)]
pub struct VerificationStatusRequest {
    #[serde(flatten)]
    pub voice: VoiceRequest,
    /// `success` or `failed`.
    pub verification_status: Option<String>,
    /// SID of the newly created OutgoingCallerId resource on success.
    pub outgoing_caller_id_sid: Option<String>,
}

/// Field-by-field decoder that accumulates every validation failure.
struct Decoder<'a> {
    params: &'a CanonicalParams,
    mode: SchemaMode,
    errors: Vec<FieldError>,
}

impl<'a> Decoder<'a> {
    fn new(params: &'a CanonicalParams, mode: SchemaMode) -> Self {
        Self {
            params,
            mode,
            errors: Vec::new(),
        }
    }

    fn record(&mut self, field: &str, reason: FieldErrorKind) {
        self.errors.push(FieldError {
            field: field.to_string(),
            reason,
        });
    }

    /// Required, non-empty string. Records `Missing` and yields a
    /// placeholder so decoding can continue collecting errors.
    fn required(&mut self, field: &str) -> String {
        match self.params.get(field) {
            Some(value) if !value.is_empty() => value.to_string(),
            _ => {
                self.record(field, FieldErrorKind::Missing);
                String::new()
            }
        }
    }

    fn optional(&self, field: &str) -> Option<String> {
        self.params.get(field).map(str::to_string)
    }

    fn optional_i64(&mut self, field: &str) -> Option<i64> {
        let value = self.params.get(field).filter(|v| !v.is_empty())?;
        match value.parse() {
            Ok(n) => Some(n),
            Err(_) => {
                self.record(field, FieldErrorKind::InvalidType);
                None
            }
        }
    }

    fn optional_url(&mut self, field: &str) -> Option<Url> {
        let value = self.params.get(field).filter(|v| !v.is_empty())?;
        match Url::parse(value) {
            Ok(url) => Some(url),
            Err(_) => {
                self.record(field, FieldErrorKind::InvalidType);
                None
            }
        }
    }

    fn optional_fax_status(&mut self, field: &str) -> Option<FaxStatus> {
        let value = self.params.get(field).filter(|v| !v.is_empty())?;
        match FaxStatus::parse(value, self.mode) {
            Some(status) => Some(status),
            None => {
                self.record(field, FieldErrorKind::InvalidValue);
                None
            }
        }
    }

    fn meta(&mut self) -> CallbackMeta {
        CallbackMeta {
            account_sid: self.optional("account_sid"),
            api_version: self.optional("api_version"),
        }
    }

    fn voice(&mut self) -> VoiceRequest {
        let meta = self.meta();
        let error_code = self.optional_i64("error_code");
        let error_url = self.optional_url("error_url");
        let error = if error_code.is_some() || error_url.is_some() {
            Some(ErrorInfo {
                error_code,
                error_url,
            })
        } else {
            None
        };

        VoiceRequest {
            meta,
            call_sid: self.required("call_sid"),
            from_number: self.required("from"),
            to: self.required("to"),
            call_status: self.required("call_status"),
            direction: self.required("direction"),
            forwarded_from: self.optional("forwarded_from"),
            caller_name: self.optional("caller_name"),
            error,
        }
    }

    fn fax(&mut self) -> FaxRequest {
        FaxRequest {
            meta: self.meta(),
            fax_sid: self.required("fax_sid"),
            from_number: self.required("from"),
            to: self.required("to"),
        }
    }

    fn finish<T>(self, value: T) -> Result<T> {
        if self.errors.is_empty() {
            Ok(value)
        } else {
            Err(RingbackError::DecodeValidation(self.errors))
        }
    }
}

impl CallbackRequest for VoiceRequest {
    const KIND: &'static str = "voice";

    fn decode(params: &CanonicalParams, mode: SchemaMode) -> Result<Self> {
        let mut d = Decoder::new(params, mode);
        let voice = d.voice();
        d.finish(voice)
    }
}

impl CallbackRequest for VoiceStatusRequest {
    const KIND: &'static str = "voice-status";

    fn decode(params: &CanonicalParams, mode: SchemaMode) -> Result<Self> {
        let mut d = Decoder::new(params, mode);
        let request = VoiceStatusRequest {
            voice: d.voice(),
            call_duration: d.optional("call_duration"),
            recording_url: d.optional("recording_url"),
            recording_sid: d.optional("recording_sid"),
            recording_duration: d.optional("recording_duration"),
        };
        d.finish(request)
    }
}

impl CallbackRequest for RecordingStatusRequest {
    const KIND: &'static str = "recording-status";

    fn decode(params: &CanonicalParams, mode: SchemaMode) -> Result<Self> {
        let mut d = Decoder::new(params, mode);
        let request = RecordingStatusRequest {
            meta: d.meta(),
            call_sid: d.required("call_sid"),
            recording_sid: d.required("recording_sid"),
            recording_url: d.optional_url("recording_url"),
            recording_status: d.optional("recording_status"),
            recording_duration: d.optional_i64("recording_duration"),
            recording_channels: d.optional_i64("recording_channels"),
            recording_source: d.optional("recording_source"),
        };
        d.finish(request)
    }
}

impl CallbackRequest for GatherRequest {
    const KIND: &'static str = "gather";

    fn decode(params: &CanonicalParams, mode: SchemaMode) -> Result<Self> {
        let mut d = Decoder::new(params, mode);
        let request = GatherRequest {
            voice: d.voice(),
            digits: d.optional("digits"),
        };
        d.finish(request)
    }
}

impl CallbackRequest for SipVoiceRequest {
    const KIND: &'static str = "sip-voice";

    fn decode(params: &CanonicalParams, mode: SchemaMode) -> Result<Self> {
        let mut d = Decoder::new(params, mode);
        let request = SipVoiceRequest {
            voice: d.voice(),
            sip_call_id: d.required("sip_call_id"),
            sip_domain: d.required("sip_domain"),
            sip_domain_sid: d.required("sip_domain_sid"),
            sip_username: d.optional("sip_username"),
            sip_source_ip: d.required("sip_source_ip"),
        };
        d.finish(request)
    }
}

impl CallbackRequest for FaxRequest {
    const KIND: &'static str = "fax";

    fn decode(params: &CanonicalParams, mode: SchemaMode) -> Result<Self> {
        let mut d = Decoder::new(params, mode);
        let fax = d.fax();
        d.finish(fax)
    }
}

impl CallbackRequest for FaxStatusRequest {
    const KIND: &'static str = "fax-status";

    fn decode(params: &CanonicalParams, mode: SchemaMode) -> Result<Self> {
        let mut d = Decoder::new(params, mode);
        let request = FaxStatusRequest {
            fax: d.fax(),
            remote_station_id: d.optional("remote_station_id"),
            fax_status: d.optional_fax_status("fax_status"),
            num_pages: d.optional_i64("num_pages"),
            media_url: d.optional_url("media_url"),
            original_media_url: d.optional_url("original_media_url"),
            error_code: d.optional_i64("error_code"),
            error_message: d.optional("error_message"),
        };
        d.finish(request)
    }
}

impl CallbackRequest for VerificationStatusRequest {
    const KIND: &'static str = "verification-status";

    fn decode(params: &CanonicalParams, mode: SchemaMode) -> Result<Self> {
        let mut d = Decoder::new(params, mode);
        let request = VerificationStatusRequest {
            voice: d.voice(),
            verification_status: d.optional("verification_status"),
            outgoing_caller_id_sid: d.optional("outgoing_caller_id_sid"),
        };
        d.finish(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FieldErrorKind;

    fn voice_params() -> CanonicalParams {
        CanonicalParams::from_pairs([
            ("account_sid", "AC00000000000000000000000000000000"),
            ("call_sid", "CA123"),
            ("from", "+15551234"),
            ("to", "+15555678"),
            ("call_status", "ringing"),
            ("direction", "inbound"),
        ])
    }

    fn decode_err<T: CallbackRequest + std::fmt::Debug>(
        params: &CanonicalParams,
        mode: SchemaMode,
    ) -> Vec<FieldError> {
        match T::decode(params, mode) {
            Err(RingbackError::DecodeValidation(fields)) => fields,
            other => panic!("expected DecodeValidation, got {other:?}"),
        }
    }

    #[test]
    fn test_voice_request_decodes() {
        let request = VoiceRequest::decode(&voice_params(), SchemaMode::Lenient).unwrap();
        assert_eq!(request.call_sid, "CA123");
        assert_eq!(request.from_number, "+15551234");
        assert_eq!(request.to, "+15555678");
        assert_eq!(request.call_status, "ringing");
        assert!(request.forwarded_from.is_none());
        assert!(request.error.is_none());
    }

    #[test]
    fn test_voice_request_missing_required_field_is_named() {
        let params = CanonicalParams::from_pairs([
            ("account_sid", "AC00000000000000000000000000000000"),
            ("from", "+15551234"),
            ("to", "+15555678"),
            ("call_status", "ringing"),
            ("direction", "inbound"),
        ]);
        let fields = decode_err::<VoiceRequest>(&params, SchemaMode::Lenient);
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].field, "call_sid");
        assert_eq!(fields[0].reason, FieldErrorKind::Missing);
    }

    #[test]
    fn test_voice_request_collects_every_missing_field() {
        let params = CanonicalParams::from_pairs([("account_sid", "AC123")]);
        let fields = decode_err::<VoiceRequest>(&params, SchemaMode::Lenient);
        let names: Vec<&str> = fields.iter().map(|f| f.field.as_str()).collect();
        assert_eq!(names, ["call_sid", "from", "to", "call_status", "direction"]);
    }

    #[test]
    fn test_voice_request_empty_required_value_is_missing() {
        let params = CanonicalParams::from_pairs([
            ("account_sid", "AC123"),
            ("call_sid", ""),
            ("from", "+15551234"),
            ("to", "+15555678"),
            ("call_status", "ringing"),
            ("direction", "inbound"),
        ]);
        let fields = decode_err::<VoiceRequest>(&params, SchemaMode::Lenient);
        assert_eq!(fields[0].field, "call_sid");
    }

    #[test]
    fn test_voice_request_error_info_composition() {
        let params = CanonicalParams::from_pairs([
            ("account_sid", "AC123"),
            ("call_sid", "CA123"),
            ("from", "+15551234"),
            ("to", "+15555678"),
            ("call_status", "failed"),
            ("direction", "inbound"),
            ("error_code", "11200"),
            ("error_url", "https://example.com/voice"),
        ]);
        let request = VoiceRequest::decode(&params, SchemaMode::Lenient).unwrap();
        let error = request.error.expect("error info should be populated");
        assert_eq!(error.error_code, Some(11200));
        assert_eq!(error.error_url.unwrap().as_str(), "https://example.com/voice");
    }

    #[test]
    fn test_voice_status_request_extends_voice() {
        let params = CanonicalParams::from_pairs([
            ("account_sid", "AC123"),
            ("call_sid", "CA123"),
            ("from", "+15551234"),
            ("to", "+15555678"),
            ("call_status", "completed"),
            ("direction", "inbound"),
            ("call_duration", "62"),
            ("recording_sid", "RE123"),
        ]);
        let request = VoiceStatusRequest::decode(&params, SchemaMode::Lenient).unwrap();
        assert_eq!(request.voice.call_sid, "CA123");
        assert_eq!(request.call_duration.as_deref(), Some("62"));
        assert_eq!(request.recording_sid.as_deref(), Some("RE123"));
    }

    #[test]
    fn test_gather_request_digits() {
        let mut pairs = vec![
            ("account_sid", "AC123"),
            ("call_sid", "CA123"),
            ("from", "+15551234"),
            ("to", "+15555678"),
            ("call_status", "in-progress"),
            ("direction", "inbound"),
        ];
        pairs.push(("digits", "42#"));
        let params = CanonicalParams::from_pairs(pairs);
        let request = GatherRequest::decode(&params, SchemaMode::Lenient).unwrap();
        assert_eq!(request.digits.as_deref(), Some("42#"));
    }

    #[test]
    fn test_recording_status_request() {
        let params = CanonicalParams::from_pairs([
            ("account_sid", "AC123"),
            ("call_sid", "CA123"),
            ("recording_sid", "RE123"),
            ("recording_url", "https://api.twilio.com/recording.wav"),
            ("recording_status", "completed"),
            ("recording_duration", "15"),
            ("recording_channels", "2"),
            ("recording_source", "DialVerb"),
        ]);
        let request = RecordingStatusRequest::decode(&params, SchemaMode::Lenient).unwrap();
        assert_eq!(request.recording_sid, "RE123");
        assert_eq!(request.recording_duration, Some(15));
        assert_eq!(request.recording_channels, Some(2));
    }

    #[test]
    fn test_recording_status_bad_integer_is_invalid_type() {
        let params = CanonicalParams::from_pairs([
            ("account_sid", "AC123"),
            ("call_sid", "CA123"),
            ("recording_sid", "RE123"),
            ("recording_duration", "fifteen"),
        ]);
        let fields = decode_err::<RecordingStatusRequest>(&params, SchemaMode::Lenient);
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].field, "recording_duration");
        assert_eq!(fields[0].reason, FieldErrorKind::InvalidType);
    }

    #[test]
    fn test_sip_voice_request_required_fields() {
        let params = CanonicalParams::from_pairs([
            ("account_sid", "AC123"),
            ("call_sid", "CA123"),
            ("from", "sip:alice@example.sip.twilio.com"),
            ("to", "sip:bob@example.sip.twilio.com"),
            ("call_status", "ringing"),
            ("direction", "inbound"),
            ("sip_call_id", "abc@10.0.0.1"),
            ("sip_domain", "example.sip.twilio.com"),
            ("sip_domain_sid", "SD123"),
            ("sip_source_ip", "203.0.113.5"),
        ]);
        let request = SipVoiceRequest::decode(&params, SchemaMode::Lenient).unwrap();
        assert_eq!(request.sip_domain, "example.sip.twilio.com");
        assert!(request.sip_username.is_none());
    }

    #[test]
    fn test_fax_status_request_lenient_unknown_status() {
        let params = CanonicalParams::from_pairs([
            ("account_sid", "AC123"),
            ("fax_sid", "FX123"),
            ("from", "+15551234"),
            ("to", "+15555678"),
            ("fax_status", "teleporting"),
        ]);
        let request = FaxStatusRequest::decode(&params, SchemaMode::Lenient).unwrap();
        assert_eq!(
            request.fax_status,
            Some(FaxStatus::Other("teleporting".to_string()))
        );
    }

    #[test]
    fn test_fax_status_request_strict_unknown_status_fails() {
        let params = CanonicalParams::from_pairs([
            ("account_sid", "AC123"),
            ("fax_sid", "FX123"),
            ("from", "+15551234"),
            ("to", "+15555678"),
            ("fax_status", "teleporting"),
        ]);
        let fields = decode_err::<FaxStatusRequest>(&params, SchemaMode::Strict);
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].field, "fax_status");
        assert_eq!(fields[0].reason, FieldErrorKind::InvalidValue);
    }

    #[test]
    fn test_fax_status_request_known_status_both_modes() {
        for mode in [SchemaMode::Lenient, SchemaMode::Strict] {
            let params = CanonicalParams::from_pairs([
                ("account_sid", "AC123"),
                ("fax_sid", "FX123"),
                ("from", "+15551234"),
                ("to", "+15555678"),
                ("fax_status", "no-answer"),
                ("num_pages", "3"),
                ("media_url", "https://api.twilio.com/fax.pdf"),
            ]);
            let request = FaxStatusRequest::decode(&params, mode).unwrap();
            assert_eq!(request.fax_status, Some(FaxStatus::NoAnswer));
            assert_eq!(request.num_pages, Some(3));
        }
    }

    #[test]
    fn test_verification_status_request() {
        let params = CanonicalParams::from_pairs([
            ("account_sid", "AC123"),
            ("call_sid", "CA123"),
            ("from", "+15551234"),
            ("to", "+15555678"),
            ("call_status", "completed"),
            ("direction", "outbound-api"),
            ("verification_status", "success"),
            ("outgoing_caller_id_sid", "PN123"),
        ]);
        let request = VerificationStatusRequest::decode(&params, SchemaMode::Lenient).unwrap();
        assert_eq!(request.verification_status.as_deref(), Some("success"));
        assert_eq!(request.outgoing_caller_id_sid.as_deref(), Some("PN123"));
    }

    #[test]
    fn test_fax_status_round_trips_as_str() {
        for value in [
            "queued",
            "processing",
            "sending",
            "delivered",
            "receiving",
            "received",
            "no-answer",
            "busy",
            "failed",
            "canceled",
        ] {
            let parsed = FaxStatus::parse(value, SchemaMode::Strict).unwrap();
            assert_eq!(parsed.as_str(), value);
        }
    }
}
