//! Payload encoding and HMAC signatures

use crate::{Result, WebhookError};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use warden_core::{EventEnvelope, EventName};

/// Header carrying the hex-encoded HMAC-SHA256 of the request body.
pub const SIGNATURE_HEADER: &str = "X-Webhook-Signature";

type HmacSha256 = Hmac<Sha256>;

/// Serialize `{"event": .., "data": ..}` with canonical JSON (RFC 8785).
///
/// Object keys are sorted and whitespace is dropped, so the same event and
/// payload always produce the same bytes and therefore the same signature.
///
/// # Errors
/// Returns [`WebhookError::Serialize`] when the payload cannot be encoded.
pub fn encode_envelope(event: &EventName, data: serde_json::Value) -> Result<Vec<u8>> {
    let envelope = EventEnvelope::new(event.clone(), data);
    Ok(serde_jcs::to_vec(&envelope)?)
}

/// Lowercase hex HMAC-SHA256 of `body`, keyed by `secret`.
///
/// # Errors
/// Returns [`WebhookError::InvalidSecret`] if the key is rejected.
pub fn sign_payload(secret: &str, body: &[u8]) -> Result<String> {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| WebhookError::InvalidSecret)?;
    mac.update(body);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Check a received signature in constant time.
///
/// Malformed hex is treated as a mismatch.
#[must_use]
pub fn verify_signature(secret: &str, body: &[u8], signature: &str) -> bool {
    let Ok(expected) = hex::decode(signature.trim()) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const CANONICAL_BODY: &str =
        r#"{"data":{"meeting_id":"mtg-42","status":"completed"},"event":"meeting.completed"}"#;
    const EXPECTED_SIGNATURE: &str =
        "ceafd346c5fe803783283b06a49e3dc82ffade3b9c081d1b1044495b9b7c617a";

    fn meeting_completed() -> std::result::Result<EventName, warden_core::EventNameError> {
        EventName::new("meeting.completed")
    }

    #[test]
    fn envelope_is_canonical_json() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let body = encode_envelope(
            &meeting_completed()?,
            json!({ "status": "completed", "meeting_id": "mtg-42" }),
        )?;
        assert_eq!(std::str::from_utf8(&body)?, CANONICAL_BODY);
        Ok(())
    }

    #[test]
    fn known_vector_signature() -> Result<()> {
        let signature = sign_payload("s3cr3t", CANONICAL_BODY.as_bytes())?;
        assert_eq!(signature, EXPECTED_SIGNATURE);
        Ok(())
    }

    #[test]
    fn signature_is_independent_of_payload_key_order() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let event = meeting_completed()?;
        let first = encode_envelope(&event, json!({ "a": 1, "b": [1, 2] }))?;
        let second = encode_envelope(&event, json!({ "b": [1, 2], "a": 1 }))?;
        assert_eq!(sign_payload("k", &first)?, sign_payload("k", &second)?);
        Ok(())
    }

    #[test]
    fn verify_accepts_matching_and_rejects_others() {
        let body = CANONICAL_BODY.as_bytes();
        assert!(verify_signature("s3cr3t", body, EXPECTED_SIGNATURE));
        assert!(!verify_signature("other", body, EXPECTED_SIGNATURE));
        assert!(!verify_signature("s3cr3t", b"{}", EXPECTED_SIGNATURE));
        assert!(!verify_signature("s3cr3t", body, "not-hex"));
    }
}
