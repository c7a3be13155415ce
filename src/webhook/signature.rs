use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::{AppError, Result};

type HmacSha256 = Hmac<Sha256>;

/// Requests older or newer than this are rejected as possible replays.
const MAX_CLOCK_SKEW_SECS: u64 = 60 * 5;

/// Verify a Slack request signature.
///
/// Slack sends `X-Slack-Signature: v0=<hex>` where the digest is
/// HMAC-SHA256 over `v0:{X-Slack-Request-Timestamp}:{raw body}`.
pub fn verify_signature(
    secret: &str,
    timestamp: &str,
    payload: &[u8],
    signature_header: &str,
) -> Result<()> {
    verify_signature_at(
        secret,
        timestamp,
        payload,
        signature_header,
        chrono::Utc::now().timestamp(),
    )
}

pub fn verify_signature_at(
    secret: &str,
    timestamp: &str,
    payload: &[u8],
    signature_header: &str,
    now: i64,
) -> Result<()> {
    let sent_at: i64 = timestamp
        .trim()
        .parse()
        .map_err(|_| AppError::SignatureVerification(format!("Invalid timestamp: {timestamp}")))?;

    if now.abs_diff(sent_at) > MAX_CLOCK_SKEW_SECS {
        return Err(AppError::SignatureVerification(
            "Request timestamp outside the allowed window".to_string(),
        ));
    }

    let signature_hex = signature_header
        .strip_prefix("v0=")
        .ok_or_else(|| AppError::SignatureVerification("Missing v0= prefix".to_string()))?;

    let signature_bytes = hex::decode(signature_hex)
        .map_err(|e| AppError::SignatureVerification(format!("Invalid hex in signature: {e}")))?;

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| AppError::SignatureVerification(format!("Invalid HMAC key: {e}")))?;

    mac.update(b"v0:");
    mac.update(timestamp.as_bytes());
    mac.update(b":");
    mac.update(payload);

    mac.verify_slice(&signature_bytes)
        .map_err(|_| AppError::SignatureVerification("Signature mismatch".to_string()))
}
