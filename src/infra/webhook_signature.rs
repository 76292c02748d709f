//! Provider webhook signature handling: HMAC-SHA256 over `timestamp.body`
//! with a `t=...,v1=...` header, constant-time comparison, and a bounded
//! timestamp tolerance against replay.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::app_error::{AppError, AppResult};

type HmacSha256 = Hmac<Sha256>;

/// How far a signed timestamp may drift from the local clock.
const TIMESTAMP_TOLERANCE_SECS: i64 = 300;

/// Sign a payload the way the provider does. Used by test tooling and local
/// replay scripts to produce deliveries the verifier accepts.
pub fn sign_webhook_payload(secret: &str, timestamp: i64, body: &str) -> String {
    let signed_content = format!("{}.{}", timestamp, body);
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(signed_content.as_bytes());
    let signature = hex::encode(mac.finalize().into_bytes());
    format!("t={},v1={}", timestamp, signature)
}

/// Verify a delivery's signature header before anything else looks at the
/// payload. The header may carry multiple `v1` entries (secret rotation);
/// any match passes.
pub fn verify_webhook_signature(
    payload: &str,
    signature_header: &str,
    webhook_secret: &str,
) -> AppResult<()> {
    // Parse signature header: "t=timestamp,v1=signature,..."
    let mut timestamp: Option<&str> = None;
    let mut signatures: Vec<&str> = Vec::new();

    for part in signature_header.split(',') {
        let kv: Vec<&str> = part.splitn(2, '=').collect();
        if kv.len() != 2 {
            continue;
        }
        match kv[0] {
            "t" => timestamp = Some(kv[1]),
            "v1" => signatures.push(kv[1]),
            _ => {}
        }
    }

    let timestamp = timestamp
        .ok_or_else(|| AppError::InvalidEvent("Missing timestamp in signature".into()))?;

    if signatures.is_empty() {
        return Err(AppError::InvalidEvent("Missing signature".into()));
    }

    // Compute expected signature
    let signed_payload = format!("{}.{}", timestamp, payload);
    let mut mac = Hmac::<Sha256>::new_from_slice(webhook_secret.as_bytes())
        .map_err(|_| AppError::Internal("HMAC error".into()))?;
    mac.update(signed_payload.as_bytes());
    let expected = hex::encode(mac.finalize().into_bytes());

    // Check if any signature matches
    for sig in signatures {
        if constant_time_compare(sig, &expected) {
            let ts: i64 = timestamp
                .parse()
                .map_err(|_| AppError::InvalidEvent("Invalid timestamp".into()))?;
            let now = chrono::Utc::now().timestamp();
            if (now - ts).abs() > TIMESTAMP_TOLERANCE_SECS {
                return Err(AppError::InvalidEvent("Timestamp too old".into()));
            }
            return Ok(());
        }
    }

    Err(AppError::InvalidEvent("Invalid signature".into()))
}

fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut result = 0u8;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }
    result == 0
}
