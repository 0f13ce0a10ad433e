//! Cursor codecs.
//!
//! Two encodings share one token shape:
//!
//! - **plain** - url-safe base64 over the token's JSON. Decode failures
//!   degrade to "no cursor", i.e. the first page.
//! - **signed** - the base64 payload joined with an HMAC-SHA256 signature
//!   over the *encoded* payload, as `{payload}.{hex signature}`. The
//!   decoder recomputes the mac independently and rejects the cursor
//!   outright on any mismatch.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use plaza_core::{AccessError, AccessResult, CursorToken, ValidationFault};

use crate::config::SigningKey;

type HmacSha256 = Hmac<Sha256>;

fn encode_payload(token: &CursorToken) -> AccessResult<String> {
    let json = serde_json::to_vec(token)
        .map_err(|e| AccessError::internal(format!("cursor encode: {e}")))?;
    Ok(URL_SAFE_NO_PAD.encode(json))
}

fn mac_for(key: &SigningKey, payload: &str) -> AccessResult<HmacSha256> {
    let mut mac = HmacSha256::new_from_slice(key.as_bytes())
        .map_err(|e| AccessError::internal(format!("cursor mac init: {e}")))?;
    mac.update(payload.as_bytes());
    Ok(mac)
}

/// Encode a token without a signature.
pub fn encode_plain(token: &CursorToken) -> AccessResult<String> {
    encode_payload(token)
}

/// Decode an unsigned cursor. Malformed input (bad base64, bad JSON, wrong
/// field types) is not an error - the caller starts from the first page.
pub fn decode_plain(encoded: &str) -> Option<CursorToken> {
    let bytes = URL_SAFE_NO_PAD.decode(encoded).ok()?;
    serde_json::from_slice(&bytes).ok()
}

/// Encode a token as `{payload}.{hex hmac}`.
pub fn encode_signed(token: &CursorToken, key: &SigningKey) -> AccessResult<String> {
    let payload = encode_payload(token)?;
    let signature = hex::encode(mac_for(key, &payload)?.finalize().into_bytes());
    Ok(format!("{payload}.{signature}"))
}

/// Decode a signed cursor, rejecting on any signature mismatch.
///
/// The signature must be lowercase hex; a case-toggled copy of a valid
/// signature is not the token the server minted and is rejected with it.
pub fn decode_signed(encoded: &str, key: &SigningKey) -> AccessResult<CursorToken> {
    let rejected = || AccessError::from(ValidationFault::CursorRejected);

    let (payload, signature_hex) = encoded.split_once('.').ok_or_else(rejected)?;
    if signature_hex.is_empty()
        || !signature_hex
            .chars()
            .all(|c| matches!(c, '0'..='9' | 'a'..='f'))
    {
        return Err(rejected());
    }
    let signature = hex::decode(signature_hex).map_err(|_| rejected())?;

    mac_for(key, payload)?
        .verify_slice(&signature)
        .map_err(|_| rejected())?;

    let bytes = URL_SAFE_NO_PAD.decode(payload).map_err(|_| rejected())?;
    serde_json::from_slice(&bytes).map_err(|_| rejected())
}
