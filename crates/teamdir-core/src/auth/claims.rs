//! Unverified reads of access token claims.
//!
//! Tokens are signed JWTs issued by the server. The client never checks the
//! signature; it only looks at the payload to learn which account a token
//! was issued for.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use serde_json::Value;

/// Claim carrying the account's primary key
pub const USER_ID_CLAIM: &str = "user_id";

/// Account id named by `token`'s `user_id` claim, if it has one
pub fn user_id(token: &str) -> Option<i64> {
    let mut segments = token.split('.');
    let (_header, payload, _signature) = (segments.next()?, segments.next()?, segments.next()?);
    if segments.next().is_some() {
        return None;
    }

    let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
    let claims: Value = serde_json::from_slice(&bytes).ok()?;
    match claims.get(USER_ID_CLAIM)? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}
