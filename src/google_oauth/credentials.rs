use base64::Engine;
use chrono::{DateTime, Utc};
use oauth2::TokenResponse;
use serde_json::Value;

use super::endpoints::GoogleTokenResponse;

/// Token set returned by a code exchange or refresh grant.
#[derive(Debug, Clone, PartialEq)]
pub struct GoogleTokens {
    pub access_token: String,
    /// Google usually omits this on refresh; callers keep the stored one then.
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub email: Option<String>,
}

impl GoogleTokens {
    pub fn from_response(resp: &GoogleTokenResponse, now: DateTime<Utc>) -> Self {
        let expires_at = resp
            .expires_in()
            .and_then(|d| chrono::Duration::from_std(d).ok())
            .map(|d| now + d);
        let email = resp
            .extra_fields()
            .id_token
            .as_deref()
            .and_then(email_from_id_token);
        Self {
            access_token: resp.access_token().secret().to_string(),
            refresh_token: resp.refresh_token().map(|t| t.secret().to_string()),
            expires_at,
            email,
        }
    }
}

/// Read the `email` claim from an (unverified) id token payload. The token
/// arrives straight from the token endpoint over TLS.
pub fn email_from_id_token(id_token: &str) -> Option<String> {
    let payload_b64 = id_token.split('.').nth(1)?;
    let decoded = base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(payload_b64.trim_end_matches('='))
        .ok()?;
    let payload: Value = serde_json::from_slice(&decoded).ok()?;
    payload
        .get("email")
        .and_then(|e| e.as_str())
        .map(str::to_string)
}
