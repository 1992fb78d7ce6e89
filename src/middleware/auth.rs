use axum::extract::FromRequestParts;
use axum::http::{HeaderMap, request::Parts};
use headers::authorization::Bearer;
use headers::{Authorization, HeaderMapExt};
use subtle::ConstantTimeEq;

use crate::error::RelayError;
use crate::router::RelayState;

pub const RELAY_KEY_HEADER: &str = "x-relay-key";
pub const USER_ID_HEADER: &str = "x-user-id";

/// Check the service key and return the user id asserted by the caller.
///
/// The key is accepted from:
/// - Header: `x-relay-key: ...`
/// - Header: `Authorization: Bearer ...`
/// - Query string: `?key=...`
///
/// The user id comes from `x-user-id` or `?user=` and is trusted as-is once
/// the key matches. An empty configured key rejects every request.
pub fn authenticate(
    headers: &HeaderMap,
    query: Option<&str>,
    expected: &str,
) -> Result<String, RelayError> {
    if expected.is_empty() {
        return Err(RelayError::Unauthorized);
    }
    let query_pairs: Vec<(String, String)> = query
        .map(|qs| {
            url::form_urlencoded::parse(qs.as_bytes())
                .into_owned()
                .collect()
        })
        .unwrap_or_default();
    let query_value = |name: &str| {
        query_pairs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.clone())
    };

    let presented = headers
        .get(RELAY_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .or_else(|| {
            headers
                .typed_get::<Authorization<Bearer>>()
                .map(|auth| auth.token().to_string())
        })
        .or_else(|| query_value("key"));

    let Some(presented) = presented else {
        return Err(RelayError::Unauthorized);
    };
    if !bool::from(presented.as_bytes().ct_eq(expected.as_bytes())) {
        return Err(RelayError::Unauthorized);
    }

    headers
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .or_else(|| query_value("user"))
        .map(|u| u.trim().to_string())
        .filter(|u| !u.is_empty())
        .ok_or(RelayError::Unauthorized)
}

/// Authenticated user on whose behalf the request runs.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub String);

impl FromRequestParts<RelayState> for CurrentUser {
    type Rejection = RelayError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &RelayState,
    ) -> Result<Self, Self::Rejection> {
        authenticate(&parts.headers, parts.uri.query(), &state.relay_key).map(CurrentUser)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(&'static str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (k, v) in pairs {
            map.insert(*k, HeaderValue::from_str(v).unwrap());
        }
        map
    }

    #[test]
    fn accepts_key_header_and_user_header() {
        let h = headers(&[(RELAY_KEY_HEADER, "secret"), (USER_ID_HEADER, "u-1")]);
        assert_eq!(authenticate(&h, None, "secret").unwrap(), "u-1");
    }

    #[test]
    fn accepts_bearer_and_query_user() {
        let h = headers(&[("authorization", "Bearer secret")]);
        assert_eq!(authenticate(&h, Some("user=u-2"), "secret").unwrap(), "u-2");
    }

    #[test]
    fn accepts_query_key() {
        let h = HeaderMap::new();
        assert_eq!(
            authenticate(&h, Some("key=secret&user=u-3"), "secret").unwrap(),
            "u-3"
        );
    }

    #[test]
    fn rejects_wrong_key_missing_user_and_empty_config() {
        let h = headers(&[(RELAY_KEY_HEADER, "nope"), (USER_ID_HEADER, "u-1")]);
        assert!(authenticate(&h, None, "secret").is_err());

        let h = headers(&[(RELAY_KEY_HEADER, "secret")]);
        assert!(authenticate(&h, None, "secret").is_err());

        let h = headers(&[(RELAY_KEY_HEADER, ""), (USER_ID_HEADER, "u-1")]);
        assert!(authenticate(&h, None, "").is_err());
    }
}
