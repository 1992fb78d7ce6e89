use crate::db::NewConnection;
use crate::google_oauth::endpoints::GoogleOauthEndpoints;
use crate::middleware::CurrentUser;
use crate::types::Platform;
use crate::{RelayError, router::RelayState};
use axum::{
    Json,
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::{Cookie, PrivateCookieJar, SameSite};
use chrono::{DateTime, Utc};
use oauth2::{AuthorizationCode, CsrfToken, PkceCodeChallenge, PkceCodeVerifier};
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use time::Duration;
use tracing::{info, warn};

#[derive(Debug, Deserialize)]
pub struct AuthCallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ConnectResponse {
    pub connected: bool,
    pub platform: Platform,
    pub account_email: Option<String>,
    pub has_refresh_token: bool,
}

#[derive(Debug, Deserialize)]
pub struct ConnectQuery {
    pub token: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ConnectLink {
    pub connect_url: String,
    pub expires_at: DateTime<Utc>,
}

const CONNECT_TOKEN_TTL_MINUTES: i64 = 10;
const CSRF_COOKIE: &str = "oauth_csrf_token";
const PKCE_COOKIE: &str = "oauth_pkce_verifier";
const USER_COOKIE: &str = "oauth_user_id";

/// POST /api/integrations/google/connect -> single-use link the identity
/// service hands to the user's browser. The link carries no service key.
pub async fn mint_connect_link(
    State(state): State<RelayState>,
    CurrentUser(user_id): CurrentUser,
) -> Result<Json<ConnectLink>, RelayError> {
    let now = Utc::now();
    let token = CsrfToken::new_random();
    let expires_at = now + chrono::Duration::minutes(CONNECT_TOKEN_TTL_MINUTES);
    state
        .ingestor
        .storage()
        .insert_connect_token(token.secret(), &user_id, expires_at, now)
        .await?;

    let mut connect_url = state.oauth.redirect_url.join("/auth/google")?;
    connect_url
        .query_pairs_mut()
        .append_pair("token", token.secret());

    info!(user = %user_id, "connect link issued");
    Ok(Json(ConnectLink {
        connect_url: connect_url.to_string(),
        expires_at,
    }))
}

/// GET /auth/google?token=... -> redirects the browser to Google's consent page.
pub async fn google_oauth_entry(
    State(state): State<RelayState>,
    Query(query): Query<ConnectQuery>,
    jar: PrivateCookieJar,
) -> Result<impl IntoResponse, RelayError> {
    let token = query
        .token
        .as_deref()
        .filter(|t| !t.is_empty())
        .ok_or(RelayError::Unauthorized)?;
    let user_id = state
        .ingestor
        .storage()
        .take_connect_token(token, Utc::now())
        .await?
        .ok_or(RelayError::Unauthorized)?;

    let (challenge, verifier) = PkceCodeChallenge::new_random_sha256();
    let pkce_verifier = verifier.secret().to_string();

    let (auth_url, csrf_token) = GoogleOauthEndpoints::build_authorize_url(&state.oauth, challenge);

    let jar = store_oauth_cookies(jar, &csrf_token, &pkce_verifier, &user_id);

    info!(user = %user_id, "Dispatching Google OAuth redirect");
    Ok((jar, Redirect::temporary(auth_url.as_str())))
}

/// GET /auth/google/callback -> exchanges the auth code and stores the connection.
pub async fn google_oauth_callback(
    State(state): State<RelayState>,
    Query(query): Query<AuthCallbackQuery>,
    jar: PrivateCookieJar,
) -> Response {
    let (session, jar) = match load_oauth_session(jar) {
        Ok(data) => data,
        Err((jar, err)) => return respond_with_error(jar, err),
    };

    if let Some(err) = query.error.as_deref() {
        warn!(user = %session.user_id, error = err, "Google consent was not granted");
        return respond_with_error(
            jar,
            RelayError::OauthFlow(format!("provider returned error `{err}`")),
        );
    }

    let Some(state_param) = query.state.as_deref() else {
        return respond_with_error(
            jar,
            RelayError::OauthFlow("missing `state` in callback".to_string()),
        );
    };

    if !bool::from(state_param.as_bytes().ct_eq(session.csrf.as_bytes())) {
        return respond_with_error(jar, RelayError::OauthFlow("CSRF token mismatch".to_string()));
    }

    let Some(code) = query.code.as_deref() else {
        return respond_with_error(
            jar,
            RelayError::OauthFlow("missing `code` in callback".to_string()),
        );
    };

    let tokens = match GoogleOauthEndpoints::exchange_authorization_code(
        &state.oauth,
        AuthorizationCode::new(code.to_owned()),
        PkceCodeVerifier::new(session.pkce_verifier),
        state.client.clone(),
        Utc::now(),
    )
    .await
    {
        Ok(res) => res,
        Err(err) => return respond_with_error(jar, err),
    };

    if tokens.refresh_token.is_none() {
        // Reconnects may legitimately omit it; the stored one is kept.
        warn!(user = %session.user_id, "OAuth response missing refresh_token");
    }

    let response = ConnectResponse {
        connected: true,
        platform: Platform::Google,
        account_email: tokens.email.clone(),
        has_refresh_token: tokens.refresh_token.is_some(),
    };

    let connection = NewConnection {
        user_id: session.user_id.clone(),
        platform: Platform::Google,
        access_token: tokens.access_token,
        refresh_token: tokens.refresh_token,
        expires_at: tokens.expires_at,
        account_email: tokens.email,
    };
    if let Err(err) = state
        .ingestor
        .storage()
        .upsert_connected_account(connection)
        .await
    {
        return respond_with_error(jar, err);
    }

    info!(user = %session.user_id, "Google account connected");
    (jar, Json(response)).into_response()
}

struct OauthSession {
    csrf: String,
    pkce_verifier: String,
    user_id: String,
}

fn store_oauth_cookies(
    jar: PrivateCookieJar,
    csrf: &CsrfToken,
    pkce_verifier: &str,
    user_id: &str,
) -> PrivateCookieJar {
    jar.add(build_cookie(CSRF_COOKIE, csrf.secret().to_string()))
        .add(build_cookie(PKCE_COOKIE, pkce_verifier.to_string()))
        .add(build_cookie(USER_COOKIE, user_id.to_string()))
}

fn load_oauth_session(
    jar: PrivateCookieJar,
) -> Result<(OauthSession, PrivateCookieJar), (PrivateCookieJar, RelayError)> {
    let read = |name: &str| jar.get(name).map(|c| c.value().to_owned());
    let (Some(csrf), Some(pkce_verifier), Some(user_id)) =
        (read(CSRF_COOKIE), read(PKCE_COOKIE), read(USER_COOKIE))
    else {
        let jar = clear_oauth_cookies(jar);
        return Err((
            jar,
            RelayError::OauthFlow("OAuth session cookies missing or expired".to_string()),
        ));
    };

    let jar = clear_oauth_cookies(jar);
    Ok((
        OauthSession {
            csrf,
            pkce_verifier,
            user_id,
        },
        jar,
    ))
}

fn clear_oauth_cookies(jar: PrivateCookieJar) -> PrivateCookieJar {
    jar.remove(clear_cookie(CSRF_COOKIE))
        .remove(clear_cookie(PKCE_COOKIE))
        .remove(clear_cookie(USER_COOKIE))
}

fn build_cookie(name: &str, value: String) -> Cookie<'static> {
    Cookie::build(Cookie::new(name.to_string(), value))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .max_age(Duration::minutes(15))
        .build()
}

fn clear_cookie(name: &str) -> Cookie<'static> {
    Cookie::build(Cookie::new(name.to_string(), ""))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build()
}

fn respond_with_error(jar: PrivateCookieJar, err: RelayError) -> Response {
    (jar, err.into_response()).into_response()
}
