use crate::error::RelayError;
use crate::google_oauth::credentials::GoogleTokens;
use crate::google_oauth::{GOOGLE_SCOPES, GoogleOauthSettings};

use chrono::{DateTime, Utc};
use oauth2::{
    AuthUrl, AuthorizationCode, Client as OAuth2Client, ClientId, ClientSecret, CsrfToken,
    EndpointNotSet, EndpointSet, ExtraTokenFields, PkceCodeChallenge, PkceCodeVerifier,
    RedirectUrl, RefreshToken, Scope, StandardRevocableToken, StandardTokenResponse, TokenUrl,
    basic::{
        BasicErrorResponse, BasicRevocationErrorResponse, BasicTokenIntrospectionResponse,
        BasicTokenType,
    },
};
use serde::{Deserialize, Serialize};
use tracing::info;
use url::Url;

/// Stateless Google OAuth endpoints. Every call takes its credentials
/// explicitly; nothing is cached between requests.
pub struct GoogleOauthEndpoints;

impl GoogleOauthEndpoints {
    /// Consent URL for the offline-access connect flow, plus the CSRF state.
    pub fn build_authorize_url(
        settings: &GoogleOauthSettings,
        challenge: PkceCodeChallenge,
    ) -> (Url, CsrfToken) {
        let client = build_oauth2_client(settings);
        let mut request = client.authorize_url(CsrfToken::new_random);
        for scope in GOOGLE_SCOPES {
            request = request.add_scope(Scope::new(scope.to_string()));
        }
        request
            .add_extra_param("access_type", "offline")
            .add_extra_param("prompt", "consent")
            .set_pkce_challenge(challenge)
            .url()
    }

    /// Exchange the callback's authorization code for the initial token pair.
    pub async fn exchange_authorization_code(
        settings: &GoogleOauthSettings,
        code: AuthorizationCode,
        verifier: PkceCodeVerifier,
        http_client: reqwest::Client,
        now: DateTime<Utc>,
    ) -> Result<GoogleTokens, RelayError> {
        let client = build_oauth2_client(settings);
        let token_result: GoogleTokenResponse = client
            .exchange_code(code)
            .set_pkce_verifier(verifier)
            .request_async(&http_client)
            .await?;
        info!("Authorization code exchanged successfully");
        Ok(GoogleTokens::from_response(&token_result, now))
    }

    /// Refresh the access token using a stored refresh token.
    pub async fn refresh_access_token(
        settings: &GoogleOauthSettings,
        refresh_token: &str,
        http_client: reqwest::Client,
        now: DateTime<Utc>,
    ) -> Result<GoogleTokens, RelayError> {
        let client = build_oauth2_client(settings);
        let token_result: GoogleTokenResponse = client
            .exchange_refresh_token(&RefreshToken::new(refresh_token.to_string()))
            .request_async(&http_client)
            .await?;
        Ok(GoogleTokens::from_response(&token_result, now))
    }
}

/// Build the Google OAuth2 client from the configured registration.
fn build_oauth2_client(settings: &GoogleOauthSettings) -> GoogleOauth2Client {
    OAuth2Client::new(ClientId::new(settings.client_id.clone()))
        .set_client_secret(ClientSecret::new(settings.client_secret.clone()))
        .set_auth_uri(AuthUrl::from_url(settings.auth_url.clone()))
        .set_token_uri(TokenUrl::from_url(settings.token_url.clone()))
        .set_redirect_uri(RedirectUrl::from_url(settings.redirect_url.clone()))
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GoogleTokenField {
    #[serde(rename = "id_token")]
    pub id_token: Option<String>,
}
impl ExtraTokenFields for GoogleTokenField {}

pub type GoogleTokenResponse = StandardTokenResponse<GoogleTokenField, BasicTokenType>;

pub(crate) type GoogleOauth2Client = OAuth2Client<
    BasicErrorResponse,
    GoogleTokenResponse,
    BasicTokenIntrospectionResponse,
    StandardRevocableToken,
    BasicRevocationErrorResponse,
    EndpointSet,
    EndpointNotSet,
    EndpointNotSet,
    EndpointNotSet,
    EndpointSet,
>;
