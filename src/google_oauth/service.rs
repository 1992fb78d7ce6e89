use super::GoogleOauthSettings;
use super::endpoints::GoogleOauthEndpoints;
use crate::db::{ConnectedAccount, Storage};
use crate::error::RelayError;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

/// Keeps a stored connection's access token usable.
#[derive(Clone)]
pub struct TokenRefresher {
    settings: GoogleOauthSettings,
    http_client: reqwest::Client,
}

impl TokenRefresher {
    pub fn new(settings: GoogleOauthSettings, http_client: reqwest::Client) -> Self {
        Self {
            settings,
            http_client,
        }
    }

    pub fn settings(&self) -> &GoogleOauthSettings {
        &self.settings
    }

    /// Return `account` with a valid access token, refreshing and persisting
    /// it first when the stored one has expired.
    ///
    /// A provider rejection surfaces as [`RelayError::ReauthorizationRequired`];
    /// the stored record is left untouched (and active) in that case.
    pub async fn ensure_fresh(
        &self,
        storage: &Storage,
        mut account: ConnectedAccount,
        now: DateTime<Utc>,
    ) -> Result<ConnectedAccount, RelayError> {
        let id = account.id;
        if account.expires_at.is_none() {
            debug!("ID: {id}, no expiry stored; treating access token as non-expiring");
            return Ok(account);
        }
        if !account.is_expired(now) {
            return Ok(account);
        }

        let Some(refresh_token) = account.refresh_token.clone() else {
            warn!("ID: {id}, access token expired and no refresh token stored");
            return Err(RelayError::ReauthorizationRequired);
        };

        let tokens = GoogleOauthEndpoints::refresh_access_token(
            &self.settings,
            &refresh_token,
            self.http_client.clone(),
            now,
        )
        .await
        .inspect_err(|e| warn!("ID: {id}, token refresh failed: {}", e))?;

        storage
            .update_tokens(
                id,
                &tokens.access_token,
                tokens.refresh_token.as_deref(),
                tokens.expires_at,
            )
            .await?;

        info!(
            "ID: {id}, access token refreshed, refresh token rotated={}",
            tokens.refresh_token.is_some()
        );

        account.access_token = tokens.access_token;
        if let Some(rotated) = tokens.refresh_token {
            account.refresh_token = Some(rotated);
        }
        account.expires_at = tokens.expires_at;
        Ok(account)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::NewConnection;
    use crate::types::Platform;
    use chrono::Duration;
    use url::Url;

    fn settings_for(base: &str) -> GoogleOauthSettings {
        GoogleOauthSettings {
            client_id: "client-id".to_string(),
            client_secret: "client-secret".to_string(),
            redirect_url: Url::parse("http://localhost:8000/auth/google/callback").unwrap(),
            auth_url: Url::parse(&format!("{base}/auth")).unwrap(),
            token_url: Url::parse(&format!("{base}/token")).unwrap(),
        }
    }

    async fn stored_account(
        storage: &Storage,
        refresh_token: Option<&str>,
        expires_at: Option<DateTime<Utc>>,
    ) -> ConnectedAccount {
        storage
            .upsert_connected_account(NewConnection {
                user_id: "user-1".to_string(),
                platform: Platform::Google,
                access_token: "stale".to_string(),
                refresh_token: refresh_token.map(str::to_string),
                expires_at,
                account_email: None,
            })
            .await
            .unwrap();
        storage
            .get_connected_account("user-1", Platform::Google)
            .await
            .unwrap()
            .unwrap()
    }

    #[tokio::test]
    async fn refresh_keeps_previous_refresh_token_when_not_rotated() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/token")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"access_token":"fresh","expires_in":3599,"token_type":"Bearer"}"#)
            .expect(1)
            .create_async()
            .await;

        let storage = Storage::connect("sqlite::memory:").await.unwrap();
        let now = Utc::now();
        let account = stored_account(&storage, Some("keep-me"), Some(now - Duration::minutes(5))).await;

        let refresher = TokenRefresher::new(settings_for(&server.url()), reqwest::Client::new());
        let refreshed = refresher.ensure_fresh(&storage, account, now).await.unwrap();
        mock.assert_async().await;

        assert_eq!(refreshed.access_token, "fresh");
        assert_eq!(refreshed.refresh_token.as_deref(), Some("keep-me"));
        assert!(!refreshed.is_expired(now));

        let persisted = storage
            .get_connected_account("user-1", Platform::Google)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(persisted.access_token, "fresh");
        assert_eq!(persisted.refresh_token.as_deref(), Some("keep-me"));
    }

    #[tokio::test]
    async fn expired_without_refresh_token_fails_before_calling_provider() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/token")
            .expect(0)
            .create_async()
            .await;

        let storage = Storage::connect("sqlite::memory:").await.unwrap();
        let now = Utc::now();
        let account = stored_account(&storage, None, Some(now - Duration::hours(1))).await;

        let refresher = TokenRefresher::new(settings_for(&server.url()), reqwest::Client::new());
        let err = refresher.ensure_fresh(&storage, account, now).await.unwrap_err();
        assert!(matches!(err, RelayError::ReauthorizationRequired));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn rejected_refresh_leaves_connection_active() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/token")
            .with_status(400)
            .with_header("content-type", "application/json")
            .with_body(r#"{"error":"invalid_grant"}"#)
            .create_async()
            .await;

        let storage = Storage::connect("sqlite::memory:").await.unwrap();
        let now = Utc::now();
        let account = stored_account(&storage, Some("revoked"), Some(now - Duration::hours(1))).await;

        let refresher = TokenRefresher::new(settings_for(&server.url()), reqwest::Client::new());
        let err = refresher.ensure_fresh(&storage, account, now).await.unwrap_err();
        assert!(matches!(err, RelayError::ReauthorizationRequired));

        let persisted = storage
            .get_connected_account("user-1", Platform::Google)
            .await
            .unwrap()
            .unwrap();
        assert!(persisted.is_active);
        assert_eq!(persisted.access_token, "stale");
        assert_eq!(persisted.refresh_token.as_deref(), Some("revoked"));
    }

    #[tokio::test]
    async fn provider_outage_during_refresh_is_an_upstream_error() {
        let cases = [
            (503, "application/json", r#"{"error":"temporarily_unavailable"}"#),
            (500, "application/json", r#"{"error":"server_error"}"#),
            (502, "text/html", "<html><body>Bad Gateway</body></html>"),
        ];
        for (status, content_type, body) in cases {
            let mut server = mockito::Server::new_async().await;
            let _mock = server
                .mock("POST", "/token")
                .with_status(status)
                .with_header("content-type", content_type)
                .with_body(body)
                .create_async()
                .await;

            let storage = Storage::connect("sqlite::memory:").await.unwrap();
            let now = Utc::now();
            let account =
                stored_account(&storage, Some("still-valid"), Some(now - Duration::hours(1))).await;

            let refresher =
                TokenRefresher::new(settings_for(&server.url()), reqwest::Client::new());
            let err = refresher.ensure_fresh(&storage, account, now).await.unwrap_err();
            assert!(
                matches!(err, RelayError::Oauth2Token(_)),
                "status {status} mapped to {err:?}"
            );
            assert_eq!(
                axum::response::IntoResponse::into_response(err).status(),
                axum::http::StatusCode::BAD_GATEWAY
            );

            let persisted = storage
                .get_connected_account("user-1", Platform::Google)
                .await
                .unwrap()
                .unwrap();
            assert_eq!(persisted.refresh_token.as_deref(), Some("still-valid"));
        }
    }

    #[tokio::test]
    async fn unexpired_or_unbounded_tokens_are_not_refreshed() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/token")
            .expect(0)
            .create_async()
            .await;
        let refresher = TokenRefresher::new(settings_for(&server.url()), reqwest::Client::new());
        let storage = Storage::connect("sqlite::memory:").await.unwrap();
        let now = Utc::now();

        let valid = stored_account(&storage, Some("r"), Some(now + Duration::minutes(30))).await;
        let out = refresher.ensure_fresh(&storage, valid, now).await.unwrap();
        assert_eq!(out.access_token, "stale");

        let unbounded = stored_account(&storage, None, None).await;
        let out = refresher.ensure_fresh(&storage, unbounded, now).await.unwrap();
        assert_eq!(out.access_token, "stale");

        mock.assert_async().await;
    }
}
