use std::sync::Arc;

use axum::{
    Router,
    extract::FromRef,
    routing::{delete, get, post, put},
};
use axum_extra::extract::cookie::Key;

use crate::google_oauth::GoogleOauthSettings;
use crate::handlers::{google_oauth, integrations, reviews};
use crate::service::ReviewIngestor;

#[derive(Clone)]
pub struct RelayState {
    pub ingestor: Arc<ReviewIngestor>,
    pub oauth: GoogleOauthSettings,
    pub client: reqwest::Client,
    pub relay_key: Arc<str>,
    pub cookie_key: Key,
}

impl RelayState {
    pub fn new(
        ingestor: Arc<ReviewIngestor>,
        oauth: GoogleOauthSettings,
        client: reqwest::Client,
        relay_key: Arc<str>,
        cookie_key: Key,
    ) -> Self {
        Self {
            ingestor,
            oauth,
            client,
            relay_key,
            cookie_key,
        }
    }
}

impl FromRef<RelayState> for Key {
    fn from_ref(state: &RelayState) -> Self {
        state.cookie_key.clone()
    }
}

pub fn relay_router(state: RelayState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/auth/google", get(google_oauth::google_oauth_entry))
        .route(
            "/auth/google/callback",
            get(google_oauth::google_oauth_callback),
        )
        .route("/api/integrations", get(integrations::connection_status))
        .route(
            "/api/integrations/google",
            delete(integrations::disconnect_google),
        )
        .route(
            "/api/integrations/google/connect",
            post(google_oauth::mint_connect_link),
        )
        .route(
            "/api/integrations/google/locations",
            get(integrations::list_locations),
        )
        .route(
            "/api/integrations/google/location",
            put(integrations::select_location),
        )
        .route("/api/reviews/pull", post(reviews::pull_reviews))
        .route(
            "/api/reviews",
            get(reviews::list_reviews).post(reviews::create_review),
        )
        .route("/api/reviews/{id}/blurb", post(reviews::generate_blurb))
        .with_state(state)
}
