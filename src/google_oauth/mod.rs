//! Google OAuth: stateless endpoint calls, token parsing and the refresher.

pub mod credentials;
pub mod endpoints;
pub mod service;

use url::Url;

/// Client registration and endpoint URLs for the Google OAuth flows.
#[derive(Debug, Clone)]
pub struct GoogleOauthSettings {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_url: Url,
    pub auth_url: Url,
    pub token_url: Url,
}

/// Scopes requested on connect: Business Profile management plus the id token email.
pub const GOOGLE_SCOPES: &[&str] = &[
    "https://www.googleapis.com/auth/business.manage",
    "openid",
    "email",
];
