use figment::{
    Figment,
    providers::{Env, Serialized},
};
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use std::time::Duration;
use url::Url;

use crate::api::business_profile::BusinessProfileEndpoints;
use crate::api::openai::OpenAiSettings;
use crate::google_oauth::GoogleOauthSettings;

/// Process-wide configuration, resolved once from defaults and `RELAY_*` env vars.
pub static CONFIG: LazyLock<Config> =
    LazyLock::new(|| Config::load().expect("FATAL: invalid review-relay configuration"));

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub listen_addr: String,
    pub database_url: String,
    pub loglevel: String,
    /// Shared secret presented by the identity service on every API call.
    pub relay_key: String,
    /// At least 64 bytes; a random key is generated per process otherwise.
    pub cookie_secret: Option<String>,
    pub proxy: Option<Url>,
    pub http_timeout_secs: u64,

    pub google_client_id: String,
    pub google_client_secret: String,
    pub google_redirect_url: Url,
    pub google_auth_url: Url,
    pub google_token_url: Url,
    pub google_account_api: Url,
    pub google_business_info_api: Url,
    pub google_reviews_api: Url,

    pub openai_api_key: Option<String>,
    pub openai_base_url: Url,
    pub openai_model: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8000".to_string(),
            database_url: "sqlite:review-relay.db".to_string(),
            loglevel: "info".to_string(),
            relay_key: String::new(),
            cookie_secret: None,
            proxy: None,
            http_timeout_secs: 30,
            google_client_id: String::new(),
            google_client_secret: String::new(),
            google_redirect_url: static_url("http://localhost:8000/auth/google/callback"),
            google_auth_url: static_url("https://accounts.google.com/o/oauth2/v2/auth"),
            google_token_url: static_url("https://oauth2.googleapis.com/token"),
            google_account_api: static_url("https://mybusinessaccountmanagement.googleapis.com/v1"),
            google_business_info_api: static_url(
                "https://mybusinessbusinessinformation.googleapis.com/v1",
            ),
            google_reviews_api: static_url("https://mybusiness.googleapis.com/v4"),
            openai_api_key: None,
            openai_base_url: static_url("https://api.openai.com/v1"),
            openai_model: "gpt-4o-mini".to_string(),
        }
    }
}

impl Config {
    /// Defaults, overridden by `RELAY_`-prefixed environment variables.
    pub fn load() -> Result<Self, figment::Error> {
        Figment::from(Serialized::defaults(Config::default()))
            .merge(Env::prefixed("RELAY_"))
            .extract()
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs.max(1))
    }

    pub fn google_oauth(&self) -> GoogleOauthSettings {
        GoogleOauthSettings {
            client_id: self.google_client_id.clone(),
            client_secret: self.google_client_secret.clone(),
            redirect_url: self.google_redirect_url.clone(),
            auth_url: self.google_auth_url.clone(),
            token_url: self.google_token_url.clone(),
        }
    }

    pub fn business_profile(&self) -> BusinessProfileEndpoints {
        BusinessProfileEndpoints {
            account_api: self.google_account_api.clone(),
            business_info_api: self.google_business_info_api.clone(),
            reviews_api: self.google_reviews_api.clone(),
        }
    }

    /// `None` when no API key is configured; enrichment then always falls back.
    pub fn openai(&self) -> Option<OpenAiSettings> {
        let api_key = self.openai_api_key.clone().filter(|k| !k.trim().is_empty())?;
        Some(OpenAiSettings {
            api_key,
            base_url: self.openai_base_url.clone(),
            model: self.openai_model.clone(),
        })
    }
}

fn static_url(s: &str) -> Url {
    Url::parse(s).expect("built-in URL must parse")
}
