use std::sync::Arc;

use axum_extra::extract::cookie::Key;
use mimalloc::MiMalloc;
use review_relay::api::{OpenAiClient, TextGenerator};
use review_relay::config::CONFIG;
use review_relay::db::Storage;
use review_relay::google_oauth::service::TokenRefresher;
use review_relay::service::{Enricher, ReviewIngestor};
use review_relay::{RelayState, relay_router};
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let cfg = &*CONFIG;

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cfg.loglevel.clone()));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_level(true)
                .with_target(false),
        )
        .init();

    info!(
        listen_addr = %cfg.listen_addr,
        database_url = %cfg.database_url,
        proxy = %cfg.proxy.as_ref().map(|u| u.as_str()).unwrap_or("<none>"),
        loglevel = %cfg.loglevel,
        google_client_id = %cfg.google_client_id,
        openai_model = %cfg.openai_model,
    );
    if cfg.relay_key.is_empty() {
        warn!("RELAY_RELAY_KEY is empty; every API request will be rejected");
    }

    let mut builder = reqwest::Client::builder()
        .user_agent(concat!("review-relay/", env!("CARGO_PKG_VERSION")))
        .connect_timeout(std::time::Duration::from_secs(10))
        .timeout(cfg.http_timeout());
    if let Some(proxy) = cfg.proxy.as_ref() {
        builder = builder.proxy(reqwest::Proxy::all(proxy.as_str())?);
    }
    let client = builder.build()?;

    let storage = Storage::connect(&cfg.database_url).await?;

    let generator = cfg.openai().map(|settings| {
        Arc::new(OpenAiClient::new(client.clone(), settings)) as Arc<dyn TextGenerator>
    });
    let enricher = Enricher::new(generator);
    if enricher.is_configured() {
        info!("AI enrichment enabled");
    } else {
        warn!("no OpenAI key configured; enrichment falls back to rating-derived sentiment");
    }

    let oauth = cfg.google_oauth();
    let ingestor = ReviewIngestor::new(
        storage,
        client.clone(),
        TokenRefresher::new(oauth.clone(), client.clone()),
        cfg.business_profile(),
        enricher,
    );

    let cookie_key = match cfg.cookie_secret.as_deref() {
        Some(secret) if secret.len() >= 64 => Key::try_from(secret.as_bytes())?,
        _ => {
            warn!("cookie secret missing or shorter than 64 bytes; generating a per-process key");
            Key::generate()
        }
    };

    let state = RelayState::new(
        Arc::new(ingestor),
        oauth,
        client,
        Arc::from(cfg.relay_key.as_str()),
        cookie_key,
    );
    let app = relay_router(state);

    let listener = TcpListener::bind(&cfg.listen_addr).await?;
    info!("HTTP server listening on {}", cfg.listen_addr);
    axum::serve(listener, app).await?;
    Ok(())
}
