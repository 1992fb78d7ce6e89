use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::api::{BusinessProfileApi, BusinessProfileEndpoints};
use crate::db::{ConnectedAccount, NewReview, Storage};
use crate::error::RelayError;
use crate::google_oauth::service::TokenRefresher;
use crate::service::enrichment::{BusinessCategory, Enricher};
use crate::types::google::ProviderReview;
use crate::types::{IngestSummary, Platform};

const ANONYMOUS_REVIEWER: &str = "Anonymous";

/// Pulls provider reviews for a user's connected Google location and stores
/// the ones not seen before.
///
/// Pulls for the same account run one at a time; the storage layer's
/// insert-if-absent still guarantees a single row per provider review.
pub struct ReviewIngestor {
    storage: Storage,
    http_client: reqwest::Client,
    refresher: TokenRefresher,
    endpoints: BusinessProfileEndpoints,
    enricher: Enricher,
    account_locks: DashMap<i64, Arc<Mutex<()>>>,
}

impl ReviewIngestor {
    pub fn new(
        storage: Storage,
        http_client: reqwest::Client,
        refresher: TokenRefresher,
        endpoints: BusinessProfileEndpoints,
        enricher: Enricher,
    ) -> Self {
        Self {
            storage,
            http_client,
            refresher,
            endpoints,
            enricher,
            account_locks: DashMap::new(),
        }
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    pub fn enricher(&self) -> &Enricher {
        &self.enricher
    }

    pub fn endpoints(&self) -> &BusinessProfileEndpoints {
        &self.endpoints
    }

    pub fn http_client(&self) -> reqwest::Client {
        self.http_client.clone()
    }

    /// The user's active Google connection.
    pub async fn active_account(&self, user_id: &str) -> Result<ConnectedAccount, RelayError> {
        let account = self
            .storage
            .get_connected_account(user_id, Platform::Google)
            .await?
            .ok_or_else(|| RelayError::NotConnected(Platform::Google.to_string()))?;
        if !account.is_active {
            return Err(RelayError::ConnectionInactive);
        }
        Ok(account)
    }

    /// The user's active Google connection with a usable access token.
    pub async fn fresh_account(&self, user_id: &str) -> Result<ConnectedAccount, RelayError> {
        let account = self.active_account(user_id).await?;
        let lock = self.account_lock(account.id);
        let _guard = lock.lock().await;
        self.refresher
            .ensure_fresh(&self.storage, account, Utc::now())
            .await
    }

    /// Delete the user's Google connection and forget its pull lock.
    pub async fn disconnect(&self, user_id: &str) -> Result<(), RelayError> {
        let account = self
            .storage
            .get_connected_account(user_id, Platform::Google)
            .await?
            .ok_or_else(|| RelayError::NotConnected(Platform::Google.to_string()))?;
        self.storage
            .delete_connected_account(user_id, Platform::Google)
            .await?;
        // A pull still running keeps its own handle to the mutex.
        self.account_locks.remove(&account.id);
        Ok(())
    }

    pub async fn pull_reviews(&self, user_id: &str) -> Result<IngestSummary, RelayError> {
        let account = self.active_account(user_id).await?;
        let lock = self.account_lock(account.id);
        let _guard = lock.lock().await;

        // Re-read: a pull we waited on may have refreshed the tokens.
        let account = self.active_account(user_id).await?;
        let location_id = account
            .location_id
            .clone()
            .ok_or(RelayError::LocationNotSelected)?;
        let account = self
            .refresher
            .ensure_fresh(&self.storage, account, Utc::now())
            .await?;

        let page = BusinessProfileApi::list_reviews(
            &self.endpoints,
            self.http_client.clone(),
            &account.access_token,
            &location_id,
        )
        .await?;

        let category = account
            .location_name
            .as_deref()
            .and_then(BusinessCategory::infer);

        let mut summary = IngestSummary {
            new_reviews: 0,
            processed: 0,
        };
        for review in page.reviews {
            summary.processed += 1;
            if self.ingest_one(user_id, review, category, Utc::now()).await? {
                summary.new_reviews += 1;
            }
        }

        info!(
            user = user_id,
            location = %location_id,
            new_reviews = summary.new_reviews,
            processed = summary.processed,
            "review pull finished"
        );
        Ok(summary)
    }

    /// Returns whether a new row was stored.
    async fn ingest_one(
        &self,
        user_id: &str,
        review: ProviderReview,
        category: Option<BusinessCategory>,
        now: DateTime<Utc>,
    ) -> Result<bool, RelayError> {
        if self
            .storage
            .review_exists(Platform::Google, &review.review_id)
            .await?
        {
            debug!(review_id = %review.review_id, "review already stored; skipping");
            return Ok(false);
        }

        let new_review = self.build_review(user_id, review, category, now).await;
        let inserted = self
            .storage
            .insert_review_if_absent(&new_review, Utc::now())
            .await?;
        if inserted.is_none() {
            debug!(
                review_id = ?new_review.platform_review_id,
                "review stored concurrently; skipping"
            );
        }
        Ok(inserted.is_some())
    }

    async fn build_review(
        &self,
        user_id: &str,
        review: ProviderReview,
        category: Option<BusinessCategory>,
        now: DateTime<Utc>,
    ) -> NewReview {
        let body = review.comment.unwrap_or_default();
        let rating = review.star_rating;
        let enrichment = self.enricher.enrich(&body, rating, category).await;
        let reviewer_name = review
            .reviewer
            .display_name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| ANONYMOUS_REVIEWER.to_string());

        NewReview {
            user_id: user_id.to_string(),
            platform: Platform::Google,
            platform_review_id: Some(review.review_id),
            reviewer_name,
            reviewer_avatar: review.reviewer.profile_photo_url,
            rating,
            blurb: enrichment.blurb_text(),
            sentiment: enrichment.resolved_sentiment(rating),
            body,
            reviewed_at: review.create_time.unwrap_or(now),
        }
    }

    fn account_lock(&self, account_id: i64) -> Arc<Mutex<()>> {
        self.account_locks
            .entry(account_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}
