use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::info;

use crate::db::{NewReview, Review, Storage};
use crate::error::RelayError;
use crate::service::enrichment::{
    BusinessCategory, Enriched, Enricher, EnrichmentPlan, FallbackReason,
};
use crate::types::Platform;

/// Review typed in by the business owner rather than ingested.
#[derive(Debug, Clone, Deserialize)]
pub struct ManualReview {
    #[serde(default = "default_platform")]
    pub platform: Platform,
    pub reviewer_name: Option<String>,
    pub rating: i64,
    #[serde(default)]
    pub body: String,
    pub reviewed_at: Option<DateTime<Utc>>,
}

fn default_platform() -> Platform {
    Platform::Manual
}

/// Store a manual review with the same enrichment policy as ingestion.
pub async fn add_manual_review(
    storage: &Storage,
    enricher: &Enricher,
    user_id: &str,
    input: ManualReview,
    category: Option<BusinessCategory>,
) -> Result<Review, RelayError> {
    if !(1..=5).contains(&input.rating) {
        return Err(RelayError::InvalidRequest(
            "rating must be between 1 and 5".to_string(),
        ));
    }
    if input.platform == Platform::Google {
        // Google rows come only from ingestion and always carry a provider id.
        return Err(RelayError::InvalidRequest(
            "google reviews are ingested, not entered manually".to_string(),
        ));
    }
    let body = input.body.trim().to_string();
    let enrichment = enricher.enrich(&body, input.rating, category).await;
    let now = Utc::now();
    let review = NewReview {
        user_id: user_id.to_string(),
        platform: input.platform,
        platform_review_id: None,
        reviewer_name: input
            .reviewer_name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| "Anonymous".to_string()),
        reviewer_avatar: None,
        rating: input.rating,
        blurb: enrichment.blurb_text(),
        sentiment: enrichment.resolved_sentiment(input.rating),
        body,
        reviewed_at: input.reviewed_at.unwrap_or(now),
    };
    let id = storage
        .insert_review_if_absent(&review, now)
        .await?
        .ok_or_else(|| RelayError::InvalidRequest("review already exists".to_string()))?;
    info!(user = user_id, id, platform = %review.platform, "manual review stored");
    storage.get_review(user_id, id).await?.ok_or(RelayError::NotFound)
}

/// Generate (or regenerate) the blurb for a stored review.
pub async fn generate_blurb_for_review(
    storage: &Storage,
    enricher: &Enricher,
    user_id: &str,
    review_id: i64,
    category: Option<BusinessCategory>,
) -> Result<Review, RelayError> {
    let mut review = storage
        .get_review(user_id, review_id)
        .await?
        .ok_or(RelayError::NotFound)?;
    if EnrichmentPlan::for_review(&review.body, review.rating) != EnrichmentPlan::BlurbAndSentiment
    {
        return Err(RelayError::BlurbNotAllowed);
    }

    let blurb = match enricher
        .generate_blurb(&review.body, review.rating, category)
        .await
    {
        Enriched::Generated(text) | Enriched::FromRating(text) => text,
        Enriched::Fallback(FallbackReason::Failed(msg)) => {
            return Err(RelayError::TextGeneration(msg));
        }
        Enriched::Fallback(reason) => {
            return Err(RelayError::TextGeneration(format!("{reason:?}")));
        }
    };
    storage.update_blurb(review.id, &blurb).await?;
    info!(user = user_id, id = review.id, "blurb generated");
    review.blurb = Some(blurb);
    Ok(review)
}
