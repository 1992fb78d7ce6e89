use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;

use crate::db::Review;
use crate::middleware::CurrentUser;
use crate::service::BusinessCategory;
use crate::service::reviews::{ManualReview, add_manual_review, generate_blurb_for_review};
use crate::types::{IngestSummary, Platform};
use crate::{RelayError, router::RelayState};

const DEFAULT_LIST_LIMIT: i64 = 100;
const MAX_LIST_LIMIT: i64 = 500;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub limit: Option<i64>,
}

/// POST /api/reviews/pull
pub async fn pull_reviews(
    State(state): State<RelayState>,
    CurrentUser(user_id): CurrentUser,
) -> Result<Json<IngestSummary>, RelayError> {
    let summary = state.ingestor.pull_reviews(&user_id).await?;
    Ok(Json(summary))
}

/// GET /api/reviews?limit=N
pub async fn list_reviews(
    State(state): State<RelayState>,
    CurrentUser(user_id): CurrentUser,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Review>>, RelayError> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_LIST_LIMIT)
        .clamp(1, MAX_LIST_LIMIT);
    let reviews = state.ingestor.storage().list_reviews(&user_id, limit).await?;
    Ok(Json(reviews))
}

/// POST /api/reviews
pub async fn create_review(
    State(state): State<RelayState>,
    CurrentUser(user_id): CurrentUser,
    Json(input): Json<ManualReview>,
) -> Result<(StatusCode, Json<Review>), RelayError> {
    let category = business_category(&state, &user_id).await?;
    let review = add_manual_review(
        state.ingestor.storage(),
        state.ingestor.enricher(),
        &user_id,
        input,
        category,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(review)))
}

/// POST /api/reviews/{id}/blurb
pub async fn generate_blurb(
    State(state): State<RelayState>,
    CurrentUser(user_id): CurrentUser,
    Path(review_id): Path<i64>,
) -> Result<Json<Review>, RelayError> {
    let category = business_category(&state, &user_id).await?;
    let review = generate_blurb_for_review(
        state.ingestor.storage(),
        state.ingestor.enricher(),
        &user_id,
        review_id,
        category,
    )
    .await?;
    Ok(Json(review))
}

/// Category of the user's selected Google location, if any.
async fn business_category(
    state: &RelayState,
    user_id: &str,
) -> Result<Option<BusinessCategory>, RelayError> {
    let account = state
        .ingestor
        .storage()
        .get_connected_account(user_id, Platform::Google)
        .await?;
    Ok(account
        .and_then(|a| a.location_name)
        .as_deref()
        .and_then(BusinessCategory::infer))
}
