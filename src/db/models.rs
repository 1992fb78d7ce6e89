use crate::types::{Platform, Sentiment};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stored OAuth credential set linking a local user to a review platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectedAccount {
    pub id: i64,
    pub user_id: String,
    pub platform: Platform,
    #[serde(skip_serializing)]
    pub access_token: String,
    #[serde(skip_serializing)]
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub account_email: Option<String>,
    pub location_id: Option<String>,
    pub location_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ConnectedAccount {
    /// A missing expiry is treated as a token that never expires.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        matches!(self.expires_at, Some(exp) if exp < now)
    }
}

/// Token set produced by the OAuth callback.
#[derive(Debug, Clone)]
pub struct NewConnection {
    pub user_id: String,
    pub platform: Platform,
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub account_email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    pub id: i64,
    pub user_id: String,
    pub platform: Platform,
    pub platform_review_id: Option<String>,
    pub reviewer_name: String,
    pub reviewer_avatar: Option<String>,
    pub rating: i64,
    pub body: String,
    pub reviewed_at: DateTime<Utc>,
    pub ingested_at: DateTime<Utc>,
    pub blurb: Option<String>,
    pub sentiment: Option<Sentiment>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewReview {
    pub user_id: String,
    pub platform: Platform,
    pub platform_review_id: Option<String>,
    pub reviewer_name: String,
    pub reviewer_avatar: Option<String>,
    pub rating: i64,
    pub body: String,
    pub reviewed_at: DateTime<Utc>,
    pub blurb: Option<String>,
    pub sentiment: Option<Sentiment>,
}
