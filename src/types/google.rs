use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// One page of `accounts/*/locations/*/reviews`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListReviewsResponse {
    #[serde(default)]
    pub reviews: Vec<ProviderReview>,
    pub average_rating: Option<f64>,
    pub total_review_count: Option<u64>,
    pub next_page_token: Option<String>,
}

/// Review as returned by the Business Profile API.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderReview {
    pub review_id: String,
    #[serde(default)]
    pub reviewer: Reviewer,
    #[serde(default, deserialize_with = "deserialize_star_rating")]
    pub star_rating: i64,
    pub comment: Option<String>,
    pub create_time: Option<DateTime<Utc>>,
    pub update_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reviewer {
    pub display_name: Option<String>,
    pub profile_photo_url: Option<String>,
    #[serde(default)]
    pub is_anonymous: bool,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawStarRating {
    Number(f64),
    Word(String),
}

/// Accepts both numeric ratings and the `ONE`..`FIVE` enum words. Anything
/// unrecognised (including `STAR_RATING_UNSPECIFIED`) becomes 0.
fn deserialize_star_rating<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<RawStarRating>::deserialize(deserializer)?;
    let rating = match raw {
        None => 0,
        Some(RawStarRating::Number(n)) if n.is_finite() => n.round() as i64,
        Some(RawStarRating::Number(_)) => 0,
        Some(RawStarRating::Word(w)) => match w.trim().to_ascii_uppercase().as_str() {
            "ONE" => 1,
            "TWO" => 2,
            "THREE" => 3,
            "FOUR" => 4,
            "FIVE" => 5,
            other => other.parse::<i64>().unwrap_or(0),
        },
    };
    Ok(rating.clamp(0, 5))
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListAccountsResponse {
    #[serde(default)]
    pub accounts: Vec<BusinessAccount>,
    pub next_page_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BusinessAccount {
    /// Resource name, `accounts/{id}`.
    pub name: String,
    pub account_name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListLocationsResponse {
    #[serde(default)]
    pub locations: Vec<BusinessLocation>,
    pub next_page_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusinessLocation {
    /// Resource name, `locations/{id}`.
    pub name: String,
    pub title: Option<String>,
}

/// Location choice offered to the user; `location_id` is the full
/// `accounts/{a}/locations/{l}` path the reviews API expects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationOption {
    pub location_id: String,
    pub location_name: String,
    pub account_name: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_enum_and_numeric_star_ratings() {
        let body = r#"{
            "reviews": [
                {"reviewId": "a", "starRating": "FOUR", "comment": "ok"},
                {"reviewId": "b", "starRating": 2},
                {"reviewId": "c", "starRating": "STAR_RATING_UNSPECIFIED"},
                {"reviewId": "d"}
            ],
            "nextPageToken": "tok"
        }"#;
        let page: ListReviewsResponse = serde_json::from_str(body).unwrap();
        let ratings: Vec<i64> = page.reviews.iter().map(|r| r.star_rating).collect();
        assert_eq!(ratings, vec![4, 2, 0, 0]);
        assert_eq!(page.next_page_token.as_deref(), Some("tok"));
    }

    #[test]
    fn reviewer_fields_are_optional() {
        let review: ProviderReview = serde_json::from_str(
            r#"{"reviewId": "x", "reviewer": {"isAnonymous": true}, "createTime": "2024-05-01T10:00:00Z"}"#,
        )
        .unwrap();
        assert!(review.reviewer.display_name.is_none());
        assert!(review.reviewer.is_anonymous);
        assert!(review.create_time.is_some());
    }
}
