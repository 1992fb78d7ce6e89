//! AI enrichment of review text: marketing blurbs and sentiment labels.
//!
//! Every call is best-effort. Each operation returns an [`Enriched`] value
//! recording which path produced the result; on fallback the ingestor uses
//! the rating-derived sentiment.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::api::TextGenerator;
use crate::types::Sentiment;

const BLURB_SYSTEM_PROMPT: &str = "You write short marketing copy for small businesses, \
     based only on what their customers said in reviews.";
const SENTIMENT_SYSTEM_PROMPT: &str = "You classify the sentiment of customer reviews.";
const BLURB_MAX_TOKENS: u32 = 120;
const SENTIMENT_MAX_TOKENS: u32 = 5;

/// Why an enrichment produced no generated value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FallbackReason {
    /// No text-generation backend is configured.
    NotConfigured,
    /// The backend call failed.
    Failed(String),
    /// The backend answered with nothing usable.
    EmptyResponse,
    /// The classifier's answer was not one of the allowed labels.
    Unrecognized(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Enriched<T> {
    Generated(T),
    /// Decided from the star rating without a network call.
    FromRating(T),
    Fallback(FallbackReason),
}

impl<T> Enriched<T> {
    pub fn value(self) -> Option<T> {
        match self {
            Enriched::Generated(v) | Enriched::FromRating(v) => Some(v),
            Enriched::Fallback(_) => None,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Enriched::Fallback(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusinessCategory {
    Restaurant,
    Salon,
    Retail,
    Healthcare,
    Fitness,
    Service,
}

const CATEGORY_KEYWORDS: &[(BusinessCategory, &[&str])] = &[
    (
        BusinessCategory::Restaurant,
        &[
            "restaurant", "cafe", "café", "coffee", "bistro", "grill", "kitchen", "pizza",
            "diner", "bakery", "eatery", "bar", "pub", "taco", "sushi", "burger",
        ],
    ),
    (
        BusinessCategory::Salon,
        &["salon", "spa", "barber", "beauty", "hair", "nail", "lash", "brow"],
    ),
    (
        BusinessCategory::Retail,
        &["shop", "store", "boutique", "market", "outlet", "mart", "goods"],
    ),
    (
        BusinessCategory::Healthcare,
        &[
            "clinic", "dental", "dentist", "medical", "health", "pharmacy", "doctor",
            "therapy", "chiropractic", "vet",
        ],
    ),
    (
        BusinessCategory::Fitness,
        &["gym", "fitness", "yoga", "pilates", "crossfit", "boxing", "training"],
    ),
    (
        BusinessCategory::Service,
        &[
            "service", "repair", "cleaning", "plumbing", "electric", "auto", "consulting",
            "movers", "landscaping",
        ],
    ),
];

impl BusinessCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            BusinessCategory::Restaurant => "restaurant",
            BusinessCategory::Salon => "salon",
            BusinessCategory::Retail => "retail",
            BusinessCategory::Healthcare => "healthcare",
            BusinessCategory::Fitness => "fitness",
            BusinessCategory::Service => "service",
        }
    }

    /// Keyword match on the business name, whole words only. Categories are
    /// tried in a fixed order and the first hit wins.
    pub fn infer(business_name: &str) -> Option<Self> {
        let lower = business_name.to_lowercase();
        let words: Vec<&str> = lower
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .collect();
        CATEGORY_KEYWORDS
            .iter()
            .find(|(_, keywords)| keywords.iter().any(|k| words.contains(k)))
            .map(|(category, _)| *category)
    }
}

/// Which AI calls a review qualifies for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnrichmentPlan {
    BlurbAndSentiment,
    SentimentOnly,
    Skip,
}

impl EnrichmentPlan {
    /// Low ratings never get promotional copy; empty text gets nothing.
    pub fn for_review(body: &str, rating: i64) -> Self {
        if body.trim().is_empty() {
            EnrichmentPlan::Skip
        } else if rating >= 3 {
            EnrichmentPlan::BlurbAndSentiment
        } else {
            EnrichmentPlan::SentimentOnly
        }
    }
}

/// Outcome of enriching one review.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewEnrichment {
    pub plan: EnrichmentPlan,
    pub blurb: Option<Enriched<String>>,
    pub sentiment: Option<Enriched<Sentiment>>,
}

impl ReviewEnrichment {
    pub fn blurb_text(&self) -> Option<String> {
        self.blurb.clone().and_then(Enriched::value)
    }

    /// Classified label, or the rating-derived one when classification fell
    /// back. `None` only when the review was not enriched at all.
    pub fn resolved_sentiment(&self, rating: i64) -> Option<Sentiment> {
        self.sentiment
            .clone()
            .map(|s| s.value().unwrap_or_else(|| Sentiment::from_rating(rating)))
    }
}

#[derive(Clone, Default)]
pub struct Enricher {
    generator: Option<Arc<dyn TextGenerator>>,
}

impl Enricher {
    pub fn new(generator: Option<Arc<dyn TextGenerator>>) -> Self {
        Self { generator }
    }

    pub fn is_configured(&self) -> bool {
        self.generator.is_some()
    }

    /// Apply the enrichment policy to one review.
    pub async fn enrich(
        &self,
        body: &str,
        rating: i64,
        category: Option<BusinessCategory>,
    ) -> ReviewEnrichment {
        let plan = EnrichmentPlan::for_review(body, rating);
        let (blurb, sentiment) = match plan {
            EnrichmentPlan::Skip => (None, None),
            EnrichmentPlan::SentimentOnly => {
                (None, Some(self.classify_sentiment(body, rating).await))
            }
            EnrichmentPlan::BlurbAndSentiment => {
                let blurb = self.generate_blurb(body, rating, category).await;
                let sentiment = self.classify_sentiment(body, rating).await;
                (Some(blurb), Some(sentiment))
            }
        };
        ReviewEnrichment {
            plan,
            blurb,
            sentiment,
        }
    }

    /// 1–2 sentence marketing paraphrase of `text`.
    pub async fn generate_blurb(
        &self,
        text: &str,
        rating: i64,
        category: Option<BusinessCategory>,
    ) -> Enriched<String> {
        let Some(generator) = &self.generator else {
            return Enriched::Fallback(FallbackReason::NotConfigured);
        };
        let prompt = blurb_prompt(text, rating, category);
        match generator
            .generate(BLURB_SYSTEM_PROMPT, &prompt, BLURB_MAX_TOKENS)
            .await
        {
            Ok(raw) => {
                let blurb = strip_quotes(&raw);
                if blurb.is_empty() {
                    warn!("blurb generation returned empty text");
                    Enriched::Fallback(FallbackReason::EmptyResponse)
                } else {
                    Enriched::Generated(blurb.to_string())
                }
            }
            Err(e) => {
                warn!(error = %e, "blurb generation failed; leaving blurb empty");
                Enriched::Fallback(FallbackReason::Failed(e.to_string()))
            }
        }
    }

    /// Ratings other than 3 are decided from the rating alone.
    pub async fn classify_sentiment(&self, text: &str, rating: i64) -> Enriched<Sentiment> {
        if rating != 3 {
            return Enriched::FromRating(Sentiment::from_rating(rating));
        }
        let Some(generator) = &self.generator else {
            return Enriched::Fallback(FallbackReason::NotConfigured);
        };
        let prompt = sentiment_prompt(text);
        match generator
            .generate(SENTIMENT_SYSTEM_PROMPT, &prompt, SENTIMENT_MAX_TOKENS)
            .await
        {
            Ok(answer) => match parse_sentiment_answer(&answer) {
                Some(sentiment) => {
                    debug!(%sentiment, "sentiment classified");
                    Enriched::Generated(sentiment)
                }
                None if answer.trim().is_empty() => {
                    Enriched::Fallback(FallbackReason::EmptyResponse)
                }
                None => {
                    warn!(answer = %answer.trim(), "unrecognized sentiment answer");
                    Enriched::Fallback(FallbackReason::Unrecognized(answer.trim().to_string()))
                }
            },
            Err(e) => {
                warn!(error = %e, "sentiment classification failed; using rating");
                Enriched::Fallback(FallbackReason::Failed(e.to_string()))
            }
        }
    }
}

fn blurb_prompt(text: &str, rating: i64, category: Option<BusinessCategory>) -> String {
    let business = match category {
        Some(c) => format!("a {} business", c.as_str()),
        None => "a local business".to_string(),
    };
    format!(
        "Turn this {rating}-star customer review of {business} into a 1-2 sentence \
         marketing blurb the business can share.\n\
         Keep the customer's voice, leave out anything negative, and do not invent details.\n\
         Reply with the blurb only.\n\n\
         Review: {text}"
    )
}

fn sentiment_prompt(text: &str) -> String {
    format!(
        "Classify the sentiment of this 3-star review. \
         Answer with exactly one word: positive, negative, or neutral.\n\n\
         Review: {text}"
    )
}

fn parse_sentiment_answer(answer: &str) -> Option<Sentiment> {
    let lower = answer.to_lowercase();
    let cleaned = lower.trim().trim_matches(|c: char| !c.is_alphabetic());
    if let Ok(s) = cleaned.parse::<Sentiment>() {
        return Some(s);
    }
    let mut found = [Sentiment::Positive, Sentiment::Negative, Sentiment::Neutral]
        .into_iter()
        .filter(|s| lower.contains(s.as_str()));
    match (found.next(), found.next()) {
        (Some(only), None) => Some(only),
        _ => None,
    }
}

/// Trim whitespace and any surrounding quote characters.
pub fn strip_quotes(raw: &str) -> &str {
    raw.trim()
        .trim_matches(|c| matches!(c, '"' | '\'' | '`' | '“' | '”' | '‘' | '’'))
        .trim()
}
