pub mod google;
pub mod openai;
pub mod review;

pub use review::{IngestSummary, Platform, Sentiment};
