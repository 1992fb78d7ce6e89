pub mod enrichment;
pub mod ingest;
pub mod reviews;

#[cfg(test)]
pub(crate) mod testing;

pub use enrichment::{BusinessCategory, Enriched, Enricher, FallbackReason};
pub use ingest::ReviewIngestor;
