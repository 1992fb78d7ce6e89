pub mod google_oauth;
pub mod integrations;
pub mod reviews;
