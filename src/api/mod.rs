pub mod business_profile;
pub mod openai;

pub use business_profile::{BusinessProfileApi, BusinessProfileEndpoints};
pub use openai::{OpenAiClient, OpenAiSettings, TextGenerator};
