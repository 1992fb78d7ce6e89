use std::sync::Mutex;

use async_trait::async_trait;

use crate::api::TextGenerator;
use crate::error::RelayError;

/// In-process generator that records every call and replays a fixed answer.
pub(crate) struct ScriptedGenerator {
    answer: Option<String>,
    calls: Mutex<Vec<(String, String)>>,
}

impl ScriptedGenerator {
    pub(crate) fn answering(answer: &str) -> Self {
        Self {
            answer: Some(answer.to_string()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn failing() -> Self {
        Self {
            answer: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub(crate) fn blurb_calls(&self) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(system, _)| system.contains("marketing"))
            .count()
    }

    pub(crate) fn prompts(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(_, prompt)| prompt.clone())
            .collect()
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn generate(
        &self,
        system: &str,
        prompt: &str,
        _max_tokens: u32,
    ) -> Result<String, RelayError> {
        self.calls
            .lock()
            .unwrap()
            .push((system.to_string(), prompt.to_string()));
        self.answer
            .clone()
            .ok_or_else(|| RelayError::TextGeneration("scripted outage".to_string()))
    }
}
