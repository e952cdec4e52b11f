//! Shared test helpers.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::OracleError;
use crate::model::Oracle;

/// An oracle that returns scripted results in order and records the prompts
/// it was sent. Panics if called more times than it has results.
pub struct ScriptedOracle {
    results: Mutex<Vec<Result<String, OracleError>>>,
    prompts: Mutex<Vec<String>>,
    credential: bool,
}

impl ScriptedOracle {
    pub fn new(results: Vec<Result<String, OracleError>>) -> Self {
        Self {
            results: Mutex::new(results),
            prompts: Mutex::new(Vec::new()),
            credential: true,
        }
    }

    pub fn texts(texts: &[&str]) -> Self {
        Self::new(texts.iter().map(|text| Ok((*text).to_string())).collect())
    }

    pub fn without_credential() -> Self {
        Self {
            credential: false,
            ..Self::new(Vec::new())
        }
    }

    pub fn call_count(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl Oracle for ScriptedOracle {
    async fn generate(&self, prompt: &str) -> Result<String, OracleError> {
        let call = {
            let mut prompts = self.prompts.lock().unwrap();
            prompts.push(prompt.to_string());
            prompts.len()
        };
        let mut results = self.results.lock().unwrap();
        assert!(
            !results.is_empty(),
            "ScriptedOracle: no more results (call #{call})"
        );
        results.remove(0)
    }

    fn has_credential(&self) -> bool {
        self.credential
    }
}
