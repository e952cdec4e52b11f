use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::{Client, ClientBuilder};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::OracleError;
use crate::model::Oracle;

#[derive(Deserialize)]
struct GeminiPart {
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
struct GeminiContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    content: Option<GeminiContent>,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiPromptFeedback {
    block_reason: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    prompt_feedback: Option<GeminiPromptFeedback>,
}

#[derive(Deserialize)]
struct GeminiErrorBody {
    error: GeminiErrorDetail,
}

#[derive(Deserialize)]
struct GeminiErrorDetail {
    #[serde(default)]
    message: String,
    #[allow(unused)] // needed for deserialization
    status: Option<String>,
}

/// Completion oracle backed by the Generative Language `generateContent` endpoint.
pub struct GeminiOracle {
    client: Client,
    api_base: String,
    model: String,
    api_key: Option<String>,
    temperature: f64,
    max_output_tokens: u32,
}

impl GeminiOracle {
    pub fn new(config: &Config) -> Result<Self, OracleError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let client = ClientBuilder::new()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(headers)
            .build()
            .map_err(|err| OracleError::new(None, err.to_string()))?;
        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key: config.api_key(),
            temperature: config.temperature,
            max_output_tokens: config.max_output_tokens,
        })
    }

    fn url(&self) -> String {
        format!("{}/models/{}:generateContent", self.api_base, self.model)
    }

    fn request_body(&self, prompt: &str) -> Value {
        json!({
            "contents": [{"parts": [{"text": prompt}]}],
            "generationConfig": {
                "temperature": self.temperature,
                "maxOutputTokens": self.max_output_tokens,
            }
        })
    }
}

#[async_trait]
impl Oracle for GeminiOracle {
    async fn generate(&self, prompt: &str) -> Result<String, OracleError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| OracleError::new(None, "API key is not configured"))?;
        let response = self
            .client
            .post(self.url())
            .header("x-goog-api-key", api_key)
            .json(&self.request_body(prompt))
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<GeminiErrorBody>(&text)
                .map(|body| body.error.message)
                .unwrap_or(text);
            warn!(status = status.as_u16(), %message, "provider returned error");
            return Err(OracleError::new(Some(status.as_u16()), message));
        }

        let response: GeminiResponse = response.json().await.map_err(transport_error)?;
        extract_text(response)
    }

    fn has_credential(&self) -> bool {
        self.api_key.is_some()
    }
}

fn transport_error(err: reqwest::Error) -> OracleError {
    OracleError::new(err.status().map(|status| status.as_u16()), err.to_string())
}

fn extract_text(response: GeminiResponse) -> Result<String, OracleError> {
    let Some(candidate) = response.candidates.into_iter().next() else {
        let reason = response
            .prompt_feedback
            .and_then(|feedback| feedback.block_reason)
            .unwrap_or_else(|| "no candidates returned".to_string());
        return Err(OracleError::new(None, format!("Response was blocked: {reason}")));
    };
    let text: String = candidate
        .content
        .map(|content| content.parts.into_iter().map(|part| part.text).collect())
        .unwrap_or_default();
    if text.trim().is_empty() {
        if let Some(reason) = candidate
            .finish_reason
            .filter(|reason| !matches!(reason.as_str(), "STOP" | "MAX_TOKENS"))
        {
            return Err(OracleError::new(
                None,
                format!("Candidate was blocked due to {reason}"),
            ));
        }
    }
    debug!(chars = text.chars().count(), "gemini candidate text");
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::{extract_text, GeminiOracle, GeminiResponse};
    use crate::config::Config;
    use crate::error::{ClassifiedError, ErrorKind};

    fn parse(body: &str) -> GeminiResponse {
        serde_json::from_str(body).unwrap()
    }

    #[test]
    fn request_body_carries_the_exact_temperature() {
        let oracle = GeminiOracle::new(&Config::default()).unwrap();
        let body = oracle.request_body("Explain osmosis");
        assert_eq!(body["generationConfig"]["temperature"].to_string(), "0.7");
        assert_eq!(body["generationConfig"]["maxOutputTokens"], 8192);
        assert_eq!(body["contents"][0]["parts"][0]["text"], "Explain osmosis");
    }

    #[test]
    fn joins_candidate_parts() {
        let response = parse(
            r#"{"candidates":[{"content":{"parts":[{"text":"Hello "},{"text":"world"}],"role":"model"},"finishReason":"STOP"}]}"#,
        );
        assert_eq!(extract_text(response).unwrap(), "Hello world");
    }

    #[test]
    fn block_reason_classifies_as_blocked() {
        let response = parse(r#"{"promptFeedback":{"blockReason":"SAFETY"}}"#);
        let err = extract_text(response).unwrap_err();
        assert_eq!(ClassifiedError::from(err).kind, ErrorKind::ContentBlocked);
    }

    #[test]
    fn empty_candidate_with_safety_finish_is_blocked() {
        let response = parse(r#"{"candidates":[{"finishReason":"SAFETY","index":0}]}"#);
        let err = extract_text(response).unwrap_err();
        assert_eq!(err.message, "Candidate was blocked due to SAFETY");
        assert_eq!(ClassifiedError::from(err).kind, ErrorKind::ContentBlocked);

        let response = parse(r#"{"candidates":[{"finishReason":"RECITATION","index":0}]}"#);
        assert_eq!(
            ClassifiedError::from(extract_text(response).unwrap_err()).kind,
            ErrorKind::ContentBlocked
        );
    }

    #[test]
    fn empty_candidate_that_stopped_normally_is_not_blocked() {
        let response = parse(r#"{"candidates":[{"finishReason":"STOP","index":0}]}"#);
        assert_eq!(extract_text(response).unwrap(), "");
    }

    #[cfg(feature = "live-api-tests")]
    #[tokio::test]
    async fn live_generate() {
        use crate::model::Oracle;

        dotenvy::dotenv().ok();
        let oracle = GeminiOracle::new(&Config::default()).unwrap();
        let reply = oracle
            .generate("Reply with the single word: ready")
            .await
            .unwrap();
        assert!(!reply.trim().is_empty());
    }
}
