//! LLM-backed stance validation over `/v1/chat/completions`.
//!
//! The model is asked whether a piece of evidence really supports the pole
//! it claims to, and must answer with a JSON object carrying a confidence
//! and a short reasoning. Model output being model output, the reply is
//! scanned for the first parseable JSON object rather than parsed whole.

use crate::transport_error;
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};
use worldview_core::axis::{PoleAlignment, StanceVerdict};
use worldview_core::error::ServiceError;
use worldview_core::services::StanceValidator;
use worldview_config::ServicesConfig;

pub struct LlmStanceValidator {
    base_url: String,
    model: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl LlmStanceValidator {
    pub fn from_config(config: &ServicesConfig) -> Result<Self, ServiceError> {
        if config.validator_url.trim().is_empty() {
            return Err(ServiceError::NotConfigured(
                "validator_url is empty".into(),
            ));
        }
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ServiceError::NotConfigured(e.to_string()))?;

        Ok(Self {
            base_url: config.validator_url.trim_end_matches('/').to_string(),
            model: config.validator_model.clone(),
            api_key: config.api_key.clone(),
            client,
        })
    }

    fn prompt(
        axis_label: &str,
        pole_left: &str,
        pole_right: &str,
        evidence_text: &str,
        claimed: PoleAlignment,
    ) -> String {
        let claimed_pole = match claimed {
            PoleAlignment::Left => pole_left,
            PoleAlignment::Right => pole_right,
        };
        format!(
            "You are verifying a stance claim on the belief axis \"{axis_label}\".\n\
             Left pole: {pole_left}\n\
             Right pole: {pole_right}\n\n\
             Evidence text:\n{evidence_text}\n\n\
             The evidence claims to support the {claimed} pole ({claimed_pole}).\n\
             Reply with only a JSON object: {{\"confidence\": <0.0-1.0 that the \
             claim is correct>, \"reasoning\": \"<one sentence>\"}}"
        )
    }
}

#[derive(Deserialize)]
struct ApiChatResponse {
    choices: Vec<ApiChoice>,
}

#[derive(Deserialize)]
struct ApiChoice {
    message: ApiMessage,
}

#[derive(Deserialize)]
struct ApiMessage {
    content: Option<String>,
}

/// Find and parse the first JSON object embedded in free-form model output.
fn extract_verdict(text: &str) -> Option<StanceVerdict> {
    let bytes = text.as_bytes();
    for start in 0..bytes.len() {
        if bytes[start] != b'{' {
            continue;
        }
        let mut depth = 0usize;
        let mut in_string = false;
        let mut escaped = false;
        for (offset, &b) in bytes[start..].iter().enumerate() {
            if escaped {
                escaped = false;
                continue;
            }
            match b {
                b'\\' if in_string => escaped = true,
                b'"' => in_string = !in_string,
                b'{' if !in_string => depth += 1,
                b'}' if !in_string => {
                    depth -= 1;
                    if depth == 0 {
                        let candidate = &text[start..=start + offset];
                        if let Ok(verdict) = serde_json::from_str::<StanceVerdict>(candidate) {
                            return Some(verdict);
                        }
                        break;
                    }
                }
                _ => {}
            }
        }
    }
    None
}

#[async_trait]
impl StanceValidator for LlmStanceValidator {
    async fn validate(
        &self,
        axis_label: &str,
        pole_left: &str,
        pole_right: &str,
        evidence_text: &str,
        claimed: PoleAlignment,
    ) -> Result<Option<StanceVerdict>, ServiceError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = serde_json::json!({
            "model": self.model,
            "messages": [{
                "role": "user",
                "content": Self::prompt(axis_label, pole_left, pole_right, evidence_text, claimed),
            }],
            "temperature": 0.0,
            "stream": false,
        });

        debug!(model = %self.model, axis = %axis_label, "Sending stance validation request");

        let mut request = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&body);
        if let Some(key) = &self.api_key {
            request = request.header("Authorization", format!("Bearer {key}"));
        }

        let response = match request.send().await.map_err(transport_error) {
            Ok(response) => response,
            Err(e @ (ServiceError::Timeout(_) | ServiceError::Network(_))) => {
                warn!(error = %e, "Stance validator unreachable");
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        let status = response.status().as_u16();
        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Stance validator returned error");
            return Err(ServiceError::ApiError {
                status_code: status,
                message: error_body,
            });
        }

        let api: ApiChatResponse = match response.json().await {
            Ok(api) => api,
            Err(e) => {
                warn!(error = %e, "Unparseable validator response");
                return Ok(None);
            }
        };
        let content = api
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();

        match extract_verdict(&content) {
            Some(verdict) if (0.0..=1.0).contains(&verdict.confidence) => Ok(Some(verdict)),
            Some(verdict) => {
                warn!(confidence = verdict.confidence, "Verdict confidence out of range");
                Ok(None)
            }
            None => {
                warn!(reply = %content, "No verdict object in validator reply");
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_bare_object() {
        let v = extract_verdict(r#"{"confidence": 0.85, "reasoning": "clearly supports"}"#)
            .unwrap();
        assert_eq!(v.confidence, 0.85);
        assert_eq!(v.reasoning, "clearly supports");
    }

    #[test]
    fn extracts_object_wrapped_in_prose() {
        let reply = "Sure! Here is my assessment:\n```json\n{\"confidence\": 0.3, \
                     \"reasoning\": \"the text argues the opposite\"}\n```\nHope that helps.";
        let v = extract_verdict(reply).unwrap();
        assert_eq!(v.confidence, 0.3);
    }

    #[test]
    fn braces_inside_strings_do_not_confuse_the_scanner() {
        let reply = r#"{"confidence": 0.7, "reasoning": "quotes a {nested} phrase"}"#;
        let v = extract_verdict(reply).unwrap();
        assert_eq!(v.confidence, 0.7);
    }

    #[test]
    fn missing_confidence_is_no_verdict() {
        assert!(extract_verdict(r#"{"reasoning": "no number"}"#).is_none());
        assert!(extract_verdict("I cannot answer in JSON.").is_none());
    }

    #[test]
    fn reasoning_defaults_to_empty() {
        let v = extract_verdict(r#"{"confidence": 0.5}"#).unwrap();
        assert!(v.reasoning.is_empty());
    }

    #[test]
    fn prompt_names_both_poles_and_the_claim() {
        let p = LlmStanceValidator::prompt(
            "carbon pricing",
            "taxes hurt growth",
            "taxes work",
            "new study shows emissions fell",
            PoleAlignment::Right,
        );
        assert!(p.contains("carbon pricing"));
        assert!(p.contains("taxes hurt growth"));
        assert!(p.contains("right pole"));
    }
}
