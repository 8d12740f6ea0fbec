use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::LlmConfig;
use crate::errors::{CoreError, CoreResult};
use crate::log_llm_operation;

/// One chat turn in an OpenAI-style request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f64,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

/// Client for any OpenAI-compatible chat-completions endpoint.
#[derive(Debug, Clone)]
pub struct LlmProvider {
    client: Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl LlmProvider {
    pub fn new(config: &LlmConfig) -> CoreResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(anyhow::Error::from)?;
        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        })
    }

    pub fn model_name(&self) -> &str {
        &self.model
    }

    /// Send one completion request and return the assistant's text.
    pub async fn complete(
        &self,
        operation: &'static str,
        system_message: Option<&str>,
        prompt: &str,
    ) -> CoreResult<String> {
        let mut messages = Vec::new();
        if let Some(system) = system_message {
            messages.push(ChatMessage {
                role: "system".to_string(),
                content: system.to_string(),
            });
        }
        messages.push(ChatMessage {
            role: "user".to_string(),
            content: prompt.to_string(),
        });

        let request = ChatRequest {
            model: self.model.clone(),
            messages,
            temperature: 0.7,
            max_tokens: 4000,
        };

        log_llm_operation!(start, operation, model = self.model, prompt_length = prompt.len());

        let response = self
            .client
            .post(format!("{}/chat/completions", self.endpoint))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await
            .map_err(|err| {
                log_llm_operation!(error, operation, error = err);
                CoreError::Unavailable(format!("LLM request failed: {err}"))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            log_llm_operation!(error, operation, error = format!("{status}: {body}"));
            return Err(CoreError::Unavailable(format!(
                "LLM returned status {status}"
            )));
        }

        let parsed: ChatResponse = response.json().await.map_err(|err| {
            log_llm_operation!(error, operation, error = err);
            CoreError::BadAiOutput(format!("malformed completion response: {err}"))
        })?;

        let content = parsed
            .choices
            .first()
            .map(|choice| choice.message.content.clone())
            .ok_or_else(|| CoreError::BadAiOutput("completion had no choices".to_string()))?;

        log_llm_operation!(success, operation, response_length = content.len());
        Ok(content)
    }
}

/// Pulls machine-readable JSON out of chatty model output.
pub struct JsonResponseParser;

impl JsonResponseParser {
    /// Strip markdown fences and surrounding prose, preferring a top-level
    /// array since card generation always expects one.
    pub fn extract_json(content: &str) -> String {
        if let Some(start) = content.find("```json") {
            if let Some(end) = content[start + 7..].find("```") {
                return content[start + 7..start + 7 + end].trim().to_string();
            }
        }
        if let Some(start) = content.find("```") {
            if let Some(end) = content[start + 3..].find("```") {
                let candidate = content[start + 3..start + 3 + end].trim();
                if candidate.starts_with('[') || candidate.starts_with('{') {
                    return candidate.to_string();
                }
            }
        }
        if let Some(start) = content.find('[') {
            if let Some(end) = content.rfind(']') {
                if end > start {
                    return content[start..=end].to_string();
                }
            }
        }
        if let Some(start) = content.find('{') {
            if let Some(end) = content.rfind('}') {
                if end > start {
                    return content[start..=end].to_string();
                }
            }
        }
        content.trim().to_string()
    }

    pub fn parse<T>(content: &str) -> CoreResult<T>
    where
        T: serde::de::DeserializeOwned,
    {
        let json = Self::extract_json(content);
        serde_json::from_str(&json)
            .map_err(|err| CoreError::BadAiOutput(format!("failed to parse JSON: {err}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[test]
    fn extracts_json_from_fenced_block() {
        let content = "Here are your cards:\n```json\n[{\"question\": \"Q\"}]\n```\nEnjoy!";
        assert_eq!(
            JsonResponseParser::extract_json(content),
            "[{\"question\": \"Q\"}]"
        );
    }

    #[test]
    fn extracts_json_from_plain_fence() {
        let content = "```\n[1, 2, 3]\n```";
        assert_eq!(JsonResponseParser::extract_json(content), "[1, 2, 3]");
    }

    #[test]
    fn extracts_bare_array_with_prose_around_it() {
        let content = "Sure! [\"a\", \"b\"] hope that helps";
        let parsed: Value =
            JsonResponseParser::parse(content).unwrap();
        assert_eq!(parsed, serde_json::json!(["a", "b"]));
    }

    #[test]
    fn non_json_reply_is_bad_output() {
        let err = JsonResponseParser::parse::<Value>("I cannot do that").unwrap_err();
        assert_eq!(err.kind(), "bad_ai_output");
    }

    #[test]
    fn array_preferred_over_object() {
        let content = "{\"note\": \"x\"} then [1]";
        // Arrays win because generation payloads are arrays.
        assert_eq!(JsonResponseParser::extract_json(content), "[1]");
    }
}
