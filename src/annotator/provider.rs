use crate::annotator::rotor::{ChatBackend, ChatMessage, Credential};
use crate::annotator::util::truncate_with_ellipsis;
use crate::error::ProviderError;
use anyhow::Result;
use reqwest::blocking::Client;
use reqwest::header::RETRY_AFTER;
use serde_json::Value;
use std::time::Duration;

const ERROR_BODY_MAX_CHARS: usize = 400;

/// Base URL for providers that do not need one spelled out.
pub fn known_base_url(provider: &str) -> Option<&'static str> {
    match provider.trim().to_ascii_lowercase().as_str() {
        "groq" => Some("https://api.groq.com/openai/v1"),
        "openrouter" => Some("https://openrouter.ai/api/v1"),
        "fireworks" => Some("https://api.fireworks.ai/inference/v1"),
        "together" => Some("https://api.together.xyz/v1"),
        "openai" => Some("https://api.openai.com/v1"),
        _ => None,
    }
}

pub fn extract_openai_compatible_text(json: &Value) -> Option<String> {
    let choices = json.get("choices").and_then(Value::as_array)?;
    let first = choices.first()?;
    let content = first.get("message")?.get("content")?;
    match content {
        Value::String(s) if !s.trim().is_empty() => Some(s.to_string()),
        Value::Array(parts) => {
            let chunks = parts
                .iter()
                .filter_map(|part| part.get("text").and_then(Value::as_str))
                .collect::<Vec<_>>();
            if chunks.iter().all(|chunk| chunk.trim().is_empty()) {
                None
            } else {
                Some(chunks.join("\n"))
            }
        }
        _ => None,
    }
}

fn parse_retry_after(raw: &str) -> Option<Duration> {
    let secs = raw.trim().parse::<f64>().ok()?;
    if secs.is_finite() && secs >= 0.0 {
        Duration::try_from_secs_f64(secs).ok()
    } else {
        None
    }
}

/// `POST {base_url}/chat/completions` against any OpenAI-compatible endpoint.
pub struct OpenAiCompatBackend {
    client: Client,
}

impl OpenAiCompatBackend {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

impl ChatBackend for OpenAiCompatBackend {
    fn complete(
        &self,
        credential: &Credential,
        messages: &[ChatMessage],
        temperature: f64,
    ) -> Result<String, ProviderError> {
        let base = credential.base_url.trim_end_matches('/');
        let url = format!("{base}/chat/completions");
        let payload = serde_json::json!({
            "model": credential.model,
            "messages": messages,
            "temperature": temperature
        });

        let response = self
            .client
            .post(&url)
            .bearer_auth(&credential.key)
            .json(&payload)
            .send()
            .map_err(|err| {
                ProviderError::new(format!("{} request failed: {err}", credential.provider))
            })?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|value| value.to_str().ok())
                .and_then(parse_retry_after);
            let body = response.text().unwrap_or_default();
            return Err(ProviderError::new(format!(
                "{} call failed with status {status}: {}",
                credential.provider,
                truncate_with_ellipsis(&body, ERROR_BODY_MAX_CHARS)
            ))
            .with_retry_after(retry_after));
        }

        let json: Value = response.json().map_err(|err| {
            ProviderError::new(format!("{} returned invalid JSON: {err}", credential.provider))
        })?;
        extract_openai_compatible_text(&json).ok_or_else(|| {
            ProviderError::new(format!(
                "{} response missing choices[0].message.content",
                credential.provider
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{
        OpenAiCompatBackend, extract_openai_compatible_text, known_base_url, parse_retry_after,
    };
    use crate::annotator::rotor::{ChatBackend, ChatMessage, Credential};
    use serde_json::json;
    use std::time::Duration;

    #[test]
    fn extract_openai_compatible_text_reads_chat_completions_shape() {
        let payload = json!({
            "choices": [
                {
                    "message": {
                        "content": "Ahoj <pn>Jan</pn>"
                    }
                }
            ]
        });
        assert_eq!(
            extract_openai_compatible_text(&payload).as_deref(),
            Some("Ahoj <pn>Jan</pn>")
        );
    }

    #[test]
    fn extract_openai_compatible_text_joins_content_parts() {
        let payload = json!({
            "choices": [{"message": {"content": [
                {"type": "text", "text": "a"},
                {"type": "text", "text": "b"}
            ]}}]
        });
        assert_eq!(extract_openai_compatible_text(&payload).as_deref(), Some("a\nb"));
        assert_eq!(extract_openai_compatible_text(&json!({"choices": []})), None);
    }

    #[test]
    fn blank_content_is_not_a_reply() {
        let blank = json!({"choices": [{"message": {"content": " \n "}}]});
        assert_eq!(extract_openai_compatible_text(&blank), None);
        let blank_parts = json!({
            "choices": [{"message": {"content": [{"type": "text", "text": ""}]}}]
        });
        assert_eq!(extract_openai_compatible_text(&blank_parts), None);
    }

    #[test]
    fn known_providers_resolve_case_insensitively() {
        assert_eq!(known_base_url("Groq"), Some("https://api.groq.com/openai/v1"));
        assert_eq!(known_base_url("custom"), None);
    }

    #[test]
    fn retry_after_accepts_seconds_only() {
        assert_eq!(parse_retry_after(" 12 "), Some(Duration::from_secs(12)));
        assert_eq!(parse_retry_after("Wed, 21 Oct 2015 07:28:00 GMT"), None);
        assert_eq!(parse_retry_after("-3"), None);
    }

    #[test]
    fn unreachable_endpoint_is_a_provider_error() {
        let backend = OpenAiCompatBackend::new(Duration::from_secs(2)).expect("client");
        let credential = Credential {
            provider: "custom".to_string(),
            model: "m".to_string(),
            base_url: "http://127.0.0.1:9/v1/".to_string(),
            key: "k".to_string(),
        };
        let err = backend
            .complete(&credential, &[ChatMessage::user("x")], 0.4)
            .expect_err("nothing listens on port 9");
        assert!(err.message.starts_with("custom request failed"));
        assert!(err.retry_after.is_none());
    }
}
