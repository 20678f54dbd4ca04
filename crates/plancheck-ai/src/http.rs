//! HTTP advisor speaking the Anthropic messages API.

use plancheck_core::AdvisorConfig;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::advisor::{
    Advice, AdviceRequest, Advisor, AdvisorError, SYSTEM_PROMPT, build_user_prompt, parse_advice,
};

const API_VERSION: &str = "2023-06-01";

/// Advisor backed by a messages-API endpoint.
pub struct HttpAdvisor {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
    max_tokens: u32,
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: Vec<Message>,
}

#[derive(Serialize)]
struct Message {
    role: &'static str,
    content: String,
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

impl HttpAdvisor {
    /// `base_url` should be like `https://api.anthropic.com` (no trailing slash needed).
    pub fn new(base_url: &str, model: &str, api_key: &str, max_tokens: u32) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key: api_key.to_string(),
            max_tokens,
        }
    }

    /// Build from configuration. `Ok(None)` when no endpoint is configured;
    /// an endpoint without an API key in the environment is an error.
    pub fn from_config(config: &AdvisorConfig) -> Result<Option<Self>, AdvisorError> {
        let Some(endpoint) = config.endpoint.as_deref() else {
            return Ok(None);
        };
        let api_key = std::env::var(&config.api_key_env).map_err(|_| {
            AdvisorError::NotConfigured(format!("environment variable {} is not set", config.api_key_env))
        })?;
        let mut advisor = Self::new(endpoint, &config.model, &api_key, config.max_tokens);
        advisor.client = reqwest::Client::builder().timeout(config.timeout()).build()?;
        Ok(Some(advisor))
    }
}

#[async_trait::async_trait]
impl Advisor for HttpAdvisor {
    async fn advise(&self, request: &AdviceRequest) -> Result<Advice, AdvisorError> {
        let url = format!("{}/v1/messages", self.base_url);
        let body = MessagesRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            system: SYSTEM_PROMPT,
            messages: vec![Message {
                role: "user",
                content: build_user_prompt(request),
            }],
        };

        info!(url = %url, field = %request.field_name, "asking advisor");
        let resp = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&body)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(AdvisorError::Server {
                status: status.as_u16(),
                body,
            });
        }

        let result: MessagesResponse = resp.json().await?;
        let text = response_text(&result)?;
        parse_advice(&text)
    }
}

fn response_text(resp: &MessagesResponse) -> Result<String, AdvisorError> {
    let text: String = resp
        .content
        .iter()
        .filter(|b| b.kind == "text")
        .map(|b| b.text.as_str())
        .collect();
    if text.trim().is_empty() {
        return Err(AdvisorError::Response("response has no text content".into()));
    }
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trims_trailing_slash() {
        let advisor = HttpAdvisor::new("https://api.example.com/", "m", "k", 100);
        assert_eq!(advisor.base_url, "https://api.example.com");
    }

    #[test]
    fn no_endpoint_means_no_advisor() {
        let config = AdvisorConfig::default();
        assert!(HttpAdvisor::from_config(&config).unwrap().is_none());
    }

    #[test]
    fn missing_api_key_is_not_configured() {
        let config = AdvisorConfig {
            endpoint: Some("http://localhost:9".into()),
            api_key_env: "PLANCHECK_TEST_KEY_THAT_IS_NEVER_SET".into(),
            ..AdvisorConfig::default()
        };
        assert!(matches!(
            HttpAdvisor::from_config(&config),
            Err(AdvisorError::NotConfigured(_))
        ));
    }

    #[test]
    fn request_wire_format() {
        let body = MessagesRequest {
            model: "claude-sonnet-4-5",
            max_tokens: 256,
            system: "sys",
            messages: vec![Message {
                role: "user",
                content: "hi".into(),
            }],
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["model"], "claude-sonnet-4-5");
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["max_tokens"], 256);
    }

    #[test]
    fn response_text_joins_text_blocks() {
        let resp: MessagesResponse = serde_json::from_str(
            r#"{"content": [{"type": "text", "text": "{\"validation_status\": "},
                            {"type": "tool_use", "id": "x"},
                            {"type": "text", "text": "\"found\", \"required\": true}"}]}"#,
        )
        .unwrap();
        let text = response_text(&resp).unwrap();
        let advice = parse_advice(&text).unwrap();
        assert!(advice.required);
    }

    #[test]
    fn empty_response_is_error() {
        let resp: MessagesResponse = serde_json::from_str(r#"{"content": []}"#).unwrap();
        assert!(matches!(response_text(&resp), Err(AdvisorError::Response(_))));
    }
}
