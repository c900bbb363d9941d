use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::{config::Config, error::ApiError, models::suggestion::MenuSuggestion};

const DEEPSEEK_API_URL: &str = "https://api.deepseek.com/v1/chat/completions";
const DEEPSEEK_MODEL: &str = "deepseek-chat";
const CLAUDE_API_URL: &str = "https://api.anthropic.com/v1/messages";
const CLAUDE_MODEL: &str = "claude-3-opus-20240229";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Supported external generation providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AiProvider {
    DeepSeek,
    Claude,
}

impl AiProvider {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "deepseek" => Some(Self::DeepSeek),
            "claude" => Some(Self::Claude),
            _ => None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct DeepSeekRequest {
    model: &'static str,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct DeepSeekResponse {
    choices: Vec<DeepSeekChoice>,
}

#[derive(Debug, Deserialize)]
struct DeepSeekChoice {
    message: ChatMessage,
}

#[derive(Debug, Serialize)]
struct ClaudeRequest {
    model: &'static str,
    max_tokens: u32,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Deserialize)]
struct ClaudeResponse {
    content: Vec<ClaudeContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ClaudeContentBlock {
    #[serde(default)]
    text: String,
}

/// Client for the configured generation provider plus the response
/// normalizer that turns free-form model text into dish JSON.
pub struct AiService {
    client: Client,
    service_name: String,
    api_key: Option<String>,
}

impl AiService {
    const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(Self::REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            service_name: config.ai_service.clone(),
            api_key: config.ai_api_key.clone(),
        })
    }

    /// Ask the configured provider for menu suggestions and normalize the
    /// answer. Upstream failures surface as errors; an answer we cannot
    /// parse is still a success, degraded to the raw-response shape.
    pub async fn generate(
        &self,
        prompt: &str,
        menu_type: Option<&str>,
    ) -> Result<MenuSuggestion, ApiError> {
        let provider = AiProvider::parse(&self.service_name)
            .ok_or_else(|| ApiError::Validation("Unsupported AI service".into()))?;
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| ApiError::Upstream("AI API key not configured".into()))?;

        let full_prompt = build_prompt(prompt, menu_type);
        let raw = match provider {
            AiProvider::DeepSeek => self.call_deepseek(&full_prompt, api_key).await?,
            AiProvider::Claude => self.call_claude(&full_prompt, api_key).await?,
        };
        Ok(normalize(&raw))
    }

    async fn call_deepseek(&self, prompt: &str, api_key: &str) -> Result<String, ApiError> {
        let request = DeepSeekRequest {
            model: DEEPSEEK_MODEL,
            messages: vec![ChatMessage {
                role: "user".into(),
                content: prompt.into(),
            }],
            temperature: 0.7,
        };

        let response = self
            .client
            .post(DEEPSEEK_API_URL)
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| upstream_error("DeepSeek", &e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::warn!("DeepSeek API error {status}: {body}");
            return Err(upstream_error("DeepSeek", &format!("HTTP {status}")));
        }

        let parsed: DeepSeekResponse = response
            .json()
            .await
            .map_err(|e| upstream_error("DeepSeek", &e.to_string()))?;
        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| upstream_error("DeepSeek", "empty response"))
    }

    async fn call_claude(&self, prompt: &str, api_key: &str) -> Result<String, ApiError> {
        let request = ClaudeRequest {
            model: CLAUDE_MODEL,
            max_tokens: 2000,
            messages: vec![ChatMessage {
                role: "user".into(),
                content: prompt.into(),
            }],
        };

        let response = self
            .client
            .post(CLAUDE_API_URL)
            .header("x-api-key", api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&request)
            .send()
            .await
            .map_err(|e| upstream_error("Claude", &e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::warn!("Claude API error {status}: {body}");
            return Err(upstream_error("Claude", &format!("HTTP {status}")));
        }

        let parsed: ClaudeResponse = response
            .json()
            .await
            .map_err(|e| upstream_error("Claude", &e.to_string()))?;
        parsed
            .content
            .into_iter()
            .map(|block| block.text)
            .find(|text| !text.is_empty())
            .ok_or_else(|| upstream_error("Claude", "empty response"))
    }
}

fn upstream_error(provider: &str, detail: &str) -> ApiError {
    ApiError::Upstream(format!("Failed to generate menu with {provider}: {detail}"))
}

/// Wrap the user's free-text request in the dish-JSON instruction template.
fn build_prompt(prompt: &str, menu_type: Option<&str>) -> String {
    format!(
        "Generate a detailed {} menu with the following requirements: {}.\n\
         For each dish, provide:\n\
         1. A descriptive name\n\
         2. A detailed description of ingredients and preparation\n\
         3. Number of people it serves\n\n\
         Format the response as JSON in the following structure:\n\
         {{\n\
           \"dishes\": [\n\
             {{\n\
               \"name\": \"Dish Name\",\n\
               \"description\": \"Detailed description with ingredients and preparation\",\n\
               \"numberOfPeople\": 4\n\
             }}\n\
           ]\n\
         }}",
        menu_type.unwrap_or(""),
        prompt
    )
}

static JSON_FENCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```json\n(.*?)\n```").unwrap());
static ANY_FENCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```\n(.*?)\n```").unwrap());
static BRACE_SPAN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)\{.*?\}").unwrap());
static FENCE_MARKER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"```json\n|```\n|```").unwrap());

/// Extract structured JSON from free-form model output, or degrade to the
/// raw text. Extraction attempts in order: a ```json fence, any fence, then
/// the first non-greedy `{...}` span. That last step is a heuristic, not a
/// balanced-brace parser; when it clips a nested object short, the parse
/// fails and the raw fallback is returned instead of wrong data. This
/// function never errors: unparseable input is a valid raw result.
pub fn normalize(raw: &str) -> MenuSuggestion {
    let candidate = JSON_FENCE_RE
        .captures(raw)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .or_else(|| {
            ANY_FENCE_RE
                .captures(raw)
                .and_then(|c| c.get(1))
                .map(|m| m.as_str().to_string())
        })
        .or_else(|| BRACE_SPAN_RE.find(raw).map(|m| m.as_str().to_string()));

    let candidate = match candidate {
        Some(c) => c,
        None => return MenuSuggestion::raw(raw),
    };

    let cleaned = FENCE_MARKER_RE.replace_all(&candidate, "");
    match serde_json::from_str(cleaned.trim()) {
        Ok(value) => MenuSuggestion::Structured(value),
        Err(_) => MenuSuggestion::raw(raw),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extracts_tagged_json_fence() {
        let input = "Sure, here you go:\n```json\n{\"dishes\":[{\"name\":\"Soup\",\"description\":\"Hot soup\",\"numberOfPeople\":4}]}\n```\nEnjoy!";
        let suggestion = normalize(input);
        let dishes = suggestion.dishes().expect("structured result");
        assert_eq!(dishes.len(), 1);
        assert_eq!(dishes[0].name, "Soup");
        assert_eq!(dishes[0].number_of_people, Some(4));
    }

    #[test]
    fn extracts_untagged_fence() {
        let input = "```\n{\"dishes\":[]}\n```";
        assert_eq!(
            normalize(input),
            MenuSuggestion::Structured(json!({ "dishes": [] }))
        );
    }

    #[test]
    fn extracts_bare_brace_span() {
        let input = "Here is the plan {\"dishes\": []} as requested.";
        assert_eq!(
            normalize(input),
            MenuSuggestion::Structured(json!({ "dishes": [] }))
        );
    }

    #[test]
    fn unstructured_text_falls_back_to_raw() {
        let input = "Here is your menu: no structure at all";
        assert_eq!(normalize(input), MenuSuggestion::raw(input));
    }

    #[test]
    fn truncated_first_span_degrades_to_raw() {
        // The non-greedy heuristic grabs the first closing brace, clipping
        // the nested object; the parse failure must fall back to raw text
        // rather than return the later valid span.
        let input = "{\"dishes\": [{\"name\": \"A\"} and also {\"ok\": true}";
        assert_eq!(normalize(input), MenuSuggestion::raw(input));
    }

    #[test]
    fn fence_without_newlines_still_resolves_via_brace_span() {
        let input = "```json {\"dishes\": []} ```";
        assert_eq!(
            normalize(input),
            MenuSuggestion::Structured(json!({ "dishes": [] }))
        );
    }

    #[test]
    fn structured_result_serializes_as_plain_json() {
        let suggestion = normalize("{\"dishes\": []}");
        assert_eq!(
            serde_json::to_value(&suggestion).unwrap(),
            json!({ "dishes": [] })
        );
    }

    #[test]
    fn raw_result_serializes_with_raw_response_key() {
        let suggestion = MenuSuggestion::raw("plain text");
        assert_eq!(
            serde_json::to_value(&suggestion).unwrap(),
            json!({ "rawResponse": "plain text" })
        );
    }

    #[test]
    fn provider_parse_is_case_insensitive() {
        assert_eq!(AiProvider::parse("DeepSeek"), Some(AiProvider::DeepSeek));
        assert_eq!(AiProvider::parse("CLAUDE"), Some(AiProvider::Claude));
        assert_eq!(AiProvider::parse("gemini"), None);
    }

    #[test]
    fn prompt_includes_menu_type_and_request() {
        let prompt = build_prompt("vegetarian week", Some("kids"));
        assert!(prompt.contains("kids menu"));
        assert!(prompt.contains("vegetarian week"));
        assert!(prompt.contains("\"dishes\""));
    }
}
