use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, error, info, instrument, warn};

use crate::constants; // For GROQ_API_URL and GROQ_MODEL
use crate::error::{Result, RoadmapError};
use crate::extract::extract_roadmap_json;
use crate::request::{build_roadmap_request, ChatCompletionRequest};
use crate::roadmap::ParsedRoadmap;

// Only the parts of the OpenAI-compatible response we read.
#[derive(Deserialize, Debug)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize, Debug)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize, Debug)]
struct ChoiceMessage {
    content: String,
}

/// Blocking-per-request client for a chat-completion endpoint. No timeout, no retry.
#[derive(Debug, Clone)]
pub struct ChatClient {
    http: Client,
    endpoint: String,
    model: String,
}

impl ChatClient {
    pub fn new(endpoint: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            endpoint: endpoint.into(),
            model: model.into(),
        }
    }

    /// Client for the configured hosted endpoint and model.
    pub fn from_env() -> Self {
        Self::new(constants::GROQ_API_URL.clone(), constants::GROQ_MODEL.clone())
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Sends one request and returns `choices[0].message.content`.
    #[instrument(skip(self, api_key, request), fields(endpoint = %self.endpoint, model = %request.model))]
    pub async fn complete(&self, api_key: &str, request: &ChatCompletionRequest) -> Result<String> {
        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error body".to_string());
            error!(%status, %body, "Chat completion request failed");
            return Err(RoadmapError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let completion = response.json::<ChatCompletionResponse>().await?;
        let content = completion
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| RoadmapError::Transport("response contained no choices".to_string()))?;

        debug!(reply = %content, "Received chat completion");
        Ok(content)
    }
}

/// Picks the session key, falling back to the environment key. Blank keys count as absent.
pub fn resolve_api_key<'a>(session_key: Option<&'a str>, env_key: Option<&'a str>) -> Result<&'a str> {
    session_key
        .filter(|key| !key.trim().is_empty())
        .or_else(|| env_key.filter(|key| !key.trim().is_empty()))
        .ok_or(RoadmapError::MissingCredential)
}

/// Idea in, validated roadmap out.
#[derive(Debug, Clone)]
pub struct RoadmapService {
    client: ChatClient,
    env_api_key: Option<String>,
}

impl RoadmapService {
    pub fn new(client: ChatClient, env_api_key: Option<String>) -> Self {
        Self { client, env_api_key }
    }

    pub fn has_env_api_key(&self) -> bool {
        self.env_api_key.is_some()
    }

    /// Runs the whole generation. Fails before any network call on a missing key or a blank idea.
    pub async fn generate(
        &self,
        session_api_key: Option<&str>,
        idea: &str,
        tools: Option<&str>,
    ) -> Result<ParsedRoadmap> {
        let api_key = resolve_api_key(session_api_key, self.env_api_key.as_deref())?;
        let request = build_roadmap_request(self.client.model(), idea, tools)?;
        debug!(prompt = %request.messages[0].content, "Constructed roadmap prompt");

        let reply = self.client.complete(api_key, &request).await?;
        let parsed = ParsedRoadmap::from_value(extract_roadmap_json(&reply)?)?;

        let collisions = parsed.roadmap.collisions();
        if !collisions.is_empty() {
            warn!(
                ?collisions,
                "Roadmap repeats module/submodule names; duplicate task ids were given #N suffixes"
            );
        }
        info!(
            modules = parsed.roadmap.modules.len(),
            tasks = parsed.roadmap.task_count(),
            "Roadmap generated"
        );
        Ok(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_key_wins_over_env() {
        assert_eq!(resolve_api_key(Some("session"), Some("env")).unwrap(), "session");
    }

    #[test]
    fn env_key_is_fallback() {
        assert_eq!(resolve_api_key(None, Some("env")).unwrap(), "env");
        assert_eq!(resolve_api_key(Some("  "), Some("env")).unwrap(), "env");
    }

    #[test]
    fn no_key_is_missing_credential() {
        assert!(matches!(resolve_api_key(None, None), Err(RoadmapError::MissingCredential)));
        assert!(matches!(resolve_api_key(Some(""), Some(" ")), Err(RoadmapError::MissingCredential)));
    }

    #[test]
    fn completion_response_reads_first_choice() {
        let body = r#"{"id":"x","choices":[{"index":0,"message":{"role":"assistant","content":"hi"}}]}"#;
        let parsed: ChatCompletionResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.choices[0].message.content, "hi");
    }
}
