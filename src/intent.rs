//! Command intents and the text-to-intent parser
//!
//! Parsing distinguishes "nothing usable" (`None`) from a recognised reply
//! naming an action we have no handler for ([`CommandIntent::Unknown`]).

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::{ApiKeys, IntentConfig};
use crate::{Error, Result};

/// Structured action extracted from a transcript
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum CommandIntent {
    /// Play a named playlist
    PlayPlaylist {
        /// Playlist name as spoken
        name: String,
    },
    /// Search for something
    Search {
        /// Search query
        query: String,
    },
    /// Current weather for a city
    Weather {
        /// City name
        city: String,
    },
    /// An action the parser named but no handler exists for
    Unknown {
        /// Action name as returned by the parser
        #[serde(rename = "requested")]
        action: String,
    },
}

impl CommandIntent {
    /// Map a parser reply to an intent
    ///
    /// Expected shape: `{"action": "play_playlist"|"search"|"weather"|..., "name"|"query": string}`.
    /// Anything without a non-empty string `action` (including `{}`) is absent.
    /// Missing parameters map to empty strings; the dispatcher asks for them.
    #[must_use]
    pub fn from_json(value: &Value) -> Option<Self> {
        let object = value.as_object()?;
        let action = object.get("action")?.as_str()?.trim();
        if action.is_empty() {
            return None;
        }

        let field = |keys: &[&str]| {
            keys.iter()
                .find_map(|k| object.get(*k).and_then(Value::as_str))
                .map(|s| s.trim().to_string())
                .unwrap_or_default()
        };

        let intent = match action {
            "play_playlist" => Self::PlayPlaylist {
                name: field(&["name"]),
            },
            "search" => Self::Search {
                query: field(&["query", "name"]),
            },
            "weather" => Self::Weather {
                city: field(&["name", "city"]),
            },
            other => Self::Unknown {
                action: other.to_string(),
            },
        };

        Some(intent)
    }

    /// Short label for logs
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::PlayPlaylist { .. } => "play_playlist",
            Self::Search { .. } => "search",
            Self::Weather { .. } => "weather",
            Self::Unknown { .. } => "unknown",
        }
    }
}

/// Converts free text into a command intent
#[async_trait]
pub trait IntentParser: Send + Sync {
    /// Parse a transcript
    ///
    /// `Ok(None)` means the text was not understood or was ambiguous.
    ///
    /// # Errors
    ///
    /// Returns error if the backend fails
    async fn parse(&self, text: &str) -> Result<Option<CommandIntent>>;
}

const SYSTEM_PROMPT: &str = r#"You turn spoken commands into JSON objects describing the user's intent.

Available actions and their parameters:
- "play_playlist": {"action": "play_playlist", "name": "playlist name"} (e.g. "play lazy lamhe playlist")
- "search": {"action": "search", "query": "search query"} (e.g. "search for cat videos")
- "weather": {"action": "weather", "name": "city name"} (e.g. "what's the weather in New York")

If there is no clear action or a required parameter is missing, return an empty JSON object: {}.
Reply with the JSON object only."#;

/// Intent parser backed by the `OpenAI` chat completions API in JSON mode
pub struct ChatIntentParser {
    client: Client,
    api_key: String,
    model: String,
}

impl ChatIntentParser {
    /// Create a new chat intent parser
    ///
    /// # Errors
    ///
    /// Returns error if API key is missing
    pub fn new(api_key: String, model: String) -> Result<Self> {
        if api_key.is_empty() {
            return Err(Error::Config(
                "OpenAI API key required for intent parsing".to_string(),
            ));
        }

        Ok(Self {
            client: Client::new(),
            api_key,
            model,
        })
    }

    /// Create a parser from configuration
    ///
    /// # Errors
    ///
    /// Returns error if API key is missing
    pub fn from_config(config: &IntentConfig, keys: &ApiKeys) -> Result<Self> {
        Self::new(keys.openai.clone().unwrap_or_default(), config.model.clone())
    }
}

#[async_trait]
impl IntentParser for ChatIntentParser {
    async fn parse(&self, text: &str) -> Result<Option<CommandIntent>> {
        tracing::debug!(text, "parsing command");

        let request = ChatCompletionRequest {
            model: &self.model,
            messages: vec![
                Message {
                    role: "system",
                    content: SYSTEM_PROMPT.to_string(),
                },
                Message {
                    role: "user",
                    content: format!("My command: {text}"),
                },
            ],
            response_format: ResponseFormat {
                kind: "json_object",
            },
        };

        let response = self
            .client
            .post("https://api.openai.com/v1/chat/completions")
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Intent(format!("OpenAI request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Intent(format!("OpenAI API error: {status} - {body}")));
        }

        let result: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| Error::Intent(format!("failed to parse OpenAI response: {e}")))?;

        let Some(content) = result.choices.into_iter().next().and_then(|c| c.message.content) else {
            tracing::warn!("intent reply had no content");
            return Ok(None);
        };

        tracing::debug!(reply = %content, "intent reply");
        Ok(parse_reply(&content))
    }
}

/// Map raw reply text to an intent; invalid JSON is absent
fn parse_reply(content: &str) -> Option<CommandIntent> {
    match serde_json::from_str::<Value>(content) {
        Ok(value) => CommandIntent::from_json(&value),
        Err(e) => {
            tracing::warn!(error = %e, reply = %content, "intent reply is not JSON");
            None
        }
    }
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<Message>,
    response_format: ResponseFormat,
}

#[derive(Serialize)]
struct Message {
    role: &'static str,
    content: String,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_known_actions() {
        assert_eq!(
            CommandIntent::from_json(&json!({"action": "play_playlist", "name": "Lazy Lamhe"})),
            Some(CommandIntent::PlayPlaylist {
                name: "Lazy Lamhe".to_string()
            })
        );
        assert_eq!(
            CommandIntent::from_json(&json!({"action": "search", "query": "cat videos"})),
            Some(CommandIntent::Search {
                query: "cat videos".to_string()
            })
        );
        assert_eq!(
            CommandIntent::from_json(&json!({"action": "weather", "name": "New York"})),
            Some(CommandIntent::Weather {
                city: "New York".to_string()
            })
        );
    }

    #[test]
    fn test_empty_object_is_absent() {
        assert_eq!(CommandIntent::from_json(&json!({})), None);
        assert_eq!(CommandIntent::from_json(&json!({"action": ""})), None);
        assert_eq!(CommandIntent::from_json(&json!([1, 2])), None);
        assert_eq!(CommandIntent::from_json(&json!({"action": 3})), None);
    }

    #[test]
    fn test_unknown_action_is_present() {
        assert_eq!(
            CommandIntent::from_json(&json!({"action": "set_alarm", "name": "7am"})),
            Some(CommandIntent::Unknown {
                action: "set_alarm".to_string()
            })
        );
    }

    #[test]
    fn test_unknown_action_serializes_requested_name() {
        let intent = CommandIntent::Unknown {
            action: "set_alarm".to_string(),
        };
        let value = serde_json::to_value(&intent).unwrap();
        assert_eq!(value, json!({"action": "unknown", "requested": "set_alarm"}));
        assert!(value.get("name").is_none());
    }

    #[test]
    fn test_missing_parameter_is_empty() {
        assert_eq!(
            CommandIntent::from_json(&json!({"action": "weather"})),
            Some(CommandIntent::Weather {
                city: String::new()
            })
        );
    }

    #[test]
    fn test_reply_that_is_not_json() {
        assert_eq!(parse_reply("sure! playing music"), None);
        assert_eq!(
            parse_reply(r#"{"action":"search","query":"rust"}"#),
            Some(CommandIntent::Search {
                query: "rust".to_string()
            })
        );
    }

    #[test]
    fn test_request_shape() {
        let request = ChatCompletionRequest {
            model: "gpt-4o",
            messages: vec![],
            response_format: ResponseFormat {
                kind: "json_object",
            },
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["response_format"]["type"], "json_object");
    }

    #[test]
    fn test_missing_key_rejected() {
        assert!(ChatIntentParser::new(String::new(), "gpt-4o".to_string()).is_err());
    }
}
