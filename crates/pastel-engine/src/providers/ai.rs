//! AI-backed rewrites over HTTP.
//!
//! Every request carries the wire contract `{"task", "selected_text"}` and
//! every reply must decode to `{"status", "answers", "error_message"}`. With
//! the `direct` endpoint the contract is the whole HTTP exchange; with
//! `ollama` it rides inside an `/api/chat` call as the user message and the
//! model's reply content.
use std::{env, time::Duration};

use config::{Ai, AiEndpoint};
use pastel_protocol::FailureKind;
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use time::{OffsetDateTime, formatting::Formattable, macros::format_description};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::task::TaskResult;

/// Instructions sent as the system prompt to chat endpoints.
const BASE_PROMPT: &str = include_str!("prompt.txt");

/// Connection establishment limit; the overall deadline is the task timeout.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Request half of the wire contract.
#[derive(Debug, Serialize)]
pub struct WireRequest<'a> {
    /// What the user asked for.
    pub task: &'a str,
    /// Text the task applies to.
    pub selected_text: &'a str,
}

/// Ollama `/api/chat` reply; only the message content is used.
#[derive(Debug, Deserialize)]
struct ChatResponse {
    /// Assistant message.
    message: ChatMessage,
}

/// One chat message.
#[derive(Debug, Deserialize)]
struct ChatMessage {
    /// Message text.
    content: String,
}

/// HTTP client for the configured AI endpoint.
#[derive(Clone)]
pub struct AiProvider {
    /// Shared connection pool.
    client: Client,
    /// Endpoint settings.
    settings: Ai,
}

impl AiProvider {
    /// Create a provider for `settings`.
    pub fn new(settings: Ai) -> Self {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self { client, settings }
    }

    /// Endpoint settings.
    pub fn settings(&self) -> &Ai {
        &self.settings
    }

    /// Run `task` over `selected_text`. Cancelling `cancel` drops the request.
    pub async fn execute(
        &self,
        task: &str,
        selected_text: &str,
        cancel: &CancellationToken,
    ) -> TaskResult {
        if task.trim().is_empty() {
            return TaskResult::failure(FailureKind::EmptyInput, "Type a task for the AI");
        }
        let req = WireRequest {
            task,
            selected_text,
        };
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("ai_request_cancelled");
                TaskResult::failure(FailureKind::NetworkError, "Request cancelled")
            }
            r = self.round_trip(&req) => match r {
                Ok(contract) => parse_contract(&contract),
                Err(failure) => failure,
            },
        }
    }

    /// Send `req` and return the decoded contract object.
    async fn round_trip(&self, req: &WireRequest<'_>) -> Result<Value, TaskResult> {
        match self.settings.endpoint {
            AiEndpoint::Direct => {
                let url = self.settings.base_url.clone();
                debug!(url = %url, "ai_request");
                let resp = self
                    .client
                    .post(&url)
                    .json(req)
                    .send()
                    .await
                    .map_err(|e| self.transport_failure(&e))?;
                let resp = self.check_status(resp)?;
                resp.json::<Value>()
                    .await
                    .map_err(|_| protocol("Invalid response from AI service"))
            }
            AiEndpoint::Ollama => {
                let url = format!("{}/api/chat", self.settings.base_url.trim_end_matches('/'));
                let user = serde_json::to_string(req)
                    .map_err(|_| protocol("Could not encode request"))?;
                let body = json!({
                    "model": self.settings.model,
                    "format": response_schema(),
                    "messages": [
                        {"role": "system", "content": self.system_prompt()},
                        {"role": "user", "content": user},
                    ],
                    "stream": false,
                });
                debug!(url = %url, model = %self.settings.model, "ai_request");
                let resp = self
                    .client
                    .post(&url)
                    .json(&body)
                    .send()
                    .await
                    .map_err(|e| self.transport_failure(&e))?;
                let resp = self.check_status(resp)?;
                let chat: ChatResponse = resp
                    .json()
                    .await
                    .map_err(|_| protocol("Invalid response from model"))?;
                extract_json(&chat.message.content)
                    .ok_or_else(|| protocol("No response could be generated"))
            }
        }
    }

    /// Map non-success HTTP statuses to `NetworkError`.
    fn check_status(&self, resp: Response) -> Result<Response, TaskResult> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        warn!(status = %status, url = %resp.url(), "ai_http_error");
        let message = if status == StatusCode::NOT_FOUND {
            format!(
                "Model or API endpoint not found: '{}' at '{}'",
                self.settings.model, self.settings.base_url
            )
        } else {
            format!("AI service returned HTTP {status}")
        };
        Err(TaskResult::failure(FailureKind::NetworkError, message))
    }

    /// Map a transport error to `NetworkError`.
    fn transport_failure(&self, e: &reqwest::Error) -> TaskResult {
        warn!(error = %e, "ai_transport_error");
        let message = if e.is_connect() {
            format!(
                "Cannot connect to AI service at '{}'. Please check if the service is running.",
                self.settings.base_url
            )
        } else if e.is_timeout() {
            format!("AI service at '{}' timed out", self.settings.base_url)
        } else {
            format!("Request to AI service failed: {e}")
        };
        TaskResult::failure(FailureKind::NetworkError, message)
    }

    /// Base prompt followed by `* key: value` context lines.
    pub fn system_prompt(&self) -> String {
        let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
        let mut ctx = system_context(now, user_language());
        ctx.extend(
            self.settings
                .user_context
                .iter()
                .map(|(k, v)| (k.clone(), v.clone())),
        );
        let lines: Vec<String> = ctx.iter().map(|(k, v)| format!("* {k}: {v}")).collect();
        format!("{BASE_PROMPT}{}", lines.join("\n"))
    }
}

/// Shorthand for a protocol failure.
fn protocol(message: &str) -> TaskResult {
    TaskResult::failure(FailureKind::ProtocolError, message)
}

/// JSON schema passed as Ollama's `format` to constrain the reply.
pub fn response_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "status": {"type": "string", "enum": ["success", "error"]},
            "answers": {"type": "array", "items": {"type": "string"}, "minItems": 1},
            "error_message": {"type": "string"},
        },
        "required": ["status", "answers", "error_message"],
    })
}

/// Validate a decoded reply against the wire contract.
///
/// A string `answers` counts as a single answer; scalar list items are
/// stringified.
pub fn parse_contract(v: &Value) -> TaskResult {
    let Some(obj) = v.as_object() else {
        return protocol("Reply is not a JSON object");
    };
    match obj.get("status").and_then(Value::as_str) {
        Some("success") => {
            let answers = match obj.get("answers") {
                Some(Value::String(s)) => vec![s.clone()],
                Some(Value::Array(items)) => {
                    let mut out = Vec::with_capacity(items.len());
                    for item in items {
                        match item {
                            Value::String(s) => out.push(s.clone()),
                            Value::Number(n) => out.push(n.to_string()),
                            Value::Bool(b) => out.push(b.to_string()),
                            _ => return protocol("Answers must be strings"),
                        }
                    }
                    out
                }
                _ => return protocol("No response could be generated"),
            };
            if answers.is_empty() {
                return protocol("No response could be generated");
            }
            TaskResult::Success { answers }
        }
        Some("error") => match obj.get("error_message").and_then(Value::as_str) {
            Some(msg) if !msg.trim().is_empty() => {
                TaskResult::failure(FailureKind::AiProviderError, msg)
            }
            _ => protocol("Error reply without a message"),
        },
        _ => protocol("Reply has no valid status"),
    }
}

/// Find the first JSON object embedded in `text`.
pub fn extract_json(text: &str) -> Option<Value> {
    text.match_indices('{').find_map(|(i, _)| {
        let mut stream = serde_json::Deserializer::from_str(&text[i..]).into_iter::<Value>();
        match stream.next() {
            Some(Ok(v)) if v.is_object() => Some(v),
            _ => None,
        }
    })
}

/// Date, time and locale facts appended to the system prompt.
pub fn system_context(now: OffsetDateTime, language: Option<String>) -> Vec<(String, String)> {
    let mut out = Vec::new();
    if let Some(lang) = language {
        out.push(("User language".to_string(), lang));
    }
    out.extend([
        (
            "Current date".to_string(),
            stamp(now, format_description!("[year]-[month]-[day]")),
        ),
        ("Current time".to_string(), stamp(now, format_description!("[hour]:[minute]"))),
        ("Current day name".to_string(), now.weekday().to_string()),
        ("Current day number".to_string(), now.day().to_string()),
        ("Current month name".to_string(), now.month().to_string()),
        ("Current month number".to_string(), u8::from(now.month()).to_string()),
        ("Current year".to_string(), now.year().to_string()),
        (
            "Current timezone".to_string(),
            stamp(
                now,
                format_description!("UTC[offset_hour sign:mandatory]:[offset_minute]"),
            ),
        ),
    ]);
    out
}

/// Format `now` with `fmt`, empty on failure.
fn stamp(now: OffsetDateTime, fmt: &(impl Formattable + ?Sized)) -> String {
    now.format(fmt).unwrap_or_default()
}

/// Locale from `LC_ALL`, `LC_MESSAGES` or `LANG`, without the encoding suffix.
fn user_language() -> Option<String> {
    ["LC_ALL", "LC_MESSAGES", "LANG"]
        .iter()
        .filter_map(|k| env::var(k).ok())
        .find(|v| !v.is_empty())
        .and_then(|v| {
            let lang = v.split(['.', '@']).next().unwrap_or_default().to_string();
            (!lang.is_empty() && lang != "C" && lang != "POSIX").then_some(lang)
        })
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;

    #[test]
    fn success_with_answers() {
        let r = parse_contract(&json!({"status": "success", "answers": ["a", "b"]}));
        assert_eq!(
            r,
            TaskResult::Success {
                answers: vec!["a".into(), "b".into()]
            }
        );
    }

    #[test]
    fn string_answers_are_normalised() {
        let r = parse_contract(&json!({"status": "success", "answers": "only", "error_message": ""}));
        assert_eq!(r, TaskResult::single("only"));
    }

    #[test]
    fn empty_answers_is_protocol_error() {
        let r = parse_contract(&json!({"status": "success", "answers": []}));
        assert_eq!(r.failure_kind(), Some(FailureKind::ProtocolError));
        let r = parse_contract(&json!({"status": "success"}));
        assert_eq!(r.failure_kind(), Some(FailureKind::ProtocolError));
    }

    #[test]
    fn error_status_carries_message() {
        let r = parse_contract(&json!({"status": "error", "error_message": "Task unclear"}));
        assert_eq!(
            r,
            TaskResult::failure(FailureKind::AiProviderError, "Task unclear")
        );
        let r = parse_contract(&json!({"status": "error", "error_message": ""}));
        assert_eq!(r.failure_kind(), Some(FailureKind::ProtocolError));
    }

    #[test]
    fn unknown_status_or_shape_is_protocol_error() {
        for v in [
            json!({"status": "maybe", "answers": ["x"]}),
            json!(["x"]),
            json!({"answers": ["x"]}),
            json!({"status": "success", "answers": [{"nested": 1}]}),
        ] {
            assert_eq!(
                parse_contract(&v).failure_kind(),
                Some(FailureKind::ProtocolError),
                "{v}"
            );
        }
    }

    #[test]
    fn extracts_object_from_chatter() {
        let text = "Sure! Here you go:\n```json\n{\"status\": \"success\", \"answers\": [\"{x}\"]}\n```";
        let v = extract_json(text).unwrap();
        assert_eq!(v["answers"][0], "{x}");
        assert!(extract_json("no json { here").is_none());
    }

    #[test]
    fn context_lists_date_facts() {
        let now = datetime!(2024-03-05 14:07 +01:00);
        let ctx = system_context(now, Some("en_GB".into()));
        let get = |k: &str| ctx.iter().find(|(key, _)| key == k).map(|(_, v)| v.as_str());
        assert_eq!(get("User language"), Some("en_GB"));
        assert_eq!(get("Current date"), Some("2024-03-05"));
        assert_eq!(get("Current time"), Some("14:07"));
        assert_eq!(get("Current day name"), Some("Tuesday"));
        assert_eq!(get("Current month name"), Some("March"));
        assert_eq!(get("Current month number"), Some("3"));
        assert_eq!(get("Current timezone"), Some("UTC+01:00"));
    }

    #[test]
    fn system_prompt_includes_user_context() {
        let mut settings = Ai::default();
        settings.user_context.insert("Name".into(), "Ada".into());
        let p = AiProvider::new(settings).system_prompt();
        assert!(p.starts_with(BASE_PROMPT));
        assert!(p.contains("* Name: Ada"));
        assert!(p.contains("* Current year: "));
    }
}
