//! LM client for the external text service.
//!
//! Two backends sit behind one request shape (system prompt + user prompt in,
//! response text out):
//!
//! - **Command**: a user-configured local command receives the prompt on stdin
//!   and answers on stdout (`llm`, `ollama run`, `claude -p`, a mock script).
//! - **Http**: an OpenAI-compatible `chat/completions` endpoint, asked for a
//!   JSON object response.
//!
//! The client itself performs exactly one request per call; callers that want
//! retries wrap their request-and-parse step in [`LmClient::with_retries`] so
//! malformed answers are retried the same way transport failures are.
use crate::config::LmBackendConfig;
use crate::error::ServiceError;
use anyhow::{anyhow, Context, Result};
use serde_json::{json, Value};
use std::io::Write;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

/// Result of an LM invocation with metadata for logging.
#[derive(Debug)]
pub struct LmInvocationResult<T> {
    /// The parsed result.
    pub result: T,
    /// The raw response text from the LM.
    pub raw_response: String,
    /// Number of attempts used, including the successful one.
    pub attempts: u32,
    /// How long the call took, retries included.
    pub duration: Duration,
}

enum Backend {
    Command {
        argv: Vec<String>,
    },
    Http {
        agent: ureq::Agent,
        url: String,
        model: String,
        api_key: String,
    },
}

/// Configured client; built once per run and passed to the stages that need it.
pub struct LmClient {
    backend: Backend,
    max_retries: u32,
    retry_backoff: Duration,
}

impl LmClient {
    /// Build a client, resolving the command program or the API key up front.
    pub fn new(
        config: &LmBackendConfig,
        max_retries: u32,
        retry_backoff: Duration,
    ) -> Result<Self> {
        let backend = match config {
            LmBackendConfig::Command { command } => {
                let argv = shell_words::split(command)
                    .with_context(|| format!("parse LM command: {command}"))?;
                let program = argv.first().ok_or_else(|| anyhow!("LM command is empty"))?;
                which::which(program)
                    .with_context(|| format!("LM command not found: {program}"))?;
                Backend::Command { argv }
            }
            LmBackendConfig::Http {
                endpoint,
                model,
                api_key_env,
                timeout_secs,
            } => {
                let api_key = std::env::var(api_key_env)
                    .map_err(|_| anyhow!("{api_key_env} environment variable not set"))?;
                let agent: ureq::Agent = ureq::Agent::config_builder()
                    .timeout_global(Some(Duration::from_secs(*timeout_secs)))
                    .build()
                    .into();
                Backend::Http {
                    agent,
                    url: chat_completions_url(endpoint),
                    model: model.clone(),
                    api_key,
                }
            }
        };
        Ok(Self {
            backend,
            max_retries,
            retry_backoff,
        })
    }

    /// Short description of the backend for logs.
    pub fn describe(&self) -> String {
        match &self.backend {
            Backend::Command { argv } => format!("command {}", argv.join(" ")),
            Backend::Http { url, model, .. } => format!("http {url} ({model})"),
        }
    }

    /// Send one request and return the response text.
    pub fn complete(&self, system: &str, user: &str) -> Result<String, ServiceError> {
        let start = Instant::now();
        let response = match &self.backend {
            Backend::Command { argv } => run_command(argv, &join_prompt(system, user)),
            Backend::Http {
                agent,
                url,
                model,
                api_key,
            } => post_chat(agent, url, model, api_key, system, user),
        }?;
        tracing::debug!(
            elapsed_ms = start.elapsed().as_millis() as u64,
            prompt_bytes = system.len() + user.len(),
            response_bytes = response.len(),
            "lm invoke complete"
        );
        Ok(response)
    }

    /// Run `attempt` until it succeeds or the retry budget is spent.
    ///
    /// Attempt numbers start at 0. The backoff grows linearly with the attempt
    /// number. The last error is returned when every attempt fails.
    pub fn with_retries<T>(
        &self,
        mut attempt: impl FnMut(u32) -> Result<T, ServiceError>,
    ) -> Result<(T, u32), ServiceError> {
        let mut number = 0;
        loop {
            match attempt(number) {
                Ok(value) => return Ok((value, number + 1)),
                Err(err) if number < self.max_retries => {
                    number += 1;
                    tracing::warn!(
                        attempt = number,
                        max_retries = self.max_retries,
                        error = %err,
                        "LM request failed, retrying"
                    );
                    if !self.retry_backoff.is_zero() {
                        std::thread::sleep(self.retry_backoff * number);
                    }
                }
                Err(err) => return Err(err),
            }
        }
    }
}

/// Join system and user prompt for backends without message roles.
pub fn join_prompt(system: &str, user: &str) -> String {
    format!("{system}\n\n{user}")
}

fn chat_completions_url(endpoint: &str) -> String {
    if endpoint.ends_with('/') {
        format!("{endpoint}chat/completions")
    } else {
        format!("{endpoint}/chat/completions")
    }
}

/// Invoke the LM command with the prompt on stdin.
fn run_command(argv: &[String], prompt: &str) -> Result<String, ServiceError> {
    let (program, args) = argv
        .split_first()
        .ok_or_else(|| ServiceError::Request("LM command is empty".to_string()))?;
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|err| ServiceError::Request(format!("spawn LM command {program}: {err}")))?;

    if let Some(mut stdin) = child.stdin.take() {
        // A command that exits without reading reports through its exit status.
        if let Err(err) = stdin.write_all(prompt.as_bytes()) {
            if err.kind() != std::io::ErrorKind::BrokenPipe {
                return Err(ServiceError::Request(format!(
                    "write prompt to LM stdin: {err}"
                )));
            }
        }
    }

    let output = child
        .wait_with_output()
        .map_err(|err| ServiceError::Request(format!("wait for LM command: {err}")))?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(ServiceError::Request(format!(
            "LM command failed with status {}: {}",
            output.status,
            stderr.trim()
        )));
    }
    String::from_utf8(output.stdout)
        .map_err(|err| ServiceError::Malformed(format!("LM stdout is not UTF-8: {err}")))
}

fn post_chat(
    agent: &ureq::Agent,
    url: &str,
    model: &str,
    api_key: &str,
    system: &str,
    user: &str,
) -> Result<String, ServiceError> {
    let body = json!({
        "model": model,
        "messages": [
            { "role": "system", "content": system },
            { "role": "user", "content": user }
        ],
        "response_format": { "type": "json_object" }
    });
    let mut response = agent
        .post(url)
        .header("Authorization", format!("Bearer {api_key}"))
        .send_json(&body)
        .map_err(|err| ServiceError::Request(format!("POST {url}: {err}")))?;
    let value: Value = response
        .body_mut()
        .read_json()
        .map_err(|err| ServiceError::Malformed(format!("chat response is not JSON: {err}")))?;
    value["choices"][0]["message"]["content"]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| {
            ServiceError::Malformed("chat response has no choices[0].message.content".to_string())
        })
}

/// Substitute `{key}` placeholders in one left-to-right pass.
///
/// Inserted values are never rescanned, so review text containing a
/// placeholder name is passed through literally.
pub fn fill_template(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    loop {
        let next = values
            .iter()
            .filter_map(|(key, value)| {
                let placeholder = format!("{{{key}}}");
                rest.find(&placeholder)
                    .map(|idx| (idx, placeholder.len(), *value))
            })
            .min_by_key(|(idx, _, _)| *idx);
        match next {
            Some((idx, len, value)) => {
                out.push_str(&rest[..idx]);
                out.push_str(value);
                rest = &rest[idx + len..];
            }
            None => {
                out.push_str(rest);
                return out;
            }
        }
    }
}

/// Extract JSON from text that might have markdown code fences.
///
/// Text that already parses as JSON is returned as is, so fences quoted
/// inside string values are left alone.
pub fn extract_json(text: &str) -> &str {
    let text = text.trim();
    if serde_json::from_str::<serde::de::IgnoredAny>(text).is_ok() {
        return text;
    }

    if let Some(start) = text.find("```json") {
        let start = start + 7;
        if let Some(end) = text[start..].find("```") {
            return text[start..start + end].trim();
        }
    }

    if let Some(start) = text.find("```") {
        let start = start + 3;
        // Skip language identifier if present
        let start = text[start..]
            .find('\n')
            .map(|i| start + i + 1)
            .unwrap_or(start);
        if let Some(end) = text[start..].find("```") {
            return text[start..start + end].trim();
        }
    }

    text
}

/// Shorten `text` to at most `max_bytes`, respecting char boundaries.
pub fn preview(text: &str, max_bytes: usize) -> String {
    if text.len() <= max_bytes {
        return text.to_string();
    }
    let mut end = max_bytes;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &text[..end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn command_client(command: &str, max_retries: u32) -> LmClient {
        LmClient::new(
            &LmBackendConfig::Command {
                command: command.to_string(),
            },
            max_retries,
            Duration::ZERO,
        )
        .expect("build command client")
    }

    #[test]
    fn test_extract_json_plain() {
        let text = r#"{"journeyStep": "Delivery"}"#;
        assert_eq!(extract_json(text), r#"{"journeyStep": "Delivery"}"#);
    }

    #[test]
    fn test_extract_json_with_fences() {
        let text = r#"Here is the response:
```json
{"journeyStep": "Delivery"}
```
"#;
        assert_eq!(extract_json(text), r#"{"journeyStep": "Delivery"}"#);
    }

    #[test]
    fn test_extract_json_keeps_valid_json_with_inner_fences() {
        let text = r#"{"reviewSummary": "Saw ```error``` twice.", "journeyStep": "Purchase"}"#;
        assert_eq!(extract_json(text), text);
    }

    #[test]
    fn test_extract_json_plain_fences() {
        let text = "```\n{\"journeyStep\": \"Delivery\"}\n```";
        assert_eq!(extract_json(text), r#"{"journeyStep": "Delivery"}"#);
    }

    #[test]
    fn command_backend_sends_prompt_on_stdin() {
        let client = command_client("cat", 0);
        let response = client.complete("system", "user").expect("cat echoes");
        assert_eq!(response, "system\n\nuser");
    }

    #[test]
    fn command_backend_reports_failed_exit_as_request_error() {
        let client = command_client("sh -c 'echo boom >&2; exit 3'", 0);
        match client.complete("s", "u") {
            Err(ServiceError::Request(message)) => assert!(message.contains("boom"), "{message}"),
            other => panic!("expected request error, got {other:?}"),
        }
    }

    #[test]
    fn missing_command_program_fails_at_construction() {
        let result = LmClient::new(
            &LmBackendConfig::Command {
                command: "jlens-definitely-not-installed --flag".to_string(),
            },
            0,
            Duration::ZERO,
        );
        assert!(result.is_err());
    }

    #[test]
    fn with_retries_stops_at_first_success() {
        let client = command_client("cat", 2);
        let calls = Cell::new(0);
        let (value, attempts) = client
            .with_retries(|attempt| {
                calls.set(calls.get() + 1);
                if attempt < 1 {
                    Err(ServiceError::Malformed("not yet".to_string()))
                } else {
                    Ok(attempt)
                }
            })
            .expect("second attempt succeeds");
        assert_eq!((value, attempts, calls.get()), (1, 2, 2));
    }

    #[test]
    fn with_retries_returns_last_error_when_budget_is_spent() {
        let client = command_client("cat", 1);
        let calls = Cell::new(0);
        let err = client
            .with_retries::<()>(|attempt| {
                calls.set(calls.get() + 1);
                Err(ServiceError::Request(format!("attempt {attempt}")))
            })
            .expect_err("always fails");
        assert_eq!(err, ServiceError::Request("attempt 1".to_string()));
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn fill_template_does_not_rescan_inserted_values() {
        let filled = fill_template(
            "Steps: {steps}\nReview: {review}",
            &[("steps", "[\"A\"]"), ("review", "mentions {steps} literally")],
        );
        assert_eq!(filled, "Steps: [\"A\"]\nReview: mentions {steps} literally");
    }

    #[test]
    fn preview_respects_char_boundaries() {
        assert_eq!(preview("héllo", 2), "h...");
        assert_eq!(preview("short", 10), "short");
    }
}
