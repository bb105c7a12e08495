//! Language model client abstraction.
//!
//! The [`LlmClient`] trait decouples the loop from the model backend. A call is
//! one prompt in, one text response out, with no state kept between calls.
//! Tests use scripted clients that return canned responses without spawning
//! processes or touching the network.

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::io::config::{LlmBackend, LlmConfig};
use crate::io::process::run_with_stdin;

/// Placeholder in `llm.command` replaced by a temp file path the command writes its answer to.
pub const RESPONSE_FILE_PLACEHOLDER: &str = "{response_file}";

/// Text-in/text-out model call. Synchronous; failures are not retried.
pub trait LlmClient {
    fn complete(&self, prompt: &str) -> Result<String>;
}

impl<T: LlmClient + ?Sized> LlmClient for Box<T> {
    fn complete(&self, prompt: &str) -> Result<String> {
        (**self).complete(prompt)
    }
}

impl<T: LlmClient + ?Sized> LlmClient for &T {
    fn complete(&self, prompt: &str) -> Result<String> {
        (**self).complete(prompt)
    }
}

/// Build the client selected by `config.backend`.
///
/// `workdir` is where the command backend runs.
pub fn build_client(config: &LlmConfig, workdir: PathBuf) -> Result<Box<dyn LlmClient>> {
    let timeout = Duration::from_secs(config.timeout_secs);
    let client: Box<dyn LlmClient> = match config.backend {
        LlmBackend::Command => Box::new(CommandClient {
            command: config.command.clone(),
            workdir,
            timeout,
            output_limit_bytes: config.output_limit_bytes,
        }),
        LlmBackend::Responses => Box::new(ResponsesClient::new(config, timeout)?),
    };
    Ok(client)
}

/// Client that spawns an agent CLI (e.g. `codex exec`) per call.
///
/// The prompt goes to stdin. The response is stdout, unless an argument contains
/// `{response_file}`, in which case the command must write its final answer to
/// that file and stdout is ignored.
#[derive(Debug, Clone)]
pub struct CommandClient {
    pub command: Vec<String>,
    pub workdir: PathBuf,
    pub timeout: Duration,
    pub output_limit_bytes: usize,
}

impl LlmClient for CommandClient {
    #[instrument(skip_all, fields(prompt_bytes = prompt.len(), timeout_secs = self.timeout.as_secs()))]
    fn complete(&self, prompt: &str) -> Result<String> {
        let uses_file = self
            .command
            .iter()
            .any(|arg| arg.contains(RESPONSE_FILE_PLACEHOLDER));
        // Kept alive until the response has been read back.
        let response_file = if uses_file {
            Some(tempfile::NamedTempFile::new().context("create response file")?)
        } else {
            None
        };
        let argv: Vec<String> = match &response_file {
            Some(file) => {
                let path = file.path().display().to_string();
                self.command
                    .iter()
                    .map(|arg| arg.replace(RESPONSE_FILE_PLACEHOLDER, &path))
                    .collect()
            }
            None => self.command.clone(),
        };

        let output = run_with_stdin(
            &argv,
            &self.workdir,
            prompt.as_bytes(),
            self.timeout,
            self.output_limit_bytes,
        )?;

        if output.timed_out {
            return Err(anyhow!("model command timed out after {:?}", self.timeout));
        }
        if !output.status.success() {
            return Err(anyhow!(
                "model command failed with status {:?}: {}",
                output.status.code(),
                output.stderr_tail(20)
            ));
        }

        let response = match &response_file {
            Some(file) => {
                let bytes = fs::read(file.path())
                    .with_context(|| format!("read response file {}", file.path().display()))?;
                if bytes.len() > self.output_limit_bytes {
                    return Err(anyhow!(
                        "model response exceeded {} bytes",
                        self.output_limit_bytes
                    ));
                }
                bytes
            }
            None => {
                if output.stdout_truncated > 0 {
                    return Err(anyhow!(
                        "model response exceeded {} bytes ({} truncated)",
                        self.output_limit_bytes,
                        output.stdout_truncated
                    ));
                }
                output.stdout
            }
        };

        let text = String::from_utf8(response).context("model response is not valid UTF-8")?;
        debug!(response_bytes = text.len(), "model command completed");
        Ok(text)
    }
}

/// Client for OpenAI-compatible `POST /responses` endpoints.
pub struct ResponsesClient {
    http: reqwest::blocking::Client,
    endpoint: String,
    model: String,
    max_output_tokens: u32,
    api_key: Option<String>,
}

#[derive(Debug, Serialize)]
struct ResponsesRequest<'a> {
    model: &'a str,
    input: Vec<InputMessage<'a>>,
    max_output_tokens: u32,
}

#[derive(Debug, Serialize)]
struct InputMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ResponsesBody {
    #[serde(default)]
    output_text: Option<String>,
    #[serde(default)]
    output: Vec<OutputItem>,
}

#[derive(Debug, Deserialize)]
struct OutputItem {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    content: Vec<OutputContent>,
}

#[derive(Debug, Deserialize)]
struct OutputContent {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

impl ResponsesBody {
    /// Concatenate every `output_text` part of every message, like the SDKs' `output_text`.
    fn into_text(self) -> Option<String> {
        if let Some(text) = self.output_text {
            return Some(text);
        }
        let parts: Vec<String> = self
            .output
            .into_iter()
            .filter(|item| item.kind == "message")
            .flat_map(|item| item.content)
            .filter(|part| part.kind == "output_text")
            .filter_map(|part| part.text)
            .collect();
        if parts.is_empty() {
            return None;
        }
        Some(parts.concat())
    }
}

impl ResponsesClient {
    pub fn new(config: &LlmConfig, timeout: Duration) -> Result<Self> {
        let http = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .context("build http client")?;
        let api_key = std::env::var(&config.api_key_env).ok();
        if api_key.is_none() {
            warn!(var = %config.api_key_env, "api key environment variable is not set");
        }
        Ok(Self {
            http,
            endpoint: format!("{}/responses", config.base_url.trim_end_matches('/')),
            model: config.model.clone(),
            max_output_tokens: config.max_output_tokens,
            api_key,
        })
    }
}

impl LlmClient for ResponsesClient {
    #[instrument(skip_all, fields(model = %self.model, prompt_bytes = prompt.len()))]
    fn complete(&self, prompt: &str) -> Result<String> {
        let body = ResponsesRequest {
            model: &self.model,
            input: vec![InputMessage {
                role: "user",
                content: prompt,
            }],
            max_output_tokens: self.max_output_tokens,
        };

        let mut request = self.http.post(&self.endpoint).json(&body);
        if let Some(key) = self.api_key.as_deref().filter(|key| !key.is_empty()) {
            request = request.bearer_auth(key);
        }
        let response = request
            .send()
            .with_context(|| format!("POST {}", self.endpoint))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().unwrap_or_default();
            return Err(anyhow!("model API returned {status}: {text}"));
        }

        let parsed: ResponsesBody = response.json().context("decode model API response")?;
        let text = parsed
            .into_text()
            .ok_or_else(|| anyhow!("model API response contained no output text"))?;
        debug!(response_bytes = text.len(), "model API call completed");
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn responses_body_prefers_output_text() {
        let body: ResponsesBody =
            serde_json::from_str(r#"{"output_text":"direct","output":[]}"#).expect("parse");
        assert_eq!(body.into_text().as_deref(), Some("direct"));
    }

    #[test]
    fn responses_body_joins_message_parts() {
        let body: ResponsesBody = serde_json::from_str(
            r#"{"output":[
                {"type":"reasoning","content":[]},
                {"type":"message","content":[
                    {"type":"output_text","text":"FILE: a\n"},
                    {"type":"refusal","text":"ignored"},
                    {"type":"output_text","text":"body"}
                ]}
            ]}"#,
        )
        .expect("parse");
        assert_eq!(body.into_text().as_deref(), Some("FILE: a\nbody"));
    }

    #[test]
    fn responses_body_without_text_is_none() {
        let body: ResponsesBody = serde_json::from_str(r#"{"output":[]}"#).expect("parse");
        assert!(body.into_text().is_none());
    }

    #[test]
    fn request_serializes_single_user_message() {
        let body = ResponsesRequest {
            model: "gpt-4.1",
            input: vec![InputMessage {
                role: "user",
                content: "hi",
            }],
            max_output_tokens: 800,
        };
        let value = serde_json::to_value(&body).expect("serialize");
        assert_eq!(
            value,
            serde_json::json!({
                "model": "gpt-4.1",
                "input": [{"role": "user", "content": "hi"}],
                "max_output_tokens": 800
            })
        );
    }

    #[test]
    fn endpoint_joins_base_url() {
        let config = LlmConfig {
            backend: LlmBackend::Responses,
            base_url: "http://localhost:8000/v1/".to_string(),
            ..LlmConfig::default()
        };
        let client = ResponsesClient::new(&config, Duration::from_secs(1)).expect("client");
        assert_eq!(client.endpoint, "http://localhost:8000/v1/responses");
    }

    #[cfg(unix)]
    mod command {
        use super::*;

        fn client(command: &[&str], workdir: PathBuf) -> CommandClient {
            CommandClient {
                command: command.iter().map(|arg| arg.to_string()).collect(),
                workdir,
                timeout: Duration::from_secs(10),
                output_limit_bytes: 1024,
            }
        }

        #[test]
        fn returns_stdout() {
            let temp = tempfile::tempdir().expect("tempdir");
            let client = client(&["cat"], temp.path().to_path_buf());
            assert_eq!(client.complete("echo me").expect("complete"), "echo me");
        }

        #[test]
        fn reads_response_file_when_requested() {
            let temp = tempfile::tempdir().expect("tempdir");
            let client = client(
                &["sh", "-c", "cat > /dev/null; echo noise; printf answer > \"$0\"", "{response_file}"],
                temp.path().to_path_buf(),
            );
            assert_eq!(client.complete("prompt").expect("complete"), "answer");
        }

        #[test]
        fn runs_in_workdir() {
            let temp = tempfile::tempdir().expect("tempdir");
            std::fs::write(temp.path().join("marker.txt"), "here").expect("write");
            let client = client(&["sh", "-c", "cat marker.txt"], temp.path().to_path_buf());
            assert_eq!(client.complete("").expect("complete"), "here");
        }

        #[test]
        fn non_zero_exit_is_an_error() {
            let temp = tempfile::tempdir().expect("tempdir");
            let client = client(&["sh", "-c", "echo quota exceeded >&2; exit 1"], temp.path().to_path_buf());
            let err = client.complete("prompt").unwrap_err();
            assert!(err.to_string().contains("quota exceeded"));
        }

        #[test]
        fn oversized_stdout_is_an_error() {
            let temp = tempfile::tempdir().expect("tempdir");
            let mut client = client(&["cat"], temp.path().to_path_buf());
            client.output_limit_bytes = 3;
            let err = client.complete("too long").unwrap_err();
            assert!(err.to_string().contains("exceeded 3 bytes"));
        }

        #[test]
        fn timeout_is_an_error() {
            let temp = tempfile::tempdir().expect("tempdir");
            let mut client = client(&["sleep", "5"], temp.path().to_path_buf());
            client.timeout = Duration::from_millis(100);
            let err = client.complete("").unwrap_err();
            assert!(err.to_string().contains("timed out"));
        }
    }
}
