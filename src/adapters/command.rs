//! Subprocess collaborator.
//!
//! Runs a configured program, writes a JSON request to its stdin and parses
//! JSON from its stdout. The child is killed if the caller's future is
//! dropped (for example on timeout).

use std::process::Stdio;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use super::{CollaboratorError, Discoverer, ProcessOutput, Processor, Summarizer};
use crate::domain::{DiscoveredItem, MediaItem, SummaryPayload};

/// A program speaking JSON over stdin/stdout
#[derive(Debug, Clone)]
pub struct ExternalCommand {
    program: String,
    args: Vec<String>,
}

impl ExternalCommand {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Build from an argv list; `None` when it is empty
    pub fn from_argv(argv: &[String]) -> Option<Self> {
        let (program, args) = argv.split_first()?;
        Some(Self::new(program.clone(), args.to_vec()))
    }

    pub fn display_name(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    async fn call<Req, Resp>(&self, request: &Req) -> Result<Resp, CollaboratorError>
    where
        Req: Serialize + Sync,
        Resp: DeserializeOwned,
    {
        let name = self.display_name();
        let payload = serde_json::to_vec(request).map_err(|source| CollaboratorError::BadOutput {
            command: name.clone(),
            source,
        })?;

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| CollaboratorError::Spawn {
                command: name.clone(),
                source,
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(&payload)
                .await
                .map_err(|source| CollaboratorError::Spawn {
                    command: name.clone(),
                    source,
                })?;
            // Dropping stdin signals EOF
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|source| CollaboratorError::Spawn {
                command: name.clone(),
                source,
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(CollaboratorError::Failed {
                command: name,
                code: output.status.code().unwrap_or(-1),
                stderr: stderr.trim().to_string(),
            });
        }

        debug!(command = %name, bytes = output.stdout.len(), "Collaborator finished");
        serde_json::from_slice(&output.stdout)
            .map_err(|source| CollaboratorError::BadOutput { command: name, source })
    }
}

#[async_trait]
impl Discoverer for ExternalCommand {
    async fn discover(
        &self,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<DiscoveredItem>, CollaboratorError> {
        self.call(&json!({ "action": "discover", "since": since })).await
    }
}

#[async_trait]
impl Processor for ExternalCommand {
    async fn process(&self, item: &MediaItem) -> Result<ProcessOutput, CollaboratorError> {
        self.call(&json!({ "action": "process", "item": item })).await
    }
}

#[async_trait]
impl Summarizer for ExternalCommand {
    async fn summarize(&self, item: &MediaItem) -> Result<SummaryPayload, CollaboratorError> {
        self.call(&json!({ "action": "summarize", "item": item })).await
    }
}
