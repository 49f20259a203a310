//! Collaborator interfaces.
//!
//! Discovery, processing (transcription or parsing) and summarization are
//! external concerns. The lifecycle engine only sees these traits and treats
//! their output as opaque data.

pub mod command;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{DiscoveredItem, ItemType, MediaItem, SummaryPayload};

pub use command::ExternalCommand;

/// Errors raised by collaborators; the message becomes the item's
/// `error_reason`
#[derive(Debug, Error)]
pub enum CollaboratorError {
    #[error("failed to start {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{command} exited with code {code}: {stderr}")]
    Failed {
        command: String,
        code: i32,
        stderr: String,
    },

    #[error("{command} returned invalid output: {source}")]
    BadOutput {
        command: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("{0}")]
    Message(String),
}

/// Output of the processing stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessOutput {
    /// Location of the transcript or parsed text
    pub artifact: String,
}

/// Finds new items (feed polling, mailbox search)
#[async_trait]
pub trait Discoverer: Send + Sync {
    async fn discover(
        &self,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<DiscoveredItem>, CollaboratorError>;
}

/// Turns an item into text (download + transcribe, or parse)
#[async_trait]
pub trait Processor: Send + Sync {
    async fn process(&self, item: &MediaItem) -> Result<ProcessOutput, CollaboratorError>;
}

/// Produces the structured summary for a processed item
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, item: &MediaItem) -> Result<SummaryPayload, CollaboratorError>;
}

/// The collaborators wired into a run; stages bail when theirs is missing
#[derive(Clone, Default)]
pub struct Collaborators {
    pub discoverer: Option<Arc<dyn Discoverer>>,
    pub episode_processor: Option<Arc<dyn Processor>>,
    pub newsletter_processor: Option<Arc<dyn Processor>>,
    pub summarizer: Option<Arc<dyn Summarizer>>,
}

impl Collaborators {
    pub fn processor(&self, item_type: ItemType) -> Option<Arc<dyn Processor>> {
        match item_type {
            ItemType::Episode => self.episode_processor.clone(),
            ItemType::Newsletter => self.newsletter_processor.clone(),
        }
    }
}
