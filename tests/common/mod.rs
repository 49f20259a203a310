//! Shared fixtures: in-process collaborators and an orchestrator wired to a
//! temp vault.

#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use tempfile::TempDir;

use media_digest::adapters::{
    CollaboratorError, Collaborators, Discoverer, ProcessOutput, Processor, Summarizer,
};
use media_digest::core::{FixedClock, Orchestrator, RetryPolicy, StageSettings};
use media_digest::digest::DigestSettings;
use media_digest::domain::{DiscoveredItem, ItemType, MediaItem, SummaryPayload};
use media_digest::store::ItemStore;

pub fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
}

pub fn found(id: &str, item_type: ItemType, published_at: DateTime<Utc>) -> DiscoveredItem {
    DiscoveredItem {
        external_id: id.to_string(),
        item_type,
        title: format!("Title {}", id),
        author: Some("Acquired".to_string()),
        published_at: Some(published_at),
        source_link: Some(format!("https://example.com/{}", id)),
    }
}

/// Returns whatever it was seeded with
pub struct StaticDiscoverer {
    pub items: Mutex<Vec<DiscoveredItem>>,
}

impl StaticDiscoverer {
    pub fn new(items: Vec<DiscoveredItem>) -> Self {
        Self {
            items: Mutex::new(items),
        }
    }

    pub fn replace(&self, items: Vec<DiscoveredItem>) {
        *self.items.lock().unwrap() = items;
    }
}

#[async_trait]
impl Discoverer for StaticDiscoverer {
    async fn discover(
        &self,
        _since: Option<DateTime<Utc>>,
    ) -> Result<Vec<DiscoveredItem>, CollaboratorError> {
        Ok(self.items.lock().unwrap().clone())
    }
}

/// Fails for configured ids with a fixed message, succeeds otherwise
#[derive(Default)]
pub struct ScriptedProcessor {
    pub failing: Mutex<BTreeMap<String, String>>,
    pub calls: Mutex<Vec<String>>,
}

impl ScriptedProcessor {
    pub fn fail(&self, id: &str, reason: &str) {
        self.failing
            .lock()
            .unwrap()
            .insert(id.to_string(), reason.to_string());
    }

    pub fn heal(&self, id: &str) {
        self.failing.lock().unwrap().remove(id);
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl Processor for ScriptedProcessor {
    async fn process(&self, item: &MediaItem) -> Result<ProcessOutput, CollaboratorError> {
        self.calls.lock().unwrap().push(item.external_id.clone());
        if let Some(reason) = self.failing.lock().unwrap().get(&item.external_id) {
            return Err(CollaboratorError::Message(reason.clone()));
        }
        Ok(ProcessOutput {
            artifact: format!("/transcripts/{}.txt", item.external_id),
        })
    }
}

/// Summaries with per-id ratings (default 3)
#[derive(Default)]
pub struct RatedSummarizer {
    pub ratings: BTreeMap<String, u8>,
    pub broken: BTreeSet<String>,
}

impl RatedSummarizer {
    pub fn with_ratings(pairs: &[(&str, u8)]) -> Self {
        Self {
            ratings: pairs.iter().map(|(id, r)| (id.to_string(), *r)).collect(),
            broken: BTreeSet::new(),
        }
    }
}

#[async_trait]
impl Summarizer for RatedSummarizer {
    async fn summarize(&self, item: &MediaItem) -> Result<SummaryPayload, CollaboratorError> {
        let rating = if self.broken.contains(&item.external_id) {
            0
        } else {
            self.ratings.get(&item.external_id).copied().unwrap_or(3)
        };
        Ok(SummaryPayload {
            summary: format!("Summary of {}.", item.title),
            key_topics: vec!["AI".to_string()],
            companies: Vec::new(),
            tools: Vec::new(),
            quotes: Vec::new(),
            rating_llm: rating,
            themes: Vec::new(),
            takeaways: vec![format!("Takeaway from {}", item.external_id)],
            tags: vec!["AI".to_string(), "Podcasts".to_string()],
        })
    }
}

pub struct Harness {
    pub dir: TempDir,
    pub store: Arc<dyn ItemStore>,
    pub clock: Arc<FixedClock>,
    pub discoverer: Arc<StaticDiscoverer>,
    pub processor: Arc<ScriptedProcessor>,
    pub summarizer: Arc<RatedSummarizer>,
}

impl Harness {
    pub fn new(store: Arc<dyn ItemStore>, items: Vec<DiscoveredItem>, summarizer: RatedSummarizer) -> Self {
        Self {
            dir: TempDir::new().unwrap(),
            store,
            clock: Arc::new(FixedClock::new(at(2025, 10, 3, 21))),
            discoverer: Arc::new(StaticDiscoverer::new(items)),
            processor: Arc::new(ScriptedProcessor::default()),
            summarizer: Arc::new(summarizer),
        }
    }

    pub fn settings(&self) -> StageSettings {
        StageSettings {
            lock_dir: self.dir.path().join("locks"),
            export_root: self.dir.path().join("vault"),
            max_tags_per_doc: 5,
            collaborator_timeout: Duration::from_secs(5),
            weekly_day: chrono::Weekday::Fri,
            digest: DigestSettings::default(),
        }
    }

    pub fn orchestrator(&self) -> Orchestrator {
        let collaborators = Collaborators {
            discoverer: Some(self.discoverer.clone() as Arc<dyn Discoverer>),
            episode_processor: Some(self.processor.clone() as Arc<dyn Processor>),
            newsletter_processor: Some(self.processor.clone() as Arc<dyn Processor>),
            summarizer: Some(self.summarizer.clone() as Arc<dyn Summarizer>),
        };
        Orchestrator::new(
            self.store.clone(),
            collaborators,
            RetryPolicy::default(),
            self.settings(),
        )
        .with_clock(self.clock.clone())
    }

    pub fn item(&self, id: &str) -> MediaItem {
        self.store.get(id).unwrap().unwrap()
    }

    /// discover -> process -> summarize -> export
    pub async fn run_pipeline(&self, orchestrator: &Orchestrator) {
        orchestrator.discover(None).await.unwrap();
        orchestrator.process(None, None, true).await.unwrap();
        orchestrator.summarize(None).await.unwrap();
        orchestrator
            .export(media_digest::core::ExportScope::New, false)
            .await
            .unwrap();
    }
}
