//! Structured summary produced by the summarization collaborator.
//!
//! The payload is treated as opaque data: it is validated once on arrival,
//! stored as JSON, and replaced wholesale on re-summarization.

use serde::{Deserialize, Serialize};

/// Company or tool mention with the context it came up in
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mention {
    pub name: String,
    #[serde(default)]
    pub context: String,
}

/// Noteworthy quote; `timestamp` is "12:34" or a section name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    pub text: String,
    #[serde(default)]
    pub timestamp: Option<String>,
}

/// A recurring theme surfaced by the summarizer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Theme {
    pub title: String,
    pub summary: String,
}

/// Summary, topics, mentions, quotes and rating for one item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryPayload {
    pub summary: String,

    #[serde(default)]
    pub key_topics: Vec<String>,

    #[serde(default)]
    pub companies: Vec<Mention>,

    #[serde(default)]
    pub tools: Vec<Mention>,

    #[serde(default)]
    pub quotes: Vec<Quote>,

    /// Calibrated rating from 1 to 5
    pub rating_llm: u8,

    /// Digest highlight data (daily themes)
    #[serde(default)]
    pub themes: Vec<Theme>,

    /// Digest highlight data (actionables and weekly takeaways)
    #[serde(default)]
    pub takeaways: Vec<String>,

    /// Tag suggestions from the tagging collaborator
    #[serde(default)]
    pub tags: Vec<String>,
}

impl SummaryPayload {
    /// Reject payloads that would render an empty or nonsensical note
    pub fn validate(&self) -> Result<(), String> {
        if self.summary.trim().is_empty() {
            return Err("summary text is empty".to_string());
        }
        if !(1..=5).contains(&self.rating_llm) {
            return Err(format!("rating_llm {} is outside 1-5", self.rating_llm));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_payload_parses_with_defaults() {
        let payload: SummaryPayload =
            serde_json::from_str(r#"{"summary": "Short recap.", "rating_llm": 4}"#).unwrap();

        assert_eq!(payload.rating_llm, 4);
        assert!(payload.key_topics.is_empty());
        assert!(payload.takeaways.is_empty());
        assert!(payload.validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_bad_payloads() {
        let mut payload: SummaryPayload =
            serde_json::from_str(r#"{"summary": "  ", "rating_llm": 3}"#).unwrap();
        assert!(payload.validate().is_err());

        payload.summary = "Fine".to_string();
        payload.rating_llm = 9;
        assert_eq!(
            payload.validate().unwrap_err(),
            "rating_llm 9 is outside 1-5"
        );
    }
}
