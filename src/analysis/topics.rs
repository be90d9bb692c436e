//! Topic Discovery
//!
//! One batched classification call per corpus, then label normalization into
//! a bounded, deduplicated vocabulary.

use std::collections::HashSet;

use tracing::{info, instrument, warn};

use crate::ai::SharedIntelligence;
use crate::constants::analysis::MAX_LABEL_CHARS;
use crate::types::{Message, Result, Topic};

pub struct TopicDiscovery {
    intelligence: SharedIntelligence,
    max_topics: usize,
}

impl TopicDiscovery {
    pub fn new(intelligence: SharedIntelligence, max_topics: usize) -> Self {
        Self {
            intelligence,
            max_topics,
        }
    }

    /// Discover the topic vocabulary of `messages`.
    ///
    /// An empty corpus yields an empty vocabulary without calling the provider.
    #[instrument(skip_all, fields(messages = messages.len()))]
    pub async fn discover(&self, messages: &[Message]) -> Result<Vec<Topic>> {
        if messages.is_empty() {
            info!("Empty corpus, skipping classification");
            return Ok(Vec::new());
        }

        let corpus: Vec<String> = messages.iter().map(Message::as_corpus_line).collect();
        let labels = self.intelligence.classify_topics(&corpus).await?;
        let raw_count = labels.len();

        let topics = normalize_labels(labels, self.max_topics);
        if topics.len() < raw_count {
            warn!(
                "Kept {} of {} candidate labels after normalization",
                topics.len(),
                raw_count
            );
        }
        info!("Discovered {} topics", topics.len());
        Ok(topics)
    }
}

/// Trim, collapse inner whitespace, drop empties, dedupe case-insensitively
/// (first spelling wins), cap the count.
///
/// Labels longer than `MAX_LABEL_CHARS` are dropped, never clipped: the label
/// is also the match needle.
pub fn normalize_labels(labels: Vec<String>, max_topics: usize) -> Vec<Topic> {
    let mut seen = HashSet::new();
    let mut topics = Vec::new();

    for label in labels {
        if topics.len() >= max_topics {
            break;
        }
        let collapsed = label.split_whitespace().collect::<Vec<_>>().join(" ");
        if collapsed.is_empty() {
            continue;
        }
        if collapsed.chars().count() > MAX_LABEL_CHARS {
            warn!(chars = collapsed.chars().count(), "Dropping over-long topic label");
            continue;
        }
        if seen.insert(collapsed.to_lowercase()) {
            topics.push(Topic::new(collapsed));
        }
    }

    topics
}
