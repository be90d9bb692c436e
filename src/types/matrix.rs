//! Topic vocabulary and the topic × day intensity matrix.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::types::{Result, TopicError};

// =============================================================================
// Topic
// =============================================================================

/// A discussion-theme label discovered from a corpus.
///
/// Serialized as the bare label. The lower-cased needle used for matching is
/// computed once on construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Topic {
    label: String,
    needle: String,
}

impl Topic {
    pub fn new(label: impl Into<String>) -> Self {
        let label = label.into();
        let needle = label.to_lowercase();
        Self { label, needle }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Case-insensitive substring containment against already lower-cased text
    #[inline]
    pub fn matches_lowered(&self, lowered_text: &str) -> bool {
        !self.needle.is_empty() && lowered_text.contains(&self.needle)
    }

    /// Case-insensitive substring containment
    pub fn matches(&self, text: &str) -> bool {
        self.matches_lowered(&text.to_lowercase())
    }
}

impl From<String> for Topic {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for Topic {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<Topic> for String {
    fn from(t: Topic) -> Self {
        t.label
    }
}

impl std::fmt::Display for Topic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label)
    }
}

// =============================================================================
// Cells
// =============================================================================

/// Coordinate of a single cell, addressed by label and date so it survives
/// re-serialization across the API boundary
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CellKey {
    pub topic: String,
    pub day: NaiveDate,
}

impl CellKey {
    pub fn new(topic: impl Into<String>, day: NaiveDate) -> Self {
        Self {
            topic: topic.into(),
            day,
        }
    }
}

impl std::fmt::Display for CellKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.topic, self.day)
    }
}

/// Intensity and trend of one cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CellValue {
    pub value: u8,
    pub trend: i16,
}

// =============================================================================
// Analysis Matrix
// =============================================================================

/// Topic × day grid of intensities (0..=100) and day-over-day trends
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisMatrix {
    pub topics: Vec<Topic>,
    pub days: Vec<NaiveDate>,
    pub values: Vec<Vec<u8>>,
    pub trends: Vec<Vec<i16>>,
}

impl AnalysisMatrix {
    /// Matrix with one empty row per topic and no day columns
    pub fn empty(topics: Vec<Topic>) -> Self {
        let rows = topics.len();
        Self {
            topics,
            days: Vec::new(),
            values: vec![Vec::new(); rows],
            trends: vec![Vec::new(); rows],
        }
    }

    pub fn topic_index(&self, label: &str) -> Option<usize> {
        let needle = label.trim().to_lowercase();
        self.topics
            .iter()
            .position(|t| t.label().to_lowercase() == needle)
    }

    pub fn day_index(&self, day: NaiveDate) -> Option<usize> {
        self.days.binary_search(&day).ok()
    }

    pub fn cell(&self, topic: usize, day: usize) -> Option<CellValue> {
        Some(CellValue {
            value: *self.values.get(topic)?.get(day)?,
            trend: *self.trends.get(topic)?.get(day)?,
        })
    }

    /// Resolve a cell key to grid coordinates
    pub fn locate(&self, key: &CellKey) -> Option<(usize, usize)> {
        Some((self.topic_index(&key.topic)?, self.day_index(key.day)?))
    }

    /// Check the shape and trend invariants
    pub fn validate(&self) -> Result<()> {
        let fail = |msg: String| Err(TopicError::InvalidInput(msg));

        if self.values.len() != self.topics.len() || self.trends.len() != self.topics.len() {
            return fail(format!(
                "expected {} rows, got {} values / {} trends",
                self.topics.len(),
                self.values.len(),
                self.trends.len()
            ));
        }
        if !self.days.windows(2).all(|w| w[0] < w[1]) {
            return fail("days must be strictly ascending".to_string());
        }

        for (t, (row, trend)) in self.values.iter().zip(&self.trends).enumerate() {
            if row.len() != self.days.len() || trend.len() != self.days.len() {
                return fail(format!("row {} does not span {} days", t, self.days.len()));
            }
            if let Some(v) = row.iter().find(|v| **v > 100) {
                return fail(format!("row {} has intensity {} above 100", t, v));
            }
            for d in 0..row.len() {
                let expected = if d == 0 {
                    0
                } else {
                    row[d] as i16 - row[d - 1] as i16
                };
                if trend[d] != expected {
                    return fail(format!(
                        "trend[{}][{}] = {}, expected {}",
                        t, d, trend[d], expected
                    ));
                }
            }
        }

        Ok(())
    }
}
