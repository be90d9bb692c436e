//! Cell Insight Pipeline
//!
//! Enriches one (topic, day) cell: gather the cell's messages, summarize them,
//! then ask for a ticket suggestion. Progress is published on a `watch`
//! channel so any number of observers can follow a single run.
//!
//! ```text
//! Idle → Gathering → Summarizing → Suggesting → Ready
//!            └────────────┴─────────────┴──────→ Failed
//! ```
//!
//! Cancellation is handled by the owner of the task (see
//! [`super::session::AnalysisSession`]), which publishes `Idle` and aborts it.
//! A run only advances a cell that is still working, so once `Idle` (or any
//! settled phase) is on the channel, later transitions from the run are
//! dropped.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

use super::aggregate::relevant_messages;
use crate::ai::{SharedIntelligence, SummaryContext};
use crate::types::{DayBucket, ErrorKind, Message, Result, Topic, TopicError};

// =============================================================================
// Cell State
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuggestedTicket {
    pub title: String,
    pub rationale: String,
    /// Set once a user acts on the suggestion; acted-upon tickets are not re-offered
    #[serde(default)]
    pub acted_upon: bool,
}

/// Enrichment result for one cell
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellInsight {
    pub topic: String,
    pub day: NaiveDate,
    pub relevant_messages: Vec<Message>,
    pub summary: Option<String>,
    pub suggested_ticket: Option<SuggestedTicket>,
}

impl CellInsight {
    fn empty(topic: &Topic, day: NaiveDate) -> Self {
        Self {
            topic: topic.label().to_string(),
            day,
            relevant_messages: Vec::new(),
            summary: None,
            suggested_ticket: None,
        }
    }

    /// The suggestion, unless it has already been acted upon
    pub fn offered_ticket(&self) -> Option<&SuggestedTicket> {
        self.suggested_ticket.as_ref().filter(|t| !t.acted_upon)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum CellPhase {
    Idle,
    Gathering,
    Summarizing { relevant: usize },
    Suggesting { relevant: usize },
    Ready { insight: CellInsight },
    Failed { kind: ErrorKind, message: String },
}

impl CellPhase {
    /// A pipeline is currently running for the cell
    pub fn is_working(&self) -> bool {
        matches!(
            self,
            Self::Gathering | Self::Summarizing { .. } | Self::Suggesting { .. }
        )
    }

    /// No pipeline is running and none will publish again
    pub fn is_settled(&self) -> bool {
        !self.is_working()
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Gathering => "gathering",
            Self::Summarizing { .. } => "summarizing",
            Self::Suggesting { .. } => "suggesting",
            Self::Ready { .. } => "ready",
            Self::Failed { .. } => "failed",
        }
    }

    /// Settled outcome as a result; `Idle` means the run was cancelled
    pub fn into_result(self) -> Result<CellInsight> {
        match self {
            Self::Ready { insight } => Ok(insight),
            Self::Failed { kind, message } => Err(TopicError::from_kind(kind, message)),
            Self::Idle => Err(TopicError::Cancelled("cell insight cancelled".to_string())),
            working => Err(TopicError::InvalidInput(format!(
                "cell insight still {}",
                working.name()
            ))),
        }
    }

    fn failed(err: TopicError) -> Self {
        Self::Failed {
            kind: err.kind(),
            message: err.detail(),
        }
    }
}

// =============================================================================
// Pipeline
// =============================================================================

#[derive(Clone)]
pub struct CellPipeline {
    intelligence: SharedIntelligence,
}

impl CellPipeline {
    pub fn new(intelligence: SharedIntelligence) -> Self {
        Self { intelligence }
    }

    /// Run the pipeline to a terminal phase, publishing every transition.
    ///
    /// The caller starts the channel in a working phase (normally
    /// `Gathering`). Returns the phase left on the channel: the run's terminal
    /// phase, or whatever settled phase a canceller published first.
    #[instrument(skip_all, fields(topic = %topic, day = %bucket.date))]
    pub async fn run(
        &self,
        topic: &Topic,
        bucket: &DayBucket,
        phase: &watch::Sender<CellPhase>,
    ) -> CellPhase {
        advance(phase, CellPhase::Gathering);
        let relevant: Vec<Message> = relevant_messages(topic, bucket).cloned().collect();

        if relevant.is_empty() {
            debug!("No relevant messages, nothing to enrich");
            return publish(phase, CellPhase::Ready {
                insight: CellInsight::empty(topic, bucket.date),
            });
        }

        let count = relevant.len();
        let corpus: Vec<String> = relevant.iter().map(Message::as_corpus_line).collect();

        advance(phase, CellPhase::Summarizing { relevant: count });
        let context = SummaryContext::for_cell(topic.label(), bucket.label());
        let summary = match self.intelligence.summarize(&corpus, &context).await {
            Ok(summary) => summary,
            Err(e) => {
                warn!("Summarization failed: {}", e);
                return publish(
                    phase,
                    CellPhase::failed(e.attribute(TopicError::SummarizationFailed)),
                );
            }
        };

        advance(phase, CellPhase::Suggesting { relevant: count });
        let suggestion = match self.intelligence.suggest_ticket(topic.label(), &corpus).await {
            Ok(suggestion) => suggestion,
            Err(e) => {
                warn!("Ticket suggestion failed: {}", e);
                return publish(
                    phase,
                    CellPhase::failed(e.attribute(TopicError::SuggestionFailed)),
                );
            }
        };

        let suggested_ticket = (!suggestion.is_empty()).then(|| SuggestedTicket {
            title: suggestion.suggestion,
            rationale: suggestion.reason,
            acted_upon: false,
        });

        info!(
            relevant = count,
            ticket = suggested_ticket.is_some(),
            "Cell insight ready"
        );

        publish(phase, CellPhase::Ready {
            insight: CellInsight {
                topic: topic.label().to_string(),
                day: bucket.date,
                relevant_messages: relevant,
                summary: Some(summary),
                suggested_ticket,
            },
        })
    }
}

/// Replace the current phase with `next` only while the cell is working
fn advance(phase: &watch::Sender<CellPhase>, next: CellPhase) -> bool {
    phase.send_if_modified(|current| {
        if current.is_working() {
            *current = next;
            true
        } else {
            false
        }
    })
}

fn publish(phase: &watch::Sender<CellPhase>, terminal: CellPhase) -> CellPhase {
    if !advance(phase, terminal) {
        debug!("Cell settled elsewhere, dropping result");
    }
    phase.borrow().clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeIntelligence, at, day};
    use std::sync::Arc;

    fn bucket(texts: &[&str]) -> DayBucket {
        DayBucket {
            date: day(2024, 3, 5),
            messages: texts
                .iter()
                .enumerate()
                .map(|(i, t)| Message::new("alice", *t, at(2024, 3, 5, 9, i as u32)))
                .collect(),
        }
    }

    async fn run(ai: Arc<FakeIntelligence>, topic: &str, b: &DayBucket) -> (CellPhase, CellPhase) {
        let (tx, rx) = watch::channel(CellPhase::Gathering);
        let terminal = CellPipeline::new(ai).run(&Topic::new(topic), b, &tx).await;
        let last = rx.borrow().clone();
        (terminal, last)
    }

    #[tokio::test]
    async fn test_zero_relevant_messages_short_circuits() {
        let ai = Arc::new(FakeIntelligence::default().ticket("never", "never"));
        let (terminal, last) = run(ai.clone(), "login", &bucket(&["lunch?", "sure"])).await;

        let insight = terminal.clone().into_result().unwrap();
        assert!(insight.relevant_messages.is_empty());
        assert!(insight.summary.is_none());
        assert!(insight.suggested_ticket.is_none());
        assert_eq!(ai.calls(), (0, 0, 0));
        assert_eq!(terminal, last);
    }

    #[tokio::test]
    async fn test_full_run_with_ticket() {
        let ai = Arc::new(
            FakeIntelligence::default()
                .summary("Login is broken for SSO users.")
                .ticket("Fix SSO login", "Several reports today"),
        );
        let b = bucket(&["login broken", "lunch", "LOGIN still broken"]);
        let (terminal, _) = run(ai.clone(), "login", &b).await;

        let insight = terminal.into_result().unwrap();
        assert_eq!(insight.relevant_messages.len(), 2);
        assert_eq!(insight.summary.as_deref(), Some("Login is broken for SSO users."));
        let ticket = insight.offered_ticket().unwrap();
        assert_eq!(ticket.title, "Fix SSO login");
        assert_eq!(ticket.rationale, "Several reports today");

        let summarized = ai.last_summarized.lock().unwrap().clone();
        assert_eq!(summarized, vec!["alice: login broken", "alice: LOGIN still broken"]);
    }

    #[tokio::test]
    async fn test_empty_suggestion_is_ready_without_ticket() {
        let ai = Arc::new(FakeIntelligence::default().ticket("  ", ""));
        let (terminal, _) = run(ai.clone(), "deploy", &bucket(&["deploy done"])).await;

        let insight = terminal.into_result().unwrap();
        assert!(insight.summary.is_some());
        assert!(insight.suggested_ticket.is_none());
        assert_eq!(ai.calls(), (0, 1, 1));
    }

    #[tokio::test]
    async fn test_summarization_failure_fails_cell() {
        let ai = Arc::new(FakeIntelligence {
            summary: Err(ErrorKind::SummarizationFailed),
            ..Default::default()
        });
        let (terminal, last) = run(ai.clone(), "deploy", &bucket(&["deploy done"])).await;

        assert!(matches!(
            terminal,
            CellPhase::Failed { kind: ErrorKind::SummarizationFailed, .. }
        ));
        assert_eq!(terminal, last);
        assert_eq!(ai.calls(), (0, 1, 0));
    }

    #[tokio::test]
    async fn test_suggestion_failure_fails_cell() {
        let ai = Arc::new(FakeIntelligence {
            suggestion: Err(ErrorKind::SuggestionFailed),
            ..Default::default()
        });
        let (terminal, _) = run(ai, "deploy", &bucket(&["deploy done"])).await;
        let err = terminal.into_result().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SuggestionFailed);
    }

    #[tokio::test]
    async fn test_settled_channel_is_not_overwritten() {
        let ai = Arc::new(FakeIntelligence::default().ticket("Fix it", "reports"));
        let (tx, rx) = watch::channel(CellPhase::Idle);
        let terminal = CellPipeline::new(ai)
            .run(&Topic::new("deploy"), &bucket(&["deploy failed"]), &tx)
            .await;

        assert_eq!(terminal, CellPhase::Idle);
        assert_eq!(*rx.borrow(), CellPhase::Idle);
    }

    #[test]
    fn test_advance_only_from_working_phase() {
        let (tx, rx) = watch::channel(CellPhase::Suggesting { relevant: 1 });
        assert!(advance(&tx, CellPhase::Idle));
        assert!(!advance(&tx, CellPhase::Failed {
            kind: ErrorKind::SuggestionFailed,
            message: "late".to_string(),
        }));
        assert_eq!(*rx.borrow(), CellPhase::Idle);
    }

    #[tokio::test]
    async fn test_failed_cell_message_has_single_prefix() {
        let ai = Arc::new(FakeIntelligence {
            summary: Err(ErrorKind::SummarizationFailed),
            ..Default::default()
        });
        let (terminal, _) = run(ai, "deploy", &bucket(&["deploy done"])).await;

        let message = terminal.into_result().unwrap_err().to_string();
        assert_eq!(message.matches("Summarization failed").count(), 1, "{}", message);
    }

    #[test]
    fn test_phase_predicates() {
        assert!(CellPhase::Gathering.is_working());
        assert!(CellPhase::Suggesting { relevant: 1 }.is_working());
        assert!(CellPhase::Idle.is_settled());
        assert_eq!(
            CellPhase::Idle.into_result().unwrap_err().kind(),
            ErrorKind::Cancelled
        );
    }

    #[test]
    fn test_phase_serializes_with_tag() {
        let json = serde_json::to_value(CellPhase::Summarizing { relevant: 3 }).unwrap();
        assert_eq!(json["phase"], "summarizing");
        assert_eq!(json["relevant"], 3);
    }
}
