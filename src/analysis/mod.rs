//! Topic analysis: discovery, the intensity matrix, and per-cell insights.
//!
//! ```text
//! MessageWindow ─▶ TopicDiscovery ─▶ VolumeAggregator ─▶ AnalysisMatrix
//!                                                            │
//!                                     AnalysisSession ◀──────┘
//!                                            │ select_cell
//!                                            ▼
//!                                      CellPipeline ─▶ CellInsight
//! ```

pub mod aggregate;
pub mod insight;
pub mod session;
pub mod topics;

pub use aggregate::{VolumeAggregator, relevant_messages, round_half_up_percent};
pub use insight::{CellInsight, CellPhase, CellPipeline, SuggestedTicket};
pub use session::{AnalysisSession, CellSnapshot, Selection, SessionSnapshot, SessionState};
pub use topics::{TopicDiscovery, normalize_labels};
