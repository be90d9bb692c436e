use console::style;

use crate::analysis::CellInsight;
use crate::types::{AnalysisMatrix, truncate_chars};

/// Longest topic label shown in the heatmap's first column
const LABEL_WIDTH: usize = 24;

pub struct Output;

impl Output {
    pub fn new() -> Self {
        Self
    }

    pub fn success(&self, message: &str) {
        println!("{} {}", style("✓").green(), message);
    }

    pub fn error(&self, message: &str) {
        eprintln!("{} {}", style("✗").red(), message);
    }

    pub fn warning(&self, message: &str) {
        println!("{} {}", style("⚠").yellow(), message);
    }

    pub fn info(&self, message: &str) {
        println!("{} {}", style("ℹ").blue(), message);
    }

    pub fn header(&self, message: &str) {
        println!("\n{}", style(message).bold().underlined());
    }

    pub fn section(&self, message: &str) {
        println!("\n{}", style(message).bold());
        println!("{}", "─".repeat(40));
    }

    pub fn heatmap(&self, matrix: &AnalysisMatrix) {
        if matrix.topics.is_empty() || matrix.days.is_empty() {
            self.warning("No messages in this window, nothing to chart");
            return;
        }
        println!("{}", render_heatmap(matrix));
    }

    pub fn insight(&self, insight: &CellInsight) {
        println!("{}", render_insight(insight));
    }
}

impl Default for Output {
    fn default() -> Self {
        Self::new()
    }
}

fn trend_arrow(trend: i16) -> char {
    match trend {
        t if t > 0 => '↑',
        t if t < 0 => '↓',
        _ => ' ',
    }
}

/// Topic rows by day columns, each cell `value%` plus a trend arrow
pub fn render_heatmap(matrix: &AnalysisMatrix) -> String {
    let width = matrix
        .topics
        .iter()
        .map(|t| t.label().chars().count())
        .max()
        .unwrap_or(0)
        .clamp(5, LABEL_WIDTH);

    let mut out = format!("{:<width$}", "topic", width = width);
    for day in &matrix.days {
        out.push_str(&format!(" {:>6}", day.format("%m-%d")));
    }

    for (t, topic) in matrix.topics.iter().enumerate() {
        out.push('\n');
        out.push_str(&format!(
            "{:<width$}",
            truncate_chars(topic.label(), width),
            width = width
        ));
        for d in 0..matrix.days.len() {
            if let Some(cell) = matrix.cell(t, d) {
                out.push_str(&format!(" {:>4}%{}", cell.value, trend_arrow(cell.trend)));
            }
        }
    }
    out
}

pub fn render_insight(insight: &CellInsight) -> String {
    let mut out = format!(
        "{} on {}: {} relevant message(s)",
        insight.topic,
        insight.day,
        insight.relevant_messages.len()
    );

    if let Some(summary) = &insight.summary {
        out.push_str("\n\nSummary\n");
        out.push_str(summary);
    }

    match insight.offered_ticket() {
        Some(ticket) => {
            out.push_str(&format!("\n\nSuggested ticket: {}\n", ticket.title));
            out.push_str(&ticket.rationale);
        }
        None if !insight.relevant_messages.is_empty() => {
            out.push_str("\n\nNo ticket suggested");
        }
        None => {}
    }
    out
}
