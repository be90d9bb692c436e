//! Prompt Builder
//!
//! Sectioned prompt construction shared by the intelligence stages, plus the
//! three stage templates (classification, summarization, ticket suggestion).

/// Prompt section types
#[derive(Debug, Clone)]
pub enum PromptSection {
    /// Role definition with expertise area
    Role { expertise: String, task: String },
    /// Numbered objectives
    Objectives(Vec<String>),
    /// Ordered key/value context lines
    Context(Vec<(String, String)>),
    /// Transcript lines, one per message
    Transcript(Vec<String>),
    /// Raw text section with optional header
    Text {
        header: Option<String>,
        content: String,
    },
}

#[derive(Debug, Clone, Default)]
pub struct PromptBuilder {
    sections: Vec<PromptSection>,
}

impl PromptBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn role(mut self, expertise: &str, task: &str) -> Self {
        self.sections.push(PromptSection::Role {
            expertise: expertise.to_string(),
            task: task.to_string(),
        });
        self
    }

    pub fn objectives(mut self, objectives: &[&str]) -> Self {
        self.sections.push(PromptSection::Objectives(
            objectives.iter().map(|s| s.to_string()).collect(),
        ));
        self
    }

    /// Add a context item; items accumulate into one section in insertion order
    pub fn context_item(mut self, key: &str, value: &str) -> Self {
        let item = (key.to_string(), value.to_string());
        match self.sections.iter_mut().find_map(|s| match s {
            PromptSection::Context(items) => Some(items),
            _ => None,
        }) {
            Some(items) => items.push(item),
            None => self.sections.push(PromptSection::Context(vec![item])),
        }
        self
    }

    /// Add a context item only when a value is present
    pub fn context_opt(self, key: &str, value: Option<&str>) -> Self {
        match value {
            Some(v) if !v.trim().is_empty() => self.context_item(key, v),
            _ => self,
        }
    }

    pub fn transcript(mut self, lines: &[String]) -> Self {
        self.sections.push(PromptSection::Transcript(lines.to_vec()));
        self
    }

    pub fn section(mut self, header: &str, content: &str) -> Self {
        self.sections.push(PromptSection::Text {
            header: Some(header.to_string()),
            content: content.to_string(),
        });
        self
    }

    pub fn build(self) -> String {
        let mut prompt = String::new();

        for section in self.sections {
            match section {
                PromptSection::Role { expertise, task } => {
                    prompt.push_str("<ROLE>\n");
                    prompt.push_str(&format!(
                        "You are an expert {} specializing in {}.\n",
                        expertise, task
                    ));
                    prompt.push_str("</ROLE>\n\n");
                }
                PromptSection::Objectives(objectives) => {
                    prompt.push_str("<OBJECTIVES>\n");
                    for (i, obj) in objectives.iter().enumerate() {
                        prompt.push_str(&format!("{}. {}\n", i + 1, obj));
                    }
                    prompt.push_str("</OBJECTIVES>\n\n");
                }
                PromptSection::Context(items) => {
                    prompt.push_str("# Context\n\n");
                    for (key, value) in items {
                        prompt.push_str(&format!("**{}**: {}\n", key, value));
                    }
                    prompt.push('\n');
                }
                PromptSection::Transcript(lines) => {
                    prompt.push_str("<MESSAGES>\n");
                    for line in lines {
                        // One message per line keeps speaker boundaries unambiguous
                        prompt.push_str(&line.replace('\n', " "));
                        prompt.push('\n');
                    }
                    prompt.push_str("</MESSAGES>\n\n");
                }
                PromptSection::Text { header, content } => {
                    if let Some(h) = header {
                        prompt.push_str(&format!("# {}\n\n", h));
                    }
                    prompt.push_str(&content);
                    prompt.push_str("\n\n");
                }
            }
        }

        prompt.trim_end().to_string()
    }
}

/// Stage templates
pub struct PromptTemplates;

impl PromptTemplates {
    pub fn classify_topics(lines: &[String], max_topics: usize) -> String {
        PromptBuilder::new()
            .role(
                "topic extraction system",
                "project management and software development discussions",
            )
            .objectives(&[
                "Extract the key discussion topics from the chat messages below",
                "Group similar topics together under one concise label",
                "Prefer short labels that literally appear in the messages",
            ])
            .context_item("Maximum topics", &max_topics.to_string())
            .transcript(lines)
            .section(
                "Output",
                r#"Return a JSON object of the form {"topics": ["label", ...]}."#,
            )
            .build()
    }

    pub fn summarize(
        lines: &[String],
        topic: Option<&str>,
        day_label: Option<&str>,
        channel_name: Option<&str>,
        date_range: Option<&str>,
    ) -> String {
        PromptBuilder::new()
            .role(
                "assistant",
                "summarizing technical discussions from team chat",
            )
            .objectives(&[
                "Write a clear, concise summary of the conversation",
                "Capture the key points, decisions and action items",
                "Only state what the messages support",
            ])
            .context_opt("Topic", topic)
            .context_opt("Day", day_label)
            .context_opt("Channel", channel_name)
            .context_opt("Date range", date_range)
            .transcript(lines)
            .section(
                "Output",
                r#"Return a JSON object of the form {"summary": "..."}."#,
            )
            .build()
    }

    pub fn suggest_ticket(topic: &str, lines: &[String]) -> String {
        PromptBuilder::new()
            .role("project manager", "turning conversations into tracked work")
            .objectives(&[
                "Review the conversation and decide whether a ticket should be created",
                "If so, write a short ticket title and the reason it is needed",
                "If no ticket is warranted, return an empty suggestion",
            ])
            .context_item("Topic", topic)
            .transcript(lines)
            .section(
                "Output",
                r#"Return a JSON object of the form {"suggestion": "ticket title", "reason": "why this ticket should be created"}."#,
            )
            .build()
    }
}
