//! Per-question state passed from stage to stage.

use crate::gateway::{Message, Role};

/// State of one pipeline run.
///
/// Stages consume the previous value and return a new one; nothing is
/// shared or mutated behind a reference. `sql_query` and `results` stay
/// empty unless the question was classified as database-related.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationState {
    messages: Vec<Message>,
    is_db_related: bool,
    sql_query: String,
    results: String,
}

impl ConversationState {
    /// Seed a run with the question as its only turn.
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            messages: vec![Message::user(question)],
            is_db_related: false,
            sql_query: String::new(),
            results: String::new(),
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn is_db_related(&self) -> bool {
        self.is_db_related
    }

    pub fn sql_query(&self) -> &str {
        &self.sql_query
    }

    pub fn results(&self) -> &str {
        &self.results
    }

    /// Content of the most recent user turn.
    pub fn question(&self) -> &str {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
            .unwrap_or("")
    }

    /// Content of the final assistant turn, once the run appended one.
    pub fn reply(&self) -> Option<&str> {
        self.messages
            .last()
            .filter(|m| m.role == Role::Assistant)
            .map(|m| m.content.as_str())
    }

    pub fn with_classification(self, is_db_related: bool) -> Self {
        Self {
            is_db_related,
            ..self
        }
    }

    pub fn with_sql_query(self, sql_query: impl Into<String>) -> Self {
        Self {
            sql_query: sql_query.into(),
            ..self
        }
    }

    pub fn with_results(self, results: impl Into<String>) -> Self {
        Self {
            results: results.into(),
            ..self
        }
    }

    pub fn with_reply(mut self, reply: impl Into<String>) -> Self {
        self.messages.push(Message::assistant(reply));
        self
    }
}

/// Named steps of a run, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Classify,
    GenerateQuery,
    ExecuteQuery,
    Interpret,
}

impl PipelineStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStage::Classify => "classify",
            PipelineStage::GenerateQuery => "generate_query",
            PipelineStage::ExecuteQuery => "execute_query",
            PipelineStage::Interpret => "interpret",
        }
    }

    /// Caller tag used for gateway attribution.
    pub fn caller(&self) -> &'static str {
        match self {
            PipelineStage::Classify => "pipeline::classify",
            PipelineStage::GenerateQuery => "pipeline::generate_query",
            PipelineStage::ExecuteQuery => "pipeline::execute_query",
            PipelineStage::Interpret => "pipeline::interpret",
        }
    }
}

impl std::fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
