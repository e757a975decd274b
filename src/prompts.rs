//! Instruction templates for the three model calls of a pipeline run.
//!
//! Templates are plain text with `{placeholder}` markers filled by
//! [`PromptTemplate::render`].

use crate::gateway::Message;

/// A fixed instruction template.
#[derive(Debug, Clone, Copy)]
pub struct PromptTemplate {
    pub slug: &'static str,
    pub system: &'static str,
}

impl PromptTemplate {
    /// Substitute each `{name}` with its value. Unknown placeholders stay as-is.
    pub fn render(&self, vars: &[(&str, &str)]) -> String {
        let mut out = self.system.to_string();
        for (name, value) in vars {
            out = out.replace(&format!("{{{name}}}"), value);
        }
        out.trim().to_string()
    }
}

/// Render conversation turns as `role: content` lines for templates that
/// embed the conversation as text.
pub fn render_history(messages: &[Message]) -> String {
    messages
        .iter()
        .map(|m| format!("{}: {}", m.role.as_str(), m.content))
        .collect::<Vec<_>>()
        .join("\n")
}

pub const CLASSIFIER: PromptTemplate = PromptTemplate {
    slug: "classifier",
    system: r#"You are a query classifier that determines if a question can be answered using SQL queries on the given database schema.
Output only 'true' if the question requires querying the database, or 'false' if it's a general knowledge question.

Database Schema:
{schema}"#,
};

pub const QUERY_GENERATOR: PromptTemplate = PromptTemplate {
    slug: "query_generator",
    system: r#"You are an SQL expert. Generate a SQL query using {dialect} syntax to answer the user's question based on the given schema.
Output ONLY the raw SQL query without any markdown formatting, prefixes, or explanations.
Example output format:
SELECT column FROM table WHERE condition;
SELECT column, count(*) as count FROM table WHERE condition group by column order by column;
SELECT product_name, product_maximum_retail_price FROM products WHERE product_maximum_retail_price = (SELECT MAX(product_maximum_retail_price) FROM products);

Database Schema:
{schema}"#,
};

pub const INTERPRETER: PromptTemplate = PromptTemplate {
    slug: "interpreter",
    system: r#"You are a helpful assistant that interprets SQL query results in natural language.
Explain the results in a clear and concise way that directly answers the user's question.

Original question: {messages}
SQL Query used: {query}
Query results: {results}"#,
};

pub fn classifier_instructions(schema: &str) -> String {
    CLASSIFIER.render(&[("schema", schema)])
}

pub fn query_generator_instructions(schema: &str, dialect: &str) -> String {
    QUERY_GENERATOR.render(&[("schema", schema), ("dialect", dialect)])
}

pub fn interpreter_instructions(messages: &[Message], query: &str, results: &str) -> String {
    let history = render_history(messages);
    INTERPRETER.render(&[
        ("messages", history.as_str()),
        ("query", query),
        ("results", results),
    ])
}
