#![forbid(unsafe_code)]

//! # insights-desk
//!
//! Answer natural-language questions, from a relational database when the
//! question is about its data and from web search otherwise.
//!
//! Each question runs through a fixed four-stage pipeline (see [`pipeline`]):
//! a language model classifies it against the live schema, writes one SQL
//! statement, the statement is executed, and the model narrates the rows.
//! General questions skip the SQL stages and are answered by a search
//! provider instead.
//!
//! ```no_run
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let agent = insights_desk::AgentConfig::from_env()?.build_agent()?;
//! let answer = agent.process_question("What is the barcode of Hat?").await?;
//! println!("{answer}");
//! # Ok(())
//! # }
//! ```

pub mod completion;
pub mod config;
pub mod database;
pub mod gateway;
pub mod logging;
pub mod pipeline;
pub mod prompts;
pub mod schema;
pub mod search;

pub use completion::CompletionClient;
pub use config::{AgentConfig, ConfigError, DatabaseConfig};
pub use database::{Database, DatabaseError, ResultTable, SqliteDatabase};
pub use gateway::{Attribution, ChatGateway, ProviderError, ProviderGateway, UsageSink};
pub use pipeline::{ConversationState, PipelineError, QueryAgent};
pub use schema::describe_schema;
pub use search::{SearchProvider, TavilyClient};
