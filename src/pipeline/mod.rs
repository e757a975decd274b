//! Question → answer pipeline.
//!
//! Four stages run in a fixed order for every question:
//! 1. **Classify**: does the question need the database?
//! 2. **Generate query**: write one SQL statement (skipped for general questions)
//! 3. **Execute query**: run it, capturing rows or the error text (skipped likewise)
//! 4. **Interpret**: narrate the results, or answer from web search
//!
//! Skipped stages still run; they return the state unchanged.

pub mod classifier;
pub mod executor;
pub mod interpreter;
pub mod state;
pub mod synthesizer;

use std::sync::Arc;

use thiserror::Error;
use tracing::Instrument;
use uuid::Uuid;

use crate::completion::CompletionClient;
use crate::database::{Database, DatabaseError};
use crate::gateway::ProviderError;
use crate::search::SearchProvider;

pub use classifier::{classify, parse_classification};
pub use executor::{execute_query, run_query, QueryOutcome, EXECUTION_ERROR_PREFIX};
pub use interpreter::{interpret_results, search_answer, NO_ANSWER_FALLBACK};
pub use state::{ConversationState, PipelineStage};
pub use synthesizer::generate_query;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("schema introspection failed during {stage}: {source}")]
    Schema {
        stage: PipelineStage,
        source: DatabaseError,
    },
    #[error("completion failed during {stage}: {source}")]
    Completion {
        stage: PipelineStage,
        source: ProviderError,
    },
    #[error("pipeline finished without a reply")]
    MissingReply,
}

impl PipelineError {
    pub fn stage(&self) -> Option<PipelineStage> {
        match self {
            Self::Schema { stage, .. } | Self::Completion { stage, .. } => Some(*stage),
            Self::InvalidRequest(_) | Self::MissingReply => None,
        }
    }
}

/// Collaborators shared by every stage.
#[derive(Clone)]
pub struct PipelineContext {
    pub completion: CompletionClient,
    pub database: Arc<dyn Database>,
    pub search: Arc<dyn SearchProvider>,
    /// Set per run; tags gateway calls for usage logs.
    pub run_id: Option<Uuid>,
}

impl PipelineContext {
    pub fn new(
        completion: CompletionClient,
        database: Arc<dyn Database>,
        search: Arc<dyn SearchProvider>,
    ) -> Self {
        Self {
            completion,
            database,
            search,
            run_id: None,
        }
    }

    pub fn with_run(mut self, run_id: Uuid) -> Self {
        self.run_id = Some(run_id);
        self
    }
}

/// Entry point: owns the collaborators and runs one pipeline per question.
///
/// Runs share nothing but the collaborator handles, so one agent can serve
/// concurrent callers; each run gets its own state and database connections.
#[derive(Clone)]
pub struct QueryAgent {
    ctx: PipelineContext,
}

impl QueryAgent {
    pub fn new(
        completion: CompletionClient,
        database: Arc<dyn Database>,
        search: Arc<dyn SearchProvider>,
    ) -> Self {
        Self {
            ctx: PipelineContext::new(completion, database, search),
        }
    }

    pub fn context(&self) -> &PipelineContext {
        &self.ctx
    }

    /// Answer one question and return the final assistant turn.
    pub async fn process_question(&self, question: &str) -> Result<String, PipelineError> {
        let state = self.run(ConversationState::new(question)).await?;
        state
            .reply()
            .map(str::to_string)
            .ok_or(PipelineError::MissingReply)
    }

    /// Drive `state` through all four stages and return the final state,
    /// which ends with the appended assistant turn.
    pub async fn run(&self, state: ConversationState) -> Result<ConversationState, PipelineError> {
        if state.question().trim().is_empty() {
            return Err(PipelineError::InvalidRequest(
                "question must not be empty".into(),
            ));
        }

        let run_id = Uuid::new_v4();
        let ctx = self.ctx.clone().with_run(run_id);
        let question = state.question().to_string();
        let span = tracing::info_span!("pipeline_run", %run_id);

        async move {
            tracing::info!(
                question = %question,
                model = ctx.completion.model().model_id(),
                "processing new question"
            );

            match run_stages(&ctx, state).await {
                Ok(done) => {
                    tracing::info!("question processing complete");
                    Ok(done)
                }
                Err(e) => {
                    tracing::error!(
                        stage = e.stage().map(|s| s.as_str()).unwrap_or("-"),
                        question = %question,
                        error = %e,
                        "pipeline run failed"
                    );
                    Err(e)
                }
            }
        }
        .instrument(span)
        .await
    }
}

async fn run_stages(
    ctx: &PipelineContext,
    state: ConversationState,
) -> Result<ConversationState, PipelineError> {
    let state = classify(ctx, state).await?;
    let state = generate_query(ctx, state).await?;
    let state = execute_query(ctx, state).await;
    let reply = interpret_results(ctx, &state).await?;
    Ok(state.with_reply(reply))
}
