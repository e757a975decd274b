//! Decide whether a question needs the database.

use crate::prompts;
use crate::schema::describe_schema;

use super::{ConversationState, PipelineContext, PipelineError, PipelineStage};

/// `true` only when the reply, trimmed and lower-cased, is exactly `true`.
/// Anything else, malformed output included, routes to web search.
pub fn parse_classification(raw: &str) -> bool {
    raw.trim().to_lowercase() == "true"
}

pub async fn classify(
    ctx: &PipelineContext,
    state: ConversationState,
) -> Result<ConversationState, PipelineError> {
    let stage = PipelineStage::Classify;

    let schema = describe_schema(ctx.database.as_ref())
        .await
        .map_err(|source| PipelineError::Schema { stage, source })?;

    let raw = ctx
        .completion
        .complete(
            &prompts::classifier_instructions(&schema),
            state.messages(),
            stage.caller(),
            ctx.run_id,
        )
        .await
        .map_err(|source| PipelineError::Completion { stage, source })?;

    let is_db_related = parse_classification(&raw);
    tracing::info!(
        question = %state.question(),
        is_db_related,
        "query classified"
    );

    Ok(state.with_classification(is_db_related))
}
