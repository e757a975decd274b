//! Produce the final answer text.

use crate::prompts;
use crate::search::{SearchDepth, SearchProvider, SearchRequest};

use super::{ConversationState, PipelineContext, PipelineError, PipelineStage};

pub const NO_ANSWER_FALLBACK: &str = "No direct answer found.";

/// Ask the search provider for a direct answer. Provider failures are
/// returned as apologetic text, never as an error.
pub async fn search_answer(search: &dyn SearchProvider, question: &str) -> String {
    tracing::info!(provider = search.name(), query = %question, "calling search API");

    let req = SearchRequest::new(question)
        .depth(SearchDepth::Advanced)
        .with_answer();

    match search.search(&req).await {
        Ok(resp) => {
            tracing::info!(provider = search.name(), "search API call successful");
            resp.answer.unwrap_or_else(|| NO_ANSWER_FALLBACK.to_string())
        }
        Err(e) => {
            let error_message = format!("{} API Error: {e}", search.name());
            tracing::error!(query = %question, error = %error_message, "search API call failed");
            format!("Error getting information: {error_message}")
        }
    }
}

/// Narrate the query results, or fall back to web search for general
/// questions. The caller appends the returned text to the conversation.
pub async fn interpret_results(
    ctx: &PipelineContext,
    state: &ConversationState,
) -> Result<String, PipelineError> {
    if !state.is_db_related() {
        let answer = search_answer(ctx.search.as_ref(), state.question()).await;
        tracing::info!("non-DB query - search response used");
        return Ok(answer);
    }

    let stage = PipelineStage::Interpret;
    let instructions =
        prompts::interpreter_instructions(state.messages(), state.sql_query(), state.results());

    let narration = ctx
        .completion
        .complete(&instructions, &[], stage.caller(), ctx.run_id)
        .await
        .map_err(|source| PipelineError::Completion { stage, source })?;

    tracing::info!("DB query - interpretation complete");
    Ok(narration)
}
