//! Generate one SQL statement for a database-related question.

use crate::prompts;
use crate::schema::describe_schema;

use super::{ConversationState, PipelineContext, PipelineError, PipelineStage};

/// Passthrough unless the question was classified as database-related.
/// The model's reply is stored verbatim; bad SQL surfaces at execution.
pub async fn generate_query(
    ctx: &PipelineContext,
    state: ConversationState,
) -> Result<ConversationState, PipelineError> {
    if !state.is_db_related() {
        return Ok(state);
    }

    let stage = PipelineStage::GenerateQuery;

    let schema = describe_schema(ctx.database.as_ref())
        .await
        .map_err(|source| PipelineError::Schema { stage, source })?;

    let instructions =
        prompts::query_generator_instructions(&schema, ctx.database.dialect().display_name());

    let query = ctx
        .completion
        .complete(&instructions, state.messages(), stage.caller(), ctx.run_id)
        .await
        .map_err(|source| PipelineError::Completion { stage, source })?;

    tracing::info!(sql = %query, "generated SQL query");

    Ok(state.with_sql_query(query))
}
