//! Run the generated SQL and turn the outcome into text.
//!
//! Failures never leave this stage: they become the results text so the
//! interpreter can still explain what happened.

use crate::database::{Database, ResultTable};

use super::{ConversationState, PipelineContext};

pub const EXECUTION_ERROR_PREFIX: &str = "Error executing query: ";

#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutcome {
    Rows(ResultTable),
    Failed { message: String },
}

impl QueryOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, QueryOutcome::Failed { .. })
    }

    pub fn to_results_text(&self) -> String {
        match self {
            QueryOutcome::Rows(table) => table.to_text(),
            QueryOutcome::Failed { message } => format!("{EXECUTION_ERROR_PREFIX}{message}"),
        }
    }
}

/// Execute `sql` on a scoped connection and capture either the rows or the
/// driver's error message.
pub async fn run_query(db: &dyn Database, sql: &str) -> QueryOutcome {
    tracing::info!(sql = %sql, "executing SQL query");

    match db.run_query(sql).await {
        Ok(table) => {
            let (rows, columns) = table.shape();
            tracing::info!(rows, columns, "query execution successful");
            QueryOutcome::Rows(table)
        }
        Err(e) => {
            let outcome = QueryOutcome::Failed {
                message: e.to_string(),
            };
            tracing::error!(
                sql = %sql,
                error = %outcome.to_results_text(),
                "query execution failed"
            );
            outcome
        }
    }
}

/// Passthrough unless the question was classified as database-related.
pub async fn execute_query(ctx: &PipelineContext, state: ConversationState) -> ConversationState {
    if !state.is_db_related() {
        return state;
    }

    let outcome = run_query(ctx.database.as_ref(), state.sql_query()).await;
    let results = outcome.to_results_text();
    state.with_results(results)
}
