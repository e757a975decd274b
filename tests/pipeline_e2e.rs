use std::collections::VecDeque;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use insights_desk::database::{ColumnInfo, Database, DatabaseError, ResultTable, SqlDialect};
use insights_desk::gateway::{
    ChatGateway, ChatModel, ChatRequest, ChatResponse, ProviderError, Role,
};
use insights_desk::pipeline::{ConversationState, PipelineError, PipelineStage, QueryAgent};
use insights_desk::search::{
    SearchDepth, SearchError, SearchProvider, SearchRequest, SearchResponse,
};
use insights_desk::{CompletionClient, SqliteDatabase};
use tempfile::TempDir;

// =============================================================================
// Fakes
// =============================================================================

/// Replies from a fixed script, one per call, recording every request.
struct ScriptedGateway {
    replies: Mutex<VecDeque<Result<String, ProviderError>>>,
    seen: Mutex<Vec<ChatRequest>>,
}

impl ScriptedGateway {
    fn new(replies: Vec<Result<String, ProviderError>>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            seen: Mutex::new(Vec::new()),
        })
    }

    fn replying(texts: &[&str]) -> Arc<Self> {
        Self::new(texts.iter().map(|t| Ok(t.to_string())).collect())
    }

    fn requests(&self) -> Vec<ChatRequest> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatGateway for ScriptedGateway {
    async fn chat(&self, req: ChatRequest) -> Result<ChatResponse, ProviderError> {
        self.seen.lock().unwrap().push(req);
        let next = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .expect("gateway called more times than scripted");
        next.map(ChatResponse::text)
    }
}

enum SearchScript {
    Answer(Option<String>),
    Fail(u16, String),
}

struct FakeSearch {
    script: SearchScript,
    seen: Mutex<Vec<SearchRequest>>,
}

impl FakeSearch {
    fn new(script: SearchScript) -> Arc<Self> {
        Arc::new(Self {
            script,
            seen: Mutex::new(Vec::new()),
        })
    }

    fn answering(text: &str) -> Arc<Self> {
        Self::new(SearchScript::Answer(Some(text.to_string())))
    }

    fn requests(&self) -> Vec<SearchRequest> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl SearchProvider for FakeSearch {
    fn name(&self) -> &'static str {
        "Tavily"
    }

    async fn search(&self, req: &SearchRequest) -> Result<SearchResponse, SearchError> {
        self.seen.lock().unwrap().push(req.clone());
        match &self.script {
            SearchScript::Answer(answer) => Ok(SearchResponse {
                answer: answer.clone(),
                results: Vec::new(),
            }),
            SearchScript::Fail(status, message) => Err(SearchError::Api {
                status: *status,
                message: message.clone(),
            }),
        }
    }
}

/// A database whose catalog cannot be reached.
struct UnreachableDatabase;

#[async_trait]
impl Database for UnreachableDatabase {
    fn dialect(&self) -> SqlDialect {
        SqlDialect::Postgres
    }

    async fn list_tables(&self) -> Result<Vec<String>, DatabaseError> {
        Err(DatabaseError::Config("connection refused".into()))
    }

    async fn list_columns(&self, _table: &str) -> Result<Vec<ColumnInfo>, DatabaseError> {
        Err(DatabaseError::Config("connection refused".into()))
    }

    async fn run_query(&self, _sql: &str) -> Result<ResultTable, DatabaseError> {
        Err(DatabaseError::Config("connection refused".into()))
    }
}

// =============================================================================
// Fixtures
// =============================================================================

fn products_db() -> (TempDir, Arc<SqliteDatabase>) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("shop.sqlite");
    seed(&path);
    let db = Arc::new(SqliteDatabase::new(&path));
    (dir, db)
}

fn seed(path: &Path) {
    let conn = rusqlite::Connection::open(path).unwrap();
    conn.execute_batch(
        "CREATE TABLE products (
             id INTEGER PRIMARY KEY,
             product_name TEXT NOT NULL,
             barcode TEXT
         );
         INSERT INTO products (product_name, barcode) VALUES ('Hat', '123456'), ('Scarf', '654321');",
    )
    .unwrap();
}

fn agent(
    gateway: Arc<ScriptedGateway>,
    database: Arc<dyn Database>,
    search: Arc<FakeSearch>,
) -> QueryAgent {
    let completion = CompletionClient::new(gateway, ChatModel::openai("gpt-4-turbo-preview"));
    QueryAgent::new(completion, database, search)
}

const BARCODE_SQL: &str = "SELECT barcode FROM products WHERE product_name = 'Hat'";

// =============================================================================
// Scenarios
// =============================================================================

#[tokio::test]
async fn database_question_runs_all_four_stages() {
    let (_dir, db) = products_db();
    let gateway = ScriptedGateway::replying(&["true", BARCODE_SQL, "The barcode of Hat is 123456."]);
    let search = FakeSearch::answering("unused");
    let agent = agent(gateway.clone(), db, search.clone());

    let state = agent
        .run(ConversationState::new("What is the barcode of Hat?"))
        .await
        .unwrap();

    assert!(state.is_db_related());
    assert_eq!(state.sql_query(), BARCODE_SQL);
    assert_eq!(state.results(), "   barcode\n0   123456");
    assert_eq!(state.messages().len(), 2);
    assert_eq!(state.reply(), Some("The barcode of Hat is 123456."));
    assert!(search.requests().is_empty());

    let requests = gateway.requests();
    let callers: Vec<&str> = requests.iter().map(|r| r.attribution.caller).collect();
    assert_eq!(
        callers,
        [
            PipelineStage::Classify.caller(),
            PipelineStage::GenerateQuery.caller(),
            PipelineStage::Interpret.caller(),
        ]
    );

    // Classifier and generator see the schema plus the question.
    for req in &requests[..2] {
        assert_eq!(req.messages.len(), 2);
        assert_eq!(req.messages[0].role, Role::System);
        assert!(req.messages[0]
            .content
            .contains("Table: products\nColumns: id (INTEGER), product_name (TEXT), barcode (TEXT)"));
        assert_eq!(req.messages[1].content, "What is the barcode of Hat?");
    }
    assert!(requests[1].messages[0].content.contains("using SQLite syntax"));

    // Interpreter gets a single system instruction carrying question, query and rows.
    let interpret = &requests[2];
    assert_eq!(interpret.messages.len(), 1);
    let instructions = &interpret.messages[0].content;
    assert!(instructions.contains("Original question: user: What is the barcode of Hat?"));
    assert!(instructions.contains(&format!("SQL Query used: {BARCODE_SQL}")));
    assert!(instructions.contains("Query results:    barcode\n0   123456"));

    // Every call in one run shares a run id.
    let run_id = requests[0].attribution.run_id.expect("run id set");
    assert!(requests.iter().all(|r| r.attribution.run_id == Some(run_id)));
}

#[tokio::test]
async fn general_question_is_answered_by_search() {
    let (_dir, db) = products_db();
    let gateway = ScriptedGateway::replying(&["false"]);
    let search = FakeSearch::answering("Paris is the capital of France.");
    let agent = agent(gateway.clone(), db, search.clone());

    let state = agent
        .run(ConversationState::new("What is the capital of France?"))
        .await
        .unwrap();

    assert!(!state.is_db_related());
    assert_eq!(state.sql_query(), "");
    assert_eq!(state.results(), "");
    assert_eq!(state.reply(), Some("Paris is the capital of France."));
    assert_eq!(gateway.requests().len(), 1);

    let searches = search.requests();
    assert_eq!(searches.len(), 1);
    assert_eq!(searches[0].query, "What is the capital of France?");
    assert_eq!(searches[0].depth, SearchDepth::Advanced);
    assert!(searches[0].include_answer);
}

#[tokio::test]
async fn padded_mixed_case_true_counts_as_database_question() {
    let (_dir, db) = products_db();
    let gateway = ScriptedGateway::replying(&[" True \n", BARCODE_SQL, "123456"]);
    let agent = agent(gateway, db, FakeSearch::answering("unused"));

    let state = agent
        .run(ConversationState::new("barcode of Hat?"))
        .await
        .unwrap();
    assert!(state.is_db_related());
    assert_eq!(state.reply(), Some("123456"));
}

#[tokio::test]
async fn malformed_classification_falls_back_to_search() {
    let (_dir, db) = products_db();
    let gateway = ScriptedGateway::replying(&["Yes, this needs the database."]);
    let search = FakeSearch::answering("An answer from the web.");
    let agent = agent(gateway.clone(), db, search.clone());

    let answer = agent.process_question("How many hats?").await.unwrap();
    assert_eq!(answer, "An answer from the web.");
    assert_eq!(gateway.requests().len(), 1);
    assert_eq!(search.requests().len(), 1);
}

#[tokio::test]
async fn invalid_sql_becomes_results_text_and_is_narrated() {
    let (_dir, db) = products_db();
    let gateway = ScriptedGateway::replying(&[
        "true",
        "SELEC barcode FROM products",
        "Sorry, I could not look that up.",
    ]);
    let agent = agent(gateway.clone(), db, FakeSearch::answering("unused"));

    let state = agent
        .run(ConversationState::new("What is the barcode of Hat?"))
        .await
        .unwrap();

    assert!(state.results().starts_with("Error executing query: "));
    assert!(state.results().contains("syntax error"));
    assert_eq!(state.reply(), Some("Sorry, I could not look that up."));

    let interpret = &gateway.requests()[2];
    assert!(interpret.messages[0]
        .content
        .contains(&format!("Query results: {}", state.results())));
}

#[tokio::test]
async fn generated_text_is_executed_verbatim() {
    let (_dir, db) = products_db();
    let fenced = "```sql\nSELECT barcode FROM products;\n```";
    let gateway = ScriptedGateway::replying(&["true", fenced, "It did not work."]);
    let agent = agent(gateway, db, FakeSearch::answering("unused"));

    let state = agent
        .run(ConversationState::new("barcodes?"))
        .await
        .unwrap();

    assert_eq!(state.sql_query(), fenced);
    assert!(state.results().starts_with("Error executing query: "));
}

#[tokio::test]
async fn stacked_statements_are_refused_whole() {
    let (_dir, db) = products_db();
    let gateway = ScriptedGateway::replying(&[
        "true",
        "SELECT barcode FROM products; DELETE FROM products",
        "That query could not run.",
    ]);
    let agent = agent(gateway, db.clone(), FakeSearch::answering("unused"));

    let state = agent
        .run(ConversationState::new("barcodes?"))
        .await
        .unwrap();

    assert_eq!(
        state.results(),
        "Error executing query: expected exactly one SQL statement, found more than one"
    );
    let left = db
        .run_query("SELECT COUNT(*) AS n FROM products")
        .await
        .unwrap();
    assert_eq!(left.to_text(), "   n\n0  2");
}

#[tokio::test]
async fn empty_search_answer_uses_fallback_text() {
    let (_dir, db) = products_db();
    let gateway = ScriptedGateway::replying(&["false"]);
    let agent = agent(gateway, db, FakeSearch::new(SearchScript::Answer(None)));

    let answer = agent.process_question("Who won in 1066?").await.unwrap();
    assert_eq!(answer, "No direct answer found.");
}

#[tokio::test]
async fn search_failure_becomes_apologetic_answer() {
    let (_dir, db) = products_db();
    let gateway = ScriptedGateway::replying(&["false"]);
    let search = FakeSearch::new(SearchScript::Fail(500, "upstream down".into()));
    let agent = agent(gateway, db, search);

    let answer = agent.process_question("Who won in 1066?").await.unwrap();
    assert_eq!(
        answer,
        "Error getting information: Tavily API Error: HTTP 500: upstream down"
    );
}

#[tokio::test]
async fn schema_failure_aborts_the_run() {
    let gateway = ScriptedGateway::replying(&[]);
    let agent = agent(
        gateway.clone(),
        Arc::new(UnreachableDatabase),
        FakeSearch::answering("unused"),
    );

    let err = agent.process_question("How many hats?").await.unwrap_err();
    match &err {
        PipelineError::Schema { stage, source } => {
            assert_eq!(*stage, PipelineStage::Classify);
            assert_eq!(source.to_string(), "configuration error: connection refused");
        }
        other => panic!("expected schema error, got {other:?}"),
    }
    assert_eq!(err.stage(), Some(PipelineStage::Classify));
    assert!(gateway.requests().is_empty());
}

#[tokio::test]
async fn completion_failure_aborts_the_run() {
    let (_dir, db) = products_db();
    let gateway = ScriptedGateway::new(vec![Err(ProviderError::provider(
        "openai",
        "model overloaded",
        true,
    ))]);
    let search = FakeSearch::answering("unused");
    let agent = agent(gateway, db, search.clone());

    let err = agent.process_question("How many hats?").await.unwrap_err();
    assert!(matches!(
        err,
        PipelineError::Completion {
            stage: PipelineStage::Classify,
            ..
        }
    ));
    assert!(search.requests().is_empty());
}

#[tokio::test]
async fn narration_failure_is_fatal_even_after_execution() {
    let (_dir, db) = products_db();
    let gateway = ScriptedGateway::new(vec![
        Ok("true".into()),
        Ok(BARCODE_SQL.into()),
        Err(ProviderError::config("OPENAI_API_KEY not set")),
    ]);
    let agent = agent(gateway, db, FakeSearch::answering("unused"));

    let err = agent.process_question("What is the barcode of Hat?").await.unwrap_err();
    assert_eq!(err.stage(), Some(PipelineStage::Interpret));
}

#[tokio::test]
async fn empty_question_is_rejected_before_any_call() {
    let (_dir, db) = products_db();
    let gateway = ScriptedGateway::replying(&[]);
    let agent = agent(gateway.clone(), db, FakeSearch::answering("unused"));

    let err = agent.process_question("   ").await.unwrap_err();
    assert!(matches!(err, PipelineError::InvalidRequest(_)));
    assert!(gateway.requests().is_empty());
}

#[tokio::test]
async fn each_question_starts_from_a_fresh_state() {
    let (_dir, db) = products_db();
    let gateway = ScriptedGateway::replying(&["false", "false"]);
    let agent = agent(gateway.clone(), db, FakeSearch::answering("web"));

    agent.process_question("first question").await.unwrap();
    agent.process_question("second question").await.unwrap();

    let requests = gateway.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[1].messages.len(), 2);
    assert_eq!(requests[1].messages[1].content, "second question");
    assert_ne!(
        requests[0].attribution.run_id,
        requests[1].attribution.run_id
    );
}
