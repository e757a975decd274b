//! PostgreSQL backend (feature `postgres`).

use async_trait::async_trait;
use tokio_postgres::{Client, Config, NoTls, SimpleQueryMessage};

use super::{
    Cell, ColumnInfo, Database, DatabaseError, PostgresSettings, ResultTable, SqlDialect,
    StatementEvent,
};

#[derive(Debug, Clone)]
pub struct PostgresDatabase {
    settings: PostgresSettings,
}

impl PostgresDatabase {
    pub fn new(settings: PostgresSettings) -> Self {
        Self { settings }
    }

    fn config(&self) -> Config {
        let mut config = Config::new();
        config
            .host(&self.settings.host)
            .port(self.settings.port)
            .user(&self.settings.user)
            .password(&self.settings.password)
            .dbname(&self.settings.database);
        config
    }

    /// Connect, run `f`, then drop the client; the connection task ends when
    /// the client goes away.
    async fn with_client<R, F, Fut>(&self, f: F) -> Result<R, DatabaseError>
    where
        F: FnOnce(Client) -> Fut,
        Fut: std::future::Future<Output = Result<R, DatabaseError>>,
    {
        let (client, connection) = self.config().connect(NoTls).await?;
        let driver = tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::warn!(error = %e, "postgres connection closed with error");
            }
        });
        let result = f(client).await;
        // client dropped inside `f`; wait for the socket to close
        if let Err(e) = driver.await {
            tracing::warn!(error = %e, "postgres connection task failed");
        }
        result
    }
}

#[async_trait]
impl Database for PostgresDatabase {
    fn dialect(&self) -> SqlDialect {
        SqlDialect::Postgres
    }

    async fn list_tables(&self) -> Result<Vec<String>, DatabaseError> {
        self.with_client(|client| async move {
            let rows = client
                .query(
                    "SELECT table_name::text FROM information_schema.tables \
                     WHERE table_schema = 'public' AND table_type = 'BASE TABLE' \
                     ORDER BY table_name",
                    &[],
                )
                .await?;
            Ok(rows.iter().map(|row| row.get::<_, String>(0)).collect())
        })
        .await
    }

    async fn list_columns(&self, table: &str) -> Result<Vec<ColumnInfo>, DatabaseError> {
        let table = table.to_string();
        self.with_client(|client| async move {
            let rows = client
                .query(
                    "SELECT column_name::text, data_type::text FROM information_schema.columns \
                     WHERE table_schema = 'public' AND table_name = $1 \
                     ORDER BY ordinal_position",
                    &[&table],
                )
                .await?;
            Ok(rows
                .iter()
                .map(|row| {
                    ColumnInfo::new(
                        row.get::<_, String>(0),
                        row.get::<_, String>(1).to_uppercase(),
                    )
                })
                .collect())
        })
        .await
    }

    async fn run_query(&self, sql: &str) -> Result<ResultTable, DatabaseError> {
        let sql = sql.to_string();
        if sql.trim().is_empty() {
            return Err(DatabaseError::EmptyStatement);
        }
        self.with_client(|client| async move {
            let messages = client.simple_query(&sql).await?;
            ResultTable::from_events(messages.into_iter().filter_map(statement_event))
        })
        .await
    }
}

fn statement_event(message: SimpleQueryMessage) -> Option<StatementEvent> {
    match message {
        SimpleQueryMessage::RowDescription(desc) => Some(StatementEvent::Columns(
            desc.iter().map(|c| c.name().to_string()).collect(),
        )),
        SimpleQueryMessage::Row(row) => Some(StatementEvent::Row(
            (0..row.len())
                .map(|idx| match row.get(idx) {
                    Some(text) => Cell::Text(text.to_string()),
                    None => Cell::Null,
                })
                .collect(),
        )),
        SimpleQueryMessage::CommandComplete(_) => Some(StatementEvent::Complete),
        _ => None,
    }
}
