//! Textual schema description fed to the classifier and query generator.
//!
//! The description is rebuilt from live catalog introspection on every call;
//! nothing is cached.

use crate::database::{ColumnInfo, Database, DatabaseError};

/// One table's catalog entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<ColumnInfo>,
}

/// Introspect `db` and render every table as
/// `Table: <name>\nColumns: <col> (<type>), ...`, blocks separated by a blank line.
pub async fn describe_schema(db: &dyn Database) -> Result<String, DatabaseError> {
    let tables = inspect(db).await?;
    Ok(render_schema(&tables))
}

pub async fn inspect(db: &dyn Database) -> Result<Vec<TableSchema>, DatabaseError> {
    let mut tables = Vec::new();
    for name in db.list_tables().await? {
        let columns = db.list_columns(&name).await?;
        tables.push(TableSchema { name, columns });
    }
    Ok(tables)
}

pub fn render_schema(tables: &[TableSchema]) -> String {
    tables
        .iter()
        .map(|table| {
            let columns = table
                .columns
                .iter()
                .map(|c| format!("{} ({})", c.name, c.data_type))
                .collect::<Vec<_>>()
                .join(", ");
            format!("Table: {}\nColumns: {}", table.name, columns)
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}
