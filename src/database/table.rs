//! In-memory query results and their text rendering.

use std::fmt;

use serde::Serialize;

use super::DatabaseError;

/// A single value in a result set.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Cell {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Bool(bool),
    Blob(Vec<u8>),
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Null => f.write_str("NULL"),
            Cell::Integer(v) => write!(f, "{v}"),
            Cell::Real(v) => write!(f, "{v}"),
            Cell::Text(v) => f.write_str(v),
            Cell::Bool(v) => write!(f, "{v}"),
            Cell::Blob(v) => write!(f, "<{} bytes>", v.len()),
        }
    }
}

/// A column as declared in the database catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnInfo {
    pub name: String,
    pub data_type: String,
}

impl ColumnInfo {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
        }
    }
}

/// One message of a statement's response stream, reduced to what a
/// [`ResultTable`] needs.
#[derive(Debug, Clone, PartialEq)]
pub enum StatementEvent {
    Columns(Vec<String>),
    Row(Vec<Cell>),
    Complete,
}

/// Fully materialized result set.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResultTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl ResultTable {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Cell>>) -> Self {
        Self { columns, rows }
    }

    /// Build the table for exactly one statement. A second column header or
    /// completion means the text held several statements; no completion at
    /// all means it held none.
    pub fn from_events(
        events: impl IntoIterator<Item = StatementEvent>,
    ) -> Result<Self, DatabaseError> {
        let mut columns: Option<Vec<String>> = None;
        let mut rows = Vec::new();
        let mut completed = false;

        for event in events {
            if completed {
                return Err(DatabaseError::MultipleStatements);
            }
            match event {
                StatementEvent::Columns(names) => {
                    if columns.is_some() {
                        return Err(DatabaseError::MultipleStatements);
                    }
                    columns = Some(names);
                }
                StatementEvent::Row(cells) => rows.push(cells),
                StatementEvent::Complete => completed = true,
            }
        }

        if !completed {
            return Err(DatabaseError::EmptyStatement);
        }
        Ok(Self::new(columns.unwrap_or_default(), rows))
    }

    /// `(rows, columns)`.
    pub fn shape(&self) -> (usize, usize) {
        (self.rows.len(), self.columns.len())
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Render as aligned text: a row-index column, then one right-aligned
    /// column per result column under a header line.
    pub fn to_text(&self) -> String {
        if self.is_empty() {
            return format!("Empty result\nColumns: [{}]", self.columns.join(", "));
        }

        let rendered: Vec<Vec<String>> = self
            .rows
            .iter()
            .map(|row| {
                (0..self.columns.len())
                    .map(|i| row.get(i).map(|c| c.to_string()).unwrap_or_default())
                    .collect()
            })
            .collect();

        let index_width = (self.rows.len() - 1).to_string().len();
        let widths: Vec<usize> = self
            .columns
            .iter()
            .enumerate()
            .map(|(i, name)| {
                rendered
                    .iter()
                    .map(|row| row[i].chars().count())
                    .chain(std::iter::once(name.chars().count()))
                    .max()
                    .unwrap_or(0)
            })
            .collect();

        let mut lines = Vec::with_capacity(self.rows.len() + 1);

        let mut header = " ".repeat(index_width);
        for (name, width) in self.columns.iter().zip(&widths) {
            header.push_str("  ");
            header.push_str(&pad_left(name, *width));
        }
        lines.push(header);

        for (idx, row) in rendered.iter().enumerate() {
            let mut line = format!("{idx:<index_width$}");
            for (value, width) in row.iter().zip(&widths) {
                line.push_str("  ");
                line.push_str(&pad_left(value, *width));
            }
            lines.push(line);
        }

        lines
            .into_iter()
            .map(|l| l.trim_end().to_string())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

fn pad_left(value: &str, width: usize) -> String {
    let len = value.chars().count();
    if len >= width {
        value.to_string()
    } else {
        format!("{}{}", " ".repeat(width - len), value)
    }
}
