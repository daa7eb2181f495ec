use std::path::Path;

use anyhow::Result;
use rusqlite::types::Value;
use rusqlite::{Connection, OpenFlags, Row};

use crate::error::ExportError;

pub const DATABASE_FILENAME: &str = "writefreely.db";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Page,
    Post,
    Draft,
}

impl Category {
    /// Export order. Earlier categories win unsuffixed slugs.
    pub const ALL: [Category; 3] = [Self::Page, Self::Post, Self::Draft];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Page => "page",
            Self::Post => "post",
            Self::Draft => "draft",
        }
    }

    pub fn folder(self) -> &'static str {
        match self {
            Self::Page => "pages",
            Self::Post => "posts",
            Self::Draft => "drafts",
        }
    }

    fn query(self) -> &'static str {
        match self {
            Self::Page => {
                "SELECT id, slug, title, NULL AS created, content
                 FROM posts
                 WHERE pinned_position IS NOT NULL
                 ORDER BY pinned_position"
            }
            Self::Post => {
                "SELECT id, slug, title, created, content
                 FROM posts
                 WHERE pinned_position IS NULL AND slug IS NOT NULL
                 ORDER BY created DESC"
            }
            Self::Draft => {
                "SELECT id, slug, title, created, content
                 FROM posts
                 WHERE pinned_position IS NULL AND slug IS NULL
                 ORDER BY created DESC"
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentRow {
    pub id: i64,
    pub slug: Option<String>,
    pub title: Option<String>,
    pub created: Option<String>,
    pub content: String,
}

/// Rows for every category, in export order.
#[derive(Debug, Clone, Default)]
pub struct RowSet {
    pub pages: Vec<ContentRow>,
    pub posts: Vec<ContentRow>,
    pub drafts: Vec<ContentRow>,
}

impl RowSet {
    pub fn rows(&self, category: Category) -> &[ContentRow] {
        match category {
            Category::Page => &self.pages,
            Category::Post => &self.posts,
            Category::Draft => &self.drafts,
        }
    }

    pub fn total(&self) -> usize {
        self.pages.len() + self.posts.len() + self.drafts.len()
    }
}

/// Open the database read-only. The file must already exist.
pub fn open_row_source(db_path: &Path) -> Result<Connection> {
    if !db_path.is_file() {
        return Err(unavailable(db_path, "database file does not exist"));
    }
    Connection::open_with_flags(
        db_path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .map_err(|error| unavailable(db_path, error))
}

pub fn load_rows(connection: &Connection, db_path: &Path, category: Category) -> Result<Vec<ContentRow>> {
    let mut statement = connection
        .prepare(category.query())
        .map_err(|error| unavailable(db_path, error))?;
    let rows = statement
        .query_map([], read_row)
        .map_err(|error| unavailable(db_path, error))?;

    let mut out = Vec::new();
    for row in rows {
        out.push(row.map_err(|error| unavailable(db_path, error))?);
    }
    Ok(out)
}

/// Load all three categories up front so a query failure aborts before any
/// output is produced.
pub fn load_row_set(db_path: &Path) -> Result<RowSet> {
    let connection = open_row_source(db_path)?;
    Ok(RowSet {
        pages: load_rows(&connection, db_path, Category::Page)?,
        posts: load_rows(&connection, db_path, Category::Post)?,
        drafts: load_rows(&connection, db_path, Category::Draft)?,
    })
}

fn read_row(row: &Row<'_>) -> rusqlite::Result<ContentRow> {
    Ok(ContentRow {
        id: row.get(0)?,
        slug: text_column(row, 1)?,
        title: text_column(row, 2)?,
        created: text_column(row, 3)?,
        content: text_column(row, 4)?.unwrap_or_default(),
    })
}

// SQLite columns are loosely typed; timestamps in particular may be stored as
// TEXT or as numbers depending on the writer.
fn text_column(row: &Row<'_>, index: usize) -> rusqlite::Result<Option<String>> {
    Ok(match row.get::<_, Value>(index)? {
        Value::Null => None,
        Value::Integer(value) => Some(value.to_string()),
        Value::Real(value) => Some(value.to_string()),
        Value::Text(value) => Some(value),
        Value::Blob(bytes) => Some(String::from_utf8_lossy(&bytes).into_owned()),
    })
}

fn unavailable(db_path: &Path, detail: impl ToString) -> anyhow::Error {
    ExportError::RowSourceUnavailable {
        path: db_path.to_path_buf(),
        detail: detail.to_string(),
    }
    .into()
}
