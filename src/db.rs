//! Record retrieval from a Calibre `metadata.db` and from spreadsheet catalogs.

use crate::models::{LibraryStats, Record};
use calamine::{open_workbook, Data, Reader, Xlsx};
use rusqlite::{Connection, OpenFlags};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Excel XLSX error: {0}")]
    ExcelXlsx(#[from] calamine::XlsxError),
    #[error("No metadata.db found at {0}")]
    MissingMetadataDb(PathBuf),
}

/// Name of Calibre's catalog database inside a library directory
pub const METADATA_DB: &str = "metadata.db";

/// Accept either a library directory or a direct path to its database.
pub fn resolve_metadata_db(path: &Path) -> Result<PathBuf, DbError> {
    let db_path = if path.is_dir() {
        path.join(METADATA_DB)
    } else {
        path.to_path_buf()
    };

    if !db_path.is_file() {
        return Err(DbError::MissingMetadataDb(db_path));
    }
    Ok(db_path)
}

/// Open a Calibre database read-only so a running Calibre is never disturbed.
pub fn open_library(db_path: &Path) -> Result<Connection, DbError> {
    let conn = Connection::open_with_flags(
        db_path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )?;
    Ok(conn)
}

/// Load every book as a record, ordered by book id.
pub fn load_records(db_path: &Path) -> Result<Vec<Record>, DbError> {
    let conn = open_library(db_path)?;
    load_records_from_conn(&conn, None)
}

/// Load a single book, or `None` when the id does not exist.
pub fn load_record(db_path: &Path, book_id: u64) -> Result<Option<Record>, DbError> {
    let conn = open_library(db_path)?;
    let mut records = load_records_from_conn(&conn, Some(book_id))?;
    Ok(records.pop())
}

/// Build records from the Calibre schema.
///
/// Authors are joined with `" & "` in link order, identifiers rendered as
/// `"type:val, type:val"`, formats as `"<book path>/<name>.<ext>"` joined
/// with `", "`. `book_id` restricts the load to one book.
pub fn load_records_from_conn(
    conn: &Connection,
    book_id: Option<u64>,
) -> Result<Vec<Record>, DbError> {
    let filter = book_id.map(|id| id as i64);

    let authors = load_joined(
        conn,
        "SELECT bal.book, a.name
         FROM books_authors_link bal
         JOIN authors a ON a.id = bal.author
         WHERE (?1 IS NULL OR bal.book = ?1)
         ORDER BY bal.id",
        filter,
    )?;

    let identifiers = load_joined(
        conn,
        "SELECT book, type || ':' || val
         FROM identifiers
         WHERE (?1 IS NULL OR book = ?1)
         ORDER BY id",
        filter,
    )?;

    let formats = load_joined(
        conn,
        "SELECT d.book, b.path || '/' || d.name || '.' || LOWER(d.format)
         FROM data d
         JOIN books b ON b.id = d.book
         WHERE (?1 IS NULL OR d.book = ?1)
         ORDER BY d.id",
        filter,
    )?;

    let mut stmt = conn.prepare(
        "SELECT id, title
         FROM books
         WHERE (?1 IS NULL OR id = ?1)
         ORDER BY id",
    )?;
    let mut rows = stmt.query([filter])?;

    let mut records = Vec::new();
    while let Some(row) = rows.next()? {
        let id: i64 = row.get(0)?;
        let title: Option<String> = row.get(1)?;

        let join = |map: &HashMap<i64, Vec<String>>, sep: &str| map.get(&id).map(|v| v.join(sep));

        records.push(Record {
            id: id as u64,
            title: title.unwrap_or_default(),
            authors: join(&authors, " & ").unwrap_or_default(),
            identifiers: join(&identifiers, ", "),
            formats: join(&formats, ", "),
        });
    }

    debug!(records = records.len(), "loaded records from metadata.db");
    Ok(records)
}

/// Run a `(book, value)` query and collect values per book in row order.
fn load_joined(
    conn: &Connection,
    sql: &str,
    filter: Option<i64>,
) -> Result<HashMap<i64, Vec<String>>, DbError> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query([filter])?;

    let mut values: HashMap<i64, Vec<String>> = HashMap::new();
    while let Some(row) = rows.next()? {
        let book: i64 = row.get(0)?;
        let value: Option<String> = row.get(1)?;
        if let Some(value) = value {
            values.entry(book).or_default().push(value);
        }
    }

    Ok(values)
}

/// Load library statistics
pub fn load_library_stats(db_path: &Path) -> Result<LibraryStats, DbError> {
    let conn = open_library(db_path)?;
    load_library_stats_from_conn(&conn)
}

pub fn load_library_stats_from_conn(conn: &Connection) -> Result<LibraryStats, DbError> {
    let count = |sql: &str| -> Result<u64, rusqlite::Error> {
        conn.query_row(sql, [], |row| row.get::<_, i64>(0))
            .map(|n| n as u64)
    };

    Ok(LibraryStats {
        total_books: count("SELECT COUNT(*) FROM books")?,
        total_authors: count("SELECT COUNT(*) FROM authors")?,
        books_with_identifiers: count("SELECT COUNT(DISTINCT book) FROM identifiers")?,
        total_identifiers: count("SELECT COUNT(*) FROM identifiers")?,
        total_formats: count("SELECT COUNT(*) FROM data")?,
    })
}

/// Load records from the first sheet of an `.xlsx` catalog.
///
/// The header row is matched by column name; rows without a whole,
/// non-negative id are skipped. Zero and repeated ids are left for the
/// caller to reject.
pub fn load_records_from_excel(excel_path: &Path) -> Result<Vec<Record>, DbError> {
    let mut workbook: Xlsx<_> = open_workbook(excel_path)?;
    let mut records = Vec::new();

    let Some(sheet_name) = workbook.sheet_names().first().cloned() else {
        return Ok(records);
    };
    let range = workbook.worksheet_range(&sheet_name)?;
    let mut rows = range.rows();

    let Some(header) = rows.next() else {
        return Ok(records);
    };
    let col_indices = find_column_indices(header);

    for row in rows {
        if let Some(record) = record_from_row(row, &col_indices) {
            records.push(record);
        }
    }

    debug!(records = records.len(), sheet = %sheet_name, "loaded records from spreadsheet");
    Ok(records)
}

/// Column indices for a spreadsheet catalog
#[derive(Debug, Default)]
struct ColumnIndices {
    id: Option<usize>,
    title: Option<usize>,
    authors: Option<usize>,
    identifiers: Option<usize>,
    formats: Option<usize>,
}

fn find_column_indices(header: &[Data]) -> ColumnIndices {
    let mut indices = ColumnIndices::default();

    for (i, cell) in header.iter().enumerate() {
        if let Data::String(s) = cell {
            match s.trim().to_lowercase().as_str() {
                "id" | "book_id" => indices.id = Some(i),
                "title" => indices.title = Some(i),
                "authors" | "author" => indices.authors = Some(i),
                "identifiers" => indices.identifiers = Some(i),
                "formats" => indices.formats = Some(i),
                _ => {}
            }
        }
    }

    indices
}

fn record_from_row(row: &[Data], cols: &ColumnIndices) -> Option<Record> {
    let id = get_u64_cell(row, cols.id)?;
    let non_empty = |s: String| if s.trim().is_empty() { None } else { Some(s) };

    Some(Record {
        id,
        title: get_string_cell(row, cols.title).unwrap_or_default(),
        authors: get_string_cell(row, cols.authors).unwrap_or_default(),
        identifiers: get_string_cell(row, cols.identifiers).and_then(non_empty),
        formats: get_string_cell(row, cols.formats).and_then(non_empty),
    })
}

fn get_string_cell(row: &[Data], col: Option<usize>) -> Option<String> {
    col.and_then(|i| row.get(i)).and_then(|cell| match cell {
        Data::String(s) => Some(s.clone()),
        Data::Int(n) => Some(n.to_string()),
        Data::Float(n) => Some(n.to_string()),
        _ => None,
    })
}

fn get_u64_cell(row: &[Data], col: Option<usize>) -> Option<u64> {
    col.and_then(|i| row.get(i)).and_then(|cell| match cell {
        Data::Int(n) if *n >= 0 => Some(*n as u64),
        Data::Float(n) if *n >= 0.0 && n.fract() == 0.0 => Some(*n as u64),
        Data::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}
