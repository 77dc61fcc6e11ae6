//! Record sources feeding the duplicate scan.
//!
//! The grouping engine never performs I/O; everything it needs arrives
//! through a [`RecordSource`].

use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

use crate::db::{self, DbError};
use crate::models::{LibraryStats, Record};

#[derive(Error, Debug)]
pub enum SourceError {
    #[error(transparent)]
    Db(#[from] DbError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Unsupported record source: {0}")]
    UnsupportedSource(PathBuf),
    #[error("Record id must be a positive integer, got 0")]
    InvalidId,
    #[error("Duplicate record id: {0}")]
    DuplicateId(u64),
}

/// Where records come from.
///
/// `fetch_all_records` must preserve the backend's ordering, since greedy
/// grouping depends on it.
pub trait RecordSource {
    fn fetch_all_records(&self) -> Result<Vec<Record>, SourceError>;

    fn fetch_record_by_id(&self, id: u64) -> Result<Option<Record>, SourceError> {
        Ok(self.fetch_all_records()?.into_iter().find(|r| r.id == id))
    }

    /// Short human-readable name for progress and log output
    fn describe(&self) -> String;

    fn stats(&self) -> Result<LibraryStats, SourceError> {
        let records = self.fetch_all_records()?;
        Ok(stats_from_records(&records))
    }
}

/// A Calibre library read through its `metadata.db`
#[derive(Debug, Clone)]
pub struct CalibreLibrary {
    db_path: PathBuf,
}

impl CalibreLibrary {
    /// Open a library directory, or a direct path to `metadata.db`.
    pub fn open(path: &Path) -> Result<Self, SourceError> {
        let db_path = db::resolve_metadata_db(path)?;
        Ok(Self { db_path })
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }
}

impl RecordSource for CalibreLibrary {
    fn fetch_all_records(&self) -> Result<Vec<Record>, SourceError> {
        Ok(db::load_records(&self.db_path)?)
    }

    fn fetch_record_by_id(&self, id: u64) -> Result<Option<Record>, SourceError> {
        Ok(db::load_record(&self.db_path, id)?)
    }

    fn describe(&self) -> String {
        self.db_path.display().to_string()
    }

    fn stats(&self) -> Result<LibraryStats, SourceError> {
        Ok(db::load_library_stats(&self.db_path)?)
    }
}

/// A JSON array of records.
///
/// Accepts the plain record shape as well as Calibre's machine-readable
/// export, where `authors` and `formats` are arrays and `identifiers` is
/// an object.
#[derive(Debug, Clone)]
pub struct JsonCatalog {
    path: PathBuf,
}

impl JsonCatalog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl RecordSource for JsonCatalog {
    fn fetch_all_records(&self) -> Result<Vec<Record>, SourceError> {
        let reader = BufReader::new(File::open(&self.path)?);
        let records = parse_json_records(reader)?;
        check_record_ids(&records)?;
        debug!(records = records.len(), path = %self.path.display(), "loaded JSON catalog");
        Ok(records)
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// Parse a JSON array in either the plain or the Calibre export shape.
pub fn parse_json_records<R: std::io::Read>(reader: R) -> Result<Vec<Record>, serde_json::Error> {
    let raw: Vec<RawRecord> = serde_json::from_reader(reader)?;
    Ok(raw.into_iter().map(Record::from).collect())
}

#[derive(Debug, Deserialize)]
struct RawRecord {
    id: u64,
    #[serde(default)]
    title: String,
    #[serde(default)]
    authors: Option<TextOrList>,
    #[serde(default)]
    identifiers: Option<IdentifierField>,
    #[serde(default)]
    formats: Option<TextOrList>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TextOrList {
    Text(String),
    List(Vec<String>),
}

impl TextOrList {
    fn join(self, sep: &str) -> String {
        match self {
            TextOrList::Text(s) => s,
            TextOrList::List(items) => items.join(sep),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum IdentifierField {
    Text(String),
    Map(BTreeMap<String, String>),
}

impl From<RawRecord> for Record {
    fn from(raw: RawRecord) -> Self {
        let identifiers = raw.identifiers.map(|field| match field {
            IdentifierField::Text(s) => s,
            IdentifierField::Map(map) => map
                .into_iter()
                .map(|(scheme, value)| format!("{}:{}", scheme, value))
                .collect::<Vec<_>>()
                .join(", "),
        });

        Record {
            id: raw.id,
            title: raw.title,
            authors: raw.authors.map(|a| a.join(" & ")).unwrap_or_default(),
            identifiers: identifiers.filter(|s| !s.trim().is_empty()),
            formats: raw
                .formats
                .map(|f| f.join(", "))
                .filter(|s| !s.trim().is_empty()),
        }
    }
}

/// First sheet of an `.xlsx` catalog
#[derive(Debug, Clone)]
pub struct SpreadsheetCatalog {
    path: PathBuf,
}

impl SpreadsheetCatalog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl RecordSource for SpreadsheetCatalog {
    fn fetch_all_records(&self) -> Result<Vec<Record>, SourceError> {
        let records = db::load_records_from_excel(&self.path)?;
        check_record_ids(&records)?;
        Ok(records)
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// Records already resident in memory
#[derive(Debug, Clone, Default)]
pub struct InMemorySource {
    records: Vec<Record>,
}

impl InMemorySource {
    pub fn new(records: Vec<Record>) -> Self {
        Self { records }
    }
}

impl RecordSource for InMemorySource {
    fn fetch_all_records(&self) -> Result<Vec<Record>, SourceError> {
        Ok(self.records.clone())
    }

    fn fetch_record_by_id(&self, id: u64) -> Result<Option<Record>, SourceError> {
        Ok(self.records.iter().find(|r| r.id == id).cloned())
    }

    fn describe(&self) -> String {
        format!("{} in-memory records", self.records.len())
    }
}

/// Pick a source from a path: a directory or `.db` file is a Calibre
/// library, `.json` a JSON catalog, `.xlsx` a spreadsheet catalog.
pub fn open_source(path: &Path) -> Result<Box<dyn RecordSource>, SourceError> {
    if path.is_dir() {
        return Ok(Box::new(CalibreLibrary::open(path)?));
    }

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase());

    match extension.as_deref() {
        Some("db") | Some("sqlite") => Ok(Box::new(CalibreLibrary::open(path)?)),
        Some("json") => Ok(Box::new(JsonCatalog::new(path))),
        Some("xlsx") => Ok(Box::new(SpreadsheetCatalog::new(path))),
        _ => Err(SourceError::UnsupportedSource(path.to_path_buf())),
    }
}

/// Reject catalogs whose ids are zero or repeated.
///
/// Grouping tracks claimed records by id, so a repeated id would hide one
/// of the records it belongs to.
pub fn check_record_ids(records: &[Record]) -> Result<(), SourceError> {
    let mut seen = HashSet::with_capacity(records.len());
    for record in records {
        if record.id == 0 {
            return Err(SourceError::InvalidId);
        }
        if !seen.insert(record.id) {
            return Err(SourceError::DuplicateId(record.id));
        }
    }
    Ok(())
}

/// Statistics derivable from records alone
pub fn stats_from_records(records: &[Record]) -> LibraryStats {
    let mut authors: Vec<String> = records
        .iter()
        .flat_map(|r| r.authors.split('&').map(|a| a.trim().to_lowercase()))
        .filter(|a| !a.is_empty())
        .collect();
    authors.sort_unstable();
    authors.dedup();

    let identifier_counts: Vec<usize> = records
        .iter()
        .map(|r| crate::identifiers::parse_identifiers(r.identifiers.as_deref()).len())
        .collect();

    LibraryStats {
        total_books: records.len() as u64,
        total_authors: authors.len() as u64,
        books_with_identifiers: identifier_counts.iter().filter(|&&n| n > 0).count() as u64,
        total_identifiers: identifier_counts.iter().sum::<usize>() as u64,
        total_formats: records.iter().map(|r| r.format_list().len()).sum::<usize>() as u64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::tests::populate_calibre_fixture;
    use rusqlite::Connection;

    #[test]
    fn test_parse_plain_json() {
        let json = r#"[
            {"id": 1, "title": "The Hobbit", "authors": "J.R.R. Tolkien", "identifiers": "isbn:123"},
            {"id": 2, "title": "Dune", "authors": "Frank Herbert"}
        ]"#;
        let records = parse_json_records(json.as_bytes()).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].identifiers.as_deref(), Some("isbn:123"));
        assert_eq!(records[1], Record::new(2, "Dune", "Frank Herbert"));
    }

    #[test]
    fn test_parse_calibre_export_json() {
        let json = r#"[
            {
                "id": 7,
                "title": "Good Omens",
                "authors": ["Terry Pratchett", "Neil Gaiman"],
                "identifiers": {"isbn": "9780060853983", "amazon": "0060853980"},
                "formats": ["/lib/Good Omens.epub", "/lib/Good Omens.mobi"]
            }
        ]"#;
        let records = parse_json_records(json.as_bytes()).unwrap();
        let record = &records[0];
        assert_eq!(record.authors, "Terry Pratchett & Neil Gaiman");
        assert_eq!(
            record.identifiers.as_deref(),
            Some("amazon:0060853980, isbn:9780060853983")
        );
        assert_eq!(record.format_list(), vec!["/lib/Good Omens.epub", "/lib/Good Omens.mobi"]);
    }

    #[test]
    fn test_parse_json_empty_identifier_map() {
        let json = r#"[{"id": 3, "title": "Emma", "authors": "Jane Austen", "identifiers": {}}]"#;
        let records = parse_json_records(json.as_bytes()).unwrap();
        assert!(records[0].identifiers.is_none());
    }

    #[test]
    fn test_in_memory_source() {
        let source = InMemorySource::new(vec![
            Record::new(1, "Emma", "Jane Austen").with_identifiers("isbn:1"),
            Record::new(2, "Persuasion", "Jane Austen").with_formats("a.epub, a.pdf"),
        ]);
        assert_eq!(source.fetch_all_records().unwrap().len(), 2);
        assert_eq!(source.fetch_record_by_id(2).unwrap().unwrap().title, "Persuasion");
        assert!(source.fetch_record_by_id(3).unwrap().is_none());

        let stats = source.stats().unwrap();
        assert_eq!(stats.total_books, 2);
        assert_eq!(stats.total_authors, 1);
        assert_eq!(stats.books_with_identifiers, 1);
        assert_eq!(stats.total_identifiers, 1);
        assert_eq!(stats.total_formats, 2);
    }

    #[test]
    fn test_calibre_library_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        let conn = Connection::open(dir.path().join(db::METADATA_DB)).unwrap();
        populate_calibre_fixture(&conn);
        drop(conn);

        let source = open_source(dir.path()).unwrap();
        let records = source.fetch_all_records().unwrap();
        assert_eq!(records.len(), 4);

        let focal = source.fetch_record_by_id(3).unwrap().unwrap();
        assert_eq!(focal.authors, "Terry Pratchett & Neil Gaiman");
        assert!(source.fetch_record_by_id(42).unwrap().is_none());

        assert_eq!(source.stats().unwrap().total_formats, 2);
    }

    #[test]
    fn test_open_source_by_extension() {
        assert!(open_source(Path::new("catalog.json")).is_ok());
        assert!(open_source(Path::new("catalog.XLSX")).is_ok());
        assert!(matches!(
            open_source(Path::new("catalog.txt")),
            Err(SourceError::UnsupportedSource(_))
        ));
        assert!(matches!(
            open_source(Path::new("/nonexistent/metadata.db")),
            Err(SourceError::Db(DbError::MissingMetadataDb(_)))
        ));
    }

    #[test]
    fn test_check_record_ids() {
        let records = vec![Record::new(1, "Emma", "Jane Austen"), Record::new(2, "Emma", "")];
        assert!(check_record_ids(&records).is_ok());
        assert!(check_record_ids(&[]).is_ok());

        let repeated = vec![
            Record::new(3, "Dune", "Frank Herbert"),
            Record::new(4, "Emma", "Jane Austen"),
            Record::new(3, "Dune", "Frank Herbert"),
        ];
        assert!(matches!(
            check_record_ids(&repeated),
            Err(SourceError::DuplicateId(3))
        ));

        let zero = vec![Record::new(0, "Dune", "Frank Herbert")];
        assert!(matches!(check_record_ids(&zero), Err(SourceError::InvalidId)));
    }

    #[test]
    fn test_json_catalog_rejects_bad_ids() {
        let dir = tempfile::tempdir().unwrap();

        let repeated = dir.path().join("repeated.json");
        std::fs::write(
            &repeated,
            r#"[{"id": 3, "title": "Dune"}, {"id": 3, "title": "Dune"}]"#,
        )
        .unwrap();
        let err = JsonCatalog::new(&repeated).fetch_all_records().unwrap_err();
        assert!(matches!(err, SourceError::DuplicateId(3)));
        assert_eq!(err.to_string(), "Duplicate record id: 3");

        let zero = dir.path().join("zero.json");
        std::fs::write(&zero, r#"[{"id": 0, "title": "Dune"}]"#).unwrap();
        let source = JsonCatalog::new(&zero);
        assert!(matches!(source.fetch_all_records(), Err(SourceError::InvalidId)));
        assert!(matches!(source.fetch_record_by_id(0), Err(SourceError::InvalidId)));
    }
}
