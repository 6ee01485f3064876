//! Catalog record and its validated decode.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ingest::ParseError;

/// Numeric primary key of a catalog record.
pub type Isbn = i64;

/// A keyed catalog entry.
///
/// Written by the ingestion worker and read back by the lookup service. The
/// `isbn` is carried as an integer end to end so a record read back is
/// byte-for-byte the record that was loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Book {
    pub isbn: Isbn,
    pub title: String,
    pub author: String,
}

impl Book {
    pub fn new(isbn: Isbn, title: impl Into<String>, author: impl Into<String>) -> Self {
        Self {
            isbn,
            title: title.into(),
            author: author.into(),
        }
    }

    /// The store key descriptor for this record.
    pub fn key(&self) -> BookKey {
        BookKey { isbn: self.isbn }
    }
}

/// Native key descriptor of the book table: `{"isbn": <number>}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BookKey {
    pub isbn: Isbn,
}

impl BookKey {
    pub fn new(isbn: Isbn) -> Self {
        Self { isbn }
    }
}

/// Decode an uploaded object into records.
///
/// The bytes must be UTF-8 holding a JSON array whose every element has the
/// record shape. Nothing is returned unless every element validates.
pub fn decode_books(bytes: &[u8]) -> Result<Vec<Book>, ParseError> {
    let text = std::str::from_utf8(bytes).map_err(|e| ParseError::Utf8(e.to_string()))?;
    let value: Value = serde_json::from_str(text).map_err(|e| ParseError::Json(e.to_string()))?;

    let Value::Array(items) = value else {
        return Err(ParseError::NotAnArray);
    };

    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| {
            serde_json::from_value::<Book>(item).map_err(|e| ParseError::InvalidRecord {
                index,
                reason: e.to_string(),
            })
        })
        .collect()
}
