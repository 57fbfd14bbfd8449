//! Books by ISBN, backed by the Open Library books API.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::{EntityLookup, LookupDescriptor};

pub static BOOK_LOOKUP: LookupDescriptor = LookupDescriptor {
    handler_name: "book_info",
    path: "/book-info",
    field: "isbn",
    entity: "Book",
    upstream: "Open Library",
    default_url_template:
        "https://openlibrary.org/api/books?bibkeys=ISBN:{isbn}&format=json&jscmd=data",
};

const UNKNOWN: &str = "Unknown";

/// `jscmd=data` answers with an object keyed by bibkey (`ISBN:<isbn>`).
pub type BookPayload = HashMap<String, BookRecord>;

#[derive(Debug, Deserialize)]
pub struct BookRecord {
    pub title: Option<String>,
    pub authors: Option<Vec<Option<Author>>>,
    pub number_of_pages: Option<u32>,
    pub publish_date: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Author {
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookInfo {
    pub title: String,
    pub author: String,
    pub pages: u32,
    pub publish_date: String,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BookLookup;

impl BookLookup {
    fn take_record(payload: &mut BookPayload, isbn: &str) -> Option<BookRecord> {
        let bibkey = format!("ISBN:{isbn}");
        if let Some(record) = payload.remove(&bibkey) {
            return Some(record);
        }
        let key = payload
            .keys()
            .find(|key| key.eq_ignore_ascii_case(&bibkey))?
            .clone();
        payload.remove(&key)
    }
}

impl EntityLookup for BookLookup {
    type Payload = BookPayload;
    type Entity = BookInfo;

    fn descriptor(&self) -> &'static LookupDescriptor {
        &BOOK_LOOKUP
    }

    fn transform(&self, key: &str, mut payload: BookPayload) -> Option<BookInfo> {
        let record = Self::take_record(&mut payload, key)?;
        let title = record.title?;
        let names: Vec<String> = record
            .authors
            .unwrap_or_default()
            .into_iter()
            .flatten()
            .filter_map(|author| author.name)
            .collect();
        let author = if names.is_empty() {
            UNKNOWN.to_string()
        } else {
            names.join(", ")
        };
        Some(BookInfo {
            title,
            author,
            pages: record.number_of_pages.unwrap_or(0),
            publish_date: record.publish_date.unwrap_or_else(|| UNKNOWN.to_string()),
        })
    }
}
