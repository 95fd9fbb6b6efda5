//! OpenLibrary catalog lookup
//!
//! Book details come from the OpenLibrary API in two steps:
//! 1. Free-text search by title (`/search.json?q=...`)
//! 2. Per-edition detail calls (`/api/books?bibkeys=OLID:...`) to resolve
//!    an accurate page count, trying up to the first three edition keys
//!
//! When no edition yields a page count the lookup falls back to the search
//! result's own estimates (`number_of_pages_median`, then
//! `number_of_pages`), and finally to 0. Transport and parse failures
//! never escape [`CatalogClient::find_book`]: a failed search reads as "no
//! match" and a failed edition call just moves on to the next candidate.
//!
//! The client is a trait object injected through `AppState` so the rest of
//! the application can be tested without network access.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Production OpenLibrary endpoint.
pub const DEFAULT_BASE_URL: &str = "https://openlibrary.org";

/// Host serving cover images by numeric cover id.
const COVER_BASE_URL: &str = "https://covers.openlibrary.org";

/// Single attempt per endpoint call, no retries.
const LOOKUP_TIMEOUT: Duration = Duration::from_secs(10);

/// How many candidate edition keys to try before falling back to the
/// search result's own page-count estimates.
const MAX_EDITION_ATTEMPTS: usize = 3;

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("catalog request failed: {0}")]
    Transport(#[from] reqwest::Error),
    /// Used by test doubles to simulate an unreachable catalog.
    #[error("catalog unavailable: {0}")]
    Unavailable(String),
}

/// Book details assembled from a successful lookup
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct BookInfo {
    pub title: String,
    pub author: Option<String>,
    pub isbn: Option<String>,
    pub number_of_pages: u32,
    pub cover_image_url: Option<String>,
    pub openlibrary_key: Option<String>,
}

/// One page of search results. Fields are public so tests can construct
/// canned responses.
#[derive(Deserialize, Debug, Default, Clone)]
pub struct SearchPage {
    #[serde(default)]
    pub docs: Vec<SearchDoc>,
}

/// A single search result ("doc") as returned by `/search.json`
#[derive(Deserialize, Debug, Default, Clone)]
pub struct SearchDoc {
    pub title: Option<String>,
    #[serde(default)]
    pub author_name: Vec<String>,
    #[serde(default)]
    pub isbn: Vec<String>,
    #[serde(default)]
    pub edition_key: Vec<String>,
    pub cover_edition_key: Option<String>,
    /// Numeric cover identifier used to synthesize the image URL
    pub cover_i: Option<u64>,
    /// The catalog's key for the work
    pub key: Option<String>,
    pub number_of_pages_median: Option<u32>,
    pub number_of_pages: Option<u32>,
}

impl SearchDoc {
    /// Candidate edition identifiers: the edition-key list, falling back
    /// to the single cover edition when the list is empty.
    fn candidate_editions(&self) -> Vec<String> {
        if !self.edition_key.is_empty() {
            return self.edition_key.clone();
        }
        self.cover_edition_key.iter().cloned().collect()
    }

    /// Assembles the final [`BookInfo`] around a resolved page count.
    fn into_info(self, number_of_pages: u32) -> BookInfo {
        BookInfo {
            title: self
                .title
                .unwrap_or_else(|| "Unknown Title".to_string()),
            author: self.author_name.into_iter().next(),
            isbn: self.isbn.into_iter().next(),
            number_of_pages,
            cover_image_url: self
                .cover_i
                .map(|id| format!("{COVER_BASE_URL}/b/id/{id}-L.jpg")),
            openlibrary_key: self.key,
        }
    }
}

/// Bibliographic catalog abstraction
///
/// Implementors supply the two raw endpoint calls; the lookup and fallback
/// logic lives in the provided [`find_book`](CatalogClient::find_book) so
/// every implementation (including test stubs) shares it.
#[async_trait]
pub trait CatalogClient: Send + Sync {
    /// Raw free-text search.
    async fn search(&self, query: &str) -> Result<SearchPage, CatalogError>;

    /// Page count of one edition, `None` when the catalog does not know it.
    async fn edition_page_count(&self, edition_key: &str)
        -> Result<Option<u32>, CatalogError>;

    /// Looks up a book by title. Returns `None` when the search has no
    /// results or fails outright; partial data (no resolvable page count)
    /// degrades to a page count of 0 rather than failing.
    async fn find_book(&self, title: &str) -> Option<BookInfo> {
        let page = match self.search(title).await {
            Ok(page) => page,
            Err(e) => {
                tracing::warn!(query = %title, error = %e, "catalog search failed");
                return None;
            }
        };

        // First match wins, as in the admin search UI.
        let doc = page.docs.into_iter().next()?;

        let mut number_of_pages = 0;
        for edition_key in doc.candidate_editions().iter().take(MAX_EDITION_ATTEMPTS) {
            match self.edition_page_count(edition_key).await {
                Ok(Some(pages)) if pages > 0 => {
                    number_of_pages = pages;
                    break;
                }
                Ok(_) => {}
                Err(e) => {
                    // One bad edition call is not fatal; try the next
                    // candidate.
                    tracing::warn!(
                        edition = %edition_key,
                        error = %e,
                        "edition lookup failed"
                    );
                }
            }
        }

        if number_of_pages == 0 {
            number_of_pages = doc
                .number_of_pages_median
                .or(doc.number_of_pages)
                .unwrap_or(0);
        }

        Some(doc.into_info(number_of_pages))
    }
}

/// reqwest-backed OpenLibrary client
pub struct OpenLibrary {
    http: reqwest::Client,
    base_url: String,
}

impl OpenLibrary {
    /// Builds a client against the given base URL with the fixed per-call
    /// timeout. The URL is overridable (via the `CATALOG_URL` env var in
    /// `main`) mainly so tests can point at a local server.
    pub fn new(base_url: impl Into<String>) -> Result<OpenLibrary, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(LOOKUP_TIMEOUT)
            .build()?;
        Ok(OpenLibrary {
            http,
            base_url: base_url.into(),
        })
    }
}

/// Per-edition record in the `/api/books` response. Only the page count is
/// of interest.
#[derive(Deserialize)]
struct EditionData {
    number_of_pages: Option<u32>,
}

#[async_trait]
impl CatalogClient for OpenLibrary {
    async fn search(&self, query: &str) -> Result<SearchPage, CatalogError> {
        let page = self
            .http
            .get(format!("{}/search.json", self.base_url))
            .query(&[("q", query)])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(page)
    }

    async fn edition_page_count(
        &self,
        edition_key: &str,
    ) -> Result<Option<u32>, CatalogError> {
        let bibkey = format!("OLID:{edition_key}");
        // Response shape: { "OLID:OL123M": { "number_of_pages": 312, ... } }
        let data: HashMap<String, EditionData> = self
            .http
            .get(format!("{}/api/books", self.base_url))
            .query(&[
                ("bibkeys", bibkey.as_str()),
                ("format", "json"),
                ("jscmd", "data"),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(data.get(&bibkey).and_then(|e| e.number_of_pages))
    }
}
