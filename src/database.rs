//! Database initialization and table definitions
//!
//! This module handles the setup of the embedded redb database. Records
//! are stored as JSON-serialized strings keyed by generated ids, with two
//! small secondary index tables.

use redb::{Database, TableDefinition};
use std::sync::Arc;

use crate::catalog::CatalogClient;

/// Main table for book records
///
/// Key: book id
/// Value: JSON-serialized `Book`
pub const TABLE_BOOKS: TableDefinition<&str, &str> = TableDefinition::new("books_v1");

/// Main table for rental records
///
/// Key: rental id
/// Value: JSON-serialized `Rental`
pub const TABLE_RENTALS: TableDefinition<&str, &str> = TableDefinition::new("rentals_v1");

/// Index mapping a normalized (trimmed, lowercased) title to a book id.
///
/// Stored books double as a cache of past catalog lookups: when a rental
/// names a title we already hold, the book is reused and no network call
/// is made.
pub const TABLE_TITLE_INDEX: TableDefinition<&str, &str> =
    TableDefinition::new("book_title_index_v1");

/// Index for efficient querying of rentals by student
///
/// Key: composite key in format "{student}:{timestamp_micros}"
/// Value: rental id
///
/// The timestamp in the key ensures chronological ordering and uniqueness;
/// the value is an id (not a record copy) so lifecycle mutations never
/// have to rewrite index entries.
pub const TABLE_STUDENT_INDEX: TableDefinition<&str, &str> =
    TableDefinition::new("rental_student_index_v1");

/// Application state shared across all request handlers
///
/// Wraps the database and the injected catalog client in Arcs for
/// thread-safe sharing across async handlers.
#[derive(Clone)]
pub struct AppState {
    /// Thread-safe reference to the embedded database
    pub db: Arc<Database>,

    /// Bibliographic catalog used to resolve book details; a trait object
    /// so tests can substitute a stub
    pub catalog: Arc<dyn CatalogClient>,
}

/// Initializes the embedded database and creates required tables
///
/// Creates or opens the database file at the specified path, opens all
/// four tables so they exist from the first read, and commits.
pub fn init_db(db_path: &str) -> Result<Database, redb::Error> {
    let db = Database::create(db_path)?;

    let write_txn = db.begin_write()?;
    {
        write_txn.open_table(TABLE_BOOKS)?;
        write_txn.open_table(TABLE_RENTALS)?;
        write_txn.open_table(TABLE_TITLE_INDEX)?;
        write_txn.open_table(TABLE_STUDENT_INDEX)?;
    }
    write_txn.commit()?;

    Ok(db)
}

/// Normalized form of a title used as the title-index key.
pub fn title_key(title: &str) -> String {
    title.trim().to_lowercase()
}
