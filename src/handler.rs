//! HTTP request handlers for the rental-tracking API
//!
//! This module implements the admin-facing operations:
//! - Searching the external catalog for a book
//! - Creating rentals (reusing stored books, fetching new ones)
//! - Extending and returning rentals, singly and in bulk
//! - Listing rentals and books with filtering and pagination
//! - Dashboard and per-student rollups
//!
//! The handlers own the status preconditions: extending or returning a
//! rental that is not active is rejected with 409 here, never silently
//! absorbed by the lifecycle methods.

use std::collections::{HashMap, HashSet};

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use rand::{distr::Alphanumeric, Rng};
use redb::{ReadableDatabase, ReadableTable};
use serde::Serialize;
use serde_json::json;

use crate::database::{
    title_key, AppState, TABLE_BOOKS, TABLE_RENTALS, TABLE_STUDENT_INDEX, TABLE_TITLE_INDEX,
};
use crate::error::{AppError, AppResult};
use crate::fee::{monthly_fee, Money};
use crate::model::{
    Book, BulkExtendRequest, ExtendRequest, ListBookParams, ListRentalParams, NewRentalRequest,
    Rental, RentalStatus, RentalView, SearchParams, MAX_EXTENSION_MONTHS,
};

/// Length of generated record ids
const ID_LEN: usize = 8;

/// Generates a random alphanumeric record id.
fn generate_id() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(ID_LEN)
        .map(char::from)
        .collect()
}

/// Clamps pagination parameters to (page ≥ 1, limit ≤ 100) and derives the
/// offset, matching the list endpoints' documented defaults.
fn paginate(page: Option<usize>, limit: Option<usize>) -> (usize, usize, usize) {
    let page = page.unwrap_or(1).max(1);
    let limit = limit.unwrap_or(10).min(100);
    (page, limit, (page - 1) * limit)
}

/// A stored book together with its derived monthly fee
#[derive(Serialize)]
struct BookView {
    #[serde(flatten)]
    book: Book,
    monthly_fee: Money,
}

impl From<Book> for BookView {
    fn from(book: Book) -> BookView {
        let monthly_fee = book.monthly_fee();
        BookView { book, monthly_fee }
    }
}

/// Searches the external catalog for a book by title
///
/// # Query Parameters
///
/// - `q` - Free-text title, at least 3 characters
///
/// # Response
///
/// - **200 OK** - Match found; body carries the resolved details and the
///   monthly fee the book would rent for
/// - **400 Bad Request** - Query too short
/// - **404 Not Found** - No catalog match (including catalog outages,
///   which deliberately read as "no match")
pub async fn search_catalog(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> AppResult<impl IntoResponse> {
    let query = params.q.trim();
    if query.chars().count() < 3 {
        return Err(AppError::Validation(
            "please enter at least 3 characters".to_string(),
        ));
    }

    let info = state
        .catalog
        .find_book(query)
        .await
        .ok_or_else(|| AppError::NotFound(format!("no results found for \"{query}\"")))?;

    let fee = monthly_fee(info.number_of_pages);
    Ok(Json(json!({
        "book": info,
        "monthly_fee": fee,
    })))
}

/// Creates a new rental for a student
///
/// Book resolution order:
/// 1. A stored book whose normalized title matches is reused (no network).
/// 2. Otherwise the catalog is queried; no match is a 404.
///
/// The new rental starts active with a free 30-day period and zero
/// charges.
///
/// # Request Body
///
/// ```json
/// {
///   "student": "jane_smith",
///   "title": "Pride and Prejudice"
/// }
/// ```
///
/// # Response
///
/// - **201 Created** - Rental created; body carries the joined view
/// - **400 Bad Request** - Missing student or title
/// - **404 Not Found** - Title unknown to both the store and the catalog
pub async fn create_rental(
    State(state): State<AppState>,
    Json(payload): Json<NewRentalRequest>,
) -> AppResult<impl IntoResponse> {
    let student = payload.student.trim().to_string();
    let title = payload.title.trim().to_string();
    if student.is_empty() {
        return Err(AppError::Validation("student is required".to_string()));
    }
    if title.is_empty() {
        return Err(AppError::Validation("title is required".to_string()));
    }

    // Resolve the book before opening the write transaction; the catalog
    // call can take up to the 10s timeout and must not block other
    // writers.
    let key = title_key(&title);
    let cached: Option<Book> = {
        let read_txn = state.db.begin_read()?;
        let index = read_txn.open_table(TABLE_TITLE_INDEX)?;
        let books = read_txn.open_table(TABLE_BOOKS)?;
        match index.get(key.as_str())? {
            Some(id) => match books.get(id.value())? {
                Some(raw) => Some(serde_json::from_str(raw.value())?),
                None => None,
            },
            None => None,
        }
    };

    let now = Utc::now();
    let book = match cached {
        Some(book) => book,
        None => {
            let info = state.catalog.find_book(&title).await.ok_or_else(|| {
                AppError::NotFound(format!("no catalog match for \"{title}\""))
            })?;
            Book {
                id: generate_id(),
                title: info.title,
                author: info.author,
                isbn: info.isbn,
                number_of_pages: info.number_of_pages,
                cover_image_url: info.cover_image_url,
                openlibrary_key: info.openlibrary_key,
                created_at: now,
                updated_at: now,
            }
        }
    };

    let write_txn = state.db.begin_write()?;
    let (book, rental) = {
        let mut books = write_txn.open_table(TABLE_BOOKS)?;
        let mut title_index = write_txn.open_table(TABLE_TITLE_INDEX)?;

        // Re-check the title index inside the write transaction so two
        // concurrent creations of the same title converge on one book row.
        let existing: Option<Book> = match title_index.get(key.as_str())? {
            Some(id) => match books.get(id.value())? {
                Some(raw) => Some(serde_json::from_str(raw.value())?),
                None => None,
            },
            None => None,
        };
        let book = match existing {
            Some(stored) => stored,
            None => {
                books.insert(book.id.as_str(), serde_json::to_string(&book)?.as_str())?;
                title_index.insert(key.as_str(), book.id.as_str())?;
                book
            }
        };

        let rental = Rental::new(generate_id(), student.clone(), book.id.clone(), now);
        let mut rentals = write_txn.open_table(TABLE_RENTALS)?;
        rentals.insert(rental.id.as_str(), serde_json::to_string(&rental)?.as_str())?;

        // Composite key keeps one student's rentals contiguous and in
        // chronological order.
        let index_key = format!("{}:{}", student, now.timestamp_micros());
        let mut student_index = write_txn.open_table(TABLE_STUDENT_INDEX)?;
        student_index.insert(index_key.as_str(), rental.id.as_str())?;
        (book, rental)
    };
    write_txn.commit()?;

    let view = RentalView::compose(&rental, &book, now);
    let message = format!(
        "Rental created! {} can keep \"{}\" ({} pages) for 1 month free. \
         Subsequent months: ${}/month",
        view.student, view.book_title, book.number_of_pages, view.monthly_fee
    );
    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": message, "rental": view })),
    ))
}

/// Lists rentals with filtering and pagination, newest first
///
/// # Query Parameters
///
/// - `status` (optional) - "active", "returned" or "overdue"; "overdue"
///   selects active rentals past their due date (the stored status is
///   never rewritten to overdue)
/// - `search` (optional) - case-insensitive substring match on student or
///   book title
/// - `page` / `limit` - pagination (defaults 1 / 10, limit capped at 100)
pub async fn list_rentals(
    State(state): State<AppState>,
    Query(params): Query<ListRentalParams>,
) -> AppResult<impl IntoResponse> {
    let (page, limit, offset) = paginate(params.page, params.limit);
    let status = match params.status.as_deref().filter(|s| !s.is_empty()) {
        Some(s) => Some(RentalStatus::parse(s).ok_or_else(|| {
            AppError::Validation(format!("unknown status filter: {s}"))
        })?),
        None => None,
    };
    let search = params
        .search
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_lowercase);

    let now = Utc::now();
    let read_txn = state.db.begin_read()?;
    let books = load_books(&read_txn)?;

    let rentals_table = read_txn.open_table(TABLE_RENTALS)?;
    let mut matches: Vec<RentalView> = Vec::new();
    for row in rentals_table.iter()? {
        let (_, raw) = row?;
        let rental: Rental = serde_json::from_str(raw.value())?;
        let book = match books.get(&rental.book_id) {
            Some(book) => book,
            None => continue,
        };

        let keep_status = match status {
            None => true,
            Some(RentalStatus::Overdue) => {
                rental.status == RentalStatus::Active && rental.is_overdue(now)
            }
            Some(wanted) => rental.status == wanted,
        };
        if !keep_status {
            continue;
        }

        if let Some(needle) = &search {
            let hit = rental.student.to_lowercase().contains(needle)
                || book.title.to_lowercase().contains(needle);
            if !hit {
                continue;
            }
        }

        matches.push(RentalView::compose(&rental, book, now));
    }

    matches.sort_by(|a, b| b.rented_at.cmp(&a.rented_at));
    let data: Vec<RentalView> = matches.into_iter().skip(offset).take(limit).collect();

    Ok(Json(json!({
        "page": page,
        "limit": limit,
        "total_fetched": data.len(),
        "data": data,
    })))
}

/// Fetches a single rental with its derived fields
pub async fn get_rental(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> AppResult<impl IntoResponse> {
    let read_txn = state.db.begin_read()?;
    let rentals = read_txn.open_table(TABLE_RENTALS)?;
    let rental = match rentals.get(id.as_str())? {
        Some(raw) => serde_json::from_str::<Rental>(raw.value())?,
        None => return Err(AppError::NotFound(format!("rental {id} not found"))),
    };

    let books = read_txn.open_table(TABLE_BOOKS)?;
    let book = match books.get(rental.book_id.as_str())? {
        Some(raw) => serde_json::from_str::<Book>(raw.value())?,
        None => {
            return Err(AppError::NotFound(format!(
                "book {} for rental {id} not found",
                rental.book_id
            )))
        }
    };

    Ok(Json(RentalView::compose(&rental, &book, Utc::now())))
}

/// Extends a rental by one or more 30-day periods
///
/// # Response
///
/// - **200 OK** - Extended; body carries the recomputed total charges
/// - **400 Bad Request** - `months` outside `1..=MAX_EXTENSION_MONTHS`
/// - **404 Not Found** - Unknown rental, or its book row is gone
/// - **409 Conflict** - Rental is not active
pub async fn extend_rental(
    Path(id): Path<String>,
    State(state): State<AppState>,
    Json(payload): Json<ExtendRequest>,
) -> AppResult<impl IntoResponse> {
    let write_txn = state.db.begin_write()?;
    let (rental, charges) = {
        let mut rentals = write_txn.open_table(TABLE_RENTALS)?;
        let mut rental = match rentals.get(id.as_str())? {
            Some(raw) => serde_json::from_str::<Rental>(raw.value())?,
            None => return Err(AppError::NotFound(format!("rental {id} not found"))),
        };
        if rental.status != RentalStatus::Active {
            return Err(AppError::PreconditionViolation(format!(
                "rental {id} is {}, only active rentals can be extended",
                rental.status.as_str()
            )));
        }

        let books = write_txn.open_table(TABLE_BOOKS)?;
        let fee = match books.get(rental.book_id.as_str())? {
            Some(raw) => serde_json::from_str::<Book>(raw.value())?.monthly_fee(),
            // Without the book there is no fee to bill against; refuse
            // rather than silently extending for free.
            None => {
                return Err(AppError::NotFound(format!(
                    "book {} for rental {id} not found",
                    rental.book_id
                )))
            }
        };

        let charges = rental.extend(payload.months, fee)?;
        rentals.insert(id.as_str(), serde_json::to_string(&rental)?.as_str())?;
        (rental, charges)
    };
    write_txn.commit()?;

    Ok(Json(json!({
        "message": format!("Rental extended by {} month(s). Total charges: ${}", payload.months, charges),
        "rental_id": rental.id,
        "months_extended": rental.months_extended,
        "due_date": rental.due_date,
        "total_charges": charges,
    })))
}

/// Marks a rental as returned
///
/// Charges already accrued are kept; nothing new is billed on return.
///
/// # Response
///
/// - **200 OK** - Marked returned
/// - **404 Not Found** - Unknown rental
/// - **409 Conflict** - Rental is not active (returning twice included)
pub async fn return_rental(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> AppResult<impl IntoResponse> {
    let now = Utc::now();
    let write_txn = state.db.begin_write()?;
    let rental = {
        let mut rentals = write_txn.open_table(TABLE_RENTALS)?;
        let mut rental = match rentals.get(id.as_str())? {
            Some(raw) => serde_json::from_str::<Rental>(raw.value())?,
            None => return Err(AppError::NotFound(format!("rental {id} not found"))),
        };
        if rental.status != RentalStatus::Active {
            return Err(AppError::PreconditionViolation(format!(
                "rental {id} is not active"
            )));
        }
        rental.mark_returned(now);
        rentals.insert(id.as_str(), serde_json::to_string(&rental)?.as_str())?;
        rental
    };
    write_txn.commit()?;

    Ok(Json(json!({
        "message": "Marked as returned.",
        "rental_id": rental.id,
        "return_date": rental.return_date,
        "total_charges": rental.total_charges,
    })))
}

/// Extends every currently-active rental in the given list
///
/// Unknown ids, non-active rentals, and rentals whose book row is missing
/// are skipped rather than failing the batch; the response reports how
/// many were actually extended.
pub async fn bulk_extend(
    State(state): State<AppState>,
    Json(payload): Json<BulkExtendRequest>,
) -> AppResult<impl IntoResponse> {
    if payload.months < 1 || payload.months > MAX_EXTENSION_MONTHS {
        return Err(AppError::Validation(format!(
            "extension must be between 1 and {MAX_EXTENSION_MONTHS} months"
        )));
    }

    let write_txn = state.db.begin_write()?;
    let mut extended = 0usize;
    {
        let mut rentals = write_txn.open_table(TABLE_RENTALS)?;
        let books = write_txn.open_table(TABLE_BOOKS)?;
        for id in &payload.rental_ids {
            let mut rental = match rentals.get(id.as_str())? {
                Some(raw) => serde_json::from_str::<Rental>(raw.value())?,
                None => continue,
            };
            if rental.status != RentalStatus::Active {
                continue;
            }
            let fee = match books.get(rental.book_id.as_str())? {
                Some(raw) => serde_json::from_str::<Book>(raw.value())?.monthly_fee(),
                // No book row means no fee basis; leave this rental alone.
                None => continue,
            };
            rental.extend(payload.months, fee)?;
            rentals.insert(id.as_str(), serde_json::to_string(&rental)?.as_str())?;
            extended += 1;
        }
    }
    write_txn.commit()?;

    Ok(Json(json!({
        "message": format!("{extended} rental(s) extended by {} month(s).", payload.months),
        "extended": extended,
        "months": payload.months,
    })))
}

/// Lists stored books, alphabetically by title
///
/// # Query Parameters
///
/// - `search` (optional) - case-insensitive substring match on title or
///   author
/// - `page` / `limit` - pagination
pub async fn list_books(
    State(state): State<AppState>,
    Query(params): Query<ListBookParams>,
) -> AppResult<impl IntoResponse> {
    let (page, limit, offset) = paginate(params.page, params.limit);
    let search = params
        .search
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_lowercase);

    let read_txn = state.db.begin_read()?;
    let table = read_txn.open_table(TABLE_BOOKS)?;
    let mut matches: Vec<Book> = Vec::new();
    for row in table.iter()? {
        let (_, raw) = row?;
        let book: Book = serde_json::from_str(raw.value())?;
        if let Some(needle) = &search {
            let author = book.author.as_deref().unwrap_or("").to_lowercase();
            if !book.title.to_lowercase().contains(needle) && !author.contains(needle) {
                continue;
            }
        }
        matches.push(book);
    }

    matches.sort_by(|a, b| a.title.cmp(&b.title));
    let data: Vec<BookView> = matches
        .into_iter()
        .skip(offset)
        .take(limit)
        .map(BookView::from)
        .collect();

    Ok(Json(json!({
        "page": page,
        "limit": limit,
        "total_fetched": data.len(),
        "data": data,
    })))
}

/// Dashboard totals plus the ten most recent rentals
pub async fn dashboard(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let now = Utc::now();
    let read_txn = state.db.begin_read()?;
    let books = load_books(&read_txn)?;

    let rentals_table = read_txn.open_table(TABLE_RENTALS)?;
    let mut students: HashSet<String> = HashSet::new();
    let mut total_rentals = 0usize;
    let mut active_rentals = 0usize;
    let mut recent: Vec<RentalView> = Vec::new();

    for row in rentals_table.iter()? {
        let (_, raw) = row?;
        let rental: Rental = serde_json::from_str(raw.value())?;
        total_rentals += 1;
        if rental.status == RentalStatus::Active {
            active_rentals += 1;
        }
        students.insert(rental.student.clone());
        if let Some(book) = books.get(&rental.book_id) {
            recent.push(RentalView::compose(&rental, book, now));
        }
    }

    recent.sort_by(|a, b| b.rented_at.cmp(&a.rented_at));
    recent.truncate(10);

    Ok(Json(json!({
        "total_books": books.len(),
        "total_students": students.len(),
        "active_rentals": active_rentals,
        "total_rentals": total_rentals,
        "recent_rentals": recent,
    })))
}

/// Per-student rollup used by the student dashboard
#[derive(Serialize)]
struct StudentSummary {
    student: String,
    total_rentals: usize,
    active_rentals: usize,
    total_charges: Money,
    recent_rentals: Vec<RentalView>,
}

/// Lists every student with rental counts, summed charges, and their five
/// most recent rentals
///
/// Walks the student index rather than the rentals table: its composite
/// "{student}:{timestamp_micros}" keys arrive grouped per student and in
/// chronological order, and each value is the rental id to fetch.
pub async fn student_dashboard(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let now = Utc::now();
    let read_txn = state.db.begin_read()?;
    let books = load_books(&read_txn)?;

    let index = read_txn.open_table(TABLE_STUDENT_INDEX)?;
    let rentals_table = read_txn.open_table(TABLE_RENTALS)?;
    let mut by_student: HashMap<String, Vec<RentalView>> = HashMap::new();
    for row in index.iter()? {
        let (_, rental_id) = row?;
        let rental: Rental = match rentals_table.get(rental_id.value())? {
            Some(raw) => serde_json::from_str(raw.value())?,
            None => continue,
        };
        let book = match books.get(&rental.book_id) {
            Some(book) => book,
            None => continue,
        };
        by_student
            .entry(rental.student.clone())
            .or_default()
            .push(RentalView::compose(&rental, book, now));
    }

    let mut summaries: Vec<StudentSummary> = by_student
        .into_iter()
        .map(|(student, mut rentals)| {
            rentals.sort_by(|a, b| b.rented_at.cmp(&a.rented_at));
            let total_rentals = rentals.len();
            let active_rentals = rentals
                .iter()
                .filter(|r| r.status == RentalStatus::Active)
                .count();
            let total_charges: Money = rentals.iter().map(|r| r.total_charges).sum();
            rentals.truncate(5);
            StudentSummary {
                student,
                total_rentals,
                active_rentals,
                total_charges,
                recent_rentals: rentals,
            }
        })
        .collect();
    summaries.sort_by(|a, b| a.student.cmp(&b.student));

    Ok(Json(json!({ "students": summaries })))
}

/// Loads the whole books table into a map keyed by book id. The catalog of
/// stored books stays small (one row per distinct rented title), so a full
/// scan per request is acceptable.
fn load_books(
    read_txn: &redb::ReadTransaction,
) -> AppResult<HashMap<String, Book>> {
    let table = read_txn.open_table(TABLE_BOOKS)?;
    let mut books = HashMap::new();
    for row in table.iter()? {
        let (_, raw) = row?;
        let book: Book = serde_json::from_str(raw.value())?;
        books.insert(book.id.clone(), book);
    }
    Ok(books)
}
