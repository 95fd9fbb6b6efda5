//! Data models for the book-rental application
//!
//! This module defines the persisted records (`Book`, `Rental`), the rental
//! lifecycle operations, and the request/response types used by the API.
//!
//! The lifecycle rules, in short: a rental starts with a free 30-day
//! period. Each extension adds another 30 days and one billable month;
//! charges are always recomputed from the running extension count, never
//! accumulated per call. "Overdue" is a label derived at read time from an
//! active rental's due date.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::fee::{monthly_fee, Money};

/// Length of one rental period. The first period is free; every extension
/// adds one more, billed at the book's monthly fee.
pub const RENTAL_PERIOD_DAYS: i64 = 30;

/// Upper bound on the months accepted by a single extension. Keeps the
/// due-date arithmetic comfortably inside chrono's representable range;
/// unbounded input would panic in `DateTime + Duration`.
pub const MAX_EXTENSION_MONTHS: u32 = 120;

/// A catalog entry available for rental, stored in the database
///
/// Books are created from OpenLibrary lookup results the first time a
/// rental references their title; the stored rows double as a lookup cache
/// so repeat rentals of the same title never hit the network again.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Book {
    /// Generated record identifier
    pub id: String,

    pub title: String,
    pub author: Option<String>,
    pub isbn: Option<String>,

    /// Page count resolved from the catalog; 0 when unknown
    #[serde(default)]
    pub number_of_pages: u32,

    /// Large cover image, when the catalog knows one
    pub cover_image_url: Option<String>,

    /// The catalog's own key for the work (e.g. "/works/OL123W")
    pub openlibrary_key: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Book {
    /// Fee charged per extended month for this book.
    pub fn monthly_fee(&self) -> Money {
        monthly_fee(self.number_of_pages)
    }
}

/// Status of a rental as persisted.
///
/// `Overdue` exists in the stored enumeration for display filtering, but
/// no lifecycle transition ever writes it: overdue-ness is computed from
/// an active rental's due date at read time. See [`Rental::is_overdue`].
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RentalStatus {
    Active,
    Returned,
    Overdue,
}

impl RentalStatus {
    pub fn parse(s: &str) -> Option<RentalStatus> {
        match s {
            "active" => Some(RentalStatus::Active),
            "returned" => Some(RentalStatus::Returned),
            "overdue" => Some(RentalStatus::Overdue),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RentalStatus::Active => "active",
            RentalStatus::Returned => "returned",
            RentalStatus::Overdue => "overdue",
        }
    }
}

/// One student's borrowing of one book
///
/// A book may have many concurrent rentals; there is no copy inventory and
/// no exclusivity lock.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Rental {
    /// Generated record identifier
    pub id: String,

    /// Identity of the borrowing student
    pub student: String,

    /// Identifier of the rented [`Book`]
    pub book_id: String,

    pub rented_at: DateTime<Utc>,
    pub due_date: DateTime<Utc>,

    /// Set if and only if `status` is `Returned`
    pub return_date: Option<DateTime<Utc>>,

    pub status: RentalStatus,

    /// Billable months added beyond the free first period
    #[serde(default)]
    pub months_extended: u32,

    /// Accumulated charges; always `monthly_fee × months_extended`
    #[serde(default)]
    pub total_charges: Money,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Rental {
    /// Creates a new active rental starting at `now` with a free 30-day
    /// period and no charges.
    pub fn new(id: String, student: String, book_id: String, now: DateTime<Utc>) -> Rental {
        Rental {
            id,
            student,
            book_id,
            rented_at: now,
            due_date: now + Duration::days(RENTAL_PERIOD_DAYS),
            return_date: None,
            status: RentalStatus::Active,
            months_extended: 0,
            total_charges: Money::ZERO,
            created_at: now,
            updated_at: now,
        }
    }

    /// Extends the rental by `months` billing periods and recomputes the
    /// total charges from the new extension count.
    ///
    /// The charge is `fee × months_extended`, recomputed in full rather
    /// than accumulated, so the stored total always matches the counter no
    /// matter how many times this is called. Rejects `months` outside
    /// `1..=MAX_EXTENSION_MONTHS` before touching any state. Status is
    /// deliberately not checked here; the handler layer guards against
    /// extending non-active rentals.
    pub fn extend(&mut self, months: u32, fee: Money) -> AppResult<Money> {
        if months < 1 || months > MAX_EXTENSION_MONTHS {
            return Err(AppError::Validation(format!(
                "extension must be between 1 and {MAX_EXTENSION_MONTHS} months"
            )));
        }
        self.months_extended += months;
        self.due_date += Duration::days(RENTAL_PERIOD_DAYS * months as i64);
        self.total_charges = fee * self.months_extended;
        self.updated_at = Utc::now();
        Ok(self.total_charges)
    }

    /// Marks the rental returned at `return_time`. Charges already accrued
    /// are left untouched. Idempotency is the caller's responsibility; the
    /// handler layer rejects returning a non-active rental.
    pub fn mark_returned(&mut self, return_time: DateTime<Utc>) {
        self.status = RentalStatus::Returned;
        self.return_date = Some(return_time);
        self.updated_at = return_time;
    }

    /// A returned rental is never overdue; an active one is overdue once
    /// `now` has passed the due date. Pure lateness signal, decoupled from
    /// billing: a never-extended rental stays free even when overdue.
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        if self.status == RentalStatus::Returned {
            return false;
        }
        now > self.due_date
    }

    /// Whole days left until the due date; 0 once returned or past due.
    pub fn days_remaining(&self, now: DateTime<Utc>) -> i64 {
        if self.status == RentalStatus::Returned {
            return 0;
        }
        (self.due_date - now).num_days().max(0)
    }

    /// Status label for display: the stored status, except that a late
    /// active rental shows as overdue.
    pub fn effective_status(&self, now: DateTime<Utc>) -> RentalStatus {
        if self.status == RentalStatus::Active && self.is_overdue(now) {
            RentalStatus::Overdue
        } else {
            self.status
        }
    }
}

/// Request payload for creating a new rental
///
/// # Example
/// ```json
/// {
///   "student": "jane_smith",
///   "title": "Pride and Prejudice"
/// }
/// ```
#[derive(Deserialize)]
pub struct NewRentalRequest {
    /// Identity of the borrowing student
    pub student: String,

    /// Free-text title; matched against stored books first, then looked
    /// up in the external catalog
    pub title: String,
}

/// Request payload for extending a rental
#[derive(Deserialize)]
pub struct ExtendRequest {
    /// Number of 30-day periods to add; must be at least 1
    pub months: u32,
}

/// Request payload for extending several rentals at once
#[derive(Deserialize)]
pub struct BulkExtendRequest {
    pub rental_ids: Vec<String>,
    pub months: u32,
}

/// Query parameters for listing rentals
///
/// # Example
/// Query string: `?status=active&search=jane&page=2&limit=20`
#[derive(Deserialize)]
pub struct ListRentalParams {
    /// Optional status filter: "active", "returned" or "overdue"
    /// ("overdue" selects active rentals past their due date)
    pub status: Option<String>,

    /// Optional case-insensitive substring match on student or book title
    pub search: Option<String>,

    /// Page number for pagination (starts from 1)
    pub page: Option<usize>,

    /// Number of items per page (default 10, maximum 100)
    pub limit: Option<usize>,
}

/// Query parameters for listing books
#[derive(Deserialize)]
pub struct ListBookParams {
    /// Optional case-insensitive substring match on title or author
    pub search: Option<String>,
    pub page: Option<usize>,
    pub limit: Option<usize>,
}

/// Query parameters for the catalog search endpoint
#[derive(Deserialize)]
pub struct SearchParams {
    pub q: String,
}

/// A rental joined with its book, plus the derived read-time fields
#[derive(Serialize, Debug)]
pub struct RentalView {
    pub id: String,
    pub student: String,
    pub book_id: String,
    pub book_title: String,
    pub rented_at: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub return_date: Option<DateTime<Utc>>,
    pub status: RentalStatus,
    pub effective_status: RentalStatus,
    pub months_extended: u32,
    pub monthly_fee: Money,
    pub total_charges: Money,
    pub is_overdue: bool,
    pub days_remaining: i64,
}

impl RentalView {
    /// Joins a rental with its book and evaluates the derived fields at
    /// `now`.
    pub fn compose(rental: &Rental, book: &Book, now: DateTime<Utc>) -> RentalView {
        RentalView {
            id: rental.id.clone(),
            student: rental.student.clone(),
            book_id: rental.book_id.clone(),
            book_title: book.title.clone(),
            rented_at: rental.rented_at,
            due_date: rental.due_date,
            return_date: rental.return_date,
            status: rental.status,
            effective_status: rental.effective_status(now),
            months_extended: rental.months_extended,
            monthly_fee: book.monthly_fee(),
            total_charges: rental.total_charges,
            is_overdue: rental.is_overdue(now),
            days_remaining: rental.days_remaining(now),
        }
    }
}
