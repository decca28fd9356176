//! Defines the core data models for transactions.

use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime, format_description::BorrowedFormatItem, macros::format_description};

use crate::{
    Error,
    category::{Category, CategoryId, TransactionKind},
    user::UserID,
};

/// Database identifier for a transaction.
pub type TransactionId = i64;

/// Date format for user entered and query string dates, e.g. "2025-01-31".
const DATE_FORMAT: &[BorrowedFormatItem] = format_description!("[year]-[month]-[day]");

/// Parse a date in the format "YYYY-MM-DD".
///
/// # Errors
///
/// Returns [Error::InvalidDate] if the string is not a valid date.
pub fn parse_date(raw_date: &str) -> Result<Date, Error> {
    Date::parse(raw_date.trim(), DATE_FORMAT).map_err(|_| Error::InvalidDate(raw_date.to_owned()))
}

/// An expense or income, i.e. an event where money was either spent or earned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// The ID of the transaction.
    pub id: TransactionId,
    /// The user that owns the transaction.
    pub user_id: UserID,
    /// Whether the money was earned or spent.
    pub kind: TransactionKind,
    /// The amount of money spent or earned in this transaction, always positive.
    pub amount: f64,
    /// The category the transaction belongs to, `None` if uncategorized.
    pub category_id: Option<CategoryId>,
    /// A text description of what the transaction was for.
    pub description: String,
    /// When the transaction happened.
    pub date: Date,
    /// When the transaction was recorded.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// The user-editable fields of a transaction, used for creating and updating transactions.
///
/// Use [TransactionData::new] to create validated data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionData {
    /// Whether the money was earned or spent.
    pub kind: TransactionKind,
    /// The amount of money, must be positive.
    pub amount: f64,
    /// The category the transaction belongs to.
    #[serde(default)]
    pub category_id: Option<CategoryId>,
    /// A text description of what the transaction was for.
    #[serde(default)]
    pub description: String,
    /// When the transaction happened.
    pub date: Date,
}

impl TransactionData {
    /// Create validated transaction data without a category or description.
    ///
    /// # Errors
    ///
    /// Returns [Error::InvalidAmount] if `amount` is not a positive, finite number.
    pub fn new(kind: TransactionKind, amount: f64, date: Date) -> Result<Self, Error> {
        let data = Self {
            kind,
            amount,
            category_id: None,
            description: String::new(),
            date,
        };

        data.validate()?;

        Ok(data)
    }

    /// Set the category.
    pub fn category(mut self, category_id: Option<CategoryId>) -> Self {
        self.category_id = category_id;
        self
    }

    /// Set the description.
    pub fn description(mut self, description: &str) -> Self {
        self.description = description.trim().to_owned();
        self
    }

    /// Check the amount, for data that did not go through [TransactionData::new] (e.g.,
    /// deserialized request bodies).
    ///
    /// # Errors
    ///
    /// Returns [Error::InvalidAmount] if the amount is not a positive, finite number.
    pub fn validate(&self) -> Result<(), Error> {
        if self.amount.is_finite() && self.amount > 0.0 {
            Ok(())
        } else {
            Err(Error::InvalidAmount(self.amount))
        }
    }

    /// Attach an ID, owner and creation time to the data.
    pub fn into_transaction(
        self,
        id: TransactionId,
        user_id: UserID,
        created_at: OffsetDateTime,
    ) -> Transaction {
        Transaction {
            id,
            user_id,
            kind: self.kind,
            amount: self.amount,
            category_id: self.category_id,
            description: self.description,
            date: self.date,
            created_at,
        }
    }
}

/// Check that a transaction of type `kind` may reference the category `requested`.
///
/// `category` is the result of looking up `requested` among the owner's categories, so a
/// category owned by someone else is indistinguishable from a missing one.
///
/// # Errors
///
/// Returns [Error::InvalidCategory] if a category was requested but not found, or has a
/// different transaction type.
pub fn ensure_category_matches(
    kind: TransactionKind,
    requested: Option<CategoryId>,
    category: Option<&Category>,
) -> Result<(), Error> {
    match (requested, category) {
        (None, _) => Ok(()),
        (Some(id), Some(category)) if category.id == id && category.kind == kind => Ok(()),
        (Some(id), _) => Err(Error::InvalidCategory(Some(id))),
    }
}

/// An inclusive range of dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    start: Date,
    end: Date,
}

impl DateRange {
    /// Create a date range that includes both `start` and `end`.
    ///
    /// # Errors
    ///
    /// Returns [Error::InvalidDateRange] if `start` is after `end`.
    pub fn new(start: Date, end: Date) -> Result<Self, Error> {
        if start > end {
            return Err(Error::InvalidDateRange(start, end));
        }

        Ok(Self { start, end })
    }

    /// The calendar month containing `date`.
    pub fn month_of(date: Date) -> Self {
        let start = date.replace_day(1).unwrap_or(date);
        let end = start
            .replace_day(start.month().length(start.year()))
            .unwrap_or(date);

        Self { start, end }
    }

    /// The first day in the range.
    pub fn start(&self) -> Date {
        self.start
    }

    /// The last day in the range.
    pub fn end(&self) -> Date {
        self.end
    }

    /// Whether `date` falls within the range.
    pub fn contains(&self, date: Date) -> bool {
        self.start <= date && date <= self.end
    }
}
