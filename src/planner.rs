//! Budgeting helpers kept in local storage: the monthly spending limit, bill reminders and a
//! shopping list.

use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};

use crate::{
    CategoryId, Error,
    storage::{KeyValueStore, SharedStorage, StorageKey, lock},
};

/// A bill that is due on a date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reminder {
    /// The ID of the reminder.
    pub id: i64,
    /// What the bill is for.
    pub title: String,
    /// The amount due.
    pub amount: f64,
    /// When the bill is due.
    pub due_date: Date,
    /// The expense category the bill belongs to.
    pub category_id: Option<CategoryId>,
}

/// A reminder that has been paid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaidReminder {
    /// The reminder.
    #[serde(flatten)]
    pub reminder: Reminder,
    /// When it was marked as paid.
    #[serde(with = "time::serde::rfc3339")]
    pub paid_at: OffsetDateTime,
}

/// An item on the shopping list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartItem {
    /// The ID of the item.
    pub id: i64,
    /// The name of the item.
    pub name: String,
    /// The price of one unit.
    pub price: f64,
    /// How many units to buy.
    pub quantity: u32,
}

impl CartItem {
    /// The price of all units.
    pub fn total(&self) -> f64 {
        self.price * self.quantity as f64
    }
}

/// Access to the budgeting helpers in local storage.
#[derive(Debug)]
pub struct Planner<S> {
    storage: SharedStorage<S>,
}

impl<S: KeyValueStore> Planner<S> {
    /// Create a planner over `storage`.
    pub fn new(storage: SharedStorage<S>) -> Self {
        Self { storage }
    }

    /// The monthly spending limit, if one has been set.
    pub fn monthly_budget(&self) -> Result<Option<f64>, Error> {
        lock(&self.storage)?.get(StorageKey::MonthlyBudget)
    }

    /// Set the monthly spending limit.
    ///
    /// # Errors
    ///
    /// Returns [Error::InvalidBudget] if `budget` is negative or not finite.
    pub fn set_monthly_budget(&self, budget: f64) -> Result<(), Error> {
        if !budget.is_finite() || budget < 0.0 {
            return Err(Error::InvalidBudget(budget));
        }

        lock(&self.storage)?.set(StorageKey::MonthlyBudget, &budget)
    }

    /// Unpaid reminders, soonest first.
    pub fn reminders(&self) -> Result<Vec<Reminder>, Error> {
        let mut reminders: Vec<Reminder> =
            lock(&self.storage)?.get_or_default(StorageKey::Reminders)?;
        reminders.sort_by_key(|reminder| (reminder.due_date, reminder.id));

        Ok(reminders)
    }

    /// Add a reminder.
    ///
    /// # Errors
    ///
    /// Returns [Error::MissingField] if the title is blank and [Error::InvalidAmount] if the
    /// amount is not positive.
    pub fn add_reminder(
        &self,
        title: &str,
        amount: f64,
        due_date: Date,
        category_id: Option<CategoryId>,
    ) -> Result<Reminder, Error> {
        let title = title.trim();
        if title.is_empty() {
            return Err(Error::MissingField("title".to_owned()));
        }
        if !amount.is_finite() || amount <= 0.0 {
            return Err(Error::InvalidAmount(amount));
        }

        let mut storage = lock(&self.storage)?;
        let mut reminders: Vec<Reminder> = storage.get_or_default(StorageKey::Reminders)?;
        let history: Vec<PaidReminder> = storage.get_or_default(StorageKey::PaidRemindersHistory)?;

        // Paid reminders keep their IDs, so new IDs must not collide with them either.
        let id = reminders
            .iter()
            .map(|reminder| reminder.id)
            .chain(history.iter().map(|paid| paid.reminder.id))
            .max()
            .unwrap_or(0)
            + 1;

        let reminder = Reminder {
            id,
            title: title.to_owned(),
            amount,
            due_date,
            category_id,
        };
        reminders.push(reminder.clone());
        storage.set(StorageKey::Reminders, &reminders)?;

        Ok(reminder)
    }

    /// Mark a reminder as paid, moving it to the paid history.
    ///
    /// # Errors
    ///
    /// Returns [Error::MissingReminder] if there is no unpaid reminder with the ID.
    pub fn pay_reminder(&self, id: i64) -> Result<PaidReminder, Error> {
        let mut storage = lock(&self.storage)?;
        let mut reminders: Vec<Reminder> = storage.get_or_default(StorageKey::Reminders)?;

        let index = reminders
            .iter()
            .position(|reminder| reminder.id == id)
            .ok_or(Error::MissingReminder)?;
        let paid = PaidReminder {
            reminder: reminders.remove(index),
            paid_at: OffsetDateTime::now_utc(),
        };

        let mut history: Vec<PaidReminder> =
            storage.get_or_default(StorageKey::PaidRemindersHistory)?;
        history.push(paid.clone());

        storage.set(StorageKey::Reminders, &reminders)?;
        storage.set(StorageKey::PaidRemindersHistory, &history)?;

        Ok(paid)
    }

    /// Reminders that have been paid, in the order they were paid.
    pub fn paid_reminders(&self) -> Result<Vec<PaidReminder>, Error> {
        lock(&self.storage)?.get_or_default(StorageKey::PaidRemindersHistory)
    }

    /// The shopping list.
    pub fn cart_items(&self) -> Result<Vec<CartItem>, Error> {
        lock(&self.storage)?.get_or_default(StorageKey::CartItems)
    }

    /// Add an item to the shopping list.
    ///
    /// # Errors
    ///
    /// Returns [Error::MissingField] if the name is blank, [Error::InvalidAmount] if the price
    /// is negative and [Error::MissingField] if the quantity is zero.
    pub fn add_cart_item(&self, name: &str, price: f64, quantity: u32) -> Result<CartItem, Error> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::MissingField("name".to_owned()));
        }
        if !price.is_finite() || price < 0.0 {
            return Err(Error::InvalidAmount(price));
        }
        if quantity == 0 {
            return Err(Error::MissingField("quantity".to_owned()));
        }

        let mut storage = lock(&self.storage)?;
        let mut items: Vec<CartItem> = storage.get_or_default(StorageKey::CartItems)?;
        let item = CartItem {
            id: items.iter().map(|item| item.id).max().unwrap_or(0) + 1,
            name: name.to_owned(),
            price,
            quantity,
        };
        items.push(item.clone());
        storage.set(StorageKey::CartItems, &items)?;

        Ok(item)
    }

    /// Remove an item from the shopping list, returning whether it was there.
    pub fn remove_cart_item(&self, id: i64) -> Result<bool, Error> {
        let mut storage = lock(&self.storage)?;
        let mut items: Vec<CartItem> = storage.get_or_default(StorageKey::CartItems)?;

        let count_before = items.len();
        items.retain(|item| item.id != id);
        let removed = items.len() != count_before;

        if removed {
            storage.set(StorageKey::CartItems, &items)?;
        }

        Ok(removed)
    }

    /// The price of everything on the shopping list.
    pub fn cart_total(&self) -> Result<f64, Error> {
        Ok(self.cart_items()?.iter().map(CartItem::total).sum())
    }
}
