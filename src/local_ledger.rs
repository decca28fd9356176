//! Categories and transactions kept in local storage, used for demo sessions.
//!
//! The ledger enforces the same rules as the hosted service: category names are unique per
//! type (ignoring case), transactions need a positive amount and a category of the same type,
//! and deleting a category keeps its transactions without a category.

use async_trait::async_trait;
use time::OffsetDateTime;

use crate::{
    Category, CategoryData, CategoryId, DateRange, Error, Transaction, TransactionData,
    TransactionId, UserID,
    backend::Ledger,
    category::{default_categories, find_by_id},
    storage::{KeyValueStore, LocalStorage, SharedStorage, StorageKey, lock},
    transaction::ensure_category_matches,
};

/// A [Ledger] backed by local storage.
#[derive(Debug)]
pub struct LocalLedger<S> {
    storage: SharedStorage<S>,
    user_id: UserID,
}

impl<S> Clone for LocalLedger<S> {
    fn clone(&self) -> Self {
        Self {
            storage: self.storage.clone(),
            user_id: self.user_id,
        }
    }
}

/// The two lists categories are kept in: the seeded defaults and the ones the user created.
struct CategoryLists {
    defaults: Vec<Category>,
    custom: Vec<Category>,
}

impl CategoryLists {
    fn load<S: KeyValueStore>(storage: &LocalStorage<S>) -> Result<Self, Error> {
        Ok(Self {
            defaults: storage.get_or_default(StorageKey::Categories)?,
            custom: storage.get_or_default(StorageKey::CustomCategories)?,
        })
    }

    fn save<S: KeyValueStore>(&self, storage: &mut LocalStorage<S>) -> Result<(), Error> {
        storage.set(StorageKey::Categories, &self.defaults)?;
        storage.set(StorageKey::CustomCategories, &self.custom)
    }

    fn iter(&self) -> impl Iterator<Item = &Category> {
        self.defaults.iter().chain(self.custom.iter())
    }

    fn all(&self) -> Vec<Category> {
        self.iter().cloned().collect()
    }

    fn get_mut(&mut self, id: CategoryId) -> Option<&mut Category> {
        self.defaults
            .iter_mut()
            .chain(self.custom.iter_mut())
            .find(|category| category.id == id)
    }

    fn remove(&mut self, id: CategoryId) -> Option<Category> {
        if let Some(index) = self.defaults.iter().position(|category| category.id == id) {
            return Some(self.defaults.remove(index));
        }

        self.custom
            .iter()
            .position(|category| category.id == id)
            .map(|index| self.custom.remove(index))
    }

    fn next_id(&self) -> CategoryId {
        self.iter().map(|category| category.id).max().unwrap_or(0) + 1
    }

    /// Check that no other category of the same type has the same name.
    fn ensure_unique(&self, data: &CategoryData, ignore: Option<CategoryId>) -> Result<(), Error> {
        let duplicate = self.iter().any(|category| {
            Some(category.id) != ignore
                && category.kind == data.kind
                && category.name.matches(data.name.as_ref())
        });

        if duplicate {
            Err(Error::DuplicateCategory(data.name.to_string()))
        } else {
            Ok(())
        }
    }
}

impl<S: KeyValueStore> LocalLedger<S> {
    /// Create a ledger for `user_id` over `storage`.
    pub fn new(storage: SharedStorage<S>, user_id: UserID) -> Self {
        Self { storage, user_id }
    }

    /// Store the default categories, unless categories have already been seeded.
    ///
    /// # Errors
    ///
    /// Returns an error if storage cannot be read or written.
    pub fn seed_default_categories(&self) -> Result<(), Error> {
        let mut storage = lock(&self.storage)?;

        if storage.get::<Vec<Category>>(StorageKey::Categories)?.is_some() {
            return Ok(());
        }

        let defaults: Vec<Category> = default_categories()
            .into_iter()
            .zip(1..)
            .map(|(data, id)| data.into_category(id, self.user_id))
            .collect();

        storage.set(StorageKey::Categories, &defaults)
    }

    /// All categories, the defaults first.
    ///
    /// # Errors
    ///
    /// Returns an error if storage cannot be read.
    pub fn get_categories(&self) -> Result<Vec<Category>, Error> {
        let storage = lock(&self.storage)?;

        CategoryLists::load(&storage).map(|lists| lists.all())
    }

    /// Create a category.
    ///
    /// # Errors
    ///
    /// Returns [Error::InvalidBudget] for a negative budget, [Error::DuplicateCategory] if a
    /// category of the same type already has the name, or a storage error.
    pub fn add_category(&self, data: CategoryData) -> Result<Category, Error> {
        data.validate()?;

        let mut storage = lock(&self.storage)?;
        let mut lists = CategoryLists::load(&storage)?;
        lists.ensure_unique(&data, None)?;

        let category = data.into_category(lists.next_id(), self.user_id);
        lists.custom.push(category.clone());
        lists.save(&mut storage)?;

        Ok(category)
    }

    /// Replace the editable fields of a category.
    ///
    /// If the type changes, transactions of the old type are detached from the category.
    ///
    /// # Errors
    ///
    /// Returns [Error::UpdateMissingCategory] if there is no such category, otherwise the same
    /// errors as [LocalLedger::add_category].
    pub fn edit_category(&self, id: CategoryId, data: CategoryData) -> Result<Category, Error> {
        data.validate()?;

        let mut storage = lock(&self.storage)?;
        let mut lists = CategoryLists::load(&storage)?;
        lists.ensure_unique(&data, Some(id))?;

        let user_id = self.user_id;
        let category = lists.get_mut(id).ok_or(Error::UpdateMissingCategory)?;
        *category = data.into_category(id, user_id);
        let category = category.clone();

        let mut transactions: Vec<Transaction> =
            storage.get_or_default(StorageKey::Transactions)?;
        let detached = detach(&mut transactions, id, |transaction| {
            transaction.kind != category.kind
        });

        lists.save(&mut storage)?;
        if detached > 0 {
            storage.set(StorageKey::Transactions, &transactions)?;
        }

        Ok(category)
    }

    /// Delete a category, keeping its transactions without a category.
    ///
    /// # Errors
    ///
    /// Returns [Error::DeleteMissingCategory] if there is no such category, or a storage error.
    pub fn remove_category(&self, id: CategoryId) -> Result<(), Error> {
        let mut storage = lock(&self.storage)?;
        let mut lists = CategoryLists::load(&storage)?;
        lists.remove(id).ok_or(Error::DeleteMissingCategory)?;

        let mut transactions: Vec<Transaction> =
            storage.get_or_default(StorageKey::Transactions)?;
        let detached = detach(&mut transactions, id, |_| true);
        tracing::debug!("Deleted category {id}, detached {detached} transaction(s)");

        lists.save(&mut storage)?;
        storage.set(StorageKey::Transactions, &transactions)
    }

    /// Transactions, newest first, optionally limited to `range`.
    ///
    /// # Errors
    ///
    /// Returns an error if storage cannot be read.
    pub fn get_transactions(&self, range: Option<DateRange>) -> Result<Vec<Transaction>, Error> {
        let storage = lock(&self.storage)?;
        let mut transactions: Vec<Transaction> =
            storage.get_or_default(StorageKey::Transactions)?;

        if let Some(range) = range {
            transactions.retain(|transaction| range.contains(transaction.date));
        }

        transactions.sort_by(|a, b| b.date.cmp(&a.date).then(b.id.cmp(&a.id)));

        Ok(transactions)
    }

    /// Record a transaction.
    ///
    /// # Errors
    ///
    /// Returns [Error::InvalidAmount] for a non-positive amount, [Error::InvalidCategory] if
    /// the category does not exist or has a different type, or a storage error.
    pub fn add_transaction(&self, data: TransactionData) -> Result<Transaction, Error> {
        data.validate()?;

        let mut storage = lock(&self.storage)?;
        check_category(&storage, &data)?;

        let mut transactions: Vec<Transaction> =
            storage.get_or_default(StorageKey::Transactions)?;
        let id = transactions
            .iter()
            .map(|transaction| transaction.id)
            .max()
            .unwrap_or(0)
            + 1;

        let transaction = data.into_transaction(id, self.user_id, OffsetDateTime::now_utc());
        transactions.push(transaction.clone());
        storage.set(StorageKey::Transactions, &transactions)?;

        Ok(transaction)
    }

    /// Replace the editable fields of a transaction.
    ///
    /// # Errors
    ///
    /// Returns [Error::UpdateMissingTransaction] if there is no such transaction, otherwise the
    /// same errors as [LocalLedger::add_transaction].
    pub fn edit_transaction(
        &self,
        id: TransactionId,
        data: TransactionData,
    ) -> Result<Transaction, Error> {
        data.validate()?;

        let mut storage = lock(&self.storage)?;
        check_category(&storage, &data)?;

        let mut transactions: Vec<Transaction> =
            storage.get_or_default(StorageKey::Transactions)?;
        let transaction = transactions
            .iter_mut()
            .find(|transaction| transaction.id == id)
            .ok_or(Error::UpdateMissingTransaction)?;

        *transaction = data.into_transaction(id, self.user_id, transaction.created_at);
        let transaction = transaction.clone();
        storage.set(StorageKey::Transactions, &transactions)?;

        Ok(transaction)
    }

    /// Delete a transaction.
    ///
    /// # Errors
    ///
    /// Returns [Error::DeleteMissingTransaction] if there is no such transaction, or a storage
    /// error.
    pub fn remove_transaction(&self, id: TransactionId) -> Result<(), Error> {
        let mut storage = lock(&self.storage)?;
        let mut transactions: Vec<Transaction> =
            storage.get_or_default(StorageKey::Transactions)?;

        let count_before = transactions.len();
        transactions.retain(|transaction| transaction.id != id);

        if transactions.len() == count_before {
            return Err(Error::DeleteMissingTransaction);
        }

        storage.set(StorageKey::Transactions, &transactions)
    }
}

fn check_category<S: KeyValueStore>(
    storage: &LocalStorage<S>,
    data: &TransactionData,
) -> Result<(), Error> {
    let Some(category_id) = data.category_id else {
        return Ok(());
    };

    let categories = CategoryLists::load(storage)?.all();
    ensure_category_matches(
        data.kind,
        Some(category_id),
        find_by_id(&categories, category_id),
    )
}

/// Clear the category of the transactions in `category_id` that satisfy `predicate`,
/// returning how many were changed.
fn detach(
    transactions: &mut [Transaction],
    category_id: CategoryId,
    predicate: impl Fn(&Transaction) -> bool,
) -> usize {
    let mut count = 0;

    for transaction in transactions
        .iter_mut()
        .filter(|transaction| transaction.category_id == Some(category_id))
    {
        if predicate(transaction) {
            transaction.category_id = None;
            count += 1;
        }
    }

    count
}

#[async_trait]
impl<S: KeyValueStore + 'static> Ledger for LocalLedger<S> {
    async fn categories(&self) -> Result<Vec<Category>, Error> {
        self.get_categories()
    }

    async fn create_category(&self, data: CategoryData) -> Result<Category, Error> {
        self.add_category(data)
    }

    async fn update_category(&self, id: CategoryId, data: CategoryData) -> Result<Category, Error> {
        self.edit_category(id, data)
    }

    async fn delete_category(&self, id: CategoryId) -> Result<(), Error> {
        self.remove_category(id)
    }

    async fn transactions(&self, range: Option<DateRange>) -> Result<Vec<Transaction>, Error> {
        self.get_transactions(range)
    }

    async fn create_transaction(&self, data: TransactionData) -> Result<Transaction, Error> {
        self.add_transaction(data)
    }

    async fn update_transaction(
        &self,
        id: TransactionId,
        data: TransactionData,
    ) -> Result<Transaction, Error> {
        self.edit_transaction(id, data)
    }

    async fn delete_transaction(&self, id: TransactionId) -> Result<(), Error> {
        self.remove_transaction(id)
    }
}

#[cfg(test)]
mod local_ledger_tests {
    use time::macros::date;

    use crate::{
        CategoryData, CategoryName, DateRange, Error, TransactionData, TransactionKind, UserID,
        backend::Ledger,
        category::find_by_name,
        local_ledger::LocalLedger,
        storage::{LocalStorage, MemoryStore},
    };

    fn get_test_ledger() -> LocalLedger<MemoryStore> {
        let storage = LocalStorage::open(MemoryStore::default()).unwrap().shared();
        let ledger = LocalLedger::new(storage, UserID::new(0));
        ledger.seed_default_categories().unwrap();

        ledger
    }

    fn expense(amount: f64, category_id: Option<i64>) -> TransactionData {
        TransactionData::new(TransactionKind::Expense, amount, date!(2025 - 03 - 14))
            .unwrap()
            .category(category_id)
    }

    #[test]
    fn seeding_twice_keeps_one_set_of_defaults() {
        let ledger = get_test_ledger();

        ledger.seed_default_categories().unwrap();

        assert_eq!(ledger.get_categories().unwrap().len(), 12);
    }

    #[test]
    fn add_category_assigns_next_id() {
        let ledger = get_test_ledger();

        let category = ledger
            .add_category(CategoryData::new(
                CategoryName::new_unchecked("Pets"),
                TransactionKind::Expense,
            ))
            .unwrap();

        assert_eq!(category.id, 13);
        assert_eq!(ledger.get_categories().unwrap().len(), 13);
    }

    #[test]
    fn add_category_rejects_duplicate_name_ignoring_case() {
        let ledger = get_test_ledger();

        let result = ledger.add_category(CategoryData::new(
            CategoryName::new_unchecked("FOOD"),
            TransactionKind::Expense,
        ));

        assert_eq!(result, Err(Error::DuplicateCategory("FOOD".to_owned())));
    }

    #[test]
    fn same_name_is_allowed_for_other_kind() {
        let ledger = get_test_ledger();

        let result = ledger.add_category(CategoryData::new(
            CategoryName::new_unchecked("Food"),
            TransactionKind::Income,
        ));

        assert!(result.is_ok());
    }

    #[test]
    fn deleting_food_detaches_its_transactions() {
        let ledger = get_test_ledger();
        let categories = ledger.get_categories().unwrap();
        let food = find_by_name(&categories, "Food", None).unwrap().clone();
        let transaction = ledger.add_transaction(expense(23.4, Some(food.id))).unwrap();

        ledger.remove_category(food.id).unwrap();

        let categories = ledger.get_categories().unwrap();
        let transactions = ledger.get_transactions(None).unwrap();
        assert!(find_by_name(&categories, "Food", None).is_none());
        assert_eq!(transactions.len(), 1);
        assert_eq!(transactions[0].id, transaction.id);
        assert_eq!(transactions[0].category_id, None);
        assert_eq!(transactions[0].amount, 23.4);
        assert_eq!(transactions[0].date, date!(2025 - 03 - 14));
    }

    #[test]
    fn remove_missing_category_fails() {
        let ledger = get_test_ledger();

        assert_eq!(ledger.remove_category(999), Err(Error::DeleteMissingCategory));
    }

    #[test]
    fn changing_category_kind_detaches_mismatched_transactions() {
        let ledger = get_test_ledger();
        let category = ledger
            .add_category(CategoryData::new(
                CategoryName::new_unchecked("Side Gig"),
                TransactionKind::Expense,
            ))
            .unwrap();
        ledger.add_transaction(expense(10.0, Some(category.id))).unwrap();

        ledger
            .edit_category(
                category.id,
                CategoryData::new(CategoryName::new_unchecked("Side Gig"), TransactionKind::Income),
            )
            .unwrap();

        let transactions = ledger.get_transactions(None).unwrap();
        assert_eq!(transactions[0].category_id, None);
    }

    #[test]
    fn add_transaction_rejects_category_of_other_kind() {
        let ledger = get_test_ledger();
        let categories = ledger.get_categories().unwrap();
        let salary = find_by_name(&categories, "Salary", None).unwrap();

        let result = ledger.add_transaction(expense(10.0, Some(salary.id)));

        assert_eq!(result, Err(Error::InvalidCategory(Some(salary.id))));
    }

    #[test]
    fn add_transaction_rejects_unknown_category() {
        let ledger = get_test_ledger();

        let result = ledger.add_transaction(expense(10.0, Some(404)));

        assert_eq!(result, Err(Error::InvalidCategory(Some(404))));
    }

    #[test]
    fn transactions_are_filtered_and_newest_first() {
        let ledger = get_test_ledger();
        for day in [date!(2025 - 02 - 28), date!(2025 - 03 - 02), date!(2025 - 03 - 20)] {
            ledger
                .add_transaction(TransactionData::new(TransactionKind::Expense, 5.0, day).unwrap())
                .unwrap();
        }

        let march = ledger
            .get_transactions(Some(DateRange::month_of(date!(2025 - 03 - 01))))
            .unwrap();

        let dates: Vec<_> = march.iter().map(|transaction| transaction.date).collect();
        assert_eq!(dates, vec![date!(2025 - 03 - 20), date!(2025 - 03 - 02)]);
    }

    #[test]
    fn edit_transaction_keeps_creation_time() {
        let ledger = get_test_ledger();
        let original = ledger.add_transaction(expense(10.0, None)).unwrap();

        let edited = ledger
            .edit_transaction(original.id, expense(12.0, None).description("Coffee"))
            .unwrap();

        assert_eq!(edited.amount, 12.0);
        assert_eq!(edited.description, "Coffee");
        assert_eq!(edited.created_at, original.created_at);
    }

    #[test]
    fn edit_and_remove_missing_transaction_fail() {
        let ledger = get_test_ledger();

        assert_eq!(
            ledger.edit_transaction(7, expense(1.0, None)),
            Err(Error::UpdateMissingTransaction)
        );
        assert_eq!(
            ledger.remove_transaction(7),
            Err(Error::DeleteMissingTransaction)
        );
    }

    #[tokio::test]
    async fn ledger_trait_delegates_to_storage() {
        let ledger = get_test_ledger();
        let boxed: Box<dyn Ledger> = Box::new(ledger.clone());

        let created = boxed.create_transaction(expense(3.0, None)).await.unwrap();
        boxed.delete_transaction(created.id).await.unwrap();

        assert!(boxed.transactions(None).await.unwrap().is_empty());
        assert_eq!(boxed.categories().await.unwrap().len(), 12);
    }
}
