//! Typed, versioned client-side storage.
//!
//! The client keeps its session and cached data in a small key/value store, the same way a
//! browser app would use local storage. [KeyValueStore] is the raw string interface that
//! backends implement, and [LocalStorage] layers the typed schema on top: every key is a
//! [StorageKey] and every value is JSON.

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Serialize, de::DeserializeOwned};

use crate::Error;

/// Local storage shared between the session manager and the local ledgers.
pub type SharedStorage<S> = Arc<Mutex<LocalStorage<S>>>;

/// Lock shared storage.
///
/// # Errors
///
/// Returns [Error::StorageLockError] if the lock is poisoned.
pub fn lock<S>(storage: &SharedStorage<S>) -> Result<MutexGuard<'_, LocalStorage<S>>, Error> {
    storage.lock().map_err(|_| Error::StorageLockError)
}

/// The version of the storage schema written by this build.
///
/// Bump this when the shape of a stored value changes.
pub const SCHEMA_VERSION: u32 = 1;

/// Every key the client stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageKey {
    /// The access token of the current session.
    Token,
    /// The refresh token of the current session.
    RefreshToken,
    /// When the access token expires.
    TokenExpiresAt,
    /// The [SessionUser](crate::SessionUser) snapshot of the signed-in user.
    UserData,
    /// The [Profile](crate::Profile) of the signed-in user.
    UserProfile,
    /// Transactions of a demo session.
    Transactions,
    /// Categories created by the user in a demo session.
    CustomCategories,
    /// The default categories of a demo session.
    Categories,
    /// Bill reminders.
    Reminders,
    /// The overall monthly spending limit.
    MonthlyBudget,
    /// The shopping list.
    CartItems,
    /// Reminders that have been paid.
    PaidRemindersHistory,
    /// Set when the session belongs to the demo account.
    DemoSession,
    /// The schema version of the stored data.
    SchemaVersion,
}

impl StorageKey {
    /// All storage keys.
    pub const ALL: [StorageKey; 14] = [
        StorageKey::Token,
        StorageKey::RefreshToken,
        StorageKey::TokenExpiresAt,
        StorageKey::UserData,
        StorageKey::UserProfile,
        StorageKey::Transactions,
        StorageKey::CustomCategories,
        StorageKey::Categories,
        StorageKey::Reminders,
        StorageKey::MonthlyBudget,
        StorageKey::CartItems,
        StorageKey::PaidRemindersHistory,
        StorageKey::DemoSession,
        StorageKey::SchemaVersion,
    ];

    /// The string key used in the underlying store.
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageKey::Token => "token",
            StorageKey::RefreshToken => "refreshToken",
            StorageKey::TokenExpiresAt => "tokenExpiresAt",
            StorageKey::UserData => "userData",
            StorageKey::UserProfile => "userProfile",
            StorageKey::Transactions => "transactions",
            StorageKey::CustomCategories => "customCategories",
            StorageKey::Categories => "categories",
            StorageKey::Reminders => "reminders",
            StorageKey::MonthlyBudget => "monthlyBudget",
            StorageKey::CartItems => "cartItems",
            StorageKey::PaidRemindersHistory => "paidRemindersHistory",
            StorageKey::DemoSession => "isDemoSession",
            StorageKey::SchemaVersion => "schemaVersion",
        }
    }

    /// The keys holding cached client state, i.e. everything except the schema version.
    ///
    /// These are the keys cleared when the user logs out.
    pub fn cached() -> impl Iterator<Item = StorageKey> {
        StorageKey::ALL
            .into_iter()
            .filter(|key| *key != StorageKey::SchemaVersion)
    }
}

/// Raw string storage, e.g. an in-memory map or a file on disk.
pub trait KeyValueStore: Send {
    /// Get the value stored under `key`, `None` if there is none.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn get_item(&self, key: &str) -> Result<Option<String>, Error>;

    /// Store `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be written.
    fn set_item(&mut self, key: &str, value: &str) -> Result<(), Error>;

    /// Remove the value stored under `key`. Removing a missing key is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be written.
    fn remove_item(&mut self, key: &str) -> Result<(), Error>;
}

/// Typed access to a [KeyValueStore].
#[derive(Debug)]
pub struct LocalStorage<S> {
    store: S,
}

impl<S: KeyValueStore> LocalStorage<S> {
    /// Open `store`, stamping empty stores with [SCHEMA_VERSION].
    ///
    /// # Errors
    ///
    /// Returns [Error::UnsupportedSchemaVersion] if the store was written by a newer build, or an
    /// error if the store cannot be read or written.
    pub fn open(store: S) -> Result<Self, Error> {
        let mut storage = Self { store };

        match storage.get::<u32>(StorageKey::SchemaVersion)? {
            Some(found) if found > SCHEMA_VERSION => {
                return Err(Error::UnsupportedSchemaVersion {
                    found,
                    supported: SCHEMA_VERSION,
                });
            }
            Some(found) if found < SCHEMA_VERSION => {
                tracing::info!("Upgrading local storage from schema version {found} to {SCHEMA_VERSION}");
                storage.set(StorageKey::SchemaVersion, &SCHEMA_VERSION)?;
            }
            Some(_) => {}
            None => storage.set(StorageKey::SchemaVersion, &SCHEMA_VERSION)?,
        }

        Ok(storage)
    }

    /// Get and decode the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns [Error::CorruptStorage] if the stored value is not valid JSON for `T`.
    pub fn get<T: DeserializeOwned>(&self, key: StorageKey) -> Result<Option<T>, Error> {
        let Some(raw_value) = self.store.get_item(key.as_str())? else {
            return Ok(None);
        };

        serde_json::from_str(&raw_value)
            .map(Some)
            .map_err(|error| Error::CorruptStorage {
                key: key.as_str().to_owned(),
                message: error.to_string(),
            })
    }

    /// Like [LocalStorage::get], but returns `T::default()` if there is no value.
    ///
    /// # Errors
    ///
    /// Returns [Error::CorruptStorage] if the stored value is not valid JSON for `T`.
    pub fn get_or_default<T: DeserializeOwned + Default>(&self, key: StorageKey) -> Result<T, Error> {
        self.get(key).map(Option::unwrap_or_default)
    }

    /// Encode `value` as JSON and store it under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the value cannot be encoded or the store cannot be written.
    pub fn set<T: Serialize + ?Sized>(&mut self, key: StorageKey, value: &T) -> Result<(), Error> {
        let raw_value = serde_json::to_string(value)?;
        self.store.set_item(key.as_str(), &raw_value)
    }

    /// Remove the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be written.
    pub fn remove(&mut self, key: StorageKey) -> Result<(), Error> {
        self.store.remove_item(key.as_str())
    }

    /// Remove every cached key (see [StorageKey::cached]).
    ///
    /// Every key is attempted even if removing an earlier one fails.
    ///
    /// # Errors
    ///
    /// Returns the first error encountered.
    pub fn clear_cached(&mut self) -> Result<(), Error> {
        let mut first_error = None;

        for key in StorageKey::cached() {
            if let Err(error) = self.remove(key) {
                tracing::error!("Could not remove \"{}\" from local storage: {error}", key.as_str());
                first_error.get_or_insert(error);
            }
        }

        match first_error {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    /// The underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Wrap the storage for sharing.
    pub fn shared(self) -> SharedStorage<S> {
        Arc::new(Mutex::new(self))
    }
}

#[cfg(test)]
mod local_storage_tests {
    use serde::{Deserialize, Serialize};

    use crate::{
        Error,
        storage::{LocalStorage, MemoryStore, SCHEMA_VERSION, StorageKey},
    };

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Snapshot {
        name: String,
        count: u32,
    }

    #[test]
    fn open_stamps_schema_version() {
        let storage = LocalStorage::open(MemoryStore::default()).unwrap();

        assert_eq!(
            storage.get::<u32>(StorageKey::SchemaVersion),
            Ok(Some(SCHEMA_VERSION))
        );
    }

    #[test]
    fn open_fails_on_newer_schema_version() {
        let store = MemoryStore::default().with_item("schemaVersion", "99");

        let result = LocalStorage::open(store);

        assert!(matches!(
            result,
            Err(Error::UnsupportedSchemaVersion {
                found: 99,
                supported: SCHEMA_VERSION
            })
        ));
    }

    #[test]
    fn set_then_get_returns_typed_value() {
        let mut storage = LocalStorage::open(MemoryStore::default()).unwrap();
        let snapshot = Snapshot {
            name: "Jane".to_owned(),
            count: 3,
        };

        storage.set(StorageKey::UserData, &snapshot).unwrap();

        assert_eq!(storage.get(StorageKey::UserData), Ok(Some(snapshot)));
        assert_eq!(
            storage.store().get("userData"),
            Some(r#"{"name":"Jane","count":3}"#)
        );
    }

    #[test]
    fn get_missing_key_returns_none() {
        let storage = LocalStorage::open(MemoryStore::default()).unwrap();

        assert_eq!(storage.get::<String>(StorageKey::Token), Ok(None));
        assert_eq!(
            storage.get_or_default::<Vec<u32>>(StorageKey::Reminders),
            Ok(vec![])
        );
    }

    #[test]
    fn get_malformed_json_returns_corrupt_storage_error() {
        let store = MemoryStore::default().with_item("transactions", "[{not json");
        let storage = LocalStorage::open(store).unwrap();

        let result = storage.get::<Vec<u32>>(StorageKey::Transactions);

        assert!(
            matches!(result, Err(Error::CorruptStorage { ref key, .. }) if key == "transactions"),
            "got {result:?}"
        );
    }

    #[test]
    fn clear_cached_keeps_schema_version() {
        let mut storage = LocalStorage::open(MemoryStore::default()).unwrap();
        for key in StorageKey::cached() {
            storage.set(key, "value").unwrap();
        }

        storage.clear_cached().unwrap();

        for key in StorageKey::cached() {
            assert_eq!(storage.get::<String>(key), Ok(None), "{key:?} was not cleared");
        }
        assert_eq!(
            storage.get::<u32>(StorageKey::SchemaVersion),
            Ok(Some(SCHEMA_VERSION))
        );
    }

    #[test]
    fn storage_keys_are_unique() {
        for (i, key) in StorageKey::ALL.iter().enumerate() {
            assert!(
                StorageKey::ALL[i + 1..]
                    .iter()
                    .all(|other| other.as_str() != key.as_str()),
                "{key:?} is duplicated"
            );
        }
    }
}
