use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use crate::{Error, storage::KeyValueStore};

const STORAGE_FILE_NAME: &str = "storage.json";

/// A [KeyValueStore] persisted as a single JSON object on disk.
///
/// Every write rewrites the whole file. Writes go to a temporary file that is then renamed over
/// the old one, so a crash mid-write leaves the previous contents intact.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    items: BTreeMap<String, String>,
}

impl FileStore {
    /// Open the store kept in `directory`, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns [Error::StorageIo] if the directory cannot be created or the file cannot be read,
    /// and [Error::CorruptStorage] if the file is not a JSON object of strings.
    pub fn open(directory: &Path) -> Result<Self, Error> {
        fs::create_dir_all(directory).map_err(|error| {
            Error::StorageIo(format!("could not create {}: {error}", directory.display()))
        })?;

        let path = directory.join(STORAGE_FILE_NAME);

        let items = match fs::read_to_string(&path) {
            Ok(contents) if contents.trim().is_empty() => BTreeMap::new(),
            Ok(contents) => {
                serde_json::from_str(&contents).map_err(|error| Error::CorruptStorage {
                    key: STORAGE_FILE_NAME.to_owned(),
                    message: error.to_string(),
                })?
            }
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(error) => {
                return Err(Error::StorageIo(format!(
                    "could not read {}: {error}",
                    path.display()
                )));
            }
        };

        Ok(Self { path, items })
    }

    /// The path of the storage file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self) -> Result<(), Error> {
        let contents = serde_json::to_string_pretty(&self.items)?;
        let temp_path = self.path.with_extension("json.tmp");

        fs::write(&temp_path, contents).map_err(|error| {
            Error::StorageIo(format!("could not write {}: {error}", temp_path.display()))
        })?;

        fs::rename(&temp_path, &self.path).map_err(|error| {
            Error::StorageIo(format!(
                "could not replace {}: {error}",
                self.path.display()
            ))
        })
    }
}

impl KeyValueStore for FileStore {
    fn get_item(&self, key: &str) -> Result<Option<String>, Error> {
        Ok(self.items.get(key).cloned())
    }

    fn set_item(&mut self, key: &str, value: &str) -> Result<(), Error> {
        self.items.insert(key.to_owned(), value.to_owned());
        self.flush()
    }

    fn remove_item(&mut self, key: &str) -> Result<(), Error> {
        if self.items.remove(key).is_some() {
            self.flush()?;
        }

        Ok(())
    }
}
