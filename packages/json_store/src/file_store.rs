use std::collections::{BTreeMap, BTreeSet};
use std::ffi::OsString;
use std::io::Write;
use std::sync::{Mutex, RwLock, RwLockWriteGuard};
use std::{fs, io, path};

use prefstore_core::observers::{dispatch, ObserverTable};
use prefstore_core::{Domains, Error, Key, Observer, ObserverId, Result, Store, Value};
use serde::{Deserialize, Serialize};

use crate::JsonStoreError;

const DOCUMENT_VERSION: u32 = 1;
const DEFAULT_FILE_NAME: &str = "preferences.json";

#[derive(Deserialize)]
struct Document {
    version: u32,
    #[serde(default)]
    values: BTreeMap<String, Value>,
}

#[derive(Serialize)]
struct DocumentRef<'a> {
    version: u32,
    values: BTreeMap<&'a str, &'a Value>,
}

/// A [`Store`] whose explicit values live in one JSON document on disk.
///
/// The file looks like
///
/// ```json
/// {
///   "version": 1,
///   "values": {
///     "volume": { "float": 17.5 },
///     "avatar": { "bytes": "iVBORw0KGgo=" }
///   }
/// }
/// ```
///
/// Every `set` and `remove` rewrites the whole document through a temporary
/// file and a rename, so readers never see a half-written file. Registered
/// defaults are kept in memory only; the program registers them again on
/// every launch.
///
/// The document is read once by [`open`](JsonFileStore::open). Changes made by
/// other processes become visible after [`reload`](JsonFileStore::reload).
#[derive(Debug)]
pub struct JsonFileStore {
    path: path::PathBuf,
    domains: RwLock<Domains>,
    observers: Mutex<ObserverTable>,
}

impl JsonFileStore {
    /// Open the preferences document at `path`.
    ///
    /// A missing file is an empty store; it is created on the first write,
    /// along with any missing parent directories.
    pub fn open(path: impl Into<path::PathBuf>) -> std::result::Result<Self, JsonStoreError> {
        let path = path.into();

        if let Ok(attr) = fs::metadata(&path) {
            if attr.is_dir() {
                return Err(JsonStoreError::PathInvalid {
                    path,
                    error: io::Error::other("Preferences path must be a file."),
                });
            }
            if attr.permissions().readonly() {
                return Err(JsonStoreError::PathInvalid {
                    path,
                    error: io::Error::other("Preferences file must be writable."),
                });
            }
        }

        let values = read_values(&path)?;
        log::debug!("Opened {} with {} values", path.display(), values.len());

        Ok(JsonFileStore {
            path,
            domains: RwLock::new(Domains {
                values,
                registered: BTreeMap::new(),
            }),
            observers: Mutex::new(ObserverTable::new()),
        })
    }

    /// Open `preferences.json` in the platform configuration directory for
    /// `app_name`, e.g. `~/.config/<app_name>/preferences.json` on Linux.
    pub fn open_default(app_name: &str) -> std::result::Result<Self, JsonStoreError> {
        let config_dir = dirs::config_dir().ok_or(JsonStoreError::NoConfigDir)?;
        Self::open(config_dir.join(app_name).join(DEFAULT_FILE_NAME))
    }

    pub fn path(&self) -> &path::Path {
        &self.path
    }

    /// Re-read the document and notify observers of every key whose explicit
    /// value differs from what this store held.
    ///
    /// Returns the changed keys in key order.
    pub fn reload(&self) -> Result<Vec<Key>> {
        let fresh = read_values(&self.path)?;

        let changed: Vec<Key> = {
            let mut domains = self.write_domains()?;
            let keys: BTreeSet<&Key> = domains.values.keys().chain(fresh.keys()).collect();
            let changed = keys
                .into_iter()
                .filter(|key| domains.values.get(*key) != fresh.get(*key))
                .cloned()
                .collect();
            domains.values = fresh;
            changed
        };

        log::debug!(
            "Reloaded {}: {} changed keys",
            self.path.display(),
            changed.len()
        );
        for key in &changed {
            self.notify(key)?;
        }
        Ok(changed)
    }

    fn write_domains(&self) -> Result<RwLockWriteGuard<'_, Domains>> {
        self.domains
            .write()
            .map_err(|_| Error::poisoned("json file store"))
    }

    fn notify(&self, key: &Key) -> Result<()> {
        let observers = self
            .observers
            .lock()
            .map_err(|_| Error::poisoned("observer table"))?
            .snapshot(key);
        dispatch(observers, key);
        Ok(())
    }
}

fn read_values(path: &path::Path) -> std::result::Result<BTreeMap<Key, Value>, JsonStoreError> {
    log::debug!("Reading {}...", path.display());

    let file = match fs::File::open(path) {
        Ok(file) => file,
        Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
        Err(error) => return Err(error.into()),
    };
    let document: Document = serde_json::from_reader(io::BufReader::new(file))?;

    if document.version != DOCUMENT_VERSION {
        return Err(JsonStoreError::UnsupportedVersion {
            found: document.version,
            expected: DOCUMENT_VERSION,
        });
    }

    Ok(document
        .values
        .into_iter()
        .map(|(key, value)| (Key::new(key), value))
        .collect())
}

fn write_values(
    path: &path::Path,
    values: &BTreeMap<Key, Value>,
) -> std::result::Result<(), JsonStoreError> {
    let document = DocumentRef {
        version: DOCUMENT_VERSION,
        values: values.iter().map(|(k, v)| (k.as_str(), v)).collect(),
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let temp = temp_path(path);
    log::debug!("Writing {}...", path.display());

    let written = (|| -> std::result::Result<(), JsonStoreError> {
        let mut file = fs::File::create(&temp)?;
        serde_json::to_writer_pretty(&mut file, &document)?;
        file.write_all(b"\n")?;
        file.sync_all()?;
        fs::rename(&temp, path)?;
        Ok(())
    })();

    if written.is_err() {
        let _ = fs::remove_file(&temp);
    }
    written
}

fn temp_path(path: &path::Path) -> path::PathBuf {
    let mut name = path
        .file_name()
        .map(OsString::from)
        .unwrap_or_else(|| OsString::from(DEFAULT_FILE_NAME));
    name.push(".tmp");
    path.with_file_name(name)
}

impl Store for JsonFileStore {
    fn get(&self, key: &Key) -> Result<Option<Value>> {
        let domains = self
            .domains
            .read()
            .map_err(|_| Error::poisoned("json file store"))?;
        Ok(domains.resolve(key).cloned())
    }

    fn set(&self, key: &Key, value: Value) -> Result<()> {
        {
            let mut domains = self.write_domains()?;
            let previous = domains.values.insert(key.clone(), value);
            if let Err(error) = write_values(&self.path, &domains.values) {
                match previous {
                    Some(previous) => domains.values.insert(key.clone(), previous),
                    None => domains.values.remove(key),
                };
                return Err(error.into());
            }
        }
        self.notify(key)
    }

    fn remove(&self, key: &Key) -> Result<()> {
        {
            let mut domains = self.write_domains()?;
            let Some(previous) = domains.values.remove(key) else {
                return Ok(());
            };
            if let Err(error) = write_values(&self.path, &domains.values) {
                domains.values.insert(key.clone(), previous);
                return Err(error.into());
            }
        }
        self.notify(key)
    }

    fn has(&self, key: &Key) -> Result<bool> {
        let domains = self
            .domains
            .read()
            .map_err(|_| Error::poisoned("json file store"))?;
        Ok(domains.values.contains_key(key))
    }

    fn register_default(&self, key: &Key, value: Value) -> Result<()> {
        self.write_domains()?.registered.insert(key.clone(), value);
        Ok(())
    }

    fn observe(&self, key: &Key, observer: Observer) -> Result<ObserverId> {
        let mut table = self
            .observers
            .lock()
            .map_err(|_| Error::poisoned("observer table"))?;
        Ok(table.insert(key, observer))
    }

    fn unobserve(&self, key: &Key, id: ObserverId) -> Result<bool> {
        let mut table = self
            .observers
            .lock()
            .map_err(|_| Error::poisoned("observer table"))?;
        Ok(table.remove(key, id))
    }
}

#[cfg(test)]
mod json_file_store_tests {
    use super::*;
    use std::sync::{Arc, Mutex as StdMutex};

    fn document(dir: &tempfile::TempDir) -> serde_json::Value {
        let text = fs::read_to_string(dir.path().join("prefs.json")).unwrap();
        serde_json::from_str(&text).unwrap()
    }

    #[test]
    fn missing_file_is_an_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::open(dir.path().join("prefs.json")).unwrap();

        assert_eq!(store.get(&Key::from_static("anything")).unwrap(), None);
        // Nothing written until the first change.
        assert!(!dir.path().join("prefs.json").exists());
    }

    #[test]
    fn values_survive_reopening() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("prefs.json");
        let volume = Key::from_static("volume");
        let avatar = Key::from_static("avatar");

        {
            let store = JsonFileStore::open(&path).unwrap();
            store.set(&volume, Value::Float(17.5)).unwrap();
            store.set(&avatar, Value::Bytes(vec![0, 159, 255])).unwrap();
        }

        let store = JsonFileStore::open(&path).unwrap();
        assert_eq!(store.get(&volume).unwrap(), Some(Value::Float(17.5)));
        assert_eq!(
            store.get(&avatar).unwrap(),
            Some(Value::Bytes(vec![0, 159, 255]))
        );
    }

    #[test]
    fn non_finite_floats_survive_reopening() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs.json");
        let gain = Key::from_static("gain");
        let ceiling = Key::from_static("ceiling");
        let name = Key::from_static("name");

        {
            let store = JsonFileStore::open(&path).unwrap();
            store.set(&gain, Value::Float(f64::NAN)).unwrap();
            store.set(&ceiling, Value::Float(f64::INFINITY)).unwrap();
            store.set(&name, Value::from("Alice")).unwrap();
        }

        assert_eq!(
            document(&dir)["values"]["gain"],
            serde_json::json!({"float": "NaN"})
        );

        let store = JsonFileStore::open(&path).unwrap();
        let gain = store.get(&gain).unwrap().and_then(|v| v.as_f64()).unwrap();
        assert!(gain.is_nan());
        assert_eq!(
            store.get(&ceiling).unwrap(),
            Some(Value::Float(f64::INFINITY))
        );
        assert_eq!(store.get(&name).unwrap(), Some(Value::from("Alice")));
    }

    #[test]
    fn document_layout() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::open(dir.path().join("prefs.json")).unwrap();

        store.set(&Key::from_static("dir"), Value::Integer(2)).unwrap();
        store
            .set(&Key::from_static("name"), Value::from("Alice"))
            .unwrap();
        store.remove(&Key::from_static("name")).unwrap();

        assert_eq!(
            document(&dir),
            serde_json::json!({
                "version": 1,
                "values": {
                    "dir": { "integer": 2 },
                },
            })
        );
        assert!(!dir.path().join("prefs.json.tmp").exists());
    }

    #[test]
    fn registered_defaults_are_not_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs.json");
        let key = Key::from_static("volume");

        {
            let store = JsonFileStore::open(&path).unwrap();
            store.register_default(&key, Value::Float(42.0)).unwrap();
            store.set(&Key::from_static("other"), Value::Bool(true)).unwrap();
            assert_eq!(store.get(&key).unwrap(), Some(Value::Float(42.0)));
        }

        let store = JsonFileStore::open(&path).unwrap();
        assert_eq!(store.get(&key).unwrap(), None);
    }

    #[test]
    fn corrupt_document_is_a_serialization_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs.json");
        fs::write(&path, b"{ not json").unwrap();

        let result = JsonFileStore::open(&path);

        assert!(matches!(
            result,
            Err(JsonStoreError::SerializationError(_))
        ));
    }

    #[test]
    fn unknown_version_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs.json");
        fs::write(&path, br#"{"version": 2, "values": {}}"#).unwrap();

        let result = JsonFileStore::open(&path);

        assert!(matches!(
            result,
            Err(JsonStoreError::UnsupportedVersion {
                found: 2,
                expected: 1
            })
        ));
    }

    #[test]
    fn directory_path_is_rejected() {
        let dir = tempfile::tempdir().unwrap();

        let result = JsonFileStore::open(dir.path());

        assert!(matches!(result, Err(JsonStoreError::PathInvalid { .. })));
    }

    #[test]
    fn reload_notifies_changed_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs.json");
        let volume = Key::from_static("volume");
        let name = Key::from_static("name");
        let dir_key = Key::from_static("dir");

        let store = JsonFileStore::open(&path).unwrap();
        store.set(&volume, Value::Float(1.0)).unwrap();
        store.set(&name, Value::from("Alice")).unwrap();

        let seen = Arc::new(StdMutex::new(Vec::new()));
        for key in [&volume, &name, &dir_key] {
            let sink = Arc::clone(&seen);
            store
                .observe(key, Arc::new(move |k: &Key| sink.lock().unwrap().push(k.clone())))
                .unwrap();
        }

        // Another process rewrites the file.
        let other = JsonFileStore::open(&path).unwrap();
        other.set(&volume, Value::Float(2.0)).unwrap();
        other.set(&dir_key, Value::Integer(1)).unwrap();

        let changed = store.reload().unwrap();

        assert_eq!(changed, vec![dir_key.clone(), volume.clone()]);
        assert_eq!(*seen.lock().unwrap(), vec![dir_key.clone(), volume.clone()]);
        assert_eq!(store.get(&volume).unwrap(), Some(Value::Float(2.0)));
        assert_eq!(store.get(&name).unwrap(), Some(Value::from("Alice")));
    }

    #[test]
    fn reload_of_deleted_file_clears_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs.json");
        let key = Key::from_static("k");

        let store = JsonFileStore::open(&path).unwrap();
        store.register_default(&key, Value::Integer(0)).unwrap();
        store.set(&key, Value::Integer(5)).unwrap();
        fs::remove_file(&path).unwrap();

        assert_eq!(store.reload().unwrap(), vec![key.clone()]);
        assert_eq!(store.get(&key).unwrap(), Some(Value::Integer(0)));
    }

    #[test]
    fn failed_write_leaves_memory_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs.json");
        let key = Key::from_static("k");

        let store = JsonFileStore::open(&path).unwrap();
        store.set(&key, Value::Integer(1)).unwrap();
        // The temporary file cannot be created over a directory.
        fs::create_dir(dir.path().join("prefs.json.tmp")).unwrap();

        assert!(store.set(&key, Value::Integer(2)).is_err());
        assert!(store.remove(&key).is_err());
        assert_eq!(store.get(&key).unwrap(), Some(Value::Integer(1)));
        assert_eq!(document(&dir)["values"]["k"], serde_json::json!({ "integer": 1 }));
    }
}
