//! Filesystem layout helpers and script persistence
//!
//! Manages the `.marionette/` directory (config file plus script folder),
//! ensures atomic writes via temp files and renames, and provides the
//! [`ScriptStore`] seam the script library reloads from.

use anyhow::{Context, Result};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use super::RuntimeConfig;
use super::error::{RuntimeError, StorageError, StorageResult};
use super::script::ScriptSource;

/// File extension of script files
pub const SCRIPT_EXTENSION: &str = "ms";

/// Storage manager for runtime persistence
#[derive(Debug, Clone)]
pub struct Storage {
    root: PathBuf,
}

impl Storage {
    /// Create a new storage manager
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Get the root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Get the config file path
    pub fn config_path(&self) -> PathBuf {
        self.root.join("config.json")
    }

    /// Get the script directory for `config`
    pub fn scripts_dir(&self, config: &RuntimeConfig) -> PathBuf {
        self.root.join(&config.scripts_dir)
    }

    /// Write data atomically to a file
    ///
    /// Creates a temporary file, writes the data, syncs, then renames
    pub fn write_atomic(&self, path: &Path, data: &[u8]) -> Result<()> {
        let temp_path = path.with_extension("tmp");

        let mut file = File::create(&temp_path)
            .with_context(|| format!("Failed to create temp file: {:?}", temp_path))?;

        file.write_all(data).context("Failed to write data")?;

        file.sync_all().context("Failed to sync file")?;

        drop(file);

        fs::rename(&temp_path, path)
            .with_context(|| format!("Failed to rename {:?} to {:?}", temp_path, path))?;

        if let Some(parent) = path.parent() {
            let dir = OpenOptions::new()
                .read(true)
                .open(parent)
                .with_context(|| format!("Failed to open directory: {:?}", parent))?;

            dir.sync_all().context("Failed to sync directory")?;
        }

        Ok(())
    }

    /// Read a file
    pub fn read_file(&self, path: &Path) -> Result<Vec<u8>> {
        fs::read(path).with_context(|| format!("Failed to read file: {:?}", path))
    }

    /// Create a directory and all parent directories
    pub fn create_dir_all(&self, path: &Path) -> Result<()> {
        fs::create_dir_all(path)
            .with_context(|| format!("Failed to create directory: {:?}", path))
    }
}

/// Initialize storage directories for a new runtime
pub fn init_storage(config: &RuntimeConfig) -> Result<()> {
    let storage = Storage::new(config.root.clone());

    storage.create_dir_all(&config.root)?;
    storage.create_dir_all(&storage.scripts_dir(config))?;

    Ok(())
}

/// Write runtime configuration
pub fn write_config(config: &RuntimeConfig) -> Result<()> {
    let storage = Storage::new(config.root.clone());
    let config_path = storage.config_path();

    let json = serde_json::to_vec_pretty(config).context("Failed to serialize config")?;

    storage.write_atomic(&config_path, &json)?;

    Ok(())
}

/// Load runtime configuration
pub fn load_config(root: &Path) -> Result<RuntimeConfig> {
    let storage = Storage::new(root.to_path_buf());
    let config_path = storage.config_path();
    if !config_path.is_file() {
        return Err(RuntimeError::from(StorageError::NotInitialised(root.to_path_buf())).into());
    }

    let data = storage.read_file(&config_path)?;
    let mut config: RuntimeConfig =
        serde_json::from_slice(&data).context("Failed to deserialize config")?;
    // The directory the config was found in wins over a stale stored root.
    config.root = root.to_path_buf();

    Ok(config)
}

/// Where scripts are loaded from
pub trait ScriptStore: Send + Sync {
    /// Prepare the store (create folders, open connections)
    fn init(&self) -> StorageResult<()>;

    /// Load every stored script
    fn load_all(&self) -> StorageResult<Vec<ScriptSource>>;
}

/// One `.ms` file per script in a directory
#[derive(Debug, Clone)]
pub struct DirectoryStore {
    dir: PathBuf,
}

impl DirectoryStore {
    /// Store rooted at `dir`
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    /// Script directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl ScriptStore for DirectoryStore {
    fn init(&self) -> StorageResult<()> {
        fs::create_dir_all(&self.dir)?;
        Ok(())
    }

    fn load_all(&self) -> StorageResult<Vec<ScriptSource>> {
        if !self.dir.is_dir() {
            return Err(StorageError::NotInitialised(self.dir.clone()));
        }

        let mut paths = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            let is_script = path
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case(SCRIPT_EXTENSION));
            if path.is_file() && is_script {
                paths.push(path);
            }
        }
        paths.sort();

        paths
            .into_iter()
            .map(|path| {
                let bytes = fs::read(&path)?;
                let body =
                    String::from_utf8(bytes).map_err(|err| StorageError::MalformedScript {
                        path: path.clone(),
                        detail: err.to_string(),
                    })?;
                let name = path
                    .file_stem()
                    .and_then(|stem| stem.to_str())
                    .ok_or_else(|| StorageError::MalformedScript {
                        path: path.clone(),
                        detail: "file name is not valid UTF-8".to_string(),
                    })?;
                Ok(ScriptSource::new(name, body))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config_in(temp: &TempDir) -> RuntimeConfig {
        RuntimeConfig {
            root: temp.path().to_path_buf(),
            ..RuntimeConfig::default()
        }
    }

    #[test]
    fn test_init_storage() {
        let temp = TempDir::new().unwrap();
        let config = config_in(&temp);

        init_storage(&config).unwrap();

        assert!(temp.path().join("scripts").is_dir());
    }

    #[test]
    fn test_write_and_read_config() {
        let temp = TempDir::new().unwrap();
        let config = RuntimeConfig {
            reload_interval_secs: 5,
            enforce_unique_ids: true,
            debug: true,
            ..config_in(&temp)
        };

        init_storage(&config).unwrap();
        write_config(&config).unwrap();
        let loaded = load_config(temp.path()).unwrap();

        assert_eq!(loaded.reload_interval_secs, 5);
        assert!(loaded.enforce_unique_ids);
        assert!(loaded.debug);
    }

    #[test]
    fn load_config_requires_init() {
        let temp = TempDir::new().unwrap();
        let err = load_config(temp.path()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<RuntimeError>(),
            Some(RuntimeError::Storage(StorageError::NotInitialised(_)))
        ));
    }

    #[test]
    fn test_atomic_write() {
        let temp = TempDir::new().unwrap();
        let storage = Storage::new(temp.path().to_path_buf());
        let test_file = temp.path().join("test.dat");

        let data = b"Hello, world!";
        storage.write_atomic(&test_file, data).unwrap();

        let read_data = storage.read_file(&test_file).unwrap();
        assert_eq!(data, &read_data[..]);
    }

    #[test]
    fn directory_store_loads_scripts_in_name_order() {
        let temp = TempDir::new().unwrap();
        let store = DirectoryStore::new(temp.path().join("scripts"));
        store.init().unwrap();
        fs::write(store.dir().join("b.ms"), "log b").unwrap();
        fs::write(store.dir().join("a.ms"), "log a").unwrap();
        fs::write(store.dir().join("notes.txt"), "ignored").unwrap();

        let scripts = store.load_all().unwrap();
        let names: Vec<_> = scripts.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(scripts[0].body, "log a");
    }

    #[test]
    fn directory_store_requires_init() {
        let temp = TempDir::new().unwrap();
        let store = DirectoryStore::new(temp.path().join("missing"));
        assert!(matches!(
            store.load_all(),
            Err(StorageError::NotInitialised(_))
        ));
    }

    #[test]
    fn non_utf8_script_is_malformed() {
        let temp = TempDir::new().unwrap();
        let store = DirectoryStore::new(temp.path().to_path_buf());
        fs::write(temp.path().join("bad.ms"), [0xff, 0xfe, 0x00]).unwrap();
        assert!(matches!(
            store.load_all(),
            Err(StorageError::MalformedScript { .. })
        ));
    }
}
