use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::rc::Rc;

use anyhow::{Context, anyhow};
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::task::Task;

pub const DEFAULT_STORAGE_KEY: &str = "tasks";

/// Persistence port for the whole task collection.
///
/// `load` returns `Ok(None)` when nothing has been stored under the key yet.
/// Callers decide what a failed or empty load means; the store treats both as
/// an empty collection.
pub trait TaskStorage {
    fn load(&self) -> anyhow::Result<Option<Vec<Task>>>;

    fn save(&self, tasks: &[Task]) -> anyhow::Result<()>;
}

/// One key, one JSON file: `<data_dir>/<key>.json` holding an array of tasks.
#[derive(Debug, Clone)]
pub struct JsonFileStorage {
    pub data_dir: PathBuf,
    pub path: PathBuf,
}

impl JsonFileStorage {
    #[tracing::instrument(skip(data_dir))]
    pub fn open(data_dir: &Path, key: &str) -> anyhow::Result<Self> {
        if key.trim().is_empty() {
            return Err(anyhow!("storage key cannot be empty"));
        }
        if key.contains(['/', '\\']) || key == ".." || key == "." {
            return Err(anyhow!("storage key must be a plain name, got {key:?}"));
        }

        let data_dir = data_dir.to_path_buf();
        fs::create_dir_all(&data_dir)
            .with_context(|| format!("failed to create {}", data_dir.display()))?;

        let path = data_dir.join(format!("{key}.json"));
        info!(
            data_dir = %data_dir.display(),
            file = %path.display(),
            "opened task storage"
        );

        Ok(Self { data_dir, path })
    }
}

impl TaskStorage for JsonFileStorage {
    #[tracing::instrument(skip(self), fields(file = %self.path.display()))]
    fn load(&self) -> anyhow::Result<Option<Vec<Task>>> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!("no stored tasks yet");
                return Ok(None);
            }
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("failed reading {}", self.path.display()));
            }
        };

        let tasks = parse_tasks(&raw)
            .with_context(|| format!("failed parsing {}", self.path.display()))?;
        debug!(count = tasks.len(), "loaded tasks");
        Ok(Some(tasks))
    }

    #[tracing::instrument(skip(self, tasks), fields(file = %self.path.display(), count = tasks.len()))]
    fn save(&self, tasks: &[Task]) -> anyhow::Result<()> {
        save_json_atomic(&self.path, tasks)
            .with_context(|| format!("failed to save {}", self.path.display()))
    }
}

/// In-process key-value storage. Clones share the same backing map, so a test can
/// keep a handle and inspect what the store wrote.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    key: String,
    entries: Rc<RefCell<HashMap<String, String>>>,
    fail_saves: Rc<Cell<bool>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::with_key(DEFAULT_STORAGE_KEY)
    }

    pub fn with_key(key: &str) -> Self {
        Self {
            key: key.to_string(),
            ..Self::default()
        }
    }

    /// Stores raw text under the key, bypassing serialization.
    pub fn put_raw(&self, raw: impl Into<String>) {
        self.entries.borrow_mut().insert(self.key.clone(), raw.into());
    }

    pub fn raw(&self) -> Option<String> {
        self.entries.borrow().get(&self.key).cloned()
    }

    pub fn set_fail_saves(&self, fail: bool) {
        self.fail_saves.set(fail);
    }
}

impl TaskStorage for MemoryStorage {
    fn load(&self) -> anyhow::Result<Option<Vec<Task>>> {
        match self.raw() {
            Some(raw) => parse_tasks(&raw).map(Some),
            None => Ok(None),
        }
    }

    fn save(&self, tasks: &[Task]) -> anyhow::Result<()> {
        if self.fail_saves.get() {
            return Err(anyhow!("storage rejected write for key {}", self.key));
        }
        let serialized = serde_json::to_string(tasks)?;
        self.put_raw(serialized);
        Ok(())
    }
}

/// Parsing is the only validation applied to stored data.
pub fn parse_tasks(raw: &str) -> anyhow::Result<Vec<Task>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }
    Ok(serde_json::from_str(trimmed)?)
}

fn save_json_atomic(path: &Path, tasks: &[Task]) -> anyhow::Result<()> {
    debug!(file = %path.display(), count = tasks.len(), "saving tasks atomically");

    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut temp = NamedTempFile::new_in(dir)?;
    serde_json::to_writer_pretty(&mut temp, tasks)?;
    writeln!(temp)?;
    temp.flush()?;

    temp.persist(path)
        .map_err(|err| anyhow!("failed to persist {}: {}", path.display(), err))?;

    Ok(())
}
