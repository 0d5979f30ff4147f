use anyhow::{Context, Result};
use std::{
    fs::{self, create_dir_all},
    io::ErrorKind,
    path::{Path, PathBuf},
};
use voiceiq_core::store::KeyValueStore;

/// Keeps each slot in its own `<key>.json` file inside a directory.
///
/// Every process using the same directory sees the same slots,
/// the last write wins.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn slot_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.slot_path(key);
        match fs::read_to_string(&path) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("Reading {}", path.display())),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        create_dir_all(&self.dir)
            .with_context(|| format!("Creating store directory {}", self.dir.display()))?;
        let path = self.slot_path(key);
        fs::write(&path, value).with_context(|| format!("Writing {}", path.display()))?;
        tracing::debug!(?path, "Wrote store slot");
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let path = self.slot_path(key);
        match fs::remove_file(&path) {
            Ok(()) => {
                tracing::debug!(?path, "Removed store slot");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("Removing {}", path.display())),
        }
    }
}
