use std::{collections::HashMap, path::PathBuf};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::errors::Error;

/// String-keyed durable slot the stores read and write whole documents through.
#[async_trait]
pub trait PersistencePort: Send + Sync {
    async fn load(&self, key: &str) -> Result<Option<String>, Error>;

    async fn save(&self, key: &str, value: &str) -> Result<(), Error>;
}

#[derive(Debug, Default)]
pub struct MemoryPort {
    slots: Mutex<HashMap<String, String>>,
}

impl MemoryPort {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_slot(key: &str, value: &str) -> Self {
        let mut slots = HashMap::new();
        slots.insert(key.to_string(), value.to_string());
        Self {
            slots: Mutex::new(slots),
        }
    }
}

#[async_trait]
impl PersistencePort for MemoryPort {
    async fn load(&self, key: &str) -> Result<Option<String>, Error> {
        Ok(self.slots.lock().await.get(key).cloned())
    }

    async fn save(&self, key: &str, value: &str) -> Result<(), Error> {
        self.slots
            .lock()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// One `<key>.json` file per slot under a data directory.
#[derive(Debug, Clone)]
pub struct FilePort {
    dir: PathBuf,
}

impl FilePort {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

#[async_trait]
impl PersistencePort for FilePort {
    async fn load(&self, key: &str) -> Result<Option<String>, Error> {
        match tokio::fs::read_to_string(self.path(key)).await {
            Ok(contents) => Ok(Some(contents)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(Error::persistence(err)),
        }
    }

    async fn save(&self, key: &str, value: &str) -> Result<(), Error> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(Error::persistence)?;

        // Readers only ever see a complete file.
        let target = self.path(key);
        let staging = self.dir.join(format!(".{key}.json.tmp"));
        tokio::fs::write(&staging, value)
            .await
            .map_err(Error::persistence)?;
        tokio::fs::rename(&staging, &target)
            .await
            .map_err(Error::persistence)
    }
}
