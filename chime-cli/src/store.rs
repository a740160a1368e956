use chime_core::{ChimeError, FlagStore};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Flags persisted as a JSON object under the user's data directory, the
/// command-line stand-in for browser local storage.
pub struct FileFlags {
    path: PathBuf,
    values: BTreeMap<String, String>,
}

impl FileFlags {
    pub fn default_path() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("chime")
            .join("flags.json")
    }

    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let values = match std::fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str(&raw)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self { path, values })
    }

    pub fn entries(&self) -> impl Iterator<Item = (&String, &String)> {
        self.values.iter()
    }
}

impl FlagStore for FileFlags {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> chime_core::Result<()> {
        self.values.insert(key.to_string(), value.to_string());
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let raw = serde_json::to_string_pretty(&self.values).map_err(ChimeError::JsonError)?;
        std::fs::write(&self.path, raw)?;
        log::debug!("flag {}={} saved to {}", key, value, self.path.display());
        Ok(())
    }
}
