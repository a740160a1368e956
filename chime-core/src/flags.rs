use crate::errors::Result;
use std::collections::HashMap;

/// Set to `"true"` while a Telegram payment is in flight.
pub const TELEGRAM_FLAG: &str = "telegram";
pub const COUNTRY_FLAG: &str = "country";
pub const DEFAULT_COUNTRY: &str = "Nigeria";

/// Client-side values that outlive a single page visit.
pub trait FlagStore {
    fn get(&self, key: &str) -> Option<String>;

    fn set(&mut self, key: &str, value: &str) -> Result<()>;
}

#[derive(Debug, Clone, Default)]
pub struct MemoryFlags {
    values: HashMap<String, String>,
}

impl MemoryFlags {
    pub fn with(mut self, key: &str, value: &str) -> Self {
        self.values.insert(key.to_string(), value.to_string());
        self
    }
}

impl FlagStore for MemoryFlags {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

pub fn country(flags: &dyn FlagStore) -> String {
    flags
        .get(COUNTRY_FLAG)
        .filter(|c| !c.is_empty())
        .unwrap_or_else(|| DEFAULT_COUNTRY.to_string())
}
