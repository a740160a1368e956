use crate::errors::{ChimeError, Result};
use serde::{Deserialize, Serialize};
use url::Url;

/// Fixed chunk size: 1 MiB.
pub const DEFAULT_CHUNK_SIZE: u64 = 1_048_576;
pub const DEFAULT_UPLOAD_BASE_URL: &str = "http://localhost:8000/api/admin/";
pub const DEFAULT_ADMIN_BASE_URL: &str = "http://localhost:8000/api/admin/";
pub const DEFAULT_USER_BASE_URL: &str = "http://localhost:8000/api/user/";
pub const DEFAULT_CART_BASE_URL: &str = "http://localhost:8000/api/cart/";
pub const DEFAULT_ROBOT_BASE_URL: &str = "https://chimetrading.com/api/chime/";
pub const DEFAULT_SUPPORT_CHANNEL_URL: &str = "https://t.me/+w2DV7vqf0TplNDk0";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub upload_base_url: String,
    pub admin_base_url: String,
    pub user_base_url: String,
    pub cart_base_url: String,
    pub robot_base_url: String,
    pub support_channel_url: String,
    pub chunk_size: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            upload_base_url: DEFAULT_UPLOAD_BASE_URL.to_string(),
            admin_base_url: DEFAULT_ADMIN_BASE_URL.to_string(),
            user_base_url: DEFAULT_USER_BASE_URL.to_string(),
            cart_base_url: DEFAULT_CART_BASE_URL.to_string(),
            robot_base_url: DEFAULT_ROBOT_BASE_URL.to_string(),
            support_channel_url: DEFAULT_SUPPORT_CHANNEL_URL.to_string(),
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(ChimeError::ConfigError(
                "chunk size must be greater than zero".to_string(),
            ));
        }
        for url in [
            &self.upload_base_url,
            &self.admin_base_url,
            &self.user_base_url,
            &self.cart_base_url,
            &self.robot_base_url,
            &self.support_channel_url,
        ] {
            Url::parse(url).map_err(|e| ChimeError::ConfigError(format!("{}: {}", url, e)))?;
        }
        Ok(())
    }
}

/// Parse a base URL and make sure it ends in `/`, so relative endpoints
/// join beneath it instead of replacing its last segment.
pub fn base_url(raw: &str) -> Result<Url> {
    let mut url = Url::parse(raw).map_err(|e| ChimeError::ConfigError(format!("{}: {}", raw, e)))?;
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_gains_trailing_slash() {
        let url = base_url("http://localhost:8000/api/admin").unwrap();
        assert_eq!(url.join("upload").unwrap().as_str(), "http://localhost:8000/api/admin/upload");

        let url = base_url("http://localhost:8000/api/admin/").unwrap();
        assert_eq!(url.join("courses/create").unwrap().as_str(), "http://localhost:8000/api/admin/courses/create");
    }

    #[test]
    fn zero_chunk_size_is_rejected() {
        let config = Config { chunk_size: 0, ..Config::default() };
        assert!(matches!(config.validate(), Err(ChimeError::ConfigError(_))));
        assert!(Config::default().validate().is_ok());
    }
}
