//! config.rs — startup secrets.
//!
//! Both keys come from one JSON file, `api_keys.json` next to the binary by
//! default. A missing or malformed file is a startup failure; there is no
//! point polling without a transport token or querying wigle without a key.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

pub const DEFAULT_PATH: &str = "api_keys.json";

#[derive(Debug, Deserialize)]
pub struct ApiKeys {
    pub wigle_key: String,
    pub telegram_key: String,
}

impl ApiKeys {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading api keys from {}", path.display()))?;
        let keys: ApiKeys = serde_json::from_str(&raw)
            .with_context(|| format!("parsing api keys from {}", path.display()))?;
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_both_keys() {
        let keys: ApiKeys =
            serde_json::from_str(r#"{"wigle_key": "QWxhZGRpbg==", "telegram_key": "123:abc"}"#)
                .unwrap();
        assert_eq!(keys.wigle_key, "QWxhZGRpbg==");
        assert_eq!(keys.telegram_key, "123:abc");
    }

    #[test]
    fn missing_key_is_an_error() {
        let res: Result<ApiKeys, _> = serde_json::from_str(r#"{"wigle_key": "x"}"#);
        assert!(res.is_err());
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(ApiKeys::load(Path::new("/nonexistent/api_keys.json")).is_err());
    }
}
