use serde::{Deserialize, Serialize};
use std::{fs::File, io::BufReader, path::Path};

use crate::{Error, InternalResult};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RegistryConfig {
    /// First id handed out by the built-in sequential allocator
    #[serde(default = "default_first_listener_id")]
    pub first_listener_id: i64,

    /// Wrap each callback argument in `(quote ...)` before evaluation
    #[serde(default = "default_true")]
    pub quote_arguments: bool,

    #[serde(default = "default_lifecycle_buffer_size")]
    pub lifecycle_buffer_size: usize,

    /// Event names whose registrations are accepted and dropped
    #[serde(default)]
    pub ignored_directives: Vec<String>,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            first_listener_id: default_first_listener_id(),
            quote_arguments: default_true(),
            lifecycle_buffer_size: default_lifecycle_buffer_size(),
            ignored_directives: vec![],
        }
    }
}

impl RegistryConfig {
    // JSONファイルから設定を読み込む
    pub fn from_file<P: AsRef<Path>>(path: P) -> InternalResult<Self> {
        from_file(path)
    }

    pub fn from_str(s: &str) -> InternalResult<Self> {
        from_str(s)
    }
}

pub fn from_file<T: for<'de> Deserialize<'de>, P: AsRef<Path>>(path: P) -> InternalResult<T> {
    let file = File::open(path)
        .map_err(|e| Error::Internal(format!("Failed to open config file: {}", e)))?;
    let reader = BufReader::new(file);
    let config = serde_json::from_reader(reader)
        .map_err(|e| Error::Internal(format!("Failed to parse config file: {}", e)))?;
    Ok(config)
}

pub fn from_str<T: for<'de> Deserialize<'de>>(s: &str) -> InternalResult<T> {
    let config = serde_json::from_str(s)
        .map_err(|e| Error::Internal(format!("Failed to parse config: {}", e)))?;
    Ok(config)
}

// デフォルト値の定義
fn default_first_listener_id() -> i64 {
    0
}
fn default_true() -> bool {
    true
}
fn default_lifecycle_buffer_size() -> usize {
    256
}
