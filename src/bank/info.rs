//! Bank-level metadata

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Descriptive information stored alongside the collections
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BankInfo {
    pub name: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub copyright: String,
    pub creation_date: DateTime<Utc>,
    #[serde(default)]
    pub product: String,
    #[serde(default)]
    pub comments: String,
    #[serde(default)]
    pub engineers: String,
    /// Target sound engine
    #[serde(default = "default_sound_engine")]
    pub sound_engine: String,
    #[serde(default)]
    pub rom_name: String,
    #[serde(default)]
    pub rom_version: Option<(u16, u16)>,
    /// Tool that last wrote the bank
    #[serde(default)]
    pub software: String,
    #[serde(default = "default_format_version")]
    pub format_version: (u16, u16),
}

fn default_sound_engine() -> String {
    "EMU8000".to_string()
}

fn default_format_version() -> (u16, u16) {
    (2, 4)
}

impl BankInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            author: String::new(),
            copyright: String::new(),
            creation_date: Utc::now(),
            product: String::new(),
            comments: String::new(),
            engineers: String::new(),
            sound_engine: default_sound_engine(),
            rom_name: String::new(),
            rom_version: None,
            software: format!("bankcraft {}", env!("CARGO_PKG_VERSION")),
            format_version: default_format_version(),
        }
    }
}

impl Default for BankInfo {
    fn default() -> Self {
        Self::new("Untitled")
    }
}
