use std::path::{Path, PathBuf};

use chrono::{NaiveDate, NaiveDateTime};
use serde_json::{Map, Value};

use crate::error::Result;

const DATE_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"];

/// The generation record the tool writes next to each image:
/// `{ "<timestamp>": { "checkpoint": "...", "custom_text": "...", ... } }`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sidecar {
    pub date_key: String,
    pub checkpoint: String,
    pub custom_text: String,
}

impl Sidecar {
    pub fn read(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let document: Map<String, Value> = serde_json::from_str(&contents)?;
        Ok(Self::from_document(&document))
    }

    /// Uses the first top-level entry whose value is an object.
    pub fn from_document(document: &Map<String, Value>) -> Self {
        let Some((date_key, properties)) = document
            .iter()
            .find_map(|(key, value)| value.as_object().map(|obj| (key, obj)))
        else {
            return Self::default();
        };

        let text = |name: &str| {
            properties
                .get(name)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .trim()
                .to_string()
        };

        Self {
            date_key: date_key.clone(),
            checkpoint: text("checkpoint"),
            custom_text: text("custom_text"),
        }
    }

    pub fn generation_date(&self) -> Option<NaiveDateTime> {
        parse_generation_date(&self.date_key)
    }
}

/// Path of the sidecar belonging to an image: same base name, `.json`.
pub fn sidecar_path_for(image_file: &Path) -> PathBuf {
    image_file.with_extension("json")
}

/// Parse the tool's timestamp key; `/` and `-` date separators both work.
pub fn parse_generation_date(raw: &str) -> Option<NaiveDateTime> {
    let normalized = raw.trim().replace('/', "-");

    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(&normalized, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(&normalized, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}
