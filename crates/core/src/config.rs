use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::domain::ModifierCatalog;
use crate::error::{Error, Result};

const INDEX_FILE_NAME: &str = "images.json";
const BACKUP_FOLDER_NAME: &str = "backup";
const CACHE_FOLDER_NAME: &str = "cache";

/// Where the organizer finds images and keeps its own files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrganizerConfig {
    image_folder: PathBuf,
    #[serde(default = "default_storage_folder")]
    storage_folder: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    cache_folder: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    output_folder: Option<PathBuf>,
    /// IDs of the modifier (LoRA) reference catalog.
    #[serde(default)]
    modifiers: Vec<String>,
}

/// `$HOME/.genvault`, or `./.genvault` without a home directory.
pub fn default_storage_folder() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home).join(".genvault")
}

impl OrganizerConfig {
    pub fn new(image_folder: impl Into<PathBuf>) -> Self {
        Self {
            image_folder: image_folder.into(),
            storage_folder: default_storage_folder(),
            cache_folder: None,
            output_folder: None,
            modifiers: Vec::new(),
        }
    }

    /// Read a JSON config file. Relative folders resolve against the
    /// file's directory.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::ConfigNotFound(path.to_path_buf()))
            }
            Err(e) => return Err(e.into()),
        };
        let mut config: Self = serde_json::from_str(&contents)?;

        if let Some(base) = path.parent() {
            config.image_folder = base.join(&config.image_folder);
            config.storage_folder = base.join(&config.storage_folder);
            config.cache_folder = config.cache_folder.map(|p| base.join(p));
            config.output_folder = config.output_folder.map(|p| base.join(p));
        }
        Ok(config)
    }

    pub fn with_storage_folder(mut self, folder: impl Into<PathBuf>) -> Self {
        self.storage_folder = folder.into();
        self
    }

    pub fn with_cache_folder(mut self, folder: impl Into<PathBuf>) -> Self {
        self.cache_folder = Some(folder.into());
        self
    }

    pub fn with_output_folder(mut self, folder: impl Into<PathBuf>) -> Self {
        self.output_folder = Some(folder.into());
        self
    }

    pub fn with_modifiers<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.modifiers = ids.into_iter().map(Into::into).collect();
        self
    }

    pub fn image_folder(&self) -> &Path {
        &self.image_folder
    }

    pub fn storage_folder(&self) -> &Path {
        &self.storage_folder
    }

    pub fn index_file(&self) -> PathBuf {
        self.storage_folder.join(INDEX_FILE_NAME)
    }

    pub fn backup_folder(&self) -> PathBuf {
        self.storage_folder.join(BACKUP_FOLDER_NAME)
    }

    pub fn cache_folder(&self) -> PathBuf {
        self.cache_folder
            .clone()
            .unwrap_or_else(|| self.storage_folder.join(CACHE_FOLDER_NAME))
    }

    pub fn output_folder(&self) -> Option<&Path> {
        self.output_folder.as_deref()
    }

    pub fn modifier_catalog(&self) -> ModifierCatalog {
        ModifierCatalog::new(self.modifiers.iter().cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derived_paths() {
        let config = OrganizerConfig::new("/pics").with_storage_folder("/data");
        assert_eq!(config.index_file(), PathBuf::from("/data/images.json"));
        assert_eq!(config.backup_folder(), PathBuf::from("/data/backup"));
        assert_eq!(config.cache_folder(), PathBuf::from("/data/cache"));
        assert!(config.output_folder().is_none());

        let config = config.with_cache_folder("/tmp/thumbs");
        assert_eq!(config.cache_folder(), PathBuf::from("/tmp/thumbs"));
    }

    #[test]
    fn test_load_resolves_relative_folders() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("genvault.json");
        std::fs::write(
            &path,
            r#"{
                "imageFolder": "images",
                "storageFolder": "data",
                "outputFolder": "/abs/out",
                "modifiers": ["eyeDetailer", "filmGrain"]
            }"#,
        )
        .unwrap();

        let config = OrganizerConfig::load(&path).unwrap();
        assert_eq!(config.image_folder(), tmp.path().join("images"));
        assert_eq!(config.index_file(), tmp.path().join("data").join("images.json"));
        assert_eq!(config.output_folder(), Some(Path::new("/abs/out")));
        assert_eq!(
            config.modifier_catalog().resolve("FILMGRAIN"),
            Some("filmGrain")
        );
    }

    #[test]
    fn test_load_defaults_storage_folder() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("genvault.json");
        std::fs::write(&path, r#"{ "imageFolder": "/pics" }"#).unwrap();

        let config = OrganizerConfig::load(&path).unwrap();
        assert_eq!(config.image_folder(), Path::new("/pics"));
        assert!(config.storage_folder().ends_with(".genvault"));
        assert!(config.modifier_catalog().ids().is_empty());
    }

    #[test]
    fn test_load_missing_file() {
        let err = OrganizerConfig::load(Path::new("/nonexistent/genvault.json")).unwrap_err();
        assert!(matches!(err, Error::ConfigNotFound(_)));
    }
}
