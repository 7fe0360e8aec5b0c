pub mod atomic;

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::domain::{CatalogStats, ImageRecord};
use crate::error::{Error, Result};

/// The image index: every record, backed 1:1 by a single JSON file that maps
/// record ID to serialized record.
///
/// Records whose image file has disappeared are kept on a separate missing
/// list instead of the active set, and stay in the file until purged.
pub struct Repository {
    index_file: PathBuf,
    backup_folder: PathBuf,
    records: BTreeMap<String, ImageRecord>,
    missing: BTreeMap<String, ImageRecord>,
}

impl Repository {
    /// Load the index file; a missing file is an empty index.
    pub fn load(index_file: &Path, backup_folder: &Path) -> Result<Self> {
        let stored: BTreeMap<String, ImageRecord> =
            atomic::read_json(index_file)?.unwrap_or_default();

        let mut records = BTreeMap::new();
        let mut missing = BTreeMap::new();

        for (key, record) in stored {
            if key != record.id() {
                warn!("Index entry {} holds record {}, using the record ID", key, record.id());
            }
            if record.image_file().exists() {
                records.insert(record.id().to_string(), record);
            } else {
                warn!("Image file missing: {}", record.image_file().display());
                missing.insert(record.id().to_string(), record);
            }
        }

        info!(
            "Loaded {} images ({} missing) from {}",
            records.len(),
            missing.len(),
            index_file.display()
        );

        Ok(Self {
            index_file: index_file.to_path_buf(),
            backup_folder: backup_folder.to_path_buf(),
            records,
            missing,
        })
    }

    pub fn index_file(&self) -> &Path {
        &self.index_file
    }

    pub fn backup_folder(&self) -> &Path {
        &self.backup_folder
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.records.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<&ImageRecord> {
        self.records.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut ImageRecord> {
        self.records.get_mut(id)
    }

    pub fn require(&self, id: &str) -> Result<&ImageRecord> {
        self.get(id).ok_or_else(|| Error::RecordNotFound(id.to_string()))
    }

    pub fn require_mut(&mut self, id: &str) -> Result<&mut ImageRecord> {
        self.records
            .get_mut(id)
            .ok_or_else(|| Error::RecordNotFound(id.to_string()))
    }

    /// Expand an ID prefix to the full ID of an active or missing record.
    pub fn resolve_id(&self, prefix: &str) -> Result<String> {
        if self.records.contains_key(prefix) || self.missing.contains_key(prefix) {
            return Ok(prefix.to_string());
        }

        let mut matches = self
            .records
            .keys()
            .chain(self.missing.keys())
            .filter(|id| !prefix.is_empty() && id.starts_with(prefix));

        match (matches.next(), matches.next()) {
            (Some(id), None) => Ok(id.clone()),
            (Some(_), Some(_)) => Err(Error::AmbiguousId(prefix.to_string())),
            (None, _) => Err(Error::RecordNotFound(prefix.to_string())),
        }
    }

    /// Active records, ordered by image path (case-insensitive).
    pub fn all(&self) -> Vec<&ImageRecord> {
        let mut all: Vec<&ImageRecord> = self.records.values().collect();
        all.sort_by_cached_key(|r| r.image_file().to_string_lossy().to_lowercase());
        all
    }

    /// Records whose image file was gone at load time.
    pub fn missing(&self) -> Vec<&ImageRecord> {
        self.missing.values().collect()
    }

    pub fn is_missing(&self, id: &str) -> bool {
        self.missing.contains_key(id)
    }

    pub fn get_missing(&self, id: &str) -> Option<&ImageRecord> {
        self.missing.get(id)
    }

    /// Records linking to `id` as their upscaled version. Full scan; no
    /// reverse index is maintained.
    pub fn find_low_res_versions(&self, id: &str) -> Vec<&ImageRecord> {
        self.all()
            .into_iter()
            .filter(|r| r.properties().upscaled_image_ref() == Some(id))
            .collect()
    }

    pub fn low_res_ids(&self, id: &str) -> Vec<String> {
        self.find_low_res_versions(id)
            .into_iter()
            .map(|r| r.id().to_string())
            .collect()
    }

    /// IDs that some record already links to as its upscaled version.
    pub fn upscale_targets(&self) -> BTreeSet<String> {
        self.records
            .values()
            .filter_map(|r| r.properties().upscaled_image_ref())
            .map(str::to_string)
            .collect()
    }

    /// Distinct folder names of active records.
    pub fn folders(&self) -> Vec<String> {
        self.records
            .values()
            .map(|r| r.folder().to_string())
            .filter(|f| !f.is_empty())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Active records filtered by folder and a free-text query.
    pub fn search(&self, folder: Option<&str>, query: Option<&str>) -> Vec<&ImageRecord> {
        self.all()
            .into_iter()
            .filter(|r| folder.map_or(true, |f| r.folder() == f))
            .filter(|r| query.map_or(true, |q| r.matches_query(q)))
            .collect()
    }

    pub fn stats(&self) -> CatalogStats {
        let mut stats = CatalogStats {
            total_images: self.records.len(),
            missing_images: self.missing.len(),
            ..CatalogStats::default()
        };
        for record in self.records.values() {
            let props = record.properties();
            stats.upscaled += usize::from(record.is_upscaled());
            stats.linked += usize::from(props.upscaled_image_ref().is_some());
            stats.favorites += usize::from(props.is_favorite());
            stats.user_modified += usize::from(record.is_user_modified());
        }
        stats
    }

    /// Insert or replace an active record. A record rediscovered after going
    /// missing leaves the missing list.
    pub(crate) fn upsert(&mut self, record: ImageRecord) {
        self.missing.remove(record.id());
        self.records.insert(record.id().to_string(), record);
    }

    /// Move a missing record back to the active set.
    pub(crate) fn restore_missing(&mut self, id: &str) -> bool {
        match self.missing.remove(id) {
            Some(record) => {
                self.records.insert(id.to_string(), record);
                true
            }
            None => false,
        }
    }

    /// Snapshot the current index file into the backup folder.
    pub fn backup(&self) -> Result<Option<PathBuf>> {
        let now = chrono::Local::now().naive_local();
        atomic::backup_file(&self.index_file, &self.backup_folder, now)
    }

    /// Persist records changed in this process by patching their entries in
    /// the index file. Fails without writing if a changed record has no entry
    /// in the file yet. Returns the number of records written.
    pub fn save(&mut self) -> Result<usize> {
        let changed: Vec<&ImageRecord> = self
            .records
            .values()
            .filter(|r| r.is_data_changed())
            .collect();

        if changed.is_empty() {
            return Ok(0);
        }

        let mut stored: BTreeMap<String, Value> =
            atomic::read_json(&self.index_file)?.unwrap_or_default();

        if let Some(unknown) = changed.iter().find(|r| !stored.contains_key(r.id())) {
            return Err(Error::RecordNotInStore(unknown.id().to_string()));
        }

        for record in &changed {
            stored.insert(record.id().to_string(), serde_json::to_value(record)?);
        }
        atomic::write_json(&self.index_file, &stored)?;

        let count = changed.len();
        for record in self.records.values_mut() {
            record.clear_data_changed();
        }
        debug!("Saved {} changed images", count);
        Ok(count)
    }

    /// Rewrite the whole index file from memory, missing records included.
    pub fn write_index(&mut self) -> Result<()> {
        let all: BTreeMap<&str, &ImageRecord> = self
            .records
            .values()
            .chain(self.missing.values())
            .map(|r| (r.id(), r))
            .collect();

        atomic::write_json(&self.index_file, &all)?;
        let total = all.len();

        for record in self.records.values_mut() {
            record.clear_data_changed();
        }
        info!("Wrote {} images to {}", total, self.index_file.display());
        Ok(())
    }

    /// Drop a record (active or missing) from memory and from the index file.
    pub fn remove(&mut self, id: &str) -> Result<ImageRecord> {
        let record = self
            .records
            .remove(id)
            .or_else(|| self.missing.remove(id))
            .ok_or_else(|| Error::RecordNotFound(id.to_string()))?;

        if let Err(e) = self.remove_stored(&[id]) {
            self.insert_back(record);
            return Err(e);
        }
        Ok(record)
    }

    /// Drop every missing record from memory and from the index file.
    pub fn purge_missing(&mut self) -> Result<Vec<ImageRecord>> {
        let ids: Vec<String> = self.missing.keys().cloned().collect();
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let refs: Vec<&str> = ids.iter().map(String::as_str).collect();
        self.remove_stored(&refs)?;

        Ok(std::mem::take(&mut self.missing).into_values().collect())
    }

    fn remove_stored(&self, ids: &[&str]) -> Result<()> {
        let Some(mut stored) = atomic::read_json::<BTreeMap<String, Value>>(&self.index_file)? else {
            return Ok(());
        };
        let before = stored.len();
        for id in ids {
            stored.remove(*id);
        }
        if stored.len() != before {
            atomic::write_json(&self.index_file, &stored)?;
        }
        Ok(())
    }

    fn insert_back(&mut self, record: ImageRecord) {
        if record.image_file().exists() {
            self.records.insert(record.id().to_string(), record);
        } else {
            self.missing.insert(record.id().to_string(), record);
        }
    }
}
