pub mod config;
pub mod domain;
pub mod error;
pub mod filename;
pub mod hasher;
pub mod indexer;
pub mod linker;
pub mod parser;
pub mod repository;
pub mod sidecar;
pub mod sweep;

use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use tracing::{debug, info};

pub use config::OrganizerConfig;
pub use indexer::{IndexOutcome, IndexProgress, IndexSummary};
pub use linker::LinkReport;

use domain::{CatalogStats, ImageRecord, ModifierCatalog};
use error::{Error, Result};
use repository::Repository;

/// Which rendition of an image to open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageVariant {
    FullSize,
    Thumbnail,
}

/// An opened image ready to be streamed to a client.
#[derive(Debug)]
pub struct ImageStream {
    pub path: PathBuf,
    pub len: u64,
    pub content_type: &'static str,
    file: File,
}

impl Read for ImageStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read(buf)
    }
}

/// The main entry point: one image folder, one index.
///
/// The repository is loaded on first use and shared by every operation
/// of this instance.
pub struct Organizer {
    config: OrganizerConfig,
    catalog: ModifierCatalog,
    repository: Option<Repository>,
}

impl Organizer {
    pub fn new(config: OrganizerConfig) -> Self {
        let catalog = config.modifier_catalog();
        Self {
            config,
            catalog,
            repository: None,
        }
    }

    pub fn config(&self) -> &OrganizerConfig {
        &self.config
    }

    fn parts(&mut self) -> Result<(&mut Repository, &OrganizerConfig, &ModifierCatalog)> {
        let repository = match self.repository.take() {
            Some(repository) => repository,
            None => Repository::load(&self.config.index_file(), &self.config.backup_folder())?,
        };
        let repository = self.repository.insert(repository);
        Ok((repository, &self.config, &self.catalog))
    }

    /// The loaded repository, for browsing.
    pub fn repository(&mut self) -> Result<&Repository> {
        let (repo, _, _) = self.parts()?;
        Ok(repo)
    }

    /// Drop the in-memory repository; the next access reloads the index file.
    pub fn reload(&mut self) {
        self.repository = None;
    }

    // ── Indexing ────────────────────────────────────────────────

    /// Index every image below the image folder.
    pub fn index_all(
        &mut self,
        progress: Option<&mut dyn FnMut(IndexProgress)>,
    ) -> Result<IndexSummary> {
        let (repo, config, catalog) = self.parts()?;
        indexer::index_all(repo, config.image_folder(), catalog, progress)
    }

    /// Index the images directly inside one sub-folder of the image folder.
    pub fn index_folder(
        &mut self,
        folder_name: &str,
        progress: Option<&mut dyn FnMut(IndexProgress)>,
    ) -> Result<IndexSummary> {
        let (repo, config, catalog) = self.parts()?;
        indexer::index_folder(repo, config.image_folder(), folder_name, catalog, progress)
    }

    /// Link regular images to their upscaled versions, optionally within
    /// one folder.
    pub fn detect_upscaled(&mut self, folder_name: Option<&str>) -> Result<LinkReport> {
        let (repo, _, _) = self.parts()?;
        linker::detect_upscaled(repo, folder_name)
    }

    // ── Browsing ────────────────────────────────────────────────

    pub fn get(&mut self, id: &str) -> Result<&ImageRecord> {
        let (repo, _, _) = self.parts()?;
        repo.require(id)
    }

    pub fn search(&mut self, folder: Option<&str>, query: Option<&str>) -> Result<Vec<&ImageRecord>> {
        let (repo, _, _) = self.parts()?;
        Ok(repo.search(folder, query))
    }

    pub fn folders(&mut self) -> Result<Vec<String>> {
        let (repo, _, _) = self.parts()?;
        Ok(repo.folders())
    }

    pub fn missing(&mut self) -> Result<Vec<&ImageRecord>> {
        let (repo, _, _) = self.parts()?;
        Ok(repo.missing())
    }

    pub fn status(&mut self) -> Result<CatalogStats> {
        let (repo, _, _) = self.parts()?;
        Ok(repo.stats())
    }

    /// Open an image for streaming. A thumbnail that has not been cached
    /// yet falls back to the full-size image.
    pub fn open_image(&mut self, id: &str, variant: ImageVariant) -> Result<ImageStream> {
        let (repo, config, _) = self.parts()?;
        let record = repo.require(id)?;

        let thumbnail = record.thumbnail_file(&config.cache_folder());
        let (path, content_type) = match variant {
            ImageVariant::Thumbnail if thumbnail.is_file() => (thumbnail, "image/jpeg"),
            _ => (record.image_file().to_path_buf(), "image/png"),
        };

        let file = File::open(&path)?;
        let len = file.metadata()?.len();
        Ok(ImageStream {
            path,
            len,
            content_type,
            file,
        })
    }

    // ── Editing ─────────────────────────────────────────────────

    pub fn set_favorite(&mut self, id: &str, favorite: bool) -> Result<bool> {
        self.update_record(id, favorite, |r| r.set_favorite(favorite))
    }

    pub fn set_for_gallery(&mut self, id: &str, for_gallery: bool) -> Result<bool> {
        self.update_record(id, for_gallery, |r| r.set_for_gallery(for_gallery))
    }

    pub fn set_for_website(&mut self, id: &str, for_website: bool) -> Result<bool> {
        self.update_record(id, for_website, |r| r.set_for_website(for_website))
    }

    pub fn set_label(&mut self, id: &str, label: &str) -> Result<bool> {
        self.update_record(id, !label.is_empty(), |r| r.set_label(label))
    }

    pub fn set_website_image_ref(&mut self, id: &str, website_id: Option<&str>) -> Result<bool> {
        self.update_record(id, false, |r| r.set_website_image_ref(website_id))
    }

    /// Manually link `id` to its upscaled version.
    pub fn set_upscaled_image(&mut self, id: &str, upscaled_id: &str) -> Result<()> {
        let (repo, _, _) = self.parts()?;
        repo.require(upscaled_id)?;
        repo.require_mut(id)?
            .set_upscaled_image_ref(Some(upscaled_id));
        linker::sync_linked_properties(repo, upscaled_id)?;
        repo.save()?;
        info!("Linked {} to upscaled image {}", id, upscaled_id);
        Ok(())
    }

    /// Apply a user edit and save. When `propagate` is set and the record
    /// belongs to an upscale link, the shared flags are synced across it.
    fn update_record<F>(&mut self, id: &str, propagate: bool, update: F) -> Result<bool>
    where
        F: FnOnce(&mut ImageRecord) -> bool,
    {
        let (repo, _, _) = self.parts()?;
        let changed = update(repo.require_mut(id)?);

        if propagate {
            let group = repo
                .get(id)
                .and_then(|r| r.properties().upscaled_image_ref())
                .filter(|target| repo.contains(target))
                .unwrap_or(id)
                .to_string();
            linker::sync_linked_properties(repo, &group)?;
        }

        repo.save()?;
        Ok(changed)
    }

    // ── Files ───────────────────────────────────────────────────

    /// Move an image (and the low-res images linking to it) to a sibling
    /// folder. Returns the IDs that moved.
    pub fn move_image(&mut self, id: &str, folder_name: &str) -> Result<Vec<String>> {
        let (repo, _, _) = self.parts()?;
        sweep::move_to_folder(repo, id, folder_name)
    }

    /// Delete an image with its files. Returns the IDs that were deleted.
    pub fn delete_image(&mut self, id: &str, cascade: bool) -> Result<Vec<String>> {
        let (repo, config, _) = self.parts()?;
        sweep::delete_image(repo, id, &config.cache_folder(), cascade)
    }

    pub fn purge_missing(&mut self) -> Result<Vec<ImageRecord>> {
        let (repo, config, _) = self.parts()?;
        sweep::purge_missing(repo, &config.cache_folder())
    }

    pub fn cleanup_folders(&mut self) -> Result<Vec<PathBuf>> {
        sweep::cleanup_empty_folders(self.config.image_folder())
    }

    /// Copy an image into the output folder under its slugged output name,
    /// replacing a previous copy.
    pub fn copy_to_output(&mut self, id: &str) -> Result<PathBuf> {
        let (repo, config, _) = self.parts()?;
        let output_folder = config.output_folder().ok_or(Error::OutputFolderNotSet)?;
        let record = repo.require(id)?;

        fs::create_dir_all(output_folder)?;
        let target = output_folder.join(record.output_file_name());
        if target.exists() {
            debug!("Replacing {}", target.display());
            fs::remove_file(&target)?;
        }
        fs::copy(record.image_file(), &target)?;

        info!("Copied {} to {}", record.image_file().display(), target.display());
        Ok(target)
    }

    pub fn image_folder(&self) -> &Path {
        self.config.image_folder()
    }
}
