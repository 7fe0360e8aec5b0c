use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::domain::{ImageRecord, ImageSize, ModifierCatalog, NewImageRecord, Properties};
use crate::error::{Error, Result};
use crate::filename::FilenameInfo;
use crate::hasher;
use crate::parser;
use crate::repository::Repository;
use crate::sidecar::{self, Sidecar};

/// What happened to one discovered image file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexOutcome {
    /// A record was created for a previously unknown image.
    Indexed,
    /// An unprotected record was re-derived from its sidecar and differs.
    Reindexed,
    /// A user-modified record had its file paths refreshed.
    PathsUpdated,
    /// Nothing to change.
    Unchanged,
    SkippedNoSidecar,
    SkippedNoCheckpoint,
    Failed { reason: String },
}

impl IndexOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            IndexOutcome::Indexed => "indexed",
            IndexOutcome::Reindexed => "reindexed",
            IndexOutcome::PathsUpdated => "paths updated",
            IndexOutcome::Unchanged => "unchanged",
            IndexOutcome::SkippedNoSidecar => "no sidecar",
            IndexOutcome::SkippedNoCheckpoint => "no checkpoint",
            IndexOutcome::Failed { .. } => "failed",
        }
    }
}

#[derive(Debug, Clone)]
pub struct FileOutcome {
    pub path: PathBuf,
    pub outcome: IndexOutcome,
}

/// Result of one indexing batch.
#[derive(Debug, Clone, Default)]
pub struct IndexSummary {
    pub indexed: usize,
    pub reindexed: usize,
    pub paths_updated: usize,
    pub unchanged: usize,
    pub skipped: usize,
    pub failed: usize,
    pub outcomes: Vec<FileOutcome>,
}

impl IndexSummary {
    fn record(&mut self, path: &Path, outcome: IndexOutcome) {
        match &outcome {
            IndexOutcome::Indexed => self.indexed += 1,
            IndexOutcome::Reindexed => self.reindexed += 1,
            IndexOutcome::PathsUpdated => self.paths_updated += 1,
            IndexOutcome::Unchanged => self.unchanged += 1,
            IndexOutcome::SkippedNoSidecar | IndexOutcome::SkippedNoCheckpoint => {
                self.skipped += 1
            }
            IndexOutcome::Failed { .. } => self.failed += 1,
        }
        self.outcomes.push(FileOutcome {
            path: path.to_path_buf(),
            outcome,
        });
    }

    pub fn total(&self) -> usize {
        self.outcomes.len()
    }
}

/// Progress updates emitted while indexing.
pub enum IndexProgress<'a> {
    Start { total: usize },
    FileProcessed { path: &'a Path, outcome: &'a IndexOutcome },
    Complete,
}

/// Index every `*.png` below `root`, recursively.
pub fn index_all(
    repo: &mut Repository,
    root: &Path,
    catalog: &ModifierCatalog,
    progress: Option<&mut dyn FnMut(IndexProgress)>,
) -> Result<IndexSummary> {
    if !root.is_dir() {
        return Err(Error::ImageFolderNotFound(root.to_path_buf()));
    }
    let files = find_images(root, true)?;
    index_files(repo, &files, catalog, progress)
}

/// Index the `*.png` files directly inside one sub-folder of `root`.
/// An unknown folder yields an empty batch.
pub fn index_folder(
    repo: &mut Repository,
    root: &Path,
    folder_name: &str,
    catalog: &ModifierCatalog,
    progress: Option<&mut dyn FnMut(IndexProgress)>,
) -> Result<IndexSummary> {
    let folder = root.join(folder_name);
    let files = if folder.is_dir() {
        find_images(&folder, false)?
    } else {
        warn!("Folder not found, nothing to index: {}", folder.display());
        Vec::new()
    };
    index_files(repo, &files, catalog, progress)
}

/// Discover `*.png` files (extension case-insensitive), sorted by path.
pub fn find_images(dir: &Path, recursive: bool) -> Result<Vec<PathBuf>> {
    let mut walker = WalkDir::new(dir).follow_links(true);
    if !recursive {
        walker = walker.max_depth(1);
    }

    let mut files = Vec::new();
    for entry in walker {
        let entry = entry?;
        if entry.file_type().is_file() && is_png(entry.path()) {
            files.push(entry.into_path());
        }
    }
    files.sort();
    Ok(files)
}

fn is_png(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("png"))
}

fn index_files(
    repo: &mut Repository,
    files: &[PathBuf],
    catalog: &ModifierCatalog,
    mut progress: Option<&mut dyn FnMut(IndexProgress)>,
) -> Result<IndexSummary> {
    if let Some(backup) = repo.backup()? {
        info!("Backed up index to {}", backup.display());
    }

    info!("Processing {} image files", files.len());
    if let Some(ref mut cb) = progress {
        cb(IndexProgress::Start { total: files.len() });
    }

    let mut summary = IndexSummary::default();

    for path in files {
        let outcome = index_file(repo, path, catalog).unwrap_or_else(|e| {
            warn!("Failed to index {}: {}", path.display(), e);
            IndexOutcome::Failed {
                reason: e.to_string(),
            }
        });
        debug!("{} | {}", path.display(), outcome.label());

        if let Some(ref mut cb) = progress {
            cb(IndexProgress::FileProcessed {
                path,
                outcome: &outcome,
            });
        }
        summary.record(path, outcome);
    }

    repo.write_index()?;

    if let Some(ref mut cb) = progress {
        cb(IndexProgress::Complete);
    }

    info!(
        "Indexing done: {} new, {} reindexed, {} paths updated, {} skipped, {} failed",
        summary.indexed, summary.reindexed, summary.paths_updated, summary.skipped, summary.failed
    );
    Ok(summary)
}

fn index_file(
    repo: &mut Repository,
    image_file: &Path,
    catalog: &ModifierCatalog,
) -> Result<IndexOutcome> {
    let sidecar_file = sidecar::sidecar_path_for(image_file);
    if !sidecar_file.is_file() {
        debug!("No sidecar file for {}", image_file.display());
        return Ok(IndexOutcome::SkippedNoSidecar);
    }

    let id = hasher::compute_image_id(image_file)?;

    // User-modified records only follow their files around.
    let protected = repo
        .get(&id)
        .or_else(|| repo.get_missing(&id))
        .is_some_and(ImageRecord::is_user_modified);

    if protected {
        let restored = repo.restore_missing(&id);
        let record = repo.require_mut(&id)?;
        let moved = record.relocate(image_file, &sidecar_file);
        return Ok(if moved || restored {
            IndexOutcome::PathsUpdated
        } else {
            IndexOutcome::Unchanged
        });
    }

    let sidecar = Sidecar::read(&sidecar_file)?;
    if sidecar.checkpoint.is_empty() {
        warn!("No checkpoint information in {}", sidecar_file.display());
        return Ok(IndexOutcome::SkippedNoCheckpoint);
    }

    let mut parsed = parser::parse_custom_text(&sidecar.custom_text);
    apply_filename_info(&mut parsed, FilenameInfo::from_path(image_file));
    let properties = Properties::from_parsed(parsed, catalog);

    let (width, height) = image::image_dimensions(image_file)?;
    let image_size = ImageSize::new(width, height);

    let created_at = match sidecar.generation_date() {
        Some(date) => date,
        None => {
            warn!(
                "Unreadable generation date {:?} in {}, using file time",
                sidecar.date_key,
                sidecar_file.display()
            );
            modified_at(&sidecar_file)?
        }
    };

    let upscaled = properties.has_upscale_marker()
        || file_stem_mentions_upscale(image_file)
        || image_size.is_upscale_sized();

    let record = ImageRecord::new(NewImageRecord {
        id: id.clone(),
        image_file: image_file.to_path_buf(),
        sidecar_file,
        created_at,
        checkpoint: sidecar.checkpoint,
        upscaled,
        image_size,
        properties,
    });

    let outcome = match repo.get(&id) {
        Some(existing) if same_content(existing, &record) => return Ok(IndexOutcome::Unchanged),
        Some(_) => IndexOutcome::Reindexed,
        None => IndexOutcome::Indexed,
    };
    repo.upsert(record);
    Ok(outcome)
}

/// Filename-derived values only fill keys absent from the sidecar text. A
/// key given with an empty value counts as present.
fn apply_filename_info(parsed: &mut BTreeMap<String, String>, info: FilenameInfo) {
    fill_if_absent(parsed, &["seed"], info.seed);
    fill_if_absent(parsed, &["testname"], info.test_name);
    fill_if_absent(parsed, &["testnumber"], info.test_number);
    fill_if_absent(parsed, &["batch", "batchnumber", "imgbatchnr"], info.batch_number);
}

fn fill_if_absent(parsed: &mut BTreeMap<String, String>, keys: &[&str], value: Option<String>) {
    if keys.iter().any(|key| parsed.contains_key(*key)) {
        return;
    }
    if let (Some(key), Some(value)) = (keys.first(), value) {
        parsed.insert(key.to_string(), value);
    }
}

fn file_stem_mentions_upscale(path: &Path) -> bool {
    path.file_stem()
        .is_some_and(|stem| stem.to_string_lossy().to_lowercase().contains("upscale"))
}

fn modified_at(path: &Path) -> Result<NaiveDateTime> {
    let modified = fs::metadata(path)?.modified()?;
    Ok(chrono::DateTime::<chrono::Local>::from(modified).naive_local())
}

fn same_content(a: &ImageRecord, b: &ImageRecord) -> bool {
    matches!(
        (serde_json::to_value(a), serde_json::to_value(b)),
        (Ok(x), Ok(y)) if x == y
    )
}
