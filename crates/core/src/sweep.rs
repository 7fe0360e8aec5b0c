use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::domain::ImageRecord;
use crate::error::{Error, Result};
use crate::repository::Repository;

/// Folder names accepted as move targets: ASCII letters, digits, `_`, `-`.
pub fn is_valid_folder_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// Move a record's image and sidecar into the sibling folder `folder_name`,
/// then move every record linking to it as its upscaled version along.
///
/// Files are copied, the index is saved, and only then are the old files
/// deleted. A name clash in the target folder fails before anything is
/// copied. Returns the IDs of the records that moved.
pub fn move_to_folder(repo: &mut Repository, id: &str, folder_name: &str) -> Result<Vec<String>> {
    if !is_valid_folder_name(folder_name) {
        return Err(Error::InvalidFolderName(folder_name.to_string()));
    }

    let mut moved = Vec::new();
    move_record(repo, id, folder_name, &mut moved)?;
    Ok(moved)
}

fn move_record(
    repo: &mut Repository,
    id: &str,
    folder_name: &str,
    moved: &mut Vec<String>,
) -> Result<()> {
    let record = repo.require(id)?;
    if record.folder() == folder_name {
        debug!("{} is already in {}", id, folder_name);
        return Ok(());
    }

    let old_image = record.image_file().to_path_buf();
    let old_sidecar = record.sidecar_file().to_path_buf();

    let target_folder = old_image
        .parent()
        .and_then(Path::parent)
        .map(|root| root.join(folder_name))
        .ok_or_else(|| Error::InvalidFolderName(folder_name.to_string()))?;

    let new_image = target_path(&target_folder, &old_image)?;
    let new_sidecar = target_path(&target_folder, &old_sidecar)?;

    fs::create_dir_all(&target_folder)?;
    fs::copy(&old_image, &new_image)?;
    if let Err(e) = fs::copy(&old_sidecar, &new_sidecar) {
        let _ = fs::remove_file(&new_image);
        return Err(e.into());
    }

    let record = repo.require_mut(id)?;
    record.relocate(&new_image, &new_sidecar);
    record.mark_dirty();

    if let Err(e) = repo.save() {
        warn!("Saving moved image {} failed, rolling back: {}", id, e);
        if let Ok(record) = repo.require_mut(id) {
            record.relocate(&old_image, &old_sidecar);
        }
        let _ = fs::remove_file(&new_image);
        let _ = fs::remove_file(&new_sidecar);
        return Err(e);
    }

    remove_if_exists(&old_image)?;
    remove_if_exists(&old_sidecar)?;

    info!("Moved {} to {}", old_image.display(), target_folder.display());
    moved.push(id.to_string());

    for low_res_id in repo.low_res_ids(id) {
        move_record(repo, &low_res_id, folder_name, moved)?;
    }
    Ok(())
}

fn target_path(target_folder: &Path, source: &Path) -> Result<PathBuf> {
    let name = source.file_name().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("no file name in {}", source.display()),
        )
    })?;

    let target = target_folder.join(name);
    if target.exists() {
        return Err(Error::TargetExists(target));
    }
    Ok(target)
}

/// Delete a record with its image, sidecar and cached thumbnail. With
/// `cascade`, the records linking to it as their upscaled version go too;
/// otherwise their link is left dangling. Returns the deleted IDs.
pub fn delete_image(
    repo: &mut Repository,
    id: &str,
    cache_folder: &Path,
    cascade: bool,
) -> Result<Vec<String>> {
    let low_res = if cascade {
        repo.low_res_ids(id)
    } else {
        Vec::new()
    };

    let record = repo.remove(id)?;
    remove_record_files(&record, cache_folder)?;
    info!("Deleted image {}", record.image_file().display());

    let mut deleted = vec![id.to_string()];
    for low_res_id in low_res {
        if repo.contains(&low_res_id) {
            deleted.extend(delete_image(repo, &low_res_id, cache_folder, true)?);
        }
    }
    Ok(deleted)
}

/// Drop all records on the missing list, deleting leftover sidecars and
/// thumbnails.
pub fn purge_missing(repo: &mut Repository, cache_folder: &Path) -> Result<Vec<ImageRecord>> {
    let purged = repo.purge_missing()?;
    for record in &purged {
        remove_record_files(record, cache_folder)?;
    }
    if !purged.is_empty() {
        info!("Purged {} missing images", purged.len());
    }
    Ok(purged)
}

fn remove_record_files(record: &ImageRecord, cache_folder: &Path) -> Result<()> {
    remove_if_exists(record.image_file())?;
    remove_if_exists(record.sidecar_file())?;
    remove_if_exists(&record.thumbnail_file(cache_folder))?;
    Ok(())
}

fn remove_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

/// Remove empty immediate sub-folders of `root`. Returns the removed paths.
pub fn cleanup_empty_folders(root: &Path) -> Result<Vec<PathBuf>> {
    if !root.is_dir() {
        return Err(Error::ImageFolderNotFound(root.to_path_buf()));
    }

    let mut removed = Vec::new();
    for entry in fs::read_dir(root)? {
        let path = entry?.path();
        if path.is_dir() && fs::read_dir(&path)?.next().is_none() {
            fs::remove_dir(&path)?;
            info!("Removed empty folder {}", path.display());
            removed.push(path);
        }
    }
    removed.sort();
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::tests::sample_record;
    use tempfile::TempDir;

    struct Fixture {
        tmp: TempDir,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                tmp: tempfile::tempdir().unwrap(),
            }
        }

        fn images(&self) -> PathBuf {
            self.tmp.path().join("images")
        }

        fn cache(&self) -> PathBuf {
            self.tmp.path().join("cache")
        }

        /// Writes image and sidecar files and returns a record for them.
        fn record(&self, id: &str, folder: &str) -> ImageRecord {
            let dir = self.images().join(folder);
            fs::create_dir_all(&dir).unwrap();
            let image = dir.join(format!("{id}.png"));
            fs::write(&image, id.as_bytes()).unwrap();
            fs::write(image.with_extension("json"), "{}").unwrap();
            sample_record(id, image.to_str().unwrap())
        }

        fn repo(&self, records: Vec<ImageRecord>) -> Repository {
            let data = self.tmp.path().join("data");
            let mut repo =
                Repository::load(&data.join("images.json"), &data.join("backup")).unwrap();
            for r in records {
                repo.upsert(r);
            }
            repo.write_index().unwrap();
            repo
        }

        fn reload(&self) -> Repository {
            self.repo(Vec::new())
        }
    }

    #[test]
    fn test_folder_name_validation() {
        assert!(is_valid_folder_name("Best_of-2025"));
        assert!(!is_valid_folder_name(""));
        assert!(!is_valid_folder_name("../escape"));
        assert!(!is_valid_folder_name("with space"));
    }

    #[test]
    fn test_move_copies_saves_then_deletes() {
        let fx = Fixture::new();
        let record = fx.record("a", "inbox");
        let old_image = record.image_file().to_path_buf();
        let mut repo = fx.repo(vec![record]);

        let moved = move_to_folder(&mut repo, "a", "keep").unwrap();
        assert_eq!(moved, vec!["a".to_string()]);

        let new_image = fx.images().join("keep").join("a.png");
        assert!(new_image.exists());
        assert!(new_image.with_extension("json").exists());
        assert!(!old_image.exists());
        assert!(!old_image.with_extension("json").exists());

        let reloaded = fx.reload();
        let record = reloaded.get("a").unwrap();
        assert_eq!(record.folder(), "keep");
        assert_eq!(record.image_file(), new_image.as_path());
        assert!(record.is_user_modified());
    }

    #[test]
    fn test_move_to_current_folder_is_noop() {
        let fx = Fixture::new();
        let mut repo = fx.repo(vec![fx.record("a", "inbox")]);
        let before = fs::read_to_string(repo.index_file()).unwrap();

        assert!(move_to_folder(&mut repo, "a", "inbox").unwrap().is_empty());
        assert_eq!(fs::read_to_string(repo.index_file()).unwrap(), before);
        assert!(!repo.get("a").unwrap().is_data_changed());
    }

    #[test]
    fn test_move_onto_existing_file_fails_without_changes() {
        let fx = Fixture::new();
        let record = fx.record("a", "inbox");
        let old_image = record.image_file().to_path_buf();
        let mut repo = fx.repo(vec![record]);

        let clash = fx.images().join("keep").join("a.json");
        fs::create_dir_all(clash.parent().unwrap()).unwrap();
        fs::write(&clash, "other").unwrap();

        let err = move_to_folder(&mut repo, "a", "keep").unwrap_err();
        assert!(matches!(err, Error::TargetExists(path) if path == clash));
        assert!(old_image.exists());
        assert!(!fx.images().join("keep").join("a.png").exists());
        assert_eq!(repo.get("a").unwrap().folder(), "inbox");
    }

    #[test]
    fn test_move_rejects_bad_folder_name() {
        let fx = Fixture::new();
        let mut repo = fx.repo(vec![fx.record("a", "inbox")]);
        assert!(matches!(
            move_to_folder(&mut repo, "a", "../x"),
            Err(Error::InvalidFolderName(_))
        ));
    }

    #[test]
    fn test_move_takes_low_res_versions_along() {
        let fx = Fixture::new();
        let mut low = fx.record("low", "inbox");
        low.set_upscaled_image_ref(Some("big"));
        let mut repo = fx.repo(vec![low, fx.record("big", "inbox")]);

        let moved = move_to_folder(&mut repo, "big", "keep").unwrap();
        assert_eq!(moved, vec!["big".to_string(), "low".to_string()]);
        assert_eq!(repo.get("low").unwrap().folder(), "keep");
        assert!(fx.images().join("keep").join("low.png").exists());
    }

    #[test]
    fn test_delete_without_cascade_leaves_dangling_link() {
        let fx = Fixture::new();
        let mut low = fx.record("low", "inbox");
        low.set_upscaled_image_ref(Some("big"));
        let big = fx.record("big", "inbox");
        let big_image = big.image_file().to_path_buf();
        fs::create_dir_all(fx.cache()).unwrap();
        let thumbnail = big.thumbnail_file(&fx.cache());
        fs::write(&thumbnail, "jpg").unwrap();
        let mut repo = fx.repo(vec![low, big]);

        let deleted = delete_image(&mut repo, "big", &fx.cache(), false).unwrap();
        assert_eq!(deleted, vec!["big".to_string()]);
        assert!(!big_image.exists());
        assert!(!big_image.with_extension("json").exists());
        assert!(!thumbnail.exists());

        let reloaded = fx.reload();
        assert!(reloaded.get("big").is_none());
        assert_eq!(
            reloaded.get("low").unwrap().properties().upscaled_image_ref(),
            Some("big")
        );
    }

    #[test]
    fn test_delete_with_cascade_removes_low_res_versions() {
        let fx = Fixture::new();
        let mut low = fx.record("low", "inbox");
        low.set_upscaled_image_ref(Some("big"));
        let mut repo = fx.repo(vec![low, fx.record("big", "inbox")]);

        let deleted = delete_image(&mut repo, "big", &fx.cache(), true).unwrap();
        assert_eq!(deleted, vec!["big".to_string(), "low".to_string()]);
        assert!(repo.is_empty());
        assert!(!fx.images().join("inbox").join("low.png").exists());
    }

    #[test]
    fn test_delete_unknown_id() {
        let fx = Fixture::new();
        let mut repo = fx.repo(Vec::new());
        assert!(matches!(
            delete_image(&mut repo, "nope", &fx.cache(), false),
            Err(Error::RecordNotFound(_))
        ));
    }

    #[test]
    fn test_purge_missing_removes_leftover_sidecar() {
        let fx = Fixture::new();
        let record = fx.record("gone", "inbox");
        let image = record.image_file().to_path_buf();
        let _ = fx.repo(vec![record]);
        fs::remove_file(&image).unwrap();

        let mut repo = fx.reload();
        let purged = purge_missing(&mut repo, &fx.cache()).unwrap();
        assert_eq!(purged.len(), 1);
        assert!(!image.with_extension("json").exists());
        assert!(fx.reload().missing().is_empty());
    }

    #[test]
    fn test_cleanup_empty_folders() {
        let fx = Fixture::new();
        let _ = fx.record("a", "full");
        fs::create_dir_all(fx.images().join("empty")).unwrap();

        let removed = cleanup_empty_folders(&fx.images()).unwrap();
        assert_eq!(removed, vec![fx.images().join("empty")]);
        assert!(fx.images().join("full").exists());
    }
}
