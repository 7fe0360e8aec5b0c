use std::collections::BTreeMap;

use tracing::{debug, info};

use crate::domain::ImageRecord;
use crate::error::Result;
use crate::repository::Repository;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkedPair {
    pub regular: String,
    pub upscaled: String,
}

/// Why a settings-hash group was left for manual resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AmbiguityReason {
    /// More than two records share the same settings.
    TooManyMembers(usize),
    /// Both records of a pair have the same upscaled flag.
    SameKind { upscaled: bool },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AmbiguousGroup {
    pub settings_hash: String,
    pub ids: Vec<String>,
    pub reason: AmbiguityReason,
}

/// Result of an upscale detection pass.
#[derive(Debug, Clone, Default)]
pub struct LinkReport {
    /// Number of distinct settings hashes among the candidates.
    pub groups: usize,
    pub linked: Vec<LinkedPair>,
    pub ambiguous: Vec<AmbiguousGroup>,
}

/// Link regular images to their upscaled version when exactly one of each
/// shares a settings hash. Records that already link somewhere, or that are
/// already linked to, are not candidates. Every other group is left alone;
/// groups of three or more and same-kind pairs are reported as ambiguous.
pub fn detect_upscaled(repo: &mut Repository, folder: Option<&str>) -> Result<LinkReport> {
    let targets = repo.upscale_targets();

    let mut by_hash: BTreeMap<String, Vec<(String, bool)>> = BTreeMap::new();
    for record in repo.all() {
        if folder.is_some_and(|f| record.folder() != f) {
            continue;
        }
        if record.properties().upscaled_image_ref().is_some() || targets.contains(record.id()) {
            continue;
        }
        by_hash
            .entry(record.settings_hash())
            .or_default()
            .push((record.id().to_string(), record.is_upscaled()));
    }

    info!("Found {} unique image settings hashes", by_hash.len());

    let mut report = LinkReport {
        groups: by_hash.len(),
        ..LinkReport::default()
    };

    for (settings_hash, members) in by_hash {
        let ids = || members.iter().map(|(id, _)| id.clone()).collect::<Vec<_>>();

        match members.as_slice() {
            [_] => {}
            [(a, a_up), (b, b_up)] if a_up != b_up => {
                let (regular, upscaled) = if *a_up { (b, a) } else { (a, b) };
                debug!("Linking {} -> {}", regular, upscaled);
                repo.require_mut(regular)?
                    .set_upscaled_image_ref(Some(upscaled.as_str()));
                sync_linked_properties(repo, upscaled)?;
                report.linked.push(LinkedPair {
                    regular: regular.clone(),
                    upscaled: upscaled.clone(),
                });
            }
            [(_, upscaled), _] => {
                debug!("Cannot tell which image is upscaled in group {}", settings_hash);
                report.ambiguous.push(AmbiguousGroup {
                    ids: ids(),
                    settings_hash,
                    reason: AmbiguityReason::SameKind {
                        upscaled: *upscaled,
                    },
                });
            }
            _ => {
                debug!("{} images share settings hash {}", members.len(), settings_hash);
                report.ambiguous.push(AmbiguousGroup {
                    ids: ids(),
                    reason: AmbiguityReason::TooManyMembers(members.len()),
                    settings_hash,
                });
            }
        }
    }

    repo.save()?;

    info!(
        "Linked {} upscaled images, {} groups need manual review",
        report.linked.len(),
        report.ambiguous.len()
    );
    Ok(report)
}

/// Share favorite, gallery and label between an upscaled record and the
/// records linking to it. Set flags and non-empty labels win on both
/// sides; the upscaled record's label wins over a low-res label. Returns
/// how many records changed.
pub fn sync_linked_properties(repo: &mut Repository, upscaled_id: &str) -> Result<usize> {
    let mut changed = 0;

    for low_res_id in repo.low_res_ids(upscaled_id) {
        let upscaled = repo.require(upscaled_id)?;
        let low_res = repo.require(&low_res_id)?;

        let favorite = upscaled.properties().is_favorite() || low_res.properties().is_favorite();
        let for_gallery =
            upscaled.properties().is_for_gallery() || low_res.properties().is_for_gallery();
        let label = if upscaled.label().is_empty() {
            low_res.label().to_string()
        } else {
            upscaled.label().to_string()
        };

        for id in [upscaled_id, low_res_id.as_str()] {
            let record = repo.require_mut(id)?;
            changed += usize::from(apply_shared(record, favorite, for_gallery, &label));
        }
    }

    Ok(changed)
}

fn apply_shared(record: &mut ImageRecord, favorite: bool, for_gallery: bool, label: &str) -> bool {
    let mut changed = false;
    if favorite && !record.properties().is_favorite() {
        changed |= record.set_favorite(true);
    }
    if for_gallery && !record.properties().is_for_gallery() {
        changed |= record.set_for_gallery(true);
    }
    if !label.is_empty() && record.label() != label {
        changed |= record.set_label(label);
    }
    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::tests::sample_properties;
    use crate::domain::{ImageSize, NewImageRecord};
    use chrono::NaiveDateTime;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn record(id: &str, folder: &str, upscaled: bool, seed: &str) -> ImageRecord {
        let mut properties = sample_properties();
        properties.seed = seed.to_string();
        let image_file = PathBuf::from(format!("/images/{folder}/{id}.png"));
        let size = if upscaled { 2048 } else { 768 };

        ImageRecord::new(NewImageRecord {
            id: id.to_string(),
            sidecar_file: image_file.with_extension("json"),
            image_file,
            created_at: NaiveDateTime::parse_from_str("2025-03-01 10:00:00", "%Y-%m-%d %H:%M:%S")
                .unwrap(),
            checkpoint: "modelA".to_string(),
            upscaled,
            image_size: ImageSize::new(size, size),
            properties,
        })
    }

    fn repo_with(tmp: &TempDir, records: Vec<ImageRecord>) -> Repository {
        let mut repo = Repository::load(
            &tmp.path().join("images.json"),
            &tmp.path().join("backup"),
        )
        .unwrap();
        for mut r in records {
            let image = tmp
                .path()
                .join("images")
                .join(r.folder())
                .join(format!("{}.png", r.id()));
            std::fs::create_dir_all(image.parent().unwrap()).unwrap();
            std::fs::write(&image, r.id().as_bytes()).unwrap();
            r.relocate(&image, &image.with_extension("json"));
            repo.upsert(r);
        }
        repo.write_index().unwrap();
        repo
    }

    fn upscaled_ref<'a>(repo: &'a Repository, id: &str) -> Option<&'a str> {
        repo.get(id).unwrap().properties().upscaled_image_ref()
    }

    #[test]
    fn test_links_regular_to_upscaled_pair() {
        let tmp = tempfile::tempdir().unwrap();
        let mut repo = repo_with(
            &tmp,
            vec![record("regular", "a", false, "123"), record("big", "a", true, "123")],
        );

        let report = detect_upscaled(&mut repo, None).unwrap();
        assert_eq!(
            report.linked,
            vec![LinkedPair {
                regular: "regular".into(),
                upscaled: "big".into()
            }]
        );
        assert_eq!(upscaled_ref(&repo, "regular"), Some("big"));
        assert_eq!(upscaled_ref(&repo, "big"), None);

        let reloaded =
            Repository::load(&tmp.path().join("images.json"), &tmp.path().join("backup")).unwrap();
        assert!(reloaded.missing().is_empty());
        assert_eq!(upscaled_ref(&reloaded, "regular"), Some("big"));
    }

    #[test]
    fn test_single_member_groups_are_silent() {
        let tmp = tempfile::tempdir().unwrap();
        let mut repo = repo_with(
            &tmp,
            vec![record("a", "x", false, "1"), record("b", "x", true, "2")],
        );

        let report = detect_upscaled(&mut repo, None).unwrap();
        assert_eq!(report.groups, 2);
        assert!(report.linked.is_empty());
        assert!(report.ambiguous.is_empty());
    }

    #[test]
    fn test_three_member_group_is_ambiguous() {
        let tmp = tempfile::tempdir().unwrap();
        let mut repo = repo_with(
            &tmp,
            vec![
                record("a", "x", false, "1"),
                record("b", "x", true, "1"),
                record("c", "x", true, "1"),
            ],
        );

        let report = detect_upscaled(&mut repo, None).unwrap();
        assert!(report.linked.is_empty());
        assert_eq!(report.ambiguous.len(), 1);
        assert_eq!(report.ambiguous[0].reason, AmbiguityReason::TooManyMembers(3));
        assert_eq!(upscaled_ref(&repo, "a"), None);
    }

    #[test]
    fn test_same_kind_pair_is_ambiguous() {
        let tmp = tempfile::tempdir().unwrap();
        let mut repo = repo_with(
            &tmp,
            vec![record("a", "x", false, "1"), record("b", "x", false, "1")],
        );

        let report = detect_upscaled(&mut repo, None).unwrap();
        assert!(report.linked.is_empty());
        assert_eq!(
            report.ambiguous[0].reason,
            AmbiguityReason::SameKind { upscaled: false }
        );
        assert_eq!(report.ambiguous[0].ids, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_folder_restriction() {
        let tmp = tempfile::tempdir().unwrap();
        let mut repo = repo_with(
            &tmp,
            vec![record("a", "one", false, "1"), record("b", "two", true, "1")],
        );

        let report = detect_upscaled(&mut repo, Some("one")).unwrap();
        assert!(report.linked.is_empty());

        let report = detect_upscaled(&mut repo, None).unwrap();
        assert_eq!(report.linked.len(), 1);
    }

    #[test]
    fn test_already_linked_records_are_not_candidates() {
        let tmp = tempfile::tempdir().unwrap();
        let mut linked = record("old", "x", false, "1");
        linked.set_upscaled_image_ref(Some("big"));
        let mut repo = repo_with(
            &tmp,
            vec![linked, record("big", "x", true, "1"), record("new", "x", false, "1")],
        );

        let report = detect_upscaled(&mut repo, None).unwrap();
        assert!(report.linked.is_empty());
        assert_eq!(upscaled_ref(&repo, "new"), None);
    }

    #[test]
    fn test_linking_syncs_shared_properties() {
        let tmp = tempfile::tempdir().unwrap();
        let mut regular = record("regular", "a", false, "5");
        regular.set_for_gallery(true);
        regular.set_label("low label");
        let mut big = record("big", "a", true, "5");
        big.set_label("big label");
        let mut repo = repo_with(&tmp, vec![regular, big]);

        detect_upscaled(&mut repo, None).unwrap();

        let big = repo.get("big").unwrap();
        assert!(big.properties().is_for_gallery());
        assert!(big.properties().is_favorite());
        assert_eq!(big.label(), "big label");
        assert_eq!(repo.get("regular").unwrap().label(), "big label");
    }

    #[test]
    fn test_sync_without_differences_changes_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let mut regular = record("regular", "a", false, "5");
        regular.set_upscaled_image_ref(Some("big"));
        let mut repo = repo_with(&tmp, vec![regular, record("big", "a", true, "5")]);

        assert_eq!(sync_linked_properties(&mut repo, "big").unwrap(), 0);
        assert!(!repo.get("big").unwrap().is_user_modified());
    }
}
