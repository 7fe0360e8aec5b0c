use anyhow::Result;
use genvault_core::linker::AmbiguityReason;
use genvault_core::{IndexOutcome, IndexProgress, Organizer};
use indicatif::{ProgressBar, ProgressStyle};

use super::status::short_id;

fn active_style() -> Result<ProgressStyle> {
    Ok(ProgressStyle::with_template(
        "  {bar:30.cyan/blue} {spinner:.green} {pos:>5}/{len:<5} {prefix:.dim} {msg}",
    )?
    .progress_chars("━╸─"))
}

fn done_style() -> Result<ProgressStyle> {
    Ok(ProgressStyle::with_template(
        "  {bar:30.green} {prefix:.green} {msg:.dim}",
    )?)
}

pub fn index(org: &mut Organizer, folder: Option<&str>) -> Result<()> {
    let pb = ProgressBar::new(0);
    pb.set_style(active_style()?);
    pb.set_prefix("Indexing");
    pb.enable_steady_tick(std::time::Duration::from_millis(80));

    let mut on_progress = |progress: IndexProgress| match progress {
        IndexProgress::Start { total } => pb.set_length(total as u64),
        IndexProgress::FileProcessed { path, .. } => {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            pb.set_message(name);
            pb.inc(1);
        }
        IndexProgress::Complete => {}
    };

    let summary = match folder {
        Some(folder) => org.index_folder(folder, Some(&mut on_progress))?,
        None => org.index_all(Some(&mut on_progress))?,
    };

    pb.set_style(done_style()?);
    pb.set_prefix("done");
    pb.finish_with_message(format!("Processed {} files", summary.total()));

    for entry in &summary.outcomes {
        match &entry.outcome {
            IndexOutcome::SkippedNoCheckpoint => {
                println!("  SKIP  {} (no checkpoint)", entry.path.display())
            }
            IndexOutcome::Failed { reason } => {
                println!("  FAIL  {} ({})", entry.path.display(), reason)
            }
            _ => {}
        }
    }

    println!();
    println!(
        "  {} new, {} reindexed, {} paths updated, {} unchanged, {} skipped, {} failed",
        summary.indexed,
        summary.reindexed,
        summary.paths_updated,
        summary.unchanged,
        summary.skipped,
        summary.failed
    );
    println!();
    Ok(())
}

pub fn link(org: &mut Organizer, folder: Option<&str>) -> Result<()> {
    let report = org.detect_upscaled(folder)?;

    for pair in &report.linked {
        println!(
            "  LINK  {} -> {}",
            short_id(&pair.regular),
            short_id(&pair.upscaled)
        );
    }

    for group in &report.ambiguous {
        let reason = match group.reason {
            AmbiguityReason::TooManyMembers(n) => format!("{n} images share these settings"),
            AmbiguityReason::SameKind { upscaled: true } => "all upscaled".to_string(),
            AmbiguityReason::SameKind { upscaled: false } => "none upscaled".to_string(),
        };
        let ids: Vec<&str> = group.ids.iter().map(|id| short_id(id)).collect();
        println!("  CHECK {} ({})", ids.join(", "), reason);
    }

    println!();
    println!(
        "  {} settings groups, {} linked, {} need manual review",
        report.groups,
        report.linked.len(),
        report.ambiguous.len()
    );
    println!();
    Ok(())
}
