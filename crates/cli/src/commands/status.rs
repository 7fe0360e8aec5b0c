use std::collections::BTreeMap;

use anyhow::Result;
use comfy_table::{presets::UTF8_FULL, Cell, ContentArrangement, Table};
use genvault_core::domain::ImageRecord;
use genvault_core::Organizer;

/// Per-folder counts for the status table.
#[derive(Debug, Default, PartialEq)]
pub(crate) struct FolderStats {
    pub(crate) images: usize,
    pub(crate) upscaled: usize,
    pub(crate) favorites: usize,
    pub(crate) disk: u64,
}

pub(crate) fn compute_folder_stats(records: &[&ImageRecord]) -> BTreeMap<String, FolderStats> {
    let mut stats: BTreeMap<String, FolderStats> = BTreeMap::new();
    for record in records {
        let entry = stats.entry(record.folder().to_string()).or_default();
        entry.images += 1;
        entry.upscaled += usize::from(record.is_upscaled());
        entry.favorites += usize::from(record.properties().is_favorite());
        entry.disk += std::fs::metadata(record.image_file())
            .map(|m| m.len())
            .unwrap_or(0);
    }
    stats
}

pub fn run(org: &mut Organizer) -> Result<()> {
    let image_folder = org.image_folder().display().to_string();
    let index_file = org.config().index_file().display().to_string();
    let stats = org.status()?;
    let records = org.repository()?.all();
    let folders = compute_folder_stats(&records);

    println!();
    println!("  genvault Status");
    println!("  ===============");
    println!();
    println!("   Images:     {image_folder}");
    println!("   Index:      {index_file}");
    println!();
    println!(
        "   Total:      {:>8}        Missing:     {:>8}",
        stats.total_images, stats.missing_images
    );
    println!(
        "   Upscaled:   {:>8}        Linked:      {:>8}",
        stats.upscaled, stats.linked
    );
    println!(
        "   Favorites:  {:>8}        Edited:      {:>8}",
        stats.favorites, stats.user_modified
    );

    if folders.is_empty() {
        println!();
        println!("  No images indexed. Run `genvault index` first.");
        println!();
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Folder"),
        Cell::new("Images"),
        Cell::new("Upscaled"),
        Cell::new("Favorites"),
        Cell::new("Size"),
    ]);

    for (name, s) in &folders {
        table.add_row(vec![
            Cell::new(name),
            Cell::new(s.images),
            Cell::new(s.upscaled),
            Cell::new(s.favorites),
            Cell::new(format_size(s.disk)),
        ]);
    }

    println!();
    println!("  Folders");
    println!("  -------");
    println!("{table}");
    println!();
    Ok(())
}

/// First 12 characters of an image ID, enough to tell images apart.
pub(crate) fn short_id(id: &str) -> &str {
    id.get(..12).unwrap_or(id)
}

pub(crate) fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    match bytes {
        b if b >= GB => format!("{:.1} GB", b as f64 / GB as f64),
        b if b >= MB => format!("{:.1} MB", b as f64 / MB as f64),
        b if b >= KB => format!("{:.1} KB", b as f64 / KB as f64),
        b => format!("{b} B"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(0), "0 B");
        assert_eq!(format_size(1023), "1023 B");
        assert_eq!(format_size(1536), "1.5 KB");
        assert_eq!(format_size(1_500_000), "1.4 MB");
        assert_eq!(format_size(2_500_000_000), "2.3 GB");
    }

    #[test]
    fn test_short_id() {
        assert_eq!(short_id("0123456789abcdef"), "0123456789ab");
        assert_eq!(short_id("abc"), "abc");
        assert_eq!(short_id(""), "");
    }

    #[test]
    fn test_compute_folder_stats_empty() {
        assert!(compute_folder_stats(&[]).is_empty());
    }
}
