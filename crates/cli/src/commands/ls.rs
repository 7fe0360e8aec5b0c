use anyhow::Result;
use comfy_table::{presets::UTF8_FULL, Cell, Color, ContentArrangement, Table};
use genvault_core::domain::ImageRecord;
use genvault_core::Organizer;

use super::resolve_id;
use super::status::{format_size, short_id};

fn flags(record: &ImageRecord) -> String {
    let props = record.properties();
    [
        (props.is_favorite(), 'F'),
        (props.is_for_gallery(), 'G'),
        (props.is_for_website(), 'W'),
        (record.is_user_modified(), 'M'),
    ]
    .iter()
    .map(|&(on, c)| if on { c } else { '·' })
    .collect()
}

fn file_name(record: &ImageRecord) -> String {
    record
        .image_file()
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}

pub fn list(org: &mut Organizer, folder: Option<&str>, search: Option<&str>) -> Result<()> {
    let records = org.search(folder, search)?;

    if records.is_empty() {
        println!("No images found. Run `genvault index` first.");
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("ID"),
        Cell::new("File"),
        Cell::new("Folder"),
        Cell::new("Size"),
        Cell::new("Seed"),
        Cell::new("Flags"),
        Cell::new("Upscaled"),
        Cell::new("Label"),
    ]);

    for record in &records {
        let upscaled = match record.properties().upscaled_image_ref() {
            Some(target) => Cell::new(format!("-> {}", short_id(target))).fg(Color::Cyan),
            None if record.is_upscaled() => Cell::new("yes").fg(Color::Green),
            None => Cell::new(""),
        };
        table.add_row(vec![
            Cell::new(short_id(record.id())),
            Cell::new(file_name(record)),
            Cell::new(record.folder()),
            Cell::new(record.image_size()),
            Cell::new(record.properties().seed()),
            Cell::new(flags(record)),
            upscaled,
            Cell::new(record.label()),
        ]);
    }

    println!("{table}");
    println!();
    println!("  {} images", records.len());
    Ok(())
}

pub fn show(org: &mut Organizer, id: &str) -> Result<()> {
    let id = &resolve_id(org, id)?;
    let low_res = org.repository()?.low_res_ids(id);
    let record = org.get(id)?;
    let props = record.properties();
    let disk = std::fs::metadata(record.image_file())
        .map(|m| format_size(m.len()))
        .unwrap_or_else(|_| "missing".to_string());

    println!("Image {}", record.id());
    println!("{}", "-".repeat(60));
    println!("  File:        {} ({})", record.image_file().display(), disk);
    println!("  Sidecar:     {}", record.sidecar_file().display());
    println!("  Folder:      {}", record.folder());
    println!("  Date:        {}", record.created_at().format("%Y-%m-%d %H:%M:%S"));
    println!("  Checkpoint:  {}", record.checkpoint());
    println!("  Size:        {}", record.image_size());
    println!("  Upscaled:    {}", record.is_upscaled());
    println!("  Edited:      {}", record.is_user_modified());
    println!("  Label:       {}", record.label());
    println!("  Flags:       {}", flags(record));
    println!();

    let fields = [
        ("seed", props.seed()),
        ("cfg", props.cfg()),
        ("sampler", props.sampler()),
        ("steps", props.steps()),
        ("scheduler", props.scheduler()),
        ("prompt", props.prompt_positive()),
        ("negative", props.prompt_negative()),
        ("test name", props.test_name()),
        ("test number", props.test_number()),
        ("batch number", props.batch_number()),
    ];
    for (name, value) in fields.iter().filter(|(_, v)| !v.is_empty()) {
        println!("  {:<13}{}", format!("{name}:"), value);
    }
    for (name, value) in props.extra() {
        println!("  {:<13}{}", format!("{name}:"), value);
    }
    if !props.modifiers().is_empty() {
        println!("  {:<13}{}", "modifiers:", props.modifier_summary());
    }

    println!();
    println!("  Settings:    {}", record.settings_hash());
    if let Some(target) = props.upscaled_image_ref() {
        println!("  Upscaled as: {target}");
    }
    for low in &low_res {
        println!("  Low-res:     {low}");
    }
    Ok(())
}

pub fn missing(org: &mut Organizer, purge: bool) -> Result<()> {
    if purge {
        let purged = org.purge_missing()?;
        println!("Purged {} missing images from the index.", purged.len());
        return Ok(());
    }

    let records = org.missing()?;
    if records.is_empty() {
        println!("No missing images.");
        return Ok(());
    }

    for record in &records {
        println!("  {}  {}", short_id(record.id()), record.image_file().display());
    }
    println!();
    println!(
        "  {} missing images. Run `genvault missing --purge` to drop them.",
        records.len()
    );
    Ok(())
}

