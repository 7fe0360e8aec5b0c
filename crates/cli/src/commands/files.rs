use anyhow::Result;
use genvault_core::Organizer;

use super::resolve_id;

pub fn mv(org: &mut Organizer, id: &str, folder: &str) -> Result<()> {
    let id = &resolve_id(org, id)?;
    let moved = org.move_image(id, folder)?;
    if moved.is_empty() {
        println!("{id} is already in {folder}");
    } else {
        println!("Moved {} images to {}", moved.len(), folder);
    }
    Ok(())
}

pub fn rm(org: &mut Organizer, id: &str, cascade: bool) -> Result<()> {
    let id = &resolve_id(org, id)?;
    let deleted = org.delete_image(id, cascade)?;
    for id in &deleted {
        println!("Deleted {id}");
    }
    Ok(())
}

pub fn cleanup(org: &mut Organizer) -> Result<()> {
    let removed = org.cleanup_folders()?;
    for path in &removed {
        println!("Removed empty folder {}", path.display());
    }
    println!("{} empty folders removed.", removed.len());
    Ok(())
}

pub fn output(org: &mut Organizer, id: &str) -> Result<()> {
    let id = &resolve_id(org, id)?;
    let target = org.copy_to_output(id)?;
    println!("Copied to {}", target.display());
    Ok(())
}
