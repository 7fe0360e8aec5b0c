use anyhow::Result;
use genvault_core::Organizer;

use super::resolve_id;

#[derive(Debug, Clone, Copy)]
pub enum Flag {
    Favorite,
    Gallery,
    Website,
}

impl Flag {
    fn name(self) -> &'static str {
        match self {
            Flag::Favorite => "favorite",
            Flag::Gallery => "gallery",
            Flag::Website => "website",
        }
    }
}

pub fn flag(org: &mut Organizer, id: &str, flag: Flag, on: bool) -> Result<()> {
    let id = &resolve_id(org, id)?;
    let changed = match flag {
        Flag::Favorite => org.set_favorite(id, on)?,
        Flag::Gallery => org.set_for_gallery(id, on)?,
        Flag::Website => org.set_for_website(id, on)?,
    };
    let state = if on { "on" } else { "off" };
    if changed {
        println!("Turned {} {} for {}", flag.name(), state, id);
    } else {
        println!("{} was already {} for {}", flag.name(), state, id);
    }
    Ok(())
}

pub fn label(org: &mut Organizer, id: &str, text: &str) -> Result<()> {
    let id = &resolve_id(org, id)?;
    org.set_label(id, text)?;
    if text.is_empty() {
        println!("Cleared label of {id}");
    } else {
        println!("Labeled {id}: {text}");
    }
    Ok(())
}

pub fn link_upscaled(org: &mut Organizer, id: &str, upscaled_id: &str) -> Result<()> {
    let id = &resolve_id(org, id)?;
    let upscaled_id = &resolve_id(org, upscaled_id)?;
    org.set_upscaled_image(id, upscaled_id)?;
    println!("Linked {id} to upscaled image {upscaled_id}");
    Ok(())
}
