pub mod edit;
pub mod files;
pub mod index;
pub mod ls;
pub mod status;

use anyhow::Result;
use genvault_core::Organizer;

/// Expand an ID or unique ID prefix, as printed by `ls`, to a full image ID.
pub(crate) fn resolve_id(org: &mut Organizer, id: &str) -> Result<String> {
    Ok(org.repository()?.resolve_id(id)?)
}
