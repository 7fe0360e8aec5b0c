use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::hasher;

/// Width of cached thumbnails; part of the thumbnail file name.
pub const THUMBNAIL_WIDTH: u32 = 540;

/// Either side at or above this many pixels marks an image as upscaled.
pub const UPSCALE_DIMENSION_THRESHOLD: u32 = 2000;

/// Pixel dimensions of an image.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

impl ImageSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_upscale_sized(&self) -> bool {
        self.width >= UPSCALE_DIMENSION_THRESHOLD || self.height >= UPSCALE_DIMENSION_THRESHOLD
    }
}

impl fmt::Display for ImageSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// IDs of the modifier (LoRA) reference catalog.
///
/// Parsed keys matching one of these IDs (case-insensitively) are stored
/// as modifier weights under the catalog's spelling of the ID.
#[derive(Debug, Clone, Default)]
pub struct ModifierCatalog {
    ids: Vec<String>,
}

impl ModifierCatalog {
    pub fn new<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            ids: ids.into_iter().map(Into::into).collect(),
        }
    }

    pub fn resolve(&self, key: &str) -> Option<&str> {
        self.ids
            .iter()
            .find(|id| id.eq_ignore_ascii_case(key))
            .map(String::as_str)
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }
}

/// Serialized names of the typed `Properties` fields. Parsed keys must not
/// land in `extra` under one of these, since `extra` is flattened.
const TYPED_KEYS: &[&str] = &[
    "seed",
    "cfg",
    "sampler",
    "steps",
    "scheduler",
    "promptPositive",
    "promptNegative",
    "folder",
    "testName",
    "testNumber",
    "batchNumber",
    "upscaleFactor",
    "favorite",
    "forGallery",
    "forWebsite",
    "upscaledImageRef",
    "websiteImageRef",
    "modifiers",
];

const RENAMED_KEY_PREFIX: &str = "custom_";

fn is_typed_key(key: &str) -> bool {
    TYPED_KEYS.iter().any(|typed| typed.eq_ignore_ascii_case(key))
}

/// Generation parameters and user flags of an image.
///
/// Well-known fields are typed; modifier weights and any other parsed keys
/// live in open maps.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Properties {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub(crate) seed: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub(crate) cfg: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub(crate) sampler: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub(crate) steps: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub(crate) scheduler: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub(crate) prompt_positive: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub(crate) prompt_negative: String,
    #[serde(default)]
    pub(crate) folder: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub(crate) test_name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub(crate) test_number: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub(crate) batch_number: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) upscale_factor: Option<String>,
    #[serde(default)]
    pub(crate) favorite: bool,
    #[serde(default)]
    pub(crate) for_gallery: bool,
    #[serde(default)]
    pub(crate) for_website: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) upscaled_image_ref: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) website_image_ref: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub(crate) modifiers: BTreeMap<String, String>,
    #[serde(flatten)]
    pub(crate) extra: BTreeMap<String, String>,
}

impl Properties {
    /// Build properties from parser output (lowercase keys).
    pub fn from_parsed(parsed: BTreeMap<String, String>, catalog: &ModifierCatalog) -> Self {
        let mut props = Self::default();

        for (key, value) in parsed {
            match key.as_str() {
                "seed" => props.seed = value,
                "cfg" | "cfgscale" | "guidance" => props.cfg = value,
                "sampler" => props.sampler = value,
                "steps" => props.steps = value,
                "scheduler" => props.scheduler = value,
                "prompt" | "positive" | "promptpositive" => props.prompt_positive = value,
                "negative" | "promptnegative" => props.prompt_negative = value,
                "testname" => props.test_name = value,
                "testnumber" => props.test_number = value,
                "batch" | "batchnumber" | "imgbatchnr" => props.batch_number = value,
                "upscalefactor" | "upscale" => props.upscale_factor = Some(value),
                _ => match catalog.resolve(&key) {
                    Some(id) => {
                        props.modifiers.insert(id.to_string(), value);
                    }
                    None if is_typed_key(&key) => {
                        props.extra.insert(format!("{RENAMED_KEY_PREFIX}{key}"), value);
                    }
                    None => {
                        props.extra.insert(key, value);
                    }
                },
            }
        }

        props
    }

    pub fn seed(&self) -> &str {
        &self.seed
    }

    pub fn cfg(&self) -> &str {
        &self.cfg
    }

    pub fn sampler(&self) -> &str {
        &self.sampler
    }

    pub fn steps(&self) -> &str {
        &self.steps
    }

    pub fn scheduler(&self) -> &str {
        &self.scheduler
    }

    pub fn prompt_positive(&self) -> &str {
        &self.prompt_positive
    }

    pub fn prompt_negative(&self) -> &str {
        &self.prompt_negative
    }

    pub fn folder(&self) -> &str {
        &self.folder
    }

    pub fn test_name(&self) -> &str {
        &self.test_name
    }

    pub fn test_number(&self) -> &str {
        &self.test_number
    }

    pub fn batch_number(&self) -> &str {
        &self.batch_number
    }

    /// Whether the parsed text carried an explicit upscale factor.
    pub fn has_upscale_marker(&self) -> bool {
        self.upscale_factor.is_some()
    }

    pub fn upscale_factor(&self) -> Option<&str> {
        self.upscale_factor.as_deref()
    }

    pub fn is_favorite(&self) -> bool {
        self.favorite
    }

    pub fn is_for_gallery(&self) -> bool {
        self.for_gallery
    }

    pub fn is_for_website(&self) -> bool {
        self.for_website
    }

    pub fn upscaled_image_ref(&self) -> Option<&str> {
        self.upscaled_image_ref.as_deref()
    }

    pub fn website_image_ref(&self) -> Option<&str> {
        self.website_image_ref.as_deref()
    }

    pub fn modifiers(&self) -> &BTreeMap<String, String> {
        &self.modifiers
    }

    pub fn extra(&self) -> &BTreeMap<String, String> {
        &self.extra
    }

    /// `id:weight` pairs sorted by modifier ID.
    pub fn modifier_summary(&self) -> String {
        self.modifiers
            .iter()
            .map(|(id, weight)| format!("{id}:{weight}"))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Fields the indexer supplies when creating a record.
#[derive(Debug, Clone)]
pub struct NewImageRecord {
    pub id: String,
    pub image_file: PathBuf,
    pub sidecar_file: PathBuf,
    pub created_at: NaiveDateTime,
    pub checkpoint: String,
    pub upscaled: bool,
    pub image_size: ImageSize,
    pub properties: Properties,
}

/// One cataloged image.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageRecord {
    id: String,
    image_file: PathBuf,
    sidecar_file: PathBuf,
    #[serde(rename = "date")]
    created_at: NaiveDateTime,
    checkpoint: String,
    #[serde(default)]
    upscaled: bool,
    #[serde(default)]
    image_size: ImageSize,
    #[serde(default)]
    modified: bool,
    #[serde(default)]
    label: String,
    #[serde(default)]
    properties: Properties,
    #[serde(skip)]
    data_changed: bool,
}

impl ImageRecord {
    /// A freshly indexed record; flagged for persistence, not user-modified.
    pub fn new(fields: NewImageRecord) -> Self {
        let mut properties = fields.properties;
        properties.folder = folder_name_of(&fields.image_file);

        Self {
            id: fields.id,
            image_file: fields.image_file,
            sidecar_file: fields.sidecar_file,
            created_at: fields.created_at,
            checkpoint: fields.checkpoint,
            upscaled: fields.upscaled,
            image_size: fields.image_size,
            modified: false,
            label: String::new(),
            properties,
            data_changed: true,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn image_file(&self) -> &Path {
        &self.image_file
    }

    pub fn sidecar_file(&self) -> &Path {
        &self.sidecar_file
    }

    pub fn created_at(&self) -> NaiveDateTime {
        self.created_at
    }

    pub fn checkpoint(&self) -> &str {
        &self.checkpoint
    }

    pub fn is_upscaled(&self) -> bool {
        self.upscaled
    }

    pub fn image_size(&self) -> ImageSize {
        self.image_size
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    pub fn folder(&self) -> &str {
        &self.properties.folder
    }

    /// Write-protection flag: set by any user-initiated change, never cleared.
    pub fn is_user_modified(&self) -> bool {
        self.modified
    }

    /// Whether the record changed in this process and must be persisted.
    pub fn is_data_changed(&self) -> bool {
        self.data_changed
    }

    pub(crate) fn clear_data_changed(&mut self) {
        self.data_changed = false;
    }

    /// Record a user-initiated change: write-protects the record and
    /// queues it for the next save.
    pub fn mark_dirty(&mut self) {
        self.modified = true;
        self.data_changed = true;
    }

    pub fn set_label(&mut self, label: &str) -> bool {
        let changed = self.label != label;
        self.label = label.to_string();
        self.mark_dirty();
        changed
    }

    pub fn set_favorite(&mut self, favorite: bool) -> bool {
        let changed = self.properties.favorite != favorite;
        self.properties.favorite = favorite;
        self.mark_dirty();
        changed
    }

    /// Enabling the gallery flag also enables favorite.
    pub fn set_for_gallery(&mut self, for_gallery: bool) -> bool {
        let mut changed = self.properties.for_gallery != for_gallery;
        self.properties.for_gallery = for_gallery;
        if for_gallery {
            changed |= self.set_favorite(true);
        }
        self.mark_dirty();
        changed
    }

    /// Enabling the website flag also enables the gallery flag.
    pub fn set_for_website(&mut self, for_website: bool) -> bool {
        let mut changed = self.properties.for_website != for_website;
        self.properties.for_website = for_website;
        if for_website {
            changed |= self.set_for_gallery(true);
        }
        self.mark_dirty();
        changed
    }

    pub fn set_upscaled_image_ref(&mut self, upscaled_id: Option<&str>) -> bool {
        let changed = self.properties.upscaled_image_ref.as_deref() != upscaled_id;
        self.properties.upscaled_image_ref = upscaled_id.map(str::to_string);
        self.mark_dirty();
        changed
    }

    pub fn set_website_image_ref(&mut self, website_id: Option<&str>) -> bool {
        let changed = self.properties.website_image_ref.as_deref() != website_id;
        self.properties.website_image_ref = website_id.map(str::to_string);
        self.mark_dirty();
        changed
    }

    /// Point the record at new file locations, keeping the folder property
    /// in step with the image's parent directory. Returns whether anything
    /// changed; does not by itself mark the record user-modified.
    pub(crate) fn relocate(&mut self, image_file: &Path, sidecar_file: &Path) -> bool {
        let folder = folder_name_of(image_file);
        let changed = self.image_file != image_file
            || self.sidecar_file != sidecar_file
            || self.properties.folder != folder;

        if changed {
            self.image_file = image_file.to_path_buf();
            self.sidecar_file = sidecar_file.to_path_buf();
            self.properties.folder = folder;
            self.data_changed = true;
        }
        changed
    }

    /// Digest of the generation settings shared by a regular image and its
    /// upscaled version. Falls back to the record ID when a mandatory
    /// setting is empty, so incomplete records never group together.
    pub fn settings_hash(&self) -> String {
        let props = &self.properties;
        let mandatory = [
            self.checkpoint.as_str(),
            props.seed(),
            props.cfg(),
            props.prompt_positive(),
            props.sampler(),
            props.steps(),
            props.scheduler(),
        ];

        if mandatory.iter().any(|value| value.is_empty()) {
            return self.id.clone();
        }

        let summary = props.modifier_summary();
        let mut fields: Vec<&str> = mandatory.to_vec();
        fields.push(props.prompt_negative());
        fields.push(&summary);

        hasher::settings_digest(&fields)
    }

    /// Lowercase words a browser can match a search query against.
    pub fn search_words(&self) -> Vec<String> {
        let file_name = self
            .image_file
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        [
            self.id.as_str(),
            file_name.as_str(),
            self.properties.seed(),
            self.properties.folder(),
            self.checkpoint.as_str(),
            self.properties.test_name(),
        ]
        .iter()
        .map(|word| word.to_lowercase())
        .collect()
    }

    /// Every whitespace-separated term must occur in one of the search words.
    pub fn matches_query(&self, query: &str) -> bool {
        let words = self.search_words();
        query
            .split_whitespace()
            .map(str::to_lowercase)
            .all(|term| words.iter().any(|word| word.contains(&term)))
    }

    pub fn thumbnail_file(&self, cache_folder: &Path) -> PathBuf {
        cache_folder.join(format!("{}-{}.jpg", self.id, THUMBNAIL_WIDTH))
    }

    /// `<slug(label or id)>-<testNumber>-<batchNumber>.png`
    pub fn output_file_name(&self) -> String {
        let base = if self.label.is_empty() {
            &self.id
        } else {
            &self.label
        };
        format!(
            "{}-{}-{}.png",
            slugify(base),
            self.properties.test_number(),
            self.properties.batch_number()
        )
    }
}

/// Name of the immediate parent directory of `path`.
pub fn folder_name_of(path: &Path) -> String {
    path.parent()
        .and_then(Path::file_name)
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}

/// Lowercase ASCII with runs of other characters collapsed to `-`.
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_dash = false;

    for c in text.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }

    slug
}

/// Summary counts over the repository.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogStats {
    pub total_images: usize,
    pub missing_images: usize,
    pub upscaled: usize,
    pub linked: usize,
    pub favorites: usize,
    pub user_modified: usize,
}
