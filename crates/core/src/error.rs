use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("image processing error: {0}")]
    Image(#[from] image::ImageError),

    #[error("walkdir error: {0}")]
    WalkDir(#[from] walkdir::Error),

    #[error("cannot access index file {}: {source}", .path.display())]
    IndexIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("index file {} is not valid: {source}", .path.display())]
    MalformedIndex {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("image folder does not exist: {}", .0.display())]
    ImageFolderNotFound(PathBuf),

    #[error("config file not found: {}", .0.display())]
    ConfigNotFound(PathBuf),

    #[error("output folder not configured")]
    OutputFolderNotSet,

    #[error("image record not found: {0}")]
    RecordNotFound(String),

    #[error("image ID prefix {0} matches more than one record")]
    AmbiguousId(String),

    #[error("cannot save image record {0}: no such ID in the index file")]
    RecordNotInStore(String),

    #[error("target file already exists: {}", .0.display())]
    TargetExists(PathBuf),

    #[error("invalid folder name: {0:?}")]
    InvalidFolderName(String),
}

pub type Result<T> = std::result::Result<T, Error>;
