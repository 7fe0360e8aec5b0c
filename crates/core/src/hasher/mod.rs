use std::io::Read;
use std::path::Path;

use sha2::{Digest, Sha256};

/// Separator between settings fields; not expected in prompt text.
pub const SETTINGS_SEPARATOR: &str = "$$";

/// Compute the record ID of an image: the SHA-256 of its contents.
/// Reads in 64KB chunks so large upscales are never held in memory at once.
pub fn compute_image_id(path: &Path) -> std::io::Result<String> {
    let file = std::fs::File::open(path)?;
    let mut reader = std::io::BufReader::with_capacity(64 * 1024, file);
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];

    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

/// Digest of the generation settings, joined with [`SETTINGS_SEPARATOR`].
pub fn settings_digest<S: AsRef<str>>(fields: &[S]) -> String {
    let joined = fields
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<_>>()
        .join(SETTINGS_SEPARATOR);
    format!("{:x}", Sha256::digest(joined.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_image_id_consistency() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("test.png");
        fs::write(&path, b"hello world").unwrap();

        let id1 = compute_image_id(&path).unwrap();
        let id2 = compute_image_id(&path).unwrap();
        assert_eq!(id1, id2);
        assert_eq!(
            id1,
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[test]
    fn test_image_id_survives_rename() {
        let tmp = tempfile::tempdir().unwrap();
        let original = tmp.path().join("a.png");
        fs::write(&original, b"pixels").unwrap();
        let before = compute_image_id(&original).unwrap();

        let renamed = tmp.path().join("elsewhere.png");
        fs::rename(&original, &renamed).unwrap();
        assert_eq!(compute_image_id(&renamed).unwrap(), before);
    }

    #[test]
    fn test_image_id_different_content() {
        let tmp = tempfile::tempdir().unwrap();
        let path_a = tmp.path().join("a.png");
        let path_b = tmp.path().join("b.png");
        fs::write(&path_a, b"content A").unwrap();
        fs::write(&path_b, b"content B").unwrap();

        assert_ne!(
            compute_image_id(&path_a).unwrap(),
            compute_image_id(&path_b).unwrap()
        );
    }

    #[test]
    fn test_image_id_nonexistent_file() {
        assert!(compute_image_id(Path::new("/nonexistent/file.png")).is_err());
    }

    #[test]
    fn test_settings_digest_depends_on_order_and_content() {
        let a = settings_digest(&["modelA", "123", "7"]);
        assert_eq!(a, settings_digest(&["modelA", "123", "7"]));
        assert_ne!(a, settings_digest(&["123", "modelA", "7"]));
        assert_ne!(a, settings_digest(&["modelA", "124", "7"]));
        assert_eq!(a.len(), 64);
    }
}
