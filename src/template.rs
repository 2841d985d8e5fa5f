//! Template asset resolution.
//!
//! Turns a logical image reference from a descriptor into the base64
//! payload the `-image` locator strategy expects as its selector.

use base64::Engine;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::TemplateError;

/// A template bitmap ready to send to the remote locator
#[derive(Debug, Clone)]
pub struct TemplateImage {
    /// Absolute (or root-joined) path the bytes were read from
    pub path: PathBuf,
    /// Base64-encoded file content
    pub encoded: String,
    /// Pixel dimensions, when the file decodes as an image
    pub dimensions: Option<(u32, u32)>,
}

/// Resolve a reference against `root` unless it is already absolute.
pub fn resolve_asset_path(root: &Path, reference: impl AsRef<Path>) -> PathBuf {
    let reference = reference.as_ref();
    if reference.is_absolute() {
        reference.to_path_buf()
    } else {
        root.join(reference)
    }
}

/// Read and encode a template image.
pub fn load_template(path: &Path) -> Result<TemplateImage, TemplateError> {
    if !path.exists() {
        return Err(TemplateError::NotFound(path.to_path_buf()));
    }

    let bytes = fs::read(path).map_err(|source| TemplateError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    // Dimensions are informational only; the locator gets the raw bytes either way.
    let dimensions = image::image_dimensions(path).ok();
    if let Some((w, h)) = dimensions {
        tracing::debug!(path = %path.display(), width = w, height = h, "Loaded template");
    } else {
        tracing::debug!(path = %path.display(), "Loaded template (dimensions unknown)");
    }

    Ok(TemplateImage {
        path: path.to_path_buf(),
        encoded: base64::engine::general_purpose::STANDARD.encode(bytes),
        dimensions,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb};
    use std::io::Cursor;

    fn write_png(path: &Path, width: u32, height: u32) {
        let img: ImageBuffer<Rgb<u8>, Vec<u8>> = ImageBuffer::from_pixel(width, height, Rgb([10, 20, 30]));
        let mut bytes = Vec::new();
        img.write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
            .expect("encode png");
        fs::write(path, bytes).expect("write png");
    }

    #[test]
    fn test_resolve_relative_and_absolute() {
        let root = Path::new("/work/project");
        assert_eq!(
            resolve_asset_path(root, "icons/home.png"),
            PathBuf::from("/work/project/icons/home.png")
        );
        assert_eq!(
            resolve_asset_path(root, "/elsewhere/home.png"),
            PathBuf::from("/elsewhere/home.png")
        );
    }

    #[test]
    fn test_load_template_encodes_and_measures() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("home.png");
        write_png(&path, 12, 7);

        let template = load_template(&path).unwrap();
        let decoded = base64::engine::general_purpose::STANDARD
            .decode(&template.encoded)
            .unwrap();
        assert_eq!(decoded, fs::read(&path).unwrap());
        assert_eq!(template.dimensions, Some((12, 7)));
    }

    #[test]
    fn test_load_template_accepts_undecodable_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("odd.png");
        fs::write(&path, b"not really a png").unwrap();

        let template = load_template(&path).unwrap();
        assert_eq!(template.dimensions, None);
        assert!(!template.encoded.is_empty());
    }

    #[test]
    fn test_load_template_missing() {
        let err = load_template(Path::new("/definitely/not/here.png")).unwrap_err();
        assert!(matches!(err, TemplateError::NotFound(_)));
        assert!(err.to_string().contains("PNG not found"));
    }
}
