//! Style template discovery.

use std::io::ErrorKind;
use std::path::Path;

use image::DynamicImage;
use tracing::{debug, instrument};

use super::codec::decode_image;
use crate::constants::{MAX_TEMPLATES, TEMPLATE_BASE_FILE, TEMPLATE_NUMBERED_INDEXES};
use crate::error::DecodeError;

/// Ordered style templates. The first one anchors pose, structure and hands.
#[derive(Clone, Debug, Default)]
pub struct TemplateSet {
    images: Vec<DynamicImage>,
}

impl TemplateSet {
    /// Wraps already decoded templates, keeping at most [`MAX_TEMPLATES`].
    pub fn new(mut images: Vec<DynamicImage>) -> Self {
        images.truncate(MAX_TEMPLATES);
        Self { images }
    }

    /// Number of templates.
    pub fn len(&self) -> usize {
        self.images.len()
    }

    /// True when no template was found.
    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    /// The authoritative pose template, if any.
    pub fn base(&self) -> Option<&DynamicImage> {
        self.images.first()
    }

    /// Templates in submission order.
    pub fn iter(&self) -> impl Iterator<Item = &DynamicImage> {
        self.images.iter()
    }
}

/// File names checked, in order: the base template then the numbered ones.
pub fn template_candidates() -> impl Iterator<Item = String> {
    std::iter::once(TEMPLATE_BASE_FILE.to_string()).chain(
        TEMPLATE_NUMBERED_INDEXES.map(|index| format!("template{index}.jpg")),
    )
}

/// Loads every template present in `dir`.
///
/// Missing files are skipped; a file that exists but doesn't decode fails the
/// whole load.
#[instrument(level = "debug")]
pub async fn load_templates(dir: &Path) -> Result<TemplateSet, DecodeError> {
    let mut images = Vec::new();
    for name in template_candidates() {
        if images.len() >= MAX_TEMPLATES {
            break;
        }
        let path = dir.join(&name);
        let Some(bytes) = read_if_present(&path).await? else {
            debug!("Template {} not present", path.display());
            continue;
        };
        images.push(decode_image(&bytes, &format!("template {name}"))?);
    }
    debug!("Loaded {} templates from {}", images.len(), dir.display());
    Ok(TemplateSet::new(images))
}

async fn read_if_present(path: &Path) -> Result<Option<Vec<u8>>, DecodeError> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(Some(bytes)),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
        Err(source) => Err(DecodeError::Read {
            path: path.to_path_buf(),
            source,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::jpeg_bytes;

    fn write_template(dir: &Path, name: &str, width: u32) {
        std::fs::write(dir.join(name), jpeg_bytes(width, 1)).expect("write template");
    }

    fn widths(set: &TemplateSet) -> Vec<u32> {
        set.iter().map(|image| image.width()).collect()
    }

    #[test]
    fn candidates_start_with_base() {
        let names: Vec<String> = template_candidates().collect();
        assert_eq!(
            names,
            [
                "templateBase.jpg",
                "template2.jpg",
                "template3.jpg",
                "template4.jpg",
                "template5.jpg"
            ]
        );
    }

    #[tokio::test]
    async fn gaps_are_skipped_in_order() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_template(dir.path(), "templateBase.jpg", 1);
        write_template(dir.path(), "template3.jpg", 3);
        write_template(dir.path(), "template5.jpg", 5);

        let set = load_templates(dir.path()).await.expect("load");
        assert_eq!(set.len(), 3);
        assert_eq!(widths(&set), [1, 3, 5]);
        assert_eq!(set.base().map(|image| image.width()), Some(1));
    }

    #[tokio::test]
    async fn capped_at_five() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_template(dir.path(), "templateBase.jpg", 1);
        for index in 2..=7 {
            write_template(dir.path(), &format!("template{index}.jpg"), index);
        }

        let set = load_templates(dir.path()).await.expect("load");
        assert_eq!(set.len(), 5);
        assert_eq!(widths(&set), [1, 2, 3, 4, 5]);
    }

    #[tokio::test]
    async fn missing_base_promotes_first_numbered() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_template(dir.path(), "template4.jpg", 4);

        let set = load_templates(dir.path()).await.expect("load");
        assert_eq!(set.base().map(|image| image.width()), Some(4));
    }

    #[tokio::test]
    async fn empty_directory_yields_empty_set() {
        let dir = tempfile::tempdir().expect("tempdir");
        let set = load_templates(dir.path()).await.expect("load");
        assert!(set.is_empty());

        let missing = dir.path().join("does-not-exist");
        let set = load_templates(&missing).await.expect("load");
        assert!(set.is_empty());
    }

    #[tokio::test]
    async fn corrupt_template_fails_closed() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_template(dir.path(), "templateBase.jpg", 1);
        std::fs::write(dir.path().join("template2.jpg"), b"truncated").expect("write");

        let err = load_templates(dir.path()).await.expect_err("should fail");
        assert!(err.to_string().contains("template2.jpg"));
    }

    #[test]
    fn set_truncates_to_cap() {
        let images = (0..8).map(|_| DynamicImage::new_rgb8(1, 1)).collect();
        assert_eq!(TemplateSet::new(images).len(), MAX_TEMPLATES);
    }
}
