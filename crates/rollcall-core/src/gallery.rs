//! Startup gallery loader.
//!
//! Every `.jpg`, `.jpeg` or `.png` file in the gallery directory enrolls one
//! face under its file stem. Files that cannot be read, decoded, or that
//! contain no face are logged and skipped.

use crate::provider::{EmbeddingProvider, ProviderError};
use crate::types::{Embedding, Gallery};
use std::path::Path;
use thiserror::Error;

const GALLERY_EXTENSIONS: [&str; 3] = [".jpg", ".jpeg", ".png"];

#[derive(Error, Debug)]
pub enum GalleryError {
    #[error("read failed: {0}")]
    Read(#[from] std::io::Error),
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error("no face detected")]
    NoFace,
}

fn is_gallery_image(file_name: &str) -> bool {
    let lower = file_name.to_lowercase();
    GALLERY_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
}

fn load_entry<P: EmbeddingProvider + ?Sized>(
    path: &Path,
    provider: &mut P,
) -> Result<Embedding, GalleryError> {
    let bytes = std::fs::read(path)?;
    provider
        .embed(&bytes)?
        .into_iter()
        .next()
        .ok_or(GalleryError::NoFace)
}

/// Build the gallery from `dir`, in directory listing order.
///
/// A missing or unreadable directory yields an empty gallery. Only the first
/// face of each image is enrolled.
pub fn load_gallery<P: EmbeddingProvider + ?Sized>(dir: &Path, provider: &mut P) -> Gallery {
    let mut gallery = Gallery::new();

    if !dir.exists() {
        tracing::error!(dir = %dir.display(), "gallery directory not found");
        return gallery;
    }

    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) => {
            tracing::error!(dir = %dir.display(), error = %err, "cannot list gallery directory");
            return gallery;
        }
    };

    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                tracing::error!(dir = %dir.display(), error = %err, "cannot read gallery entry");
                continue;
            }
        };

        let file_name = entry.file_name().to_string_lossy().into_owned();
        if !is_gallery_image(&file_name) {
            continue;
        }

        let path = entry.path();
        let name = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| file_name.clone());

        tracing::info!(file = %file_name, "loading face");
        match load_entry(&path, provider) {
            Ok(embedding) => {
                tracing::info!(name = %name, "loaded face");
                gallery.push(name, embedding);
            }
            Err(GalleryError::NoFace) => {
                tracing::warn!(file = %file_name, "no face detected, skipping");
            }
            Err(err) => {
                tracing::error!(file = %file_name, error = %err, "failed to load face, skipping");
            }
        }
    }

    tracing::info!(dir = %dir.display(), faces = gallery.len(), "gallery loaded");
    gallery
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    /// Reads `face:<v>,<v>,...` lines, one embedding per line. Anything else is
    /// handed to the real image decoder, which rejects it.
    struct TextProvider {
        calls: usize,
    }

    impl EmbeddingProvider for TextProvider {
        fn embed(&mut self, image: &[u8]) -> Result<Vec<Embedding>, ProviderError> {
            self.calls += 1;
            let text = String::from_utf8_lossy(image);
            if text == "noface" {
                return Ok(Vec::new());
            }
            if !text.starts_with("face:") {
                image::load_from_memory(image)?;
                return Ok(Vec::new());
            }
            Ok(text
                .lines()
                .filter_map(|line| line.strip_prefix("face:"))
                .map(|vals| {
                    Embedding::new(vals.split(',').filter_map(|v| v.parse().ok()).collect())
                })
                .collect())
        }
    }

    fn names(gallery: &Gallery) -> Vec<String> {
        let mut names: Vec<String> = gallery.entries().iter().map(|e| e.name.clone()).collect();
        names.sort();
        names
    }

    #[test]
    fn test_missing_directory_yields_empty_gallery() {
        let tmp = tempfile::tempdir().unwrap();
        let mut provider = TextProvider { calls: 0 };
        let gallery = load_gallery(&tmp.path().join("absent"), &mut provider);
        assert!(gallery.is_empty());
        assert_eq!(provider.calls, 0);
    }

    #[test]
    fn test_empty_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let gallery = load_gallery(tmp.path(), &mut TextProvider { calls: 0 });
        assert!(gallery.is_empty());
    }

    #[test]
    fn test_loads_images_and_skips_failures() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("alice.jpg"), "face:0.1,0.2").unwrap();
        fs::write(tmp.path().join("Bob.JPEG"), "face:0.3,0.4").unwrap();
        fs::write(tmp.path().join("carol.png"), "face:0.5,0.6").unwrap();
        fs::write(tmp.path().join("nobody.jpg"), "noface").unwrap();
        fs::write(tmp.path().join("corrupt.png"), "not an image").unwrap();
        fs::write(tmp.path().join("notes.txt"), "face:9,9").unwrap();

        let mut provider = TextProvider { calls: 0 };
        let gallery = load_gallery(tmp.path(), &mut provider);

        assert_eq!(names(&gallery), vec!["Bob", "alice", "carol"]);
        // notes.txt is never handed to the provider
        assert_eq!(provider.calls, 5);

        let alice = gallery.entries().iter().find(|e| e.name == "alice").unwrap();
        assert_eq!(alice.embedding.values, vec![0.1, 0.2]);
    }

    #[test]
    fn test_only_first_face_is_enrolled() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("group.jpg"), "face:1,0\nface:0,1").unwrap();

        let gallery = load_gallery(tmp.path(), &mut TextProvider { calls: 0 });
        assert_eq!(gallery.len(), 1);
        assert_eq!(gallery.entries()[0].embedding.values, vec![1.0, 0.0]);
    }

    #[test]
    fn test_duplicate_images_are_not_deduplicated() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("dave.jpg"), "face:0.7,0.7").unwrap();
        fs::write(tmp.path().join("dave.png"), "face:0.7,0.7").unwrap();

        let gallery = load_gallery(tmp.path(), &mut TextProvider { calls: 0 });
        assert_eq!(names(&gallery), vec!["dave", "dave"]);
    }

    #[test]
    fn test_stem_keeps_inner_dots() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("j.doe.jpg"), "face:1").unwrap();

        let gallery = load_gallery(tmp.path(), &mut TextProvider { calls: 0 });
        assert_eq!(names(&gallery), vec!["j.doe"]);
    }

    #[test]
    fn test_extension_filter() {
        assert!(is_gallery_image("a.JPG"));
        assert!(is_gallery_image("a.jpeg"));
        assert!(is_gallery_image("a.Png"));
        assert!(!is_gallery_image("a.gif"));
        assert!(!is_gallery_image("jpg"));
    }
}
