//! rollcall-core: face gallery, matching, and embedding extraction.
//!
//! Uses SCRFD for face detection and ArcFace for face recognition,
//! both running via ONNX Runtime for CPU inference. Callers that only
//! need matching can plug in their own [`EmbeddingProvider`].

pub mod alignment;
pub mod detector;
pub mod gallery;
pub mod provider;
pub mod recognizer;
pub mod types;

use std::path::PathBuf;

pub use detector::FaceDetector;
pub use gallery::load_gallery;
pub use provider::{EmbeddingProvider, OnnxEmbeddingProvider, ProviderError};
pub use recognizer::FaceRecognizer;
pub use types::{
    match_faces, BoundingBox, ClosestMatcher, DistanceMetric, Embedding, FirstMatchMatcher,
    Gallery, GalleryEntry, MatchPolicy, MatchResult, Matcher,
};

/// File name of the SCRFD detection model inside the model directory.
pub const SCRFD_MODEL_FILE: &str = "det_10g.onnx";
/// File name of the ArcFace recognition model inside the model directory.
pub const ARCFACE_MODEL_FILE: &str = "w600k_r50.onnx";

/// Default directory holding the ONNX model files.
///
/// `$XDG_DATA_HOME/rollcall/models`, falling back to `~/.local/share/rollcall/models`.
pub fn default_model_dir() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".local/share")
        })
        .join("rollcall")
        .join("models")
}
