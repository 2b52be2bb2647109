//! Embedding providers: image bytes in, face embeddings out.

use crate::detector::{DetectorError, FaceDetector};
use crate::recognizer::{FaceRecognizer, RecognizerError};
use crate::types::{DistanceMetric, Embedding};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("image decode failed: {0}")]
    Decode(#[from] image::ImageError),
    #[error("detector error: {0}")]
    Detector(#[from] DetectorError),
    #[error("recognizer error: {0}")]
    Recognizer(#[from] RecognizerError),
}

/// Turns an encoded image into zero or more face embeddings.
///
/// Embeddings come back in detection order. Implementations may keep
/// mutable inference state, so callers need exclusive access.
pub trait EmbeddingProvider: Send {
    fn embed(&mut self, image: &[u8]) -> Result<Vec<Embedding>, ProviderError>;

    /// Distance that puts this provider's embeddings on the tolerance scale.
    fn metric(&self) -> DistanceMetric {
        DistanceMetric::Euclidean
    }
}

/// SCRFD detection followed by ArcFace recognition for every detected face.
pub struct OnnxEmbeddingProvider {
    detector: FaceDetector,
    recognizer: FaceRecognizer,
}

impl OnnxEmbeddingProvider {
    /// Load both ONNX models. Fails if either file is missing or invalid.
    pub fn load(scrfd_path: &str, arcface_path: &str) -> Result<Self, ProviderError> {
        let detector = FaceDetector::load(scrfd_path)?;
        let recognizer = FaceRecognizer::load(arcface_path)?;
        Ok(Self {
            detector,
            recognizer,
        })
    }
}

impl EmbeddingProvider for OnnxEmbeddingProvider {
    fn embed(&mut self, image: &[u8]) -> Result<Vec<Embedding>, ProviderError> {
        let rgb = image::load_from_memory(image)?.to_rgb8();
        let faces = self.detector.detect(&rgb)?;

        tracing::debug!(
            faces = faces.len(),
            width = rgb.width(),
            height = rgb.height(),
            "faces detected"
        );

        faces
            .iter()
            .map(|face| self.recognizer.extract(&rgb, face).map_err(ProviderError::from))
            .collect()
    }

    /// ArcFace vectors are L2-normalized, so Euclidean distance would need
    /// cosine 0.875 to reach a 0.5 tolerance.
    fn metric(&self) -> DistanceMetric {
        DistanceMetric::Cosine
    }
}

impl<P: EmbeddingProvider + ?Sized> EmbeddingProvider for Box<P> {
    fn embed(&mut self, image: &[u8]) -> Result<Vec<Embedding>, ProviderError> {
        (**self).embed(image)
    }

    fn metric(&self) -> DistanceMetric {
        (**self).metric()
    }
}
