use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Bounding box for a detected face, with optional facial landmarks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub confidence: f32,
    /// Five-point facial landmarks: [left_eye, right_eye, nose, left_mouth, right_mouth].
    pub landmarks: Option<[(f32, f32); 5]>,
}

/// Face embedding vector (512-dimensional for ArcFace).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Embedding {
    pub values: Vec<f32>,
    /// Model version that produced this embedding (e.g., "w600k_r50").
    pub model_version: Option<String>,
}

impl Embedding {
    pub fn new(values: Vec<f32>) -> Self {
        Self {
            values,
            model_version: None,
        }
    }

    /// Compute Euclidean distance between two embeddings.
    pub fn euclidean_distance(&self, other: &Embedding) -> f32 {
        self.values
            .iter()
            .zip(other.values.iter())
            .map(|(a, b)| (a - b).powi(2))
            .sum::<f32>()
            .sqrt()
    }

    /// Cosine similarity in `[-1, 1]`; 0.0 if either vector has zero norm.
    pub fn cosine_similarity(&self, other: &Embedding) -> f32 {
        let dot: f32 = self
            .values
            .iter()
            .zip(other.values.iter())
            .map(|(a, b)| a * b)
            .sum();
        let norm_a = self.values.iter().map(|v| v * v).sum::<f32>().sqrt();
        let norm_b = other.values.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm_a == 0.0 || norm_b == 0.0 {
            return 0.0;
        }
        dot / (norm_a * norm_b)
    }
}

impl From<Vec<f32>> for Embedding {
    fn from(values: Vec<f32>) -> Self {
        Self::new(values)
    }
}

/// An enrolled face: the image file stem and the embedding of its first detected face.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GalleryEntry {
    pub name: String,
    pub embedding: Embedding,
}

/// Enrolled faces in insertion order. Built once at startup and never mutated.
#[derive(Debug, Clone, Default)]
pub struct Gallery {
    entries: Vec<GalleryEntry>,
}

impl Gallery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, name: impl Into<String>, embedding: Embedding) {
        self.entries.push(GalleryEntry {
            name: name.into(),
            embedding,
        });
    }

    pub fn entries(&self) -> &[GalleryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<GalleryEntry> for Gallery {
    fn from_iter<I: IntoIterator<Item = GalleryEntry>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// Scales cosine distance so that cosine similarity 0.40 lands on distance 0.5
/// and similarity 0.58 on 65% confidence.
pub const COSINE_DISTANCE_SCALE: f32 = 5.0 / 6.0;

/// How two embeddings are turned into a distance.
///
/// Tolerance and confidence are read on the scale of dlib face descriptors,
/// where a same-person pair usually sits below 0.5. Each metric maps its
/// provider's embeddings onto that scale.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DistanceMetric {
    /// Plain Euclidean distance, for embeddings already on that scale.
    #[default]
    Euclidean,
    /// `(1 - cosine) * COSINE_DISTANCE_SCALE`, for ArcFace embeddings.
    Cosine,
}

impl DistanceMetric {
    pub fn distance(self, a: &Embedding, b: &Embedding) -> f32 {
        match self {
            DistanceMetric::Euclidean => a.euclidean_distance(b),
            DistanceMetric::Cosine => (1.0 - a.cosine_similarity(b)) * COSINE_DISTANCE_SCALE,
        }
    }
}

impl fmt::Display for DistanceMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DistanceMetric::Euclidean => f.write_str("euclidean"),
            DistanceMetric::Cosine => f.write_str("cosine"),
        }
    }
}

/// Result of matching a probe embedding against a gallery.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchResult {
    pub matched: bool,
    /// Name of the matched gallery entry (if any).
    pub name: Option<String>,
    /// `(1 - distance) * 100`. Not clamped: distances above 1.0 go negative.
    pub confidence: f64,
}

impl MatchResult {
    pub fn not_found() -> Self {
        Self {
            matched: false,
            name: None,
            confidence: 0.0,
        }
    }

    fn found(entry: &GalleryEntry, distance: f32) -> Self {
        Self {
            matched: true,
            name: Some(entry.name.clone()),
            confidence: confidence_from_distance(distance),
        }
    }
}

/// Percentage score derived from an embedding distance.
pub fn confidence_from_distance(distance: f32) -> f64 {
    (1.0 - f64::from(distance)) * 100.0
}

/// Strategy for comparing a probe embedding against the gallery.
pub trait Matcher: Send + Sync {
    fn compare(&self, probe: &Embedding, gallery: &Gallery, tolerance: f32) -> MatchResult;
}

/// Picks the first entry, in gallery order, whose distance is within tolerance.
///
/// A later entry never wins over an earlier one, even when it is closer.
#[derive(Debug, Clone, Copy, Default)]
pub struct FirstMatchMatcher {
    pub metric: DistanceMetric,
}

impl Matcher for FirstMatchMatcher {
    fn compare(&self, probe: &Embedding, gallery: &Gallery, tolerance: f32) -> MatchResult {
        let distances: Vec<f32> = gallery
            .entries()
            .iter()
            .map(|entry| self.metric.distance(probe, &entry.embedding))
            .collect();

        match distances.iter().position(|&d| d <= tolerance) {
            Some(idx) => MatchResult::found(&gallery.entries()[idx], distances[idx]),
            None => MatchResult::not_found(),
        }
    }
}

/// Picks the entry with the smallest distance, if it is within tolerance.
/// Ties keep the earlier entry.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClosestMatcher {
    pub metric: DistanceMetric,
}

impl Matcher for ClosestMatcher {
    fn compare(&self, probe: &Embedding, gallery: &Gallery, tolerance: f32) -> MatchResult {
        let mut best: Option<(usize, f32)> = None;

        for (i, entry) in gallery.entries().iter().enumerate() {
            let d = self.metric.distance(probe, &entry.embedding);
            if best.map_or(true, |(_, best_d)| d < best_d) {
                best = Some((i, d));
            }
        }

        match best {
            Some((idx, d)) if d <= tolerance => MatchResult::found(&gallery.entries()[idx], d),
            _ => MatchResult::not_found(),
        }
    }
}

/// Configured gallery selection policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MatchPolicy {
    /// First entry in gallery order within tolerance.
    #[default]
    First,
    /// Minimum-distance entry within tolerance.
    Closest,
}

impl MatchPolicy {
    pub fn matcher(self, metric: DistanceMetric) -> Box<dyn Matcher> {
        match self {
            MatchPolicy::First => Box::new(FirstMatchMatcher { metric }),
            MatchPolicy::Closest => Box::new(ClosestMatcher { metric }),
        }
    }
}

impl fmt::Display for MatchPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchPolicy::First => f.write_str("first"),
            MatchPolicy::Closest => f.write_str("closest"),
        }
    }
}

impl FromStr for MatchPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "first" => Ok(MatchPolicy::First),
            "closest" => Ok(MatchPolicy::Closest),
            other => Err(format!("unknown match policy: {other}")),
        }
    }
}

/// Match every detected face in detection order, stopping at the first face
/// that matches anything in the gallery.
pub fn match_faces(
    matcher: &dyn Matcher,
    probes: &[Embedding],
    gallery: &Gallery,
    tolerance: f32,
) -> MatchResult {
    probes
        .iter()
        .map(|probe| matcher.compare(probe, gallery, tolerance))
        .find(|result| result.matched)
        .unwrap_or_else(MatchResult::not_found)
}
