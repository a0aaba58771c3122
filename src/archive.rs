//! Photo archive glue around external collaborators
//!
//! EXIF extraction, object detection and record storage are provided by
//! other components; this module only fixes their interfaces and the pure
//! logic between them (photo classification and keyword generation).

use crate::error::PrepError;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Mutex;

/// Detector confidence used by the archive upload flow
pub const DEFAULT_CONFIDENCE: f32 = 0.25;

/// Maximum number of entries returned by [`summarize_objects`]
const SUMMARY_LIMIT: usize = 10;

/// EXIF fields the archive cares about, all optional
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PhotoMetadata {
    pub taken_date: Option<String>,
    pub camera_make: Option<String>,
    pub camera_model: Option<String>,
    pub gps_lat: Option<f64>,
    pub gps_lon: Option<f64>,
}

impl PhotoMetadata {
    /// Both coordinates, or `None` if either is missing
    pub fn location(&self) -> Option<(f64, f64)> {
        Some((self.gps_lat?, self.gps_lon?))
    }
}

/// Kind of archived item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Photo,
}

/// A record ready to be stored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhotoRecord {
    pub file_name: String,
    pub kind: ItemKind,
    pub metadata: PhotoMetadata,
    pub objects: Vec<String>,
    pub keywords: Vec<String>,
}

/// A record as returned by the store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRecord {
    pub id: u64,
    #[serde(flatten)]
    pub record: PhotoRecord,
}

/// Reads EXIF metadata from an image file
pub trait MetadataExtractor: Send + Sync {
    fn extract(&self, path: &Path) -> Result<PhotoMetadata, PrepError>;
}

/// Off-the-shelf object detector returning one label per detection
pub trait ObjectDetector: Send + Sync {
    fn detect(&self, path: &Path, confidence_threshold: f32) -> Result<Vec<String>, PrepError>;
}

/// Record storage and keyword search
pub trait ArchiveStore: Send + Sync {
    fn insert(&self, record: PhotoRecord) -> Result<u64, PrepError>;
    fn search(&self, query: &str) -> Result<Vec<StoredRecord>, PrepError>;
    fn list_with_location(&self) -> Result<Vec<StoredRecord>, PrepError>;
}

/// A photo is likely a camera shot when EXIF carries a date or camera info
pub fn is_photo_by_exif(metadata: &PhotoMetadata) -> bool {
    [
        &metadata.taken_date,
        &metadata.camera_model,
        &metadata.camera_make,
    ]
    .iter()
    .any(|field| field.as_deref().is_some_and(|v| !v.is_empty()))
}

/// Search keywords: date, make, model, GPS tag, then object labels.
/// Values are trimmed, empties dropped, duplicates removed keeping the
/// first occurrence.
pub fn generate_photo_keywords(metadata: &PhotoMetadata, objects: &[String]) -> Vec<String> {
    let mut candidates: Vec<String> = Vec::new();

    for field in [
        &metadata.taken_date,
        &metadata.camera_make,
        &metadata.camera_model,
    ] {
        if let Some(value) = field {
            candidates.push(value.clone());
        }
    }

    if let Some((lat, lon)) = metadata.location() {
        candidates.push(format!("GPS:{:.6},{:.6}", lat, lon));
    }

    candidates.extend(objects.iter().cloned());

    let mut seen = HashSet::new();
    candidates
        .into_iter()
        .map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty())
        .filter(|k| seen.insert(k.clone()))
        .collect()
}

/// Label frequencies, most common first (ties keep first-seen order)
pub fn summarize_objects(objects: &[String]) -> Vec<(String, usize)> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    let mut order: Vec<&str> = Vec::new();
    for label in objects {
        let count = counts.entry(label.as_str()).or_insert(0);
        if *count == 0 {
            order.push(label.as_str());
        }
        *count += 1;
    }

    let mut summary: Vec<(String, usize)> = order
        .into_iter()
        .map(|label| (label.to_string(), counts[label]))
        .collect();
    // Stable sort keeps first-seen order among equal counts
    summary.sort_by(|a, b| b.1.cmp(&a.1));
    summary.truncate(SUMMARY_LIMIT);
    summary
}

/// Extract metadata, detect objects, build keywords and store the record
///
/// `path` is what the collaborators analyse (often a staged temp file);
/// `file_name` is the name stored and searched.
pub fn catalog_photo(
    path: &Path,
    file_name: &str,
    extractor: &dyn MetadataExtractor,
    detector: &dyn ObjectDetector,
    store: &dyn ArchiveStore,
    confidence_threshold: f32,
) -> Result<StoredRecord, PrepError> {
    let file_name = file_name.trim();
    if file_name.is_empty() {
        return Err(PrepError::InvalidRequest(
            "file name must not be empty".to_string(),
        ));
    }

    let metadata = extractor.extract(path)?;
    let objects = detector.detect(path, confidence_threshold)?;
    let keywords = generate_photo_keywords(&metadata, &objects);

    if !is_photo_by_exif(&metadata) {
        // Still stored; EXIF is just not conclusive
        tracing::info!("{} has no camera EXIF, storing anyway", file_name);
    }

    let record = PhotoRecord {
        file_name: file_name.to_string(),
        kind: ItemKind::Photo,
        metadata,
        objects,
        keywords,
    };
    let id = store.insert(record.clone())?;
    tracing::info!(
        "Cataloged {} as #{} with {} keywords",
        record.file_name,
        id,
        record.keywords.len()
    );

    Ok(StoredRecord { id, record })
}

/// In-process [`ArchiveStore`] with case-insensitive substring search
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<Vec<StoredRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Vec<StoredRecord>>, PrepError> {
        self.records
            .lock()
            .map_err(|_| PrepError::Internal("archive store lock poisoned".to_string()))
    }
}

fn matches_query(record: &PhotoRecord, needle: &str) -> bool {
    let meta = &record.metadata;
    std::iter::once(record.file_name.as_str())
        .chain(meta.taken_date.as_deref())
        .chain(meta.camera_make.as_deref())
        .chain(meta.camera_model.as_deref())
        .chain(record.keywords.iter().map(String::as_str))
        .chain(record.objects.iter().map(String::as_str))
        .any(|value| value.to_lowercase().contains(needle))
}

impl ArchiveStore for MemoryStore {
    fn insert(&self, record: PhotoRecord) -> Result<u64, PrepError> {
        let mut records = self.lock()?;
        let id = records.last().map_or(1, |r| r.id + 1);
        records.push(StoredRecord { id, record });
        Ok(id)
    }

    fn search(&self, query: &str) -> Result<Vec<StoredRecord>, PrepError> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return Ok(Vec::new());
        }
        let records = self.lock()?;
        Ok(records
            .iter()
            .rev()
            .filter(|r| matches_query(&r.record, &needle))
            .cloned()
            .collect())
    }

    fn list_with_location(&self) -> Result<Vec<StoredRecord>, PrepError> {
        let records = self.lock()?;
        Ok(records
            .iter()
            .rev()
            .filter(|r| r.record.kind == ItemKind::Photo && r.record.metadata.location().is_some())
            .cloned()
            .collect())
    }
}
