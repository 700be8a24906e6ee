// Pipeline progress tracing
// Append-only JSONL trace of the stages each page passes through

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use uuid::Uuid;

/// Errors that can occur during trace operations
#[derive(Debug, Error)]
pub enum TraceError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

/// Stages a page passes through, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageStage {
    Tiling,
    Detection,
    Merge,
    Staff,
    Resolve,
    Timeline,
}

impl PageStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            PageStage::Tiling => "tiling",
            PageStage::Detection => "detection",
            PageStage::Merge => "merge",
            PageStage::Staff => "staff",
            PageStage::Resolve => "resolve",
            PageStage::Timeline => "timeline",
        }
    }
}

/// A single trace line
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceEntry {
    /// RFC 3339 timestamp of when this entry was created
    pub timestamp: String,

    pub page_id: Uuid,

    pub stage: PageStage,

    /// Progress within the stage [0.0, 1.0]
    pub progress: f32,

    pub message: String,

    /// Optional structured data (counts, thresholds)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl TraceEntry {
    pub fn new(page_id: Uuid, stage: PageStage, progress: f32, message: String) -> Self {
        TraceEntry {
            timestamp: Utc::now().to_rfc3339(),
            page_id,
            stage,
            progress: progress.clamp(0.0, 1.0),
            message,
            data: None,
        }
    }

    /// Serialize to JSON line (with newline)
    pub fn to_json_line(&self) -> Result<String, serde_json::Error> {
        let json = serde_json::to_string(self)?;
        Ok(format!("{}\n", json))
    }
}

/// Append-only JSONL trace file
pub struct TraceWriter {
    file_path: PathBuf,
}

impl TraceWriter {
    pub fn new(file_path: PathBuf) -> Self {
        TraceWriter { file_path }
    }

    /// Append a trace entry, creating the file if needed
    pub fn write(&self, entry: &TraceEntry) -> Result<(), TraceError> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.file_path)?;

        let json_line = entry.to_json_line()?;
        file.write_all(json_line.as_bytes())?;
        file.flush()?;

        Ok(())
    }

    /// Write an entry, logging instead of failing
    ///
    /// A broken trace file never fails the page.
    pub fn record(&self, entry: TraceEntry) {
        if let Err(e) = self.write(&entry) {
            log::warn!(
                "Failed to write {} trace to {}: {}",
                entry.stage.as_str(),
                self.file_path.display(),
                e
            );
        }
    }

    pub fn path(&self) -> &Path {
        &self.file_path
    }
}

/// Helper builder for creating trace entries
pub struct TraceBuilder {
    page_id: Uuid,
    stage: PageStage,
}

impl TraceBuilder {
    pub fn stage(page_id: Uuid, stage: PageStage) -> Self {
        TraceBuilder { page_id, stage }
    }

    /// Create a start entry (progress = 0.0)
    pub fn start(self, message: impl Into<String>) -> TraceEntry {
        TraceEntry::new(self.page_id, self.stage, 0.0, message.into())
    }

    /// Create a complete entry (progress = 1.0)
    pub fn complete(self, message: impl Into<String>) -> TraceEntry {
        TraceEntry::new(self.page_id, self.stage, 1.0, message.into())
    }

    /// Create a complete entry carrying stage data
    pub fn complete_with(self, message: impl Into<String>, data: serde_json::Value) -> TraceEntry {
        let mut entry = self.complete(message);
        entry.data = Some(data);
        entry
    }
}

/// Read trace entries from a JSONL file
pub fn read_trace_file(path: &Path) -> Result<Vec<TraceEntry>, TraceError> {
    let contents = std::fs::read_to_string(path)?;
    let mut entries = Vec::new();

    for line in contents.lines() {
        if line.trim().is_empty() {
            continue;
        }

        let entry: TraceEntry = serde_json::from_str(line)?;
        entries.push(entry);
    }

    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_progress_clamping() {
        let id = Uuid::new_v4();
        assert_eq!(TraceEntry::new(id, PageStage::Merge, -0.5, String::new()).progress, 0.0);
        assert_eq!(TraceEntry::new(id, PageStage::Merge, 1.5, String::new()).progress, 1.0);
    }

    #[test]
    fn test_trace_builder() {
        let id = Uuid::new_v4();
        let start = TraceBuilder::stage(id, PageStage::Staff).start("Locating staves");
        assert_eq!(start.progress, 0.0);
        assert_eq!(start.page_id, id);

        let done = TraceBuilder::stage(id, PageStage::Staff)
            .complete_with("Found 2 staves", serde_json::json!({ "blocks": 2 }));
        assert_eq!(done.progress, 1.0);
        assert_eq!(done.data.unwrap()["blocks"], 2);
    }

    #[test]
    fn test_trace_writer_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let trace_path = temp_dir.path().join("trace.jsonl");
        let writer = TraceWriter::new(trace_path.clone());
        let id = Uuid::new_v4();

        writer.write(&TraceBuilder::stage(id, PageStage::Tiling).start("Start")).unwrap();
        writer.record(TraceBuilder::stage(id, PageStage::Timeline).complete("Done"));

        let entries = read_trace_file(&trace_path).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].stage, PageStage::Tiling);
        assert_eq!(entries[1].stage, PageStage::Timeline);
        assert_eq!(entries[1].page_id, id);
    }

    #[test]
    fn test_json_line_format() {
        let entry = TraceEntry::new(Uuid::new_v4(), PageStage::Detection, 0.5, "x".to_string());
        let json_line = entry.to_json_line().unwrap();

        assert!(json_line.ends_with('\n'));
        assert!(json_line.contains("\"stage\":\"detection\""));
        assert!(!json_line.contains("\"data\""));
    }

    #[test]
    fn test_record_swallows_errors() {
        let temp_dir = TempDir::new().unwrap();
        // A directory cannot be opened for appending
        let writer = TraceWriter::new(temp_dir.path().to_path_buf());
        writer.record(TraceBuilder::stage(Uuid::new_v4(), PageStage::Merge).start("x"));
        assert!(writer.write(&TraceBuilder::stage(Uuid::new_v4(), PageStage::Merge).start("x")).is_err());
    }
}
