// src/engine/batch.rs
//
// Batch orchestrator. Files run strictly sequentially in submission
// order; a failing file is recorded and never aborts the rest. Every
// status transition publishes an incremental snapshot to the caller.

use crate::engine::archive::{pack_archive, ArchiveEntry};
use crate::engine::pipeline::{run_pipeline, PipelineOutput};
use crate::error::PipelineError;
use crate::request::TransformRequest;
use log::{debug, warn};
use std::sync::Arc;

/// Per-file status machine: pending -> processing -> done | error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileStatus {
    Pending,
    Processing,
    Done,
    Error,
}

/// One uploaded file. Bytes are shared so a preview run never copies the
/// upload; dropping the last handle releases the buffer.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub name: String,
    pub mime: String,
    pub bytes: Arc<Vec<u8>>,
}

#[derive(Debug)]
struct FileSlot {
    id: u64,
    source: SourceFile,
    status: FileStatus,
    result: Option<PipelineOutput>,
    error: Option<PipelineError>,
}

/// One row of a status snapshot.
#[derive(Debug, Clone)]
pub struct FileStatusRow {
    pub id: u64,
    pub name: String,
    pub status: FileStatus,
    pub output_size: Option<usize>,
    pub error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct BatchSnapshot {
    pub rows: Vec<FileStatusRow>,
}

impl BatchSnapshot {
    pub fn settled(&self) -> usize {
        self.rows
            .iter()
            .filter(|r| matches!(r.status, FileStatus::Done | FileStatus::Error))
            .count()
    }
}

/// What the caller hands to the user when the batch finishes.
#[derive(Debug)]
pub enum BatchDeliverable {
    /// Single-file batch: the result itself.
    Single(PipelineOutput),
    /// Multi-file batch: zip of every successful result.
    Archive(Vec<u8>),
    /// Nothing deliverable (all files failed, or archiving failed).
    None,
}

#[derive(Debug)]
pub struct BatchOutcome {
    pub deliverable: BatchDeliverable,
    /// Set when packaging failed; per-file results stay intact.
    pub archive_error: Option<PipelineError>,
}

#[derive(Debug, Default)]
pub struct Batch {
    files: Vec<FileSlot>,
    next_id: u64,
}

impl Batch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a file; returns its id. New files start pending.
    pub fn add(&mut self, source: SourceFile) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.files.push(FileSlot {
            id,
            source,
            status: FileStatus::Pending,
            result: None,
            error: None,
        });
        id
    }

    /// Remove a file. Dropping the slot releases its buffers.
    pub fn remove(&mut self, id: u64) -> bool {
        let before = self.files.len();
        self.files.retain(|f| f.id != id);
        self.files.len() != before
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn result(&self, id: u64) -> Option<&PipelineOutput> {
        self.files.iter().find(|f| f.id == id)?.result.as_ref()
    }

    pub fn error(&self, id: u64) -> Option<&PipelineError> {
        self.files.iter().find(|f| f.id == id)?.error.as_ref()
    }

    /// Mark every file pending again. Stored results stay in place until
    /// the next run settles each file.
    pub fn reset(&mut self) {
        for file in &mut self.files {
            file.status = FileStatus::Pending;
        }
    }

    pub fn snapshot(&self) -> BatchSnapshot {
        BatchSnapshot {
            rows: self
                .files
                .iter()
                .map(|f| FileStatusRow {
                    id: f.id,
                    name: f.source.name.clone(),
                    status: f.status,
                    output_size: f.result.as_ref().map(|r| r.size),
                    error: f.error.as_ref().map(|e| e.to_string()),
                })
                .collect(),
        }
    }

    /// Run the pipeline over every file in submission order, publishing a
    /// snapshot after every status transition: once when a file starts
    /// processing and once when it settles.
    pub fn process(
        &mut self,
        request: &TransformRequest,
        mut on_progress: impl FnMut(&BatchSnapshot),
    ) -> BatchOutcome {
        for index in 0..self.files.len() {
            self.files[index].status = FileStatus::Processing;
            on_progress(&self.snapshot());
            let source = self.files[index].source.clone();
            debug!("processing {} ({} bytes)", source.name, source.bytes.len());

            match run_pipeline(&source.bytes, &source.mime, request) {
                Ok(output) => {
                    let slot = &mut self.files[index];
                    slot.status = FileStatus::Done;
                    slot.result = Some(output);
                    slot.error = None;
                }
                Err(err) => {
                    warn!("{} failed: {err}", source.name);
                    let slot = &mut self.files[index];
                    slot.status = FileStatus::Error;
                    slot.result = None;
                    slot.error = Some(err);
                }
            }
            on_progress(&self.snapshot());
        }

        self.deliverable()
    }

    fn deliverable(&self) -> BatchOutcome {
        if self.files.is_empty() {
            return BatchOutcome {
                deliverable: BatchDeliverable::None,
                archive_error: None,
            };
        }
        if self.files.len() == 1 {
            let slot = &self.files[0];
            return BatchOutcome {
                deliverable: match &slot.result {
                    Some(output) => BatchDeliverable::Single(output.clone()),
                    None => BatchDeliverable::None,
                },
                archive_error: None,
            };
        }

        let entries: Vec<ArchiveEntry<'_>> = self
            .files
            .iter()
            .filter_map(|f| {
                f.result.as_ref().map(|r| ArchiveEntry {
                    original_name: &f.source.name,
                    mime: r.mime,
                    data: &r.data,
                })
            })
            .collect();

        match pack_archive(&entries) {
            Ok(bytes) => BatchOutcome {
                deliverable: BatchDeliverable::Archive(bytes),
                archive_error: None,
            },
            Err(err) => BatchOutcome {
                deliverable: BatchDeliverable::None,
                archive_error: Some(err),
            },
        }
    }
}
