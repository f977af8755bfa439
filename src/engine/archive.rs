// src/engine/archive.rs
//
// Archive packager: zips successful batch results. Entry naming is
// deterministic; collisions get the entry index appended so two uploads
// named photo.png never silently overwrite each other.

use crate::engine::encoder::OutputData;
use crate::error::{PipelineError, Result};
use log::debug;
use std::collections::HashSet;
use std::io::{Cursor, Write};
use zip::{write::SimpleFileOptions, CompressionMethod, ZipWriter};

/// One successful result ready for packaging.
#[derive(Debug)]
pub struct ArchiveEntry<'a> {
    pub original_name: &'a str,
    pub mime: &'a str,
    pub data: &'a OutputData,
}

fn basename(name: &str) -> &str {
    match name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => name,
    }
}

fn extension_for_mime(mime: &str) -> &'static str {
    match mime {
        "image/jpeg" => "jpg",
        "image/png" => "png",
        "image/webp" => "webp",
        "image/gif" => "gif",
        "image/bmp" => "bmp",
        "image/svg+xml" => "svg",
        "text/plain" => "txt",
        _ => "bin",
    }
}

/// Download name for a processed file: `<basename>-processed.<ext>`.
pub fn suggested_filename(original_name: &str, mime: &str) -> String {
    format!(
        "{}-processed.{}",
        basename(original_name),
        extension_for_mime(mime)
    )
}

/// Pack results into a zip archive. Naming is deterministic: the first
/// occupant of a name keeps it, later collisions append their entry index
/// before the extension.
pub fn pack_archive(entries: &[ArchiveEntry<'_>]) -> Result<Vec<u8>> {
    if entries.is_empty() {
        return Err(PipelineError::EmptyArchive);
    }

    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut seen: HashSet<String> = HashSet::new();

    for (index, entry) in entries.iter().enumerate() {
        let mut name = suggested_filename(entry.original_name, entry.mime);
        if !seen.insert(name.clone()) {
            name = format!(
                "{}-processed-{}.{}",
                basename(entry.original_name),
                index,
                extension_for_mime(entry.mime)
            );
            seen.insert(name.clone());
        }

        writer
            .start_file(&name, options)
            .map_err(|e| PipelineError::archive_failed(format!("start entry {name}: {e}")))?;
        let payload: &[u8] = match entry.data {
            OutputData::Binary(bytes) => bytes,
            OutputData::Text(text) => text.as_bytes(),
        };
        writer
            .write_all(payload)
            .map_err(|e| PipelineError::archive_failed(format!("write entry {name}: {e}")))?;
    }

    let cursor = writer
        .finish()
        .map_err(|e| PipelineError::archive_failed(format!("finalize: {e}")))?;
    let bytes = cursor.into_inner();
    debug!("packed {} entries into {} bytes", entries.len(), bytes.len());
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    fn entry_names(bytes: &[u8]) -> Vec<String> {
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        (0..archive.len())
            .map(|i| archive.by_index(i).unwrap().name().to_owned())
            .collect()
    }

    #[test]
    fn names_follow_processed_convention() {
        assert_eq!(
            suggested_filename("holiday.png", "image/jpeg"),
            "holiday-processed.jpg"
        );
        assert_eq!(
            suggested_filename("logo.svg", "image/svg+xml"),
            "logo-processed.svg"
        );
        assert_eq!(
            suggested_filename("photo.jpg", "text/plain"),
            "photo-processed.txt"
        );
        // No extension: whole name is the stem.
        assert_eq!(
            suggested_filename("scan", "image/png"),
            "scan-processed.png"
        );
    }

    #[test]
    fn archive_contains_all_entries() {
        let a = OutputData::Binary(vec![1, 2, 3]);
        let b = OutputData::Text("data:image/png;base64,AAAA".to_owned());
        let bytes = pack_archive(&[
            ArchiveEntry {
                original_name: "one.png",
                mime: "image/jpeg",
                data: &a,
            },
            ArchiveEntry {
                original_name: "two.jpg",
                mime: "text/plain",
                data: &b,
            },
        ])
        .unwrap();
        assert_eq!(
            entry_names(&bytes),
            vec!["one-processed.jpg", "two-processed.txt"]
        );
    }

    #[test]
    fn entry_payload_round_trips() {
        let data = OutputData::Binary(vec![9u8; 100]);
        let bytes = pack_archive(&[ArchiveEntry {
            original_name: "x.png",
            mime: "image/png",
            data: &data,
        }])
        .unwrap();
        let mut archive = zip::ZipArchive::new(Cursor::new(&bytes[..])).unwrap();
        let mut file = archive.by_index(0).unwrap();
        let mut out = Vec::new();
        file.read_to_end(&mut out).unwrap();
        assert_eq!(out, vec![9u8; 100]);
    }

    #[test]
    fn collisions_get_index_suffix() {
        let data = OutputData::Binary(vec![0]);
        let entries: Vec<ArchiveEntry> = (0..3)
            .map(|_| ArchiveEntry {
                original_name: "photo.png",
                mime: "image/jpeg",
                data: &data,
            })
            .collect();
        let bytes = pack_archive(&entries).unwrap();
        assert_eq!(
            entry_names(&bytes),
            vec![
                "photo-processed.jpg",
                "photo-processed-1.jpg",
                "photo-processed-2.jpg"
            ]
        );
    }

    #[test]
    fn empty_input_is_an_error() {
        assert!(matches!(
            pack_archive(&[]),
            Err(PipelineError::EmptyArchive)
        ));
    }
}
