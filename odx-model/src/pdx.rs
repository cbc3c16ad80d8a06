//! PDX container reading.
//!
//! A `.pdx` bundle is a ZIP archive whose entries of interest are ODX
//! documents. This module only turns the archive into a list of named XML
//! texts; parsing is a separate step so callers can decide how to handle
//! individual documents.

use std::io::{Read, Seek};
use std::path::Path;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PdxError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("no ODX documents found in PDX archive")]
    NoOdxDocuments,
}

/// One ODX document extracted from a PDX archive.
#[derive(Debug)]
pub struct PdxEntry {
    /// Entry name inside the archive.
    pub name: String,
    /// The document text.
    pub xml: String,
}

/// Read all ODX documents from a PDX file on disk.
pub fn read_pdx_file(path: &Path) -> Result<Vec<PdxEntry>, PdxError> {
    let file = std::fs::File::open(path)?;
    read_pdx(file)
}

/// Read all ODX documents from any seekable reader (for testing with
/// in-memory archives).
pub fn read_pdx<R: Read + Seek>(reader: R) -> Result<Vec<PdxEntry>, PdxError> {
    let mut archive = zip::ZipArchive::new(reader)?;
    let mut entries = Vec::new();

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        let name = entry.name().to_string();

        let lower = name.to_lowercase();
        #[allow(clippy::case_sensitive_file_extension_comparisons)]
        if !lower.ends_with(".odx") && !lower.contains(".odx-") {
            continue;
        }

        let mut xml = String::new();
        entry.read_to_string(&mut xml)?;

        log::debug!("Extracted ODX entry from PDX archive: {}", name);
        entries.push(PdxEntry { name, xml });
    }

    if entries.is_empty() {
        return Err(PdxError::NoOdxDocuments);
    }

    Ok(entries)
}
