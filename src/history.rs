//! Listing of saved transcripts.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use time::PrimitiveDateTime;

use crate::transcript::EXTENSION;
use crate::utils::time::{display_stamp, parse_file_stamp};
use crate::{Error, Result};

const STAMP_LEN: usize = "YYYYmmdd_HHMMSS".len();
const UNKNOWN_DATE: &str = "Unknown date";

/// One transcript file in the history directory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TranscriptEntry {
    pub path: PathBuf,
    pub modified: SystemTime,
    /// The title part of the file name.
    pub title: String,
    /// The save time encoded in the file name, if it follows the naming pattern.
    pub saved_at: Option<PrimitiveDateTime>,
}

impl TranscriptEntry {
    fn new(path: PathBuf, modified: SystemTime) -> Self {
        let stem = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();
        let (title, saved_at) = split_stem(&stem);
        Self {
            path,
            modified,
            title,
            saved_at,
        }
    }

    /// `YYYY-MM-DD HH:MM:SS`, or `Unknown date` for files named some other way.
    pub fn display_date(&self) -> String {
        match self.saved_at {
            Some(saved_at) => display_stamp(saved_at),
            None => UNKNOWN_DATE.to_string(),
        }
    }
}

fn split_stem(stem: &str) -> (String, Option<PrimitiveDateTime>) {
    let parsed = stem
        .get(..STAMP_LEN)
        .and_then(parse_file_stamp)
        .zip(stem.get(STAMP_LEN..).and_then(|rest| rest.strip_prefix('_')));
    match parsed {
        Some((saved_at, title)) => (title.to_string(), Some(saved_at)),
        None => (stem.to_string(), None),
    }
}

/// List the transcripts in `dir`, most recently modified first.
///
/// A missing directory holds no transcripts.  Files with equal modification times are ordered by
/// name, descending, which keeps same-second saves in save order.
pub fn list_transcripts(dir: &Path) -> Result<Vec<TranscriptEntry>> {
    let read_dir = match fs::read_dir(dir) {
        Ok(read_dir) => read_dir,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => {
            return Err(Error::io(
                format!("Failed to read history directory {}", dir.display()),
                e,
            ));
        }
    };
    let mut entries = Vec::new();
    for dirent in read_dir {
        let dirent = dirent.map_err(|e| {
            Error::io(format!("Failed to read history directory {}", dir.display()), e)
        })?;
        let path = dirent.path();
        if path.extension().and_then(|ext| ext.to_str()) != Some(EXTENSION) {
            continue;
        }
        let metadata = dirent
            .metadata()
            .map_err(|e| Error::io(format!("Failed to stat {}", path.display()), e))?;
        if !metadata.is_file() {
            continue;
        }
        let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
        entries.push(TranscriptEntry::new(path, modified));
    }
    entries.sort_by(|a, b| {
        b.modified
            .cmp(&a.modified)
            .then_with(|| b.path.cmp(&a.path))
    });
    Ok(entries)
}
