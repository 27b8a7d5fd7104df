//! Input sources: uploaded byte blobs or filesystem paths, plus folder listing.

use std::fs;
use std::path::{Path, PathBuf};

use tabfuse_cli::SourceFormat;

use crate::error::{EngineError, Result};

#[derive(Clone, Debug, Eq, PartialEq)]
enum SourceData {
    Bytes(Vec<u8>),
    Path(PathBuf),
}

/// One input to ingest. Read-only once built.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SourceDescriptor {
    name: String,
    data: SourceData,
    format: Option<SourceFormat>,
}

impl SourceDescriptor {
    /// Uploaded content; the format is detected from the file name's extension.
    pub fn from_bytes(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let name = name.into();
        let format = SourceFormat::from_path(Path::new(&name));
        Self {
            name,
            data: SourceData::Bytes(bytes),
            format,
        }
    }

    /// A file on disk; the format is detected from the extension.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let format = SourceFormat::from_path(&path);
        Self {
            name,
            data: SourceData::Path(path),
            format,
        }
    }

    /// Declare the format explicitly instead of trusting the extension.
    pub fn with_format(mut self, format: SourceFormat) -> Self {
        self.format = Some(format);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn format(&self) -> Option<SourceFormat> {
        self.format
    }

    /// Whole content of the source. Files are opened and closed within this call.
    pub(crate) fn read_bytes(&self) -> std::io::Result<std::borrow::Cow<'_, [u8]>> {
        match &self.data {
            SourceData::Bytes(b) => Ok(std::borrow::Cow::Borrowed(b.as_slice())),
            SourceData::Path(p) => fs::read(p).map(std::borrow::Cow::Owned),
        }
    }
}

/// Sources for every regular file in `dir` whose extension is in `extensions`
/// (case-insensitive), sorted by file name.
pub fn list_folder(dir: &Path, extensions: &[String]) -> Result<Vec<SourceDescriptor>> {
    if !dir.is_dir() {
        return Err(EngineError::PathNotFound(dir.to_path_buf()));
    }
    let mut paths: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file())
        .filter(|p| {
            p.extension()
                .and_then(|e| e.to_str())
                .is_some_and(|ext| extensions.iter().any(|want| want.eq_ignore_ascii_case(ext)))
        })
        .collect();
    paths.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(paths.into_iter().map(SourceDescriptor::from_path).collect())
}
