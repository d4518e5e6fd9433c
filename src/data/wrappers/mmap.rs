//! Memory-mapped mesh files.
//!
//! The file is mapped once when opened; [`MeshSource::bytes`] hands out a
//! borrowed view of the mapping.

use std::borrow::Cow;
use std::fs::File;
use std::path::{Path, PathBuf};

use memmap2::{Mmap, MmapOptions};
use tracing::debug;

use crate::data::MeshSource;
use crate::error::ErrorKind;

/// A mesh file mapped into memory.
#[derive(Debug)]
pub struct MmapFile {
    path: PathBuf,
    // Zero-length files cannot be mapped on every platform.
    mmap: Option<Mmap>,
}

impl MmapFile {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, ErrorKind> {
        let path = path.as_ref().to_owned();
        let file = File::open(&path)?;
        let len = file.metadata()?.len();

        let mmap = if len == 0 {
            None
        } else {
            // Safety: the mapping is read-only and lives as long as `self`.
            Some(unsafe { MmapOptions::new().map(&file)? })
        };
        debug!("mapped {} ({len} bytes)", path.display());

        Ok(Self { path, mmap })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn as_slice(&self) -> &[u8] {
        self.mmap.as_deref().unwrap_or_default()
    }
}

impl MeshSource for MmapFile {
    fn bytes(&self) -> Result<Cow<'_, [u8]>, ErrorKind> {
        Ok(Cow::Borrowed(self.as_slice()))
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_file(name: &str, contents: &[u8]) -> PathBuf {
        let path = std::env::temp_dir().join(format!("c2gview-{}-{name}", std::process::id()));
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn maps_file_contents() {
        let path = scratch_file("mapped.c2g", &[1, 2, 3, 4]);
        let source = MmapFile::open(&path).unwrap();
        assert_eq!(source.bytes().unwrap().as_ref(), &[1, 2, 3, 4]);
        assert_eq!(source.describe(), path.display().to_string());
        drop(source);
        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn empty_file() {
        let path = scratch_file("empty.c2g", &[]);
        let source = MmapFile::open(&path).unwrap();
        assert!(source.as_slice().is_empty());
        drop(source);
        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn missing_file() {
        let err = MmapFile::open("/nonexistent/c2gview/mesh.c2g").unwrap_err();
        assert!(matches!(err, ErrorKind::IoError(_)));
    }
}
