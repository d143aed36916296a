// src/fs/temp.rs

//! Temporary extraction directories
//!
//! Archive packages extract into a temporary directory named after the
//! package content, with a `leafbridge-` prefix. Directories opened with
//! delete-on-close remove themselves and their contents when dropped.

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use filetime::FileTime;

use super::local::localize;
use crate::error::Result;
use crate::model::PackageContent;

/// Options for extraction directories.
#[derive(Debug, Clone, Copy, Default)]
pub struct Options {
    /// Delete the directory and its contents when it is closed.
    pub delete_on_close: bool,
}

/// A temporary directory receiving extracted package files.
#[derive(Debug)]
pub struct ExtractionDir {
    // Present only when the directory deletes itself on close.
    temp: Option<tempfile::TempDir>,
    path: PathBuf,
}

/// Opens a temporary directory to receive extracted files from a package.
pub fn open_extraction_dir(content: &PackageContent, options: Options) -> Result<ExtractionDir> {
    let temp = tempfile::Builder::new()
        .prefix(&format!("leafbridge-{}", content.dir_name()))
        .tempdir()?;

    if options.delete_on_close {
        let path = temp.path().to_path_buf();
        Ok(ExtractionDir {
            temp: Some(temp),
            path,
        })
    } else {
        let path = temp.into_path();
        Ok(ExtractionDir { temp: None, path })
    }
}

impl ExtractionDir {
    /// The path of the extraction directory.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Ensures that the given relative directory path and all of its
    /// parents exist within the extraction directory.
    pub fn mkdir_all(&self, path: &str) -> Result<()> {
        // Zip directory entries carry a trailing separator.
        let path = path.trim_end_matches('/');
        if path.is_empty() {
            return Ok(());
        }
        let target = self.path.join(localize(path)?);
        fs::create_dir_all(target)?;
        Ok(())
    }

    /// Returns the absolute path for a relative file path within the
    /// extraction directory.
    pub fn file_path(&self, path: &str) -> Result<PathBuf> {
        Ok(self.path.join(localize(path)?))
    }

    /// Stats a relative path within the extraction directory. Returns
    /// `None` when nothing exists there.
    pub fn stat(&self, path: &str) -> Result<Option<fs::Metadata>> {
        match fs::metadata(self.file_path(path)?) {
            Ok(metadata) => Ok(Some(metadata)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// Writes a file at the given relative path from the reader,
    /// preserving the provided modification time when one is available.
    ///
    /// Returns the number of bytes written.
    pub fn write_file(
        &self,
        path: &str,
        reader: &mut dyn Read,
        modified: Option<SystemTime>,
    ) -> Result<u64> {
        let target = self.file_path(path)?;
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut file = fs::File::create(&target)?;
        let written = std::io::copy(reader, &mut file)?;
        drop(file);

        if let Some(modified) = modified {
            filetime::set_file_mtime(&target, FileTime::from_system_time(modified))?;
        }

        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PackageId;

    fn content() -> PackageContent {
        PackageContent {
            id: PackageId::from("agent"),
            primary_hash: Default::default(),
        }
    }

    #[test]
    fn test_directory_name_carries_prefix() {
        let dir = open_extraction_dir(
            &content(),
            Options {
                delete_on_close: true,
            },
        )
        .unwrap();
        let name = dir.path().file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("leafbridge-pkg-agent"));
    }

    #[test]
    fn test_delete_on_close() {
        let dir = open_extraction_dir(
            &content(),
            Options {
                delete_on_close: true,
            },
        )
        .unwrap();
        let path = dir.path().to_path_buf();
        dir.write_file("bin/agent.exe", &mut &b"exe"[..], None)
            .unwrap();
        assert!(path.join("bin").join("agent.exe").is_file());

        drop(dir);
        assert!(!path.exists());
    }

    #[test]
    fn test_keep_on_close() {
        let dir = open_extraction_dir(&content(), Options::default()).unwrap();
        let path = dir.path().to_path_buf();
        drop(dir);
        assert!(path.exists());
        fs::remove_dir_all(path).unwrap();
    }

    #[test]
    fn test_write_file_preserves_mtime() {
        let dir = open_extraction_dir(
            &content(),
            Options {
                delete_on_close: true,
            },
        )
        .unwrap();
        let modified = SystemTime::UNIX_EPOCH + std::time::Duration::from_secs(1_600_000_000);
        dir.write_file("docs/readme.txt", &mut &b"hello"[..], Some(modified))
            .unwrap();

        let metadata = dir.stat("docs/readme.txt").unwrap().unwrap();
        assert_eq!(metadata.len(), 5);
        assert_eq!(metadata.modified().unwrap(), modified);
    }

    #[test]
    fn test_mkdir_all_trims_zip_separators() {
        let dir = open_extraction_dir(
            &content(),
            Options {
                delete_on_close: true,
            },
        )
        .unwrap();
        dir.mkdir_all("a/b/c/").unwrap();
        assert!(dir.stat("a/b/c").unwrap().unwrap().is_dir());
    }
}
