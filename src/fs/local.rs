// src/fs/local.rs

//! Local file system access for resolved references
//!
//! Relative paths from the deployment document always use forward slashes
//! and are localized before use: traversal segments are rejected so that
//! a reference can never escape the directory it is rooted in.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::model::{DirRef, FileRef};
use crate::platform::Platform;

/// Converts a relative document path into a local path.
///
/// Rejects empty and absolute paths and any `.` or `..` segments.
pub fn localize(path: &str) -> Result<PathBuf> {
    if path.is_empty() {
        return Err(Error::Resolution("a relative path is empty".to_string()));
    }
    if path.starts_with('/') || path.starts_with('\\') {
        return Err(Error::Resolution(format!(
            "the path \"{path}\" is not a relative path"
        )));
    }

    let mut localized = PathBuf::new();
    for segment in path.split(['/', '\\']) {
        match segment {
            "" => {
                return Err(Error::Resolution(format!(
                    "the path \"{path}\" contains an empty segment"
                )))
            }
            "." | ".." => {
                return Err(Error::Resolution(format!(
                    "the path \"{path}\" must not contain \"{segment}\" segments"
                )))
            }
            segment => localized.push(segment),
        }
    }
    Ok(localized)
}

/// Returns the local path of a resolved directory reference.
pub fn dir_path(platform: &dyn Platform, dir: &DirRef) -> Result<PathBuf> {
    let mut path = platform.known_folder_path(dir.root)?;
    for next in &dir.lineage {
        path.push(localize(&next.path)?);
    }
    Ok(path)
}

/// Returns the local path of a resolved file reference.
pub fn file_path(platform: &dyn Platform, file: &FileRef) -> Result<PathBuf> {
    let mut path = dir_path(platform, &file.dir())?;
    path.push(localize(&file.file_path)?);
    Ok(path)
}

/// An open directory on the local file system.
#[derive(Debug)]
pub struct LocalDir {
    path: PathBuf,
}

/// Opens the directory identified by the given reference.
///
/// Returns `None` when the directory (or any of its ancestors) does not
/// exist; other failures are errors.
pub fn open_dir(platform: &dyn Platform, dir: &DirRef) -> Result<Option<LocalDir>> {
    let path = dir_path(platform, dir)?;
    match fs::metadata(&path) {
        Ok(metadata) if metadata.is_dir() => Ok(Some(LocalDir { path })),
        Ok(_) => Err(Error::Resolution(format!(
            "the path \"{}\" exists but is not a directory",
            path.display()
        ))),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err.into()),
    }
}

impl LocalDir {
    /// The local path of the directory.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stats a relative path beneath the directory. Returns `None` when
    /// nothing exists there.
    pub fn stat(&self, relative: &str) -> Result<Option<fs::Metadata>> {
        let target = self.path.join(localize(relative)?);
        match fs::metadata(&target) {
            Ok(metadata) => Ok(Some(metadata)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// Returns the local path of a relative path beneath the directory.
    pub fn join(&self, relative: &str) -> Result<PathBuf> {
        Ok(self.path.join(localize(relative)?))
    }

    /// Opens a file beneath the directory for reading.
    pub fn open_file(&self, relative: &str) -> Result<fs::File> {
        Ok(fs::File::open(self.join(relative)?)?)
    }

    /// Creates (or truncates) a file beneath the directory for writing.
    pub fn create_file(&self, relative: &str) -> Result<fs::File> {
        Ok(fs::File::create(self.join(relative)?)?)
    }

    /// Removes a file beneath the directory.
    pub fn remove_file(&self, relative: &str) -> Result<()> {
        Ok(fs::remove_file(self.join(relative)?)?)
    }
}
