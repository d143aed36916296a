// src/fs/staging.rs

//! The content-addressed staging area
//!
//! Downloaded packages live beneath the program-data known folder in the
//! shape `LeafBridge/Deploy/{deployment-id}/pkg-{package-id}-{hash}/`.
//! Keying directories by the primary hash means a changed package
//! definition stages into a fresh directory instead of corrupting the
//! previous one.

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use super::local::localize;
use crate::error::{Error, Result};
use crate::model::{DeploymentId, KnownFolder, Package, PackageContent};
use crate::platform::Platform;

/// The directory beneath program-data that holds all deployment state.
pub const ROOT_DIR: &str = "LeafBridge";

/// The directory beneath [`ROOT_DIR`] that holds staged packages.
pub const STAGING_DIR: &str = "Deploy";

/// The staging directory for one deployment.
#[derive(Debug)]
pub struct DeploymentDir {
    deployment: DeploymentId,
    path: PathBuf,
}

/// Opens the staging directory for a deployment, creating it if missing.
pub fn open_deployment(platform: &dyn Platform, id: &DeploymentId) -> Result<DeploymentDir> {
    let program_data = platform.known_folder_path(KnownFolder::ProgramData)?;
    if !program_data.is_dir() {
        return Err(Error::Resolution(format!(
            "the program-data folder \"{}\" does not exist",
            program_data.display()
        )));
    }

    let path = program_data
        .join(ROOT_DIR)
        .join(STAGING_DIR)
        .join(localize(id.as_str())?);
    create_dir_chain(&program_data, &path)?;

    Ok(DeploymentDir {
        deployment: id.clone(),
        path,
    })
}

impl DeploymentDir {
    pub fn deployment(&self) -> &DeploymentId {
        &self.deployment
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Opens the staging directory for the given package content,
    /// creating it if missing.
    pub fn open_package(&self, content: &PackageContent) -> Result<PackageDir> {
        let path = self.path.join(localize(&content.dir_name())?);
        create_dir_if_missing(&path)?;
        Ok(PackageDir {
            content: content.clone(),
            path,
        })
    }
}

/// The staging directory for one package's content.
#[derive(Debug)]
pub struct PackageDir {
    content: PackageContent,
    path: PathBuf,
}

impl PackageDir {
    pub fn content(&self) -> &PackageContent {
        &self.content
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the absolute path of the package file.
    pub fn file_path(&self, package: &Package) -> Result<PathBuf> {
        Ok(self.path.join(localize(&package.file_name())?))
    }

    /// Stats the package file. Returns `None` when it does not exist.
    pub fn stat(&self, package: &Package) -> Result<Option<fs::Metadata>> {
        match fs::metadata(self.file_path(package)?) {
            Ok(metadata) => Ok(Some(metadata)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// Opens the staging file for the package read-write, creating it if
    /// it does not exist.
    pub fn open_file(&self, package: &Package) -> Result<PackageFile> {
        let name = package.file_name();
        let path = self.file_path(package)?;
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&path)?;
        Ok(PackageFile { name, path, file })
    }
}

/// An open staging file for a package.
#[derive(Debug)]
pub struct PackageFile {
    pub name: String,
    pub path: PathBuf,
    pub file: File,
}

impl Read for PackageFile {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.file.read(buf)
    }
}

impl Write for PackageFile {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.file.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.file.flush()
    }
}

impl Seek for PackageFile {
    fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
        self.file.seek(pos)
    }
}

/// Creates every directory between `root` (which must exist) and `path`.
fn create_dir_chain(root: &Path, path: &Path) -> Result<()> {
    let mut current = root.to_path_buf();
    let relative = path
        .strip_prefix(root)
        .map_err(|_| Error::Resolution("staging path escaped its root".to_string()))?;
    for component in relative.components() {
        current.push(component);
        create_dir_if_missing(&current)?;
    }
    Ok(())
}

/// Creates a directory with mode 0o755 when the host supports Unix
/// permissions. An existing directory is left untouched.
fn create_dir_if_missing(path: &Path) -> Result<()> {
    #[cfg(unix)]
    let result = {
        use std::os::unix::fs::DirBuilderExt;
        fs::DirBuilder::new().mode(0o755).create(path)
    };
    #[cfg(not(unix))]
    let result = fs::DirBuilder::new().create(path);

    match result {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => Ok(()),
        Err(err) => Err(err.into()),
    }
}
