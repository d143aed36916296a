// src/model/filesystem.rs

//! File system resources and their resolution
//!
//! Directories are declared as a graph of parent references that must
//! terminate in a well-known folder. Resolution walks the parent chain
//! with cycle detection and produces a reference holding the root plus
//! the top-down lineage of directories beneath it. Files resolve to their
//! parent directory reference plus a relative file path.
//!
//! Resolving a reference does not imply that the directory or file exists
//! on the local system.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

use super::identifier;
use crate::error::{Error, Result};

identifier! {
    /// A unique identifier for a directory resource.
    DirectoryId
}

identifier! {
    /// A unique identifier for a file resource.
    FileId
}

/// A folder with a well-known location on the local system.
///
/// Known folders are a closed set; deployment documents refer to them by
/// their directory resource IDs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KnownFolder {
    ProgramData,
    StartMenu,
    PublicDesktop,
}

impl KnownFolder {
    /// Looks for a known folder with the given directory resource ID.
    pub fn well_known(id: &DirectoryId) -> Option<KnownFolder> {
        match id.as_str() {
            "program-data" => Some(KnownFolder::ProgramData),
            "start-menu" => Some(KnownFolder::StartMenu),
            "public-desktop" => Some(KnownFolder::PublicDesktop),
            _ => None,
        }
    }

    pub fn id(&self) -> DirectoryId {
        DirectoryId::from(match self {
            KnownFolder::ProgramData => "program-data",
            KnownFolder::StartMenu => "start-menu",
            KnownFolder::PublicDesktop => "public-desktop",
        })
    }

    /// Returns true if destructive operations are forbidden beneath this
    /// root. The program-data folder holds the deployment system's own
    /// staging state.
    pub fn protected(&self) -> bool {
        matches!(self, KnownFolder::ProgramData)
    }
}

/// File system resources declared by a deployment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FileSystemResources {
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub directories: BTreeMap<DirectoryId, DirectoryResource>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub files: BTreeMap<FileId, FileResource>,
}

/// A directory declared in a deployment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectoryResource {
    /// A well-known folder ID, or another directory's resource ID.
    #[serde(skip_serializing_if = "DirectoryId::is_empty")]
    pub location: DirectoryId,
    /// The path of the directory relative to its location.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub path: String,
}

/// A file declared in a deployment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FileResource {
    /// A well-known folder ID, or a directory resource ID.
    #[serde(skip_serializing_if = "DirectoryId::is_empty")]
    pub location: DirectoryId,
    /// The path of the file relative to its location.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub path: String,
}

/// A resolved reference to a directory on the local file system.
#[derive(Debug, Clone)]
pub struct DirRef {
    pub root: KnownFolder,
    pub lineage: Vec<DirectoryResource>,
}

/// A resolved reference to a file on the local file system.
#[derive(Debug, Clone)]
pub struct FileRef {
    pub root: KnownFolder,
    pub lineage: Vec<DirectoryResource>,
    pub file_id: FileId,
    pub file_path: String,
}

impl FileRef {
    /// Returns a reference to the file's parent directory.
    pub fn dir(&self) -> DirRef {
        DirRef {
            root: self.root,
            lineage: self.lineage.clone(),
        }
    }
}

impl FileSystemResources {
    /// Resolves the requested directory resource to a reference that can
    /// be mapped to a path on the local system.
    pub fn resolve_directory(&self, dir: &DirectoryId) -> Result<DirRef> {
        let data = match self.directories.get(dir) {
            Some(data) => data,
            None => {
                if let Some(root) = KnownFolder::well_known(dir) {
                    return Ok(DirRef {
                        root,
                        lineage: Vec::new(),
                    });
                }
                return Err(Error::Resolution(format!(
                    "the \"{dir}\" directory is not defined in the deployment's resources"
                )));
            }
        };

        if data.location.is_empty() {
            return Err(Error::Resolution(format!(
                "the \"{dir}\" directory does not have a location"
            )));
        }

        // Walk the ancestry, recording each parent, until a known folder
        // is reached. A seen set guards against cycles.
        let mut lineage = vec![data.clone()];
        let mut seen: HashSet<DirectoryId> = HashSet::new();
        let mut next = data.location.clone();
        let root = loop {
            if !seen.insert(next.clone()) {
                return Err(Error::Resolution(format!(
                    "failed to resolve the \"{dir}\" directory: the \"{next}\" parent directory has a cyclic reference to itself in the deployment's resources"
                )));
            }

            if let Some(parent) = self.directories.get(&next) {
                lineage.push(parent.clone());
                if parent.location.is_empty() {
                    return Err(Error::Resolution(format!(
                        "failed to resolve the \"{dir}\" directory: the \"{next}\" parent directory does not have a location"
                    )));
                }
                next = parent.location.clone();
                continue;
            }

            if let Some(root) = KnownFolder::well_known(&next) {
                break root;
            }

            return Err(Error::Resolution(format!(
                "failed to resolve the \"{dir}\" directory: the \"{next}\" parent directory is not defined in the deployment's resources"
            )));
        };

        // Reverse into top-down order for traversal from the root.
        lineage.reverse();

        Ok(DirRef { root, lineage })
    }

    /// Resolves the requested file resource to a reference that can be
    /// mapped to a path on the local system.
    pub fn resolve_file(&self, file: &FileId) -> Result<FileRef> {
        let data = self.files.get(file).ok_or_else(|| {
            Error::Resolution(format!(
                "the \"{file}\" file is not defined in the deployment's resources"
            ))
        })?;

        if data.location.is_empty() {
            return Err(Error::Resolution(format!(
                "the \"{file}\" file does not have a location"
            )));
        }

        let dir = self.resolve_directory(&data.location).map_err(|err| {
            Error::Resolution(format!("failed to resolve the \"{file}\" file: {err}"))
        })?;

        Ok(FileRef {
            root: dir.root,
            lineage: dir.lineage,
            file_id: file.clone(),
            file_path: data.path.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resources() -> FileSystemResources {
        let mut fs = FileSystemResources::default();
        fs.directories.insert(
            "vendor".into(),
            DirectoryResource {
                location: "program-data".into(),
                path: "Contoso".to_string(),
            },
        );
        fs.directories.insert(
            "agent".into(),
            DirectoryResource {
                location: "vendor".into(),
                path: "Agent".to_string(),
            },
        );
        fs.files.insert(
            "agent-config".into(),
            FileResource {
                location: "agent".into(),
                path: "config.json".to_string(),
            },
        );
        fs
    }

    #[test]
    fn test_resolve_known_folder() {
        let fs = FileSystemResources::default();
        let reference = fs.resolve_directory(&"start-menu".into()).unwrap();
        assert_eq!(reference.root, KnownFolder::StartMenu);
        assert!(reference.lineage.is_empty());
    }

    #[test]
    fn test_resolve_directory_builds_lineage() {
        let fs = resources();
        let reference = fs.resolve_directory(&"agent".into()).unwrap();
        assert_eq!(reference.root, KnownFolder::ProgramData);
        let paths: Vec<&str> = reference.lineage.iter().map(|d| d.path.as_str()).collect();
        assert_eq!(paths, ["Contoso", "Agent"]);
    }

    #[test]
    fn test_resolve_file() {
        let fs = resources();
        let reference = fs.resolve_file(&"agent-config".into()).unwrap();
        assert_eq!(reference.file_path, "config.json");
        assert_eq!(reference.dir().lineage.len(), 2);
    }

    #[test]
    fn test_resolve_unknown_directory_fails() {
        let fs = resources();
        let err = fs.resolve_directory(&"missing".into()).unwrap_err();
        assert!(err.to_string().contains("not defined"));
    }

    #[test]
    fn test_resolver_detects_cycles_within_one_pass() {
        let mut fs = FileSystemResources::default();
        fs.directories.insert(
            "a".into(),
            DirectoryResource {
                location: "b".into(),
                path: "A".to_string(),
            },
        );
        fs.directories.insert(
            "b".into(),
            DirectoryResource {
                location: "a".into(),
                path: "B".to_string(),
            },
        );
        let err = fs.resolve_directory(&"a".into()).unwrap_err();
        assert!(err.to_string().contains("cyclic"));
    }

    #[test]
    fn test_protected_roots() {
        assert!(KnownFolder::ProgramData.protected());
        assert!(!KnownFolder::StartMenu.protected());
        assert!(!KnownFolder::PublicDesktop.protected());
    }
}
