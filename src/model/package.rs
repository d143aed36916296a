// src/model/package.rs

//! Packages: downloadable artifacts with verified content
//!
//! A package names one or more download sources, the attributes its file
//! must satisfy, an inventory of files for archive packages, and the
//! commands that can be invoked against it.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use super::attributes::FileAttributes;
use super::command::{Command, CommandId};
use super::identifier;
use crate::hash::HashEntry;

identifier! {
    /// A unique identifier for a deployment package.
    PackageId
}

identifier! {
    /// A unique identifier for a file within a package.
    PackageFileId
}

/// The type of a package.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PackageType(String);

impl PackageType {
    pub fn archive() -> Self {
        PackageType("archive".to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true for packages whose content is an archive that must be
    /// extracted before use.
    pub fn is_archive(&self) -> bool {
        self.0 == "archive"
    }
}

impl fmt::Display for PackageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PackageType {
    fn from(s: &str) -> Self {
        PackageType(s.to_string())
    }
}

/// The format of a package.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PackageFormat(String);

impl PackageFormat {
    pub fn zip() -> Self {
        PackageFormat("zip".to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_zip(&self) -> bool {
        self.0 == "zip"
    }
}

impl fmt::Display for PackageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PackageFormat {
    fn from(s: &str) -> Self {
        PackageFormat(s.to_string())
    }
}

/// A deployment package.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Package {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(rename = "type")]
    pub package_type: PackageType,
    pub format: PackageFormat,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<PackageSource>,
    pub attributes: FileAttributes,
    /// Files expected to be present within an archive package.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub files: BTreeMap<PackageFileId, PackageFile>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub commands: BTreeMap<CommandId, Command>,
}

impl Package {
    /// Returns the file name used for the package in its staging
    /// directory.
    pub fn file_name(&self) -> String {
        format!("{}.{}", self.name, self.file_extension())
    }

    /// Returns an appropriate file extension for the package. Unrecognized
    /// combinations fall back to "file".
    pub fn file_extension(&self) -> &'static str {
        if self.package_type.is_archive() && self.format.is_zip() {
            "zip"
        } else {
            "file"
        }
    }

    /// Returns the content-addressed identity for the package.
    pub fn content(&self, id: &PackageId) -> PackageContent {
        PackageContent {
            id: id.clone(),
            primary_hash: self.attributes.hashes.primary(),
        }
    }

    /// Returns an error if the package contains invalid configuration.
    pub fn validate(&self) -> Result<(), String> {
        match self.package_type.as_str() {
            "archive" => {
                if !self.format.is_zip() {
                    return Err(format!(
                        "the package format \"{}\" is not a recognized format for {} packages",
                        self.format, self.package_type
                    ));
                }
            }
            other => return Err(format!("the package type \"{other}\" is not recognized")),
        }

        for (i, source) in self.sources.iter().enumerate() {
            source
                .validate()
                .map_err(|err| format!("package source {i}: {err}"))?;
        }

        self.attributes
            .validate()
            .map_err(|err| format!("package file attributes: {err}"))?;

        for (id, command) in &self.commands {
            if !command.executable.is_empty() {
                let file_id = PackageFileId::from(command.executable.as_str());
                if !command
                    .command_type
                    .map(|t| t.is_app_based())
                    .unwrap_or(false)
                    && !self.files.contains_key(&file_id)
                {
                    return Err(format!(
                        "package command \"{id}\": the executable file ID refers to package file \"{file_id}\", which is not defined in the package file set"
                    ));
                }
            }
        }

        Ok(())
    }
}

/// The source type for retrieving a package.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PackageSourceType(String);

impl PackageSourceType {
    pub const HTTP: &'static str = "http";

    pub fn http() -> Self {
        PackageSourceType(Self::HTTP.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_http(&self) -> bool {
        self.0 == Self::HTTP
    }
}

/// A potential source for retrieval of a package.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PackageSource {
    #[serde(rename = "type")]
    pub source_type: PackageSourceType,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub url: String,
}

impl PackageSource {
    pub fn validate(&self) -> Result<(), String> {
        match self.source_type.as_str() {
            "" => Err("the source type is missing".to_string()),
            PackageSourceType::HTTP => Ok(()),
            other => Err(format!(
                "the package source type \"{other}\" is not recognized"
            )),
        }
    }
}

/// A file expected to be present within an archive package.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PackageFile {
    pub path: String,
    #[serde(skip_serializing_if = "attributes_are_empty")]
    pub attributes: FileAttributes,
}

fn attributes_are_empty(attributes: &FileAttributes) -> bool {
    attributes.size == 0 && attributes.hashes.is_empty()
}

/// A content-addressed identifier for a package, combining its ID with its
/// primary hash.
#[derive(Debug, Clone, Default)]
pub struct PackageContent {
    pub id: PackageId,
    pub primary_hash: HashEntry,
}

impl PackageContent {
    /// Returns the directory name for the package content, in the form
    /// `pkg-{id}-{hash}` with the hash truncated to 16 hex characters.
    pub fn dir_name(&self) -> String {
        let mut out = String::from("pkg");
        if !self.id.is_empty() {
            out.push('-');
            out.push_str(self.id.as_str());
        }
        let short = self.primary_hash.short_value();
        if !short.is_empty() {
            out.push('-');
            out.push_str(short);
        }
        out
    }
}

impl fmt::Display for PackageContent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.dir_name())
    }
}
