// src/model/registry.rs

//! Registry resources and their resolution
//!
//! Registry keys are declared as a graph of parent references that must
//! terminate in a well-known registry root. Resolution walks the parent
//! chain with cycle detection and produces a reference holding the root
//! plus the top-down lineage of keys beneath it. Resolving a reference
//! does not imply that the key exists on the local system.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

use super::identifier;
use crate::error::{Error, Result};
use crate::value::Kind;

identifier! {
    /// A unique identifier for a registry key resource.
    RegistryKeyId
}

identifier! {
    /// A unique identifier for a registry value resource.
    RegistryValueId
}

/// A predefined hive of the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegistryHive {
    LocalMachine,
}

impl RegistryHive {
    pub fn as_str(&self) -> &'static str {
        match self {
            RegistryHive::LocalMachine => "HKEY_LOCAL_MACHINE",
        }
    }
}

/// A well-known root location within the registry.
///
/// Roots are a closed set; deployment documents refer to them by their
/// resource IDs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryRoot {
    id: &'static str,
    hive: RegistryHive,
    path: &'static str,
}

impl RegistryRoot {
    const ROOTS: &'static [RegistryRoot] = &[RegistryRoot {
        id: "software",
        hive: RegistryHive::LocalMachine,
        path: "SOFTWARE",
    }];

    /// Looks for a well-known registry root with the given resource ID.
    pub fn well_known(id: &RegistryKeyId) -> Option<RegistryRoot> {
        Self::ROOTS.iter().copied().find(|root| root.id == id.as_str())
    }

    pub fn id(&self) -> RegistryKeyId {
        RegistryKeyId::from(self.id)
    }

    pub fn hive(&self) -> RegistryHive {
        self.hive
    }

    /// The path of the root relative to its hive.
    pub fn path(&self) -> &'static str {
        self.path
    }

    /// The absolute path of the root, including the hive.
    pub fn absolute_path(&self) -> String {
        if self.path.is_empty() {
            self.hive.as_str().to_string()
        } else {
            format!("{}\\{}", self.hive.as_str(), self.path)
        }
    }
}

/// Registry resources declared by a deployment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryResources {
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub keys: BTreeMap<RegistryKeyId, RegistryKeyResource>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub values: BTreeMap<RegistryValueId, RegistryValueResource>,
}

/// A registry key declared in a deployment.
///
/// The name and path fields are mutually exclusive; a name is a single
/// key name beneath the location while a path may span several levels.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryKeyResource {
    /// A well-known registry root ID, or another key's resource ID.
    #[serde(skip_serializing_if = "RegistryKeyId::is_empty")]
    pub location: RegistryKeyId,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub path: String,
}

/// A registry value declared in a deployment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryValueResource {
    /// The resource ID of the key the value belongs to, or a well-known
    /// registry root ID.
    #[serde(skip_serializing_if = "RegistryKeyId::is_empty")]
    pub key: RegistryKeyId,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(rename = "type")]
    pub value_type: Kind,
}

/// A resolved reference to a registry key on the local system.
#[derive(Debug, Clone)]
pub struct RegistryKeyRef {
    pub root: RegistryRoot,
    pub lineage: Vec<RegistryKeyResource>,
}

impl RegistryKeyRef {
    /// Returns the key's path relative to its hive's predefined key.
    pub fn relative_path(&self) -> Result<String> {
        let mut path = self.root.path().to_string();
        for key in &self.lineage {
            let segment = key_segment(key)?;
            if path.is_empty() {
                path = segment;
            } else {
                path = format!("{path}\\{segment}");
            }
        }
        Ok(path)
    }

    /// Returns the absolute path of the key, including the hive.
    pub fn absolute_path(&self) -> Result<String> {
        let relative = self.relative_path()?;
        if relative.is_empty() {
            Ok(self.root.hive().as_str().to_string())
        } else {
            Ok(format!("{}\\{relative}", self.root.hive().as_str()))
        }
    }
}

fn key_segment(key: &RegistryKeyResource) -> Result<String> {
    if !key.name.is_empty() {
        return Ok(key.name.clone());
    }
    if !key.path.is_empty() {
        return localize_key_path(&key.path);
    }
    Err(Error::Resolution(
        "a registry key resource does not specify a name or path".to_string(),
    ))
}

/// Normalizes a relative registry key path, accepting forward slashes and
/// backslashes as separators and rejecting traversal outside the location.
fn localize_key_path(path: &str) -> Result<String> {
    let mut segments = Vec::new();
    for segment in path.split(['/', '\\']) {
        match segment {
            "" => {
                return Err(Error::Resolution(format!(
                    "the registry key path \"{path}\" is not a valid relative path"
                )))
            }
            "." | ".." => {
                return Err(Error::Resolution(format!(
                    "the registry key path \"{path}\" must not contain \"{segment}\" segments"
                )))
            }
            other => segments.push(other),
        }
    }
    if segments.is_empty() {
        return Err(Error::Resolution(
            "a registry key path is empty".to_string(),
        ));
    }
    Ok(segments.join("\\"))
}

/// A resolved reference to a registry value on the local system.
#[derive(Debug, Clone)]
pub struct RegistryValueRef {
    pub root: RegistryRoot,
    pub lineage: Vec<RegistryKeyResource>,
    pub value_id: RegistryValueId,
    pub value_name: String,
    pub value_type: Kind,
}

impl RegistryValueRef {
    /// Returns a reference to the value's registry key.
    pub fn key(&self) -> RegistryKeyRef {
        RegistryKeyRef {
            root: self.root,
            lineage: self.lineage.clone(),
        }
    }
}

impl RegistryResources {
    /// Resolves the requested registry key resource to a reference that
    /// can be mapped to a location in the registry.
    pub fn resolve_key(&self, key: &RegistryKeyId) -> Result<RegistryKeyRef> {
        let data = match self.keys.get(key) {
            Some(data) => data,
            None => {
                if let Some(root) = RegistryRoot::well_known(key) {
                    return Ok(RegistryKeyRef {
                        root,
                        lineage: Vec::new(),
                    });
                }
                return Err(Error::Resolution(format!(
                    "the \"{key}\" registry key is not defined in the deployment's resources"
                )));
            }
        };

        if data.location.is_empty() {
            return Err(Error::Resolution(format!(
                "the \"{key}\" registry key does not have a location"
            )));
        }

        // Walk the ancestry, recording each parent, until a well-known
        // root is reached. A seen set guards against cycles.
        let mut lineage = vec![data.clone()];
        let mut seen: HashSet<RegistryKeyId> = HashSet::new();
        let mut next = data.location.clone();
        let root = loop {
            if !seen.insert(next.clone()) {
                return Err(Error::Resolution(format!(
                    "failed to resolve the \"{key}\" registry key: the \"{next}\" parent key has a cyclic reference to itself in the deployment's registry resources"
                )));
            }

            if let Some(parent) = self.keys.get(&next) {
                lineage.push(parent.clone());
                if parent.location.is_empty() {
                    return Err(Error::Resolution(format!(
                        "failed to resolve the \"{key}\" registry key: the \"{next}\" parent key does not have a location"
                    )));
                }
                next = parent.location.clone();
                continue;
            }

            if let Some(root) = RegistryRoot::well_known(&next) {
                break root;
            }

            return Err(Error::Resolution(format!(
                "failed to resolve the \"{key}\" registry key: the \"{next}\" parent key is not defined in the deployment's resources"
            )));
        };

        // Reverse into top-down order for traversal from the root.
        lineage.reverse();

        Ok(RegistryKeyRef { root, lineage })
    }

    /// Resolves the requested registry value resource to a reference that
    /// can be mapped to a location in the registry.
    pub fn resolve_value(&self, value: &RegistryValueId) -> Result<RegistryValueRef> {
        let data = self.values.get(value).ok_or_else(|| {
            Error::Resolution(format!(
                "the \"{value}\" registry value is not defined in the deployment's resources"
            ))
        })?;

        if data.key.is_empty() {
            return Err(Error::Resolution(format!(
                "the \"{value}\" registry value does not have a key"
            )));
        }

        let key = self.resolve_key(&data.key).map_err(|err| {
            Error::Resolution(format!(
                "failed to resolve the \"{value}\" registry value: {err}"
            ))
        })?;

        Ok(RegistryValueRef {
            root: key.root,
            lineage: key.lineage,
            value_id: value.clone(),
            value_name: data.name.clone(),
            value_type: data.value_type,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(location: &str, name: &str, path: &str) -> RegistryKeyResource {
        RegistryKeyResource {
            location: RegistryKeyId::from(location),
            name: name.to_string(),
            path: path.to_string(),
        }
    }

    fn resources() -> RegistryResources {
        let mut registry = RegistryResources::default();
        registry
            .keys
            .insert("vendor".into(), key("software", "Contoso", ""));
        registry
            .keys
            .insert("product".into(), key("vendor", "", "Agent/Deploy"));
        registry.values.insert(
            "installed-version".into(),
            RegistryValueResource {
                key: "product".into(),
                name: "DisplayVersion".to_string(),
                value_type: Kind::Version,
            },
        );
        registry
    }

    #[test]
    fn test_resolve_well_known_root() {
        let registry = RegistryResources::default();
        let reference = registry.resolve_key(&"software".into()).unwrap();
        assert!(reference.lineage.is_empty());
        assert_eq!(
            reference.absolute_path().unwrap(),
            "HKEY_LOCAL_MACHINE\\SOFTWARE"
        );
    }

    #[test]
    fn test_resolve_key_builds_lineage() {
        let registry = resources();
        let reference = registry.resolve_key(&"product".into()).unwrap();
        assert_eq!(reference.lineage.len(), 2);
        assert_eq!(
            reference.absolute_path().unwrap(),
            "HKEY_LOCAL_MACHINE\\SOFTWARE\\Contoso\\Agent\\Deploy"
        );
    }

    #[test]
    fn test_resolve_unknown_key_fails() {
        let registry = resources();
        let err = registry.resolve_key(&"missing".into()).unwrap_err();
        assert!(err.to_string().contains("not defined"));
    }

    #[test]
    fn test_resolve_detects_cycles() {
        let mut registry = RegistryResources::default();
        registry.keys.insert("a".into(), key("b", "A", ""));
        registry.keys.insert("b".into(), key("a", "B", ""));
        let err = registry.resolve_key(&"a".into()).unwrap_err();
        assert!(err.to_string().contains("cyclic"));
    }

    #[test]
    fn test_resolve_value() {
        let registry = resources();
        let reference = registry.resolve_value(&"installed-version".into()).unwrap();
        assert_eq!(reference.value_name, "DisplayVersion");
        assert_eq!(reference.value_type, Kind::Version);
        assert_eq!(
            reference.key().absolute_path().unwrap(),
            "HKEY_LOCAL_MACHINE\\SOFTWARE\\Contoso\\Agent\\Deploy"
        );
    }

    #[test]
    fn test_key_path_rejects_traversal() {
        let mut registry = RegistryResources::default();
        registry
            .keys
            .insert("bad".into(), key("software", "", "../Escape"));
        let reference = registry.resolve_key(&"bad".into()).unwrap();
        assert!(reference.relative_path().is_err());
    }
}
