// src/model/mod.rs

//! The deployment document model
//!
//! A [`Deployment`] is the root aggregate parsed from a `deploy.json`
//! document. It maps identifiers to applications, conditions, commands,
//! resources and flows, and validates the cross-references between them.
//! Field names are wire-stable.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{Error, Result};

/// Defines a validated string identifier newtype.
macro_rules! identifier {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug,
            Clone,
            Default,
            PartialEq,
            Eq,
            Hash,
            PartialOrd,
            Ord,
            serde::Serialize,
            serde::Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }
    };
}

pub(crate) use identifier;

mod action;
mod app;
mod attributes;
mod behavior;
mod command;
mod condition;
mod filesystem;
mod flow;
mod lock;
mod mutex;
mod package;
mod process;
mod registry;

pub use action::{Action, ActionType};
pub use app::{AppEvaluation, AppId, AppList, AppSummary, Application, Detection};
pub use attributes::FileAttributes;
pub use behavior::{overlay_behavior, Behavior, OnError};
pub use command::{Command, CommandId, CommandResult, CommandType, ExitCodeInfo};
pub use condition::{Condition, ConditionId, ConditionList, ConditionType};
pub use filesystem::{
    DirRef, DirectoryId, DirectoryResource, FileId, FileRef, FileResource, FileSystemResources,
    KnownFolder,
};
pub use flow::{Flow, FlowId};
pub use lock::{LockConflictRules, LockId, LockResource};
pub use mutex::{MutexId, MutexNamespace, MutexResource};
pub use package::{
    Package, PackageContent, PackageFile, PackageFormat, PackageId, PackageFileId, PackageSource,
    PackageSourceType, PackageType,
};
pub use process::{MatchType, ProcessAttribute, ProcessMatch, ProcessResource, ProcessResourceId};
pub use registry::{
    RegistryHive, RegistryKeyId, RegistryKeyRef, RegistryKeyResource, RegistryResources,
    RegistryRoot, RegistryValueId, RegistryValueRef, RegistryValueResource,
};

identifier! {
    /// A unique identifier for a deployment.
    DeploymentId
}

/// A deployment document: the root aggregate describing apps, conditions,
/// commands, resources and flows.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Deployment {
    #[serde(skip_serializing_if = "DeploymentId::is_empty")]
    pub id: DeploymentId,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(skip_serializing_if = "Behavior::is_unspecified")]
    pub behavior: Behavior,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub apps: BTreeMap<AppId, Application>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub conditions: BTreeMap<ConditionId, Condition>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub commands: BTreeMap<CommandId, Command>,
    pub resources: Resources,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub flows: BTreeMap<FlowId, Flow>,
}

/// The set of resources used by a deployment, both local and remote.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Resources {
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub processes: BTreeMap<ProcessResourceId, ProcessResource>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub mutexes: BTreeMap<MutexId, MutexResource>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub locks: BTreeMap<LockId, LockResource>,
    pub registry: RegistryResources,
    #[serde(rename = "file-system")]
    pub file_system: FileSystemResources,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub packages: BTreeMap<PackageId, Package>,
}

impl Deployment {
    /// Returns an error if the deployment contains invalid configuration.
    pub fn validate(&self) -> Result<()> {
        if self.id.is_empty() {
            return Err(Error::InvalidConfiguration(
                "a deployment ID is missing".to_string(),
            ));
        }

        for id in self.conditions.keys() {
            self.validate_condition(id)?;
        }

        for (id, process) in &self.resources.processes {
            process.matcher.validate().map_err(|err| {
                Error::InvalidConfiguration(format!("process resource \"{id}\": {err}"))
            })?;
        }

        for (id, package) in &self.resources.packages {
            package
                .validate()
                .map_err(|err| Error::InvalidConfiguration(format!("package \"{id}\": {err}")))?;
        }

        Ok(())
    }

    /// Returns an error if the given named condition is not valid.
    pub fn validate_condition(&self, condition: &ConditionId) -> Result<()> {
        let definition = self.conditions.get(condition).ok_or_else(|| {
            Error::InvalidConfiguration(format!(
                "the condition \"{condition}\" does not exist within the \"{}\" deployment",
                self.id
            ))
        })?;

        condition::validate(self, definition).map_err(|err| {
            Error::InvalidConfiguration(format!(
                "the \"{condition}\" condition or one of its subconditions is not valid: {err}"
            ))
        })
    }
}
