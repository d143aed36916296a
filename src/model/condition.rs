// src/model/condition.rs

//! Conditions: negatable predicate trees over system state
//!
//! A condition either has a type (a leaf predicate over a referenced
//! resource) or is a compound of `any`/`all` subconditions. Exactly one of
//! {type, any, all} may be populated.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::identifier;
use super::Deployment;
use crate::error::{ConditionElement, ConditionError, Error, Result};
use crate::value::{Comparison, Value};

identifier! {
    /// A unique identifier for a condition.
    ConditionId
}

/// The type of a leaf condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConditionType {
    /// Delegates to another named condition.
    #[serde(rename = "condition")]
    Subcondition,
    #[serde(rename = "resource.process:running")]
    ProcessIsRunning,
    #[serde(rename = "resource.mutex:exists")]
    MutexExists,
    #[serde(rename = "resource.registry.key:exists")]
    RegistryKeyExists,
    #[serde(rename = "resource.registry.value:exists")]
    RegistryValueExists,
    #[serde(rename = "resource.registry.value:comparison")]
    RegistryValueComparison,
    #[serde(rename = "resource.file-system.directory:exists")]
    DirectoryExists,
    #[serde(rename = "resource.file-system.file:exists")]
    FileExists,
}

impl ConditionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConditionType::Subcondition => "condition",
            ConditionType::ProcessIsRunning => "resource.process:running",
            ConditionType::MutexExists => "resource.mutex:exists",
            ConditionType::RegistryKeyExists => "resource.registry.key:exists",
            ConditionType::RegistryValueExists => "resource.registry.value:exists",
            ConditionType::RegistryValueComparison => "resource.registry.value:comparison",
            ConditionType::DirectoryExists => "resource.file-system.directory:exists",
            ConditionType::FileExists => "resource.file-system.file:exists",
        }
    }
}

impl fmt::Display for ConditionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A condition that can be evaluated against the local system.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Condition {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub label: String,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub condition_type: Option<ConditionType>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub subject: String,
    #[serde(skip_serializing_if = "Comparison::is_equals")]
    pub comparison: Comparison,
    #[serde(skip_serializing_if = "Value::is_unknown")]
    pub value: Value,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub negated: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub any: Vec<Condition>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub all: Vec<Condition>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub violation: String,
}

impl Condition {
    /// Returns an error attributed to this condition itself.
    pub(crate) fn self_error(&self, id: &ConditionId, source: Error) -> ConditionError {
        ConditionError {
            id: id.clone(),
            label: self.label.clone(),
            condition_type: self
                .condition_type
                .map(|t| t.as_str().to_string())
                .unwrap_or_default(),
            element: ConditionElement::Itself,
            source: Box::new(source),
        }
    }

    /// Returns an error attributed to one of this condition's
    /// subconditions.
    pub(crate) fn element_error(
        &self,
        id: &ConditionId,
        element: ConditionElement,
        source: Error,
    ) -> ConditionError {
        ConditionError {
            id: id.clone(),
            label: self.label.clone(),
            condition_type: self
                .condition_type
                .map(|t| t.as_str().to_string())
                .unwrap_or_default(),
            element,
            source: Box::new(source),
        }
    }
}

/// An ordered list of condition identifiers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConditionList(Vec<ConditionId>);

impl ConditionList {
    pub fn new() -> Self {
        ConditionList(Vec::new())
    }

    pub fn push(&mut self, condition: ConditionId) {
        self.0.push(condition);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ConditionId> {
        self.0.iter()
    }
}

impl fmt::Display for ConditionList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, condition) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            f.write_str(condition.as_str())?;
        }
        Ok(())
    }
}

impl From<Vec<ConditionId>> for ConditionList {
    fn from(conditions: Vec<ConditionId>) -> Self {
        ConditionList(conditions)
    }
}

impl FromIterator<ConditionId> for ConditionList {
    fn from_iter<T: IntoIterator<Item = ConditionId>>(iter: T) -> Self {
        ConditionList(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a ConditionList {
    type Item = &'a ConditionId;
    type IntoIter = std::slice::Iter<'a, ConditionId>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Validates a condition definition against the deployment it belongs to.
pub(crate) fn validate(deployment: &Deployment, condition: &Condition) -> Result<()> {
    let anonymous = ConditionId::default();

    let has_type = condition.condition_type.is_some();
    let has_any = !condition.any.is_empty();
    let has_all = !condition.all.is_empty();

    let mut fields = Vec::new();
    if has_type {
        fields.push("type");
    }
    if has_any {
        fields.push("any");
    }
    if has_all {
        fields.push("all");
    }

    match fields.len() {
        0 => {
            return Err(condition
                .self_error(
                    &anonymous,
                    Error::InvalidConfiguration(
                        "the condition does not specify a type".to_string(),
                    ),
                )
                .into())
        }
        1 => {}
        _ => {
            return Err(condition
                .self_error(
                    &anonymous,
                    Error::InvalidConfiguration(format!(
                        "the following fields are present, which are mutually exclusive: {}",
                        fields.join(", ")
                    )),
                )
                .into())
        }
    }

    for (i, subcondition) in condition.any.iter().enumerate() {
        validate(deployment, subcondition).map_err(|err| {
            Error::from(condition.element_error(&anonymous, ConditionElement::Any(i), err))
        })?;
    }

    for (i, subcondition) in condition.all.iter().enumerate() {
        validate(deployment, subcondition).map_err(|err| {
            Error::from(condition.element_error(&anonymous, ConditionElement::All(i), err))
        })?;
    }

    let Some(condition_type) = condition.condition_type else {
        return Ok(());
    };

    let subject = condition.subject.as_str();
    if subject.is_empty() {
        return Err(condition
            .self_error(
                &anonymous,
                Error::InvalidConfiguration(format!(
                    "the condition does not provide a subject for its \"{condition_type}\" type"
                )),
            )
            .into());
    }

    let resources = &deployment.resources;
    let missing: Option<String> = match condition_type {
        ConditionType::Subcondition => {
            if deployment.conditions.contains_key(&ConditionId::from(subject)) {
                None
            } else {
                Some(format!(
                    "the condition references a condition ID that is not defined: {subject}"
                ))
            }
        }
        ConditionType::ProcessIsRunning => {
            let id = super::ProcessResourceId::from(subject);
            if resources.processes.contains_key(&id) {
                None
            } else {
                Some(format!(
                    "the condition references a process resource ID that is not defined: {subject}"
                ))
            }
        }
        ConditionType::MutexExists => {
            let id = super::MutexId::from(subject);
            if resources.mutexes.contains_key(&id) {
                None
            } else {
                Some(format!(
                    "the condition references a mutex resource ID that is not defined: {subject}"
                ))
            }
        }
        ConditionType::RegistryKeyExists => {
            let id = super::RegistryKeyId::from(subject);
            if resources.registry.keys.contains_key(&id)
                || super::RegistryRoot::well_known(&id).is_some()
            {
                None
            } else {
                Some(format!(
                    "the condition references a registry key ID that is not defined: {subject}"
                ))
            }
        }
        ConditionType::RegistryValueExists | ConditionType::RegistryValueComparison => {
            let id = super::RegistryValueId::from(subject);
            if resources.registry.values.contains_key(&id) {
                None
            } else {
                Some(format!(
                    "the condition references a registry value ID that is not defined: {subject}"
                ))
            }
        }
        ConditionType::DirectoryExists => {
            let id = super::DirectoryId::from(subject);
            if resources.file_system.directories.contains_key(&id)
                || super::KnownFolder::well_known(&id).is_some()
            {
                None
            } else {
                Some(format!(
                    "the condition references a directory resource ID that is not defined: {subject}"
                ))
            }
        }
        ConditionType::FileExists => {
            let id = super::FileId::from(subject);
            if resources.file_system.files.contains_key(&id) {
                None
            } else {
                Some(format!(
                    "the condition references a file resource ID that is not defined: {subject}"
                ))
            }
        }
    };

    if let Some(message) = missing {
        return Err(condition
            .self_error(&anonymous, Error::InvalidConfiguration(message))
            .into());
    }

    Ok(())
}
