// src/engine/condition.rs

//! The condition engine
//!
//! Evaluates named and inline conditions against the local system. Each
//! top-level evaluation keeps a memoization cache of named results and a
//! set of conditions currently being evaluated; reentry into a named
//! condition is a hard error rather than a loop.

use std::collections::{HashMap, HashSet};

use super::{process, EngineContext};
use crate::error::{ConditionElement, Error, Result};
use crate::fs::local;
use crate::model::{Condition, ConditionId, ConditionType};
use crate::value;

/// Evaluates conditions for a deployment.
pub struct ConditionEngine<'a> {
    deployment: &'a crate::model::Deployment,
    platform: &'a dyn crate::platform::Platform,
}

impl<'a> ConditionEngine<'a> {
    pub(crate) fn new(ctx: &EngineContext<'a>) -> Self {
        ConditionEngine {
            deployment: ctx.deployment,
            platform: ctx.platform,
        }
    }

    /// Creates a condition engine from its parts, for callers outside a
    /// running invocation (e.g. the CLI's condition report).
    pub fn with_parts(
        deployment: &'a crate::model::Deployment,
        platform: &'a dyn crate::platform::Platform,
    ) -> Self {
        ConditionEngine {
            deployment,
            platform,
        }
    }

    /// Returns true if the given named condition is currently true.
    pub fn evaluate(&self, condition: &ConditionId) -> Result<bool> {
        let definition = self.deployment.conditions.get(condition).ok_or_else(|| {
            Error::Resolution(format!(
                "the condition \"{condition}\" does not exist within the \"{}\" deployment",
                self.deployment.id
            ))
        })?;

        let mut cache = HashMap::new();
        let mut seen = HashSet::new();
        self.evaluate_inner(Some(condition), definition, &mut cache, &mut seen)
    }

    fn evaluate_inner(
        &self,
        id: Option<&ConditionId>,
        condition: &Condition,
        cache: &mut HashMap<ConditionId, bool>,
        seen: &mut HashSet<ConditionId>,
    ) -> Result<bool> {
        // Only named conditions cache and participate in cycle detection.
        if let Some(id) = id {
            if let Some(cached) = cache.get(id) {
                return Ok(*cached);
            }
            if !seen.insert(id.clone()) {
                return Err(Error::Resolution(format!(
                    "the \"{id}\" condition is recursive and is already being evaluated"
                )));
            }
        }

        let result = self.evaluate_body(id, condition, cache, seen);

        if let Some(id) = id {
            seen.remove(id);
            if let Ok(value) = &result {
                cache.insert(id.clone(), *value);
            }
        }

        result
    }

    fn evaluate_body(
        &self,
        id: Option<&ConditionId>,
        condition: &Condition,
        cache: &mut HashMap<ConditionId, bool>,
        seen: &mut HashSet<ConditionId>,
    ) -> Result<bool> {
        let anonymous = ConditionId::default();
        let own_id = id.unwrap_or(&anonymous);

        let result = if !condition.any.is_empty() {
            let mut result = false;
            for (i, candidate) in condition.any.iter().enumerate() {
                match self.evaluate_inner(None, candidate, cache, seen) {
                    Ok(true) => {
                        result = true;
                        break;
                    }
                    Ok(false) => {}
                    Err(err) => {
                        return Err(condition
                            .element_error(own_id, ConditionElement::Any(i), err)
                            .into())
                    }
                }
            }
            result
        } else if !condition.all.is_empty() {
            let mut result = true;
            for (i, candidate) in condition.all.iter().enumerate() {
                match self.evaluate_inner(None, candidate, cache, seen) {
                    Ok(true) => {}
                    Ok(false) => {
                        result = false;
                        break;
                    }
                    Err(err) => {
                        return Err(condition
                            .element_error(own_id, ConditionElement::All(i), err)
                            .into())
                    }
                }
            }
            result
        } else {
            self.evaluate_leaf(own_id, condition, cache, seen)?
        };

        // Negation applies to results, never to errors.
        if condition.negated {
            Ok(!result)
        } else {
            Ok(result)
        }
    }

    fn evaluate_leaf(
        &self,
        id: &ConditionId,
        condition: &Condition,
        cache: &mut HashMap<ConditionId, bool>,
        seen: &mut HashSet<ConditionId>,
    ) -> Result<bool> {
        let self_error =
            |source: Error| -> Error { condition.self_error(id, source).into() };

        let Some(condition_type) = condition.condition_type else {
            return Err(self_error(Error::InvalidConfiguration(
                "the condition does not specify a type".to_string(),
            )));
        };

        let subject = condition.subject.as_str();
        let resources = &self.deployment.resources;

        match condition_type {
            ConditionType::Subcondition => {
                let candidate_id = ConditionId::from(subject);
                let candidate = self.deployment.conditions.get(&candidate_id).ok_or_else(|| {
                    self_error(Error::Resolution(format!(
                        "the \"{subject}\" condition is not defined in the deployment"
                    )))
                })?;
                self.evaluate_inner(Some(&candidate_id), candidate, cache, seen)
            }

            ConditionType::ProcessIsRunning => {
                let resource_id = crate::model::ProcessResourceId::from(subject);
                let resource = resources.processes.get(&resource_id).ok_or_else(|| {
                    self_error(Error::Resolution(format!(
                        "the \"{subject}\" process is not defined in the deployment"
                    )))
                })?;
                let running = process::number_of_running_processes(self.platform, &resource.matcher)
                    .map_err(&self_error)?;
                Ok(running > 0)
            }

            ConditionType::MutexExists => {
                let mutex_id = crate::model::MutexId::from(subject);
                let mutex = resources.mutexes.get(&mutex_id).ok_or_else(|| {
                    self_error(Error::Resolution(format!(
                        "the \"{subject}\" mutex is not defined in the deployment"
                    )))
                })?;
                let name = mutex.object_name().map_err(&self_error)?;
                self.platform.mutex_exists(&name).map_err(&self_error)
            }

            ConditionType::RegistryKeyExists => {
                let reference = resources
                    .registry
                    .resolve_key(&subject.into())
                    .map_err(&self_error)?;
                let path = reference.relative_path().map_err(&self_error)?;
                let key = self
                    .platform
                    .open_registry_key(reference.root.hive(), &path)
                    .map_err(&self_error)?;
                Ok(key.is_some())
            }

            ConditionType::RegistryValueExists | ConditionType::RegistryValueComparison => {
                let reference = resources
                    .registry
                    .resolve_value(&subject.into())
                    .map_err(&self_error)?;
                let path = reference.key().relative_path().map_err(&self_error)?;
                let Some(key) = self
                    .platform
                    .open_registry_key(reference.root.hive(), &path)
                    .map_err(&self_error)?
                else {
                    return Ok(false);
                };

                match condition_type {
                    ConditionType::RegistryValueExists => {
                        key.has_value(&reference.value_name).map_err(&self_error)
                    }
                    _ => {
                        let actual = key
                            .get_value(&reference.value_name, reference.value_type)
                            .map_err(&self_error)?
                            .ok_or_else(|| {
                                self_error(Error::Resolution(format!(
                                    "the \"{}\" registry value does not exist",
                                    reference.value_name
                                )))
                            })?;
                        let ordering = value::try_compare(&actual, &condition.value)
                            .map_err(|err| self_error(Error::Resolution(err.to_string())))?;
                        Ok(condition.comparison.evaluate(ordering))
                    }
                }
            }

            ConditionType::DirectoryExists => {
                let reference = resources
                    .file_system
                    .resolve_directory(&subject.into())
                    .map_err(&self_error)?;
                let dir = local::open_dir(self.platform, &reference).map_err(&self_error)?;
                Ok(dir.is_some())
            }

            ConditionType::FileExists => {
                let reference = resources
                    .file_system
                    .resolve_file(&subject.into())
                    .map_err(&self_error)?;
                let Some(dir) =
                    local::open_dir(self.platform, &reference.dir()).map_err(&self_error)?
                else {
                    return Ok(false);
                };
                let Some(metadata) = dir.stat(&reference.file_path).map_err(&self_error)? else {
                    return Ok(false);
                };
                if metadata.is_file() {
                    Ok(true)
                } else {
                    let path = dir.join(&reference.file_path).map_err(&self_error)?;
                    Err(self_error(Error::Resolution(format!(
                        "file \"{subject}\": the \"{}\" path exists but it is not a regular file",
                        path.display()
                    ))))
                }
            }
        }
    }
}
