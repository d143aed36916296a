// src/engine/app.rs

//! The app engine
//!
//! Determines whether applications are installed on the local system,
//! either through a configured presence condition or through the app
//! registry view selected by the application's architecture and scope.
//! The evaluation/summary pair brackets a command invocation: the
//! evaluation says what still needs to change, the summary says what
//! actually changed.

use super::condition::ConditionEngine;
use super::EngineContext;
use crate::error::{Error, Result};
use crate::model::{AppEvaluation, AppId, AppList, AppSummary, Application, Deployment};
use crate::platform::Platform;
use crate::value::Kind;
use crate::version::Version;

/// Evaluates the status of applications on the local system.
pub struct AppEngine<'a> {
    deployment: &'a Deployment,
    platform: &'a dyn Platform,
}

impl<'a> AppEngine<'a> {
    pub(crate) fn new(ctx: &EngineContext<'a>) -> Self {
        AppEngine {
            deployment: ctx.deployment,
            platform: ctx.platform,
        }
    }

    /// Creates an app engine from its parts, for callers outside a
    /// running invocation.
    pub fn with_parts(deployment: &'a Deployment, platform: &'a dyn Platform) -> Self {
        AppEngine {
            deployment,
            platform,
        }
    }

    fn definition(&self, app: &AppId) -> Result<&'a Application> {
        self.deployment.apps.get(app).ok_or_else(|| {
            Error::Resolution(format!(
                "the \"{app}\" app does not exist within the \"{}\" deployment",
                self.deployment.id
            ))
        })
    }

    /// Returns true if the application is installed on the local system.
    pub fn is_installed(&self, app: &AppId) -> Result<bool> {
        let definition = self.definition(app)?;

        // A configured presence condition takes precedence over the app
        // registry.
        if let Some(present) = &definition.detection.present {
            let engine = ConditionEngine::with_parts(self.deployment, self.platform);
            return engine.evaluate(present);
        }

        let view = self
            .platform
            .app_view(&definition.architecture, &definition.scope)?;
        view.contains(&definition.product_code)
    }

    /// Returns the version of the application installed on the local
    /// system, or an empty version when it is not present.
    pub fn version(&self, app: &AppId) -> Result<Version> {
        let definition = self.definition(app)?;

        if let Some(version_value) = &definition.detection.version {
            let reference = self
                .deployment
                .resources
                .registry
                .resolve_value(version_value)?;
            let path = reference.key().relative_path()?;
            let Some(key) = self
                .platform
                .open_registry_key(reference.root.hive(), &path)?
            else {
                return Ok(Version::default());
            };
            let Some(value) = key.get_value(&reference.value_name, reference.value_type)? else {
                return Ok(Version::default());
            };
            if value.kind() == Kind::Version {
                return Ok(value.as_version().cloned().unwrap_or_default());
            }
            return Err(Error::Resolution(format!(
                "the \"{}\" registry value exists but does not contain a version",
                reference.value_name
            )));
        }

        let view = self
            .platform
            .app_view(&definition.architecture, &definition.scope)?;
        Ok(view
            .display_version(&definition.product_code)?
            .map(Version::from)
            .unwrap_or_default())
    }

    /// Returns the apps from the list that are installed.
    pub fn installed_apps(&self, list: &AppList) -> Result<AppList> {
        let mut installed = AppList::new();
        for app in list {
            let present = self.is_installed(app).map_err(|err| {
                Error::AppChanges(format!(
                    "unable to determine the installation state of application \"{app}\": {err}"
                ))
            })?;
            if present {
                installed.push(app.clone());
            }
        }
        Ok(installed)
    }

    /// Returns the apps from the list that are not installed.
    pub fn missing_apps(&self, list: &AppList) -> Result<AppList> {
        let installed = self.installed_apps(list)?;
        Ok(list.difference(&installed))
    }

    /// Evaluates the changes needed to effect the given installs and
    /// uninstalls.
    pub fn evaluate_app_changes(
        &self,
        installs: &AppList,
        uninstalls: &AppList,
    ) -> Result<AppEvaluation> {
        let already_installed = self.installed_apps(installs)?;
        let to_install = installs.difference(&already_installed);

        let already_uninstalled = self.missing_apps(uninstalls)?;
        let to_uninstall = uninstalls.difference(&already_uninstalled);

        Ok(AppEvaluation {
            already_installed,
            already_uninstalled,
            to_install,
            to_uninstall,
        })
    }

    /// Summarizes the effectiveness of the changes anticipated by a
    /// previous evaluation.
    pub fn summarize_app_changes(&self, evaluation: &AppEvaluation) -> Result<AppSummary> {
        let still_not_installed = self.missing_apps(&evaluation.to_install)?;
        let installed = evaluation.to_install.difference(&still_not_installed);

        let still_not_uninstalled = self.installed_apps(&evaluation.to_uninstall)?;
        let uninstalled = evaluation.to_uninstall.difference(&still_not_uninstalled);

        Ok(AppSummary {
            installed,
            uninstalled,
            still_not_installed,
            still_not_uninstalled,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Condition, ConditionType, Detection, DeploymentId};
    use crate::platform::MockPlatform;

    fn deployment_with_app() -> Deployment {
        let mut deployment = Deployment {
            id: DeploymentId::from("test"),
            ..Deployment::default()
        };
        deployment.apps.insert(
            "agent".into(),
            Application {
                name: "Contoso Agent".to_string(),
                architecture: "x64".to_string(),
                scope: "machine".to_string(),
                product_code: "{AGENT}".to_string(),
                detection: Detection::default(),
            },
        );
        deployment
    }

    #[test]
    fn test_is_installed_uses_registry_view() {
        let deployment = deployment_with_app();
        let platform = MockPlatform::new();
        let engine = AppEngine::with_parts(&deployment, &platform);
        assert!(!engine.is_installed(&"agent".into()).unwrap());

        platform.install_app("x64", "machine", "{AGENT}", "3.1");
        assert!(engine.is_installed(&"agent".into()).unwrap());
    }

    #[test]
    fn test_is_installed_prefers_presence_condition() {
        let mut deployment = deployment_with_app();
        deployment.resources.mutexes.insert(
            "agent-mutex".into(),
            crate::model::MutexResource {
                description: String::new(),
                name: "Agent".to_string(),
                namespace: crate::model::MutexNamespace::Global,
            },
        );
        deployment.conditions.insert(
            "agent-running".into(),
            Condition {
                condition_type: Some(ConditionType::MutexExists),
                subject: "agent-mutex".to_string(),
                ..Condition::default()
            },
        );
        deployment.apps.get_mut(&"agent".into()).unwrap().detection = Detection {
            present: Some("agent-running".into()),
            version: None,
        };

        let platform = MockPlatform::new();
        // The registry says installed, but the condition disagrees and
        // wins.
        platform.install_app("x64", "machine", "{AGENT}", "3.1");
        let engine = AppEngine::with_parts(&deployment, &platform);
        assert!(!engine.is_installed(&"agent".into()).unwrap());

        platform.add_mutex("Global\\Agent");
        assert!(engine.is_installed(&"agent".into()).unwrap());
    }

    #[test]
    fn test_version_from_registry_view() {
        let deployment = deployment_with_app();
        let platform = MockPlatform::new();
        platform.install_app("x64", "machine", "{AGENT}", "3.1");

        let engine = AppEngine::with_parts(&deployment, &platform);
        assert_eq!(engine.version(&"agent".into()).unwrap(), Version::from("3.1"));
    }

    #[test]
    fn test_evaluate_and_summarize_changes() {
        let mut deployment = deployment_with_app();
        deployment.apps.insert(
            "legacy".into(),
            Application {
                name: "Legacy Tool".to_string(),
                architecture: "x64".to_string(),
                scope: "machine".to_string(),
                product_code: "{LEGACY}".to_string(),
                detection: Detection::default(),
            },
        );

        let platform = MockPlatform::new();
        platform.install_app("x64", "machine", "{LEGACY}", "1.0");

        let engine = AppEngine::with_parts(&deployment, &platform);
        let installs: AppList = vec!["agent".into()].into();
        let uninstalls: AppList = vec!["legacy".into()].into();

        let evaluation = engine.evaluate_app_changes(&installs, &uninstalls).unwrap();
        assert!(evaluation.actions_needed());
        assert_eq!(evaluation.to_install, installs);
        assert_eq!(evaluation.to_uninstall, uninstalls);
        assert!(evaluation.already_installed.is_empty());

        // Simulate a command that installed the agent and removed the
        // legacy tool.
        platform.install_app("x64", "machine", "{AGENT}", "3.1");
        platform.uninstall_app("x64", "machine", "{LEGACY}");

        let summary = engine.summarize_app_changes(&evaluation).unwrap();
        assert_eq!(summary.installed, installs);
        assert_eq!(summary.uninstalled, uninstalls);
        assert!(summary.still_not_installed.is_empty());
        assert!(summary.still_not_uninstalled.is_empty());
        assert!(summary.to_error().is_none());
    }

    #[test]
    fn test_summary_reports_shortfalls() {
        let deployment = deployment_with_app();
        let platform = MockPlatform::new();
        let engine = AppEngine::with_parts(&deployment, &platform);

        let installs: AppList = vec!["agent".into()].into();
        let evaluation = engine
            .evaluate_app_changes(&installs, &AppList::new())
            .unwrap();

        // Nothing changed, so the install is still outstanding.
        let summary = engine.summarize_app_changes(&evaluation).unwrap();
        assert_eq!(summary.still_not_installed, installs);
        assert!(summary.to_error().is_some());
    }
}
