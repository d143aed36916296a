// src/model/app.rs

//! Applications and app-change bookkeeping
//!
//! Applications identify software that commands install or uninstall.
//! Before a command runs, the engine evaluates which of the declared
//! changes are still needed; after the command finishes, it summarizes
//! which changes actually took effect.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::condition::ConditionId;
use super::identifier;
use super::registry::RegistryValueId;
use crate::error::Error;

identifier! {
    /// A unique identifier for an application.
    AppId
}

/// Identifying information for an application.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Application {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub architecture: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub scope: String,
    #[serde(rename = "product-code", skip_serializing_if = "String::is_empty")]
    pub product_code: String,
    #[serde(skip_serializing_if = "Detection::is_empty")]
    pub detection: Detection,
}

/// Optional overrides for how an application's presence and version are
/// detected. When absent, detection falls back to the app registry view
/// selected by the application's architecture and scope.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Detection {
    /// A condition that is true when the application is present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub present: Option<ConditionId>,
    /// A registry value holding the installed version.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<RegistryValueId>,
}

impl Detection {
    pub fn is_empty(&self) -> bool {
        self.present.is_none() && self.version.is_none()
    }
}

/// An ordered list of application identifiers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AppList(Vec<AppId>);

impl AppList {
    pub fn new() -> Self {
        AppList(Vec::new())
    }

    pub fn push(&mut self, app: AppId) {
        self.0.push(app);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, app: &AppId) -> bool {
        self.0.contains(app)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, AppId> {
        self.0.iter()
    }

    /// Returns the members of this list that are not present in `other`,
    /// preserving order.
    pub fn difference(&self, other: &AppList) -> AppList {
        AppList(
            self.0
                .iter()
                .filter(|app| !other.contains(app))
                .cloned()
                .collect(),
        )
    }
}

impl fmt::Display for AppList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, app) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            f.write_str(app.as_str())?;
        }
        Ok(())
    }
}

impl From<Vec<AppId>> for AppList {
    fn from(apps: Vec<AppId>) -> Self {
        AppList(apps)
    }
}

impl FromIterator<AppId> for AppList {
    fn from_iter<T: IntoIterator<Item = AppId>>(iter: T) -> Self {
        AppList(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a AppList {
    type Item = &'a AppId;
    type IntoIter = std::slice::Iter<'a, AppId>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// The changes needed to effect a command's declared installs and
/// uninstalls, evaluated before the command runs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppEvaluation {
    pub already_installed: AppList,
    pub already_uninstalled: AppList,
    pub to_install: AppList,
    pub to_uninstall: AppList,
}

impl AppEvaluation {
    /// Returns true if the command still has installs or uninstalls to
    /// perform.
    pub fn actions_needed(&self) -> bool {
        !self.to_install.is_empty() || !self.to_uninstall.is_empty()
    }

    pub fn is_zero(&self) -> bool {
        self.already_installed.is_empty()
            && self.already_uninstalled.is_empty()
            && self.to_install.is_empty()
            && self.to_uninstall.is_empty()
    }
}

/// The effectiveness of a command's application changes, summarized after
/// the command has run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppSummary {
    pub installed: AppList,
    pub uninstalled: AppList,
    pub still_not_installed: AppList,
    pub still_not_uninstalled: AppList,
}

impl AppSummary {
    pub fn is_zero(&self) -> bool {
        self.installed.is_empty()
            && self.uninstalled.is_empty()
            && self.still_not_installed.is_empty()
            && self.still_not_uninstalled.is_empty()
    }

    /// Returns an error if any of the anticipated changes did not take
    /// effect.
    pub fn to_error(&self) -> Option<Error> {
        match (
            self.still_not_installed.is_empty(),
            self.still_not_uninstalled.is_empty(),
        ) {
            (true, true) => None,
            (false, true) => Some(Error::AppChanges(format!(
                "the command was expected to install applications that are still not installed: {}",
                self.still_not_installed
            ))),
            (true, false) => Some(Error::AppChanges(format!(
                "the command was expected to uninstall applications that are still not uninstalled: {}",
                self.still_not_uninstalled
            ))),
            (false, false) => Some(Error::AppChanges(format!(
                "the command was expected to install and uninstall applications that are still unchanged: installs [{}], uninstalls [{}]",
                self.still_not_installed, self.still_not_uninstalled
            ))),
        }
    }
}
