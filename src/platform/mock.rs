// src/platform/mock.rs

//! A scriptable in-memory platform
//!
//! [`MockPlatform`] implements the full [`Platform`] contract against
//! in-memory state, so that the engine can be exercised end to end
//! without OS facilities. Clones share state, which lets tests mutate the
//! simulated system while an engine holds a reference to it.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use super::{AppRegistryView, Platform, ProcessInfo, RegistryKey, SystemMutex};
use crate::error::{Error, Result};
use crate::model::{KnownFolder, RegistryHive};
use crate::value::{Kind, Value};
use crate::version::Version;

#[derive(Debug, Default)]
struct MockState {
    processes: Vec<ProcessInfo>,
    existing_mutexes: HashSet<String>,
    held_mutexes: HashSet<String>,
    registry: HashMap<(RegistryHive, String), BTreeMap<String, Value>>,
    apps: HashMap<(String, String), BTreeMap<String, String>>,
    known_folders: HashMap<KnownFolder, PathBuf>,
}

/// An in-memory platform for tests.
#[derive(Debug, Clone, Default)]
pub struct MockPlatform {
    state: Arc<Mutex<MockState>>,
}

impl MockPlatform {
    pub fn new() -> Self {
        MockPlatform::default()
    }

    /// Adds a running process with the given executable name.
    pub fn add_process(&self, name: &str) {
        self.state.lock().unwrap().processes.push(ProcessInfo {
            name: name.to_string(),
        });
    }

    /// Removes all running processes with the given executable name.
    pub fn remove_process(&self, name: &str) {
        self.state
            .lock()
            .unwrap()
            .processes
            .retain(|p| p.name != name);
    }

    /// Marks a named mutex object as existing on the system.
    pub fn add_mutex(&self, object_name: &str) {
        self.state
            .lock()
            .unwrap()
            .existing_mutexes
            .insert(object_name.to_string());
    }

    /// Removes a named mutex object from the system.
    pub fn remove_mutex(&self, object_name: &str) {
        self.state
            .lock()
            .unwrap()
            .existing_mutexes
            .remove(object_name);
    }

    /// Pretends an external process holds the named mutex.
    pub fn hold_mutex_externally(&self, object_name: &str) {
        let mut state = self.state.lock().unwrap();
        state.existing_mutexes.insert(object_name.to_string());
        state.held_mutexes.insert(object_name.to_string());
    }

    /// Creates a registry key at the given path beneath the hive.
    pub fn create_registry_key(&self, hive: RegistryHive, path: &str) {
        self.state
            .lock()
            .unwrap()
            .registry
            .entry((hive, path.to_string()))
            .or_default();
    }

    /// Sets a registry value, creating the key if needed.
    pub fn set_registry_value(&self, hive: RegistryHive, path: &str, name: &str, value: Value) {
        self.state
            .lock()
            .unwrap()
            .registry
            .entry((hive, path.to_string()))
            .or_default()
            .insert(name.to_string(), value);
    }

    /// Registers an installed application in the app view for the given
    /// architecture and scope.
    pub fn install_app(&self, architecture: &str, scope: &str, product_code: &str, version: &str) {
        self.state
            .lock()
            .unwrap()
            .apps
            .entry((architecture.to_string(), scope.to_string()))
            .or_default()
            .insert(product_code.to_string(), version.to_string());
    }

    /// Removes an installed application from the app view.
    pub fn uninstall_app(&self, architecture: &str, scope: &str, product_code: &str) {
        if let Some(view) = self
            .state
            .lock()
            .unwrap()
            .apps
            .get_mut(&(architecture.to_string(), scope.to_string()))
        {
            view.remove(product_code);
        }
    }

    /// Maps a known folder to a path, typically a temporary directory.
    pub fn set_known_folder(&self, folder: KnownFolder, path: impl Into<PathBuf>) {
        self.state
            .lock()
            .unwrap()
            .known_folders
            .insert(folder, path.into());
    }

    /// Returns true if the named mutex is currently held through this
    /// platform.
    pub fn mutex_is_held(&self, object_name: &str) -> bool {
        self.state.lock().unwrap().held_mutexes.contains(object_name)
    }
}

struct MockMutex {
    state: Arc<Mutex<MockState>>,
    object_name: String,
    owned: bool,
}

impl SystemMutex for MockMutex {
    fn try_lock(&mut self) -> Result<bool> {
        let mut state = self.state.lock().unwrap();
        if state.held_mutexes.contains(&self.object_name) {
            return Ok(false);
        }
        state.held_mutexes.insert(self.object_name.clone());
        self.owned = true;
        Ok(true)
    }

    fn unlock(&mut self) -> Result<()> {
        if self.owned {
            self.state
                .lock()
                .unwrap()
                .held_mutexes
                .remove(&self.object_name);
            self.owned = false;
        }
        Ok(())
    }
}

impl Drop for MockMutex {
    fn drop(&mut self) {
        let _ = self.unlock();
        self.state
            .lock()
            .unwrap()
            .existing_mutexes
            .remove(&self.object_name);
    }
}

struct MockRegistryKey {
    path: String,
    values: BTreeMap<String, Value>,
}

impl RegistryKey for MockRegistryKey {
    fn path(&self) -> &str {
        &self.path
    }

    fn has_value(&self, name: &str) -> Result<bool> {
        Ok(self.values.contains_key(name))
    }

    fn get_value(&self, name: &str, kind: Kind) -> Result<Option<Value>> {
        let Some(stored) = self.values.get(name) else {
            return Ok(None);
        };

        let converted = match (kind, stored) {
            (Kind::Bool, Value::Bool(v)) => Value::Bool(*v),
            (Kind::Bool, Value::String(s)) => {
                let parsed = s.parse::<bool>().map_err(|err| {
                    Error::InvalidConfiguration(format!(
                        "the \"{name}\" registry value is not a boolean: {err}"
                    ))
                })?;
                Value::Bool(parsed)
            }
            (Kind::Int64, Value::Int64(v)) => Value::Int64(*v),
            (Kind::String, Value::String(s)) => Value::String(s.clone()),
            (Kind::Version, Value::Version(v)) => Value::Version(v.clone()),
            (Kind::Version, Value::String(s)) => Value::Version(Version::from(s.as_str())),
            (kind, stored) => {
                return Err(Error::InvalidConfiguration(format!(
                    "the \"{name}\" registry value holds {} data and cannot be read as {kind}",
                    stored.kind()
                )))
            }
        };
        Ok(Some(converted))
    }
}

struct MockAppView {
    apps: BTreeMap<String, String>,
}

impl AppRegistryView for MockAppView {
    fn contains(&self, product_code: &str) -> Result<bool> {
        Ok(self.apps.contains_key(product_code))
    }

    fn display_version(&self, product_code: &str) -> Result<Option<String>> {
        Ok(self.apps.get(product_code).cloned())
    }
}

impl Platform for MockPlatform {
    fn list_processes(&self) -> Result<Vec<ProcessInfo>> {
        Ok(self.state.lock().unwrap().processes.clone())
    }

    fn mutex_exists(&self, object_name: &str) -> Result<bool> {
        let state = self.state.lock().unwrap();
        Ok(state.existing_mutexes.contains(object_name)
            || state.held_mutexes.contains(object_name))
    }

    fn create_mutex(&self, object_name: &str) -> Result<Box<dyn SystemMutex>> {
        self.state
            .lock()
            .unwrap()
            .existing_mutexes
            .insert(object_name.to_string());
        Ok(Box::new(MockMutex {
            state: self.state.clone(),
            object_name: object_name.to_string(),
            owned: false,
        }))
    }

    fn open_registry_key(
        &self,
        hive: RegistryHive,
        path: &str,
    ) -> Result<Option<Box<dyn RegistryKey>>> {
        let state = self.state.lock().unwrap();
        match state.registry.get(&(hive, path.to_string())) {
            Some(values) => Ok(Some(Box::new(MockRegistryKey {
                path: format!("{}\\{}", hive.as_str(), path),
                values: values.clone(),
            }))),
            None => Ok(None),
        }
    }

    fn app_view(&self, architecture: &str, scope: &str) -> Result<Box<dyn AppRegistryView>> {
        let state = self.state.lock().unwrap();
        let apps = state
            .apps
            .get(&(architecture.to_string(), scope.to_string()))
            .cloned()
            .unwrap_or_default();
        Ok(Box::new(MockAppView { apps }))
    }

    fn known_folder_path(&self, folder: KnownFolder) -> Result<PathBuf> {
        self.state
            .lock()
            .unwrap()
            .known_folders
            .get(&folder)
            .cloned()
            .ok_or_else(|| {
                Error::Unsupported(format!(
                    "the \"{}\" known folder has not been configured",
                    folder.id()
                ))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_process_listing() {
        let platform = MockPlatform::new();
        platform.add_process("setup.exe");
        platform.add_process("agent.exe");
        assert_eq!(platform.list_processes().unwrap().len(), 2);
        platform.remove_process("setup.exe");
        assert_eq!(platform.list_processes().unwrap().len(), 1);
    }

    #[test]
    fn test_mutex_existence_and_locking() {
        let platform = MockPlatform::new();
        assert!(!platform.mutex_exists("Global\\Setup").unwrap());

        let mut mutex = platform.create_mutex("Global\\Setup").unwrap();
        assert!(platform.mutex_exists("Global\\Setup").unwrap());
        assert!(mutex.try_lock().unwrap());
        assert!(platform.mutex_is_held("Global\\Setup"));

        mutex.unlock().unwrap();
        assert!(!platform.mutex_is_held("Global\\Setup"));

        drop(mutex);
        assert!(!platform.mutex_exists("Global\\Setup").unwrap());
    }

    #[test]
    fn test_externally_held_mutex_blocks_locking() {
        let platform = MockPlatform::new();
        platform.hold_mutex_externally("Global\\Setup");
        let mut mutex = platform.create_mutex("Global\\Setup").unwrap();
        assert!(!mutex.try_lock().unwrap());
    }

    #[test]
    fn test_registry_values_convert_by_kind() {
        let platform = MockPlatform::new();
        platform.set_registry_value(
            RegistryHive::LocalMachine,
            "SOFTWARE\\Contoso",
            "Version",
            Value::String("1.2.3".to_string()),
        );

        let key = platform
            .open_registry_key(RegistryHive::LocalMachine, "SOFTWARE\\Contoso")
            .unwrap()
            .unwrap();
        assert!(key.has_value("Version").unwrap());
        let value = key.get_value("Version", Kind::Version).unwrap().unwrap();
        assert_eq!(value, Value::Version(Version::from("1.2.3")));
        assert!(key.get_value("Missing", Kind::String).unwrap().is_none());
    }

    #[test]
    fn test_missing_registry_key_opens_as_none() {
        let platform = MockPlatform::new();
        assert!(platform
            .open_registry_key(RegistryHive::LocalMachine, "SOFTWARE\\Absent")
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_app_views_are_scoped() {
        let platform = MockPlatform::new();
        platform.install_app("x64", "machine", "{A1}", "2.0");

        let machine = platform.app_view("x64", "machine").unwrap();
        assert!(machine.contains("{A1}").unwrap());
        assert_eq!(
            machine.display_version("{A1}").unwrap(),
            Some("2.0".to_string())
        );

        let user = platform.app_view("x64", "user").unwrap();
        assert!(!user.contains("{A1}").unwrap());
    }
}
