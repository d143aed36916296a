// src/platform/mod.rs

//! The platform boundary
//!
//! The concrete OS facilities the engine consumes (process enumeration,
//! named mutex objects, the registry, app registry views and known-folder
//! lookup) live behind the [`Platform`] trait. [`HostPlatform`] provides
//! the portable pieces and reports the rest as unsupported, so that
//! embedders can supply the OS-specific implementations. The scriptable
//! in-memory [`mock::MockPlatform`] backs the test suite.

use std::path::PathBuf;

use crate::error::{Error, Result};
use crate::model::{KnownFolder, RegistryHive};
use crate::value::{Kind, Value};

pub mod mock;

pub use mock::MockPlatform;

/// Information about a running process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessInfo {
    /// The base name of the process executable, e.g. `setup.exe`.
    pub name: String,
}

/// An owned handle to a named OS mutex.
///
/// Handles release the underlying OS object when dropped.
pub trait SystemMutex: Send {
    /// Attempts to acquire the mutex without blocking. Returns false when
    /// another holder owns it.
    fn try_lock(&mut self) -> Result<bool>;

    /// Releases the mutex.
    fn unlock(&mut self) -> Result<()>;
}

/// An open registry key.
pub trait RegistryKey {
    /// The absolute path of the key, for diagnostics.
    fn path(&self) -> &str;

    /// Returns true if the key has a value with the given name.
    fn has_value(&self, name: &str) -> Result<bool>;

    /// Retrieves a value with the requested kind. Returns `None` when the
    /// value does not exist.
    fn get_value(&self, name: &str, kind: Kind) -> Result<Option<Value>>;
}

/// A view of the installed-application registry for one (architecture,
/// scope) pair.
pub trait AppRegistryView {
    /// Returns true if an application with the given product code is
    /// registered.
    fn contains(&self, product_code: &str) -> Result<bool>;

    /// Returns the registered display version for the product code, if
    /// any.
    fn display_version(&self, product_code: &str) -> Result<Option<String>>;
}

/// The OS facilities consumed by the deployment engine.
pub trait Platform: Send + Sync {
    /// Lists the processes currently running on the local system.
    fn list_processes(&self) -> Result<Vec<ProcessInfo>>;

    /// Probes whether a named mutex object currently exists.
    fn mutex_exists(&self, object_name: &str) -> Result<bool>;

    /// Creates or opens a named mutex object.
    fn create_mutex(&self, object_name: &str) -> Result<Box<dyn SystemMutex>>;

    /// Opens a registry key by its path relative to the hive. Returns
    /// `None` when the key does not exist.
    fn open_registry_key(
        &self,
        hive: RegistryHive,
        path: &str,
    ) -> Result<Option<Box<dyn RegistryKey>>>;

    /// Returns the app registry view for the given architecture and
    /// scope.
    fn app_view(&self, architecture: &str, scope: &str) -> Result<Box<dyn AppRegistryView>>;

    /// Retrieves the path of a well-known folder on the local system.
    fn known_folder_path(&self, folder: KnownFolder) -> Result<PathBuf>;
}

/// The host platform.
///
/// Known folders resolve through the environment; the Windows-only
/// facilities report themselves as unsupported and are expected to be
/// supplied by the embedder.
#[derive(Debug, Clone, Default)]
pub struct HostPlatform;

impl HostPlatform {
    pub fn new() -> Self {
        HostPlatform
    }

    fn env_path(name: &str) -> Result<PathBuf> {
        std::env::var_os(name)
            .map(PathBuf::from)
            .ok_or_else(|| Error::Unsupported(format!("the {name} environment variable is not set")))
    }
}

impl Platform for HostPlatform {
    fn list_processes(&self) -> Result<Vec<ProcessInfo>> {
        Err(Error::Unsupported(
            "process enumeration is not available".to_string(),
        ))
    }

    fn mutex_exists(&self, _object_name: &str) -> Result<bool> {
        Err(Error::Unsupported(
            "named mutex objects are not available".to_string(),
        ))
    }

    fn create_mutex(&self, _object_name: &str) -> Result<Box<dyn SystemMutex>> {
        Err(Error::Unsupported(
            "named mutex objects are not available".to_string(),
        ))
    }

    fn open_registry_key(
        &self,
        _hive: RegistryHive,
        _path: &str,
    ) -> Result<Option<Box<dyn RegistryKey>>> {
        Err(Error::Unsupported("the registry is not available".to_string()))
    }

    fn app_view(&self, _architecture: &str, _scope: &str) -> Result<Box<dyn AppRegistryView>> {
        Err(Error::Unsupported(
            "app registry views are not available".to_string(),
        ))
    }

    fn known_folder_path(&self, folder: KnownFolder) -> Result<PathBuf> {
        match folder {
            KnownFolder::ProgramData => Self::env_path("ProgramData")
                .or_else(|_| Self::env_path("PROGRAMDATA")),
            KnownFolder::StartMenu => {
                let base = Self::env_path("ProgramData")
                    .or_else(|_| Self::env_path("PROGRAMDATA"))?;
                Ok(base.join("Microsoft").join("Windows").join("Start Menu"))
            }
            KnownFolder::PublicDesktop => {
                let base = Self::env_path("PUBLIC")?;
                Ok(base.join("Desktop"))
            }
        }
    }
}
