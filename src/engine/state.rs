// src/engine/state.rs

//! Per-invocation engine state
//!
//! One invocation owns one state. Subflows share it by reference, which
//! is how nested flows reuse verified package files, extracted archives
//! and already-created locks. Everything here is released when the
//! invocation finishes.

use std::collections::{HashMap, HashSet};

use super::lock::LockManager;
use crate::fs::staging::PackageDir;
use crate::fs::temp::ExtractionDir;
use crate::model::{FlowId, PackageId};

/// The state of one deployment invocation.
pub(crate) struct EngineState {
    /// Flows currently on the invocation stack, for cycle detection.
    pub active_flows: HashSet<FlowId>,
    /// Staging directories holding package files that have already been
    /// downloaded and verified during this invocation.
    pub verified_packages: HashMap<PackageId, PackageDir>,
    /// Temporary directories holding extracted archive packages.
    pub extracted_packages: HashMap<PackageId, ExtractionDir>,
    /// The process-wide named-lock table.
    pub locks: LockManager,
}

impl EngineState {
    pub fn new() -> Self {
        EngineState {
            active_flows: HashSet::new(),
            verified_packages: HashMap::new(),
            extracted_packages: HashMap::new(),
            locks: LockManager::new(),
        }
    }

    /// Releases every resource held by the state: extracted archives are
    /// deleted, staged package directories are closed, and all locks are
    /// released.
    pub fn teardown(&mut self) {
        self.extracted_packages.clear();
        self.verified_packages.clear();
        self.locks.close_all();
    }
}
