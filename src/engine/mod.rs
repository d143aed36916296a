// src/engine/mod.rs

//! The deployment engine
//!
//! [`DeploymentEngine`] drives a single invocation of one flow within a
//! deployment. The flow orchestrator evaluates preconditions through the
//! condition engine, acquires locks through the lock manager, then walks
//! the flow's actions, dispatching each to the package, command, file or
//! nested-flow machinery. Everything significant emits an event through
//! the recorder.

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::events::Recorder;
use crate::http::HttpClient;
use crate::model::{Deployment, FlowId};
use crate::platform::Platform;
use crate::util::CancellationToken;

mod action;
mod app;
mod command;
mod condition;
mod download;
mod extraction;
mod file;
mod flow;
mod lock;
mod package;
mod process;
mod state;
mod verifier;

pub use app::AppEngine;
pub use condition::ConditionEngine;
pub use process::number_of_running_processes;
pub use verifier::FileVerifier;

use state::EngineState;

/// Options for a deployment engine.
pub struct Options {
    /// The event recorder. A default recorder drops all events.
    pub events: Recorder,
    /// Runs commands even when their declared app changes are already in
    /// effect.
    pub force: bool,
    /// The OS facilities to run against.
    pub platform: Arc<dyn Platform>,
    /// The HTTP client used for package downloads.
    pub http: Arc<dyn HttpClient>,
    /// The cancellation token observed throughout the invocation.
    pub cancel: CancellationToken,
}

/// Shared, immutable context threaded through the engines of one
/// invocation.
pub(crate) struct EngineContext<'a> {
    pub deployment: &'a Deployment,
    pub events: &'a Recorder,
    pub platform: &'a dyn Platform,
    pub http: &'a dyn HttpClient,
    pub cancel: &'a CancellationToken,
    pub force: bool,
}

/// Invokes flows within a deployment.
pub struct DeploymentEngine {
    deployment: Deployment,
    events: Recorder,
    force: bool,
    platform: Arc<dyn Platform>,
    http: Arc<dyn HttpClient>,
    cancel: CancellationToken,
}

impl DeploymentEngine {
    pub fn new(deployment: Deployment, options: Options) -> Self {
        DeploymentEngine {
            deployment,
            events: options.events,
            force: options.force,
            platform: options.platform,
            http: options.http,
            cancel: options.cancel,
        }
    }

    /// Executes the named flow end to end.
    ///
    /// All per-invocation resources (verified package directories,
    /// extraction directories and locks) are released on every exit path.
    pub fn invoke(&self, flow: &FlowId) -> Result<()> {
        self.deployment.validate()?;

        if !self.deployment.flows.contains_key(flow) {
            return Err(Error::Flow(format!(
                "the flow \"{flow}\" does not exist within the \"{}\" deployment",
                self.deployment.id
            )));
        }

        let ctx = EngineContext {
            deployment: &self.deployment,
            events: &self.events,
            platform: self.platform.as_ref(),
            http: self.http.as_ref(),
            cancel: &self.cancel,
            force: self.force,
        };

        let mut state = EngineState::new();
        let result = flow::FlowEngine::new(&ctx, flow).and_then(|engine| engine.invoke(&mut state));
        state.teardown();
        result
    }
}
