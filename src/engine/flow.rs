// src/engine/flow.rs

//! The flow orchestrator
//!
//! Runs one flow end to end: cancellation and cycle checks, precondition
//! evaluation, lock-group acquisition, behavior overlay, and the ordered
//! action walk. Locks and the active-flow marker unwind on every exit
//! path.

use super::action::ActionEngine;
use super::condition::ConditionEngine;
use super::state::EngineState;
use super::EngineContext;
use crate::error::{Error, Result};
use crate::events::{
    FlowAlreadyRunning, FlowCondition, FlowLockNotAcquired, FlowStarted, FlowStopped,
};
use crate::model::{overlay_behavior, ConditionList, Flow, FlowId, LockId, OnError};

/// Executes a flow within a deployment.
pub(crate) struct FlowEngine<'a, 'ctx> {
    ctx: &'a EngineContext<'ctx>,
    flow_id: &'a FlowId,
    flow: &'a Flow,
}

impl<'a, 'ctx> FlowEngine<'a, 'ctx> {
    /// Looks up the named flow within the deployment.
    pub fn new(ctx: &'a EngineContext<'ctx>, flow_id: &'a FlowId) -> Result<Self> {
        let flow = ctx.deployment.flows.get(flow_id).ok_or_else(|| {
            Error::Flow(format!(
                "the flow \"{flow_id}\" does not exist within the \"{}\" deployment",
                ctx.deployment.id
            ))
        })?;
        Ok(FlowEngine { ctx, flow_id, flow })
    }

    pub fn invoke(&self, state: &mut EngineState) -> Result<()> {
        self.ctx.cancel.check()?;

        // A flow that is already on the invocation stack indicates a
        // cycle in the flow logic.
        if state.active_flows.contains(self.flow_id) {
            self.ctx.events.emit(FlowAlreadyRunning {
                deployment: self.ctx.deployment.id.clone(),
                flow: self.flow_id.clone(),
            });
            return Err(Error::Flow(format!(
                "the \"{}\" flow is already running",
                self.flow_id
            )));
        }

        self.evaluate_preconditions()?;

        // Attempt to acquire all of the locks required for this flow.
        // Locks are reentrant, so a nested flow may redeclare a lock its
        // parent already holds.
        let lock_group = if self.flow.locks.is_empty() {
            None
        } else {
            Some(self.acquire_locks(state, &self.flow.locks)?)
        };

        let behavior = overlay_behavior(&[self.ctx.deployment.behavior, self.flow.behavior]);

        state.active_flows.insert(self.flow_id.clone());

        self.ctx.events.emit(FlowStarted {
            deployment: self.ctx.deployment.id.clone(),
            flow: self.flow_id.clone(),
        });
        let started = chrono::Local::now();

        // Execute each action in order, collecting errors. Cancellation
        // always stops the walk regardless of the on-error behavior.
        let mut errs: Vec<Error> = Vec::new();
        for (index, action) in self.flow.actions.iter().enumerate() {
            if let Err(err) = self.ctx.cancel.check() {
                errs.push(err);
                break;
            }

            let engine = ActionEngine {
                ctx: self.ctx,
                flow: self.flow_id,
                index,
                action,
            };

            if let Err(err) = engine.invoke(state) {
                let cancelled = err.is_cancelled();
                errs.push(err);
                if behavior.on_error != OnError::Continue || cancelled {
                    break;
                }
            }
        }
        let result = match Error::join(errs) {
            Some(err) => Err(err),
            None => Ok(()),
        };

        let stopped = chrono::Local::now();

        state.active_flows.remove(self.flow_id);

        self.ctx.events.emit(FlowStopped {
            deployment: self.ctx.deployment.id.clone(),
            flow: self.flow_id.clone(),
            started,
            stopped,
            error: result.as_ref().err().map(|err| err.to_string()),
        });

        if let Some(group) = lock_group {
            state.locks.unlock_group(&group);
        }

        result
    }

    /// Evaluates the flow's preconditions in declaration order, emitting
    /// a single aggregated event with the passed and failed conditions.
    fn evaluate_preconditions(&self) -> Result<()> {
        if self.flow.preconditions.is_empty() {
            return Ok(());
        }

        let engine = ConditionEngine::new(self.ctx);
        let mut passed = ConditionList::new();
        let mut failed = ConditionList::new();

        for (i, condition) in self.flow.preconditions.iter().enumerate() {
            match engine.evaluate(condition) {
                Ok(true) => passed.push(condition.clone()),
                Ok(false) => failed.push(condition.clone()),
                Err(err) => {
                    self.ctx.events.emit(FlowCondition {
                        deployment: self.ctx.deployment.id.clone(),
                        flow: self.flow_id.clone(),
                        passed: ConditionList::new(),
                        failed: ConditionList::new(),
                        error: Some(err.to_string()),
                    });
                    return Err(Error::Flow(format!(
                        "the \"{}\" flow failed to evaluate precondition {}: {err}",
                        self.flow_id,
                        i + 1
                    )));
                }
            }
        }

        self.ctx.events.emit(FlowCondition {
            deployment: self.ctx.deployment.id.clone(),
            flow: self.flow_id.clone(),
            passed,
            failed: failed.clone(),
            error: None,
        });

        if !failed.is_empty() {
            return Err(Error::Flow(format!(
                "the \"{}\" flow is unable to run because one or more preconditions failed: {failed}",
                self.flow_id
            )));
        }

        Ok(())
    }

    /// Builds the lock group and attempts to lock all of its members,
    /// emitting a lock event and failing the flow when any member cannot
    /// be acquired.
    fn acquire_locks(
        &self,
        state: &mut EngineState,
        locks: &[LockId],
    ) -> Result<super::lock::LockGroup> {
        let group = state
            .locks
            .create(&self.ctx.deployment.resources, self.ctx.platform, locks)
            .map_err(|err| {
                Error::Flow(format!(
                    "the \"{}\" flow failed to prepare its lock group: {err}",
                    self.flow_id
                ))
            })?;

        if let Err(err) = state.locks.lock_group(&group) {
            let lock = match &err {
                Error::Lock(lock_err) => lock_err.lock.clone(),
                _ => LockId::default(),
            };
            self.ctx.events.emit(FlowLockNotAcquired {
                deployment: self.ctx.deployment.id.clone(),
                flow: self.flow_id.clone(),
                lock,
                error: Some(err.to_string()),
            });
            return Err(Error::Flow(format!(
                "the \"{}\" flow failed to acquire locks for its entire lock group: {err}",
                self.flow_id
            )));
        }

        Ok(group)
    }
}
