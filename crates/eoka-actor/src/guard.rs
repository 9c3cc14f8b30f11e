//! At-most-once execution of assistant-issued actions.
//!
//! An assistant message can be rendered (and its actions observed) many
//! times. [`DispatchGuard`] tracks every [`ActionId`] through
//! pending → executing → completed and skips anything already past
//! pending. Completion is terminal: a failed action is logged and never
//! retried.
//!
//! The guard does not serialize distinct actions. Callers that care about
//! ordering await one action before issuing the next, which is what
//! [`DispatchGuard::run_message`] does for the actions of one message.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, warn};

use crate::action::ActionRequest;
use crate::actor::{ActionReport, Actor};
use crate::dom::Dom;
use crate::Result;

/// Identity of one action: owning message and position within it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionId {
    pub message_id: String,
    pub index: usize,
}

impl ActionId {
    pub fn new(message_id: impl Into<String>, index: usize) -> Self {
        Self {
            message_id: message_id.into(),
            index,
        }
    }
}

impl fmt::Display for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.message_id, self.index)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionState {
    Pending,
    Executing,
    Completed,
}

/// Result of [`DispatchGuard::dispatch`].
#[derive(Debug)]
pub enum Dispatch<T> {
    /// This call ran the action.
    Ran(Result<T>),
    /// Already executing or completed; nothing ran.
    Skipped(ActionState),
}

impl<T> Dispatch<T> {
    pub fn ran(&self) -> bool {
        matches!(self, Self::Ran(_))
    }

    pub fn into_result(self) -> Option<Result<T>> {
        match self {
            Self::Ran(r) => Some(r),
            Self::Skipped(_) => None,
        }
    }
}

/// Shared action ledger. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct DispatchGuard {
    states: Arc<Mutex<HashMap<ActionId, ActionState>>>,
}

/// Marks the action completed when dropped, including when the dispatching
/// future is cancelled mid-flight.
struct Completion<'a> {
    guard: &'a DispatchGuard,
    id: &'a ActionId,
}

impl Drop for Completion<'_> {
    fn drop(&mut self) {
        self.guard
            .states()
            .insert(self.id.clone(), ActionState::Completed);
    }
}

impl DispatchGuard {
    pub fn new() -> Self {
        Self::default()
    }

    fn states(&self) -> MutexGuard<'_, HashMap<ActionId, ActionState>> {
        self.states.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register an action as seen. Returns its current state.
    pub fn observe(&self, id: &ActionId) -> ActionState {
        *self
            .states()
            .entry(id.clone())
            .or_insert(ActionState::Pending)
    }

    pub fn state(&self, id: &ActionId) -> Option<ActionState> {
        self.states().get(id).copied()
    }

    /// Number of actions in the given state.
    pub fn count(&self, state: ActionState) -> usize {
        self.states().values().filter(|s| **s == state).count()
    }

    /// Claim `id` for execution. Fails with the current state if taken.
    fn begin(&self, id: &ActionId) -> std::result::Result<(), ActionState> {
        let mut states = self.states();
        match states.get(id).copied() {
            Some(taken @ (ActionState::Executing | ActionState::Completed)) => Err(taken),
            _ => {
                states.insert(id.clone(), ActionState::Executing);
                Ok(())
            }
        }
    }

    /// Run `action` unless `id` is already executing or completed.
    ///
    /// `action` is not polled at all when skipped.
    pub async fn dispatch<T, F>(&self, id: ActionId, action: F) -> Dispatch<T>
    where
        F: Future<Output = Result<T>>,
    {
        if let Err(state) = self.begin(&id) {
            debug!("skip {}: already {:?}", id, state);
            return Dispatch::Skipped(state);
        }

        let _done = Completion {
            guard: self,
            id: &id,
        };
        let result = action.await;
        if let Err(ref e) = result {
            warn!("action {} failed: {}", id, e);
        }
        Dispatch::Ran(result)
    }

    /// Execute the actions of one message in order, each awaited before the
    /// next starts. Failures do not stop the remaining actions.
    pub async fn run_message<D: Dom>(
        &self,
        actor: &Actor<D>,
        message_id: &str,
        requests: &[ActionRequest],
    ) -> Vec<Dispatch<ActionReport>> {
        let mut out = Vec::with_capacity(requests.len());
        for (index, request) in requests.iter().enumerate() {
            let id = ActionId::new(message_id, index);
            out.push(self.dispatch(id, actor.execute(request)).await);
        }
        out
    }

    /// Forget every identity, as for a fresh conversation render.
    pub fn reset(&self) {
        self.states().clear();
    }
}
