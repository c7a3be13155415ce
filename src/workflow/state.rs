use std::collections::{BTreeSet, HashMap};

use parking_lot::Mutex;

use crate::workflow::types::WorkflowStep;

/// Progress of one branch → commit → pull request run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkflowState {
    pub current_issue_number: Option<u64>,
    pub branches_created: BTreeSet<String>,
    pub last_completed_step: WorkflowStep,
}

impl WorkflowState {
    pub fn has_branch(&self, branch: &str) -> bool {
        self.branches_created.contains(branch)
    }

    fn advance(&mut self, step: WorkflowStep) {
        if step > self.last_completed_step {
            self.last_completed_step = step;
        }
    }
}

/// In-memory workflow state per workflow key.
///
/// Keys are independent; the lock is only held for the duration of a single
/// mutation and never across an await point.
#[derive(Default)]
pub struct WorkflowStateTracker {
    states: Mutex<HashMap<String, WorkflowState>>,
}

impl WorkflowStateTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the state for `key`, initializing it if absent.
    pub fn get_state(&self, key: &str) -> WorkflowState {
        self.states
            .lock()
            .entry(key.to_string())
            .or_default()
            .clone()
    }

    pub fn has_branch(&self, key: &str, branch: &str) -> bool {
        self.states
            .lock()
            .get(key)
            .is_some_and(|state| state.has_branch(branch))
    }

    /// Set the issue the workflow is working on. A different number replaces
    /// the previous one; branches created so far are kept.
    pub fn record_issue_number(&self, key: &str, number: u64) {
        let mut states = self.states.lock();
        let state = states.entry(key.to_string()).or_default();

        if let Some(previous) = state.current_issue_number.filter(|n| *n != number) {
            tracing::info!(key, previous, number, "Workflow switched to a new issue");
        }

        state.current_issue_number = Some(number);
        state.advance(WorkflowStep::IssueFetched);
    }

    pub fn record_branch_created(&self, key: &str, branch: &str) {
        let mut states = self.states.lock();
        let state = states.entry(key.to_string()).or_default();
        state.branches_created.insert(branch.to_string());
        state.advance(WorkflowStep::BranchCreated);
    }

    /// Mark a commit on `branch`. Returns false (and records nothing) if the
    /// branch was never created under this key.
    pub fn record_commit_created(&self, key: &str, branch: &str) -> bool {
        self.advance_if_branch(key, branch, WorkflowStep::CommitCreated)
    }

    /// Mark a pull request from `head`. Returns false if `head` is unknown.
    pub fn record_pull_request_created(&self, key: &str, head: &str) -> bool {
        self.advance_if_branch(key, head, WorkflowStep::PrCreated)
    }

    fn advance_if_branch(&self, key: &str, branch: &str, step: WorkflowStep) -> bool {
        let mut states = self.states.lock();
        match states.get_mut(key) {
            Some(state) if state.has_branch(branch) => {
                state.advance(step);
                true
            }
            _ => false,
        }
    }

    pub fn reset(&self, key: &str) {
        if self.states.lock().remove(key).is_some() {
            tracing::info!(key, "Workflow state reset");
        }
    }

    /// Number of keys with tracked state.
    pub fn len(&self) -> usize {
        self.states.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
