pub mod enforcer;
pub mod state;
pub mod types;

pub use enforcer::WorkflowEnforcer;
pub use state::{WorkflowState, WorkflowStateTracker};
pub use types::{CallOutcome, FunctionCall, FunctionCallRecord, WorkflowStep};
