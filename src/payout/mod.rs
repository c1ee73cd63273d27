pub mod engine;
pub mod planner;
pub mod pipeline;

pub use engine::{IdentityGroup, PayReport, PayoutEngine, SkipReason};
pub use planner::{plan, Batch, PayoutOperation, PlanOutcome};
pub use pipeline::{OperationOutcome, OperationResult, SubmissionPipeline, SubmissionState};
