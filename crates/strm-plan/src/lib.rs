//! strm-plan
//!
//! External mutation actions and the execution plan builder.
//!
//! Records emit [`MutationAction`]s independently; [`build_execution_plan`]
//! merges them into one ordered, deduplicated sequence:
//! - resource kinds are ordered by a fixed dependency table ([`tier_order`]),
//! - actions against a shared pipeline are folded to one net action per
//!   `(pipeline, reference_pipeline)`,
//! - identical actions collapse to their first occurrence.
//!
//! Deterministic, pure logic. No IO. Application is the applier's job.

mod actions;
mod builder;
mod order;

pub use actions::{ActionKind, MutationAction, PipelineProcessor};
pub use builder::{build_execution_plan, ExecutionPlan};
pub use order::tier_order;
