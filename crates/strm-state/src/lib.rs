//! strm-state
//!
//! Reconciliation records and the pass that drives them.
//!
//! A pass takes a starting [`State`], applies requested changes (and the
//! cascades they imply) to a working copy, validates every touched record
//! against read-only backing-store facts, and hands the surviving records'
//! action lists to the execution plan builder.
//!
//! Nothing here mutates the backing store. Only validation performs I/O,
//! through [`BackingStoreFacts`].

mod error;
mod facts;
mod kinds;
mod merge;
mod pass;
mod record;
mod registry;
mod state;

pub use error::{FactsError, ReconcileError, ValidationError};
pub use facts::{
    BackingFacts, BackingKind, BackingStoreFacts, PipelineTargets, ResolvedFacts, UnmanagedAssets,
};
pub use kinds::wired::effective_lifecycle;
pub use pass::{
    plan_delete, plan_upsert, DeploymentFlags, PassContext, PassOutcome, Planned, RecordPlan,
};
pub use record::{
    ChangeStatus, FieldConflict, HandleOutcome, StreamChange, StreamChanges, StreamField,
    StreamRecord, Validation, ValidationResult,
};
pub use registry::{InFlightRegistry, LeaseError, PassLease};
pub use state::State;
