//! Per-kind behaviour.
//!
//! Each kind module exposes pure functions over its own typed definition.
//! The dispatchers below match exhaustively on [`StreamDefinition`], so a
//! new kind fails to compile until every operation handles it.

use strm_plan::{MutationAction, PipelineProcessor};
use strm_schemas::{Lifecycle, ProcessingStep, StreamDefinition};

use crate::facts::ResolvedFacts;
use crate::record::{StreamChange, StreamChanges, StreamRecord, Validation};
use crate::{PassContext, ReconcileError, State};

pub(crate) mod classic;
pub(crate) mod wired;

pub(crate) fn change_flags(
    def: &StreamDefinition,
    starting: Option<&StreamDefinition>,
    desired_state: &State,
    starting_state: &State,
) -> StreamChanges {
    match def {
        StreamDefinition::Classic(def) => classic::change_flags(def, starting),
        StreamDefinition::Wired(def) => {
            wired::change_flags(def, starting, desired_state, starting_state)
        }
    }
}

pub(crate) fn upsert_cascades(
    record: &StreamRecord,
    starting: Option<&StreamDefinition>,
    desired_state: &State,
) -> Vec<StreamChange> {
    match record.definition() {
        StreamDefinition::Classic(_) => Vec::new(),
        StreamDefinition::Wired(def) => {
            wired::upsert_cascades(record, def, starting, desired_state)
        }
    }
}

pub(crate) fn delete_cascades(record: &StreamRecord, desired_state: &State) -> Vec<StreamChange> {
    match record.definition() {
        StreamDefinition::Classic(_) => Vec::new(),
        StreamDefinition::Wired(def) => wired::delete_cascades(def, desired_state),
    }
}

pub(crate) fn validate_upsertion(
    record: &StreamRecord,
    desired_state: &State,
    starting_state: &State,
    ctx: &PassContext<'_>,
) -> Result<Validation, ReconcileError> {
    match record.definition() {
        StreamDefinition::Classic(def) => classic::validate_upsertion(record, def, ctx),
        StreamDefinition::Wired(def) => {
            wired::validate_upsertion(def, desired_state, starting_state, ctx)
        }
    }
}

pub(crate) fn validate_deletion(
    record: &StreamRecord,
    ctx: &PassContext<'_>,
) -> Result<Validation, ReconcileError> {
    match record.definition() {
        StreamDefinition::Classic(def) => classic::validate_deletion(def, ctx),
        StreamDefinition::Wired(def) => Ok(wired::validate_deletion(def)),
    }
}

pub(crate) fn create_actions(
    record: &StreamRecord,
    facts: &ResolvedFacts,
    desired_state: &State,
) -> Vec<MutationAction> {
    match record.definition() {
        StreamDefinition::Classic(def) => classic::create_actions(record, def, facts),
        StreamDefinition::Wired(def) => wired::create_actions(record, def, desired_state),
    }
}

pub(crate) fn update_actions(
    record: &StreamRecord,
    facts: &ResolvedFacts,
    desired_state: &State,
) -> Vec<MutationAction> {
    match record.definition() {
        StreamDefinition::Classic(def) => classic::update_actions(record, def, facts),
        StreamDefinition::Wired(def) => wired::update_actions(record, def, desired_state),
    }
}

pub(crate) fn delete_actions(record: &StreamRecord, facts: &ResolvedFacts) -> Vec<MutationAction> {
    match record.definition() {
        StreamDefinition::Classic(def) => classic::delete_actions(def, facts),
        StreamDefinition::Wired(def) => wired::delete_actions(&def.name),
    }
}

pub(crate) fn step_processors(steps: &[ProcessingStep]) -> Vec<PipelineProcessor> {
    steps
        .iter()
        .map(|step| PipelineProcessor {
            processor: step.processor.clone(),
            options: step.options.clone(),
            condition: step.condition.clone(),
            tag: step.id.clone(),
        })
        .collect()
}

/// Deployment-mode check shared by every kind.
pub(crate) fn lifecycle_allowed(lifecycle: &Lifecycle, ctx: &PassContext<'_>) -> bool {
    !(ctx.flags.restricted_lifecycle_types && lifecycle.is_ilm())
}
