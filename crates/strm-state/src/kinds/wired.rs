//! Wired streams: fully managed streams in a dotted name hierarchy.
//!
//! A wired stream owns its layer component template, index template,
//! processing pipeline and data stream. Parents route documents to direct
//! children through reroute processors appended to the parent's pipeline.

use std::collections::BTreeSet;

use strm_plan::{MutationAction, PipelineProcessor};
use strm_schemas::{
    is_direct_child, is_root, layer_component_template_name, parent_name,
    processing_pipeline_name, Lifecycle, RoutingRule, StreamDefinition, StreamKind,
    WiredDefinition,
};

use super::{lifecycle_allowed, step_processors};
use crate::facts::{BackingKind, ResolvedFacts};
use crate::record::{StreamChange, StreamChanges, StreamRecord, Validation};
use crate::{FactsError, PassContext, ReconcileError, State, ValidationError};

fn live_wired<'s>(state: &'s State, name: &str) -> Option<&'s WiredDefinition> {
    state.live(name).and_then(|r| r.definition().as_wired())
}

/// Resolve `Inherit` to the nearest ancestor's own lifecycle.
///
/// Stays `Inherit` only when no live ancestor sets one, which validation
/// rules out for a well-formed tree.
pub fn effective_lifecycle(name: &str, own: &Lifecycle, state: &State) -> Lifecycle {
    if !own.is_inherit() {
        return own.clone();
    }
    let mut cursor = parent_name(name);
    while let Some(ancestor) = cursor {
        if let Some(def) = live_wired(state, ancestor) {
            if !def.lifecycle.is_inherit() {
                return def.lifecycle.clone();
            }
        }
        cursor = parent_name(ancestor);
    }
    Lifecycle::Inherit
}

pub(crate) fn change_flags(
    def: &WiredDefinition,
    starting: Option<&StreamDefinition>,
    desired_state: &State,
    starting_state: &State,
) -> StreamChanges {
    let Some(prev) = starting.and_then(StreamDefinition::as_wired) else {
        return StreamChanges::all();
    };

    StreamChanges {
        processing: def.processing != prev.processing,
        routing: def.routing != prev.routing,
        fields: def.fields != prev.fields,
        lifecycle: effective_lifecycle(&def.name, &def.lifecycle, desired_state)
            != effective_lifecycle(&prev.name, &prev.lifecycle, starting_state),
    }
}

pub(crate) fn upsert_cascades(
    record: &StreamRecord,
    def: &WiredDefinition,
    starting: Option<&StreamDefinition>,
    desired_state: &State,
) -> Vec<StreamChange> {
    let mut cascades = Vec::new();

    // New routing destinations become default children.
    for rule in &def.routing {
        if desired_state.live(&rule.destination).is_none() {
            cascades.push(StreamChange::Upsert(
                WiredDefinition::child(rule.destination.clone()).into(),
            ));
        }
    }

    // Dropped destinations are deleted with their subtree.
    if let Some(prev) = starting.and_then(StreamDefinition::as_wired) {
        for rule in &prev.routing {
            if !def.routes_to(&rule.destination) && desired_state.live(&rule.destination).is_some()
            {
                cascades.push(StreamChange::Delete(rule.destination.clone()));
            }
        }
    }

    if let Some(parent) = parent_name(&def.name) {
        match desired_state.live(parent).map(StreamRecord::definition) {
            None => {
                let mut created = WiredDefinition::child(parent);
                created.routing.push(RoutingRule::disabled(def.name.clone()));
                cascades.push(StreamChange::Upsert(created.into()));
            }
            Some(StreamDefinition::Wired(existing)) if !existing.routes_to(&def.name) => {
                let mut updated = existing.clone();
                updated.routing.push(RoutingRule::disabled(def.name.clone()));
                cascades.push(StreamChange::Upsert(updated.into()));
            }
            Some(_) => {}
        }
    }

    // Inheriting children re-resolve their effective lifecycle.
    if record.changes().lifecycle {
        for rule in &def.routing {
            if let Some(child) = live_wired(desired_state, &rule.destination) {
                if child.lifecycle.is_inherit() {
                    cascades.push(StreamChange::Upsert(child.clone().into()));
                }
            }
        }
    }

    cascades
}

pub(crate) fn delete_cascades(def: &WiredDefinition, desired_state: &State) -> Vec<StreamChange> {
    // Root deletion never validates; its subtree stays.
    if is_root(&def.name) {
        return Vec::new();
    }
    let mut cascades: Vec<StreamChange> = def
        .routing
        .iter()
        .filter(|rule| desired_state.live(&rule.destination).is_some())
        .map(|rule| StreamChange::Delete(rule.destination.clone()))
        .collect();

    if let Some(parent) = parent_name(&def.name).and_then(|p| live_wired(desired_state, p)) {
        if parent.routes_to(&def.name) {
            let mut updated = parent.clone();
            updated.routing.retain(|rule| rule.destination != def.name);
            cascades.push(StreamChange::Upsert(updated.into()));
        }
    }

    cascades
}

pub(crate) fn validate_upsertion(
    def: &WiredDefinition,
    desired_state: &State,
    starting_state: &State,
    ctx: &PassContext<'_>,
) -> Result<Validation, ReconcileError> {
    let stream = || def.name.clone();
    let mut errors = Vec::new();

    if !lifecycle_allowed(&def.lifecycle, ctx) {
        errors.push(ValidationError::RestrictedLifecycle { stream: stream() });
    }
    if is_root(&def.name) && def.lifecycle.is_inherit() {
        errors.push(ValidationError::InheritOnRoot { stream: stream() });
    }

    let mut seen = BTreeSet::new();
    for rule in &def.routing {
        if !is_direct_child(&def.name, &rule.destination) {
            errors.push(ValidationError::InvalidRoutingDestination {
                stream: stream(),
                destination: rule.destination.clone(),
            });
        }
        if !seen.insert(rule.destination.as_str()) {
            errors.push(ValidationError::DuplicateRoutingDestination {
                stream: stream(),
                destination: rule.destination.clone(),
            });
        }
    }

    if let Some(parent) = parent_name(&def.name) {
        let parent_is_wired = desired_state
            .live(parent)
            .is_some_and(|r| r.kind() == StreamKind::Wired);
        if !parent_is_wired {
            errors.push(ValidationError::InvalidParent {
                stream: stream(),
                parent: parent.to_string(),
            });
        }
    }

    if !starting_state.contains(&def.name) {
        match ctx.facts.get_data_stream(&def.name) {
            Ok(existing) if existing.kind == BackingKind::PlainIndex => {
                errors.push(ValidationError::ExistingIndex { stream: stream() });
            }
            Ok(_) | Err(FactsError::NotFound) => {}
            Err(e) => return Err(ReconcileError::read_failure(&def.name, e)),
        }
    }

    Ok(Validation::new(errors, ResolvedFacts::default()))
}

pub(crate) fn validate_deletion(def: &WiredDefinition) -> Validation {
    let mut errors = Vec::new();
    if is_root(&def.name) {
        errors.push(ValidationError::RootDeletion {
            stream: def.name.clone(),
        });
    }
    Validation::new(errors, ResolvedFacts::default())
}

fn pipeline_action(def: &WiredDefinition) -> MutationAction {
    let mut processors = step_processors(&def.processing);
    processors.extend(def.routing.iter().filter(|r| r.enabled).map(|rule| {
        PipelineProcessor {
            processor: "reroute".into(),
            options: [("destination".to_string(), rule.destination.clone())].into(),
            condition: Some(rule.condition.clone()),
            tag: rule.destination.clone(),
        }
    }));
    MutationAction::UpsertIngestPipeline {
        name: processing_pipeline_name(&def.name),
        stream: def.name.clone(),
        processors,
    }
}

fn lifecycle_action(def: &WiredDefinition, desired_state: &State) -> Option<MutationAction> {
    let lifecycle = effective_lifecycle(&def.name, &def.lifecycle, desired_state);
    (!lifecycle.is_inherit()).then(|| MutationAction::UpdateLifecycle {
        name: def.name.clone(),
        lifecycle,
    })
}

pub(crate) fn create_actions(
    record: &StreamRecord,
    def: &WiredDefinition,
    desired_state: &State,
) -> Vec<MutationAction> {
    let layer = layer_component_template_name(&def.name);

    let mut actions = vec![
        MutationAction::UpsertComponentTemplate {
            name: layer.clone(),
            stream: def.name.clone(),
            fields: def.fields.clone(),
        },
        pipeline_action(def),
        MutationAction::UpsertIndexTemplate {
            name: def.name.clone(),
            stream: def.name.clone(),
            index_patterns: vec![def.name.clone()],
            composed_of: vec![layer],
            default_pipeline: processing_pipeline_name(&def.name),
        },
        MutationAction::UpsertDataStream {
            name: def.name.clone(),
        },
    ];
    actions.extend(lifecycle_action(def, desired_state));
    actions.push(MutationAction::UpsertStreamDocument {
        definition: record.definition().clone(),
    });
    actions
}

pub(crate) fn update_actions(
    record: &StreamRecord,
    def: &WiredDefinition,
    desired_state: &State,
) -> Vec<MutationAction> {
    let changes = record.changes();

    let mut actions = Vec::new();
    if changes.fields {
        actions.push(MutationAction::UpsertComponentTemplate {
            name: layer_component_template_name(&def.name),
            stream: def.name.clone(),
            fields: def.fields.clone(),
        });
    }
    if changes.processing || changes.routing {
        actions.push(pipeline_action(def));
    }
    if changes.lifecycle {
        actions.extend(lifecycle_action(def, desired_state));
    }
    actions.push(MutationAction::UpsertStreamDocument {
        definition: record.definition().clone(),
    });
    actions
}

pub(crate) fn delete_actions(name: &str) -> Vec<MutationAction> {
    let name = name.to_string();
    vec![
        MutationAction::DeleteDataStream { name: name.clone() },
        MutationAction::DeleteIndexTemplate { name: name.clone() },
        MutationAction::DeleteComponentTemplate {
            name: layer_component_template_name(&name),
        },
        MutationAction::DeleteIngestPipeline {
            name: processing_pipeline_name(&name),
        },
        MutationAction::DeleteStreamDocument { name },
    ]
}
