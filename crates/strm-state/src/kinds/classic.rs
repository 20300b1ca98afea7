//! Classic streams: a managed overlay on an externally created data stream.
//!
//! The stream-managed pipeline is reached through the data stream's shared
//! default pipeline, so linking and unlinking it are the only actions that
//! touch a resource other streams may also use.

use strm_plan::MutationAction;
use strm_schemas::{processing_pipeline_name, ClassicDefinition, StreamDefinition};

use super::{lifecycle_allowed, step_processors};
use crate::facts::{resolve_pipeline_targets, BackingKind, PipelineTargets, ResolvedFacts};
use crate::record::{StreamChanges, StreamRecord, Validation};
use crate::{FactsError, PassContext, ReconcileError, ValidationError};

pub(crate) fn change_flags(
    def: &ClassicDefinition,
    starting: Option<&StreamDefinition>,
) -> StreamChanges {
    match starting {
        Some(prev) => StreamChanges {
            processing: def.processing != prev.processing(),
            lifecycle: def.lifecycle != *prev.lifecycle(),
            routing: false,
            fields: false,
        },
        None => StreamChanges {
            processing: true,
            lifecycle: true,
            routing: false,
            fields: false,
        },
    }
}

pub(crate) fn validate_upsertion(
    record: &StreamRecord,
    def: &ClassicDefinition,
    ctx: &PassContext<'_>,
) -> Result<Validation, ReconcileError> {
    let name = def.name.as_str();
    let mut errors = Vec::new();
    let mut facts = ResolvedFacts::default();

    if !lifecycle_allowed(&def.lifecycle, ctx) {
        errors.push(ValidationError::RestrictedLifecycle {
            stream: name.to_string(),
        });
    }

    let changes = record.changes();
    if changes.processing || changes.lifecycle {
        match ctx.facts.get_data_stream(name) {
            Ok(ds) if ds.kind == BackingKind::PlainIndex => {
                errors.push(ValidationError::ExistingIndex {
                    stream: name.to_string(),
                });
            }
            Ok(ds) => {
                let targets = resolve_pipeline_targets(ctx.facts, &ds)
                    .map_err(|e| ReconcileError::read_failure(name, e))?;
                facts.pipeline_targets = Some(targets);
            }
            Err(FactsError::NotFound) => {
                errors.push(ValidationError::MissingDataStream {
                    stream: name.to_string(),
                });
            }
            Err(e) => return Err(ReconcileError::read_failure(name, e)),
        }
    }

    Ok(Validation::new(errors, facts))
}

/// Always valid. Pipeline targets are resolved when the data stream is
/// still there so the delete can unlink from the shared pipeline.
pub(crate) fn validate_deletion(
    def: &ClassicDefinition,
    ctx: &PassContext<'_>,
) -> Result<Validation, ReconcileError> {
    let name = def.name.as_str();
    let pipeline_targets = match ctx.facts.get_data_stream(name) {
        Ok(ds) if ds.kind == BackingKind::DataStream => Some(
            resolve_pipeline_targets(ctx.facts, &ds)
                .map_err(|e| ReconcileError::read_failure(name, e))?,
        ),
        Ok(_) | Err(FactsError::NotFound) => None,
        Err(e) => return Err(ReconcileError::read_failure(name, e)),
    };

    Ok(Validation::new(Vec::new(), ResolvedFacts { pipeline_targets }))
}

pub(crate) fn create_actions(
    record: &StreamRecord,
    def: &ClassicDefinition,
    facts: &ResolvedFacts,
) -> Vec<MutationAction> {
    let mut actions = Vec::new();
    if !def.processing.is_empty() {
        actions.extend(upsert_pipeline_actions(def, facts.pipeline_targets.as_ref()));
    }
    if !def.lifecycle.is_inherit() {
        actions.push(MutationAction::UpdateLifecycle {
            name: def.name.clone(),
            lifecycle: def.lifecycle.clone(),
        });
    }
    actions.push(MutationAction::UpsertStreamDocument {
        definition: record.definition().clone(),
    });
    actions
}

pub(crate) fn update_actions(
    record: &StreamRecord,
    def: &ClassicDefinition,
    facts: &ResolvedFacts,
) -> Vec<MutationAction> {
    let changes = record.changes();

    let mut actions = Vec::new();
    if changes.processing {
        if def.processing.is_empty() {
            actions.extend(remove_pipeline_actions(def, facts.pipeline_targets.as_ref()));
        } else {
            actions.extend(upsert_pipeline_actions(def, facts.pipeline_targets.as_ref()));
        }
    }
    if changes.lifecycle {
        actions.push(MutationAction::UpdateLifecycle {
            name: def.name.clone(),
            lifecycle: def.lifecycle.clone(),
        });
    }
    actions.push(MutationAction::UpsertStreamDocument {
        definition: record.definition().clone(),
    });
    actions
}

pub(crate) fn delete_actions(def: &ClassicDefinition, facts: &ResolvedFacts) -> Vec<MutationAction> {
    let mut actions = vec![
        MutationAction::DeleteDataStream {
            name: def.name.clone(),
        },
        MutationAction::DeleteStreamDocument {
            name: def.name.clone(),
        },
    ];
    if !def.processing.is_empty() {
        actions.extend(remove_pipeline_actions(def, facts.pipeline_targets.as_ref()));
    }
    actions
}

fn upsert_pipeline_actions(
    def: &ClassicDefinition,
    targets: Option<&PipelineTargets>,
) -> Vec<MutationAction> {
    let managed = processing_pipeline_name(&def.name);
    let mut actions = vec![MutationAction::UpsertIngestPipeline {
        name: managed.clone(),
        stream: def.name.clone(),
        processors: step_processors(&def.processing),
    }];
    if let Some(targets) = targets {
        actions.push(MutationAction::AppendProcessorToIngestPipeline {
            pipeline: targets.pipeline.clone(),
            template: targets.template.clone(),
            data_stream: def.name.clone(),
            reference_pipeline: managed,
            condition: format!("ctx._index == '{}'", def.name),
        });
    }
    actions
}

fn remove_pipeline_actions(
    def: &ClassicDefinition,
    targets: Option<&PipelineTargets>,
) -> Vec<MutationAction> {
    let managed = processing_pipeline_name(&def.name);
    let mut actions = vec![MutationAction::DeleteIngestPipeline {
        name: managed.clone(),
    }];
    if let Some(targets) = targets {
        actions.push(MutationAction::DeleteProcessorFromIngestPipeline {
            pipeline: targets.pipeline.clone(),
            template: targets.template.clone(),
            data_stream: def.name.clone(),
            reference_pipeline: managed,
        });
    }
    actions
}
