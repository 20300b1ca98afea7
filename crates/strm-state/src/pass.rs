//! Planning entry points: one record at a time, or a whole pass.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use serde::{Deserialize, Serialize};
use strm_plan::{build_execution_plan, ExecutionPlan, MutationAction};
use strm_schemas::StreamDefinition;
use tracing::{debug, info, warn};

use crate::facts::BackingStoreFacts;
use crate::record::{
    ChangeStatus, FieldConflict, HandleOutcome, StreamChange, StreamRecord, ValidationResult,
};
use crate::registry::InFlightRegistry;
use crate::{ReconcileError, State, ValidationError};

/// Deployment-mode switches that change which definitions are legal.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentFlags {
    /// Reject ILM lifecycles (deployments without index lifecycle management).
    #[serde(default)]
    pub restricted_lifecycle_types: bool,
}

/// Read-only dependencies of a pass.
#[derive(Clone, Copy)]
pub struct PassContext<'a> {
    pub facts: &'a dyn BackingStoreFacts,
    pub flags: &'a DeploymentFlags,
}

impl<'a> PassContext<'a> {
    pub fn new(facts: &'a dyn BackingStoreFacts, flags: &'a DeploymentFlags) -> Self {
        Self { facts, flags }
    }
}

/// Everything decided about one record in a pass.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RecordPlan {
    pub name: String,
    pub change_status: ChangeStatus,
    pub cascading_changes: Vec<StreamChange>,
    pub validation: ValidationResult,
    pub actions: Vec<MutationAction>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub conflicts: Vec<FieldConflict>,
}

/// A record plan plus the desired state it was computed against.
#[derive(Clone, Debug)]
pub struct Planned {
    pub plan: RecordPlan,
    pub desired_state: State,
}

/// Result of [`State::attempt_changes`].
#[derive(Debug)]
pub struct PassOutcome {
    /// Desired state with every withdrawn change (and its cascades) left out.
    pub desired_state: State,
    /// One entry per record touched by the surviving changes, in
    /// first-touched order, followed by the records that failed validation.
    pub records: Vec<RecordPlan>,
    /// Non-fatal rejections: `TypeMismatch`, `ValidationFailure` and
    /// `CascadeRejected`.
    pub rejected: Vec<ReconcileError>,
    pub plan: ExecutionPlan,
}

struct Applied {
    state: State,
    outcome: HandleOutcome,
}

fn apply_change(
    change: &StreamChange,
    desired_state: &State,
    starting_state: &State,
) -> Result<Applied, ReconcileError> {
    match change {
        StreamChange::Upsert(definition) => {
            let mut record = desired_state
                .get(definition.name())
                .cloned()
                .unwrap_or_else(|| StreamRecord::new(definition.clone()));
            let outcome = record.handle_upsert(definition, desired_state, starting_state)?;
            Ok(Applied {
                state: desired_state.with_record(record),
                outcome,
            })
        }
        StreamChange::Delete(name) => match desired_state.get(name).cloned() {
            Some(mut record) => {
                let outcome = record.handle_delete(name, desired_state, starting_state);
                Ok(Applied {
                    state: desired_state.with_record(record),
                    outcome,
                })
            }
            None => Ok(Applied {
                state: desired_state.clone(),
                outcome: HandleOutcome {
                    change_status: ChangeStatus::Unchanged,
                    cascading_changes: Vec::new(),
                },
            }),
        },
    }
}

/// Validate `name` in `desired_state` and determine its actions.
///
/// Invalid records get no actions.
fn finalize_record(
    name: &str,
    desired_state: &State,
    starting_state: &State,
    ctx: &PassContext<'_>,
) -> Result<RecordPlan, ReconcileError> {
    let Some(record) = desired_state.get(name) else {
        return Ok(RecordPlan {
            name: name.to_string(),
            change_status: ChangeStatus::Unchanged,
            cascading_changes: Vec::new(),
            validation: ValidationResult::from_errors(vec![ValidationError::NotFound {
                stream: name.to_string(),
            }]),
            actions: Vec::new(),
            conflicts: Vec::new(),
        });
    };
    let existed = starting_state.contains(name);

    let (validation, actions) = match record.change_status() {
        ChangeStatus::Unchanged => (ValidationResult::valid(), Vec::new()),
        ChangeStatus::Upserted => {
            let v = record.validate_upsertion(desired_state, starting_state, ctx)?;
            let actions = match (v.result.is_valid, existed) {
                (false, _) => Vec::new(),
                (true, true) => record.determine_update_actions(&v.facts, desired_state),
                (true, false) => record.determine_create_actions(&v.facts, desired_state),
            };
            (v.result, actions)
        }
        ChangeStatus::Deleted => {
            let v = record.validate_deletion(desired_state, ctx)?;
            let actions = if v.result.is_valid && existed {
                record.determine_delete_actions(&v.facts)
            } else {
                Vec::new()
            };
            (v.result, actions)
        }
    };

    Ok(RecordPlan {
        name: name.to_string(),
        change_status: record.change_status(),
        cascading_changes: Vec::new(),
        validation,
        actions,
        conflicts: record.conflicts().to_vec(),
    })
}

fn plan_change(
    change: &StreamChange,
    desired_state: &State,
    starting_state: &State,
    ctx: &PassContext<'_>,
) -> Result<Planned, ReconcileError> {
    let applied = apply_change(change, desired_state, starting_state)?;
    let mut plan = finalize_record(change.name(), &applied.state, starting_state, ctx)?;
    plan.cascading_changes = applied.outcome.cascading_changes;
    Ok(Planned {
        plan,
        desired_state: applied.state,
    })
}

/// Plan one upsert. Cascades are returned, not applied.
pub fn plan_upsert(
    desired: &StreamDefinition,
    desired_state: &State,
    starting_state: &State,
    ctx: &PassContext<'_>,
) -> Result<Planned, ReconcileError> {
    plan_change(
        &StreamChange::Upsert(desired.clone()),
        desired_state,
        starting_state,
        ctx,
    )
}

/// Plan one delete. Cascades are returned, not applied.
pub fn plan_delete(
    target: &str,
    desired_state: &State,
    starting_state: &State,
    ctx: &PassContext<'_>,
) -> Result<Planned, ReconcileError> {
    plan_change(
        &StreamChange::Delete(target.to_string()),
        desired_state,
        starting_state,
        ctx,
    )
}

/// One run of the change queue with some requested changes held back.
struct Attempt {
    desired_state: State,
    records: Vec<RecordPlan>,
    /// Requested-change index -> first stream whose rejection sank it.
    failed: BTreeMap<usize, String>,
    rejected: Vec<ReconcileError>,
}

impl State {
    /// Run a full pass of `changes` against this starting state.
    ///
    /// Changes and their cascades are applied first-in first-out, then every
    /// touched record is validated and planned against the final desired
    /// state. A requested change is all-or-nothing with its cascades: if any
    /// record it touched is rejected, the change is withdrawn and the pass is
    /// recomputed without it.
    pub fn attempt_changes(
        &self,
        changes: Vec<StreamChange>,
        ctx: &PassContext<'_>,
        registry: &InFlightRegistry,
    ) -> Result<PassOutcome, ReconcileError> {
        let _lease = registry.acquire(changes.iter().map(|c| c.name().to_string()))?;

        let mut withdrawn_changes: BTreeSet<usize> = BTreeSet::new();
        let mut rejected: Vec<ReconcileError> = Vec::new();
        let mut invalid_records: Vec<RecordPlan> = Vec::new();
        let mut attempts = 0usize;

        // Each round withdraws at least one more change, so this ends.
        let settled = loop {
            attempts += 1;
            let attempt = self.run_attempt(&changes, &withdrawn_changes, ctx)?;
            if attempt.failed.is_empty() {
                break attempt;
            }
            rejected.extend(attempt.rejected);
            invalid_records.extend(
                attempt
                    .records
                    .into_iter()
                    .filter(|r| !r.validation.is_valid),
            );
            for (index, cause) in attempt.failed {
                let name = changes[index].name();
                if name != cause {
                    warn!(stream = %name, %cause, "change withdrawn with its cascades");
                    rejected.push(ReconcileError::CascadeRejected {
                        name: name.to_string(),
                        cause,
                    });
                }
                withdrawn_changes.insert(index);
            }
        };

        let mut records = settled.records;
        for plan in invalid_records {
            if !records.iter().any(|r| r.name == plan.name) {
                records.push(plan);
            }
        }

        let plan = build_execution_plan(
            records
                .iter()
                .filter(|r| r.validation.is_valid)
                .map(|r| r.actions.clone())
                .collect(),
        );
        info!(
            plan_id = %plan.plan_id,
            records = records.len(),
            actions = plan.len(),
            rejected = rejected.len(),
            attempts,
            "reconciliation pass planned"
        );

        Ok(PassOutcome {
            desired_state: settled.desired_state,
            records,
            rejected,
            plan,
        })
    }

    fn run_attempt(
        &self,
        changes: &[StreamChange],
        withdrawn: &BTreeSet<usize>,
        ctx: &PassContext<'_>,
    ) -> Result<Attempt, ReconcileError> {
        let mut desired = self.clone();
        let mut queue: VecDeque<(usize, StreamChange)> = changes
            .iter()
            .cloned()
            .enumerate()
            .filter(|(index, _)| !withdrawn.contains(index))
            .collect();
        let mut touched: Vec<String> = Vec::new();
        let mut origins: BTreeMap<String, BTreeSet<usize>> = BTreeMap::new();
        let mut cascades: BTreeMap<String, Vec<StreamChange>> = BTreeMap::new();
        let mut failed: BTreeMap<usize, String> = BTreeMap::new();
        let mut rejected: Vec<ReconcileError> = Vec::new();

        while let Some((origin, change)) = queue.pop_front() {
            if failed.contains_key(&origin) {
                continue;
            }
            let name = change.name().to_string();
            match apply_change(&change, &desired, self) {
                Ok(applied) => {
                    debug!(
                        stream = %name,
                        status = ?applied.outcome.change_status,
                        cascades = applied.outcome.cascading_changes.len(),
                        "applied change"
                    );
                    desired = applied.state;
                    if !touched.contains(&name) {
                        touched.push(name.clone());
                    }
                    origins.entry(name.clone()).or_default().insert(origin);
                    queue.extend(
                        applied
                            .outcome
                            .cascading_changes
                            .iter()
                            .cloned()
                            .map(|c| (origin, c)),
                    );
                    cascades
                        .entry(name)
                        .or_default()
                        .extend(applied.outcome.cascading_changes);
                }
                Err(err) if !err.is_fatal() => {
                    warn!(stream = %name, error = %err, "change rejected");
                    failed.insert(origin, name);
                    rejected.push(err);
                }
                Err(err) => return Err(err),
            }
        }

        // Plan every record against one frozen snapshot.
        let mut records = Vec::with_capacity(touched.len());
        for name in &touched {
            let mut plan = finalize_record(name, &desired, self, ctx)?;
            plan.cascading_changes = cascades.remove(name).unwrap_or_default();
            if !plan.validation.is_valid {
                warn!(
                    stream = %plan.name,
                    errors = plan.validation.errors.len(),
                    "record failed validation, excluded from plan"
                );
                for origin in origins.get(name).into_iter().flatten() {
                    failed.entry(*origin).or_insert_with(|| name.clone());
                }
                rejected.push(ReconcileError::ValidationFailure {
                    name: plan.name.clone(),
                    errors: plan.validation.errors.clone(),
                });
            }
            records.push(plan);
        }

        Ok(Attempt {
            desired_state: desired,
            records,
            failed,
            rejected,
        })
    }
}
