use std::fmt;

use serde::{Deserialize, Serialize};
use strm_diff::{ConflictClass, DiffOutcome, MergeOutcome};
use strm_plan::MutationAction;
use strm_schemas::{StreamDefinition, StreamKind};
use tracing::{debug, warn};

use crate::facts::ResolvedFacts;
use crate::kinds;
use crate::merge::merge_definitions;
use crate::{PassContext, ReconcileError, State, ValidationError};

// -----------------------------
// Per-record outcome types
// -----------------------------

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeStatus {
    #[default]
    Unchanged,
    Upserted,
    Deleted,
}

/// One requested change. Cascades are expressed the same way.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamChange {
    Upsert(StreamDefinition),
    Delete(String),
}

impl StreamChange {
    pub fn name(&self) -> &str {
        match self {
            StreamChange::Upsert(def) => def.name(),
            StreamChange::Delete(name) => name,
        }
    }
}

/// Which parts of a definition differ from the starting state.
///
/// Classic streams only ever set `processing` and `lifecycle`.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamChanges {
    pub processing: bool,
    pub lifecycle: bool,
    pub routing: bool,
    pub fields: bool,
}

impl StreamChanges {
    pub fn all() -> Self {
        Self {
            processing: true,
            lifecycle: true,
            routing: true,
            fields: true,
        }
    }

    pub fn any(&self) -> bool {
        self.processing || self.lifecycle || self.routing || self.fields
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamField {
    Processing,
    Lifecycle,
    Routing,
    Fields,
}

impl fmt::Display for StreamField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StreamField::Processing => "processing",
            StreamField::Lifecycle => "lifecycle",
            StreamField::Routing => "routing",
            StreamField::Fields => "fields",
        };
        f.write_str(s)
    }
}

/// A field whose merge needed attention.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldConflict {
    pub field: StreamField,
    pub conflict: ConflictClass,
    pub merge_outcome: MergeOutcome,
    pub diff_outcome: DiffOutcome,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: Vec<ValidationError>,
}

impl ValidationResult {
    pub fn valid() -> Self {
        Self {
            is_valid: true,
            errors: Vec::new(),
        }
    }

    pub fn from_errors(errors: Vec<ValidationError>) -> Self {
        Self {
            is_valid: errors.is_empty(),
            errors,
        }
    }
}

/// Validation verdict plus the facts read to reach it.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Validation {
    pub result: ValidationResult,
    pub facts: ResolvedFacts,
}

impl Validation {
    pub(crate) fn new(errors: Vec<ValidationError>, facts: ResolvedFacts) -> Self {
        Self {
            result: ValidationResult::from_errors(errors),
            facts,
        }
    }
}

/// Result of `handle_upsert` / `handle_delete`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HandleOutcome {
    pub change_status: ChangeStatus,
    pub cascading_changes: Vec<StreamChange>,
}

// -----------------------------
// Record
// -----------------------------

/// Working copy of one stream for the duration of a pass.
///
/// Built from the starting-state document (or from a desired definition for
/// a new stream) and mutated only through its own handlers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StreamRecord {
    definition: StreamDefinition,
    last_applied: Option<StreamDefinition>,
    customized: bool,
    change_status: ChangeStatus,
    changes: StreamChanges,
    conflicts: Vec<FieldConflict>,
}

impl StreamRecord {
    /// A stream with no history: no base version, not customized.
    pub fn new(definition: StreamDefinition) -> Self {
        Self::persisted(definition, None, false)
    }

    /// A stream as loaded from its persisted document.
    pub fn persisted(
        definition: StreamDefinition,
        last_applied: Option<StreamDefinition>,
        customized: bool,
    ) -> Self {
        Self {
            definition,
            last_applied,
            customized,
            change_status: ChangeStatus::Unchanged,
            changes: StreamChanges::default(),
            conflicts: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        self.definition.name()
    }

    pub fn kind(&self) -> StreamKind {
        self.definition.kind()
    }

    pub fn definition(&self) -> &StreamDefinition {
        &self.definition
    }

    pub fn last_applied(&self) -> Option<&StreamDefinition> {
        self.last_applied.as_ref()
    }

    pub fn customized(&self) -> bool {
        self.customized
    }

    pub fn change_status(&self) -> ChangeStatus {
        self.change_status
    }

    pub fn changes(&self) -> StreamChanges {
        self.changes
    }

    pub fn conflicts(&self) -> &[FieldConflict] {
        &self.conflicts
    }

    pub fn is_deleted(&self) -> bool {
        self.change_status == ChangeStatus::Deleted
    }

    /// Merge `desired` into this record.
    ///
    /// A name that is not this record's is a no-op. A kind change is a
    /// `TypeMismatch` and leaves the record untouched.
    pub fn handle_upsert(
        &mut self,
        desired: &StreamDefinition,
        desired_state: &State,
        starting_state: &State,
    ) -> Result<HandleOutcome, ReconcileError> {
        if desired.name() != self.name() {
            return Ok(self.no_op());
        }
        if desired.kind() != self.kind() {
            return Err(ReconcileError::TypeMismatch {
                name: self.name().to_string(),
                from: self.kind(),
                to: desired.kind(),
            });
        }

        let starting = starting_state.get(self.name());
        if let Some(start) = starting {
            if start.kind() != self.kind() {
                return Err(ReconcileError::UnexpectedStartingState {
                    name: self.name().to_string(),
                    detail: format!(
                        "starting record is {} but working record is {}",
                        start.kind(),
                        self.kind()
                    ),
                });
            }
        }

        let merged = match starting {
            Some(start) => merge_definitions(
                start.last_applied(),
                start.definition(),
                desired,
                start.customized(),
            )?,
            None => crate::merge::MergedDefinition::verbatim(desired.clone()),
        };
        for conflict in &merged.conflicts {
            if conflict.conflict == ConflictClass::NonSolvable {
                warn!(
                    stream = %self.name(),
                    field = %conflict.field,
                    diff_outcome = ?conflict.diff_outcome,
                    "non-solvable conflict, keeping current value"
                );
            }
        }

        let starting_definition = starting.map(StreamRecord::definition);

        self.definition = merged.definition;
        self.change_status = ChangeStatus::Upserted;
        self.changes = kinds::change_flags(
            &self.definition,
            starting_definition,
            desired_state,
            starting_state,
        );
        self.note_conflicts(merged.conflicts);

        let cascading_changes = kinds::upsert_cascades(self, starting_definition, desired_state);
        debug!(
            stream = %self.name(),
            changes = ?self.changes,
            cascades = cascading_changes.len(),
            "handled upsert"
        );

        Ok(HandleOutcome {
            change_status: self.change_status,
            cascading_changes,
        })
    }

    /// Mark this record deleted if `target` is its name; otherwise a no-op.
    pub fn handle_delete(
        &mut self,
        target: &str,
        desired_state: &State,
        _starting_state: &State,
    ) -> HandleOutcome {
        if target != self.name() {
            return self.no_op();
        }

        self.change_status = ChangeStatus::Deleted;
        let cascading_changes = kinds::delete_cascades(self, desired_state);
        debug!(stream = %self.name(), cascades = cascading_changes.len(), "handled delete");

        HandleOutcome {
            change_status: self.change_status,
            cascading_changes,
        }
    }

    pub fn validate_upsertion(
        &self,
        desired_state: &State,
        starting_state: &State,
        ctx: &PassContext<'_>,
    ) -> Result<Validation, ReconcileError> {
        kinds::validate_upsertion(self, desired_state, starting_state, ctx)
    }

    pub fn validate_deletion(
        &self,
        _desired_state: &State,
        ctx: &PassContext<'_>,
    ) -> Result<Validation, ReconcileError> {
        kinds::validate_deletion(self, ctx)
    }

    pub fn determine_create_actions(
        &self,
        facts: &ResolvedFacts,
        desired_state: &State,
    ) -> Vec<MutationAction> {
        kinds::create_actions(self, facts, desired_state)
    }

    pub fn determine_update_actions(
        &self,
        facts: &ResolvedFacts,
        desired_state: &State,
    ) -> Vec<MutationAction> {
        kinds::update_actions(self, facts, desired_state)
    }

    pub fn determine_delete_actions(&self, facts: &ResolvedFacts) -> Vec<MutationAction> {
        kinds::delete_actions(self, facts)
    }

    /// This record as the next pass will see it once the plan is applied.
    ///
    /// Only an upserted definition becomes the new base. A record the pass
    /// left alone keeps its base and customized flag, so out-of-band drift
    /// still reads as a customization next time.
    pub(crate) fn committed(&self) -> Self {
        match self.change_status {
            ChangeStatus::Upserted => {
                Self::persisted(self.definition.clone(), Some(self.definition.clone()), false)
            }
            ChangeStatus::Unchanged | ChangeStatus::Deleted => Self::persisted(
                self.definition.clone(),
                self.last_applied.clone(),
                self.customized,
            ),
        }
    }

    fn no_op(&self) -> HandleOutcome {
        HandleOutcome {
            change_status: self.change_status,
            cascading_changes: Vec::new(),
        }
    }

    /// Keep the most severe conflict seen per field across re-upserts.
    fn note_conflicts(&mut self, fresh: Vec<FieldConflict>) {
        for conflict in fresh {
            match self.conflicts.iter_mut().find(|c| c.field == conflict.field) {
                Some(existing) if existing.conflict < conflict.conflict => *existing = conflict,
                Some(_) => {}
                None => self.conflicts.push(conflict),
            }
        }
        self.conflicts.sort_by_key(|c| c.field);
    }
}
