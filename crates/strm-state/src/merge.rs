//! Field-wise three-way merge of whole stream definitions.

use strm_diff::{list_diff, map_diff, scalar_diff, ThreeVersionsOf, ThreeWayDiff};
use strm_schemas::{ClassicDefinition, StreamDefinition, WiredDefinition};

use crate::record::{FieldConflict, StreamField};
use crate::ReconcileError;

#[derive(Debug)]
pub(crate) struct MergedDefinition {
    pub definition: StreamDefinition,
    pub conflicts: Vec<FieldConflict>,
}

impl MergedDefinition {
    pub fn verbatim(definition: StreamDefinition) -> Self {
        Self {
            definition,
            conflicts: Vec::new(),
        }
    }
}

/// Merge `target` onto `current`, using `base` (the last applied version)
/// to tell user edits from upstream updates.
///
/// `current` and `target` must be the same kind; callers reject kind
/// changes before merging.
pub(crate) fn merge_definitions(
    base: Option<&StreamDefinition>,
    current: &StreamDefinition,
    target: &StreamDefinition,
    customized: bool,
) -> Result<MergedDefinition, ReconcileError> {
    if let Some(base) = base {
        if base.kind() != current.kind() {
            return Err(unexpected(
                current,
                format!(
                    "last applied definition is {} but stored definition is {}",
                    base.kind(),
                    current.kind()
                ),
            ));
        }
    }

    let mut conflicts = Vec::new();
    let definition = match (current, target) {
        (StreamDefinition::Classic(c), StreamDefinition::Classic(t)) => {
            let b = base.and_then(StreamDefinition::as_classic);
            let processing = list_diff(
                ThreeVersionsOf::new(
                    b.map(|b| b.processing.clone()),
                    c.processing.clone(),
                    t.processing.clone(),
                ),
                customized,
            );
            let lifecycle = scalar_diff(
                ThreeVersionsOf::new(
                    b.map(|b| b.lifecycle.clone()),
                    c.lifecycle.clone(),
                    t.lifecycle.clone(),
                ),
                customized,
            );
            note(&mut conflicts, StreamField::Processing, &processing);
            note(&mut conflicts, StreamField::Lifecycle, &lifecycle);

            StreamDefinition::Classic(ClassicDefinition {
                name: t.name.clone(),
                processing: processing.merged,
                lifecycle: lifecycle.merged,
            })
        }
        (StreamDefinition::Wired(c), StreamDefinition::Wired(t)) => {
            let b = base.and_then(StreamDefinition::as_wired);
            let processing = list_diff(
                ThreeVersionsOf::new(
                    b.map(|b| b.processing.clone()),
                    c.processing.clone(),
                    t.processing.clone(),
                ),
                customized,
            );
            let lifecycle = scalar_diff(
                ThreeVersionsOf::new(
                    b.map(|b| b.lifecycle.clone()),
                    c.lifecycle.clone(),
                    t.lifecycle.clone(),
                ),
                customized,
            );
            let routing = list_diff(
                ThreeVersionsOf::new(
                    b.map(|b| b.routing.clone()),
                    c.routing.clone(),
                    t.routing.clone(),
                ),
                customized,
            );
            let fields = map_diff(
                ThreeVersionsOf::new(
                    b.map(|b| b.fields.clone()),
                    c.fields.clone(),
                    t.fields.clone(),
                ),
                customized,
            );
            note(&mut conflicts, StreamField::Processing, &processing);
            note(&mut conflicts, StreamField::Lifecycle, &lifecycle);
            note(&mut conflicts, StreamField::Routing, &routing);
            note(&mut conflicts, StreamField::Fields, &fields);

            StreamDefinition::Wired(WiredDefinition {
                name: t.name.clone(),
                processing: processing.merged,
                lifecycle: lifecycle.merged,
                routing: routing.merged,
                fields: fields.merged,
            })
        }
        _ => {
            return Err(unexpected(
                current,
                format!(
                    "cannot merge {} definition onto {}",
                    target.kind(),
                    current.kind()
                ),
            ))
        }
    };

    Ok(MergedDefinition {
        definition,
        conflicts,
    })
}

fn note<T>(out: &mut Vec<FieldConflict>, field: StreamField, diff: &ThreeWayDiff<T>) {
    if diff.conflict.is_conflict() {
        out.push(FieldConflict {
            field,
            conflict: diff.conflict,
            merge_outcome: diff.merge_outcome,
            diff_outcome: diff.diff_outcome,
        });
    }
}

fn unexpected(current: &StreamDefinition, detail: String) -> ReconcileError {
    ReconcileError::UnexpectedStartingState {
        name: current.name().to_string(),
        detail,
    }
}
