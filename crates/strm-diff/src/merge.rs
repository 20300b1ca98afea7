use crate::{ConflictClass, DiffOutcome, MergeOutcome, ThreeVersionsOf, ThreeWayDiff};

/// Classify the relationship among the three versions.
pub fn determine_diff_outcome<T: PartialEq>(
    base: Option<&T>,
    current: &T,
    target: &T,
) -> DiffOutcome {
    let Some(base) = base else {
        return if current == target {
            DiffOutcome::MissingBaseNoUpdate
        } else {
            DiffOutcome::MissingBaseCanUpdate
        };
    };

    if base == current {
        if current == target {
            DiffOutcome::StockValueNoUpdate
        } else {
            DiffOutcome::StockValueCanUpdate
        }
    } else if current == target {
        DiffOutcome::CustomizedValueSameUpdate
    } else if base == target {
        DiffOutcome::CustomizedValueNoUpdate
    } else {
        DiffOutcome::CustomizedValueCanUpdate
    }
}

/// Merge rule selected by a [`DiffOutcome`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MergeRule {
    /// Keep current, no conflict.
    KeepCurrent,
    /// Take target, no conflict.
    TakeTarget,
    /// Structural union when both sides are compatible (`SOLVABLE`),
    /// otherwise keep current (`NON_SOLVABLE`).
    StructuralMerge,
    /// Take target; `SOLVABLE` when the value is flagged customized.
    TakeTargetFlagCustomized,
}

/// The merge table. One rule per outcome, no fallback arm.
pub fn merge_rule(outcome: DiffOutcome) -> MergeRule {
    match outcome {
        DiffOutcome::StockValueNoUpdate
        | DiffOutcome::CustomizedValueNoUpdate
        | DiffOutcome::CustomizedValueSameUpdate => MergeRule::KeepCurrent,
        DiffOutcome::StockValueCanUpdate => MergeRule::TakeTarget,
        DiffOutcome::CustomizedValueCanUpdate => MergeRule::StructuralMerge,
        // -AA is treated as AAA: current and target agree.
        DiffOutcome::MissingBaseNoUpdate => MergeRule::TakeTarget,
        // -AB is treated as AAB unless the value is flagged customized.
        DiffOutcome::MissingBaseCanUpdate => MergeRule::TakeTargetFlagCustomized,
    }
}

/// Diff one field and resolve its merged value.
///
/// `structural_merge` receives `(base, current, target)` and returns the
/// union when the two edits are compatible, `None` otherwise. It is only
/// consulted for [`DiffOutcome::CustomizedValueCanUpdate`].
pub fn three_way_diff<T, F>(
    versions: ThreeVersionsOf<T>,
    customized: bool,
    structural_merge: F,
) -> ThreeWayDiff<T>
where
    T: Clone + PartialEq,
    F: FnOnce(Option<&T>, &T, &T) -> Option<T>,
{
    let ThreeVersionsOf {
        base,
        current,
        target,
    } = versions;

    let diff_outcome = determine_diff_outcome(base.as_ref(), &current, &target);

    let (merge_outcome, conflict, merged) = match merge_rule(diff_outcome) {
        MergeRule::KeepCurrent => (MergeOutcome::Current, ConflictClass::None, current.clone()),
        MergeRule::TakeTarget => (MergeOutcome::Target, ConflictClass::None, target.clone()),
        MergeRule::StructuralMerge => match structural_merge(base.as_ref(), &current, &target) {
            Some(union) => (MergeOutcome::Merged, ConflictClass::Solvable, union),
            None => (
                MergeOutcome::Current,
                ConflictClass::NonSolvable,
                current.clone(),
            ),
        },
        MergeRule::TakeTargetFlagCustomized => {
            let conflict = if customized {
                ConflictClass::Solvable
            } else {
                ConflictClass::None
            };
            (MergeOutcome::Target, conflict, target.clone())
        }
    };

    ThreeWayDiff {
        has_base: base.is_some(),
        base,
        current,
        target,
        merged,
        merge_outcome,
        diff_outcome,
        conflict,
        has_update: diff_outcome.has_update(),
    }
}
