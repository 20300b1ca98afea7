use serde::{Deserialize, Serialize};
use strum::EnumIter;

/// The three temporal versions of one field.
///
/// `base` is absent on first reconciliation or when history was not
/// retained. `current` and `target` always exist.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreeVersionsOf<T> {
    pub base: Option<T>,
    pub current: T,
    pub target: T,
}

impl<T> ThreeVersionsOf<T> {
    pub fn new(base: Option<T>, current: T, target: T) -> Self {
        Self {
            base,
            current,
            target,
        }
    }
}

/// Relationship between base, current and target.
///
/// Letters in the docs read base/current/target: `AAB` means base equals
/// current and target differs; `-AB` means the base version is missing.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, EnumIter, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiffOutcome {
    /// `AAA`
    StockValueNoUpdate,
    /// `AAB`
    StockValueCanUpdate,
    /// `ABA`
    CustomizedValueNoUpdate,
    /// `ABB`
    CustomizedValueSameUpdate,
    /// `ABC`
    CustomizedValueCanUpdate,
    /// `-AA`
    MissingBaseNoUpdate,
    /// `-AB`
    MissingBaseCanUpdate,
}

impl DiffOutcome {
    /// `true` when the target carries something the current value lacks.
    pub fn has_update(&self) -> bool {
        match self {
            DiffOutcome::StockValueCanUpdate
            | DiffOutcome::CustomizedValueCanUpdate
            | DiffOutcome::MissingBaseCanUpdate => true,
            DiffOutcome::StockValueNoUpdate
            | DiffOutcome::CustomizedValueNoUpdate
            | DiffOutcome::CustomizedValueSameUpdate
            | DiffOutcome::MissingBaseNoUpdate => false,
        }
    }
}

/// Which version the merged value came from.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeOutcome {
    Current,
    Target,
    Merged,
}

/// Conflict class of a resolved merge.
///
/// `Solvable` means an automatic merge produced the value but the caller
/// should surface it. `NonSolvable` means the current value was kept.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConflictClass {
    None,
    Solvable,
    NonSolvable,
}

impl ConflictClass {
    pub fn is_conflict(&self) -> bool {
        !matches!(self, ConflictClass::None)
    }
}

/// Full result of a three-way diff for one field.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreeWayDiff<T> {
    pub has_base: bool,
    pub base: Option<T>,
    pub current: T,
    pub target: T,
    /// Always defined: one of base/current/target or a structural union.
    pub merged: T,
    pub merge_outcome: MergeOutcome,
    pub diff_outcome: DiffOutcome,
    pub conflict: ConflictClass,
    pub has_update: bool,
}
