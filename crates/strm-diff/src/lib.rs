//! strm-diff
//!
//! Per-field three-way diff and merge resolver.
//!
//! Given `{base, current, target}` for one configuration field the crate
//! classifies the relationship of the three versions ([`DiffOutcome`]) and
//! resolves a merged value plus a [`ConflictClass`].
//!
//! Pure, deterministic, never fails. No IO.

mod algorithms;
mod merge;
mod types;

pub use algorithms::{list_diff, map_diff, merge_deduped_lists, merge_maps, scalar_diff};
pub use merge::{determine_diff_outcome, merge_rule, three_way_diff, MergeRule};
pub use types::*;
