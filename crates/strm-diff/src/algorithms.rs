//! Field algorithms: one per structural shape.

use std::collections::{BTreeMap, BTreeSet};

use crate::{three_way_diff, ThreeVersionsOf, ThreeWayDiff};

/// Scalar field: an update on top of a customized value is never mergeable.
pub fn scalar_diff<T>(versions: ThreeVersionsOf<T>, customized: bool) -> ThreeWayDiff<T>
where
    T: Clone + PartialEq,
{
    three_way_diff(versions, customized, |_, _, _| None)
}

/// Ordered list field: customized + updated lists merge into a deduplicated
/// union (see [`merge_deduped_lists`]).
pub fn list_diff<T>(versions: ThreeVersionsOf<Vec<T>>, customized: bool) -> ThreeWayDiff<Vec<T>>
where
    T: Clone + PartialEq,
{
    three_way_diff(versions, customized, |base, current, target| {
        let base = base.map(Vec::as_slice).unwrap_or(&[]);
        Some(merge_deduped_lists(base, current, target))
    })
}

/// Map field: per-key three-way resolution. A key edited to different values
/// on both sides makes the whole map non-mergeable.
pub fn map_diff<K, V>(
    versions: ThreeVersionsOf<BTreeMap<K, V>>,
    customized: bool,
) -> ThreeWayDiff<BTreeMap<K, V>>
where
    K: Ord + Clone,
    V: Clone + PartialEq,
{
    three_way_diff(versions, customized, merge_maps)
}

/// Union of two edits of `base`, in first-seen order: base entries, then
/// entries added by `current`, then entries added by `target`.
///
/// A base entry removed on either side stays removed. Duplicates collapse to
/// their first occurrence.
pub fn merge_deduped_lists<T>(base: &[T], current: &[T], target: &[T]) -> Vec<T>
where
    T: Clone + PartialEq,
{
    let mut merged: Vec<T> = Vec::new();
    for item in base.iter().chain(current).chain(target) {
        let removed = base.contains(item) && !(current.contains(item) && target.contains(item));
        if removed || merged.contains(item) {
            continue;
        }
        merged.push(item.clone());
    }
    merged
}

/// Per-key merge of two edits of `base`. `None` when a key conflicts.
pub fn merge_maps<K, V>(
    base: Option<&BTreeMap<K, V>>,
    current: &BTreeMap<K, V>,
    target: &BTreeMap<K, V>,
) -> Option<BTreeMap<K, V>>
where
    K: Ord + Clone,
    V: Clone + PartialEq,
{
    let empty = BTreeMap::new();
    let base = base.unwrap_or(&empty);

    let keys: BTreeSet<&K> = base.keys().chain(current.keys()).chain(target.keys()).collect();

    let mut merged = BTreeMap::new();
    for key in keys {
        let (b, c, t) = (base.get(key), current.get(key), target.get(key));
        let resolved = if c == t {
            c
        } else if c == b {
            t
        } else if t == b {
            c
        } else {
            return None;
        };
        if let Some(value) = resolved {
            merged.insert(key.clone(), value.clone());
        }
    }
    Some(merged)
}
