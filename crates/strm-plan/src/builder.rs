use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::order::tier_order;
use crate::MutationAction;

/// Final ordered, deduplicated mutation sequence of one reconciliation pass.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionPlan {
    /// Deterministic id derived from the ordered actions. Identical plans get
    /// identical ids, so an applier can use it as an idempotency key.
    pub plan_id: Uuid,
    pub actions: Vec<MutationAction>,
}

impl ExecutionPlan {
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &MutationAction> {
        self.actions.iter()
    }
}

/// Net effect of the shared-pipeline link actions seen so far for one key.
enum NetLink {
    Append(MutationAction),
    Remove(MutationAction),
    Cancelled,
}

impl NetLink {
    fn fold(self, next: MutationAction) -> NetLink {
        let next_is_append = matches!(next, MutationAction::AppendProcessorToIngestPipeline { .. });
        match (self, next_is_append) {
            (NetLink::Append(_), false) => NetLink::Cancelled,
            (NetLink::Remove(prev), false) => NetLink::Remove(prev),
            (NetLink::Cancelled, false) => NetLink::Remove(next),
            (_, true) => NetLink::Append(next),
        }
    }

    fn start(first: MutationAction) -> NetLink {
        if matches!(first, MutationAction::AppendProcessorToIngestPipeline { .. }) {
            NetLink::Append(first)
        } else {
            NetLink::Remove(first)
        }
    }

    fn into_action(self) -> Option<MutationAction> {
        match self {
            NetLink::Append(a) | NetLink::Remove(a) => Some(a),
            NetLink::Cancelled => None,
        }
    }
}

enum Slot {
    Plain(MutationAction),
    /// Placeholder for the net shared-link action of this key.
    Shared(String, String),
}

/// Merge per-record action lists into one execution plan.
///
/// Input lists are read in order; that order is preserved within each tier
/// of the dependency table, so the same input always yields the same plan.
pub fn build_execution_plan(per_record: Vec<Vec<MutationAction>>) -> ExecutionPlan {
    let mut slots: Vec<Slot> = Vec::new();
    let mut links: BTreeMap<(String, String), NetLink> = BTreeMap::new();

    for action in per_record.into_iter().flatten() {
        if let Some((pipeline, reference)) = action.shared_link_key() {
            let key = (pipeline.to_string(), reference.to_string());
            let net = match links.remove(&key) {
                Some(prev) => prev.fold(action),
                None => {
                    slots.push(Slot::Shared(key.0.clone(), key.1.clone()));
                    NetLink::start(action)
                }
            };
            links.insert(key, net);
            continue;
        }

        let duplicate = slots
            .iter()
            .any(|s| matches!(s, Slot::Plain(existing) if *existing == action));
        if duplicate {
            debug!(kind = ?action.kind(), "dropping duplicate action");
            continue;
        }
        slots.push(Slot::Plain(action));
    }

    let mut actions: Vec<MutationAction> = Vec::with_capacity(slots.len());
    for slot in slots {
        match slot {
            Slot::Plain(action) => actions.push(action),
            Slot::Shared(pipeline, reference) => {
                let net = links
                    .remove(&(pipeline.clone(), reference.clone()))
                    .and_then(NetLink::into_action);
                match net {
                    Some(action) => actions.push(action),
                    None => debug!(%pipeline, %reference, "shared link edits cancel out"),
                }
            }
        }
    }

    let tiers = tier_order();
    // Stable: input order survives within a tier.
    actions.sort_by_key(|a| tiers.iter().position(|k| *k == a.kind()).unwrap_or(tiers.len()));

    ExecutionPlan {
        plan_id: derive_plan_id(&actions),
        actions,
    }
}

/// UUIDv5 over the ordered action list. No RNG, no clock.
fn derive_plan_id(actions: &[MutationAction]) -> Uuid {
    let data = format!("strm-plan.v1|{actions:?}");
    Uuid::new_v5(&Uuid::NAMESPACE_OID, data.as_bytes())
}
