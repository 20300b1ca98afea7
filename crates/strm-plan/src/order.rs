//! Dependency table over action kinds.
//!
//! Resource kinds form a DAG by construction (pipelines <- templates <- data
//! streams <- stream documents), so a topological sort with no cycle
//! detection beyond a sanity check is enough.

use strum::IntoEnumIterator;

use crate::ActionKind;

/// Kinds that must be applied before `kind` whenever both occur in a plan.
fn prerequisites(kind: ActionKind) -> &'static [ActionKind] {
    use ActionKind as K;
    match kind {
        K::UpsertIngestPipeline | K::UpsertComponentTemplate => &[],
        // Templates link to the pipeline body and the component layers.
        K::UpsertIndexTemplate => &[K::UpsertIngestPipeline, K::UpsertComponentTemplate],
        // A shared pipeline may only call a pipeline that already exists.
        K::AppendProcessorToIngestPipeline => &[K::UpsertIngestPipeline],
        K::DeleteProcessorFromIngestPipeline => &[K::UpsertIngestPipeline],
        K::UpsertDataStream => &[K::UpsertIndexTemplate],
        K::UpdateLifecycle => &[K::UpsertDataStream],
        // Deletions run after every unlink, before the resources they reference.
        K::DeleteDataStream => &[
            K::AppendProcessorToIngestPipeline,
            K::DeleteProcessorFromIngestPipeline,
            K::UpdateLifecycle,
        ],
        K::DeleteIndexTemplate => &[K::DeleteDataStream],
        K::DeleteComponentTemplate => &[K::DeleteIndexTemplate],
        K::DeleteIngestPipeline => &[
            K::DeleteIndexTemplate,
            K::DeleteProcessorFromIngestPipeline,
        ],
        // The persisted document records what was applied, so it goes last.
        K::UpsertStreamDocument => &[
            K::UpdateLifecycle,
            K::DeleteComponentTemplate,
            K::DeleteIngestPipeline,
        ],
        K::DeleteStreamDocument => &[K::UpsertStreamDocument],
    }
}

/// Topological order of all action kinds (Kahn's algorithm). Among kinds
/// whose prerequisites are satisfied, declaration order wins, so the result
/// is fixed.
pub fn tier_order() -> Vec<ActionKind> {
    let all: Vec<ActionKind> = ActionKind::iter().collect();
    let mut ordered: Vec<ActionKind> = Vec::with_capacity(all.len());

    while ordered.len() < all.len() {
        let next = all.iter().copied().find(|kind| {
            !ordered.contains(kind) && prerequisites(*kind).iter().all(|p| ordered.contains(p))
        });
        match next {
            Some(kind) => ordered.push(kind),
            // Unreachable with the static table above; keep the remaining kinds
            // in declaration order rather than loop forever.
            None => {
                tracing::error!("action kind dependency table contains a cycle");
                let remaining: Vec<ActionKind> =
                    all.iter().copied().filter(|k| !ordered.contains(k)).collect();
                ordered.extend(remaining);
            }
        }
    }

    ordered
}
