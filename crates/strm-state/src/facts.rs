//! Read-only view of the backing store, consulted during validation only.

use serde::{Deserialize, Serialize};
use strm_schemas::shared_pipeline_fallback_name;

use crate::FactsError;

/// Shape of the object currently occupying a stream name.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackingKind {
    DataStream,
    /// A plain index with no data stream: incompatible with any stream kind.
    PlainIndex,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackingFacts {
    pub name: String,
    pub kind: BackingKind,
    /// Index template the data stream was created from.
    pub template: String,
}

/// Assets referenced by a data stream's template that this engine does not own.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnmanagedAssets {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ingest_pipeline: Option<String>,
    #[serde(default)]
    pub component_templates: Vec<String>,
}

/// Read-only facts source. Implementations must not mutate the store.
pub trait BackingStoreFacts {
    fn get_data_stream(&self, name: &str) -> Result<BackingFacts, FactsError>;

    fn get_unmanaged_assets(&self, facts: &BackingFacts) -> Result<UnmanagedAssets, FactsError>;
}

/// Shared pipeline a classic stream is linked from, plus its template.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineTargets {
    pub pipeline: String,
    pub template: String,
}

/// Facts resolved during validation and carried into action determination,
/// so that determining actions needs no further reads.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResolvedFacts {
    pub pipeline_targets: Option<PipelineTargets>,
}

pub(crate) fn resolve_pipeline_targets(
    facts: &dyn BackingStoreFacts,
    data_stream: &BackingFacts,
) -> Result<PipelineTargets, FactsError> {
    let unmanaged = match facts.get_unmanaged_assets(data_stream) {
        Ok(assets) => assets,
        Err(FactsError::NotFound) => UnmanagedAssets::default(),
        Err(e) => return Err(e),
    };
    Ok(PipelineTargets {
        pipeline: unmanaged
            .ingest_pipeline
            .unwrap_or_else(|| shared_pipeline_fallback_name(&data_stream.template)),
        template: data_stream.template.clone(),
    })
}
