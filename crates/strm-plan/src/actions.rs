use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strm_schemas::{Lifecycle, StreamDefinition};
use strum::EnumIter;

/// One processor in a generated ingest pipeline body.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineProcessor {
    pub processor: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub options: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    /// Step id or routing destination this processor was generated from.
    pub tag: String,
}

/// Idempotent mutation against the backing store.
///
/// Every variant is self-contained: an applier can replay any action on its
/// own, any number of times, and converge to the same store state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MutationAction {
    UpsertIngestPipeline {
        name: String,
        stream: String,
        processors: Vec<PipelineProcessor>,
    },
    UpsertComponentTemplate {
        name: String,
        stream: String,
        fields: BTreeMap<String, String>,
    },
    UpsertIndexTemplate {
        name: String,
        stream: String,
        index_patterns: Vec<String>,
        composed_of: Vec<String>,
        default_pipeline: String,
    },
    /// Link a stream-managed pipeline from a shared pipeline.
    AppendProcessorToIngestPipeline {
        pipeline: String,
        template: String,
        data_stream: String,
        reference_pipeline: String,
        condition: String,
    },
    /// Unlink a stream-managed pipeline from a shared pipeline.
    DeleteProcessorFromIngestPipeline {
        pipeline: String,
        template: String,
        data_stream: String,
        reference_pipeline: String,
    },
    UpsertDataStream {
        name: String,
    },
    UpdateLifecycle {
        name: String,
        lifecycle: Lifecycle,
    },
    DeleteDataStream {
        name: String,
    },
    DeleteIndexTemplate {
        name: String,
    },
    DeleteComponentTemplate {
        name: String,
    },
    DeleteIngestPipeline {
        name: String,
    },
    /// Persist the applied definition; becomes the next pass's base version.
    UpsertStreamDocument {
        definition: StreamDefinition,
    },
    DeleteStreamDocument {
        name: String,
    },
}

/// Discriminant of [`MutationAction`], used as the dependency-table key.
///
/// Declaration order is the tie-break order of the topological sort.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, EnumIter, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    UpsertIngestPipeline,
    UpsertComponentTemplate,
    UpsertIndexTemplate,
    AppendProcessorToIngestPipeline,
    DeleteProcessorFromIngestPipeline,
    UpsertDataStream,
    UpdateLifecycle,
    DeleteDataStream,
    DeleteIndexTemplate,
    DeleteComponentTemplate,
    DeleteIngestPipeline,
    UpsertStreamDocument,
    DeleteStreamDocument,
}

impl MutationAction {
    pub fn kind(&self) -> ActionKind {
        match self {
            MutationAction::UpsertIngestPipeline { .. } => ActionKind::UpsertIngestPipeline,
            MutationAction::UpsertComponentTemplate { .. } => ActionKind::UpsertComponentTemplate,
            MutationAction::UpsertIndexTemplate { .. } => ActionKind::UpsertIndexTemplate,
            MutationAction::AppendProcessorToIngestPipeline { .. } => {
                ActionKind::AppendProcessorToIngestPipeline
            }
            MutationAction::DeleteProcessorFromIngestPipeline { .. } => {
                ActionKind::DeleteProcessorFromIngestPipeline
            }
            MutationAction::UpsertDataStream { .. } => ActionKind::UpsertDataStream,
            MutationAction::UpdateLifecycle { .. } => ActionKind::UpdateLifecycle,
            MutationAction::DeleteDataStream { .. } => ActionKind::DeleteDataStream,
            MutationAction::DeleteIndexTemplate { .. } => ActionKind::DeleteIndexTemplate,
            MutationAction::DeleteComponentTemplate { .. } => ActionKind::DeleteComponentTemplate,
            MutationAction::DeleteIngestPipeline { .. } => ActionKind::DeleteIngestPipeline,
            MutationAction::UpsertStreamDocument { .. } => ActionKind::UpsertStreamDocument,
            MutationAction::DeleteStreamDocument { .. } => ActionKind::DeleteStreamDocument,
        }
    }

    /// `(pipeline, reference_pipeline)` for actions on a shared pipeline.
    ///
    /// These are merged across records by the plan builder, never applied
    /// once per referencing record.
    pub fn shared_link_key(&self) -> Option<(&str, &str)> {
        match self {
            MutationAction::AppendProcessorToIngestPipeline {
                pipeline,
                reference_pipeline,
                ..
            }
            | MutationAction::DeleteProcessorFromIngestPipeline {
                pipeline,
                reference_pipeline,
                ..
            } => Some((pipeline.as_str(), reference_pipeline.as_str())),
            _ => None,
        }
    }
}
