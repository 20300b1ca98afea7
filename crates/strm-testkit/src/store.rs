//! Deterministic in-memory backing store.
//!
//! - Serves [`BackingStoreFacts`] reads from its own maps.
//! - Applies every [`MutationAction`] as a set or a removal, so replaying an
//!   action (or a whole plan) leaves the store exactly as one application did.
//! - A shared pipeline link is a `pipeline` processor tagged with the
//!   referenced pipeline's name; appending replaces an existing link.
//! - No clocks, no randomness.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strm_plan::{ExecutionPlan, MutationAction, PipelineProcessor};
use strm_schemas::{Lifecycle, StreamDefinition};
use strm_state::{BackingFacts, BackingKind, BackingStoreFacts, FactsError, UnmanagedAssets};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredDataStream {
    pub kind: BackingKind,
    pub template: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lifecycle: Option<Lifecycle>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredIndexTemplate {
    #[serde(default)]
    pub index_patterns: Vec<String>,
    #[serde(default)]
    pub composed_of: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_pipeline: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InMemoryBackingStore {
    #[serde(default)]
    data_streams: BTreeMap<String, StoredDataStream>,
    #[serde(default)]
    index_templates: BTreeMap<String, StoredIndexTemplate>,
    #[serde(default)]
    component_templates: BTreeMap<String, BTreeMap<String, String>>,
    #[serde(default)]
    ingest_pipelines: BTreeMap<String, Vec<PipelineProcessor>>,
    #[serde(default)]
    stream_documents: BTreeMap<String, StreamDefinition>,
    /// Simulated outage: every read fails with `Unavailable`.
    #[serde(skip)]
    unavailable: bool,
}

impl InMemoryBackingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Externally created data stream, as a classic stream finds it.
    pub fn with_data_stream(mut self, name: &str, template: &str) -> Self {
        self.data_streams.insert(
            name.to_string(),
            StoredDataStream {
                kind: BackingKind::DataStream,
                template: template.to_string(),
                lifecycle: None,
            },
        );
        self
    }

    pub fn with_plain_index(mut self, name: &str) -> Self {
        self.data_streams.insert(
            name.to_string(),
            StoredDataStream {
                kind: BackingKind::PlainIndex,
                template: String::new(),
                lifecycle: None,
            },
        );
        self
    }

    pub fn with_index_template(mut self, name: &str, default_pipeline: Option<&str>) -> Self {
        self.index_templates.insert(
            name.to_string(),
            StoredIndexTemplate {
                index_patterns: vec![format!("{name}-*")],
                composed_of: Vec::new(),
                default_pipeline: default_pipeline.map(str::to_string),
            },
        );
        self
    }

    pub fn with_ingest_pipeline(mut self, name: &str, processors: Vec<PipelineProcessor>) -> Self {
        self.ingest_pipelines.insert(name.to_string(), processors);
        self
    }

    pub fn set_unavailable(&mut self, unavailable: bool) {
        self.unavailable = unavailable;
    }

    pub fn data_stream(&self, name: &str) -> Option<&StoredDataStream> {
        self.data_streams.get(name)
    }

    pub fn index_template(&self, name: &str) -> Option<&StoredIndexTemplate> {
        self.index_templates.get(name)
    }

    pub fn component_template(&self, name: &str) -> Option<&BTreeMap<String, String>> {
        self.component_templates.get(name)
    }

    pub fn ingest_pipeline(&self, name: &str) -> Option<&[PipelineProcessor]> {
        self.ingest_pipelines.get(name).map(Vec::as_slice)
    }

    pub fn stream_document(&self, name: &str) -> Option<&StreamDefinition> {
        self.stream_documents.get(name)
    }

    /// References linked from `pipeline`, in processor order.
    pub fn linked_references(&self, pipeline: &str) -> Vec<&str> {
        self.ingest_pipelines
            .get(pipeline)
            .map(|procs| {
                procs
                    .iter()
                    .filter(|p| p.processor == "pipeline")
                    .map(|p| p.tag.as_str())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn apply_plan(&mut self, plan: &ExecutionPlan) {
        for action in plan.iter() {
            self.apply(action);
        }
    }

    pub fn apply(&mut self, action: &MutationAction) {
        match action {
            MutationAction::UpsertIngestPipeline {
                name, processors, ..
            } => {
                self.ingest_pipelines.insert(name.clone(), processors.clone());
            }
            MutationAction::UpsertComponentTemplate { name, fields, .. } => {
                self.component_templates.insert(name.clone(), fields.clone());
            }
            MutationAction::UpsertIndexTemplate {
                name,
                index_patterns,
                composed_of,
                default_pipeline,
                ..
            } => {
                self.index_templates.insert(
                    name.clone(),
                    StoredIndexTemplate {
                        index_patterns: index_patterns.clone(),
                        composed_of: composed_of.clone(),
                        default_pipeline: Some(default_pipeline.clone()),
                    },
                );
            }
            MutationAction::AppendProcessorToIngestPipeline {
                pipeline,
                reference_pipeline,
                condition,
                ..
            } => {
                let link = PipelineProcessor {
                    processor: "pipeline".into(),
                    options: [("name".to_string(), reference_pipeline.clone())].into(),
                    condition: Some(condition.clone()),
                    tag: reference_pipeline.clone(),
                };
                let procs = self.ingest_pipelines.entry(pipeline.clone()).or_default();
                match procs.iter_mut().find(|p| is_link_to(p, reference_pipeline)) {
                    Some(existing) => *existing = link,
                    None => procs.push(link),
                }
            }
            MutationAction::DeleteProcessorFromIngestPipeline {
                pipeline,
                reference_pipeline,
                ..
            } => {
                if let Some(procs) = self.ingest_pipelines.get_mut(pipeline) {
                    procs.retain(|p| !is_link_to(p, reference_pipeline));
                }
            }
            MutationAction::UpsertDataStream { name } => {
                self.data_streams
                    .entry(name.clone())
                    .or_insert_with(|| StoredDataStream {
                        kind: BackingKind::DataStream,
                        template: name.clone(),
                        lifecycle: None,
                    });
            }
            MutationAction::UpdateLifecycle { name, lifecycle } => {
                if let Some(ds) = self.data_streams.get_mut(name) {
                    ds.lifecycle = Some(lifecycle.clone());
                }
            }
            MutationAction::DeleteDataStream { name } => {
                self.data_streams.remove(name);
            }
            MutationAction::DeleteIndexTemplate { name } => {
                self.index_templates.remove(name);
            }
            MutationAction::DeleteComponentTemplate { name } => {
                self.component_templates.remove(name);
            }
            MutationAction::DeleteIngestPipeline { name } => {
                self.ingest_pipelines.remove(name);
            }
            MutationAction::UpsertStreamDocument { definition } => {
                self.stream_documents
                    .insert(definition.name().to_string(), definition.clone());
            }
            MutationAction::DeleteStreamDocument { name } => {
                self.stream_documents.remove(name);
            }
        }
    }
}

fn is_link_to(processor: &PipelineProcessor, reference: &str) -> bool {
    processor.processor == "pipeline" && processor.tag == reference
}

impl BackingStoreFacts for InMemoryBackingStore {
    fn get_data_stream(&self, name: &str) -> Result<BackingFacts, FactsError> {
        if self.unavailable {
            return Err(FactsError::Unavailable("in-memory store marked unavailable".into()));
        }
        self.data_streams
            .get(name)
            .map(|ds| BackingFacts {
                name: name.to_string(),
                kind: ds.kind,
                template: ds.template.clone(),
            })
            .ok_or(FactsError::NotFound)
    }

    fn get_unmanaged_assets(&self, facts: &BackingFacts) -> Result<UnmanagedAssets, FactsError> {
        if self.unavailable {
            return Err(FactsError::Unavailable("in-memory store marked unavailable".into()));
        }
        let template = self
            .index_templates
            .get(&facts.template)
            .ok_or(FactsError::NotFound)?;
        Ok(UnmanagedAssets {
            ingest_pipeline: template.default_pipeline.clone(),
            component_templates: template.composed_of.clone(),
        })
    }
}
