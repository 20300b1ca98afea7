//! Scenario: shared-pipeline edits from several records in one pass.
//!
//! # Invariant under test
//! Links on a shared pipeline are merged per `(pipeline, reference)`: an
//! append followed by a remove of the same reference leaves the shared
//! pipeline untouched, while links to different references coexist.

use strm_plan::{build_execution_plan, MutationAction};
use strm_schemas::{ClassicDefinition, Lifecycle, ProcessingStep, StreamDefinition};
use strm_state::{
    plan_delete, plan_upsert, DeploymentFlags, InFlightRegistry, PassContext, State, StreamChange,
    StreamRecord,
};
use strm_testkit::InMemoryBackingStore;

const SHARED: &str = "logs@custom";

fn classic(name: &str, processing: &[&str]) -> StreamDefinition {
    ClassicDefinition {
        name: name.into(),
        processing: processing
            .iter()
            .map(|id| ProcessingStep::new(*id, "set"))
            .collect(),
        lifecycle: Lifecycle::Inherit,
    }
    .into()
}

fn touches_shared(action: &MutationAction, reference: &str) -> bool {
    action
        .shared_link_key()
        .is_some_and(|(p, r)| p == SHARED && r == reference)
}

#[test]
fn append_and_remove_of_same_reference_leave_shared_pipeline_alone() {
    let starting = State::from_records([StreamRecord::persisted(
        classic("logs-x", &["s1"]),
        Some(classic("logs-x", &["s1"])),
        false,
    )]);
    let store = InMemoryBackingStore::new()
        .with_data_stream("logs-x", "logs")
        .with_index_template("logs", Some(SHARED));
    let flags = DeploymentFlags::default();
    let ctx = PassContext::new(&store, &flags);

    let upsert = plan_upsert(&classic("logs-x", &["s1", "s2"]), &starting, &starting, &ctx).unwrap();
    let delete = plan_delete("logs-x", &starting, &starting, &ctx).unwrap();
    assert!(upsert.plan.actions.iter().any(|a| touches_shared(a, "logs-x@stream.processing")));
    assert!(delete.plan.actions.iter().any(|a| touches_shared(a, "logs-x@stream.processing")));

    let plan = build_execution_plan(vec![upsert.plan.actions, delete.plan.actions]);

    assert!(!plan.iter().any(|a| touches_shared(a, "logs-x@stream.processing")));
    assert!(!plan.is_empty());
}

#[test]
fn different_references_on_one_shared_pipeline_both_link() {
    let store = InMemoryBackingStore::new()
        .with_data_stream("logs-a", "logs")
        .with_data_stream("logs-b", "logs")
        .with_index_template("logs", Some(SHARED));
    let flags = DeploymentFlags::default();
    let registry = InFlightRegistry::new();

    let outcome = State::default()
        .attempt_changes(
            vec![
                StreamChange::Upsert(classic("logs-a", &["s1"])),
                StreamChange::Upsert(classic("logs-b", &["s1"])),
            ],
            &PassContext::new(&store, &flags),
            &registry,
        )
        .unwrap();

    let mut applied = store.clone();
    applied.apply_plan(&outcome.plan);
    assert_eq!(
        applied.linked_references(SHARED),
        vec!["logs-a@stream.processing", "logs-b@stream.processing"]
    );
}

#[test]
fn missing_template_falls_back_to_conventional_pipeline_name() {
    let store = InMemoryBackingStore::new().with_data_stream("logs-a", "logs");
    let flags = DeploymentFlags::default();
    let registry = InFlightRegistry::new();

    let outcome = State::default()
        .attempt_changes(
            vec![StreamChange::Upsert(classic("logs-a", &["s1"]))],
            &PassContext::new(&store, &flags),
            &registry,
        )
        .unwrap();

    assert!(outcome.plan.iter().any(|a| matches!(
        a,
        MutationAction::AppendProcessorToIngestPipeline { pipeline, .. } if pipeline == "logs-pipeline"
    )));
}
