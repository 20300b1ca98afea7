//! Full-pass scenarios: cascades, validation exclusion, rejection and
//! abort paths of `State::attempt_changes`, and commits between passes.

use std::collections::BTreeMap;

use strm_diff::ConflictClass;
use strm_plan::{ActionKind, MutationAction};
use strm_schemas::{
    ClassicDefinition, Lifecycle, ProcessingStep, RoutingRule, StreamDefinition, WiredDefinition,
};
use strm_state::*;

// ============================================================================
// Fixtures
// ============================================================================

#[derive(Default)]
struct Facts {
    data_streams: BTreeMap<String, BackingFacts>,
    unavailable: bool,
}

impl Facts {
    fn with_data_stream(mut self, name: &str, template: &str) -> Self {
        self.data_streams.insert(
            name.to_string(),
            BackingFacts {
                name: name.to_string(),
                kind: BackingKind::DataStream,
                template: template.to_string(),
            },
        );
        self
    }

    fn with_plain_index(mut self, name: &str) -> Self {
        self.data_streams.insert(
            name.to_string(),
            BackingFacts {
                name: name.to_string(),
                kind: BackingKind::PlainIndex,
                template: String::new(),
            },
        );
        self
    }
}

impl BackingStoreFacts for Facts {
    fn get_data_stream(&self, name: &str) -> Result<BackingFacts, FactsError> {
        if self.unavailable {
            return Err(FactsError::Unavailable("connection reset".into()));
        }
        self.data_streams.get(name).cloned().ok_or(FactsError::NotFound)
    }

    fn get_unmanaged_assets(&self, _facts: &BackingFacts) -> Result<UnmanagedAssets, FactsError> {
        Ok(UnmanagedAssets::default())
    }
}

fn dsl(retention: &str) -> Lifecycle {
    Lifecycle::Dsl {
        data_retention: Some(retention.into()),
    }
}

fn classic(name: &str, processing: &[&str], lifecycle: Lifecycle) -> StreamDefinition {
    ClassicDefinition {
        name: name.into(),
        processing: processing
            .iter()
            .map(|id| ProcessingStep::new(*id, "set"))
            .collect(),
        lifecycle,
    }
    .into()
}

fn wired(name: &str, lifecycle: Lifecycle, routes: &[&str]) -> StreamDefinition {
    WiredDefinition {
        lifecycle,
        routing: routes
            .iter()
            .map(|dest| RoutingRule::new(*dest, format!("ctx.target == '{dest}'")))
            .collect(),
        ..WiredDefinition::child(name)
    }
    .into()
}

/// Starting state whose records have all been applied before.
fn applied(defs: Vec<StreamDefinition>) -> State {
    State::from_records(
        defs.into_iter()
            .map(|def| StreamRecord::persisted(def.clone(), Some(def), false)),
    )
}

fn run(
    starting: &State,
    changes: Vec<StreamChange>,
    facts: &Facts,
) -> Result<PassOutcome, ReconcileError> {
    let flags = DeploymentFlags::default();
    let registry = InFlightRegistry::new();
    starting.attempt_changes(changes, &PassContext::new(facts, &flags), &registry)
}

fn run_restricted(
    starting: &State,
    changes: Vec<StreamChange>,
) -> Result<PassOutcome, ReconcileError> {
    let flags = DeploymentFlags {
        restricted_lifecycle_types: true,
    };
    let facts = Facts::default();
    let registry = InFlightRegistry::new();
    starting.attempt_changes(changes, &PassContext::new(&facts, &flags), &registry)
}

fn names(outcome: &PassOutcome) -> Vec<&str> {
    outcome.records.iter().map(|r| r.name.as_str()).collect()
}

// ============================================================================
// Delete handling
// ============================================================================

#[test]
fn delete_of_unknown_stream_is_reported_and_plans_nothing() {
    let starting = applied(vec![classic("logs-a", &[], Lifecycle::Inherit)]);

    let outcome = run(&starting, vec![StreamChange::Delete("logs-zzz".into())], &Facts::default())
        .unwrap();

    assert!(outcome.plan.is_empty());
    assert_eq!(outcome.records[0].change_status, ChangeStatus::Unchanged);
    assert_eq!(
        outcome.records[0].validation.errors,
        vec![ValidationError::NotFound {
            stream: "logs-zzz".into()
        }]
    );
    assert!(outcome.desired_state.get("logs-a").is_some());
}

#[test]
fn plan_delete_of_other_record_leaves_it_unchanged() {
    let starting = applied(vec![classic("logs-a", &[], Lifecycle::Inherit)]);
    let flags = DeploymentFlags::default();
    let facts = Facts::default();
    let ctx = PassContext::new(&facts, &flags);

    let planned = plan_delete("logs-b", &starting, &starting, &ctx).unwrap();

    assert!(planned.plan.actions.is_empty());
    assert_eq!(
        planned.desired_state.get("logs-a").unwrap().change_status(),
        ChangeStatus::Unchanged
    );
}

// ============================================================================
// Rejections
// ============================================================================

#[test]
fn type_mismatch_rejects_only_that_change() {
    let starting = applied(vec![classic("logs-a", &[], Lifecycle::Inherit)]);
    let facts = Facts::default().with_data_stream("logs-b", "logs");

    let outcome = run(
        &starting,
        vec![
            StreamChange::Upsert(wired("logs-a", dsl("1d"), &[])),
            StreamChange::Upsert(classic("logs-b", &[], Lifecycle::Inherit)),
        ],
        &facts,
    )
    .unwrap();

    assert_eq!(outcome.rejected.len(), 1);
    assert!(matches!(outcome.rejected[0], ReconcileError::TypeMismatch { .. }));
    assert_eq!(names(&outcome), vec!["logs-b"]);
    assert_eq!(outcome.plan.len(), 1);
    assert_eq!(outcome.plan.actions[0].kind(), ActionKind::UpsertStreamDocument);
}

#[test]
fn classic_without_backing_data_stream_is_excluded_and_reverted() {
    let outcome = run(
        &State::default(),
        vec![StreamChange::Upsert(classic("logs-x", &["s1"], Lifecycle::Inherit))],
        &Facts::default(),
    )
    .unwrap();

    assert!(outcome.plan.is_empty());
    assert!(outcome.desired_state.get("logs-x").is_none());
    assert!(matches!(
        &outcome.rejected[0],
        ReconcileError::ValidationFailure { name, errors }
            if name == "logs-x"
            && errors == &vec![ValidationError::MissingDataStream { stream: "logs-x".into() }]
    ));
}

#[test]
fn restricted_deployment_rejects_ilm() {
    let flags = DeploymentFlags {
        restricted_lifecycle_types: true,
    };
    let facts = Facts::default();
    let registry = InFlightRegistry::new();
    let ilm = Lifecycle::Ilm {
        policy: "hot-warm".into(),
    };

    let outcome = State::default()
        .attempt_changes(
            vec![StreamChange::Upsert(wired("logs", ilm, &[]))],
            &PassContext::new(&facts, &flags),
            &registry,
        )
        .unwrap();

    assert_eq!(
        outcome.records[0].validation.errors,
        vec![ValidationError::RestrictedLifecycle {
            stream: "logs".into()
        }]
    );
    assert!(outcome.plan.is_empty());
}

#[test]
fn root_stream_cannot_be_deleted() {
    let starting = applied(vec![wired("logs", dsl("30d"), &[])]);

    let outcome = run(&starting, vec![StreamChange::Delete("logs".into())], &Facts::default())
        .unwrap();

    assert!(outcome.plan.is_empty());
    assert_eq!(
        outcome.desired_state.get("logs").unwrap().change_status(),
        ChangeStatus::Unchanged
    );
}

// ============================================================================
// Aborts
// ============================================================================

#[test]
fn unavailable_backing_store_aborts_the_pass() {
    let facts = Facts {
        unavailable: true,
        ..Facts::default()
    };

    let err = run(
        &State::default(),
        vec![StreamChange::Upsert(classic("logs-x", &["s1"], Lifecycle::Inherit))],
        &facts,
    )
    .unwrap_err();

    assert!(err.is_fatal());
    assert!(matches!(
        err,
        ReconcileError::BackingStoreRead {
            source: FactsError::Unavailable(_),
            ..
        }
    ));
}

#[test]
fn corrupt_starting_record_aborts_the_pass() {
    let starting = State::from_records([StreamRecord::persisted(
        wired("logs", dsl("30d"), &[]),
        Some(classic("logs", &[], Lifecycle::Inherit)),
        false,
    )]);

    let err = run(
        &starting,
        vec![StreamChange::Upsert(wired("logs", dsl("7d"), &[]))],
        &Facts::default(),
    )
    .unwrap_err();

    assert!(matches!(err, ReconcileError::UnexpectedStartingState { .. }));
}

#[test]
fn stream_already_in_flight_is_refused() {
    let flags = DeploymentFlags::default();
    let facts = Facts::default();
    let registry = InFlightRegistry::new();
    let _other_pass = registry.acquire(["logs"]).unwrap();

    let err = State::default()
        .attempt_changes(
            vec![StreamChange::Upsert(wired("logs", dsl("1d"), &[]))],
            &PassContext::new(&facts, &flags),
            &registry,
        )
        .unwrap_err();

    assert!(matches!(
        err,
        ReconcileError::InFlight(LeaseError::AlreadyInFlight { .. })
    ));
}

// ============================================================================
// Wired cascades
// ============================================================================

#[test]
fn new_routing_destination_creates_child_with_inherited_lifecycle() {
    let starting = applied(vec![wired("logs", dsl("30d"), &[])]);

    let outcome = run(
        &starting,
        vec![StreamChange::Upsert(wired("logs", dsl("30d"), &["logs.nginx"]))],
        &Facts::default(),
    )
    .unwrap();

    assert!(outcome.rejected.is_empty());
    assert_eq!(names(&outcome), vec!["logs", "logs.nginx"]);
    assert_eq!(
        outcome.records[0].cascading_changes,
        vec![StreamChange::Upsert(WiredDefinition::child("logs.nginx").into())]
    );
    assert!(outcome.plan.iter().any(|a| *a
        == MutationAction::UpdateLifecycle {
            name: "logs.nginx".into(),
            lifecycle: dsl("30d"),
        }));
    assert!(outcome.plan.iter().any(|a| matches!(
        a,
        MutationAction::UpsertIngestPipeline { name, processors, .. }
            if name == "logs@stream.processing"
            && processors.iter().any(|p| p.processor == "reroute" && p.tag == "logs.nginx")
    )));
}

#[test]
fn child_created_directly_gets_disabled_rule_on_parent() {
    let starting = applied(vec![wired("logs", dsl("30d"), &[])]);

    let outcome = run(
        &starting,
        vec![StreamChange::Upsert(WiredDefinition::child("logs.app").into())],
        &Facts::default(),
    )
    .unwrap();

    let parent = outcome.desired_state.get("logs").unwrap();
    let parent = parent.definition().as_wired().unwrap();
    assert_eq!(parent.routing, vec![RoutingRule::disabled("logs.app")]);
    assert!(outcome.rejected.is_empty());
}

#[test]
fn deleting_a_stream_deletes_its_subtree_and_unroutes_parent() {
    let starting = applied(vec![
        wired("logs", dsl("30d"), &["logs.a"]),
        wired("logs.a", Lifecycle::Inherit, &["logs.a.b"]),
        wired("logs.a.b", Lifecycle::Inherit, &[]),
    ]);

    let outcome = run(&starting, vec![StreamChange::Delete("logs.a".into())], &Facts::default())
        .unwrap();

    assert_eq!(names(&outcome), vec!["logs.a", "logs.a.b", "logs"]);
    let deleted: Vec<&str> = outcome
        .plan
        .iter()
        .filter_map(|a| match a {
            MutationAction::DeleteDataStream { name } => Some(name.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(deleted, vec!["logs.a", "logs.a.b"]);

    let parent = outcome.desired_state.get("logs").unwrap();
    assert!(parent.definition().as_wired().unwrap().routing.is_empty());
}

#[test]
fn parent_lifecycle_change_reaches_inheriting_children() {
    let starting = applied(vec![
        wired("logs", dsl("30d"), &["logs.a"]),
        wired("logs.a", Lifecycle::Inherit, &[]),
    ]);

    let outcome = run(
        &starting,
        vec![StreamChange::Upsert(wired("logs", dsl("7d"), &["logs.a"]))],
        &Facts::default(),
    )
    .unwrap();

    let lifecycle_updates: Vec<&MutationAction> = outcome
        .plan
        .iter()
        .filter(|a| a.kind() == ActionKind::UpdateLifecycle)
        .collect();
    assert_eq!(
        lifecycle_updates,
        vec![
            &MutationAction::UpdateLifecycle {
                name: "logs".into(),
                lifecycle: dsl("7d"),
            },
            &MutationAction::UpdateLifecycle {
                name: "logs.a".into(),
                lifecycle: dsl("7d"),
            },
        ]
    );
}

// ============================================================================
// Merge reporting
// ============================================================================

#[test]
fn customized_scalar_conflict_keeps_current_and_is_reported() {
    let starting = State::from_records([StreamRecord::persisted(
        classic("logs-x", &[], dsl("3d")),
        Some(classic("logs-x", &[], dsl("1d"))),
        true,
    )]);

    let outcome = run(
        &starting,
        vec![StreamChange::Upsert(classic("logs-x", &[], dsl("7d")))],
        &Facts::default(),
    )
    .unwrap();

    let record = &outcome.records[0];
    assert!(record.validation.is_valid);
    assert_eq!(record.conflicts.len(), 1);
    assert_eq!(record.conflicts[0].conflict, ConflictClass::NonSolvable);
    assert_eq!(
        outcome.desired_state.get("logs-x").unwrap().definition().lifecycle(),
        &dsl("3d")
    );
    assert!(!outcome
        .plan
        .iter()
        .any(|a| a.kind() == ActionKind::UpdateLifecycle));
}

// ============================================================================
// Withdrawn changes take their cascades with them
// ============================================================================

#[test]
fn rejected_child_does_not_leave_a_route_on_its_parent() {
    let starting = applied(vec![wired("logs", dsl("30d"), &[])]);
    let ilm = Lifecycle::Ilm {
        policy: "hot-warm".into(),
    };

    let outcome = run_restricted(
        &starting,
        vec![StreamChange::Upsert(wired("logs.x", ilm, &[]))],
    )
    .unwrap();

    assert_eq!(outcome.rejected.len(), 1);
    assert!(matches!(
        &outcome.rejected[0],
        ReconcileError::ValidationFailure { name, .. } if name == "logs.x"
    ));
    assert!(outcome.plan.is_empty());
    assert!(outcome.desired_state.get("logs.x").is_none());
    assert_eq!(outcome.desired_state.get("logs"), starting.get("logs"));
}

#[test]
fn rejected_cascade_withdraws_its_origin_and_spares_other_changes() {
    let starting = applied(vec![wired("logs", dsl("30d"), &[])]);
    let facts = Facts::default().with_plain_index("logs.nginx");

    let outcome = run(
        &starting,
        vec![
            StreamChange::Upsert(wired("logs", dsl("30d"), &["logs.nginx"])),
            StreamChange::Upsert(wired("metrics", dsl("7d"), &[])),
        ],
        &facts,
    )
    .unwrap();

    assert_eq!(outcome.rejected.len(), 2);
    assert!(matches!(
        &outcome.rejected[0],
        ReconcileError::ValidationFailure { name, errors }
            if name == "logs.nginx"
            && errors == &vec![ValidationError::ExistingIndex { stream: "logs.nginx".into() }]
    ));
    assert!(matches!(
        &outcome.rejected[1],
        ReconcileError::CascadeRejected { name, cause }
            if name == "logs" && cause == "logs.nginx"
    ));
    assert!(!outcome.rejected[1].is_fatal());

    assert_eq!(names(&outcome), vec!["metrics", "logs.nginx"]);
    assert_eq!(outcome.desired_state.get("logs"), starting.get("logs"));
    assert!(outcome.desired_state.get("logs.nginx").is_none());
    assert!(outcome.desired_state.get("metrics").is_some());
    assert_eq!(outcome.plan.len(), 6);
    assert!(outcome
        .plan
        .iter()
        .all(|a| !format!("{a:?}").contains("logs")));
}

// ============================================================================
// Commit, persist, next pass
// ============================================================================

fn round_trip(state: &State) -> State {
    serde_json::from_str(&serde_json::to_string(state).unwrap()).unwrap()
}

#[test]
fn customization_survives_an_unrelated_pass() {
    let drifted = classic("logs-a", &[], dsl("30d"));
    let base = classic("logs-a", &[], dsl("7d"));
    let starting = State::from_records([StreamRecord::persisted(
        drifted.clone(),
        Some(base.clone()),
        false,
    )]);
    let facts = Facts::default()
        .with_data_stream("logs-a", "logs")
        .with_data_stream("logs-b", "logs");

    let first = run(
        &starting,
        vec![StreamChange::Upsert(classic("logs-b", &[], Lifecycle::Inherit))],
        &facts,
    )
    .unwrap();
    assert!(first.rejected.is_empty());

    let next = round_trip(&first.desired_state.committed());
    let untouched = next.get("logs-a").unwrap();
    assert_eq!(untouched.definition(), &drifted);
    assert_eq!(untouched.last_applied(), Some(&base));
    let upserted = next.get("logs-b").unwrap();
    assert_eq!(upserted.last_applied(), Some(upserted.definition()));

    let second = run(
        &next,
        vec![StreamChange::Upsert(classic("logs-a", &[], dsl("90d")))],
        &facts,
    )
    .unwrap();

    let record = &second.records[0];
    assert_eq!(record.conflicts.len(), 1);
    assert_eq!(record.conflicts[0].conflict, ConflictClass::NonSolvable);
    assert_eq!(
        second.desired_state.get("logs-a").unwrap().definition().lifecycle(),
        &dsl("30d")
    );
}

#[test]
fn rejected_record_keeps_its_history_through_commit() {
    let drifted = classic("logs-x", &[], dsl("30d"));
    let base = classic("logs-x", &[], dsl("7d"));
    let starting = State::from_records([StreamRecord::persisted(
        drifted.clone(),
        Some(base.clone()),
        false,
    )]);

    let outcome = run(
        &starting,
        vec![StreamChange::Upsert(classic("logs-x", &["s1"], dsl("30d")))],
        &Facts::default(),
    )
    .unwrap();
    assert_eq!(outcome.rejected.len(), 1);

    let next = round_trip(&outcome.desired_state.committed());
    let record = next.get("logs-x").unwrap();
    assert_eq!(record.definition(), &drifted);
    assert_eq!(record.last_applied(), Some(&base));
}
